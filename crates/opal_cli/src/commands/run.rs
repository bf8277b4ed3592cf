use anyhow::Context;
use clap::Args as ClapArgs;
use opal_protocol::{AlgorithmBundle, ParameterBundle};
use opal_runner::{Runner, RunnerConfig};
use std::path::PathBuf;

#[derive(ClapArgs, Debug)]
pub struct RunArgs {
    /// Directory containing one CSV file per subject.
    #[arg(long)]
    data_dir: PathBuf,

    /// Number of Mapper Worker threads.
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Optional JSON file mapping subject id to a numeric weight.
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Path to the analyst's Python snippet.
    #[arg(long)]
    algorithm: PathBuf,

    /// Name of the class in --algorithm exposing `map(params, subject)`.
    #[arg(long)]
    entry_name: String,

    /// Optional JSON file of parameters passed to every `map` call.
    #[arg(long)]
    params: Option<PathBuf>,

    /// Dev mode: print scaled results instead of posting them anywhere.
    #[arg(long)]
    dev: bool,

    /// Skip privilege drop and CPU limiting. Dev-only; never use in production.
    #[arg(long = "unsafe")]
    unsafe_: bool,

    /// Aggregation service URL. Required in production mode unless the
    /// params file already carries `aggregationServiceUrl`.
    #[arg(long)]
    aggregation_url: Option<String>,

    /// Disable the worker pool: process subjects one at a time in this
    /// thread instead of fanning them out across `--workers` threads.
    #[arg(long)]
    no_multiprocess: bool,
}

pub fn execute(args: RunArgs) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(&args.algorithm)
        .with_context(|| format!("failed to read algorithm file {}", args.algorithm.display()))?;
    let bundle = AlgorithmBundle::new(source, args.entry_name);

    let params = match &args.params {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read params file {}", path.display()))?;
            let value: serde_json::Value = serde_json::from_str(&text)
                .with_context(|| format!("params file {} is not valid JSON", path.display()))?;
            ParameterBundle::from_value(value)?
        }
        None => ParameterBundle::empty(),
    };

    let dev_mode = args.dev;
    let config = RunnerConfig {
        data_dir: args.data_dir,
        workers: args.workers,
        weights_path: args.weights,
        bundle,
        params,
        dev_mode,
        unsafe_mode: args.unsafe_,
        aggregation_url: args.aggregation_url,
        multiprocess: !args.no_multiprocess,
    };

    let outcome = Runner::new(config).run()?;

    if dev_mode {
        print_dev_summary(&outcome.summary);
    } else {
        println!(
            "done: {} posted, {} dropped, {} failed",
            outcome.summary.scaled.len(),
            outcome.summary.dropped.len(),
            outcome.summary.failed.len()
        );
    }

    if !outcome.summary.failed.is_empty() {
        anyhow::bail!("{} subject(s) failed", outcome.summary.failed.len());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(clap::Parser, Debug)]
    struct Harness {
        #[command(flatten)]
        run: RunArgs,
    }

    #[test]
    fn parses_minimal_required_args() {
        let harness = Harness::try_parse_from([
            "opal-runner",
            "--data-dir",
            "./subjects",
            "--algorithm",
            "snippet.py",
            "--entry-name",
            "MyAlgorithm",
        ])
        .unwrap();
        assert_eq!(harness.run.workers, 4);
        assert!(!harness.run.dev);
        assert!(!harness.run.unsafe_);
        assert!(!harness.run.no_multiprocess);
    }

    #[test]
    fn unsafe_flag_uses_bare_long_name() {
        let harness = Harness::try_parse_from([
            "opal-runner",
            "--data-dir",
            "./subjects",
            "--algorithm",
            "snippet.py",
            "--entry-name",
            "MyAlgorithm",
            "--unsafe",
            "--dev",
        ])
        .unwrap();
        assert!(harness.run.unsafe_);
        assert!(harness.run.dev);
    }

    #[test]
    fn missing_required_arg_fails() {
        let result = Harness::try_parse_from(["opal-runner", "--data-dir", "./subjects"]);
        assert!(result.is_err());
    }

    #[test]
    fn params_file_must_be_a_json_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(ParameterBundle::from_value(value).is_err());
    }

    #[test]
    fn params_file_round_trips_aggregation_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        std::fs::write(&path, r#"{"aggregationServiceUrl": "http://agg.example/x"}"#).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let params = ParameterBundle::from_value(value).unwrap();
        assert_eq!(
            params.aggregation_service_url(),
            Some("http://agg.example/x")
        );
    }
}

fn print_dev_summary(summary: &opal_runner::CollectorSummary) {
    let as_json: serde_json::Value = serde_json::json!(summary
        .scaled
        .iter()
        .map(|(id, partial)| {
            let fields: serde_json::Map<String, serde_json::Value> = partial
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::json!(v.as_f64())))
                .collect();
            serde_json::json!({ "subject": id, "result": fields })
        })
        .collect::<Vec<_>>());
    println!("{}", serde_json::to_string_pretty(&as_json).unwrap());
}
