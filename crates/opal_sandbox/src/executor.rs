//! Sandbox Executor (C2): runs one snippet against one subject file in a
//! fresh interpreter process and parses its result, grounded on
//! `casparian_worker::bridge::spawn_guest_direct`'s "build a program, spawn
//! a child, read its output" shape — simplified to a single stdout marker
//! instead of the framed Arrow-batch wire protocol, since a Partial is a
//! small JSON object rather than a stream of record batches.

use crate::driver::{build_program, split_result};
use crate::env::SandboxEnv;
use crate::error::SandboxError;
use opal_protocol::{AlgorithmBundle, ParameterBundle, SubjectFile};
use serde_json::Value;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// CPU-time budget enforced on every sandboxed invocation (spec §4.1's open
/// question on a wall-clock cap is left unresolved upstream; this is the
/// CPU-only limit the spec does settle on).
pub const CPU_LIMIT_SECONDS: u64 = 15;

/// Runs a snippet against a subject and returns its raw (unvalidated) JSON
/// result. Implementors differ only in the privilege/resource policy
/// applied to the child process.
pub trait SandboxExecutor: Send + Sync {
    fn execute(
        &self,
        bundle: &AlgorithmBundle,
        params: &ParameterBundle,
        subject: &SubjectFile,
        dev_mode: bool,
    ) -> Result<Value, SandboxError>;
}

/// Production executor: drops privilege to the configured sandbox account
/// and enforces the CPU limit via `setrlimit` in the child, before exec.
pub struct ProcessSandbox {
    env: SandboxEnv,
    cpu_limit_secs: u64,
}

impl ProcessSandbox {
    pub fn new(env: SandboxEnv) -> Self {
        Self {
            env,
            cpu_limit_secs: CPU_LIMIT_SECONDS,
        }
    }

    pub fn with_cpu_limit(env: SandboxEnv, cpu_limit_secs: u64) -> Self {
        Self {
            env,
            cpu_limit_secs,
        }
    }
}

impl SandboxExecutor for ProcessSandbox {
    fn execute(
        &self,
        bundle: &AlgorithmBundle,
        params: &ParameterBundle,
        subject: &SubjectFile,
        dev_mode: bool,
    ) -> Result<Value, SandboxError> {
        let interpreter = self.env.interpreter_path();
        let program = build_program(bundle, params, &subject.path, dev_mode);

        #[cfg(unix)]
        {
            run_child(&interpreter, &program, subject, Some(&self.env), self.cpu_limit_secs)
        }
        #[cfg(not(unix))]
        {
            let _ = self.cpu_limit_secs;
            run_child(&interpreter, &program, subject, None, 0)
        }
    }
}

/// Dev-mode executor used under `--unsafe`: no privilege drop, no CPU
/// limit, runs whatever interpreter is first on `PATH`. Never used unless
/// the operator explicitly opts in (spec §4.1).
pub struct UnsafeSandbox {
    interpreter: std::path::PathBuf,
}

impl UnsafeSandbox {
    pub fn new() -> Self {
        Self {
            interpreter: std::path::PathBuf::from("python3"),
        }
    }
}

impl Default for UnsafeSandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl SandboxExecutor for UnsafeSandbox {
    fn execute(
        &self,
        bundle: &AlgorithmBundle,
        params: &ParameterBundle,
        subject: &SubjectFile,
        dev_mode: bool,
    ) -> Result<Value, SandboxError> {
        let program = build_program(bundle, params, &subject.path, dev_mode);
        run_child(&self.interpreter, &program, subject, None, 0)
    }
}

#[cfg(unix)]
fn run_child(
    interpreter: &std::path::Path,
    program: &str,
    subject: &SubjectFile,
    env: Option<&SandboxEnv>,
    cpu_limit_secs: u64,
) -> Result<Value, SandboxError> {
    use std::os::unix::process::CommandExt;

    let mut command = Command::new(interpreter);
    command
        .arg("-c")
        .arg(program)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if let Some(env) = env {
        let uid = env.sandbox_uid;
        unsafe {
            command.pre_exec(move || {
                apply_sandbox_policy(uid, cpu_limit_secs)
                    .map_err(|e| std::io::Error::from_raw_os_error(e as i32))
            });
        }
    }

    debug!(subject = %subject.id, "spawning sandboxed snippet");

    let output = command
        .spawn()
        .and_then(|child| child.wait_with_output())
        .map_err(|source| SandboxError::Spawn {
            interpreter: interpreter.to_path_buf(),
            source,
        })?;

    interpret_output(subject, output, cpu_limit_secs)
}

#[cfg(not(unix))]
fn run_child(
    interpreter: &std::path::Path,
    program: &str,
    subject: &SubjectFile,
    _env: Option<&SandboxEnv>,
    cpu_limit_secs: u64,
) -> Result<Value, SandboxError> {
    let output = Command::new(interpreter)
        .arg("-c")
        .arg(program)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|source| SandboxError::Spawn {
            interpreter: interpreter.to_path_buf(),
            source,
        })?;

    interpret_output(subject, output, cpu_limit_secs)
}

#[cfg(unix)]
fn apply_sandbox_policy(uid: nix::unistd::Uid, cpu_limit_secs: u64) -> Result<(), nix::Error> {
    use nix::sys::resource::{setrlimit, Resource};
    use nix::unistd::setuid;

    if cpu_limit_secs > 0 {
        setrlimit(Resource::RLIMIT_CPU, cpu_limit_secs, cpu_limit_secs)?;
    }
    setuid(uid)?;
    Ok(())
}

fn interpret_output(
    subject: &SubjectFile,
    output: std::process::Output,
    cpu_limit_secs: u64,
) -> Result<Value, SandboxError> {
    let subject_name = subject.id.as_str().to_string();

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = output.status.signal() {
            // SIGXCPU (24) is what the kernel delivers when RLIMIT_CPU is hit.
            if signal == 24 && cpu_limit_secs > 0 {
                return Err(SandboxError::CpuLimitExceeded {
                    subject: subject_name,
                });
            }
            return Err(SandboxError::Signaled {
                subject: subject_name,
                signal,
            });
        }
    }
    let _ = cpu_limit_secs;

    if !output.status.success() {
        warn!(subject = %subject.id, status = ?output.status, "snippet exited non-zero");
        return Err(SandboxError::NonZeroExit {
            subject: subject_name,
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let (_before, result_json) =
        split_result(&stdout).ok_or_else(|| SandboxError::MissingResultMarker {
            subject: subject_name.clone(),
        })?;

    let value: Value =
        serde_json::from_str(result_json).map_err(|source| SandboxError::MalformedResult {
            subject: subject_name.clone(),
            source,
        })?;

    if !value.is_object() {
        return Err(SandboxError::ResultNotAnObject {
            subject: subject_name,
        });
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_protocol::{AlgorithmBundle, ParameterBundle, SubjectId};
    use std::path::PathBuf;

    fn subject() -> SubjectFile {
        let path = PathBuf::from("/tmp/subject_a.csv");
        let id = SubjectId::from_path(&path).unwrap();
        SubjectFile { path, id }
    }

    fn fake_output(stdout: &str, success: bool) -> std::process::Output {
        use std::os::unix::process::ExitStatusExt;
        std::process::Output {
            status: std::process::ExitStatus::from_raw(if success { 0 } else { 256 }),
            stdout: stdout.as_bytes().to_vec(),
            stderr: Vec::new(),
        }
    }

    #[test]
    fn interpret_output_parses_trailing_json_object() {
        let stdout = format!(
            "chatter from snippet\n{}\n{{\"calls\": 3}}\n",
            crate::driver::RESULT_MARKER
        );
        let value = interpret_output(&subject(), fake_output(&stdout, true), 15).unwrap();
        assert_eq!(value, serde_json::json!({"calls": 3}));
    }

    #[test]
    fn interpret_output_errors_without_marker() {
        let err = interpret_output(&subject(), fake_output("no marker\n", true), 15).unwrap_err();
        assert!(matches!(err, SandboxError::MissingResultMarker { .. }));
    }

    #[test]
    fn interpret_output_errors_on_non_object_result() {
        let stdout = format!("{}\n[1, 2, 3]\n", crate::driver::RESULT_MARKER);
        let err = interpret_output(&subject(), fake_output(&stdout, true), 15).unwrap_err();
        assert!(matches!(err, SandboxError::ResultNotAnObject { .. }));
    }

    #[test]
    fn interpret_output_errors_on_nonzero_exit() {
        let err = interpret_output(&subject(), fake_output("", false), 15).unwrap_err();
        assert!(matches!(err, SandboxError::NonZeroExit { .. }));
    }

    #[test]
    fn unsafe_sandbox_defaults_to_python3_on_path() {
        let sandbox = UnsafeSandbox::new();
        assert_eq!(sandbox.interpreter, PathBuf::from("python3"));
    }

    #[test]
    fn build_program_is_used_consistently() {
        let bundle = AlgorithmBundle::new("class X:\n    def map(self, p, s):\n        return {}\n", "X");
        let params = ParameterBundle::empty();
        let program = build_program(&bundle, &params, &subject().path, true);
        assert!(program.contains("X()"));
    }
}
