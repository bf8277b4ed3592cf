//! Builds the synthetic driver program that is concatenated with the
//! snippet source before it is handed to the interpreter, per spec §4.2.
//!
//! The CDR parsing helper (`opal_cdr_helper.load_subject`) is an opaque
//! out-of-scope collaborator (spec §1): the driver only ever imports and
//! calls it, never implements it itself.

use opal_protocol::{AlgorithmBundle, ParameterBundle};
use std::path::Path;

/// Marker line the driver prints before the JSON result, so the executor
/// can find the result even if the snippet itself prints to stdout.
pub const RESULT_MARKER: &str = "===OPALALGO_RESULT===";

/// Build the full program text: snippet source, then the driver epilogue.
pub fn build_program(
    bundle: &AlgorithmBundle,
    params: &ParameterBundle,
    subject_path: &Path,
    dev_mode: bool,
) -> String {
    let params_json = serde_json::to_string(&params.as_value())
        .expect("ParameterBundle is always serializable JSON");
    let subject_path_literal = python_str_literal(&subject_path.to_string_lossy());
    let params_literal = python_str_literal(&params_json);

    format!(
        r#"{source}

# --- driver epilogue (generated; not part of the analyst's snippet) ---
import json as _opalalgo_json

def _opalalgo_main():
    params = _opalalgo_json.loads({params_literal})
    from opal_cdr_helper import load_subject as _opalalgo_load_subject
    subject = _opalalgo_load_subject({subject_path_literal}, describe={dev_mode})
    algorithm = {entry_name}()
    result = algorithm.map(params, subject)
    print({marker_literal})
    print(_opalalgo_json.dumps(result))

_opalalgo_main()
"#,
        source = bundle.source,
        entry_name = bundle.entry_name,
        params_literal = params_literal,
        subject_path_literal = subject_path_literal,
        dev_mode = if dev_mode { "True" } else { "False" },
        marker_literal = python_str_literal(RESULT_MARKER),
    )
}

/// Render a Rust `&str` as a Python string literal via `json.dumps`'s escaping
/// rules (valid Python syntax for any string, since Python string literals
/// accept the same escapes as JSON plus surrounding quotes).
fn python_str_literal(value: &str) -> String {
    serde_json::to_string(value).expect("&str always serializes to a JSON string")
}

/// Split the driver's stdout into (pre-marker output, JSON result text).
/// Returns `None` if the marker never appeared.
pub fn split_result(stdout: &str) -> Option<(&str, &str)> {
    let marker_pos = stdout.rfind(RESULT_MARKER)?;
    let before = &stdout[..marker_pos];
    let after = &stdout[marker_pos + RESULT_MARKER.len()..];
    Some((before, after.trim()))
}
