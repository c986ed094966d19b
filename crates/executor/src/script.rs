//! JSON-lines scenario scripts
//!
//! One invocation per line. Blank lines and lines starting with `#` or `//`
//! are skipped. A line may carry an `expect` member:
//!
//! ```json
//! {"target": "s", "method": "get", "args": ["k"], "expect": {"ok": {"type": 0, "value": "v"}}}
//! {"target": "s", "method": "get", "args": ["gone"], "expect": {"error": "NotFound"}}
//! ```
//!
//! An `ok` expectation compares the JSON rendering of the output; an
//! `error` expectation compares the error kind.

use distkv_core::{Error, Result};
use distkv_wire::encode_error;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};
use tracing::debug;

use crate::command::Invocation;
use crate::session::Session;

/// Expected outcome of a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expectation {
    /// The step succeeds with this JSON output
    Ok(Json),
    /// The step fails with this error kind (`"NotFound"`, ...)
    Error(String),
}

/// One parsed script line
#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    /// The call
    #[serde(flatten)]
    pub invocation: Invocation,
    /// What the call should produce
    #[serde(default)]
    pub expect: Option<Expectation>,
}

/// Outcome of one executed step
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// 1-based line number
    pub line: usize,
    /// `{"ok": ...}` or `{"error": {"code", "kind", "message"}}`
    pub result: Json,
    /// Mismatch against the step's expectation, if any
    pub failure: Option<String>,
}

/// Outcome of a whole script
#[derive(Debug, Clone, Default)]
pub struct ScriptReport {
    /// Executed steps in order
    pub steps: Vec<StepOutcome>,
}

impl ScriptReport {
    /// Steps whose expectation did not hold
    pub fn failures(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|s| s.failure.is_some())
    }

    /// True if every expectation held
    pub fn passed(&self) -> bool {
        self.failures().next().is_none()
    }
}

fn is_comment(line: &str) -> bool {
    line.is_empty() || line.starts_with('#') || line.starts_with("//")
}

/// Parse a script without running it
///
/// # Errors
///
/// Returns `Serialization` naming the first malformed line.
pub fn parse_script(text: &str) -> Result<Vec<(usize, Step)>> {
    let mut steps = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if is_comment(line) {
            continue;
        }
        let step: Step = serde_json::from_str(line)
            .map_err(|e| Error::Serialization(format!("line {}: {}", i + 1, e)))?;
        steps.push((i + 1, step));
    }
    Ok(steps)
}

fn check(expect: &Expectation, outcome: &Result<Json>) -> Option<String> {
    match (expect, outcome) {
        (Expectation::Ok(want), Ok(got)) if want == got => None,
        (Expectation::Ok(want), Ok(got)) => Some(format!("expected {}, got {}", want, got)),
        (Expectation::Ok(_), Err(e)) => Some(format!("expected success, got {}", e)),
        (Expectation::Error(kind), Err(e)) if e.kind_name() == kind.as_str() => None,
        (Expectation::Error(kind), Err(e)) => Some(format!("expected {}, got {}", kind, e.kind_name())),
        (Expectation::Error(kind), Ok(got)) => Some(format!("expected {}, got {}", kind, got)),
    }
}

/// Run a script through a session
///
/// Failing steps do not stop the script; their errors are part of the
/// report. Only a malformed script is an error.
pub async fn run_script(session: &mut Session, text: &str) -> Result<ScriptReport> {
    let steps = parse_script(text)?;
    let mut report = ScriptReport::default();
    for (line, step) in steps {
        let outcome = session.invoke(&step.invocation).await.map(|out| out.to_json());
        debug!(line, target = %step.invocation.target, method = %step.invocation.method, ok = outcome.is_ok(), "step");
        let failure = step.expect.as_ref().and_then(|e| check(e, &outcome));
        let result = match &outcome {
            Ok(v) => json!({ "ok": v }),
            Err(e) => json!({ "error": encode_error(e) }),
        };
        report.steps.push(StepOutcome { line, result, failure });
    }
    Ok(report)
}
