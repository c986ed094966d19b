//! Scenario scripts run through the executor

use crate::*;
use distkv::executor::{run_script, ScriptReport, Session};

async fn run(text: &str) -> ScriptReport {
    let engine = distkv::engine::KvManager::new(KvManagerConfig::new(BUNDLE)).unwrap();
    let mut session = Session::new(engine);
    run_script(&mut session, text).await.unwrap()
}

fn assert_passed(report: &ScriptReport) {
    let failures: Vec<String> = report
        .failures()
        .map(|s| format!("line {}: {}", s.line, s.failure.clone().unwrap_or_default()))
        .collect();
    assert!(failures.is_empty(), "{}", failures.join("\n"));
}

#[tokio::test]
async fn crud_script() {
    let report = run(include_str!("data/crud.jsonl")).await;
    assert_eq!(report.steps.len(), 31);
    assert_passed(&report);
}

#[tokio::test]
async fn sync_script() {
    let report = run(include_str!("data/sync.jsonl")).await;
    assert_passed(&report);
}

#[tokio::test]
async fn errors_are_rendered_with_codes() {
    let report = run(r#"{"target": "nobody", "method": "get", "args": ["k"]}"#).await;
    assert_eq!(report.steps.len(), 1);
    assert_eq!(report.steps[0].result["error"]["kind"], "InvalidArgument");
    assert_eq!(report.steps[0].result["error"]["code"], 401);
}
