//! End-to-end checks of the startup path through the real binary.

use std::path::Path;
use std::process::{Command, Output, Stdio};

const TREE: &str = r#"[
    {
        "nodeId": "node1",
        "prompt": "Are you John?",
        "edges": [{ "condition": "user is John", "targetNodeId": "node2" }]
    },
    { "nodeId": "node2", "prompt": "Welcome back!", "edges": [] }
]"#;

fn flowchat(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_flowchat"))
        .args(args)
        .current_dir(dir)
        .env_remove("GEMINI_API_KEY")
        .env_remove("FLOWCHAT_TREE")
        .env_remove("FLOWCHAT_ROOT")
        .env("RUST_LOG", "off")
        .stdin(Stdio::null())
        .output()
        .expect("failed to run flowchat")
}

#[test]
fn invalid_tree_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("conversation_tree.json"), "[{ \"nodeId\": ").unwrap();

    let out = flowchat(dir.path(), &[]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("invalid JSON"), "stderr: {stderr}");
    // No prompt was ever shown.
    assert!(!String::from_utf8_lossy(&out.stdout).contains("AI:"));
}

#[test]
fn missing_tree_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let out = flowchat(dir.path(), &["check"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("not found"));
}

#[test]
fn missing_api_key_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("conversation_tree.json"), TREE).unwrap();

    let out = flowchat(dir.path(), &["chat"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("GEMINI_API_KEY"), "stderr: {stderr}");
    assert!(!String::from_utf8_lossy(&out.stdout).contains("AI:"));
}

#[test]
fn unknown_root_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("conversation_tree.json"), TREE).unwrap();

    let out = flowchat(dir.path(), &["check", "--root", "node7"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("node7"));
}

#[test]
fn check_reports_tree_structure() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("flow.json"), TREE).unwrap();

    let out = flowchat(dir.path(), &["check", "--tree", "flow.json"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Root        : node1"));
    assert!(stdout.contains("2 reachable"));
    assert!(stdout.contains("OK"));
}
