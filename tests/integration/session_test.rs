//! Session Integration Tests
//!
//! Full startup against a scripted MCP worker subprocess:
//! - handshake, discovery and log seeding (tools, categories, primer)
//! - a dispatched turn through the real stdio bridge
//! - teardown through the turn queue
//!
//! Skipped when no `python3` interpreter is available.

use std::io::Write;
use std::sync::Arc;

use scribe_core::Role;
use scribe_llm::Generation;
use serde_json::json;
use society_scribe::{AppConfig, AppError, BridgeState, Session};

use crate::support::*;

const RULES_WORKER: &str = r#"
import json, sys

TOOLS = [
    {"name": "pf2e_db_search", "description": "Search the rules",
     "inputSchema": {"type": "object", "properties": {"query": {"type": "string"}}, "required": ["query"]}},
    {"name": "pf2e_db_get", "description": "Fetch one entry",
     "inputSchema": {"type": "object", "properties": {"aon_id": {"type": "integer"}}}},
]

for line in sys.stdin:
    msg = json.loads(line)
    if "id" not in msg:
        continue
    rid, method = msg["id"], msg.get("method")
    if method == "initialize":
        result = {"protocolVersion": "2024-11-05", "capabilities": {}, "serverInfo": {"name": "rules"}}
    elif method == "tools/list":
        result = {"tools": TOOLS}
    elif method == "tools/call":
        query = msg["params"]["arguments"].get("query")
        payload = {"query": query, "section": "spell", "results": [
            {"name": "Fireball", "url": "https://2e.aonprd.com/Spells.aspx?ID=119", "summary": "A roaring blast of fire."}]}
        result = {"content": [{"type": "text", "text": json.dumps(payload)}]}
    else:
        result = {}
    sys.stdout.write(json.dumps({"jsonrpc": "2.0", "id": rid, "result": result}) + "\n")
    sys.stdout.flush()
"#;

fn python_available() -> bool {
    std::process::Command::new("python3")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn worker_config(dir: &tempfile::TempDir) -> AppConfig {
    let script = dir.path().join("rules_worker.py");
    std::fs::File::create(&script)
        .unwrap()
        .write_all(RULES_WORKER.as_bytes())
        .unwrap();

    let db_path = dir.path().join("pf2e.db");
    let conn = rusqlite::Connection::open(&db_path).unwrap();
    conn.execute_batch(
        "CREATE TABLE docs (id INTEGER PRIMARY KEY, category TEXT);
         INSERT INTO docs (category) VALUES ('spell'), ('spell'), ('feat');",
    )
    .unwrap();

    let mut config = AppConfig::default();
    config.tool_worker.command = "python3".to_string();
    config.tool_worker.args = vec![script.display().to_string()];
    config.tool_worker.startup_timeout_secs = 20;
    config.tool_worker.request_timeout_secs = 20;
    config.catalog.db_path = Some(db_path);
    config.agent.max_hops = 5;
    config
}

#[tokio::test]
async fn test_session_start_seeds_log_and_dispatches() {
    if !python_available() {
        eprintln!("python3 not available; skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(worker_config(&dir));
    let provider = Arc::new(ScriptedProvider::replies(vec![
        fenced_call(SEARCH_TOOL, json!({"query": "fireball"})),
        Generation::text("Fireball is a roaring blast of fire."),
    ]));

    let mut session = Session::start(Arc::clone(&config), provider)
        .await
        .unwrap();
    let bridge = session.bridge();
    assert_eq!(bridge.state(), BridgeState::Ready);
    assert_eq!(session.agent().catalog().len(), 2);

    let seeded: Vec<String> = session
        .agent()
        .log()
        .messages()
        .iter()
        .map(|m| m.content.clone())
        .collect();
    assert_eq!(seeded.len(), 4);
    assert!(seeded[1].starts_with("Available MCP tools:"));
    assert_eq!(seeded[2], "Known PF2e sections (categories): spell, feat");

    let answer = session.handle_turn("find fireball").await;
    assert_eq!(answer, "Fireball is a roaring blast of fire.");

    let messages = session.agent().log().messages();
    let tool_result = messages.iter().find(|m| m.role == Role::Tool).unwrap();
    assert!(tool_result
        .content
        .starts_with("search_summary: query='fireball' section='spell' count=1\n1. Fireball"));

    session.shutdown().await;
    assert_eq!(bridge.state(), BridgeState::Closed);
}

#[tokio::test]
async fn test_turn_queue_closes_bridge_on_drop() {
    if !python_available() {
        eprintln!("python3 not available; skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(worker_config(&dir));
    let provider = Arc::new(ScriptedProvider::replies(vec![Generation::text("Hello, Pathfinder.")]));

    let session = Session::start(config, provider).await.unwrap();
    let bridge = session.bridge();
    let (handle, worker) = session.into_handle();

    assert_eq!(handle.ask("hi").await.unwrap(), "Hello, Pathfinder.");
    drop(handle);
    worker.await.unwrap();
    assert_eq!(bridge.state(), BridgeState::Closed);
}

#[tokio::test]
async fn test_worker_that_never_answers_fails_startup() {
    if !python_available() {
        eprintln!("python3 not available; skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("silent.py");
    std::fs::write(&script, "import time\ntime.sleep(60)\n").unwrap();

    let mut config = AppConfig::default();
    config.tool_worker.command = "python3".to_string();
    config.tool_worker.args = vec![script.display().to_string()];
    config.tool_worker.startup_timeout_secs = 1;
    config.catalog.db_path = None;

    let provider = Arc::new(ScriptedProvider::replies(Vec::new()));
    let err = Session::start(Arc::new(config), provider).await.err().unwrap();
    assert!(matches!(err, AppError::BridgeStart(_)));
}
