//! Agent Loop Integration Tests
//!
//! Drives whole turns through `AgentLoop` with a scripted generator and an
//! in-process tool worker:
//! - finalize, retry, nudge and dispatch paths
//! - the hop bound and the loop-guard answer
//! - tool failures, unknown tools, native calls, hop timeouts
//! - the turn queue in front of a running agent

use std::sync::Arc;
use std::time::Duration;

use scribe_core::{LoopConfigBuilder, Role};
use scribe_llm::{Generation, LlmError};
use scribe_tools::compact::EMPTY_SEARCH_HINT;
use scribe_tools::prompt::{
    GENERATION_FAILURE_MESSAGE, LOOP_GUARD_MESSAGE, NO_CONTENT, RETRY_INSTRUCTION,
};
use serde_json::json;
use society_scribe::{AgentHandle, AppError, ToolInvocationResult};

use crate::support::*;

fn count_system(messages: &[scribe_core::Message], needle: &str) -> usize {
    messages
        .iter()
        .filter(|m| m.role == Role::System && m.content.contains(needle))
        .count()
}

// ============================================================================
// Finalize / retry
// ============================================================================

#[tokio::test]
async fn test_plain_answer_finalizes_in_one_hop() {
    let provider = Arc::new(ScriptedProvider::replies(vec![Generation::text(
        "Fireball is a 3rd-rank evocation.",
    )]));
    let invoker = Arc::new(MockInvoker::returning(json!({})));
    let mut agent = agent(Arc::clone(&provider), Arc::clone(&invoker), 10);
    let seeded = agent.log().len();

    let answer = agent.handle_turn("what is fireball?").await;

    assert_eq!(answer, "Fireball is a 3rd-rank evocation.");
    assert_eq!(provider.request_count(), 1);
    assert_eq!(invoker.call_count(), 0);

    let messages = agent.log().messages();
    assert_eq!(messages.len(), seeded + 2);
    assert_eq!(messages[seeded].role, Role::User);
    assert_eq!(messages[seeded].content, "what is fireball?");
    assert_eq!(messages[seeded + 1].role, Role::Assistant);

    // The generator saw the user message last
    let request = &provider.requests()[0];
    assert_eq!(request.messages.last().unwrap().content, "what is fireball?");
    assert!(request.tools.is_empty());
}

#[tokio::test]
async fn test_empty_output_finalizes_as_no_content() {
    let provider = Arc::new(ScriptedProvider::replies(vec![Generation::text("   ")]));
    let invoker = Arc::new(MockInvoker::returning(json!({})));
    let mut agent = agent(provider, invoker, 10);

    assert_eq!(agent.handle_turn("hello").await, NO_CONTENT);
    assert_eq!(agent.log().last().unwrap().content, NO_CONTENT);
}

#[tokio::test]
async fn test_malformed_call_triggers_retry_instruction() {
    let malformed = Generation::text(
        "```json\n{\"tool_call\": {\"name\": \"pf2e_db_search\", \"arguments\": \"fireball\"}}\n```",
    );
    let provider = Arc::new(ScriptedProvider::replies(vec![
        malformed,
        Generation::text("Fireball deals 6d6 fire damage."),
    ]));
    let invoker = Arc::new(MockInvoker::returning(json!({})));
    let mut agent = agent(Arc::clone(&provider), Arc::clone(&invoker), 10);

    let answer = agent.handle_turn("fireball damage?").await;

    assert_eq!(answer, "Fireball deals 6d6 fire damage.");
    assert_eq!(provider.request_count(), 2);
    assert_eq!(invoker.call_count(), 0);
    assert_eq!(count_system(agent.log().messages(), RETRY_INSTRUCTION), 1);

    // The retry instruction is the last thing the generator saw on hop two
    let second = &provider.requests()[1];
    assert_eq!(second.messages.last().unwrap().content, RETRY_INSTRUCTION);
}

#[tokio::test]
async fn test_repairable_call_is_dispatched() {
    let sloppy = Generation::text(
        "<tool_call>{'tool_call': {'name': 'pf2e_db_search', 'arguments': {'query': \u{201C}shield\u{201D},},}}</tool_call>",
    );
    let provider = Arc::new(ScriptedProvider::replies(vec![
        sloppy,
        Generation::text("Shield grants +1 AC."),
    ]));
    let invoker = Arc::new(MockInvoker::returning(empty_search("shield")));
    let mut agent = agent(provider, Arc::clone(&invoker), 10);

    assert_eq!(agent.handle_turn("shield?").await, "Shield grants +1 AC.");
    assert_eq!(
        invoker.calls(),
        vec![(SEARCH_TOOL.to_string(), json!({"query": "shield"}))]
    );
}

// ============================================================================
// Duplicate guard
// ============================================================================

#[tokio::test]
async fn test_back_to_back_duplicate_is_nudged_not_dispatched() {
    let call = fenced_call(SEARCH_TOOL, json!({"query": "fireball"}));
    let provider = Arc::new(ScriptedProvider::replies(vec![
        call.clone(),
        call,
        Generation::text("Fireball: 20-foot burst, 6d6 fire."),
    ]));
    let invoker = Arc::new(MockInvoker::returning(json!({
        "query": "fireball",
        "section": "spell",
        "results": [{"name": "Fireball", "url": "https://2e.aonprd.com/Spells.aspx?ID=119", "summary": "A roaring blast of fire."}]
    })));
    let mut agent = agent(Arc::clone(&provider), Arc::clone(&invoker), 10);

    let answer = agent.handle_turn("find fireball").await;

    assert_eq!(answer, "Fireball: 20-foot burst, 6d6 fire.");
    assert_eq!(invoker.call_count(), 1);
    assert_eq!(provider.request_count(), 3);
    let messages = agent.log().messages();
    assert_eq!(
        count_system(messages, "You just called the same tool with identical arguments again."),
        1
    );
    assert!(count_system(messages, "call pf2e_db_get ONCE") == 1);
    assert_eq!(messages_with_role(messages, Role::Tool).len(), 1);
}

#[tokio::test]
async fn test_repeating_generator_is_bounded() {
    let provider = Arc::new(ScriptedProvider::repeating(fenced_call(
        SEARCH_TOOL,
        json!({"query": "fireball"}),
    )));
    let invoker = Arc::new(MockInvoker::returning(empty_search("fireball")));
    let mut agent = agent(Arc::clone(&provider), Arc::clone(&invoker), 4);

    let answer = agent.handle_turn("find fireball").await;

    assert_eq!(answer, LOOP_GUARD_MESSAGE);
    assert_eq!(provider.request_count(), 4);
    // First attempt runs, every later identical attempt is nudged
    assert_eq!(invoker.call_count(), 1);
    assert_eq!(
        count_system(agent.log().messages(), "identical arguments again"),
        3
    );
}

#[tokio::test]
async fn test_alternating_calls_run_until_hop_bound() {
    let provider = Arc::new(ScriptedProvider::replies(vec![
        fenced_call(SEARCH_TOOL, json!({"query": "a"})),
        fenced_call(SEARCH_TOOL, json!({"query": "b"})),
        fenced_call(SEARCH_TOOL, json!({"query": "a"})),
        fenced_call(SEARCH_TOOL, json!({"query": "b"})),
        fenced_call(SEARCH_TOOL, json!({"query": "a"})),
    ]));
    let invoker = Arc::new(MockInvoker::returning(empty_search("x")));
    let mut agent = agent(Arc::clone(&provider), Arc::clone(&invoker), 5);

    assert_eq!(agent.handle_turn("loop").await, LOOP_GUARD_MESSAGE);
    assert_eq!(invoker.call_count(), 5);
    assert_no_adjacent_tool_results(agent.log().messages());
}

#[tokio::test]
async fn test_guard_resets_between_turns() {
    let call = fenced_call(SEARCH_TOOL, json!({"query": "heal"}));
    let provider = Arc::new(ScriptedProvider::replies(vec![
        call.clone(),
        Generation::text("Heal restores Hit Points."),
        call,
        Generation::text("Still Heal."),
    ]));
    let invoker = Arc::new(MockInvoker::returning(empty_search("heal")));
    let mut agent = agent(provider, Arc::clone(&invoker), 10);

    agent.handle_turn("heal?").await;
    agent.handle_turn("heal again?").await;

    assert_eq!(invoker.call_count(), 2);
}

// ============================================================================
// Hop bound
// ============================================================================

#[tokio::test]
async fn test_never_parseable_generator_stops_at_exact_hop_bound() {
    let provider = Arc::new(ScriptedProvider::repeating(Generation::text(
        "{\"tool_call\": {\"name\": 42, \"arguments\": {}}}",
    )));
    let invoker = Arc::new(MockInvoker::returning(json!({})));
    let mut agent = agent(Arc::clone(&provider), Arc::clone(&invoker), 6);

    let answer = agent.handle_turn("anything").await;

    assert_eq!(answer, LOOP_GUARD_MESSAGE);
    assert_eq!(provider.request_count(), 6);
    assert_eq!(invoker.call_count(), 0);
    assert_eq!(count_system(agent.log().messages(), RETRY_INSTRUCTION), 6);

    let last = agent.log().last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(last.content, LOOP_GUARD_MESSAGE);
}

#[tokio::test]
async fn test_single_hop_bound() {
    let provider = Arc::new(ScriptedProvider::repeating(fenced_call(
        DETAIL_TOOL,
        json!({"category": "spell", "aon_id": 119}),
    )));
    let invoker = Arc::new(MockInvoker::returning(json!({"name": "Fireball"})));
    let mut agent = agent(Arc::clone(&provider), Arc::clone(&invoker), 1);

    assert_eq!(agent.handle_turn("fireball").await, LOOP_GUARD_MESSAGE);
    assert_eq!(provider.request_count(), 1);
    assert_eq!(invoker.call_count(), 1);
}

// ============================================================================
// Dispatch failures
// ============================================================================

#[tokio::test]
async fn test_tool_error_becomes_single_error_result() {
    let provider = Arc::new(ScriptedProvider::replies(vec![
        fenced_call(SEARCH_TOOL, json!({"query": "fireball"})),
        Generation::text("The archives are unavailable right now."),
    ]));
    let invoker = Arc::new(MockInvoker::new(|call| {
        Err(AppError::tool_execution(call.name(), "database is locked"))
    }));
    let mut agent = agent(Arc::clone(&provider), Arc::clone(&invoker), 10);

    let answer = agent.handle_turn("find fireball").await;

    assert_eq!(answer, "The archives are unavailable right now.");
    let messages = agent.log().messages();
    let tool_results = messages_with_role(messages, Role::Tool);
    assert_eq!(tool_results.len(), 1);
    assert_eq!(tool_results[0].name.as_deref(), Some(SEARCH_TOOL));
    assert_eq!(
        tool_results[0].content,
        r#"{"error":"tool 'pf2e_db_search' failed: database is locked"}"#
    );

    // The call envelope precedes the result
    let idx = messages.iter().position(|m| m.role == Role::Tool).unwrap();
    assert_eq!(messages[idx - 1].role, Role::Assistant);
    assert!(messages[idx - 1].content.contains("tool_call"));
}

#[tokio::test]
async fn test_unknown_tool_gets_error_result_without_dispatch() {
    let provider = Arc::new(ScriptedProvider::replies(vec![
        fenced_call("roll_dice", json!({"dice": "2d6"})),
        Generation::text("I cannot roll dice."),
    ]));
    let invoker = Arc::new(MockInvoker::returning(json!({})));
    let mut agent = agent(Arc::clone(&provider), Arc::clone(&invoker), 10);

    assert_eq!(agent.handle_turn("roll 2d6").await, "I cannot roll dice.");
    assert_eq!(invoker.call_count(), 0);

    let messages = agent.log().messages();
    let tool_results = messages_with_role(messages, Role::Tool);
    assert_eq!(tool_results.len(), 1);
    assert!(tool_results[0].content.contains("tool 'roll_dice' failed"));
    assert!(tool_results[0].content.contains("unknown tool 'roll_dice'"));
}

#[tokio::test]
async fn test_generation_error_ends_turn_with_apology() {
    let provider = Arc::new(ScriptedProvider::new(vec![Step::Fail(LlmError::NetworkError {
        message: "connection refused".to_string(),
    })]));
    let invoker = Arc::new(MockInvoker::returning(json!({})));
    let mut agent = agent(Arc::clone(&provider), invoker, 10);

    let answer = agent.handle_turn("hello?").await;

    assert_eq!(answer, GENERATION_FAILURE_MESSAGE);
    assert!(!answer.contains("connection refused"));
    assert_eq!(provider.request_count(), 1);
    let last = agent.log().last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(last.content, GENERATION_FAILURE_MESSAGE);
}

#[tokio::test]
async fn test_hop_timeout_feeds_retry() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Step::Stall(Duration::from_secs(2), Generation::text("too late")),
        Step::Reply(Generation::text("Right on time.")),
    ]));
    let invoker = Arc::new(MockInvoker::returning(json!({})));
    let config = LoopConfigBuilder::new()
        .max_hops(3)
        .hop_timeout(Duration::from_millis(100))
        .search_tool(SEARCH_TOOL)
        .build()
        .unwrap();
    let mut agent = agent_with(Arc::clone(&provider), invoker, config);

    let answer = agent.handle_turn("quick question").await;

    assert_eq!(answer, "Right on time.");
    assert_eq!(provider.request_count(), 2);
    assert_eq!(count_system(agent.log().messages(), RETRY_INSTRUCTION), 1);
}

// ============================================================================
// Native tool calls
// ============================================================================

#[tokio::test]
async fn test_native_tool_call_is_dispatched() {
    let provider = Arc::new(
        ScriptedProvider::replies(vec![
            Generation::tool_call(DETAIL_TOOL, json!({"category": "spell", "aon_id": 119})),
            Generation::text("Fireball is a 3rd-rank spell."),
        ])
        .with_native_tools(),
    );
    let invoker = Arc::new(MockInvoker::new(|_| {
        Ok(ToolInvocationResult::text(
            r#"{"name": "Fireball", "level": 3, "url": "https://2e.aonprd.com/Spells.aspx?ID=119", "traits": ["fire"], "summary": "Boom.", "text": "A roaring blast of fire."}"#,
        ))
    }));
    let mut agent = agent(Arc::clone(&provider), Arc::clone(&invoker), 10);

    let answer = agent.handle_turn("fireball details").await;

    assert_eq!(answer, "Fireball is a 3rd-rank spell.");
    assert_eq!(
        invoker.calls(),
        vec![(DETAIL_TOOL.to_string(), json!({"category": "spell", "aon_id": 119}))]
    );

    let requests = provider.requests();
    assert_eq!(requests[0].tools.len(), 2);

    let messages = agent.log().messages();
    let idx = messages.iter().position(|m| m.role == Role::Tool).unwrap();
    let envelope: serde_json::Value = serde_json::from_str(&messages[idx - 1].content).unwrap();
    assert_eq!(envelope["tool_call"]["name"], json!(DETAIL_TOOL));
    assert!(messages[idx]
        .content
        .starts_with("detail_summary: name='Fireball' level=3"));
}

#[tokio::test]
async fn test_native_call_id_reaches_next_request() {
    let provider = Arc::new(
        ScriptedProvider::replies(vec![
            Generation::tool_call_with_id("call_42", SEARCH_TOOL, json!({"query": "fireball"})),
            Generation::text("Fireball is a spell."),
        ])
        .with_native_tools(),
    );
    let invoker = Arc::new(MockInvoker::returning(empty_search("fireball")));
    let mut agent = agent(Arc::clone(&provider), invoker, 10);

    assert_eq!(agent.handle_turn("fireball").await, "Fireball is a spell.");

    // The second generation sees the call and its answer paired by id
    let second = &provider.requests()[1].messages;
    let idx = second.iter().position(|m| m.role == Role::Tool).unwrap();
    let call = second[idx - 1].tool_call.as_ref().unwrap();
    assert_eq!(second[idx - 1].role, Role::Assistant);
    assert_eq!(call.id, "call_42");
    assert_eq!(call.name, SEARCH_TOOL);
    assert_eq!(call.arguments, json!({"query": "fireball"}));
    assert_eq!(second[idx].tool_call_id.as_deref(), Some("call_42"));
}

#[tokio::test]
async fn test_envelope_call_result_has_no_call_id() {
    let provider = Arc::new(ScriptedProvider::replies(vec![
        fenced_call(SEARCH_TOOL, json!({"query": "fireball"})),
        Generation::text("Done."),
    ]));
    let invoker = Arc::new(MockInvoker::returning(empty_search("fireball")));
    let mut agent = agent(provider, invoker, 10);

    agent.handle_turn("fireball").await;

    let messages = agent.log().messages();
    let idx = messages.iter().position(|m| m.role == Role::Tool).unwrap();
    assert!(messages[idx].tool_call_id.is_none());
    assert!(messages[idx - 1].tool_call.is_none());
}

#[tokio::test]
async fn test_native_call_with_bad_arguments_is_retried() {
    let provider = Arc::new(
        ScriptedProvider::replies(vec![
            Generation::tool_call(SEARCH_TOOL, json!(["fireball"])),
            Generation::text("Done."),
        ])
        .with_native_tools(),
    );
    let invoker = Arc::new(MockInvoker::returning(json!({})));
    let mut agent = agent(provider, Arc::clone(&invoker), 10);

    assert_eq!(agent.handle_turn("fireball").await, "Done.");
    assert_eq!(invoker.call_count(), 0);
    assert_eq!(count_system(agent.log().messages(), RETRY_INSTRUCTION), 1);
}

// ============================================================================
// Scenario: empty search results
// ============================================================================

#[tokio::test]
async fn test_fireball_empty_results_scenario() {
    let provider = Arc::new(ScriptedProvider::replies(vec![
        fenced_call(SEARCH_TOOL, json!({"query": "find fireball"})),
        fenced_call(SEARCH_TOOL, json!({"query": "fireball", "section": "spell"})),
        Generation::text("I could not find that. Did you mean the spell Fireball?"),
    ]));
    let invoker = Arc::new(MockInvoker::new(|call| {
        let query = call.arguments().get("query").cloned().unwrap_or_default();
        Ok(ToolInvocationResult::structured(
            json!({"query": query, "section": null, "results": []}),
        ))
    }));
    let mut agent = agent(Arc::clone(&provider), Arc::clone(&invoker), 10);

    let answer = agent.handle_turn("find fireball").await;

    assert_eq!(answer, "I could not find that. Did you mean the spell Fireball?");
    assert_eq!(invoker.call_count(), 2);

    // The empty-results hint reached the generator on hop two
    let second = &provider.requests()[1];
    let last = second.messages.last().unwrap();
    assert_eq!(last.role, Role::Tool);
    assert!(last
        .content
        .starts_with("search_summary: query='find fireball' section=None count=0"));
    assert!(last.content.ends_with(EMPTY_SEARCH_HINT));

    assert_no_adjacent_tool_results(agent.log().messages());
}

// ============================================================================
// Turn queue
// ============================================================================

#[tokio::test]
async fn test_turn_queue_answers_in_order_and_shuts_down() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Step::Stall(Duration::from_millis(50), Generation::text("first answer")),
        Step::Reply(Generation::text("second answer")),
    ]));
    let invoker = Arc::new(MockInvoker::returning(json!({})));
    let agent = agent(Arc::clone(&provider), Arc::clone(&invoker), 10);

    let (handle, worker) = AgentHandle::spawn(agent, 4);
    let first = handle.submit("one").await.unwrap();
    // Queued while the first turn is still generating
    let second = handle.submit("two").await.unwrap();

    assert_eq!(first.await.unwrap(), "first answer");
    assert_eq!(second.await.unwrap(), "second answer");

    let other = handle.clone();
    assert_eq!(other.ask("three").await.unwrap(), "(script exhausted)");

    drop(handle);
    drop(other);
    worker.await.unwrap();
    assert_eq!(invoker.shutdown_count(), 1);
    assert_eq!(provider.request_count(), 3);
}
