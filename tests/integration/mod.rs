//! Integration Tests Module
//!
//! End-to-end tests for the Society Scribe agent: whole turns through the
//! agent loop with scripted fakes, and session startup against a scripted
//! MCP worker subprocess.

// Scripted provider, mock tool worker and fixtures
mod support;

// Agent loop state machine and turn queue
mod agent_loop_test;

// Session startup and teardown over the stdio bridge
mod session_test;
