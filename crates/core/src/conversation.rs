//! Conversation Log
//!
//! Ordered, role-tagged message history for one conversation. The log is
//! append-only during a turn; `insert_at` exists for session setup, where
//! discovered context (tool catalog, categories, primer) is placed ahead of
//! later user turns.
//!
//! Invariant: two tool-result messages are never adjacent. Every tool result
//! must be preceded by an assistant or system message, and a result for a
//! native call directly follows the assistant message that carries its id.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};

/// Role of a message in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Result of a tool invocation, fed back to the generator
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool call selected natively by the backend, kept with its call id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// A single conversation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    /// Tool name, only set on tool-result messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub content: String,
    /// Native call requested by this assistant message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallRecord>,
    /// Id of the native call this tool result answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            name: None,
            content: content.into(),
            tool_call: None,
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// Assistant message that requested `call` natively.
    pub fn assistant_tool_call(content: impl Into<String>, call: ToolCallRecord) -> Self {
        Self {
            tool_call: Some(call),
            ..Self::plain(Role::Assistant, content)
        }
    }

    pub fn tool_result(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::plain(Role::Tool, content)
        }
    }

    pub fn with_tool_call_id(mut self, id: impl Into<String>) -> Self {
        self.tool_call_id = Some(id.into());
        self
    }
}

/// Ordered message history owned by a single agent loop.
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log seeded with the base system prompt.
    pub fn with_system(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(prompt)],
        }
    }

    /// Append a system, user or assistant message.
    ///
    /// Tool results carry a tool name and go through [`append_tool_result`](Self::append_tool_result).
    pub fn append(&mut self, role: Role, content: impl Into<String>) -> CoreResult<()> {
        if role == Role::Tool {
            return Err(CoreError::validation(
                "tool results must be appended with append_tool_result",
            ));
        }
        self.messages.push(Message::plain(role, content));
        Ok(())
    }

    /// Append the assistant message that requested a native tool call.
    pub fn append_tool_call(
        &mut self,
        content: impl Into<String>,
        call: ToolCallRecord,
    ) -> CoreResult<()> {
        if call.id.is_empty() {
            return Err(CoreError::validation("native tool call requires an id"));
        }
        self.messages
            .push(Message::assistant_tool_call(content, call));
        Ok(())
    }

    /// Append a tool-result message for `name`.
    pub fn append_tool_result(
        &mut self,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> CoreResult<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(CoreError::validation("tool result requires a tool name"));
        }
        if matches!(self.messages.last(), Some(last) if last.role == Role::Tool) {
            return Err(CoreError::invariant(format!(
                "tool result for '{}' would directly follow another tool result",
                name
            )));
        }
        self.messages.push(Message::tool_result(name, content));
        Ok(())
    }

    /// Append the result of the native call `call_id`.
    ///
    /// The previous message must be the assistant message carrying that id.
    pub fn append_native_tool_result(
        &mut self,
        call_id: &str,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> CoreResult<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(CoreError::validation("tool result requires a tool name"));
        }
        let answers_last = matches!(
            self.messages.last(),
            Some(Message { role: Role::Assistant, tool_call: Some(call), .. }) if call.id == call_id
        );
        if !answers_last {
            return Err(CoreError::invariant(format!(
                "tool result '{}' does not follow the assistant call that requested it",
                call_id
            )));
        }
        self.messages
            .push(Message::tool_result(name, content).with_tool_call_id(call_id));
        Ok(())
    }

    /// Insert a message at `position`, shifting everything at or after it.
    ///
    /// Positions past the end append. Returns the index the message landed at.
    pub fn insert_at(
        &mut self,
        position: usize,
        role: Role,
        content: impl Into<String>,
    ) -> CoreResult<usize> {
        if role == Role::Tool {
            return Err(CoreError::validation(
                "tool results cannot be inserted out of order",
            ));
        }
        let index = position.min(self.messages.len());
        self.messages.insert(index, Message::plain(role, content));
        Ok(index)
    }

    /// Read-only copy of the current history, in order.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of messages with the given role.
    pub fn count_role(&self, role: Role) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }
}
