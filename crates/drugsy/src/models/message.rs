use chrono::Utc;

use super::role::Role;
use super::tool::ToolCall;
use crate::errors::ToolResult;

/// A tool invocation requested by the model. The call itself is a `Result`
/// because the provider may hand us arguments that fail to parse; the error
/// is carried into the conversation instead of aborting the turn.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolRequest {
    pub id: String,
    pub call: ToolResult<ToolCall>,
}

/// The outcome of executing a tool call, success text or the captured error.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolResponse {
    pub id: String,
    pub result: ToolResult<String>,
}

/// Content carried inside a message.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum MessageContent {
    Text(String),
    ToolRequest(ToolRequest),
    ToolResponse(ToolResponse),
}

impl MessageContent {
    pub fn text<S: Into<String>>(text: S) -> Self {
        MessageContent::Text(text.into())
    }

    pub fn tool_request<S: Into<String>>(id: S, call: ToolResult<ToolCall>) -> Self {
        MessageContent::ToolRequest(ToolRequest {
            id: id.into(),
            call,
        })
    }

    pub fn tool_response<S: Into<String>>(id: S, result: ToolResult<String>) -> Self {
        MessageContent::ToolResponse(ToolResponse {
            id: id.into(),
            result,
        })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_tool_request(&self) -> Option<&ToolRequest> {
        match self {
            MessageContent::ToolRequest(request) => Some(request),
            _ => None,
        }
    }

    pub fn as_tool_response(&self) -> Option<&ToolResponse> {
        match self {
            MessageContent::ToolResponse(response) => Some(response),
            _ => None,
        }
    }
}

/// A message to or from the LLM
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub role: Role,
    pub created: i64,
    pub content: Vec<MessageContent>,
}

impl Message {
    fn new(role: Role) -> Self {
        Message {
            role,
            created: Utc::now().timestamp(),
            content: Vec::new(),
        }
    }

    /// Create a new system message with the current timestamp
    pub fn system() -> Self {
        Message::new(Role::System)
    }

    /// Create a new user message with the current timestamp
    pub fn user() -> Self {
        Message::new(Role::User)
    }

    /// Create a new assistant message with the current timestamp
    pub fn assistant() -> Self {
        Message::new(Role::Assistant)
    }

    /// Create a new tool-result message with the current timestamp
    pub fn tool() -> Self {
        Message::new(Role::Tool)
    }

    /// Add any MessageContent to the message
    pub fn with_content(mut self, content: MessageContent) -> Self {
        self.content.push(content);
        self
    }

    /// Add text content to the message
    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_content(MessageContent::text(text))
    }

    /// Add a tool request to the message
    pub fn with_tool_request<S: Into<String>>(self, id: S, call: ToolResult<ToolCall>) -> Self {
        self.with_content(MessageContent::tool_request(id, call))
    }

    /// Add a tool response to the message
    pub fn with_tool_response<S: Into<String>>(self, id: S, result: ToolResult<String>) -> Self {
        self.with_content(MessageContent::tool_response(id, result))
    }

    /// All text content joined with newlines; empty string if none.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|content| content.as_text())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The tool requests carried by this message, in request order.
    pub fn tool_requests(&self) -> Vec<&ToolRequest> {
        self.content
            .iter()
            .filter_map(|content| content.as_tool_request())
            .collect()
    }
}
