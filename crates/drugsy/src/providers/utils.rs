use std::time::Duration;

use anyhow::{anyhow, Result};
use regex::Regex;
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::errors::ToolError;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{ToolCall, ToolSpec};

/// Attempts made against a provider before the turn is declared failed.
pub const MAX_ATTEMPTS: u32 = 3;

/// Base delay between attempts, doubled after each retryable failure.
pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Rate limits and server-side errors are worth another attempt; everything
/// else fails the call immediately.
pub fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

pub fn sanitize_function_name(name: &str) -> String {
    let re = Regex::new(r"[^a-zA-Z0-9_-]").expect("static regex");
    re.replace_all(name, "_").to_string()
}

/// Convert internal messages to OpenAI's chat message specification.
///
/// A tool request whose call failed to parse has no valid `tool_calls` entry,
/// so its error is rendered as a tool-role message instead; the paired
/// tool response carries the same id.
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        match message.role {
            Role::System => {
                messages_spec.push(json!({
                    "role": "system",
                    "content": message.text(),
                }));
            }
            Role::User => {
                messages_spec.push(json!({
                    "role": "user",
                    "content": message.text(),
                }));
            }
            Role::Assistant => {
                let mut converted = json!({"role": "assistant"});
                let mut trailing = Vec::new();
                for content in &message.content {
                    match content {
                        MessageContent::Text(text) => {
                            if !text.is_empty() {
                                converted["content"] = json!(text);
                            }
                        }
                        MessageContent::ToolRequest(request) => match &request.call {
                            Ok(call) => {
                                let tool_calls = converted
                                    .as_object_mut()
                                    .expect("assistant message is an object")
                                    .entry("tool_calls")
                                    .or_insert(json!([]));
                                tool_calls.as_array_mut().expect("tool_calls is an array").push(
                                    json!({
                                        "id": request.id,
                                        "type": "function",
                                        "function": {
                                            "name": sanitize_function_name(&call.name),
                                            "arguments": call.arguments.to_string(),
                                        }
                                    }),
                                );
                            }
                            Err(e) => {
                                trailing.push(json!({
                                    "role": "tool",
                                    "tool_call_id": request.id,
                                    "content": format!("Error: {}", e),
                                }));
                            }
                        },
                        MessageContent::ToolResponse(_) => {}
                    }
                }
                messages_spec.push(converted);
                messages_spec.extend(trailing);
            }
            Role::Tool => {
                for content in &message.content {
                    if let MessageContent::ToolResponse(response) = content {
                        let text = match &response.result {
                            Ok(text) => text.clone(),
                            Err(e) => format!("Error: {}", e),
                        };
                        messages_spec.push(json!({
                            "role": "tool",
                            "tool_call_id": response.id,
                            "content": text,
                        }));
                    }
                }
            }
        }
    }

    messages_spec
}

/// Convert tool declarations to OpenAI's function-calling specification
pub fn tools_to_openai_spec(tools: &[ToolSpec]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.json_schema(),
                }
            })
        })
        .collect()
}

/// Parse an OpenAI chat completion response into an internal message.
///
/// Malformed tool-call arguments become an `Err` tool request so the
/// conversation can surface the problem to the model instead of aborting.
pub fn openai_response_to_message(response: &Value) -> Result<Message> {
    let original = response["choices"]
        .get(0)
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| anyhow!("No message in response"))?;

    let mut message = Message::assistant();

    if let Some(text) = original.get("content").and_then(|c| c.as_str()) {
        if !text.is_empty() {
            message = message.with_text(text);
        }
    }

    if let Some(tool_calls) = original.get("tool_calls").and_then(|tc| tc.as_array()) {
        for entry in tool_calls {
            let id = entry["id"].as_str().unwrap_or_default().to_string();
            let name = entry["function"]["name"].as_str().unwrap_or_default();
            let arguments = entry["function"]["arguments"].as_str().unwrap_or("{}");
            let call = match serde_json::from_str::<Value>(arguments) {
                Ok(params) => Ok(ToolCall::new(name, params)),
                Err(e) => Err(ToolError::InvalidArguments(format!(
                    "could not parse arguments for '{}': {}",
                    name, e
                ))),
            };
            message = message.with_tool_request(id, call);
        }
    }

    Ok(message)
}
