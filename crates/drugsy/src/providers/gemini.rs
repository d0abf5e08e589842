use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

use super::base::{Provider, Usage};
use super::configs::GeminiProviderConfig;
use super::utils::{is_retryable, MAX_ATTEMPTS, RETRY_BASE_DELAY};
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{ToolCall, ToolSpec};

pub struct GeminiProvider {
    client: Client,
    config: GeminiProviderConfig,
}

impl GeminiProvider {
    pub fn new(config: GeminiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn get_usage(data: &Value) -> Usage {
        let metadata = &data["usageMetadata"];
        let input_tokens = metadata["promptTokenCount"].as_i64().map(|v| v as i32);
        let output_tokens = metadata["candidatesTokenCount"].as_i64().map(|v| v as i32);
        let total_tokens = metadata["totalTokenCount"].as_i64().map(|v| v as i32);
        Usage::new(input_tokens, output_tokens, total_tokens)
    }

    /// Convert internal messages to Gemini `contents`.
    ///
    /// Gemini has no tool-call ids; function responses are matched by name,
    /// so request ids are mapped back to tool names while walking the
    /// history.
    fn messages_to_gemini_spec(messages: &[Message]) -> Vec<Value> {
        let mut contents = Vec::new();
        let mut call_names: HashMap<String, String> = HashMap::new();

        for message in messages {
            let (role, mut parts) = match message.role {
                // System text is carried via systemInstruction; skip here
                Role::System => continue,
                Role::User => ("user", Vec::new()),
                Role::Assistant => ("model", Vec::new()),
                Role::Tool => ("user", Vec::new()),
            };

            for content in &message.content {
                match content {
                    MessageContent::Text(text) => {
                        if !text.is_empty() {
                            parts.push(json!({"text": text}));
                        }
                    }
                    MessageContent::ToolRequest(request) => {
                        if let Ok(call) = &request.call {
                            call_names.insert(request.id.clone(), call.name.clone());
                            parts.push(json!({
                                "functionCall": {
                                    "name": call.name,
                                    "args": call.arguments,
                                }
                            }));
                        }
                    }
                    MessageContent::ToolResponse(response) => {
                        let name = call_names
                            .get(&response.id)
                            .cloned()
                            .unwrap_or_else(|| "tool".to_string());
                        let text = match &response.result {
                            Ok(text) => text.clone(),
                            Err(e) => format!("Error: {}", e),
                        };
                        parts.push(json!({
                            "functionResponse": {
                                "name": name,
                                "response": {"content": text},
                            }
                        }));
                    }
                }
            }

            if !parts.is_empty() {
                contents.push(json!({"role": role, "parts": parts}));
            }
        }

        contents
    }

    fn tools_to_gemini_spec(tools: &[ToolSpec]) -> Value {
        let declarations: Vec<Value> = tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.json_schema(),
                })
            })
            .collect();
        json!([{"functionDeclarations": declarations}])
    }

    fn response_to_message(response: &Value) -> Result<Message> {
        let parts = response["candidates"]
            .get(0)
            .and_then(|candidate| candidate["content"]["parts"].as_array())
            .ok_or_else(|| anyhow!("No candidate content in response"))?;

        let mut message = Message::assistant();
        let mut call_index = 0usize;

        for part in parts {
            if let Some(text) = part["text"].as_str() {
                if !text.is_empty() {
                    message = message.with_text(text);
                }
            }
            if let Some(function_call) = part.get("functionCall") {
                let name = function_call["name"].as_str().unwrap_or_default();
                let args = function_call
                    .get("args")
                    .cloned()
                    .unwrap_or_else(|| json!({}));
                // Synthesize stable ids; Gemini does not issue its own
                let id = format!("call_{}", call_index);
                call_index += 1;
                message = message.with_tool_request(id, Ok(ToolCall::new(name, args)));
            }
        }

        Ok(message)
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.host.trim_end_matches('/'),
            self.config.model
        );

        let mut delay = RETRY_BASE_DELAY;
        for attempt in 1..=MAX_ATTEMPTS {
            let response = self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.config.api_key)
                .json(&payload)
                .send()
                .await;

            match response {
                Ok(response) if response.status() == StatusCode::OK => {
                    return Ok(response.json().await?);
                }
                Ok(response) if is_retryable(response.status()) && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(status = %response.status(), attempt, "Gemini request retrying");
                }
                Ok(response) => {
                    let status = response.status();
                    let error_text = response.text().await.unwrap_or_default();
                    return Err(anyhow!("Request failed: {} - {}", status, error_text));
                }
                Err(e) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(error = %e, attempt, "Gemini request retrying");
                }
                Err(e) => return Err(e.into()),
            }

            tokio::time::sleep(delay).await;
            delay *= 2;
        }
        Err(anyhow!("retries exhausted"))
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<(Message, Usage)> {
        let mut payload = json!({
            "contents": Self::messages_to_gemini_spec(messages),
        });
        let body = payload.as_object_mut().expect("payload is an object");

        if !system.is_empty() {
            body.insert(
                "systemInstruction".to_string(),
                json!({"parts": [{"text": system}]}),
            );
        }
        if !tools.is_empty() {
            body.insert("tools".to_string(), Self::tools_to_gemini_spec(tools));
        }

        let mut generation_config = serde_json::Map::new();
        if let Some(temp) = self.config.temperature {
            generation_config.insert("temperature".to_string(), json!(temp));
        }
        if let Some(tokens) = self.config.max_tokens {
            generation_config.insert("maxOutputTokens".to_string(), json!(tokens));
        }
        if !generation_config.is_empty() {
            body.insert("generationConfig".to_string(), Value::Object(generation_config));
        }

        let response = self.post(payload).await?;

        if let Some(error) = response.get("error") {
            return Err(anyhow!("Gemini API error: {}", error));
        }

        let message = Self::response_to_message(&response)?;
        let usage = Self::get_usage(&response);

        Ok((message, usage))
    }
}
