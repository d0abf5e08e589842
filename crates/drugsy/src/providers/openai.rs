use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

use super::base::{Provider, Usage};
use super::configs::OpenAiProviderConfig;
use super::utils::{
    is_retryable, messages_to_openai_spec, openai_response_to_message, tools_to_openai_spec,
    MAX_ATTEMPTS, RETRY_BASE_DELAY,
};
use crate::models::message::Message;
use crate::models::tool::ToolSpec;

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn get_usage(data: &Value) -> Usage {
        let usage = &data["usage"];
        let input_tokens = usage["prompt_tokens"].as_i64().map(|v| v as i32);
        let output_tokens = usage["completion_tokens"].as_i64().map(|v| v as i32);
        let total_tokens = usage["total_tokens"]
            .as_i64()
            .map(|v| v as i32)
            .or_else(|| match (input_tokens, output_tokens) {
                (Some(input), Some(output)) => Some(input + output),
                _ => None,
            });
        Usage::new(input_tokens, output_tokens, total_tokens)
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let mut delay = RETRY_BASE_DELAY;
        for attempt in 1..=MAX_ATTEMPTS {
            let response = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.config.api_key))
                .json(&payload)
                .send()
                .await;

            match response {
                Ok(response) if response.status() == StatusCode::OK => {
                    return Ok(response.json().await?);
                }
                Ok(response) if is_retryable(response.status()) && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(status = %response.status(), attempt, "OpenAI request retrying");
                }
                Ok(response) => {
                    return Err(anyhow!("Request failed: {}", response.status()));
                }
                Err(e) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(error = %e, attempt, "OpenAI request retrying");
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
impl Provider for OpenAiProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<(Message, Usage)> {
        let system_message = json!({
            "role": "system",
            "content": system
        });

        let mut messages_array = vec![system_message];
        messages_array.extend(messages_to_openai_spec(messages));

        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_array
        });

        let body = payload.as_object_mut().expect("payload is an object");
        if !tools.is_empty() {
            body.insert("tools".to_string(), json!(tools_to_openai_spec(tools)));
        }
        if let Some(temp) = self.config.temperature {
            body.insert("temperature".to_string(), json!(temp));
        }
        if let Some(tokens) = self.config.max_tokens {
            body.insert("max_tokens".to_string(), json!(tokens));
        }

        let response = self.post(payload).await?;

        if let Some(error) = response.get("error") {
            return Err(anyhow!("OpenAI API error: {}", error));
        }

        let message = openai_response_to_message(&response)?;
        let usage = Self::get_usage(&response);

        Ok((message, usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tool::{ParamKind, ParamSpec};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup_mock_server(response_body: Value) -> (MockServer, OpenAiProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
            .mount(&mock_server)
            .await;

        let config = OpenAiProviderConfig {
            host: mock_server.uri(),
            api_key: "test_api_key".to_string(),
            model: "gpt-4o".to_string(),
            temperature: Some(0.7),
            max_tokens: None,
        };

        let provider = OpenAiProvider::new(config).unwrap();
        (mock_server, provider)
    }

    #[tokio::test]
    async fn test_complete_basic() -> Result<()> {
        let response_body = json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "Omeprazole is best taken before breakfast.",
                    "tool_calls": null
                },
                "finish_reason": "stop"
            }],
            "usage": {
                "prompt_tokens": 12,
                "completion_tokens": 15,
                "total_tokens": 27
            }
        });

        let (_server, provider) = setup_mock_server(response_body).await;

        let messages = vec![Message::user().with_text("When should I take omeprazole?")];
        let (message, usage) = provider
            .complete("You are a drug assistant.", &messages, &[])
            .await?;

        assert_eq!(message.text(), "Omeprazole is best taken before breakfast.");
        assert_eq!(usage.input_tokens, Some(12));
        assert_eq!(usage.output_tokens, Some(15));
        assert_eq!(usage.total_tokens, Some(27));

        Ok(())
    }

    #[tokio::test]
    async fn test_complete_tool_request() -> Result<()> {
        let response_body = json!({
            "id": "chatcmpl-tool",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_123",
                        "type": "function",
                        "function": {
                            "name": "drug_label",
                            "arguments": "{\"search\":\"active_ingredient:ibuprofen\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {
                "prompt_tokens": 20,
                "completion_tokens": 15,
                "total_tokens": 35
            }
        });

        let (_server, provider) = setup_mock_server(response_body).await;

        let messages = vec![Message::user().with_text("What interacts with ibuprofen?")];
        let tool = ToolSpec::new(
            "drug_label",
            "Look up an FDA drug label",
            vec![ParamSpec::required(
                "search",
                ParamKind::String,
                "field:term query",
            )],
        );

        let (message, _) = provider
            .complete("You are a drug assistant.", &messages, &[tool])
            .await?;

        let requests = message.tool_requests();
        assert_eq!(requests.len(), 1);
        let call = requests[0].call.as_ref().unwrap();
        assert_eq!(call.name, "drug_label");
        assert_eq!(
            call.arguments,
            json!({"search": "active_ingredient:ibuprofen"})
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_retries_on_server_error_then_succeeds() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "ok"}}],
                "usage": {}
            })))
            .mount(&mock_server)
            .await;

        let provider = OpenAiProvider::new(OpenAiProviderConfig {
            host: mock_server.uri(),
            api_key: "k".into(),
            model: "gpt-4o".into(),
            temperature: None,
            max_tokens: None,
        })?;

        let (message, _) = provider
            .complete("", &[Message::user().with_text("hi")], &[])
            .await?;
        assert_eq!(message.text(), "ok");
        Ok(())
    }

    #[tokio::test]
    async fn test_gives_up_after_bounded_retries() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let provider = OpenAiProvider::new(OpenAiProviderConfig {
            host: mock_server.uri(),
            api_key: "k".into(),
            model: "gpt-4o".into(),
            temperature: None,
            max_tokens: None,
        })
        .unwrap();

        let result = provider
            .complete("", &[Message::user().with_text("hi")], &[])
            .await;
        assert!(result.is_err());
    }
}
