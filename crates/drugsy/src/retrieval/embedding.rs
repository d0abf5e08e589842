use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// External embedding service contract. Deterministic for identical input
/// within a process lifetime.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow!("embedding service returned no vector"))
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// An OpenAI-compatible `/v1/embeddings` endpoint
    pub host: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig {
            // A locally served biomedical embedding model by default
            host: "http://localhost:8090".to_string(),
            api_key: None,
            model: "neuml/pubmedbert-base-embeddings".to_string(),
        }
    }
}

pub struct HttpEmbeddingClient {
    client: Client,
    config: EmbeddingConfig,
}

impl HttpEmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl EmbeddingService for HttpEmbeddingClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!(
            "{}/v1/embeddings",
            self.config.host.trim_end_matches('/')
        );
        let mut request = self.client.post(&url).json(&json!({
            "model": self.config.model,
            "input": texts,
        }));
        if let Some(api_key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("embedding request failed: {}", response.status()));
        }
        let body: Value = response.json().await?;

        let data = body["data"]
            .as_array()
            .ok_or_else(|| anyhow!("no data in embedding response"))?;

        // Responses carry an index per entry; order by it rather than
        // trusting response order
        let mut vectors: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
        for entry in data {
            let index = entry["index"].as_u64().unwrap_or(vectors.len() as u64) as usize;
            let vector: Vec<f32> = entry["embedding"]
                .as_array()
                .ok_or_else(|| anyhow!("malformed embedding entry"))?
                .iter()
                .filter_map(|v| v.as_f64().map(|f| f as f32))
                .collect();
            vectors.push((index, vector));
        }
        vectors.sort_by_key(|(index, _)| *index);

        if vectors.len() != texts.len() {
            return Err(anyhow!(
                "embedding service returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            ));
        }

        Ok(vectors.into_iter().map(|(_, vector)| vector).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn embeds_a_batch_in_input_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(body_partial_json(json!({
                "model": "neuml/pubmedbert-base-embeddings"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"index": 1, "embedding": [0.0, 1.0]},
                    {"index": 0, "embedding": [1.0, 0.0]}
                ]
            })))
            .mount(&server)
            .await;

        let client = HttpEmbeddingClient::new(EmbeddingConfig {
            host: server.uri(),
            api_key: None,
            model: "neuml/pubmedbert-base-embeddings".into(),
        })
        .unwrap();

        let vectors = client
            .embed_batch(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn single_embed_goes_through_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"index": 0, "embedding": [0.5, 0.5]}]
            })))
            .mount(&server)
            .await;

        let client = HttpEmbeddingClient::new(EmbeddingConfig {
            host: server.uri(),
            api_key: None,
            model: "m".into(),
        })
        .unwrap();

        let vector = client.embed("query").await.unwrap();
        assert_eq!(vector, vec![0.5, 0.5]);
    }

    #[tokio::test]
    async fn count_mismatch_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let client = HttpEmbeddingClient::new(EmbeddingConfig {
            host: server.uri(),
            api_key: None,
            model: "m".into(),
        })
        .unwrap();

        assert!(client.embed_batch(&["text".to_string()]).await.is_err());
    }

    #[tokio::test]
    async fn empty_batch_skips_the_network() {
        // No mock server at all; an empty input must not issue a request
        let client = HttpEmbeddingClient::new(EmbeddingConfig {
            host: "http://127.0.0.1:1".into(),
            api_key: None,
            model: "m".into(),
        })
        .unwrap();
        assert!(client.embed_batch(&[]).await.unwrap().is_empty());
    }
}
