use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment};
use drugsy::orchestrator::OrchestratorConfig;
use drugsy::providers::configs::{
    GeminiProviderConfig, OpenAiProviderConfig, ProviderConfig, GEMINI_HOST, GEMINI_MODEL,
    OPENAI_HOST, OPENAI_MODEL,
};
use drugsy::retrieval::chunk::ChunkConfig;
use drugsy::retrieval::embedding::EmbeddingConfig;
use drugsy::retrieval::engine::RagConfig;
use drugsy::retrieval::literature::PubMedConfig;
use drugsy::tools::food_data::UsdaConfig;
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port).parse().map_err(|e| {
            ConfigError::Other(config::ConfigError::Message(format!(
                "invalid server address: {}",
                e
            )))
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ProviderSettings {
    Gemini {
        #[serde(default = "default_gemini_host")]
        host: String,
        api_key: String,
        #[serde(default = "default_gemini_model")]
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<i32>,
    },
    OpenAi {
        #[serde(default = "default_openai_host")]
        host: String,
        api_key: String,
        #[serde(default = "default_openai_model")]
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<i32>,
    },
}

impl ProviderSettings {
    // Convert to the drugsy ProviderConfig
    pub fn into_config(self) -> ProviderConfig {
        match self {
            ProviderSettings::Gemini {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            } => ProviderConfig::Gemini(GeminiProviderConfig {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            }),
            ProviderSettings::OpenAi {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            } => ProviderConfig::OpenAi(OpenAiProviderConfig {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(default = "default_embeddings_host")]
    pub host: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_embeddings_model")]
    pub model: String,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        EmbeddingSettings {
            host: default_embeddings_host(),
            api_key: None,
            model: default_embeddings_model(),
        }
    }
}

impl EmbeddingSettings {
    pub fn into_config(self) -> EmbeddingConfig {
        EmbeddingConfig {
            host: self.host,
            api_key: self.api_key,
            model: self.model,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PubMedSettings {
    #[serde(default = "default_pubmed_host")]
    pub host: String,
    #[serde(default = "default_pubmed_tool")]
    pub tool: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Default for PubMedSettings {
    fn default() -> Self {
        PubMedSettings {
            host: default_pubmed_host(),
            tool: default_pubmed_tool(),
            email: None,
        }
    }
}

impl PubMedSettings {
    pub fn into_config(self) -> PubMedConfig {
        PubMedConfig {
            host: self.host,
            tool: self.tool,
            email: self.email,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UsdaSettings {
    #[serde(default = "default_usda_host")]
    pub host: String,
    #[serde(default)]
    pub api_key: String,
}

impl Default for UsdaSettings {
    fn default() -> Self {
        UsdaSettings {
            host: default_usda_host(),
            api_key: String::new(),
        }
    }
}

impl UsdaSettings {
    pub fn into_config(self) -> UsdaConfig {
        UsdaConfig {
            host: self.host,
            api_key: self.api_key,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RagSettings {
    #[serde(default = "default_max_documents")]
    pub max_documents: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_chunk_tokens")]
    pub chunk_tokens: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for RagSettings {
    fn default() -> Self {
        RagSettings {
            max_documents: default_max_documents(),
            top_k: default_top_k(),
            chunk_tokens: default_chunk_tokens(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl RagSettings {
    pub fn into_config(self) -> RagConfig {
        RagConfig {
            max_documents: self.max_documents,
            top_k: self.top_k,
            chunking: ChunkConfig {
                chunk_tokens: self.chunk_tokens,
                chunk_overlap: self.chunk_overlap,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatSettings {
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        ChatSettings {
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

impl ChatSettings {
    pub fn into_config(self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_tool_rounds: self.max_tool_rounds,
        }
    }
}

/// Static-token identity mapping, a stand-in for the real JWT verifier.
/// Requests bearing the token resolve to this caller; everything else is an
/// anonymous session.
#[derive(Debug, Deserialize)]
pub struct AuthSettings {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_caller_id")]
    pub caller_id: i64,
    #[serde(default)]
    pub caller_name: Option<String>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        AuthSettings {
            token: None,
            caller_id: default_caller_id(),
            caller_name: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    #[serde(default)]
    pub embeddings: EmbeddingSettings,
    #[serde(default)]
    pub pubmed: PubMedSettings,
    #[serde(default)]
    pub usda: UsdaSettings,
    #[serde(default)]
    pub rag: RagSettings,
    #[serde(default)]
    pub chat: ChatSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    /// Directory for durable session files; in-memory sessions if unset
    #[serde(default)]
    pub session_dir: Option<String>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("DRUGSY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);
                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_gemini_host() -> String {
    GEMINI_HOST.to_string()
}

fn default_gemini_model() -> String {
    GEMINI_MODEL.to_string()
}

fn default_openai_host() -> String {
    OPENAI_HOST.to_string()
}

fn default_openai_model() -> String {
    OPENAI_MODEL.to_string()
}

fn default_embeddings_host() -> String {
    "http://localhost:8090".to_string()
}

fn default_embeddings_model() -> String {
    "neuml/pubmedbert-base-embeddings".to_string()
}

fn default_pubmed_host() -> String {
    "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string()
}

fn default_pubmed_tool() -> String {
    "drugsy".to_string()
}

fn default_usda_host() -> String {
    "https://api.nal.usda.gov/fdc".to_string()
}

fn default_max_documents() -> usize {
    25
}

fn default_top_k() -> usize {
    5
}

fn default_chunk_tokens() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_max_tool_rounds() -> usize {
    8
}

fn default_caller_id() -> i64 {
    1
}
