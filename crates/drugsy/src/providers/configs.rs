// Unified enum to wrap different provider configurations
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    Gemini(GeminiProviderConfig),
    OpenAi(OpenAiProviderConfig),
}

#[derive(Debug, Clone)]
pub struct GeminiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

pub const GEMINI_HOST: &str = "https://generativelanguage.googleapis.com";
pub const GEMINI_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

pub const OPENAI_HOST: &str = "https://api.openai.com";
pub const OPENAI_MODEL: &str = "gpt-4o";
