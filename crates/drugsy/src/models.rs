//! The objects passed between the orchestrator, the tool registry and the
//! LLM providers.
//!
//! Each provider speaks its own wire format (OpenAI chat completions, Gemini
//! generateContent); those are converted to and from these internal structs at
//! the provider boundary so the rest of the crate never sees provider JSON.
pub mod message;
pub mod role;
pub mod tool;
