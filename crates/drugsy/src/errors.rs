use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures local to a single tool invocation. These are never fatal to a
/// conversation turn: the orchestrator captures them as tool-response text so
/// the model can recover (apologize, retry with different arguments).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Literature search unavailable: {0}")]
    Retrieval(String),
}

pub type ToolResult<T> = Result<T, ToolError>;

/// Failures of the conversation loop itself. These propagate to the request
/// boundary; the caller's conversation state is left untouched so the turn
/// can be retried.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("language model request failed: {0}")]
    Upstream(anyhow::Error),

    #[error("tool-call loop exceeded {rounds} rounds")]
    ToolLoopExceeded { rounds: usize },
}
