use serde::{Deserialize, Serialize};

/// Who a message in a conversation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Carries tool execution results back to the model.
    Tool,
}
