use async_trait::async_trait;
use serde_json::Value;

use crate::errors::{ToolError, ToolResult};
use crate::models::tool::{ToolCall, ToolSpec};

/// Per-request context threaded into every tool execution. Carries the
/// authenticated caller so record-scoped tools can verify ownership before
/// touching a patient record.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    pub caller_id: Option<i64>,
}

impl CallContext {
    pub fn anonymous() -> Self {
        CallContext::default()
    }

    pub fn for_caller(caller_id: i64) -> Self {
        CallContext {
            caller_id: Some(caller_id),
        }
    }
}

/// A named, schema-validated operation the model can invoke.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// The static declaration this handler was registered with.
    fn spec(&self) -> &ToolSpec;

    /// Execute with already-validated arguments. Errors are returned as
    /// values; the registry never panics on a failing tool.
    async fn call(&self, arguments: Value, ctx: &CallContext) -> ToolResult<String>;
}

/// The fixed set of tools exposed to the model. Populated once at startup,
/// read-only afterwards, shared across all conversations.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry { tools: Vec::new() }
    }

    pub fn register(&mut self, handler: Box<dyn ToolHandler>) {
        let name = handler.spec().name.clone();
        if self.tools.iter().any(|t| t.spec().name == name) {
            tracing::warn!(tool = %name, "duplicate tool registration ignored");
            return;
        }
        self.tools.push(handler);
    }

    /// Declarations for every registered tool, in registration order.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec().clone()).collect()
    }

    fn get(&self, name: &str) -> Option<&dyn ToolHandler> {
        self.tools
            .iter()
            .find(|t| t.spec().name == name)
            .map(|t| t.as_ref())
    }

    /// Look up, validate and execute a tool call. All failure modes come back
    /// as `ToolError` values so the conversation loop stays alive.
    pub async fn dispatch(&self, call: &ToolCall, ctx: &CallContext) -> ToolResult<String> {
        let handler = self
            .get(&call.name)
            .ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;
        handler.spec().validate(&call.arguments)?;
        tracing::debug!(tool = %call.name, "dispatching tool call");
        handler.call(call.arguments.clone(), ctx).await
    }
}
