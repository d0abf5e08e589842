use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::ToolResult;
use crate::models::tool::{ParamKind, ParamSpec, ToolSpec};
use crate::registry::{CallContext, ToolHandler};
use crate::retrieval::engine::RagEngine;

/// Exposes the RAG pipeline as a tool. A totally unreachable literature index
/// surfaces as a failed tool result; the conversation itself survives.
pub struct LiteratureTool {
    engine: Arc<RagEngine>,
    spec: ToolSpec,
}

impl LiteratureTool {
    pub fn new(engine: Arc<RagEngine>) -> Self {
        let spec = ToolSpec::new(
            "search_literature",
            "Search the biomedical literature and answer a question grounded \
             in retrieved article text, citing PubMed identifiers. Use full \
             questions, for example 'omeprazole food interactions'.",
            vec![ParamSpec::required(
                "query",
                ParamKind::String,
                "the question or topic to research",
            )],
        );
        Self { engine, spec }
    }
}

#[async_trait]
impl ToolHandler for LiteratureTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, arguments: Value, _ctx: &CallContext) -> ToolResult<String> {
        let query = arguments["query"].as_str().unwrap_or_default();
        self.engine.answer(query).await
    }
}
