use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::errors::{ToolError, ToolResult};
use crate::models::tool::{ParamKind, ParamSpec, ToolSpec};
use crate::registry::{CallContext, ToolHandler};

/// A disease-risk estimate produced by an external model.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    /// e.g. "elevated risk" / "low risk"
    pub outcome: String,
    /// Probability of the positive class, 0.0..=1.0
    pub probability: f64,
}

/// External risk-model contract. Model internals (training, feature
/// engineering) live with the collaborator; the core only dispatches by name.
pub trait RiskModel: Send + Sync {
    /// The condition this model scores, e.g. "diabetes"
    fn name(&self) -> &str;

    fn predict(&self, features: &Value) -> anyhow::Result<RiskAssessment>;
}

/// Dispatches risk predictions to the registered models.
pub struct RiskTool {
    models: Vec<Arc<dyn RiskModel>>,
    spec: ToolSpec,
}

impl RiskTool {
    pub fn new(models: Vec<Arc<dyn RiskModel>>) -> Self {
        let names: Vec<&str> = models.iter().map(|m| m.name()).collect();
        let spec = ToolSpec::new(
            "predict_risk",
            format!(
                "Estimate a patient's risk for a condition from structured \
                 features. Available models: {}.",
                names.join(", ")
            ),
            vec![
                ParamSpec::required(
                    "model",
                    ParamKind::String,
                    "which condition to score, one of the available models",
                ),
                ParamSpec::required(
                    "features",
                    ParamKind::Object,
                    "model input features as named values",
                ),
            ],
        );
        Self { models, spec }
    }
}

#[async_trait]
impl ToolHandler for RiskTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, arguments: Value, _ctx: &CallContext) -> ToolResult<String> {
        let name = arguments["model"].as_str().unwrap_or_default();
        let model = self
            .models
            .iter()
            .find(|model| model.name() == name)
            .ok_or_else(|| {
                ToolError::InvalidArguments(format!(
                    "unknown risk model '{}'; available: {}",
                    name,
                    self.models
                        .iter()
                        .map(|m| m.name())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })?;

        let assessment = model
            .predict(&arguments["features"])
            .map_err(|e| ToolError::ExecutionFailed(format!("risk prediction failed: {}", e)))?;

        let summary = json!({
            "model": name,
            "outcome": assessment.outcome,
            "probability": assessment.probability,
        });
        serde_json::to_string(&summary).map_err(|e| ToolError::ExecutionFailed(e.to_string()))
    }
}
