use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use crate::errors::{ToolError, ToolResult};
use crate::models::tool::{ParamKind, ParamSpec, ToolSpec};
use crate::registry::{CallContext, ToolHandler};

#[derive(Debug, Clone)]
pub struct FdaConfig {
    pub host: String,
}

impl Default for FdaConfig {
    fn default() -> Self {
        FdaConfig {
            host: "https://api.fda.gov".to_string(),
        }
    }
}

/// FDA drug-label lookup. One drug per query; the model is instructed to
/// query combination questions one drug at a time.
pub struct DrugLabelTool {
    client: Client,
    config: FdaConfig,
    spec: ToolSpec,
}

impl DrugLabelTool {
    pub fn new(config: FdaConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let spec = ToolSpec::new(
            "drug_label",
            "Look up FDA label data for a drug. The search query must be in the \
             format field:term, for example 'active_ingredient:omeprazole' or \
             'brand_name:advil'. Drug names must be in English.",
            vec![ParamSpec::required(
                "search",
                ParamKind::String,
                "field:term query against the FDA label index",
            )],
        );
        Ok(Self {
            client,
            config,
            spec,
        })
    }

    fn extract_label(search: &str, data: &Value) -> Value {
        let first = |field: &str| data[field].get(0).cloned().unwrap_or(Value::Null);
        json!({
            "product": first("spl_product_data_elements"),
            "ingredient_searched": search,
            "active_ingredients": first("active_ingredient"),
            "interactions": first("drug_interactions"),
            "indications_and_usage": first("indications_and_usage"),
            "dosage_and_administration": first("dosage_and_administration"),
            "warnings": first("warnings"),
            "do_not_use": first("do_not_use"),
        })
    }
}

#[async_trait]
impl ToolHandler for DrugLabelTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, arguments: Value, _ctx: &CallContext) -> ToolResult<String> {
        let search = arguments["search"].as_str().unwrap_or_default();
        let url = format!("{}/drug/label.json", self.config.host.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .query(&[("search", search), ("limit", "1")])
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("FDA request failed: {}", e)))?;

        if !response.status().is_success() {
            // Unknown drugs come back as 404; give the model a plain answer
            // it can work with instead of an error
            return Ok(format!("No data found for {}", search));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("FDA response unreadable: {}", e)))?;

        match body["results"].get(0) {
            Some(data) => {
                let label = Self::extract_label(search, data);
                serde_json::to_string_pretty(&label)
                    .map_err(|e| ToolError::ExecutionFailed(e.to_string()))
            }
            None => Ok(format!("No data found for {}", search)),
        }
    }
}
