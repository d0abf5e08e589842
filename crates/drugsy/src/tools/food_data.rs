use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use crate::errors::{ToolError, ToolResult};
use crate::models::tool::{ParamKind, ParamSpec, ToolSpec};
use crate::registry::{CallContext, ToolHandler};

#[derive(Debug, Clone)]
pub struct UsdaConfig {
    pub host: String,
    pub api_key: String,
}

impl Default for UsdaConfig {
    fn default() -> Self {
        UsdaConfig {
            host: "https://api.nal.usda.gov/fdc".to_string(),
            api_key: String::new(),
        }
    }
}

/// USDA FoodData Central lookup for nutritional information.
pub struct FoodDataTool {
    client: Client,
    config: UsdaConfig,
    spec: ToolSpec,
}

impl FoodDataTool {
    pub fn new(config: UsdaConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let spec = ToolSpec::new(
            "food_data",
            "Look up nutritional information for a food: description, \
             ingredients and nutrient content. The food name must be in \
             English.",
            vec![ParamSpec::required(
                "query",
                ParamKind::String,
                "name of the food to search for, in English",
            )],
        );
        Ok(Self {
            client,
            config,
            spec,
        })
    }
}

#[async_trait]
impl ToolHandler for FoodDataTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, arguments: Value, _ctx: &CallContext) -> ToolResult<String> {
        let query = arguments["query"].as_str().unwrap_or_default();
        let url = format!("{}/v1/foods/search", self.config.host.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .query(&[("api_key", self.config.api_key.as_str()), ("query", query)])
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("USDA request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ToolError::ExecutionFailed(format!(
                "USDA returned {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("USDA response unreadable: {}", e)))?;

        let Some(food) = body["foods"].get(0) else {
            return Ok(format!("No matches found for '{}'.", query));
        };

        let nutrients: serde_json::Map<String, Value> = food["foodNutrients"]
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(|nutrient| {
                        let name = nutrient["name"].as_str()?;
                        Some((name.to_string(), nutrient["amount"].clone()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let summary = json!({
            "description": food["description"],
            "fdcId": food["fdcId"],
            "dataType": food["dataType"],
            "brandOwner": food["brandOwner"],
            "ingredients": food["ingredients"],
            "nutrients": nutrients,
        });

        serde_json::to_string_pretty(&summary).map_err(|e| ToolError::ExecutionFailed(e.to_string()))
    }
}
