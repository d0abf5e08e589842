use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::{ToolError, ToolResult};

/// The JSON kinds a tool parameter may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            // i64 arguments are fine where a float is declared
            ParamKind::Number => value.is_number(),
            ParamKind::Integer => value.is_i64() || value.is_u64(),
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::Object => value.is_object(),
            ParamKind::Array => value.is_array(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
            ParamKind::Object => "object",
            ParamKind::Array => "array",
        }
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    pub description: String,
}

impl ParamSpec {
    pub fn required<N, D>(name: N, kind: ParamKind, description: D) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        ParamSpec {
            name: name.into(),
            kind,
            required: true,
            description: description.into(),
        }
    }

    pub fn optional<N, D>(name: N, kind: ParamKind, description: D) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        ParamSpec {
            name: name.into(),
            kind,
            required: false,
            description: description.into(),
        }
    }
}

/// A tool that can be used by the model.
///
/// The schema is declared statically at registration time and the same
/// declaration validates arguments at invocation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// The name of the tool, unique within a registry
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// Parameters that the tool accepts
    pub parameters: Vec<ParamSpec>,
}

impl ToolSpec {
    pub fn new<N, D>(name: N, description: D, parameters: Vec<ParamSpec>) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        ToolSpec {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Check a model-supplied argument object against this declaration.
    pub fn validate(&self, arguments: &Value) -> ToolResult<()> {
        let object = arguments.as_object().ok_or_else(|| {
            ToolError::InvalidArguments(format!(
                "arguments for '{}' must be a JSON object",
                self.name
            ))
        })?;

        for param in &self.parameters {
            match object.get(&param.name) {
                Some(value) if value.is_null() && !param.required => {}
                Some(value) => {
                    if !param.kind.matches(value) {
                        return Err(ToolError::InvalidArguments(format!(
                            "parameter '{}' of '{}' must be a {}",
                            param.name,
                            self.name,
                            param.kind.type_name()
                        )));
                    }
                }
                None if param.required => {
                    return Err(ToolError::InvalidArguments(format!(
                        "missing required parameter '{}' for '{}'",
                        param.name, self.name
                    )));
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Render the declaration as a JSON schema object for provider payloads.
    pub fn json_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for param in &self.parameters {
            properties.insert(
                param.name.clone(),
                json!({
                    "type": param.kind.type_name(),
                    "description": param.description,
                }),
            );
            if param.required {
                required.push(param.name.clone());
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// A tool call request that the registry can execute
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// The name of the tool to execute
    pub name: String,
    /// The arguments for the execution
    pub arguments: Value,
}

impl ToolCall {
    pub fn new<S: Into<String>>(name: S, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}
