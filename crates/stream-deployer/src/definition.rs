//! Stream definitions and the templates that carry them.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::DeployError;

pub const DEFAULT_STREAM_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttributeType {
    #[serde(alias = "int")]
    Int,
    #[serde(alias = "long")]
    Long,
    #[serde(alias = "float")]
    Float,
    #[serde(alias = "double")]
    Double,
    #[serde(alias = "bool")]
    Bool,
    #[serde(alias = "string")]
    String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
}

/// A named, versioned event stream schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDefinition {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nick_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub meta_data: Vec<Attribute>,
    #[serde(default)]
    pub correlation_data: Vec<Attribute>,
    #[serde(default)]
    pub payload_data: Vec<Attribute>,
}

fn default_version() -> String {
    DEFAULT_STREAM_VERSION.to_string()
}

impl StreamDefinition {
    /// Parse and validate a JSON stream definition.
    pub fn from_json(json: &str) -> Result<Self, DeployError> {
        let definition: Self = serde_json::from_str(json)?;
        definition.validate()?;
        Ok(definition)
    }

    /// `<name>:<version>`
    pub fn stream_id(&self) -> String {
        format!("{}:{}", self.name, self.version)
    }

    fn validate(&self) -> Result<(), DeployError> {
        if self.name.trim().is_empty() {
            return Err(DeployError::malformed("stream name is empty"));
        }
        if self.version.trim().is_empty() {
            return Err(DeployError::malformed("stream version is empty"));
        }
        for (section, attributes) in [
            ("metaData", &self.meta_data),
            ("correlationData", &self.correlation_data),
            ("payloadData", &self.payload_data),
        ] {
            let mut seen = HashSet::new();
            for attribute in attributes {
                if attribute.name.trim().is_empty() {
                    return Err(DeployError::malformed(format!("{section} has an unnamed attribute")));
                }
                if !seen.insert(attribute.name.as_str()) {
                    return Err(DeployError::malformed(format!(
                        "{section} defines '{}' more than once",
                        attribute.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// An artifact produced from a template configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployableTemplate {
    pub artifact_id: String,
    /// Stream definition as JSON.
    pub artifact: String,
    pub domain: String,
}

impl DeployableTemplate {
    pub fn new(artifact_id: impl Into<String>, artifact: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            artifact_id: artifact_id.into(),
            artifact: artifact.into(),
            domain: domain.into(),
        }
    }

    pub fn stream_definition(&self) -> Result<StreamDefinition, DeployError> {
        StreamDefinition::from_json(&self.artifact)
    }
}
