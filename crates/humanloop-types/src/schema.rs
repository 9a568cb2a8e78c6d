//! Declarative input schema attached to an Input Request.
//!
//! A schema maps field names to a [`FieldSpec`]. The field kind is a closed
//! enum so the validator can match it exhaustively; adding a kind without a
//! validation rule fails to compile.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Type-specific constraints of a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    String {
        #[serde(default, rename = "minLength", skip_serializing_if = "Option::is_none")]
        min_length: Option<usize>,
        #[serde(default, rename = "maxLength", skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
    },
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    Boolean,
    Array,
    Object,
}

impl FieldKind {
    /// Lowercase kind name as it appears in the `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::String { .. } => "string",
            FieldKind::Number { .. } => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Array => "array",
            FieldKind::Object => "object",
        }
    }
}

/// Descriptor of a single input field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    /// Allowed raw values, checked before sanitization.
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<serde_json::Value>>,
    /// UI label, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldSpec {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            required: false,
            allowed: None,
            label: None,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn one_of(mut self, values: Vec<serde_json::Value>) -> Self {
        self.allowed = Some(values);
        self
    }
}

/// Errors raised while parsing a schema document.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SchemaError {
    #[error("invalid descriptor for field '{field}': {reason}")]
    InvalidField { field: String, reason: String },
}

/// Mapping from field name to descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputSchema(pub BTreeMap<String, FieldSpec>);

impl InputSchema {
    /// Parse a schema from free-form JSON.
    ///
    /// `null` and non-object documents produce an empty schema, which the
    /// validator treats as a pass-through. Object documents must describe
    /// every field with a known `type`.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, SchemaError> {
        let serde_json::Value::Object(fields) = value else {
            return Ok(Self::default());
        };

        let mut specs = BTreeMap::new();
        for (name, descriptor) in fields {
            let spec: FieldSpec = serde_json::from_value(descriptor.clone()).map_err(|e| {
                SchemaError::InvalidField {
                    field: name.clone(),
                    reason: e.to_string(),
                }
            })?;
            specs.insert(name.clone(), spec);
        }
        Ok(Self(specs))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldSpec)> {
        self.0.iter()
    }

    pub fn with_field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.0.insert(name.into(), spec);
        self
    }
}
