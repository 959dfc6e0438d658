//! # Schema Processor
//!
//! Validates and enriches raw caller input against a workflow template's
//! JSON Schema (draft-07).
//!
//! Processing order:
//! 1. Parse the raw input. Empty input is treated as `{}`.
//! 2. Fill `default` values for omitted properties, recursing into nested
//!    objects and array items that are present in the input.
//! 3. Validate the enriched document and report every violation with its
//!    field path and the violated constraint keyword.
//!
//! Fields the schema does not describe pass through untouched unless strict
//! mode is enabled. Numbers keep the exact digits the caller sent, including
//! integers beyond 64 bits and decimals finer than `f64`.

use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, JSONSchema, ValidationError};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// One field-level schema failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaViolation {
    /// JSON Pointer to the offending field (`/customer/email`); `/` for the root
    pub path: String,
    /// Schema keyword that failed (`required`, `type`, `minimum`, ...)
    pub constraint: String,
    pub message: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} violates '{}': {}", self.path, self.constraint, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Input does not match schema: {}", join_violations(.0))]
    Violations(Vec<SchemaViolation>),

    #[error("Template input schema is invalid: {0}")]
    InvalidSchema(String),

    #[error("Input is not valid JSON: {0}")]
    MalformedInput(String),
}

impl SchemaError {
    pub fn violations(&self) -> &[SchemaViolation] {
        match self {
            Self::Violations(violations) => violations,
            _ => &[],
        }
    }
}

fn join_violations(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, Default)]
pub struct SchemaProcessor {
    strict: bool,
}

impl SchemaProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject fields not declared in an object schema's `properties`
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Finalize raw input for a template. Without a schema the parsed input
    /// is returned unchanged.
    pub fn process(&self, raw_input: &str, schema: Option<&Value>) -> Result<Value, SchemaError> {
        match schema {
            Some(schema) => self.validate(raw_input, schema),
            None => parse_input(raw_input),
        }
    }

    /// Parse, enrich with defaults and validate `raw_input` against `schema`
    pub fn validate(&self, raw_input: &str, schema: &Value) -> Result<Value, SchemaError> {
        let mut instance = parse_input(raw_input)?;

        let effective_schema = if self.strict {
            let mut tightened = schema.clone();
            forbid_undeclared_properties(&mut tightened);
            tightened
        } else {
            schema.clone()
        };

        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&effective_schema)
            .map_err(|e| SchemaError::InvalidSchema(e.to_string()))?;

        apply_defaults(&effective_schema, &mut instance);

        let violations: Vec<SchemaViolation> = match compiled.validate(&instance) {
            Ok(()) => Vec::new(),
            Err(errors) => errors.flat_map(violations_from).collect(),
        };

        if violations.is_empty() {
            Ok(instance)
        } else {
            debug!(
                violation_count = violations.len(),
                first_path = %violations[0].path,
                "Input rejected by schema"
            );
            Err(SchemaError::Violations(violations))
        }
    }
}

fn parse_input(raw_input: &str) -> Result<Value, SchemaError> {
    if raw_input.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_str(raw_input).map_err(|e| SchemaError::MalformedInput(e.to_string()))
}

fn violations_from(error: ValidationError<'_>) -> Vec<SchemaViolation> {
    let base_path = error.instance_path.to_string();
    let schema_path = error.schema_path.to_string();
    let constraint = schema_path
        .rsplit('/')
        .next()
        .filter(|keyword| !keyword.is_empty())
        .unwrap_or("schema")
        .to_string();
    let message = error.to_string().replace('\n', " ");

    match &error.kind {
        ValidationErrorKind::Required { property } => {
            let name = property
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| property.to_string());
            vec![SchemaViolation {
                path: child_path(&base_path, &name),
                constraint: "required".to_string(),
                message,
            }]
        }
        ValidationErrorKind::AdditionalProperties { unexpected } => unexpected
            .iter()
            .map(|name| SchemaViolation {
                path: child_path(&base_path, name),
                constraint: "additionalProperties".to_string(),
                message: format!("field '{name}' is not allowed by the schema"),
            })
            .collect(),
        _ => vec![SchemaViolation {
            path: normalize_path(base_path),
            constraint,
            message,
        }],
    }
}

fn child_path(parent: &str, name: &str) -> String {
    let escaped = name.replace('~', "~0").replace('/', "~1");
    format!("{parent}/{escaped}")
}

fn normalize_path(path: String) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path
    }
}

/// Fill `default`s for omitted properties and recurse into present children
fn apply_defaults(schema: &Value, instance: &mut Value) {
    match instance {
        Value::Object(fields) => {
            let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
                return;
            };
            for (name, property_schema) in properties {
                if !fields.contains_key(name) {
                    if let Some(default) = property_schema.get("default") {
                        fields.insert(name.clone(), default.clone());
                    }
                }
                if let Some(child) = fields.get_mut(name) {
                    apply_defaults(property_schema, child);
                }
            }
        }
        Value::Array(items) => match schema.get("items") {
            Some(item_schema @ Value::Object(_)) => {
                for item in items.iter_mut() {
                    apply_defaults(item_schema, item);
                }
            }
            Some(Value::Array(tuple_schemas)) => {
                for (item, item_schema) in items.iter_mut().zip(tuple_schemas) {
                    apply_defaults(item_schema, item);
                }
            }
            _ => {}
        },
        _ => {}
    }
}

/// Add `additionalProperties: false` to every object schema that declares
/// `properties` and leaves `additionalProperties` unspecified
fn forbid_undeclared_properties(schema: &mut Value) {
    let Value::Object(node) = schema else {
        return;
    };

    if node.contains_key("properties") && !node.contains_key("additionalProperties") {
        node.insert("additionalProperties".to_string(), Value::Bool(false));
    }

    if let Some(Value::Object(properties)) = node.get_mut("properties") {
        for property_schema in properties.values_mut() {
            forbid_undeclared_properties(property_schema);
        }
    }
    match node.get_mut("items") {
        Some(Value::Array(tuple)) => tuple.iter_mut().for_each(forbid_undeclared_properties),
        Some(item_schema) => forbid_undeclared_properties(item_schema),
        None => {}
    }
}
