//! Schema validator for human-supplied input payloads.
//!
//! Validation is exhaustive: every field is checked and all messages are
//! returned together. The sanitized map is only reachable through
//! [`ValidationOutcome::into_result`], so a partially sanitized payload can
//! never be persisted after a failure.

use humanloop_types::schema::{FieldKind, FieldSpec, InputSchema};
use serde_json::{Map, Value};

/// Result of validating one payload against one schema.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    errors: Vec<String>,
    sanitized: Map<String, Value>,
}

impl ValidationOutcome {
    /// `true` iff no field produced an error.
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// The sanitized payload on success, the full error list otherwise.
    pub fn into_result(self) -> Result<Map<String, Value>, Vec<String>> {
        if self.errors.is_empty() {
            Ok(self.sanitized)
        } else {
            Err(self.errors)
        }
    }
}

/// Validate and sanitize `input` against `schema`.
///
/// An empty schema passes the input through untouched. Otherwise the sanitized
/// map holds only declared fields that carried a value; missing optional
/// fields are skipped, never defaulted.
pub fn validate(input: &Map<String, Value>, schema: &InputSchema) -> ValidationOutcome {
    if schema.is_empty() {
        return ValidationOutcome {
            errors: Vec::new(),
            sanitized: input.clone(),
        };
    }

    let mut errors = Vec::new();
    let mut sanitized = Map::new();

    for (name, spec) in schema.fields() {
        if let Some(value) = validate_field(name, spec, input.get(name), &mut errors) {
            sanitized.insert(name.clone(), value);
        }
    }

    ValidationOutcome { errors, sanitized }
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn validate_field(
    name: &str,
    spec: &FieldSpec,
    value: Option<&Value>,
    errors: &mut Vec<String>,
) -> Option<Value> {
    let raw = match value {
        Some(raw) if !is_empty(value) => raw,
        _ => {
            if spec.required {
                errors.push(format!("{name} is required"));
            }
            return None;
        }
    };

    let before = errors.len();
    let sanitized = match &spec.kind {
        FieldKind::String {
            min_length,
            max_length,
        } => sanitize_string(name, raw, *min_length, *max_length, errors),
        FieldKind::Number { min, max } => sanitize_number(name, raw, *min, *max, errors),
        FieldKind::Boolean => check_shape(name, raw, raw.is_boolean(), "a boolean", errors),
        FieldKind::Array => check_shape(name, raw, raw.is_array(), "an array", errors),
        FieldKind::Object => check_shape(name, raw, raw.is_object(), "an object", errors),
    };

    if let Some(allowed) = &spec.allowed {
        if !allowed.contains(raw) {
            let choices = allowed.iter().map(display_value).collect::<Vec<_>>().join(", ");
            errors.push(format!("{name} must be one of: {choices}"));
        }
    }

    if errors.len() > before {
        None
    } else {
        sanitized
    }
}

fn sanitize_string(
    name: &str,
    raw: &Value,
    min_length: Option<usize>,
    max_length: Option<usize>,
    errors: &mut Vec<String>,
) -> Option<Value> {
    let Value::String(s) = raw else {
        errors.push(format!("{name} must be a string"));
        return None;
    };

    let trimmed = s.trim();
    let length = trimmed.chars().count();
    if let Some(min) = min_length {
        if length < min {
            errors.push(format!("{name} must be at least {min} characters"));
        }
    }
    if let Some(max) = max_length {
        if length > max {
            errors.push(format!("{name} must be at most {max} characters"));
        }
    }
    Some(Value::String(trimmed.to_string()))
}

fn sanitize_number(
    name: &str,
    raw: &Value,
    min: Option<f64>,
    max: Option<f64>,
    errors: &mut Vec<String>,
) -> Option<Value> {
    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let Some(n) = parsed.filter(|n| n.is_finite()) else {
        errors.push(format!("{name} must be a number"));
        return None;
    };

    if let Some(min) = min {
        if n < min {
            errors.push(format!("{name} must be at least {min}"));
        }
    }
    if let Some(max) = max {
        if n > max {
            errors.push(format!("{name} must be at most {max}"));
        }
    }
    number_value(n)
}

/// Integral values become JSON integers so `"30"` sanitizes to `30`, not `30.0`.
fn number_value(n: f64) -> Option<Value> {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Some(Value::from(n as i64))
    } else {
        serde_json::Number::from_f64(n).map(Value::Number)
    }
}

fn check_shape(
    name: &str,
    raw: &Value,
    matches: bool,
    expected: &str,
    errors: &mut Vec<String>,
) -> Option<Value> {
    if matches {
        Some(raw.clone())
    } else {
        errors.push(format!("{name} must be {expected}"));
        None
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(value: Value) -> InputSchema {
        InputSchema::from_value(&value).unwrap()
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn name_age_schema() -> InputSchema {
        schema(json!({
            "name": {"type": "string", "required": true, "minLength": 2},
            "age": {"type": "number", "min": 0},
        }))
    }

    #[test]
    fn valid_payload_is_trimmed_and_coerced() {
        let outcome = validate(&object(json!({"name": "Al", "age": "30"})), &name_age_schema());
        assert!(outcome.ok());
        let sanitized = outcome.into_result().unwrap();
        assert_eq!(Value::Object(sanitized), json!({"name": "Al", "age": 30}));
    }

    #[test]
    fn errors_are_collected_across_fields() {
        let outcome = validate(&object(json!({"age": -1})), &name_age_schema());
        assert!(!outcome.ok());
        let errors = outcome.into_result().unwrap_err();
        assert!(errors.contains(&"name is required".to_string()), "{errors:?}");
        assert!(errors.contains(&"age must be at least 0".to_string()), "{errors:?}");
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn strings_are_trimmed_before_length_checks() {
        let s = schema(json!({"code": {"type": "string", "minLength": 3, "maxLength": 4}}));

        let ok = validate(&object(json!({"code": "  abc  "})), &s).into_result().unwrap();
        assert_eq!(ok["code"], "abc");

        let short = validate(&object(json!({"code": " ab "})), &s).into_result().unwrap_err();
        assert_eq!(short, vec!["code must be at least 3 characters"]);

        let long = validate(&object(json!({"code": "abcde"})), &s).into_result().unwrap_err();
        assert_eq!(long, vec!["code must be at most 4 characters"]);
    }

    #[test]
    fn required_missing_is_reported_for_every_kind() {
        for kind in ["string", "number", "boolean", "array", "object"] {
            let s = schema(json!({"field": {"type": kind, "required": true}}));
            let errors = validate(&Map::new(), &s).into_result().unwrap_err();
            assert_eq!(errors, vec!["field is required"], "kind {kind}");
        }
    }

    #[test]
    fn null_and_blank_count_as_missing() {
        let s = schema(json!({"note": {"type": "string", "required": true}}));
        assert!(!validate(&object(json!({"note": null})), &s).ok());
        assert!(!validate(&object(json!({"note": "   "})), &s).ok());
    }

    #[test]
    fn optional_missing_is_skipped_not_defaulted() {
        let s = schema(json!({"nickname": {"type": "string"}, "score": {"type": "number"}}));
        let sanitized = validate(&Map::new(), &s).into_result().unwrap();
        assert!(sanitized.is_empty());
    }

    #[test]
    fn non_numeric_number_is_rejected() {
        let s = schema(json!({"age": {"type": "number"}}));
        let errors = validate(&object(json!({"age": "thirty"})), &s).into_result().unwrap_err();
        assert_eq!(errors, vec!["age must be a number"]);

        let errors = validate(&object(json!({"age": true})), &s).into_result().unwrap_err();
        assert_eq!(errors, vec!["age must be a number"]);
    }

    #[test]
    fn fractional_numbers_survive_coercion() {
        let s = schema(json!({"ratio": {"type": "number", "max": 1}}));
        let sanitized = validate(&object(json!({"ratio": "0.25"})), &s).into_result().unwrap();
        assert_eq!(sanitized["ratio"], json!(0.25));

        let errors = validate(&object(json!({"ratio": 1.5})), &s).into_result().unwrap_err();
        assert_eq!(errors, vec!["ratio must be at most 1"]);
    }

    #[test]
    fn boolean_is_not_coerced() {
        let s = schema(json!({"agree": {"type": "boolean", "required": true}}));
        let errors = validate(&object(json!({"agree": "true"})), &s).into_result().unwrap_err();
        assert_eq!(errors, vec!["agree must be a boolean"]);

        let sanitized = validate(&object(json!({"agree": false})), &s).into_result().unwrap();
        assert_eq!(sanitized["agree"], false);
    }

    #[test]
    fn array_and_object_are_shape_checked_only() {
        let s = schema(json!({
            "tags": {"type": "array"},
            "address": {"type": "object"},
        }));
        let sanitized = validate(
            &object(json!({"tags": [1, "two", null], "address": {"city": " Oslo "}})),
            &s,
        )
        .into_result()
        .unwrap();
        assert_eq!(sanitized["tags"], json!([1, "two", null]));
        assert_eq!(sanitized["address"], json!({"city": " Oslo "}));

        let errors = validate(&object(json!({"tags": {"a": 1}, "address": [1]})), &s)
            .into_result()
            .unwrap_err();
        assert!(errors.contains(&"tags must be an array".to_string()));
        assert!(errors.contains(&"address must be an object".to_string()));
    }

    #[test]
    fn enum_violation_is_reported_even_when_type_matches() {
        let s = schema(json!({"priority": {"type": "string", "enum": ["low", "high"]}}));
        let errors = validate(&object(json!({"priority": "medium"})), &s)
            .into_result()
            .unwrap_err();
        assert_eq!(errors, vec!["priority must be one of: low, high"]);

        assert!(validate(&object(json!({"priority": "low"})), &s).ok());
    }

    #[test]
    fn enum_is_checked_against_raw_value() {
        // " low " trims to "low" but the raw value is not a member.
        let s = schema(json!({"priority": {"type": "string", "enum": ["low"]}}));
        assert!(!validate(&object(json!({"priority": " low "})), &s).ok());

        let n = schema(json!({"level": {"type": "number", "enum": [1, 2]}}));
        assert!(validate(&object(json!({"level": 2})), &n).ok());
        assert!(!validate(&object(json!({"level": "2"})), &n).ok());
    }

    #[test]
    fn enum_and_type_errors_accumulate() {
        let s = schema(json!({"size": {"type": "number", "enum": [1, 2]}}));
        let errors = validate(&object(json!({"size": "big"})), &s).into_result().unwrap_err();
        assert_eq!(errors, vec!["size must be a number", "size must be one of: 1, 2"]);
    }

    #[test]
    fn empty_schema_passes_input_through() {
        let input = object(json!({"anything": "  untouched  ", "n": "5"}));
        let sanitized = validate(&input, &InputSchema::default()).into_result().unwrap();
        assert_eq!(sanitized, input);
    }

    #[test]
    fn undeclared_fields_are_dropped() {
        let s = schema(json!({"name": {"type": "string"}}));
        let sanitized = validate(&object(json!({"name": "x", "extra": 1})), &s)
            .into_result()
            .unwrap();
        assert_eq!(Value::Object(sanitized), json!({"name": "x"}));
    }
}
