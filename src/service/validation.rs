//! Payload validation from schema-declared rules. Runs before any SQL.

use crate::error::EngineError;
use crate::schema::types::ValidationRule;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

pub struct RequestValidator;

impl RequestValidator {
    /// Validate a full payload. Required fields must be present and non-null.
    pub fn validate(
        payload: &HashMap<String, Value>,
        rules: &HashMap<String, ValidationRule>,
    ) -> Result<(), EngineError> {
        for (field, rule) in rules {
            let val = payload.get(field);
            if rule.required == Some(true) && (val.is_none() || val == Some(&Value::Null)) {
                return Err(EngineError::Validation(format!("{} is required", field)));
            }
            if let Some(v) = val {
                validate_field(field, v, rule)?;
            }
        }
        Ok(())
    }

    /// Validate only the fields present (partial update). Required is not
    /// enforced for missing fields.
    pub fn validate_partial(
        payload: &HashMap<String, Value>,
        rules: &HashMap<String, ValidationRule>,
    ) -> Result<(), EngineError> {
        for (field, v) in payload {
            if let Some(rule) = rules.get(field) {
                validate_field(field, v, rule)?;
            }
        }
        Ok(())
    }
}

fn validate_field(field: &str, v: &Value, rule: &ValidationRule) -> Result<(), EngineError> {
    if v.is_null() {
        return Ok(());
    }
    if let Some(format) = &rule.format {
        validate_format(field, v, format)?;
    }
    if let Some(s) = v.as_str() {
        check_length(field, s, rule)?;
        if let Some(pattern) = &rule.pattern {
            let re = Regex::new(pattern)
                .map_err(|_| EngineError::Validation(format!("invalid pattern for {}", field)))?;
            if !re.is_match(s) {
                return Err(EngineError::Validation(format!(
                    "{} does not match required pattern",
                    field
                )));
            }
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return Err(EngineError::Validation(format!(
                "{} must be one of: {:?}",
                field,
                allowed.iter().take(5).collect::<Vec<_>>()
            )));
        }
    }
    if let Some(n) = v.as_f64() {
        check_bounds(field, n, rule)?;
    }
    Ok(())
}

fn check_length(field: &str, s: &str, rule: &ValidationRule) -> Result<(), EngineError> {
    let len = s.len() as u32;
    let out_of_range = rule.max_length.is_some_and(|max| len > max)
        || rule.min_length.is_some_and(|min| len < min);
    if out_of_range {
        return Err(EngineError::Validation(format!(
            "{} length {} outside {}..{}",
            field,
            len,
            rule.min_length.unwrap_or(0),
            rule.max_length
                .map(|m| m.to_string())
                .unwrap_or_else(|| "*".into())
        )));
    }
    Ok(())
}

fn check_bounds(field: &str, n: f64, rule: &ValidationRule) -> Result<(), EngineError> {
    let out_of_range =
        rule.minimum.is_some_and(|min| n < min) || rule.maximum.is_some_and(|max| n > max);
    if out_of_range {
        return Err(EngineError::Validation(format!(
            "{} value {} outside {}..{}",
            field,
            n,
            rule.minimum
                .map(|m| m.to_string())
                .unwrap_or_else(|| "*".into()),
            rule.maximum
                .map(|m| m.to_string())
                .unwrap_or_else(|| "*".into())
        )));
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(field: &str, v: &Value, format: &str) -> Result<(), EngineError> {
    match format.to_lowercase().as_str() {
        "email" => {
            if let Some(s) = v.as_str() {
                if !s.contains('@') || s.len() < 3 {
                    return Err(EngineError::Validation(format!(
                        "{} is not an email address",
                        field
                    )));
                }
            }
        }
        "uuid" => {
            if let Some(s) = v.as_str() {
                if uuid::Uuid::parse_str(s).is_err() {
                    return Err(EngineError::Validation(format!(
                        "{} is not a UUID",
                        field
                    )));
                }
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules() -> HashMap<String, ValidationRule> {
        let mut rules = HashMap::new();
        rules.insert(
            "email".to_string(),
            ValidationRule {
                required: Some(true),
                format: Some("email".into()),
                max_length: Some(100),
                ..Default::default()
            },
        );
        rules.insert(
            "status".to_string(),
            ValidationRule {
                allowed: Some(vec![json!("draft"), json!("published")]),
                ..Default::default()
            },
        );
        rules
    }

    fn payload(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn required_field_must_be_present() {
        let err = RequestValidator::validate(&payload(&[]), &rules()).unwrap_err();
        assert!(err.to_string().contains("email is required"));
    }

    #[test]
    fn format_and_allowed_enforced() {
        let err = RequestValidator::validate(
            &payload(&[("email", json!("nope")), ("status", json!("draft"))]),
            &rules(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("not an email address"));

        let err = RequestValidator::validate(
            &payload(&[("email", json!("a@b.c")), ("status", json!("archived"))]),
            &rules(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("must be one of"));
    }

    #[test]
    fn numeric_bounds_and_length_share_the_range_message() {
        let mut rules = HashMap::new();
        rules.insert(
            "qty".to_string(),
            ValidationRule {
                minimum: Some(1.0),
                maximum: Some(10.0),
                ..Default::default()
            },
        );
        rules.insert(
            "code".to_string(),
            ValidationRule {
                min_length: Some(3),
                ..Default::default()
            },
        );

        let err =
            RequestValidator::validate_partial(&payload(&[("qty", json!(0))]), &rules).unwrap_err();
        assert!(err.to_string().contains("qty value 0 outside 1..10"));

        let err = RequestValidator::validate_partial(&payload(&[("qty", json!(11))]), &rules)
            .unwrap_err();
        assert!(err.to_string().contains("outside 1..10"));

        let err = RequestValidator::validate_partial(&payload(&[("code", json!("ab"))]), &rules)
            .unwrap_err();
        assert!(err.to_string().contains("code length 2 outside 3..*"));

        RequestValidator::validate_partial(
            &payload(&[("qty", json!(5)), ("code", json!("abc"))]),
            &rules,
        )
        .unwrap();
    }

    #[test]
    fn partial_skips_missing_required() {
        RequestValidator::validate_partial(&payload(&[("status", json!("draft"))]), &rules())
            .unwrap();
    }
}
