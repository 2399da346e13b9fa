//! Per-field request validation from schema `validation` rules.

use crate::config::FieldRule;
use crate::error::AppError;
use crate::model::Row;
use serde_json::Value;
use std::collections::HashMap;

pub struct RequestValidator;

impl RequestValidator {
    /// Create path: every rule applies, `required` fields must be present and non-null.
    pub fn validate(row: &Row, rules: &HashMap<String, FieldRule>) -> Result<(), AppError> {
        for (field, rule) in sorted(rules) {
            match row.get(field) {
                None | Some(Value::Null) if rule.rule.required == Some(true) => {
                    return Err(AppError::Validation(format!("{} is required", field)));
                }
                Some(v) => check_field(field, v, rule)?,
                None => {}
            }
        }
        Ok(())
    }

    /// Update path: only fields present in the row are checked; a present null still violates `required`.
    pub fn validate_partial(row: &Row, rules: &HashMap<String, FieldRule>) -> Result<(), AppError> {
        for (field, rule) in sorted(rules) {
            match row.get(field) {
                Some(Value::Null) if rule.rule.required == Some(true) => {
                    return Err(AppError::Validation(format!("{} is required", field)));
                }
                Some(v) => check_field(field, v, rule)?,
                None => {}
            }
        }
        Ok(())
    }
}

/// Stable order so the first reported violation does not depend on hash order.
fn sorted(rules: &HashMap<String, FieldRule>) -> Vec<(&str, &FieldRule)> {
    let mut out: Vec<_> = rules.iter().map(|(k, v)| (k.as_str(), v)).collect();
    out.sort_by(|a, b| a.0.cmp(b.0));
    out
}

fn check_field(field: &str, v: &Value, compiled: &FieldRule) -> Result<(), AppError> {
    if v.is_null() {
        return Ok(());
    }
    let invalid = |msg: String| Err(AppError::Validation(msg));
    let rule = &compiled.rule;

    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max as usize {
                return invalid(format!("{} must be at most {} characters", field, max));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min as usize {
                return invalid(format!("{} must be at least {} characters", field, min));
            }
        }
        if let Some(re) = &compiled.pattern {
            if !re.is_match(s) {
                return invalid(format!("{} does not match required pattern", field));
            }
        }
        if rule.format.as_deref().is_some_and(|f| f.eq_ignore_ascii_case("email")) && !looks_like_email(s) {
            return invalid(format!("{} must be a valid email", field));
        }
    }

    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| loosely_equal(v, a)) {
            return invalid(format!(
                "{} must be one of: {}",
                field,
                allowed.iter().map(Value::to_string).collect::<Vec<_>>().join(", ")
            ));
        }
    }

    if let Some(n) = v.as_f64() {
        if let Some(min) = rule.minimum.filter(|min| n < *min) {
            return invalid(format!("{} must be at least {}", field, min));
        }
        if let Some(max) = rule.maximum.filter(|max| n > *max) {
            return invalid(format!("{} must be at most {}", field, max));
        }
    }
    Ok(())
}

fn looks_like_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}
