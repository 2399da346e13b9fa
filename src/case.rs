//! Case conversion between row field names (camelCase) and JSON-API member names (dash-case),
//! plus resource type naming.

/// Convert an identifier from dash-case or snake_case to camelCase. The first character is lowercased.
/// e.g. "user-group" -> "userGroup", "created_at" -> "createdAt", "UserGroup" -> "userGroup"
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = false;
    for (i, c) in s.chars().enumerate() {
        if c == '_' || c == '-' {
            capitalize_next = !out.is_empty();
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else if i == 0 {
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert an identifier from camelCase to dash-case.
/// e.g. "userGroup" -> "user-group", "createdAt" -> "created-at"
pub fn to_kebab_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.extend(c.to_lowercase());
        } else if c == '_' {
            out.push('-');
        } else {
            out.push(c);
        }
    }
    out
}

/// JSON-API resource type for a model name: dash-cased, last segment pluralized.
/// e.g. "userGroup" -> "user-groups", "user" -> "users"
pub fn resource_type(model_name: &str) -> String {
    let kebab = to_kebab_case(model_name);
    match kebab.rsplit_once('-') {
        Some((head, tail)) => format!("{}-{}", head, pluralizer::pluralize(tail, 2, false)),
        None => pluralizer::pluralize(&kebab, 2, false),
    }
}
