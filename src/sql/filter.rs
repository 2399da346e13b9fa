//! Row filters (`where`) and ordering (`orderBy`) expressed in field names.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Equality filter over row fields. An array value means "any of", `null` means IS NULL.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter(Map<String, Value>);

impl Filter {
    pub fn new() -> Self {
        Filter(Map::new())
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    pub fn by_id(id_field: &str, id: &Value) -> Self {
        Filter::new().eq(id_field, id.clone())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<Map<String, Value>> for Filter {
    fn from(m: Map<String, Value>) -> Self {
        Filter(m)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: &str) -> Self {
        OrderBy {
            field: field.to_string(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: &str) -> Self {
        OrderBy {
            field: field.to_string(),
            direction: Direction::Desc,
        }
    }
}

fn order_grammar() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*[a-z_][a-z0-9_]*(\s+(asc|desc))?(\s+[a-z_][a-z0-9_]*(\s+(asc|desc))?)*\s*$")
            .unwrap_or_else(|e| unreachable!("order grammar: {}", e))
    })
}

/// Parse `name[ ASC|DESC]` repeated, space separated. Anything else yields no ordering.
pub fn parse_order(input: &str) -> Vec<OrderBy> {
    if !order_grammar().is_match(input) {
        tracing::debug!(order = %input, "ignoring malformed order");
        return Vec::new();
    }
    let mut out: Vec<OrderBy> = Vec::new();
    for token in input.split_whitespace() {
        if token.eq_ignore_ascii_case("asc") || token.eq_ignore_ascii_case("desc") {
            if let Some(last) = out.last_mut() {
                last.direction = if token.eq_ignore_ascii_case("desc") {
                    Direction::Desc
                } else {
                    Direction::Asc
                };
                continue;
            }
        }
        out.push(OrderBy::asc(token));
    }
    out
}
