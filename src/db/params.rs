//! Bind JSON parameter values to PostgreSQL statements.

use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::{Database, Type};

/// A value that can be bound to a PostgreSQL query. Each variant announces its own type.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
}

impl PgBindValue {
    /// Structured values have no column counterpart and bind as their JSON text.
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => PgBindValue::Null,
            Value::Bool(b) => PgBindValue::Bool(*b),
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => PgBindValue::I64(i),
                (None, Some(f)) => PgBindValue::F64(f),
                (None, None) => PgBindValue::String(n.to_string()),
            },
            Value::String(s) => PgBindValue::String(s.clone()),
            Value::Array(_) | Value::Object(_) => PgBindValue::String(v.to_string()),
        }
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        match self {
            PgBindValue::Null => <Option<String> as Encode<Postgres>>::encode_by_ref(&None, buf),
            PgBindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf),
            PgBindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf),
            PgBindValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf),
            PgBindValue::String(s) => <&str as Encode<Postgres>>::encode_by_ref(&s.as_str(), buf),
        }
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(match self {
            PgBindValue::Bool(_) => <bool as Type<Postgres>>::type_info(),
            PgBindValue::I64(_) => <i64 as Type<Postgres>>::type_info(),
            PgBindValue::F64(_) => <f64 as Type<Postgres>>::type_info(),
            PgBindValue::Null | PgBindValue::String(_) => <String as Type<Postgres>>::type_info(),
        })
    }
}

impl Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }
}
