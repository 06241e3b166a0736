//! Binding JSON values onto PostgreSQL queries.
//!
//! Query text is built elsewhere with numbered placeholders; this module
//! turns the accompanying `serde_json::Value` params into something sqlx
//! can encode, in placeholder order.

use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;

/// A single bindable parameter. Strings that parse as UUIDs bind as UUIDs;
/// arrays and objects bind as jsonb; everything else binds as its scalar.
#[derive(Clone, Debug)]
pub enum BindValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(uuid::Uuid),
    Json(Value),
}

impl From<&Value> for BindValue {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => BindValue::Null,
            Value::Bool(b) => BindValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => BindValue::Int(i),
                None => BindValue::Float(n.as_f64().unwrap_or(0.0)),
            },
            Value::String(s) => match uuid::Uuid::parse_str(s) {
                Ok(u) => BindValue::Uuid(u),
                Err(_) => BindValue::Text(s.clone()),
            },
            other => BindValue::Json(other.clone()),
        }
    }
}

impl<'q> Encode<'q, Postgres> for BindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            BindValue::Null => <Option<i32> as Encode<Postgres>>::encode_by_ref(&None, buf)?,
            BindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            BindValue::Int(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            BindValue::Float(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            BindValue::Text(s) => {
                let s: &str = s.as_str();
                <&str as Encode<Postgres>>::encode_by_ref(&s, buf)?
            }
            BindValue::Uuid(u) => {
                let s = u.to_string();
                <&str as Encode<Postgres>>::encode_by_ref(&s.as_str(), buf)?
            }
            BindValue::Json(v) => <serde_json::Value as Encode<Postgres>>::encode_by_ref(v, buf)?,
        })
    }
}

impl sqlx::Type<Postgres> for BindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}

/// Bind all params of a buffer onto a query, in order.
pub fn bind_params<'q>(
    mut query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
    params: &'q [Value],
) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    for p in params {
        query = query.bind(BindValue::from(p));
    }
    query
}

/// Same, for scalar-returning queries.
pub fn bind_scalar_params<'q, T>(
    mut query: sqlx::query::QueryScalar<'q, Postgres, T, sqlx::postgres::PgArguments>,
    params: &'q [Value],
) -> sqlx::query::QueryScalar<'q, Postgres, T, sqlx::postgres::PgArguments> {
    for p in params {
        query = query.bind(BindValue::from(p));
    }
    query
}
