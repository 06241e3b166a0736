//! Entity mutations against PostgreSQL. One transaction per request; a
//! failed step rolls the whole request back, nothing retries.

use crate::entity::config::{coerce_value, sql_cast, RuntimeEntityConfig};
use crate::error::EngineError;
use crate::query::builder::select_columns;
use crate::service::validation::RequestValidator;
use crate::sql::ident::{qualified, quoted, QueryBuf};
use crate::sql::params::bind_params;
use crate::sql::row::row_to_json;
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;

pub struct EntityService;

impl EntityService {
    /// Fetch one row by primary key.
    pub async fn get(
        pool: &PgPool,
        config: &RuntimeEntityConfig,
        id: &Value,
    ) -> Result<Value, EngineError> {
        let id = coerce_id(config, id)?;
        let q = select_one_sql(config, &id);
        tracing::debug!(sql = %q.sql, params = ?q.params, "get");
        let row = bind_params(sqlx::query(&q.sql), &q.params)
            .fetch_optional(pool)
            .await?;
        row.map(|r| row_to_json(&r))
            .ok_or_else(|| not_found(config, &id))
    }

    /// Insert one row from a payload of writable fields. The created row is
    /// returned; a unique-constraint violation surfaces as Conflict.
    pub async fn create(
        pool: &PgPool,
        config: &RuntimeEntityConfig,
        payload: &HashMap<String, Value>,
    ) -> Result<Value, EngineError> {
        RequestValidator::validate(payload, &config.validation)?;
        let columns = writable_payload(config, payload)?;
        let q = insert_sql(config, &columns);
        tracing::debug!(sql = %q.sql, params = ?q.params, "create");
        let mut tx = pool.begin().await?;
        let row = bind_params(sqlx::query(&q.sql), &q.params)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| EngineError::from_db(e, &config.model))?;
        tx.commit().await?;
        Ok(row_to_json(&row))
    }

    /// Update writable fields of one row by primary key.
    pub async fn update(
        pool: &PgPool,
        config: &RuntimeEntityConfig,
        id: &Value,
        payload: &HashMap<String, Value>,
    ) -> Result<Value, EngineError> {
        RequestValidator::validate_partial(payload, &config.validation)?;
        let columns = writable_payload(config, payload)?;
        let id = coerce_id(config, id)?;
        let q = update_sql(config, &id, &columns);
        tracing::debug!(sql = %q.sql, params = ?q.params, "update");
        let mut tx = pool.begin().await?;
        let row = bind_params(sqlx::query(&q.sql), &q.params)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| EngineError::from_db(e, &config.model))?;
        tx.commit().await?;
        row.map(|r| row_to_json(&r))
            .ok_or_else(|| not_found(config, &id))
    }

    /// Update a single field. Readonly and auto-increment fields are
    /// rejected outright.
    pub async fn update_field(
        pool: &PgPool,
        config: &RuntimeEntityConfig,
        id: &Value,
        field: &str,
        value: &Value,
    ) -> Result<Value, EngineError> {
        if config.readonly_fields.contains(field) {
            return Err(EngineError::ReadonlyField(field.to_string()));
        }
        if !config.is_writable(field) {
            return Err(EngineError::Validation(format!("unknown field {}", field)));
        }
        let payload: HashMap<String, Value> =
            std::iter::once((field.to_string(), value.clone())).collect();
        Self::update(pool, config, id, &payload).await
    }

    /// Delete one row: soft (sets the soft-delete column) when configured,
    /// hard otherwise.
    pub async fn delete(
        pool: &PgPool,
        config: &RuntimeEntityConfig,
        id: &Value,
    ) -> Result<(), EngineError> {
        let id = coerce_id(config, id)?;
        let q = delete_sql(config, &id);
        tracing::debug!(sql = %q.sql, params = ?q.params, "delete");
        let mut tx = pool.begin().await?;
        let row = bind_params(sqlx::query(&q.sql), &q.params)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| EngineError::from_db(e, &config.model))?;
        tx.commit().await?;
        if row.is_none() {
            return Err(not_found(config, &id));
        }
        Ok(())
    }
}

fn not_found(config: &RuntimeEntityConfig, id: &Value) -> EngineError {
    EngineError::NotFound(format!("{} {}", config.model, id))
}

fn coerce_id(config: &RuntimeEntityConfig, id: &Value) -> Result<Value, EngineError> {
    match config.field_type(&config.primary_key) {
        Some(ty) => coerce_value(&config.primary_key, ty, id),
        None => Ok(id.clone()),
    }
}

/// Project a payload onto the writable fields, in schema order. Explicitly
/// naming a readonly/auto field is an error; keys the schema never declared
/// are dropped.
pub fn writable_payload(
    config: &RuntimeEntityConfig,
    payload: &HashMap<String, Value>,
) -> Result<Vec<(String, Value)>, EngineError> {
    for key in payload.keys() {
        if config.readonly_fields.contains(key) {
            return Err(EngineError::ReadonlyField(key.clone()));
        }
    }
    let mut columns = Vec::new();
    for field in &config.writable_fields {
        if let Some(v) = payload.get(field) {
            let ty = config
                .field_type(field)
                .ok_or_else(|| EngineError::Validation(format!("unknown field {}", field)))?;
            let coerced = coerce_value(field, ty, v).map_err(|e| match e {
                EngineError::FilterValue {
                    field, expected, ..
                } => EngineError::Validation(format!("{} must be a {}", field, expected)),
                other => other,
            })?;
            columns.push((field.clone(), coerced));
        }
    }
    Ok(columns)
}

pub fn select_one_sql(config: &RuntimeEntityConfig, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut parts = vec![format!(
        "{} = {}",
        qualified(&config.table, &config.primary_key),
        q.placeholder(id.clone(), None)
    )];
    if let Some(col) = &config.soft_delete_column {
        parts.push(format!("{} IS NULL", qualified(&config.table, col)));
    }
    q.sql = format!(
        "SELECT {} FROM {} WHERE {}",
        select_columns(config),
        quoted(&config.table),
        parts.join(" AND ")
    );
    q
}

pub fn insert_sql(config: &RuntimeEntityConfig, columns: &[(String, Value)]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut names: Vec<String> = Vec::new();
    let mut values: Vec<String> = Vec::new();
    for (field, value) in columns {
        let cast = config.field_type(field).and_then(sql_cast);
        names.push(quoted(field));
        values.push(q.placeholder(value.clone(), cast));
    }
    if config.timestamps {
        names.push(quoted("created_at"));
        values.push("NOW()".into());
        names.push(quoted("updated_at"));
        values.push("NOW()".into());
    }
    if names.is_empty() {
        q.sql = format!(
            "INSERT INTO {} DEFAULT VALUES RETURNING {}",
            quoted(&config.table),
            select_columns(config)
        );
        return q;
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        quoted(&config.table),
        names.join(", "),
        values.join(", "),
        select_columns(config)
    );
    q
}

pub fn update_sql(config: &RuntimeEntityConfig, id: &Value, columns: &[(String, Value)]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets: Vec<String> = Vec::new();
    for (field, value) in columns {
        let cast = config.field_type(field).and_then(sql_cast);
        sets.push(format!("{} = {}", quoted(field), q.placeholder(value.clone(), cast)));
    }
    if config.timestamps {
        sets.push(format!("{} = NOW()", quoted("updated_at")));
    }
    if sets.is_empty() {
        // nothing to change; read the row back so callers still get it
        return select_one_sql(config, id);
    }
    let mut parts = vec![format!(
        "{} = {}",
        qualified(&config.table, &config.primary_key),
        q.placeholder(id.clone(), None)
    )];
    if let Some(col) = &config.soft_delete_column {
        parts.push(format!("{} IS NULL", qualified(&config.table, col)));
    }
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} RETURNING {}",
        quoted(&config.table),
        sets.join(", "),
        parts.join(" AND "),
        select_columns(config)
    );
    q
}

pub fn delete_sql(config: &RuntimeEntityConfig, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    match &config.soft_delete_column {
        Some(col) => {
            let ph = q.placeholder(id.clone(), None);
            q.sql = format!(
                "UPDATE {} SET {} = NOW() WHERE {} = {} AND {} IS NULL RETURNING {}",
                quoted(&config.table),
                quoted(col),
                qualified(&config.table, &config.primary_key),
                ph,
                qualified(&config.table, col),
                quoted(&config.primary_key)
            );
        }
        None => {
            let ph = q.placeholder(id.clone(), None);
            q.sql = format!(
                "DELETE FROM {} WHERE {} = {} RETURNING {}",
                quoted(&config.table),
                qualified(&config.table, &config.primary_key),
                ph,
                quoted(&config.primary_key)
            );
        }
    }
    q
}
