//! Pivot-table mutations: attach, detach, sync.
//!
//! Each call runs in one storage transaction; a failed step rolls the whole
//! operation back. Nothing here retries.

use crate::error::EngineError;
use crate::relation::spec::{RelationshipSpec, ResolvedRelation};
use crate::sql::ident::{qualified, quoted, QueryBuf};
use crate::sql::params::bind_params;
use serde_json::Value;
use sqlx::PgPool;

/// The pivot keys of a relation, or MissingPivotConfig for shapes without a
/// directly writable pivot (one_to_many rows belong to the child table;
/// the through shape has no single authoritative pivot pair).
fn pivot_keys(relation: &ResolvedRelation) -> Result<(&str, &str, &str), EngineError> {
    match &relation.spec {
        RelationshipSpec::ManyToMany {
            pivot_table,
            foreign_key,
            related_key,
            ..
        } => Ok((pivot_table, foreign_key, related_key)),
        _ => Err(EngineError::MissingPivotConfig {
            relation: relation.name.clone(),
            detail: "pivot mutations require a many_to_many relationship".into(),
        }),
    }
}

fn dedupe(ids: &[Value]) -> Vec<Value> {
    let mut seen = Vec::new();
    for id in ids {
        if !seen.contains(id) {
            seen.push(id.clone());
        }
    }
    seen
}

/// INSERT the (parent, id) pairs, skipping pairs that already exist.
pub fn attach_sql(relation: &ResolvedRelation, parent_id: &Value, ids: &[Value]) -> Result<QueryBuf, EngineError> {
    let (pivot, fk, rk) = pivot_keys(relation)?;
    let mut q = QueryBuf::new();
    let parent_ph = q.placeholder(parent_id.clone(), None);
    let rows: Vec<String> = dedupe(ids)
        .into_iter()
        .map(|id| format!("({}, {})", parent_ph, q.placeholder(id, None)))
        .collect();
    q.sql = format!(
        "INSERT INTO {} ({}, {}) VALUES {} ON CONFLICT DO NOTHING",
        quoted(pivot),
        quoted(fk),
        quoted(rk),
        rows.join(", ")
    );
    Ok(q)
}

/// DELETE only the listed pairs.
pub fn detach_sql(relation: &ResolvedRelation, parent_id: &Value, ids: &[Value]) -> Result<QueryBuf, EngineError> {
    let (pivot, fk, rk) = pivot_keys(relation)?;
    let mut q = QueryBuf::new();
    let parent_ph = q.placeholder(parent_id.clone(), None);
    let placeholders: Vec<String> = dedupe(ids)
        .into_iter()
        .map(|id| q.placeholder(id, None))
        .collect();
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} AND {} IN ({})",
        quoted(pivot),
        qualified(pivot, fk),
        parent_ph,
        qualified(pivot, rk),
        placeholders.join(", ")
    );
    Ok(q)
}

/// DELETE every pair of the parent not in the new id set (all of them when
/// the set is empty).
pub fn sync_prune_sql(relation: &ResolvedRelation, parent_id: &Value, ids: &[Value]) -> Result<QueryBuf, EngineError> {
    let (pivot, fk, rk) = pivot_keys(relation)?;
    let mut q = QueryBuf::new();
    let parent_ph = q.placeholder(parent_id.clone(), None);
    let ids = dedupe(ids);
    if ids.is_empty() {
        q.sql = format!(
            "DELETE FROM {} WHERE {} = {}",
            quoted(pivot),
            qualified(pivot, fk),
            parent_ph
        );
        return Ok(q);
    }
    let placeholders: Vec<String> = ids.into_iter().map(|id| q.placeholder(id, None)).collect();
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} AND {} NOT IN ({})",
        quoted(pivot),
        qualified(pivot, fk),
        parent_ph,
        qualified(pivot, rk),
        placeholders.join(", ")
    );
    Ok(q)
}

/// COUNT how many of the ids actually exist in the related table.
pub fn verify_ids_sql(relation: &ResolvedRelation, ids: &[Value]) -> Result<QueryBuf, EngineError> {
    let (related_table, related_pk) = match &relation.spec {
        RelationshipSpec::ManyToMany {
            related_table,
            related_pk,
            ..
        } => (related_table, related_pk),
        _ => {
            return Err(EngineError::MissingPivotConfig {
                relation: relation.name.clone(),
                detail: "pivot mutations require a many_to_many relationship".into(),
            })
        }
    };
    let mut q = QueryBuf::new();
    let placeholders: Vec<String> = dedupe(ids).into_iter().map(|id| q.placeholder(id, None)).collect();
    q.sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {} IN ({})",
        quoted(related_table),
        qualified(related_table, related_pk),
        placeholders.join(", ")
    );
    Ok(q)
}

fn translate_pivot_err(err: sqlx::Error, relation: &ResolvedRelation) -> EngineError {
    if let sqlx::Error::Database(db) = &err {
        // foreign-key violation: an id does not exist in the related table
        if db.code().as_deref() == Some("23503") {
            return EngineError::RelationshipIntegrity(format!(
                "{}: {}",
                relation.name,
                db.message()
            ));
        }
    }
    EngineError::from_db(err, &relation.name)
}

/// Attach ids to the parent. Idempotent: overlapping id sets never create
/// duplicate pivot rows.
pub async fn attach(
    pool: &PgPool,
    relation: &ResolvedRelation,
    parent_id: &Value,
    ids: &[Value],
) -> Result<u64, EngineError> {
    if ids.is_empty() {
        return Ok(0);
    }
    let q = attach_sql(relation, parent_id, ids)?;
    tracing::debug!(sql = %q.sql, params = ?q.params, "attach");
    let mut tx = pool.begin().await?;
    let done = bind_params(sqlx::query(&q.sql), &q.params)
        .execute(&mut *tx)
        .await
        .map_err(|e| translate_pivot_err(e, relation))?;
    tx.commit().await?;
    Ok(done.rows_affected())
}

/// Detach only the listed ids.
pub async fn detach(
    pool: &PgPool,
    relation: &ResolvedRelation,
    parent_id: &Value,
    ids: &[Value],
) -> Result<u64, EngineError> {
    if ids.is_empty() {
        return Ok(0);
    }
    let q = detach_sql(relation, parent_id, ids)?;
    tracing::debug!(sql = %q.sql, params = ?q.params, "detach");
    let mut tx = pool.begin().await?;
    let done = bind_params(sqlx::query(&q.sql), &q.params)
        .execute(&mut *tx)
        .await
        .map_err(|e| translate_pivot_err(e, relation))?;
    tx.commit().await?;
    Ok(done.rows_affected())
}

/// Replace the parent's full id set atomically. Any id missing from the
/// related table fails the whole operation with RelationshipIntegrity.
pub async fn sync(
    pool: &PgPool,
    relation: &ResolvedRelation,
    parent_id: &Value,
    ids: &[Value],
) -> Result<(), EngineError> {
    let ids = dedupe(ids);
    let mut tx = pool.begin().await?;

    if !ids.is_empty() {
        let verify = verify_ids_sql(relation, &ids)?;
        tracing::debug!(sql = %verify.sql, "sync verify");
        let found: i64 = crate::sql::params::bind_scalar_params(
            sqlx::query_scalar(&verify.sql),
            &verify.params,
        )
        .fetch_one(&mut *tx)
        .await?;
        if found as usize != ids.len() {
            return Err(EngineError::RelationshipIntegrity(format!(
                "{}: {} of {} ids exist",
                relation.name,
                found,
                ids.len()
            )));
        }
    }

    let prune = sync_prune_sql(relation, parent_id, &ids)?;
    tracing::debug!(sql = %prune.sql, params = ?prune.params, "sync prune");
    bind_params(sqlx::query(&prune.sql), &prune.params)
        .execute(&mut *tx)
        .await
        .map_err(|e| translate_pivot_err(e, relation))?;

    if !ids.is_empty() {
        let add = attach_sql(relation, parent_id, &ids)?;
        tracing::debug!(sql = %add.sql, params = ?add.params, "sync attach");
        bind_params(sqlx::query(&add.sql), &add.params)
            .execute(&mut *tx)
            .await
            .map_err(|e| translate_pivot_err(e, relation))?;
    }

    tx.commit().await?;
    Ok(())
}
