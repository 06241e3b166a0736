//! Executes listing requests against PostgreSQL.

use crate::entity::config::{coerce_value, RuntimeEntityConfig};
use crate::entity::registry::EntityRegistry;
use crate::error::EngineError;
use crate::query::builder::{exists_sql, ListQuery};
use crate::query::request::{QueryRequest, QueryResult};
use crate::relation::spec::{RelationshipResolver, RelationshipSpec, ResolvedRelation};
use crate::sql::params::{bind_params, bind_scalar_params};
use crate::sql::row::row_to_json;
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;

pub struct QueryEngine;

impl QueryEngine {
    /// List rows of the configured entity, optionally scoped to one of its
    /// relationships. Stateless per request; safe under unbounded
    /// parallelism.
    pub async fn list(
        pool: &PgPool,
        config: &RuntimeEntityConfig,
        relation: Option<&str>,
        parent_id: Option<&Value>,
        request: &QueryRequest,
    ) -> Result<QueryResult, EngineError> {
        let scope = match relation {
            Some(name) => match RelationshipResolver::resolve(config, name) {
                Ok(rel) => Some(rel),
                // an undeclared relation falls through to an unscoped
                // base-model listing; see DESIGN.md
                Err(EngineError::UnknownRelationship(name)) => {
                    tracing::warn!(
                        model = %config.model,
                        relation = %name,
                        "undeclared relation requested; listing base model unscoped"
                    );
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        match scope {
            Some(relation) => {
                let parent_id = parent_id.ok_or_else(|| {
                    EngineError::Validation(format!(
                        "relationship '{}' requires a parent id",
                        relation.name
                    ))
                })?;
                let parent_id = match config.field_type(&config.primary_key) {
                    Some(ty) => coerce_value(&config.primary_key, ty, parent_id)?,
                    None => parent_id.clone(),
                };
                Self::ensure_parent_exists(pool, config, &parent_id).await?;
                let target = target_config(&relation);
                let query = ListQuery::new(&target).scoped(&relation, parent_id);
                Self::run(pool, &target, &query, request).await
            }
            None => {
                let query = ListQuery::new(config);
                Self::run(pool, config, &query, request).await
            }
        }
    }

    async fn ensure_parent_exists(
        pool: &PgPool,
        config: &RuntimeEntityConfig,
        parent_id: &Value,
    ) -> Result<(), EngineError> {
        let q = exists_sql(config, parent_id);
        tracing::debug!(sql = %q.sql, params = ?q.params, "parent probe");
        let found = bind_params(sqlx::query(&q.sql), &q.params)
            .fetch_optional(pool)
            .await?;
        if found.is_none() {
            return Err(EngineError::NotFound(format!(
                "{} {}",
                config.model, parent_id
            )));
        }
        Ok(())
    }

    async fn run(
        pool: &PgPool,
        target: &RuntimeEntityConfig,
        query: &ListQuery<'_>,
        request: &QueryRequest,
    ) -> Result<QueryResult, EngineError> {
        let total_q = query.count_sql(request, false)?;
        tracing::debug!(sql = %total_q.sql, params = ?total_q.params, "count total");
        let total: i64 = bind_scalar_params(sqlx::query_scalar(&total_q.sql), &total_q.params)
            .fetch_one(pool)
            .await?;

        let filtered_q = query.count_sql(request, true)?;
        tracing::debug!(sql = %filtered_q.sql, params = ?filtered_q.params, "count filtered");
        let filtered: i64 =
            bind_scalar_params(sqlx::query_scalar(&filtered_q.sql), &filtered_q.params)
                .fetch_one(pool)
                .await?;

        let page_q = query.select_sql(request)?;
        tracing::debug!(sql = %page_q.sql, params = ?page_q.params, "page");
        let rows = bind_params(sqlx::query(&page_q.sql), &page_q.params)
            .fetch_all(pool)
            .await?;

        Ok(QueryResult {
            total: total.max(0) as u64,
            filtered: filtered.max(0) as u64,
            rows: rows.iter().map(row_to_json).collect(),
            sortable: target.sortable_fields.clone(),
            filterable: target.filterable_fields.clone(),
        })
    }
}

/// Config of the table a relationship scope lists: the related model's
/// registry entry when published, a minimal stand-in otherwise.
fn target_config(relation: &ResolvedRelation) -> Arc<RuntimeEntityConfig> {
    let table = relation.related_table();
    if let Some(config) = EntityRegistry::global().lookup(table) {
        return config;
    }
    let pk = match &relation.spec {
        RelationshipSpec::OneToMany { .. } => "id",
        RelationshipSpec::ManyToMany { related_pk, .. }
        | RelationshipSpec::ManyToManyThrough { related_pk, .. } => related_pk,
    };
    Arc::new(RuntimeEntityConfig::minimal(table, pk))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::config::EntityConfigurator;
    use crate::schema::store::validate;
    use serde_json::json;

    #[test]
    fn target_config_prefers_registry_entry() {
        EntityConfigurator::configure(
            &validate(&json!({
                "model": "engine_roles",
                "table": "engine_roles",
                "primary_key": "role_id",
                "fields": { "role_id": { "type": "integer", "auto_increment": true } }
            }))
            .unwrap(),
        );
        let relation = ResolvedRelation {
            name: "roles".into(),
            parent_table: "engine_users".into(),
            parent_pk: "id".into(),
            spec: RelationshipSpec::ManyToMany {
                related_table: "engine_roles".into(),
                related_pk: "role_id".into(),
                pivot_table: "engine_role_users".into(),
                foreign_key: "user_id".into(),
                related_key: "role_id".into(),
            },
        };
        let target = target_config(&relation);
        assert_eq!(target.primary_key, "role_id");
        assert!(!target.field_names.is_empty());
    }

    #[test]
    fn target_config_falls_back_to_minimal() {
        let relation = ResolvedRelation {
            name: "tags".into(),
            parent_table: "engine_users".into(),
            parent_pk: "id".into(),
            spec: RelationshipSpec::OneToMany {
                related_table: "never_configured_tags".into(),
                foreign_key: "user_id".into(),
            },
        };
        let target = target_config(&relation);
        assert_eq!(target.table, "never_configured_tags");
        assert_eq!(target.primary_key, "id");
        assert!(target.field_names.is_empty());
    }
}
