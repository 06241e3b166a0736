//! Schema resolution: lookup, validation, memoization.

use crate::entity::registry::EntityRegistry;
use crate::error::SchemaError;
use crate::relation::spec::RelationRegistry;
use crate::schema::source::SchemaSource;
use crate::schema::types::{SchemaDefinition, MANY_TO_MANY, MANY_TO_MANY_THROUGH};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

type CacheKey = (String, Option<String>);

/// Loads, validates and caches one `SchemaDefinition` per (model, connection).
pub struct SchemaStore {
    source: Arc<dyn SchemaSource>,
    cache: RwLock<HashMap<CacheKey, Arc<SchemaDefinition>>>,
}

impl SchemaStore {
    pub fn new(source: Arc<dyn SchemaSource>) -> Self {
        SchemaStore {
            source,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a schema. Lookup order: connection-scoped document when an
    /// override is given, then the default document with its `connection`
    /// field overridden, then `SchemaError::NotFound`.
    pub async fn resolve(
        &self,
        model: &str,
        connection: Option<&str>,
    ) -> Result<Arc<SchemaDefinition>, SchemaError> {
        let key: CacheKey = (model.to_string(), connection.map(String::from));
        if let Some(hit) = self.cache.read().expect("schema cache poisoned").get(&key) {
            return Ok(Arc::clone(hit));
        }

        let schema = self.load(model, connection).await?;
        let schema = Arc::new(schema);
        self.cache
            .write()
            .expect("schema cache poisoned")
            .insert(key, Arc::clone(&schema));
        Ok(schema)
    }

    async fn load(
        &self,
        model: &str,
        connection: Option<&str>,
    ) -> Result<SchemaDefinition, SchemaError> {
        if let Some(conn) = connection {
            if let Some(raw) = self.source.fetch(model, Some(conn)).await? {
                tracing::debug!(model, connection = conn, "connection-scoped schema");
                return validate(&raw);
            }
            if let Some(raw) = self.source.fetch(model, None).await? {
                let mut schema = validate(&raw)?;
                schema.connection = Some(conn.to_string());
                return Ok(schema);
            }
        } else if let Some(raw) = self.source.fetch(model, None).await? {
            return validate(&raw);
        }
        Err(SchemaError::NotFound {
            model: model.to_string(),
            connection: connection.map(String::from),
        })
    }

    /// Drop every cached entry for a model, across all connection scopes.
    /// Runtime state derived from the schema (entity config, memoized
    /// relations) is purged with it so nothing stale survives a reload.
    pub fn invalidate(&self, model: &str) {
        let mut cache = self.cache.write().expect("schema cache poisoned");
        for ((m, _), schema) in cache.iter() {
            if m == model {
                EntityRegistry::global().remove(&schema.table);
                RelationRegistry::global().remove_table(&schema.table);
            }
        }
        cache.retain(|(m, _), _| m != model);
    }
}

/// Validate a raw document into a `SchemaDefinition`. Structural failures
/// (missing model/table/fields, unrecognized field type) surface through
/// serde; semantic checks (empty fields, incomplete pivot config) follow.
pub fn validate(raw: &serde_json::Value) -> Result<SchemaDefinition, SchemaError> {
    let schema: SchemaDefinition = serde_json::from_value(raw.clone())
        .map_err(|e| SchemaError::Validation(e.to_string()))?;

    if schema.fields.is_empty() {
        return Err(SchemaError::Validation(format!(
            "model '{}': fields must not be empty",
            schema.model
        )));
    }

    if !schema.fields.contains_key(&schema.primary_key) {
        return Err(SchemaError::Validation(format!(
            "model '{}': primary key '{}' is not a declared field",
            schema.model, schema.primary_key
        )));
    }

    let mut seen = HashSet::new();
    for rel in &schema.relationships {
        if !seen.insert(rel.name.as_str()) {
            return Err(SchemaError::Validation(format!(
                "model '{}': duplicate relationship '{}'",
                schema.model, rel.name
            )));
        }
    }

    for rel in &schema.relationships {
        if rel.kind == MANY_TO_MANY || rel.kind == MANY_TO_MANY_THROUGH {
            for (part, present) in [
                ("pivot_table", rel.pivot_table.is_some()),
                ("foreign_key", rel.foreign_key.is_some()),
                ("related_key", rel.related_key.is_some()),
            ] {
                if !present {
                    return Err(SchemaError::Validation(format!(
                        "relationship '{}' ({}) requires {}",
                        rel.name, rel.kind, part
                    )));
                }
            }
        }
    }

    Ok(schema)
}
