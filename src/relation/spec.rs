//! Relationship resolution: declared specs become executable join/predicate
//! fragments, resolved once per (table, relation) and memoized.

use crate::entity::config::RuntimeEntityConfig;
use crate::entity::registry::EntityRegistry;
use crate::error::EngineError;
use crate::schema::types::{RelationshipDefinition, MANY_TO_MANY, MANY_TO_MANY_THROUGH, ONE_TO_MANY};
use crate::sql::ident::qualified;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// The three supported relationship shapes, flattened to join keys.
#[derive(Clone, Debug)]
pub enum RelationshipSpec {
    OneToMany {
        related_table: String,
        foreign_key: String,
    },
    ManyToMany {
        related_table: String,
        related_pk: String,
        pivot_table: String,
        foreign_key: String,
        related_key: String,
    },
    ManyToManyThrough {
        related_table: String,
        related_pk: String,
        pivot_table: String,
        foreign_key: String,
        through_foreign_key: String,
        through_pivot_table: String,
        through_related_key: String,
        related_key: String,
    },
}

/// One INNER JOIN, both sides table-qualified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinFragment {
    pub table: String,
    pub on_left: (String, String),
    pub on_right: (String, String),
}

impl JoinFragment {
    pub fn render(&self) -> String {
        format!(
            "JOIN {} ON {} = {}",
            crate::sql::ident::quoted(&self.table),
            qualified(&self.on_left.0, &self.on_left.1),
            qualified(&self.on_right.0, &self.on_right.1),
        )
    }
}

/// A resolved relationship on a parent table.
#[derive(Clone, Debug)]
pub struct ResolvedRelation {
    pub name: String,
    pub parent_table: String,
    pub parent_pk: String,
    pub spec: RelationshipSpec,
}

impl ResolvedRelation {
    pub fn related_table(&self) -> &str {
        match &self.spec {
            RelationshipSpec::OneToMany { related_table, .. }
            | RelationshipSpec::ManyToMany { related_table, .. }
            | RelationshipSpec::ManyToManyThrough { related_table, .. } => related_table,
        }
    }

    /// Joins to layer onto the related table, in application order.
    pub fn joins(&self) -> Vec<JoinFragment> {
        match &self.spec {
            RelationshipSpec::OneToMany { .. } => Vec::new(),
            RelationshipSpec::ManyToMany {
                related_table,
                related_pk,
                pivot_table,
                related_key,
                ..
            } => vec![JoinFragment {
                table: pivot_table.clone(),
                on_left: (related_table.clone(), related_pk.clone()),
                on_right: (pivot_table.clone(), related_key.clone()),
            }],
            RelationshipSpec::ManyToManyThrough {
                related_table,
                related_pk,
                pivot_table,
                through_foreign_key,
                through_pivot_table,
                through_related_key,
                related_key,
                ..
            } => vec![
                JoinFragment {
                    table: through_pivot_table.clone(),
                    on_left: (related_table.clone(), related_pk.clone()),
                    on_right: (through_pivot_table.clone(), related_key.clone()),
                },
                JoinFragment {
                    table: pivot_table.clone(),
                    on_left: (pivot_table.clone(), through_foreign_key.clone()),
                    on_right: (through_pivot_table.clone(), through_related_key.clone()),
                },
            ],
        }
    }

    /// Qualified (table, column) the parent-id predicate binds against.
    pub fn scope_column(&self) -> (&str, &str) {
        match &self.spec {
            RelationshipSpec::OneToMany {
                related_table,
                foreign_key,
            } => (related_table, foreign_key),
            RelationshipSpec::ManyToMany {
                pivot_table,
                foreign_key,
                ..
            }
            | RelationshipSpec::ManyToManyThrough {
                pivot_table,
                foreign_key,
                ..
            } => (pivot_table, foreign_key),
        }
    }
}

/// Memoized (parent table, relation name) -> resolved relation.
pub struct RelationRegistry {
    inner: RwLock<HashMap<(String, String), Arc<ResolvedRelation>>>,
}

static GLOBAL: OnceLock<RelationRegistry> = OnceLock::new();

impl RelationRegistry {
    pub fn global() -> &'static RelationRegistry {
        GLOBAL.get_or_init(|| RelationRegistry {
            inner: RwLock::new(HashMap::new()),
        })
    }

    fn lookup(&self, table: &str, name: &str) -> Option<Arc<ResolvedRelation>> {
        self.inner
            .read()
            .expect("relation registry poisoned")
            .get(&(table.to_string(), name.to_string()))
            .cloned()
    }

    fn store(&self, relation: Arc<ResolvedRelation>) {
        self.inner
            .write()
            .expect("relation registry poisoned")
            .insert(
                (relation.parent_table.clone(), relation.name.clone()),
                relation,
            );
    }

    /// Drop memoized relations of a table (after schema invalidation).
    pub fn remove_table(&self, table: &str) {
        self.inner
            .write()
            .expect("relation registry poisoned")
            .retain(|(t, _), _| t != table);
    }
}

pub struct RelationshipResolver;

impl RelationshipResolver {
    /// Resolve `name` on the configured table, memoizing the result.
    pub fn resolve(
        config: &RuntimeEntityConfig,
        name: &str,
    ) -> Result<Arc<ResolvedRelation>, EngineError> {
        if let Some(hit) = RelationRegistry::global().lookup(&config.table, name) {
            return Ok(hit);
        }
        let def = config
            .relationship(name)
            .ok_or_else(|| EngineError::UnknownRelationship(name.to_string()))?;
        let spec = build_spec(def)?;
        let relation = Arc::new(ResolvedRelation {
            name: name.to_string(),
            parent_table: config.table.clone(),
            parent_pk: config.primary_key.clone(),
            spec,
        });
        RelationRegistry::global().store(Arc::clone(&relation));
        Ok(relation)
    }
}

fn require<'a>(
    def: &'a RelationshipDefinition,
    part: Option<&'a str>,
    what: &str,
) -> Result<&'a str, EngineError> {
    part.ok_or_else(|| EngineError::MissingPivotConfig {
        relation: def.name.clone(),
        detail: format!("{} is required for {}", what, def.kind),
    })
}

/// Primary key of the related table: from its registry entry when the model
/// has been configured, `id` otherwise.
fn related_pk(table: &str) -> String {
    EntityRegistry::global()
        .lookup(table)
        .map(|c| c.primary_key.clone())
        .unwrap_or_else(|| "id".to_string())
}

fn build_spec(def: &RelationshipDefinition) -> Result<RelationshipSpec, EngineError> {
    let related_table = def.related_table().to_string();
    match def.kind.as_str() {
        ONE_TO_MANY => Ok(RelationshipSpec::OneToMany {
            foreign_key: require(def, def.foreign_key.as_deref(), "foreign_key")?.to_string(),
            related_table,
        }),
        MANY_TO_MANY => Ok(RelationshipSpec::ManyToMany {
            related_pk: related_pk(&related_table),
            pivot_table: require(def, def.pivot_table.as_deref(), "pivot_table")?.to_string(),
            foreign_key: require(def, def.foreign_key.as_deref(), "foreign_key")?.to_string(),
            related_key: require(def, def.related_key.as_deref(), "related_key")?.to_string(),
            related_table,
        }),
        MANY_TO_MANY_THROUGH => Ok(RelationshipSpec::ManyToManyThrough {
            related_pk: related_pk(&related_table),
            pivot_table: require(def, def.pivot_table.as_deref(), "pivot_table")?.to_string(),
            foreign_key: require(def, def.foreign_key.as_deref(), "foreign_key")?.to_string(),
            through_foreign_key: require(
                def,
                def.through_foreign_key.as_deref(),
                "through_foreign_key",
            )?
            .to_string(),
            through_pivot_table: require(
                def,
                def.through_pivot_table.as_deref(),
                "through_pivot_table",
            )?
            .to_string(),
            through_related_key: require(
                def,
                def.through_related_key.as_deref(),
                "through_related_key",
            )?
            .to_string(),
            related_key: require(def, def.related_key.as_deref(), "related_key")?.to_string(),
            related_table,
        }),
        other => Err(EngineError::UnsupportedRelationshipType(other.to_string())),
    }
}
