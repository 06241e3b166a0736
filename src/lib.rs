//! ModelKit: schema-driven entity and query engine for PostgreSQL.
//!
//! Entities are declared as JSON schema documents. A [`SchemaStore`] loads
//! and caches them, [`EntityConfigurator`] turns a validated schema into the
//! runtime configuration that drives everything else: listing and filtering
//! through [`QueryEngine`], row mutations through [`EntityService`],
//! relationship traversal and pivot maintenance through the `relation`
//! module, and per-context field projections through [`ViewCache`].

pub mod connections;
pub mod entity;
pub mod error;
pub mod query;
pub mod relation;
pub mod schema;
pub mod service;
pub mod sql;

pub use connections::ConnectionRegistry;
pub use entity::config::{EntityConfigurator, RuntimeEntityConfig};
pub use entity::registry::EntityRegistry;
pub use error::{EngineError, SchemaError};
pub use query::engine::QueryEngine;
pub use query::request::{QueryRequest, QueryResult, SortField};
pub use relation::pivot::{attach, detach, sync};
pub use relation::spec::{RelationshipResolver, RelationshipSpec, ResolvedRelation};
pub use schema::cache::ViewCache;
pub use schema::source::{DirectorySource, MemorySource, SchemaSource};
pub use schema::store::{validate, SchemaStore};
pub use schema::types::SchemaDefinition;
pub use schema::view::{filter_for_context, SchemaView, ViewContext};
pub use service::crud::EntityService;
pub use service::validation::RequestValidator;
