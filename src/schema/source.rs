//! Raw schema document sources. Documents are produced by collaborators;
//! this boundary only fetches them by (model, connection).

use crate::error::SchemaError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

/// Supplies raw schema documents keyed by model name and an optional
/// connection scope. Returning `Ok(None)` means "no document here"; the
/// store decides how to fall back.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn fetch(
        &self,
        model: &str,
        connection: Option<&str>,
    ) -> Result<Option<serde_json::Value>, SchemaError>;
}

/// Directory-backed source following the folder/connection convention:
/// `<root>/<connection>/<model>.json` for a connection-scoped document,
/// `<root>/<model>.json` for the default one.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectorySource { root: root.into() }
    }

    /// Root from env `MODELKIT_SCHEMA_DIR`, default `./schemas`.
    pub fn from_env() -> Self {
        let root = std::env::var("MODELKIT_SCHEMA_DIR").unwrap_or_else(|_| "schemas".into());
        DirectorySource::new(root)
    }

    fn path_for(&self, model: &str, connection: Option<&str>) -> PathBuf {
        let mut p = self.root.clone();
        if let Some(conn) = connection {
            p.push(conn);
        }
        p.push(format!("{}.json", model));
        p
    }
}

#[async_trait]
impl SchemaSource for DirectorySource {
    async fn fetch(
        &self,
        model: &str,
        connection: Option<&str>,
    ) -> Result<Option<serde_json::Value>, SchemaError> {
        let path = self.path_for(model, connection);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SchemaError::Load(format!("{}: {}", path.display(), e))),
        };
        tracing::debug!(path = %path.display(), "schema document read");
        let value = serde_json::from_slice(&bytes)
            .map_err(|e| SchemaError::Load(format!("{}: {}", path.display(), e)))?;
        Ok(Some(value))
    }
}

/// In-memory source for seeding and tests. Key is (model, connection).
#[derive(Default)]
pub struct MemorySource {
    docs: RwLock<HashMap<(String, Option<String>), serde_json::Value>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, model: &str, connection: Option<&str>, doc: serde_json::Value) {
        self.docs
            .write()
            .expect("source lock poisoned")
            .insert((model.to_string(), connection.map(String::from)), doc);
    }
}

#[async_trait]
impl SchemaSource for MemorySource {
    async fn fetch(
        &self,
        model: &str,
        connection: Option<&str>,
    ) -> Result<Option<serde_json::Value>, SchemaError> {
        let key = (model.to_string(), connection.map(String::from));
        Ok(self
            .docs
            .read()
            .expect("source lock poisoned")
            .get(&key)
            .cloned())
    }
}
