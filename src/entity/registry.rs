//! Process-wide registry of runtime entity configs, keyed by table name.
//!
//! Rows can be materialized through arbitrary query paths (relationship
//! scopes, raw listings); they all resolve fillable/cast/relationship data
//! here instead of carrying per-instance state.

use crate::entity::config::RuntimeEntityConfig;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

pub struct EntityRegistry {
    inner: RwLock<HashMap<String, Arc<RuntimeEntityConfig>>>,
}

static GLOBAL: OnceLock<EntityRegistry> = OnceLock::new();

impl EntityRegistry {
    pub fn global() -> &'static EntityRegistry {
        GLOBAL.get_or_init(|| EntityRegistry {
            inner: RwLock::new(HashMap::new()),
        })
    }

    pub fn publish(&self, config: Arc<RuntimeEntityConfig>) {
        self.inner
            .write()
            .expect("entity registry poisoned")
            .insert(config.table.clone(), config);
    }

    pub fn lookup(&self, table: &str) -> Option<Arc<RuntimeEntityConfig>> {
        self.inner
            .read()
            .expect("entity registry poisoned")
            .get(table)
            .cloned()
    }

    pub fn remove(&self, table: &str) {
        self.inner
            .write()
            .expect("entity registry poisoned")
            .remove(table);
    }
}
