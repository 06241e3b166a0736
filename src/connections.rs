//! Named connection pools. Most deployments run a single default database;
//! schemas that declare a `connection` resolve their pool by name here.

use crate::error::EngineError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;

pub struct ConnectionRegistry {
    default: PgPool,
    named: HashMap<String, PgPool>,
}

impl ConnectionRegistry {
    pub fn new(default: PgPool) -> Self {
        ConnectionRegistry {
            default,
            named: HashMap::new(),
        }
    }

    pub fn with_named(mut self, name: impl Into<String>, pool: PgPool) -> Self {
        self.named.insert(name.into(), pool);
        self
    }

    /// Connect from the environment: `DATABASE_URL` for the default pool,
    /// `DATABASE_URL_<NAME>` (upper-cased) for each name in `named`.
    pub async fn from_env(named: &[&str]) -> Result<Self, EngineError> {
        dotenvy::dotenv().ok();
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| EngineError::UnknownConnection("DATABASE_URL not set".into()))?;
        let default = PgPoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;
        let mut registry = ConnectionRegistry::new(default);
        for name in named {
            let var = format!("DATABASE_URL_{}", name.to_uppercase());
            let url = std::env::var(&var)
                .map_err(|_| EngineError::UnknownConnection(format!("{} not set", var)))?;
            let pool = PgPoolOptions::new().max_connections(5).connect(&url).await?;
            registry.named.insert(name.to_string(), pool);
            tracing::info!(connection = %name, "connected");
        }
        Ok(registry)
    }

    /// Pool for a schema's connection; `None` means the default.
    pub fn pool(&self, name: Option<&str>) -> Result<&PgPool, EngineError> {
        match name {
            None => Ok(&self.default),
            Some(n) => self
                .named
                .get(n)
                .ok_or_else(|| EngineError::UnknownConnection(n.to_string())),
        }
    }

    pub fn default_pool(&self) -> &PgPool {
        &self.default
    }
}
