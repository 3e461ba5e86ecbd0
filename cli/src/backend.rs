//! Storage backend selection from the database URL.

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use chainsync_core::{BlockStore, SyncConfig};
use chainsync_engine::SyncEngineBuilder;
use chainsync_storage::{MemoryStorage, PostgresStorage, SqliteStorage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Memory,
    Sqlite,
    Postgres,
}

impl Scheme {
    pub fn of(database_url: &str) -> Result<Self> {
        let url = database_url.trim();
        if url == "memory" {
            Ok(Self::Memory)
        } else if url.starts_with("sqlite:") {
            Ok(Self::Sqlite)
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(Self::Postgres)
        } else {
            bail!("unsupported database_url '{url}': expected sqlite:<path>, postgres://... or memory")
        }
    }
}

pub enum Backend {
    Memory(Arc<MemoryStorage>),
    Sqlite(Arc<SqliteStorage>),
    Postgres(Arc<PostgresStorage>),
}

impl Backend {
    pub async fn open(config: &SyncConfig) -> Result<Self> {
        let url = config.database_url.trim();
        let backend = match Scheme::of(url)? {
            Scheme::Memory => Self::Memory(Arc::new(MemoryStorage::new())),
            Scheme::Sqlite => {
                let store = SqliteStorage::open(url)
                    .await
                    .with_context(|| format!("open SQLite database '{url}'"))?
                    .with_lease_ttl(config.lock_ttl());
                Self::Sqlite(Arc::new(store))
            }
            Scheme::Postgres => {
                let store = PostgresStorage::connect(url)
                    .await
                    .context("connect to Postgres")?;
                Self::Postgres(Arc::new(store))
            }
        };
        tracing::info!(backend = backend.name(), "storage opened");
        Ok(backend)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Sqlite(_) => "sqlite",
            Self::Postgres(_) => "postgres",
        }
    }

    pub fn store(&self) -> Arc<dyn BlockStore> {
        match self {
            Self::Memory(s) => s.clone() as Arc<dyn BlockStore>,
            Self::Sqlite(s) => s.clone() as Arc<dyn BlockStore>,
            Self::Postgres(s) => s.clone() as Arc<dyn BlockStore>,
        }
    }

    /// Use this backend as the engine's store and writer lock.
    pub fn attach(&self, builder: SyncEngineBuilder) -> SyncEngineBuilder {
        match self {
            Self::Memory(s) => builder.storage(s.clone()),
            Self::Sqlite(s) => builder.storage(s.clone()),
            Self::Postgres(s) => builder.storage(s.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_from_url() {
        assert_eq!(Scheme::of("memory").unwrap(), Scheme::Memory);
        assert_eq!(Scheme::of("sqlite:./chain.db?mode=rwc").unwrap(), Scheme::Sqlite);
        assert_eq!(Scheme::of("postgres://u:p@db/chain").unwrap(), Scheme::Postgres);
        assert_eq!(Scheme::of("postgresql://db/chain").unwrap(), Scheme::Postgres);
        assert!(Scheme::of("mysql://db").is_err());
    }

    #[tokio::test]
    async fn opens_memory_backend() {
        let config = SyncConfig {
            database_url: "memory".into(),
            ..Default::default()
        };
        let backend = Backend::open(&config).await.unwrap();
        assert_eq!(backend.name(), "memory");
        assert!(backend.store().load_cursor().await.unwrap().is_none());
    }
}
