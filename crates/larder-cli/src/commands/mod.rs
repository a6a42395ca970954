pub mod maintenance;
pub mod sessions;

use std::sync::Arc;

use anyhow::{Context, Result};
use larder_auth::{InMemoryTokenLedger, TokenLedger, TokenLifecycleService, TracingAuditSink};
use larder_auth_postgres::PostgresAuthStorage;

use crate::config::{AppConfig, StorageBackend};

/// Everything a command needs: the lifecycle service and, for the Postgres
/// backend, the storage handle used for migrations.
pub struct Runtime {
    pub service: TokenLifecycleService,
    pub storage: Option<PostgresAuthStorage>,
}

impl Runtime {
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let (ledger, storage) = match config.storage.backend {
            StorageBackend::Postgres => {
                let pg = &config.storage.postgres;
                let url = pg
                    .url
                    .as_deref()
                    .context("storage.postgres.url is not set")?;
                let storage = PostgresAuthStorage::connect_with(url, pg.pool_settings())
                    .await
                    .context("failed to connect to PostgreSQL")?;
                tracing::debug!(max_connections = pg.max_connections, "Connected to PostgreSQL");
                let ledger: Arc<dyn TokenLedger> = Arc::new(storage.ledger());
                (ledger, Some(storage))
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory ledger; state is discarded on exit");
                let ledger: Arc<dyn TokenLedger> = Arc::new(InMemoryTokenLedger::new());
                (ledger, None)
            }
        };

        let audit = Arc::new(TracingAuditSink::new(config.tokens.audit.clone()));
        let service = TokenLifecycleService::new(ledger, config.tokens.clone(), audit)?;

        Ok(Self { service, storage })
    }
}
