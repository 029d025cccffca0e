pub mod auth;
pub mod firestore;
pub mod schema;
pub mod sqlite;

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;

use crate::models::analysis::AnalysisDocument;
use crate::utils::config::{Config, StoreKind};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("store authentication failed: {0}")]
    Auth(String),
    #[error("store rejected write ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("document encoding: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("store task failed: {0}")]
    Task(String),
}

/// Write-once document storage keyed by generated ids.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Insert `doc` as a new document in `collection` and return its id.
    /// The store stamps the document's `timestamp` itself.
    async fn insert(&self, collection: &str, doc: &AnalysisDocument) -> Result<String, StoreError>;
}

pub fn from_config(cfg: &Config) -> anyhow::Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match cfg.store {
        StoreKind::Firestore => {
            let creds = firestore::Credentials::load(&cfg.credentials)
                .with_context(|| format!("Failed to load store credentials from {}", cfg.credentials.display()))?;
            Arc::new(firestore::FirestoreStore::new(creds)?)
        }
        StoreKind::Sqlite => Arc::new(sqlite::SqliteStore::open(cfg.sqlite_path())?),
    };
    Ok(store)
}
