use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use super::{schema, DocumentStore, StoreError};
use crate::models::analysis::{AnalysisDocument, StoredDocument};

/// Local document store backed by a single SQLite table.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(db_path: P) -> anyhow::Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory {}", parent.display()))?;
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open {}", db_path.display()))?;
        schema::apply_pragmas(&conn)?;
        schema::apply_schema(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::apply_schema(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredDocument>, StoreError> {
        let conn = self.conn.clone();
        let collection = collection.to_string();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<StoredDocument>, StoreError> {
            let conn = conn.lock();
            let row = conn
                .query_row(
                    "SELECT body, created_at FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection, id],
                    |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)),
                )
                .optional()?;
            let Some((body, created_at)) = row else {
                return Ok(None);
            };
            let document: AnalysisDocument = serde_json::from_str(&body)?;
            let timestamp = DateTime::parse_from_rfc3339(&created_at)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| StoreError::Task(format!("bad created_at {:?}: {}", created_at, e)))?;
            Ok(Some(StoredDocument { id, timestamp, document }))
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    pub async fn count(&self, collection: &str) -> Result<i64, StoreError> {
        let conn = self.conn.clone();
        let collection = collection.to_string();
        tokio::task::spawn_blocking(move || -> Result<i64, StoreError> {
            let conn = conn.lock();
            let n = conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                params![collection],
                |r| r.get(0),
            )?;
            Ok(n)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn insert(&self, collection: &str, doc: &AnalysisDocument) -> Result<String, StoreError> {
        let body = serde_json::to_string(doc)?;
        let conn = self.conn.clone();
        let collection = collection.to_string();
        tokio::task::spawn_blocking(move || -> Result<String, StoreError> {
            let id = uuid::Uuid::new_v4().to_string();
            let conn = conn.lock();
            conn.execute(
                "INSERT INTO documents (id, collection, body) VALUES (?1, ?2, ?3)",
                params![id, collection, body],
            )?;
            Ok(id)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}
