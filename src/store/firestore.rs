//! Firestore REST client for writing analysis documents.
//!
//! Documents are written with a single `documents:commit` call so the
//! `timestamp` field can be filled by the server (`REQUEST_TIME`) instead of
//! the local clock. Requests carry a bearer token from [`TokenSource`].

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::auth::TokenSource;
use super::{DocumentStore, StoreError};
use crate::models::analysis::AnalysisDocument;

const DEFAULT_ENDPOINT: &str = "https://firestore.googleapis.com";
const AUTO_ID_LEN: usize = 20;

/// Contents of the credentials file, read once at startup: a service-account
/// key file, or a project id plus a ready-made `access_token`.
#[derive(Clone, Default, Deserialize)]
pub struct Credentials {
    pub project_id: String,
    #[serde(default)]
    pub client_email: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    /// Override for the emulator or a private endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Credentials {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let creds: Credentials = serde_json::from_str(&text).context("Invalid credentials JSON")?;
        anyhow::ensure!(
            creds.access_token.is_some() || (creds.private_key.is_some() && creds.client_email.is_some()),
            "credentials need private_key and client_email, or an access_token"
        );
        Ok(creds)
    }
}

pub struct FirestoreStore {
    client: reqwest::Client,
    endpoint: String,
    documents_root: String,
    auth: TokenSource,
}

impl FirestoreStore {
    pub fn new(creds: Credentials) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build Firestore HTTP client")?;
        let endpoint = creds
            .endpoint
            .as_deref()
            .unwrap_or(DEFAULT_ENDPOINT)
            .trim_end_matches('/')
            .to_string();
        let database = creds.database.as_deref().unwrap_or("(default)");
        let auth = TokenSource::from_credentials(&creds)?;
        Ok(Self {
            client,
            endpoint,
            documents_root: format!("projects/{}/databases/{}/documents", creds.project_id, database),
            auth,
        })
    }

    fn commit_url(&self) -> String {
        format!("{}/v1/{}:commit", self.endpoint, self.documents_root)
    }

    fn commit_body(&self, collection: &str, id: &str, doc: &AnalysisDocument) -> Result<Value, StoreError> {
        let fields = match serde_json::to_value(doc)? {
            Value::Object(map) => encode_fields(&map),
            other => encode_fields(&Map::from_iter([("value".to_string(), other)])),
        };
        Ok(json!({
            "writes": [{
                "update": {
                    "name": format!("{}/{}/{}", self.documents_root, collection, id),
                    "fields": fields,
                },
                "currentDocument": {"exists": false},
                "updateTransforms": [{
                    "fieldPath": "timestamp",
                    "setToServerValue": "REQUEST_TIME",
                }],
            }]
        }))
    }
}

/// Random 20-character document id, the same shape client libraries generate.
pub fn auto_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(AUTO_ID_LEN)
        .map(char::from)
        .collect()
}

/// Encode a JSON value as a Firestore typed `Value`.
pub fn encode_value(v: &Value) -> Value {
    match v {
        Value::Null => json!({"nullValue": null}),
        Value::Bool(b) => json!({"booleanValue": b}),
        Value::Number(n) => match n.as_i64() {
            // int64 travels as a decimal string
            Some(i) => json!({"integerValue": i.to_string()}),
            None => json!({"doubleValue": n.as_f64().unwrap_or(0.0)}),
        },
        Value::String(s) => json!({"stringValue": s}),
        Value::Array(items) => json!({"arrayValue": {"values": items.iter().map(encode_value).collect::<Vec<_>>()}}),
        Value::Object(map) => json!({"mapValue": {"fields": encode_fields(map)}}),
    }
}

pub fn encode_fields(map: &Map<String, Value>) -> Value {
    Value::Object(map.iter().map(|(k, v)| (k.clone(), encode_value(v))).collect())
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    fn name(&self) -> &'static str {
        "firestore"
    }

    async fn insert(&self, collection: &str, doc: &AnalysisDocument) -> Result<String, StoreError> {
        let id = auto_id();
        let body = self.commit_body(collection, &id, doc)?;
        let token = self.auth.token(&self.client).await?;
        let resp = self.client.post(self.commit_url()).bearer_auth(token).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Rejected { status: status.as_u16(), body });
        }
        Ok(id)
    }
}
