//! Bearer tokens for the Firestore REST API.
//!
//! A service-account key is exchanged for a short-lived OAuth access token
//! with a signed JWT grant. The token is cached and refreshed shortly before
//! it expires.

use std::time::{Duration, Instant};

use anyhow::Context;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::firestore::Credentials;
use super::StoreError;

pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct GrantClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME_SECS as u64
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

pub struct ServiceAccount {
    client_email: String,
    key_id: Option<String>,
    key: EncodingKey,
    token_uri: String,
    cached: Mutex<Option<CachedToken>>,
}

pub enum TokenSource {
    /// Token handed over as-is, e.g. `owner` for the emulator.
    Static(String),
    ServiceAccount(ServiceAccount),
}

impl TokenSource {
    /// Prefer the service-account key; fall back to a pre-minted token.
    pub fn from_credentials(creds: &Credentials) -> anyhow::Result<Self> {
        if let (Some(pem), Some(email)) = (&creds.private_key, &creds.client_email) {
            let key = EncodingKey::from_rsa_pem(pem.as_bytes()).context("Invalid service-account private_key")?;
            return Ok(TokenSource::ServiceAccount(ServiceAccount {
                client_email: email.clone(),
                key_id: creds.private_key_id.clone(),
                key,
                token_uri: creds.token_uri.clone().unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
                cached: Mutex::new(None),
            }));
        }
        match &creds.access_token {
            Some(token) => Ok(TokenSource::Static(token.clone())),
            None => anyhow::bail!("credentials carry neither a service-account key nor an access_token"),
        }
    }

    pub async fn token(&self, client: &reqwest::Client) -> Result<String, StoreError> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::ServiceAccount(account) => account.token(client).await,
        }
    }
}

impl ServiceAccount {
    async fn token(&self, client: &reqwest::Client) -> Result<String, StoreError> {
        let mut cached = self.cached.lock().await;
        if let Some(c) = cached.as_ref() {
            if Instant::now() < c.refresh_at {
                return Ok(c.token.clone());
            }
        }
        let fetched = self.fetch(client).await?;
        let token = fetched.access_token.clone();
        let lifetime = Duration::from_secs(fetched.expires_in).saturating_sub(REFRESH_MARGIN);
        *cached = Some(CachedToken { token: fetched.access_token, refresh_at: Instant::now() + lifetime });
        Ok(token)
    }

    fn assertion(&self) -> Result<String, StoreError> {
        let iat = chrono::Utc::now().timestamp();
        let claims = GrantClaims {
            iss: &self.client_email,
            scope: DATASTORE_SCOPE,
            aud: &self.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();
        jsonwebtoken::encode(&header, &claims, &self.key).map_err(|e| StoreError::Auth(e.to_string()))
    }

    async fn fetch(&self, client: &reqwest::Client) -> Result<TokenResponse, StoreError> {
        let assertion = self.assertion()?;
        debug!(token_uri = %self.token_uri, account = %self.client_email, "requesting access token");
        let resp = client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Auth(format!("token endpoint returned {}: {}", status.as_u16(), body)));
        }
        Ok(resp.json::<TokenResponse>().await?)
    }
}
