//! Credential acquisition and refresh.
//!
//! The provider is owned by the server process and shared with both API adapters.
//! The underlying authenticator is built lazily on first use, access tokens are
//! cached with their expiry, and refresh goes through a single-writer lock so
//! concurrent callers never race on token renewal.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell, RwLock};
use tracing::{debug, info};

use crate::config::{
    ensure_parent_dir, AuthSettings, CredentialSource, DOCUMENTS_SCOPE, DRIVE_SCOPE,
};
use crate::error::ConnectorError;
use crate::oauth_client::{GoogleAuthenticator, StderrFlowDelegate};

/// Tokens with less than this many seconds left are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 60;

const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeGrant {
    ReadOnly,
    ReadWrite,
}

impl ScopeGrant {
    pub fn from_scopes(scopes: &[String]) -> Self {
        let writable = scopes
            .iter()
            .any(|s| s == DRIVE_SCOPE || s == DOCUMENTS_SCOPE || s == DRIVE_FILE_SCOPE);
        if writable {
            ScopeGrant::ReadWrite
        } else {
            ScopeGrant::ReadOnly
        }
    }

    pub fn allows_write(self) -> bool {
        matches!(self, ScopeGrant::ReadWrite)
    }
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl IssuedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - now > chrono::Duration::seconds(REFRESH_MARGIN_SECS),
            None => true,
        }
    }
}

/// Something that can mint access tokens for a set of scopes.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self, scopes: &[String]) -> Result<IssuedToken, ConnectorError>;
}

/// Bearer token plus the capability it was granted with.
#[derive(Debug, Clone)]
pub struct AuthorizedClient {
    access_token: String,
    grant: ScopeGrant,
}

impl AuthorizedClient {
    pub fn bearer(&self) -> &str {
        &self.access_token
    }

    pub fn grant(&self) -> ScopeGrant {
        self.grant
    }

    pub fn ensure_read_write(&self) -> Result<(), ConnectorError> {
        if self.grant.allows_write() {
            Ok(())
        } else {
            Err(ConnectorError::Authentication(
                "configured scopes are read-only; re-authenticate with the drive or documents scope to edit documents".to_string(),
            ))
        }
    }
}

pub struct CredentialProvider {
    settings: AuthSettings,
    source: OnceCell<Arc<dyn TokenSource>>,
    cached: RwLock<Option<IssuedToken>>,
    refresh_lock: Mutex<()>,
}

impl CredentialProvider {
    pub fn new(settings: AuthSettings) -> Self {
        Self {
            settings,
            source: OnceCell::new(),
            cached: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Use an already-built token source instead of the Google authenticator.
    pub fn with_token_source(settings: AuthSettings, source: Arc<dyn TokenSource>) -> Self {
        Self {
            settings,
            source: OnceCell::new_with(Some(source)),
            cached: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn scope_grant(&self) -> ScopeGrant {
        ScopeGrant::from_scopes(&self.settings.scopes)
    }

    pub async fn get_client(&self) -> Result<AuthorizedClient, ConnectorError> {
        if let Some(token) = self.fresh_cached().await {
            return Ok(self.authorized(token));
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited.
        if let Some(token) = self.fresh_cached().await {
            return Ok(self.authorized(token));
        }

        let source = self.token_source().await?;
        debug!("Fetching Google access token");
        let issued = source.fetch_token(&self.settings.scopes).await?;
        let access_token = issued.access_token.clone();
        *self.cached.write().await = Some(issued);
        Ok(self.authorized(access_token))
    }

    /// Run the credential flow now, persisting the token cache when the source supports it.
    pub async fn login(&self) -> Result<ScopeGrant, ConnectorError> {
        let client = self.get_client().await?;
        info!("Authenticated with {}", self.settings.describe_source());
        Ok(client.grant())
    }

    async fn fresh_cached(&self) -> Option<String> {
        let cached = self.cached.read().await;
        cached
            .as_ref()
            .filter(|t| t.is_fresh(Utc::now()))
            .map(|t| t.access_token.clone())
    }

    fn authorized(&self, access_token: String) -> AuthorizedClient {
        AuthorizedClient {
            access_token,
            grant: self.scope_grant(),
        }
    }

    async fn token_source(&self) -> Result<&Arc<dyn TokenSource>, ConnectorError> {
        self.source
            .get_or_try_init(|| async {
                let source = YupTokenSource::from_source(&self.settings.source).await?;
                Ok::<Arc<dyn TokenSource>, ConnectorError>(Arc::new(source))
            })
            .await
    }
}

/// Token source backed by a yup-oauth2 authenticator.
pub struct YupTokenSource {
    authenticator: GoogleAuthenticator,
}

impl YupTokenSource {
    pub async fn from_source(source: &CredentialSource) -> Result<Self, ConnectorError> {
        let authenticator = match source {
            CredentialSource::OAuthUser {
                client_secret_path,
                token_cache_path,
            } => {
                let secret = yup_oauth2::read_application_secret(client_secret_path)
                    .await
                    .map_err(|e| {
                        ConnectorError::Authentication(format!(
                            "Credentials file not found or unreadable at {}: {}. Download it from the Google Cloud Console.",
                            client_secret_path.display(),
                            e
                        ))
                    })?;
                ensure_parent_dir(token_cache_path).map_err(|e| {
                    ConnectorError::Authentication(format!(
                        "cannot create token cache directory for {}: {}",
                        token_cache_path.display(),
                        e
                    ))
                })?;
                yup_oauth2::InstalledFlowAuthenticator::builder(
                    secret,
                    yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
                )
                .persist_tokens_to_disk(token_cache_path.clone())
                .flow_delegate(Box::new(StderrFlowDelegate))
                .build()
                .await
                .map_err(|e| {
                    ConnectorError::Authentication(format!("oauth client setup failed: {}", e))
                })?
            }
            CredentialSource::ServiceAccount { key_path } => {
                let key = yup_oauth2::read_service_account_key(key_path)
                    .await
                    .map_err(|e| {
                        ConnectorError::Authentication(format!(
                            "Service account key not found or unreadable at {}: {}",
                            key_path.display(),
                            e
                        ))
                    })?;
                yup_oauth2::ServiceAccountAuthenticator::builder(key)
                    .build()
                    .await
                    .map_err(|e| {
                        ConnectorError::Authentication(format!(
                            "service account setup failed: {}",
                            e
                        ))
                    })?
            }
        };
        Ok(Self { authenticator })
    }
}

#[async_trait]
impl TokenSource for YupTokenSource {
    async fn fetch_token(&self, scopes: &[String]) -> Result<IssuedToken, ConnectorError> {
        let token = self
            .authenticator
            .token(scopes)
            .await
            .map_err(|e| ConnectorError::Authentication(format!("token refresh failed: {}", e)))?;
        let access_token = token
            .token()
            .ok_or_else(|| {
                ConnectorError::Authentication("authenticator returned no access token".into())
            })?
            .to_string();
        let expires_at = token
            .expiration_time()
            .and_then(|t| DateTime::<Utc>::from_timestamp(t.unix_timestamp(), 0));
        Ok(IssuedToken {
            access_token,
            expires_at,
        })
    }
}
