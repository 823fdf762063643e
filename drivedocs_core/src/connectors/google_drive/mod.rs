use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use google_drive3 as drive3;

use crate::credentials::CredentialProvider;
use crate::error::ConnectorError;
use crate::oauth_client::google_client::{new_https_client, HttpsConnector};

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

const ROOT_FOLDER: &str = "root";
const FILE_FIELDS: &str = "nextPageToken, files(id, name, mimeType, modifiedTime, size, parents)";

/// Page size accepted by `files.list`, always within `[1, MAX_PAGE_SIZE]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageSize(i32);

impl PageSize {
    pub fn clamped(requested: i64) -> Self {
        Self(requested.clamp(1, MAX_PAGE_SIZE) as i32)
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self(DEFAULT_PAGE_SIZE as i32)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileMetadata {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
}

impl From<drive3::api::File> for FileMetadata {
    fn from(f: drive3::api::File) -> Self {
        Self {
            id: f.id.unwrap_or_default(),
            name: f.name.unwrap_or_default(),
            mime_type: f.mime_type.unwrap_or_default(),
            parents: f.parents.unwrap_or_default(),
            modified_time: f.modified_time.map(|dt| dt.to_rfc3339()),
            size: f.size,
        }
    }
}

/// One page of a Drive listing. `next_page_token` is absent once the listing is exhausted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilePage {
    pub files: Vec<FileMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListFilesQuery {
    pub folder_id: Option<String>,
    pub page_size: PageSize,
    pub page_token: Option<String>,
    pub mime_type: Option<String>,
}

impl ListFilesQuery {
    pub fn to_drive_query(&self) -> String {
        let folder = self.folder_id.as_deref().unwrap_or(ROOT_FOLDER);
        let mut parts = vec![format!("'{}' in parents", escape_query_value(folder))];
        if let Some(mime) = &self.mime_type {
            parts.push(format!("mimeType='{}'", escape_query_value(mime)));
        }
        parts.push("trashed=false".to_string());
        parts.join(" and ")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilesQuery {
    /// Raw Drive query grammar, passed through untouched.
    pub query: String,
    pub page_size: PageSize,
    pub page_token: Option<String>,
}

impl SearchFilesQuery {
    pub fn to_drive_query(&self) -> String {
        format!("({}) and trashed=false", self.query)
    }
}

// Drive query strings quote values with single quotes and escape with backslashes.
fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[async_trait]
pub trait DriveApi: Send + Sync {
    async fn list_files(&self, query: &ListFilesQuery) -> Result<FilePage, ConnectorError>;
    async fn search_files(&self, query: &SearchFilesQuery) -> Result<FilePage, ConnectorError>;
}

/// `files.list` through google-drive3.
pub struct GoogleDrive {
    credentials: Arc<CredentialProvider>,
    http: hyper::Client<HttpsConnector, hyper::Body>,
}

impl GoogleDrive {
    pub fn new(credentials: Arc<CredentialProvider>) -> Self {
        Self {
            credentials,
            http: new_https_client(),
        }
    }

    async fn files_list(
        &self,
        q: &str,
        page_size: PageSize,
        page_token: Option<&str>,
    ) -> Result<FilePage, ConnectorError> {
        let client = self.credentials.get_client().await?;
        let hub = drive3::DriveHub::new(self.http.clone(), client.bearer().to_string());

        debug!(query = q, page_size = page_size.get(), "drive files.list");
        let mut call = hub
            .files()
            .list()
            .q(q)
            .page_size(page_size.get())
            .param("fields", FILE_FIELDS);
        if let Some(token) = page_token {
            call = call.page_token(token);
        }
        let (_, file_list) = call.doit().await.map_err(|e| {
            warn!("drive files.list failed: {}", e);
            ConnectorError::RemoteApi(format!("drive error: {}", e))
        })?;

        Ok(FilePage {
            files: file_list
                .files
                .unwrap_or_default()
                .into_iter()
                .map(FileMetadata::from)
                .collect(),
            next_page_token: file_list.next_page_token.filter(|t| !t.is_empty()),
        })
    }
}

#[async_trait]
impl DriveApi for GoogleDrive {
    async fn list_files(&self, query: &ListFilesQuery) -> Result<FilePage, ConnectorError> {
        self.files_list(
            &query.to_drive_query(),
            query.page_size,
            query.page_token.as_deref(),
        )
        .await
    }

    async fn search_files(&self, query: &SearchFilesQuery) -> Result<FilePage, ConnectorError> {
        self.files_list(
            &query.to_drive_query(),
            query.page_size,
            query.page_token.as_deref(),
        )
        .await
    }
}
