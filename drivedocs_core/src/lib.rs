// src/lib.rs
pub mod config;
pub mod connectors;
pub mod credentials;
pub mod error;
pub mod mcp_server;
pub mod oauth_client;
pub mod tools;
pub mod transport;

use std::sync::Arc;

// Re-export the rmcp model types that appear in the public API
pub use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, Implementation, InitializeRequestParam,
    InitializeResult, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
    ServerCapabilities, Tool,
};

use async_trait::async_trait;

use crate::connectors::google_docs::GoogleDocs;
use crate::connectors::google_drive::GoogleDrive;
use crate::credentials::CredentialProvider;
pub use crate::error::ConnectorError;
use crate::tools::DriveDocsConnector;

#[async_trait]
pub trait Connector: Send + Sync {
    /// Returns the unique name of the connector (acting as the MCP server name).
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    async fn capabilities(&self) -> ServerCapabilities;

    async fn list_tools(
        &self,
        request: Option<PaginatedRequestParam>,
    ) -> Result<ListToolsResult, ConnectorError>;

    /// Domain failures come back as a result with `is_error` set; `Err` is reserved
    /// for protocol-level problems such as an unknown tool.
    async fn call_tool(
        &self,
        request: CallToolRequestParam,
    ) -> Result<CallToolResult, ConnectorError>;
}

/// Wire the Google adapters to one shared credential provider.
pub fn build_google_connector(
    credentials: Arc<CredentialProvider>,
) -> Result<DriveDocsConnector, ConnectorError> {
    let drive = GoogleDrive::new(credentials.clone());
    let docs = GoogleDocs::new(credentials)?;
    Ok(DriveDocsConnector::new(Arc::new(drive), Arc::new(docs)))
}
