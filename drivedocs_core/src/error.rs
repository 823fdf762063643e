// src/error.rs
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Credential missing, invalid, or refresh failed. The user has to re-authenticate.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Malformed tool input, reported back as-is and never retried.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown document, tab, or file id.
    #[error("Not found: {0}")]
    ResourceNotFound(String),

    /// Transport or remote-side failure, carrying whatever detail the API supplied.
    #[error("Remote API error: {0}")]
    RemoteApi(String),

    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Method not found")]
    MethodNotFound,

    #[error("Parse error")]
    ParseError,

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ConnectorError {
    pub fn code_str(&self) -> &'static str {
        match self {
            ConnectorError::InvalidInput(_) => "invalid_input",
            ConnectorError::InvalidParams(_) => "invalid_params",
            ConnectorError::Authentication(_) => "auth_failed",
            ConnectorError::ResourceNotFound(_) => "not_found",
            ConnectorError::ToolNotFound(_) => "tool_not_found",
            ConnectorError::MethodNotFound => "method_not_found",
            ConnectorError::ParseError => "parse_error",
            ConnectorError::RemoteApi(_) => "upstream_error",
            ConnectorError::HttpRequest(_) => "upstream_error",
            ConnectorError::SerdeJson(_) => "internal_error",
            ConnectorError::InternalError(_) => "internal_error",
        }
    }

    pub fn to_jsonrpc_error(&self) -> serde_json::Value {
        let (code, message) = match self {
            ConnectorError::ToolNotFound(name) => (-32602, format!("Tool not found: {}", name)),
            ConnectorError::InvalidParams(msg) => (-32602, msg.to_string()),
            ConnectorError::InvalidInput(msg) => (-32602, msg.to_string()),
            ConnectorError::SerdeJson(e) => (-32602, format!("Invalid params: {}", e)),
            ConnectorError::MethodNotFound => (-32601, "Method not found".to_string()),
            ConnectorError::ParseError => (-32700, "Parse error".to_string()),
            err => (-32603, err.to_string()),
        };

        json!({
            "code": code,
            "message": message,
        })
    }

    /// True for the errors a caller can fix by re-issuing the call with different input.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            ConnectorError::InvalidInput(_)
                | ConnectorError::InvalidParams(_)
                | ConnectorError::ResourceNotFound(_)
        )
    }
}
