//! The four Drive/Docs tools: argument decoding, validation, dispatch and rendering.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::connectors::google_docs::{DocsApi, Document, DocumentEdit, EditKind};
use crate::connectors::google_drive::{
    DriveApi, FilePage, ListFilesQuery, PageSize, SearchFilesQuery, DEFAULT_PAGE_SIZE,
};
use crate::error::ConnectorError;
use crate::{
    CallToolRequestParam, CallToolResult, Connector, Content, ListToolsResult,
    PaginatedRequestParam, ServerCapabilities, Tool,
};

pub const DEFAULT_READ_LENGTH: i64 = 5000;
pub const MAX_READ_LENGTH: i64 = 10_000;

const SEPARATOR_WIDTH: usize = 50;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListFilesArgs {
    /// Folder to list. Defaults to the root of My Drive.
    #[serde(default)]
    pub folder_id: Option<String>,
    /// Number of files to return (1-100, default 50)
    #[serde(default)]
    pub page_size: Option<i64>,
    /// Token from a previous call's "Next page token" line
    #[serde(default)]
    pub page_token: Option<String>,
    /// Only return files of this MIME type, e.g. application/vnd.google-apps.document
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchFilesArgs {
    /// Drive query, e.g. "name contains 'report'" or "fullText contains 'budget'"
    pub query: String,
    /// Number of files to return (1-100, default 50)
    #[serde(default)]
    pub page_size: Option<i64>,
    #[serde(default)]
    pub page_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ReadDocumentArgs {
    /// The Google Docs document id
    pub document_id: String,
    /// Tab to read. Defaults to the first tab.
    #[serde(default)]
    pub tab_id: Option<String>,
    /// Character offset to start reading from (default 0)
    #[serde(default)]
    pub start_index: Option<i64>,
    /// Number of characters to return (1-10000, default 5000)
    #[serde(default)]
    pub length: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct WriteDocumentArgs {
    /// The Google Docs document id
    pub document_id: String,
    /// Text to write. May be empty only when replacing, which deletes the range.
    pub content: String,
    #[serde(default)]
    pub tab_id: Option<String>,
    /// Insert at this document index. Cannot be combined with replace_start/replace_end.
    #[serde(default)]
    pub insert_index: Option<i64>,
    /// Start of the range to replace (requires replace_end)
    #[serde(default)]
    pub replace_start: Option<i64>,
    /// End of the range to replace (requires replace_start)
    #[serde(default)]
    pub replace_end: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteMode {
    Insert { index: i64 },
    Replace { start: i64, end: i64 },
    Append,
}

impl WriteDocumentArgs {
    pub fn write_mode(&self) -> Result<WriteMode, ConnectorError> {
        let mode = match (self.insert_index, self.replace_start, self.replace_end) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                return Err(ConnectorError::InvalidInput(
                    "insert_index cannot be combined with replace_start/replace_end".to_string(),
                ))
            }
            (Some(index), None, None) => WriteMode::Insert { index },
            (None, Some(start), Some(end)) => {
                if start > end {
                    return Err(ConnectorError::InvalidInput(format!(
                        "replace_start ({}) must not be greater than replace_end ({})",
                        start, end
                    )));
                }
                WriteMode::Replace { start, end }
            }
            (None, Some(_), None) | (None, None, Some(_)) => {
                return Err(ConnectorError::InvalidInput(
                    "replace_start and replace_end must be given together".to_string(),
                ))
            }
            (None, None, None) => WriteMode::Append,
        };

        if self.content.is_empty() && !matches!(mode, WriteMode::Replace { .. }) {
            return Err(ConnectorError::InvalidInput(
                "content must not be empty".to_string(),
            ));
        }
        Ok(mode)
    }
}

/// A decoded tool call.
#[derive(Debug)]
pub enum ToolRequest {
    ListFiles(ListFilesArgs),
    SearchFiles(SearchFilesArgs),
    ReadDocument(ReadDocumentArgs),
    WriteDocument(WriteDocumentArgs),
}

impl ToolRequest {
    /// Unknown names are protocol errors; bad arguments are caller errors.
    pub fn decode(name: &str, arguments: Option<Map<String, Value>>) -> Result<Self, ConnectorError> {
        let args = Value::Object(arguments.unwrap_or_default());
        match name {
            "list_files" => decode_args(args).map(ToolRequest::ListFiles),
            "search_files" => decode_args(args).map(ToolRequest::SearchFiles),
            "read_document" => decode_args(args).map(ToolRequest::ReadDocument),
            "write_document" => decode_args(args).map(ToolRequest::WriteDocument),
            other => Err(ConnectorError::ToolNotFound(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolRequest::ListFiles(_) => "list_files",
            ToolRequest::SearchFiles(_) => "search_files",
            ToolRequest::ReadDocument(_) => "read_document",
            ToolRequest::WriteDocument(_) => "write_document",
        }
    }
}

fn decode_args<T: DeserializeOwned>(args: Value) -> Result<T, ConnectorError> {
    serde_json::from_value(args)
        .map_err(|e| ConnectorError::InvalidInput(format!("invalid arguments: {}", e)))
}

fn input_schema<T: JsonSchema>() -> Result<Arc<Map<String, Value>>, ConnectorError> {
    match serde_json::to_value(schemars::schema_for!(T))? {
        Value::Object(map) => Ok(Arc::new(map)),
        _ => Err(ConnectorError::InternalError(
            "tool schema is not an object".to_string(),
        )),
    }
}

/// Serves the Drive and Docs tools over whichever adapters it was built with.
pub struct DriveDocsConnector {
    drive: Arc<dyn DriveApi>,
    docs: Arc<dyn DocsApi>,
}

impl DriveDocsConnector {
    pub fn new(drive: Arc<dyn DriveApi>, docs: Arc<dyn DocsApi>) -> Self {
        Self { drive, docs }
    }

    async fn dispatch(&self, request: ToolRequest) -> Result<CallToolResult, ConnectorError> {
        match request {
            ToolRequest::ListFiles(args) => {
                let query = ListFilesQuery {
                    folder_id: args.folder_id,
                    page_size: PageSize::clamped(args.page_size.unwrap_or(DEFAULT_PAGE_SIZE)),
                    page_token: args.page_token,
                    mime_type: args.mime_type,
                };
                let page = self.drive.list_files(&query).await?;
                page_result(&page, None)
            }
            ToolRequest::SearchFiles(args) => {
                let query = SearchFilesQuery {
                    query: args.query,
                    page_size: PageSize::clamped(args.page_size.unwrap_or(DEFAULT_PAGE_SIZE)),
                    page_token: args.page_token,
                };
                let page = self.drive.search_files(&query).await?;
                page_result(&page, Some(query.query.as_str()))
            }
            ToolRequest::ReadDocument(args) => self.read_document(args).await,
            ToolRequest::WriteDocument(args) => self.write_document(args).await,
        }
    }

    async fn read_document(&self, args: ReadDocumentArgs) -> Result<CallToolResult, ConnectorError> {
        let start_index = args.start_index.unwrap_or(0);
        let length = args.length.unwrap_or(DEFAULT_READ_LENGTH);
        if start_index < 0 {
            return Err(ConnectorError::InvalidInput(format!(
                "start_index must be non-negative, got {}",
                start_index
            )));
        }
        if length < 1 {
            return Err(ConnectorError::InvalidInput(format!(
                "length must be at least 1, got {}",
                length
            )));
        }
        let length = length.min(MAX_READ_LENGTH);

        let document = self.docs.get_document(&args.document_id).await?;
        let tab = document.resolve_tab(args.tab_id.as_deref())?;
        let window = TextWindow::slice(&tab.text(), start_index as usize, length as usize);

        let mut text = format!("Document: {}\n", document.title);
        if let Some(tab_id) = &args.tab_id {
            text.push_str(&format!("Tab: {}\n", tab_id));
        }
        text.push_str(&format!(
            "Content ({}-{} of {} characters):\n",
            window.start, window.end, window.total
        ));
        text.push_str(&separator());
        text.push('\n');
        text.push_str(&window.content);
        if window.has_more() {
            text.push('\n');
            text.push_str(&separator());
            text.push_str(&format!(
                "\nMore content available. Use start_index={} to continue.",
                window.end
            ));
        }

        let structured = json!({
            "document_id": document.document_id,
            "title": document.title,
            "tab_id": args.tab_id,
            "start_index": window.start,
            "end_index": window.end,
            "total_length": window.total,
            "has_more": window.has_more(),
            "content": window.content,
        });
        Ok(text_result(text, Some(structured)))
    }

    async fn write_document(
        &self,
        args: WriteDocumentArgs,
    ) -> Result<CallToolResult, ConnectorError> {
        let mode = args.write_mode()?;

        let document: Document = self.docs.get_document(&args.document_id).await?;
        let tab = document.resolve_tab(args.tab_id.as_deref())?;

        let (kind, operation) = match mode {
            WriteMode::Replace { start, end } => (
                EditKind::Replace {
                    start,
                    end,
                    text: args.content.clone(),
                },
                format!("Replaced content from index {} to {}", start, end),
            ),
            WriteMode::Insert { index } => (
                EditKind::Insert {
                    index,
                    text: args.content.clone(),
                },
                format!("Inserted content at index {}", index),
            ),
            WriteMode::Append => {
                let index = tab.append_index();
                (
                    EditKind::Insert {
                        index,
                        text: args.content.clone(),
                    },
                    format!("Inserted content at index {}", index),
                )
            }
        };
        let edit = DocumentEdit {
            tab_id: args.tab_id.clone(),
            kind,
        };
        self.docs.apply_edit(&document.document_id, &edit).await?;

        let written = args.content.chars().count();
        info!(document_id = %document.document_id, written, "document updated");
        let text = format!(
            "Successfully wrote to document '{}'. {}. {} characters written.",
            document.title, operation, written
        );
        Ok(text_result(text, None))
    }
}

#[async_trait]
impl Connector for DriveDocsConnector {
    fn name(&self) -> &'static str {
        "google-drive"
    }

    fn description(&self) -> &'static str {
        "List and search Google Drive files; read and edit Google Docs."
    }

    async fn capabilities(&self) -> ServerCapabilities {
        ServerCapabilities {
            tools: Some(Default::default()),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
    ) -> Result<ListToolsResult, ConnectorError> {
        let tools = vec![
            Tool {
                name: Cow::Borrowed("list_files"),
                title: None,
                description: Some(Cow::Borrowed("List files in a Google Drive folder (default: My Drive root). Supports MIME type filtering and pagination.")),
                input_schema: input_schema::<ListFilesArgs>()?,
                output_schema: None,
                annotations: None,
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("search_files"),
                title: None,
                description: Some(Cow::Borrowed("Search Google Drive using Drive query syntax, e.g. \"name contains 'report'\" or \"fullText contains 'budget'\". Trashed files are excluded.")),
                input_schema: input_schema::<SearchFilesArgs>()?,
                output_schema: None,
                annotations: None,
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("read_document"),
                title: None,
                description: Some(Cow::Borrowed("Read the text of a Google Docs document or one of its tabs, a window of up to 10000 characters at a time.")),
                input_schema: input_schema::<ReadDocumentArgs>()?,
                output_schema: None,
                annotations: None,
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("write_document"),
                title: None,
                description: Some(Cow::Borrowed("Write to a Google Docs document: insert at insert_index, replace the range replace_start..replace_end, or append to the end when neither is given.")),
                input_schema: input_schema::<WriteDocumentArgs>()?,
                output_schema: None,
                annotations: None,
                icons: None,
            },
        ];

        Ok(ListToolsResult {
            tools,
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
    ) -> Result<CallToolResult, ConnectorError> {
        let tool_request = match ToolRequest::decode(&request.name, request.arguments) {
            Ok(r) => r,
            Err(e @ ConnectorError::ToolNotFound(_)) => return Err(e),
            Err(e) => return Ok(error_result(request.name.as_ref(), &e)),
        };
        let name = tool_request.name();
        debug!(tool = name, "calling tool");

        match self.dispatch(tool_request).await {
            Ok(result) => Ok(result),
            Err(e) => Ok(error_result(name, &e)),
        }
    }
}

/// A character window over flattened document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextWindow {
    pub start: usize,
    pub end: usize,
    pub total: usize,
    pub content: String,
}

impl TextWindow {
    /// Offsets count chars, not bytes. A start past the end yields an empty window.
    pub fn slice(text: &str, start: usize, length: usize) -> Self {
        let total = text.chars().count();
        let start = start.min(total);
        let end = start.saturating_add(length).min(total);
        let content = text.chars().skip(start).take(end - start).collect();
        Self {
            start,
            end,
            total,
            content,
        }
    }

    pub fn has_more(&self) -> bool {
        self.end < self.total
    }
}

fn separator() -> String {
    "=".repeat(SEPARATOR_WIDTH)
}

pub fn format_file_page(page: &FilePage, search_query: Option<&str>) -> String {
    let mut lines = Vec::new();
    if let Some(q) = search_query {
        lines.push(format!("Search results for: {}", q));
    }
    lines.push(format!("Found {} files", page.files.len()));
    lines.push(String::new());
    for file in &page.files {
        let size = file
            .size
            .map(|s| format!(" ({} bytes)", s))
            .unwrap_or_default();
        lines.push(format!("- {} (ID: {})", file.name, file.id));
        lines.push(format!("  Type: {}{}", file.mime_type, size));
        lines.push(format!(
            "  Modified: {}",
            file.modified_time.as_deref().unwrap_or("Unknown")
        ));
        lines.push(String::new());
    }
    if let Some(token) = &page.next_page_token {
        lines.push(format!("Next page token: {}", token));
    }
    lines.join("\n")
}

fn page_result(page: &FilePage, search_query: Option<&str>) -> Result<CallToolResult, ConnectorError> {
    let structured = serde_json::to_value(page)?;
    Ok(text_result(
        format_file_page(page, search_query),
        Some(structured),
    ))
}

fn text_result(text: String, structured: Option<Value>) -> CallToolResult {
    CallToolResult {
        content: vec![Content::text(text)],
        structured_content: structured,
        is_error: Some(false),
        meta: None,
    }
}

pub fn error_result(tool: &str, error: &ConnectorError) -> CallToolResult {
    if error.is_caller_error() {
        debug!(tool, code = error.code_str(), "tool call rejected: {}", error);
    } else {
        warn!(tool, code = error.code_str(), "tool call failed: {}", error);
    }
    CallToolResult {
        content: vec![Content::text(format!(
            "Error ({}): {}",
            error.code_str(),
            error
        ))],
        structured_content: None,
        is_error: Some(true),
        meta: None,
    }
}
