use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::credentials::CredentialProvider;
use crate::error::ConnectorError;

pub mod types;

use types::RawDocument;

const DOCS_API_BASE: &str = "https://docs.googleapis.com/v1/documents";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentTab {
    /// Empty for documents returned without tab content.
    pub tab_id: String,
    pub title: Option<String>,
    pub runs: Vec<TextRun>,
    /// End index of the last structural element of the tab body.
    pub end_index: i64,
}

impl DocumentTab {
    /// The tab's text with every run concatenated in document order.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.content.as_str()).collect()
    }

    /// Last valid insertion point: inserts must land before the body's trailing newline.
    pub fn append_index(&self) -> i64 {
        (self.end_index - 1).max(1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub document_id: String,
    pub title: String,
    pub tabs: Vec<DocumentTab>,
}

impl Document {
    pub fn primary_tab(&self) -> Option<&DocumentTab> {
        self.tabs.first()
    }

    pub fn tab_ids(&self) -> Vec<&str> {
        self.tabs.iter().map(|t| t.tab_id.as_str()).collect()
    }

    /// The named tab, or the primary tab when `tab_id` is `None`.
    pub fn resolve_tab(&self, tab_id: Option<&str>) -> Result<&DocumentTab, ConnectorError> {
        match tab_id {
            Some(id) => self.tabs.iter().find(|t| t.tab_id == id).ok_or_else(|| {
                ConnectorError::ResourceNotFound(format!(
                    "Tab '{}' not found. Available tabs: {:?}",
                    id,
                    self.tab_ids()
                ))
            }),
            None => self.primary_tab().ok_or_else(|| {
                ConnectorError::ResourceNotFound(format!(
                    "document '{}' has no tabs",
                    self.document_id
                ))
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditKind {
    Insert { index: i64, text: String },
    Replace { start: i64, end: i64, text: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEdit {
    pub tab_id: Option<String>,
    pub kind: EditKind,
}

impl DocumentEdit {
    /// The `batchUpdate` request list for this edit.
    pub fn to_requests(&self) -> Vec<Value> {
        let mut requests = Vec::new();
        match &self.kind {
            EditKind::Insert { index, text } => {
                requests.push(self.insert_text(*index, text));
            }
            EditKind::Replace { start, end, text } => {
                if end > start {
                    let mut range = json!({ "startIndex": start, "endIndex": end });
                    if let Some(tab_id) = &self.tab_id {
                        range["tabId"] = json!(tab_id);
                    }
                    requests.push(json!({ "deleteContentRange": { "range": range } }));
                }
                if !text.is_empty() {
                    requests.push(self.insert_text(*start, text));
                }
            }
        }
        requests
    }

    fn insert_text(&self, index: i64, text: &str) -> Value {
        let mut location = json!({ "index": index });
        if let Some(tab_id) = &self.tab_id {
            location["tabId"] = json!(tab_id);
        }
        json!({ "insertText": { "location": location, "text": text } })
    }
}

#[async_trait]
pub trait DocsApi: Send + Sync {
    async fn get_document(&self, document_id: &str) -> Result<Document, ConnectorError>;
    async fn apply_edit(&self, document_id: &str, edit: &DocumentEdit)
        -> Result<(), ConnectorError>;
}

/// Docs REST client.
pub struct GoogleDocs {
    credentials: Arc<CredentialProvider>,
    client: reqwest::Client,
    base_url: String,
}

impl GoogleDocs {
    pub fn new(credentials: Arc<CredentialProvider>) -> Result<Self, ConnectorError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("drivedocs/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            credentials,
            client,
            base_url: DOCS_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn document_url(&self, document_id: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(document_id)
        )
    }
}

#[async_trait]
impl DocsApi for GoogleDocs {
    async fn get_document(&self, document_id: &str) -> Result<Document, ConnectorError> {
        let client = self.credentials.get_client().await?;
        debug!(document_id, "docs documents.get");
        let resp = self
            .client
            .get(self.document_url(document_id))
            .bearer_auth(client.bearer())
            .query(&[("includeTabsContent", "true")])
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::FORBIDDEN {
            return Err(ConnectorError::ResourceNotFound(format!(
                "document '{}' does not exist or is not accessible with the current credentials",
                document_id
            )));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(document_id, status = status.as_u16(), "docs documents.get failed");
            return Err(ConnectorError::RemoteApi(remote_error_message(status, &body)));
        }

        let raw: RawDocument = resp.json().await?;
        Ok(raw.into_document(document_id))
    }

    async fn apply_edit(
        &self,
        document_id: &str,
        edit: &DocumentEdit,
    ) -> Result<(), ConnectorError> {
        let client = self.credentials.get_client().await?;
        client.ensure_read_write()?;

        let requests = edit.to_requests();
        if requests.is_empty() {
            return Ok(());
        }
        debug!(document_id, requests = requests.len(), "docs documents.batchUpdate");
        let resp = self
            .client
            .post(format!("{}:batchUpdate", self.document_url(document_id)))
            .bearer_auth(client.bearer())
            .json(&json!({ "requests": requests }))
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ConnectorError::ResourceNotFound(format!(
                "document '{}' does not exist",
                document_id
            )));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(document_id, status = status.as_u16(), "docs batchUpdate failed");
            return Err(ConnectorError::RemoteApi(remote_error_message(status, &body)));
        }
        Ok(())
    }
}

/// Pull the message out of Google's `{"error": {...}}` envelope, falling back to the raw body.
fn remote_error_message(status: StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());
    if detail.is_empty() {
        format!("docs API returned {}", status)
    } else {
        format!("docs API returned {}: {}", status, detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_document() -> Value {
        json!({
            "documentId": "doc-1",
            "title": "Roadmap",
            "tabs": [
                {
                    "tabProperties": { "tabId": "t.0", "title": "Main", "index": 0 },
                    "documentTab": { "body": { "content": [
                        { "endIndex": 1, "sectionBreak": { "sectionStyle": {} } },
                        { "startIndex": 1, "endIndex": 7, "paragraph": { "elements": [
                            { "startIndex": 1, "endIndex": 7, "textRun": { "content": "Hello\n" } }
                        ] } },
                        { "startIndex": 7, "endIndex": 20, "table": { "tableRows": [
                            { "tableCells": [
                                { "content": [ { "startIndex": 9, "endIndex": 12, "paragraph": { "elements": [
                                    { "startIndex": 9, "endIndex": 12, "textRun": { "content": "a1\n" } }
                                ] } } ] },
                                { "content": [ { "startIndex": 13, "endIndex": 16, "paragraph": { "elements": [
                                    { "startIndex": 13, "endIndex": 16, "textRun": { "content": "b1\n" } }
                                ] } } ] }
                            ] }
                        ] } },
                        { "startIndex": 20, "endIndex": 26, "paragraph": { "elements": [
                            { "startIndex": 20, "endIndex": 26, "inlineObjectElement": {} },
                            { "startIndex": 20, "endIndex": 26, "textRun": { "content": "Bye!\n" } }
                        ] } }
                    ] } },
                    "childTabs": [
                        {
                            "tabProperties": { "tabId": "t.child", "title": "Notes" },
                            "documentTab": { "body": { "content": [
                                { "startIndex": 1, "endIndex": 6, "paragraph": { "elements": [
                                    { "startIndex": 1, "endIndex": 6, "textRun": { "content": "note\n" } }
                                ] } }
                            ] } }
                        }
                    ]
                },
                {
                    "tabProperties": { "tabId": "t.1", "title": "Appendix" },
                    "documentTab": { "body": { "content": [] } }
                }
            ]
        })
    }

    fn parse(v: Value) -> Document {
        serde_json::from_value::<RawDocument>(v)
            .unwrap()
            .into_document("requested")
    }

    #[test]
    fn tabs_flatten_depth_first() {
        let doc = parse(sample_document());
        assert_eq!(doc.document_id, "doc-1");
        assert_eq!(doc.title, "Roadmap");
        assert_eq!(doc.tab_ids(), vec!["t.0", "t.child", "t.1"]);
        assert_eq!(doc.tabs[1].title.as_deref(), Some("Notes"));
    }

    #[test]
    fn text_includes_tables_and_section_breaks() {
        let doc = parse(sample_document());
        let tab = doc.resolve_tab(None).unwrap();
        assert_eq!(tab.text(), "\nHello\na1\nb1\nBye!\n");
        assert_eq!(tab.end_index, 26);
        assert_eq!(tab.append_index(), 25);
    }

    #[test]
    fn empty_tab_appends_at_index_one() {
        let doc = parse(sample_document());
        let tab = doc.resolve_tab(Some("t.1")).unwrap();
        assert_eq!(tab.text(), "");
        assert_eq!(tab.append_index(), 1);
    }

    #[test]
    fn unknown_tab_is_not_found() {
        let doc = parse(sample_document());
        match doc.resolve_tab(Some("missing")) {
            Err(ConnectorError::ResourceNotFound(msg)) => {
                assert!(msg.contains("missing"));
                assert!(msg.contains("t.child"));
            }
            other => panic!("expected not found, got {:?}", other),
        }
    }

    #[test]
    fn legacy_body_becomes_single_tab() {
        let doc = parse(json!({
            "title": "Old",
            "body": { "content": [
                { "startIndex": 1, "endIndex": 4, "paragraph": { "elements": [
                    { "startIndex": 1, "endIndex": 4, "textRun": { "content": "hi\n" } }
                ] } }
            ] }
        }));
        assert_eq!(doc.document_id, "requested");
        assert_eq!(doc.tabs.len(), 1);
        assert_eq!(doc.tabs[0].tab_id, "");
        assert_eq!(doc.resolve_tab(None).unwrap().text(), "hi\n");
    }

    #[test]
    fn insert_edit_targets_tab() {
        let edit = DocumentEdit {
            tab_id: Some("t.1".into()),
            kind: EditKind::Insert {
                index: 5,
                text: "new".into(),
            },
        };
        assert_eq!(
            edit.to_requests(),
            vec![json!({ "insertText": { "location": { "index": 5, "tabId": "t.1" }, "text": "new" } })]
        );
    }

    #[test]
    fn replace_edit_deletes_then_inserts() {
        let edit = DocumentEdit {
            tab_id: None,
            kind: EditKind::Replace {
                start: 3,
                end: 9,
                text: "xyz".into(),
            },
        };
        assert_eq!(
            edit.to_requests(),
            vec![
                json!({ "deleteContentRange": { "range": { "startIndex": 3, "endIndex": 9 } } }),
                json!({ "insertText": { "location": { "index": 3 }, "text": "xyz" } }),
            ]
        );
    }

    #[test]
    fn degenerate_replace_skips_empty_parts() {
        let empty_range = DocumentEdit {
            tab_id: None,
            kind: EditKind::Replace {
                start: 4,
                end: 4,
                text: "x".into(),
            },
        };
        assert_eq!(empty_range.to_requests().len(), 1);

        let pure_delete = DocumentEdit {
            tab_id: None,
            kind: EditKind::Replace {
                start: 4,
                end: 8,
                text: String::new(),
            },
        };
        let requests = pure_delete.to_requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].get("deleteContentRange").is_some());
    }

    #[test]
    fn remote_error_message_prefers_google_envelope() {
        let body = r#"{"error":{"code":400,"message":"Index 99 must be less than the end index","status":"INVALID_ARGUMENT"}}"#;
        let msg = remote_error_message(StatusCode::BAD_REQUEST, body);
        assert!(msg.contains("Index 99 must be less than the end index"));
        assert!(msg.contains("400"));

        let msg = remote_error_message(StatusCode::BAD_GATEWAY, "");
        assert_eq!(msg, "docs API returned 502 Bad Gateway");
    }

    mod http {
        use super::*;
        use crate::config::{AuthSettings, CredentialSource};
        use crate::credentials::{IssuedToken, TokenSource};
        use std::path::PathBuf;
        use wiremock::matchers::{body_json, header, method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        struct StaticToken;

        #[async_trait]
        impl TokenSource for StaticToken {
            async fn fetch_token(&self, _scopes: &[String]) -> Result<IssuedToken, ConnectorError> {
                Ok(IssuedToken {
                    access_token: "test-token".into(),
                    expires_at: None,
                })
            }
        }

        fn docs_client(server: &MockServer, scopes: Vec<String>) -> GoogleDocs {
            let settings = AuthSettings::new(CredentialSource::ServiceAccount {
                key_path: PathBuf::from("unused.json"),
            })
            .with_scopes(scopes);
            let provider = CredentialProvider::with_token_source(settings, Arc::new(StaticToken));
            GoogleDocs::new(Arc::new(provider))
                .unwrap()
                .with_base_url(server.uri())
        }

        fn insert_edit() -> DocumentEdit {
            DocumentEdit {
                tab_id: Some("t.1".into()),
                kind: EditKind::Insert {
                    index: 5,
                    text: "hi".into(),
                },
            }
        }

        #[tokio::test]
        async fn get_document_sends_bearer_and_tab_flag() {
            let mock_server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/doc-1"))
                .and(query_param("includeTabsContent", "true"))
                .and(header("authorization", "Bearer test-token"))
                .respond_with(ResponseTemplate::new(200).set_body_json(sample_document()))
                .expect(1)
                .mount(&mock_server)
                .await;

            let docs = docs_client(&mock_server, Vec::new());
            let doc = docs.get_document("doc-1").await.unwrap();
            assert_eq!(doc.title, "Roadmap");
            assert_eq!(doc.tab_ids(), vec!["t.0", "t.child", "t.1"]);
            assert_eq!(doc.tabs[0].text(), "\nHello\na1\nb1\nBye!\n");
        }

        #[tokio::test]
        async fn missing_or_forbidden_document_is_not_found() {
            for status in [404u16, 403] {
                let mock_server = MockServer::start().await;
                Mock::given(method("GET"))
                    .and(path("/doc-1"))
                    .respond_with(ResponseTemplate::new(status))
                    .mount(&mock_server)
                    .await;

                let docs = docs_client(&mock_server, Vec::new());
                match docs.get_document("doc-1").await {
                    Err(ConnectorError::ResourceNotFound(msg)) => assert!(msg.contains("doc-1")),
                    other => panic!("status {}: expected not found, got {:?}", status, other),
                }
            }
        }

        #[tokio::test]
        async fn other_failures_carry_google_message() {
            let mock_server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/doc-1"))
                .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                    "error": { "code": 429, "message": "Quota exceeded for quota metric", "status": "RESOURCE_EXHAUSTED" }
                })))
                .mount(&mock_server)
                .await;

            let docs = docs_client(&mock_server, Vec::new());
            match docs.get_document("doc-1").await {
                Err(ConnectorError::RemoteApi(msg)) => {
                    assert!(msg.contains("429"));
                    assert!(msg.contains("Quota exceeded for quota metric"));
                }
                other => panic!("expected remote error, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn batch_update_posts_tab_scoped_requests() {
            let mock_server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/doc-1:batchUpdate"))
                .and(header("authorization", "Bearer test-token"))
                .and(body_json(json!({
                    "requests": [
                        { "insertText": { "location": { "index": 5, "tabId": "t.1" }, "text": "hi" } }
                    ]
                })))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "replies": [{}] })))
                .expect(1)
                .mount(&mock_server)
                .await;

            let docs = docs_client(&mock_server, Vec::new());
            docs.apply_edit("doc-1", &insert_edit()).await.unwrap();
        }

        #[tokio::test]
        async fn batch_update_rejection_is_remote_error() {
            let mock_server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/doc-1:batchUpdate"))
                .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                    "error": { "code": 400, "message": "Index 5 must be less than the end index of the referenced segment, 2.", "status": "INVALID_ARGUMENT" }
                })))
                .mount(&mock_server)
                .await;

            let docs = docs_client(&mock_server, Vec::new());
            match docs.apply_edit("doc-1", &insert_edit()).await {
                Err(ConnectorError::RemoteApi(msg)) => {
                    assert!(msg.contains("must be less than the end index"))
                }
                other => panic!("expected remote error, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn read_only_grant_never_posts() {
            let mock_server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(200))
                .expect(0)
                .mount(&mock_server)
                .await;

            let docs = docs_client(
                &mock_server,
                vec!["https://www.googleapis.com/auth/drive.readonly".to_string()],
            );
            match docs.apply_edit("doc-1", &insert_edit()).await {
                Err(ConnectorError::Authentication(_)) => {}
                other => panic!("expected authentication error, got {:?}", other),
            }
        }
    }
}
