//! Wire types for the Docs `documents.get` response, trimmed to what text extraction needs.

use serde::Deserialize;
use serde_json::Value;

use super::{Document, DocumentTab, TextRun};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDocument {
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Only populated when the document was fetched without tab content.
    #[serde(default)]
    pub body: Option<Body>,
    #[serde(default)]
    pub tabs: Vec<RawTab>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTab {
    #[serde(default)]
    pub tab_properties: Option<TabProperties>,
    #[serde(default)]
    pub document_tab: Option<RawDocumentTab>,
    #[serde(default)]
    pub child_tabs: Vec<RawTab>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabProperties {
    #[serde(default)]
    pub tab_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawDocumentTab {
    #[serde(default)]
    pub body: Option<Body>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Body {
    #[serde(default)]
    pub content: Vec<StructuralElement>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralElement {
    #[serde(default)]
    pub end_index: Option<i64>,
    #[serde(default)]
    pub paragraph: Option<Paragraph>,
    #[serde(default)]
    pub table: Option<Table>,
    #[serde(default)]
    pub section_break: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Paragraph {
    #[serde(default)]
    pub elements: Vec<ParagraphElement>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphElement {
    #[serde(default)]
    pub text_run: Option<RawTextRun>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawTextRun {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    #[serde(default)]
    pub table_rows: Vec<TableRow>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    #[serde(default)]
    pub table_cells: Vec<TableCell>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TableCell {
    #[serde(default)]
    pub content: Vec<StructuralElement>,
}

impl RawDocument {
    pub fn into_document(self, requested_id: &str) -> Document {
        let mut tabs = Vec::new();
        for tab in self.tabs {
            flatten_tabs(tab, &mut tabs);
        }
        if tabs.is_empty() {
            // Legacy shape: a single body and no tab list.
            tabs.push(tab_from_body(String::new(), None, self.body.as_ref()));
        }
        Document {
            document_id: self
                .document_id
                .unwrap_or_else(|| requested_id.to_string()),
            title: self.title.unwrap_or_else(|| "Untitled".to_string()),
            tabs,
        }
    }
}

// Depth-first, parents before their children.
fn flatten_tabs(tab: RawTab, out: &mut Vec<DocumentTab>) {
    let props = tab.tab_properties.unwrap_or_default();
    let body = tab.document_tab.and_then(|d| d.body);
    out.push(tab_from_body(
        props.tab_id.unwrap_or_default(),
        props.title,
        body.as_ref(),
    ));
    for child in tab.child_tabs {
        flatten_tabs(child, out);
    }
}

fn tab_from_body(tab_id: String, title: Option<String>, body: Option<&Body>) -> DocumentTab {
    let mut runs = Vec::new();
    let mut end_index = 1;
    if let Some(body) = body {
        collect_runs(&body.content, &mut runs);
        end_index = body
            .content
            .last()
            .and_then(|e| e.end_index)
            .unwrap_or(1);
    }
    DocumentTab {
        tab_id,
        title,
        runs,
        end_index,
    }
}

fn collect_runs(elements: &[StructuralElement], runs: &mut Vec<TextRun>) {
    for element in elements {
        if let Some(paragraph) = &element.paragraph {
            for pe in &paragraph.elements {
                if let Some(content) = pe.text_run.as_ref().and_then(|r| r.content.as_ref()) {
                    runs.push(TextRun {
                        content: content.clone(),
                    });
                }
            }
        } else if let Some(table) = &element.table {
            for row in &table.table_rows {
                for cell in &row.table_cells {
                    collect_runs(&cell.content, runs);
                }
            }
        } else if element.section_break.is_some() {
            runs.push(TextRun {
                content: "\n".to_string(),
            });
        }
    }
}
