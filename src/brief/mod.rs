//! Back end of the brief editor: Word import, Word export, draft storage
//! and the starter templates.

pub mod intake;

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::document::docx::{CodecError, DocumentCodec};
use crate::document::filename::{docx_stem, is_docx_name};
use crate::document::sanitize::sanitize_html;
use crate::document::template::escape_html;
use crate::models::Brief;
use crate::store::PolicyStore;

pub use intake::{generate_intake_form_html, IntakeFormData};

pub const DEFAULT_BRIEF_TITLE: &str = "PPDU Brief";

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Starting content for a new brief.
pub const PPDU_BRIEF_TEMPLATE: &str = r#"<h1>PPDU Brief</h1>
<p><strong>Date:</strong> </p>
<p><strong>Prepared by:</strong> </p>
<p><strong>Audience:</strong> </p>
<h2>Purpose</h2>
<p>State the decision or awareness this brief is asking for.</p>
<h2>Background</h2>
<p>Summarize the history and context the reader needs.</p>
<h2>Current Situation</h2>
<p>Describe the issue as it stands today and who it affects.</p>
<h2>Options and Considerations</h2>
<ul>
<li><strong>Option 1</strong>: description, benefits, risks.</li>
<li><strong>Option 2</strong>: description, benefits, risks.</li>
</ul>
<h2>Recommendation</h2>
<p>The recommended option and the reason for it.</p>
<h2>Next Steps</h2>
<table>
<tr><th>Action</th><th>Owner</th><th>Due</th></tr>
<tr><td></td><td></td><td></td></tr>
<tr><td></td><td></td><td></td></tr>
</table>
"#;

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

#[derive(Error, Debug)]
pub enum BriefError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Failed to import document")]
    Import(#[source] CodecError),

    #[error("Failed to generate document")]
    Export(#[source] CodecError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// A Word document opened in the editor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportedBrief {
    pub title: String,
    pub content_html: String,
    pub messages: Vec<String>,
}

/// A generated Word file ready for download.
#[derive(Debug, Clone)]
pub struct BriefDownload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Convert an uploaded `.docx` into editor HTML. The title is the file
/// name without its extension.
pub fn import_docx(
    codec: &dyn DocumentCodec,
    file_name: &str,
    bytes: &[u8],
) -> Result<ImportedBrief, BriefError> {
    if !is_docx_name(file_name) {
        return Err(BriefError::InvalidInput("Please select a .docx file".into()));
    }
    let converted = codec.to_html(bytes).map_err(|e| {
        tracing::warn!(file = %file_name, error = %e, "Brief import failed");
        BriefError::Import(e)
    })?;
    if !converted.messages.is_empty() {
        tracing::debug!(messages = ?converted.messages, "Conversion messages");
    }

    Ok(ImportedBrief {
        title: docx_stem(file_name).to_string(),
        content_html: sanitize_html(&converted.html),
        messages: converted.messages,
    })
}

/// Standalone HTML document wrapping the editor content.
pub fn download_html(title: &str, content_html: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>",
        escape_html(title),
        content_html
    )
}

/// `My Brief  v2` → `My_Brief_v2.docx`
pub fn download_file_name(title: &str) -> String {
    let title = effective_title(title);
    format!("{}.docx", WHITESPACE_RUN.replace_all(title, "_"))
}

fn effective_title(title: &str) -> &str {
    let title = title.trim();
    if title.is_empty() {
        DEFAULT_BRIEF_TITLE
    } else {
        title
    }
}

/// Render the editor content as a Word document.
pub fn export_docx(
    codec: &dyn DocumentCodec,
    title: &str,
    content_html: &str,
) -> Result<BriefDownload, BriefError> {
    let title = effective_title(title);
    let bytes = codec
        .to_docx(&download_html(title, content_html), title)
        .map_err(|e| {
            tracing::error!(title = %title, error = %e, "Brief export failed");
            BriefError::Export(e)
        })?;
    Ok(BriefDownload {
        file_name: download_file_name(title),
        bytes,
    })
}

/// A fresh brief seeded with the standard template.
pub fn new_brief(owner_id: Uuid, now: DateTime<Utc>) -> Brief {
    Brief {
        id: Uuid::new_v4(),
        owner_id,
        title: DEFAULT_BRIEF_TITLE.into(),
        content_html: PPDU_BRIEF_TEMPLATE.into(),
        updated_at: now,
    }
}

/// Save the owner's draft, replacing any earlier one.
pub fn save_draft(
    store: &dyn PolicyStore,
    owner_id: Uuid,
    title: &str,
    content_html: &str,
    now: DateTime<Utc>,
) -> Result<Brief, BriefError> {
    let id = store
        .load_brief(&owner_id)?
        .map(|existing| existing.id)
        .unwrap_or_else(Uuid::new_v4);
    let brief = Brief {
        id,
        owner_id,
        title: effective_title(title).to_string(),
        content_html: sanitize_html(content_html),
        updated_at: now,
    };
    store.save_brief(&brief)?;
    tracing::debug!(owner_id = %owner_id, "Brief draft saved");
    Ok(brief)
}

/// The owner's saved draft, or an empty default-titled one.
pub fn load_draft(
    store: &dyn PolicyStore,
    owner_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Brief, BriefError> {
    Ok(store.load_brief(&owner_id)?.unwrap_or_else(|| Brief {
        id: Uuid::new_v4(),
        owner_id,
        title: DEFAULT_BRIEF_TITLE.into(),
        content_html: String::new(),
        updated_at: now,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::docx::test_support::{docx_with_body, paragraphs};
    use crate::document::docx::DocxCodec;
    use crate::store::MemoryPolicyStore;

    #[test]
    fn import_requires_docx_name() {
        let err = import_docx(&DocxCodec, "notes.pdf", b"%PDF").unwrap_err();
        assert!(matches!(err, BriefError::InvalidInput(ref m) if m == "Please select a .docx file"));
    }

    #[test]
    fn import_takes_title_from_file_name() {
        let bytes = docx_with_body(&paragraphs(&["Hello brief"]));
        let brief = import_docx(&DocxCodec, "Quarterly Update.DOCX", &bytes).unwrap();
        assert_eq!(brief.title, "Quarterly Update");
        assert!(brief.content_html.contains("Hello brief"));
    }

    #[test]
    fn import_of_corrupt_file_is_import_error() {
        let err = import_docx(&DocxCodec, "broken.docx", b"not a zip").unwrap_err();
        assert!(matches!(err, BriefError::Import(_)));
        assert_eq!(err.to_string(), "Failed to import document");
    }

    #[test]
    fn download_name_collapses_whitespace() {
        assert_eq!(download_file_name("My Brief  v2"), "My_Brief_v2.docx");
        assert_eq!(download_file_name("   "), "PPDU_Brief.docx");
    }

    #[test]
    fn download_html_escapes_title() {
        let html = download_html("A & B", "<p>x</p>");
        assert!(html.contains("<title>A &amp; B</title>"));
        assert!(html.contains("<body>\n<p>x</p>"));
    }

    #[test]
    fn export_produces_readable_docx() {
        let download = export_docx(&DocxCodec, "Board Brief", PPDU_BRIEF_TEMPLATE).unwrap();
        assert_eq!(download.file_name, "Board_Brief.docx");

        let reread = DocxCodec.to_html(&download.bytes).unwrap();
        assert!(reread.raw_text.contains("Recommendation"));
        assert!(!reread.raw_text.contains("Board Brief"));
    }

    #[test]
    fn draft_defaults_then_round_trips() {
        let store = MemoryPolicyStore::new();
        let owner = Uuid::new_v4();

        let empty = load_draft(&store, owner, Utc::now()).unwrap();
        assert_eq!(empty.title, DEFAULT_BRIEF_TITLE);
        assert!(empty.content_html.is_empty());

        let first = save_draft(&store, owner, "Draft one", "<p>one</p>", Utc::now()).unwrap();
        let second = save_draft(&store, owner, "Draft two", "<p>two</p><script>x()</script>", Utc::now()).unwrap();
        assert_eq!(first.id, second.id);

        let loaded = load_draft(&store, owner, Utc::now()).unwrap();
        assert_eq!(loaded.title, "Draft two");
        assert_eq!(loaded.content_html, "<p>two</p>");
    }

    #[test]
    fn new_brief_uses_template() {
        let brief = new_brief(Uuid::new_v4(), Utc::now());
        assert_eq!(brief.title, "PPDU Brief");
        assert!(brief.content_html.starts_with("<h1>PPDU Brief</h1>"));
    }
}
