//! DOCX ⇄ HTML conversion.
//!
//! A DOCX file is a zip package of WordprocessingML parts. Reading maps
//! paragraph styles and numbering onto semantic HTML (headings, lists,
//! tables, inline emphasis); writing maps the HTML block model back onto
//! Word paragraphs with a fixed, print-friendly stylesheet.

pub mod reader;
pub mod writer;

use std::io::{Cursor, Read};

use serde::Serialize;

/// Result of converting a Word document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConvertedDocument {
    /// Semantic HTML body (not yet sanitized).
    pub html: String,
    /// Plain text, paragraphs separated by a blank line.
    pub raw_text: String,
    /// Non-fatal conversion notes (skipped images, unknown numbering, ...).
    pub messages: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Not a DOCX package: {0}")]
    Package(#[from] zip::result::ZipError),

    #[error("DOCX package is missing {0}")]
    MissingPart(&'static str),

    #[error("{part} expands beyond {limit} bytes")]
    PartTooLarge { part: &'static str, limit: u64 },

    #[error("Malformed XML in {part}: {reason}")]
    Xml { part: &'static str, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decompressed size cap for a single package part.
pub const MAX_PART_BYTES: u64 = 64 * 1024 * 1024;

/// Converter between Word documents and HTML.
pub trait DocumentCodec: Send + Sync {
    /// Structural (HTML) and raw-text extraction in one pass.
    fn to_html(&self, bytes: &[u8]) -> Result<ConvertedDocument, CodecError>;

    /// Produce a DOCX package from an HTML body.
    fn to_docx(&self, html: &str, title: &str) -> Result<Vec<u8>, CodecError>;
}

/// Built-in WordprocessingML codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxCodec;

impl DocumentCodec for DocxCodec {
    fn to_html(&self, bytes: &[u8]) -> Result<ConvertedDocument, CodecError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let document = read_part(&mut archive, reader::DOCUMENT_PART, MAX_PART_BYTES)?
            .ok_or(CodecError::MissingPart(reader::DOCUMENT_PART))?;
        let styles = read_part(&mut archive, reader::STYLES_PART, MAX_PART_BYTES)?;
        let numbering = read_part(&mut archive, reader::NUMBERING_PART, MAX_PART_BYTES)?;
        reader::convert(&document, styles.as_deref(), numbering.as_deref())
    }

    fn to_docx(&self, html: &str, title: &str) -> Result<Vec<u8>, CodecError> {
        writer::write_docx(html, title)
    }
}

/// Read one part as UTF-8, refusing anything that inflates past `limit`.
/// The declared size is checked first, then the actual stream is capped.
fn read_part(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &'static str,
    limit: u64,
) -> Result<Option<String>, CodecError> {
    let file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let too_large = CodecError::PartTooLarge { part: name, limit };
    if file.size() > limit {
        tracing::warn!(part = name, declared = file.size(), limit, "Rejected oversized DOCX part");
        return Err(too_large);
    }
    let mut xml = String::new();
    file.take(limit + 1).read_to_string(&mut xml)?;
    if xml.len() as u64 > limit {
        tracing::warn!(part = name, limit, "DOCX part inflated past its declared size");
        return Err(too_large);
    }
    Ok(Some(xml))
}
