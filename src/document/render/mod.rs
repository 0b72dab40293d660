//! HTML → PDF rasterization.

pub mod command;
pub mod pdf;

pub use command::CommandRasterizer;
pub use pdf::PdfRasterizer;

use super::metadata::PolicyMeta;
use super::template::wrap_with_policy_template;

/// A normalized policy ready for rasterization. Carries both the wrapped
/// page (for HTML engines) and its parts (for the native layout engine).
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDocument {
    pub meta: PolicyMeta,
    pub body_html: String,
    pub html: String,
}

impl PolicyDocument {
    pub fn new(meta: PolicyMeta, body_html: impl Into<String>) -> Self {
        let body_html = body_html.into();
        let html = wrap_with_policy_template(&meta, &body_html);
        Self {
            meta,
            body_html,
            html,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("PDF generation failed: {0}")]
    Pdf(String),

    #[error("Failed to start renderer {command:?}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Renderer {command:?} exited with {status}: {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Renderer produced no output")]
    EmptyOutput,

    #[error("Renderer command is empty")]
    EmptyCommand,

    #[error("Staging I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns a policy document into PDF bytes.
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, document: &PolicyDocument) -> Result<Vec<u8>, RenderError>;
}
