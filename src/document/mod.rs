//! Policy document pipeline.
//!
//! Word upload → semantic HTML → header metadata + normalized body →
//! templated page → PDF, plus the reverse HTML → DOCX path used by the
//! brief editor.

pub mod docx;
pub mod export;
pub mod filename;
pub mod html;
pub mod metadata;
pub mod normalize;
pub mod render;
pub mod sanitize;
pub mod template;

pub use export::{
    export_policy_document, preview_policy_document, ExportOutcome, ExportRequest, PipelineError,
    PolicyPreview,
};
pub use filename::make_pdf_name;
pub use metadata::{extract_policy_meta, PolicyMeta};
pub use normalize::normalize_policy_html;
pub use template::{escape_html, wrap_with_policy_template};
