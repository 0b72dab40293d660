use crate::config::PRODUCT_LABEL;

use super::metadata::PolicyMeta;

/// Print stylesheet embedded in every formatted policy so output looks the
/// same whichever renderer produces the PDF.
pub const POLICY_CSS: &str = r#"<style>
  @page { margin: 22mm; }
  body { font-family: ui-sans-serif, system-ui, -apple-system, Segoe UI, Roboto, 'Helvetica Neue', Arial, 'Noto Sans', 'Liberation Sans', sans-serif; color: #111827; }
  .header {
    display: grid; grid-template-columns: 1fr 1fr; gap: 8px; align-items: end;
    border-bottom: 2px solid #0f766e; padding-bottom: 8px; margin-bottom: 18px;
  }
  .header-left { display: grid; grid-template-columns: 120px 1fr; row-gap: 6px; column-gap: 10px; }
  .label { color: #6b7280; font-size: 12px; text-transform: uppercase; letter-spacing: 0.06em; }
  .value { font-weight: 600; font-size: 14px; color: #0f172a; }
  .title { font-weight: 700; font-size: 18px; color: #0f172a; }
  .product { text-align: right; font-size: 12px; color: #6b7280; }
  h1, h2, h3 { color: #0f172a; }
  h1 { font-size: 22px; margin: 18px 0 10px; }
  h2 { font-size: 18px; margin: 16px 0 8px; border-bottom: 1px solid #e5e7eb; padding-bottom: 6px; }
  h3 { font-size: 16px; margin: 12px 0 6px; }
  p { line-height: 1.5; margin: 8px 0; }
  ul, ol { margin: 8px 0 8px 22px; }
  table { width: 100%; border-collapse: collapse; margin: 12px 0; }
  th, td { border: 1px solid #e5e7eb; padding: 8px; text-align: left; }
  h1, h2, h3, p, li, tr { break-inside: avoid; page-break-inside: avoid; }
  .page-break { break-after: page; page-break-after: always; }
  footer { position: fixed; bottom: 10mm; left: 0; right: 0; text-align: right; font-size: 11px; color: #6b7280; }
  .page-number:before { content: counter(page); }
</style>"#;

/// Shown in place of a header field that could not be determined.
pub const MISSING_FIELD: &str = "\u{2014}";

/// Escape text for interpolation into markup: `& < > " '`.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Header value as displayed: trimmed, or the placeholder dash when blank.
pub fn display_field(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        MISSING_FIELD
    } else {
        trimmed
    }
}

fn header_html(meta: &PolicyMeta) -> String {
    let row = |label: &str, value: &str, class: &str| {
        format!(
            r#"<div class="label">{label}</div><div class="{class}">{}</div>"#,
            escape_html(display_field(value))
        )
    };
    let mut out = String::from(r#"<div class="header"><div class="header-left">"#);
    out.push_str(&row("Section", &meta.section, "value"));
    out.push_str(&row("Number", &meta.number, "value"));
    out.push_str(&row("Subject", &meta.subject, "value title"));
    out.push_str("</div>");
    out.push_str(&format!(r#"<div class="product">{}</div>"#, escape_html(PRODUCT_LABEL)));
    out.push_str("</div>");
    out
}

/// Wrap a sanitized body in the standard policy page: embedded print CSS,
/// the Section / Number / Subject header and a page-number footer.
///
/// The body is inserted as-is; only the metadata is escaped here.
pub fn wrap_with_policy_template(meta: &PolicyMeta, body_html: &str) -> String {
    let mut out = String::with_capacity(POLICY_CSS.len() + body_html.len() + 1024);
    out.push_str("<!doctype html>\n<html>\n<head><meta charset=\"utf-8\" />");
    out.push_str(POLICY_CSS);
    out.push_str("</head>\n<body>\n");
    out.push_str(&header_html(meta));
    out.push('\n');
    out.push_str(body_html);
    out.push_str("\n<footer>Page <span class=\"page-number\"></span></footer>\n</body>\n</html>\n");
    out
}
