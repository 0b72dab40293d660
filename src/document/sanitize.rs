/// Allow-list sanitize a document body.
///
/// Keeps ammonia's HTML profile (structural, text-level, list and table
/// elements), drops scripts, styles and event handlers, and permits the
/// single presentational class the layout engine honours:
/// `<div class="page-break">`.
pub fn sanitize_html(html: &str) -> String {
    ammonia::Builder::default()
        .add_allowed_classes("div", &["page-break"])
        .clean(html)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_and_handlers_removed() {
        let clean = sanitize_html(r#"<p onclick="steal()">Hi<script>alert(1)</script></p>"#);
        assert_eq!(clean, "<p>Hi</p>");
    }

    #[test]
    fn page_break_class_survives_other_classes_do_not() {
        let clean = sanitize_html(r#"<div class="page-break"></div><p class="fancy">x</p>"#);
        assert!(clean.contains(r#"<div class="page-break"></div>"#));
        assert!(clean.contains("<p>x</p>"));
    }

    #[test]
    fn tables_and_lists_kept() {
        let html = "<table><tbody><tr><td>a</td></tr></tbody></table><ul><li>b</li></ul>";
        assert_eq!(sanitize_html(html), html);
    }

    #[test]
    fn style_blocks_removed_with_content() {
        assert_eq!(sanitize_html("<style>p{}</style><h2>Scope</h2>"), "<h2>Scope</h2>");
    }
}
