use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::sanitize::sanitize_html;

/// Section titles promoted from plain paragraphs to `<h2>` headings.
pub const SECTION_HEADINGS: &[&str] = &[
    "POLICY STATEMENT",
    "DEFINITIONS",
    "STANDARDS",
    "PROCEDURES",
    "SCOPE",
    "PURPOSE",
    "BACKGROUND",
    "RESPONSIBILITIES",
];

static CLASSIFICATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Classification:\s*Protected\s+[AB]\s*").unwrap());

static EMPTY_PARAGRAPH_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:<p\b[^>]*>\s*</p>\s*){2,}").unwrap());

static EMPTY_PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<p\b[^>]*>\s*</p>").unwrap());

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    let names = SECTION_HEADINGS.join("|");
    Regex::new(&format!(
        r"(?i)<p\b[^>]*>\s*(?:<(?:strong|b)>\s*)?({names})\s*:?\s*(?:</(?:strong|b)>)?\s*:?\s*</p>"
    ))
    .unwrap()
});

static LIST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<ul\b[^>]*>.*?</ul>|<ol\b[^>]*>.*?</ol>").unwrap());

/// Upper bound on normalization passes; real documents settle in one or two.
const MAX_PASSES: usize = 4;

/// "POLICY STATEMENT" → "Policy Statement".
pub fn title_case(text: &str) -> String {
    let lower = text.to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut at_word_start = true;
    for c in lower.chars() {
        if at_word_start && c.is_alphanumeric() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = !(c.is_alphanumeric() || c == '_');
    }
    out
}

fn normalize_once(html: &str) -> String {
    let html = CLASSIFICATION_RE.replace_all(html, "");
    let html = EMPTY_PARAGRAPH_RUN_RE.replace_all(&html, "<p>&nbsp;</p>");
    let html = HEADING_RE.replace_all(&html, |caps: &Captures| {
        format!("<h2>{}</h2>", title_case(&caps[1]))
    });
    let html = LIST_RE.replace_all(&html, |caps: &Captures| {
        EMPTY_PARAGRAPH_RE.replace_all(&caps[0], "").into_owned()
    });
    sanitize_html(&html)
}

/// Rewrite converted document HTML into the standard policy structure:
/// classification banners stripped, blank-paragraph runs collapsed,
/// well-known section titles promoted to headings, empty list paragraphs
/// dropped, then allow-list sanitized.
///
/// Idempotent: normalizing an already-normalized body returns it unchanged.
pub fn normalize_policy_html(html: &str) -> String {
    let mut current = normalize_once(html);
    for _ in 1..MAX_PASSES {
        let next = normalize_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}
