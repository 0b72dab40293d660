use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Header fields printed at the top of every formatted policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyMeta {
    pub section: String,
    pub number: String,
    pub subject: String,
}

impl PolicyMeta {
    /// Replace fields with caller-supplied values where those are non-blank.
    pub fn with_overrides(
        mut self,
        section: Option<&str>,
        number: Option<&str>,
        subject: Option<&str>,
    ) -> Self {
        let pick = |current: &mut String, value: Option<&str>| {
            if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
                *current = v.to_string();
            }
        };
        pick(&mut self.section, section);
        pick(&mut self.number, number);
        pick(&mut self.subject, subject);
        self
    }
}

fn label_pattern(label: &str) -> Regex {
    // A label on its own line followed by the value on the next, or
    // `LABEL: value` on one line.
    Regex::new(&format!(r"(?im)^[ \t]*{label}[ \t]*:?[ \t]*\n?\s*(.+)$")).unwrap()
}

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| label_pattern("SECTION"));
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| label_pattern("NUMBER"));
static SUBJECT_RE: LazyLock<Regex> = LazyLock::new(|| label_pattern("SUBJECT"));

fn capture(re: &Regex, text: &str) -> String {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Pull SECTION / NUMBER / SUBJECT values out of a document's plain text.
/// Missing labels yield empty strings. Pure: same input, same output.
pub fn extract_policy_meta(raw_text: &str) -> PolicyMeta {
    let text = raw_text.replace("\r\n", "\n");
    PolicyMeta {
        section: capture(&SECTION_RE, &text),
        number: capture(&NUMBER_RE, &text),
        subject: capture(&SUBJECT_RE, &text),
    }
}
