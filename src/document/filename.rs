use std::sync::LazyLock;

use regex::Regex;

static NON_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_\s-]+").unwrap());
static NON_NUMBER_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.-]+").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const FALLBACK_STEM: &str = "policy";

/// File name without a trailing `.docx` (any case).
pub fn docx_stem(file_name: &str) -> &str {
    let len = file_name.len();
    if len >= 5 && file_name.is_char_boundary(len - 5) && file_name[len - 5..].eq_ignore_ascii_case(".docx") {
        &file_name[..len - 5]
    } else {
        file_name
    }
}

pub fn is_docx_name(file_name: &str) -> bool {
    docx_stem(file_name).len() != file_name.len()
}

/// Output PDF name built from the policy number and subject, falling back
/// to the uploaded file's stem and finally to `policy.pdf`.
///
/// `("8.1", "Remote Work Guidelines", _)` → `8.1_Remote_Work_Guidelines.pdf`
pub fn make_pdf_name(number: &str, subject: &str, original_name: &str) -> String {
    let subject = subject.trim();
    let stem = if subject.is_empty() {
        docx_stem(original_name)
    } else {
        subject
    };
    let base = NON_NAME_CHARS.replace_all(stem, "");
    let num = NON_NUMBER_CHARS.replace_all(number, "");

    let joined = if num.is_empty() {
        base.into_owned()
    } else {
        format!("{num}_{base}")
    };
    let safe = WHITESPACE.replace_all(joined.trim(), "_");
    if safe.is_empty() {
        format!("{FALLBACK_STEM}.pdf")
    } else {
        format!("{safe}.pdf")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_and_subject() {
        assert_eq!(
            make_pdf_name("8.1", "Remote Work Guidelines", "upload.docx"),
            "8.1_Remote_Work_Guidelines.pdf"
        );
    }

    #[test]
    fn punctuation_in_subject_is_dropped() {
        assert_eq!(
            make_pdf_name("8.1", "Remote Work: Guidelines!", "upload.docx"),
            "8.1_Remote_Work_Guidelines.pdf"
        );
    }

    #[test]
    fn falls_back_to_file_stem() {
        assert_eq!(make_pdf_name("", "  ", "Leave Policy.DOCX"), "Leave_Policy.pdf");
    }

    #[test]
    fn punctuation_stripped() {
        assert_eq!(make_pdf_name("2.04 (rev)", "Data & <Security>", "x.docx"), "2.04rev_Data_Security.pdf");
    }

    #[test]
    fn empty_everything_gives_policy_pdf() {
        assert_eq!(make_pdf_name("", "", ".docx"), "policy.pdf");
        assert_eq!(make_pdf_name("", "!!!", "x.docx"), "policy.pdf");
    }

    #[test]
    fn docx_detection() {
        assert!(is_docx_name("Policy.docx"));
        assert!(is_docx_name("POLICY.DOCX"));
        assert!(!is_docx_name("policy.pdf"));
        assert!(!is_docx_name("docx"));
    }
}
