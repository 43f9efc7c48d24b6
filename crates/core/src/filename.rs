//! Suggested filenames for downloaded artifacts.

use std::sync::LazyLock;

use regex::Regex;

use crate::request::OutputFormat;

/// Base name used when the service does not suggest one.
pub const FALLBACK_STEM: &str = "test_cases";

static QUOTED_FILENAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"filename="([^"]+)""#).expect("valid regex"));

static BARE_FILENAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"filename=([^;\s]+)").expect("valid regex"));

/// Extract `filename` from a `Content-Disposition` header value.
///
/// Accepts both `filename="a b.xlsx"` and the unquoted `filename=a.xlsx`.
pub fn from_content_disposition(header: &str) -> Option<String> {
    let raw = QUOTED_FILENAME_RE
        .captures(header)
        .or_else(|| BARE_FILENAME_RE.captures(header))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())?;
    let name = sanitize(raw);
    (!name.is_empty()).then_some(name)
}

/// `test_cases.<format>` using the format's wire name.
pub fn fallback(format: OutputFormat) -> String {
    format!("{FALLBACK_STEM}.{}", format.as_str())
}

/// Header-supplied name when usable, otherwise [`fallback`].
pub fn suggested(content_disposition: Option<&str>, format: OutputFormat) -> String {
    content_disposition
        .and_then(from_content_disposition)
        .unwrap_or_else(|| fallback(format))
}

/// Keep only the final path component so a name can never escape the
/// target directory.
pub fn sanitize(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .trim_start_matches('.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_filename_is_extracted() {
        let h = r#"attachment; filename="3f2a.xlsx""#;
        assert_eq!(from_content_disposition(h).as_deref(), Some("3f2a.xlsx"));
    }

    #[test]
    fn quoted_filename_keeps_spaces() {
        let h = r#"attachment; filename="login cases.xmind""#;
        assert_eq!(from_content_disposition(h).as_deref(), Some("login cases.xmind"));
    }

    #[test]
    fn bare_filename_is_extracted() {
        let h = "attachment; filename=out.xlsx; size=10";
        assert_eq!(from_content_disposition(h).as_deref(), Some("out.xlsx"));
    }

    #[test]
    fn header_without_filename_falls_back() {
        assert_eq!(suggested(Some("attachment"), OutputFormat::Xmind), "test_cases.xmind");
        assert_eq!(suggested(None, OutputFormat::Excel), "test_cases.excel");
    }

    #[test]
    fn path_components_are_stripped() {
        let h = r#"attachment; filename="../../etc/passwd""#;
        assert_eq!(from_content_disposition(h).as_deref(), Some("passwd"));
        assert_eq!(sanitize(r"C:\tmp\out.xlsx"), "out.xlsx");
    }

    #[test]
    fn dot_only_name_falls_back() {
        let h = r#"attachment; filename="..""#;
        assert_eq!(suggested(Some(h), OutputFormat::Excel), "test_cases.excel");
    }
}
