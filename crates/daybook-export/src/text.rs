//! Byte-stability helpers shared by every file the renderer emits.
//!
//! Modeled on `xchecker-utils::canonicalization::Canonicalizer` — LF-only
//! line endings, no trailing whitespace, exactly one trailing newline — but
//! without that module's YAML-parse-then-reemit step, since frontmatter
//! here is hand-rendered rather than round-tripped through a YAML library.

/// Normalizes line endings to LF, trims trailing whitespace on every line,
/// and ensures the result ends in exactly one newline.
#[must_use]
pub fn finalize_text(content: &str) -> String {
    let normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    let trimmed_lines: Vec<&str> = normalized.lines().map(|line| line.trim_end()).collect();
    let joined = trimmed_lines.join("\n");
    joined.trim_end_matches('\n').to_string() + "\n"
}

/// A single YAML frontmatter field: a key plus its already-formatted value
/// (the caller decides quoting — strings double-quoted, numbers/booleans
/// bare — so field order is the only thing this helper enforces).
pub struct FrontmatterField {
    pub key: &'static str,
    pub value: String,
}

#[must_use]
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

#[must_use]
pub fn bare(s: impl std::fmt::Display) -> String {
    s.to_string()
}

/// Renders `---\nkey: value\n...\n---\n\n{body}` with fields in the given
/// order, then finalizes the whole document.
#[must_use]
pub fn render_frontmatter_doc(fields: &[FrontmatterField], body: &str) -> String {
    let mut out = String::from("---\n");
    for field in fields {
        out.push_str(&format!("{}: {}\n", field.key, field.value));
    }
    out.push_str("---\n\n");
    out.push_str(body);
    finalize_text(&out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_text_normalizes_crlf_and_trailing_whitespace() {
        let input = "line1   \r\nline2\r\n\r\n\r\n";
        let out = finalize_text(input);
        assert_eq!(out, "line1\nline2\n");
    }

    #[test]
    fn finalize_text_is_idempotent() {
        let once = finalize_text("a\nb\n\n\n");
        let twice = finalize_text(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn frontmatter_doc_preserves_field_order() {
        let fields = vec![
            FrontmatterField { key: "date", value: quoted("2026-01-01") },
            FrontmatterField { key: "segmented", value: bare(false) },
        ];
        let doc = render_frontmatter_doc(&fields, "body text");
        let date_pos = doc.find("date:").unwrap();
        let seg_pos = doc.find("segmented:").unwrap();
        assert!(date_pos < seg_pos);
        assert!(doc.ends_with("body text\n"));
    }
}
