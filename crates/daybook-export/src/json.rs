//! Manifest JSON rendering: JCS-canonical (alphabetical keys at every
//! depth, per RFC 8785) then re-indented for human readability.
//!
//! Grounded on `xchecker-utils::canonicalization::emit_jcs` — the same
//! `serde_json_canonicalizer` pass — extended with a re-parse + pretty-print
//! step so the manifest on disk is readable rather than a single line.

use daybook_core::error::{DaybookError, Result};
use serde::Serialize;

/// Serializes `value`, canonicalizes it (RFC 8785 — this is also what makes
/// key ordering alphabetical at every depth, satisfying the byte-stability
/// rule independent of field declaration order), then pretty-prints the
/// canonical form with a 2-space indent and a single trailing newline.
pub fn to_canonical_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    let json_value = serde_json::to_value(value).map_err(|e| DaybookError::Database(e.to_string()))?;
    let canonical_bytes = serde_json_canonicalizer::to_vec(&json_value)
        .map_err(|e| DaybookError::Database(e.to_string()))?;
    let canonical_str =
        String::from_utf8(canonical_bytes).map_err(|e| DaybookError::Database(e.to_string()))?;
    let reparsed: serde_json::Value =
        serde_json::from_str(&canonical_str).map_err(|e| DaybookError::Database(e.to_string()))?;
    let pretty =
        serde_json::to_string_pretty(&reparsed).map_err(|e| DaybookError::Database(e.to_string()))?;
    Ok(crate::text::finalize_text(&pretty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_keys_at_every_depth_and_ends_in_one_newline() {
        let value = json!({"b": 1, "a": {"z": 1, "y": 2}});
        let rendered = to_canonical_pretty_json(&value).unwrap();
        let a_pos = rendered.find("\"a\"").unwrap();
        let b_pos = rendered.find("\"b\"").unwrap();
        assert!(a_pos < b_pos);
        let y_pos = rendered.find("\"y\"").unwrap();
        let z_pos = rendered.find("\"z\"").unwrap();
        assert!(y_pos < z_pos);
        assert!(rendered.ends_with('\n'));
        assert!(!rendered.ends_with("\n\n"));
    }
}
