//! Content-addressing and canonical-time primitives.
//!
//! Every hash in the pipeline is derived here so the format string and the
//! digest algorithm live in exactly one place. Changing either changes every
//! `atomStableId` ever computed, so don't.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("unknown IANA timezone: {0}")]
    UnknownTimezone(String),
    #[error("unknown role: {0}")]
    UnknownRole(String),
}

/// Lowercase hex SHA-256 digest of `input`.
#[must_use]
pub fn sha256(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Interprets the first 4 bytes of a hex digest as a big-endian `u32`.
///
/// Used by the classify stub to derive a deterministic category index from
/// `sha256(atomStableId)` without pulling in a second hash family.
#[must_use]
pub fn hash_to_u32(hex_digest: &str) -> u32 {
    let bytes = hex_digest.as_bytes();
    let mut value: u32 = 0;
    for chunk in bytes.chunks(2).take(4) {
        let byte_str = std::str::from_utf8(chunk).unwrap_or("00");
        let byte = u8::from_str_radix(byte_str, 16).unwrap_or(0);
        value = (value << 8) | u32::from(byte);
    }
    value
}

/// Renders an instant as `YYYY-MM-DDTHH:MM:SS.sssZ`, always UTC, always
/// millisecond precision, regardless of the input's original precision.
#[must_use]
pub fn to_canonical_ts(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Calendar date (`YYYY-MM-DD`) of `instant` as observed in `iana_tz`.
pub fn extract_day_date(instant: DateTime<Utc>, iana_tz: &str) -> Result<String, HashError> {
    let tz: Tz = iana_tz
        .parse()
        .map_err(|_| HashError::UnknownTimezone(iana_tz.to_string()))?;
    let local = instant.with_timezone(&tz);
    Ok(local.format("%Y-%m-%d").to_string())
}

/// Atom role. Ordering (`user` before `assistant`) matters everywhere atoms
/// are sorted; see [`Role::sort_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// `user` sorts before `assistant`. This is NOT alphabetical order
    /// (alphabetically `assistant` < `user`) — it encodes the domain rule
    /// that the journal's own voice always precedes the model's reply.
    #[must_use]
    pub fn sort_key(self) -> u8 {
        match self {
            Role::User => 0,
            Role::Assistant => 1,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(HashError::UnknownRole(other.to_string())),
        }
    }
}

/// Inputs to `atomStableId`, kept as a struct rather than positional
/// arguments so call sites can't transpose two string fields by accident.
pub struct AtomIdInput<'a> {
    pub source: &'a str,
    pub source_conversation_id: Option<&'a str>,
    pub source_message_id: Option<&'a str>,
    pub canonical_ts: &'a str,
    pub role: Role,
    pub text: &'a str,
}

/// `atomStableId = sha256("atom_v1|" + source + "|" + convId + "|" + msgId +
/// "|" + canonicalTs + "|" + role + "|" + sha256(text))`
#[must_use]
pub fn atom_stable_id(input: &AtomIdInput<'_>) -> String {
    let text_hash = sha256(input.text);
    let raw = format!(
        "atom_v1|{}|{}|{}|{}|{}|{}",
        input.source,
        input.source_conversation_id.unwrap_or(""),
        input.source_message_id.unwrap_or(""),
        input.canonical_ts,
        input.role,
        text_hash
    );
    sha256(&raw)
}

/// `textHash = sha256(text)`, exposed separately since callers persist it
/// independently of the atom id.
#[must_use]
pub fn text_hash(text: &str) -> String {
    sha256(text)
}

/// `bundleHash = sha256("bundle_v1|" + bundleText)`
#[must_use]
pub fn bundle_hash(bundle_text: &str) -> String {
    sha256(&format!("bundle_v1|{bundle_text}"))
}

/// `segmentId(i) = sha256("segment_v1|" + bundleHash + "|" + i)`
#[must_use]
pub fn segment_id(bundle_hash: &str, index: usize) -> String {
    sha256(&format!("segment_v1|{bundle_hash}|{index}"))
}

/// `bundleContextHash` binds a bundle to the batch set, day, source filter,
/// and label/filter configuration that produced it.
pub struct BundleContextInput<'a> {
    pub sorted_batch_ids_csv: &'a str,
    pub day_date: &'a str,
    pub sorted_sources_csv: &'a str,
    pub filter_profile_snapshot_json: &'a str,
    pub label_spec_json: &'a str,
}

#[must_use]
pub fn bundle_context_hash(input: &BundleContextInput<'_>) -> String {
    let raw = format!(
        "bundle_ctx_v1|{}|{}|{}|{}|{}",
        input.sorted_batch_ids_csv,
        input.day_date,
        input.sorted_sources_csv,
        input.filter_profile_snapshot_json,
        input.label_spec_json
    );
    sha256(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn sha256_is_stable_and_lowercase_hex() {
        let digest = sha256("hello");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(digest, sha256("hello"));
    }

    #[test]
    fn sha256_known_vector() {
        // Standard SHA-256("abc") test vector.
        assert_eq!(
            sha256("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn canonical_ts_has_millisecond_precision() {
        let instant = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(to_canonical_ts(instant), "2026-01-02T03:04:05.000Z");
    }

    #[test]
    fn extract_day_date_respects_timezone_offset() {
        // 2026-01-02T23:30:00Z is already 2026-01-03 in UTC+1.
        let instant = Utc.with_ymd_and_hms(2026, 1, 2, 23, 30, 0).unwrap();
        assert_eq!(extract_day_date(instant, "Europe/Paris").unwrap(), "2026-01-03");
        assert_eq!(extract_day_date(instant, "UTC").unwrap(), "2026-01-02");
    }

    #[test]
    fn extract_day_date_rejects_unknown_timezone() {
        let instant = Utc::now();
        assert!(extract_day_date(instant, "Not/A_Zone").is_err());
    }

    #[test]
    fn role_user_sorts_before_assistant() {
        assert!(Role::User.sort_key() < Role::Assistant.sort_key());
    }

    #[test]
    fn atom_stable_id_is_deterministic_and_sensitive_to_every_field() {
        let base = AtomIdInput {
            source: "chatgpt",
            source_conversation_id: Some("conv-1"),
            source_message_id: Some("msg-1"),
            canonical_ts: "2026-01-02T03:04:05.000Z",
            role: Role::User,
            text: "hello",
        };
        let id1 = atom_stable_id(&base);
        let id2 = atom_stable_id(&base);
        assert_eq!(id1, id2);

        let different_text = AtomIdInput { text: "goodbye", ..base };
        assert_ne!(id1, atom_stable_id(&different_text));
    }

    #[test]
    fn segment_id_changes_with_index() {
        let h = bundle_hash("some text");
        assert_ne!(segment_id(&h, 0), segment_id(&h, 1));
    }

    proptest::proptest! {
        #[test]
        fn sha256_never_panics_on_arbitrary_utf8(s in ".*") {
            let _ = sha256(&s);
        }
    }
}
