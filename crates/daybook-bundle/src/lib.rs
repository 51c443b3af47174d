//! Builds one day's bundle text from the user-role atoms the caller has
//! already loaded and filtered (via
//! [`daybook_db::repo::AtomRepo::load_bundle_atoms`]).
//!
//! Only user-role atoms ever reach this crate — the caller is responsible
//! for excluding assistant atoms when it queries, since the journal is
//! explicitly the user's own voice, not the model's replies.

use std::collections::HashSet;

use daybook_core::model::{FilterProfile, MessageAtom};
use daybook_hash::{bundle_context_hash, bundle_hash as compute_bundle_hash, BundleContextInput};
use serde::Serialize;

pub struct BundleInput<'a> {
    pub batch_ids: &'a [String],
    pub day_date: &'a str,
    pub sources: &'a [String],
    pub filter_profile: &'a FilterProfile,
    pub label_spec_json: &'a serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct BundleResult {
    pub bundle_text: String,
    pub bundle_hash: String,
    pub bundle_context_hash: String,
    /// Deduplicated, ordered atoms the segmenter should pack.
    pub atoms: Vec<MessageAtom>,
}

#[derive(Serialize)]
struct FilterProfileSnapshot<'a> {
    mode: &'a str,
    categories: Vec<&'a str>,
}

/// Builds the bundle: dedups atoms by `atomStableId` (defense in depth —
/// the DB's primary key already prevents true duplicates, but atoms can
/// legitimately arrive via more than one linked batch), then renders them
/// grouped by source in alphabetical order.
#[must_use]
pub fn build_bundle(input: &BundleInput<'_>, loaded_atoms: Vec<MessageAtom>) -> BundleResult {
    let mut seen = HashSet::new();
    let atoms: Vec<MessageAtom> = loaded_atoms
        .into_iter()
        .filter(|a| seen.insert(a.atom_stable_id.clone()))
        .collect();

    let bundle_text = render(&atoms);
    let bundle_hash = compute_bundle_hash(&bundle_text);

    let mut sorted_batch_ids = input.batch_ids.to_vec();
    sorted_batch_ids.sort();
    let mut sorted_sources = input.sources.to_vec();
    sorted_sources.sort();

    let filter_mode_str = match input.filter_profile.mode {
        daybook_core::model::FilterMode::Include => "include",
        daybook_core::model::FilterMode::Exclude => "exclude",
    };
    let filter_snapshot = FilterProfileSnapshot {
        mode: filter_mode_str,
        categories: input.filter_profile.categories.iter().map(|c| c.as_str()).collect(),
    };
    let filter_profile_json = serde_json_canonicalizer::to_string(&filter_snapshot)
        .unwrap_or_else(|_| "{}".to_string());
    let label_spec_json = serde_json_canonicalizer::to_string(input.label_spec_json)
        .unwrap_or_else(|_| "{}".to_string());

    let bundle_context_hash = bundle_context_hash(&BundleContextInput {
        sorted_batch_ids_csv: &sorted_batch_ids.join(","),
        day_date: input.day_date,
        sorted_sources_csv: &sorted_sources.join(","),
        filter_profile_snapshot_json: &filter_profile_json,
        label_spec_json: &label_spec_json,
    });

    BundleResult { bundle_text, bundle_hash, bundle_context_hash, atoms }
}

/// Groups atoms by source (preserving the incoming order, which callers
/// must already have sorted `source ASC, timestampUtc ASC, role ASC,
/// atomStableId ASC`) and renders each group under a `# SOURCE: x` header,
/// blank-line separated, with no trailing blank line.
fn render(atoms: &[MessageAtom]) -> String {
    if atoms.is_empty() {
        return String::new();
    }

    let mut blocks: Vec<String> = Vec::new();
    let mut current_source: Option<&str> = None;
    let mut current_lines: Vec<String> = Vec::new();

    for atom in atoms {
        if current_source != Some(atom.source.as_str()) {
            if let Some(source) = current_source {
                blocks.push(format_block(source, &current_lines));
                current_lines.clear();
            }
            current_source = Some(atom.source.as_str());
        }
        current_lines.push(render_atom_line(atom));
    }
    if let Some(source) = current_source {
        blocks.push(format_block(source, &current_lines));
    }

    blocks.join("\n\n")
}

/// `[<canonicalTs>] <role>: <text>`, the one-atom line format shared by the
/// bundle renderer and the segmenter's input atoms.
#[must_use]
pub fn render_atom_line(atom: &MessageAtom) -> String {
    format!("[{}] {}: {}", daybook_hash::to_canonical_ts(atom.timestamp_utc), atom.role.0, atom.text)
}

fn format_block(source: &str, lines: &[String]) -> String {
    let mut block = format!("# SOURCE: {source}\n");
    block.push_str(&lines.join("\n"));
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use daybook_core::model::RoleValue;

    fn atom(source: &str, text: &str, ts: chrono::DateTime<Utc>) -> MessageAtom {
        MessageAtom {
            atom_stable_id: daybook_hash::sha256(&format!("{source}{text}{ts}")),
            source: source.to_string(),
            source_conversation_id: None,
            source_message_id: None,
            timestamp_utc: ts,
            day_date: "2026-01-01".to_string(),
            role: RoleValue(daybook_hash::Role::User),
            text: text.to_string(),
            text_hash: daybook_hash::text_hash(text),
            import_batch_id: "batch-1".to_string(),
        }
    }

    #[test]
    fn empty_atoms_render_to_empty_string() {
        assert_eq!(render(&[]), "");
    }

    #[test]
    fn groups_by_source_with_blank_line_between_blocks_no_trailing_blank() {
        let ts = Utc::now();
        let atoms = vec![atom("chatgpt", "hi", ts), atom("claude", "yo", ts)];
        let text = render(&atoms);
        assert!(text.contains("# SOURCE: chatgpt"));
        assert!(text.contains("# SOURCE: claude"));
        assert!(!text.ends_with('\n'));
        assert!(text.contains("\n\n# SOURCE: claude"));
    }

    #[test]
    fn duplicate_atom_stable_ids_are_deduped_keeping_first() {
        let ts = Utc::now();
        let mut a = atom("chatgpt", "hi", ts);
        let mut b = a.clone();
        b.text = "different but same id".to_string();
        a.atom_stable_id = "dup-id".to_string();
        b.atom_stable_id = "dup-id".to_string();

        let input = BundleInput {
            batch_ids: &["b1".to_string()],
            day_date: "2026-01-01",
            sources: &["chatgpt".to_string()],
            filter_profile: &FilterProfile {
                id: "fp1".to_string(),
                name: "default".to_string(),
                mode: daybook_core::model::FilterMode::Exclude,
                categories: vec![],
            },
            label_spec_json: &serde_json::json!({"model": "stub", "promptVersionId": "v1"}),
        };
        let result = build_bundle(&input, vec![a.clone(), b]);
        assert_eq!(result.atoms.len(), 1);
        assert_eq!(result.atoms[0].text, "hi");
    }

    #[test]
    fn bundle_hash_changes_with_text() {
        let ts = Utc::now();
        let atoms_a = vec![atom("chatgpt", "hi", ts)];
        let atoms_b = vec![atom("chatgpt", "bye", ts)];
        assert_ne!(compute_bundle_hash(&render(&atoms_a)), compute_bundle_hash(&render(&atoms_b)));
    }
}
