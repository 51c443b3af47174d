//! The pure renderer: `ExportInput -> Map<relativePath, content>`. No I/O —
//! [`crate::orchestrator`] is the only caller that talks to the database,
//! and a future CLI layer is the only caller that talks to the filesystem
//! (mirroring `xchecker_utils::atomic_write::write_file_atomic` sitting on
//! top of, never inside, a pure rendering function).

use std::collections::{BTreeMap, HashMap};

use daybook_core::error::Result;
use serde_json::{json, Map, Value};

use crate::json::to_canonical_pretty_json;
use crate::text::{bare, finalize_text, quoted, render_frontmatter_doc, FrontmatterField};
use crate::topics::{compute_topics, diff_topics, ChangelogDiff, TopicSummary};
use crate::types::{ExportAtom, ExportBatchInput, ExportDayInput, ExportInput, FormatVersion, PrivacyTier};

const README_V1: &str = "\
# daybook export

This is a v1 format-version export.

- `views/timeline.md` lists every exported day, newest first.
- `views/YYYY-MM-DD.md` holds one day's summary output.
- `atoms/YYYY-MM-DD.md` and `sources/*.md` are present only in the private tier.
- `.journal-meta/manifest.json` records every file's SHA-256 for integrity checking.
";

const README_V2: &str = "\
# daybook export

This is a v2 format-version export (topic_v1).

- `views/timeline.md` lists every exported day, newest first.
- `views/YYYY-MM-DD.md` holds one day's summary output.
- `topics/INDEX.md` and `topics/<topicId>.md` group days by category.
- `changelog.md` is present when this export was generated against a previous manifest.
- `atoms/YYYY-MM-DD.md` and `sources/*.md` are present only in the private tier.
- `.journal-meta/manifest.json` records every file's SHA-256 for integrity checking.
";

/// Renders the full export tree. Deterministic for a fixed `input` modulo
/// `exported_at`, the one volatile field (also true of the manifest it
/// produces).
pub fn render_export(input: &ExportInput) -> Result<BTreeMap<String, String>> {
    let mut files: BTreeMap<String, String> = BTreeMap::new();

    files.insert("README.md".to_string(), finalize_text(readme_body(&input.format_version)));
    files.insert("views/timeline.md".to_string(), render_timeline(&input.days));
    for day in &input.days {
        files.insert(format!("views/{}.md", day.day_date), render_day_view(day));
    }

    if input.privacy_tier == PrivacyTier::Private {
        for day in &input.days {
            if let Some(atoms) = &day.raw_atoms {
                files.insert(format!("atoms/{}.md", day.day_date), render_atoms_doc(atoms));
            }
        }
        let slugs = assign_source_slugs(&input.batches);
        for batch in &input.batches {
            let slug = slugs.get(&batch.import_batch_id).expect("every batch was slugged");
            files.insert(format!("sources/{slug}.md"), render_source_doc(batch));
        }
    }

    let topics = if input.format_version.is_v2() {
        let days_atoms: Vec<(&str, &[ExportAtom])> = input
            .days
            .iter()
            .filter_map(|d| d.raw_atoms.as_ref().map(|a| (d.day_date.as_str(), a.as_slice())))
            .collect();
        Some(compute_topics(&days_atoms))
    } else {
        None
    };

    if let Some(topics) = &topics {
        files.insert("topics/INDEX.md".to_string(), render_topics_index(topics));
        for topic in topics.values() {
            files.insert(format!("topics/{}.md", topic.topic_id), render_topic_doc(topic));
        }
    }

    let changelog_diff = match (&topics, &input.previous_manifest) {
        (Some(topics), Some(previous)) => Some(diff_topics(topics, &previous.topics)),
        _ => None,
    };
    if let Some(diff) = &changelog_diff {
        files.insert("changelog.md".to_string(), render_changelog(diff));
    }

    let manifest = render_manifest(input, &files, topics.as_ref(), changelog_diff.as_ref())?;
    files.insert(".journal-meta/manifest.json".to_string(), manifest);

    Ok(files)
}

fn readme_body(format_version: &FormatVersion) -> &'static str {
    match format_version {
        FormatVersion::V1 => README_V1,
        FormatVersion::V2 { .. } => README_V2,
    }
}

/// Flat when <=14 days, otherwise `## Recent` (newest 14) + `## All entries`
/// (every day). No timestamps, no frontmatter.
fn render_timeline(days: &[ExportDayInput]) -> String {
    let mut dates: Vec<&str> = days.iter().map(|d| d.day_date.as_str()).collect();
    dates.sort_unstable_by(|a, b| b.cmp(a));

    let mut out = String::from("# Timeline\n\n");
    let entry = |d: &str| format!("- [{d}]({d}.md)\n");

    if dates.len() <= 14 {
        for d in &dates {
            out.push_str(&entry(d));
        }
    } else {
        out.push_str("## Recent\n\n");
        for d in dates.iter().take(14) {
            out.push_str(&entry(d));
        }
        out.push_str("\n## All entries\n\n");
        for d in &dates {
            out.push_str(&entry(d));
        }
    }
    finalize_text(&out)
}

/// Frontmatter keys in order: date, model, runId, createdAt, bundleHash,
/// bundleContextHash, segmented[, segmentCount]. Body is `outputText` verbatim.
fn render_day_view(day: &ExportDayInput) -> String {
    let mut fields = vec![
        FrontmatterField { key: "date", value: quoted(&day.day_date) },
        FrontmatterField { key: "model", value: quoted(&day.model) },
        FrontmatterField { key: "runId", value: quoted(&day.run_id) },
        FrontmatterField {
            key: "createdAt",
            value: quoted(&daybook_hash::to_canonical_ts(day.created_at)),
        },
        FrontmatterField { key: "bundleHash", value: quoted(&day.bundle_hash) },
        FrontmatterField { key: "bundleContextHash", value: quoted(&day.bundle_context_hash) },
        FrontmatterField { key: "segmented", value: bare(day.segmented) },
    ];
    if day.segmented {
        fields.push(FrontmatterField { key: "segmentCount", value: bare(day.segment_count) });
    }
    render_frontmatter_doc(&fields, &day.output_text)
}

/// `# SOURCE: <src>` groups, `[ts] user: text` lines, blank line between
/// sources. Empty list renders a single newline. Only user-role atoms ever
/// reach this function (the orchestrator loads user atoms only), so the
/// role column is the literal word `user` rather than a per-atom lookup.
fn render_atoms_doc(atoms: &[ExportAtom]) -> String {
    if atoms.is_empty() {
        return "\n".to_string();
    }

    let mut blocks: Vec<String> = Vec::new();
    let mut current_source: Option<&str> = None;
    let mut lines: Vec<String> = Vec::new();

    for export_atom in atoms {
        let atom = &export_atom.atom;
        if current_source != Some(atom.source.as_str()) {
            if let Some(source) = current_source {
                blocks.push(format!("# SOURCE: {source}\n{}", lines.join("\n")));
                lines.clear();
            }
            current_source = Some(atom.source.as_str());
        }
        lines.push(format!(
            "[{}] user: {}",
            daybook_hash::to_canonical_ts(atom.timestamp_utc),
            atom.text
        ));
    }
    if let Some(source) = current_source {
        blocks.push(format!("# SOURCE: {source}\n{}", lines.join("\n")));
    }

    finalize_text(&blocks.join("\n\n"))
}

/// Slug = `{source}-{sanitised-filename-without-ext}`, collisions suffixed
/// `-2`, `-3`, ... in batch-id order (the order `batches` already arrives
/// in — the orchestrator sorts it by `import_batch_id`).
fn assign_source_slugs(batches: &[ExportBatchInput]) -> HashMap<String, String> {
    let mut seen_counts: HashMap<String, u32> = HashMap::new();
    let mut result = HashMap::new();
    for batch in batches {
        let base = format!("{}-{}", sanitize_slug_part(&batch.source), sanitize_slug_part(strip_ext(&batch.filename)));
        let count = seen_counts.entry(base.clone()).or_insert(0);
        *count += 1;
        let slug = if *count == 1 { base } else { format!("{base}-{count}") };
        result.insert(batch.import_batch_id.clone(), slug);
    }
    result
}

fn strip_ext(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(idx) if idx > 0 => &filename[..idx],
        _ => filename,
    }
}

fn sanitize_slug_part(s: &str) -> String {
    let mut out = String::new();
    let mut last_was_dash = false;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash {
            out.push('-');
            last_was_dash = true;
        }
    }
    out.trim_matches('-').to_string()
}

fn render_source_doc(batch: &ExportBatchInput) -> String {
    let mut fields = vec![
        FrontmatterField { key: "source", value: quoted(&batch.source) },
        FrontmatterField { key: "filename", value: quoted(&batch.filename) },
        FrontmatterField { key: "timezone", value: quoted(&batch.timezone) },
        FrontmatterField { key: "importBatchId", value: quoted(&batch.import_batch_id) },
        FrontmatterField { key: "fileSizeBytes", value: bare(batch.file_size_bytes) },
        FrontmatterField { key: "messageCount", value: bare(batch.message_count) },
        FrontmatterField { key: "uniqueDayCount", value: bare(batch.unique_day_count) },
    ];
    if let Some(d) = &batch.first_day_date {
        fields.push(FrontmatterField { key: "firstDayDate", value: quoted(d) });
    }
    if let Some(d) = &batch.last_day_date {
        fields.push(FrontmatterField { key: "lastDayDate", value: quoted(d) });
    }
    let body = format!("Import batch `{}` from `{}`.", batch.import_batch_id, batch.filename);
    render_frontmatter_doc(&fields, &body)
}

/// Sorted `atomCount DESC, category ASC`.
fn render_topics_index(topics: &BTreeMap<String, TopicSummary>) -> String {
    let mut rows: Vec<&TopicSummary> = topics.values().collect();
    rows.sort_by(|a, b| b.atom_count.cmp(&a.atom_count).then_with(|| a.topic_id.cmp(&b.topic_id)));

    let mut out = String::from("# Topics\n\n| Topic | Category | Atoms | Days |\n| --- | --- | --- | --- |\n");
    for topic in rows {
        out.push_str(&format!(
            "| [{}](./{}.md) | {} | {} | {} |\n",
            topic.display_name,
            topic.topic_id,
            topic.category_api,
            topic.atom_count,
            topic.day_count()
        ));
    }
    finalize_text(&out)
}

fn render_topic_doc(topic: &TopicSummary) -> String {
    let (start, end) = topic.date_range().unwrap_or(("", ""));
    let fields = vec![
        FrontmatterField { key: "topicId", value: quoted(&topic.topic_id) },
        FrontmatterField { key: "topicVersion", value: quoted("topic_v1") },
        FrontmatterField { key: "category", value: quoted(&topic.category_api) },
        FrontmatterField { key: "displayName", value: quoted(&topic.display_name) },
        FrontmatterField { key: "atomCount", value: bare(topic.atom_count) },
        FrontmatterField { key: "dayCount", value: bare(topic.day_count()) },
        FrontmatterField {
            key: "dateRange",
            value: format!("{{start: {}, end: {}}}", quoted(start), quoted(end)),
        },
    ];

    let atom_word = if topic.atom_count == 1 { "atom" } else { "atoms" };
    let mut body =
        format!("{} {atom_word} across {} day(s), {start} to {end}.\n\n", topic.atom_count, topic.day_count());
    let mut days = topic.days.clone();
    days.sort_unstable_by(|a, b| b.cmp(a));
    for day in days {
        body.push_str(&format!("- [{day}](../views/{day}.md)\n"));
    }

    render_frontmatter_doc(&fields, &body)
}

/// Three sections (New topics, Removed topics, Changed topics); empty
/// sections omitted; entries sorted by displayName ASC.
fn render_changelog(diff: &ChangelogDiff) -> String {
    let mut out = String::from("# Changelog\n\n");

    if !diff.new_topics.is_empty() {
        out.push_str("## New topics\n\n");
        for topic in &diff.new_topics {
            let word = if topic.atom_count == 1 { "atom" } else { "atoms" };
            out.push_str(&format!("- **{}** ({} {word})\n", topic.display_name, topic.atom_count));
        }
        out.push('\n');
    }

    if !diff.removed_topics.is_empty() {
        out.push_str("## Removed topics\n\n");
        for topic in &diff.removed_topics {
            let word = if topic.atom_count == 1 { "atom" } else { "atoms" };
            out.push_str(&format!("- **{}** ({} {word})\n", topic.display_name, topic.atom_count));
        }
        out.push('\n');
    }

    if !diff.changed_topics.is_empty() {
        out.push_str("## Changed topics\n\n");
        for topic in &diff.changed_topics {
            let sign = if topic.atom_delta >= 0 { "+" } else { "" };
            let mut added = topic.days_added.clone();
            added.sort();
            let mut removed = topic.days_removed.clone();
            removed.sort();
            let added_s = if added.is_empty() { "none".to_string() } else { added.join(", ") };
            let removed_s = if removed.is_empty() { "none".to_string() } else { removed.join(", ") };
            out.push_str(&format!(
                "- **{}**: {sign}{} atoms (days added: {added_s}; days removed: {removed_s})\n",
                topic.display_name, topic.atom_delta
            ));
        }
        out.push('\n');
    }

    finalize_text(&out)
}

/// `{formatVersion, exportedAt, dateRange, batches, run, files:{path ->
/// {sha256}}}`, plus `topicVersion`/`topics`/`changelog` when V2 is on.
/// `exportedAt` is the only volatile field across otherwise-identical
/// re-renders.
fn render_manifest(
    input: &ExportInput,
    files: &BTreeMap<String, String>,
    topics: Option<&BTreeMap<String, TopicSummary>>,
    changelog_diff: Option<&ChangelogDiff>,
) -> Result<String> {
    let mut files_obj = Map::new();
    for (path, content) in files {
        files_obj.insert(path.clone(), json!({ "sha256": daybook_hash::sha256(content) }));
    }

    let batches: Vec<Value> = input
        .batches
        .iter()
        .map(|b| {
            json!({
                "importBatchId": b.import_batch_id,
                "source": b.source,
                "filename": b.filename,
                "timezone": b.timezone,
                "fileSizeBytes": b.file_size_bytes,
                "messageCount": b.message_count,
                "uniqueDayCount": b.unique_day_count,
                "firstDayDate": b.first_day_date,
                "lastDayDate": b.last_day_date,
            })
        })
        .collect();

    let mut manifest = Map::new();
    manifest.insert("formatVersion".to_string(), json!(input.format_version.as_str()));
    manifest.insert("exportedAt".to_string(), json!(daybook_hash::to_canonical_ts(input.exported_at)));
    manifest.insert(
        "dateRange".to_string(),
        json!({ "start": input.start_date, "end": input.end_date }),
    );
    manifest.insert("batches".to_string(), Value::Array(batches));
    manifest.insert("run".to_string(), json!({ "id": input.run_id }));

    if let FormatVersion::V2 { topic_version } = &input.format_version {
        manifest.insert("topicVersion".to_string(), json!(topic_version));

        let mut topics_obj = Map::new();
        if let Some(topics) = topics {
            for topic in topics.values() {
                topics_obj.insert(
                    topic.topic_id.clone(),
                    json!({
                        "displayName": topic.display_name,
                        "category": topic.category_api,
                        "atomCount": topic.atom_count,
                        "days": topic.days,
                    }),
                );
            }
        }
        manifest.insert("topics".to_string(), Value::Object(topics_obj));

        let changelog_value = match changelog_diff {
            Some(diff) => json!({
                "newTopics": diff.new_topics.iter().map(|t| t.topic_id.clone()).collect::<Vec<_>>(),
                "removedTopics": diff.removed_topics.iter().map(|t| t.topic_id.clone()).collect::<Vec<_>>(),
                "changedTopics": diff.changed_topics.iter().map(|t| t.topic_id.clone()).collect::<Vec<_>>(),
                "changeCount": diff.change_count(),
            }),
            None => Value::Null,
        };
        manifest.insert("changelog".to_string(), changelog_value);
    }

    manifest.insert("files".to_string(), Value::Object(files_obj));

    to_canonical_pretty_json(&Value::Object(manifest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn day(date: &str, segmented: bool) -> ExportDayInput {
        ExportDayInput {
            day_date: date.to_string(),
            model: "stub".to_string(),
            run_id: "run-1".to_string(),
            created_at: Utc::now(),
            bundle_hash: "bh".to_string(),
            bundle_context_hash: "bch".to_string(),
            output_text: "summary text".to_string(),
            segmented,
            segment_count: if segmented { 2 } else { 1 },
            raw_atoms: Some(vec![]),
        }
    }

    fn minimal_input(days: Vec<ExportDayInput>) -> ExportInput {
        ExportInput {
            format_version: FormatVersion::V1,
            privacy_tier: PrivacyTier::Private,
            run_id: "run-1".to_string(),
            start_date: "2026-01-01".to_string(),
            end_date: "2026-01-01".to_string(),
            exported_at: Utc::now(),
            days,
            batches: vec![],
            previous_manifest: None,
        }
    }

    #[test]
    fn renders_readme_timeline_and_day_view() {
        let input = minimal_input(vec![day("2026-01-01", false)]);
        let files = render_export(&input).unwrap();
        assert!(files.contains_key("README.md"));
        assert!(files.contains_key("views/timeline.md"));
        assert!(files.contains_key("views/2026-01-01.md"));
        assert!(files.contains_key(".journal-meta/manifest.json"));
        let view = &files["views/2026-01-01.md"];
        assert!(view.contains("date: \"2026-01-01\""));
        assert!(view.contains("summary text"));
        assert!(!view.contains("segmentCount"));
    }

    #[test]
    fn day_view_includes_segment_count_only_when_segmented() {
        let input = minimal_input(vec![day("2026-01-01", true)]);
        let files = render_export(&input).unwrap();
        assert!(files["views/2026-01-01.md"].contains("segmentCount: 2"));
    }

    #[test]
    fn timeline_matches_literal_two_day_scenario() {
        let input = minimal_input(vec![day("2024-01-15", false), day("2024-01-16", false)]);
        let files = render_export(&input).unwrap();
        assert_eq!(
            files["views/timeline.md"],
            "# Timeline\n\n- [2024-01-16](2024-01-16.md)\n- [2024-01-15](2024-01-15.md)\n"
        );
    }

    #[test]
    fn timeline_switches_to_recent_plus_all_past_14_days() {
        let days: Vec<ExportDayInput> =
            (1..=15).map(|n| day(&format!("2026-01-{n:02}"), false)).collect();
        let input = minimal_input(days);
        let files = render_export(&input).unwrap();
        let timeline = &files["views/timeline.md"];
        assert!(timeline.contains("## Recent"));
        assert!(timeline.contains("## All entries"));
    }

    #[test]
    fn public_tier_omits_atoms_and_sources() {
        let mut input = minimal_input(vec![day("2026-01-01", false)]);
        input.privacy_tier = PrivacyTier::Public;
        input.batches = vec![ExportBatchInput {
            import_batch_id: "b1".to_string(),
            source: "chatgpt".to_string(),
            filename: "export.json".to_string(),
            timezone: "UTC".to_string(),
            file_size_bytes: 10,
            message_count: 1,
            unique_day_count: 1,
            first_day_date: Some("2026-01-01".to_string()),
            last_day_date: Some("2026-01-01".to_string()),
        }];
        let files = render_export(&input).unwrap();
        assert!(!files.contains_key("atoms/2026-01-01.md"));
        assert!(!files.keys().any(|k| k.starts_with("sources/")));
    }

    #[test]
    fn every_file_is_byte_stable_except_exported_at() {
        let input = minimal_input(vec![day("2026-01-01", false)]);
        let a = render_export(&input).unwrap();
        let b = render_export(&input).unwrap();
        for (path, content) in &a {
            if path == ".journal-meta/manifest.json" {
                continue;
            }
            assert_eq!(content, &b[path], "{path} differs between renders");
        }
    }

    #[test]
    fn manifest_keys_sorted_alphabetically() {
        let input = minimal_input(vec![day("2026-01-01", false)]);
        let files = render_export(&input).unwrap();
        let manifest = &files[".journal-meta/manifest.json"];
        let batches_pos = manifest.find("\"batches\"").unwrap();
        let date_range_pos = manifest.find("\"dateRange\"").unwrap();
        assert!(batches_pos < date_range_pos);
    }
}
