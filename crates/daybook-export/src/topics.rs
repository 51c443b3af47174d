//! Topic computation (topic_v1) and the changelog diff algorithm, both
//! pure functions over already-loaded atoms — no I/O.

use std::collections::{BTreeMap, BTreeSet};

use daybook_core::model::Category;

use crate::types::{ExportAtom, PreviousTopicSummary};

#[derive(Debug, Clone)]
pub struct TopicSummary {
    pub topic_id: String,
    pub category_api: String,
    pub display_name: String,
    pub atom_count: i64,
    /// Day dates with at least one atom in this topic, ascending.
    pub days: Vec<String>,
}

impl TopicSummary {
    #[must_use]
    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    #[must_use]
    pub fn date_range(&self) -> Option<(&str, &str)> {
        match (self.days.first(), self.days.last()) {
            (Some(start), Some(end)) => Some((start.as_str(), end.as_str())),
            _ => None,
        }
    }
}

/// `topicId == categoryApi` lowercased; atoms with no category map to
/// `other`. Only `Role::User` atoms are grouped — categories are assigned
/// to the journal's own voice, never the assistant's replies.
#[must_use]
pub fn compute_topics(days: &[(&str, &[ExportAtom])]) -> BTreeMap<String, TopicSummary> {
    let mut by_topic: BTreeMap<String, (i64, BTreeSet<String>)> = BTreeMap::new();

    for (day_date, atoms) in days {
        for export_atom in atoms.iter() {
            if export_atom.atom.role.0 != daybook_hash::Role::User {
                continue;
            }
            let category_api = export_atom
                .category
                .map(Category::as_str)
                .unwrap_or("OTHER")
                .to_string();
            let topic_id = category_api.to_lowercase();
            let entry = by_topic.entry(topic_id).or_insert((0, BTreeSet::new()));
            entry.0 += 1;
            entry.1.insert((*day_date).to_string());
        }
    }

    by_topic
        .into_iter()
        .map(|(topic_id, (atom_count, days_set))| {
            let category_api = topic_id.to_uppercase();
            let display_name = display_name_for_topic(&topic_id);
            let days: Vec<String> = days_set.into_iter().collect();
            (
                topic_id.clone(),
                TopicSummary { topic_id, category_api, display_name, atom_count, days },
            )
        })
        .collect()
}

/// Title-cases each `_`-separated word and joins with a space, e.g.
/// `mental_health` -> `Mental Health`.
#[must_use]
pub fn display_name_for_topic(topic_id: &str) -> String {
    topic_id
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone)]
pub struct ChangedTopic {
    pub topic_id: String,
    pub display_name: String,
    pub atom_delta: i64,
    pub days_added: Vec<String>,
    pub days_removed: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ChangelogDiff {
    /// Sorted by display_name ASC.
    pub new_topics: Vec<TopicSummary>,
    /// Sorted by display_name ASC.
    pub removed_topics: Vec<PreviousTopicSummary>,
    /// Sorted by display_name ASC.
    pub changed_topics: Vec<ChangedTopic>,
}

impl ChangelogDiff {
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.new_topics.len() + self.removed_topics.len() + self.changed_topics.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.change_count() == 0
    }
}

/// `newTopics = current - previous`, `removedTopics = previous - current`,
/// `changedTopics` = intersection where the day set or atom count differs.
#[must_use]
pub fn diff_topics(
    current: &BTreeMap<String, TopicSummary>,
    previous: &[PreviousTopicSummary],
) -> ChangelogDiff {
    let previous_by_id: BTreeMap<&str, &PreviousTopicSummary> =
        previous.iter().map(|t| (t.topic_id.as_str(), t)).collect();

    let mut new_topics: Vec<TopicSummary> = current
        .values()
        .filter(|t| !previous_by_id.contains_key(t.topic_id.as_str()))
        .cloned()
        .collect();
    new_topics.sort_by(|a, b| a.display_name.cmp(&b.display_name));

    let mut removed_topics: Vec<PreviousTopicSummary> = previous
        .iter()
        .filter(|t| !current.contains_key(&t.topic_id))
        .cloned()
        .collect();
    removed_topics.sort_by(|a, b| a.display_name.cmp(&b.display_name));

    let mut changed_topics: Vec<ChangedTopic> = Vec::new();
    for topic in current.values() {
        let Some(prev) = previous_by_id.get(topic.topic_id.as_str()) else { continue };
        let prev_days: BTreeSet<&str> = prev.days.iter().map(String::as_str).collect();
        let curr_days: BTreeSet<&str> = topic.days.iter().map(String::as_str).collect();
        let atom_delta = topic.atom_count - prev.atom_count;
        if prev_days == curr_days && atom_delta == 0 {
            continue;
        }
        let days_added: Vec<String> =
            curr_days.difference(&prev_days).map(|s| (*s).to_string()).collect();
        let days_removed: Vec<String> =
            prev_days.difference(&curr_days).map(|s| (*s).to_string()).collect();
        changed_topics.push(ChangedTopic {
            topic_id: topic.topic_id.clone(),
            display_name: topic.display_name.clone(),
            atom_delta,
            days_added,
            days_removed,
        });
    }
    changed_topics.sort_by(|a, b| a.display_name.cmp(&b.display_name));

    ChangelogDiff { new_topics, removed_topics, changed_topics }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_title_cases_multi_word_categories() {
        assert_eq!(display_name_for_topic("mental_health"), "Mental Health");
        assert_eq!(display_name_for_topic("work"), "Work");
        assert_eq!(display_name_for_topic("addiction_recovery"), "Addiction Recovery");
    }

    #[test]
    fn diff_detects_new_removed_and_changed() {
        let mut current = BTreeMap::new();
        current.insert(
            "work".to_string(),
            TopicSummary {
                topic_id: "work".to_string(),
                category_api: "WORK".to_string(),
                display_name: "Work".to_string(),
                atom_count: 5,
                days: vec!["2026-01-01".to_string(), "2026-01-02".to_string()],
            },
        );
        current.insert(
            "learning".to_string(),
            TopicSummary {
                topic_id: "learning".to_string(),
                category_api: "LEARNING".to_string(),
                display_name: "Learning".to_string(),
                atom_count: 2,
                days: vec!["2026-01-02".to_string()],
            },
        );

        let previous = vec![
            PreviousTopicSummary {
                topic_id: "work".to_string(),
                display_name: "Work".to_string(),
                category: "WORK".to_string(),
                atom_count: 3,
                days: vec!["2026-01-01".to_string()],
            },
            PreviousTopicSummary {
                topic_id: "legal".to_string(),
                display_name: "Legal".to_string(),
                category: "LEGAL".to_string(),
                atom_count: 1,
                days: vec!["2025-12-31".to_string()],
            },
        ];

        let diff = diff_topics(&current, &previous);
        assert_eq!(diff.new_topics.len(), 1);
        assert_eq!(diff.new_topics[0].topic_id, "learning");
        assert_eq!(diff.removed_topics.len(), 1);
        assert_eq!(diff.removed_topics[0].topic_id, "legal");
        assert_eq!(diff.changed_topics.len(), 1);
        assert_eq!(diff.changed_topics[0].topic_id, "work");
        assert_eq!(diff.changed_topics[0].atom_delta, 2);
        assert_eq!(diff.changed_topics[0].days_added, vec!["2026-01-02".to_string()]);
        assert_eq!(diff.change_count(), 3);
    }

    #[test]
    fn diff_is_empty_when_nothing_changed() {
        let mut current = BTreeMap::new();
        current.insert(
            "work".to_string(),
            TopicSummary {
                topic_id: "work".to_string(),
                category_api: "WORK".to_string(),
                display_name: "Work".to_string(),
                atom_count: 3,
                days: vec!["2026-01-01".to_string()],
            },
        );
        let previous = vec![PreviousTopicSummary {
            topic_id: "work".to_string(),
            display_name: "Work".to_string(),
            category: "WORK".to_string(),
            atom_count: 3,
            days: vec!["2026-01-01".to_string()],
        }];
        assert!(diff_topics(&current, &previous).is_empty());
    }
}
