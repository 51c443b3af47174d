//! `segmenter_v1`: greedy token-packing of an ordered atom list into
//! segments that never exceed a token cap and never split an atom.

pub const SOURCE_HEADER_OVERHEAD: usize = 20;

/// One atom as handed to the segmenter: already rendered into its bundle
/// line (`[ts] role: text`), plus the source it belongs to (for header
/// overhead accounting) and its stable id (carried through for traceability,
/// not used in the segmentation decision itself).
#[derive(Debug, Clone)]
pub struct SegmentInputAtom {
    pub atom_stable_id: String,
    pub source: String,
    pub rendered_line: String,
}

#[derive(Debug, Clone)]
pub struct Segment {
    pub id: String,
    pub index: usize,
    pub atom_stable_ids: Vec<String>,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct SegmentationResult {
    pub segments: Vec<Segment>,
    pub was_segmented: bool,
}

/// `estimateTokens(s) = ceil(len(s) / 4)`
#[must_use]
pub fn estimate_tokens(s: &str) -> usize {
    s.len().div_ceil(4)
}

struct Building {
    atoms: Vec<SegmentInputAtom>,
    tokens: usize,
    last_source: Option<String>,
}

impl Building {
    fn new() -> Self {
        Building { atoms: Vec::new(), tokens: 0, last_source: None }
    }

    fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    fn render(&self) -> String {
        let mut out = String::new();
        let mut last_source: Option<&str> = None;
        for atom in &self.atoms {
            if last_source != Some(atom.source.as_str()) {
                if last_source.is_some() {
                    out.push('\n');
                }
                out.push_str(&format!("# SOURCE: {}\n", atom.source));
                last_source = Some(atom.source.as_str());
            }
            out.push_str(&atom.rendered_line);
            out.push('\n');
        }
        out.trim_end_matches('\n').to_string()
    }
}

/// Packs `atoms` (already in bundle order) into segments bounded by
/// `max_input_tokens`. An atom is only ever added whole; if a single atom
/// (plus its unavoidable header overhead) exceeds the cap by itself, it
/// still becomes its own one-atom segment rather than being dropped or
/// truncated.
#[must_use]
pub fn segment_bundle(
    atoms: &[SegmentInputAtom],
    bundle_hash: &str,
    max_input_tokens: usize,
) -> SegmentationResult {
    let mut segments_building: Vec<Building> = Vec::new();
    let mut current = Building::new();

    for atom in atoms {
        let needs_header = current.last_source.as_deref() != Some(atom.source.as_str());
        let header_overhead = if needs_header { SOURCE_HEADER_OVERHEAD } else { 0 };
        let line_tokens = estimate_tokens(&atom.rendered_line);
        let additional = line_tokens + header_overhead;

        if !current.is_empty() && current.tokens + additional > max_input_tokens {
            segments_building.push(current);
            current = Building::new();
        }

        // Recompute header need against the (possibly just-reset) segment.
        let needs_header = current.last_source.as_deref() != Some(atom.source.as_str());
        let header_overhead = if needs_header { SOURCE_HEADER_OVERHEAD } else { 0 };
        current.tokens += estimate_tokens(&atom.rendered_line) + header_overhead;
        current.last_source = Some(atom.source.clone());
        current.atoms.push(atom.clone());
    }

    if !current.is_empty() {
        segments_building.push(current);
    }

    let was_segmented = segments_building.len() > 1;
    let segments = segments_building
        .into_iter()
        .enumerate()
        .map(|(index, building)| Segment {
            id: daybook_hash::segment_id(bundle_hash, index),
            index,
            atom_stable_ids: building.atoms.iter().map(|a| a.atom_stable_id.clone()).collect(),
            text: building.render(),
        })
        .collect();

    SegmentationResult { segments, was_segmented }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(id: &str, source: &str, text: &str) -> SegmentInputAtom {
        SegmentInputAtom {
            atom_stable_id: id.to_string(),
            source: source.to_string(),
            rendered_line: format!("[2026-01-01T00:00:00.000Z] user: {text}"),
        }
    }

    #[test]
    fn single_small_bundle_is_not_segmented() {
        let atoms = vec![atom("a1", "chatgpt", "hello"), atom("a2", "chatgpt", "world")];
        let result = segment_bundle(&atoms, "hash", 10_000);
        assert!(!result.was_segmented);
        assert_eq!(result.segments.len(), 1);
    }

    #[test]
    fn oversized_bundle_splits_without_splitting_an_atom() {
        let atoms: Vec<_> = (0..50)
            .map(|i| atom(&format!("a{i}"), "chatgpt", &"x".repeat(100)))
            .collect();
        let result = segment_bundle(&atoms, "hash", 200);
        assert!(result.was_segmented);
        let total_atoms: usize = result.segments.iter().map(|s| s.atom_stable_ids.len()).sum();
        assert_eq!(total_atoms, 50);
        // Every original atom id appears in exactly one segment.
        let mut seen = std::collections::HashSet::new();
        for segment in &result.segments {
            for id in &segment.atom_stable_ids {
                assert!(seen.insert(id.clone()), "atom {id} appeared in more than one segment");
            }
        }
    }

    #[test]
    fn segment_ids_are_stable_and_index_dependent() {
        let atoms = vec![atom("a1", "chatgpt", &"x".repeat(500))];
        let result1 = segment_bundle(&atoms, "hash-a", 10);
        let result2 = segment_bundle(&atoms, "hash-a", 10);
        assert_eq!(
            result1.segments.iter().map(|s| s.id.clone()).collect::<Vec<_>>(),
            result2.segments.iter().map(|s| s.id.clone()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn a_single_oversized_atom_still_gets_its_own_segment() {
        let atoms = vec![atom("a1", "chatgpt", &"x".repeat(1000))];
        let result = segment_bundle(&atoms, "hash", 10);
        assert_eq!(result.segments.len(), 1);
        assert_eq!(result.segments[0].atom_stable_ids, vec!["a1".to_string()]);
    }

    proptest::proptest! {
        #[test]
        fn atom_order_is_preserved_across_segments(n in 1usize..40) {
            let atoms: Vec<_> = (0..n).map(|i| atom(&format!("a{i:03}"), "src", "hello world")).collect();
            let result = segment_bundle(&atoms, "hash", 50);
            let flattened: Vec<String> = result.segments.iter().flat_map(|s| s.atom_stable_ids.clone()).collect();
            let expected: Vec<String> = atoms.iter().map(|a| a.atom_stable_id.clone()).collect();
            prop_assert_eq!(flattened, expected);
        }
    }
}
