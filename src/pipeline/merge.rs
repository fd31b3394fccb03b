use std::collections::BTreeMap;

/// Merge partial transcripts keyed by slice index into one string.
///
/// Indices are sorted numerically, each text is trimmed, empty fragments are
/// dropped, and the survivors are joined with single spaces. Gaps in the
/// index sequence are skipped silently; a failed slice simply contributes
/// nothing.
pub fn merge_partials<I, S>(partials: I) -> String
where
    I: IntoIterator<Item = (u32, S)>,
    S: AsRef<str>,
{
    let ordered: BTreeMap<u32, S> = partials.into_iter().collect();

    let mut merged = String::new();
    for text in ordered.values() {
        let trimmed = text.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        if !merged.is_empty() {
            merged.push(' ');
        }
        merged.push_str(trimmed);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn orders_by_index_and_drops_empty() {
        let partials = HashMap::from([
            (2u32, "b".to_string()),
            (0, "a".to_string()),
            (1, "".to_string()),
        ]);
        assert_eq!(merge_partials(partials), "a b");
    }

    #[test]
    fn empty_input_yields_empty_string() {
        assert_eq!(merge_partials(HashMap::<u32, String>::new()), "");
    }

    #[test]
    fn tolerates_index_gaps() {
        let partials = vec![(0u32, "start"), (7, "end")];
        assert_eq!(merge_partials(partials), "start end");
    }

    #[test]
    fn trims_fragments() {
        let partials = vec![(0u32, "  hello  "), (1, "\tworld\n")];
        assert_eq!(merge_partials(partials), "hello world");
    }

    #[test]
    fn insertion_order_is_irrelevant() {
        let forward = vec![(0u32, "a"), (1, "b"), (2, "c")];
        let shuffled = vec![(2u32, "c"), (0, "a"), (1, "b")];
        let merged = merge_partials(forward);
        assert_eq!(merged, merge_partials(shuffled));
        // Idempotent: merging the same contents again yields the same text.
        assert_eq!(
            merged,
            merge_partials(vec![(0u32, "a"), (1, "b"), (2, "c")])
        );
    }
}
