use std::collections::{BTreeMap, HashMap, HashSet};

const STOP_WORDS: &[&str] = &[
    "about", "after", "again", "all", "also", "and", "any", "are", "because", "been", "before", "but", "can",
    "could", "did", "does", "for", "from", "had", "has", "have", "her", "his", "how", "into", "its", "just", "more",
    "not", "now", "only", "other", "our", "out", "over", "she", "should", "some", "than", "that", "the", "their",
    "them", "then", "there", "these", "they", "this", "very", "was", "were", "what", "when", "which", "while", "who",
    "why", "will", "with", "would", "you", "your",
];

/// Lowercased alphanumeric runs.
pub(crate) fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).map(str::to_lowercase)
}

fn content_words(text: &str) -> impl Iterator<Item = String> + '_ {
    tokens(text).filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(&w.as_str()))
}

/// Top `n` words per group, weighted by how specific they are to it.
///
/// `groups` maps a group key to its texts. Score is term frequency times a
/// smoothed inverse group frequency; ties go to the alphabetically first word.
pub(crate) fn top_keywords<K: Ord + Copy>(groups: &BTreeMap<K, Vec<&str>>, n: usize) -> BTreeMap<K, Vec<String>> {
    let counts: BTreeMap<K, HashMap<String, usize>> = groups
        .iter()
        .map(|(k, texts)| {
            let mut tf = HashMap::new();
            for w in texts.iter().flat_map(|t| content_words(t)) {
                *tf.entry(w).or_insert(0) += 1;
            }
            (*k, tf)
        })
        .collect();

    let mut df: HashMap<&str, usize> = HashMap::new();
    for tf in counts.values() {
        for w in tf.keys() {
            *df.entry(w.as_str()).or_insert(0) += 1;
        }
    }
    let n_groups = counts.len() as f64;

    counts
        .iter()
        .map(|(k, tf)| {
            let mut scored: Vec<(f64, &str)> = tf
                .iter()
                .map(|(w, c)| {
                    let idf = ((1.0 + n_groups) / (1.0 + df[w.as_str()] as f64)).ln() + 1.0;
                    (*c as f64 * idf, w.as_str())
                })
                .collect();
            scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));
            (*k, scored.into_iter().take(n).map(|(_, w)| w.to_string()).collect())
        })
        .collect()
}

/// "Refund, card, bank" from the leading keywords, or `None` without any.
pub(crate) fn label_from(keywords: &[String]) -> Option<String> {
    let joined = keywords.iter().take(3).cloned().collect::<Vec<_>>().join(", ");
    let mut chars = joined.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}

pub(crate) fn overlap(a: &[String], b: &[String]) -> f64 {
    let a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let b: HashSet<&str> = b.iter().map(String::as_str).collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_prefer_group_specific_words() {
        let mut groups = BTreeMap::new();
        groups.insert(0, vec!["card refund please", "refund my card", "the card was charged twice"]);
        groups.insert(1, vec!["flight delayed please", "my flight was cancelled", "please rebook flight"]);
        let kw = top_keywords(&groups, 2);
        assert_eq!(kw[&0], vec!["card", "refund"]);
        assert_eq!(kw[&1][0], "flight");
    }

    #[test]
    fn labels_capitalize_the_first_keyword() {
        let kw = vec!["refund".to_string(), "card".to_string(), "bank".to_string(), "fee".to_string()];
        assert_eq!(label_from(&kw).as_deref(), Some("Refund, card, bank"));
        assert_eq!(label_from(&[]), None);
    }

    #[test]
    fn overlap_is_jaccard() {
        let a = vec!["a".to_string(), "b".to_string()];
        let b = vec!["b".to_string(), "c".to_string()];
        assert!((overlap(&a, &b) - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(overlap(&[], &[]), 0.0);
    }
}
