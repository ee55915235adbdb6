use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use topichub_core::types::TopicId;

pub const PALETTE: [&str; 12] = [
    "hsl(210, 100%, 65%)",
    "hsl(175, 70%, 55%)",
    "hsl(40, 90%, 62%)",
    "hsl(340, 75%, 62%)",
    "hsl(265, 60%, 65%)",
    "hsl(150, 65%, 52%)",
    "hsl(20, 85%, 60%)",
    "hsl(195, 75%, 58%)",
    "hsl(300, 50%, 62%)",
    "hsl(55, 80%, 55%)",
    "hsl(0, 70%, 60%)",
    "hsl(120, 55%, 52%)",
];

/// First palette color not in `used`. Once every color is taken the palette
/// wraps around, indexed by `id`.
pub fn next_free_color(used: &HashSet<String>, id: TopicId) -> String {
    PALETTE
        .iter()
        .find(|c| !used.contains(**c))
        .map_or_else(|| PALETTE[id.rem_euclid(PALETTE.len() as i64) as usize], |c| *c)
        .to_string()
}

/// Multiplier for a child topic's coherence, in `[0.9, 1.05]`. Stable for a
/// given `(parent, child_index)` pair.
pub fn split_jitter(parent: TopicId, child_index: usize) -> f64 {
    let mut hasher = XxHash64::with_seed(0);
    parent.hash(&mut hasher);
    child_index.hash(&mut hasher);
    let unit = (hasher.finish() % 10_001) as f64 / 10_000.0;
    0.9 + 0.15 * unit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_in_range_and_is_stable() {
        for parent in -1..20 {
            for i in 0..8 {
                let j = split_jitter(parent, i);
                assert!((0.9..=1.05).contains(&j), "jitter {j} out of range");
                assert_eq!(j, split_jitter(parent, i));
            }
        }
    }

    #[test]
    fn free_color_skips_used_and_wraps() {
        let mut used: HashSet<String> = HashSet::new();
        used.insert(PALETTE[0].to_string());
        assert_eq!(next_free_color(&used, 0), PALETTE[1]);

        let all: HashSet<String> = PALETTE.iter().map(|c| c.to_string()).collect();
        assert_eq!(next_free_color(&all, 13), PALETTE[1]);
    }
}
