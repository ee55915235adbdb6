//! Structural edits on a completed [`ClusteringResult`].
//!
//! Every operation borrows its input, validates all preconditions, then works
//! on a clone. The clone goes through [`ClusteringResult::normalize`] and the
//! invariant check before it is returned, so callers either get a fully
//! consistent result or an error and an untouched original.

use topichub_core::error::{Error, Result};
use topichub_core::types::{ClusteringResult, TopicId};

mod exclude;
mod merge;
mod palette;
mod partition;
mod reclassify;
mod relabel;
mod rename;
mod split;
mod suggestion;

pub use exclude::{set_excluded, ExcludeInfo};
pub use merge::{merge_clusters, MergeInfo};
pub use palette::{next_free_color, split_jitter, PALETTE};
pub use partition::{partition_by_x, split_sizes};
pub use reclassify::{reclassify, ReclassifyInfo, ReclassifyRequest};
pub use relabel::{relabel_topics, LabelsInfo, RelabeledTopic};
pub use rename::{normalize_label, rename_topic, RenameInfo, MAX_LABEL_CHARS};
pub use split::{split_cluster, SplitInfo, MIN_DOCS_PER_SUBCLUSTER};
pub use suggestion::{apply_action, EditInfo};

/// A new result together with the operation-specific info block.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation<I> {
    pub result: ClusteringResult,
    pub info: I,
}

/// Topic ids whose identity or membership an edit changed. Pending
/// suggestions that target any of them are no longer trustworthy.
pub trait Touches {
    fn touched_topics(&self) -> Vec<TopicId>;
}

/// Normalizes a freshly edited clone and refuses to hand out a result that
/// breaks the partition invariants.
pub(crate) fn finish(op: &'static str, mut result: ClusteringResult) -> Result<ClusteringResult> {
    result.normalize();
    if let Err(violation) = result.check_invariants() {
        tracing::error!(op, %violation, "edit produced an inconsistent result");
        return Err(Error::pipeline(op));
    }
    Ok(result)
}

/// Keeps the first occurrence of each item, up to `cap` items.
pub(crate) fn dedup_capped<I>(items: I, cap: usize) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if out.len() == cap {
            break;
        }
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// Returns ids in input order, without duplicates, that name an existing topic.
pub(crate) fn resolve_topics(result: &ClusteringResult, ids: &[TopicId]) -> Vec<TopicId> {
    let mut resolved = Vec::new();
    for id in ids {
        if !resolved.contains(id) && result.has_topic(*id) {
            resolved.push(*id);
        }
    }
    resolved
}

/// First id above every topic id and every id a stored suggestion targets,
/// so a removed topic's id is never handed to an unrelated new topic.
pub(crate) fn next_topic_id(result: &ClusteringResult) -> TopicId {
    let referenced = result.suggestions.iter().flat_map(|s| s.target_cluster_ids().iter().copied());
    result.max_topic_id().into_iter().chain(referenced).max().map_or(0, |m| m.max(-1) + 1)
}
