use serde::{Deserialize, Serialize};
use topichub_core::error::{Error, Result};
use topichub_core::types::{ClusteringResult, SuggestionAction, TopicId};

use crate::{
    merge_clusters, reclassify, rename_topic, split_cluster, MergeInfo, Mutation, ReclassifyInfo, ReclassifyRequest,
    RenameInfo, SplitInfo, Touches,
};

/// Info block of whichever edit a suggestion turned into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EditInfo {
    Merge(MergeInfo),
    Split(SplitInfo),
    Rename(RenameInfo),
    Reclassify(ReclassifyInfo),
}

impl Touches for EditInfo {
    fn touched_topics(&self) -> Vec<TopicId> {
        match self {
            EditInfo::Merge(info) => info.touched_topics(),
            EditInfo::Split(info) => info.touched_topics(),
            EditInfo::Rename(info) => info.touched_topics(),
            EditInfo::Reclassify(info) => info.touched_topics(),
        }
    }
}

fn single_target(ids: &[TopicId], kind: &str) -> Result<TopicId> {
    match ids {
        [id] => Ok(*id),
        _ => Err(Error::invalid(format!("A {kind} suggestion needs exactly one target cluster, got {}.", ids.len()))),
    }
}

/// Runs the edit a suggestion describes against `result`.
pub fn apply_action(result: &ClusteringResult, action: &SuggestionAction) -> Result<Mutation<EditInfo>> {
    match action {
        SuggestionAction::Merge { target_cluster_ids, suggested_label } => {
            let m = merge_clusters(result, target_cluster_ids, suggested_label.as_deref())?;
            Ok(Mutation { result: m.result, info: EditInfo::Merge(m.info) })
        }
        SuggestionAction::Split { target_cluster_ids, num_subclusters } => {
            let id = single_target(target_cluster_ids, "split")?;
            let m = split_cluster(result, id, *num_subclusters)?;
            Ok(Mutation { result: m.result, info: EditInfo::Split(m.info) })
        }
        SuggestionAction::Rename { target_cluster_ids, suggested_label } => {
            let id = single_target(target_cluster_ids, "rename")?;
            let m = rename_topic(result, id, suggested_label)?;
            Ok(Mutation { result: m.result, info: EditInfo::Rename(m.info) })
        }
        SuggestionAction::Reclassify { target_cluster_ids, num_clusters } => {
            let request = ReclassifyRequest::Redistribute { from_cluster_ids: target_cluster_ids.clone(), num_clusters: *num_clusters };
            let m = reclassify(result, &request)?;
            Ok(Mutation { result: m.result, info: EditInfo::Reclassify(m.info) })
        }
    }
}
