use serde::{Deserialize, Serialize};
use topichub_core::error::{Error, Result};
use topichub_core::types::{ClusteringResult, Topic, TopicId, MAX_KEYWORDS, MAX_SAMPLE_TEXTS};

use crate::rename::normalize_label;
use crate::{dedup_capped, finish, resolve_topics, Mutation, Touches};

/// Merged topics lose a tenth of their mean coherence.
const MERGE_COHERENCE_PENALTY: f64 = 0.9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeInfo {
    pub merged_cluster_ids: Vec<TopicId>,
    pub new_cluster_id: TopicId,
    pub new_label: String,
    pub documents_affected: usize,
}

impl Touches for MergeInfo {
    fn touched_topics(&self) -> Vec<TopicId> {
        self.merged_cluster_ids.clone()
    }
}

/// Folds the topics named by `target_ids` into the first of them that exists.
///
/// Ids that name no topic are ignored, but at least two must resolve. A blank
/// `new_label` counts as absent; the label then joins the merged labels.
pub fn merge_clusters(
    result: &ClusteringResult,
    target_ids: &[TopicId],
    new_label: Option<&str>,
) -> Result<Mutation<MergeInfo>> {
    if target_ids.len() < 2 {
        return Err(Error::invalid("At least 2 cluster ids are required to merge."));
    }
    let merged = resolve_topics(result, target_ids);
    if merged.len() < 2 {
        return Err(Error::invalid(format!(
            "Only {} of the clusters {:?} exist; at least 2 are required to merge.",
            merged.len(),
            target_ids
        )));
    }
    let label = match new_label.map(str::trim).filter(|l| !l.is_empty()) {
        Some(l) => normalize_label(l)?,
        None => default_label(result, &merged),
    };
    let survivor = merged[0];

    let contributing: Vec<&Topic> = merged.iter().filter_map(|id| result.topic(*id)).collect();
    let keywords = dedup_capped(contributing.iter().flat_map(|t| t.keywords.iter().cloned()), MAX_KEYWORDS);
    let samples = dedup_capped(contributing.iter().flat_map(|t| t.sample_texts.iter().cloned()), MAX_SAMPLE_TEXTS);
    let mean_coherence = contributing.iter().map(|t| t.coherence_score).sum::<f64>() / contributing.len() as f64;
    let description = contributing
        .iter()
        .map(|t| t.description.trim())
        .filter(|d| !d.is_empty())
        .collect::<Vec<_>>()
        .join(". ");

    let mut next = result.clone();
    let mut affected = 0;
    for doc in &mut next.documents {
        if merged.contains(&doc.cluster_id) {
            doc.cluster_id = survivor;
            affected += 1;
        }
    }
    next.topics.retain(|t| t.id == survivor || !merged.contains(&t.id));
    if let Some(topic) = next.topics.iter_mut().find(|t| t.id == survivor) {
        topic.label = label.clone();
        topic.description = description;
        topic.keywords = keywords;
        topic.sample_texts = samples;
        topic.coherence_score = (mean_coherence * MERGE_COHERENCE_PENALTY).clamp(0.0, 1.0);
    }
    let next = finish("merge", next)?;

    tracing::debug!(survivor, merged = ?merged, affected, "merged clusters");
    Ok(Mutation {
        result: next,
        info: MergeInfo { merged_cluster_ids: merged, new_cluster_id: survivor, new_label: label, documents_affected: affected },
    })
}

fn default_label(result: &ClusteringResult, ids: &[TopicId]) -> String {
    ids.iter()
        .filter_map(|id| result.topic(*id))
        .map(|t| t.label.as_str())
        .collect::<Vec<_>>()
        .join(" / ")
}
