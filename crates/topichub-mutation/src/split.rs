use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use topichub_core::error::{Error, Result};
use topichub_core::types::{ClusteringResult, Topic, TopicId, MAX_SAMPLE_TEXTS};

use crate::palette::{next_free_color, split_jitter};
use crate::partition::partition_by_x;
use crate::{dedup_capped, finish, next_topic_id, Mutation, Touches};

/// A split must leave at least this many documents in every part.
pub const MIN_DOCS_PER_SUBCLUSTER: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitInfo {
    pub original_cluster_id: TopicId,
    pub new_cluster_ids: Vec<TopicId>,
    pub num_subclusters: usize,
    pub documents_affected: usize,
}

impl Touches for SplitInfo {
    fn touched_topics(&self) -> Vec<TopicId> {
        vec![self.original_cluster_id]
    }
}

/// Replaces a topic with `num_subclusters` children cut along the x axis.
pub fn split_cluster(result: &ClusteringResult, cluster_id: TopicId, num_subclusters: usize) -> Result<Mutation<SplitInfo>> {
    if num_subclusters < 2 {
        return Err(Error::invalid(format!("numSubclusters must be at least 2, got {num_subclusters}.")));
    }
    let parent = result
        .topic(cluster_id)
        .ok_or_else(|| Error::invalid(format!("Cluster {cluster_id} not found.")))?;
    let members: Vec<usize> = member_indices(result, &[cluster_id]);
    let needed = num_subclusters * MIN_DOCS_PER_SUBCLUSTER;
    if members.len() < needed {
        return Err(Error::invalid(format!(
            "Cluster {cluster_id} has {} documents; splitting into {num_subclusters} needs at least {needed}.",
            members.len()
        )));
    }

    let affected = members.len();
    let groups = partition_by_x(&result.documents, members, num_subclusters);
    let spec = ChildSpec {
        first_id: next_topic_id(result),
        parent_id: cluster_id,
        label: parent.label.clone(),
        keywords: parent.keywords.clone(),
        coherence: parent.coherence_score,
    };

    let mut next = result.clone();
    next.topics.retain(|t| t.id != cluster_id);
    let new_ids = spawn_children(&mut next, &groups, &spec);
    let next = finish("split", next)?;

    tracing::debug!(cluster_id, new_ids = ?new_ids, affected, "split cluster");
    Ok(Mutation {
        result: next,
        info: SplitInfo { original_cluster_id: cluster_id, new_cluster_ids: new_ids, num_subclusters, documents_affected: affected },
    })
}

pub(crate) fn member_indices(result: &ClusteringResult, ids: &[TopicId]) -> Vec<usize> {
    result
        .documents
        .iter()
        .enumerate()
        .filter(|(_, d)| ids.contains(&d.cluster_id))
        .map(|(i, _)| i)
        .collect()
}

/// What the children of a split or redistribution inherit.
pub(crate) struct ChildSpec {
    pub first_id: TopicId,
    pub parent_id: TopicId,
    pub label: String,
    pub keywords: Vec<String>,
    pub coherence: f64,
}

/// Moves each group of document indices into a fresh topic and returns the
/// new ids. Derived fields are left for the normalize pass.
pub(crate) fn spawn_children(next: &mut ClusteringResult, groups: &[Vec<usize>], spec: &ChildSpec) -> Vec<TopicId> {
    let k = groups.len();
    let mut used: HashSet<String> = next.topics.iter().map(|t| t.color.clone()).collect();
    let mut ids = Vec::with_capacity(k);
    for (i, group) in groups.iter().enumerate() {
        let id = spec.first_id + i as TopicId;
        for idx in group {
            next.documents[*idx].cluster_id = id;
        }
        let color = next_free_color(&used, id);
        used.insert(color.clone());
        let label = if k == 1 { spec.label.clone() } else { format!("{} (part {})", spec.label, i + 1) };
        next.topics.push(Topic {
            id,
            label,
            description: format!("Part {} of {} taken from '{}'", i + 1, k, spec.label),
            document_count: 0,
            sample_texts: dedup_capped(group.iter().map(|idx| next.documents[*idx].text.clone()), MAX_SAMPLE_TEXTS),
            color,
            centroid_x: 0.0,
            centroid_y: 0.0,
            coherence_score: (spec.coherence * split_jitter(spec.parent_id, i)).clamp(0.0, 1.0),
            keywords: keyword_slice(&spec.keywords, i, k),
        });
        ids.push(id);
    }
    ids
}

/// The `i`-th of `k` disjoint contiguous slices of `keywords`.
fn keyword_slice(keywords: &[String], i: usize, k: usize) -> Vec<String> {
    let len = keywords.len();
    keywords[i * len / k..(i + 1) * len / k].to_vec()
}
