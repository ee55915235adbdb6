use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use topichub_core::error::{Error, Result};
use topichub_core::types::{ClusteringResult, TopicId, MAX_KEYWORDS, NOISE_CLUSTER_ID};

use crate::partition::partition_by_x;
use crate::split::{member_indices, spawn_children, ChildSpec};
use crate::{dedup_capped, finish, next_topic_id, resolve_topics, Mutation, Touches};

fn default_num_clusters() -> usize {
    1
}

/// Both accepted request shapes. The explicit move is tried first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum ReclassifyRequest {
    /// Move the listed documents out of one cluster into another (or noise).
    Move { document_ids: Vec<String>, from_cluster_id: TopicId, to_cluster_id: TopicId },
    /// Pool every member of the source clusters and cut the pool into
    /// `num_clusters` fresh topics.
    Redistribute {
        from_cluster_ids: Vec<TopicId>,
        #[serde(default = "default_num_clusters")]
        num_clusters: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReclassifyInfo {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub document_ids: Vec<String>,
    pub from_cluster_ids: Vec<TopicId>,
    pub to_cluster_ids: Vec<TopicId>,
    pub documents_affected: usize,
}

impl Touches for ReclassifyInfo {
    fn touched_topics(&self) -> Vec<TopicId> {
        let mut ids: Vec<TopicId> = self.from_cluster_ids.iter().chain(&self.to_cluster_ids).copied().collect();
        ids.retain(|id| *id != NOISE_CLUSTER_ID);
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

pub fn reclassify(result: &ClusteringResult, request: &ReclassifyRequest) -> Result<Mutation<ReclassifyInfo>> {
    match request {
        ReclassifyRequest::Move { document_ids, from_cluster_id, to_cluster_id } => {
            move_documents(result, document_ids, *from_cluster_id, *to_cluster_id)
        }
        ReclassifyRequest::Redistribute { from_cluster_ids, num_clusters } => {
            redistribute(result, from_cluster_ids, *num_clusters)
        }
    }
}

fn resolves(result: &ClusteringResult, id: TopicId) -> bool {
    id == NOISE_CLUSTER_ID || result.has_topic(id)
}

fn move_documents(
    result: &ClusteringResult,
    document_ids: &[String],
    from: TopicId,
    to: TopicId,
) -> Result<Mutation<ReclassifyInfo>> {
    if document_ids.is_empty() {
        return Err(Error::invalid("No document ids given."));
    }
    if !resolves(result, from) {
        return Err(Error::invalid(format!("Source cluster {from} not found.")));
    }
    if !resolves(result, to) {
        return Err(Error::invalid(format!("Destination cluster {to} not found.")));
    }
    if from == to {
        return Err(Error::invalid("Source and destination clusters are the same."));
    }
    let wanted: HashSet<&str> = document_ids.iter().map(String::as_str).collect();
    let selected: Vec<usize> = result
        .documents
        .iter()
        .enumerate()
        .filter(|(_, d)| d.cluster_id == from && wanted.contains(d.id.as_str()))
        .map(|(i, _)| i)
        .collect();
    if selected.is_empty() {
        return Err(Error::invalid(format!("None of the given documents belong to cluster {from}.")));
    }

    let mut next = result.clone();
    for idx in &selected {
        next.documents[*idx].cluster_id = to;
    }
    let next = finish("reclassify", next)?;

    tracing::debug!(from, to, affected = selected.len(), "moved documents");
    Ok(Mutation {
        result: next,
        info: ReclassifyInfo {
            document_ids: document_ids.to_vec(),
            from_cluster_ids: vec![from],
            to_cluster_ids: vec![to],
            documents_affected: selected.len(),
        },
    })
}

fn redistribute(result: &ClusteringResult, from_ids: &[TopicId], num_clusters: usize) -> Result<Mutation<ReclassifyInfo>> {
    if num_clusters < 1 {
        return Err(Error::invalid("numClusters must be at least 1."));
    }
    let sources = resolve_topics(result, from_ids);
    if sources.is_empty() {
        return Err(Error::invalid(format!("None of the clusters {from_ids:?} exist.")));
    }
    let members = member_indices(result, &sources);
    if members.len() < num_clusters {
        return Err(Error::invalid(format!(
            "{} documents cannot fill {num_clusters} clusters.",
            members.len()
        )));
    }

    let topics: Vec<_> = sources.iter().filter_map(|id| result.topic(*id)).collect();
    let spec = ChildSpec {
        first_id: next_topic_id(result),
        parent_id: sources[0],
        label: topics.iter().map(|t| t.label.as_str()).collect::<Vec<_>>().join(" / "),
        keywords: dedup_capped(topics.iter().flat_map(|t| t.keywords.iter().cloned()), MAX_KEYWORDS),
        coherence: topics.iter().map(|t| t.coherence_score).sum::<f64>() / topics.len() as f64,
    };
    let affected = members.len();
    let groups = partition_by_x(&result.documents, members, num_clusters);

    let mut next = result.clone();
    next.topics.retain(|t| !sources.contains(&t.id));
    let new_ids = spawn_children(&mut next, &groups, &spec);
    let next = finish("reclassify", next)?;

    tracing::debug!(sources = ?sources, new_ids = ?new_ids, affected, "redistributed clusters");
    Ok(Mutation {
        result: next,
        info: ReclassifyInfo {
            document_ids: Vec::new(),
            from_cluster_ids: sources,
            to_cluster_ids: new_ids,
            documents_affected: affected,
        },
    })
}
