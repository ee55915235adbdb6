use serde::{Deserialize, Serialize};
use topichub_core::error::{Error, Result};
use topichub_core::traits::GeneratedLabel;
use topichub_core::types::{ClusteringResult, TopicId};

use crate::rename::normalize_label;
use crate::{finish, Mutation, Touches};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelabeledTopic {
    pub topic_id: TopicId,
    pub old_label: String,
    pub new_label: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelsInfo {
    pub relabeled: Vec<RelabeledTopic>,
}

impl Touches for LabelsInfo {
    fn touched_topics(&self) -> Vec<TopicId> {
        self.relabeled.iter().map(|t| t.topic_id).collect()
    }
}

/// Writes generated labels and descriptions onto their topics. Every label is
/// checked like a manual rename and every id must name a topic; an empty
/// description keeps the current one.
pub fn relabel_topics(result: &ClusteringResult, labels: &[GeneratedLabel]) -> Result<Mutation<LabelsInfo>> {
    if labels.is_empty() {
        return Err(Error::invalid("At least one topic ID required."));
    }
    let mut checked = Vec::with_capacity(labels.len());
    for generated in labels {
        if !result.has_topic(generated.topic_id) {
            return Err(Error::invalid(format!("Topic {} not found.", generated.topic_id)));
        }
        checked.push((generated.topic_id, normalize_label(&generated.label)?, generated.description.trim()));
    }

    let mut next = result.clone();
    let mut relabeled = Vec::with_capacity(checked.len());
    for (topic_id, label, description) in checked {
        if let Some(topic) = next.topics.iter_mut().find(|t| t.id == topic_id) {
            let old_label = std::mem::replace(&mut topic.label, label.clone());
            if !description.is_empty() {
                topic.description = description.to_string();
            }
            relabeled.push(RelabeledTopic {
                topic_id,
                old_label,
                new_label: label,
                description: topic.description.clone(),
            });
        }
    }
    Ok(Mutation { result: finish("generate labels", next)?, info: LabelsInfo { relabeled } })
}
