use serde::{Deserialize, Serialize};
use topichub_core::error::{Error, Result};
use topichub_core::types::{ClusteringResult, TopicId};

use crate::{finish, Mutation, Touches};

pub const MAX_LABEL_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameInfo {
    pub topic_id: TopicId,
    pub old_label: String,
    pub new_label: String,
    /// Always `true` on success: repeating a rename answers exactly like
    /// the first call. Compare the labels to tell whether anything changed.
    pub updated: bool,
}

impl Touches for RenameInfo {
    fn touched_topics(&self) -> Vec<TopicId> {
        vec![self.topic_id]
    }
}

/// Trims a label and checks it is 1 to 100 characters long.
pub fn normalize_label(raw: &str) -> Result<String> {
    let label = raw.trim();
    if label.is_empty() {
        return Err(Error::invalid("Label must not be empty."));
    }
    let len = label.chars().count();
    if len > MAX_LABEL_CHARS {
        return Err(Error::invalid(format!("Label is {len} characters; the limit is {MAX_LABEL_CHARS}.")));
    }
    Ok(label.to_string())
}

pub fn rename_topic(result: &ClusteringResult, topic_id: TopicId, new_label: &str) -> Result<Mutation<RenameInfo>> {
    let label = normalize_label(new_label)?;
    let old_label = result
        .topic(topic_id)
        .map(|t| t.label.clone())
        .ok_or_else(|| Error::invalid(format!("Topic {topic_id} not found.")))?;

    let next = if old_label != label {
        let mut next = result.clone();
        if let Some(topic) = next.topics.iter_mut().find(|t| t.id == topic_id) {
            topic.label = label.clone();
        }
        finish("rename", next)?
    } else {
        result.clone()
    };

    Ok(Mutation { result: next, info: RenameInfo { topic_id, old_label, new_label: label, updated: true } })
}
