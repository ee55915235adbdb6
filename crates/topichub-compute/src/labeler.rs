use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

use topichub_core::traits::{GeneratedLabel, LabelGenerator, LabelInput};
use topichub_core::types::TopicId;

use crate::keywords::{label_from, top_keywords};

const LABEL_KEYWORDS: usize = 7;

/// Names topics after the words that set their members apart from the other
/// topics in the same request. Falls back to the sample texts when a topic
/// has no member texts, and to "Topic N" when no usable word is left.
#[derive(Debug, Clone, Default)]
pub struct KeywordLabeler;

fn describe(input: &LabelInput, keywords: &[String]) -> String {
    if keywords.is_empty() {
        format!("Automatically detected category ({} documents)", input.document_count)
    } else {
        format!(
            "{} documents; top terms: {}",
            input.document_count,
            keywords.iter().take(3).cloned().collect::<Vec<_>>().join(", ")
        )
    }
}

#[async_trait]
impl LabelGenerator for KeywordLabeler {
    async fn label_topics(&self, topics: &[LabelInput]) -> Result<Vec<GeneratedLabel>> {
        let groups: BTreeMap<TopicId, Vec<&str>> = topics
            .iter()
            .map(|t| {
                let texts = if t.member_texts.is_empty() { &t.sample_texts } else { &t.member_texts };
                (t.topic_id, texts.iter().map(String::as_str).collect())
            })
            .collect();
        let keywords = top_keywords(&groups, LABEL_KEYWORDS);

        let labels = topics
            .iter()
            .map(|t| {
                let kw = keywords.get(&t.topic_id).map(Vec::as_slice).unwrap_or_default();
                GeneratedLabel {
                    topic_id: t.topic_id,
                    label: label_from(kw).unwrap_or_else(|| format!("Topic {}", t.topic_id)),
                    description: describe(t, kw),
                }
            })
            .collect::<Vec<_>>();
        tracing::debug!(topics = labels.len(), "keyword labels generated");
        Ok(labels)
    }
}
