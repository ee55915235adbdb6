use anyhow::{bail, Result};
use async_trait::async_trait;

use topichub_core::traits::{RefineContext, SuggestionAnalyzer};
use topichub_core::types::{Suggestion, SuggestionAction, Topic};
use topichub_mutation::MIN_DOCS_PER_SUBCLUSTER;

use crate::keywords::{label_from, overlap};

/// Proposes edits from the numbers alone: incoherent topics are split,
/// topics sharing most keywords are merged, generic labels are renamed
/// after their keywords. Only the requested focus areas are looked at.
#[derive(Debug, Clone)]
pub struct HeuristicAnalyzer {
    pub split_below: f64,
    pub merge_overlap: f64,
}

impl Default for HeuristicAnalyzer {
    fn default() -> Self {
        Self { split_below: 0.5, merge_overlap: 0.4 }
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn generic_label(label: &str, id: i64) -> bool {
    let label = label.trim();
    label.is_empty() || label == format!("Topic {id}") || label == format!("Cluster {id}")
}

impl HeuristicAnalyzer {
    fn coherence(&self, topics: &[Topic], out: &mut Vec<Suggestion>) {
        for t in topics {
            if t.coherence_score < self.split_below && t.document_count >= 2 * MIN_DOCS_PER_SUBCLUSTER {
                out.push(Suggestion::new(
                    SuggestionAction::Split { target_cluster_ids: vec![t.id], num_subclusters: 2 },
                    format!(
                        "\"{}\" is loosely connected (coherence {:.0}%); splitting it may separate its themes.",
                        t.label,
                        t.coherence_score * 100.0
                    ),
                    round2(1.0 - t.coherence_score),
                ));
            }
        }
    }

    fn granularity(&self, topics: &[Topic], out: &mut Vec<Suggestion>) {
        for (i, a) in topics.iter().enumerate() {
            for b in &topics[i + 1..] {
                let shared = overlap(&a.keywords, &b.keywords);
                if shared >= self.merge_overlap {
                    out.push(Suggestion::new(
                        SuggestionAction::Merge { target_cluster_ids: vec![a.id, b.id], suggested_label: None },
                        format!("\"{}\" and \"{}\" share most of their keywords.", a.label, b.label),
                        round2(shared),
                    ));
                }
            }
        }
    }

    fn naming(&self, topics: &[Topic], out: &mut Vec<Suggestion>) {
        for t in topics.iter().filter(|t| generic_label(&t.label, t.id)) {
            if let Some(label) = label_from(&t.keywords) {
                out.push(Suggestion::new(
                    SuggestionAction::Rename { target_cluster_ids: vec![t.id], suggested_label: label },
                    format!("\"{}\" says nothing about its content.", t.label),
                    0.6,
                ));
            }
        }
    }
}

#[async_trait]
impl SuggestionAnalyzer for HeuristicAnalyzer {
    async fn propose(&self, ctx: &RefineContext) -> Result<Vec<Suggestion>> {
        let mut out = Vec::new();
        for area in &ctx.focus_areas {
            match area.as_str() {
                "coherence" => self.coherence(&ctx.topics, &mut out),
                "granularity" => self.granularity(&ctx.topics, &mut out),
                "naming" => self.naming(&ctx.topics, &mut out),
                other => tracing::debug!(area = other, "focus area not handled"),
            }
        }
        out.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        let mut fresh = Vec::new();
        for s in out {
            if fresh.len() >= ctx.max_suggestions {
                break;
            }
            let key = s.key();
            if !ctx.seen.contains(&key) && !fresh.iter().any(|f: &Suggestion| f.key() == key) {
                fresh.push(s);
            }
        }
        tracing::debug!(proposed = fresh.len(), noise = ctx.noise, total = ctx.total_documents, "heuristic pass");
        Ok(fresh)
    }
}

/// Stands in when suggestion generation is switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledAnalyzer;

#[async_trait]
impl SuggestionAnalyzer for DisabledAnalyzer {
    fn is_available(&self) -> bool {
        false
    }

    async fn propose(&self, _ctx: &RefineContext) -> Result<Vec<Suggestion>> {
        bail!("suggestion generation is disabled")
    }
}
