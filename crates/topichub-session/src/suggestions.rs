//! Suggestion bookkeeping on top of a [`ClusteringResult`].
//!
//! Functions here are pure: they take a result and return a new one. The
//! edit itself is delegated to [`topichub_mutation::apply_action`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use topichub_core::error::{Error, Result};
use topichub_core::traits::RefineContext;
use topichub_core::types::{ClusteringResult, Suggestion, SuggestionKey, TopicId};
use topichub_mutation::{apply_action, EditInfo, Mutation, Touches};

pub const DEFAULT_FOCUS_AREAS: [&str; 3] = ["coherence", "granularity", "naming"];

/// Topics below this coherence are reported as problematic.
const PROBLEMATIC_COHERENCE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineAnalysis {
    pub overall_coherence: f64,
    pub problematic_clusters: Vec<TopicId>,
    pub suggested_optimal_k: usize,
    pub focus_areas_analyzed: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyStatus {
    Applied,
    Skipped,
    Failed,
}

/// What happened to one suggestion during apply-all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOutcome {
    pub suggestion_id: String,
    pub status: ApplyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<EditInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub fn focus_areas_or_default(focus_areas: &[String]) -> Vec<String> {
    if focus_areas.is_empty() {
        DEFAULT_FOCUS_AREAS.iter().map(ToString::to_string).collect()
    } else {
        focus_areas.to_vec()
    }
}

/// Keys a regeneration pass must not propose again: pending and applied
/// suggestions. Blocked keys stay open so a fresh proposal can replace them.
pub fn seen_keys(result: &ClusteringResult) -> BTreeSet<SuggestionKey> {
    result.suggestions.iter().filter(|s| !s.blocked).map(Suggestion::key).collect()
}

pub fn refine_context(result: &ClusteringResult, focus_areas: &[String], max_suggestions: usize) -> RefineContext {
    RefineContext {
        topics: result.topics.clone(),
        total_documents: result.total_documents,
        noise: result.noise,
        focus_areas: focus_areas_or_default(focus_areas),
        seen: seen_keys(result),
        max_suggestions,
    }
}

pub fn analyze(result: &ClusteringResult, focus_areas: &[String]) -> RefineAnalysis {
    let overall = if result.topics.is_empty() {
        0.0
    } else {
        result.topics.iter().map(|t| t.coherence_score).sum::<f64>() / result.topics.len() as f64
    };
    RefineAnalysis {
        overall_coherence: (overall * 1_000.0).round() / 1_000.0,
        problematic_clusters: result
            .topics
            .iter()
            .filter(|t| t.coherence_score < PROBLEMATIC_COHERENCE)
            .map(|t| t.id)
            .collect(),
        suggested_optimal_k: result.topics.len().max(2),
        focus_areas_analyzed: focus_areas_or_default(focus_areas),
    }
}

/// Sets `blocked` on every pending suggestion, other than `except`, whose
/// targets intersect `touched`. Returns how many were blocked.
pub fn block_conflicting(suggestions: &mut [Suggestion], touched: &[TopicId], except: Option<&str>) -> usize {
    let mut blocked = 0;
    for s in suggestions.iter_mut() {
        if Some(s.id.as_str()) == except || !s.is_pending() {
            continue;
        }
        if s.targets_intersect(touched) {
            s.blocked = true;
            blocked += 1;
        }
    }
    blocked
}

fn find<'a>(result: &'a ClusteringResult, suggestion_id: &str) -> Result<&'a Suggestion> {
    result
        .suggestions
        .iter()
        .find(|s| s.id == suggestion_id)
        .ok_or_else(|| Error::invalid(format!("Suggestion {suggestion_id} not found.")))
}

/// Runs one pending suggestion, marks it applied and blocks the pending
/// suggestions it conflicts with.
pub fn apply(result: &ClusteringResult, suggestion_id: &str) -> Result<Mutation<EditInfo>> {
    let suggestion = find(result, suggestion_id)?;
    if suggestion.applied {
        return Err(Error::invalid(format!("Suggestion {suggestion_id} was already applied.")));
    }
    if suggestion.blocked {
        return Err(Error::invalid(format!(
            "Suggestion {suggestion_id} is blocked by an earlier edit; request new suggestions."
        )));
    }

    let Mutation { result: mut next, info } = apply_action(result, &suggestion.action)?;
    let mut touched = suggestion.target_cluster_ids().to_vec();
    touched.extend(info.touched_topics());
    if let Some(s) = next.suggestions.iter_mut().find(|s| s.id == suggestion_id) {
        s.applied = true;
    }
    let blocked = block_conflicting(&mut next.suggestions, &touched, Some(suggestion_id));
    tracing::debug!(suggestion_id, blocked, "suggestion applied");
    Ok(Mutation { result: next, info })
}

/// Applies pending suggestions one after another in list order. Each step
/// sees the blocking caused by the previous ones; blocked suggestions are
/// skipped and suggestions whose preconditions no longer hold are reported
/// as failed and left pending.
pub fn apply_all(result: &ClusteringResult) -> Result<Mutation<Vec<ApplyOutcome>>> {
    let ids: Vec<String> = result.suggestions.iter().filter(|s| !s.applied).map(|s| s.id.clone()).collect();
    let mut current = result.clone();
    let mut outcomes = Vec::with_capacity(ids.len());
    for id in ids {
        let blocked = current.suggestions.iter().any(|s| s.id == id && s.blocked);
        if blocked {
            outcomes.push(ApplyOutcome {
                suggestion_id: id,
                status: ApplyStatus::Skipped,
                info: None,
                message: Some("blocked".to_string()),
            });
            continue;
        }
        match apply(&current, &id) {
            Ok(Mutation { result: next, info }) => {
                current = next;
                outcomes.push(ApplyOutcome { suggestion_id: id, status: ApplyStatus::Applied, info: Some(info), message: None });
            }
            Err(Error::InvalidInput(message)) => {
                outcomes.push(ApplyOutcome { suggestion_id: id, status: ApplyStatus::Failed, info: None, message: Some(message) });
            }
            Err(e) => return Err(e),
        }
    }
    Ok(Mutation { result: current, info: outcomes })
}

/// Removes a suggestion for good. Other suggestions keep their state.
pub fn dismiss(result: &ClusteringResult, suggestion_id: &str) -> Result<ClusteringResult> {
    find(result, suggestion_id)?;
    let mut next = result.clone();
    next.suggestions.retain(|s| s.id != suggestion_id);
    Ok(next)
}

/// Stores a regeneration pass. Blocked suggestions are superseded: they are
/// dropped, and a proposal with the same key comes back as a fresh pending
/// record. Proposals that repeat a pending or applied key, target a missing
/// topic or exceed `max_new` are discarded. Returns the new result and what was added.
pub fn merge_generated(
    result: &ClusteringResult,
    proposed: Vec<Suggestion>,
    max_new: usize,
) -> (ClusteringResult, Vec<Suggestion>) {
    let mut seen = seen_keys(result);
    let mut added = Vec::new();
    for p in proposed {
        if added.len() == max_new {
            break;
        }
        let targets = p.target_cluster_ids();
        if targets.is_empty() || !targets.iter().all(|id| result.has_topic(*id)) {
            continue;
        }
        let fresh = Suggestion::new(p.action, p.description, p.confidence);
        if seen.insert(fresh.key()) {
            added.push(fresh);
        }
    }
    let mut next = result.clone();
    next.suggestions.retain(|s| !s.blocked);
    next.suggestions.extend(added.iter().cloned());
    (next, added)
}
