mod common;

use topichub_core::error::Error;
use topichub_core::types::{ClusteringResult, Suggestion, SuggestionAction};
use topichub_session::suggestions::{self, ApplyStatus};

fn base() -> ClusteringResult {
    let mut r = common::result_for(&common::texts(21));
    r.normalize();
    r
}

fn merge(ids: &[i64], confidence: f64) -> Suggestion {
    Suggestion::new(
        SuggestionAction::Merge { target_cluster_ids: ids.to_vec(), suggested_label: None },
        "overlapping themes",
        confidence,
    )
}

fn rename(id: i64, label: &str) -> Suggestion {
    Suggestion::new(
        SuggestionAction::Rename { target_cluster_ids: vec![id], suggested_label: label.to_string() },
        "clearer name",
        0.7,
    )
}

fn split(id: i64) -> Suggestion {
    Suggestion::new(
        SuggestionAction::Split { target_cluster_ids: vec![id], num_subclusters: 2 },
        "too broad",
        0.6,
    )
}

fn with(suggestions: Vec<Suggestion>) -> ClusteringResult {
    let mut r = base();
    r.suggestions = suggestions;
    r
}

#[test]
fn applying_a_suggestion_blocks_those_sharing_a_target() {
    let s1 = merge(&[0, 1], 0.9);
    let s2 = rename(1, "Billing");
    let s3 = rename(2, "Travel");
    let r = with(vec![s1.clone(), s2.clone(), s3.clone()]);

    let out = suggestions::apply(&r, &s1.id).expect("apply");
    let by_id = |id: &str| out.result.suggestions.iter().find(|s| s.id == id).cloned().expect("kept");
    assert!(by_id(&s1.id).applied);
    let blocked = by_id(&s2.id);
    assert!(blocked.blocked && !blocked.applied);
    assert!(by_id(&s3.id).is_pending(), "disjoint targets stay pending");
    assert!(out.result.topic(1).is_none());

    assert!(r.suggestions.iter().all(Suggestion::is_pending), "input untouched");
}

#[test]
fn blocked_and_applied_suggestions_cannot_be_applied() {
    let s1 = merge(&[0, 1], 0.9);
    let s2 = rename(0, "Cards");
    let r = suggestions::apply(&with(vec![s1.clone(), s2.clone()]), &s1.id).expect("apply").result;
    assert!(matches!(suggestions::apply(&r, &s1.id), Err(Error::InvalidInput(_))));
    assert!(matches!(suggestions::apply(&r, &s2.id), Err(Error::InvalidInput(_))));
    assert!(matches!(suggestions::apply(&r, "merge:7,8"), Err(Error::InvalidInput(_))));
}

#[test]
fn dismiss_removes_only_that_suggestion() {
    let s1 = merge(&[0, 1], 0.9);
    let s2 = rename(1, "Billing");
    let mut r = with(vec![s1.clone(), s2.clone()]);
    r.suggestions[1].blocked = true;

    let next = suggestions::dismiss(&r, &s1.id).expect("dismiss");
    assert_eq!(next.suggestions.len(), 1);
    assert!(next.suggestions[0].blocked, "other states unchanged");
    assert!(matches!(suggestions::dismiss(&next, &s1.id), Err(Error::InvalidInput(_))));
}

#[test]
fn apply_all_runs_in_order_and_skips_what_earlier_steps_blocked() {
    let s1 = rename(2, "Travel");
    let s2 = merge(&[0, 1], 0.9);
    let s3 = split(1);
    let s4 = split(2);
    let out = suggestions::apply_all(&with(vec![s1.clone(), s2.clone(), s3.clone(), s4.clone()])).expect("apply all");

    let statuses: Vec<(String, ApplyStatus)> =
        out.info.iter().map(|o| (o.suggestion_id.clone(), o.status)).collect();
    assert_eq!(
        statuses,
        vec![
            (s1.id.clone(), ApplyStatus::Applied),
            (s2.id.clone(), ApplyStatus::Applied),
            (s3.id.clone(), ApplyStatus::Skipped),
            (s4.id.clone(), ApplyStatus::Skipped),
        ]
    );
    assert_eq!(out.result.topic(2).expect("travel").label, "Travel");
    assert_eq!(out.result.topic(0).expect("merged").document_count, 12);
}

#[test]
fn apply_all_reports_failed_preconditions_and_continues() {
    let too_fine = Suggestion::new(
        SuggestionAction::Split { target_cluster_ids: vec![0], num_subclusters: 5 },
        "very broad",
        0.5,
    );
    let ok = rename(2, "Travel");
    let out = suggestions::apply_all(&with(vec![too_fine.clone(), ok.clone()])).expect("apply all");
    assert_eq!(out.info[0].status, ApplyStatus::Failed);
    assert!(out.info[0].message.is_some());
    assert_eq!(out.info[1].status, ApplyStatus::Applied);
    let failed = out.result.suggestions.iter().find(|s| s.id == too_fine.id).expect("kept");
    assert!(failed.is_pending());
}

#[test]
fn regeneration_dedups_supersedes_blocked_and_caps() {
    let mut r = with(vec![merge(&[0, 1], 0.9), rename(2, "Travel"), split(1)]);
    r.suggestions[1].blocked = true;
    r.suggestions[2].blocked = true;

    let proposed = vec![
        merge(&[1, 0], 0.8), // pending, reversed order
        rename(2, "Trips"),  // blocked key, proposed again
        split(0),
        split(0), // duplicate within the pass
        rename(9, "Ghost"), // unknown topic
        split(2),
        split(1),
    ];
    let (next, added) = suggestions::merge_generated(&r, proposed, 3);

    let added_ids: Vec<&str> = added.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(added_ids, vec!["rename:2", "split:0", "split:2"]);
    let ids: Vec<&str> = next.suggestions.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["merge:0,1", "rename:2", "split:0", "split:2"], "blocked split:1 superseded");
    let renamed = next.suggestions.iter().find(|s| s.id == "rename:2").expect("rename:2");
    assert!(renamed.is_pending(), "regeneration brings the blocked key back as pending");
    assert_eq!(renamed.action, SuggestionAction::Rename { target_cluster_ids: vec![2], suggested_label: "Trips".to_string() });
}

#[test]
fn seen_keys_leave_blocked_suggestions_open() {
    let mut r = with(vec![merge(&[0, 1], 0.9), rename(2, "Travel"), split(0)]);
    r.suggestions[1].blocked = true;
    r.suggestions[2].applied = true;
    let seen: Vec<String> = suggestions::seen_keys(&r).iter().map(ToString::to_string).collect();
    assert_eq!(seen, vec!["merge:0,1", "split:0"]);
}

#[test]
fn analysis_summarizes_coherence() {
    let analysis = suggestions::analyze(&base(), &[]);
    assert!((analysis.overall_coherence - 0.6).abs() < 1e-9);
    assert_eq!(analysis.problematic_clusters, vec![0]);
    assert_eq!(analysis.suggested_optimal_k, 3);
    assert_eq!(analysis.focus_areas_analyzed, vec!["coherence", "granularity", "naming"]);
}
