use std::collections::HashSet;

use topichub_core::error::Error;
use topichub_core::types::{ClusteringResult, Document, Suggestion, SuggestionAction, Topic, TopicId, NOISE_CLUSTER_ID};
use topichub_core::traits::GeneratedLabel;
use topichub_mutation::{
    apply_action, merge_clusters, reclassify, relabel_topics, rename_topic, set_excluded, split_cluster, EditInfo,
    ReclassifyRequest, Touches,
};

fn topic(id: TopicId, label: &str, coherence: f64, keywords: &[&str]) -> Topic {
    Topic {
        id,
        label: label.to_string(),
        description: format!("About {label}"),
        document_count: 0,
        sample_texts: vec![format!("{label} sample")],
        color: topichub_mutation::PALETTE[id as usize % 12].to_string(),
        centroid_x: 0.0,
        centroid_y: 0.0,
        coherence_score: coherence,
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
    }
}

fn docs(prefix: &str, cluster: TopicId, xs: &[f64]) -> Vec<Document> {
    xs.iter()
        .enumerate()
        .map(|(i, x)| Document {
            id: format!("{prefix}{i}"),
            text: format!("{prefix} text {i}"),
            cluster_id: cluster,
            x: *x,
            y: *x * 0.5 + 1.0,
            excluded: false,
        })
        .collect()
}

/// Cards (0, 5 docs), Credit (1, 3 docs), Travel (2, 9 docs) and 2 noise docs.
fn fixture() -> ClusteringResult {
    let mut documents = docs("card", 0, &[1.0, 2.0, 3.0, 4.0, 5.0]);
    documents.extend(docs("credit", 1, &[10.0, 11.0, 12.0]));
    // Out of x order on purpose.
    documents.extend(docs("travel", 2, &[27.0, 21.0, 25.0, 29.0, 22.0, 23.0, 28.0, 26.0, 24.0]));
    documents.extend(docs("noise", NOISE_CLUSTER_ID, &[50.0, 60.0]));
    let mut result = ClusteringResult {
        documents,
        topics: vec![
            topic(0, "Cards", 0.8, &["card", "pin", "atm"]),
            topic(1, "Credit", 0.6, &["loan", "card", "rate"]),
            topic(2, "Travel", 0.7, &["flight", "hotel", "visa", "train", "bag", "seat"]),
        ],
        job_id: Some("job-1".to_string()),
        ..Default::default()
    };
    result.normalize();
    result.check_invariants().expect("fixture is consistent");
    result
}

fn assert_partition(result: &ClusteringResult) {
    result.check_invariants().expect("invariants hold");
    let counted: usize = result.topics.iter().map(|t| t.document_count).sum();
    assert_eq!(counted + result.noise, result.total_documents);
}

#[test]
fn merge_cards_and_credit_keeps_first_id() {
    let before = fixture();
    let merged = merge_clusters(&before, &[0, 1], Some("  Card products ")).expect("merge");
    let r = &merged.result;

    assert!(r.topic(1).is_none(), "merged-away topic is gone");
    let t = r.topic(0).expect("survivor");
    assert_eq!(t.document_count, 8);
    assert_eq!(t.label, "Card products");
    let members: Vec<&Document> = r.members(0).collect();
    let cx = members.iter().map(|d| d.x).sum::<f64>() / 8.0;
    let cy = members.iter().map(|d| d.y).sum::<f64>() / 8.0;
    assert!((t.centroid_x - cx).abs() < 1e-9);
    assert!((t.centroid_y - cy).abs() < 1e-9);
    assert_eq!(t.keywords, vec!["card", "pin", "atm", "loan", "rate"]);
    assert!((t.coherence_score - 0.7 * 0.9).abs() < 1e-9);
    assert_eq!(t.description, "About Cards. About Credit");
    assert_eq!(merged.info.new_cluster_id, 0);
    assert_eq!(merged.info.documents_affected, 8);
    assert_partition(r);

    assert_eq!(before, fixture(), "input is left untouched");
}

#[test]
fn merge_without_label_joins_labels_and_ignores_unknown_ids() {
    let merged = merge_clusters(&fixture(), &[42, 1, 0], None).expect("merge");
    assert_eq!(merged.info.new_cluster_id, 1);
    assert_eq!(merged.info.merged_cluster_ids, vec![1, 0]);
    assert_eq!(merged.info.new_label, "Credit / Cards");
    assert!(merged.result.topic(0).is_none());
}

#[test]
fn new_topics_skip_ids_still_named_by_suggestions() {
    let merged = merge_clusters(&fixture(), &[0, 2], None).expect("merge").result;
    assert!(merged.topic(2).is_none());

    let reused = split_cluster(&merged, 0, 2).expect("split");
    assert_eq!(reused.info.new_cluster_ids, vec![2, 3], "nothing remembers topic 2");

    let mut remembered = merged.clone();
    let mut applied = Suggestion::new(
        SuggestionAction::Rename { target_cluster_ids: vec![2], suggested_label: "Trips".to_string() },
        "clearer name",
        0.7,
    );
    applied.applied = true;
    remembered.suggestions.push(applied);
    let fresh = split_cluster(&remembered, 0, 2).expect("split");
    assert_eq!(fresh.info.new_cluster_ids, vec![3, 4]);
    assert_partition(&fresh.result);
}

#[test]
fn merge_rejects_fewer_than_two_resolvable_topics() {
    let base = fixture();
    assert!(matches!(merge_clusters(&base, &[0], None), Err(Error::InvalidInput(_))));
    assert!(matches!(merge_clusters(&base, &[0, 99], None), Err(Error::InvalidInput(_))));
    assert!(matches!(merge_clusters(&base, &[0, 0], None), Err(Error::InvalidInput(_))));
}

#[test]
fn split_travel_into_three_contiguous_parts() {
    let split = split_cluster(&fixture(), 2, 3).expect("split");
    let r = &split.result;

    assert!(r.topic(2).is_none(), "parent removed");
    assert_eq!(split.info.new_cluster_ids, vec![3, 4, 5]);
    let expected = [[21.0, 22.0, 23.0], [24.0, 25.0, 26.0], [27.0, 28.0, 29.0]];
    for (id, xs) in split.info.new_cluster_ids.iter().zip(expected) {
        let t = r.topic(*id).expect("child");
        assert_eq!(t.document_count, 3);
        let mut got: Vec<f64> = r.members(*id).map(|d| d.x).collect();
        got.sort_by(f64::total_cmp);
        assert_eq!(got, xs);
        assert!(t.coherence_score >= 0.7 * 0.9 - 1e-12 && t.coherence_score <= 0.7 * 1.05 + 1e-12);
        assert_eq!(t.keywords.len(), 2);
    }
    let keywords: HashSet<&String> = split.info.new_cluster_ids.iter().flat_map(|id| &r.topic(*id).expect("child").keywords).collect();
    assert_eq!(keywords.len(), 6, "keyword slices are disjoint");
    let colors: HashSet<&str> = r.topics.iter().map(|t| t.color.as_str()).collect();
    assert_eq!(colors.len(), r.topics.len(), "children avoid colors already in use");
    assert_eq!(r.topic(3).expect("child").label, "Travel (part 1)");
    assert_partition(r);
}

#[test]
fn split_is_deterministic() {
    let a = split_cluster(&fixture(), 2, 3).expect("split");
    let b = split_cluster(&fixture(), 2, 3).expect("split");
    assert_eq!(a, b);
}

#[test]
fn split_rejects_small_cluster_with_counts_in_message() {
    let base = fixture();
    match split_cluster(&base, 1, 2) {
        Err(Error::InvalidInput(msg)) => {
            assert!(msg.contains('3') && msg.contains('6'), "message names counts: {msg}");
        }
        other => panic!("expected INVALID_INPUT, got {other:?}"),
    }
    assert!(matches!(split_cluster(&base, 2, 1), Err(Error::InvalidInput(_))));
    assert!(matches!(split_cluster(&base, 7, 2), Err(Error::InvalidInput(_))));
}

#[test]
fn reclassify_move_prunes_emptied_source() {
    let request: ReclassifyRequest = serde_json::from_value(serde_json::json!({
        "documentIds": ["credit0", "credit1", "credit2"],
        "fromClusterId": 1,
        "toClusterId": 0
    }))
    .expect("move shape");
    let moved = reclassify(&fixture(), &request).expect("reclassify");

    assert_eq!(moved.info.documents_affected, 3);
    assert!(moved.result.topic(1).is_none(), "empty topics are pruned");
    assert_eq!(moved.result.topic(0).expect("dest").document_count, 8);
    assert_eq!(moved.info.touched_topics(), vec![0, 1]);
    assert_partition(&moved.result);
}

#[test]
fn reclassify_move_to_noise_and_back() {
    let to_noise = ReclassifyRequest::Move { document_ids: vec!["card0".into()], from_cluster_id: 0, to_cluster_id: NOISE_CLUSTER_ID };
    let r = reclassify(&fixture(), &to_noise).expect("to noise").result;
    assert_eq!(r.noise, 3);
    assert_eq!(r.topic(0).expect("cards").document_count, 4);

    let back = ReclassifyRequest::Move { document_ids: vec!["card0".into()], from_cluster_id: NOISE_CLUSTER_ID, to_cluster_id: 0 };
    let r = reclassify(&r, &back).expect("back").result;
    assert_eq!(r.noise, 2);
}

#[test]
fn reclassify_move_rejects_bad_requests() {
    let base = fixture();
    let cases = [
        ReclassifyRequest::Move { document_ids: vec![], from_cluster_id: 0, to_cluster_id: 1 },
        ReclassifyRequest::Move { document_ids: vec!["card0".into()], from_cluster_id: 9, to_cluster_id: 1 },
        ReclassifyRequest::Move { document_ids: vec!["card0".into()], from_cluster_id: 0, to_cluster_id: 9 },
        ReclassifyRequest::Move { document_ids: vec!["card0".into()], from_cluster_id: 0, to_cluster_id: 0 },
        ReclassifyRequest::Move { document_ids: vec!["credit0".into()], from_cluster_id: 0, to_cluster_id: 2 },
    ];
    for request in cases {
        assert!(matches!(reclassify(&base, &request), Err(Error::InvalidInput(_))), "{request:?}");
    }
}

#[test]
fn reclassify_redistribute_pools_sources_into_new_topics() {
    let request: ReclassifyRequest = serde_json::from_value(serde_json::json!({
        "fromClusterIds": [0, 1],
        "numClusters": 2
    }))
    .expect("redistribute shape");
    let out = reclassify(&fixture(), &request).expect("redistribute");

    assert_eq!(out.info.from_cluster_ids, vec![0, 1]);
    assert_eq!(out.info.to_cluster_ids, vec![3, 4]);
    assert!(out.result.topic(0).is_none() && out.result.topic(1).is_none());
    assert_eq!(out.result.topic(3).expect("new").document_count, 4);
    assert_eq!(out.result.topic(4).expect("new").document_count, 4);
    assert_partition(&out.result);

    let too_many = ReclassifyRequest::Redistribute { from_cluster_ids: vec![1], num_clusters: 4 };
    assert!(matches!(reclassify(&fixture(), &too_many), Err(Error::InvalidInput(_))));
    let none = ReclassifyRequest::Redistribute { from_cluster_ids: vec![77], num_clusters: 1 };
    assert!(matches!(reclassify(&fixture(), &none), Err(Error::InvalidInput(_))));
}

#[test]
fn rename_is_idempotent_and_validates_length() {
    let first = rename_topic(&fixture(), 0, "  Payment cards ").expect("rename");
    assert!(first.info.updated);
    assert_eq!(first.info.old_label, "Cards");
    assert_eq!(first.info.new_label, "Payment cards");

    let second = rename_topic(&first.result, 0, "Payment cards").expect("rename again");
    assert!(second.info.updated, "a repeated rename answers like the first one");
    assert_eq!(second.info.new_label, "Payment cards");
    assert_eq!(second.result, first.result);

    let base = fixture();
    assert!(matches!(rename_topic(&base, 0, "   "), Err(Error::InvalidInput(_))));
    assert!(matches!(rename_topic(&base, 0, &"x".repeat(101)), Err(Error::InvalidInput(_))));
    assert!(rename_topic(&base, 0, &"x".repeat(100)).is_ok());
    assert!(matches!(rename_topic(&base, 9, "Nine"), Err(Error::InvalidInput(_))));
}

#[test]
fn exclusion_keeps_membership() {
    let out = set_excluded(&fixture(), &["card0".to_string(), "ghost".to_string()], true).expect("exclude");
    assert_eq!(out.info.documents_affected, 1);
    assert_eq!(out.result.topic(0).expect("cards").document_count, 5);
    assert!(out.result.documents.iter().any(|d| d.id == "card0" && d.excluded));
    assert!(matches!(set_excluded(&fixture(), &["ghost".to_string()], true), Err(Error::InvalidInput(_))));
}

#[test]
fn suggestion_actions_dispatch_to_edits() {
    let base = fixture();
    let merge = apply_action(&base, &SuggestionAction::Merge { target_cluster_ids: vec![0, 1], suggested_label: None })
        .expect("merge");
    assert!(matches!(merge.info, EditInfo::Merge(_)));

    let rename = apply_action(
        &base,
        &SuggestionAction::Rename { target_cluster_ids: vec![2], suggested_label: "Trips".to_string() },
    )
    .expect("rename");
    assert_eq!(rename.result.topic(2).expect("travel").label, "Trips");

    let split = apply_action(&base, &SuggestionAction::Split { target_cluster_ids: vec![1, 2], num_subclusters: 2 });
    assert!(matches!(split, Err(Error::InvalidInput(_))));

    let info = serde_json::to_value(&merge.info).expect("serialize");
    assert_eq!(info["type"], "merge");
    assert_eq!(info["newClusterId"], 0);
}

fn generated(topic_id: TopicId, label: &str, description: &str) -> GeneratedLabel {
    GeneratedLabel { topic_id, label: label.to_string(), description: description.to_string() }
}

#[test]
fn relabel_writes_labels_and_keeps_empty_descriptions() {
    let base = fixture();
    let out = relabel_topics(&base, &[generated(0, " Plastic ", ""), generated(2, "Trips", "Holidays abroad")])
        .expect("relabel");
    let cards = out.result.topic(0).expect("topic 0");
    assert_eq!((cards.label.as_str(), cards.description.as_str()), ("Plastic", "About Cards"));
    let trips = out.result.topic(2).expect("topic 2");
    assert_eq!((trips.label.as_str(), trips.description.as_str()), ("Trips", "Holidays abroad"));
    assert_eq!(out.result.topic(1), base.topic(1));
    assert_eq!(out.info.relabeled[0].old_label, "Cards");
    assert_eq!(out.info.touched_topics(), vec![0, 2]);
    assert_partition(&out.result);

    assert!(matches!(relabel_topics(&base, &[]), Err(Error::InvalidInput(_))));
    assert!(matches!(relabel_topics(&base, &[generated(7, "Seven", "")]), Err(Error::InvalidInput(_))));
    assert!(matches!(relabel_topics(&base, &[generated(0, "Ok", ""), generated(1, "  ", "")]), Err(Error::InvalidInput(_))));
}
