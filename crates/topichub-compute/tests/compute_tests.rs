use std::collections::BTreeSet;

use topichub_compute::{DisabledAnalyzer, HeuristicAnalyzer, KeywordLabeler, LocalCompute};
use topichub_core::traits::{ComputeBackend, LabelGenerator, LabelInput, RefineContext, SuggestionAnalyzer};
use topichub_core::types::{ClusteringConfig, SuggestionAction, SuggestionKind, SuggestionKey, Topic};

fn two_themes() -> Vec<String> {
    let mut texts = Vec::new();
    for i in 0..20 {
        texts.push(format!("card refund fee charge bank {i}"));
        texts.push(format!("flight hotel booking trip luggage {i}"));
    }
    texts
}

fn kmeans(k: usize) -> ClusteringConfig {
    ClusteringConfig { algorithm: "kmeans".into(), num_clusters: Some(k), ..Default::default() }
}

#[test]
fn separates_two_themes_into_consistent_topics() {
    let result = LocalCompute::new().cluster_texts(&two_themes(), &kmeans(2)).expect("cluster");
    result.check_invariants().expect("consistent");
    assert_eq!(result.total_documents, 40);
    assert_eq!(result.noise, 0);
    assert_eq!(result.topics.len(), 2);

    for topic in &result.topics {
        let members: Vec<_> = result.members(topic.id).collect();
        let cards = members.iter().filter(|d| d.text.starts_with("card")).count();
        assert!(cards == 0 || cards == members.len(), "topic {} mixes themes", topic.id);
        assert_eq!(topic.document_count, 20);
        assert!(!topic.keywords.is_empty());
        assert!(topic.sample_texts.len() <= 5);
        assert!((0.0..=1.0).contains(&topic.coherence_score));
    }
    let labels: Vec<&str> = result.topics.iter().map(|t| t.label.as_str()).collect();
    assert!(labels.iter().all(|l| !l.starts_with("Topic ")), "{labels:?}");
    assert!(result.meta.as_ref().expect("meta")["encoderModel"].is_string());
}

#[test]
fn same_input_same_result() {
    let compute = LocalCompute::new();
    let a = compute.cluster_texts(&two_themes(), &ClusteringConfig::default()).expect("a");
    let b = compute.cluster_texts(&two_themes(), &ClusteringConfig::default()).expect("b");
    assert_eq!(a.documents, b.documents);
    assert_eq!(a.topics, b.topics);

    let next = ClusteringConfig { iteration: 1, ..Default::default() };
    let c = compute.cluster_texts(&two_themes(), &next).expect("c");
    assert_ne!(a.documents[0].x, c.documents[0].x, "iteration reseeds the layout");
}

#[test]
fn density_mode_marks_small_clusters_as_noise() {
    let mut texts = two_themes();
    texts.push("completely unrelated sentence about gardening".into());
    let config = ClusteringConfig { min_cluster_size: 5, ..Default::default() };
    let result = LocalCompute::new().cluster_texts(&texts, &config).expect("cluster");
    result.check_invariants().expect("consistent");
    assert!(result.topics.iter().all(|t| t.document_count >= 5));
    assert_eq!(result.noise + result.topics.iter().map(|t| t.document_count).sum::<usize>(), 41);
}

#[test]
fn rejects_bad_input() {
    let compute = LocalCompute::new();
    let bad = ClusteringConfig { granularity: "extreme".into(), ..Default::default() };
    assert!(compute.cluster_texts(&two_themes(), &bad).is_err());
    assert!(compute.cluster_texts(&[], &ClusteringConfig::default()).is_err());
}

#[tokio::test]
async fn compute_runs_off_the_async_runtime() {
    let compute = LocalCompute::new();
    assert_eq!(compute.name(), "local");
    let result = compute.compute(&two_themes(), &kmeans(3)).await.expect("compute");
    assert!(result.topics.len() <= 3);
    result.check_invariants().expect("consistent");
}

fn topic(id: i64, label: &str, count: usize, coherence: f64, keywords: &[&str]) -> Topic {
    Topic {
        id,
        label: label.to_string(),
        description: String::new(),
        document_count: count,
        sample_texts: vec![],
        color: String::new(),
        centroid_x: 0.0,
        centroid_y: 0.0,
        coherence_score: coherence,
        keywords: keywords.iter().map(|s| s.to_string()).collect(),
    }
}

fn context(focus: &[&str], seen: BTreeSet<SuggestionKey>, max: usize) -> RefineContext {
    RefineContext {
        topics: vec![
            topic(0, "Cards", 12, 0.3, &["card", "fee", "bank"]),
            topic(1, "Banking", 6, 0.8, &["bank", "card", "loan"]),
            topic(2, "Topic 2", 4, 0.7, &["flight", "hotel"]),
        ],
        total_documents: 25,
        noise: 3,
        focus_areas: focus.iter().map(|s| s.to_string()).collect(),
        seen,
        max_suggestions: max,
    }
}

#[tokio::test]
async fn heuristic_analyzer_covers_each_focus_area() {
    let analyzer = HeuristicAnalyzer::default();
    let all = analyzer
        .propose(&context(&["coherence", "granularity", "naming", "sentiment"], BTreeSet::new(), 5))
        .await
        .expect("propose");
    let ids: Vec<&str> = all.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["split:0", "rename:2", "merge:0,1"]);
    assert!((all[0].confidence - 0.7).abs() < 1e-9);
    match &all[1].action {
        SuggestionAction::Rename { suggested_label, .. } => assert_eq!(suggested_label, "Flight, hotel"),
        other => panic!("unexpected {other:?}"),
    }

    let naming_only = analyzer.propose(&context(&["naming"], BTreeSet::new(), 5)).await.expect("propose");
    assert_eq!(naming_only.len(), 1);
}

#[tokio::test]
async fn heuristic_analyzer_skips_seen_keys_and_caps() {
    let analyzer = HeuristicAnalyzer::default();
    let seen: BTreeSet<SuggestionKey> = [SuggestionKey::new(SuggestionKind::Split, &[0])].into_iter().collect();
    let out = analyzer
        .propose(&context(&["coherence", "granularity", "naming"], seen, 1))
        .await
        .expect("propose");
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].id, "rename:2");
}

#[tokio::test]
async fn disabled_analyzer_is_unavailable() {
    let analyzer = DisabledAnalyzer;
    assert!(!analyzer.is_available());
    assert!(analyzer.propose(&context(&["naming"], BTreeSet::new(), 5)).await.is_err());
}

fn label_input(topic_id: i64, members: &[&str]) -> LabelInput {
    LabelInput {
        topic_id,
        current_label: format!("Topic {topic_id}"),
        document_count: members.len(),
        coherence: 0.7,
        sample_texts: Vec::new(),
        member_texts: members.iter().map(ToString::to_string).collect(),
    }
}

#[tokio::test]
async fn keyword_labeler_names_topics_after_distinctive_words() {
    let inputs = vec![
        label_input(0, &["refund for my card", "card refund please", "bank refund card"]),
        label_input(3, &["flight delayed", "hotel and flight", "flight booking"]),
        label_input(5, &["the and for", "it is"]),
    ];
    let labels = KeywordLabeler.label_topics(&inputs).await.expect("labels");
    assert_eq!(labels.len(), 3);
    assert_eq!(labels[0].topic_id, 0);
    assert_eq!(labels[0].label, "Card, refund, bank");
    assert!(labels[0].description.starts_with("3 documents; top terms: card, refund"));
    assert_eq!(labels[1].label, "Flight, booking, delayed");
    assert_eq!(labels[2].label, "Topic 5", "stop words only");
    assert!(labels[2].description.contains("2 documents"));
}
