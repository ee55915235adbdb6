use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use topichub_core::traits::ComputeBackend;
use topichub_core::types::{
    ClusteringConfig, ClusteringResult, Document, Granularity, Topic, TopicId, MAX_KEYWORDS, MAX_SAMPLE_TEXTS,
    NOISE_CLUSTER_ID,
};
use topichub_mutation::PALETTE;

use crate::embed::{distance, project_2d, Embedder, HashEmbedder};
use crate::keywords::{label_from, top_keywords};
use crate::kmeans::{coherence, kmeans};

const BASE_SEED: u64 = 42;

fn granularity_k(g: Granularity) -> usize {
    match g {
        Granularity::Low => 4,
        Granularity::Medium => 7,
        Granularity::High => 12,
    }
}

/// In-process compute backend: hashed bag-of-words embeddings, a seeded 2D
/// projection and k-means. Noise follows the density-style algorithm: with
/// `algorithm = "hdbscan"` clusters smaller than `min_cluster_size` become
/// noise unless that would leave no cluster at all.
#[derive(Clone)]
pub struct LocalCompute {
    embedder: Arc<dyn Embedder>,
}

impl Default for LocalCompute {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalCompute {
    pub fn new() -> Self {
        Self::with_embedder(Arc::new(HashEmbedder::default()))
    }

    pub fn with_embedder(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    /// Synchronous core of [`ComputeBackend::compute`].
    pub fn cluster_texts(&self, texts: &[String], config: &ClusteringConfig) -> Result<ClusteringResult> {
        run(self.embedder.as_ref(), texts, config)
    }
}

#[async_trait]
impl ComputeBackend for LocalCompute {
    fn name(&self) -> &str {
        "local"
    }

    async fn compute(&self, texts: &[String], config: &ClusteringConfig) -> Result<ClusteringResult> {
        let embedder = Arc::clone(&self.embedder);
        let texts = texts.to_vec();
        let config = config.clone();
        tokio::task::spawn_blocking(move || run(embedder.as_ref(), &texts, &config)).await?
    }
}

fn target_k(config: &ClusteringConfig, granularity: Granularity, n: usize, density: bool) -> usize {
    let mut k = config.num_clusters.unwrap_or_else(|| granularity_k(granularity));
    if density && config.num_clusters.is_none() {
        k = k.min(n / config.min_cluster_size.max(1)).max(1);
    }
    k.clamp(1, n.saturating_sub(1).max(1))
}

fn run(embedder: &dyn Embedder, texts: &[String], config: &ClusteringConfig) -> Result<ClusteringResult> {
    let start = Instant::now();
    let granularity = config.granularity()?;
    let n = texts.len();
    if n == 0 {
        bail!("nothing to cluster");
    }
    let density = config.algorithm.eq_ignore_ascii_case("hdbscan");
    let seed = BASE_SEED + u64::from(config.iteration);

    let vectors = embedder.embed_batch(texts)?;
    let coords = project_2d(&vectors, seed);
    let k = target_k(config, granularity, n, density);
    let clustering = kmeans(&vectors, k, (seed % n as u64) as usize);
    let scores = coherence(&vectors, &clustering.labels, &clustering.centroids);

    let mut sizes = vec![0usize; clustering.centroids.len()];
    for l in &clustering.labels {
        sizes[*l] += 1;
    }
    let min_size = if density { config.min_cluster_size.max(2) } else { 1 };
    let mut kept: Vec<usize> = (0..sizes.len()).filter(|c| sizes[*c] >= min_size).collect();
    if kept.is_empty() {
        tracing::warn!(min_size, "no cluster reached the minimum size; keeping all clusters");
        kept = (0..sizes.len()).filter(|c| sizes[*c] > 0).collect();
    }
    kept.sort_by(|a, b| sizes[*b].cmp(&sizes[*a]).then(a.cmp(b)));
    let mut topic_of: Vec<TopicId> = vec![NOISE_CLUSTER_ID; sizes.len()];
    for (id, c) in kept.iter().enumerate() {
        topic_of[*c] = id as TopicId;
    }

    let documents: Vec<Document> = texts
        .iter()
        .enumerate()
        .map(|(i, text)| Document {
            id: format!("doc-{i}"),
            text: text.clone(),
            cluster_id: topic_of[clustering.labels[i]],
            x: coords[i].0,
            y: coords[i].1,
            excluded: false,
        })
        .collect();

    let mut groups: BTreeMap<TopicId, Vec<&str>> = BTreeMap::new();
    for d in documents.iter().filter(|d| !d.is_noise()) {
        groups.entry(d.cluster_id).or_default().push(d.text.as_str());
    }
    let keywords = top_keywords(&groups, MAX_KEYWORDS);

    let topics: Vec<Topic> = kept
        .iter()
        .enumerate()
        .map(|(id, c)| {
            let id = id as TopicId;
            let kw = keywords.get(&id).cloned().unwrap_or_default();
            let mut members: Vec<usize> = (0..n).filter(|i| clustering.labels[*i] == *c).collect();
            members.sort_by(|a, b| {
                distance(&vectors[*a], &clustering.centroids[*c])
                    .total_cmp(&distance(&vectors[*b], &clustering.centroids[*c]))
                    .then(a.cmp(b))
            });
            let description = if kw.is_empty() {
                format!("{} documents", sizes[*c])
            } else {
                format!("{} documents; top terms: {}", sizes[*c], kw.iter().take(3).cloned().collect::<Vec<_>>().join(", "))
            };
            Topic {
                id,
                label: label_from(&kw).unwrap_or_else(|| format!("Topic {id}")),
                description,
                document_count: sizes[*c],
                sample_texts: members.iter().take(MAX_SAMPLE_TEXTS).map(|i| texts[*i].clone()).collect(),
                color: PALETTE[id as usize % PALETTE.len()].to_string(),
                centroid_x: 0.0,
                centroid_y: 0.0,
                coherence_score: (scores[*c] * 1000.0).round() / 1000.0,
                keywords: kw,
            }
        })
        .collect();

    let mut result = ClusteringResult {
        documents,
        topics,
        total_documents: n,
        meta: Some(serde_json::json!({
            "pipelineDurationMs": start.elapsed().as_millis() as u64,
            "encoderModel": embedder.model_name(),
            "algorithm": config.algorithm,
            "granularity": config.granularity,
            "iteration": config.iteration,
            "seed": seed,
        })),
        ..Default::default()
    };
    result.normalize();
    tracing::info!(
        texts = n,
        topics = result.topics.len(),
        noise = result.noise,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "local clustering done"
    );
    Ok(result)
}
