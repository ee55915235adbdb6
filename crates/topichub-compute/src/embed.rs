use anyhow::Result;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_text(t)).collect()
    }
}

/// Bag-of-tokens embedding: every lowercased token is hashed into one of
/// `dim` buckets and the vector is L2-normalized. Same text, same vector.
pub struct HashEmbedder {
    dim: usize,
    name: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, name: format!("xxhash64-bag-{dim}") }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0f32; self.dim];
        for token in crate::keywords::tokens(text) {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let weight = ((h >> 32) as u32) as f32 / u32::MAX as f32;
            v[idx] += 0.5 + weight;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        Ok(v)
    }
}

pub(crate) fn distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
}

/// Fixed pseudo-random projection to two axes, seeded per run.
pub(crate) fn project_2d(vectors: &[Vec<f32>], seed: u64) -> Vec<(f64, f64)> {
    let dim = vectors.first().map_or(0, Vec::len);
    let axis = |which: u64| -> Vec<f32> {
        (0..dim)
            .map(|i| {
                let mut hasher = XxHash64::with_seed(seed);
                (which, i).hash(&mut hasher);
                (hasher.finish() as f64 / u64::MAX as f64 * 2.0 - 1.0) as f32
            })
            .collect()
    };
    let (ax, ay) = (axis(0), axis(1));
    let dot = |v: &[f32], a: &[f32]| v.iter().zip(a).map(|(x, y)| f64::from(x * y)).sum::<f64>();
    vectors.iter().map(|v| (dot(v, &ax) * 10.0, dot(v, &ay) * 10.0)).collect()
}
