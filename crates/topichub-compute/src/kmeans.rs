use crate::embed::distance;

const MAX_ITERATIONS: usize = 30;

pub(crate) struct Clustering {
    pub labels: Vec<usize>,
    pub centroids: Vec<Vec<f32>>,
}

/// Lloyd's k-means with farthest-point seeding from `start`. Deterministic
/// for a given input and start index.
pub(crate) fn kmeans(points: &[Vec<f32>], k: usize, start: usize) -> Clustering {
    let n = points.len();
    let k = k.clamp(1, n.max(1));
    if n == 0 {
        return Clustering { labels: Vec::new(), centroids: Vec::new() };
    }

    let mut centroids = vec![points[start % n].clone()];
    let mut nearest: Vec<f32> = points.iter().map(|p| distance(p, &centroids[0])).collect();
    while centroids.len() < k {
        let (far, _) = nearest
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, d)| if *d > best.1 { (i, *d) } else { best });
        let c = points[far].clone();
        for (i, p) in points.iter().enumerate() {
            nearest[i] = nearest[i].min(distance(p, &c));
        }
        centroids.push(c);
    }

    let mut labels = vec![0usize; n];
    for round in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (i, p) in points.iter().enumerate() {
            let best = closest(p, &centroids);
            if best != labels[i] {
                labels[i] = best;
                changed = true;
            }
        }
        if round > 0 && !changed {
            break;
        }
        centroids = recompute(points, &labels, &centroids);
    }
    Clustering { labels, centroids }
}

pub(crate) fn closest(p: &[f32], centroids: &[Vec<f32>]) -> usize {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, distance(p, c)))
        .fold((0, f32::MAX), |best, (i, d)| if d < best.1 { (i, d) } else { best })
        .0
}

fn recompute(points: &[Vec<f32>], labels: &[usize], previous: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let dim = points[0].len();
    let mut sums = vec![vec![0f32; dim]; previous.len()];
    let mut counts = vec![0usize; previous.len()];
    for (p, l) in points.iter().zip(labels) {
        counts[*l] += 1;
        for (s, x) in sums[*l].iter_mut().zip(p) {
            *s += x;
        }
    }
    sums.into_iter()
        .zip(counts)
        .zip(previous)
        .map(|((s, c), prev)| if c == 0 { prev.clone() } else { s.into_iter().map(|x| x / c as f32).collect() })
        .collect()
}

/// Centroid form of the silhouette per cluster, mapped from [-1, 1] to [0, 1].
pub(crate) fn coherence(points: &[Vec<f32>], labels: &[usize], centroids: &[Vec<f32>]) -> Vec<f64> {
    let k = centroids.len();
    if k < 2 {
        return vec![0.75; k];
    }
    let mut sums = vec![0f64; k];
    let mut counts = vec![0usize; k];
    for (p, l) in points.iter().zip(labels) {
        let a = distance(p, &centroids[*l]);
        let b = centroids
            .iter()
            .enumerate()
            .filter(|(j, _)| j != l)
            .map(|(_, c)| distance(p, c))
            .fold(f32::MAX, f32::min);
        let denom = a.max(b);
        let s = if denom > 0.0 { f64::from((b - a) / denom) } else { 0.0 };
        sums[*l] += s;
        counts[*l] += 1;
    }
    sums.into_iter()
        .zip(counts)
        .map(|(s, c)| if c == 0 { 0.5 } else { ((s / c as f64 + 1.0) / 2.0).clamp(0.0, 1.0) })
        .collect()
}
