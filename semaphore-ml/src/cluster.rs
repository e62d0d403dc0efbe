//! Seeded k-means over flat row-major frames.
//!
//! Used to place initial emission means before Baum-Welch. Seeding follows
//! k-means++ and the whole run is reproducible for a fixed `seed`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use semaphore_core::{Result, SemaphoreError};

/// Configuration for k-means clustering.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KMeansConfig {
    pub n_clusters: usize,
    pub max_iter: usize,
    pub tolerance: f64,
    pub seed: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            n_clusters: 2,
            max_iter: 300,
            tolerance: 1e-4,
            seed: 14,
        }
    }
}

/// Result of k-means clustering.
#[derive(Debug, Clone)]
pub struct KMeansResult {
    /// Flat centroid data: `n_clusters * n_features` values.
    pub centroids: Vec<f64>,
    /// Cluster label for each row.
    pub labels: Vec<usize>,
    /// Sum of squared distances to the assigned centroid.
    pub inertia: f64,
    /// Number of Lloyd iterations run.
    pub n_iter: usize,
}

fn sq_dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest(row: &[f64], centroids: &[f64], n_features: usize) -> (usize, f64) {
    centroids
        .chunks_exact(n_features)
        .map(|c| sq_dist(row, c))
        .enumerate()
        .fold((0, f64::INFINITY), |best, (j, d)| if d < best.1 { (j, d) } else { best })
}

/// Cluster the rows of `data` (flat row-major, `n_features` columns).
///
/// # Errors
///
/// Returns an error if `n_features` is zero, the data shape is ragged,
/// `n_clusters` is zero, or there are fewer rows than clusters.
pub fn kmeans(data: &[f64], n_features: usize, config: &KMeansConfig) -> Result<KMeansResult> {
    if n_features == 0 || data.len() % n_features != 0 {
        return Err(SemaphoreError::InvalidInput(format!(
            "data length {} is not a multiple of n_features {}",
            data.len(),
            n_features
        )));
    }
    let n = data.len() / n_features;
    let k = config.n_clusters;
    if k == 0 {
        return Err(SemaphoreError::InvalidInput(
            "n_clusters must be > 0".into(),
        ));
    }
    if k > n {
        return Err(SemaphoreError::InvalidInput(format!(
            "n_clusters ({k}) > n_samples ({n})"
        )));
    }
    let row = |i: usize| &data[i * n_features..(i + 1) * n_features];

    // k-means++ seeding
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut centroids = Vec::with_capacity(k * n_features);
    centroids.extend_from_slice(row(rng.gen_range(0..n)));
    let mut dists: Vec<f64> = (0..n).map(|i| sq_dist(row(i), &centroids)).collect();
    for c in 1..k {
        let total: f64 = dists.iter().sum();
        let chosen = if total > 0.0 {
            let threshold = rng.gen::<f64>() * total;
            let mut cumulative = 0.0;
            dists
                .iter()
                .position(|&d| {
                    cumulative += d;
                    cumulative >= threshold
                })
                .unwrap_or(n - 1)
        } else {
            // all remaining rows coincide with a centroid
            c % n
        };
        let start = centroids.len();
        centroids.extend_from_slice(row(chosen));
        for (i, d) in dists.iter_mut().enumerate() {
            *d = d.min(sq_dist(row(i), &centroids[start..]));
        }
    }

    // Lloyd iterations
    let mut labels = vec![0usize; n];
    let mut inertia = 0.0;
    let mut n_iter = 0;
    for _ in 0..config.max_iter {
        n_iter += 1;
        inertia = 0.0;
        for (i, label) in labels.iter_mut().enumerate() {
            let (j, d) = nearest(row(i), &centroids, n_features);
            *label = j;
            inertia += d;
        }

        let mut sums = vec![0.0; k * n_features];
        let mut counts = vec![0usize; k];
        for (i, &j) in labels.iter().enumerate() {
            counts[j] += 1;
            for (s, x) in sums[j * n_features..(j + 1) * n_features].iter_mut().zip(row(i)) {
                *s += x;
            }
        }

        let mut shift = 0.0;
        for j in 0..k {
            if counts[j] == 0 {
                // keep an empty cluster where it is
                continue;
            }
            let centroid = &mut centroids[j * n_features..(j + 1) * n_features];
            let sum = &sums[j * n_features..(j + 1) * n_features];
            for (c, s) in centroid.iter_mut().zip(sum) {
                let next = s / counts[j] as f64;
                shift += (next - *c) * (next - *c);
                *c = next;
            }
        }
        if shift <= config.tolerance {
            break;
        }
    }

    Ok(KMeansResult {
        centroids,
        labels,
        inertia,
        n_iter,
    })
}
