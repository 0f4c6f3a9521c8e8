//! Coarse clustering: Lloyd's algorithm with k-means++ seeding over a
//! sampled subset of the corpus.

use crate::error::QuantizerError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Runs k-means++ seeding followed by bounded Lloyd's iterations.
///
/// `samples` is a slice of `D`-dimensional vectors (row-major, each
/// `samples[i]` length `dim`). Returns `num_clusters` centroids, each of
/// length `dim`.
pub fn train(
    samples: &[Vec<f32>],
    dim: usize,
    num_clusters: u32,
    max_iter: u32,
    seed: u64,
) -> Result<Vec<Vec<f32>>, QuantizerError> {
    if samples.is_empty() {
        return Err(QuantizerError::EmptySample);
    }
    let c = num_clusters.max(1) as usize;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut centroids = seed_plus_plus(samples, dim, c, &mut rng);

    let mut assignment = vec![0usize; samples.len()];
    for _iter in 0..max_iter.max(1) {
        let mut changed = false;
        for (idx, v) in samples.iter().enumerate() {
            let mut best = 0usize;
            let mut best_dist = f32::INFINITY;
            for (ci, c) in centroids.iter().enumerate() {
                let d = squared_dist(v, c);
                if d < best_dist {
                    best_dist = d;
                    best = ci;
                }
            }
            if assignment[idx] != best {
                assignment[idx] = best;
                changed = true;
            }
        }

        let mut sums = vec![vec![0.0f32; dim]; centroids.len()];
        let mut counts = vec![0u32; centroids.len()];
        for (idx, v) in samples.iter().enumerate() {
            let k = assignment[idx];
            counts[k] += 1;
            for (s, &x) in sums[k].iter_mut().zip(v) {
                *s += x;
            }
        }
        for (k, centroid) in centroids.iter_mut().enumerate() {
            if counts[k] == 0 {
                continue; // keep previous centroid; an empty cluster is harmless
            }
            for (c, s) in centroid.iter_mut().zip(&sums[k]) {
                *c = *s / counts[k] as f32;
            }
        }

        if !changed {
            break;
        }
    }

    Ok(centroids)
}

fn seed_plus_plus(
    samples: &[Vec<f32>],
    dim: usize,
    c: usize,
    rng: &mut ChaCha8Rng,
) -> Vec<Vec<f32>> {
    let n = samples.len();
    let c = c.min(n);
    let mut centroids: Vec<Vec<f32>> = Vec::with_capacity(c);
    let first = rng.gen_range(0..n);
    centroids.push(samples[first].clone());

    let mut min_sq_dist: Vec<f32> = samples.iter().map(|v| squared_dist(v, &centroids[0])).collect();

    while centroids.len() < c {
        let total: f64 = min_sq_dist.iter().map(|&d| d as f64).sum();
        let next_idx = if total <= 0.0 {
            rng.gen_range(0..n)
        } else {
            let target = rng.gen_range(0.0..total);
            let mut acc = 0.0f64;
            let mut chosen = n - 1;
            for (i, &d) in min_sq_dist.iter().enumerate() {
                acc += d as f64;
                if acc >= target {
                    chosen = i;
                    break;
                }
            }
            chosen
        };
        centroids.push(samples[next_idx].clone());
        let newest = centroids.last().unwrap();
        for (i, v) in samples.iter().enumerate() {
            let d = squared_dist(v, newest);
            if d < min_sq_dist[i] {
                min_sq_dist[i] = d;
            }
        }
    }

    // Pad degenerate (n < requested C) by duplicating the last centroid;
    // empty clusters are handled harmlessly during Lloyd's iterations.
    while centroids.len() < dim.min(c).max(centroids.len()) && centroids.len() < c {
        centroids.push(centroids.last().unwrap().clone());
    }
    centroids
}

fn squared_dist(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
