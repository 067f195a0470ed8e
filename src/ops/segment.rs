//! Color segmentation: flatten a photo into k representative colors.
//!
//! The alternative preprocessing path for colorful photos: k-means over the
//! pixel colors produces flat regions that work as fill boundaries without
//! reducing the image to outlines. Near-grayscale input is returned
//! unchanged — segmenting it would only posterize the shading.

use image::RgbaImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::classify::{self, ClassifierSettings};
use crate::error::{Error, Result};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SegmentSettings {
    /// Number of color clusters.
    pub clusters: usize,
    /// Iteration cap for k-means.
    pub max_iterations: u32,
    /// Stop early once total center movement per iteration drops below this.
    pub convergence_epsilon: f32,
}

impl Default for SegmentSettings {
    fn default() -> Self {
        Self {
            clusters: 16,
            max_iterations: 10,
            convergence_epsilon: 1.0,
        }
    }
}

/// Cluster the buffer's colors into `clusters` representative RGB values and
/// repaint every pixel with its cluster center. Alpha is preserved.
///
/// Zero-sized input is rejected. Near-grayscale input (per the classifier's
/// saturation probe) is returned unchanged. Output contains at most
/// `clusters` distinct RGB values; exact pixel values depend on the seeding
/// policy, so callers should rely on cluster-count invariants only.
pub fn segment_by_color(
    buffer: &RgbaImage,
    settings: &SegmentSettings,
    classifier: &ClassifierSettings,
) -> Result<RgbaImage> {
    let (w, h) = buffer.dimensions();
    if w == 0 || h == 0 {
        return Err(Error::EmptyBuffer {
            width: w,
            height: h,
        });
    }

    let probe = classify::probe_grayscale(buffer, classifier);
    if probe.matched {
        log::debug!(
            "input near-grayscale (mean saturation {:.1}), skipping segmentation",
            probe.statistic
        );
        return Ok(buffer.clone());
    }

    let samples: Vec<[f32; 3]> = buffer
        .pixels()
        .map(|p| [p.0[0] as f32, p.0[1] as f32, p.0[2] as f32])
        .collect();

    let k = settings.clusters.clamp(1, samples.len());
    let mut centers = seed_centers(&samples, k);

    let mut assignment = vec![0u32; samples.len()];
    for _ in 0..settings.max_iterations {
        // Assignment step, parallel over samples.
        assignment = samples
            .par_iter()
            .map(|s| nearest_center(s, &centers))
            .collect();

        // Update step: mean of each cluster's members.
        let mut sums = vec![[0f64; 3]; centers.len()];
        let mut counts = vec![0u64; centers.len()];
        for (sample, &cluster) in samples.iter().zip(&assignment) {
            let sum = &mut sums[cluster as usize];
            sum[0] += sample[0] as f64;
            sum[1] += sample[1] as f64;
            sum[2] += sample[2] as f64;
            counts[cluster as usize] += 1;
        }

        let mut movement = 0.0f32;
        for (i, center) in centers.iter_mut().enumerate() {
            if counts[i] == 0 {
                continue; // Empty cluster keeps its center.
            }
            let inv = 1.0 / counts[i] as f64;
            let updated = [
                (sums[i][0] * inv) as f32,
                (sums[i][1] * inv) as f32,
                (sums[i][2] * inv) as f32,
            ];
            movement += distance_sq(center, &updated).sqrt();
            *center = updated;
        }
        if movement < settings.convergence_epsilon {
            break;
        }
    }

    // Repaint each pixel with its center's color, keeping the alpha channel.
    let mut out = buffer.clone();
    let flat: &mut [u8] = &mut out;
    flat.par_chunks_mut(4)
        .zip(assignment.par_iter())
        .for_each(|(px, &cluster)| {
            let c = centers[cluster as usize];
            px[0] = c[0].round().clamp(0.0, 255.0) as u8;
            px[1] = c[1].round().clamp(0.0, 255.0) as u8;
            px[2] = c[2].round().clamp(0.0, 255.0) as u8;
        });
    Ok(out)
}

#[inline]
fn distance_sq(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr * dr + dg * dg + db * db
}

#[inline]
fn nearest_center(sample: &[f32; 3], centers: &[[f32; 3]]) -> u32 {
    let mut best = 0u32;
    let mut best_d = f32::MAX;
    for (i, c) in centers.iter().enumerate() {
        let d = distance_sq(sample, c);
        if d < best_d {
            best_d = d;
            best = i as u32;
        }
    }
    best
}

/// k-means++ seeding with deterministic hash-derived randomness: the first
/// center is hash-picked, each further center is chosen with probability
/// proportional to its squared distance from the nearest existing center.
fn seed_centers(samples: &[[f32; 3]], k: usize) -> Vec<[f32; 3]> {
    let n = samples.len();
    let mut centers = Vec::with_capacity(k);
    centers.push(samples[hash_u32(0x5eed) as usize % n]);

    let mut dist_sq: Vec<f32> = samples
        .iter()
        .map(|s| distance_sq(s, &centers[0]))
        .collect();

    for round in 1..k {
        let total: f64 = dist_sq.iter().map(|&d| d as f64).sum();
        if total <= 0.0 {
            // All samples coincide with a center; duplicates are harmless.
            centers.push(centers[0]);
            continue;
        }
        let mut threshold = hash_f32(round as u32) as f64 * total;
        let mut chosen = n - 1;
        for (i, &d) in dist_sq.iter().enumerate() {
            threshold -= d as f64;
            if threshold <= 0.0 {
                chosen = i;
                break;
            }
        }
        let center = samples[chosen];
        for (d, s) in dist_sq.iter_mut().zip(samples) {
            let nd = distance_sq(s, &center);
            if nd < *d {
                *d = nd;
            }
        }
        centers.push(center);
    }
    centers
}

/// Simple avalanche hash for deterministic seeding.
#[inline]
fn hash_u32(mut x: u32) -> u32 {
    x = x.wrapping_mul(0x9E3779B9);
    x ^= x >> 16;
    x = x.wrapping_mul(0x85EBCA6B);
    x ^= x >> 13;
    x = x.wrapping_mul(0xC2B2AE35);
    x ^= x >> 16;
    x
}

/// Hash to f32 in [0, 1).
#[inline]
fn hash_f32(x: u32) -> f32 {
    (hash_u32(x) & 0x00FF_FFFF) as f32 / 16_777_216.0
}
