//! Classification probes deciding how a source image should be prepared.
//!
//! Both checks are pure functions over a downsampled copy of the input. Each
//! returns the boolean verdict together with the measured statistic so
//! callers can log it and thresholds stay tunable without touching pipeline
//! control flow. The heuristics in the source app drifted between revisions
//! (unique-color count vs. mean saturation); here they live behind one
//! settings struct.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::canvas;

/// Thresholds for the classification probes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassifierSettings {
    /// Longest edge of the downsampled probe image.
    pub probe_max_edge: u32,
    /// An image with at most this many distinct quantized colors counts as
    /// line art already.
    pub line_art_max_colors: usize,
    /// Mean channel spread (max − min, 0–255 scale) below which an image
    /// counts as grayscale.
    pub grayscale_max_saturation: f32,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            probe_max_edge: 64,
            line_art_max_colors: 8,
            grayscale_max_saturation: 15.0,
        }
    }
}

/// Result of a classification probe: the verdict plus the raw statistic it
/// was derived from.
#[derive(Clone, Copy, Debug)]
pub struct Probe {
    pub matched: bool,
    pub statistic: f32,
}

/// Is the input already a black/white coloring page?
///
/// Counts distinct colors on a small thumbnail, quantized to 4 bits per
/// channel so anti-aliased line edges don't inflate the count.
pub fn probe_line_art(buffer: &RgbaImage, settings: &ClassifierSettings) -> Probe {
    let probe = canvas::downscale_to_fit(buffer, settings.probe_max_edge);
    let mut seen: HashSet<u16> = HashSet::new();
    for p in probe.pixels() {
        let key = ((p.0[0] >> 4) as u16) << 8 | ((p.0[1] >> 4) as u16) << 4 | (p.0[2] >> 4) as u16;
        seen.insert(key);
        if seen.len() > settings.line_art_max_colors {
            break;
        }
    }
    Probe {
        matched: seen.len() <= settings.line_art_max_colors,
        statistic: seen.len() as f32,
    }
}

/// Is the input near-grayscale?
///
/// Measures mean saturation as the per-pixel channel spread (max − min) on a
/// 0–255 scale.
pub fn probe_grayscale(buffer: &RgbaImage, settings: &ClassifierSettings) -> Probe {
    let probe = canvas::downscale_to_fit(buffer, settings.probe_max_edge);
    let count = (probe.width() as u64 * probe.height() as u64).max(1);
    let mut total: u64 = 0;
    for p in probe.pixels() {
        let mx = p.0[0].max(p.0[1]).max(p.0[2]);
        let mn = p.0[0].min(p.0[1]).min(p.0[2]);
        total += (mx - mn) as u64;
    }
    let mean = total as f32 / count as f32;
    Probe {
        matched: mean < settings.grayscale_max_saturation,
        statistic: mean,
    }
}
