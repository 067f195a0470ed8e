//! Photo → line-art pipeline.
//!
//! Turns an arbitrary photo into a black-on-white outline image suitable as
//! fill-region boundaries: luminance conversion, edge-preserving smoothing,
//! Gaussian denoise, two-threshold edge detection, optional dilation, then
//! inversion and binarization. A classification pre-check skips inputs that
//! already look like a coloring page, and any internal failure falls back to
//! returning the original buffer — this pipeline never crashes the caller.

use image::{GrayImage, RgbaImage};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::{bilateral_filter, gaussian_blur_f32};
use imageproc::morphology::dilate;
use serde::{Deserialize, Serialize};
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::canvas;
use crate::classify::{self, ClassifierSettings};
use crate::error::{Error, Result};

/// Bilateral filter window diameter.
const BILATERAL_WINDOW: u32 = 9;
/// Upper Canny threshold as a multiple of the lower one.
const UPPER_THRESHOLD_RATIO: f32 = 2.5;
/// Near-white cutoff for the final binarization.
const BINARIZE_CUTOFF: u8 = 240;

/// Tuning knobs for the line-art conversion. Each is independently
/// adjustable; a live preview recomputes the whole pipeline per change.
/// Out-of-range values are clamped to the documented range.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LineArtSettings {
    /// Lower Canny threshold, 10–80. Lower captures more detail.
    pub edge_threshold: f32,
    /// Dilation of the edge mask in pixels, 1–5. 1 leaves lines as detected.
    pub edge_thickness: u32,
    /// Smoothing strength, 1–7; the Gaussian kernel size is `2n − 1`.
    pub blur_amount: u32,
    /// Bilateral filter color/spatial sigma, 50–150. Higher keeps strong
    /// edges sharper relative to flat regions.
    pub detail_preservation: f32,
    /// Longest edge above which the input is downscaled first.
    pub max_dimension: u32,
}

impl Default for LineArtSettings {
    fn default() -> Self {
        Self {
            edge_threshold: 30.0,
            edge_thickness: 2,
            blur_amount: 3,
            detail_preservation: 75.0,
            max_dimension: 1024,
        }
    }
}

impl LineArtSettings {
    fn clamped(&self) -> Self {
        Self {
            edge_threshold: self.edge_threshold.clamp(10.0, 80.0),
            edge_thickness: self.edge_thickness.clamp(1, 5),
            blur_amount: self.blur_amount.clamp(1, 7),
            detail_preservation: self.detail_preservation.clamp(50.0, 150.0),
            max_dimension: self.max_dimension.max(1),
        }
    }
}

/// Convert `buffer` into a pure black/white outline image.
///
/// Zero-sized input is rejected. Input the classifier already considers line
/// art is returned unchanged. Any failure inside the pipeline stages is
/// logged and recovered by returning the original buffer.
pub fn to_line_art(
    buffer: &RgbaImage,
    settings: &LineArtSettings,
    classifier: &ClassifierSettings,
) -> Result<RgbaImage> {
    let (w, h) = buffer.dimensions();
    if w == 0 || h == 0 {
        return Err(Error::EmptyBuffer {
            width: w,
            height: h,
        });
    }

    let probe = classify::probe_line_art(buffer, classifier);
    if probe.matched {
        log::debug!(
            "input already line art ({} distinct colors), skipping conversion",
            probe.statistic
        );
        return Ok(buffer.clone());
    }

    match run_pipeline(buffer, &settings.clamped()) {
        Ok(out) => Ok(out),
        Err(err) => {
            log::warn!("line-art pipeline failed ({err}), returning original image");
            Ok(buffer.clone())
        }
    }
}

fn run_pipeline(buffer: &RgbaImage, settings: &LineArtSettings) -> Result<RgbaImage> {
    let src = canvas::downscale_to_fit(buffer, settings.max_dimension);
    if src.width() < 3 || src.height() < 3 {
        return Err(Error::Processing(format!(
            "{}x{} too small for edge detection",
            src.width(),
            src.height()
        )));
    }

    let settings = settings.clone();
    catch_unwind(AssertUnwindSafe(move || {
        let gray = canvas::luminance(&src);

        let filtered = bilateral_filter(
            &gray,
            BILATERAL_WINDOW,
            settings.detail_preservation,
            settings.detail_preservation,
        );

        // Kernel size 2n − 1 (1, 3, 5, …); sigma derived from the kernel the
        // way OpenCV does for GaussianBlur with sigma = 0.
        let kernel = 2 * settings.blur_amount - 1;
        let sigma = 0.3 * ((kernel as f32 - 1.0) * 0.5 - 1.0) + 0.8;
        let blurred = gaussian_blur_f32(&filtered, sigma);

        let lower = settings.edge_threshold;
        let edges = canny(&blurred, lower, lower * UPPER_THRESHOLD_RATIO);

        let thick = if settings.edge_thickness > 1 {
            dilate(&edges, Norm::LInf, (settings.edge_thickness - 1) as u8)
        } else {
            edges
        };

        canvas::gray_to_rgba(&invert_and_binarize(&thick))
    }))
    .map_err(|_| Error::Processing("pipeline stage panicked".into()))
}

/// Invert the edge mask (edges become black on white) and snap everything to
/// pure black or white at the near-white cutoff.
fn invert_and_binarize(mask: &GrayImage) -> GrayImage {
    let mut out = mask.clone();
    for p in out.pixels_mut() {
        let inverted = 255 - p.0[0];
        p.0[0] = if inverted > BINARIZE_CUTOFF { 255 } else { 0 };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn defaults() -> (LineArtSettings, ClassifierSettings) {
        (LineArtSettings::default(), ClassifierSettings::default())
    }

    /// Colorful enough that the line-art probe does not short-circuit.
    fn photo() -> RgbaImage {
        RgbaImage::from_fn(128, 96, |x, y| {
            Rgba([(x * 2) as u8, (y * 2) as u8, (x + y) as u8, 255])
        })
    }

    #[test]
    fn test_line_art_input_returned_unchanged() {
        let (settings, classifier) = defaults();
        let page = RgbaImage::from_fn(32, 32, |x, _| {
            if x % 8 == 0 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let out = to_line_art(&page, &settings, &classifier).unwrap();
        assert_eq!(out, page);
    }

    #[test]
    fn test_zero_sized_input_rejected() {
        let (settings, classifier) = defaults();
        let empty = RgbaImage::new(0, 0);
        assert!(matches!(
            to_line_art(&empty, &settings, &classifier),
            Err(Error::EmptyBuffer { .. })
        ));
    }

    #[test]
    fn test_output_is_pure_black_and_white() {
        let (settings, classifier) = defaults();
        let out = to_line_art(&photo(), &settings, &classifier).unwrap();
        assert_eq!(out.dimensions(), (128, 96));
        for p in out.pixels() {
            let v = p.0[0];
            assert!(v == 0 || v == 255);
            assert_eq!(p.0[0], p.0[1]);
            assert_eq!(p.0[1], p.0[2]);
            assert_eq!(p.0[3], 255);
        }
    }

    #[test]
    fn test_tiny_input_falls_back_to_original() {
        let (settings, classifier) = defaults();
        // 2×2 but colorful enough to dodge the line-art probe; the pipeline
        // itself cannot run, so the original comes back.
        let tiny = RgbaImage::from_fn(2, 2, |x, y| {
            Rgba([x as u8 * 200, y as u8 * 200, 90, 255])
        });
        let classifier = ClassifierSettings {
            line_art_max_colors: 1,
            ..classifier
        };
        let out = to_line_art(&tiny, &settings, &classifier).unwrap();
        assert_eq!(out, tiny);
    }

    #[test]
    fn test_settings_are_clamped() {
        let clamped = LineArtSettings {
            edge_threshold: 500.0,
            edge_thickness: 99,
            blur_amount: 0,
            detail_preservation: 1.0,
            max_dimension: 0,
        }
        .clamped();
        assert_eq!(clamped.edge_threshold, 80.0);
        assert_eq!(clamped.edge_thickness, 5);
        assert_eq!(clamped.blur_amount, 1);
        assert_eq!(clamped.detail_preservation, 50.0);
        assert_eq!(clamped.max_dimension, 1);
    }
}
