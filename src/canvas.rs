//! Pixel-buffer primitives shared by every operation in the crate.
//!
//! The buffer type is `image::RgbaImage`: width × height RGBA8 samples in
//! row-major order. Components that hold a buffer own it exclusively; readers
//! get `&RgbaImage` views, never a live alias.

use image::{GrayImage, Rgba, RgbaImage, imageops};
use rayon::prelude::*;

// ============================================================================
// COLOR MATCHING
// ============================================================================

/// Tolerance-based color equality.
///
/// Two colors match within `tolerance` iff every channel difference
/// (red, green, blue and alpha) is at most `tolerance`. A tolerance of 0 is
/// exact equality. Used identically by the fill engine for target matching
/// and by the classification probes.
#[inline]
pub fn colors_match(a: Rgba<u8>, b: Rgba<u8>, tolerance: u8) -> bool {
    let t = tolerance as i16;
    let dr = (a.0[0] as i16 - b.0[0] as i16).abs();
    let dg = (a.0[1] as i16 - b.0[1] as i16).abs();
    let db = (a.0[2] as i16 - b.0[2] as i16).abs();
    let da = (a.0[3] as i16 - b.0[3] as i16).abs();
    dr <= t && dg <= t && db <= t && da <= t
}

// ============================================================================
// BUFFER HELPERS
// ============================================================================

/// Downscale so the longest edge is at most `max_edge`, preserving aspect
/// ratio. Uses box resampling (area averaging). Returns a copy of the input
/// when it already fits.
pub fn downscale_to_fit(buffer: &RgbaImage, max_edge: u32) -> RgbaImage {
    let (w, h) = buffer.dimensions();
    if max_edge == 0 || (w <= max_edge && h <= max_edge) {
        return buffer.clone();
    }
    let scale = max_edge as f32 / w.max(h) as f32;
    let nw = ((w as f32 * scale).round() as u32).max(1);
    let nh = ((h as f32 * scale).round() as u32).max(1);
    imageops::thumbnail(buffer, nw, nh)
}

/// Convert to single-channel luminance using the BT.709 weights:
/// 0.2126 R + 0.7152 G + 0.0722 B.
pub fn luminance(buffer: &RgbaImage) -> GrayImage {
    let w = buffer.width() as usize;
    let h = buffer.height() as usize;
    let src_raw = buffer.as_raw();
    let mut dst_raw = vec![0u8; w * h];

    // Parallel by row.
    dst_raw.par_chunks_mut(w).enumerate().for_each(|(y, row_out)| {
        let row_in = &src_raw[y * w * 4..(y + 1) * w * 4];
        for x in 0..w {
            let pi = x * 4;
            let r = row_in[pi] as f32;
            let g = row_in[pi + 1] as f32;
            let b = row_in[pi + 2] as f32;
            row_out[x] = (0.2126 * r + 0.7152 * g + 0.0722 * b)
                .round()
                .clamp(0.0, 255.0) as u8;
        }
    });

    GrayImage::from_raw(w as u32, h as u32, dst_raw).unwrap()
}

/// Expand a single-channel buffer back to opaque RGBA.
pub fn gray_to_rgba(gray: &GrayImage) -> RgbaImage {
    let w = gray.width() as usize;
    let h = gray.height() as usize;
    let src_raw = gray.as_raw();
    let mut dst_raw = vec![0u8; w * h * 4];

    dst_raw
        .par_chunks_mut(w * 4)
        .enumerate()
        .for_each(|(y, row_out)| {
            let row_in = &src_raw[y * w..(y + 1) * w];
            for x in 0..w {
                let v = row_in[x];
                let pi = x * 4;
                row_out[pi] = v;
                row_out[pi + 1] = v;
                row_out[pi + 2] = v;
                row_out[pi + 3] = 255;
            }
        });

    RgbaImage::from_raw(w as u32, h as u32, dst_raw).unwrap()
}
