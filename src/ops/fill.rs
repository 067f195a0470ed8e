//! Tolerance-based flood fill.
//!
//! Recolors the 4-connected region of pixels similar to the seed pixel's
//! color. Operates on the flat RGBA byte buffer with packed pixel indices so
//! the hot loop does no per-pixel coordinate math beyond neighbor offsets.

use image::{Rgba, RgbaImage};
use std::collections::VecDeque;

use crate::canvas::colors_match;

/// Flood fill starting at `(start_x, start_y)`.
///
/// Captures the seed pixel as the target color, then walks the 4-connected
/// region (no diagonals) of pixels matching the target within `tolerance`,
/// recoloring each to `new_color`. A pixel is recolored at the moment it is
/// enqueued, so neighbor checks always compare against the *original* target
/// color and every pixel is processed at most once.
///
/// Returns the bounding box `(min_x, min_y, max_x, max_y)` of the recolored
/// region, or `None` when nothing changed: out-of-range seed, or the target
/// already matches `new_color` within tolerance (re-filling an already-filled
/// region is a no-op).
pub fn flood_fill(
    buffer: &mut RgbaImage,
    start_x: u32,
    start_y: u32,
    new_color: Rgba<u8>,
    tolerance: u8,
) -> Option<(u32, u32, u32, u32)> {
    let w = buffer.width() as usize;
    let h = buffer.height() as usize;
    if w == 0 || h == 0 || start_x as usize >= w || start_y as usize >= h {
        return None;
    }

    let target = *buffer.get_pixel(start_x, start_y);

    // Idempotence guard. This also makes the recolored pixels themselves act
    // as the visited set below: once painted they can no longer match the
    // target, so no pixel is ever enqueued twice.
    if colors_match(target, new_color, tolerance) {
        return None;
    }

    let tc = target.0;
    let nc = new_color.0;
    let flat: &mut [u8] = buffer;

    #[inline(always)]
    fn matches(flat: &[u8], idx: usize, tc: [u8; 4], tol: i16) -> bool {
        let o = idx * 4;
        (flat[o] as i16 - tc[0] as i16).abs() <= tol
            && (flat[o + 1] as i16 - tc[1] as i16).abs() <= tol
            && (flat[o + 2] as i16 - tc[2] as i16).abs() <= tol
            && (flat[o + 3] as i16 - tc[3] as i16).abs() <= tol
    }

    #[inline(always)]
    fn paint(flat: &mut [u8], idx: usize, nc: [u8; 4]) {
        let o = idx * 4;
        flat[o..o + 4].copy_from_slice(&nc);
    }

    let tol = tolerance as i16;
    let seed_idx = start_y as usize * w + start_x as usize;

    let mut min_x = start_x;
    let mut min_y = start_y;
    let mut max_x = start_x;
    let mut max_y = start_y;

    // Breadth-first queue of packed flat indices (y * w + x). A flat index of
    // any buffer the app produces fits in u32.
    let mut queue: VecDeque<u32> = VecDeque::with_capacity(4096);
    paint(flat, seed_idx, nc);
    queue.push_back(seed_idx as u32);

    while let Some(idx) = queue.pop_front() {
        let idx = idx as usize;
        let x = (idx % w) as u32;
        let y = (idx / w) as u32;

        if x < min_x {
            min_x = x;
        }
        if x > max_x {
            max_x = x;
        }
        if y < min_y {
            min_y = y;
        }
        if y > max_y {
            max_y = y;
        }

        // Left
        if x > 0 && matches(flat, idx - 1, tc, tol) {
            paint(flat, idx - 1, nc);
            queue.push_back((idx - 1) as u32);
        }
        // Right
        if (x as usize) + 1 < w && matches(flat, idx + 1, tc, tol) {
            paint(flat, idx + 1, nc);
            queue.push_back((idx + 1) as u32);
        }
        // Up
        if y > 0 && matches(flat, idx - w, tc, tol) {
            paint(flat, idx - w, nc);
            queue.push_back((idx - w) as u32);
        }
        // Down
        if (y as usize) + 1 < h && matches(flat, idx + w, tc, tol) {
            paint(flat, idx + w, nc);
            queue.push_back((idx + w) as u32);
        }
    }

    Some((min_x, min_y, max_x, max_y))
}
