//! Brush stamping: a filled disk of color applied directly to the buffer.
//!
//! Stamps mutate in place because a drag delivers them as a rapid sequence;
//! copy-on-write for undo is deliberately the session's job, once per stroke
//! rather than once per point.

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Width in pixels of the anti-aliased rim.
const AA_FADE: f32 = 1.5;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BrushSettings {
    /// Disk radius in pixels.
    pub radius: f32,
    /// Smoothstep coverage over the rim instead of a hard binary edge.
    pub anti_aliased: bool,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            radius: 15.0,
            anti_aliased: true,
        }
    }
}

/// Stamp a filled disk of `color` centered at `(cx, cy)`.
///
/// Pixels outside the buffer bounds are clipped silently; a stamp entirely
/// off-canvas does nothing.
pub fn stamp(buffer: &mut RgbaImage, cx: f32, cy: f32, color: Rgba<u8>, settings: &BrushSettings) {
    let w = buffer.width();
    let h = buffer.height();
    let radius = settings.radius;
    if w == 0 || h == 0 || radius <= 0.0 {
        return;
    }

    let reach = if settings.anti_aliased { radius + AA_FADE } else { radius };
    let min_x = (cx - reach).floor().max(0.0) as u32;
    let min_y = (cy - reach).floor().max(0.0) as u32;
    let max_x = ((cx + reach).ceil() as i64).min(w as i64 - 1);
    let max_y = ((cy + reach).ceil() as i64).min(h as i64 - 1);
    if max_x < min_x as i64 || max_y < min_y as i64 || cx + reach < 0.0 || cy + reach < 0.0 {
        return;
    }
    let max_x = max_x as u32;
    let max_y = max_y as u32;

    let radius_sq = radius * radius;
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            let dist_sq = dx * dx + dy * dy;

            if !settings.anti_aliased {
                if dist_sq <= radius_sq {
                    buffer.put_pixel(x, y, color);
                }
                continue;
            }

            let coverage = rim_coverage(dist_sq.sqrt(), radius);
            if coverage <= 0.0 {
                continue;
            }
            if coverage >= 1.0 && color.0[3] == 255 {
                buffer.put_pixel(x, y, color);
            } else {
                let dst = *buffer.get_pixel(x, y);
                buffer.put_pixel(x, y, blend_over(color, dst, coverage));
            }
        }
    }
}

/// Smoothstep falloff over the outer `AA_FADE` pixels of the disk.
#[inline]
fn rim_coverage(dist: f32, radius: f32) -> f32 {
    let solid = (radius - AA_FADE).max(0.0);
    if dist <= solid {
        return 1.0;
    }
    if dist >= radius {
        return 0.0;
    }
    let t = 1.0 - (dist - solid) / (radius - solid);
    t * t * (3.0 - 2.0 * t)
}

/// Source-over blend of `src` scaled by `coverage` onto `dst`.
#[inline]
fn blend_over(src: Rgba<u8>, dst: Rgba<u8>, coverage: f32) -> Rgba<u8> {
    let sa = src.0[3] as f32 / 255.0 * coverage;
    let da = dst.0[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let mut out = [0u8; 4];
    for c in 0..3 {
        let s = src.0[c] as f32;
        let d = dst.0[c] as f32;
        out[c] = ((s * sa + d * da * (1.0 - sa)) / out_a).round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn hard_brush(radius: f32) -> BrushSettings {
        BrushSettings {
            radius,
            anti_aliased: false,
        }
    }

    #[test]
    fn test_stamp_covers_disk() {
        let mut buffer = RgbaImage::from_pixel(21, 21, WHITE);
        stamp(&mut buffer, 10.5, 10.5, BLUE, &hard_brush(5.0));
        // Center painted, corner untouched.
        assert_eq!(*buffer.get_pixel(10, 10), BLUE);
        assert_eq!(*buffer.get_pixel(0, 0), WHITE);
        // Disk edge: 5 pixels left of center is on the rim.
        assert_eq!(*buffer.get_pixel(6, 10), BLUE);
        assert_eq!(*buffer.get_pixel(4, 10), WHITE);
    }

    #[test]
    fn test_stamp_clips_at_border() {
        let mut buffer = RgbaImage::from_pixel(8, 8, WHITE);
        stamp(&mut buffer, 0.0, 0.0, BLUE, &hard_brush(4.0));
        assert_eq!(*buffer.get_pixel(0, 0), BLUE);
        assert_eq!(*buffer.get_pixel(7, 7), WHITE);
    }

    #[test]
    fn test_stamp_off_canvas_is_noop() {
        let mut buffer = RgbaImage::from_pixel(8, 8, WHITE);
        let before = buffer.clone();
        stamp(&mut buffer, -100.0, -100.0, BLUE, &hard_brush(4.0));
        stamp(&mut buffer, 500.0, 4.0, BLUE, &hard_brush(4.0));
        assert_eq!(buffer, before);
    }

    #[test]
    fn test_zero_radius_is_noop() {
        let mut buffer = RgbaImage::from_pixel(4, 4, WHITE);
        let before = buffer.clone();
        stamp(
            &mut buffer,
            2.0,
            2.0,
            BLUE,
            &BrushSettings {
                radius: 0.0,
                anti_aliased: true,
            },
        );
        assert_eq!(buffer, before);
    }

    #[test]
    fn test_anti_aliased_rim_is_partial() {
        let mut buffer = RgbaImage::from_pixel(21, 21, WHITE);
        let settings = BrushSettings {
            radius: 6.0,
            anti_aliased: true,
        };
        stamp(&mut buffer, 10.5, 10.5, BLUE, &settings);
        // Solid core.
        assert_eq!(*buffer.get_pixel(10, 10), BLUE);
        // A rim pixel just inside the radius is blended, not pure.
        let rim = *buffer.get_pixel(10 + 5, 10);
        assert!(rim.0[2] > 0 && rim != WHITE);
    }
}
