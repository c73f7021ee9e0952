//! Paint geometry of the fog of war mask.
//!
//! Both shapes work in continuous pixel space: the mapped center is
//! `(u * size, v * size)` and a pixel `(x, y)` is sampled at `(x + 0.5, y + 0.5)`.
//! A circle of pixel radius 1 centered on a pixel corner therefore covers the
//! four pixels around that corner.

use crate::buffer::PixelAlphaBuffer;
use crate::settings::{ALPHA_VISIBLE, WorldMapping};
use crate::transition::{Restore, ScheduleOutcome, TransitionPool, TransitionRequest};
use bevy::math::{UVec2, Vec2, Vec3};

/// Keeps the falloff division finite when smoothness is zero.
const SMOOTHNESS_EPSILON: f32 = 0.0001;

/// Converts a normalized alpha in `[0, 1]` to a mask byte.
pub fn alpha_to_byte(alpha: f32) -> u8 {
    (alpha.clamp(0.0, 1.0) * 255.0) as u8
}

/// Circular paint around a world position.
/// 以世界坐标为中心的圆形绘制
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CirclePaint {
    pub center: Vec3,
    /// World radius, converted to pixels with the Z scale of the mapping.
    pub radius: f32,
    /// Alpha to move toward, in `[0, 1]`.
    pub target_alpha: f32,
    /// When false the current alpha is ignored and `255` is used as the baseline.
    pub blend: bool,
    /// Seconds to animate the change; `0` writes immediately.
    pub duration: f32,
    pub smoothness: f32,
    pub restore_delay: f32,
    pub restore_duration: f32,
}

impl CirclePaint {
    /// Instant, hard-edged, non-blended paint without regrowth.
    pub fn new(center: Vec3, radius: f32, target_alpha: f32) -> Self {
        Self {
            center,
            radius,
            target_alpha,
            blend: false,
            duration: 0.0,
            smoothness: 0.0,
            restore_delay: 0.0,
            restore_duration: 0.0,
        }
    }
}

/// Rectangular paint with independent soft edges on X and Z.
/// X 与 Z 方向独立软边的矩形绘制
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionPaint {
    pub center: Vec3,
    /// Half size of the region; only X and Z are used.
    pub extents: Vec3,
    pub target_alpha: f32,
    pub blend: bool,
    pub duration: f32,
    pub smoothness: f32,
    pub restore_delay: f32,
    pub restore_duration: f32,
}

impl RegionPaint {
    /// Instant, hard-edged, non-blended paint without regrowth.
    pub fn new(center: Vec3, extents: Vec3, target_alpha: f32) -> Self {
        Self {
            center,
            extents,
            target_alpha,
            blend: false,
            duration: 0.0,
            smoothness: 0.0,
            restore_delay: 0.0,
            restore_duration: 0.0,
        }
    }
}

/// Shared scheduling parameters of both paint shapes.
struct Stroke {
    target: u8,
    blend: bool,
    duration: f32,
    restore: Restore,
}

/// Applies paint operations to a buffer and its transition pool.
/// 将绘制操作应用到缓冲区及其过渡池
///
/// Borrowed for the duration of one operation; `now` is the time recorded on
/// any transition it schedules.
pub struct RevealEngine<'a> {
    pub buffer: &'a mut PixelAlphaBuffer,
    pub pool: &'a mut TransitionPool,
    pub mapping: &'a WorldMapping,
    pub now: f32,
}

/// Pixel-space center of `world_pos`, or `None` when it lies outside the mask.
fn pixel_center(mapping: &WorldMapping, world_pos: Vec3, size: u32) -> Option<Vec2> {
    mapping
        .normalized_within(world_pos)
        .map(|uv| uv * size as f32)
}

/// Pixel rows (or columns) whose centers may lie within `radius` of `center`.
fn pixel_span(center: f32, radius: f32, size: u32) -> std::ops::Range<u32> {
    let start = (center - radius - 0.5).floor().max(0.0) as u32;
    let end = ((center + radius - 0.5).ceil() + 1.0).clamp(0.0, size as f32) as u32;
    start..end
}

fn falloff(term: f32) -> f32 {
    1.0 - term.clamp(0.0, 1.0)
}

impl RevealEngine<'_> {
    /// Paints a circle. Returns how many pixels were written or scheduled;
    /// timed pixels dropped by a full pool are not counted.
    /// 绘制圆形，返回写入或调度的像素数量
    pub fn paint_circle(&mut self, paint: &CirclePaint) -> usize {
        let size = self.buffer.size();
        let Some(center) = pixel_center(self.mapping, paint.center, size) else {
            return 0;
        };
        let radius = self.mapping.z_length_to_pixels(paint.radius, size);
        if !(radius > 0.0) {
            return 0;
        }
        let radius_sq = radius * radius;
        let smoothness = SMOOTHNESS_EPSILON + paint.smoothness.max(0.0);
        let stroke = Stroke {
            target: alpha_to_byte(paint.target_alpha),
            blend: paint.blend,
            duration: paint.duration,
            restore: Restore {
                delay: paint.restore_delay,
                duration: paint.restore_duration,
            },
        };

        let mut affected = 0;
        for y in pixel_span(center.y, radius, size) {
            for x in pixel_span(center.x, radius, size) {
                let offset = Vec2::new(x as f32 + 0.5, y as f32 + 0.5) - center;
                let dist_sq = offset.length_squared();
                if dist_sq > radius_sq {
                    continue;
                }
                let weight = falloff((1.0 - dist_sq / radius_sq) / smoothness);
                if self.stroke_pixel(UVec2::new(x, y), weight, &stroke) {
                    affected += 1;
                }
            }
        }
        affected
    }

    /// Paints a rectangle whose edges soften independently along X and Z.
    /// 绘制 X 与 Z 方向独立软化的矩形
    ///
    /// Each axis contributes a falloff term scaled by the aspect ratio of the
    /// region; the smaller term wins, so a pixel is fully painted only when it
    /// is deep inside the region on both axes.
    pub fn paint_region(&mut self, paint: &RegionPaint) -> usize {
        let size = self.buffer.size();
        let Some(center) = pixel_center(self.mapping, paint.center, size) else {
            return 0;
        };
        let radius_x = self.mapping.x_length_to_pixels(paint.extents.x, size);
        let radius_z = self.mapping.z_length_to_pixels(paint.extents.z, size);
        if !(radius_x > 0.0 && radius_z > 0.0) {
            return 0;
        }
        let (aspect_x, aspect_z) = if radius_x > radius_z {
            (radius_x / radius_z, 1.0)
        } else {
            (1.0, radius_z / radius_x)
        };
        let radius_x_sq = radius_x * radius_x;
        let radius_z_sq = radius_z * radius_z;
        let smoothness = SMOOTHNESS_EPSILON + paint.smoothness.max(0.0);
        let stroke = Stroke {
            target: alpha_to_byte(paint.target_alpha),
            blend: paint.blend,
            duration: paint.duration,
            restore: Restore {
                delay: paint.restore_delay,
                duration: paint.restore_duration,
            },
        };

        let mut affected = 0;
        for y in pixel_span(center.y, radius_z, size) {
            let dz = y as f32 + 0.5 - center.y;
            if dz.abs() > radius_z {
                continue;
            }
            let term_z = (1.0 - dz * dz / radius_z_sq) * aspect_z / smoothness;
            for x in pixel_span(center.x, radius_x, size) {
                let dx = x as f32 + 0.5 - center.x;
                if dx.abs() > radius_x {
                    continue;
                }
                let term_x = (1.0 - dx * dx / radius_x_sq) * aspect_x / smoothness;
                let weight = falloff(term_x.min(term_z));
                if self.stroke_pixel(UVec2::new(x, y), weight, &stroke) {
                    affected += 1;
                }
            }
        }
        affected
    }

    /// Resolves one pixel of a stroke and writes or schedules it.
    fn stroke_pixel(&mut self, coord: UVec2, weight: f32, stroke: &Stroke) -> bool {
        let baseline = if stroke.blend {
            self.buffer.get(coord.x, coord.y)
        } else {
            ALPHA_VISIBLE
        };
        let target = stroke.target as f32;
        let resolved = (target + (baseline as f32 - target) * weight) as u8;
        if resolved == baseline {
            return false;
        }

        if stroke.duration > 0.0 {
            let request = TransitionRequest {
                coord,
                initial_alpha: baseline,
                target_alpha: resolved,
                delay: 0.0,
                duration: stroke.duration,
                restore: Some(stroke.restore),
            };
            return self.pool.schedule(request, self.now) == ScheduleOutcome::Scheduled;
        }

        self.buffer.set(coord.x, coord.y, resolved);
        if stroke.restore.delay > 0.0 && resolved < ALPHA_VISIBLE {
            self.pool
                .schedule(TransitionRequest::restore(coord, resolved, stroke.restore), self.now);
        }
        true
    }

    /// Sets every pixel of the circle to fully visible at once.
    /// 立即将圆内所有像素设为完全可见
    pub fn clear_circle_full(&mut self, center: Vec3, radius: f32) -> usize {
        let size = self.buffer.size();
        let Some(center) = pixel_center(self.mapping, center, size) else {
            return 0;
        };
        let radius = self.mapping.z_length_to_pixels(radius, size);
        if !(radius > 0.0) {
            return 0;
        }
        let radius_sq = radius * radius;

        let mut affected = 0;
        for y in pixel_span(center.y, radius, size) {
            for x in pixel_span(center.x, radius, size) {
                let offset = Vec2::new(x as f32 + 0.5, y as f32 + 0.5) - center;
                if offset.length_squared() <= radius_sq {
                    self.buffer.set(x, y, ALPHA_VISIBLE);
                    affected += 1;
                }
            }
        }
        affected
    }

    /// Sets every pixel of the rectangle to fully visible at once.
    /// 立即将矩形内所有像素设为完全可见
    ///
    /// `extents` holds the half size on X and Z.
    pub fn clear_region_full(&mut self, center: Vec3, extents: Vec2) -> usize {
        let size = self.buffer.size();
        let Some(center) = pixel_center(self.mapping, center, size) else {
            return 0;
        };
        let radius_x = self.mapping.x_length_to_pixels(extents.x, size);
        let radius_z = self.mapping.z_length_to_pixels(extents.y, size);
        if !(radius_x > 0.0 && radius_z > 0.0) {
            return 0;
        }

        let mut affected = 0;
        for y in pixel_span(center.y, radius_z, size) {
            if (y as f32 + 0.5 - center.y).abs() > radius_z {
                continue;
            }
            for x in pixel_span(center.x, radius_x, size) {
                if (x as f32 + 0.5 - center.x).abs() <= radius_x {
                    self.buffer.set(x, y, ALPHA_VISIBLE);
                    affected += 1;
                }
            }
        }
        affected
    }
}

/// Alpha in `[0, 1]` at a world position; `1.0` on or outside the mask edge.
/// 世界坐标处的透明度；位于边缘或外部时为 1.0
pub fn query_alpha(buffer: &PixelAlphaBuffer, mapping: &WorldMapping, world_pos: Vec3) -> f32 {
    let uv = mapping.world_to_normalized(world_pos);
    let inside = uv.x > 0.0 && uv.x < 1.0 && uv.y > 0.0 && uv.y < 1.0;
    if !inside {
        return 1.0;
    }
    let size = buffer.size() as f32;
    let x = (uv.x * size) as u32;
    let y = (uv.y * size) as u32;
    buffer.get(x, y) as f32 / 255.0
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canvas {
        buffer: PixelAlphaBuffer,
        pool: TransitionPool,
        mapping: WorldMapping,
    }

    impl Canvas {
        /// A `size × size` mask covering `world × world` units around the origin.
        fn new(size: u32, world: f32) -> Self {
            Self {
                buffer: PixelAlphaBuffer::new(size).unwrap(),
                pool: TransitionPool::default(),
                mapping: WorldMapping::new(Vec3::ZERO, Vec3::new(world, 0.0, world)).unwrap(),
            }
        }

        fn engine(&mut self, now: f32) -> RevealEngine<'_> {
            RevealEngine {
                buffer: &mut self.buffer,
                pool: &mut self.pool,
                mapping: &self.mapping,
                now,
            }
        }
    }

    #[test]
    fn four_by_four_example_clears_central_block() {
        let mut canvas = Canvas::new(4, 4.0);
        let affected = canvas
            .engine(0.0)
            .paint_circle(&CirclePaint::new(Vec3::ZERO, 1.0, 0.0));
        assert_eq!(affected, 4);
        for (x, y) in [(1, 1), (1, 2), (2, 1), (2, 2)] {
            assert_eq!(canvas.buffer.get(x, y), 0, "pixel ({x}, {y})");
        }
        for (x, y) in [(0, 0), (3, 0), (0, 3), (3, 3), (0, 1), (2, 3)] {
            assert_eq!(canvas.buffer.get(x, y), ALPHA_VISIBLE, "pixel ({x}, {y})");
        }
        assert_eq!(query_alpha(&canvas.buffer, &canvas.mapping, Vec3::ZERO), 0.0);
    }

    #[test]
    fn hard_edge_paint_only_touches_pixels_inside_radius() {
        let mut canvas = Canvas::new(32, 32.0);
        let center = Vec3::new(0.25, 0.0, -3.75);
        canvas
            .engine(0.0)
            .paint_circle(&CirclePaint::new(center, 5.0, 0.0));

        let pixel_center = Vec2::new(16.25, 12.25);
        for y in 0..32 {
            for x in 0..32 {
                let dist_sq = (Vec2::new(x as f32 + 0.5, y as f32 + 0.5) - pixel_center)
                    .length_squared();
                let expected = if dist_sq < 25.0 { 0 } else { ALPHA_VISIBLE };
                assert_eq!(canvas.buffer.get(x, y), expected, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn smooth_paint_fades_toward_edge() {
        let mut canvas = Canvas::new(64, 64.0);
        let paint = CirclePaint {
            smoothness: 1.0,
            ..CirclePaint::new(Vec3::ZERO, 16.0, 0.0)
        };
        canvas.engine(0.0).paint_circle(&paint);

        let inner = canvas.buffer.get(32, 32);
        let middle = canvas.buffer.get(32 + 8, 32);
        let outer = canvas.buffer.get(32 + 14, 32);
        assert!(inner < middle && middle < outer, "{inner} {middle} {outer}");
        assert!(outer < ALPHA_VISIBLE);
        assert_eq!(canvas.buffer.get(32 + 17, 32), ALPHA_VISIBLE);
    }

    #[test]
    fn blending_keeps_existing_fog() {
        let mut canvas = Canvas::new(16, 16.0);
        canvas.buffer.reset(100);

        let overwrite = CirclePaint::new(Vec3::ZERO, 2.0, 0.5);
        canvas.engine(0.0).paint_circle(&overwrite);
        // Baseline 255 blended toward 127 with a hard edge: 127.
        assert_eq!(canvas.buffer.get(8, 8), 127);

        canvas.buffer.reset(100);
        let blended = CirclePaint {
            blend: true,
            smoothness: 1.0,
            ..overwrite
        };
        canvas.engine(0.0).paint_circle(&blended);
        let value = canvas.buffer.get(8, 8);
        assert!(value > 100 && value <= 127, "{value}");
    }

    #[test]
    fn outside_center_is_a_full_no_op() {
        let mut canvas = Canvas::new(16, 16.0);
        let mut engine = canvas.engine(0.0);
        assert_eq!(
            engine.paint_circle(&CirclePaint::new(Vec3::new(8.5, 0.0, 0.0), 4.0, 0.0)),
            0
        );
        assert_eq!(
            engine.paint_region(&RegionPaint::new(Vec3::new(0.0, 0.0, -9.0), Vec3::ONE, 0.0)),
            0
        );
        assert_eq!(engine.paint_circle(&CirclePaint::new(Vec3::ZERO, 0.0, 0.0)), 0);
        assert_eq!(engine.paint_circle(&CirclePaint::new(Vec3::ZERO, -1.0, 0.0)), 0);
        assert!(canvas.buffer.as_bytes().iter().all(|&a| a == ALPHA_VISIBLE));
    }

    #[test]
    fn timed_paint_schedules_instead_of_writing() {
        let mut canvas = Canvas::new(8, 8.0);
        let paint = CirclePaint {
            duration: 1.0,
            ..CirclePaint::new(Vec3::ZERO, 1.0, 0.0)
        };
        let scheduled = canvas.engine(3.0).paint_circle(&paint);
        assert_eq!(scheduled, 4);
        assert!(canvas.buffer.as_bytes().iter().all(|&a| a == ALPHA_VISIBLE));
        assert_eq!(canvas.pool.active_count(), 4);
        assert!(canvas.pool.slots().iter().all(|slot| slot.start_time == 3.0));
    }

    #[test]
    fn instant_paint_with_restore_schedules_regrowth() {
        let mut canvas = Canvas::new(8, 8.0);
        let paint = CirclePaint {
            restore_delay: 2.0,
            restore_duration: 1.0,
            ..CirclePaint::new(Vec3::ZERO, 1.0, 0.0)
        };
        canvas.engine(0.0).paint_circle(&paint);
        assert_eq!(canvas.buffer.get(4, 4), 0);
        assert_eq!(canvas.pool.active_count(), 4);
        let slot = &canvas.pool.slots()[0];
        assert_eq!((slot.initial_alpha, slot.target_alpha), (0, ALPHA_VISIBLE));
        assert_eq!(slot.delay, 2.0);
    }

    #[test]
    fn region_paint_covers_rectangle() {
        let mut canvas = Canvas::new(16, 16.0);
        let affected = canvas.engine(0.0).paint_region(&RegionPaint::new(
            Vec3::ZERO,
            Vec3::new(4.0, 0.0, 2.0),
            0.0,
        ));
        // Pixel centers within 4 of x = 8 and within 2 of y = 8, strictly inside.
        assert_eq!(affected, 8 * 4);
        assert_eq!(canvas.buffer.get(4, 6), 0);
        assert_eq!(canvas.buffer.get(11, 9), 0);
        assert_eq!(canvas.buffer.get(3, 8), ALPHA_VISIBLE);
        assert_eq!(canvas.buffer.get(8, 5), ALPHA_VISIBLE);
        assert_eq!(canvas.buffer.get(8, 10), ALPHA_VISIBLE);
    }

    #[test]
    fn huge_radius_reveals_instead_of_fogging() {
        let mut canvas = Canvas::new(4, 4.0);
        canvas.buffer.reset(100);
        let paint = CirclePaint {
            blend: true,
            ..CirclePaint::new(Vec3::ZERO, 1e20, 1.0)
        };
        assert_eq!(canvas.engine(0.0).paint_circle(&paint), 16);
        assert!(canvas.buffer.as_bytes().iter().all(|&a| a == ALPHA_VISIBLE));

        canvas.buffer.reset(100);
        let region = RegionPaint {
            blend: true,
            ..RegionPaint::new(Vec3::ZERO, Vec3::new(1e20, 0.0, 1e20), 1.0)
        };
        assert_eq!(canvas.engine(0.0).paint_region(&region), 16);
        assert!(canvas.buffer.as_bytes().iter().all(|&a| a == ALPHA_VISIBLE));
    }

    #[test]
    fn region_falloff_takes_the_smaller_aspect_scaled_term() {
        let mut canvas = Canvas::new(16, 16.0);
        let paint = RegionPaint {
            smoothness: 1.0,
            ..RegionPaint::new(Vec3::ZERO, Vec3::new(6.0, 0.0, 2.0), 0.0)
        };
        canvas.engine(0.0).paint_region(&paint);

        // Extents 6 × 2 pixels: the X term is scaled by 3, the Z term by 1.
        let smoothness = SMOOTHNESS_EPSILON + 1.0;
        let expected = |dx: f32, dz: f32| {
            let term_x = (1.0 - dx * dx / 36.0) * 3.0 / smoothness;
            let term_z = (1.0 - dz * dz / 4.0) / smoothness;
            (255.0 * falloff(term_x.min(term_z))) as u8
        };
        assert_eq!(expected(0.5, 0.5), 15);
        assert_eq!(canvas.buffer.get(8, 8), 15);
        assert_eq!(canvas.buffer.get(8, 9), expected(0.5, 1.5));
        assert_eq!(canvas.buffer.get(8, 9), 143);
        // Far along X the scaled X term decides; unscaled it would give 214.
        assert_eq!(canvas.buffer.get(13, 8), expected(5.5, 0.5));
        assert_eq!(canvas.buffer.get(13, 8), 132);
        // At dx = 4.5 the scaled X term still exceeds the Z term.
        assert_eq!(canvas.buffer.get(12, 8), 15);
    }

    #[test]
    fn paint_resolving_to_the_baseline_is_skipped() {
        let mut canvas = Canvas::new(8, 8.0);
        canvas.buffer.take_dirty();

        let reveal = CirclePaint::new(Vec3::ZERO, 2.0, 1.0);
        assert_eq!(canvas.engine(0.0).paint_circle(&reveal), 0);
        let timed = CirclePaint {
            duration: 1.0,
            restore_delay: 1.0,
            ..reveal
        };
        assert_eq!(canvas.engine(0.0).paint_circle(&timed), 0);

        assert_eq!(canvas.pool.active_count(), 0);
        assert!(!canvas.buffer.take_dirty());
    }

    #[test]
    fn region_with_flat_extent_paints_nothing() {
        let mut canvas = Canvas::new(16, 16.0);
        let paint = RegionPaint::new(Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0), 0.0);
        assert_eq!(canvas.engine(0.0).paint_region(&paint), 0);
    }

    #[test]
    fn clear_circle_full_is_idempotent() {
        let mut canvas = Canvas::new(16, 16.0);
        canvas.buffer.reset(0);
        let center = Vec3::new(1.0, 0.0, 1.0);

        canvas.engine(0.0).clear_circle_full(center, 3.0);
        let once = canvas.buffer.clone();
        canvas.engine(0.0).clear_circle_full(center, 3.0);
        assert_eq!(canvas.buffer.as_bytes(), once.as_bytes());
        assert_eq!(canvas.buffer.get(9, 9), ALPHA_VISIBLE);
        assert_eq!(canvas.buffer.get(0, 0), 0);
        assert_eq!(canvas.pool.active_count(), 0);
    }

    #[test]
    fn clear_region_full_ignores_pending_state() {
        let mut canvas = Canvas::new(16, 16.0);
        canvas.buffer.reset(0);
        let affected = canvas
            .engine(0.0)
            .clear_region_full(Vec3::ZERO, Vec2::new(2.0, 1.0));
        assert_eq!(affected, 4 * 2);
        assert_eq!(canvas.buffer.get(6, 7), ALPHA_VISIBLE);
        assert_eq!(canvas.buffer.get(9, 8), ALPHA_VISIBLE);
        assert_eq!(canvas.buffer.get(8, 9), 0);
    }

    #[test]
    fn query_returns_visible_on_and_outside_edge() {
        let mut canvas = Canvas::new(4, 4.0);
        canvas.buffer.reset(0);
        let query = |pos: Vec3| query_alpha(&canvas.buffer, &canvas.mapping, pos);
        assert_eq!(query(Vec3::new(-2.0, 0.0, 0.0)), 1.0);
        assert_eq!(query(Vec3::new(2.0, 0.0, 0.0)), 1.0);
        assert_eq!(query(Vec3::new(0.0, 0.0, 2.0)), 1.0);
        assert_eq!(query(Vec3::new(50.0, 0.0, -50.0)), 1.0);
        assert_eq!(query(Vec3::new(1.99, 0.0, -1.99)), 0.0);
    }
}
