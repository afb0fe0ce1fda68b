// Camera: smoothed zoom plus the world↔screen transform.
//
// The camera follows one world position (the local avatar) and keeps it at
// the exact center of the viewport at every zoom level. Transform order is
// fixed: translate by the camera offset first, then scale around the viewport
// center. `screen_to_world` is the exact algebraic inverse of
// `world_to_screen`, and exists for one purpose only — turning the viewport
// corners into the visible world rectangle that drives chunk/tile culling.
// Entity positions always flow forward (world → screen); inverting them
// per-entity would just reintroduce rounding drift.
//
// Zoom is double-buffered: `set_target_zoom` clamps and stores the desired
// value, and `tick` moves the effective zoom 10% of the remaining distance
// each frame. That converges smoothly and can never overshoot, so the
// [MIN_ZOOM, MAX_ZOOM] invariant holds for both fields at all times.

use aldervale_protocol::Position;
use serde::{Deserialize, Serialize};

pub const MIN_ZOOM: f32 = 0.5;
pub const MAX_ZOOM: f32 = 2.0;
/// Fraction of the remaining zoom distance covered per tick.
const ZOOM_SMOOTHING: f32 = 0.1;

/// An axis-aligned rectangle in world units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldRect {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl WorldRect {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Grow the rect by `margin` on every side.
    pub fn expanded(&self, margin: f32) -> Self {
        Self {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }
}

/// One client view's camera. Owned and ticked by the frame loop; never shared
/// across threads.
#[derive(Clone, Debug)]
pub struct Camera {
    zoom: f32,
    target_zoom: f32,
    pub viewport_w: f32,
    pub viewport_h: f32,
    followed: Position,
}

impl Camera {
    pub fn new(viewport_w: f32, viewport_h: f32) -> Self {
        Self {
            zoom: 1.0,
            target_zoom: 1.0,
            viewport_w,
            viewport_h,
            followed: Position::new(0.0, 0.0),
        }
    }

    /// Effective zoom applied by the transforms this frame.
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Zoom the camera is easing toward.
    pub fn target_zoom(&self) -> f32 {
        self.target_zoom
    }

    /// Set the desired zoom, clamped to [MIN_ZOOM, MAX_ZOOM].
    pub fn set_target_zoom(&mut self, z: f32) {
        self.target_zoom = z.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Nudge the desired zoom, e.g. ±0.1 per mouse-wheel notch.
    pub fn adjust_target_zoom(&mut self, delta: f32) {
        self.set_target_zoom(self.target_zoom + delta);
    }

    /// Advance the zoom easing by one frame.
    pub fn tick(&mut self) {
        self.zoom += (self.target_zoom - self.zoom) * ZOOM_SMOOTHING;
    }

    /// Center the view on a world position.
    pub fn follow(&mut self, pos: Position) {
        self.followed = pos;
    }

    /// Translation that puts the followed position at the viewport center.
    fn offset(&self) -> (f32, f32) {
        (
            self.viewport_w / 2.0 - self.followed.x,
            self.viewport_h / 2.0 - self.followed.y,
        )
    }

    /// World units → screen units: translate by the offset, then scale around
    /// the viewport center.
    pub fn world_to_screen(&self, x: f32, y: f32) -> (f32, f32) {
        let (ox, oy) = self.offset();
        let cx = self.viewport_w / 2.0;
        let cy = self.viewport_h / 2.0;
        ((x + ox - cx) * self.zoom + cx, (y + oy - cy) * self.zoom + cy)
    }

    /// Exact inverse of `world_to_screen`. Used only to derive the visible
    /// world rectangle — see the module header.
    pub fn screen_to_world(&self, sx: f32, sy: f32) -> (f32, f32) {
        let (ox, oy) = self.offset();
        let cx = self.viewport_w / 2.0;
        let cy = self.viewport_h / 2.0;
        ((sx - cx) / self.zoom + cx - ox, (sy - cy) / self.zoom + cy - oy)
    }

    /// World-space rectangle currently covered by the viewport.
    pub fn visible_world_rect(&self) -> WorldRect {
        let (min_x, min_y) = self.screen_to_world(0.0, 0.0);
        let (max_x, max_y) = self.screen_to_world(self.viewport_w, self.viewport_h);
        WorldRect {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Run the easing long enough to settle on the target.
    fn settle(camera: &mut Camera) {
        for _ in 0..400 {
            camera.tick();
        }
    }

    #[test]
    fn target_zoom_clamps_high() {
        let mut camera = Camera::new(800.0, 600.0);
        camera.set_target_zoom(5.0);
        assert_eq!(camera.target_zoom(), 2.0);
    }

    #[test]
    fn target_zoom_clamps_low() {
        let mut camera = Camera::new(800.0, 600.0);
        camera.set_target_zoom(-1.0);
        assert_eq!(camera.target_zoom(), 0.5);
    }

    #[test]
    fn wheel_steps_accumulate_and_clamp() {
        let mut camera = Camera::new(800.0, 600.0);
        for _ in 0..20 {
            camera.adjust_target_zoom(0.1);
        }
        assert_eq!(camera.target_zoom(), 2.0);
        for _ in 0..40 {
            camera.adjust_target_zoom(-0.1);
        }
        assert_eq!(camera.target_zoom(), 0.5);
    }

    #[test]
    fn tick_converges_monotonically_without_overshoot() {
        let mut camera = Camera::new(800.0, 600.0);
        camera.set_target_zoom(2.0);
        let mut prev = camera.zoom();
        for _ in 0..200 {
            camera.tick();
            assert!(camera.zoom() >= prev, "zoom moved away from target");
            assert!(camera.zoom() <= 2.0, "zoom overshot target");
            prev = camera.zoom();
        }
        assert!((camera.zoom() - 2.0).abs() < 1e-3);

        camera.set_target_zoom(0.5);
        let mut prev = camera.zoom();
        for _ in 0..200 {
            camera.tick();
            assert!(camera.zoom() <= prev, "zoom moved away from target");
            assert!(camera.zoom() >= 0.5, "zoom overshot target");
            prev = camera.zoom();
        }
        assert!((camera.zoom() - 0.5).abs() < 1e-3);
    }

    #[test]
    fn followed_position_maps_to_viewport_center() {
        let mut camera = Camera::new(800.0, 600.0);
        camera.follow(Position::new(400.0, 300.0));
        assert_eq!(camera.world_to_screen(400.0, 300.0), (400.0, 300.0));

        // Exact at any zoom, not just 1.0.
        camera.set_target_zoom(1.7);
        settle(&mut camera);
        camera.follow(Position::new(-5_000.0, 12_345.0));
        let (sx, sy) = camera.world_to_screen(-5_000.0, 12_345.0);
        assert!((sx - 400.0).abs() < 1e-3);
        assert!((sy - 300.0).abs() < 1e-3);
    }

    #[test]
    fn screen_to_world_inverts_world_to_screen() {
        let mut camera = Camera::new(800.0, 600.0);
        camera.follow(Position::new(123.0, -456.0));
        camera.set_target_zoom(1.37);
        settle(&mut camera);
        for &(x, y) in &[(0.0, 0.0), (64.0, 64.0), (-321.5, 900.25), (123.0, -456.0)] {
            let (sx, sy) = camera.world_to_screen(x, y);
            let (wx, wy) = camera.screen_to_world(sx, sy);
            assert!((wx - x).abs() < 1e-2, "x did not invert: {x} vs {wx}");
            assert!((wy - y).abs() < 1e-2, "y did not invert: {y} vs {wy}");
        }
    }

    #[test]
    fn visible_rect_shrinks_as_zoom_grows() {
        let mut camera = Camera::new(800.0, 600.0);
        camera.follow(Position::new(0.0, 0.0));
        let at_one = camera.visible_world_rect();
        assert!((at_one.max_x - at_one.min_x - 800.0).abs() < 1e-3);

        camera.set_target_zoom(2.0);
        settle(&mut camera);
        let at_two = camera.visible_world_rect();
        let width = at_two.max_x - at_two.min_x;
        assert!((width - 400.0).abs() < 0.5, "rect width at 2x: {width}");
        // Still centered on the followed position.
        let mid_x = (at_two.min_x + at_two.max_x) / 2.0;
        assert!(mid_x.abs() < 0.5);
    }

    #[test]
    fn rect_expansion_and_containment() {
        let rect = WorldRect {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 10.0,
            max_y: 10.0,
        };
        assert!(rect.contains(0.0, 10.0));
        assert!(!rect.contains(-0.1, 5.0));
        let grown = rect.expanded(2.0);
        assert!(grown.contains(-2.0, 12.0));
        assert!(!grown.contains(-2.1, 5.0));
    }
}
