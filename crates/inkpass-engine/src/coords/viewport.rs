use super::{Rect, Vec2};

/// Editor canvas viewport, pushed by the host once per frame.
///
/// - `width`/`height`: canvas size in device pixels
/// - `scroll`: workspace point shown at the canvas center
/// - `zoom`: device pixels per workspace unit
/// - `origin`: top-left of the canvas inside the host's full drawable area
/// - `full_area`: size of the host's full drawable area (device pixels)
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub scroll: Vec2,
    pub zoom: f32,
    pub origin: Vec2,
    pub full_area: Vec2,
}

impl Viewport {
    /// Canvas filling the whole host area, no scroll, zoom 1.
    #[inline]
    pub const fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            scroll: Vec2::zero(),
            zoom: 1.0,
            origin: Vec2::zero(),
            full_area: Vec2::new(width, height),
        }
    }

    #[inline]
    pub const fn with_scroll(mut self, scroll: Vec2) -> Self {
        self.scroll = scroll;
        self
    }

    #[inline]
    pub const fn with_zoom(mut self, zoom: f32) -> Self {
        self.zoom = zoom;
        self
    }

    /// Places the canvas at `origin` inside a host area of `full_area` pixels.
    #[inline]
    pub const fn with_placement(mut self, origin: Vec2, full_area: Vec2) -> Self {
        self.origin = origin;
        self.full_area = full_area;
        self
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }

    /// Canvas bounds in its own device pixels: `[0, width] × [0, height]`.
    #[inline]
    pub fn bounds(self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    /// Canvas placement expressed as a fraction of the host area.
    ///
    /// Falls back to [`Rect::UNIT`] when the host area is degenerate.
    pub fn normalized_clip_rect(self) -> Rect {
        let fw = self.full_area.x;
        let fh = self.full_area.y;
        if !(fw > 0.0 && fh > 0.0 && fw.is_finite() && fh.is_finite()) {
            return Rect::UNIT;
        }
        Rect::new(
            self.origin.x / fw,
            self.origin.y / fh,
            self.width / fw,
            self.height / fh,
        )
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}
