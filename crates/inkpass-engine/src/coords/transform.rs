use super::{Affine, Rect, Vec2, Viewport};

/// Zoom range accepted by the transform. Out-of-range values are clamped.
pub const MIN_ZOOM: f32 = 0.05;
pub const MAX_ZOOM: f32 = 32.0;

/// Points within this many pixels outside the canvas still count as visible.
const EDGE_MARGIN: f32 = 1.0;

/// Interior parameters sampled when deciding whether to cull a segment whose
/// endpoints are both outside.
const SEGMENT_SAMPLES: [f32; 4] = [0.2, 0.4, 0.6, 0.8];

/// Direction components smaller than this cannot be projected along.
const DEGENERATE_DIR: f32 = 1e-6;

/// Workspace ↔ canvas mapping derived from a [`Viewport`].
///
/// `world_to_screen(p) = (p - scroll) * zoom + size / 2`, i.e. the scroll
/// offset is the workspace point shown at the canvas center.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CoordinateTransform {
    size: Vec2,
    half: Vec2,
    scroll: Vec2,
    zoom: f32,
}

impl CoordinateTransform {
    pub fn new(viewport: &Viewport) -> Self {
        let zoom = if viewport.zoom.is_finite() {
            viewport.zoom.clamp(MIN_ZOOM, MAX_ZOOM)
        } else {
            1.0
        };
        let size = Vec2::new(viewport.width.max(0.0), viewport.height.max(0.0));
        Self {
            size,
            half: size * 0.5,
            scroll: viewport.scroll,
            zoom,
        }
    }

    /// Effective (clamped) zoom.
    #[inline]
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    #[inline]
    pub fn world_to_screen(&self, p: Vec2) -> Vec2 {
        (p - self.scroll) * self.zoom + self.half
    }

    #[inline]
    pub fn screen_to_world(&self, p: Vec2) -> Vec2 {
        (p - self.half) / self.zoom + self.scroll
    }

    /// Applies `matrix` to a drawable-local point, then maps it to the canvas.
    #[inline]
    pub fn local_to_screen(&self, local: Vec2, matrix: &Affine) -> Vec2 {
        self.world_to_screen(matrix.apply(local))
    }

    /// Canvas rectangle in screen pixels.
    #[inline]
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.size.x, self.size.y)
    }

    /// `true` when `p` is more than one pixel outside the canvas (NaN counts as outside).
    #[inline]
    pub fn is_outside_viewport(&self, p: Vec2) -> bool {
        !self.bounds().inflate(EDGE_MARGIN).contains_closed(p)
    }

    /// Sampled culling test for a screen-space segment.
    ///
    /// A segment is culled only when both endpoints and every interior sample
    /// are outside. This is an approximation: a segment that enters the canvas
    /// strictly between two samples is culled even though part of it is visible.
    pub fn is_segment_culled(&self, a: Vec2, b: Vec2) -> bool {
        if !self.is_outside_viewport(a) || !self.is_outside_viewport(b) {
            return false;
        }
        SEGMENT_SAMPLES
            .iter()
            .all(|&t| self.is_outside_viewport(a.lerp(b, t)))
    }

    /// Culls or trims a screen-space segment.
    ///
    /// Returns `None` when the segment is culled. Otherwise each outside
    /// endpoint is pulled onto the canvas boundary along the segment; an
    /// endpoint that cannot be projected is kept as-is and left to the GPU
    /// clipper.
    pub fn clip_segment(&self, a: Vec2, b: Vec2) -> Option<(Vec2, Vec2)> {
        if self.is_segment_culled(a, b) {
            return None;
        }
        let a2 = self.clip_point_to_viewport(a, b).unwrap_or(a);
        let b2 = self.clip_point_to_viewport(b, a).unwrap_or(b);
        Some((a2, b2))
    }

    /// Moves `target` back onto the canvas boundary along the line from `base`.
    ///
    /// Points already inside are returned unchanged. When both axes are out of
    /// range the smaller parametric step wins, so the result lies on the
    /// boundary rather than beyond it. Returns `None` when the direction
    /// needed for an out-of-range axis is degenerate; callers must treat the
    /// point as not drawable.
    pub fn clip_point_to_viewport(&self, target: Vec2, base: Vec2) -> Option<Vec2> {
        if !self.is_outside_viewport(target) {
            return Some(target);
        }
        let dir = target - base;
        let tx = axis_param(base.x, dir.x, target.x, self.size.x)?;
        let ty = axis_param(base.y, dir.y, target.y, self.size.y)?;

        let t = match (tx, ty) {
            (Some(tx), Some(ty)) => tx.min(ty),
            (Some(t), None) | (None, Some(t)) => t,
            // Outside only by NaN; nothing sensible to project.
            (None, None) => return None,
        };
        if !t.is_finite() {
            return None;
        }
        Some(base + dir * t)
    }
}

/// Parameter along `base + dir * t` at which the axis re-enters `[0, extent]`.
///
/// `Some(None)`: the axis is already in range. `None`: the axis is out of
/// range but the direction along it is degenerate.
fn axis_param(base: f32, dir: f32, value: f32, extent: f32) -> Option<Option<f32>> {
    let edge = if value < 0.0 {
        0.0
    } else if value > extent {
        extent
    } else {
        return Some(None);
    };
    if dir.abs() < DEGENERATE_DIR {
        return None;
    }
    Some(Some((edge - base) / dir))
}
