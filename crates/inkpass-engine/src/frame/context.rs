use core::ops::{Deref, DerefMut};
use std::time::Instant;

use crate::coords::{Affine, CoordinateTransform, Vec2, Viewport};
use crate::paint::Color;
use crate::render::mask::{
    ClipChain, MASK_CHANNELS, MaskChannel, MaskCompositor, MaskPoolConfig, MaskSource,
    MaskTargetId, MaskedSource,
};
use crate::render::{
    ImageHandle, PassBackend, PassBatcher, PassKey, PassVertex, Skip, Tolerances, Topology,
};

use super::TransientState;

/// Construction parameters for a [`DrawContext`].
#[derive(Debug, Clone, Default)]
pub struct DrawConfig {
    pub tolerances: Tolerances,
    pub mask_pool: MaskPoolConfig,
}

/// Coordinate space of submitted vertex positions.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Space {
    /// Canvas pixels.
    Screen,
    /// Workspace units, mapped through scroll and zoom.
    World,
    /// Drawable-local units, mapped through the affine and then as `World`.
    Local(Affine),
}

/// Caller-side vertex: position in the geometry's [`Space`], uv, premultiplied color.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Vertex {
    pub pos: Vec2,
    pub uv: Vec2,
    pub color: Color,
}

impl Vertex {
    #[inline]
    pub const fn new(pos: Vec2) -> Self {
        Self { pos, uv: Vec2::zero(), color: Color::WHITE }
    }

    #[inline]
    pub const fn with_uv(mut self, uv: Vec2) -> Self {
        self.uv = uv;
        self
    }

    #[inline]
    pub const fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }
}

#[derive(Debug, Copy, Clone)]
pub struct Geometry<'a> {
    pub topology: Topology,
    pub space: Space,
    pub vertices: &'a [Vertex],
}

impl<'a> Geometry<'a> {
    #[inline]
    pub fn screen(topology: Topology, vertices: &'a [Vertex]) -> Self {
        Self { topology, space: Space::Screen, vertices }
    }

    #[inline]
    pub fn world(topology: Topology, vertices: &'a [Vertex]) -> Self {
        Self { topology, space: Space::World, vertices }
    }

    #[inline]
    pub fn local(topology: Topology, matrix: Affine, vertices: &'a [Vertex]) -> Self {
        Self { topology, space: Space::Local(matrix), vertices }
    }
}

/// Everything a frame draws through: batcher, mask compositor, viewport
/// transform and transient per-frame state.
///
/// Owned by the host's frame callback and passed by `&mut`. Start each frame
/// with [`frame`](Self::frame); the returned guard closes it.
pub struct DrawContext<B> {
    compositor: MaskCompositor<B>,
    viewport: Viewport,
    transform: CoordinateTransform,
    transient: TransientState,
    scratch: Vec<PassVertex>,
}

impl<B: PassBackend> DrawContext<B> {
    pub fn new(backend: B, config: DrawConfig) -> Self {
        let batcher = PassBatcher::with_tolerances(backend, config.tolerances);
        let viewport = Viewport::default();
        Self {
            compositor: MaskCompositor::new(batcher, config.mask_pool),
            viewport,
            transform: CoordinateTransform::new(&viewport),
            transient: TransientState::new(Instant::now()),
            scratch: Vec::new(),
        }
    }

    #[inline]
    pub fn compositor(&self) -> &MaskCompositor<B> {
        &self.compositor
    }

    #[inline]
    pub fn compositor_mut(&mut self) -> &mut MaskCompositor<B> {
        &mut self.compositor
    }

    #[inline]
    pub fn batcher(&self) -> &PassBatcher<B> {
        self.compositor.batcher()
    }

    #[inline]
    pub fn batcher_mut(&mut self) -> &mut PassBatcher<B> {
        self.compositor.batcher_mut()
    }

    #[inline]
    pub fn backend(&self) -> &B {
        self.compositor.batcher().backend()
    }

    /// Flushes, then hands out the backend for host-side work.
    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        self.compositor.batcher_mut().host_backend()
    }

    #[inline]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[inline]
    pub fn transform(&self) -> &CoordinateTransform {
        &self.transform
    }

    #[inline]
    pub fn transient(&self) -> &TransientState {
        &self.transient
    }

    #[inline]
    pub fn transient_mut(&mut self) -> &mut TransientState {
        &mut self.transient
    }

    // ── viewport ──────────────────────────────────────────────────────────

    /// Recomputes the transform and pushes the canvas size and normalized clip rect.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        if !viewport.is_valid() {
            log::debug!("degenerate viewport {}×{}", viewport.width, viewport.height);
        }
        self.viewport = viewport;
        self.transform = CoordinateTransform::new(&viewport);
        let batcher = self.compositor.batcher_mut();
        batcher.set_canvas_size(Vec2::new(viewport.width, viewport.height));
        batcher.set_clip_rect(viewport.normalized_clip_rect());
    }

    /// Starts a frame with `viewport`.
    ///
    /// Dropping the returned guard flushes the open pass, unbinds any mask
    /// target and releases temporaries that were never released.
    pub fn frame(&mut self, viewport: Viewport) -> FrameScope<'_, B> {
        self.set_viewport(viewport);
        FrameScope { ctx: self }
    }

    fn finish_frame(&mut self) {
        self.compositor.batcher_mut().flush();
        self.compositor.deactivate();
        self.compositor.release_leaked();
    }

    #[inline]
    pub fn world_to_screen(&self, p: Vec2) -> Vec2 {
        self.transform.world_to_screen(p)
    }

    #[inline]
    pub fn screen_to_world(&self, p: Vec2) -> Vec2 {
        self.transform.screen_to_world(p)
    }

    /// Culls or trims a screen-space segment; see [`CoordinateTransform::clip_segment`].
    #[inline]
    pub fn clip_segment(&self, a: Vec2, b: Vec2) -> Option<(Vec2, Vec2)> {
        self.transform.clip_segment(a, b)
    }

    /// Substitutes `image` for the bound image of every later draw.
    pub fn set_texture_override(&mut self, image: Option<ImageHandle>) {
        self.compositor.set_texture_override(image);
    }

    /// Per-frame hook: drops queued cursor hints and advances animation timers.
    pub fn reset_transient_state(&mut self) {
        self.transient.reset_at(Instant::now());
    }

    // ── drawing ───────────────────────────────────────────────────────────

    /// Draws `geometry` to the output with `key`, merging into the open pass
    /// when compatible.
    pub fn draw(&mut self, geometry: &Geometry<'_>, key: PassKey) -> Result<(), Skip> {
        if geometry.vertices.len() < geometry.topology.min_vertices() {
            return Err(self.batcher_mut().note_skip(Skip::DegenerateGeometry));
        }
        let key = match self.compositor.texture_override() {
            Some(image) => key.with_image(image),
            None => key,
        };

        let mut scratch = std::mem::take(&mut self.scratch);
        let result = self.draw_resolved(geometry, key, &mut scratch);
        scratch.clear();
        self.scratch = scratch;
        result
    }

    fn draw_resolved(&mut self, geometry: &Geometry<'_>, key: PassKey, out: &mut Vec<PassVertex>) -> Result<(), Skip> {
        if let Err(skip) = resolve(&self.transform, geometry, out) {
            return Err(self.batcher_mut().note_skip(skip));
        }
        // Output draws cannot land in a mask target.
        self.compositor.deactivate();
        let batcher = self.compositor.batcher_mut();
        batcher.begin_pass(geometry.topology, key)?;
        batcher.append_vertices(out.as_slice());
        Ok(())
    }

    /// Draws a one-pixel workspace-space line.
    ///
    /// Lines that never cross the canvas are dropped and still return `Ok`.
    pub fn draw_line(&mut self, a: Vec2, b: Vec2, color: Color) -> Result<(), Skip> {
        let Some((p, q)) = self.screen_segment(a, b)? else {
            log::trace!("line {a:?}→{b:?} culled");
            return Ok(());
        };
        let vertices = [Vertex::new(p), Vertex::new(q)];
        self.draw(&Geometry::screen(Topology::Lines, &vertices), PassKey::Flat { tint: color })
    }

    /// Draws a workspace-space line `width` canvas pixels wide as two triangles.
    pub fn draw_thick_line(&mut self, a: Vec2, b: Vec2, width: f32, color: Color) -> Result<(), Skip> {
        let Some((p, q)) = self.screen_segment(a, b)? else {
            log::trace!("thick line {a:?}→{b:?} culled");
            return Ok(());
        };
        let d = q - p;
        let len = d.length();
        if !(len > f32::EPSILON) || !(width > 0.0) {
            return Err(self.batcher_mut().note_skip(Skip::DegenerateMath));
        }
        let n = Vec2::new(-d.y, d.x) * (width * 0.5 / len);
        let quad = [p + n, q + n, q - n, p + n, q - n, p - n].map(Vertex::new);
        self.draw(&Geometry::screen(Topology::Triangles, &quad), PassKey::Flat { tint: color })
    }

    fn screen_segment(&mut self, a: Vec2, b: Vec2) -> Result<Option<(Vec2, Vec2)>, Skip> {
        let sa = self.transform.world_to_screen(a);
        let sb = self.transform.world_to_screen(b);
        if !sa.is_finite() || !sb.is_finite() {
            return Err(self.batcher_mut().note_skip(Skip::DegenerateMath));
        }
        Ok(self.transform.clip_segment(sa, sb))
    }

    // ── masks ─────────────────────────────────────────────────────────────

    /// Checks out a temporary mask target for the life of the returned scope.
    pub fn lease_mask(&mut self, width: u32, height: u32) -> Result<MaskScope<'_, B>, Skip> {
        let id = self.compositor.acquire_temporary(width, height)?;
        Ok(MaskScope { ctx: self, id })
    }

    /// [`MaskCompositor::render_into_mask`] for geometry in any space.
    pub fn render_into_mask(
        &mut self,
        target: MaskTargetId,
        geometry: &Geometry<'_>,
        source: &MaskSource,
        alpha_only: bool,
        needs_clear: bool,
    ) -> Result<(), Skip> {
        let mut scratch = std::mem::take(&mut self.scratch);
        let result = match resolve(&self.transform, geometry, &mut scratch) {
            Ok(()) => self.compositor.render_into_mask(target, &scratch, source, alpha_only, needs_clear),
            Err(skip) => Err(self.batcher_mut().note_skip(skip)),
        };
        scratch.clear();
        self.scratch = scratch;
        result
    }

    /// [`MaskCompositor::render_with_received_masks`] for geometry in any space.
    pub fn render_with_received_masks(
        &mut self,
        geometry: &Geometry<'_>,
        source: &MaskedSource,
        chain: &ClipChain,
        channels: &[Option<MaskChannel>; MASK_CHANNELS],
    ) -> Result<(), Skip> {
        let mut scratch = std::mem::take(&mut self.scratch);
        let result = match resolve(&self.transform, geometry, &mut scratch) {
            Ok(()) => self.compositor.render_with_received_masks(&scratch, source, chain, channels),
            Err(skip) => Err(self.batcher_mut().note_skip(skip)),
        };
        scratch.clear();
        self.scratch = scratch;
        result
    }
}

/// Maps `geometry` into canvas pixels.
fn resolve(transform: &CoordinateTransform, geometry: &Geometry<'_>, out: &mut Vec<PassVertex>) -> Result<(), Skip> {
    out.clear();
    out.reserve(geometry.vertices.len());
    for v in geometry.vertices {
        let pos = match geometry.space {
            Space::Screen => v.pos,
            Space::World => transform.world_to_screen(v.pos),
            Space::Local(m) => transform.local_to_screen(v.pos, &m),
        };
        if !pos.is_finite() {
            return Err(Skip::DegenerateMath);
        }
        out.push(PassVertex::at(pos).with_uv(v.uv).with_color(v.color));
    }
    Ok(())
}

/// One frame of a [`DrawContext`]. Closes the frame when dropped.
pub struct FrameScope<'a, B: PassBackend> {
    ctx: &'a mut DrawContext<B>,
}

impl<B: PassBackend> Deref for FrameScope<'_, B> {
    type Target = DrawContext<B>;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl<B: PassBackend> DerefMut for FrameScope<'_, B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl<B: PassBackend> Drop for FrameScope<'_, B> {
    fn drop(&mut self) {
        self.ctx.finish_frame();
    }
}

/// A temporary mask target leased through a [`DrawContext`].
///
/// Derefs to the context so producers and consumers can draw in any space.
/// Dropping it flushes, deactivates the target if bound and returns it to the pool.
pub struct MaskScope<'a, B: PassBackend> {
    ctx: &'a mut DrawContext<B>,
    id: MaskTargetId,
}

impl<B: PassBackend> MaskScope<'_, B> {
    #[inline]
    pub fn id(&self) -> MaskTargetId {
        self.id
    }
}

impl<B: PassBackend> Deref for MaskScope<'_, B> {
    type Target = DrawContext<B>;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl<B: PassBackend> DerefMut for MaskScope<'_, B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl<B: PassBackend> Drop for MaskScope<'_, B> {
    fn drop(&mut self) {
        self.ctx.compositor.batcher_mut().flush();
        self.ctx.compositor.release(self.id);
    }
}
