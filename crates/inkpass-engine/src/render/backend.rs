use bytemuck::{Pod, Zeroable};

use crate::coords::{Rect, Vec2};
use crate::paint::Color;

use super::PassKey;

/// Identity of a registered lookup image (icon atlas, sprite sheet, ...).
///
/// Compared by identity only; two handles to identical pixels are different images.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ImageHandle(pub u32);

/// Backend-side identity of an off-screen render target.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TargetHandle(pub u32);

/// Primitive topology of an open pass.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Topology {
    Lines,
    Triangles,
}

impl Topology {
    /// Smallest vertex count that produces a primitive.
    #[inline]
    pub const fn min_vertices(self) -> usize {
        match self {
            Topology::Lines => 2,
            Topology::Triangles => 3,
        }
    }
}

/// Canvas-space vertex as submitted to a pipeline.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct PassVertex {
    pub pos: [f32; 2],   // canvas pixels
    pub uv: [f32; 2],    // 0..1
    pub color: [f32; 4], // premultiplied
}

impl PassVertex {
    /// Vertex at `pos` with zero uv and opaque white color.
    #[inline]
    pub const fn at(pos: Vec2) -> Self {
        Self {
            pos: [pos.x, pos.y],
            uv: [0.0, 0.0],
            color: [1.0, 1.0, 1.0, 1.0],
        }
    }

    #[inline]
    pub const fn with_uv(mut self, uv: Vec2) -> Self {
        self.uv = [uv.x, uv.y];
        self
    }

    #[inline]
    pub const fn with_color(mut self, color: Color) -> Self {
        self.color = [color.r, color.g, color.b, color.a];
        self
    }
}

/// The graphics-API seam under the batcher and the mask compositor.
///
/// The core decides *when* to bind, submit, clear and switch targets; the
/// backend only does what it is told. Implementations must not reorder calls.
///
/// Contract:
/// - `bind` is followed by zero or more `push_vertex` calls and one
///   `end_primitives`; binds never nest.
/// - At most one target is active at a time. While none is active, draws go
///   to the frame output.
/// - `set_clip_rect` applies to every later `bind`.
pub trait PassBackend {
    /// `true` once every pass family has a registered program.
    fn is_ready(&self) -> bool;

    fn has_image(&self, image: ImageHandle) -> bool;

    /// Normalized canvas placement within the host area.
    fn set_clip_rect(&mut self, clip: Rect);

    /// Canvas size in device pixels; output-pass vertices are in this space.
    fn set_canvas_size(&mut self, size: Vec2);

    fn bind(&mut self, topology: Topology, key: &PassKey);

    fn push_vertex(&mut self, vertex: PassVertex);

    /// Submits everything pushed since the last `bind`.
    fn end_primitives(&mut self);

    /// Allocates an off-screen target. `None` when the backend cannot.
    fn create_target(&mut self, width: u32, height: u32) -> Option<TargetHandle>;

    fn destroy_target(&mut self, target: TargetHandle);

    /// Redirects subsequent draws into `target`.
    fn activate_target(&mut self, target: TargetHandle);

    /// Restores the frame output as the draw destination.
    fn deactivate_target(&mut self);

    /// Fills `target` with transparent black.
    fn clear_target(&mut self, target: TargetHandle);
}
