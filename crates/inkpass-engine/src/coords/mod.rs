//! Coordinate and geometry types shared by the batcher, the mask compositor
//! and hosts.
//!
//! Two pixel spaces are in play:
//! - workspace (world) units, where editor content lives
//! - canvas (screen) pixels, top-left origin, +X right, +Y down
//!
//! [`CoordinateTransform`] maps between them; pipelines convert canvas
//! pixels to NDC in their vertex stage.

mod affine;
mod rect;
mod transform;
mod vec2;
mod viewport;

pub use affine::Affine;
pub use rect::Rect;
pub use transform::{CoordinateTransform, MAX_ZOOM, MIN_ZOOM};
pub use vec2::Vec2;
pub use viewport::Viewport;
