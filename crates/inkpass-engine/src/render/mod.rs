//! Pass batching and mask compositing.
//!
//! Callers describe *what* state a draw needs ([`PassKey`]); the [`PassBatcher`]
//! decides when to bind, merge and submit, and the [`mask::MaskCompositor`]
//! routes mask writes into off-screen targets. The graphics API sits behind
//! [`PassBackend`].
//!
//! Convention:
//! - Vertex positions reaching the backend are canvas pixels (top-left origin, +Y down).
//! - Colors are linear premultiplied RGBA.

mod backend;
mod batcher;
mod key;
mod recording;
mod skip;

pub mod gpu;
pub mod mask;

pub use backend::{ImageHandle, PassBackend, PassVertex, TargetHandle, Topology};
pub use batcher::{BatchSession, BatchStats, PassBatcher, PassScope};
pub use key::{
    MaskedVariant, Overlay, PassFamily, PassKey, SpriteKind, Tolerances, keys_compatible,
};
pub use recording::{BackendCall, RecordingBackend};
pub use skip::Skip;
