//! Per-frame drawing context.
//!
//! [`DrawContext`] is the single owner of the batcher, the mask compositor,
//! the viewport transform and transient per-frame state. Hosts pass it by
//! `&mut` into their frame callback.

mod context;
mod transient;

pub use context::{DrawConfig, DrawContext, FrameScope, Geometry, MaskScope, Space, Vertex};
pub use transient::{AnimationTimers, CursorHint, TransientState};
