//! inkpass engine crate.
//!
//! Immediate-mode 2D pass batching and layered mask compositing for an
//! interactive editor canvas, with a wgpu backend and a headless recorder.

pub mod coords;
pub mod device;
pub mod frame;
pub mod logging;
pub mod paint;
pub mod render;
