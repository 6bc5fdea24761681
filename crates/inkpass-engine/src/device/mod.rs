//! GPU device management.
//!
//! Creates the wgpu Instance/Adapter/Device/Queue without a window, plus
//! off-screen outputs to draw into.

mod headless;

pub use headless::{GpuInit, HeadlessGpu, OffscreenOutput};
