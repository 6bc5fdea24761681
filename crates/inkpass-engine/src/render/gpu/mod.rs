//! wgpu implementation of [`PassBackend`](crate::render::PassBackend).

mod backend;
mod uniform;

pub use backend::{ProgramSource, WgpuBackend, WgpuBackendConfig};
