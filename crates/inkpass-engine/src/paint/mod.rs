//! Paint model shared between hosts and pipelines.
//!
//! Colors are linear, premultiplied RGBA. Pass keys compare tints with a
//! tolerance, see [`Color::approx_eq`].

pub mod color;

pub use color::Color;
