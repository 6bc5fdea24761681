use thiserror::Error;

/// Why a drawable (or part of it) was not drawn.
///
/// Every variant is recovered locally: the offending drawable is dropped and
/// the rest of the frame continues. Nothing in the render path panics.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Error)]
pub enum Skip {
    /// Pipeline programs or lookup images have not been registered yet.
    #[error("pipeline programs are not registered yet")]
    NotReady,

    /// Too few vertices for the requested topology.
    #[error("not enough vertices to draw")]
    DegenerateGeometry,

    /// The pass names an image the backend does not know.
    #[error("bound image is not registered")]
    MissingImage,

    /// A mask, clip-parent or see-through target was released or never existed.
    #[error("mask target is no longer available")]
    MissingTarget,

    /// A zero-length direction or similar made the math undefined.
    #[error("degenerate geometry math")]
    DegenerateMath,

    /// The mask-target pool is exhausted or the backend refused an allocation.
    #[error("mask target allocation failed")]
    ResourceExhaustion,
}
