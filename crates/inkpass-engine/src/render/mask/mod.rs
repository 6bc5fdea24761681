//! Off-screen mask targets and the passes that write and read them.

mod channel;
mod compositor;
mod guard;
mod pool;

pub use channel::{
    ChannelBinding, ClipChain, MASK_CHANNELS, MaskBindings, MaskChannel, MaskOp, SeeThrough,
    SeeThroughBinding,
};
pub use compositor::{MaskCompositor, MaskSource, MaskStats, MaskedSource};
pub use guard::{ExternalMask, MaskLease};
pub use pool::{MaskPoolConfig, MaskTarget, MaskTargetId, MaskTargetPool, TargetLifetime};
