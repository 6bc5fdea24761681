use crate::render::TargetHandle;

use super::MaskTargetId;

/// Number of auxiliary mask channels a masked drawable can receive.
pub const MASK_CHANNELS: usize = 4;

/// How a channel's mask combines with the drawable's coverage.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MaskOp {
    /// Keep coverage where the mask is opaque.
    Multiply,
    /// Keep coverage where the mask is transparent.
    Invert,
    /// Union with the mask.
    Max,
    /// Intersection with the mask.
    Min,
}

impl MaskOp {
    /// Code read by programs. `0` is reserved for a disabled channel.
    #[inline]
    pub fn code(self) -> u32 {
        match self {
            MaskOp::Multiply => 1,
            MaskOp::Invert => 2,
            MaskOp::Max => 3,
            MaskOp::Min => 4,
        }
    }
}

/// A mask received on one of the auxiliary channels.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MaskChannel {
    pub target: MaskTargetId,
    pub op: MaskOp,
}

impl MaskChannel {
    #[inline]
    pub fn new(target: MaskTargetId, op: MaskOp) -> Self {
        Self { target, op }
    }
}

/// Auxiliary alpha source that lets a drawable partially reveal what is behind it.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SeeThrough {
    pub target: MaskTargetId,
    pub alpha: f32,
}

/// Parent clip mask plus optional see-through source for a drawable.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct ClipChain {
    pub parent: Option<MaskTargetId>,
    pub see_through: Option<SeeThrough>,
}

impl ClipChain {
    #[inline]
    pub fn clipped_by(parent: MaskTargetId) -> Self {
        Self { parent: Some(parent), see_through: None }
    }

    #[inline]
    pub fn with_see_through(mut self, target: MaskTargetId, alpha: f32) -> Self {
        self.see_through = Some(SeeThrough { target, alpha });
        self
    }
}

/// Resolved per-channel program input.
///
/// `ratio` doubles as the enable flag: 1 for a bound channel, 0 otherwise.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ChannelBinding {
    pub ratio: f32,
    pub target: Option<TargetHandle>,
    pub op_code: u32,
}

impl ChannelBinding {
    pub const DISABLED: ChannelBinding = ChannelBinding { ratio: 0.0, target: None, op_code: 0 };

    #[inline]
    pub fn enabled(target: TargetHandle, op: MaskOp) -> Self {
        Self { ratio: 1.0, target: Some(target), op_code: op.code() }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }
}

impl Default for ChannelBinding {
    fn default() -> Self {
        Self::DISABLED
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SeeThroughBinding {
    pub target: TargetHandle,
    pub alpha: f32,
}

/// Every off-screen input of a masked pass, resolved to backend handles.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct MaskBindings {
    pub channels: [ChannelBinding; MASK_CHANNELS],
    pub clip_parent: Option<TargetHandle>,
    pub see_through: Option<SeeThroughBinding>,
}

impl MaskBindings {
    /// Number of enabled auxiliary channels.
    pub fn enabled_channels(&self) -> usize {
        self.channels.iter().filter(|c| c.is_enabled()).count()
    }
}
