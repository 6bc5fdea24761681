use crate::paint::Color;
use crate::render::{
    ImageHandle, MaskedVariant, Overlay, PassBackend, PassBatcher, PassKey, PassVertex, Skip,
    TargetHandle, Topology,
};

use super::guard::{ExternalMask, MaskLease};
use super::{
    ChannelBinding, ClipChain, MASK_CHANNELS, MaskBindings, MaskChannel, MaskPoolConfig,
    MaskTargetId, MaskTargetPool, SeeThroughBinding, TargetLifetime,
};

/// What a mask producer paints with.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MaskSource {
    pub tint: Color,
    pub image: Option<ImageHandle>,
}

impl Default for MaskSource {
    fn default() -> Self {
        Self { tint: Color::WHITE, image: None }
    }
}

/// How a mask consumer's own geometry is shaded.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MaskedSource {
    pub tint: Color,
    pub image: Option<ImageHandle>,
    /// Geometry contributes coverage only.
    pub alpha_only: bool,
    /// Drawn desaturated (disabled state).
    pub gray: bool,
    /// Tone-overlay tint parameters.
    pub tone: Option<Overlay>,
}

impl MaskedSource {
    #[inline]
    pub fn textured(tint: Color, image: ImageHandle) -> Self {
        Self { tint, image: Some(image), alpha_only: false, gray: false, tone: None }
    }

    #[inline]
    pub fn alpha_only(tint: Color) -> Self {
        Self { tint, image: None, alpha_only: true, gray: false, tone: None }
    }
}

/// Target lifecycle counters.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct MaskStats {
    pub clears: u64,
    pub activations: u64,
    pub deactivations: u64,
    pub releases: u64,
}

/// Renders drawables into off-screen masks and draws dependents that read
/// them through four auxiliary channels, a clip parent and a see-through source.
///
/// Built on a [`PassBatcher`]: mask passes are merge barriers, so every mask
/// draw is bound, filled and flushed on its own.
pub struct MaskCompositor<B> {
    batcher: PassBatcher<B>,
    pool: MaskTargetPool,
    active: Option<MaskTargetId>,
    texture_override: Option<ImageHandle>,
    stats: MaskStats,
}

impl<B: PassBackend> MaskCompositor<B> {
    pub fn new(batcher: PassBatcher<B>, config: MaskPoolConfig) -> Self {
        Self {
            batcher,
            pool: MaskTargetPool::new(config),
            active: None,
            texture_override: None,
            stats: MaskStats::default(),
        }
    }

    #[inline]
    pub fn batcher(&self) -> &PassBatcher<B> {
        &self.batcher
    }

    #[inline]
    pub fn batcher_mut(&mut self) -> &mut PassBatcher<B> {
        &mut self.batcher
    }

    #[inline]
    pub fn pool(&self) -> &MaskTargetPool {
        &self.pool
    }

    #[inline]
    pub fn stats(&self) -> MaskStats {
        self.stats
    }

    /// Target currently bound for writing.
    #[inline]
    pub fn active_target(&self) -> Option<MaskTargetId> {
        self.active
    }

    // ── texture override ──────────────────────────────────────────────────

    /// Substitutes `image` for the bound image of every subsequent draw.
    pub fn set_texture_override(&mut self, image: Option<ImageHandle>) {
        self.texture_override = image;
    }

    #[inline]
    pub fn texture_override(&self) -> Option<ImageHandle> {
        self.texture_override
    }

    #[inline]
    fn resolve_image(&self, image: Option<ImageHandle>) -> Option<ImageHandle> {
        self.texture_override.or(image)
    }

    // ── target lifetime ───────────────────────────────────────────────────

    /// Checks out a temporary target. Prefer [`lease_temporary`](Self::lease_temporary),
    /// which also guarantees its release.
    pub fn acquire_temporary(&mut self, width: u32, height: u32) -> Result<MaskTargetId, Skip> {
        self.pool
            .acquire_temporary(self.batcher.backend_mut(), width, height)
            .map_err(|skip| self.batcher.note_skip(skip))
    }

    /// Temporary target released (and deactivated if needed) when the lease drops.
    pub fn lease_temporary(&mut self, width: u32, height: u32) -> Result<MaskLease<'_, B>, Skip> {
        let id = self.acquire_temporary(width, height)?;
        Ok(MaskLease::new(self, id))
    }

    /// Host-owned target, deactivated (never released) when the guard drops.
    pub fn bind_external(&mut self, handle: TargetHandle, width: u32, height: u32) -> ExternalMask<'_, B> {
        let id = self.pool.adopt_external(handle, width, height);
        ExternalMask::new(self, id)
    }

    /// Starts a new logical use of `id`; the next producer clears it again.
    pub fn mark_for_reuse(&mut self, id: MaskTargetId) -> bool {
        self.pool.mark_for_reuse(id)
    }

    /// Ends the use of `id`: deactivates it if active, then returns a
    /// temporary to the pool or forgets an external target.
    ///
    /// Returns `false` if `id` was already released.
    pub fn release(&mut self, id: MaskTargetId) -> bool {
        if self.active == Some(id) {
            self.deactivate();
        }
        match self.pool.release(id) {
            Some(target) => {
                if target.lifetime == TargetLifetime::Temporary {
                    self.stats.releases += 1;
                }
                true
            }
            None => false,
        }
    }

    /// Releases temporaries that were acquired without a lease and never released.
    pub fn release_leaked(&mut self) -> usize {
        let leaked = self.pool.live_temporaries();
        for &id in &leaked {
            self.release(id);
        }
        if !leaked.is_empty() {
            log::debug!("released {} leaked mask target(s)", leaked.len());
        }
        leaked.len()
    }

    /// Destroys idle pooled targets.
    pub fn purge_idle(&mut self) {
        self.pool.purge(self.batcher.backend_mut());
    }

    /// Flushes and unbinds the active target. Returns `false` if none was active.
    pub fn deactivate(&mut self) -> bool {
        if self.active.take().is_none() {
            return false;
        }
        self.batcher.flush();
        self.batcher.backend_mut().deactivate_target();
        self.stats.deactivations += 1;
        true
    }

    fn activate(&mut self, id: MaskTargetId, handle: TargetHandle) {
        if self.active == Some(id) {
            return;
        }
        self.deactivate();
        self.batcher.backend_mut().activate_target(handle);
        self.active = Some(id);
        self.stats.activations += 1;
    }

    // ── producing ─────────────────────────────────────────────────────────

    /// Renders triangle `geometry` into `target` as a mask.
    ///
    /// Any open pass is flushed first. Every target, pooled or external, is
    /// cleared exactly once per logical use, before its first draw. A
    /// `needs_clear` request on a target already cleared in this use is a
    /// no-op; call [`mark_for_reuse`](Self::mark_for_reuse) to start a new use.
    pub fn render_into_mask(
        &mut self,
        target: MaskTargetId,
        geometry: &[PassVertex],
        source: &MaskSource,
        alpha_only: bool,
        needs_clear: bool,
    ) -> Result<(), Skip> {
        if geometry.len() < Topology::Triangles.min_vertices() {
            return Err(self.batcher.note_skip(Skip::DegenerateGeometry));
        }
        let Some(mask) = self.pool.get(target) else {
            return Err(self.batcher.note_skip(Skip::MissingTarget));
        };
        let handle = mask.handle;

        let key = PassKey::MaskWrite {
            alpha_only,
            tint: source.tint,
            image: self.resolve_image(source.image),
        };
        if let Err(skip) = self.batcher.validate(&key) {
            return Err(self.batcher.note_skip(skip));
        }

        self.batcher.flush();
        self.activate(target, handle);

        if let Some(mask) = self.pool.get_mut(target) {
            if needs_clear && mask.is_cleared {
                log::trace!("mask target {handle:?} already cleared in this use");
            }
            if !mask.is_cleared {
                self.batcher.backend_mut().clear_target(handle);
                self.stats.clears += 1;
                mask.is_cleared = true;
            }
        }

        self.batcher.begin_pass(Topology::Triangles, key)?;
        self.batcher.append_vertices(geometry);
        self.batcher.flush();
        Ok(())
    }

    // ── consuming ─────────────────────────────────────────────────────────

    /// Draws triangle `geometry` to the output, cut by received masks.
    ///
    /// Present channels bind `{ratio 1, target, op}`; absent ones bind
    /// `{ratio 0, none, 0}`. If any referenced target is gone the whole
    /// drawable is skipped.
    pub fn render_with_received_masks(
        &mut self,
        geometry: &[PassVertex],
        source: &MaskedSource,
        chain: &ClipChain,
        channels: &[Option<MaskChannel>; MASK_CHANNELS],
    ) -> Result<(), Skip> {
        if geometry.len() < Topology::Triangles.min_vertices() {
            return Err(self.batcher.note_skip(Skip::DegenerateGeometry));
        }
        let bindings = match self.resolve_bindings(chain, channels) {
            Ok(b) => b,
            Err(skip) => return Err(self.batcher.note_skip(skip)),
        };

        let variant = select_variant(source, chain);
        let image = self.resolve_image(source.image);
        if image.is_none() && variant_needs_image(variant) {
            return Err(self.batcher.note_skip(Skip::MissingImage));
        }

        let key = PassKey::Masked {
            variant,
            tint: source.tint,
            image,
            overlay: source.tone.unwrap_or_default(),
            bindings,
        };
        if let Err(skip) = self.batcher.validate(&key) {
            return Err(self.batcher.note_skip(skip));
        }

        // The active target may be one of the inputs.
        self.deactivate();

        self.batcher.begin_pass(Topology::Triangles, key)?;
        self.batcher.append_vertices(geometry);
        self.batcher.flush();
        Ok(())
    }

    fn resolve_bindings(
        &self,
        chain: &ClipChain,
        channels: &[Option<MaskChannel>; MASK_CHANNELS],
    ) -> Result<MaskBindings, Skip> {
        let mut bindings = MaskBindings::default();

        for (slot, channel) in bindings.channels.iter_mut().zip(channels) {
            *slot = match channel {
                Some(ch) => {
                    let handle = self.pool.handle(ch.target).ok_or(Skip::MissingTarget)?;
                    ChannelBinding::enabled(handle, ch.op)
                }
                None => ChannelBinding::DISABLED,
            };
        }

        if let Some(parent) = chain.parent {
            bindings.clip_parent = Some(self.pool.handle(parent).ok_or(Skip::MissingTarget)?);
        }

        if let Some(see) = chain.see_through {
            let target = self.pool.handle(see.target).ok_or(Skip::MissingTarget)?;
            bindings.see_through = Some(SeeThroughBinding { target, alpha: see.alpha.clamp(0.0, 1.0) });
        }

        Ok(bindings)
    }
}

/// Alpha-only geometry wins, then clip chaining, then the disabled look,
/// then tone overlay.
fn select_variant(source: &MaskedSource, chain: &ClipChain) -> MaskedVariant {
    if source.alpha_only {
        MaskedVariant::AlphaOnly
    } else if chain.parent.is_some() {
        MaskedVariant::Clipped
    } else if source.gray {
        MaskedVariant::Gray
    } else if source.tone.is_some() {
        MaskedVariant::Tone
    } else {
        MaskedVariant::Textured
    }
}

fn variant_needs_image(variant: MaskedVariant) -> bool {
    !matches!(variant, MaskedVariant::AlphaOnly | MaskedVariant::Clipped)
}
