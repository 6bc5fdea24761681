use slotmap::{SlotMap, new_key_type};

use crate::render::{PassBackend, Skip, TargetHandle};

new_key_type! {
    /// Weak reference to a mask target.
    ///
    /// Ids outlive their targets: once a target is released, lookups with
    /// its id return `None`, never a recycled target.
    pub struct MaskTargetId;
}

/// Who owns a mask target's backing buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TargetLifetime {
    /// Pooled; handed back to the pool when its producing drawable finishes.
    Temporary,
    /// Supplied by the host (e.g. multi-target export); only ever deactivated here.
    External,
}

/// An off-screen target in its current logical use.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskTarget {
    pub handle: TargetHandle,
    pub width: u32,
    pub height: u32,
    /// Cleared (or deliberately preserved) since the current use began.
    pub is_cleared: bool,
    pub lifetime: TargetLifetime,
}

/// Mask pool limits.
#[derive(Debug, Clone)]
pub struct MaskPoolConfig {
    /// Maximum number of backend targets the pool creates (live + idle).
    pub max_targets: usize,
}

impl Default for MaskPoolConfig {
    fn default() -> Self {
        Self { max_targets: 8 }
    }
}

#[derive(Debug, Copy, Clone)]
struct IdleTarget {
    handle: TargetHandle,
    width: u32,
    height: u32,
}

/// Core-side bookkeeping for off-screen mask targets.
///
/// Backend buffers are created lazily and reused by exact size once released.
/// At capacity, an idle buffer of another size is destroyed to make room;
/// [`purge`](Self::purge) destroys all of them.
#[derive(Debug, Default)]
pub struct MaskTargetPool {
    targets: SlotMap<MaskTargetId, MaskTarget>,
    idle: Vec<IdleTarget>,
    created: usize,
    config: MaskPoolConfig,
}

impl MaskTargetPool {
    pub fn new(config: MaskPoolConfig) -> Self {
        Self { config, ..Self::default() }
    }

    /// Hands out a temporary target of `width × height`, uncleared.
    pub fn acquire_temporary<B: PassBackend>(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
    ) -> Result<MaskTargetId, Skip> {
        if width == 0 || height == 0 {
            return Err(Skip::DegenerateGeometry);
        }

        let handle = match self.idle.iter().position(|t| t.width == width && t.height == height) {
            Some(i) => self.idle.swap_remove(i).handle,
            None => {
                if self.created >= self.config.max_targets && !self.idle.is_empty() {
                    // Oldest idle buffer of the wrong size makes room.
                    let stale = self.idle.remove(0);
                    log::debug!(
                        "evicting idle {}×{} mask target to fit {width}×{height}",
                        stale.width, stale.height
                    );
                    backend.destroy_target(stale.handle);
                    self.created -= 1;
                }
                if self.created >= self.config.max_targets {
                    log::debug!(
                        "mask pool exhausted ({} targets); dropping masked output",
                        self.config.max_targets
                    );
                    return Err(Skip::ResourceExhaustion);
                }
                let Some(handle) = backend.create_target(width, height) else {
                    log::debug!("backend refused a {width}×{height} mask target");
                    return Err(Skip::ResourceExhaustion);
                };
                self.created += 1;
                handle
            }
        };

        Ok(self.targets.insert(MaskTarget {
            handle,
            width,
            height,
            is_cleared: false,
            lifetime: TargetLifetime::Temporary,
        }))
    }

    /// Registers a host-owned target as the start of a new use. Like a
    /// temporary, it is cleared before its first producing draw.
    pub fn adopt_external(&mut self, handle: TargetHandle, width: u32, height: u32) -> MaskTargetId {
        self.targets.insert(MaskTarget {
            handle,
            width,
            height,
            is_cleared: false,
            lifetime: TargetLifetime::External,
        })
    }

    #[inline]
    pub fn get(&self, id: MaskTargetId) -> Option<&MaskTarget> {
        self.targets.get(id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: MaskTargetId) -> Option<&mut MaskTarget> {
        self.targets.get_mut(id)
    }

    #[inline]
    pub fn handle(&self, id: MaskTargetId) -> Option<TargetHandle> {
        self.targets.get(id).map(|t| t.handle)
    }

    /// Starts a new logical use: the next producer clears the target again.
    pub fn mark_for_reuse(&mut self, id: MaskTargetId) -> bool {
        match self.targets.get_mut(id) {
            Some(t) => {
                t.is_cleared = false;
                true
            }
            None => false,
        }
    }

    /// Ends the target's use. Temporaries return to the idle list; external
    /// targets are forgotten without touching their buffer.
    ///
    /// Returns the removed entry, or `None` if `id` was already released.
    pub fn release(&mut self, id: MaskTargetId) -> Option<MaskTarget> {
        let target = self.targets.remove(id)?;
        if target.lifetime == TargetLifetime::Temporary {
            self.idle.push(IdleTarget {
                handle: target.handle,
                width: target.width,
                height: target.height,
            });
        }
        Some(target)
    }

    /// Ids of temporaries that are still checked out.
    pub fn live_temporaries(&self) -> Vec<MaskTargetId> {
        self.targets
            .iter()
            .filter(|(_, t)| t.lifetime == TargetLifetime::Temporary)
            .map(|(id, _)| id)
            .collect()
    }

    #[inline]
    pub fn live_count(&self) -> usize {
        self.targets.len()
    }

    #[inline]
    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    /// Destroys every idle backend target (e.g. after the canvas is resized).
    pub fn purge<B: PassBackend>(&mut self, backend: &mut B) {
        for idle in self.idle.drain(..) {
            backend.destroy_target(idle.handle);
            self.created -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RecordingBackend;

    fn pool(max: usize) -> (MaskTargetPool, RecordingBackend) {
        (MaskTargetPool::new(MaskPoolConfig { max_targets: max }), RecordingBackend::ready())
    }

    // ── acquire / release ─────────────────────────────────────────────────

    #[test]
    fn released_temporary_is_reused_by_size() {
        let (mut pool, mut backend) = pool(4);
        let a = pool.acquire_temporary(&mut backend, 64, 64).unwrap();
        let handle = pool.handle(a).unwrap();
        pool.release(a);

        let b = pool.acquire_temporary(&mut backend, 64, 64).unwrap();
        assert_eq!(pool.handle(b), Some(handle));
        assert_eq!(backend.created_targets(), 1);
        // The old id stays dead even though the buffer came back.
        assert!(pool.get(a).is_none());
    }

    #[test]
    fn different_size_allocates_a_new_target() {
        let (mut pool, mut backend) = pool(4);
        let a = pool.acquire_temporary(&mut backend, 64, 64).unwrap();
        pool.release(a);
        pool.acquire_temporary(&mut backend, 32, 32).unwrap();
        assert_eq!(backend.created_targets(), 2);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn exhausted_pool_reports_resource_exhaustion() {
        let (mut pool, mut backend) = pool(1);
        pool.acquire_temporary(&mut backend, 8, 8).unwrap();
        assert_eq!(pool.acquire_temporary(&mut backend, 8, 8), Err(Skip::ResourceExhaustion));
    }

    #[test]
    fn idle_targets_of_other_sizes_make_room_at_capacity() {
        let (mut pool, mut backend) = pool(2);
        for side in [100, 200] {
            let id = pool.acquire_temporary(&mut backend, side, side).unwrap();
            pool.release(id);
        }
        assert_eq!((pool.live_count(), pool.idle_count()), (0, 2));

        let c = pool.acquire_temporary(&mut backend, 300, 300).unwrap();
        assert_eq!(pool.get(c).map(|t| (t.width, t.height)), Some((300, 300)));
        assert_eq!(backend.destroyed_targets(), 1);
        assert_eq!(backend.created_targets(), 3);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn live_targets_are_never_evicted() {
        let (mut pool, mut backend) = pool(2);
        pool.acquire_temporary(&mut backend, 100, 100).unwrap();
        pool.acquire_temporary(&mut backend, 200, 200).unwrap();
        assert_eq!(pool.acquire_temporary(&mut backend, 300, 300), Err(Skip::ResourceExhaustion));
        assert_eq!(backend.destroyed_targets(), 0);
    }

    #[test]
    fn backend_refusal_reports_resource_exhaustion() {
        let (mut pool, mut backend) = pool(4);
        backend.refuse_targets(true);
        assert_eq!(pool.acquire_temporary(&mut backend, 8, 8), Err(Skip::ResourceExhaustion));
    }

    #[test]
    fn zero_sized_request_is_degenerate() {
        let (mut pool, mut backend) = pool(4);
        assert_eq!(pool.acquire_temporary(&mut backend, 0, 8), Err(Skip::DegenerateGeometry));
    }

    #[test]
    fn releasing_twice_is_harmless() {
        let (mut pool, mut backend) = pool(4);
        let a = pool.acquire_temporary(&mut backend, 8, 8).unwrap();
        assert!(pool.release(a).is_some());
        assert!(pool.release(a).is_none());
        assert_eq!(pool.idle_count(), 1);
    }

    // ── external targets ──────────────────────────────────────────────────

    #[test]
    fn external_target_never_enters_the_idle_list() {
        let (mut pool, _) = pool(4);
        let id = pool.adopt_external(TargetHandle(99), 16, 16);
        assert_eq!(pool.release(id).map(|t| t.lifetime), Some(TargetLifetime::External));
        assert_eq!(pool.idle_count(), 0);
    }

    // ── reuse / purge ─────────────────────────────────────────────────────

    #[test]
    fn mark_for_reuse_resets_clear_state() {
        let (mut pool, mut backend) = pool(4);
        let a = pool.acquire_temporary(&mut backend, 8, 8).unwrap();
        pool.get_mut(a).unwrap().is_cleared = true;
        assert!(pool.mark_for_reuse(a));
        assert!(!pool.get(a).unwrap().is_cleared);
    }

    #[test]
    fn purge_destroys_idle_targets_and_frees_capacity() {
        let (mut pool, mut backend) = pool(1);
        let a = pool.acquire_temporary(&mut backend, 8, 8).unwrap();
        pool.release(a);
        pool.purge(&mut backend);
        assert_eq!(backend.destroyed_targets(), 1);
        assert!(pool.acquire_temporary(&mut backend, 16, 16).is_ok());
    }
}
