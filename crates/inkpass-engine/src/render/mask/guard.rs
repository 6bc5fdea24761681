use core::ops::{Deref, DerefMut};

use crate::render::PassBackend;

use super::{MaskCompositor, MaskTargetId};

/// A pooled mask target checked out for one producing drawable.
///
/// Dropping the lease flushes, deactivates the target if it is still bound and
/// hands it back to the pool. This runs exactly once on every exit path,
/// including `?` returns and unwinding.
pub struct MaskLease<'a, B: PassBackend> {
    compositor: &'a mut MaskCompositor<B>,
    id: MaskTargetId,
}

impl<'a, B: PassBackend> MaskLease<'a, B> {
    pub(super) fn new(compositor: &'a mut MaskCompositor<B>, id: MaskTargetId) -> Self {
        Self { compositor, id }
    }

    #[inline]
    pub fn id(&self) -> MaskTargetId {
        self.id
    }
}

impl<B: PassBackend> Deref for MaskLease<'_, B> {
    type Target = MaskCompositor<B>;

    fn deref(&self) -> &Self::Target {
        self.compositor
    }
}

impl<B: PassBackend> DerefMut for MaskLease<'_, B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.compositor
    }
}

impl<B: PassBackend> Drop for MaskLease<'_, B> {
    fn drop(&mut self) {
        self.compositor.batcher_mut().flush();
        self.compositor.release(self.id);
    }
}

/// A host-owned target bound for the duration of a scope.
///
/// On drop the target is flushed and deactivated if bound; its buffer and
/// contents are left to the host.
pub struct ExternalMask<'a, B: PassBackend> {
    compositor: &'a mut MaskCompositor<B>,
    id: MaskTargetId,
}

impl<'a, B: PassBackend> ExternalMask<'a, B> {
    pub(super) fn new(compositor: &'a mut MaskCompositor<B>, id: MaskTargetId) -> Self {
        Self { compositor, id }
    }

    #[inline]
    pub fn id(&self) -> MaskTargetId {
        self.id
    }
}

impl<B: PassBackend> Deref for ExternalMask<'_, B> {
    type Target = MaskCompositor<B>;

    fn deref(&self) -> &Self::Target {
        self.compositor
    }
}

impl<B: PassBackend> DerefMut for ExternalMask<'_, B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.compositor
    }
}

impl<B: PassBackend> Drop for ExternalMask<'_, B> {
    fn drop(&mut self) {
        self.compositor.batcher_mut().flush();
        // Forgets the entry only; external targets are never pooled.
        self.compositor.release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use crate::coords::Vec2;
    use crate::render::mask::{MaskPoolConfig, MaskSource};
    use crate::render::{PassBatcher, PassVertex, RecordingBackend, Skip, TargetHandle};

    use super::*;

    fn compositor() -> MaskCompositor<RecordingBackend> {
        MaskCompositor::new(PassBatcher::new(RecordingBackend::ready()), MaskPoolConfig::default())
    }

    fn tri() -> [PassVertex; 3] {
        [Vec2::new(0.0, 0.0), Vec2::new(4.0, 0.0), Vec2::new(0.0, 4.0)].map(PassVertex::at)
    }

    fn produce(lease: &mut MaskLease<'_, RecordingBackend>) -> Result<(), Skip> {
        let id = lease.id();
        lease.render_into_mask(id, &tri(), &MaskSource::default(), true, true)
    }

    // ── lease ─────────────────────────────────────────────────────────────

    #[test]
    fn lease_releases_and_deactivates_once_on_normal_exit() {
        let mut c = compositor();
        let handle = {
            let mut lease = c.lease_temporary(16, 16).unwrap();
            produce(&mut lease).unwrap();
            lease.pool().handle(lease.id()).unwrap()
        };
        assert_eq!(c.batcher().backend().deactivations_of(handle), 1);
        assert_eq!(c.stats().releases, 1);
        assert_eq!(c.pool().idle_count(), 1);
        assert!(c.active_target().is_none());
    }

    #[test]
    fn lease_releases_on_early_return() {
        fn draw(c: &mut MaskCompositor<RecordingBackend>) -> Result<(), Skip> {
            let mut lease = c.lease_temporary(16, 16)?;
            produce(&mut lease)?;
            let id = lease.id();
            lease.render_into_mask(id, &tri()[..1], &MaskSource::default(), true, true)?;
            unreachable!("single vertex is degenerate");
        }

        let mut c = compositor();
        assert_eq!(draw(&mut c), Err(Skip::DegenerateGeometry));
        assert_eq!(c.stats().releases, 1);
        assert_eq!(c.stats().deactivations, 1);
        assert_eq!(c.batcher().backend().deactivations_of(TargetHandle(0)), 1);
    }

    #[test]
    fn lease_releases_while_unwinding() {
        let mut c = compositor();
        let result = catch_unwind(AssertUnwindSafe(|| {
            let mut lease = c.lease_temporary(16, 16).unwrap();
            produce(&mut lease).unwrap();
            panic!("drawable failed");
        }));
        assert!(result.is_err());
        assert_eq!(c.stats().releases, 1);
        assert_eq!(c.batcher().backend().deactivations_of(TargetHandle(0)), 1);
        assert_eq!(c.pool().live_count(), 0);
    }

    #[test]
    fn lease_never_activated_is_not_deactivated() {
        let mut c = compositor();
        drop(c.lease_temporary(16, 16).unwrap());
        assert_eq!(c.stats().deactivations, 0);
        assert_eq!(c.stats().releases, 1);
    }

    // ── external ──────────────────────────────────────────────────────────

    #[test]
    fn external_is_deactivated_but_not_pooled() {
        let mut c = compositor();
        {
            let mut ext = c.bind_external(TargetHandle(900), 8, 8);
            let id = ext.id();
            ext.render_into_mask(id, &tri(), &MaskSource::default(), true, true).unwrap();
        }
        let backend = c.batcher().backend();
        assert_eq!(backend.deactivations_of(TargetHandle(900)), 1);
        assert_eq!(backend.destroyed_targets(), 0);
        assert_eq!(c.pool().idle_count(), 0);
        assert_eq!(c.stats().releases, 0);
    }
}
