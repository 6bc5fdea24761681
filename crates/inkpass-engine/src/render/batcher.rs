use core::ops::{Deref, DerefMut};

use crate::coords::{Rect, Vec2};

use super::{PassBackend, PassKey, PassVertex, Skip, Tolerances, Topology};

/// The currently open pass.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSession {
    pub topology: Topology,
    pub key: PassKey,
}

/// Counters for the batching contract: compatible runs cost one bind and one flush.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct BatchStats {
    /// Pipeline binds issued to the backend.
    pub binds: u64,
    /// End-of-primitives submissions.
    pub flushes: u64,
    /// `begin_pass` calls absorbed by the open session.
    pub merged: u64,
    /// Vertices forwarded to the backend.
    pub vertices: u64,
    /// Draw requests dropped with a [`Skip`].
    pub skipped: u64,
}

/// Owns the single bound pipeline state and merges compatible requests.
///
/// `Closed → Open(topology, key)`. A `begin_pass` that matches the open
/// topology and is [compatible](super::keys_compatible) with the open key
/// continues the batch; anything else flushes first.
pub struct PassBatcher<B> {
    backend: B,
    session: Option<BatchSession>,
    tolerances: Tolerances,
    clip_rect: Option<Rect>,
    canvas_size: Option<Vec2>,
    stats: BatchStats,
    warned_not_ready: bool,
}

impl<B: PassBackend> PassBatcher<B> {
    pub fn new(backend: B) -> Self {
        Self::with_tolerances(backend, Tolerances::default())
    }

    pub fn with_tolerances(backend: B, tolerances: Tolerances) -> Self {
        Self {
            backend,
            session: None,
            tolerances,
            clip_rect: None,
            canvas_size: None,
            stats: BatchStats::default(),
            warned_not_ready: false,
        }
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Direct backend access for target management.
    ///
    /// Callers must not bind or push vertices through it; that would bypass
    /// the session.
    #[inline]
    pub(crate) fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Backend access for host work between draws (frame begin/end, uploads).
    ///
    /// The open session is flushed first so nothing recorded is lost.
    pub fn host_backend(&mut self) -> &mut B {
        self.flush();
        &mut self.backend
    }

    #[inline]
    pub fn tolerances(&self) -> &Tolerances {
        &self.tolerances
    }

    /// Whether heavy draw sequences are worth issuing yet.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.backend.is_ready()
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    #[inline]
    pub fn session(&self) -> Option<&BatchSession> {
        self.session.as_ref()
    }

    #[inline]
    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = BatchStats::default();
    }

    /// Checks that `key` can be bound right now, without touching the session.
    pub fn validate(&mut self, key: &PassKey) -> Result<(), Skip> {
        if !self.backend.is_ready() {
            if !self.warned_not_ready {
                log::debug!("pass backend not ready; draws are skipped until programs are registered");
                self.warned_not_ready = true;
            }
            return Err(Skip::NotReady);
        }
        if let Some(image) = key.image() {
            if !self.backend.has_image(image) {
                return Err(Skip::MissingImage);
            }
        }
        Ok(())
    }

    /// Opens (or continues) a pass for `key`.
    pub fn begin_pass(&mut self, topology: Topology, key: PassKey) -> Result<(), Skip> {
        if let Err(skip) = self.validate(&key) {
            return Err(self.note_skip(skip));
        }

        if let Some(session) = &self.session {
            if session.topology == topology && session.key.is_compatible_with(&key, &self.tolerances) {
                self.stats.merged += 1;
                return Ok(());
            }
            self.flush();
        }

        self.backend.bind(topology, &key);
        self.stats.binds += 1;
        log::trace!("bind {:?} ({topology:?})", key.family());
        self.session = Some(BatchSession { topology, key });
        Ok(())
    }

    /// Forwards a vertex to the open pass. Silently ignored while closed.
    #[inline]
    pub fn append_vertex(&mut self, vertex: PassVertex) {
        if self.session.is_none() {
            return;
        }
        self.backend.push_vertex(vertex);
        self.stats.vertices += 1;
    }

    pub fn append_vertices(&mut self, vertices: &[PassVertex]) {
        if self.session.is_none() {
            return;
        }
        for &v in vertices {
            self.backend.push_vertex(v);
        }
        self.stats.vertices += vertices.len() as u64;
    }

    /// Submits the open pass and closes the session. No-op while closed.
    pub fn flush(&mut self) {
        if self.session.take().is_none() {
            return;
        }
        self.backend.end_primitives();
        self.stats.flushes += 1;
    }

    /// Caller-facing close of the current pass; same as [`flush`](Self::flush).
    #[inline]
    pub fn end_pass(&mut self) {
        self.flush();
    }

    /// Pushes a new normalized clip rect to the backend.
    ///
    /// The open pass was bound with the old rect, so it is flushed first.
    pub fn set_clip_rect(&mut self, clip: Rect) {
        if self.clip_rect == Some(clip) {
            return;
        }
        self.flush();
        self.backend.set_clip_rect(clip);
        self.clip_rect = Some(clip);
    }

    /// Pushes the canvas size output vertices are expressed in.
    pub fn set_canvas_size(&mut self, size: Vec2) {
        if self.canvas_size == Some(size) {
            return;
        }
        self.flush();
        self.backend.set_canvas_size(size);
        self.canvas_size = Some(size);
    }

    /// Scope guard that flushes the open session when dropped, whatever the exit path.
    #[inline]
    pub fn scope(&mut self) -> PassScope<'_, B> {
        PassScope { batcher: self }
    }

    /// Counts and logs a skipped draw, handing the reason back.
    pub(crate) fn note_skip(&mut self, skip: Skip) -> Skip {
        self.stats.skipped += 1;
        log::trace!("draw skipped: {skip}");
        skip
    }
}

/// Borrow of a [`PassBatcher`] that flushes on drop.
pub struct PassScope<'a, B: PassBackend> {
    batcher: &'a mut PassBatcher<B>,
}

impl<B: PassBackend> Deref for PassScope<'_, B> {
    type Target = PassBatcher<B>;

    fn deref(&self) -> &Self::Target {
        self.batcher
    }
}

impl<B: PassBackend> DerefMut for PassScope<'_, B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.batcher
    }
}

impl<B: PassBackend> Drop for PassScope<'_, B> {
    fn drop(&mut self) {
        self.batcher.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Vec2;
    use crate::paint::Color;
    use crate::render::{BackendCall, ImageHandle, RecordingBackend};

    const A: ImageHandle = ImageHandle(1);
    const B: ImageHandle = ImageHandle(2);

    fn batcher() -> PassBatcher<RecordingBackend> {
        let mut backend = RecordingBackend::ready();
        backend.register_image(A);
        backend.register_image(B);
        PassBatcher::new(backend)
    }

    fn textured(image: ImageHandle) -> PassKey {
        PassKey::Textured { tint: Color::WHITE, image }
    }

    fn vertex() -> PassVertex {
        PassVertex::at(Vec2::new(1.0, 2.0))
    }

    // ── merging ───────────────────────────────────────────────────────────

    #[test]
    fn identical_runs_bind_and_flush_once() {
        for n in 1..=1000u64 {
            let mut b = batcher();
            for _ in 0..n {
                b.begin_pass(Topology::Triangles, textured(A)).unwrap();
                b.append_vertex(vertex());
            }
            b.flush();
            let stats = b.stats();
            assert_eq!((stats.binds, stats.flushes), (1, 1), "n = {n}");
            assert_eq!(stats.merged, n - 1);
            assert_eq!(b.backend().binds(), 1);
            assert_eq!(b.backend().flushes(), 1);
        }
    }

    #[test]
    fn three_textured_white_passes_then_flush() {
        let mut b = batcher();
        for _ in 0..3 {
            b.begin_pass(Topology::Triangles, textured(A)).unwrap();
        }
        b.flush();
        assert_eq!((b.backend().binds(), b.backend().flushes()), (1, 1));
    }

    #[test]
    fn switching_images_rebinds() {
        let mut b = batcher();
        b.begin_pass(Topology::Triangles, textured(A)).unwrap();
        b.begin_pass(Topology::Triangles, textured(B)).unwrap();
        b.flush();
        assert_eq!((b.backend().binds(), b.backend().flushes()), (2, 2));
    }

    #[test]
    fn topology_change_rebinds() {
        let mut b = batcher();
        b.begin_pass(Topology::Triangles, textured(A)).unwrap();
        b.begin_pass(Topology::Lines, textured(A)).unwrap();
        assert_eq!(b.stats().binds, 2);
        assert_eq!(b.session().map(|s| s.topology), Some(Topology::Lines));
    }

    #[test]
    fn tints_within_tolerance_merge() {
        let mut b = batcher();
        let tint = |g| PassKey::Flat { tint: Color::from_premul(0.5, g, 0.5, 1.0) };
        b.begin_pass(Topology::Lines, tint(0.5)).unwrap();
        b.begin_pass(Topology::Lines, tint(0.5 + 1.0 / 512.0)).unwrap();
        b.begin_pass(Topology::Lines, tint(0.5 + 1.0 / 128.0)).unwrap();
        assert_eq!(b.stats().binds, 2);
        assert_eq!(b.stats().merged, 1);
    }

    // ── closed-state behavior ─────────────────────────────────────────────

    #[test]
    fn vertices_while_closed_are_dropped() {
        let mut b = batcher();
        b.append_vertex(vertex());
        b.append_vertices(&[vertex(), vertex()]);
        b.flush();
        assert_eq!(b.stats(), BatchStats::default());
        assert!(b.backend().calls().is_empty());
    }

    #[test]
    fn end_pass_closes_the_session() {
        let mut b = batcher();
        b.begin_pass(Topology::Triangles, textured(A)).unwrap();
        b.end_pass();
        assert!(!b.is_open());
        b.begin_pass(Topology::Triangles, textured(A)).unwrap();
        assert_eq!(b.stats().binds, 2);
    }

    // ── readiness and missing images ──────────────────────────────────────

    #[test]
    fn unready_backend_is_a_silent_no_op() {
        let mut b = PassBatcher::new(RecordingBackend::new());
        assert!(!b.is_ready());
        assert_eq!(b.begin_pass(Topology::Lines, PassKey::Flat { tint: Color::WHITE }), Err(Skip::NotReady));
        b.append_vertex(vertex());
        b.flush();
        assert!(b.backend().calls().is_empty());
        assert_eq!(b.stats().skipped, 1);
    }

    #[test]
    fn unknown_image_is_skipped_without_disturbing_the_open_pass() {
        let mut b = batcher();
        b.begin_pass(Topology::Triangles, textured(A)).unwrap();
        assert_eq!(b.begin_pass(Topology::Triangles, textured(ImageHandle(77))), Err(Skip::MissingImage));
        assert!(b.is_open());
        assert_eq!(b.stats().flushes, 0);
    }

    // ── clip rect ─────────────────────────────────────────────────────────

    #[test]
    fn clip_rect_change_flushes_and_is_pushed_once() {
        let mut b = batcher();
        b.begin_pass(Topology::Triangles, textured(A)).unwrap();
        let clip = Rect::new(0.0, 0.0, 0.5, 0.5);
        b.set_clip_rect(clip);
        b.set_clip_rect(clip);
        assert!(!b.is_open());
        let pushes = b
            .backend()
            .calls()
            .iter()
            .filter(|c| matches!(c, BackendCall::SetClipRect(_)))
            .count();
        assert_eq!(pushes, 1);
    }

    // ── scope guard ───────────────────────────────────────────────────────

    #[test]
    fn scope_flushes_on_early_return() {
        fn draw(b: &mut PassBatcher<RecordingBackend>) -> Result<(), Skip> {
            let mut scope = b.scope();
            scope.begin_pass(Topology::Triangles, textured(A))?;
            scope.append_vertex(vertex());
            scope.begin_pass(Topology::Triangles, textured(ImageHandle(404)))?;
            unreachable!("missing image returns early");
        }

        let mut b = batcher();
        assert_eq!(draw(&mut b), Err(Skip::MissingImage));
        assert!(!b.is_open());
        assert_eq!(b.backend().flushes(), 1);
    }
}
