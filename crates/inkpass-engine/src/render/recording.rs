use std::collections::HashSet;

use crate::coords::{Rect, Vec2};

use super::{ImageHandle, PassBackend, PassFamily, PassKey, PassVertex, TargetHandle, Topology};

/// One call received by a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    SetClipRect(Rect),
    SetCanvasSize(Vec2),
    Bind { topology: Topology, key: PassKey },
    Vertex(PassVertex),
    EndPrimitives,
    CreateTarget { target: TargetHandle, width: u32, height: u32 },
    DestroyTarget(TargetHandle),
    Activate(TargetHandle),
    /// Carries the target that was active, if any.
    Deactivate(Option<TargetHandle>),
    Clear(TargetHandle),
}

/// Headless backend that records every call in order.
///
/// Used to inspect batching and mask-target lifetimes without a GPU, and by
/// hosts to dump a frame's command stream when debugging.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Vec<BackendCall>,
    programs: HashSet<PassFamily>,
    images: HashSet<ImageHandle>,
    next_target: u32,
    active: Option<TargetHandle>,
    refuse_targets: bool,
}

impl RecordingBackend {
    /// Backend with nothing registered; reports not-ready.
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend with every pass family registered.
    pub fn ready() -> Self {
        let mut backend = Self::new();
        for family in PassFamily::ALL {
            backend.register_program(family);
        }
        backend
    }

    pub fn register_program(&mut self, family: PassFamily) {
        self.programs.insert(family);
    }

    pub fn register_image(&mut self, image: ImageHandle) {
        self.images.insert(image);
    }

    /// Makes subsequent `create_target` calls fail.
    pub fn refuse_targets(&mut self, refuse: bool) {
        self.refuse_targets = refuse;
    }

    #[inline]
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<BackendCall> {
        std::mem::take(&mut self.calls)
    }

    #[inline]
    pub fn active_target(&self) -> Option<TargetHandle> {
        self.active
    }

    pub fn binds(&self) -> usize {
        self.count(|c| matches!(c, BackendCall::Bind { .. }))
    }

    pub fn flushes(&self) -> usize {
        self.count(|c| matches!(c, BackendCall::EndPrimitives))
    }

    pub fn vertices(&self) -> usize {
        self.count(|c| matches!(c, BackendCall::Vertex(_)))
    }

    pub fn created_targets(&self) -> usize {
        self.count(|c| matches!(c, BackendCall::CreateTarget { .. }))
    }

    pub fn destroyed_targets(&self) -> usize {
        self.count(|c| matches!(c, BackendCall::DestroyTarget(_)))
    }

    pub fn clears_of(&self, target: TargetHandle) -> usize {
        self.count(|c| *c == BackendCall::Clear(target))
    }

    pub fn activations_of(&self, target: TargetHandle) -> usize {
        self.count(|c| *c == BackendCall::Activate(target))
    }

    pub fn deactivations_of(&self, target: TargetHandle) -> usize {
        self.count(|c| *c == BackendCall::Deactivate(Some(target)))
    }

    /// Keys of every bind, in order.
    pub fn bound_keys(&self) -> Vec<&PassKey> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                BackendCall::Bind { key, .. } => Some(key),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }
}

impl PassBackend for RecordingBackend {
    fn is_ready(&self) -> bool {
        PassFamily::ALL.iter().all(|f| self.programs.contains(f))
    }

    fn has_image(&self, image: ImageHandle) -> bool {
        self.images.contains(&image)
    }

    fn set_clip_rect(&mut self, clip: Rect) {
        self.calls.push(BackendCall::SetClipRect(clip));
    }

    fn set_canvas_size(&mut self, size: Vec2) {
        self.calls.push(BackendCall::SetCanvasSize(size));
    }

    fn bind(&mut self, topology: Topology, key: &PassKey) {
        self.calls.push(BackendCall::Bind { topology, key: key.clone() });
    }

    fn push_vertex(&mut self, vertex: PassVertex) {
        self.calls.push(BackendCall::Vertex(vertex));
    }

    fn end_primitives(&mut self) {
        self.calls.push(BackendCall::EndPrimitives);
    }

    fn create_target(&mut self, width: u32, height: u32) -> Option<TargetHandle> {
        if self.refuse_targets {
            return None;
        }
        let target = TargetHandle(self.next_target);
        self.next_target += 1;
        self.calls.push(BackendCall::CreateTarget { target, width, height });
        Some(target)
    }

    fn destroy_target(&mut self, target: TargetHandle) {
        self.calls.push(BackendCall::DestroyTarget(target));
    }

    fn activate_target(&mut self, target: TargetHandle) {
        self.active = Some(target);
        self.calls.push(BackendCall::Activate(target));
    }

    fn deactivate_target(&mut self) {
        let was = self.active.take();
        self.calls.push(BackendCall::Deactivate(was));
    }

    fn clear_target(&mut self, target: TargetHandle) {
        self.calls.push(BackendCall::Clear(target));
    }
}
