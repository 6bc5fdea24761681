use std::panic::{AssertUnwindSafe, catch_unwind};

use inkpass_engine::coords::{Vec2, Viewport};
use inkpass_engine::frame::{DrawConfig, DrawContext, Geometry, Vertex};
use inkpass_engine::paint::Color;
use inkpass_engine::render::mask::{
    ChannelBinding, ClipChain, MASK_CHANNELS, MaskBindings, MaskChannel, MaskOp, MaskSource,
    MaskedSource,
};
use inkpass_engine::render::{
    BackendCall, ImageHandle, PassKey, RecordingBackend, Skip, TargetHandle, Topology,
};

const A: ImageHandle = ImageHandle(1);
const B: ImageHandle = ImageHandle(2);

fn context() -> DrawContext<RecordingBackend> {
    let mut backend = RecordingBackend::ready();
    backend.register_image(A);
    backend.register_image(B);
    DrawContext::new(backend, DrawConfig::default())
}

fn viewport() -> Viewport {
    Viewport::new(320.0, 200.0)
}

fn tri() -> [Vertex; 3] {
    [Vec2::new(0.0, 0.0), Vec2::new(30.0, 0.0), Vec2::new(0.0, 30.0)].map(Vertex::new)
}

fn textured(image: ImageHandle) -> PassKey {
    PassKey::Textured { tint: Color::WHITE, image }
}

fn last_masked_bindings(ctx: &DrawContext<RecordingBackend>) -> MaskBindings {
    ctx.backend()
        .bound_keys()
        .into_iter()
        .rev()
        .find_map(|k| k.mask_bindings().copied())
        .expect("a masked pass was bound")
}

// ── batching ──────────────────────────────────────────────────────────────

#[test]
fn three_textured_quads_share_one_bind() {
    let mut ctx = context();
    {
        let mut frame = ctx.frame(viewport());
        let verts = tri();
        for _ in 0..3 {
            frame.draw(&Geometry::screen(Topology::Triangles, &verts), textured(A)).unwrap();
        }
    }
    assert_eq!(ctx.backend().binds(), 1);
    assert_eq!(ctx.backend().flushes(), 1);
}

#[test]
fn image_switch_costs_a_second_bind() {
    let mut ctx = context();
    {
        let mut frame = ctx.frame(viewport());
        let verts = tri();
        frame.draw(&Geometry::screen(Topology::Triangles, &verts), textured(A)).unwrap();
        frame.draw(&Geometry::screen(Topology::Triangles, &verts), textured(B)).unwrap();
    }
    assert_eq!(ctx.backend().binds(), 2);
    assert_eq!(ctx.backend().flushes(), 2);
}

#[test]
fn color_epsilon_boundary_is_strict() {
    let mut ctx = context();
    let eps = DrawConfig::default().tolerances.color;
    {
        let mut frame = ctx.frame(viewport());
        let verts = tri();
        let flat = |g: f32| PassKey::Flat { tint: Color::from_premul(0.5, g, 0.5, 1.0) };
        frame.draw(&Geometry::screen(Topology::Triangles, &verts), flat(0.5)).unwrap();
        frame.draw(&Geometry::screen(Topology::Triangles, &verts), flat(0.5 + eps * 0.5)).unwrap();
        frame.draw(&Geometry::screen(Topology::Triangles, &verts), flat(0.5 + eps)).unwrap();
    }
    // The second merges into the first; a difference of exactly epsilon does not.
    assert_eq!(ctx.backend().binds(), 2);
}

// ── masks ─────────────────────────────────────────────────────────────────

#[test]
fn mask_then_consume_with_channel_one() {
    let mut ctx = context();
    let mut frame = ctx.frame(viewport());
    let mut mask = frame.lease_mask(320, 200).unwrap();
    let t = mask.id();
    let handle = mask.compositor().pool().handle(t).unwrap();
    let verts = tri();

    mask.render_into_mask(t, &Geometry::screen(Topology::Triangles, &verts), &MaskSource::default(), true, true)
        .unwrap();

    let mut channels = [None; MASK_CHANNELS];
    channels[0] = Some(MaskChannel::new(t, MaskOp::Multiply));
    mask.render_with_received_masks(
        &Geometry::screen(Topology::Triangles, &verts),
        &MaskedSource::textured(Color::WHITE, A),
        &ClipChain::default(),
        &channels,
    )
    .unwrap();

    let b = last_masked_bindings(&mask);
    assert_eq!(b.channels[0], ChannelBinding { ratio: 1.0, target: Some(handle), op_code: MaskOp::Multiply.code() });
}

#[test]
fn mask_then_consume_without_channel_one() {
    let mut ctx = context();
    let mut frame = ctx.frame(viewport());
    let mut mask = frame.lease_mask(320, 200).unwrap();
    let t = mask.id();
    let verts = tri();

    mask.render_into_mask(t, &Geometry::screen(Topology::Triangles, &verts), &MaskSource::default(), true, true)
        .unwrap();
    mask.render_with_received_masks(
        &Geometry::screen(Topology::Triangles, &verts),
        &MaskedSource::textured(Color::WHITE, A),
        &ClipChain::default(),
        &[None; MASK_CHANNELS],
    )
    .unwrap();

    let b = last_masked_bindings(&mask);
    assert_eq!(b.channels[0], ChannelBinding { ratio: 0.0, target: None, op_code: 0 });
}

#[test]
fn mask_cleared_once_across_producers_and_again_after_reuse() {
    let mut ctx = context();
    let mut frame = ctx.frame(viewport());
    let mut mask = frame.lease_mask(64, 64).unwrap();
    let t = mask.id();
    let handle = mask.compositor().pool().handle(t).unwrap();
    let verts = tri();

    for _ in 0..3 {
        mask.render_into_mask(t, &Geometry::screen(Topology::Triangles, &verts), &MaskSource::default(), false, true)
            .unwrap();
    }
    assert_eq!(mask.backend().clears_of(handle), 1);

    mask.compositor_mut().mark_for_reuse(t);
    mask.render_into_mask(t, &Geometry::screen(Topology::Triangles, &verts), &MaskSource::default(), false, true)
        .unwrap();
    assert_eq!(mask.backend().clears_of(handle), 2);
}

// ── deactivation on every exit path ───────────────────────────────────────

fn produce_then(ctx: &mut DrawContext<RecordingBackend>, fail: bool) -> Result<(), Skip> {
    let mut frame = ctx.frame(viewport());
    let mut mask = frame.lease_mask(64, 64)?;
    let t = mask.id();
    let verts = tri();
    mask.render_into_mask(t, &Geometry::screen(Topology::Triangles, &verts), &MaskSource::default(), true, true)?;
    if fail {
        mask.render_into_mask(t, &Geometry::screen(Topology::Triangles, &verts[..2]), &MaskSource::default(), true, true)?;
    }
    Ok(())
}

#[test]
fn deactivated_once_on_normal_exit() {
    let mut ctx = context();
    produce_then(&mut ctx, false).unwrap();
    assert_eq!(ctx.backend().deactivations_of(TargetHandle(0)), 1);
    assert_eq!(ctx.compositor().stats().releases, 1);
}

#[test]
fn deactivated_once_on_early_return() {
    let mut ctx = context();
    assert_eq!(produce_then(&mut ctx, true), Err(Skip::DegenerateGeometry));
    assert_eq!(ctx.backend().deactivations_of(TargetHandle(0)), 1);
    assert_eq!(ctx.compositor().stats().releases, 1);
}

#[test]
fn deactivated_once_while_unwinding() {
    let mut ctx = context();
    let result = catch_unwind(AssertUnwindSafe(|| {
        let mut frame = ctx.frame(viewport());
        let mut mask = frame.lease_mask(64, 64).unwrap();
        let t = mask.id();
        let verts = tri();
        mask.render_into_mask(t, &Geometry::screen(Topology::Triangles, &verts), &MaskSource::default(), true, true)
            .unwrap();
        panic!("drawable failed mid-frame");
    }));
    assert!(result.is_err());
    assert_eq!(ctx.backend().deactivations_of(TargetHandle(0)), 1);
    assert_eq!(ctx.compositor().pool().live_count(), 0);
    assert!(!ctx.batcher().is_open());
}

// ── viewport ──────────────────────────────────────────────────────────────

#[test]
fn culled_world_line_touches_nothing() {
    let mut ctx = context();
    {
        let mut frame = ctx.frame(viewport());
        frame.draw_line(Vec2::new(5_000.0, 0.0), Vec2::new(6_000.0, 0.0), Color::BLACK).unwrap();
    }
    assert_eq!(ctx.backend().binds(), 0);
}

#[test]
fn viewport_clip_is_pushed_before_the_next_bind() {
    let mut ctx = context();
    let placed = viewport().with_placement(Vec2::new(160.0, 0.0), Vec2::new(640.0, 400.0));
    {
        let mut frame = ctx.frame(placed);
        let verts = tri();
        frame.draw(&Geometry::screen(Topology::Triangles, &verts), textured(A)).unwrap();
    }
    let calls = ctx.backend().calls();
    let clip = calls.iter().position(|c| matches!(c, BackendCall::SetClipRect(_))).unwrap();
    let bind = calls.iter().position(|c| matches!(c, BackendCall::Bind { .. })).unwrap();
    assert!(clip < bind);
    assert_eq!(
        calls[clip],
        BackendCall::SetClipRect(inkpass_engine::coords::Rect::new(0.25, 0.0, 0.5, 0.5))
    );
}
