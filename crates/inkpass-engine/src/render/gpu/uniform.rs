//! Per-pass uniform block and the fixed pipeline state shared by every program.

use bytemuck::{Pod, Zeroable};

use crate::coords::{Rect, Vec2};
use crate::render::{PassFamily, PassKey, PassVertex};

// ── blend ─────────────────────────────────────────────────────────────────

pub(super) fn premul_alpha_blend() -> wgpu::BlendState {
    let component = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState { color: component, alpha: component }
}

pub(super) fn additive_blend() -> wgpu::BlendState {
    let component = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState { color: component, alpha: component }
}

pub(super) fn blend_for(family: PassFamily) -> wgpu::BlendState {
    match family {
        PassFamily::SpriteAdditive => additive_blend(),
        _ => premul_alpha_blend(),
    }
}

// ── vertex layout ─────────────────────────────────────────────────────────

const VERTEX_ATTRS: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2, 2 => Float32x4];

pub(super) fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<PassVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRS,
    }
}

// ── pass uniform ──────────────────────────────────────────────────────────

/// Uniform block bound at slot 0 of every pass. Mirrors `PassUniform` in WGSL.
///
/// `flags` = `[family code, has image, has clip parent, has see-through]`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(super) struct PassUniform {
    pub viewport: [f32; 2],
    pub vertex_color_ratio: f32,
    pub see_through_alpha: f32,
    pub clip_rect: [f32; 4],
    pub tint: [f32; 4],
    pub overlay: [f32; 4],
    pub channel_ratio: [f32; 4],
    pub channel_op: [u32; 4],
    pub flags: [u32; 4],
}

impl PassUniform {
    pub(super) fn new(key: &PassKey, viewport: [f32; 2], clip: Rect) -> Self {
        let overlay = key.overlay().unwrap_or_default();
        let mut uniform = Self {
            viewport,
            vertex_color_ratio: key.vertex_color_ratio(),
            see_through_alpha: 0.0,
            clip_rect: clip.to_array(),
            tint: key.tint().to_array(),
            overlay: [overlay.thickness, overlay.shape_ratio, overlay.offset.x, overlay.offset.y],
            channel_ratio: [0.0; 4],
            channel_op: [0; 4],
            flags: [key.family().code(), key.image().is_some() as u32, 0, 0],
        };

        if let Some(bindings) = key.mask_bindings() {
            for (i, ch) in bindings.channels.iter().enumerate() {
                uniform.channel_ratio[i] = ch.ratio;
                uniform.channel_op[i] = ch.op_code;
            }
            uniform.flags[2] = bindings.clip_parent.is_some() as u32;
            if let Some(see) = bindings.see_through {
                uniform.flags[3] = 1;
                uniform.see_through_alpha = see.alpha;
            }
        }
        uniform
    }

    pub(super) fn min_binding_size() -> Option<wgpu::BufferSize> {
        wgpu::BufferSize::new(std::mem::size_of::<PassUniform>() as u64)
    }
}

/// Pixel space the vertex stage divides positions by.
///
/// Mask passes draw in the active target's pixels. Output passes draw in
/// canvas pixels; the clip rect then places the canvas inside the frame.
/// Without a valid canvas size the frame size is used.
pub(super) fn pass_viewport(target: Option<(u32, u32)>, canvas: Option<Vec2>, frame: (u32, u32)) -> [f32; 2] {
    if let Some((w, h)) = target {
        return [w as f32, h as f32];
    }
    match canvas {
        Some(c) if c.x > 0.0 && c.y > 0.0 && c.x.is_finite() && c.y.is_finite() => [c.x, c.y],
        _ => [frame.0 as f32, frame.1 as f32],
    }
}

// ── scissor ───────────────────────────────────────────────────────────────

/// Converts a normalized clip rect into a physical scissor for a `width × height`
/// attachment.
///
/// Returns `None` for a zero-area result (the draw is dropped).
pub(super) fn normalized_to_scissor(clip: Rect, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let (fw, fh) = (width as f32, height as f32);
    let r = clip.normalized();
    let x = ((r.origin.x * fw).max(0.0) as u32).min(width);
    let y = ((r.origin.y * fh).max(0.0) as u32).min(height);
    let x2 = (((r.origin.x + r.size.x) * fw).ceil().max(0.0) as u32).min(width);
    let y2 = (((r.origin.y + r.size.y) * fh).ceil().max(0.0) as u32).min(height);
    let (w, h) = (x2.saturating_sub(x), y2.saturating_sub(y));
    if w == 0 || h == 0 { None } else { Some((x, y, w, h)) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::Color;
    use crate::render::mask::{ChannelBinding, MaskBindings, MaskOp, SeeThroughBinding};
    use crate::render::{ImageHandle, MaskedVariant, Overlay, TargetHandle};

    #[test]
    fn uniform_layout_is_std140_sized() {
        assert_eq!(std::mem::size_of::<PassUniform>(), 112);
        assert_eq!(std::mem::size_of::<PassUniform>() % 16, 0);
    }

    #[test]
    fn unmasked_key_leaves_channels_disabled() {
        let key = PassKey::Textured { tint: Color::WHITE, image: ImageHandle(1) };
        let u = PassUniform::new(&key, [640.0, 480.0], Rect::UNIT);
        assert_eq!(u.channel_ratio, [0.0; 4]);
        assert_eq!(u.channel_op, [0; 4]);
        assert_eq!(u.flags, [PassFamily::Textured.code(), 1, 0, 0]);
    }

    #[test]
    fn masked_key_carries_bindings() {
        let mut bindings = MaskBindings::default();
        bindings.channels[1] = ChannelBinding::enabled(TargetHandle(3), MaskOp::Invert);
        bindings.clip_parent = Some(TargetHandle(4));
        bindings.see_through = Some(SeeThroughBinding { target: TargetHandle(5), alpha: 0.5 });
        let key = PassKey::Masked {
            variant: MaskedVariant::Clipped,
            tint: Color::WHITE,
            image: None,
            overlay: Overlay::default(),
            bindings,
        };
        let u = PassUniform::new(&key, [1.0, 1.0], Rect::UNIT);
        assert_eq!(u.channel_ratio, [0.0, 1.0, 0.0, 0.0]);
        assert_eq!(u.channel_op, [0, 2, 0, 0]);
        assert_eq!(u.flags, [PassFamily::Clipped.code(), 0, 1, 1]);
        assert_eq!(u.see_through_alpha, 0.5);
    }

    // ── scissor ───────────────────────────────────────────────────────────

    #[test]
    fn unit_clip_covers_the_attachment() {
        assert_eq!(normalized_to_scissor(Rect::UNIT, 800, 600), Some((0, 0, 800, 600)));
    }

    #[test]
    fn placed_clip_maps_to_pixels() {
        let clip = Rect::new(0.25, 0.5, 0.5, 0.5);
        assert_eq!(normalized_to_scissor(clip, 800, 600), Some((200, 300, 400, 300)));
    }

    #[test]
    fn empty_clip_is_dropped() {
        assert_eq!(normalized_to_scissor(Rect::new(0.5, 0.5, 0.0, 0.5), 800, 600), None);
        assert_eq!(normalized_to_scissor(Rect::new(2.0, 0.0, 1.0, 1.0), 800, 600), None);
    }

    // ── placement ─────────────────────────────────────────────────────────

    /// Host-area fraction a vertex lands at; mirrors `vs_main`.
    fn placed(pos: [f32; 2], u: &PassUniform) -> [f32; 2] {
        let n = [pos[0] / u.viewport[0], pos[1] / u.viewport[1]];
        [u.clip_rect[0] + n[0] * u.clip_rect[2], u.clip_rect[1] + n[1] * u.clip_rect[3]]
    }

    #[test]
    fn offset_canvas_lands_at_its_placement() {
        // 400×300 canvas at (200, 0) inside an 800×600 frame.
        let clip = Rect::new(0.25, 0.0, 0.5, 0.5);
        let viewport = pass_viewport(None, Some(Vec2::new(400.0, 300.0)), (800, 600));
        let u = PassUniform::new(&PassKey::Flat { tint: Color::WHITE }, viewport, clip);
        assert_eq!(placed([400.0, 300.0], &u), [0.75, 0.5]);
        assert_eq!(placed([0.0, 0.0], &u), [0.25, 0.0]);
    }

    #[test]
    fn mask_passes_use_the_target_size() {
        assert_eq!(pass_viewport(Some((64, 32)), Some(Vec2::new(400.0, 300.0)), (800, 600)), [64.0, 32.0]);
    }

    #[test]
    fn missing_canvas_size_falls_back_to_the_frame() {
        assert_eq!(pass_viewport(None, None, (800, 600)), [800.0, 600.0]);
        assert_eq!(pass_viewport(None, Some(Vec2::new(0.0, 300.0)), (800, 600)), [800.0, 600.0]);
    }
}
