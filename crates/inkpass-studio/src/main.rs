use anyhow::{Context, Result};

use inkpass_engine::coords::{Affine, Vec2, Viewport};
use inkpass_engine::device::{GpuInit, HeadlessGpu};
use inkpass_engine::frame::{DrawConfig, DrawContext, Geometry, Vertex};
use inkpass_engine::logging::{LoggingConfig, init_logging};
use inkpass_engine::paint::Color;
use inkpass_engine::render::gpu::{ProgramSource, WgpuBackend, WgpuBackendConfig};
use inkpass_engine::render::mask::{
    ClipChain, MASK_CHANNELS, MaskChannel, MaskOp, MaskSource, MaskedSource,
};
use inkpass_engine::render::{ImageHandle, PassKey, Skip, Topology};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 400;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let gpu = HeadlessGpu::new_blocking(GpuInit {
        force_fallback_adapter: std::env::var_os("INKPASS_FALLBACK_ADAPTER").is_some(),
        ..Default::default()
    })?;

    let config = WgpuBackendConfig::default();
    let output = gpu
        .create_output(WIDTH, HEIGHT, config.output_format)
        .context("failed to create the frame output")?;

    let mut backend = WgpuBackend::new(gpu.device(), gpu.queue(), config);
    let shader = gpu.device().create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("inkpass passes"),
        source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/passes.wgsl").into()),
    });
    backend.register_all_programs(&ProgramSource {
        module: &shader,
        vs_entry: "vs_main",
        fs_entry: "fs_main",
    });
    let image = backend
        .upload_image(32, 32, &checkerboard(32, 4))
        .context("checkerboard upload was rejected")?;

    backend.begin_frame(output.view.clone(), output.width, output.height);

    let mut ctx = DrawContext::new(backend, DrawConfig::default());
    let viewport = Viewport::new(WIDTH as f32, HEIGHT as f32).with_zoom(1.5);
    if let Err(skip) = draw_scene(&mut ctx, viewport, image) {
        log::warn!("scene drawn partially: {skip}");
    }

    let stats = ctx.batcher().stats();
    let masks = ctx.compositor().stats();
    log::info!(
        "binds {} · flushes {} · merged {} · vertices {} · skipped {}",
        stats.binds, stats.flushes, stats.merged, stats.vertices, stats.skipped
    );
    log::info!(
        "mask clears {} · activations {} · deactivations {} · releases {}",
        masks.clears, masks.activations, masks.deactivations, masks.releases
    );

    ctx.backend_mut().end_frame();
    Ok(())
}

fn draw_scene(ctx: &mut DrawContext<WgpuBackend>, viewport: Viewport, image: ImageHandle) -> Result<(), Skip> {
    let mut frame = ctx.frame(viewport);

    // Workspace grid: one merged line pass.
    let grid = Color::from_srgb_u8(60, 60, 72, 255);
    for i in -20..=20 {
        let c = i as f32 * 20.0;
        frame.draw_line(Vec2::new(c, -400.0), Vec2::new(c, 400.0), grid)?;
        frame.draw_line(Vec2::new(-400.0, c), Vec2::new(400.0, c), grid)?;
    }

    // Icon row: identical keys, one bind.
    for i in 0..8 {
        let q = quad(Vec2::new(-140.0 + i as f32 * 40.0, -90.0), 14.0);
        frame.draw(&Geometry::world(Topology::Triangles, &q), PassKey::Textured { tint: Color::WHITE, image })?;
    }

    // A rotated layer cut by a circular mask.
    {
        let mut mask = frame.lease_mask(WIDTH, HEIGHT)?;
        let id = mask.id();
        let circle = disc(Vec2::zero(), 70.0, 48);
        mask.render_into_mask(id, &Geometry::world(Topology::Triangles, &circle), &MaskSource::default(), true, true)?;

        let mut channels: [Option<MaskChannel>; MASK_CHANNELS] = [None; MASK_CHANNELS];
        channels[0] = Some(MaskChannel::new(id, MaskOp::Multiply));
        let layer = quad(Vec2::zero(), 90.0);
        mask.render_with_received_masks(
            &Geometry::local(Topology::Triangles, Affine::rotate(0.3), &layer),
            &MaskedSource::textured(Color::WHITE, image),
            &ClipChain::default(),
            &channels,
        )?;
    }

    frame.draw_thick_line(Vec2::new(-120.0, 80.0), Vec2::new(120.0, 80.0), 3.0, Color::from_srgb_u8(230, 120, 40, 255))?;
    Ok(())
}

/// Two triangles covering `center ± half`, uv 0..1.
fn quad(center: Vec2, half: f32) -> [Vertex; 6] {
    let corner = |sx: f32, sy: f32| {
        Vertex::new(center + Vec2::new(sx * half, sy * half)).with_uv(Vec2::new((sx + 1.0) * 0.5, (sy + 1.0) * 0.5))
    };
    let (a, b, c, d) = (corner(-1.0, -1.0), corner(1.0, -1.0), corner(1.0, 1.0), corner(-1.0, 1.0));
    [a, b, c, a, c, d]
}

/// Triangle-list fan approximating a circle.
fn disc(center: Vec2, radius: f32, segments: u32) -> Vec<Vertex> {
    let step = std::f32::consts::TAU / segments as f32;
    let at = |i: u32| {
        let t = i as f32 * step;
        Vertex::new(center + Vec2::new(t.cos() * radius, t.sin() * radius))
    };
    (0..segments)
        .flat_map(|i| [Vertex::new(center), at(i), at(i + 1)])
        .collect()
}

fn checkerboard(size: u32, cell: u32) -> Vec<u8> {
    let mut px = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let on = ((x / cell) + (y / cell)) % 2 == 0;
            px.extend_from_slice(if on { &[235, 235, 235, 255] } else { &[40, 40, 48, 255] });
        }
    }
    px
}
