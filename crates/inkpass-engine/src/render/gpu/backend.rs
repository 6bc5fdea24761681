use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::coords::{Rect, Vec2};
use crate::render::{
    ImageHandle, PassBackend, PassFamily, PassKey, PassVertex, TargetHandle, Topology,
};

use super::uniform::{PassUniform, blend_for, normalized_to_scissor, pass_viewport, vertex_layout};

/// Binding slots of the shared bind group.
const SLOT_UNIFORM: u32 = 0;
const SLOT_SAMPLER: u32 = 1;
const SLOT_IMAGE: u32 = 2;
const SLOT_CHANNELS: u32 = 3; // 3..=6
const SLOT_CLIP_PARENT: u32 = 7;
const SLOT_SEE_THROUGH: u32 = 8;

#[derive(Debug, Clone)]
pub struct WgpuBackendConfig {
    /// Format of the frame output views passed to [`WgpuBackend::begin_frame`].
    pub output_format: wgpu::TextureFormat,
    /// Format of off-screen mask targets.
    pub mask_format: wgpu::TextureFormat,
    /// Prefix for wgpu object labels.
    pub label: String,
}

impl Default for WgpuBackendConfig {
    fn default() -> Self {
        Self {
            output_format: wgpu::TextureFormat::Rgba8Unorm,
            mask_format: wgpu::TextureFormat::Rgba8Unorm,
            label: "inkpass".to_owned(),
        }
    }
}

/// Shader entry points for one pass family.
///
/// Every program shares the backend's pipeline layout (see [`WgpuBackend::pipeline_layout`])
/// and the [`PassVertex`] layout at vertex buffer 0.
pub struct ProgramSource<'a> {
    pub module: &'a wgpu::ShaderModule,
    pub vs_entry: &'a str,
    pub fs_entry: &'a str,
}

struct Program {
    lines: wgpu::RenderPipeline,
    triangles: wgpu::RenderPipeline,
    format: wgpu::TextureFormat,
}

struct Target {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

struct FrameState {
    encoder: wgpu::CommandEncoder,
    output: wgpu::TextureView,
    width: u32,
    height: u32,
}

/// [`PassBackend`] on wgpu.
///
/// Every flushed pass becomes one render pass with `LoadOp::Load` into the
/// active mask target, or into the frame output when none is active.
/// Commands are recorded between [`begin_frame`](Self::begin_frame) and
/// [`end_frame`](Self::end_frame); calls outside a frame are dropped.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: WgpuBackendConfig,

    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    fallback_view: wgpu::TextureView,

    programs: HashMap<PassFamily, Program>,
    images: HashMap<ImageHandle, wgpu::TextureView>,
    next_image: u32,
    targets: HashMap<TargetHandle, Target>,
    next_target: u32,

    frame: Option<FrameState>,
    active: Option<TargetHandle>,
    clip_rect: Rect,
    canvas_size: Option<Vec2>,
    current: Option<(Topology, PassKey)>,
    vertices: Vec<PassVertex>,

    warned_no_frame: bool,
    warned_format: bool,
}

impl WgpuBackend {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, config: WgpuBackendConfig) -> Self {
        let bind_group_layout = create_bind_group_layout(device, &config.label);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{} pipeline layout", config.label)),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{} sampler", config.label)),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        // Bound to every slot that has nothing to sample; transparent black.
        let fallback = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("{} fallback", config.label)),
            size: wgpu::Extent3d { width: 1, height: 1, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let fallback_view = fallback.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            device: device.clone(),
            queue: queue.clone(),
            config,
            bind_group_layout,
            pipeline_layout,
            sampler,
            fallback_view,
            programs: HashMap::new(),
            images: HashMap::new(),
            next_image: 0,
            targets: HashMap::new(),
            next_target: 0,
            frame: None,
            active: None,
            clip_rect: Rect::UNIT,
            canvas_size: None,
            current: None,
            vertices: Vec::new(),
            warned_no_frame: false,
            warned_format: false,
        }
    }

    /// Layout every registered program must be compatible with.
    #[inline]
    pub fn pipeline_layout(&self) -> &wgpu::PipelineLayout {
        &self.pipeline_layout
    }

    #[inline]
    pub fn config(&self) -> &WgpuBackendConfig {
        &self.config
    }

    // ── registration ──────────────────────────────────────────────────────

    /// Builds line and triangle pipelines for `family`.
    ///
    /// Mask-writing families render into the mask format, all others into
    /// the output format.
    pub fn register_program(&mut self, family: PassFamily, source: &ProgramSource<'_>) {
        let format = if family.writes_mask() { self.config.mask_format } else { self.config.output_format };
        let label = format!("{} {family:?}", self.config.label);

        let build = |topology: wgpu::PrimitiveTopology| {
            self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&label),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: source.module,
                    entry_point: Some(source.vs_entry),
                    compilation_options: Default::default(),
                    buffers: &[vertex_layout()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: source.module,
                    entry_point: Some(source.fs_entry),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(blend_for(family)),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            })
        };

        let program = Program {
            lines: build(wgpu::PrimitiveTopology::LineList),
            triangles: build(wgpu::PrimitiveTopology::TriangleList),
            format,
        };
        self.programs.insert(family, program);
        log::debug!("registered program for {family:?}");
    }

    /// Registers one shader for every family (programs that branch on the family code).
    pub fn register_all_programs(&mut self, source: &ProgramSource<'_>) {
        for family in PassFamily::ALL {
            self.register_program(family, source);
        }
    }

    /// Registers an existing view as a lookup image.
    pub fn register_image(&mut self, view: wgpu::TextureView) -> ImageHandle {
        let handle = ImageHandle(self.next_image);
        self.next_image += 1;
        self.images.insert(handle, view);
        handle
    }

    /// Uploads tightly packed RGBA8 pixels as a new lookup image.
    ///
    /// Returns `None` when `rgba` does not hold `width × height` pixels.
    pub fn upload_image(&mut self, width: u32, height: u32, rgba: &[u8]) -> Option<ImageHandle> {
        if width == 0 || height == 0 || rgba.len() != (width as usize) * (height as usize) * 4 {
            log::debug!("image upload rejected: {width}×{height} with {} bytes", rgba.len());
            return None;
        }

        let size = wgpu::Extent3d { width, height, depth_or_array_layers: 1 };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("{} image", self.config.label)),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            size,
        );

        Some(self.register_image(texture.create_view(&wgpu::TextureViewDescriptor::default())))
    }

    /// Backing texture of a target, for readback or export.
    pub fn target_texture(&self, target: TargetHandle) -> Option<&wgpu::Texture> {
        self.targets.get(&target).map(|t| &t.texture)
    }

    // ── frame ─────────────────────────────────────────────────────────────

    /// Starts recording into `output` (`width × height`, in the output format).
    ///
    /// An unfinished previous frame is submitted first.
    pub fn begin_frame(&mut self, output: wgpu::TextureView, width: u32, height: u32) {
        if self.frame.is_some() {
            log::warn!("begin_frame called with a frame still open; submitting it");
            self.end_frame();
        }
        let encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(&format!("{} frame encoder", self.config.label)),
        });
        self.frame = Some(FrameState { encoder, output, width, height });
    }

    /// Submits the recorded frame. Returns `false` if no frame was open.
    pub fn end_frame(&mut self) -> bool {
        let Some(frame) = self.frame.take() else { return false };
        if self.current.is_some() {
            log::debug!("end_frame with an unflushed pass; its vertices are dropped");
            self.current = None;
            self.vertices.clear();
        }
        self.queue.submit(Some(frame.encoder.finish()));
        true
    }

    fn view_for(&self, target: Option<TargetHandle>) -> &wgpu::TextureView {
        target
            .and_then(|t| self.targets.get(&t))
            .map_or(&self.fallback_view, |t| &t.view)
    }

    fn build_bind_group(&self, key: &PassKey, uniform: &PassUniform) -> wgpu::BindGroup {
        let ubo = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} pass ubo", self.config.label)),
            contents: bytemuck::bytes_of(uniform),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let image = key
            .image()
            .and_then(|i| self.images.get(&i))
            .unwrap_or(&self.fallback_view);

        let bindings = key.mask_bindings().copied().unwrap_or_default();
        let channel_views = bindings.channels.map(|ch| self.view_for(ch.target));
        let clip_parent = self.view_for(bindings.clip_parent);
        let see_through = self.view_for(bindings.see_through.map(|s| s.target));

        let mut entries = vec![
            wgpu::BindGroupEntry { binding: SLOT_UNIFORM, resource: ubo.as_entire_binding() },
            wgpu::BindGroupEntry {
                binding: SLOT_SAMPLER,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            },
            wgpu::BindGroupEntry {
                binding: SLOT_IMAGE,
                resource: wgpu::BindingResource::TextureView(image),
            },
        ];
        for (i, view) in channel_views.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: SLOT_CHANNELS + i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        entries.push(wgpu::BindGroupEntry {
            binding: SLOT_CLIP_PARENT,
            resource: wgpu::BindingResource::TextureView(clip_parent),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: SLOT_SEE_THROUGH,
            resource: wgpu::BindingResource::TextureView(see_through),
        });

        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} pass bind group", self.config.label)),
            layout: &self.bind_group_layout,
            entries: &entries,
        })
    }

    fn note_no_frame(&mut self) {
        if !self.warned_no_frame {
            log::debug!("draw recorded outside begin_frame/end_frame; dropped");
            self.warned_no_frame = true;
        }
    }
}

impl PassBackend for WgpuBackend {
    fn is_ready(&self) -> bool {
        PassFamily::ALL.iter().all(|f| self.programs.contains_key(f))
    }

    fn has_image(&self, image: ImageHandle) -> bool {
        self.images.contains_key(&image)
    }

    fn set_clip_rect(&mut self, clip: Rect) {
        self.clip_rect = clip;
    }

    fn set_canvas_size(&mut self, size: Vec2) {
        self.canvas_size = Some(size);
    }

    fn bind(&mut self, topology: Topology, key: &PassKey) {
        self.current = Some((topology, key.clone()));
        self.vertices.clear();
    }

    fn push_vertex(&mut self, vertex: PassVertex) {
        self.vertices.push(vertex);
    }

    fn end_primitives(&mut self) {
        let Some((topology, key)) = self.current.take() else { return };
        if self.vertices.is_empty() {
            return;
        }
        if self.frame.is_none() {
            self.vertices.clear();
            self.note_no_frame();
            return;
        }
        let Some(program) = self.programs.get(&key.family()) else {
            self.vertices.clear();
            return;
        };

        // Destination: the active mask target, else the frame output.
        let Some(frame) = self.frame.as_ref() else { return };
        let frame_size = (frame.width, frame.height);
        let (target_size, dest_format, clip) = match self.active.and_then(|t| self.targets.get(&t)) {
            Some(t) => (Some((t.width, t.height)), self.config.mask_format, Rect::UNIT),
            None => (None, self.config.output_format, self.clip_rect),
        };
        let dest_size = target_size.unwrap_or(frame_size);
        if program.format != dest_format {
            if !self.warned_format {
                log::warn!("{:?} cannot draw into a {dest_format:?} destination; dropped", key.family());
                self.warned_format = true;
            }
            self.vertices.clear();
            return;
        }
        let Some((sx, sy, sw, sh)) = normalized_to_scissor(clip, dest_size.0, dest_size.1) else {
            self.vertices.clear();
            return;
        };

        let viewport = pass_viewport(target_size, self.canvas_size, frame_size);
        let uniform = PassUniform::new(&key, viewport, clip);
        let bind_group = self.build_bind_group(&key, &uniform);
        let vbo = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} pass vbo", self.config.label)),
            contents: bytemuck::cast_slice(&self.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let count = self.vertices.len() as u32;
        self.vertices.clear();

        let pipeline = match topology {
            Topology::Lines => &program.lines,
            Topology::Triangles => &program.triangles,
        };
        let target_view = self.active.and_then(|t| self.targets.get(&t)).map(|t| &t.view);
        let Some(frame) = self.frame.as_mut() else { return };
        let view = target_view.unwrap_or(&frame.output);

        let mut rpass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("inkpass pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, &bind_group, &[]);
        rpass.set_vertex_buffer(0, vbo.slice(..));
        rpass.set_scissor_rect(sx, sy, sw, sh);
        rpass.draw(0..count, 0..1);
    }

    fn create_target(&mut self, width: u32, height: u32) -> Option<TargetHandle> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return None;
        }
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("{} mask target", self.config.label)),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.config.mask_format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let handle = TargetHandle(self.next_target);
        self.next_target += 1;
        self.targets.insert(handle, Target { texture, view, width, height });
        Some(handle)
    }

    fn destroy_target(&mut self, target: TargetHandle) {
        if self.active == Some(target) {
            self.active = None;
        }
        if let Some(t) = self.targets.remove(&target) {
            t.texture.destroy();
        }
    }

    fn activate_target(&mut self, target: TargetHandle) {
        self.active = Some(target);
    }

    fn deactivate_target(&mut self) {
        self.active = None;
    }

    fn clear_target(&mut self, target: TargetHandle) {
        if self.frame.is_none() {
            self.note_no_frame();
            return;
        }
        let Some(view) = self.targets.get(&target).map(|t| &t.view) else { return };
        let Some(frame) = self.frame.as_mut() else { return };
        let _ = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("inkpass clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
    }
}

fn create_bind_group_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    };

    let mut entries = vec![
        wgpu::BindGroupLayoutEntry {
            binding: SLOT_UNIFORM,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: PassUniform::min_binding_size(),
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: SLOT_SAMPLER,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        },
        texture_entry(SLOT_IMAGE),
    ];
    entries.extend((0..4).map(|i| texture_entry(SLOT_CHANNELS + i)));
    entries.push(texture_entry(SLOT_CLIP_PARENT));
    entries.push(texture_entry(SLOT_SEE_THROUGH));

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(&format!("{label} bgl")),
        entries: &entries,
    })
}
