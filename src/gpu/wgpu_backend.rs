//! wgpu implementation of the render backend
//!
//! Handles GPU initialization, resource tables and the per-frame command
//! encoder. Every draw call records its own render pass on the current target
//! so eye viewports and programs can be interleaved freely.

use std::collections::HashMap;
use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;
use wgpu::{
    BindGroup, BindGroupLayout, Buffer, Device, DeviceDescriptor, Instance, Queue, RenderPipeline,
    Sampler, Surface, SurfaceConfiguration, TextureFormat, TextureUsages,
};

use super::{DrawUniforms, MeshId, Program, RenderBackend, TextureId, Viewport};
use crate::distortion::{DistortionMesh, DistortionVertex, EyeTextureDescription};
use crate::error::{Error, Result};
use crate::mesh::{MeshVertex, TexturedMesh};
use crate::options::Eye;
use crate::services::ImageData;

pub const MESH_SHADER: &str = include_str!("../shaders/mesh.wgsl");
pub const LINES_SHADER: &str = include_str!("../shaders/lines.wgsl");
pub const DISTORTION_SHADER: &str = include_str!("../shaders/distortion.wgsl");

/// Uniform block shared by every shader
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct GpuUniforms {
    mvp: [[f32; 4]; 4],
    color_map: [[f32; 4]; 4],
    tint: [f32; 4],
}

impl GpuUniforms {
    fn new(mvp: Mat4, color_map: Mat4, tint: [f32; 4]) -> Self {
        Self {
            mvp: mvp.to_cols_array_2d(),
            color_map: color_map.to_cols_array_2d(),
            tint,
        }
    }
}

/// Uniform slots available per frame
const MAX_DRAWS_PER_FRAME: u64 = 256;

const MESH_ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];
const LINE_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
const DISTORTION_ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

struct GpuMesh {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    bind_group: BindGroup,
}

struct Frame {
    surface_texture: wgpu::SurfaceTexture,
    surface_view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
    /// `None` draws to the display
    target: Option<TextureId>,
    clear_pending: bool,
    viewport: Option<Viewport>,
    next_slot: u64,
}

pub struct WgpuBackend {
    surface: Surface<'static>,
    device: Device,
    queue: Queue,
    config: SurfaceConfiguration,

    video_pipeline: RenderPipeline,
    gui_pipeline: RenderPipeline,
    lines_pipeline: RenderPipeline,
    distortion_pipeline: RenderPipeline,

    uniform_buffer: Buffer,
    uniform_stride: u64,
    uniform_bind_group: BindGroup,
    texture_bind_group_layout: BindGroupLayout,
    sampler: Sampler,

    meshes: HashMap<MeshId, GpuMesh>,
    textures: HashMap<TextureId, GpuTexture>,
    distortion_meshes: [Option<GpuMesh>; 2],
    next_id: u32,

    frame: Option<Frame>,
}

impl WgpuBackend {
    /// Vulkan-only instance, as used on the device
    pub fn create_instance() -> Instance {
        Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::VULKAN,
            ..Default::default()
        })
    }

    pub async fn new(instance: &Instance, surface: Surface<'static>, width: u32, height: u32) -> Result<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(Error::AdapterNotFound)?;

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor::default(), None)
            .await
            .map_err(|e| Error::DeviceRequest(e.to_string()))?;

        device.on_uncaptured_error(Box::new(|e: wgpu::Error| log::error!("WgpuBackend: uncaptured error: {}", e)));

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .first()
            .copied()
            .ok_or_else(|| Error::Surface("surface reports no formats".into()))?;
        let alpha_mode = surface_caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        log::info!("WgpuBackend: surface {}x{} {:?}", config.width, config.height, surface_format);

        // --- Uniforms: one slot per draw, selected with a dynamic offset ---
        let uniform_size = std::mem::size_of::<GpuUniforms>() as u64;
        let alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment);
        let uniform_stride = uniform_size.div_ceil(alignment) * alignment;

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Draw Uniforms"),
            size: uniform_stride * MAX_DRAWS_PER_FRAME,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Uniform Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(uniform_size),
                },
                count: None,
            }],
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Uniform Bind Group"),
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &uniform_buffer,
                    offset: 0,
                    size: NonZeroU64::new(uniform_size),
                }),
            }],
        });

        // --- Textures ---
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let texture_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Texture Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        // --- Pipelines ---
        let textured_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Textured Pipeline Layout"),
            bind_group_layouts: &[&uniform_bind_group_layout, &texture_bind_group_layout],
            push_constant_ranges: &[],
        });
        let lines_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Lines Pipeline Layout"),
            bind_group_layouts: &[&uniform_bind_group_layout],
            push_constant_ranges: &[],
        });

        let mesh_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Mesh Shader"),
            source: wgpu::ShaderSource::Wgsl(MESH_SHADER.into()),
        });
        let lines_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Lines Shader"),
            source: wgpu::ShaderSource::Wgsl(LINES_SHADER.into()),
        });
        let distortion_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Distortion Shader"),
            source: wgpu::ShaderSource::Wgsl(DISTORTION_SHADER.into()),
        });

        let mesh_buffers = [wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &MESH_ATTRIBUTES,
        }];
        let line_buffers = [wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<[f32; 3]>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &LINE_ATTRIBUTES,
        }];
        let distortion_buffers = [wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<DistortionVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &DISTORTION_ATTRIBUTES,
        }];

        let video_pipeline = PipelineSpec {
            label: "Video Pipeline",
            layout: &textured_layout,
            shader: &mesh_shader,
            fragment_entry: "fs_video",
            buffers: &mesh_buffers,
            topology: wgpu::PrimitiveTopology::TriangleList,
            blend: wgpu::BlendState::REPLACE,
        }
        .create(&device, surface_format);

        let gui_pipeline = PipelineSpec {
            label: "GUI Pipeline",
            layout: &textured_layout,
            shader: &mesh_shader,
            fragment_entry: "fs_gui",
            buffers: &mesh_buffers,
            topology: wgpu::PrimitiveTopology::TriangleList,
            blend: wgpu::BlendState::ALPHA_BLENDING,
        }
        .create(&device, surface_format);

        let lines_pipeline = PipelineSpec {
            label: "Lines Pipeline",
            layout: &lines_layout,
            shader: &lines_shader,
            fragment_entry: "fs_main",
            buffers: &line_buffers,
            topology: wgpu::PrimitiveTopology::LineList,
            blend: wgpu::BlendState::REPLACE,
        }
        .create(&device, surface_format);

        let distortion_pipeline = PipelineSpec {
            label: "Distortion Pipeline",
            layout: &textured_layout,
            shader: &distortion_shader,
            fragment_entry: "fs_main",
            buffers: &distortion_buffers,
            topology: wgpu::PrimitiveTopology::TriangleList,
            blend: wgpu::BlendState::REPLACE,
        }
        .create(&device, surface_format);

        // Errors are collected per group of calls and drained by the renderer
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            video_pipeline,
            gui_pipeline,
            lines_pipeline,
            distortion_pipeline,
            uniform_buffer,
            uniform_stride,
            uniform_bind_group,
            texture_bind_group_layout,
            sampler,
            meshes: HashMap::new(),
            textures: HashMap::new(),
            distortion_meshes: [None, None],
            next_id: 1,
            frame: None,
        })
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn create_texture(&mut self, label: &str, width: u32, height: u32, format: TextureFormat, usage: TextureUsages) -> TextureId {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let entry = self.wrap_texture(label, texture);
        let id = TextureId(self.next_id());
        self.textures.insert(id, entry);
        id
    }

    fn wrap_texture(&self, label: &str, texture: wgpu::Texture) -> GpuTexture {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.texture_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&view) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(&self.sampler) },
            ],
        });
        GpuTexture { texture, view, bind_group }
    }

    fn write_pixels(&self, texture: &wgpu::Texture, image: &ImageData) {
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image.pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(image.width * 4),
                rows_per_image: Some(image.height),
            },
            wgpu::Extent3d { width: image.width, height: image.height, depth_or_array_layers: 1 },
        );
    }

    fn blank_texture(&mut self, label: &str) -> TextureId {
        let id = self.create_texture(
            label,
            1,
            1,
            TextureFormat::Rgba8UnormSrgb,
            TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
        );
        if let Some(entry) = self.textures.get(&id) {
            let black = ImageData { width: 1, height: 1, pixels: vec![0, 0, 0, 255] };
            self.write_pixels(&entry.texture, &black);
        }
        id
    }

    /// Writes one uniform slot and returns its dynamic offset
    fn push_uniforms(&mut self, uniforms: GpuUniforms) -> Option<u32> {
        let frame = self.frame.as_mut()?;
        if frame.next_slot >= MAX_DRAWS_PER_FRAME {
            log::warn!("WgpuBackend: more than {} draws in one frame, dropping", MAX_DRAWS_PER_FRAME);
            return None;
        }
        let offset = frame.next_slot * self.uniform_stride;
        frame.next_slot += 1;
        self.queue.write_buffer(&self.uniform_buffer, offset, bytemuck::bytes_of(&uniforms));
        u32::try_from(offset).ok()
    }

    fn current_target_size(&self) -> (u32, u32) {
        match self.frame.as_ref().and_then(|f| f.target) {
            Some(id) => self
                .textures
                .get(&id)
                .map(|t| (t.texture.width(), t.texture.height()))
                .unwrap_or((self.config.width, self.config.height)),
            None => (self.config.width, self.config.height),
        }
    }
}

/// Per-pipeline knobs; everything else is shared
struct PipelineSpec<'a> {
    label: &'a str,
    layout: &'a wgpu::PipelineLayout,
    shader: &'a wgpu::ShaderModule,
    fragment_entry: &'a str,
    buffers: &'a [wgpu::VertexBufferLayout<'a>],
    topology: wgpu::PrimitiveTopology,
    blend: wgpu::BlendState,
}

impl PipelineSpec<'_> {
    fn create(&self, device: &Device, format: TextureFormat) -> RenderPipeline {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(self.label),
            layout: Some(self.layout),
            vertex: wgpu::VertexState {
                module: self.shader,
                entry_point: Some("vs_main"),
                buffers: self.buffers,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: self.shader,
                entry_point: Some(self.fragment_entry),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(self.blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            // Meshes are viewed from inside, so nothing is culled
            primitive: wgpu::PrimitiveState {
                topology: self.topology,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }
}

/// Opens a render pass on the frame's current target, clearing it on first use
fn begin_pass<'f>(
    frame: &'f mut Frame,
    textures: &'f HashMap<TextureId, GpuTexture>,
    label: &'static str,
) -> Option<wgpu::RenderPass<'f>> {
    let view = match frame.target {
        Some(id) => &textures.get(&id)?.view,
        None => &frame.surface_view,
    };
    let load = if frame.clear_pending {
        wgpu::LoadOp::Clear(wgpu::Color::BLACK)
    } else {
        wgpu::LoadOp::Load
    };
    frame.clear_pending = false;

    let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations { load, store: wgpu::StoreOp::Store },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    if let Some(vp) = frame.viewport {
        pass.set_viewport(vp.x as f32, vp.y as f32, vp.width as f32, vp.height as f32, 0.0, 1.0);
    }
    Some(pass)
}

impl RenderBackend for WgpuBackend {
    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    fn upload_mesh(&mut self, mesh: &TexturedMesh) -> MeshId {
        let vertices = mesh.interleaved();
        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Indices"),
            contents: bytemuck::cast_slice(&padded_indices(mesh.indices())),
            usage: wgpu::BufferUsages::INDEX,
        });
        let id = MeshId(self.next_id());
        self.meshes.insert(
            id,
            GpuMesh { vertex_buffer, index_buffer, index_count: mesh.vertex_count() as u32 },
        );
        id
    }

    fn release_mesh(&mut self, mesh: MeshId) {
        if let Some(m) = self.meshes.remove(&mesh) {
            m.vertex_buffer.destroy();
            m.index_buffer.destroy();
        }
    }

    fn create_video_texture(&mut self) -> TextureId {
        self.blank_texture("Video Texture")
    }

    fn create_static_texture(&mut self, image: Option<&ImageData>) -> TextureId {
        let id = self.blank_texture("Static Texture");
        match image {
            Some(image) => self.upload_texture(id, image),
            None => log::warn!("WgpuBackend: no image data, using a blank texture"),
        }
        id
    }

    /// Recreates the texture when the frame size changes, then uploads the pixels
    fn upload_texture(&mut self, texture: TextureId, image: &ImageData) {
        if !image.is_consistent() {
            log::warn!(
                "WgpuBackend: ignoring {}x{} image with {} bytes",
                image.width,
                image.height,
                image.pixels.len()
            );
            return;
        }
        let Some(existing) = self.textures.get(&texture) else {
            log::warn!("WgpuBackend: upload to unknown texture {:?}", texture);
            return;
        };

        let size = existing.texture.size();
        if size.width != image.width || size.height != image.height {
            let resized = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Image Texture"),
                size: wgpu::Extent3d { width: image.width, height: image.height, depth_or_array_layers: 1 },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: TextureFormat::Rgba8UnormSrgb,
                usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
                view_formats: &[],
            });
            let entry = self.wrap_texture("Image Texture", resized);
            self.textures.insert(texture, entry);
        }

        if let Some(entry) = self.textures.get(&texture) {
            self.write_pixels(&entry.texture, image);
        }
    }

    fn create_render_target(&mut self, width: u32, height: u32) -> TextureId {
        let id = self.create_texture(
            "Offscreen Texture",
            width.max(1),
            height.max(1),
            self.config.format,
            TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING,
        );
        log::info!("WgpuBackend: render target {:?} {}x{}", id, width, height);
        id
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if let Some(entry) = self.textures.remove(&texture) {
            entry.texture.destroy();
        }
    }

    fn set_distortion_mesh(&mut self, eye: Eye, mesh: &DistortionMesh) {
        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Distortion Vertices"),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Distortion Indices"),
            contents: bytemuck::cast_slice(&padded_indices(&mesh.indices)),
            usage: wgpu::BufferUsages::INDEX,
        });
        self.distortion_meshes[eye.index()] = Some(GpuMesh {
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
        });
    }

    fn begin_frame(&mut self, target: Option<TextureId>) -> bool {
        if self.frame.is_some() {
            log::warn!("WgpuBackend: begin_frame while a frame is open, finishing it");
            self.end_frame();
        }

        let surface_texture = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(e) => {
                log::warn!("WgpuBackend: failed to acquire surface texture: {}", e);
                self.surface.configure(&self.device, &self.config);
                return false;
            }
        };
        let surface_view = surface_texture.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });

        self.frame = Some(Frame {
            surface_texture,
            surface_view,
            encoder,
            target,
            clear_pending: true,
            viewport: None,
            next_slot: 0,
        });
        true
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        let (width, height) = self.current_target_size();
        let clamped = Viewport {
            x: viewport.x.min(width),
            y: viewport.y.min(height),
            width: viewport.width.min(width.saturating_sub(viewport.x)),
            height: viewport.height.min(height.saturating_sub(viewport.y)),
        };
        if let Some(frame) = self.frame.as_mut() {
            frame.viewport = Some(clamped);
        }
    }

    fn draw_mesh(&mut self, mesh: MeshId, texture: TextureId, program: Program, uniforms: &DrawUniforms) {
        let tint = [1.0; 4];
        let Some(offset) = self.push_uniforms(GpuUniforms::new(uniforms.mvp, uniforms.color_map, tint)) else {
            return;
        };
        let (Some(gpu_mesh), Some(gpu_texture)) = (self.meshes.get(&mesh), self.textures.get(&texture)) else {
            log::warn!("WgpuBackend: draw with unknown mesh {:?} or texture {:?}", mesh, texture);
            return;
        };
        let pipeline = match program {
            Program::Video => &self.video_pipeline,
            Program::Gui => &self.gui_pipeline,
        };
        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        let Some(mut pass) = begin_pass(frame, &self.textures, "Mesh Pass") else {
            return;
        };
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &self.uniform_bind_group, &[offset]);
        pass.set_bind_group(1, &gpu_texture.bind_group, &[]);
        pass.set_vertex_buffer(0, gpu_mesh.vertex_buffer.slice(..));
        pass.set_index_buffer(gpu_mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
        pass.draw_indexed(0..gpu_mesh.index_count, 0, 0..1);
    }

    fn draw_lines(&mut self, vertices: &[[f32; 3]], mvp: Mat4, color: [f32; 4]) {
        if vertices.len() < 2 {
            return;
        }
        let Some(offset) = self.push_uniforms(GpuUniforms::new(mvp, Mat4::IDENTITY, color)) else {
            return;
        };
        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Line Vertices"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let count = (vertices.len() & !1) as u32;

        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        let Some(mut pass) = begin_pass(frame, &self.textures, "Lines Pass") else {
            return;
        };
        pass.set_pipeline(&self.lines_pipeline);
        pass.set_bind_group(0, &self.uniform_bind_group, &[offset]);
        pass.set_vertex_buffer(0, vertex_buffer.slice(..));
        pass.draw(0..count, 0..1);
    }

    fn render_eyes_to_display(&mut self, target: TextureId, eyes: &[EyeTextureDescription; 2]) {
        let mut offsets = [0u32; 2];
        for (slot, eye) in offsets.iter_mut().zip(eyes) {
            let rect = [eye.left_u, eye.right_u, eye.top_v, eye.bottom_v];
            let Some(offset) = self.push_uniforms(GpuUniforms::new(Mat4::IDENTITY, Mat4::IDENTITY, rect)) else {
                return;
            };
            *slot = offset;
        }
        let Some(source) = self.textures.get(&target) else {
            log::warn!("WgpuBackend: unknown render target {:?}", target);
            return;
        };
        let Some(frame) = self.frame.as_mut() else {
            return;
        };

        // Everything after this goes straight to the display
        frame.target = None;
        frame.viewport = None;
        frame.clear_pending = true;

        let Some(mut pass) = begin_pass(frame, &self.textures, "Distortion Pass") else {
            return;
        };
        pass.set_pipeline(&self.distortion_pipeline);
        pass.set_bind_group(1, &source.bind_group, &[]);
        for (mesh, offset) in self.distortion_meshes.iter().zip(offsets) {
            let Some(mesh) = mesh else {
                continue;
            };
            pass.set_bind_group(0, &self.uniform_bind_group, &[offset]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }

    fn end_frame(&mut self) {
        let Some(mut frame) = self.frame.take() else {
            return;
        };
        if frame.clear_pending {
            // Nothing was drawn; still present a cleared image
            drop(begin_pass(&mut frame, &self.textures, "Clear Pass"));
        }
        self.queue.submit(std::iter::once(frame.encoder.finish()));
        frame.surface_texture.present();
    }

    fn drain_errors(&mut self) -> Vec<String> {
        let errors: Vec<String> = pollster::block_on(self.device.pop_error_scope())
            .map(|e| e.to_string())
            .into_iter()
            .collect();
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        errors
    }
}

/// Index buffers must be a multiple of 4 bytes
fn padded_indices(indices: &[u16]) -> Vec<u16> {
    let mut padded = indices.to_vec();
    if padded.len() % 2 == 1 {
        padded.push(0);
    }
    padded
}
