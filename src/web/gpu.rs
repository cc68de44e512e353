use std::collections::HashMap;

use log::{debug, info, warn};
use wasm_bindgen::JsCast;
use web_sys::HtmlCanvasElement;
use wgpu::util::DeviceExt;

use super::label_canvas::LabelCanvas;
use crate::error::{Result, ViewerError};
use crate::geometry::PointCloud;
use crate::label::LabelTexture;
use crate::render::{
    GeometryHandle, GeometrySource, MaterialDesc, MaterialHandle, Renderer, SceneFrame, TextureHandle,
};
use crate::types::{LineVertex, MaterialUniforms, MeshVertex, PointInstance, Uniforms};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const LABEL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
/// Cap on backing-store pixels per CSS pixel.
const MAX_PIXEL_RATIO: f64 = 2.0;

// cgmath produces clip z in -1..1, wgpu wants 0..1.
#[rustfmt::skip]
const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

impl MeshVertex {
    fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

impl LineVertex {
    fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<LineVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            }],
        }
    }
}

impl PointInstance {
    fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PointInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32,
                },
            ],
        }
    }
}

enum GpuGeometry {
    Mesh {
        vertices: wgpu::Buffer,
        indices: wgpu::Buffer,
    },
    Lines {
        vertices: wgpu::Buffer,
        count: u32,
    },
    Points {
        instances: wgpu::Buffer,
        count: u32,
    },
}

impl GpuGeometry {
    fn destroy(&self) {
        match self {
            GpuGeometry::Mesh { vertices, indices } => {
                vertices.destroy();
                indices.destroy();
            }
            GpuGeometry::Lines { vertices, .. } => vertices.destroy(),
            GpuGeometry::Points { instances, .. } => instances.destroy(),
        }
    }
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct GpuMaterial {
    desc: MaterialDesc,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct DepthTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthTarget {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// wgpu renderer for one canvas: WebGPU when the browser has it, WebGL2
/// otherwise.
pub struct GpuRenderer {
    canvas: HtmlCanvasElement,
    backend: wgpu::Backend,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pixel_ratio: f64,
    depth: DepthTarget,
    mesh_pipeline: wgpu::RenderPipeline,
    line_pipeline: wgpu::RenderPipeline,
    point_pipeline: wgpu::RenderPipeline,
    uniforms: Uniforms,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    material_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    /// Bound to materials without a label so every material has the same
    /// layout.
    blank: GpuTexture,
    label_canvas: Option<LabelCanvas>,
    next_id: u32,
    geometries: HashMap<u32, GpuGeometry>,
    textures: HashMap<u32, GpuTexture>,
    materials: HashMap<u32, GpuMaterial>,
    released: bool,
}

fn instance_for(backends: wgpu::Backends) -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends,
        flags: wgpu::InstanceFlags::default(),
        backend_options: wgpu::BackendOptions {
            gl: wgpu::GlBackendOptions {
                gles_minor_version: wgpu::Gles3MinorVersion::Automatic,
                fence_behavior: wgpu::GlFenceBehavior::default(),
            },
            ..Default::default()
        },
        ..Default::default()
    })
}

async fn request_adapter(
    instance: &wgpu::Instance,
    canvas: HtmlCanvasElement,
) -> Result<(wgpu::Adapter, wgpu::Surface<'static>)> {
    let surface = instance
        .create_surface(wgpu::SurfaceTarget::Canvas(canvas))
        .map_err(|e| ViewerError::ContextUnavailable(format!("failed to create surface: {e}")))?;
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        })
        .await
        .map_err(|e| ViewerError::ContextUnavailable(format!("no adapter: {e}")))?;
    Ok((adapter, surface))
}

impl GpuRenderer {
    /// Sets up the device on `canvas`. `width`/`height` are CSS pixels.
    pub async fn new(canvas: HtmlCanvasElement, width: u32, height: u32) -> Result<GpuRenderer> {
        let fallback_canvas = canvas.clone();
        let (adapter, surface) =
            match request_adapter(&instance_for(wgpu::Backends::BROWSER_WEBGPU | wgpu::Backends::GL), canvas).await {
                Ok(found) => found,
                Err(e) => {
                    info!("WebGPU unavailable ({e}), falling back to WebGL");
                    request_adapter(&instance_for(wgpu::Backends::GL), fallback_canvas.clone()).await?
                }
            };
        Self::with_adapter(fallback_canvas, adapter, surface, width, height).await
    }

    async fn with_adapter(
        canvas: HtmlCanvasElement,
        adapter: wgpu::Adapter,
        surface: wgpu::Surface<'static>,
        width: u32,
        height: u32,
    ) -> Result<GpuRenderer> {
        let backend = adapter.get_info().backend;
        let required_limits = match backend {
            wgpu::Backend::Gl => wgpu::Limits::downlevel_webgl2_defaults(),
            _ => wgpu::Limits::default(),
        };
        debug!("adapter backend: {backend:?}");

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("viewer device"),
                required_features: wgpu::Features::empty(),
                required_limits,
                memory_hints: wgpu::MemoryHints::MemoryUsage,
                ..Default::default()
            })
            .await
            .map_err(|e| ViewerError::ContextUnavailable(format!("failed to create device: {e}")))?;

        let caps = surface.get_capabilities(&adapter);
        let Some(&first_format) = caps.formats.first() else {
            return Err(ViewerError::ContextUnavailable("surface has no formats".into()));
        };
        // Page colors are sRGB-encoded already; keep them as they are.
        let format = caps.formats.iter().copied().find(|f| !f.is_srgb()).unwrap_or(first_format);
        let alpha_mode = if caps.alpha_modes.contains(&wgpu::CompositeAlphaMode::PreMultiplied) {
            wgpu::CompositeAlphaMode::PreMultiplied
        } else {
            caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto)
        };
        let present_mode = caps.present_modes.first().copied().unwrap_or(wgpu::PresentMode::Fifo);

        let pixel_ratio = web_sys::window()
            .map(|w| w.device_pixel_ratio())
            .unwrap_or(1.0)
            .clamp(1.0, MAX_PIXEL_RATIO);
        let (px_width, px_height) = physical_size(width, height, pixel_ratio);
        canvas.set_width(px_width);
        canvas.set_height(px_height);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: px_width,
            height: px_height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Viewer Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shader.wgsl").into()),
        });

        let uniforms = Uniforms::new();
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniforms]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("uniform_bind_group_layout"),
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("uniform_bind_group"),
        });

        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
            label: Some("material_bind_group_layout"),
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Label Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let blank = create_label_texture(&device, &queue, 1, &[255, 255, 255, 255]);

        let mesh_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[&uniform_layout, &material_layout],
            push_constant_ranges: &[],
        });
        let overlay_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Overlay Pipeline Layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });

        let mesh_pipeline = create_pipeline(
            &device,
            &PipelineSpec {
                label: "Mesh Pipeline",
                layout: &mesh_layout,
                shader: &shader,
                vs: "vs_mesh",
                fs: "fs_mesh",
                buffers: &[MeshVertex::desc()],
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                depth_write: true,
                format,
            },
        );
        let line_pipeline = create_pipeline(
            &device,
            &PipelineSpec {
                label: "Wireframe Pipeline",
                layout: &overlay_layout,
                shader: &shader,
                vs: "vs_line",
                fs: "fs_line",
                buffers: &[LineVertex::desc()],
                topology: wgpu::PrimitiveTopology::LineList,
                cull_mode: None,
                depth_write: false,
                format,
            },
        );
        let point_pipeline = create_pipeline(
            &device,
            &PipelineSpec {
                label: "Point Pipeline",
                layout: &overlay_layout,
                shader: &shader,
                vs: "vs_point",
                fs: "fs_point",
                buffers: &[PointInstance::desc()],
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                depth_write: true,
                format,
            },
        );

        let depth = DepthTarget::new(&device, px_width, px_height);
        info!("renderer ready on {backend:?}, {px_width}x{px_height} px");

        Ok(Self {
            canvas,
            backend,
            surface,
            device,
            queue,
            config,
            pixel_ratio,
            depth,
            mesh_pipeline,
            line_pipeline,
            point_pipeline,
            uniforms,
            uniform_buffer,
            uniform_bind_group,
            material_layout,
            sampler,
            blank,
            label_canvas: None,
            next_id: 1,
            geometries: HashMap::new(),
            textures: HashMap::new(),
            materials: HashMap::new(),
            released: false,
        })
    }

    pub fn backend(&self) -> wgpu::Backend {
        self.backend
    }

    fn allocate(&mut self) -> Result<u32> {
        if self.released {
            return Err(ViewerError::Render("context released".into()));
        }
        let id = self.next_id;
        self.next_id += 1;
        Ok(id)
    }

    fn material_bind_group(&self, uniform_buffer: &wgpu::Buffer, texture: Option<TextureHandle>) -> Result<wgpu::BindGroup> {
        let view = match texture {
            Some(handle) => {
                &self
                    .textures
                    .get(&handle.0)
                    .ok_or_else(|| ViewerError::Render(format!("unknown texture {}", handle.0)))?
                    .view
            }
            None => &self.blank.view,
        };
        Ok(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.material_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
            label: Some("material_bind_group"),
        }))
    }

    /// Asks the browser to drop the WebGL context right away instead of
    /// waiting for garbage collection.
    fn lose_webgl_context(&self) {
        if self.backend != wgpu::Backend::Gl {
            return;
        }
        let Ok(Some(context)) = self.canvas.get_context("webgl2") else {
            return;
        };
        let Ok(gl) = context.dyn_into::<web_sys::WebGl2RenderingContext>() else {
            return;
        };
        let Ok(Some(ext)) = gl.get_extension("WEBGL_lose_context") else {
            return;
        };
        let lose = js_sys::Reflect::get(&ext, &"loseContext".into())
            .ok()
            .and_then(|f| f.dyn_into::<js_sys::Function>().ok());
        if let Some(lose) = lose {
            if lose.call0(&ext).is_err() {
                warn!("WEBGL_lose_context.loseContext() failed");
            }
        }
    }
}

fn physical_size(width: u32, height: u32, pixel_ratio: f64) -> (u32, u32) {
    (
        ((width as f64 * pixel_ratio).round() as u32).max(1),
        ((height as f64 * pixel_ratio).round() as u32).max(1),
    )
}

fn create_label_texture(device: &wgpu::Device, queue: &wgpu::Queue, size: u32, rgba: &[u8]) -> GpuTexture {
    let extent = wgpu::Extent3d {
        width: size,
        height: size,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Label Texture"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: LABEL_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        rgba,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * size),
            rows_per_image: Some(size),
        },
        extent,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture { texture, view }
}

struct PipelineSpec<'a> {
    label: &'a str,
    layout: &'a wgpu::PipelineLayout,
    shader: &'a wgpu::ShaderModule,
    vs: &'a str,
    fs: &'a str,
    buffers: &'a [wgpu::VertexBufferLayout<'a>],
    topology: wgpu::PrimitiveTopology,
    cull_mode: Option<wgpu::Face>,
    depth_write: bool,
    format: wgpu::TextureFormat,
}

fn create_pipeline(device: &wgpu::Device, spec: &PipelineSpec<'_>) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(spec.label),
        layout: Some(spec.layout),
        cache: None,
        vertex: wgpu::VertexState {
            module: spec.shader,
            entry_point: Some(spec.vs),
            buffers: spec.buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: spec.shader,
            entry_point: Some(spec.fs),
            targets: &[Some(wgpu::ColorTargetState {
                format: spec.format,
                blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: spec.topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: spec.cull_mode,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: spec.depth_write,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}

impl Renderer for GpuRenderer {
    fn upload_geometry(&mut self, source: GeometrySource<'_>) -> Result<GeometryHandle> {
        let id = self.allocate()?;
        let geometry = match source {
            GeometrySource::Mesh(mesh) => GpuGeometry::Mesh {
                vertices: self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Mesh Vertex Buffer"),
                    contents: bytemuck::cast_slice(&mesh.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                indices: self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Mesh Index Buffer"),
                    contents: bytemuck::cast_slice(&mesh.indices),
                    usage: wgpu::BufferUsages::INDEX,
                }),
            },
            GeometrySource::Lines(lines) => GpuGeometry::Lines {
                vertices: self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Wireframe Vertex Buffer"),
                    contents: bytemuck::cast_slice(&lines.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                count: lines.vertices.len() as u32,
            },
            GeometrySource::Points(cloud) => GpuGeometry::Points {
                instances: self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Point Instance Buffer"),
                    contents: bytemuck::cast_slice(&cloud.points),
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                }),
                count: cloud.len() as u32,
            },
        };
        self.geometries.insert(id, geometry);
        Ok(GeometryHandle(id))
    }

    fn update_points(&mut self, handle: GeometryHandle, cloud: &PointCloud) -> Result<()> {
        match self.geometries.get(&handle.0) {
            Some(GpuGeometry::Points { instances, count }) if *count as usize == cloud.len() => {
                self.queue.write_buffer(instances, 0, bytemuck::cast_slice(&cloud.points));
                Ok(())
            }
            Some(_) => Err(ViewerError::Render(format!("geometry {} is not a matching point cloud", handle.0))),
            None => Err(ViewerError::Render(format!("unknown geometry {}", handle.0))),
        }
    }

    fn release_geometry(&mut self, handle: GeometryHandle) {
        if let Some(geometry) = self.geometries.remove(&handle.0) {
            geometry.destroy();
        }
    }

    fn upload_texture(&mut self, label: &LabelTexture) -> Result<TextureHandle> {
        let id = self.allocate()?;
        let canvas = match self.label_canvas.take() {
            Some(canvas) => canvas,
            None => LabelCanvas::new()?,
        };
        let pixels = canvas.rasterize(label);
        self.label_canvas = Some(canvas);
        let texture = create_label_texture(&self.device, &self.queue, label.size_px, &pixels?);
        self.textures.insert(id, texture);
        Ok(TextureHandle(id))
    }

    fn release_texture(&mut self, handle: TextureHandle) {
        if let Some(texture) = self.textures.remove(&handle.0) {
            texture.texture.destroy();
        }
    }

    fn create_material(&mut self, desc: &MaterialDesc) -> Result<MaterialHandle> {
        let id = self.allocate()?;
        let uniforms = MaterialUniforms {
            color: [desc.color.r, desc.color.g, desc.color.b, desc.opacity],
            flags: [desc.texture.map_or(0.0, |_| 1.0), 0.0, 0.0, 0.0],
        };
        let uniform_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Material Buffer"),
            contents: bytemuck::cast_slice(&[uniforms]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = self.material_bind_group(&uniform_buffer, desc.texture)?;
        self.materials.insert(
            id,
            GpuMaterial {
                desc: *desc,
                uniform_buffer,
                bind_group,
            },
        );
        Ok(MaterialHandle(id))
    }

    fn set_material_texture(&mut self, material: MaterialHandle, texture: Option<TextureHandle>) -> Result<()> {
        let Some(current) = self.materials.get(&material.0) else {
            return Err(ViewerError::Render(format!("unknown material {}", material.0)));
        };
        let bind_group = self.material_bind_group(&current.uniform_buffer, texture)?;
        if let Some(current) = self.materials.get_mut(&material.0) {
            current.bind_group = bind_group;
            current.desc.texture = texture;
        }
        Ok(())
    }

    fn release_material(&mut self, handle: MaterialHandle) {
        if let Some(material) = self.materials.remove(&handle.0) {
            material.uniform_buffer.destroy();
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 || self.released {
            return;
        }
        let (px_width, px_height) = physical_size(width, height, self.pixel_ratio);
        if px_width == self.config.width && px_height == self.config.height {
            return;
        }
        self.canvas.set_width(px_width);
        self.canvas.set_height(px_height);
        self.config.width = px_width;
        self.config.height = px_height;
        self.surface.configure(&self.device, &self.config);
        self.depth.texture.destroy();
        self.depth = DepthTarget::new(&self.device, px_width, px_height);
        debug!("resized surface to {px_width}x{px_height} px");
    }

    fn render(&mut self, frame: &SceneFrame<'_>) -> Result<()> {
        if self.released {
            return Err(ViewerError::Render("context released".into()));
        }

        self.uniforms.update_view_proj(OPENGL_TO_WGPU_MATRIX * frame.view_proj);
        self.uniforms.update_model(frame.model);
        let [lx, ly, lz] = frame.lighting.direction;
        self.uniforms.light = [lx, ly, lz, frame.lighting.intensity];
        let wire = frame.wire_color;
        self.uniforms.wire = [wire.r, wire.g, wire.b, frame.wire_opacity];
        self.uniforms.params = [frame.lighting.ambient, frame.glow, frame.viewport[0], frame.viewport[1]];
        self.queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[self.uniforms]));

        for (i, handle) in frame.materials.iter().enumerate() {
            let Some(material) = self.materials.get(&handle.0) else {
                continue;
            };
            let desc = material.desc;
            let uniforms = MaterialUniforms {
                color: [desc.color.r, desc.color.g, desc.color.b, desc.opacity],
                flags: [
                    desc.texture.map_or(0.0, |_| 1.0),
                    if frame.highlight == Some(i) { 1.0 } else { 0.0 },
                    0.0,
                    0.0,
                ],
            };
            self.queue.write_buffer(&material.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));
        }

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(e) => return Err(ViewerError::Render(format!("failed to get surface texture: {e}"))),
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            pass.set_bind_group(0, &self.uniform_bind_group, &[]);

            if let Some(GpuGeometry::Mesh { vertices, indices }) = self.geometries.get(&frame.mesh.0) {
                pass.set_pipeline(&self.mesh_pipeline);
                pass.set_vertex_buffer(0, vertices.slice(..));
                pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                for (group, handle) in frame.groups.iter().zip(frame.materials) {
                    let Some(material) = self.materials.get(&handle.0) else {
                        continue;
                    };
                    pass.set_bind_group(1, &material.bind_group, &[]);
                    pass.draw_indexed(group.clone(), 0, 0..1);
                }
            }

            if let Some(GpuGeometry::Points { instances, count }) =
                frame.points.and_then(|p| self.geometries.get(&p.0))
            {
                pass.set_pipeline(&self.point_pipeline);
                pass.set_vertex_buffer(0, instances.slice(..));
                pass.draw(0..6, 0..*count);
            }

            if let Some(GpuGeometry::Lines { vertices, count }) = self.geometries.get(&frame.wireframe.0) {
                pass.set_pipeline(&self.line_pipeline);
                pass.set_vertex_buffer(0, vertices.slice(..));
                pass.draw(0..*count, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn release_context(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        for (_, geometry) in self.geometries.drain() {
            geometry.destroy();
        }
        for (_, texture) in self.textures.drain() {
            texture.texture.destroy();
        }
        for (_, material) in self.materials.drain() {
            material.uniform_buffer.destroy();
        }
        self.blank.texture.destroy();
        self.depth.texture.destroy();
        self.uniform_buffer.destroy();
        self.label_canvas = None;
        self.device.destroy();
        self.lose_webgl_context();
        debug!("released {:?} context", self.backend);
    }
}
