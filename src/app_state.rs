use std::sync::Arc;

use anyhow::Context;
use bevy_color::{ColorToComponents, LinearRgba, Srgba};
use instant::Instant;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::batch::FrameBatch;
use crate::camera::{Camera, CameraUniform};
use crate::models::ShapeInstance;

const SHAPES_WGSL: &str = include_str!("./shaders/shapes.wgsl");
const BLIT_WGSL: &str = include_str!("./shaders/blit.wgsl");

/// Persistent render target that keeps the previous frames for the fade trail.
struct Trail {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
}

impl Trail {
    fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Trail Texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            }],
            label: Some("Trail Bind Group"),
        });
        Self { _texture: texture, view, bind_group }
    }
}

/// Grows `buffer` when `data` no longer fits, then uploads `data`.
fn upload(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    buffer: &mut wgpu::Buffer,
    label: &str,
    data: &[u8],
) {
    if data.is_empty() {
        return;
    }
    if buffer.size() < data.len() as u64 {
        *buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: data,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
    } else {
        queue.write_buffer(buffer, 0, data);
    }
}

fn vertex_buffer(device: &wgpu::Device, label: &str, size: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size.max(4) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

pub struct State {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub is_surface_configured: bool,

    pub camera: Camera,
    pub camera_buffer: wgpu::Buffer,
    pub camera_bind_group: wgpu::BindGroup,
    pub camera_uniform: CameraUniform,
    pub camera_needs_update: bool,
    needs_srgb_output_conversion: bool,

    pub shape_render_pipeline: wgpu::RenderPipeline,
    pub blit_render_pipeline: wgpu::RenderPipeline,

    trail_bind_group_layout: wgpu::BindGroupLayout,
    trail: Trail,
    trail_needs_clear: bool,
    background: wgpu::Color,

    /// Shapes for the frame being built. Filled by the animator, drained by `render`.
    pub batch: FrameBatch,
    pub shape_instance_buffer: wgpu::Buffer,

    pub last_frame_instant: instant::Instant,
    pub frame_count_in_second: u32,
    pub current_fps: u32,
}

impl State {
    /// Sets up the GPU for `window`. `background` is what the trail starts out as;
    /// `expected_circles`/`expected_lines` size the initial vertex buffers.
    pub async fn new(
        window_arc: Arc<Window>,
        background: Srgba,
        expected_circles: usize,
        expected_lines: usize,
    ) -> anyhow::Result<State> {
        let size = window_arc.inner_size();
        let scale_factor = window_arc.scale_factor();

        let gpu = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::BROWSER_WEBGPU,
            ..Default::default()
        });

        // Surface itself is !Send on WASM due to HtmlCanvasElement
        let surface = gpu
            .create_surface(window_arc)
            .context("Failed to create a surface for the window")?;

        let adapter = gpu
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No compatible GPU adapter")?;
        let adapter_info = adapter.get_info();

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("Failed to open the GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let first_format = *surface_caps
            .formats
            .first()
            .context("Surface reports no supported formats")?;
        let texture_format = surface_caps.formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or_else(|| {
                log::warn!("No sRGB surface format found, falling back to {:?}", first_format);
                first_format
            });

        let needs_srgb_output_conversion = !texture_format.is_srgb();

        log::info!(
            "Using {} ({:?}, Target Format: {:?}), Needs Shader sRGB Output Conversion: {}",
            adapter_info.name,
            adapter_info.backend,
            texture_format,
            needs_srgb_output_conversion
        );

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: texture_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        // The field draws in logical pixels; the camera scales them onto the surface.
        let mut camera = Camera::new(config.width, config.height);
        camera.set_scale_factor(scale_factor);
        let camera_uniform = camera.uniform(needs_srgb_output_conversion);

        let camera_buffer = device.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("Camera Buffer"),
                contents: bytemuck::cast_slice(&[camera_uniform]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            }
        );

        let camera_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }
            ],
            label: Some("Camera Bind Group Layout"),
        });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &camera_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                }
            ],
            label: Some("Camera Bind Group"),
        });

        let trail_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                }
            ],
            label: Some("Trail Bind Group Layout"),
        });
        let trail = Trail::new(&device, &trail_bind_group_layout, texture_format, config.width, config.height);

        // --- Shader modules ---
        let shapes_shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shapes Shader"),
            source: wgpu::ShaderSource::Wgsl(SHAPES_WGSL.into()),
        });

        let blit_shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Blit Shader"),
            source: wgpu::ShaderSource::Wgsl(BLIT_WGSL.into()),
        });

        // --- Pipeline layouts ---
        let render_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Render Pipeline Layout"),
            bind_group_layouts: &[
                &camera_bind_group_layout,
            ],
            push_constant_ranges: &[],
        });

        let blit_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Blit Pipeline Layout"),
            bind_group_layouts: &[
                &trail_bind_group_layout,
            ],
            push_constant_ranges: &[],
        });

        let blended_target = [Some(wgpu::ColorTargetState {
            format: texture_format,
            blend: Some(wgpu::BlendState::ALPHA_BLENDING),
            write_mask: wgpu::ColorWrites::ALL,
        })];
        // The projection flips y, so winding is not meaningful: no culling.
        let primitive = wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        };
        let multisample = wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        };

        // --- Fade fill, neurons and links, in one instanced draw ---
        let shape_render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Shape Render Pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shapes_shader_module,
                entry_point: Some("vs_main"),
                buffers: &[
                    ShapeInstance::layout(),
                ],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shapes_shader_module,
                entry_point: Some("fs_main"),
                targets: &blended_target,
                compilation_options: Default::default(),
            }),
            primitive,
            depth_stencil: None,
            multisample,
            multiview: None,
            cache: None,
        });

        // --- Trail to swapchain ---
        let blit_render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Blit Render Pipeline"),
            layout: Some(&blit_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &blit_shader_module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &blit_shader_module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: texture_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive,
            depth_stencil: None,
            multisample,
            multiview: None,
            cache: None,
        });

        // Fade fill plus one instance per circle and per link.
        let shape_instance_buffer = vertex_buffer(
            &device,
            "Shape Instance Buffer",
            (1 + expected_circles + expected_lines) * std::mem::size_of::<ShapeInstance>(),
        );

        // The clear color is written to the trail as is, so it must already be
        // in the trail's encoding.
        let [r, g, b, a] = if needs_srgb_output_conversion {
            background.to_f32_array()
        } else {
            LinearRgba::from(background).to_f32_array()
        };
        let background = wgpu::Color { r: r as f64, g: g as f64, b: b as f64, a: a as f64 };

        Ok(Self {
            surface, device, queue, config, is_surface_configured: size.width > 0 && size.height > 0,
            camera, camera_buffer, camera_bind_group, camera_uniform, camera_needs_update: false,
            needs_srgb_output_conversion,
            shape_render_pipeline, blit_render_pipeline,
            trail_bind_group_layout, trail, trail_needs_clear: true, background,
            batch: FrameBatch::with_capacity(expected_circles, expected_lines),
            shape_instance_buffer,
            last_frame_instant: Instant::now(), frame_count_in_second: 0, current_fps: 0,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            log::debug!("Resize surface to {}x{}", width, height);
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);

            // Like a resized canvas, the new trail starts blank.
            self.trail = Trail::new(
                &self.device,
                &self.trail_bind_group_layout,
                self.config.format,
                width,
                height,
            );
            self.trail_needs_clear = true;

            self.camera.update_viewport(width, height);
            self.camera_needs_update = true;
            self.is_surface_configured = true;
        } else {
            // Nothing to present to; frames are skipped until the next real size.
            self.is_surface_configured = false;
        }
    }

    /// Call when the window moves to a display with a different pixel density.
    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        log::debug!("Scale factor changed to {}", scale_factor);
        self.camera.set_scale_factor(scale_factor);
        self.camera_needs_update = true;
    }

    /// Empties the frame batch and hands it out for drawing.
    pub fn begin_frame(&mut self) -> &mut FrameBatch {
        self.batch.clear();
        &mut self.batch
    }

    pub fn update(&mut self) -> bool {
        if self.camera_needs_update {
            self.camera_uniform = self.camera.uniform(self.needs_srgb_output_conversion);
            self.queue.write_buffer(
                &self.camera_buffer,
                0,
                bytemuck::cast_slice(&[self.camera_uniform]),
            );
            self.camera_needs_update = false;
            return true;
        }
        false
    }

    fn update_gpu_buffers(&mut self) {
        upload(
            &self.device,
            &self.queue,
            &mut self.shape_instance_buffer,
            "Shape Instance Buffer (Resized)",
            bytemuck::cast_slice(&self.batch.shapes),
        );
    }

    /// Draws the current batch over the trail and presents the trail.
    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        if !self.is_surface_configured {
            return Ok(());
        }

        self.frame_count_in_second += 1;
        let now = Instant::now();
        let elapsed = (now - self.last_frame_instant).as_secs_f32();
        if elapsed >= 1.0 {
            self.current_fps = self.frame_count_in_second;
            self.frame_count_in_second = 0;
            self.last_frame_instant = now;
            log::debug!("FPS: {}", self.current_fps);
        }

        self.update();
        self.update_gpu_buffers();

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        let trail_load = if self.trail_needs_clear {
            wgpu::LoadOp::Clear(self.background)
        } else {
            wgpu::LoadOp::Load
        };

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Trail Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.trail.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: trail_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_bind_group(0, &self.camera_bind_group, &[]);

            // Instances are drawn in the order the canvas received them.
            if !self.batch.shapes.is_empty() {
                render_pass.set_pipeline(&self.shape_render_pipeline);
                render_pass.set_vertex_buffer(0, self.shape_instance_buffer.slice(..));
                render_pass.draw(
                    0..ShapeInstance::VERTICES,
                    0..self.batch.shapes.len() as u32,
                );
            }
        }
        self.trail_needs_clear = false;

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Present Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.background),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_pipeline(&self.blit_render_pipeline);
            render_pass.set_bind_group(0, &self.trail.bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}
