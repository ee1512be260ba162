//! GPU and window context.
//!
//! [`Context`] owns the device, queue, presentation target, camera and the
//! engine's built-in pipelines (grid, HUD). It renders one [`Render`] tree
//! per frame. A context either presents to a window surface or, when created
//! with [`Context::headless`], renders into an offscreen texture that can be
//! read back with [`Context::capture_frame`].

use std::{iter, path::PathBuf, sync::Arc};

use anyhow::Context as _;
use wgpu::util::DeviceExt;
use winit::window::{CursorGrabMode, Window};

use crate::{
    camera::{self, CameraMode, CameraResources, CameraUniform, Projection},
    config::Config,
    data_structures::{
        model::{DrawModel, mk_model_bind_group_layout},
        texture::Texture,
    },
    diagnostics::ResourceLedger,
    frame::FpsCounter,
    pipelines::{
        grid::GridResources,
        hud::{HUD_PIXEL, HudResources, fps_colour, fps_text, gen_text_quads},
    },
    render::{Render, SceneDraw},
};

/// Colour format of the headless render target.
pub const HEADLESS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

#[derive(Debug)]
pub struct Context {
    pub(crate) window: Option<Arc<Window>>,
    surface: Option<wgpu::Surface<'static>>,
    offscreen: Option<wgpu::Texture>,
    pub(crate) depth_texture: Texture,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: CameraResources,
    pub projection: Projection,
    pub clear_colour: wgpu::Color,
    pub ledger: Arc<ResourceLedger>,
    pub settings: Config,
    pub fps: FpsCounter,
    pub(crate) model_layout: wgpu::BindGroupLayout,
    grid: GridResources,
    hud: HudResources,
    is_surface_configured: bool,
}

impl Context {
    pub async fn new(window: Arc<Window>, settings: Config) -> anyhow::Result<Self> {
        let size = window.inner_size();

        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .context("Could not create a surface for the window")?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No GPU adapter can present to this window")?;
        let (device, queue) = request_device(&adapter).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Colours are written linearly; let the surface do the sRGB encoding.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("The surface reports no supported formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        let is_surface_configured = size.width > 0 && size.height > 0;
        if is_surface_configured {
            surface.configure(&device, &config);
        }

        if settings.camera.mode == CameraMode::FirstPerson {
            grab_cursor(&window);
        }

        let mut ctx = Self::from_parts(device, queue, config, settings);
        ctx.window = Some(window);
        ctx.surface = Some(surface);
        ctx.is_surface_configured = is_surface_configured;
        Ok(ctx)
    }

    /// A context without a window that renders into an offscreen texture of
    /// the configured size.
    pub async fn headless(settings: Config) -> anyhow::Result<Self> {
        log::info!("WGPU setup (headless)");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("No GPU adapter available")?;
        let (device, queue) = request_device(&adapter).await?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: HEADLESS_FORMAT,
            width: settings.width.max(1),
            height: settings.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let mut ctx = Self::from_parts(device, queue, config, settings);
        ctx.offscreen = Some(mk_offscreen_texture(&ctx.device, &ctx.config));
        ctx.is_surface_configured = true;
        Ok(ctx)
    }

    fn from_parts(
        device: wgpu::Device,
        queue: wgpu::Queue,
        config: wgpu::SurfaceConfiguration,
        settings: Config,
    ) -> Self {
        let camera_settings = &settings.camera;
        let camera = camera::Camera::look_at(
            camera_settings.position,
            camera_settings.target,
            camera_settings.up,
        );
        let projection = Projection::new(
            config.width,
            config.height,
            camera_settings.fovy,
            camera_settings.znear,
            camera_settings.zfar,
        )
        .with_mode(camera_settings.projection);
        let controller = camera::CameraController::new(camera_settings.speed, camera_settings.sensitivity)
            .with_mode(camera_settings.mode);

        let mut camera_uniform = CameraUniform::new();
        camera_uniform.update_view_proj(&camera, &projection);
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_bind_group_layout = camera::mk_bind_group_layout(&device);
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });
        let camera = CameraResources {
            camera,
            controller,
            uniform: camera_uniform,
            buffer: camera_buffer,
            bind_group: camera_bind_group,
            bind_group_layout: camera_bind_group_layout,
        };

        let depth_texture =
            Texture::create_depth_texture(&device, [config.width, config.height], "depth_texture");
        let model_layout = mk_model_bind_group_layout(&device);
        let grid = GridResources::new(
            &device,
            config.format,
            &camera.bind_group_layout,
            settings.grid_slices,
            settings.grid_spacing,
        );
        let hud = HudResources::new(&device, config.format);

        Self {
            window: None,
            surface: None,
            offscreen: None,
            depth_texture,
            clear_colour: settings.clear_colour,
            device,
            queue,
            config,
            camera,
            projection,
            ledger: ResourceLedger::new(),
            settings,
            fps: FpsCounter::new(),
            model_layout,
            grid,
            hud,
            is_surface_configured: false,
        }
    }

    pub fn window(&self) -> Option<&Arc<Window>> {
        self.window.as_ref()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            // minimised; keep the old targets until we get a real size
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.projection.resize(width, height);
        if let Some(surface) = &self.surface {
            surface.configure(&self.device, &self.config);
            self.is_surface_configured = true;
        }
        if self.offscreen.is_some() {
            self.offscreen = Some(mk_offscreen_texture(&self.device, &self.config));
        }
        self.depth_texture =
            Texture::create_depth_texture(&self.device, [width, height], "depth_texture");
        log::debug!("Resized to {}x{}", width, height);
    }

    /// Reconfigure a lost or outdated surface at the window's current size.
    pub(crate) fn reconfigure(&mut self) {
        if let Some(window) = self.window.clone() {
            let size = window.inner_size();
            self.resize(size.width, size.height);
        }
    }

    /// Upload the current camera state to the GPU, applying pending input.
    pub fn update_camera(&mut self, dt: instant::Duration) {
        self.camera.update(&self.queue, &self.projection, dt);
    }

    /// Draw one frame: clear, 3D batch with the camera, overlay batch, present.
    pub fn render(&mut self, render: Render) -> Result<(), wgpu::SurfaceError> {
        if !self.is_surface_configured {
            return Ok(());
        }
        let batches = render.batches();

        // Upload everything the passes read before recording them.
        let mut grid_params = None;
        for draw in &batches.scene {
            match draw {
                SceneDraw::Model(model) => model.model.set_transform(
                    &self.queue,
                    model.position,
                    model.scale,
                    model.tint,
                ),
                SceneDraw::Grid(grid) => match grid_params {
                    None => grid_params = Some(*grid),
                    Some(first) if first != *grid => {
                        log::warn!("Only one grid layout per frame is supported, drawing {:?}", first)
                    }
                    Some(_) => {}
                },
            }
        }
        if let Some(grid) = grid_params {
            self.grid.prepare(&self.device, grid.slices, grid.spacing);
        }
        let fps = self.fps.fps();
        let overlay: Vec<_> = batches
            .overlay
            .iter()
            .flat_map(|draw| {
                gen_text_quads(
                    &fps_text(fps),
                    draw.x as f32,
                    draw.y as f32,
                    HUD_PIXEL,
                    self.size(),
                    fps_colour(fps),
                )
            })
            .collect();
        self.hud.prepare(&self.device, &self.queue, &overlay);

        let output = match &self.surface {
            Some(surface) => Some(surface.get_current_texture()?),
            None => None,
        };
        let view = match (&output, &self.offscreen) {
            (Some(output), _) => output
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default()),
            (None, Some(offscreen)) => offscreen.create_view(&wgpu::TextureViewDescriptor::default()),
            (None, None) => return Err(wgpu::SurfaceError::Lost),
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            // 3D block
            for draw in &batches.scene {
                match draw {
                    SceneDraw::Model(model) => {
                        if !render_pass.draw_model(model.model, &self.camera.bind_group) {
                            log::warn!("Model '{}' has no cubemap attached yet", model.model.name);
                        }
                    }
                    SceneDraw::Grid(_) => {
                        render_pass.set_pipeline(&self.grid.pipeline);
                        render_pass.set_bind_group(0, &self.camera.bind_group, &[]);
                        render_pass.set_vertex_buffer(0, self.grid.vertex_buffer.slice(..));
                        render_pass.draw(0..self.grid.vertex_count, 0..1);
                    }
                }
            }

            // overlay
            if self.hud.vertex_count > 0 {
                render_pass.set_pipeline(&self.hud.pipeline);
                render_pass.set_vertex_buffer(0, self.hud.vertex_buffer.slice(..));
                render_pass.draw(0..self.hud.vertex_count, 0..1);
            }
        }

        self.queue.submit(iter::once(encoder.finish()));
        if let Some(output) = output {
            if let Some(window) = &self.window {
                window.pre_present_notify();
            }
            output.present();
        }
        Ok(())
    }

    /// Read back the last frame rendered by a headless context.
    pub async fn capture_frame(&self) -> anyhow::Result<image::RgbaImage> {
        let texture = self
            .offscreen
            .as_ref()
            .context("Frame capture needs a headless context")?;
        let (width, height) = self.size();
        let unpadded_bytes_per_row = 4 * width;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Capture Buffer"),
            size: (padded_bytes_per_row * height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Capture Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &output_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            texture.size(),
        );
        self.queue.submit(iter::once(encoder.finish()));

        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        let buffer_slice = output_buffer.slice(..);
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            // the receiver only goes away if capture was abandoned
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(std::time::Duration::from_secs(3)),
            })
            .context("GPU did not finish the frame capture")?;
        rx.receive()
            .await
            .context("Frame capture was cancelled")?
            .context("Could not map the frame capture buffer")?;

        let pixels = {
            let data = buffer_slice.get_mapped_range();
            data.chunks(padded_bytes_per_row as usize)
                .flat_map(|row| &row[..unpadded_bytes_per_row as usize])
                .copied()
                .collect::<Vec<u8>>()
        };
        output_buffer.unmap();
        image::RgbaImage::from_raw(width, height, pixels)
            .context("Captured frame has an unexpected size")
    }
}

async fn request_device(adapter: &wgpu::Adapter) -> anyhow::Result<(wgpu::Device, wgpu::Queue)> {
    log::info!("Using adapter {:?}", adapter.get_info().name);
    adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            experimental_features: Default::default(),
            trace: wgpu::Trace::Off,
        })
        .await
        .context("Could not create a GPU device")
}

fn mk_offscreen_texture(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Offscreen Target"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: config.format,
        usage: wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    })
}

/// Keep the cursor inside the window for mouse-look. Not every platform
/// supports both grab modes, so fall back from one to the other.
fn grab_cursor(window: &Window) {
    let grabbed = window
        .set_cursor_grab(CursorGrabMode::Confined)
        .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked));
    match grabbed {
        Ok(()) => window.set_cursor_visible(false),
        Err(e) => log::warn!("Could not grab the cursor: {}", e),
    }
}

/// The subset of [`Context`] a flow needs to create its GPU resources.
///
/// Cloning only clones handles; wgpu devices and queues are internally
/// reference counted.
#[derive(Clone, Debug)]
pub struct InitContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub format: wgpu::TextureFormat,
    pub camera_layout: wgpu::BindGroupLayout,
    pub model_layout: wgpu::BindGroupLayout,
    pub ledger: Arc<ResourceLedger>,
    pub asset_root: PathBuf,
}

impl From<&Context> for InitContext {
    fn from(ctx: &Context) -> Self {
        Self {
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
            format: ctx.config.format,
            camera_layout: ctx.camera.bind_group_layout.clone(),
            model_layout: ctx.model_layout.clone(),
            ledger: Arc::clone(&ctx.ledger),
            asset_root: ctx.settings.asset_root.clone(),
        }
    }
}
