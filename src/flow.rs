//! Flow control and application event loop.
//!
//! A "flow" is the scene the engine runs: it handles input, updates its
//! state every frame and describes what to draw. The engine owns the window,
//! the GPU [`Context`] and the frame loop, and drives one flow through its
//! lifecycle.
//!
//! # User-facing types
//!
//! - [`GraphicsFlow`] is the trait for scenes that handle events and rendering
//! - [`Out`] lets lifecycle hooks reconfigure the context or close the loop
//!
//! # Lifecycle Flow
//!
//! 1. The window and context are created, then the flow is constructed from
//!    an [`InitContext`] and `on_init` runs once
//! 2. Window/device events are passed to the camera controller and the flow;
//!    a window-close request or Escape closes the loop
//! 3. Each paced frame: camera update, `on_update`, `on_render`, present
//! 4. Once the loop has closed, `on_teardown` runs exactly once and the
//!    context is dropped

use std::{fmt::Debug, pin::Pin, sync::Arc};

use anyhow::Context as _;
use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

use crate::{
    config::Config,
    context::{Context, InitContext},
    diagnostics::{ResourceCounts, ResourceLedger},
    frame::{CloseSignal, FrameLoop, FramePacer},
    render::Render,
};

///
/// Output of every lifecycle hook.
///
/// `Out::Configure` can be used to modify the Context during runtime, for
/// instance to change the clear colour or move the camera.
///
/// `Out::Close` ends the frame loop after the current iteration, exactly as
/// if the window had been closed.
///
/// `Empty` is the default output when nothing needs to happen.
///
pub enum Out {
    Configure(Box<dyn FnOnce(&mut Context)>),
    Close,
    Empty,
}

impl Default for Out {
    fn default() -> Self {
        Self::Empty
    }
}

impl Debug for Out {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Out::Configure(_) => f.write_str("Configure(|&mut Context| {...})"),
            Out::Close => f.write_str("Close"),
            Out::Empty => f.write_str("Empty"),
        }
    }
}

/// Trait for implementing a renderable scene.
///
/// # Lifecycle
///
/// 1. `on_init()` is called once after construction; configure the context here
/// 2. `on_window_events()` and `on_device_events()` are called for each winit input event
/// 3. `on_update()` is called every frame after the camera moved
/// 4. `on_render()` is called every frame and specifies what to draw
/// 5. `on_teardown()` consumes the flow once the loop has closed
pub trait GraphicsFlow {
    /// Initialize the flow and configure the context.
    fn on_init(&mut self, ctx: &mut Context) -> Out;

    /// Update state every frame with the elapsed time `dt`.
    fn on_update(&mut self, _ctx: &Context, _dt: Duration) -> Out {
        Out::Empty
    }

    /// Handle raw device events (mouse motion and other hardware input).
    fn on_device_events(&mut self, _ctx: &Context, _event: &DeviceEvent) -> Out {
        Out::Empty
    }

    /// Handle window events (keyboard, mouse, resizing, etc.).
    fn on_window_events(&mut self, _ctx: &Context, _event: &WindowEvent) -> Out {
        Out::Empty
    }

    /// Return what to draw this frame.
    fn on_render(&self) -> Render<'_>;

    /// Release everything the flow owns. Called at most once, after the last
    /// frame, while the context is still alive.
    fn on_teardown(self: Box<Self>, _ctx: &Context) {}
}

impl Debug for dyn GraphicsFlow + 'static {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GraphicsFlow")
    }
}

/// Type alias for a flow constructor (factory function).
///
/// A flow constructor takes an `InitContext` and asynchronously returns a
/// boxed `GraphicsFlow`, or the error that made setup fail.
pub type FlowConstructor = Box<
    dyn FnOnce(InitContext) -> Pin<Box<dyn Future<Output = anyhow::Result<Box<dyn GraphicsFlow>>>>>,
>;

fn handle_flow_output(ctx: &mut Context, frame_loop: &mut FrameLoop, out: Out) {
    match out {
        Out::Configure(f) => f(ctx),
        Out::Close => {
            frame_loop.signal_close(CloseSignal::Injected);
        }
        Out::Empty => (),
    }
}

/// Run the flow's teardown and drop the context, at most once per loop.
fn teardown(
    frame_loop: &mut FrameLoop,
    flow: &mut Option<Box<dyn GraphicsFlow>>,
    ctx: &mut Option<Context>,
) {
    frame_loop.teardown(|| {
        if let Some(ctx) = ctx.as_ref() {
            if let Some(flow) = flow.take() {
                flow.on_teardown(ctx);
            }
            ctx.ledger.report();
        }
        if ctx.take().is_some() {
            log::info!("Context closed");
        }
    });
}

fn is_escape(event: &WindowEvent) -> bool {
    matches!(
        event,
        WindowEvent::KeyboardInput {
            event: KeyEvent {
                physical_key: PhysicalKey::Code(KeyCode::Escape),
                state: ElementState::Pressed,
                ..
            },
            ..
        }
    )
}

pub struct App {
    async_runtime: tokio::runtime::Runtime,
    settings: Config,
    // Taken once the window exists.
    constructor: Option<FlowConstructor>,
    ctx: Option<Context>,
    flow: Option<Box<dyn GraphicsFlow>>,
    frame_loop: FrameLoop,
    pacer: FramePacer,
    last_time: Instant,
    error: Option<anyhow::Error>,
}

impl App {
    fn new(settings: Config, constructor: FlowConstructor) -> anyhow::Result<Self> {
        let async_runtime = tokio::runtime::Runtime::new().context("Could not start the async runtime")?;
        let now = Instant::now();
        Ok(Self {
            async_runtime,
            pacer: FramePacer::new(settings.target_fps, now),
            settings,
            constructor: Some(constructor),
            ctx: None,
            flow: None,
            frame_loop: FrameLoop::new(),
            last_time: now,
            error: None,
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("Setup failed: {:#}", error);
        self.error = Some(error);
        self.frame_loop.signal_close(CloseSignal::Injected);
        teardown(&mut self.frame_loop, &mut self.flow, &mut self.ctx);
        event_loop.exit();
    }

    fn redraw(&mut self) {
        let (Some(ctx), Some(flow)) = (self.ctx.as_mut(), self.flow.as_mut()) else {
            return;
        };
        if !self.frame_loop.begin_iteration() {
            return;
        }
        let now = Instant::now();
        let dt = now - self.last_time;
        self.last_time = now;

        ctx.update_camera(dt);
        let out = flow.on_update(ctx, dt);
        handle_flow_output(ctx, &mut self.frame_loop, out);

        match ctx.render(flow.on_render()) {
            Ok(()) => ctx.fps.tick(dt),
            // Reconfigure the surface if it's lost or outdated
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => ctx.reconfigure(),
            Err(wgpu::SurfaceError::Timeout) => log::warn!("Surface timed out, skipping frame"),
            Err(e) => {
                log::error!("Unable to render: {}", e);
                self.frame_loop.signal_close(CloseSignal::Injected);
            }
        }
        self.pacer.advance(Instant::now());
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(constructor) = self.constructor.take() else {
            return;
        };

        let window_attributes = Window::default_attributes()
            .with_title(self.settings.title.clone())
            .with_inner_size(LogicalSize::new(self.settings.width, self.settings.height));
        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, anyhow::Error::new(e).context("Could not open a window")),
        };

        let settings = self.settings.clone();
        let init = self.async_runtime.block_on(async move {
            let ctx = Context::new(window, settings).await?;
            let flow = constructor((&ctx).into()).await?;
            anyhow::Ok((ctx, flow))
        });
        let (mut ctx, mut flow) = match init {
            Ok(init) => init,
            Err(e) => return self.fail(event_loop, e),
        };

        let out = flow.on_init(&mut ctx);
        handle_flow_output(&mut ctx, &mut self.frame_loop, out);
        if let Some(window) = ctx.window() {
            window.request_redraw();
        }
        self.ctx = Some(ctx);
        self.flow = Some(flow);

        let now = Instant::now();
        self.pacer = FramePacer::new(self.settings.target_fps, now);
        self.last_time = now;
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        let (Some(ctx), Some(flow)) = (self.ctx.as_mut(), self.flow.as_mut()) else {
            return;
        };
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            ctx.camera.controller.handle_mouse(dx, dy);
        }
        let out = flow.on_device_events(ctx, &event);
        handle_flow_output(ctx, &mut self.frame_loop, out);
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        if let (Some(ctx), Some(flow)) = (self.ctx.as_mut(), self.flow.as_mut()) {
            ctx.camera.controller.handle_window_events(&event);
            let out = flow.on_window_events(ctx, &event);
            handle_flow_output(ctx, &mut self.frame_loop, out);
        }

        match &event {
            WindowEvent::CloseRequested => {
                self.frame_loop.signal_close(CloseSignal::WindowClose);
            }
            WindowEvent::KeyboardInput { .. } if is_escape(&event) => {
                self.frame_loop.signal_close(CloseSignal::EscapeKey);
            }
            WindowEvent::Resized(size) => {
                if let Some(ctx) = self.ctx.as_mut() {
                    ctx.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if !self.frame_loop.is_running() {
            teardown(&mut self.frame_loop, &mut self.flow, &mut self.ctx);
            event_loop.exit();
            return;
        }
        let Some(window) = self.ctx.as_ref().and_then(|ctx| ctx.window()) else {
            return;
        };
        if self.pacer.is_due(Instant::now()) {
            window.request_redraw();
            event_loop.set_control_flow(ControlFlow::Wait);
        } else {
            event_loop.set_control_flow(ControlFlow::WaitUntil(self.pacer.next_frame()));
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.frame_loop.signal_close(CloseSignal::Injected);
        teardown(&mut self.frame_loop, &mut self.flow, &mut self.ctx);
    }
}

/// Open a window and run `constructor`'s flow until the window is closed.
///
/// Returns the setup error if the context or the flow could not be created.
pub fn run(settings: Config, constructor: FlowConstructor) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };

    let event_loop = EventLoop::new().context("Could not create the event loop")?;
    let mut app = App::new(settings, constructor)?;
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Outcome of a [`run_headless`] session.
#[derive(Debug)]
pub struct HeadlessReport {
    pub frames: u64,
    pub close_signal: Option<CloseSignal>,
    pub torn_down: bool,
    /// Live resources right after `on_init`.
    pub after_setup: ResourceCounts,
    /// Live resources once the flow and context are gone.
    pub after_teardown: ResourceCounts,
    /// The last rendered frame.
    pub last_frame: Option<image::RgbaImage>,
}

/// Drive a flow without a window: up to `max_frames` iterations with a fixed
/// time step, then an injected close, unless the flow closes first.
pub async fn run_headless(
    settings: Config,
    constructor: FlowConstructor,
    max_frames: u64,
) -> anyhow::Result<HeadlessReport> {
    let dt = FramePacer::new(settings.target_fps, Instant::now())
        .frame_time()
        .unwrap_or(Duration::from_millis(16));

    let mut ctx = Context::headless(settings).await?;
    let ledger: Arc<ResourceLedger> = Arc::clone(&ctx.ledger);
    let mut flow = constructor((&ctx).into()).await?;
    let mut frame_loop = FrameLoop::new();

    let out = flow.on_init(&mut ctx);
    handle_flow_output(&mut ctx, &mut frame_loop, out);
    let after_setup = ledger.snapshot();

    let mut last_frame = None;
    while frame_loop.frames() < max_frames && frame_loop.begin_iteration() {
        ctx.update_camera(dt);
        let out = flow.on_update(&ctx, dt);
        handle_flow_output(&mut ctx, &mut frame_loop, out);
        ctx.render(flow.on_render())
            .context("Headless render failed")?;
        ctx.fps.tick(dt);
        last_frame = Some(ctx.capture_frame().await?);
    }
    frame_loop.signal_close(CloseSignal::Injected);

    let mut flow = Some(flow);
    let mut ctx = Some(ctx);
    teardown(&mut frame_loop, &mut flow, &mut ctx);

    Ok(HeadlessReport {
        frames: frame_loop.frames(),
        close_signal: frame_loop.close_signal(),
        torn_down: frame_loop.is_torn_down(),
        after_setup,
        after_teardown: ledger.snapshot(),
        last_frame,
    })
}
