use anyhow::{anyhow, Context};
use log::{error, info, warn};
use std::{sync::Arc, time::Instant};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowAttributes, WindowId},
};

use crate::{
    config::AppConfig,
    demo::{load_skybox, DemoScene},
    error::RenderError,
    gfx::{
        camera::camera_controller::FlyCameraController,
        rendering::{FrameRenderer, GpuBackend, RenderContext},
    },
};

pub struct ShadowboxApp {
    event_loop: Option<EventLoop<()>>,
    app_state: AppState,
}

struct AppState {
    config: AppConfig,
    controller: FlyCameraController,
    window: Option<Arc<Window>>,
    running: Option<Running>,
    last_frame: Option<Instant>,
    /// First fatal error, reported once the event loop returns
    failure: Option<anyhow::Error>,
}

/// Everything that exists once the window and device are up
struct Running {
    backend: GpuBackend,
    ctx: RenderContext,
    renderer: FrameRenderer,
    scene: DemoScene,
}

impl ShadowboxApp {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let event_loop = EventLoop::new().context("Failed to create event loop")?;
        let controller =
            FlyCameraController::new(config.move_delta, config.rotate_delta, config.fov_delta);

        Ok(Self {
            event_loop: Some(event_loop),
            app_state: AppState {
                config,
                controller,
                window: None,
                running: None,
                last_frame: None,
                failure: None,
            },
        })
    }

    /// Runs the event loop until the window closes or a fatal error occurs.
    pub fn run(mut self) -> anyhow::Result<()> {
        let event_loop = self
            .event_loop
            .take()
            .ok_or_else(|| anyhow!("Event loop already consumed"))?;
        event_loop.set_control_flow(ControlFlow::Poll);

        event_loop
            .run_app(&mut self.app_state)
            .context("Event loop terminated abnormally")?;

        match self.app_state.failure.take() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

impl Running {
    fn start(window: Arc<Window>, config: &AppConfig) -> anyhow::Result<Self> {
        let PhysicalSize { width, height } = window.inner_size();
        let (width, height) = (width.max(1), height.max(1));

        let mut backend = pollster::block_on(GpuBackend::new(
            window,
            width,
            height,
            config.vsync,
            config.legacy_quads,
        ))?;

        let mut ctx = RenderContext::new(backend.capabilities());
        let skybox = load_skybox(&mut ctx, config)?;
        let renderer = FrameRenderer::new(&mut ctx, width, height, config.msaa_samples, skybox)?;
        let scene = DemoScene::load(&mut ctx, config, width as f32 / height as f32)?;
        backend.realize(ctx.take_pending())?;

        info!(
            "Renderer ready at {}x{} with {}x MSAA",
            width, height, config.msaa_samples
        );

        Ok(Self {
            backend,
            ctx,
            renderer,
            scene,
        })
    }

    fn draw(&mut self, frame_ms: f32) -> Result<(), RenderError> {
        self.scene.update(frame_ms)?;
        let frame = self
            .renderer
            .render(&mut self.ctx, &mut self.scene.graph, &self.scene.registry)?;
        self.backend.realize(self.ctx.take_pending())?;
        self.backend.execute(&frame)
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.backend.resize(width, height);
        self.scene.resize(width, height)
    }
}

impl AppState {
    fn fail(&mut self, event_loop: &ActiveEventLoop, failure: anyhow::Error) {
        error!("{:#}", failure);
        if self.failure.is_none() {
            self.failure = Some(failure);
        }
        event_loop.exit();
    }

    fn frame_ms(&mut self) -> f32 {
        let now = Instant::now();
        let elapsed = self
            .last_frame
            .map(|last| now.duration_since(last).as_secs_f32() * 1000.0)
            .unwrap_or(0.0);
        self.last_frame = Some(now);
        elapsed
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = WindowAttributes::default()
            .with_title("shadowbox")
            .with_inner_size(PhysicalSize::new(
                self.config.window_width,
                self.config.window_height,
            ));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.fail(event_loop, anyhow!(e).context("Failed to create window"));
                return;
            }
        };
        self.window = Some(window.clone());

        match Running::start(window, &self.config) {
            Ok(running) => self.running = Some(running),
            Err(e) => self.fail(event_loop, e.context("Failed to initialise renderer")),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _: WindowId, event: WindowEvent) {
        if self.running.is_none() {
            return;
        }

        let result = match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
                Ok(())
            }
            WindowEvent::KeyboardInput { event, .. } => {
                match self.controller.process_keyed_events(&event) {
                    Some(action) => match self.running.as_mut() {
                        Some(running) => running.scene.apply(action).map(|keep_going| {
                            if !keep_going {
                                event_loop.exit();
                            }
                        }),
                        None => Ok(()),
                    },
                    None => Ok(()),
                }
            }
            WindowEvent::Resized(PhysicalSize { width, height }) => match self.running.as_mut() {
                Some(running) => running.resize(width, height),
                None => Ok(()),
            },
            WindowEvent::RedrawRequested => {
                let frame_ms = self.frame_ms();
                match self.running.as_mut() {
                    Some(running) => match running.draw(frame_ms) {
                        Err(RenderError::Surface(
                            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated,
                        )) => {
                            let (width, height) = running.backend.get_surface_size();
                            running.backend.resize(width, height);
                            Ok(())
                        }
                        Err(RenderError::Surface(wgpu::SurfaceError::Timeout)) => {
                            warn!("Surface timeout, skipping frame");
                            Ok(())
                        }
                        other => other,
                    },
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        };

        if let Err(e) = result {
            self.fail(event_loop, e.into());
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}
