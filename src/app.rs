use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use pixels::{Pixels, SurfaceTexture};
use rand::rngs::ThreadRng;
use slant_experiment::{
    DataRecorder, PresentationController, PresentationEvent, Session, SessionStatus,
    TrialSequencer,
};
use slant_render::SkiaRenderer;
use slant_sensor::Inclinometer;
use slant_timing::{HighPrecisionTimer, Timer};
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowId},
};

use crate::config::RigConfig;

type Controller = PresentationController<HighPrecisionTimer, Inclinometer, SkiaRenderer, ThreadRng>;

/// Everything built before a window exists. The renderer and controller
/// need the surface size, so they are made on `resumed`.
pub struct Setup {
    pub config: RigConfig,
    pub session: Session,
    pub sequencer: TrialSequencer<ThreadRng>,
    pub recorder: DataRecorder,
    pub sensor: Inclinometer,
    pub started: Instant,
}

pub struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    setup: Option<Setup>,
    controller: Option<Controller>,
    current_size: Option<PhysicalSize<u32>>,
    scale_factor: f64,
    refresh_rate: Option<f64>,
    error: Option<anyhow::Error>,
}

impl App {
    pub fn new(setup: Setup) -> Self {
        Self {
            window: None,
            pixels: None,
            setup: Some(setup),
            controller: None,
            current_size: None,
            scale_factor: 1.0,
            refresh_rate: None,
            error: None,
        }
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        log::info!("press SPACE to confirm, ESC to abort");

        let result = event_loop.run_app(&mut self);

        // window closed by the platform without a teardown
        if let Some(controller) = self.controller.as_mut() {
            if controller.is_running() {
                controller.handle_event(PresentationEvent::Abort);
            }
        }
        result?;

        if let Some(e) = self.error.take() {
            return Err(e);
        }
        match self.controller.as_ref().map(|c| c.status()) {
            Some(SessionStatus::Failed(reason)) => Err(anyhow::anyhow!("session failed: {reason}")),
            _ => Ok(()),
        }
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let setup = self
            .setup
            .take()
            .ok_or_else(|| anyhow::anyhow!("session already started"))?;

        let primary_monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow::anyhow!("No monitor available"))?;

        self.refresh_rate = primary_monitor
            .refresh_rate_millihertz()
            .map(|rate| rate as f64 / 1000.0);

        let mut window_attributes = Window::default_attributes()
            .with_title(setup.config.experiment.name.clone())
            .with_resizable(false);
        window_attributes = if setup.config.display.fullscreen {
            window_attributes.with_fullscreen(Some(Fullscreen::Borderless(Some(primary_monitor))))
        } else {
            window_attributes.with_inner_size(LogicalSize::new(1280.0, 720.0))
        };

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let physical_size = window.inner_size();
        self.current_size = Some(physical_size);
        self.scale_factor = window.scale_factor();

        log::info!(
            "display {}x{} px, scale {:.2}, refresh {}",
            physical_size.width,
            physical_size.height,
            self.scale_factor,
            self.refresh_rate
                .map_or_else(|| "unknown".to_string(), |hz| format!("{hz:.1} Hz"))
        );

        let surface_texture =
            SurfaceTexture::new(physical_size.width, physical_size.height, window.clone());
        self.pixels = Some(Pixels::new(
            physical_size.width,
            physical_size.height,
            surface_texture,
        )?);

        let renderer = SkiaRenderer::new(
            physical_size.width,
            physical_size.height,
            setup.sequencer.assets(),
            &setup.config.assets.font_path,
            &setup.config.display,
        )?;

        let mut controller = PresentationController::new(
            setup.config.experiment.clone(),
            setup.session,
            setup.sequencer,
            setup.recorder,
            setup.sensor,
            renderer,
            HighPrecisionTimer::new(),
        )?;
        controller.start();
        log::info!("setup took {:.1} ms", setup.started.elapsed().as_secs_f64() * 1e3);

        window.set_cursor_visible(false);
        window.request_redraw();
        self.window = Some(window);
        self.controller = Some(controller);
        Ok(())
    }

    /// One display refresh: draw, present, then fire due timers.
    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(controller) = self.controller.as_mut() else {
            return;
        };

        let frame_start = controller.timer.now();
        controller.render_frame();

        if let Some(pixels) = self.pixels.as_mut() {
            let src = controller.renderer().frame();
            let dst = pixels.frame_mut();
            if dst.len() == src.len() {
                dst.copy_from_slice(src);
            } else {
                log::warn!("frame size mismatch: surface {} bytes, canvas {}", dst.len(), src.len());
            }
            if let Err(e) = pixels.render() {
                log::error!("surface render failed: {e}");
                self.error = Some(e.into());
                controller.handle_event(PresentationEvent::Abort);
            }
        }

        let elapsed = controller.timer.elapsed(frame_start);
        controller.timer.record_frame(elapsed);

        for event in controller.update() {
            controller.handle_event(event);
        }

        if controller.is_running() {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
        } else {
            self.finish(event_loop);
        }
    }

    fn handle_input(&mut self, key: PhysicalKey) {
        let Some(controller) = self.controller.as_mut() else {
            return;
        };
        if let PhysicalKey::Code(k) = key {
            match k {
                KeyCode::Space => {
                    controller.handle_event(PresentationEvent::Confirm);
                }
                KeyCode::Escape => {
                    controller.handle_event(PresentationEvent::Abort);
                }
                _ => {}
            }
        }
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if self.current_size == Some(new_size) {
            return;
        }
        self.current_size = Some(new_size);
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(new_size.width, new_size.height) {
                log::error!("failed to resize surface: {e}");
            }
            if let Err(e) = pixels.resize_buffer(new_size.width, new_size.height) {
                log::error!("failed to resize buffer: {e}");
            }
        }
        if let Some(controller) = &mut self.controller {
            if let Err(e) = controller.renderer_mut().resize(new_size.width, new_size.height) {
                log::error!("failed to resize canvas: {e}");
            }
        }
        log::info!("display resized to {}x{}", new_size.width, new_size.height);
    }

    fn finish(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }
        if let Some(controller) = &self.controller {
            log::info!("session ended: {:?}", controller.status());
            let draws = controller.renderer().draw_stats();
            log::info!(
                "draw: {:.3} ms avg, {:.3} ms jitter",
                draws.average_frame_time_ns / 1e6,
                draws.jitter_ns / 1e6
            );
            for path in controller.recorder().written() {
                log::info!("results in {}", path.display());
            }
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() && self.setup.is_some() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                log::error!("failed to start session: {e:#}");
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(controller) = self.controller.as_mut() {
                    controller.handle_event(PresentationEvent::Abort);
                }
                self.finish(event_loop);
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() && !event.repeat => {
                self.handle_input(event.physical_key);
            }
            WindowEvent::Resized(size) => self.handle_resize(size),
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                self.scale_factor = scale_factor;
                if let Some(window) = &self.window {
                    self.handle_resize(window.inner_size());
                }
            }
            _ => {}
        }
    }
}
