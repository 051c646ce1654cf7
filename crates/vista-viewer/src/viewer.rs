use std::cell::Cell;
use std::rc::Rc;

use vista_engine::config::RendererConfig;
use vista_engine::core::{App, AppControl, FrameCtx, SetupCtx};
use vista_engine::device::OffscreenSurface;
use vista_engine::display::{DisplaySurface, Trackball};
use vista_engine::input::{InputEvent, Key, KeyState};
use vista_engine::renderer::{RenderEvent, SceneRenderer};

use crate::args::LoadRequest;

/// The viewer shell: one window showing the render thread's output.
///
/// The render thread starts after the display has painted once. Files given
/// on the command line or dropped before that are queued until then.
pub struct Viewer {
    config: RendererConfig,
    pending: Vec<LoadRequest>,

    renderer: Option<SceneRenderer>,
    display: Option<DisplaySurface>,
    trackball: Option<Trackball>,

    display_ready: Rc<Cell<bool>>,
    started: bool,
    gpu_debugging: bool,
    window_metrics: Option<((f32, f32), f32)>,
    exit_requested: bool,
}

impl Viewer {
    pub fn new(config: RendererConfig, pending: Vec<LoadRequest>) -> Self {
        let gpu_debugging = config.gpu_debugging;
        Self {
            config,
            pending,
            renderer: None,
            display: None,
            trackball: None,
            display_ready: Rc::new(Cell::new(false)),
            started: false,
            gpu_debugging,
            window_metrics: None,
            exit_requested: false,
        }
    }

    fn load(&mut self, request: LoadRequest) {
        let Some(renderer) = self.renderer.as_ref().filter(|_| self.started) else {
            self.pending.push(request);
            return;
        };
        match request {
            LoadRequest::Image(path) => {
                log::info!("loading image {}", path.display());
                renderer.add_image(path);
            }
            LoadRequest::Mesh(path) => {
                log::info!("loading mesh {}", path.display());
                renderer.add_mesh(path);
            }
        }
    }

    /// Hands a context sharing the window's device to the render thread, then
    /// sends the queued files.
    fn start_rendering(&mut self, ctx: &FrameCtx<'_, '_>) {
        let Some(renderer) = &self.renderer else { return };
        let surface = OffscreenSurface::new(self.config.output_size, self.config.sample_count);
        renderer.start(ctx.gpu.share_context(), surface);
        self.started = true;
        log::info!("render thread started");

        for request in std::mem::take(&mut self.pending) {
            self.load(request);
        }
    }

    fn on_key(&mut self, key: Key) -> bool {
        match key {
            Key::Escape => {
                self.exit_requested = true;
                true
            }
            Key::T => {
                if let Some(tb) = self.trackball.as_mut() {
                    tb.set_enabled(!tb.is_enabled());
                }
                false
            }
            Key::R => self.trackball.as_mut().is_some_and(|tb| tb.restore_original()),
            Key::M => {
                if let Some(renderer) = &self.renderer {
                    let mode = renderer.render_data().update(|d| {
                        d.toggle_mode();
                        d.mode
                    });
                    log::info!("render mode: {mode:?}");
                }
                false
            }
            Key::G => {
                self.gpu_debugging = !self.gpu_debugging;
                if let Some(renderer) = &self.renderer {
                    renderer.set_gpu_debugging(self.gpu_debugging);
                }
                false
            }
            _ => false,
        }
    }
}

impl App for Viewer {
    fn on_gpu_ready(&mut self, ctx: SetupCtx<'_, '_>) -> AppControl {
        let waker = ctx.waker;
        let renderer = SceneRenderer::spawn(self.config.clone(), move |event| match event {
            RenderEvent::FrameReady => {
                waker.wake();
            }
            RenderEvent::Started { ok: false } => log::error!("render thread failed to start"),
            RenderEvent::Started { ok: true } | RenderEvent::Stopped => {}
        });
        let renderer = match renderer {
            Ok(r) => r,
            Err(e) => {
                log::error!("{e:#}");
                return AppControl::Exit;
            }
        };

        let mut display = DisplaySurface::new(renderer.frame_slot().clone());
        let ready = Rc::clone(&self.display_ready);
        display.on_initialized(move || ready.set(true));

        self.trackball = Some(Trackball::new(renderer.render_data().clone()));
        self.display = Some(display);
        self.renderer = Some(renderer);
        AppControl::Continue
    }

    fn on_input(&mut self, event: &InputEvent) -> bool {
        match event {
            InputEvent::FileDropped(path) => {
                self.load(LoadRequest::from_path(path));
                false
            }
            InputEvent::Key {
                key,
                state: KeyState::Pressed,
                repeat: false,
                ..
            } if matches!(key, Key::Escape | Key::T | Key::R | Key::M | Key::G) => self.on_key(*key),
            _ => self.trackball.as_mut().is_some_and(|tb| tb.handle(event)),
        }
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if self.exit_requested {
            return AppControl::Exit;
        }
        let Some(display) = self.display.as_mut() else {
            return AppControl::Continue;
        };

        let metrics = (ctx.window.logical_size(), ctx.window.scale_factor());
        if self.window_metrics != Some(metrics) {
            display.resize(metrics.0, metrics.1);
            self.window_metrics = Some(metrics);
        }

        let control = ctx.render(|rctx, target| {
            display.paint(rctx, target);
        });

        if self.display_ready.get() && !self.started {
            self.start_rendering(ctx);
        }
        control
    }

    fn on_exit(&mut self) {
        if let Some(renderer) = self.renderer.take() {
            renderer.stop();
            renderer.shutdown();
        }
        log::info!("viewer closed");
    }
}
