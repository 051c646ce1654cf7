use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use anyhow::Context as _;
use crossbeam_channel::Sender;

use crate::config::{RendererConfig, SHUTDOWN_TIMEOUT, STOP_POLL_INTERVAL};
use crate::device::{GpuContext, OffscreenSurface};
use crate::scene::{FrameSlot, ResolvedFrame, SceneManager, SharedRenderData};

use super::worker::{run, Command, Notify, WorkerShared};
use super::{OffscreenTarget, RenderBackend, RenderEvent, ThreadBound};

/// Owning-thread handle to a render thread.
///
/// Every call is a queued message; none of them waits for the render thread
/// except [`Renderer::stop`] and [`Renderer::shutdown`].
pub struct Renderer<T> {
    commands: Sender<Command<T>>,
    thread: Option<JoinHandle<()>>,
    worker: ThreadId,
    shared: Arc<WorkerShared>,
}

impl<T: ThreadBound + Send + 'static> Renderer<T> {
    /// Spawns the render thread; `factory` builds the backend on it.
    pub fn spawn<B, F>(
        interval: Duration,
        factory: F,
        notify: impl Fn(RenderEvent) + Send + 'static,
    ) -> anyhow::Result<Self>
    where
        B: RenderBackend<Target = T>,
        F: FnOnce() -> B + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::unbounded();
        let shared = Arc::new(WorkerShared::default());
        let worker_shared = Arc::clone(&shared);
        let notify: Notify = Box::new(notify);

        let thread = thread::Builder::new()
            .name("vista-render".into())
            .spawn(move || run(factory(), rx, interval, worker_shared, notify))
            .context("failed to spawn the render thread")?;

        Ok(Self {
            commands: tx,
            worker: thread.thread().id(),
            thread: Some(thread),
            shared,
        })
    }

    /// Hands `target` to the render thread and starts ticking.
    pub fn start(&self, mut target: T) {
        target.move_to_thread(self.worker);
        self.send(Command::Start(target));
    }

    /// Stops ticking and releases the backend's GPU state.
    ///
    /// Polls until the render thread has handled the request, bounded by the
    /// shutdown timeout.
    pub fn stop(&self) -> bool {
        self.shared.stop_pending.store(true, Ordering::Release);
        self.send(Command::Stop);

        let deadline = Instant::now() + SHUTDOWN_TIMEOUT;
        while self.shared.stop_pending.load(Ordering::Acquire) {
            if Instant::now() >= deadline || self.thread.as_ref().is_none_or(|t| t.is_finished()) {
                log::warn!("render thread did not stop within {SHUTDOWN_TIMEOUT:?}");
                return false;
            }
            thread::sleep(STOP_POLL_INTERVAL);
        }
        true
    }

    pub fn load_image(&self, path: impl Into<PathBuf>) {
        self.send(Command::LoadImage(path.into()));
    }

    pub fn load_mesh(&self, path: impl Into<PathBuf>) {
        self.send(Command::LoadMesh(path.into()));
    }

    pub fn set_gpu_debugging(&self, enabled: bool) {
        self.send(Command::GpuDebugging(enabled));
    }

    /// Whether the render loop is ticking.
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Frames produced since spawn.
    pub fn frames_rendered(&self) -> u64 {
        self.shared.frames.load(Ordering::Relaxed)
    }

    pub fn worker_thread(&self) -> ThreadId {
        self.worker
    }

    /// Quits the render thread and joins it, waiting at most the shutdown
    /// timeout. A thread that does not exit in time is detached.
    pub fn shutdown(mut self) {
        self.quit();
    }

    fn send(&self, command: Command<T>) {
        if self.commands.send(command).is_err() {
            log::warn!("render thread is gone; command dropped");
        }
    }
}

impl<T> Renderer<T> {
    fn quit(&mut self) {
        let Some(thread) = self.thread.take() else { return };
        let _ = self.commands.send(Command::Quit);

        let deadline = Instant::now() + SHUTDOWN_TIMEOUT;
        while !thread.is_finished() {
            if Instant::now() >= deadline {
                log::warn!("render thread still running after {SHUTDOWN_TIMEOUT:?}; detaching it");
                return;
            }
            thread::sleep(STOP_POLL_INTERVAL);
        }
        if thread.join().is_err() {
            log::error!("render thread panicked");
        }
    }
}

impl<T> Drop for Renderer<T> {
    fn drop(&mut self) {
        self.quit();
    }
}

/// Render thread driving a [`SceneManager`], plus the state it shares with
/// the display: camera framing and the resolved frame.
pub struct SceneRenderer {
    renderer: Renderer<OffscreenTarget>,
    render_data: SharedRenderData,
    frame_slot: FrameSlot,
}

impl SceneRenderer {
    pub fn spawn(config: RendererConfig, notify: impl Fn(RenderEvent) + Send + 'static) -> anyhow::Result<Self> {
        let render_data = SharedRenderData::default();
        let frame_slot = FrameSlot::default();
        let interval = config.tick_interval();

        let (data, slot) = (render_data.clone(), frame_slot.clone());
        let renderer = Renderer::spawn(
            interval,
            move || SceneManager::new(config, data).with_frame_slot(slot),
            notify,
        )?;

        Ok(Self {
            renderer,
            render_data,
            frame_slot,
        })
    }

    pub fn start(&self, context: GpuContext, surface: OffscreenSurface) {
        self.renderer.start(OffscreenTarget { context, surface });
    }

    pub fn stop(&self) -> bool {
        self.renderer.stop()
    }

    pub fn add_image(&self, path: impl Into<PathBuf>) {
        self.renderer.load_image(path);
    }

    pub fn add_mesh(&self, path: impl Into<PathBuf>) {
        self.renderer.load_mesh(path);
    }

    pub fn set_gpu_debugging(&self, enabled: bool) {
        self.renderer.set_gpu_debugging(enabled);
    }

    pub fn render_data(&self) -> &SharedRenderData {
        &self.render_data
    }

    pub fn frame_slot(&self) -> &FrameSlot {
        &self.frame_slot
    }

    pub fn resolved_frame(&self) -> Option<ResolvedFrame> {
        self.frame_slot.current()
    }

    pub fn is_active(&self) -> bool {
        self.renderer.is_active()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.renderer.frames_rendered()
    }

    pub fn shutdown(self) {
        self.renderer.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::Mutex;

    use super::*;
    use crate::config::frame_interval;

    #[derive(Default)]
    struct Recorder {
        initialized: AtomicBool,
        cleaned: AtomicUsize,
        loads: Mutex<Vec<PathBuf>>,
        init_thread: Mutex<Option<ThreadId>>,
    }

    struct FakeBackend {
        recorder: Arc<Recorder>,
        ready: bool,
    }

    impl RenderBackend for FakeBackend {
        type Target = ();

        fn initialize(&mut self, _: ()) -> bool {
            self.ready = true;
            self.recorder.initialized.store(true, Ordering::SeqCst);
            *self.recorder.init_thread.lock().unwrap() = Some(thread::current().id());
            true
        }

        fn render(&mut self) -> bool {
            self.ready
        }

        fn clean_up(&mut self) -> bool {
            if !self.ready {
                return false;
            }
            self.ready = false;
            self.recorder.cleaned.fetch_add(1, Ordering::SeqCst);
            true
        }

        fn load_image(&mut self, path: &Path) -> bool {
            self.recorder.loads.lock().unwrap().push(path.to_path_buf());
            true
        }
    }

    fn spawn(fps: u32) -> (Renderer<()>, Arc<Recorder>, Arc<AtomicUsize>) {
        let recorder = Arc::new(Recorder::default());
        let frames = Arc::new(AtomicUsize::new(0));
        let (p, f) = (Arc::clone(&recorder), Arc::clone(&frames));
        let renderer = Renderer::spawn(
            frame_interval(fps),
            move || FakeBackend { recorder: p, ready: false },
            move |event| {
                if event == RenderEvent::FrameReady {
                    f.fetch_add(1, Ordering::SeqCst);
                }
            },
        )
        .unwrap();
        (renderer, recorder, frames)
    }

    // ── timing ────────────────────────────────────────────────────────────

    #[test]
    fn thirty_fps_for_half_a_second_is_about_fifteen_frames() {
        let (renderer, _, frames) = spawn(30);
        renderer.start(());
        thread::sleep(Duration::from_millis(500));
        assert!(renderer.stop());

        let n = frames.load(Ordering::SeqCst);
        assert!((13..=17).contains(&n), "got {n} frames");
        assert_eq!(renderer.frames_rendered(), n as u64);
    }

    #[test]
    fn no_frames_before_start() {
        let (renderer, _, frames) = spawn(120);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(frames.load(Ordering::SeqCst), 0);
        assert!(!renderer.is_active());
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    #[test]
    fn backend_runs_on_the_render_thread() {
        let (renderer, recorder, _) = spawn(60);
        renderer.start(());
        let deadline = Instant::now() + Duration::from_secs(2);
        while !renderer.is_active() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(renderer.is_active());
        assert_eq!(*recorder.init_thread.lock().unwrap(), Some(renderer.worker_thread()));
        assert_ne!(renderer.worker_thread(), thread::current().id());
    }

    #[test]
    fn stop_cleans_up_once_and_shutdown_joins() {
        let (renderer, recorder, _) = spawn(60);
        renderer.start(());
        renderer.load_image("a.png");
        assert!(renderer.stop());
        assert!(!renderer.is_active());
        renderer.shutdown();

        assert!(recorder.initialized.load(Ordering::SeqCst));
        assert_eq!(recorder.cleaned.load(Ordering::SeqCst), 1);
        assert_eq!(*recorder.loads.lock().unwrap(), vec![PathBuf::from("a.png")]);
    }

    #[test]
    fn drop_quits_the_thread() {
        let (renderer, recorder, _) = spawn(60);
        renderer.start(());
        drop(renderer);
        assert!(recorder.cleaned.load(Ordering::SeqCst) <= 1);
    }
}
