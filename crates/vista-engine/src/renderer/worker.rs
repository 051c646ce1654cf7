use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{never, select, tick, Receiver};

use crate::time::FrameClock;

use super::RenderBackend;

/// Messages consumed by the render thread, in order.
pub(crate) enum Command<T> {
    Start(T),
    Stop,
    LoadImage(PathBuf),
    LoadMesh(PathBuf),
    GpuDebugging(bool),
    Quit,
}

/// Notifications emitted by the render thread.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RenderEvent {
    Started { ok: bool },
    FrameReady,
    Stopped,
}

/// State visible from the owning thread.
#[derive(Debug, Default)]
pub(crate) struct WorkerShared {
    pub(crate) active: AtomicBool,
    pub(crate) frames: AtomicU64,

    /// Set by the owner before sending `Stop`, cleared once it was handled.
    pub(crate) stop_pending: AtomicBool,
}

pub(crate) type Notify = Box<dyn Fn(RenderEvent) + Send>;

/// Render thread body: a command loop multiplexed with the frame ticker.
pub(crate) fn run<B: RenderBackend>(
    mut backend: B,
    commands: Receiver<Command<B::Target>>,
    interval: Duration,
    shared: Arc<WorkerShared>,
    notify: Notify,
) {
    log::debug!("render thread running at {interval:?} per frame");
    let mut ticker: Receiver<std::time::Instant> = never();
    let mut clock = FrameClock::new();
    let target_fps = 1.0 / interval.as_secs_f32().max(f32::EPSILON);

    loop {
        select! {
            recv(commands) -> msg => match msg {
                Ok(Command::Start(target)) => {
                    let ok = backend.initialize(target);
                    if ok {
                        ticker = tick(interval);
                        clock.reset();
                        shared.active.store(true, Ordering::Release);
                        log::info!("render loop started");
                    } else {
                        log::error!("render loop failed to start");
                    }
                    notify(RenderEvent::Started { ok });
                }
                Ok(Command::Stop) => {
                    ticker = never();
                    backend.clean_up();
                    shared.active.store(false, Ordering::Release);
                    shared.stop_pending.store(false, Ordering::Release);
                    log::info!("render loop stopped");
                    notify(RenderEvent::Stopped);
                }
                Ok(Command::LoadImage(path)) => {
                    backend.load_image(&path);
                }
                Ok(Command::LoadMesh(path)) => {
                    backend.load_mesh(&path);
                }
                Ok(Command::GpuDebugging(enabled)) => backend.set_gpu_debugging(enabled),
                Ok(Command::Quit) | Err(_) => break,
            },
            recv(ticker) -> _ => {
                if backend.render() {
                    shared.frames.fetch_add(1, Ordering::Relaxed);
                    notify(RenderEvent::FrameReady);
                    clock.tick();
                }
                if let Some(report) = clock.take_report() {
                    let fps = report.fps();
                    if fps < target_fps * 0.9 {
                        log::warn!("render loop behind: {fps:.1} fps, target {target_fps:.1}");
                    } else {
                        log::debug!("render loop at {fps:.1} fps");
                    }
                }
            },
        }
    }

    backend.clean_up();
    shared.active.store(false, Ordering::Release);
    shared.stop_pending.store(false, Ordering::Release);
    log::debug!("render thread exiting");
}
