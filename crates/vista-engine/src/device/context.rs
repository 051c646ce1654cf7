//! Shared GPU context and offscreen surface with explicit thread ownership.
//!
//! The display window creates the device. The render thread receives a
//! [`GpuContext`] that shares it, moved across the thread boundary together
//! with its owner tag. Operations that need a current context call
//! [`GpuContext::make_current`], which refuses to run on any other thread.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use anyhow::Context as _;
use parking_lot::Mutex;

use crate::config::{OFFSCREEN_COLOR_FORMAT, OFFSCREEN_DEPTH_FORMAT};
use crate::coords::TextureSize;

use super::GpuInit;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("GPU context is owned by thread {owner:?} but was used from {caller:?}")]
    WrongThread { owner: ThreadId, caller: ThreadId },

    #[error("GPU device lost: {0}")]
    DeviceLost(String),
}

/// Runtime-checked "current owning thread" tag.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ThreadAffinity {
    owner: ThreadId,
}

impl ThreadAffinity {
    /// Tags the calling thread as owner.
    pub fn current() -> Self {
        Self { owner: thread::current().id() }
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    pub fn is_current(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Reassigns ownership. Called by the current owner before handing off.
    pub fn move_to(&mut self, thread: ThreadId) {
        self.owner = thread;
    }

    pub fn check(&self) -> Result<(), ContextError> {
        let caller = thread::current().id();
        if caller == self.owner {
            Ok(())
        } else {
            Err(ContextError::WrongThread { owner: self.owner, caller })
        }
    }
}

/// Device-lost state shared by every context cloned from one device.
#[derive(Debug, Default)]
pub(crate) struct DeviceLost {
    reason: Mutex<Option<String>>,
}

impl DeviceLost {
    pub(crate) fn mark(&self, reason: String) {
        self.reason.lock().get_or_insert(reason);
    }

    pub(crate) fn reason(&self) -> Option<String> {
        self.reason.lock().clone()
    }
}

/// Installs the baseline device callbacks.
///
/// wgpu panics on uncaptured errors unless a handler is installed; the
/// baseline handler logs them unthrottled. The scene manager swaps in its
/// throttled logger while GPU debugging is enabled.
pub(crate) fn install_device_hooks(device: &wgpu::Device) -> Arc<DeviceLost> {
    let lost = Arc::new(DeviceLost::default());

    let flag = Arc::clone(&lost);
    device.set_device_lost_callback(move |reason, message| {
        log::error!("GPU device lost ({reason:?}): {message}");
        flag.mark(format!("{reason:?}: {message}"));
    });

    install_default_error_handler(device);
    lost
}

pub(crate) fn install_default_error_handler(device: &wgpu::Device) {
    device.on_uncaptured_error(Arc::new(|e: wgpu::Error| {
        log::error!("uncaptured GPU error: {e}");
    }));
}

/// Shared handle to the display device, owned by exactly one thread at a time.
///
/// Not `Clone`: sharing produces a fresh context via [`super::Gpu::share_context`]
/// so that every handle carries its own owner tag.
#[derive(Debug)]
pub struct GpuContext {
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    lost: Arc<DeviceLost>,
    affinity: ThreadAffinity,
}

impl GpuContext {
    pub(crate) fn from_parts(
        adapter: wgpu::Adapter,
        device: wgpu::Device,
        queue: wgpu::Queue,
        lost: Arc<DeviceLost>,
    ) -> Self {
        Self {
            adapter,
            device,
            queue,
            lost,
            affinity: ThreadAffinity::current(),
        }
    }

    /// Creates a context without a window.
    ///
    /// Used by tools and tests; fails when the machine has no usable adapter.
    pub async fn headless(init: &GpuInit) -> anyhow::Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&init.device_descriptor("vista headless device"))
            .await
            .context("failed to create headless wgpu device/queue")?;

        let lost = install_device_hooks(&device);
        Ok(Self::from_parts(adapter, device, queue, lost))
    }

    /// Verifies the calling thread owns this context and the device is alive.
    pub fn make_current(&self) -> Result<(), ContextError> {
        self.affinity.check()?;
        match self.lost.reason() {
            Some(reason) => Err(ContextError::DeviceLost(reason)),
            None => Ok(()),
        }
    }

    /// Thread check only; a lost device still passes.
    pub fn check_thread(&self) -> Result<(), ContextError> {
        self.affinity.check()
    }

    pub fn thread(&self) -> ThreadId {
        self.affinity.owner()
    }

    pub fn move_to_thread(&mut self, thread: ThreadId) {
        log::debug!("GPU context moved from {:?} to {thread:?}", self.affinity.owner());
        self.affinity.move_to(thread);
    }

    pub fn is_lost(&self) -> bool {
        self.lost.reason().is_some()
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Largest sample count `<= requested` that every format in `formats` supports.
    pub fn supported_sample_count(&self, requested: u32, formats: &[wgpu::TextureFormat]) -> u32 {
        let supports = |count: u32| {
            formats.iter().all(|f| {
                self.adapter
                    .get_texture_format_features(*f)
                    .flags
                    .sample_count_supported(count)
            })
        };
        pick_sample_count(requested, supports)
    }
}

/// Steps down through 8, 4, 2 until `supports` accepts a count; 1 always works.
pub(crate) fn pick_sample_count(requested: u32, supports: impl Fn(u32) -> bool) -> u32 {
    [16, 8, 4, 2]
        .into_iter()
        .filter(|c| *c <= requested)
        .find(|c| supports(*c))
        .unwrap_or(1)
}

/// Description of the offscreen render target.
///
/// Created on the GUI thread and moved to the render thread together with the
/// context. The textures themselves are allocated by the scene manager.
#[derive(Debug, Clone)]
pub struct OffscreenSurface {
    size: TextureSize,
    color_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,
    requested_samples: u32,
    affinity: ThreadAffinity,
}

impl OffscreenSurface {
    pub fn new(size: TextureSize, requested_samples: u32) -> Self {
        Self {
            size,
            color_format: OFFSCREEN_COLOR_FORMAT,
            depth_format: OFFSCREEN_DEPTH_FORMAT,
            requested_samples: requested_samples.max(1),
            affinity: ThreadAffinity::current(),
        }
    }

    pub fn size(&self) -> TextureSize {
        self.size
    }

    pub fn set_size(&mut self, size: TextureSize) {
        self.size = size;
    }

    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.color_format
    }

    pub fn depth_format(&self) -> wgpu::TextureFormat {
        self.depth_format
    }

    pub fn requested_samples(&self) -> u32 {
        self.requested_samples
    }

    pub fn thread(&self) -> ThreadId {
        self.affinity.owner()
    }

    pub fn move_to_thread(&mut self, thread: ThreadId) {
        self.affinity.move_to(thread);
    }

    pub fn check_thread(&self) -> Result<(), ContextError> {
        self.affinity.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── thread affinity ───────────────────────────────────────────────────

    #[test]
    fn affinity_accepts_owner_thread() {
        let a = ThreadAffinity::current();
        assert!(a.is_current());
        assert_eq!(a.check(), Ok(()));
    }

    #[test]
    fn affinity_rejects_other_thread() {
        let a = ThreadAffinity::current();
        let result = thread::spawn(move || a.check()).join().unwrap();
        assert!(matches!(result, Err(ContextError::WrongThread { .. })));
    }

    #[test]
    fn moved_affinity_follows_new_owner() {
        let mut a = ThreadAffinity::current();
        let (tx, rx) = std::sync::mpsc::channel();
        let handle = thread::spawn(move || {
            let a: ThreadAffinity = rx.recv().unwrap();
            a.check()
        });
        a.move_to(handle.thread().id());
        assert!(!a.is_current());
        tx.send(a).unwrap();
        assert_eq!(handle.join().unwrap(), Ok(()));
    }

    #[test]
    fn offscreen_surface_moves_with_tag() {
        let mut s = OffscreenSurface::new(TextureSize::new(1080, 720), 8);
        assert!(s.check_thread().is_ok());
        let other = thread::spawn(|| thread::current().id()).join().unwrap();
        s.move_to_thread(other);
        assert!(s.check_thread().is_err());
        assert_eq!(s.color_format(), wgpu::TextureFormat::Rgba8UnormSrgb);
    }

    // ── sample count ──────────────────────────────────────────────────────

    #[test]
    fn sample_count_steps_down() {
        assert_eq!(pick_sample_count(8, |c| c <= 8), 8);
        assert_eq!(pick_sample_count(8, |c| c == 4), 4);
        assert_eq!(pick_sample_count(8, |_| false), 1);
        assert_eq!(pick_sample_count(1, |_| true), 1);
    }

    #[test]
    fn device_lost_keeps_first_reason() {
        let lost = DeviceLost::default();
        lost.mark("first".into());
        lost.mark("second".into());
        assert_eq!(lost.reason().as_deref(), Some("first"));
    }
}
