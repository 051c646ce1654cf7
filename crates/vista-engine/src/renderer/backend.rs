use std::path::Path;
use std::thread::ThreadId;

use crate::device::{GpuContext, OffscreenSurface};
use crate::scene::SceneManager;

/// A value whose owner thread tag must follow it across a handoff.
pub trait ThreadBound {
    fn move_to_thread(&mut self, thread: ThreadId);
}

impl ThreadBound for () {
    fn move_to_thread(&mut self, _thread: ThreadId) {}
}

/// Context plus offscreen surface, handed to the render thread on start.
#[derive(Debug)]
pub struct OffscreenTarget {
    pub context: GpuContext,
    pub surface: OffscreenSurface,
}

impl ThreadBound for OffscreenTarget {
    fn move_to_thread(&mut self, thread: ThreadId) {
        self.context.move_to_thread(thread);
        self.surface.move_to_thread(thread);
    }
}

/// What the render loop drives. Lives on the render thread only.
pub trait RenderBackend {
    type Target: ThreadBound + Send + 'static;

    fn initialize(&mut self, target: Self::Target) -> bool;

    /// One full pass; `true` when a frame was produced.
    fn render(&mut self) -> bool;

    fn clean_up(&mut self) -> bool;

    fn load_image(&mut self, path: &Path) -> bool {
        log::warn!("{} ignored: backend does not load images", path.display());
        false
    }

    fn load_mesh(&mut self, path: &Path) -> bool {
        log::warn!("{} ignored: backend does not load meshes", path.display());
        false
    }

    fn set_gpu_debugging(&mut self, _enabled: bool) {}
}

impl RenderBackend for SceneManager {
    type Target = OffscreenTarget;

    fn initialize(&mut self, target: OffscreenTarget) -> bool {
        SceneManager::initialize(self, target.context, target.surface)
    }

    fn render(&mut self) -> bool {
        SceneManager::render(self)
    }

    fn clean_up(&mut self) -> bool {
        SceneManager::clean_up(self)
    }

    fn load_image(&mut self, path: &Path) -> bool {
        self.add_texture_object(path)
    }

    fn load_mesh(&mut self, path: &Path) -> bool {
        self.add_mesh_object(path)
    }

    fn set_gpu_debugging(&mut self, enabled: bool) {
        self.change_gpu_debugging(enabled);
    }
}
