//! UI-thread affinity seam.
//!
//! The state machine never assumes it runs on the UI thread; work that must
//! happen there is handed to a [`UiDispatcher`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::model::WindowHandle;

pub type UiJob = Box<dyn FnOnce() + Send + 'static>;

pub trait UiDispatcher: Send + Sync {
    /// Runs `job` on the UI thread and blocks until it finished.
    ///
    /// A job submitted after shutdown may be dropped without running.
    fn invoke(&self, job: UiJob);

    /// Asks the UI loop to stop; returns without waiting for it.
    fn shutdown(&self);

    /// Runs the UI loop on the calling thread until [`UiDispatcher::shutdown`].
    fn run(&self);

    /// Handle of the main window, used to parent engine prompts.
    fn window_handle(&self) -> WindowHandle;
}

/// Runs `job` through `dispatcher` and hands back its result, if it ran.
pub fn invoke_with<R, F>(dispatcher: &dyn UiDispatcher, job: F) -> Option<R>
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    let (tx, rx) = std::sync::mpsc::sync_channel(1);
    dispatcher.invoke(Box::new(move || {
        let _ = tx.send(job());
    }));
    rx.try_recv().ok()
}

/// Dispatcher that runs every job immediately on the caller's thread.
///
/// Used when no UI message loop exists, and by tests.
#[derive(Debug, Default)]
pub struct InlineDispatcher {
    shut_down: AtomicBool,
}

impl InlineDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl UiDispatcher for InlineDispatcher {
    fn invoke(&self, job: UiJob) {
        job();
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }

    fn run(&self) {}

    fn window_handle(&self) -> WindowHandle {
        WindowHandle::default()
    }
}

/// Asks the user where a layout run should copy the bundle payloads.
pub trait FolderPrompt: Send + Sync {
    /// Returns the chosen folder, or `None` when the user dismissed the prompt.
    fn pick_folder(&self, initial: &Path) -> Option<PathBuf>;
}
