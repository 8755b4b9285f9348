//! Message loop that owns the "UI thread" of the console host.
//!
//! Jobs from engine threads are queued over a channel and run in order on the
//! thread that called [`UiDispatcher::run`]; the sender blocks until its job ran.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use crossbeam_channel::{self as channel, Receiver, RecvTimeoutError, Sender};
use eyedropper_setup_core::{UiDispatcher, UiJob, WindowHandle};
use tracing::{debug, trace};

const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

enum UiMessage {
    Job(UiJob),
    Shutdown,
}

pub struct ChannelDispatcher {
    tx: Sender<UiMessage>,
    rx: Receiver<UiMessage>,
    shut_down: AtomicBool,
    ui_thread: Mutex<Option<ThreadId>>,
    window: WindowHandle,
}

impl ChannelDispatcher {
    pub fn new() -> Self {
        let (tx, rx) = channel::unbounded();
        Self {
            tx,
            rx,
            shut_down: AtomicBool::new(false),
            ui_thread: Mutex::new(None),
            window: WindowHandle(std::process::id() as usize),
        }
    }

    fn on_ui_thread(&self) -> bool {
        let ui_thread = self
            .ui_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *ui_thread == Some(thread::current().id())
    }

    fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl Default for ChannelDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl UiDispatcher for ChannelDispatcher {
    fn invoke(&self, job: UiJob) {
        // Jobs raised from a UI job run in place; queuing them would wait on ourselves.
        if self.on_ui_thread() {
            job();
            return;
        }
        if self.is_shut_down() {
            debug!("ui loop stopped; dropping job");
            return;
        }

        let (done_tx, done_rx) = channel::bounded::<()>(1);
        let wrapped: UiJob = Box::new(move || {
            job();
            let _ = done_tx.send(());
        });
        if self.tx.send(UiMessage::Job(wrapped)).is_err() {
            return;
        }
        loop {
            match done_rx.recv_timeout(SHUTDOWN_POLL) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                Err(RecvTimeoutError::Timeout) if self.is_shut_down() => {
                    debug!("ui loop stopped before job ran");
                    return;
                }
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
    }

    fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(UiMessage::Shutdown);
    }

    fn run(&self) {
        *self
            .ui_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(thread::current().id());
        debug!("ui loop started");

        while let Ok(message) = self.rx.recv() {
            match message {
                UiMessage::Job(job) => {
                    trace!("running ui job");
                    job();
                }
                UiMessage::Shutdown => break,
            }
        }

        self.shut_down.store(true, Ordering::SeqCst);
        // Dropping queued jobs releases their waiting senders.
        let dropped = self.rx.try_iter().count();
        *self
            .ui_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        debug!(dropped, "ui loop stopped");
    }

    fn window_handle(&self) -> WindowHandle {
        self.window
    }
}
