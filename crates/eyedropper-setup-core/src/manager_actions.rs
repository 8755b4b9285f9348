use tracing::{debug, info, warn};

use super::BootstrapperManager;
use crate::dispatch::invoke_with;
use crate::model::{DetectionState, Display, LaunchAction, UpgradeDetectionState};

impl BootstrapperManager {
    /// Plans a repair when this version is already installed, otherwise an install.
    pub fn install(&self) {
        let action = {
            let state = self.lock();
            if state.detect_state == DetectionState::Present
                && state.upgrade_detect_state == UpgradeDetectionState::None
            {
                LaunchAction::Repair
            } else {
                LaunchAction::Install
            }
        };
        self.plan(action);
    }

    pub fn uninstall(&self) {
        self.plan(LaunchAction::Uninstall);
    }

    /// Flags the run as canceled; the engine sees it on its next progress callback.
    pub fn cancel(&self, auto_close: bool) {
        {
            let mut state = self.lock();
            state.canceled = true;
            state.auto_close = auto_close;
        }
        info!(auto_close, "cancellation requested");
        self.events.raise_canceled();
    }

    /// Stops the UI loop, which ends [`BootstrapperManager::run`].
    pub fn close(&self) {
        debug!("closing bootstrapper window");
        self.dispatcher.shutdown();
    }

    /// Starts over after a cancellation. Has no effect otherwise.
    pub fn reset_state(&self) {
        {
            let mut state = self.lock();
            if !state.canceled {
                debug!("reset ignored; run was not canceled");
                return;
            }
            state.is_retry = true;
            state.auto_close = false;
            state.canceled = false;
        }
        info!("retrying after cancellation");
        self.engine.detect();
    }

    pub fn close_splash_screen(&self) {
        self.engine.close_splash_screen();
    }

    pub(super) fn plan(&self, action: LaunchAction) {
        self.lock().planned_action = action;
        info!(%action, "planning");
        self.engine.plan(action);
    }

    fn plan_by_launch_action(&self) {
        if self.command.action == LaunchAction::Uninstall {
            self.uninstall();
        } else {
            self.install();
        }
    }

    /// Chooses where a layout run copies its payloads, then plans it.
    pub(super) fn plan_layout(&self) {
        if let Some(dir) = self.command.layout_directory.clone() {
            self.set_layout_directory(dir.to_string_lossy().into_owned());
            self.plan_by_launch_action();
            return;
        }

        let current = self.current_dir.clone();
        self.set_layout_directory(current.to_string_lossy().into_owned());
        if self.command.display != Display::Full {
            self.plan_by_launch_action();
            return;
        }

        let Some(prompt) = self.folder_prompt.clone() else {
            warn!("no folder prompt available; using current directory for layout");
            self.plan_by_launch_action();
            return;
        };
        let chosen = invoke_with(self.dispatcher.as_ref(), move || {
            prompt.pick_folder(&current)
        })
        .flatten();
        match chosen {
            Some(dir) => {
                self.set_layout_directory(dir.to_string_lossy().into_owned());
                self.plan_by_launch_action();
            }
            None => {
                info!("layout folder selection dismissed");
                self.close();
            }
        }
    }
}
