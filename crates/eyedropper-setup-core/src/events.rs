//! Events the bootstrapper publishes to whatever UI observes it.

use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use crate::model::{
    DetectionState, Display, ErrorType, InstallationState, LaunchAction, UpgradeDetectionState,
};

/// Copy of the UI-relevant manager fields at the moment an event was raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagerSnapshot {
    pub installation_state: InstallationState,
    pub action: LaunchAction,
    pub planned_action: LaunchAction,
    pub display: Display,
    pub detect_state: DetectionState,
    pub upgrade_detect_state: UpgradeDetectionState,
    pub downgrade: bool,
    pub canceled: bool,
}

/// Detection finished; the UI may take over the next step.
#[derive(Debug, Clone, Serialize)]
pub struct ActionRequested {
    /// Raised again after the user retried a canceled run.
    pub is_retry: bool,
    pub snapshot: ManagerSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionCompleted {
    pub auto_close: bool,
    pub error_type: Option<ErrorType>,
    pub snapshot: ManagerSnapshot,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct InstallationProgress {
    pub percentage: u32,
}

/// Reply from an [`ActionRequested`] observer.
#[must_use]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Handled(pub bool);

/// UI-side receiver of bootstrapper events. All methods default to no-ops.
pub trait BootstrapperObserver: Send + Sync {
    fn action_requested(&self, _event: &ActionRequested) -> Handled {
        Handled(false)
    }

    fn action_completed(&self, _event: &ActionCompleted) {}

    fn progress(&self, _event: &InstallationProgress) {}

    fn canceled(&self) {}
}

/// Fan-out point for observers.
#[derive(Default)]
pub struct EventSurface {
    observers: RwLock<Vec<Arc<dyn BootstrapperObserver>>>,
}

impl EventSurface {
    pub fn subscribe(&self, observer: Arc<dyn BootstrapperObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.current().len()
    }

    // Observers may subscribe from inside a handler, so iterate a copy.
    fn current(&self) -> Vec<Arc<dyn BootstrapperObserver>> {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Delivers to every observer; handled when any of them handled it.
    pub fn raise_action_requested(&self, event: &ActionRequested) -> Handled {
        let mut handled = false;
        for observer in self.current() {
            handled |= observer.action_requested(event).0;
        }
        Handled(handled)
    }

    pub fn raise_action_completed(&self, event: &ActionCompleted) {
        for observer in self.current() {
            observer.action_completed(event);
        }
    }

    pub fn raise_progress(&self, event: &InstallationProgress) {
        for observer in self.current() {
            observer.progress(event);
        }
    }

    pub fn raise_canceled(&self) {
        for observer in self.current() {
            observer.canceled();
        }
    }
}
