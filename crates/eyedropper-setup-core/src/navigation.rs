//! Page routing for bootstrapper front-ends.
//!
//! Maps lifecycle events to the page a UI should show next, using only the
//! snapshot carried by the event.

use serde::Serialize;

use crate::events::{ActionCompleted, ActionRequested};
use crate::model::{ErrorType, InstallationState, LaunchAction};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum Page {
    Install,
    InstallDetails,
    InstallProgress,
    InstallSuccessful,
    Uninstall,
    UninstallProgress,
    UninstallSuccessful,
    Error,
    ElevatedError,
    InstallCanceled,
    UninstallCanceled,
    DowngradeDetected,
}

impl Page {
    pub fn key(self) -> &'static str {
        match self {
            Page::Install => "Install",
            Page::InstallDetails => "InstallDetails",
            Page::InstallProgress => "InstallProgress",
            Page::InstallSuccessful => "InstallSuccessful",
            Page::Uninstall => "Uninstall",
            Page::UninstallProgress => "UninstallProgress",
            Page::UninstallSuccessful => "UninstallSuccessful",
            Page::Error => "Error",
            Page::ElevatedError => "ElevatedError",
            Page::InstallCanceled => "InstallCanceled",
            Page::UninstallCanceled => "UninstallCanceled",
            Page::DowngradeDetected => "DowngradeDetected",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Page::Install => "Install",
            Page::InstallDetails => "Installation options",
            Page::InstallProgress => "Installing",
            Page::InstallSuccessful => "Installation complete",
            Page::Uninstall => "Uninstall",
            Page::UninstallProgress => "Uninstalling",
            Page::UninstallSuccessful => "Uninstall complete",
            Page::Error => "Setup failed",
            Page::ElevatedError => "Administrator rights required",
            Page::InstallCanceled => "Installation canceled",
            Page::UninstallCanceled => "Uninstall canceled",
            Page::DowngradeDetected => "A newer version is installed",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub page: Page,
    /// Insert the Install page behind the target so "back" returns to it.
    pub add_install_back_entry: bool,
}

impl Route {
    fn to(page: Page) -> Self {
        Self {
            page,
            add_install_back_entry: false,
        }
    }
}

pub fn route_for_request(event: &ActionRequested) -> Route {
    let snapshot = &event.snapshot;
    let full = snapshot.display.is_full();

    if event.is_retry {
        return Route {
            page: Page::InstallDetails,
            add_install_back_entry: true,
        };
    }
    if snapshot.downgrade {
        return Route::to(Page::DowngradeDetected);
    }
    if snapshot.installation_state == InstallationState::Failed {
        return Route::to(Page::Error);
    }
    if snapshot.action == LaunchAction::Uninstall {
        return Route::to(if full {
            Page::Uninstall
        } else {
            Page::UninstallProgress
        });
    }
    Route::to(if full {
        Page::Install
    } else {
        Page::InstallProgress
    })
}

/// Page to show after apply or planning ended; `None` when the window closes itself.
pub fn route_for_completion(event: &ActionCompleted) -> Option<Page> {
    if event.auto_close {
        return None;
    }
    let snapshot = &event.snapshot;
    let uninstalling = snapshot.planned_action == LaunchAction::Uninstall;

    let page = if snapshot.canceled {
        if uninstalling {
            Page::UninstallCanceled
        } else {
            Page::InstallCanceled
        }
    } else if snapshot.installation_state == InstallationState::Failed {
        if event.error_type == Some(ErrorType::Elevate) {
            Page::ElevatedError
        } else {
            Page::Error
        }
    } else if uninstalling {
        Page::UninstallSuccessful
    } else {
        Page::InstallSuccessful
    };
    Some(page)
}
