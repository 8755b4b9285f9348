use std::cmp::Ordering;
use std::mem;

use tracing::{debug, info};

use super::{BootstrapperManager, APPLICATION_PACKAGE_ID};
use crate::callbacks::{DetectBegin, DetectComplete, DetectPackageComplete, DetectRelatedBundle};
use crate::command_line::CommandLineOverrides;
use crate::events::ActionRequested;
use crate::model::{
    DetectionState, Display, InstallationState, LaunchAction, PackageState, RegistrationType,
    RelationType, ResumeType, UpgradeDetectionState,
};
use crate::util::succeeded;

impl BootstrapperManager {
    pub(super) fn detect_begin(&self, args: &DetectBegin) {
        let mut state = self.lock();
        state.installation_state = InstallationState::Detecting;
        state.detect_state = if args.registration_type == RegistrationType::Full {
            DetectionState::Present
        } else {
            DetectionState::Absent
        };
        state.planned_action = LaunchAction::Unknown;
        debug!(
            registration = ?args.registration_type,
            packages = args.package_count,
            "detection started"
        );
    }

    pub(super) fn detect_complete(&self, args: &DetectComplete) {
        self.apply_command_line();

        let (event, failed) = {
            let mut state = self.lock();
            let failed = !succeeded(args.status);
            state.installation_state = if failed {
                InstallationState::Failed
            } else {
                InstallationState::Waiting
            };
            if self.command.action != LaunchAction::Uninstall {
                state.downgrade = state.upgrade_detect_state == UpgradeDetectionState::Newer;
            }
            let is_retry = mem::take(&mut state.is_retry);
            let event = ActionRequested {
                is_retry,
                snapshot: self.snapshot_of(&state),
            };
            (event, failed)
        };
        info!(
            status = args.status,
            state = %event.snapshot.installation_state,
            downgrade = event.snapshot.downgrade,
            "detection complete"
        );

        let handled = self.raise_action_requested(event);
        if handled.0 || failed {
            return;
        }

        let action = self.command.action;
        if action == LaunchAction::Uninstall && self.command.resume != ResumeType::Arp {
            self.log_engine("Invoking automatic plan for uninstall");
            self.uninstall();
        } else if action == LaunchAction::Layout {
            self.plan_layout();
        } else if self.command.display != Display::Full {
            self.log_engine("Invoking automatic plan for non-interactive mode.");
            if action == LaunchAction::Uninstall {
                self.uninstall();
            } else {
                self.install();
            }
        }
    }

    pub(super) fn detect_related_bundle(&self, args: &DetectRelatedBundle) {
        let bundle_version = self.version();
        let ordering = (args.relation_type == RelationType::Upgrade)
            .then(|| self.engine.compare_versions(&bundle_version, &args.version));

        let mut state = self.lock();
        state.existing_version = Some(args.version.clone());
        match ordering {
            Some(Ordering::Less) => {
                state.upgrade_detect_state = UpgradeDetectionState::Newer;
            }
            Some(_) if state.upgrade_detect_state == UpgradeDetectionState::None => {
                state.upgrade_detect_state = UpgradeDetectionState::Older;
            }
            _ => {}
        }
        if !state.manifest.contains(&args.product_code) {
            state.manifest.add_related_bundle_as_package(
                &args.product_code,
                args.relation_type,
                args.per_machine,
                &args.version,
            );
        }
        debug!(
            product_code = %args.product_code,
            relation = ?args.relation_type,
            version = %args.version,
            upgrade = ?state.upgrade_detect_state,
            "related bundle detected"
        );
    }

    pub(super) fn detect_package_complete(&self, args: &DetectPackageComplete) {
        if args.package_id != APPLICATION_PACKAGE_ID || args.state != PackageState::Present {
            return;
        }
        let version = self.version();
        debug!(%version, "application package already installed");
        self.lock().existing_version = Some(version);
    }

    fn apply_command_line(&self) {
        let overrides = CommandLineOverrides::parse(&self.command.command_line, &self.current_dir);
        if overrides.is_empty() {
            return;
        }
        if let Some(dir) = overrides.install_directory {
            self.set_install_directory(dir.to_string_lossy().into_owned());
        }
        if let Some(value) = overrides.create_desktop_shortcut {
            self.set_create_desktop_shortcut(value);
        }
        if let Some(value) = overrides.create_start_menu_shortcut {
            self.set_create_start_menu_shortcut(value);
        }
        if let Some(value) = overrides.launch_on_startup {
            self.set_launch_on_startup(value);
        }
    }
}
