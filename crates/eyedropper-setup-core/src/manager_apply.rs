use std::sync::Arc;

use tracing::{debug, info, warn};

use super::BootstrapperManager;
use crate::callbacks::{
    ApplyBegin, ApplyComplete, ErrorReport, PlanBegin, PlanComplete, PlannedPackage, Progress,
    ProgressReply,
};
use crate::events::ActionCompleted;
use crate::model::{ActionState, Display, EngineResult, InstallationState, LaunchAction};
use crate::util::{succeeded, USER_CANCELLED_ERROR_CODE};

impl BootstrapperManager {
    pub(super) fn plan_begin(&self, args: &PlanBegin) {
        let mut state = self.lock();
        state.installation_state = InstallationState::Planning;
        state.package_order.clear();
        debug!(packages = args.package_count, "planning started");
    }

    pub(super) fn planned_package(&self, args: &PlannedPackage) {
        if args.execute == ActionState::None {
            return;
        }
        let mut state = self.lock();
        let next = state.package_order.len();
        let index = *state
            .package_order
            .entry(args.package_id.clone())
            .or_insert(next);
        debug!(package = %args.package_id, execute = ?args.execute, index, "package planned");
    }

    pub(super) fn plan_complete(&self, args: &PlanComplete) {
        if succeeded(args.status) {
            {
                let mut state = self.lock();
                state.pre_apply_state = state.installation_state;
                state.installation_state = InstallationState::Applying;
            }
            info!("plan complete; applying");
            let engine = Arc::clone(&self.engine);
            let window = self.dispatcher.window_handle();
            self.dispatcher.invoke(Box::new(move || engine.apply(window)));
            return;
        }

        let event = {
            let mut state = self.lock();
            state.installation_state = InstallationState::Failed;
            ActionCompleted {
                auto_close: state.auto_close || self.command.display != Display::Full,
                error_type: state.error_type,
                snapshot: self.snapshot_of(&state),
            }
        };
        warn!(status = args.status, "planning failed");
        self.finish_action(event);
    }

    pub(super) fn apply_begin(&self, args: &ApplyBegin) {
        self.lock().progress.set_phase_count(args.phase_count);
        debug!(phases = args.phase_count, "apply started");
    }

    pub(super) fn progress(&self, _args: &Progress) -> ProgressReply {
        ProgressReply::cancel_if(self.canceled())
    }

    pub(super) fn apply_complete(&self, args: &ApplyComplete) {
        let ok = succeeded(args.status);
        let event = {
            let mut state = self.lock();
            state.result = args.status;
            if state.installation_state != state.pre_apply_state {
                state.installation_state = if ok {
                    InstallationState::Applied
                } else {
                    InstallationState::Failed
                };
            }
            // A cancel that arrived too late to stop a successful apply does not stick.
            if state.installation_state != InstallationState::Failed {
                state.canceled = false;
            }
            let update_replaced = ok && state.planned_action == LaunchAction::UpdateReplace;
            ActionCompleted {
                auto_close: state.auto_close
                    || self.command.display != Display::Full
                    || update_replaced,
                error_type: state.error_type,
                snapshot: self.snapshot_of(&state),
            }
        };
        info!(
            status = args.status,
            state = %event.snapshot.installation_state,
            canceled = event.snapshot.canceled,
            auto_close = event.auto_close,
            "apply complete"
        );
        self.finish_action(event);
    }

    /// Decides how the engine proceeds after an error.
    pub(super) fn error(&self, args: &ErrorReport) -> EngineResult {
        let mut state = self.lock();
        let result = if state.canceled {
            EngineResult::Cancel
        } else if state.installation_state == InstallationState::Applying
            && args.error_code == USER_CANCELLED_ERROR_CODE
        {
            // Soft cancel: the user declined a prompt, so fall back to where apply started.
            state.installation_state = state.pre_apply_state;
            args.suggested
        } else if self.command.display == Display::Full && args.error_type.is_authentication() {
            EngineResult::TryAgain
        } else {
            args.suggested
        };
        state.error_type = Some(args.error_type);
        warn!(
            package = args.package_id.as_deref().unwrap_or("-"),
            code = args.error_code,
            kind = ?args.error_type,
            ?result,
            "engine error"
        );
        result
    }
}
