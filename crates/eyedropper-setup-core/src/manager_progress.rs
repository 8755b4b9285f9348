use std::sync::{MutexGuard, PoisonError};

use tracing::trace;

use super::BootstrapperManager;
use crate::callbacks::{CacheComplete, CacheProgress, ExecuteProgress, ProgressReply};
use crate::events::InstallationProgress;
use crate::model::Display;

impl BootstrapperManager {
    pub(super) fn execute_progress(&self, args: &ExecuteProgress) -> ProgressReply {
        let order = self.progress_order();
        let overall = {
            let mut state = self.lock();
            state.progress.set_execute(args.overall_percentage);
            state.progress.overall()
        };
        self.publish_progress(overall);
        drop(order);
        if self.command.display == Display::Embedded {
            self.engine
                .send_embedded_progress(args.progress_percentage, overall);
        }
        ProgressReply::cancel_if(self.canceled())
    }

    /// Shared by the acquire, verify and extract cache callbacks.
    pub(super) fn cache_progress(&self, args: &CacheProgress) -> ProgressReply {
        let order = self.progress_order();
        let overall = {
            let mut state = self.lock();
            state.progress.set_cache(args.overall_percentage);
            state.progress.overall()
        };
        trace!(
            kind = ?args.kind,
            id = %args.package_or_container_id,
            progress = args.progress,
            total = args.total,
            "cache progress"
        );
        self.publish_progress(overall);
        drop(order);
        ProgressReply::cancel_if(self.canceled())
    }

    pub(super) fn cache_complete(&self, args: &CacheComplete) {
        let _order = self.progress_order();
        let overall = {
            let mut state = self.lock();
            state.progress.complete_cache();
            state.progress.overall()
        };
        trace!(status = args.status, "cache complete");
        self.publish_progress(overall);
    }

    // Observers may call back into the manager while this is held; they must
    // not report progress themselves.
    fn progress_order(&self) -> MutexGuard<'_, ()> {
        self.progress_order
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_progress(&self, percentage: u32) {
        self.events
            .raise_progress(&InstallationProgress { percentage });
    }
}
