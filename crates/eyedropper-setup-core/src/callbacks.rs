//! Engine-to-bootstrapper callbacks and the registry they are delivered through.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::model::{
    ActionState, EngineResult, ErrorType, PackageState, RegistrationType, RelationType,
};

#[derive(Debug, Clone)]
pub struct DetectBegin {
    pub cached: bool,
    pub registration_type: RegistrationType,
    pub package_count: u32,
}

#[derive(Debug, Clone, Default)]
pub struct DetectComplete {
    pub status: i32,
    pub eligible_for_cleanup: bool,
}

#[derive(Debug, Clone)]
pub struct DetectRelatedBundle {
    pub product_code: String,
    pub relation_type: RelationType,
    pub per_machine: bool,
    pub version: String,
    pub missing_from_cache: bool,
}

#[derive(Debug, Clone)]
pub struct DetectPackageComplete {
    pub package_id: String,
    pub status: i32,
    pub state: PackageState,
}

#[derive(Debug, Clone)]
pub struct PlanBegin {
    pub package_count: u32,
}

#[derive(Debug, Clone)]
pub struct PlannedPackage {
    pub package_id: String,
    pub execute: ActionState,
    pub rollback: ActionState,
}

#[derive(Debug, Clone, Default)]
pub struct PlanComplete {
    pub status: i32,
}

#[derive(Debug, Clone)]
pub struct ApplyBegin {
    pub phase_count: u32,
}

#[derive(Debug, Clone)]
pub struct Progress {
    pub progress_percentage: u32,
    pub overall_percentage: u32,
}

#[derive(Debug, Clone)]
pub struct ExecuteProgress {
    pub package_id: String,
    pub progress_percentage: u32,
    pub overall_percentage: u32,
}

/// The four cache-phase progress callbacks share one payload shape.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CacheProgressKind {
    Acquire,
    ContainerOrPayloadVerify,
    PayloadExtract,
    Verify,
}

#[derive(Debug, Clone)]
pub struct CacheProgress {
    pub kind: CacheProgressKind,
    pub package_or_container_id: String,
    pub payload_id: Option<String>,
    pub progress: u64,
    pub total: u64,
    pub overall_percentage: u32,
}

#[derive(Debug, Clone, Default)]
pub struct CacheComplete {
    pub status: i32,
}

#[derive(Debug, Clone, Default)]
pub struct ApplyComplete {
    pub status: i32,
}

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub package_id: Option<String>,
    pub error_code: i32,
    pub error_type: ErrorType,
    pub message: String,
    /// Engine's default answer, returned unchanged unless the handler overrides it.
    pub suggested: EngineResult,
}

/// Reply to progress-style callbacks; `cancel` asks the engine to abort at its next safe point.
#[must_use]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ProgressReply {
    pub cancel: bool,
}

impl ProgressReply {
    pub fn cancel_if(cancel: bool) -> Self {
        Self { cancel }
    }
}

/// Handlers for every engine callback the bootstrapper reacts to.
pub trait BootstrapperCallbacks: Send + Sync {
    fn on_detect_begin(&self, args: &DetectBegin);
    fn on_detect_complete(&self, args: &DetectComplete);
    fn on_detect_related_bundle(&self, args: &DetectRelatedBundle);
    fn on_detect_package_complete(&self, args: &DetectPackageComplete);
    fn on_plan_begin(&self, args: &PlanBegin);
    fn on_planned_package(&self, args: &PlannedPackage);
    fn on_plan_complete(&self, args: &PlanComplete);
    fn on_apply_begin(&self, args: &ApplyBegin);
    fn on_progress(&self, args: &Progress) -> ProgressReply;
    fn on_execute_progress(&self, args: &ExecuteProgress) -> ProgressReply;
    fn on_cache_progress(&self, args: &CacheProgress) -> ProgressReply;
    fn on_cache_complete(&self, args: &CacheComplete);
    fn on_apply_complete(&self, args: &ApplyComplete);
    fn on_error(&self, args: &ErrorReport) -> EngineResult;
}

struct Slot {
    id: u64,
    handler: Weak<dyn BootstrapperCallbacks>,
}

#[derive(Default)]
struct RegistryInner {
    next_id: AtomicU64,
    slot: Mutex<Option<Slot>>,
}

/// Callback subscription point owned by an engine binding.
///
/// Holds one handler weakly; the handler stays attached for as long as the
/// returned [`Subscription`] lives.
#[derive(Clone, Default)]
pub struct CallbackRegistry {
    inner: Arc<RegistryInner>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `handler`, replacing any previous one.
    pub fn attach(&self, handler: Weak<dyn BootstrapperCallbacks>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let mut slot = self.inner.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Slot { id, handler });
        Subscription {
            registry: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Live handler, if one is attached and still alive.
    pub fn handler(&self) -> Option<Arc<dyn BootstrapperCallbacks>> {
        let slot = self.inner.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref().and_then(|slot| slot.handler.upgrade())
    }

    pub fn is_attached(&self) -> bool {
        self.handler().is_some()
    }
}

/// Detaches its handler from the registry when dropped.
pub struct Subscription {
    registry: Weak<RegistryInner>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(inner) = self.registry.upgrade() else {
            return;
        };
        let mut slot = inner.slot.lock().unwrap_or_else(PoisonError::into_inner);
        // A newer attach owns the slot; leave it alone.
        if slot.as_ref().map(|slot| slot.id) == Some(self.id) {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Quiet;

    impl BootstrapperCallbacks for Quiet {
        fn on_detect_begin(&self, _: &DetectBegin) {}
        fn on_detect_complete(&self, _: &DetectComplete) {}
        fn on_detect_related_bundle(&self, _: &DetectRelatedBundle) {}
        fn on_detect_package_complete(&self, _: &DetectPackageComplete) {}
        fn on_plan_begin(&self, _: &PlanBegin) {}
        fn on_planned_package(&self, _: &PlannedPackage) {}
        fn on_plan_complete(&self, _: &PlanComplete) {}
        fn on_apply_begin(&self, _: &ApplyBegin) {}
        fn on_progress(&self, _: &Progress) -> ProgressReply {
            ProgressReply::default()
        }
        fn on_execute_progress(&self, _: &ExecuteProgress) -> ProgressReply {
            ProgressReply::default()
        }
        fn on_cache_progress(&self, _: &CacheProgress) -> ProgressReply {
            ProgressReply::default()
        }
        fn on_cache_complete(&self, _: &CacheComplete) {}
        fn on_apply_complete(&self, _: &ApplyComplete) {}
        fn on_error(&self, args: &ErrorReport) -> EngineResult {
            args.suggested
        }
    }

    #[test]
    fn dropping_subscription_detaches_handler() {
        let registry = CallbackRegistry::new();
        let handler: Arc<dyn BootstrapperCallbacks> = Arc::new(Quiet);
        let subscription = registry.attach(Arc::downgrade(&handler));
        assert!(registry.is_attached());

        drop(subscription);
        assert!(!registry.is_attached());
    }

    #[test]
    fn stale_subscription_does_not_detach_newer_handler() {
        let registry = CallbackRegistry::new();
        let first: Arc<dyn BootstrapperCallbacks> = Arc::new(Quiet);
        let second: Arc<dyn BootstrapperCallbacks> = Arc::new(Quiet);
        let old = registry.attach(Arc::downgrade(&first));
        let _current = registry.attach(Arc::downgrade(&second));

        drop(old);
        assert!(registry.is_attached());
    }

    #[test]
    fn dead_handler_is_not_returned() {
        let registry = CallbackRegistry::new();
        let handler: Arc<dyn BootstrapperCallbacks> = Arc::new(Quiet);
        let _subscription = registry.attach(Arc::downgrade(&handler));
        drop(handler);
        assert!(registry.handler().is_none());
    }
}
