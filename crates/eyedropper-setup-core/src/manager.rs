//! Bootstrapper lifecycle state machine.
//!
//! One manager exists per run. Engine callbacks arrive on engine threads,
//! user actions arrive from the UI thread, and both meet in a single state
//! struct behind one mutex. The lock is released before calling the engine,
//! the dispatcher or observers, so observers may call back into the manager.

#[path = "manager_actions.rs"]
mod manager_actions;
#[path = "manager_apply.rs"]
mod manager_apply;
#[path = "manager_detect.rs"]
mod manager_detect;
#[path = "manager_progress.rs"]
mod manager_progress;

use std::env;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::callbacks::{
    ApplyBegin, ApplyComplete, BootstrapperCallbacks, CacheComplete, CacheProgress,
    CallbackRegistry, DetectBegin, DetectComplete, DetectPackageComplete, DetectRelatedBundle,
    ErrorReport, ExecuteProgress, PlanBegin, PlanComplete, PlannedPackage, Progress,
    ProgressReply, Subscription,
};
use crate::dispatch::{invoke_with, FolderPrompt, UiDispatcher};
use crate::engine::{BootstrapperCommand, BundleManifest, Engine, VariableStore};
use crate::events::{
    ActionCompleted, ActionRequested, BootstrapperObserver, EventSurface, Handled,
    ManagerSnapshot,
};
use crate::model::{
    DetectionState, Display, EngineResult, ErrorType, InstallationState, LaunchAction, LogLevel,
    UpgradeDetectionState,
};
use crate::progress::ProgressAggregator;
use crate::variables::BundleVariables;

/// Package id of the application itself inside the bundle.
pub const APPLICATION_PACKAGE_ID: &str = "EyeDropper";

struct ManagerState {
    installation_state: InstallationState,
    pre_apply_state: InstallationState,
    detect_state: DetectionState,
    upgrade_detect_state: UpgradeDetectionState,
    planned_action: LaunchAction,
    existing_version: Option<String>,
    downgrade: bool,
    canceled: bool,
    // Close the window once the current action completes.
    auto_close: bool,
    // Next ActionRequested follows a user retry.
    is_retry: bool,
    error_type: Option<ErrorType>,
    result: i32,
    progress: ProgressAggregator,
    // Package id -> execution sequence, rebuilt every planning pass.
    package_order: IndexMap<String, usize>,
    manifest: BundleManifest,
    variables: BundleVariables,
}

impl ManagerState {
    fn new(manifest: BundleManifest) -> Self {
        Self {
            installation_state: InstallationState::Initializing,
            pre_apply_state: InstallationState::Initializing,
            detect_state: DetectionState::Absent,
            upgrade_detect_state: UpgradeDetectionState::None,
            planned_action: LaunchAction::Unknown,
            existing_version: None,
            downgrade: false,
            canceled: false,
            auto_close: false,
            is_retry: false,
            error_type: None,
            result: 0,
            progress: ProgressAggregator::default(),
            package_order: IndexMap::new(),
            manifest,
            variables: BundleVariables::default(),
        }
    }
}

pub struct BootstrapperManager {
    engine: Arc<dyn Engine>,
    command: BootstrapperCommand,
    dispatcher: Arc<dyn UiDispatcher>,
    events: Arc<EventSurface>,
    folder_prompt: Option<Arc<dyn FolderPrompt>>,
    current_dir: PathBuf,
    state: Mutex<ManagerState>,
    // Held from computing overall progress until it is published.
    progress_order: Mutex<()>,
    subscription: Mutex<Option<Subscription>>,
}

impl BootstrapperManager {
    pub fn new(
        engine: Arc<dyn Engine>,
        command: BootstrapperCommand,
        manifest: BundleManifest,
        dispatcher: Arc<dyn UiDispatcher>,
    ) -> Self {
        let current_dir = env::current_dir().unwrap_or_else(|err| {
            warn!(?err, "current directory unavailable; resolving paths against '.'");
            PathBuf::from(".")
        });
        Self {
            engine,
            command,
            dispatcher,
            events: Arc::new(EventSurface::default()),
            folder_prompt: None,
            current_dir,
            state: Mutex::new(ManagerState::new(manifest)),
            progress_order: Mutex::new(()),
            subscription: Mutex::new(None),
        }
    }

    /// Prompt used to choose a layout directory in full-UI layout runs.
    pub fn with_folder_prompt(mut self, prompt: Arc<dyn FolderPrompt>) -> Self {
        self.folder_prompt = Some(prompt);
        self
    }

    /// Directory relative command-line paths and layout defaults resolve against.
    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = dir.into();
        self
    }

    /// Starts receiving engine callbacks from `registry`.
    pub fn wire(self: &Arc<Self>, registry: &CallbackRegistry) {
        let weak = Arc::downgrade(self);
        let handler: Weak<dyn BootstrapperCallbacks> = weak;
        let subscription = registry.attach(handler);
        *self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(subscription);
    }

    /// Stops receiving engine callbacks. Dropping the manager has the same effect.
    pub fn dispose(&self) {
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if subscription.is_some() {
            debug!("bootstrapper callbacks unwired");
        }
    }

    pub fn subscribe(&self, observer: Arc<dyn BootstrapperObserver>) {
        self.events.subscribe(observer);
    }

    /// Detects, runs the UI loop until [`Self::close`], and returns the last apply status.
    pub fn run(&self) -> i32 {
        self.lock().installation_state = InstallationState::Initializing;
        info!(
            action = ?self.command.action,
            display = ?self.command.display,
            resume = ?self.command.resume,
            "starting bootstrapper run"
        );
        self.engine.detect();
        self.dispatcher.run();
        self.lock().result
    }

    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Bundle variables read through to the engine's store with the lock held;
    // the store never calls back into the manager.
    fn with_variables<R>(
        &self,
        f: impl FnOnce(&mut BundleVariables, &dyn VariableStore) -> R,
    ) -> R {
        let mut state = self.lock();
        f(&mut state.variables, self.engine.variables())
    }

    fn snapshot_of(&self, state: &ManagerState) -> ManagerSnapshot {
        ManagerSnapshot {
            installation_state: state.installation_state,
            action: self.command.action,
            planned_action: state.planned_action,
            display: self.command.display,
            detect_state: state.detect_state,
            upgrade_detect_state: state.upgrade_detect_state,
            downgrade: state.downgrade,
            canceled: state.canceled,
        }
    }

    fn log_engine(&self, message: &str) {
        debug!(message, "engine log");
        self.engine.log(LogLevel::Verbose, message);
    }

    /// A request the UI loop dropped counts as handled, so nothing is planned without a UI.
    fn raise_action_requested(&self, event: ActionRequested) -> Handled {
        let events = Arc::clone(&self.events);
        invoke_with(self.dispatcher.as_ref(), move || {
            events.raise_action_requested(&event)
        })
        .unwrap_or_else(|| {
            debug!("ui loop dropped the action request; skipping automatic plan");
            Handled(true)
        })
    }

    /// Publishes a completion on the UI thread and closes when it asks to.
    fn finish_action(&self, event: ActionCompleted) {
        let auto_close = event.auto_close;
        let events = Arc::clone(&self.events);
        self.dispatcher
            .invoke(Box::new(move || events.raise_action_completed(&event)));
        if auto_close {
            self.log_engine("Automatically closing the window.");
            self.close();
        }
    }

    pub fn snapshot(&self) -> ManagerSnapshot {
        let state = self.lock();
        self.snapshot_of(&state)
    }

    pub fn action(&self) -> LaunchAction {
        self.command.action
    }

    pub fn display(&self) -> Display {
        self.command.display
    }

    pub fn planned_action(&self) -> LaunchAction {
        self.lock().planned_action
    }

    pub fn installation_state(&self) -> InstallationState {
        self.lock().installation_state
    }

    pub fn pre_apply_state(&self) -> InstallationState {
        self.lock().pre_apply_state
    }

    pub fn detect_state(&self) -> DetectionState {
        self.lock().detect_state
    }

    pub fn upgrade_detect_state(&self) -> UpgradeDetectionState {
        self.lock().upgrade_detect_state
    }

    pub fn existing_version(&self) -> Option<String> {
        self.lock().existing_version.clone()
    }

    pub fn downgrade(&self) -> bool {
        self.lock().downgrade
    }

    pub fn canceled(&self) -> bool {
        self.lock().canceled
    }

    pub fn last_error_type(&self) -> Option<ErrorType> {
        self.lock().error_type
    }

    pub fn result(&self) -> i32 {
        self.lock().result
    }

    /// Overall progress as last combined from cache and execute reports.
    pub fn overall_progress(&self) -> u32 {
        self.lock().progress.overall()
    }

    /// Packages planned for execution, in execution order.
    pub fn package_order(&self) -> Vec<(String, usize)> {
        self.lock()
            .package_order
            .iter()
            .map(|(id, index)| (id.clone(), *index))
            .collect()
    }

    pub fn manifest(&self) -> BundleManifest {
        self.lock().manifest.clone()
    }

    pub fn bundle_name(&self) -> String {
        self.with_variables(|vars, store| vars.bundle_name.get(store))
    }

    pub fn license_url(&self) -> String {
        self.with_variables(|vars, store| vars.license.get(store))
    }

    pub fn version(&self) -> String {
        self.with_variables(|vars, store| vars.version.get(store))
    }

    pub fn log_file_path(&self) -> String {
        self.with_variables(|vars, store| vars.log_file.get(store))
    }

    pub fn layout_directory(&self) -> String {
        self.with_variables(|vars, store| vars.layout_directory.get(store))
    }

    fn set_layout_directory(&self, dir: String) -> bool {
        self.with_variables(|vars, store| vars.layout_directory.set(store, dir))
    }

    pub fn install_directory(&self) -> String {
        self.with_variables(|vars, store| vars.install_directory.get(store))
    }

    pub fn set_install_directory(&self, dir: impl Into<String>) -> bool {
        let dir = dir.into();
        self.with_variables(|vars, store| vars.install_directory.set(store, dir))
    }

    pub fn create_desktop_shortcut(&self) -> bool {
        self.with_variables(|vars, store| vars.create_desktop_shortcut.get(store))
    }

    pub fn set_create_desktop_shortcut(&self, value: bool) -> bool {
        self.with_variables(|vars, store| vars.create_desktop_shortcut.set(store, value))
    }

    pub fn create_start_menu_shortcut(&self) -> bool {
        self.with_variables(|vars, store| vars.create_start_menu_shortcut.get(store))
    }

    pub fn set_create_start_menu_shortcut(&self, value: bool) -> bool {
        self.with_variables(|vars, store| vars.create_start_menu_shortcut.set(store, value))
    }

    pub fn launch_on_startup(&self) -> bool {
        self.with_variables(|vars, store| vars.launch_on_startup.get(store))
    }

    pub fn set_launch_on_startup(&self, value: bool) -> bool {
        self.with_variables(|vars, store| vars.launch_on_startup.set(store, value))
    }
}

impl BootstrapperCallbacks for BootstrapperManager {
    fn on_detect_begin(&self, args: &DetectBegin) {
        self.detect_begin(args);
    }

    fn on_detect_complete(&self, args: &DetectComplete) {
        self.detect_complete(args);
    }

    fn on_detect_related_bundle(&self, args: &DetectRelatedBundle) {
        self.detect_related_bundle(args);
    }

    fn on_detect_package_complete(&self, args: &DetectPackageComplete) {
        self.detect_package_complete(args);
    }

    fn on_plan_begin(&self, args: &PlanBegin) {
        self.plan_begin(args);
    }

    fn on_planned_package(&self, args: &PlannedPackage) {
        self.planned_package(args);
    }

    fn on_plan_complete(&self, args: &PlanComplete) {
        self.plan_complete(args);
    }

    fn on_apply_begin(&self, args: &ApplyBegin) {
        self.apply_begin(args);
    }

    fn on_progress(&self, args: &Progress) -> ProgressReply {
        self.progress(args)
    }

    fn on_execute_progress(&self, args: &ExecuteProgress) -> ProgressReply {
        self.execute_progress(args)
    }

    fn on_cache_progress(&self, args: &CacheProgress) -> ProgressReply {
        self.cache_progress(args)
    }

    fn on_cache_complete(&self, args: &CacheComplete) {
        self.cache_complete(args);
    }

    fn on_apply_complete(&self, args: &ApplyComplete) {
        self.apply_complete(args);
    }

    fn on_error(&self, args: &ErrorReport) -> EngineResult {
        self.error(args)
    }
}
