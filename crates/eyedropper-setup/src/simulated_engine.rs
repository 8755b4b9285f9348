//! Scripted engine that drives the bootstrapper callbacks from a worker thread.
//!
//! Commands are queued to the worker and answered asynchronously, the way a
//! real installer engine calls back from its own threads. Nothing is deployed.

use std::cmp::Ordering;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{self as channel, Sender};
use eyedropper_setup_core::callbacks::{
    ApplyBegin, ApplyComplete, BootstrapperCallbacks, CacheComplete, CacheProgress,
    CacheProgressKind, CallbackRegistry, DetectBegin, DetectComplete, DetectPackageComplete,
    DetectRelatedBundle, ErrorReport, ExecuteProgress, PlanBegin, PlanComplete, PlannedPackage,
    Progress,
};
use eyedropper_setup_core::util::{hresult_from_win32, log_snippet};
use eyedropper_setup_core::variables::bundle_var;
use eyedropper_setup_core::{
    ActionState, BundleConfig, Engine, EngineResult, ErrorPhase, InjectedError, LaunchAction,
    LogLevel, PackageState, ScenarioConfig, VariableStore, WindowHandle,
};
use indexmap::IndexMap;
use tracing::{debug, error, info, trace, warn};

/// Win32 `ERROR_INSTALL_USEREXIT`.
const INSTALL_USER_EXIT: u16 = 1602;

#[derive(Debug, Clone, PartialEq)]
enum Variable {
    Numeric(i64),
    Text(String),
}

/// Bundle variables kept in declaration order.
#[derive(Default)]
pub struct VariableTable {
    values: Mutex<IndexMap<String, Variable>>,
}

impl VariableTable {
    pub fn from_bundle(bundle: &BundleConfig) -> Self {
        let table = Self::default();
        table.set_string(bundle_var::NAME, &bundle.name, false);
        table.set_string(bundle_var::VERSION, &bundle.version, false);
        table.set_string(bundle_var::LICENSE, &bundle.license_url, false);
        table.set_string(bundle_var::LOG, &bundle.log_path, false);
        table.set_string(bundle_var::INSTALL_DIRECTORY, &bundle.install_folder, false);
        table.set_numeric(
            bundle_var::CREATE_DESKTOP_SHORTCUT,
            i64::from(bundle.create_desktop_shortcut),
        );
        table.set_numeric(
            bundle_var::CREATE_START_MENU_SHORTCUT,
            i64::from(bundle.create_start_menu_shortcut),
        );
        table.set_numeric(
            bundle_var::LAUNCH_ON_STARTUP,
            i64::from(bundle.launch_on_startup),
        );
        table
    }

    fn with_values<R>(&self, f: impl FnOnce(&mut IndexMap<String, Variable>) -> R) -> R {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut values)
    }
}

impl VariableStore for VariableTable {
    fn get_numeric(&self, name: &str) -> Option<i64> {
        self.with_values(|values| match values.get(name)? {
            Variable::Numeric(value) => Some(*value),
            Variable::Text(value) => value.trim().parse().ok(),
        })
    }

    fn set_numeric(&self, name: &str, value: i64) {
        trace!(name, value, "variable set");
        self.with_values(|values| {
            values.insert(name.to_string(), Variable::Numeric(value));
        });
    }

    fn get_string(&self, name: &str) -> Option<String> {
        self.with_values(|values| match values.get(name)? {
            Variable::Numeric(value) => Some(value.to_string()),
            Variable::Text(value) => Some(value.clone()),
        })
    }

    fn set_string(&self, name: &str, value: &str, formatted: bool) {
        trace!(name, value = %log_snippet(value), formatted, "variable set");
        self.with_values(|values| {
            values.insert(name.to_string(), Variable::Text(value.to_string()));
        });
    }
}

/// Compares dotted versions numerically; missing parts count as zero.
pub fn compare_dotted_versions(left: &str, right: &str) -> Ordering {
    let parse = |value: &str| -> Vec<u64> {
        value
            .trim()
            .trim_start_matches(['v', 'V'])
            .split('.')
            .map(|part| part.trim().parse().unwrap_or(0))
            .collect()
    };
    let (left, right) = (parse(left), parse(right));
    let len = left.len().max(right.len());
    (0..len)
        .map(|index| {
            let a = left.get(index).copied().unwrap_or(0);
            let b = right.get(index).copied().unwrap_or(0);
            a.cmp(&b)
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

enum EngineRequest {
    Detect,
    Plan(LaunchAction),
    Apply(WindowHandle),
    Quit,
}

pub struct SimulatedEngine {
    variables: Arc<VariableTable>,
    tx: Sender<EngineRequest>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatedEngine {
    /// Starts the worker that answers commands by firing callbacks into `registry`.
    pub fn start(
        bundle: &BundleConfig,
        scenario: ScenarioConfig,
        registry: CallbackRegistry,
    ) -> Result<Arc<Self>> {
        let variables = Arc::new(VariableTable::from_bundle(bundle));
        let (tx, rx) = channel::unbounded();
        let mut script = Script {
            scenario,
            registry,
            planned: Vec::new(),
        };
        let worker = thread::Builder::new()
            .name("setup-engine".to_string())
            .spawn(move || {
                for request in rx {
                    match request {
                        EngineRequest::Detect => script.detect(),
                        EngineRequest::Plan(action) => script.plan(action),
                        EngineRequest::Apply(window) => script.apply(window),
                        EngineRequest::Quit => break,
                    }
                }
                debug!("engine worker stopped");
            })
            .context("spawn engine worker")?;

        Ok(Arc::new(Self {
            variables,
            tx,
            worker: Mutex::new(Some(worker)),
        }))
    }

    fn request(&self, request: EngineRequest) {
        if self.tx.send(request).is_err() {
            warn!("engine worker is gone; command dropped");
        }
    }
}

impl Engine for SimulatedEngine {
    fn detect(&self) {
        self.request(EngineRequest::Detect);
    }

    fn plan(&self, action: LaunchAction) {
        self.request(EngineRequest::Plan(action));
    }

    fn apply(&self, window: WindowHandle) {
        self.request(EngineRequest::Apply(window));
    }

    fn quit(&self, exit_code: i32) {
        info!(exit_code, "engine quit");
        self.request(EngineRequest::Quit);
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                error!("engine worker panicked");
            }
        }
    }

    fn log(&self, level: LogLevel, message: &str) {
        let message = log_snippet(message);
        match level {
            LogLevel::Error => error!(target: "engine", "{message}"),
            LogLevel::Standard => info!(target: "engine", "{message}"),
            LogLevel::Verbose | LogLevel::Debug => debug!(target: "engine", "{message}"),
            LogLevel::None => trace!(target: "engine", "{message}"),
        }
    }

    fn close_splash_screen(&self) {
        debug!("splash screen closed");
    }

    fn send_embedded_progress(&self, progress_percentage: u32, overall_percentage: u32) {
        debug!(
            progress = progress_percentage,
            overall = overall_percentage,
            "embedded progress sent to parent"
        );
    }

    fn compare_versions(&self, left: &str, right: &str) -> Ordering {
        compare_dotted_versions(left, right)
    }

    fn variables(&self) -> &dyn VariableStore {
        self.variables.as_ref()
    }
}

/// How an apply run continues after a callback reply.
enum Flow {
    Continue,
    Stop(i32),
}

/// Worker-side state of the scripted engine.
struct Script {
    scenario: ScenarioConfig,
    registry: CallbackRegistry,
    planned: Vec<(String, ActionState)>,
}

fn status_of(code: u16) -> i32 {
    if code == 0 {
        0
    } else {
        hresult_from_win32(code)
    }
}

impl Script {
    fn handler(&self) -> Option<Arc<dyn BootstrapperCallbacks>> {
        let handler = self.registry.handler();
        if handler.is_none() {
            warn!("no bootstrapper attached; engine callback skipped");
        }
        handler
    }

    fn pause(&self) {
        if self.scenario.step_delay_ms > 0 {
            thread::sleep(Duration::from_millis(self.scenario.step_delay_ms));
        }
    }

    fn detect(&mut self) {
        let Some(handler) = self.handler() else {
            return;
        };
        let scenario = &self.scenario;
        handler.on_detect_begin(&DetectBegin {
            cached: false,
            registration_type: scenario.registration,
            package_count: scenario.packages.len() as u32,
        });
        for related in &scenario.related_bundles {
            handler.on_detect_related_bundle(&DetectRelatedBundle {
                product_code: related.product_code.clone(),
                relation_type: related.relation,
                per_machine: related.per_machine,
                version: related.version.clone(),
                missing_from_cache: false,
            });
        }
        for package in &scenario.packages {
            handler.on_detect_package_complete(&DetectPackageComplete {
                package_id: package.id.clone(),
                status: 0,
                state: package.state,
            });
        }
        handler.on_detect_complete(&DetectComplete {
            status: status_of(scenario.detect_error),
            eligible_for_cleanup: false,
        });
    }

    fn plan(&mut self, action: LaunchAction) {
        let Some(handler) = self.handler() else {
            return;
        };
        info!(%action, "engine planning");
        handler.on_plan_begin(&PlanBegin {
            package_count: self.scenario.packages.len() as u32,
        });
        self.planned.clear();
        for package in &self.scenario.packages {
            let execute = planned_execute(action, package.state, package.execute);
            handler.on_planned_package(&PlannedPackage {
                package_id: package.id.clone(),
                execute,
                rollback: ActionState::None,
            });
            if execute != ActionState::None {
                self.planned.push((package.id.clone(), execute));
            }
        }
        handler.on_plan_complete(&PlanComplete {
            status: status_of(self.scenario.plan_error),
        });
    }

    fn apply(&mut self, window: WindowHandle) {
        let Some(handler) = self.handler() else {
            return;
        };
        debug!(window = window.0, "engine applying");
        let phase_count = if self.scenario.cache { 2 } else { 1 };
        handler.on_apply_begin(&ApplyBegin { phase_count });

        let status = match self.run_phases(handler.as_ref()) {
            Flow::Continue => status_of(self.scenario.apply_error),
            Flow::Stop(status) => status,
        };
        handler.on_apply_complete(&ApplyComplete { status });
    }

    fn run_phases(&self, handler: &dyn BootstrapperCallbacks) -> Flow {
        if self.scenario.cache {
            if let Flow::Stop(status) = self.cache_phase(handler) {
                return Flow::Stop(status);
            }
        }
        self.execute_phase(handler)
    }

    fn cache_phase(&self, handler: &dyn BootstrapperCallbacks) -> Flow {
        let step = self.scenario.effective_step();
        let container = "WixAttachedContainer".to_string();
        let mut injected = self.injected(ErrorPhase::Cache);
        let mut percentage = 0;
        loop {
            let reply = handler.on_cache_progress(&CacheProgress {
                kind: cache_kind(percentage),
                package_or_container_id: container.clone(),
                payload_id: None,
                progress: u64::from(percentage),
                total: 100,
                overall_percentage: percentage,
            });
            if reply.cancel {
                return Flow::Stop(hresult_from_win32(INSTALL_USER_EXIT));
            }
            if percentage >= 50 {
                if let Some(error) = injected.take() {
                    if let Flow::Stop(status) = self.raise(handler, None, error) {
                        return Flow::Stop(status);
                    }
                }
            }
            if percentage >= 100 {
                break;
            }
            percentage = (percentage + step).min(100);
            self.pause();
        }
        handler.on_cache_complete(&CacheComplete { status: 0 });
        Flow::Continue
    }

    fn execute_phase(&self, handler: &dyn BootstrapperCallbacks) -> Flow {
        let step = self.scenario.effective_step();
        let count = self.planned.len().max(1) as u32;
        let mut injected = self.injected(ErrorPhase::Execute);
        for (index, (package_id, action)) in self.planned.iter().enumerate() {
            debug!(package = %package_id, ?action, "executing package");
            let mut percentage = 0;
            loop {
                let overall = (index as u32 * 100 + percentage) / count;
                let progress = handler.on_progress(&Progress {
                    progress_percentage: percentage,
                    overall_percentage: overall,
                });
                let execute = handler.on_execute_progress(&ExecuteProgress {
                    package_id: package_id.clone(),
                    progress_percentage: percentage,
                    overall_percentage: overall,
                });
                if progress.cancel || execute.cancel {
                    return Flow::Stop(hresult_from_win32(INSTALL_USER_EXIT));
                }
                if percentage >= 50 {
                    if let Some(error) = injected.take() {
                        if let Flow::Stop(status) = self.raise(handler, Some(package_id), error) {
                            return Flow::Stop(status);
                        }
                    }
                }
                if percentage >= 100 {
                    break;
                }
                percentage = (percentage + step).min(100);
                self.pause();
            }
        }
        Flow::Continue
    }

    fn injected(&self, phase: ErrorPhase) -> Option<&InjectedError> {
        self.scenario
            .error
            .as_ref()
            .filter(|error| error.phase == phase)
    }

    fn raise(
        &self,
        handler: &dyn BootstrapperCallbacks,
        package_id: Option<&String>,
        error: &InjectedError,
    ) -> Flow {
        let result = handler.on_error(&ErrorReport {
            package_id: package_id.cloned(),
            error_code: i32::from(error.code),
            error_type: error.kind,
            message: error.message.clone(),
            suggested: EngineResult::None,
        });
        info!(code = error.code, kind = ?error.kind, ?result, "engine error answered");
        match result {
            EngineResult::Cancel | EngineResult::Abort => {
                Flow::Stop(hresult_from_win32(INSTALL_USER_EXIT))
            }
            // The scripted retry always succeeds.
            EngineResult::Retry | EngineResult::TryAgain => Flow::Continue,
            EngineResult::Ignore | EngineResult::Continue => Flow::Continue,
            _ => Flow::Stop(hresult_from_win32(error.code)),
        }
    }
}

fn cache_kind(percentage: u32) -> CacheProgressKind {
    match percentage {
        0..=24 => CacheProgressKind::Acquire,
        25..=49 => CacheProgressKind::ContainerOrPayloadVerify,
        50..=74 => CacheProgressKind::PayloadExtract,
        _ => CacheProgressKind::Verify,
    }
}

/// Execute action the scripted engine plans for one package.
fn planned_execute(action: LaunchAction, state: PackageState, configured: ActionState) -> ActionState {
    let present = state == PackageState::Present;
    match action {
        LaunchAction::Uninstall if present => ActionState::Uninstall,
        LaunchAction::Repair if present => ActionState::Repair,
        LaunchAction::Uninstall
        | LaunchAction::Layout
        | LaunchAction::Cache
        | LaunchAction::Help
        | LaunchAction::Unknown => ActionState::None,
        _ => configured,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyedropper_setup_core::callbacks::{ProgressReply, Subscription};
    use eyedropper_setup_core::PackageConfig;
    use std::sync::Weak;

    #[test]
    fn versions_compare_numerically() {
        assert_eq!(compare_dotted_versions("1.10.0", "1.9.3"), Ordering::Greater);
        assert_eq!(compare_dotted_versions("2.0", "2.0.0"), Ordering::Equal);
        assert_eq!(compare_dotted_versions("v1.2", "1.3"), Ordering::Less);
    }

    #[test]
    fn table_seeds_bundle_values() {
        let table = VariableTable::from_bundle(&BundleConfig::default());
        assert_eq!(table.get_string(bundle_var::NAME).as_deref(), Some("EyeDropper"));
        assert_eq!(table.get_numeric(bundle_var::CREATE_DESKTOP_SHORTCUT), Some(1));
        assert_eq!(table.get_numeric(bundle_var::LAUNCH_ON_STARTUP), Some(0));
        assert_eq!(table.get_numeric("Missing"), None);
    }

    #[test]
    fn uninstall_only_removes_present_packages() {
        assert_eq!(
            planned_execute(LaunchAction::Uninstall, PackageState::Present, ActionState::Install),
            ActionState::Uninstall
        );
        assert_eq!(
            planned_execute(LaunchAction::Uninstall, PackageState::Absent, ActionState::Install),
            ActionState::None
        );
        assert_eq!(
            planned_execute(LaunchAction::Install, PackageState::Absent, ActionState::Install),
            ActionState::Install
        );
    }

    /// Records callback names and cancels execution once it passes `cancel_at`.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
        cancel_at: Option<u32>,
        error_reply: Option<EngineResult>,
    }

    impl Recorder {
        fn push(&self, name: &str) {
            self.seen.lock().unwrap().push(name.to_string());
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl BootstrapperCallbacks for Recorder {
        fn on_detect_begin(&self, _: &DetectBegin) {
            self.push("detect-begin");
        }
        fn on_detect_complete(&self, _: &DetectComplete) {
            self.push("detect-complete");
        }
        fn on_detect_related_bundle(&self, _: &DetectRelatedBundle) {
            self.push("related-bundle");
        }
        fn on_detect_package_complete(&self, _: &DetectPackageComplete) {
            self.push("package");
        }
        fn on_plan_begin(&self, _: &PlanBegin) {
            self.push("plan-begin");
        }
        fn on_planned_package(&self, _: &PlannedPackage) {
            self.push("planned");
        }
        fn on_plan_complete(&self, _: &PlanComplete) {
            self.push("plan-complete");
        }
        fn on_apply_begin(&self, _: &ApplyBegin) {
            self.push("apply-begin");
        }
        fn on_progress(&self, _: &Progress) -> ProgressReply {
            ProgressReply::default()
        }
        fn on_execute_progress(&self, args: &ExecuteProgress) -> ProgressReply {
            ProgressReply::cancel_if(
                self.cancel_at
                    .is_some_and(|limit| args.overall_percentage >= limit),
            )
        }
        fn on_cache_progress(&self, _: &CacheProgress) -> ProgressReply {
            ProgressReply::default()
        }
        fn on_cache_complete(&self, _: &CacheComplete) {
            self.push("cache-complete");
        }
        fn on_apply_complete(&self, args: &ApplyComplete) {
            self.push(&format!("apply-complete:{:#x}", args.status));
        }
        fn on_error(&self, args: &ErrorReport) -> EngineResult {
            self.push(&format!("error:{}", args.error_code));
            self.error_reply.unwrap_or(args.suggested)
        }
    }

    fn script(scenario: ScenarioConfig, recorder: &Arc<Recorder>) -> (Script, Subscription) {
        let registry = CallbackRegistry::new();
        let handler: Weak<dyn BootstrapperCallbacks> =
            Arc::downgrade(&(Arc::clone(recorder) as Arc<dyn BootstrapperCallbacks>));
        let subscription = registry.attach(handler);
        let script = Script {
            scenario,
            registry,
            planned: Vec::new(),
        };
        (script, subscription)
    }

    #[test]
    fn full_run_fires_callbacks_in_engine_order() {
        let recorder = Arc::new(Recorder::default());
        let (mut script, _subscription) = script(ScenarioConfig::default(), &recorder);
        script.detect();
        script.plan(LaunchAction::Install);
        script.apply(WindowHandle(1));
        assert_eq!(
            recorder.seen(),
            [
                "detect-begin",
                "package",
                "detect-complete",
                "plan-begin",
                "planned",
                "plan-complete",
                "apply-begin",
                "cache-complete",
                "apply-complete:0x0",
            ]
        );
    }

    #[test]
    fn canceled_progress_ends_with_user_exit() {
        let recorder = Arc::new(Recorder {
            cancel_at: Some(40),
            ..Recorder::default()
        });
        let scenario = ScenarioConfig {
            cache: false,
            packages: vec![PackageConfig::default()],
            ..ScenarioConfig::default()
        };
        let (mut script, _subscription) = script(scenario, &recorder);
        script.plan(LaunchAction::Install);
        script.apply(WindowHandle(1));
        assert_eq!(
            recorder.seen().last().map(String::as_str),
            Some("apply-complete:0x80070642")
        );
    }

    #[test]
    fn injected_error_fails_apply_unless_retried() {
        let scenario = ScenarioConfig {
            error: Some(InjectedError::default()),
            ..ScenarioConfig::default()
        };

        let failing = Arc::new(Recorder::default());
        let (mut script_a, _a) = script(scenario.clone(), &failing);
        script_a.plan(LaunchAction::Install);
        script_a.apply(WindowHandle(1));
        assert!(failing.seen().contains(&"error:1603".to_string()));
        assert_eq!(
            failing.seen().last().map(String::as_str),
            Some("apply-complete:0x80070643")
        );

        let retrying = Arc::new(Recorder {
            error_reply: Some(EngineResult::TryAgain),
            ..Recorder::default()
        });
        let (mut script_b, _b) = script(scenario, &retrying);
        script_b.plan(LaunchAction::Install);
        script_b.apply(WindowHandle(1));
        assert_eq!(
            retrying.seen().last().map(String::as_str),
            Some("apply-complete:0x0")
        );
    }
}
