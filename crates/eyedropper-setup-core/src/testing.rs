//! Test doubles for the engine seam and the event surface.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::dispatch::InlineDispatcher;
use crate::engine::{BootstrapperCommand, BundleManifest, Engine, PackageInfo, VariableStore};
use crate::events::{
    ActionCompleted, ActionRequested, BootstrapperObserver, Handled, InstallationProgress,
};
use crate::manager::BootstrapperManager;
use crate::model::{Display, LaunchAction, LogLevel, WindowHandle};
use crate::variables::bundle_var;

#[derive(Default)]
struct StoreState {
    numeric: HashMap<String, i64>,
    strings: HashMap<String, String>,
    reads: HashMap<String, usize>,
    writes: HashMap<String, usize>,
    formatted_writes: usize,
}

/// In-memory variable store that counts reads and writes per name.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn seed_numeric(&self, name: &str, value: i64) {
        self.state.lock().unwrap().numeric.insert(name.to_string(), value);
    }

    pub fn seed_string(&self, name: &str, value: &str) {
        self.state
            .lock()
            .unwrap()
            .strings
            .insert(name.to_string(), value.to_string());
    }

    pub fn numeric(&self, name: &str) -> Option<i64> {
        self.state.lock().unwrap().numeric.get(name).copied()
    }

    pub fn string(&self, name: &str) -> Option<String> {
        self.state.lock().unwrap().strings.get(name).cloned()
    }

    pub fn reads(&self, name: &str) -> usize {
        self.state.lock().unwrap().reads.get(name).copied().unwrap_or(0)
    }

    pub fn writes(&self, name: &str) -> usize {
        self.state.lock().unwrap().writes.get(name).copied().unwrap_or(0)
    }

    pub fn formatted_writes(&self) -> usize {
        self.state.lock().unwrap().formatted_writes
    }
}

impl VariableStore for MemoryStore {
    fn get_numeric(&self, name: &str) -> Option<i64> {
        let mut state = self.state.lock().unwrap();
        *state.reads.entry(name.to_string()).or_default() += 1;
        state.numeric.get(name).copied()
    }

    fn set_numeric(&self, name: &str, value: i64) {
        let mut state = self.state.lock().unwrap();
        *state.writes.entry(name.to_string()).or_default() += 1;
        state.numeric.insert(name.to_string(), value);
    }

    fn get_string(&self, name: &str) -> Option<String> {
        let mut state = self.state.lock().unwrap();
        *state.reads.entry(name.to_string()).or_default() += 1;
        state.strings.get(name).cloned()
    }

    fn set_string(&self, name: &str, value: &str, formatted: bool) {
        let mut state = self.state.lock().unwrap();
        *state.writes.entry(name.to_string()).or_default() += 1;
        if formatted {
            state.formatted_writes += 1;
        }
        state.strings.insert(name.to_string(), value.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Detect,
    Plan(LaunchAction),
    Apply(WindowHandle),
    Quit(i32),
    CloseSplashScreen,
    EmbeddedProgress(u32, u32),
}

/// Engine double that records commands instead of running them.
#[derive(Default)]
pub struct FakeEngine {
    pub store: MemoryStore,
    calls: Mutex<Vec<EngineCall>>,
    logs: Mutex<Vec<(LogLevel, String)>>,
}

impl FakeEngine {
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn planned(&self) -> Vec<LaunchAction> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Plan(action) => Some(action),
                _ => None,
            })
            .collect()
    }

    pub fn logged(&self, message: &str) -> bool {
        self.logs
            .lock()
            .unwrap()
            .iter()
            .any(|(_, line)| line == message)
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Engine for FakeEngine {
    fn detect(&self) {
        self.record(EngineCall::Detect);
    }

    fn plan(&self, action: LaunchAction) {
        self.record(EngineCall::Plan(action));
    }

    fn apply(&self, window: WindowHandle) {
        self.record(EngineCall::Apply(window));
    }

    fn quit(&self, exit_code: i32) {
        self.record(EngineCall::Quit(exit_code));
    }

    fn log(&self, level: LogLevel, message: &str) {
        self.logs.lock().unwrap().push((level, message.to_string()));
    }

    fn close_splash_screen(&self) {
        self.record(EngineCall::CloseSplashScreen);
    }

    fn send_embedded_progress(&self, progress_percentage: u32, overall_percentage: u32) {
        self.record(EngineCall::EmbeddedProgress(
            progress_percentage,
            overall_percentage,
        ));
    }

    fn compare_versions(&self, left: &str, right: &str) -> Ordering {
        let parse = |value: &str| -> Vec<u64> {
            value
                .split('.')
                .map(|part| part.parse().unwrap_or(0))
                .collect()
        };
        parse(left).cmp(&parse(right))
    }

    fn variables(&self) -> &dyn VariableStore {
        &self.store
    }
}

/// Observer that remembers everything it saw and optionally claims requests.
#[derive(Default)]
pub struct RecordingObserver {
    pub claim_requests: bool,
    pub requested: Mutex<Vec<ActionRequested>>,
    pub completed: Mutex<Vec<ActionCompleted>>,
    pub progress: Mutex<Vec<u32>>,
    pub canceled: Mutex<usize>,
}

impl RecordingObserver {
    pub fn claiming() -> Self {
        Self {
            claim_requests: true,
            ..Self::default()
        }
    }

    pub fn last_completed(&self) -> Option<ActionCompleted> {
        self.completed.lock().unwrap().last().cloned()
    }

    pub fn progress_values(&self) -> Vec<u32> {
        self.progress.lock().unwrap().clone()
    }
}

impl BootstrapperObserver for RecordingObserver {
    fn action_requested(&self, event: &ActionRequested) -> Handled {
        self.requested.lock().unwrap().push(event.clone());
        Handled(self.claim_requests)
    }

    fn action_completed(&self, event: &ActionCompleted) {
        self.completed.lock().unwrap().push(event.clone());
    }

    fn progress(&self, event: &InstallationProgress) {
        self.progress.lock().unwrap().push(event.percentage);
    }

    fn canceled(&self) {
        *self.canceled.lock().unwrap() += 1;
    }
}

pub struct Harness {
    pub manager: Arc<BootstrapperManager>,
    pub engine: Arc<FakeEngine>,
    pub dispatcher: Arc<InlineDispatcher>,
    pub observer: Arc<RecordingObserver>,
}

pub fn command(action: LaunchAction, display: Display) -> BootstrapperCommand {
    BootstrapperCommand {
        action,
        display,
        ..BootstrapperCommand::default()
    }
}

pub fn harness(command: BootstrapperCommand, observer: RecordingObserver) -> Harness {
    let engine = Arc::new(FakeEngine::default());
    engine.store.seed_string(bundle_var::VERSION, "2.0.0");
    engine.store.seed_string(bundle_var::NAME, "EyeDropper");
    engine.store.seed_string(bundle_var::INSTALL_DIRECTORY, "/opt/eyedropper");
    engine.store.seed_numeric(bundle_var::CREATE_DESKTOP_SHORTCUT, 1);

    let dispatcher = Arc::new(InlineDispatcher::new());
    let manifest = BundleManifest::new([PackageInfo {
        id: crate::manager::APPLICATION_PACKAGE_ID.to_string(),
        relation: None,
        per_machine: true,
        version: None,
    }]);
    let manager = Arc::new(
        BootstrapperManager::new(engine.clone(), command, manifest, dispatcher.clone())
            .with_current_dir("/setup"),
    );
    let observer = Arc::new(observer);
    manager.subscribe(observer.clone());

    Harness {
        manager,
        engine,
        dispatcher,
        observer,
    }
}
