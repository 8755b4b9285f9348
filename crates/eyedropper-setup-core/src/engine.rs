//! Seam between the bootstrapper and the native installer engine.
//!
//! The state machine only talks to the engine through these traits, so the
//! host can bind a real engine and tests can inject a recording fake.

use std::cmp::Ordering;
use std::path::PathBuf;

use indexmap::IndexMap;

use crate::model::{Display, LaunchAction, LogLevel, RelationType, ResumeType, WindowHandle};

/// Named variable slots exposed by the engine.
pub trait VariableStore: Send + Sync {
    fn get_numeric(&self, name: &str) -> Option<i64>;
    fn set_numeric(&self, name: &str, value: i64);
    fn get_string(&self, name: &str) -> Option<String>;
    /// `formatted` asks the engine to expand `[Variable]` references on read.
    fn set_string(&self, name: &str, value: &str, formatted: bool);
}

/// Commands the bootstrapper issues to the engine.
///
/// Lifecycle commands are asynchronous: the engine answers later through the
/// callbacks in [`crate::callbacks::BootstrapperCallbacks`].
pub trait Engine: Send + Sync {
    fn detect(&self);
    fn plan(&self, action: LaunchAction);
    fn apply(&self, window: WindowHandle);
    fn quit(&self, exit_code: i32);
    fn log(&self, level: LogLevel, message: &str);
    fn close_splash_screen(&self);
    fn send_embedded_progress(&self, progress_percentage: u32, overall_percentage: u32);
    fn compare_versions(&self, left: &str, right: &str) -> Ordering;
    fn variables(&self) -> &dyn VariableStore;
}

/// Launch parameters the engine hands to the bootstrapper at startup.
#[derive(Debug, Clone, Default)]
pub struct BootstrapperCommand {
    pub action: LaunchAction,
    pub display: Display,
    pub resume: ResumeType,
    /// Raw command line left over after the engine consumed its own switches.
    pub command_line: String,
    pub layout_directory: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub id: String,
    /// Set for related bundles tracked as packages after detection.
    pub relation: Option<RelationType>,
    pub per_machine: bool,
    pub version: Option<String>,
}

/// Package table parsed from the bundle manifest.
#[derive(Debug, Clone, Default)]
pub struct BundleManifest {
    packages: IndexMap<String, PackageInfo>,
}

impl BundleManifest {
    pub fn new(packages: impl IntoIterator<Item = PackageInfo>) -> Self {
        Self {
            packages: packages
                .into_iter()
                .map(|package| (package.id.clone(), package))
                .collect(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.packages.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&PackageInfo> {
        self.packages.get(id)
    }

    pub fn packages(&self) -> impl Iterator<Item = &PackageInfo> {
        self.packages.values()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Tracks a detected related bundle as an extra package.
    pub fn add_related_bundle_as_package(
        &mut self,
        product_code: &str,
        relation: RelationType,
        per_machine: bool,
        version: &str,
    ) {
        self.packages
            .entry(product_code.to_string())
            .or_insert_with(|| PackageInfo {
                id: product_code.to_string(),
                relation: Some(relation),
                per_machine,
                version: Some(version.to_string()),
            });
    }
}
