//! Configuration types and defaults for the setup host.

use serde::{Deserialize, Serialize};

use crate::manager::APPLICATION_PACKAGE_ID;
use crate::model::{ActionState, ErrorType, PackageState, RegistrationType, RelationType};

/// Top-level configuration loaded from config.toml.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SetupConfig {
    pub general: GeneralConfig,
    pub bundle: BundleConfig,
    pub scenario: ScenarioConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: Option<String>,
}

/// Initial values of the bundle variables.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BundleConfig {
    pub name: String,
    pub version: String,
    pub license_url: String,
    pub log_path: String,
    pub install_folder: String,
    pub create_desktop_shortcut: bool,
    pub create_start_menu_shortcut: bool,
    pub launch_on_startup: bool,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            name: "EyeDropper".to_string(),
            version: "1.0.0".to_string(),
            license_url: String::new(),
            log_path: String::new(),
            install_folder: "/opt/eyedropper".to_string(),
            create_desktop_shortcut: true,
            create_start_menu_shortcut: true,
            launch_on_startup: false,
        }
    }
}

/// What the scripted engine reports while driving a run.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Registration of this bundle found on the machine.
    pub registration: RegistrationType,
    pub related_bundles: Vec<RelatedBundleConfig>,
    pub packages: Vec<PackageConfig>,
    /// Win32 error codes reported by each phase; 0 means success.
    pub detect_error: u16,
    pub plan_error: u16,
    pub apply_error: u16,
    pub error: Option<InjectedError>,
    /// Report cache progress before execution.
    pub cache: bool,
    /// Percentage points advanced per progress callback.
    pub progress_step: u32,
    /// Pause between progress callbacks.
    pub step_delay_ms: u64,
    /// Cancel once overall progress reaches this percentage.
    pub cancel_at: Option<u32>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            registration: RegistrationType::None,
            related_bundles: Vec::new(),
            packages: vec![PackageConfig::default()],
            detect_error: 0,
            plan_error: 0,
            apply_error: 0,
            error: None,
            cache: true,
            progress_step: 20,
            step_delay_ms: 0,
            cancel_at: None,
        }
    }
}

impl ScenarioConfig {
    /// Progress step that always advances.
    pub fn effective_step(&self) -> u32 {
        self.progress_step.clamp(1, 100)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RelatedBundleConfig {
    pub product_code: String,
    pub relation: RelationType,
    pub per_machine: bool,
    pub version: String,
}

impl Default for RelatedBundleConfig {
    fn default() -> Self {
        Self {
            product_code: String::new(),
            relation: RelationType::Upgrade,
            per_machine: true,
            version: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PackageConfig {
    pub id: String,
    pub state: PackageState,
    pub per_machine: bool,
    /// Execute action planned for install-like actions.
    pub execute: ActionState,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            id: APPLICATION_PACKAGE_ID.to_string(),
            state: PackageState::Absent,
            per_machine: true,
            execute: ActionState::Install,
        }
    }
}

/// Error raised once by the scripted engine during apply.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct InjectedError {
    /// Win32 error code.
    pub code: u16,
    pub kind: ErrorType,
    pub phase: ErrorPhase,
    pub message: String,
}

impl Default for InjectedError {
    fn default() -> Self {
        Self {
            code: 1603,
            kind: ErrorType::WindowsInstaller,
            phase: ErrorPhase::Execute,
            message: "Fatal error during installation.".to_string(),
        }
    }
}

#[derive(Debug, Copy, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPhase {
    Cache,
    #[default]
    Execute,
}
