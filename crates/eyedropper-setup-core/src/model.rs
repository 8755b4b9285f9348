//! Lifecycle states and engine-facing enumerations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sequential lifecycle of one bootstrapper run.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallationState {
    #[default]
    Initializing,
    Detecting,
    Waiting,
    Planning,
    Applying,
    Applied,
    Failed,
}

/// Whether the product is already registered on the machine.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionState {
    #[default]
    Absent,
    Present,
}

/// Relationship between installed related bundles and this bundle.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpgradeDetectionState {
    /// No related bundle has been reported.
    #[default]
    None,
    /// Every related bundle is older than or equal to this bundle.
    Older,
    /// At least one related bundle is newer than this bundle.
    Newer,
}

/// Operation requested from the command line or submitted to planning.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LaunchAction {
    #[default]
    Unknown,
    Help,
    Layout,
    Uninstall,
    Cache,
    Install,
    Modify,
    Repair,
    UpdateReplace,
    UpdateReplaceEmbedded,
}

/// How much UI the engine asked the bootstrapper to show.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Display {
    #[default]
    Unknown,
    Embedded,
    None,
    Passive,
    Full,
}

impl Display {
    pub fn is_full(self) -> bool {
        matches!(self, Display::Full)
    }
}

/// Context the bootstrapper was resumed from.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResumeType {
    #[default]
    None,
    Invalid,
    Interrupted,
    Reboot,
    Suspend,
    /// Launched from the OS Add/Remove Programs list.
    Arp,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegistrationType {
    #[default]
    None,
    InProgress,
    Full,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationType {
    #[default]
    None,
    Detect,
    Upgrade,
    Addon,
    Patch,
    Dependent,
    Update,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageState {
    #[default]
    Unknown,
    Obsolete,
    Absent,
    Present,
    Superseded,
}

/// Execute action the engine planned for a package.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionState {
    #[default]
    None,
    Uninstall,
    Install,
    Modify,
    Mend,
    Repair,
    MinorUpgrade,
}

/// Classification attached to engine error callbacks.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorType {
    Elevate,
    WindowsInstaller,
    Exe,
    HttpServerAuthentication,
    HttpProxyAuthentication,
}

impl ErrorType {
    /// Authentication failures the engine can retry after prompting for credentials.
    pub fn is_authentication(self) -> bool {
        matches!(
            self,
            ErrorType::HttpServerAuthentication | ErrorType::HttpProxyAuthentication
        )
    }
}

/// Answer handed back to the engine for an error callback.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineResult {
    Error,
    #[default]
    None,
    Ok,
    Cancel,
    Abort,
    Retry,
    Ignore,
    Yes,
    No,
    Close,
    Help,
    TryAgain,
    Continue,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LogLevel {
    None,
    Standard,
    Verbose,
    Debug,
    Error,
}

/// Native handle of the window the engine should parent its prompts to.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct WindowHandle(pub usize);

#[derive(Debug, Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

fn normalized(value: &str) -> String {
    value.trim().to_ascii_lowercase().replace(['-', '_'], "")
}

impl FromStr for LaunchAction {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match normalized(value).as_str() {
            "unknown" => Ok(Self::Unknown),
            "help" => Ok(Self::Help),
            "layout" => Ok(Self::Layout),
            "uninstall" => Ok(Self::Uninstall),
            "cache" => Ok(Self::Cache),
            "install" => Ok(Self::Install),
            "modify" => Ok(Self::Modify),
            "repair" => Ok(Self::Repair),
            "updatereplace" => Ok(Self::UpdateReplace),
            "updatereplaceembedded" => Ok(Self::UpdateReplaceEmbedded),
            _ => Err(ParseEnumError::new("launch action", value)),
        }
    }
}

impl FromStr for Display {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match normalized(value).as_str() {
            "unknown" => Ok(Self::Unknown),
            "embedded" => Ok(Self::Embedded),
            "none" | "quiet" | "silent" => Ok(Self::None),
            "passive" => Ok(Self::Passive),
            "full" => Ok(Self::Full),
            _ => Err(ParseEnumError::new("display", value)),
        }
    }
}

impl FromStr for ResumeType {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match normalized(value).as_str() {
            "none" => Ok(Self::None),
            "invalid" => Ok(Self::Invalid),
            "interrupted" => Ok(Self::Interrupted),
            "reboot" => Ok(Self::Reboot),
            "suspend" => Ok(Self::Suspend),
            "arp" => Ok(Self::Arp),
            _ => Err(ParseEnumError::new("resume type", value)),
        }
    }
}

impl fmt::Display for LaunchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for InstallationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
