//! Lifecycle core of the EyeDropper setup bootstrapper.

pub mod callbacks;
pub mod command_line;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod events;
pub mod manager;
pub mod model;
pub mod navigation;
pub mod progress;
pub mod util;
pub mod variables;

#[cfg(test)]
mod testing;

pub use config::*;
pub use dispatch::{FolderPrompt, InlineDispatcher, UiDispatcher, UiJob};
pub use engine::{BootstrapperCommand, BundleManifest, Engine, PackageInfo, VariableStore};
pub use manager::{BootstrapperManager, APPLICATION_PACKAGE_ID};
pub use model::*;
pub use util::exit_code_from_status;
