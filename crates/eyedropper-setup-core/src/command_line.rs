//! `key=value` overrides accepted on the setup command line.
//!
//! Recognized keys match the bundle variable names case-insensitively.
//! Unknown keys are ignored and malformed booleans leave the setting alone.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::util::log_snippet;
use crate::variables::bundle_var;

/// Settings found on the command line; `None` means "keep the current value".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLineOverrides {
    pub install_directory: Option<PathBuf>,
    pub create_desktop_shortcut: Option<bool>,
    pub create_start_menu_shortcut: Option<bool>,
    pub launch_on_startup: Option<bool>,
}

impl CommandLineOverrides {
    /// Parses `command_line`, resolving a relative install folder against `current_dir`.
    pub fn parse(command_line: &str, current_dir: &Path) -> Self {
        let mut overrides = Self::default();
        for token in split_arguments(command_line) {
            let (key, value) = token.split_once('=').unwrap_or((token.as_str(), ""));
            if key.eq_ignore_ascii_case(bundle_var::INSTALL_DIRECTORY) {
                overrides.install_directory = Some(if value.is_empty() {
                    current_dir.to_path_buf()
                } else {
                    current_dir.join(value)
                });
            } else if key.eq_ignore_ascii_case(bundle_var::CREATE_DESKTOP_SHORTCUT) {
                assign_flag(&mut overrides.create_desktop_shortcut, key, value);
            } else if key.eq_ignore_ascii_case(bundle_var::CREATE_START_MENU_SHORTCUT) {
                assign_flag(&mut overrides.create_start_menu_shortcut, key, value);
            } else if key.eq_ignore_ascii_case(bundle_var::LAUNCH_ON_STARTUP) {
                assign_flag(&mut overrides.launch_on_startup, key, value);
            } else {
                debug!(key = %log_snippet(key), "ignoring unrecognized command-line argument");
            }
        }
        overrides
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn assign_flag(slot: &mut Option<bool>, key: &str, value: &str) {
    match parse_flag(value) {
        Some(flag) => *slot = Some(flag),
        None => debug!(
            key,
            value = %log_snippet(value),
            "ignoring malformed boolean on command line"
        ),
    }
}

/// Accepts `true`/`false` in any case plus `1`/`0`.
pub fn parse_flag(value: &str) -> Option<bool> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("true") || trimmed == "1" {
        Some(true)
    } else if trimmed.eq_ignore_ascii_case("false") || trimmed == "0" {
        Some(false)
    } else {
        None
    }
}

/// Splits on whitespace and `;` outside double quotes, dropping the quotes.
pub fn split_arguments(command_line: &str) -> Vec<String> {
    let mut arguments = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut pending = false;

    for ch in command_line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                pending = true;
            }
            ch if !in_quotes && (ch.is_whitespace() || ch == ';') => {
                if pending {
                    arguments.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            ch => {
                current.push(ch);
                pending = true;
            }
        }
    }
    if pending {
        arguments.push(current);
    }
    arguments
}
