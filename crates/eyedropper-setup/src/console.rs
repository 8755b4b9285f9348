//! Console front-end that observes the bootstrapper and answers for the user.

use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, Weak};

use crossterm::style::Stylize;
use eyedropper_setup_core::events::{
    ActionCompleted, ActionRequested, BootstrapperObserver, Handled, InstallationProgress,
};
use eyedropper_setup_core::navigation::{route_for_completion, route_for_request, Page};
use eyedropper_setup_core::{BootstrapperManager, FolderPrompt, LaunchAction};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct ConsoleOptions {
    /// Answer every prompt with yes.
    pub assume_yes: bool,
    /// Print each observed event as one JSON line.
    pub json_events: bool,
    /// Cancel once overall progress reaches this percentage.
    pub cancel_at: Option<u32>,
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
enum ConsoleEvent<'a> {
    ActionRequested {
        #[serde(flatten)]
        request: &'a ActionRequested,
        page: Page,
    },
    ActionCompleted {
        #[serde(flatten)]
        completion: &'a ActionCompleted,
        page: Option<Page>,
    },
    Progress {
        percentage: u32,
    },
    Canceled,
}

#[derive(Default)]
struct ConsoleState {
    last_percentage: Option<u32>,
    cancel_sent: bool,
}

pub struct Console {
    manager: Weak<BootstrapperManager>,
    options: ConsoleOptions,
    state: Mutex<ConsoleState>,
}

impl Console {
    pub fn new(manager: Weak<BootstrapperManager>, options: ConsoleOptions) -> Self {
        Self {
            manager,
            options,
            state: Mutex::new(ConsoleState::default()),
        }
    }

    fn emit(&self, event: &ConsoleEvent<'_>) {
        if !self.options.json_events {
            return;
        }
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(err) => warn!(?err, "failed to encode console event"),
        }
    }

    fn confirm(&self, question: &str) -> bool {
        if self.options.assume_yes {
            return true;
        }
        match prompt_yes_no(question) {
            Ok(answer) => answer,
            Err(err) => {
                warn!(?err, "prompt failed; treating as no");
                false
            }
        }
    }

    fn show_page(&self, page: Page) {
        println!("{}", format!("== {} ==", page.title()).bold().cyan());
    }

    fn describe_install(&self, manager: &BootstrapperManager) {
        println!(
            "  {} {}",
            manager.bundle_name().bold(),
            manager.version()
        );
        println!("  Install folder: {}", manager.install_directory());
        println!(
            "  Desktop shortcut: {}  Start menu shortcut: {}  Launch on startup: {}",
            yes_no(manager.create_desktop_shortcut()),
            yes_no(manager.create_start_menu_shortcut()),
            yes_no(manager.launch_on_startup())
        );
        let license = manager.license_url();
        if !license.is_empty() {
            println!("  License: {license}");
        }
        if let Some(existing) = manager.existing_version() {
            println!("  Installed version: {existing}");
        }
    }

    /// Answers a full-UI request; returns whether the console took over.
    fn drive_request(&self, manager: &BootstrapperManager, page: Page) -> bool {
        match page {
            Page::Install | Page::InstallDetails => {
                self.describe_install(manager);
                let question = if page == Page::InstallDetails {
                    "Retry the installation?"
                } else {
                    "Install now?"
                };
                if self.confirm(question) {
                    manager.install();
                } else {
                    manager.close();
                }
            }
            Page::Uninstall => {
                println!("  {} {}", manager.bundle_name().bold(), manager.version());
                if self.confirm("Remove it from this machine?") {
                    manager.uninstall();
                } else {
                    manager.close();
                }
            }
            Page::DowngradeDetected => {
                let existing = manager.existing_version().unwrap_or_default();
                println!(
                    "  {}",
                    format!("Version {existing} is already installed; setup will not downgrade it.")
                        .yellow()
                );
                manager.close();
            }
            Page::Error => {
                println!("  {}", "Setup could not inspect this machine.".red());
                self.point_to_log(manager);
                manager.close();
            }
            _ => return false,
        }
        true
    }

    fn point_to_log(&self, manager: &BootstrapperManager) {
        let log = manager.log_file_path();
        if !log.is_empty() {
            println!("  See the setup log: {log}");
        }
    }
}

impl BootstrapperObserver for Console {
    fn action_requested(&self, event: &ActionRequested) -> Handled {
        let route = route_for_request(event);
        self.emit(&ConsoleEvent::ActionRequested {
            request: event,
            page: route.page,
        });
        debug!(page = route.page.key(), retry = event.is_retry, "action requested");

        let Some(manager) = self.manager.upgrade() else {
            return Handled(false);
        };
        let snapshot = &event.snapshot;
        self.show_page(route.page);

        // Layout runs and reduced UI are planned by the bootstrapper itself.
        if !snapshot.display.is_full() || snapshot.action == LaunchAction::Layout {
            return Handled(false);
        }
        Handled(self.drive_request(&manager, route.page))
    }

    fn action_completed(&self, event: &ActionCompleted) {
        let page = route_for_completion(event);
        self.emit(&ConsoleEvent::ActionCompleted {
            completion: event,
            page,
        });
        let Some(page) = page else {
            info!("setup finished; closing");
            return;
        };
        let Some(manager) = self.manager.upgrade() else {
            return;
        };
        self.show_page(page);

        match page {
            Page::InstallCanceled | Page::UninstallCanceled => {
                if self.confirm("Start over?") {
                    manager.reset_state();
                } else {
                    manager.close();
                }
            }
            Page::Error | Page::ElevatedError => {
                if page == Page::ElevatedError {
                    println!("  {}", "Run setup again from an elevated account.".yellow());
                }
                self.point_to_log(&manager);
                manager.close();
            }
            _ => {
                println!("  {}", "Done.".green());
                manager.close();
            }
        }
    }

    fn progress(&self, event: &InstallationProgress) {
        let percentage = event.percentage;
        let cancel = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.last_percentage == Some(percentage) {
                return;
            }
            state.last_percentage = Some(percentage);
            let reached = self
                .options
                .cancel_at
                .is_some_and(|limit| percentage >= limit);
            let cancel = reached && !state.cancel_sent;
            state.cancel_sent |= cancel;
            cancel
        };

        self.emit(&ConsoleEvent::Progress { percentage });
        if !self.options.json_events {
            println!("  [{}] {percentage:>3}%", progress_bar(percentage));
        }
        if cancel {
            if let Some(manager) = self.manager.upgrade() {
                manager.cancel(false);
            }
        }
    }

    fn canceled(&self) {
        self.emit(&ConsoleEvent::Canceled);
        println!("  {}", "Canceling...".yellow());
    }
}

/// Folder prompt for layout runs that reads the destination from stdin.
pub struct StdinFolderPrompt {
    assume_yes: bool,
}

impl StdinFolderPrompt {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl FolderPrompt for StdinFolderPrompt {
    fn pick_folder(&self, initial: &Path) -> Option<PathBuf> {
        if self.assume_yes {
            return Some(initial.to_path_buf());
        }
        match read_folder(initial) {
            Ok(choice) => choice,
            Err(err) => {
                warn!(?err, "folder prompt failed");
                None
            }
        }
    }
}

fn read_folder(initial: &Path) -> io::Result<Option<PathBuf>> {
    if !io::stdin().is_terminal() {
        return Ok(None);
    }
    print!(
        "Copy setup files to [{}] (Enter to accept, 'q' to cancel): ",
        initial.display()
    );
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(parse_folder_answer(&input, initial))
}

fn parse_folder_answer(input: &str, initial: &Path) -> Option<PathBuf> {
    match input.trim() {
        "" => Some(initial.to_path_buf()),
        "q" | "Q" => None,
        path => Some(PathBuf::from(path)),
    }
}

fn prompt_yes_no(question: &str) -> io::Result<bool> {
    if !io::stdin().is_terminal() {
        return Ok(false);
    }
    print!("{question} [y/N]: ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim().to_ascii_lowercase();
    Ok(matches!(input.as_str(), "y" | "yes"))
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn progress_bar(percentage: u32) -> String {
    const WIDTH: usize = 30;
    let filled = (percentage.min(100) as usize * WIDTH) / 100;
    format!("{}{}", "#".repeat(filled), "-".repeat(WIDTH - filled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyedropper_setup_core::events::ManagerSnapshot;
    use eyedropper_setup_core::{
        DetectionState, Display, ErrorType, InstallationState, UpgradeDetectionState,
    };

    #[test]
    fn folder_answer_defaults_to_initial() {
        let initial = Path::new("/srv/setup");
        assert_eq!(parse_folder_answer("\n", initial), Some(initial.to_path_buf()));
        assert_eq!(parse_folder_answer("q\n", initial), None);
        assert_eq!(
            parse_folder_answer(" /mnt/usb \n", initial),
            Some(PathBuf::from("/mnt/usb"))
        );
    }

    #[test]
    fn progress_bar_is_clamped() {
        assert_eq!(progress_bar(0), "-".repeat(30));
        assert_eq!(progress_bar(150), "#".repeat(30));
        assert_eq!(progress_bar(50).matches('#').count(), 15);
    }

    #[test]
    fn events_serialize_with_tag_and_page() {
        let event = ActionRequested {
            is_retry: false,
            snapshot: ManagerSnapshot {
                installation_state: InstallationState::Waiting,
                action: LaunchAction::Install,
                planned_action: LaunchAction::Unknown,
                display: Display::Full,
                detect_state: DetectionState::Absent,
                upgrade_detect_state: UpgradeDetectionState::None,
                downgrade: false,
                canceled: false,
            },
        };
        let line = serde_json::to_string(&ConsoleEvent::ActionRequested {
            request: &event,
            page: Page::Install,
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["event"], "action-requested");
        assert_eq!(value["page"], "Install");
        assert_eq!(value["snapshot"]["installation_state"], "waiting");
    }

    #[test]
    fn completion_events_flatten_next_to_tag() {
        let event = ActionCompleted {
            auto_close: true,
            error_type: Some(ErrorType::Elevate),
            snapshot: ManagerSnapshot {
                installation_state: InstallationState::Failed,
                action: LaunchAction::Install,
                planned_action: LaunchAction::Install,
                display: Display::Passive,
                detect_state: DetectionState::Absent,
                upgrade_detect_state: UpgradeDetectionState::None,
                downgrade: false,
                canceled: false,
            },
        };
        let line = serde_json::to_string(&ConsoleEvent::ActionCompleted {
            completion: &event,
            page: None,
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["event"], "action-completed");
        assert_eq!(value["auto_close"], true);
        assert_eq!(value["error_type"], "elevate");
        assert!(value["page"].is_null());
        assert_eq!(value["snapshot"]["installation_state"], "failed");
    }

    #[test]
    fn detached_console_leaves_requests_unhandled() {
        let console = Console::new(Weak::new(), ConsoleOptions::default());
        let event = ActionRequested {
            is_retry: true,
            snapshot: ManagerSnapshot {
                installation_state: InstallationState::Waiting,
                action: LaunchAction::Install,
                planned_action: LaunchAction::Unknown,
                display: Display::Full,
                detect_state: DetectionState::Absent,
                upgrade_detect_state: UpgradeDetectionState::None,
                downgrade: false,
                canceled: false,
            },
        };
        assert_eq!(console.action_requested(&event), Handled(false));
    }
}
