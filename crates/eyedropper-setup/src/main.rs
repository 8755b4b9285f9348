//! Setup host entrypoint: wires the scripted engine, the UI loop and the console.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use eyedropper_setup_core::callbacks::CallbackRegistry;
use eyedropper_setup_core::events::BootstrapperObserver;
use eyedropper_setup_core::{
    exit_code_from_status, BootstrapperCommand, BootstrapperManager, BundleManifest, Display,
    Engine, FolderPrompt, LaunchAction, PackageInfo, ResumeType, SetupConfig,
};
use tracing::info;

mod console;
#[path = "runtime_config.rs"]
mod runtime_config;
mod simulated_engine;
mod ui_loop;

use crate::console::{Console, ConsoleOptions, StdinFolderPrompt};
use crate::runtime_config::{config_source, init_tracing, load_config};
use crate::simulated_engine::SimulatedEngine;
use crate::ui_loop::ChannelDispatcher;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Launch action requested of the bootstrapper
    #[arg(long, default_value = "install")]
    action: LaunchAction,

    /// Amount of UI to show (full, passive, none, embedded)
    #[arg(long, default_value = "full")]
    display: Display,

    /// Context the bootstrapper was started from
    #[arg(long, default_value = "none")]
    resume: ResumeType,

    /// Destination of a layout run
    #[arg(long)]
    layout_dir: Option<PathBuf>,

    /// Answer yes to every prompt
    #[arg(long)]
    yes: bool,

    /// Print observed events in a machine-readable format
    #[arg(long, value_enum)]
    events: Option<EventFormat>,

    /// Bundle variable overrides such as InstallFolder=Tools
    overrides: Vec<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EventFormat {
    Json,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args).context("load config")?;

    init_tracing(&config);
    info!(config_source = config_source(&args), "configuration loaded");

    let exit_code = run(&args, config)?;
    std::process::exit(exit_code);
}

fn run(args: &Args, config: SetupConfig) -> Result<i32> {
    let command = BootstrapperCommand {
        action: args.action,
        display: args.display,
        resume: args.resume,
        command_line: join_command_line(&args.overrides),
        layout_directory: args.layout_dir.clone(),
    };
    let options = ConsoleOptions {
        assume_yes: args.yes,
        json_events: matches!(args.events, Some(EventFormat::Json)),
        cancel_at: config.scenario.cancel_at,
    };
    let prompt = Arc::new(StdinFolderPrompt::new(args.yes));

    let status = drive(command, config, prompt, |manager| {
        let console: Arc<dyn BootstrapperObserver> =
            Arc::new(Console::new(Arc::downgrade(manager), options));
        console
    })?;
    Ok(exit_code_from_status(status))
}

/// Runs one bootstrapper session against the scripted engine and returns its final status.
fn drive(
    command: BootstrapperCommand,
    config: SetupConfig,
    prompt: Arc<dyn FolderPrompt>,
    front_end: impl FnOnce(&Arc<BootstrapperManager>) -> Arc<dyn BootstrapperObserver>,
) -> Result<i32> {
    let manifest = BundleManifest::new(config.scenario.packages.iter().map(|package| {
        PackageInfo {
            id: package.id.clone(),
            relation: None,
            per_machine: package.per_machine,
            version: None,
        }
    }));

    let registry = CallbackRegistry::new();
    let engine = SimulatedEngine::start(&config.bundle, config.scenario, registry.clone())
        .context("start scripted engine")?;
    let dispatcher = Arc::new(ChannelDispatcher::new());

    let manager = Arc::new(
        BootstrapperManager::new(engine.clone(), command, manifest, dispatcher)
            .with_folder_prompt(prompt),
    );
    manager.wire(&registry);
    manager.subscribe(front_end(&manager));

    let status = manager.run();
    manager.dispose();

    let exit_code = exit_code_from_status(status);
    info!(
        status = %format!("{status:#010x}"),
        exit_code,
        "bootstrapper finished"
    );
    engine.quit(exit_code);
    Ok(status)
}

/// Rebuilds an engine command line, quoting arguments that contain separators.
fn join_command_line(arguments: &[String]) -> String {
    arguments
        .iter()
        .map(|argument| {
            if argument.contains(|ch: char| ch.is_whitespace() || ch == ';') {
                format!("\"{argument}\"")
            } else {
                argument.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyedropper_setup_core::command_line::split_arguments;
    use eyedropper_setup_core::events::ActionCompleted;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Completions(Mutex<Vec<String>>);

    impl BootstrapperObserver for Completions {
        fn action_completed(&self, event: &ActionCompleted) {
            self.0.lock().unwrap().push(format!(
                "{:?}/{}",
                event.snapshot.installation_state, event.auto_close
            ));
        }
    }

    struct NoPrompt;

    impl FolderPrompt for NoPrompt {
        fn pick_folder(&self, _initial: &Path) -> Option<PathBuf> {
            None
        }
    }

    fn drive_with(display: Display, config: SetupConfig) -> (i32, Vec<String>) {
        let command = BootstrapperCommand {
            action: LaunchAction::Install,
            display,
            ..BootstrapperCommand::default()
        };
        let completions = Arc::new(Completions::default());
        let observer: Arc<dyn BootstrapperObserver> = completions.clone();
        let status = drive(command, config, Arc::new(NoPrompt), move |_| observer).unwrap();
        let seen = completions.0.lock().unwrap().clone();
        (status, seen)
    }

    #[test]
    fn passive_install_runs_to_completion_across_threads() {
        let (status, completions) = drive_with(Display::Passive, SetupConfig::default());
        assert_eq!(status, 0);
        assert_eq!(completions, ["Applied/true"]);
    }

    #[test]
    fn quiet_install_reports_apply_failure_as_exit_code() {
        let mut config = SetupConfig::default();
        config.scenario.apply_error = 1602;
        let (status, completions) = drive_with(Display::None, config);
        assert_eq!(exit_code_from_status(status), 1602);
        assert_eq!(completions, ["Failed/true"]);
    }

    #[test]
    fn command_line_quotes_arguments_with_separators() {
        let arguments = vec![
            "InstallFolder=My Tools".to_string(),
            "LaunchOnStartup=1".to_string(),
        ];
        let line = join_command_line(&arguments);
        assert_eq!(line, "\"InstallFolder=My Tools\" LaunchOnStartup=1");
        assert_eq!(split_arguments(&line), arguments);
    }

    #[test]
    fn args_parse_actions_and_overrides() {
        let args = Args::parse_from([
            "eyedropper-setup",
            "--action",
            "uninstall",
            "--display",
            "quiet",
            "--events",
            "json",
            "CreateDesktopShortcut=0",
        ]);
        assert_eq!(args.action, LaunchAction::Uninstall);
        assert_eq!(args.display, Display::None);
        assert_eq!(args.resume, ResumeType::None);
        assert!(matches!(args.events, Some(EventFormat::Json)));
        assert_eq!(args.overrides, ["CreateDesktopShortcut=0"]);
    }
}
