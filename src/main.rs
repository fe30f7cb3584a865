//! Main application entry point.
//!
//! Parses the command line and dispatches to the daemon or to a one-shot
//! command. Everything else lives in the library crate.

use anyhow::Result;

use brightsync::args::{self, CliAction, ParsedArgs};
use brightsync::commands;
use brightsync::config;
use brightsync::logger::Log;
use brightsync::{Brightsync, log_error_exit};

fn main() -> Result<()> {
    let parsed_args = ParsedArgs::from_env();

    match parsed_args.action {
        CliAction::ShowVersion => {
            args::display_version_info();
            Ok(())
        }
        CliAction::ShowHelp | CliAction::ShowHelpDueToError => {
            args::display_help();
            Ok(())
        }
        CliAction::HelpCommand { command } => commands::help::run_help_command(command.as_deref()),
        CliAction::Run {
            debug_enabled,
            config_dir,
        } => {
            use_config_dir(config_dir)?;
            Brightsync::new(debug_enabled).run()
        }
        CliAction::StatusCommand {
            config_dir,
            json,
            follow,
        } => {
            use_config_dir(config_dir)?;
            // JSON output must stay machine-readable.
            if json {
                Log::set_enabled(false);
            }
            commands::status::handle_status_command(json, follow)
        }
        CliAction::ControlCommand { action, config_dir } => {
            use_config_dir(config_dir)?;
            commands::control::handle_control_command(action)
        }
        CliAction::OffsetCommand { action, config_dir } => {
            use_config_dir(config_dir)?;
            commands::offset::handle_offset_command(action)
        }
        CliAction::DisplaysCommand {
            debug_enabled,
            config_dir,
        } => {
            use_config_dir(config_dir)?;
            commands::displays::handle_displays_command(debug_enabled)
        }
        CliAction::ReloadCommand { config_dir } => {
            use_config_dir(config_dir)?;
            commands::reload::handle_reload_command()
        }
        CliAction::StopCommand { config_dir } => {
            use_config_dir(config_dir)?;
            commands::stop::handle_stop_command()
        }
    }
}

/// Apply `--config`. Without it, client commands may still adopt the
/// running daemon's directory later.
fn use_config_dir(config_dir: Option<String>) -> Result<()> {
    let Some(dir) = config_dir else {
        return Ok(());
    };
    if let Err(e) = config::set_config_dir(Some(dir)) {
        log_error_exit!("Invalid config directory: {}", e);
        std::process::exit(brightsync::common::constants::EXIT_FAILURE);
    }
    Ok(())
}
