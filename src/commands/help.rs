//! Help command implementation for brightsync.
//!
//! Dispatches `brightsync help <command>` to the command's own help text.

use anyhow::Result;

/// Run the help command (dispatcher)
///
/// # Arguments
/// * `command` - Optional command name to get help for (None = general help)
pub fn run_help_command(command: Option<&str>) -> Result<()> {
    match command {
        None => display_general_help(),
        Some("status") | Some("st") => super::status::display_help(),
        Some("pause") | Some("resume") | Some("toggle") => super::control::display_help(),
        Some("offset") | Some("o") => super::offset::display_help(),
        Some("displays") => super::displays::display_help(),
        Some("reload") | Some("r") => super::reload::display_help(),
        Some("stop") => super::stop::display_help(),
        Some("help") => display_help_help(),
        Some(unknown) => {
            log_warning_standalone!("Unknown command: {}", unknown);
            display_general_help();
        }
    }
    Ok(())
}

/// Display general help focused on commands (for the help command)
fn display_general_help() {
    log_version!();
    log_block_start!("Available Commands:");
    log_indented!("status, st               Show the daemon's current state");
    log_indented!("pause | resume | toggle  Control synchronization");
    log_indented!("offset, o                Inspect or change calibration offsets");
    log_indented!("displays                 List displays and their roles");
    log_indented!("reload, r                Reload the daemon's configuration");
    log_indented!("stop                     Stop the running daemon");
    log_indented!("help [COMMAND]           Show detailed help for a command");
    log_pipe!();
    log_info!("Use 'brightsync help <command>' to see detailed help for a specific command.");
    log_indented!("Use 'brightsync --help' to see all options and general usage.");
    log_end!();
}

fn display_help_help() {
    log_version!();
    log_block_start!("help - Display help information");
    log_block_start!("Usage: brightsync help [COMMAND]");
    log_block_start!("Examples:");
    log_indented!("brightsync help");
    log_indented!("brightsync help offset");
    log_end!();
}
