//! Command-line argument parsing and processing.
//!
//! Global flags (`--debug`, `--config <dir>`, `--help`, `--version`) may
//! appear anywhere; the first non-flag argument selects a subcommand. With no
//! subcommand the daemon runs in the foreground.

/// Operation requested through `brightsync offset`.
#[derive(Debug, Clone, PartialEq)]
pub enum OffsetAction {
    List,
    Set { id: String, offset: f64 },
    Reset,
}

/// Control requests that map onto a running daemon's pause state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Pause,
    Resume,
    Toggle,
}

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the daemon
    Run {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    /// Print the daemon's status
    StatusCommand {
        config_dir: Option<String>,
        json: bool,
        follow: bool,
    },
    /// Pause, resume or toggle the daemon
    ControlCommand {
        action: ControlAction,
        config_dir: Option<String>,
    },
    /// Inspect or change calibration offsets
    OffsetCommand {
        action: OffsetAction,
        config_dir: Option<String>,
    },
    /// Enumerate displays and show the topology
    DisplaysCommand {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    /// Ask the daemon to reload its configuration
    ReloadCommand { config_dir: Option<String> },
    /// Stop the daemon
    StopCommand { config_dir: Option<String> },
    /// Detailed help for one command
    HelpCommand { command: Option<String> },

    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to invalid arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse command-line arguments into a structured result.
    ///
    /// The first element is the program name and is skipped.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        let mut debug_enabled = false;
        let mut display_help = false;
        let mut display_version = false;
        let mut config_dir: Option<String> = None;
        let mut unknown_arg_found = false;
        let mut json = false;
        let mut follow = false;
        let mut positional: Vec<String> = Vec::new();

        let mut idx = 0;
        while idx < args_vec.len() {
            let arg = args_vec[idx].as_str();
            match arg {
                "--debug" | "-d" => debug_enabled = true,
                "--help" | "-h" => display_help = true,
                "--version" | "-V" | "-v" => display_version = true,
                "--json" | "-j" => json = true,
                "--follow" | "-f" => follow = true,
                "--config" | "-c" => {
                    idx += 1;
                    match args_vec.get(idx) {
                        Some(dir) => config_dir = Some(dir.clone()),
                        None => {
                            log_warning_standalone!("--config requires a directory argument");
                            unknown_arg_found = true;
                        }
                    }
                }
                // Negative offsets look like flags.
                _ if arg.starts_with('-') && arg.parse::<f64>().is_err() => {
                    log_warning_standalone!("Unknown argument: {}", arg);
                    unknown_arg_found = true;
                }
                _ => positional.push(arg.to_string()),
            }
            idx += 1;
        }

        let action = if display_version {
            CliAction::ShowVersion
        } else if display_help {
            CliAction::ShowHelp
        } else if unknown_arg_found {
            CliAction::ShowHelpDueToError
        } else {
            Self::command_action(&positional, debug_enabled, config_dir, json, follow)
                .unwrap_or(CliAction::ShowHelpDueToError)
        };

        ParsedArgs { action }
    }

    fn command_action(
        positional: &[String],
        debug_enabled: bool,
        config_dir: Option<String>,
        json: bool,
        follow: bool,
    ) -> Option<CliAction> {
        let Some((command, rest)) = positional.split_first() else {
            return Some(CliAction::Run {
                debug_enabled,
                config_dir,
            });
        };

        let no_arguments = |action: CliAction| -> Option<CliAction> {
            if rest.is_empty() {
                Some(action)
            } else {
                log_warning_standalone!("'{}' takes no arguments", command);
                None
            }
        };

        match command.as_str() {
            "status" | "st" => no_arguments(CliAction::StatusCommand {
                config_dir,
                json,
                follow,
            }),
            "pause" => no_arguments(CliAction::ControlCommand {
                action: ControlAction::Pause,
                config_dir,
            }),
            "resume" => no_arguments(CliAction::ControlCommand {
                action: ControlAction::Resume,
                config_dir,
            }),
            "toggle" => no_arguments(CliAction::ControlCommand {
                action: ControlAction::Toggle,
                config_dir,
            }),
            "displays" => no_arguments(CliAction::DisplaysCommand {
                debug_enabled,
                config_dir,
            }),
            "reload" | "r" => no_arguments(CliAction::ReloadCommand { config_dir }),
            "stop" => no_arguments(CliAction::StopCommand { config_dir }),
            "help" => match rest {
                [] => Some(CliAction::HelpCommand { command: None }),
                [topic] => Some(CliAction::HelpCommand {
                    command: Some(topic.clone()),
                }),
                _ => None,
            },
            "offset" | "o" => {
                let action = Self::offset_action(rest)?;
                Some(CliAction::OffsetCommand { action, config_dir })
            }
            other => {
                log_warning_standalone!("Unknown command: {}", other);
                None
            }
        }
    }

    fn offset_action(rest: &[String]) -> Option<OffsetAction> {
        match rest {
            [] => Some(OffsetAction::List),
            [sub] if sub == "list" => Some(OffsetAction::List),
            [sub] if sub == "reset" => Some(OffsetAction::Reset),
            [sub, id, value] if sub == "set" => match value.parse::<f64>() {
                Ok(offset) if offset.is_finite() => Some(OffsetAction::Set {
                    id: id.clone(),
                    offset,
                }),
                _ => {
                    log_warning_standalone!("Invalid offset value: {}", value);
                    None
                }
            },
            _ => {
                log_warning_standalone!("Usage: brightsync offset [list | set <id> <value> | reset]");
                None
            }
        }
    }

    /// Convenience method to parse from std::env::args()
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

/// Displays version information using custom logging style.
pub fn display_version_info() {
    log_version!();
    log_pipe!();
    println!("┗ {}", env!("CARGO_PKG_DESCRIPTION"));
}

/// Displays custom help message using logger methods.
pub fn display_help() {
    log_version!();
    log_block_start!(env!("CARGO_PKG_DESCRIPTION"));
    log_block_start!("Usage:");
    log_indented!("brightsync [OPTIONS] [COMMAND]");
    log_block_start!("Options:");
    log_indented!("-c, --config <dir>     Use custom configuration directory");
    log_indented!("-d, --debug            Enable detailed debug output");
    log_indented!("-h, --help             Print help information");
    log_indented!("-V, --version          Print version information");
    log_block_start!("Commands:");
    log_indented!("status, st [--json] [--follow]  Show the daemon's current state");
    log_indented!("pause | resume | toggle         Control synchronization");
    log_indented!("offset, o list                  Show stored calibration offsets");
    log_indented!("offset, o set <id> <value>      Set a display's offset (user scale)");
    log_indented!("offset, o reset                 Clear every stored offset");
    log_indented!("displays                        List displays and the computed topology");
    log_indented!("reload, r                       Reload the daemon's configuration");
    log_indented!("stop                            Stop the running daemon");
    log_indented!("help [COMMAND]                  Show detailed help for a command");
    log_end!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliAction {
        ParsedArgs::parse(std::iter::once("brightsync").chain(args.iter().copied())).action
    }

    #[test]
    fn test_parse_no_args() {
        assert_eq!(
            parse(&[]),
            CliAction::Run {
                debug_enabled: false,
                config_dir: None,
            }
        );
    }

    #[test]
    fn test_parse_debug_and_config() {
        assert_eq!(
            parse(&["-d", "--config", "/tmp/bs"]),
            CliAction::Run {
                debug_enabled: true,
                config_dir: Some("/tmp/bs".to_string()),
            }
        );
    }

    #[test]
    fn test_version_takes_precedence() {
        assert_eq!(parse(&["--help", "--version"]), CliAction::ShowVersion);
        assert_eq!(parse(&["status", "-h"]), CliAction::ShowHelp);
    }

    #[test]
    fn test_parse_unknown_flag() {
        assert_eq!(parse(&["--bogus"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["frobnicate"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["--config"]), CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_parse_status_flags() {
        assert_eq!(
            parse(&["status", "--json", "-f"]),
            CliAction::StatusCommand {
                config_dir: None,
                json: true,
                follow: true,
            }
        );
    }

    #[test]
    fn test_parse_control_commands() {
        for (word, action) in [
            ("pause", ControlAction::Pause),
            ("resume", ControlAction::Resume),
            ("toggle", ControlAction::Toggle),
        ] {
            assert_eq!(
                parse(&[word]),
                CliAction::ControlCommand {
                    action,
                    config_dir: None,
                }
            );
        }
        assert_eq!(parse(&["pause", "now"]), CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_parse_offset_commands() {
        let offset = |args: &[&str]| match parse(args) {
            CliAction::OffsetCommand { action, .. } => Some(action),
            _ => None,
        };

        assert_eq!(offset(&["offset"]), Some(OffsetAction::List));
        assert_eq!(offset(&["offset", "list"]), Some(OffsetAction::List));
        assert_eq!(offset(&["o", "reset"]), Some(OffsetAction::Reset));
        assert_eq!(
            offset(&["offset", "set", "DEL-A0C4-1", "-0.15"]),
            Some(OffsetAction::Set {
                id: "DEL-A0C4-1".to_string(),
                offset: -0.15,
            })
        );
        assert_eq!(offset(&["offset", "set", "DEL-A0C4-1", "abc"]), None);
        assert_eq!(offset(&["offset", "set", "DEL-A0C4-1", "NaN"]), None);
    }

    #[test]
    fn test_parse_help_command() {
        assert_eq!(parse(&["help"]), CliAction::HelpCommand { command: None });
        assert_eq!(
            parse(&["help", "offset"]),
            CliAction::HelpCommand {
                command: Some("offset".to_string())
            }
        );
    }

    #[test]
    fn test_parse_displays_keeps_debug() {
        assert_eq!(
            parse(&["displays", "--debug"]),
            CliAction::DisplaysCommand {
                debug_enabled: true,
                config_dir: None,
            }
        );
    }
}
