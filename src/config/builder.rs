//! Default configuration file generation.
//!
//! The generated file lists every scalar option with its default value and an
//! aligned comment, followed by commented-out examples of the device tables.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::common::constants::*;

/// Write a commented default `brightsync.toml` to `path`.
pub fn create_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    let config_content = ConfigBuilder::new()
        .add_section("Sampling")
        .add_setting(
            "update_interval",
            &DEFAULT_UPDATE_INTERVAL.to_string(),
            &format!(
                "Seconds between brightness samples ({MINIMUM_UPDATE_INTERVAL}-{MAXIMUM_UPDATE_INTERVAL})"
            ),
        )
        .add_setting(
            "locked_offset",
            &DEFAULT_LOCKED_OFFSET.to_string(),
            "Ignore manual changes on targets instead of learning offsets",
        )
        .add_section("Targets")
        .add_setting(
            "accept_any_target",
            &DEFAULT_ACCEPT_ANY_TARGET.to_string(),
            "Every external monitor follows the built-in panel",
        )
        .add_section("Platform")
        .add_setting(
            "ddcutil_path",
            &format!("\"{DEFAULT_DDCUTIL_PATH}\""),
            "DDC/CI helper used for external monitors",
        )
        .add_setting(
            "hotplug_poll_interval",
            &format!("{DEFAULT_HOTPLUG_POLL_INTERVAL:.1}"),
            &format!(
                "Seconds between connector scans ({MINIMUM_HOTPLUG_POLL_INTERVAL}-{MAXIMUM_HOTPLUG_POLL_INTERVAL})"
            ),
        )
        .add_comment_block(&[
            "",
            "# Restrict targets (with accept_any_target = false) or allow an external",
            "# monitor to act as source when no built-in panel is present.",
            "# Codes are shown by `brightsync displays`.",
            "#",
            "# [[target]]",
            "# vendor = 0x10AC",
            "# model = 0xA0C4",
            "#",
            "# [[source_fallback]]",
            "# vendor = 0x10AC",
            "# model = 0x4142",
        ])
        .build();

    fs::write(path, config_content).context("Failed to write default config file")?;
    Ok(())
}

struct ConfigBuilder {
    entries: Vec<Entry>,
}

enum Entry {
    Section(String),
    Setting { line: String, comment: String },
    Raw(String),
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_section(mut self, title: &str) -> Self {
        self.entries.push(Entry::Section(format!("#[{title}]")));
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(Entry::Setting {
            line: format!("{key} = {value}"),
            comment: format!("# {comment}"),
        });
        self
    }

    fn add_comment_block(mut self, lines: &[&str]) -> Self {
        self.entries
            .extend(lines.iter().map(|line| Entry::Raw(line.to_string())));
        self
    }

    fn build(self) -> String {
        // Align every comment one space past the longest setting line.
        let max_width = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                Entry::Setting { line, .. } => Some(line.len()),
                _ => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let mut result = Vec::new();
        let mut first_section = true;

        for entry in self.entries {
            match entry {
                Entry::Section(title) => {
                    if !first_section {
                        result.push(String::new());
                    }
                    result.push(title);
                    first_section = false;
                }
                Entry::Setting { line, comment } => {
                    let padding = " ".repeat(max_width - line.len());
                    result.push(format!("{line}{padding}{comment}"));
                }
                Entry::Raw(line) => result.push(line),
            }
        }

        let mut content = result.join("\n");
        content.push('\n');
        content
    }
}
