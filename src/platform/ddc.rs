//! External monitor brightness over DDC/CI via the `ddcutil` binary.

use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use crate::common::constants::DDC_BRIGHTNESS_FEATURE;

/// A monitor reported by `ddcutil detect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdcMonitor {
    pub bus: u32,
    /// DRM connector name, e.g. "card1-DP-2", when ddcutil reports one.
    pub connector: Option<String>,
    /// The `Monitor:` line, "MFG:MODEL:SERIAL".
    pub monitor: Option<String>,
}

/// Thin wrapper around the configured `ddcutil` executable.
#[derive(Debug, Clone)]
pub struct Ddcutil {
    program: String,
}

impl Ddcutil {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn detect(&self) -> Result<Vec<DdcMonitor>> {
        let output = self.run(&["detect", "--terse"])?;
        Ok(parse_detect(&output))
    }

    /// Read `(current, max)` of the brightness feature.
    pub fn get_brightness(&self, bus: u32) -> Result<(u32, u32)> {
        let bus = bus.to_string();
        let output = self.run(&["getvcp", DDC_BRIGHTNESS_FEATURE, "--bus", &bus])?;
        parse_getvcp(&output)
    }

    pub fn set_brightness(&self, bus: u32, value: u32) -> Result<()> {
        let bus = bus.to_string();
        let value = value.to_string();
        self.run(&["setvcp", DDC_BRIGHTNESS_FEATURE, &value, "--bus", &bus])?;
        Ok(())
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to run {}", self.program))?;
        if !output.status.success() {
            bail!(
                "{} {} failed ({}): {}",
                self.program,
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn detect_patterns() -> &'static (Regex, Regex, Regex, Regex) {
    static PATTERNS: OnceLock<(Regex, Regex, Regex, Regex)> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        (
            Regex::new(r"^Display\s+\d+").expect("valid regex"),
            Regex::new(r"I2C bus:\s+/dev/i2c-(\d+)").expect("valid regex"),
            Regex::new(r"DRM[_ ]connector:\s+(\S+)").expect("valid regex"),
            Regex::new(r"Monitor:\s+(.+)$").expect("valid regex"),
        )
    })
}

/// Parse `ddcutil detect --terse` output.
///
/// "Invalid display" blocks (monitors that do not answer DDC/CI) are skipped.
pub fn parse_detect(output: &str) -> Vec<DdcMonitor> {
    let (display_re, bus_re, connector_re, monitor_re) = detect_patterns();

    let mut monitors = Vec::new();
    let mut current: Option<DdcMonitor> = None;
    let mut in_valid_block = false;

    for line in output.lines() {
        if display_re.is_match(line) {
            monitors.extend(current.take());
            in_valid_block = true;
            continue;
        }
        if line.starts_with("Invalid display") {
            monitors.extend(current.take());
            in_valid_block = false;
            continue;
        }
        if !in_valid_block {
            continue;
        }
        if let Some(caps) = bus_re.captures(line)
            && let Ok(bus) = caps[1].parse()
        {
            current = Some(DdcMonitor {
                bus,
                connector: None,
                monitor: None,
            });
        } else if let Some(monitor) = current.as_mut() {
            if let Some(caps) = connector_re.captures(line) {
                monitor.connector = Some(caps[1].to_string());
            } else if let Some(caps) = monitor_re.captures(line.trim()) {
                monitor.monitor = Some(caps[1].trim().to_string());
            }
        }
    }
    monitors.extend(current);
    monitors
}

/// Parse `ddcutil getvcp 10` output into `(current, max)`.
pub fn parse_getvcp(output: &str) -> Result<(u32, u32)> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        Regex::new(r"current value =\s*(\d+),\s*max value =\s*(\d+)").expect("valid regex")
    });
    let caps = re
        .captures(output)
        .ok_or_else(|| anyhow!("Failed to parse ddcutil output: {}", output.trim()))?;
    let current: u32 = caps[1].parse()?;
    let max: u32 = caps[2].parse()?;
    if max == 0 {
        bail!("Monitor reports a maximum brightness of 0");
    }
    Ok((current, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETECT_OUTPUT: &str = "\
Display 1
   I2C bus:  /dev/i2c-4
   DRM_connector:           card1-DP-2
   Monitor:                 DEL:DELL U2720Q:7XK2D93

Invalid display
   I2C bus:  /dev/i2c-7
   DRM_connector:           card1-HDMI-A-1
   Monitor:                 GSM:LG TV:

Display 2
   I2C bus:  /dev/i2c-9
   Monitor:                 BNQ:BenQ GW2480:ET1234
";

    #[test]
    fn test_parse_detect() {
        let monitors = parse_detect(DETECT_OUTPUT);
        assert_eq!(monitors.len(), 2);

        assert_eq!(monitors[0].bus, 4);
        assert_eq!(monitors[0].connector.as_deref(), Some("card1-DP-2"));
        assert_eq!(monitors[0].monitor.as_deref(), Some("DEL:DELL U2720Q:7XK2D93"));

        assert_eq!(monitors[1].bus, 9);
        assert_eq!(monitors[1].connector, None);
    }

    #[test]
    fn test_parse_detect_older_connector_label() {
        let output = "Display 1\n   I2C bus:  /dev/i2c-3\n   DRM connector:    card0-DP-1\n";
        let monitors = parse_detect(output);
        assert_eq!(monitors[0].connector.as_deref(), Some("card0-DP-1"));
    }

    #[test]
    fn test_parse_getvcp() {
        let output = "VCP code 0x10 (Brightness                    ): current value =    65, max value =   100\n";
        assert_eq!(parse_getvcp(output).unwrap(), (65, 100));
    }

    #[test]
    fn test_parse_getvcp_garbage() {
        assert!(parse_getvcp("Display not found").is_err());
        assert!(parse_getvcp("current value = 5, max value = 0").is_err());
    }
}
