//! # brightsync library
//!
//! Internal library for the brightsync binary.
//!
//! This library exists to enable testing of the synchronization engine and
//! to keep CLI dispatch (main.rs) separate from application logic.
//!
//! ## Architecture
//!
//! - **Entry Point**: `Brightsync` acquires resources and starts the daemon
//! - **Core Logic**: `core` holds the brightness curve, the sync engine, the
//!   rollback window and the event loop
//! - **Platform**: `platform` abstracts display enumeration and brightness
//!   I/O (sysfs backlight, DDC/CI, EDID)
//! - **Configuration**: `config` for TOML-based settings with hot-reload
//! - **Commands**: `commands` for CLI subcommands (status, pause, offset, ...)
//! - **State**: persisted offsets and the IPC socket
//! - **Infrastructure**: signal handling, logind monitoring, instance lock,
//!   logging

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod logger;

pub mod args;
pub mod commands;
pub mod common;
pub mod config;
pub mod core;
pub mod io;
pub mod platform;
pub mod state;

mod brightsync;

pub use brightsync::Brightsync;
