//! Transcoder supervisor
//!
//! Owns the lifecycle of external encoder child processes and keeps the
//! in-memory process table consistent with declarative channel state.

pub mod command;
pub mod monitor;
pub mod process;

pub use command::EncoderSettings;
pub use process::{LiveProcess, ProcessManager, SettingsProvider, StatusWriter};
