//! Core types and configuration for remapper
//!
//! This crate provides the error type, run configuration, naming pattern, progress events
//! and the reflection models shared by the matching engine and the command line host.

pub mod config;
pub mod error;
pub mod events;
pub mod pattern;
pub mod types;

pub use config::{Backend, Config, ExportConfig, ExportKind};
pub use error::{Error, Result};
pub use events::{EventBus, GraphRole, LookupEvent};
pub use pattern::NamingPattern;
pub use types::*;
