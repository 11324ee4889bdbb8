//! Error types for remapper

use thiserror::Error;

/// Main error type shared by every remapper crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid naming pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("The application provided as unobfuscated has obfuscation detected ({0})")]
    ObfuscatedReference(String),

    #[error("Cross compiler deobfuscation is not supported: obfuscated {obfuscated}, clean {clean}")]
    CrossCompiler { obfuscated: String, clean: String },

    #[error("Nothing was deobfuscated")]
    NothingTranslated,
}

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error was raised before any matching work began
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidPattern { .. } | Self::Config(_) | Self::ObfuscatedReference(_)
        )
    }
}
