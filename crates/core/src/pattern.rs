//! Naming pattern used to recognise auto-generated identifiers

use crate::{Error, Result};
use regex::Regex;

/// Operator supplied regular expression describing the obfuscator's naming scheme.
///
/// Everything in the obfuscated graph whose name matches is considered eligible for
/// translation; everything else is treated as an already clean name.
#[derive(Debug, Clone)]
pub struct NamingPattern {
    regex: Regex,
}

impl NamingPattern {
    /// Compile a naming pattern. Empty or blank patterns are rejected.
    pub fn new(pattern: &str) -> Result<Self> {
        if pattern.trim().is_empty() {
            return Err(Error::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "pattern is empty".to_string(),
            });
        }

        let regex = Regex::new(pattern).map_err(|e| Error::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self { regex })
    }

    /// Returns true when `name` looks auto-generated
    pub fn is_match(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl std::fmt::Display for NamingPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NamingPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
