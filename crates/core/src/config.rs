//! Run configuration

use crate::pattern::NamingPattern;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Namespace that only exists in builds processed by the obfuscator
pub const DEFAULT_OBFUSCATION_MARKER: &str = "Beebyte.Obfuscator";

/// Deobfuscation run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Regex for the obfuscator's naming scheme
    pub naming_pattern: String,
    /// Scripting backend of the clean reference build
    pub backend: Backend,
    /// Reflection model of the obfuscated application
    pub obfuscated_model: PathBuf,
    /// Reflection model (IL2CPP) or decompiled assembly (Mono) of the clean application
    pub clean_model: PathBuf,
    /// Where to write the renamed obfuscated model, if anywhere
    pub renamed_output: Option<PathBuf>,
    /// Namespace prefixes never considered for matching
    pub excluded_namespaces: Vec<String>,
    /// Namespace whose presence marks a build as obfuscated
    pub obfuscation_marker: String,
    /// Export settings
    pub export: ExportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            naming_pattern: String::new(),
            backend: Backend::Il2Cpp,
            obfuscated_model: PathBuf::new(),
            clean_model: PathBuf::new(),
            renamed_output: None,
            excluded_namespaces: default_excluded_namespaces(),
            obfuscation_marker: DEFAULT_OBFUSCATION_MARKER.to_string(),
            export: ExportConfig::default(),
        }
    }
}

fn default_excluded_namespaces() -> Vec<String> {
    ["System", "UnityEngine", "Mono", "Microsoft"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Scripting backend of the clean reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Il2Cpp,
    Mono,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Il2Cpp => write!(f, "Il2Cpp"),
            Backend::Mono => write!(f, "Mono"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "il2cpp" => Ok(Backend::Il2Cpp),
            "mono" => Ok(Backend::Mono),
            other => Err(Error::config(format!("unknown backend {other:?}"))),
        }
    }
}

/// Output format for the translation ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    None,
    PlainText,
    Json,
    Classes,
}

impl std::str::FromStr for ExportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(ExportKind::None),
            "plain" | "plaintext" | "text" => Ok(ExportKind::PlainText),
            "json" => Ok(ExportKind::Json),
            "classes" => Ok(ExportKind::Classes),
            other => Err(Error::config(format!("unknown export kind {other:?}"))),
        }
    }
}

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub kind: ExportKind,
    /// Export folder, required unless `kind` is `None`
    pub directory: Option<PathBuf>,
    /// Plugin name written into generated class stubs
    pub plugin_name: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            kind: ExportKind::None,
            directory: None,
            plugin_name: "YourPlugin".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| Error::parse(e.to_string()))
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| Error::parse(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Compile the configured naming pattern
    pub fn naming_pattern(&self) -> Result<NamingPattern> {
        NamingPattern::new(&self.naming_pattern)
    }

    /// Check everything that can be checked before any matching work begins
    pub fn validate(&self) -> Result<()> {
        self.naming_pattern()?;

        require_file(&self.obfuscated_model, "obfuscated model")?;
        require_file(&self.clean_model, "clean model")?;

        if self.obfuscation_marker.trim().is_empty() {
            return Err(Error::config("obfuscation marker must not be empty"));
        }

        if self.export.kind != ExportKind::None {
            match &self.export.directory {
                Some(dir) if dir.is_dir() => {}
                Some(dir) => {
                    return Err(Error::config(format!(
                        "export directory {} does not exist",
                        dir.display()
                    )))
                }
                None => return Err(Error::config("export directory is required")),
            }
        }

        if self.export.kind == ExportKind::Classes && self.export.plugin_name.trim().is_empty() {
            return Err(Error::config("plugin name is required for class export"));
        }

        Ok(())
    }

    /// Whether `namespace` belongs to the runtime or engine and is never matched
    pub fn is_excluded_namespace(&self, namespace: &str) -> bool {
        is_excluded_namespace(&self.excluded_namespaces, namespace)
    }
}

/// Prefix test shared by the config and the graph builder
pub fn is_excluded_namespace(prefixes: &[String], namespace: &str) -> bool {
    prefixes.iter().any(|prefix| {
        namespace == prefix
            || namespace
                .strip_prefix(prefix.as_str())
                .map(|rest| rest.starts_with('.'))
                .unwrap_or(false)
    })
}

fn require_file(path: &Path, what: &str) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(Error::config(format!("{what} path is required")));
    }
    if !path.is_file() {
        return Err(Error::config(format!(
            "{what} file {} does not exist",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_models(dir: &Path) -> Config {
        let obf = dir.join("obfuscated.json");
        let clean = dir.join("clean.json");
        std::fs::write(&obf, "{}").unwrap();
        std::fs::write(&clean, "{}").unwrap();

        Config {
            naming_pattern: r"^[A-Z]{11}$".to_string(),
            obfuscated_model: obf,
            clean_model: clean,
            ..Config::default()
        }
    }

    #[test]
    fn test_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_models(dir.path());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_models(dir.path());
        config.naming_pattern = "[unclosed".to_string();
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_missing_model_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_models(dir.path());
        config.clean_model = dir.path().join("missing.json");
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_export_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_models(dir.path());
        config.export.kind = ExportKind::PlainText;
        assert!(config.validate().is_err());

        config.export.directory = Some(dir.path().to_path_buf());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mono_accepts_any_model_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_models(dir.path());
        config.backend = Backend::Mono;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = config_with_models(dir.path());
        config.backend = Backend::Mono;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.backend, Backend::Mono);
        assert_eq!(loaded.naming_pattern, config.naming_pattern);
    }

    #[test]
    fn test_excluded_namespace_prefixes() {
        let config = Config::default();
        assert!(config.is_excluded_namespace("System"));
        assert!(config.is_excluded_namespace("System.Collections.Generic"));
        assert!(config.is_excluded_namespace("UnityEngine.UI"));
        assert!(!config.is_excluded_namespace("SystemsCore"));
        assert!(!config.is_excluded_namespace("Game.Player"));
        assert!(!config.is_excluded_namespace(""));
    }
}
