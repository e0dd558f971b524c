use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::lifecycle::daemon::{
    DEFAULT_DESCRIPTOR_CEILING, DEFAULT_NULL_DEVICE, DEFAULT_UMASK, DEFAULT_WORKING_DIRECTORY,
};

// ─── Config ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    // Logging
    pub log_level: String,
    pub logging_to_file: bool,
    pub log_dir: Option<String>,

    // Daemonization
    pub daemon: DaemonConfig,

    // Placeholder workload run by the host binary
    pub work: WorkConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            logging_to_file: false,
            log_dir: None,
            daemon: DaemonConfig::default(),
            work: WorkConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a YAML file and validate.
    pub fn load(path: &str) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml_ng::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config, falling back to defaults (with a warning) when the file is
    /// missing or invalid.
    pub fn load_or_default(path: &str) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config from '{path}': {e}, using defaults");
            Config::default()
        })
    }

    /// Validate configuration.
    fn validate(&self) -> Result<(), anyhow::Error> {
        self.daemon.validate()
    }
}

// ─── Sub-configs ───────────────────────────────────────────────────────────

/// Settings consumed by [`Daemonizer`](crate::Daemonizer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DaemonConfig {
    /// File creation mask. Written in YAML as an octal string (`"077"`,
    /// `"0o077"`) or as a plain integer, which is taken literally.
    #[serde(with = "octal")]
    pub umask: u32,
    pub working_directory: PathBuf,
    /// Close terminal descriptors and redirect stdio to the null device.
    pub close_descriptors: bool,
    /// Descriptors scanned when the hard limit is unlimited.
    pub descriptor_ceiling: u64,
    pub null_device: PathBuf,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            umask: DEFAULT_UMASK,
            working_directory: PathBuf::from(DEFAULT_WORKING_DIRECTORY),
            close_descriptors: true,
            descriptor_ceiling: DEFAULT_DESCRIPTOR_CEILING,
            null_device: PathBuf::from(DEFAULT_NULL_DEVICE),
        }
    }
}

impl DaemonConfig {
    fn validate(&self) -> Result<(), anyhow::Error> {
        anyhow::ensure!(
            self.umask <= 0o777,
            "daemon umask {:o} is out of range (max 777)",
            self.umask
        );
        ensure_absolute("daemon working-directory", &self.working_directory)?;
        ensure_absolute("daemon null-device", &self.null_device)?;
        anyhow::ensure!(
            self.descriptor_ceiling > 0,
            "daemon descriptor-ceiling must be positive"
        );
        Ok(())
    }
}

fn ensure_absolute(what: &str, path: &Path) -> Result<(), anyhow::Error> {
    anyhow::ensure!(
        path.is_absolute(),
        "{what} must be an absolute path, got '{}'",
        path.display()
    );
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct WorkConfig {
    pub duration_secs: u64,
}

impl Default for WorkConfig {
    fn default() -> Self {
        Self { duration_secs: 10 }
    }
}

/// Umask values as octal strings.
mod octal {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u32),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{value:03o}"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Int(value) => Ok(value),
            Raw::Text(text) => parse(&text).map_err(serde::de::Error::custom),
        }
    }

    pub(super) fn parse(text: &str) -> Result<u32, String> {
        let digits = text.trim();
        let digits = digits
            .strip_prefix("0o")
            .or_else(|| digits.strip_prefix("0O"))
            .unwrap_or(digits);
        u32::from_str_radix(digits, 8).map_err(|e| format!("invalid octal umask '{text}': {e}"))
    }
}
