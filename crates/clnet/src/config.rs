//! Configuration for context selection and program builds.
//!
//! Loads [`ClnetConfig`] from a TOML file with environment variable overrides
//! via `CLNET_*` prefixed variables.

use std::path::Path;

use clnet_sys::DeviceType;
use serde::{Deserialize, Serialize};

/// Device class a context is created over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Default,
    Cpu,
    Gpu,
    Accelerator,
    All,
}

impl DeviceClass {
    pub const fn device_type(self) -> DeviceType {
        match self {
            Self::Default => DeviceType::DEFAULT,
            Self::Cpu => DeviceType::CPU,
            Self::Gpu => DeviceType::GPU,
            Self::Accelerator => DeviceType::ACCELERATOR,
            Self::All => DeviceType::ALL,
        }
    }
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Cpu => write!(f, "cpu"),
            Self::Gpu => write!(f, "gpu"),
            Self::Accelerator => write!(f, "accelerator"),
            Self::All => write!(f, "all"),
        }
    }
}

impl std::str::FromStr for DeviceClass {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "cpu" => Ok(Self::Cpu),
            "gpu" => Ok(Self::Gpu),
            "accelerator" => Ok(Self::Accelerator),
            "all" => Ok(Self::All),
            other => Err(format!("unknown device type: {other}")),
        }
    }
}

/// Configuration loaded from TOML with environment variable overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClnetConfig {
    /// Zero-based index into the enumerated platforms.
    /// Override: `CLNET_PLATFORM_INDEX`
    pub platform_index: usize,

    /// Device class used by `Context::from_config`.
    /// Override: `CLNET_DEVICE_TYPE`
    pub device_type: DeviceClass,

    /// Options passed verbatim to the compiler. Absent means no options at
    /// all, which is distinct from an empty string.
    /// Override: `CLNET_BUILD_OPTIONS`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_options: Option<String>,

    /// Emit a warning with every device's log when a build fails.
    /// Override: `CLNET_LOG_BUILD_FAILURES`
    pub log_build_failures: bool,
}

impl Default for ClnetConfig {
    fn default() -> Self {
        Self {
            platform_index: 0,
            device_type: DeviceClass::All,
            build_options: None,
            log_build_failures: true,
        }
    }
}

/// Errors that can occur when loading or validating a [`ClnetConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invalid environment override {key}={value}: {reason}")]
    EnvOverride { key: String, value: String, reason: String },
}

impl ClnetConfig {
    /// Generate a default configuration TOML string.
    pub fn default_toml() -> String {
        // Plain fields always serialize.
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields, then apply environment variable overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut cfg: ClnetConfig = toml::from_str(toml_str)?;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load only from environment variables, starting from defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(options) = &self.build_options {
            if options.contains('\0') {
                return Err(ConfigError::Validation(
                    "build_options must not contain NUL bytes".into(),
                ));
            }
        }
        Ok(())
    }

    /// Apply `CLNET_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("CLNET_PLATFORM_INDEX") {
            self.platform_index = val.parse::<usize>().map_err(|e| ConfigError::EnvOverride {
                key: "CLNET_PLATFORM_INDEX".into(),
                value: val.clone(),
                reason: e.to_string(),
            })?;
        }

        if let Ok(val) = std::env::var("CLNET_DEVICE_TYPE") {
            self.device_type =
                val.parse::<DeviceClass>().map_err(|reason| ConfigError::EnvOverride {
                    key: "CLNET_DEVICE_TYPE".into(),
                    value: val.clone(),
                    reason,
                })?;
        }

        if let Ok(val) = std::env::var("CLNET_BUILD_OPTIONS") {
            self.build_options = Some(val);
        }

        if let Ok(val) = std::env::var("CLNET_LOG_BUILD_FAILURES") {
            self.log_build_failures = match val.to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::EnvOverride {
                        key: "CLNET_LOG_BUILD_FAILURES".into(),
                        value: val,
                        reason: "expected a boolean".into(),
                    });
                }
            };
        }

        Ok(())
    }
}
