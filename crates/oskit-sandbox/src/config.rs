//! Sandbox configuration files.
//!
//! Files are JSON5; saving writes plain pretty JSON, which JSON5 accepts.
//!
//! ```json5
//! {
//!   id: "build",
//!   mode: "restricted",
//!   limits: { max_memory: 268435456, max_cpu_time: 30000 },
//! }
//! ```

use crate::limits::SandboxLimits;
use crate::mode::SandboxMode;
use crate::sandbox::DEFAULT_ID;
use oskit_core::{env, ConfigError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Longest accepted sandbox id, in bytes.
pub const MAX_ID_LEN: usize = 63;

/// Environment variable overriding [`SandboxConfig::id`].
pub const ENV_ID: &str = "OSKIT_SANDBOX_ID";
/// Environment variable overriding [`SandboxConfig::mode`].
pub const ENV_MODE: &str = "OSKIT_SANDBOX_MODE";
/// Environment variable overriding the memory cap (bytes).
pub const ENV_MAX_MEMORY: &str = "OSKIT_SANDBOX_MAX_MEMORY";
/// Environment variable overriding the CPU time cap (milliseconds).
pub const ENV_MAX_CPU_TIME: &str = "OSKIT_SANDBOX_MAX_CPU_TIME";
/// Environment variable overriding the open file cap.
pub const ENV_MAX_FILES: &str = "OSKIT_SANDBOX_MAX_FILES";

/// Everything needed to build a [`Sandbox`](crate::Sandbox).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Label used in logs.
    #[serde(default = "default_id")]
    pub id: String,

    #[serde(default)]
    pub mode: SandboxMode,

    #[serde(default)]
    pub limits: SandboxLimits,
}

fn default_id() -> String {
    DEFAULT_ID.to_string()
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            id: default_id(),
            mode: SandboxMode::default(),
            limits: SandboxLimits::default(),
        }
    }
}

impl SandboxConfig {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::Json5(e.to_string()))
    }

    /// Save configuration to a file path.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Apply `OSKIT_SANDBOX_*` environment overrides.
    ///
    /// Unset, empty, or unparseable variables leave the field alone.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(id) = env::get_var(ENV_ID) {
            self.id = id;
        }

        if let Some(mode) = env::get_var(ENV_MODE) {
            match mode.parse() {
                Ok(mode) => self.mode = mode,
                Err(e) => warn!("Ignoring {}: {}", ENV_MODE, e),
            }
        }

        if let Some(bytes) = env::get_u64(ENV_MAX_MEMORY) {
            self.limits.max_memory = bytes;
        }
        if let Some(ms) = env::get_u64(ENV_MAX_CPU_TIME) {
            self.limits.max_cpu_time = ms;
        }
        if let Some(count) = env::get_u64(ENV_MAX_FILES) {
            self.limits.max_files = count;
        }

        self
    }

    /// Validate the configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.id.is_empty() {
            errors.push("Sandbox id cannot be empty".to_string());
        }
        if self.id.len() > MAX_ID_LEN {
            errors.push(format!(
                "Sandbox id is {} bytes, maximum is {}",
                self.id.len(),
                MAX_ID_LEN
            ));
        }

        if self.mode == SandboxMode::Restricted && self.limits.is_unbounded() {
            errors.push("Restricted mode requires at least one limit".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }
}
