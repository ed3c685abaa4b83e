//! Sandbox modes and lifecycle status.

use crate::error::SandboxError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a sandbox runs work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxMode {
    /// Spawn a child process.
    #[default]
    Process,

    /// Spawn a child process under the configured limits.
    Restricted,

    /// Run a native code buffer inline in the current process.
    Vm,
}

impl SandboxMode {
    /// Modes that launch a child process and may own an OS container.
    pub fn spawns_child(self) -> bool {
        matches!(self, Self::Process | Self::Restricted)
    }
}

impl fmt::Display for SandboxMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Process => "process",
            Self::Restricted => "restricted",
            Self::Vm => "vm",
        };
        f.write_str(s)
    }
}

impl FromStr for SandboxMode {
    type Err = SandboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "process" => Ok(Self::Process),
            "restricted" => Ok(Self::Restricted),
            "vm" => Ok(Self::Vm),
            other => Err(SandboxError::invalid_input(format!(
                "unknown sandbox mode '{}'",
                other
            ))),
        }
    }
}

/// Lifecycle status of a sandbox handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum SandboxStatus {
    #[default]
    Idle = 0,
    Running = 1,
}

impl SandboxStatus {
    /// Numeric status code: 0 idle, 1 running.
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_running(self) -> bool {
        self == Self::Running
    }
}

impl fmt::Display for SandboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Running => f.write_str("running"),
        }
    }
}
