//! Resource limits for sandboxed work.
//!
//! Every limit is optional: 0 means unbounded and the limit is not installed.

use serde::{Deserialize, Serialize};

/// Resource limits for a sandbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxLimits {
    /// Address-space cap in bytes.
    #[serde(default)]
    pub max_memory: u64,

    /// CPU time cap in milliseconds.
    #[serde(default)]
    pub max_cpu_time: u64,

    /// Maximum number of open file descriptors.
    #[serde(default)]
    pub max_files: u64,
}

impl SandboxLimits {
    /// Create unbounded limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create minimal (restrictive) limits.
    pub fn minimal() -> Self {
        Self {
            max_memory: 64 * 1024 * 1024, // 64 MB
            max_cpu_time: 10_000,         // 10 s
            max_files: 32,
        }
    }

    /// Create relaxed limits for trusted work.
    pub fn relaxed() -> Self {
        Self {
            max_memory: 2 * 1024 * 1024 * 1024, // 2 GB
            max_cpu_time: 600_000,              // 10 minutes
            max_files: 1024,
        }
    }

    /// Builder-style method to set the memory cap.
    pub fn with_memory(mut self, bytes: u64) -> Self {
        self.max_memory = bytes;
        self
    }

    /// Builder-style method to set the CPU time cap.
    pub fn with_cpu_time(mut self, millis: u64) -> Self {
        self.max_cpu_time = millis;
        self
    }

    /// Builder-style method to set the open file cap.
    pub fn with_files(mut self, count: u64) -> Self {
        self.max_files = count;
        self
    }

    /// True when no limit is set.
    pub fn is_unbounded(&self) -> bool {
        self.max_memory == 0 && self.max_cpu_time == 0 && self.max_files == 0
    }

    /// `RLIMIT_CPU` value in whole seconds: `ceil(ms / 1000) + 1`.
    pub fn cpu_rlimit_secs(&self) -> Option<u64> {
        match self.max_cpu_time {
            0 => None,
            ms => Some(ms.div_ceil(1000) + 1),
        }
    }
}
