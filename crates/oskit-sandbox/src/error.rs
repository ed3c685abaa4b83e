//! Sandbox error types.

use crate::mode::SandboxMode;
use std::io;
use thiserror::Error;

/// Errors that can occur during sandbox operations.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Rejected argument (empty code buffer, NUL byte in a command).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation not valid for the sandbox's mode.
    #[error("Operation requires {expected} mode, sandbox is {actual}")]
    ModeMismatch {
        expected: SandboxMode,
        actual: SandboxMode,
    },

    /// The handle already tracks a running child.
    #[error("Sandbox already running child {pid}")]
    AlreadyRunning { pid: u32 },

    /// No child is recorded on the handle.
    #[error("Sandbox has no child process")]
    NoChild,

    /// Child process could not be launched.
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    /// Child process could not be terminated.
    #[error("Terminate failed: {0}")]
    TerminateFailed(String),

    /// Executable memory could not be allocated.
    #[error("Allocation failed: {0}")]
    AllocFailed(String),

    /// OS container (job object) could not be created.
    #[error("Sandbox setup failed: {0}")]
    SetupFailed(String),

    /// The handle was destroyed and accepts no more work.
    #[error("Sandbox has been destroyed")]
    Destroyed,

    /// Unsupported platform.
    #[error("Sandbox feature not supported on this platform")]
    UnsupportedPlatform,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] oskit_core::ConfigError),
}

impl SandboxError {
    /// Create a new invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new spawn failed error.
    pub fn spawn_failed(msg: impl Into<String>) -> Self {
        Self::SpawnFailed(msg.into())
    }

    /// Create a new terminate failed error.
    pub fn terminate_failed(msg: impl Into<String>) -> Self {
        Self::TerminateFailed(msg.into())
    }

    /// Create a new allocation failed error.
    pub fn alloc_failed(msg: impl Into<String>) -> Self {
        Self::AllocFailed(msg.into())
    }

    /// Create a new setup failed error.
    pub fn setup_failed(msg: impl Into<String>) -> Self {
        Self::SetupFailed(msg.into())
    }

    /// Whether the error came from rejected caller input rather than the OS.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::ModeMismatch { .. }
                | Self::AlreadyRunning { .. }
                | Self::NoChild
                | Self::Destroyed
        )
    }
}
