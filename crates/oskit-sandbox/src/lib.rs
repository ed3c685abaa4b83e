//! Best-effort resource-limited execution.
//!
//! A [`Sandbox`] runs either a shell command in a child process or, with the
//! `vm` feature, a buffer of native machine code inline. Limits are coarse and
//! enforced by the kernel where the platform allows it:
//! - POSIX: `setrlimit` in the child before exec (address space, CPU, files)
//! - Windows: a job object carrying a per-process memory cap
//! - Bare metal / RTOS: no process model; every spawn fails
//!
//! This is a resource limiter, not a security boundary.

pub mod config;
pub mod error;
pub mod limits;
pub mod mode;
pub mod platform;
pub mod sandbox;

#[cfg(feature = "vm")]
pub mod vm;

pub use config::SandboxConfig;
pub use error::SandboxError;
pub use limits::SandboxLimits;
pub use mode::{SandboxMode, SandboxStatus};
pub use platform::{NativeAdapter, NoopAdapter, PlatformAdapter};
pub use sandbox::{status_code, Sandbox, DEFAULT_ID};

#[cfg(feature = "vm")]
pub use vm::VmCapability;

/// Result type for sandbox operations.
pub type Result<T> = std::result::Result<T, SandboxError>;
