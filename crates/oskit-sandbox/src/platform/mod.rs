//! Platform adapters.
//!
//! Everything that touches the process table, resource limits, or executable
//! memory lives behind [`PlatformAdapter`]. The engine only sees opaque
//! containers and pids. One adapter per target is picked at compile time as
//! [`NativeAdapter`]:
//! - [`posix::PosixAdapter`]: fork/exec through `/bin/sh -c`, rlimits in the child
//! - [`windows::WindowsAdapter`]: `CreateProcessA` into a job object
//! - [`NoopAdapter`]: targets without a process model

use crate::limits::SandboxLimits;
use crate::mode::SandboxMode;
use crate::Result;

mod noop;

#[cfg(unix)]
pub mod posix;

#[cfg(windows)]
pub mod windows;

pub use noop::NoopAdapter;

#[cfg(unix)]
pub use self::posix::PosixAdapter;

#[cfg(windows)]
pub use self::windows::WindowsAdapter;

/// Adapter for the host platform.
#[cfg(unix)]
pub type NativeAdapter = PosixAdapter;

/// Adapter for the host platform.
#[cfg(windows)]
pub type NativeAdapter = WindowsAdapter;

/// Adapter for the host platform.
#[cfg(not(any(unix, windows)))]
pub type NativeAdapter = NoopAdapter;

/// OS operations a sandbox needs.
///
/// Limit installation is best-effort: an adapter logs and continues when the
/// OS refuses a limit, and only fails when the container or child itself
/// cannot be created.
pub trait PlatformAdapter: Send + Sync {
    /// OS object that bounds attached children. Dropping it releases it.
    type Container: Send;

    /// Short adapter name for logs.
    fn name(&self) -> &'static str;

    /// Allocate the container for a new sandbox, if the platform uses one.
    fn create_container(
        &self,
        mode: SandboxMode,
        limits: &SandboxLimits,
    ) -> Result<Option<Self::Container>>;

    /// Launch `command` as a child under `limits`, returning its pid.
    ///
    /// Returns once the child exists; never waits for it to exit.
    fn spawn(
        &self,
        command: &str,
        limits: &SandboxLimits,
        container: Option<&Self::Container>,
    ) -> Result<u32>;

    /// Forcibly terminate the child `pid`.
    fn terminate(&self, pid: u32) -> Result<()>;

    /// Resident memory of `pid` in bytes, 0 when unknown.
    fn memory_usage(&self, pid: u32) -> u64;

    /// CPU time (kernel + user) of `pid` in milliseconds, 0 when unknown.
    fn cpu_time_ms(&self, pid: u32) -> u64;
}

#[cfg(all(feature = "vm", unix))]
pub(crate) use self::posix::{map_executable, unmap_executable};

#[cfg(all(feature = "vm", windows))]
pub(crate) use self::windows::{map_executable, unmap_executable};

#[cfg(all(feature = "vm", not(any(unix, windows))))]
pub(crate) use self::noop::{map_executable, unmap_executable};
