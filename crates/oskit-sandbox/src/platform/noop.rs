//! Adapter for targets without processes (bare metal, RTOS).

use super::PlatformAdapter;
use crate::error::SandboxError;
use crate::limits::SandboxLimits;
use crate::mode::SandboxMode;
use crate::Result;
use std::convert::Infallible;

/// Adapter that owns nothing and cannot launch children.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAdapter;

impl PlatformAdapter for NoopAdapter {
    type Container = Infallible;

    fn name(&self) -> &'static str {
        "noop"
    }

    fn create_container(
        &self,
        _mode: SandboxMode,
        _limits: &SandboxLimits,
    ) -> Result<Option<Self::Container>> {
        Ok(None)
    }

    fn spawn(
        &self,
        _command: &str,
        _limits: &SandboxLimits,
        _container: Option<&Self::Container>,
    ) -> Result<u32> {
        Err(SandboxError::UnsupportedPlatform)
    }

    fn terminate(&self, _pid: u32) -> Result<()> {
        Err(SandboxError::UnsupportedPlatform)
    }

    fn memory_usage(&self, _pid: u32) -> u64 {
        0
    }

    fn cpu_time_ms(&self, _pid: u32) -> u64 {
        0
    }
}

#[cfg(all(feature = "vm", not(any(unix, windows))))]
pub(crate) fn map_executable(_len: usize) -> Result<std::ptr::NonNull<u8>> {
    Err(SandboxError::UnsupportedPlatform)
}

#[cfg(all(feature = "vm", not(any(unix, windows))))]
pub(crate) unsafe fn unmap_executable(_ptr: std::ptr::NonNull<u8>, _len: usize) {}
