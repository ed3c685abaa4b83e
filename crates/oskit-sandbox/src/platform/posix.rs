//! POSIX adapter: `/bin/sh -c` children with rlimits.

use super::PlatformAdapter;
use crate::error::SandboxError;
use crate::limits::SandboxLimits;
use crate::mode::SandboxMode;
use crate::Result;
use nix::errno::Errno;
use nix::sys::resource::{setrlimit, Resource};
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::waitpid;
use nix::unistd::Pid;
use std::convert::Infallible;
use std::os::unix::process::CommandExt;
use std::process::Command;
use tracing::{debug, warn};

/// Shell used to interpret commands.
pub const SHELL: &str = "/bin/sh";

/// Adapter for Linux, macOS, and the BSDs.
///
/// There is no container object: limits are installed with `setrlimit` in the
/// child between fork and exec, so they bound the child and its descendants
/// only. Memory and CPU introspection are not implemented and report 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixAdapter;

impl PlatformAdapter for PosixAdapter {
    type Container = Infallible;

    fn name(&self) -> &'static str {
        "posix"
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
        command: &str,
        limits: &SandboxLimits,
        _container: Option<&Self::Container>,
    ) -> Result<u32> {
        if command.contains('\0') {
            return Err(SandboxError::invalid_input("command contains a NUL byte"));
        }

        let plan = RlimitPlan::from_limits(limits);
        debug!("Spawning `{} -c {}` with {:?}", SHELL, command, plan);

        let mut cmd = Command::new(SHELL);
        cmd.arg("-c").arg(command);

        // SAFETY: the hook only calls setrlimit, which is async-signal-safe,
        // and touches no heap memory.
        unsafe {
            cmd.pre_exec(move || {
                plan.install();
                Ok(())
            });
        }

        let child = cmd.spawn().map_err(|e| {
            SandboxError::spawn_failed(format!("Failed to spawn {}: {}", SHELL, e))
        })?;

        // The OS owns the child from here; the sandbox tracks it by pid.
        Ok(child.id())
    }

    fn terminate(&self, pid: u32) -> Result<()> {
        let target = Pid::from_raw(pid as i32);

        match kill(target, Signal::SIGKILL) {
            Ok(()) => {}
            Err(Errno::ESRCH) => {
                debug!("Child {} already gone", pid);
                return Ok(());
            }
            Err(e) => {
                return Err(SandboxError::terminate_failed(format!(
                    "kill({}, SIGKILL) failed: {}",
                    pid, e
                )));
            }
        }

        // Reap so the pid does not linger as a zombie.
        match waitpid(target, None) {
            Ok(status) => debug!("Child {} reaped: {:?}", pid, status),
            Err(Errno::ECHILD) => debug!("Child {} was reaped elsewhere", pid),
            Err(e) => warn!("waitpid({}) after SIGKILL failed: {}", pid, e),
        }

        Ok(())
    }

    fn memory_usage(&self, _pid: u32) -> u64 {
        0
    }

    fn cpu_time_ms(&self, _pid: u32) -> u64 {
        0
    }
}

/// Rlimits computed before fork so the child does no arithmetic or allocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RlimitPlan {
    address_space: Option<u64>,
    cpu_secs: Option<u64>,
    open_files: Option<u64>,
}

impl RlimitPlan {
    fn from_limits(limits: &SandboxLimits) -> Self {
        let nonzero = |v: u64| (v != 0).then_some(v);
        Self {
            address_space: nonzero(limits.max_memory),
            cpu_secs: limits.cpu_rlimit_secs(),
            open_files: nonzero(limits.max_files),
        }
    }

    /// Install every planned limit, ignoring failures.
    fn install(&self) {
        let pairs = [
            (Resource::RLIMIT_AS, self.address_space),
            (Resource::RLIMIT_CPU, self.cpu_secs),
            (Resource::RLIMIT_NOFILE, self.open_files),
        ];

        for (resource, value) in pairs {
            if let Some(value) = value {
                let value = value as libc::rlim_t;
                let _ = setrlimit(resource, value, value);
            }
        }
    }
}

#[cfg(feature = "vm")]
pub(crate) fn map_executable(len: usize) -> Result<std::ptr::NonNull<u8>> {
    // SAFETY: anonymous private mapping with no address hint; the kernel
    // picks the placement and the result is checked below.
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC,
            libc::MAP_PRIVATE | libc::MAP_ANON,
            -1,
            0,
        )
    };

    if ptr == libc::MAP_FAILED {
        return Err(SandboxError::alloc_failed(format!(
            "mmap of {} executable bytes failed: {}",
            len,
            std::io::Error::last_os_error()
        )));
    }

    std::ptr::NonNull::new(ptr as *mut u8)
        .ok_or_else(|| SandboxError::alloc_failed("mmap returned a null mapping"))
}

/// # Safety
///
/// `ptr`/`len` must come from one successful [`map_executable`] call and must
/// not be used afterwards.
#[cfg(feature = "vm")]
pub(crate) unsafe fn unmap_executable(ptr: std::ptr::NonNull<u8>, len: usize) {
    if libc::munmap(ptr.as_ptr() as *mut libc::c_void, len) != 0 {
        warn!(
            "munmap of {} bytes failed: {}",
            len,
            std::io::Error::last_os_error()
        );
    }
}
