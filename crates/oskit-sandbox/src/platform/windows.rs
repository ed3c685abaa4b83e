//! Windows adapter: children launched into a job object.

use super::PlatformAdapter;
use crate::error::SandboxError;
use crate::limits::SandboxLimits;
use crate::mode::SandboxMode;
use crate::Result;
use std::ffi::CString;
use std::io;
use std::mem;
use std::ptr;
use tracing::{debug, warn};
use windows_sys::Win32::Foundation::{
    CloseHandle, ERROR_INVALID_PARAMETER, FILETIME, HANDLE, STILL_ACTIVE,
};
use windows_sys::Win32::System::JobObjects::{
    AssignProcessToJobObject, CreateJobObjectA, JobObjectExtendedLimitInformation,
    SetInformationJobObject, JOBOBJECT_EXTENDED_LIMIT_INFORMATION,
    JOB_OBJECT_LIMIT_PROCESS_MEMORY, JOB_OBJECT_LIMIT_PROCESS_TIME,
};
use windows_sys::Win32::System::ProcessStatus::{
    K32GetProcessMemoryInfo, PROCESS_MEMORY_COUNTERS,
};
use windows_sys::Win32::System::Threading::{
    CreateProcessA, GetExitCodeProcess, GetProcessTimes, OpenProcess, ResumeThread,
    TerminateProcess, CREATE_SUSPENDED, PROCESS_INFORMATION, PROCESS_QUERY_LIMITED_INFORMATION,
    PROCESS_TERMINATE, PROCESS_VM_READ, STARTUPINFOA,
};

/// Exit code given to children terminated by [`WindowsAdapter::terminate`].
const KILLED_EXIT_CODE: u32 = 1;

/// 100-ns FILETIME ticks per millisecond.
const TICKS_PER_MS: u64 = 10_000;

/// Adapter for Windows.
///
/// Process and restricted sandboxes own an anonymous job object. Limits that
/// the job object expresses (per-process memory and user time) are installed
/// on it; the open file cap has no Windows counterpart and is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsAdapter;

/// Owned job object handle, closed on drop.
#[derive(Debug)]
pub struct JobObject(HANDLE);

impl JobObject {
    fn create() -> Result<Self> {
        // SAFETY: null attributes and name create an anonymous job object.
        let handle = unsafe { CreateJobObjectA(ptr::null(), ptr::null()) };
        if handle == 0 {
            return Err(SandboxError::setup_failed(format!(
                "CreateJobObjectA failed: {}",
                io::Error::last_os_error()
            )));
        }
        Ok(Self(handle))
    }

    fn apply_limits(&self, limits: &SandboxLimits) {
        // SAFETY: plain-data struct; all-zero is "no limits".
        let mut info: JOBOBJECT_EXTENDED_LIMIT_INFORMATION = unsafe { mem::zeroed() };

        if limits.max_memory != 0 {
            info.BasicLimitInformation.LimitFlags |= JOB_OBJECT_LIMIT_PROCESS_MEMORY;
            info.ProcessMemoryLimit = usize::try_from(limits.max_memory).unwrap_or(usize::MAX);
        }
        if limits.max_cpu_time != 0 {
            info.BasicLimitInformation.LimitFlags |= JOB_OBJECT_LIMIT_PROCESS_TIME;
            info.BasicLimitInformation.PerProcessUserTimeLimit =
                i64::try_from(limits.max_cpu_time.saturating_mul(TICKS_PER_MS))
                    .unwrap_or(i64::MAX);
        }
        if info.BasicLimitInformation.LimitFlags == 0 {
            return;
        }

        // SAFETY: `info` outlives the call and the length matches its type.
        let ok = unsafe {
            SetInformationJobObject(
                self.0,
                JobObjectExtendedLimitInformation,
                &info as *const _ as *const _,
                mem::size_of::<JOBOBJECT_EXTENDED_LIMIT_INFORMATION>() as u32,
            )
        };
        if ok == 0 {
            warn!(
                "Failed to set job object limits: {}",
                io::Error::last_os_error()
            );
        }
    }

    fn assign(&self, process: HANDLE) {
        // SAFETY: both handles are open for the duration of the call.
        if unsafe { AssignProcessToJobObject(self.0, process) } == 0 {
            warn!(
                "Child not placed in job object, limits will not apply: {}",
                io::Error::last_os_error()
            );
        }
    }
}

impl Drop for JobObject {
    fn drop(&mut self) {
        // SAFETY: the handle is owned and closed exactly once.
        unsafe {
            CloseHandle(self.0);
        }
    }
}

/// Process handle opened by pid, closed on drop.
struct OwnedProcess(HANDLE);

impl OwnedProcess {
    fn open(pid: u32, access: u32) -> Option<Self> {
        // SAFETY: OpenProcess has no pointer arguments.
        let handle = unsafe { OpenProcess(access, 0, pid) };
        (handle != 0).then_some(Self(handle))
    }

    /// Whether the process has not exited yet.
    fn is_alive(&self) -> bool {
        let mut code = 0u32;
        // SAFETY: handle is open and `code` is a live out-parameter.
        let ok = unsafe { GetExitCodeProcess(self.0, &mut code) };
        ok != 0 && code == STILL_ACTIVE as u32
    }
}

impl Drop for OwnedProcess {
    fn drop(&mut self) {
        // SAFETY: the handle is owned and closed exactly once.
        unsafe {
            CloseHandle(self.0);
        }
    }
}

fn filetime_ticks(ft: &FILETIME) -> u64 {
    (u64::from(ft.dwHighDateTime) << 32) | u64::from(ft.dwLowDateTime)
}

impl PlatformAdapter for WindowsAdapter {
    type Container = JobObject;

    fn name(&self) -> &'static str {
        "windows"
    }

    fn create_container(
        &self,
        mode: SandboxMode,
        limits: &SandboxLimits,
    ) -> Result<Option<Self::Container>> {
        if !mode.spawns_child() {
            return Ok(None);
        }

        let job = JobObject::create()?;
        job.apply_limits(limits);
        debug!("Created job object for {} sandbox", mode);
        Ok(Some(job))
    }

    fn spawn(
        &self,
        command: &str,
        _limits: &SandboxLimits,
        container: Option<&Self::Container>,
    ) -> Result<u32> {
        // CreateProcessA may write into the command line buffer.
        let mut cmdline = CString::new(command)
            .map_err(|_| SandboxError::invalid_input("command contains a NUL byte"))?
            .into_bytes_with_nul();

        // SAFETY: plain-data structs; zero is valid for both.
        let mut startup: STARTUPINFOA = unsafe { mem::zeroed() };
        startup.cb = mem::size_of::<STARTUPINFOA>() as u32;
        let mut info: PROCESS_INFORMATION = unsafe { mem::zeroed() };

        // SAFETY: every pointer argument is either null or points at a live,
        // correctly sized local.
        let ok = unsafe {
            CreateProcessA(
                ptr::null(),
                cmdline.as_mut_ptr(),
                ptr::null(),
                ptr::null(),
                0,
                CREATE_SUSPENDED,
                ptr::null(),
                ptr::null(),
                &startup,
                &mut info,
            )
        };
        if ok == 0 {
            return Err(SandboxError::spawn_failed(format!(
                "CreateProcessA(`{}`) failed: {}",
                command,
                io::Error::last_os_error()
            )));
        }

        // Assign while suspended so the child never runs outside the job.
        if let Some(job) = container {
            job.assign(info.hProcess);
        }

        // SAFETY: handles returned by CreateProcessA are owned here.
        unsafe {
            ResumeThread(info.hThread);
            CloseHandle(info.hThread);
            CloseHandle(info.hProcess);
        }

        debug!("Spawned `{}` as pid {}", command, info.dwProcessId);
        Ok(info.dwProcessId)
    }

    fn terminate(&self, pid: u32) -> Result<()> {
        let access = PROCESS_TERMINATE | PROCESS_QUERY_LIMITED_INFORMATION;
        let Some(process) = OwnedProcess::open(pid, access) else {
            let err = io::Error::last_os_error();
            // The pid no longer names a process.
            if err.raw_os_error() == Some(ERROR_INVALID_PARAMETER as i32) {
                debug!("Child {} already gone", pid);
                return Ok(());
            }
            return Err(SandboxError::terminate_failed(format!(
                "OpenProcess({}) failed: {}",
                pid, err
            )));
        };

        if !process.is_alive() {
            debug!("Child {} already exited", pid);
            return Ok(());
        }

        // SAFETY: handle opened with PROCESS_TERMINATE.
        if unsafe { TerminateProcess(process.0, KILLED_EXIT_CODE) } == 0 {
            return Err(SandboxError::terminate_failed(format!(
                "TerminateProcess({}) failed: {}",
                pid,
                io::Error::last_os_error()
            )));
        }
        Ok(())
    }

    fn memory_usage(&self, pid: u32) -> u64 {
        let Some(process) =
            OwnedProcess::open(pid, PROCESS_QUERY_LIMITED_INFORMATION | PROCESS_VM_READ)
        else {
            return 0;
        };

        // SAFETY: plain-data struct sized by `cb`.
        let cb = mem::size_of::<PROCESS_MEMORY_COUNTERS>() as u32;
        let mut counters: PROCESS_MEMORY_COUNTERS = unsafe { mem::zeroed() };
        counters.cb = cb;
        let ok = unsafe { K32GetProcessMemoryInfo(process.0, &mut counters, cb) };
        if ok == 0 {
            return 0;
        }
        counters.WorkingSetSize as u64
    }

    fn cpu_time_ms(&self, pid: u32) -> u64 {
        let Some(process) = OwnedProcess::open(pid, PROCESS_QUERY_LIMITED_INFORMATION) else {
            return 0;
        };

        // SAFETY: plain-data structs written by GetProcessTimes.
        let mut created: FILETIME = unsafe { mem::zeroed() };
        let mut exited: FILETIME = unsafe { mem::zeroed() };
        let mut kernel: FILETIME = unsafe { mem::zeroed() };
        let mut user: FILETIME = unsafe { mem::zeroed() };
        let ok = unsafe {
            GetProcessTimes(process.0, &mut created, &mut exited, &mut kernel, &mut user)
        };
        if ok == 0 {
            return 0;
        }
        (filetime_ticks(&kernel) + filetime_ticks(&user)) / TICKS_PER_MS
    }
}

#[cfg(feature = "vm")]
pub(crate) fn map_executable(len: usize) -> Result<ptr::NonNull<u8>> {
    use windows_sys::Win32::System::Memory::{
        VirtualAlloc, MEM_COMMIT, MEM_RESERVE, PAGE_EXECUTE_READWRITE,
    };

    // SAFETY: no address hint; the result is checked below.
    let p = unsafe {
        VirtualAlloc(
            ptr::null(),
            len,
            MEM_COMMIT | MEM_RESERVE,
            PAGE_EXECUTE_READWRITE,
        )
    };
    ptr::NonNull::new(p as *mut u8).ok_or_else(|| {
        SandboxError::alloc_failed(format!(
            "VirtualAlloc of {} executable bytes failed: {}",
            len,
            io::Error::last_os_error()
        ))
    })
}

/// # Safety
///
/// `ptr` must come from one successful [`map_executable`] call and must not be
/// used afterwards.
#[cfg(feature = "vm")]
pub(crate) unsafe fn unmap_executable(ptr: ptr::NonNull<u8>, _len: usize) {
    use windows_sys::Win32::System::Memory::{VirtualFree, MEM_RELEASE};

    if VirtualFree(ptr.as_ptr() as *mut _, 0, MEM_RELEASE) == 0 {
        warn!("VirtualFree failed: {}", io::Error::last_os_error());
    }
}
