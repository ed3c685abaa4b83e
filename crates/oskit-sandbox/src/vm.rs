//! Inline execution of native machine code.
//!
//! Nothing here isolates the code it runs: a buffer executed through
//! [`ExecRegion::call`] has full access to the calling process. The
//! [`VmCapability`] token makes every call site opt in through `unsafe`.

use crate::error::SandboxError;
use crate::platform;
use crate::Result;
use std::ptr::NonNull;
use tracing::debug;

/// Permission to run raw machine code inside the current process.
#[derive(Debug, Clone, Copy)]
pub struct VmCapability {
    _private: (),
}

impl VmCapability {
    /// Grant the capability.
    ///
    /// # Safety
    ///
    /// Every buffer later passed to [`Sandbox::exec_code`](crate::Sandbox::exec_code)
    /// with this token must be valid native code for the host, callable as
    /// `extern "C" fn()`, and must return normally.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

/// Executable memory holding one code buffer. Unmapped on drop.
#[derive(Debug)]
pub(crate) struct ExecRegion {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: the mapping is owned by this value and nothing else aliases it, so
// moving it to another thread moves sole access with it.
unsafe impl Send for ExecRegion {}

impl ExecRegion {
    /// Map a writable, executable region and copy `code` into it.
    pub(crate) fn new(code: &[u8]) -> Result<Self> {
        if code.is_empty() {
            return Err(SandboxError::invalid_input("code buffer is empty"));
        }

        let ptr = platform::map_executable(code.len())?;
        // SAFETY: the mapping is at least `code.len()` bytes, writable, and
        // fresh, so it cannot overlap `code`.
        unsafe {
            std::ptr::copy_nonoverlapping(code.as_ptr(), ptr.as_ptr(), code.len());
        }

        debug!("Mapped {} byte executable region at {:p}", code.len(), ptr);
        Ok(Self {
            ptr,
            len: code.len(),
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Call the region as a nullary function.
    ///
    /// # Safety
    ///
    /// The bytes must be a valid `extern "C" fn()` for the host ISA.
    pub(crate) unsafe fn call(&self) {
        let entry: extern "C" fn() = std::mem::transmute(self.ptr.as_ptr());
        entry();
    }
}

impl Drop for ExecRegion {
    fn drop(&mut self) {
        // SAFETY: `ptr`/`len` come from `map_executable` and are dropped once.
        unsafe { platform::unmap_executable(self.ptr, self.len) };
    }
}
