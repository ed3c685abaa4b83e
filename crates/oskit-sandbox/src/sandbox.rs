//! Sandbox handle and lifecycle.
//!
//! ```text
//!          exec / exec_code          stop / destroy
//!   IDLE ────────────────────▶ RUNNING ─────────────▶ IDLE
//! ```

use crate::config::SandboxConfig;
use crate::error::SandboxError;
use crate::limits::SandboxLimits;
use crate::mode::{SandboxMode, SandboxStatus};
use crate::platform::{NativeAdapter, PlatformAdapter};
use crate::Result;
use parking_lot::Mutex;
use tracing::{debug, warn};

#[cfg(feature = "vm")]
use crate::vm::{ExecRegion, VmCapability};

/// Label given to sandboxes that are not named explicitly.
pub const DEFAULT_ID: &str = "sandbox";

/// Mutable part of a handle.
struct State<C> {
    status: SandboxStatus,
    pid: u32,
    container: Option<C>,
    #[cfg(feature = "vm")]
    region: Option<ExecRegion>,
    destroyed: bool,
}

/// A resource-limited execution context.
///
/// The handle owns its OS container (job object on Windows) and, in VM mode,
/// its executable region. A spawned child belongs to the OS and is tracked by
/// pid only: dropping or destroying the handle leaves it running, so call
/// [`stop`](Self::stop) first when the child must die.
///
/// State transitions are serialized by an internal lock, so a handle can be
/// shared between threads; `stop` from one thread while another polls
/// `memory` is fine.
pub struct Sandbox<A: PlatformAdapter = NativeAdapter> {
    adapter: A,
    mode: SandboxMode,
    limits: SandboxLimits,
    id: String,
    state: Mutex<State<A::Container>>,
}

impl Sandbox<NativeAdapter> {
    /// Create a sandbox for the host platform.
    ///
    /// `limits` of `None` means unbounded.
    pub fn create(mode: SandboxMode, limits: Option<SandboxLimits>) -> Result<Self> {
        Self::with_adapter(NativeAdapter::default(), mode, limits)
    }

    /// Create a sandbox from a validated configuration.
    pub fn from_config(config: &SandboxConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::create(config.mode, Some(config.limits))?.with_id(config.id.clone()))
    }
}

impl<A: PlatformAdapter> Sandbox<A> {
    /// Create a sandbox on an explicit adapter.
    pub fn with_adapter(
        adapter: A,
        mode: SandboxMode,
        limits: Option<SandboxLimits>,
    ) -> Result<Self> {
        let limits = limits.unwrap_or_default();
        let container = adapter.create_container(mode, &limits)?;

        debug!(
            "Created {} sandbox on {} (container: {}, limits: {:?})",
            mode,
            adapter.name(),
            container.is_some(),
            limits
        );

        Ok(Self {
            adapter,
            mode,
            limits,
            id: DEFAULT_ID.to_string(),
            state: Mutex::new(State {
                status: SandboxStatus::Idle,
                pid: 0,
                container,
                #[cfg(feature = "vm")]
                region: None,
                destroyed: false,
            }),
        })
    }

    /// Rename the sandbox.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mode(&self) -> SandboxMode {
        self.mode
    }

    /// Limits as submitted at creation.
    pub fn limits(&self) -> &SandboxLimits {
        &self.limits
    }

    /// Name of the platform adapter.
    pub fn platform(&self) -> &'static str {
        self.adapter.name()
    }

    pub fn status(&self) -> SandboxStatus {
        self.state.lock().status
    }

    /// Pid of the tracked child, if any.
    pub fn pid(&self) -> Option<u32> {
        match self.state.lock().pid {
            0 => None,
            pid => Some(pid),
        }
    }

    /// Run `command` in a child process and return its pid.
    ///
    /// On POSIX the command goes through `/bin/sh -c`; on Windows it is the
    /// full command line. Returns as soon as the child exists.
    pub fn exec(&self, command: &str) -> Result<u32> {
        let mut state = self.state.lock();
        if state.destroyed {
            return Err(SandboxError::Destroyed);
        }
        if state.status.is_running() && state.pid != 0 {
            return Err(SandboxError::AlreadyRunning { pid: state.pid });
        }

        let pid = self
            .adapter
            .spawn(command, &self.limits, state.container.as_ref())?;

        state.pid = pid;
        state.status = SandboxStatus::Running;
        debug!("Sandbox '{}' running child {}", self.id, pid);
        Ok(pid)
    }

    /// Copy `code` into executable memory and call it once.
    ///
    /// Blocks until the code returns. The region stays mapped until the next
    /// `exec_code` or [`destroy`](Self::destroy).
    #[cfg(feature = "vm")]
    pub fn exec_code(&self, _capability: VmCapability, code: &[u8]) -> Result<()> {
        if self.mode != SandboxMode::Vm {
            return Err(SandboxError::ModeMismatch {
                expected: SandboxMode::Vm,
                actual: self.mode,
            });
        }
        if self.state.lock().destroyed {
            return Err(SandboxError::Destroyed);
        }

        let region = ExecRegion::new(code)?;
        debug!(
            "Sandbox '{}' calling {} bytes of inline code",
            self.id,
            region.len()
        );

        // SAFETY: holding a `VmCapability` means the caller vouched for the
        // buffer being a callable native function.
        unsafe { region.call() };

        let mut state = self.state.lock();
        state.region = Some(region);
        state.status = SandboxStatus::Running;
        Ok(())
    }

    /// Kill the tracked child and return to IDLE.
    ///
    /// The container and any VM region are kept.
    pub fn stop(&self) -> Result<()> {
        let mut state = self.state.lock();

        if state.pid == 0 {
            if self.mode == SandboxMode::Vm && state.status.is_running() {
                state.status = SandboxStatus::Idle;
                return Ok(());
            }
            return Err(SandboxError::NoChild);
        }

        self.adapter.terminate(state.pid)?;
        debug!("Sandbox '{}' stopped child {}", self.id, state.pid);

        state.pid = 0;
        state.status = SandboxStatus::Idle;
        Ok(())
    }

    /// Release the container and VM region and return to IDLE.
    ///
    /// A child that is still recorded keeps running outside the sandbox.
    /// Later `exec` and `exec_code` calls fail with
    /// [`SandboxError::Destroyed`], since there is no container left to hold
    /// the limits.
    pub fn destroy(&self) {
        let mut state = self.state.lock();

        if state.pid != 0 {
            warn!(
                "Sandbox '{}' destroyed while tracking child {}; the child is not stopped",
                self.id, state.pid
            );
        }

        state.container = None;
        #[cfg(feature = "vm")]
        {
            state.region = None;
        }
        state.pid = 0;
        state.status = SandboxStatus::Idle;
        state.destroyed = true;
    }

    /// Resident memory of the child in bytes; 0 when unknown or unsupported.
    pub fn memory(&self) -> u64 {
        match self.pid() {
            Some(pid) => self.adapter.memory_usage(pid),
            None => 0,
        }
    }

    /// CPU time of the child in milliseconds; 0 when unknown or unsupported.
    pub fn cpu_time(&self) -> u64 {
        match self.pid() {
            Some(pid) => self.adapter.cpu_time_ms(pid),
            None => 0,
        }
    }
}

impl<A: PlatformAdapter> std::fmt::Debug for Sandbox<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Sandbox")
            .field("id", &self.id)
            .field("platform", &self.adapter.name())
            .field("mode", &self.mode)
            .field("limits", &self.limits)
            .field("status", &state.status)
            .field("pid", &state.pid)
            .field("container", &state.container.is_some())
            .finish()
    }
}

/// Numeric status of an optional handle: 0 idle, 1 running, -1 absent.
pub fn status_code<A: PlatformAdapter>(sandbox: Option<&Sandbox<A>>) -> i32 {
    sandbox.map_or(-1, |s| s.status().code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Adapter that counts live containers and records terminations.
    #[derive(Clone, Default)]
    struct MockAdapter {
        live: Arc<AtomicUsize>,
        next_pid: Arc<AtomicU32>,
        terminated: Arc<parking_lot::Mutex<Vec<u32>>>,
        fail_spawn: bool,
    }

    struct MockContainer(Arc<AtomicUsize>);

    impl Drop for MockContainer {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl MockAdapter {
        fn failing() -> Self {
            Self {
                fail_spawn: true,
                ..Self::default()
            }
        }

        fn live(&self) -> usize {
            self.live.load(Ordering::SeqCst)
        }
    }

    impl PlatformAdapter for MockAdapter {
        type Container = MockContainer;

        fn name(&self) -> &'static str {
            "mock"
        }

        fn create_container(
            &self,
            mode: SandboxMode,
            _limits: &SandboxLimits,
        ) -> Result<Option<Self::Container>> {
            if !mode.spawns_child() {
                return Ok(None);
            }
            self.live.fetch_add(1, Ordering::SeqCst);
            Ok(Some(MockContainer(self.live.clone())))
        }

        fn spawn(
            &self,
            _command: &str,
            _limits: &SandboxLimits,
            _container: Option<&Self::Container>,
        ) -> Result<u32> {
            if self.fail_spawn {
                return Err(SandboxError::spawn_failed("mock refused"));
            }
            Ok(1000 + self.next_pid.fetch_add(1, Ordering::SeqCst))
        }

        fn terminate(&self, pid: u32) -> Result<()> {
            self.terminated.lock().push(pid);
            Ok(())
        }

        fn memory_usage(&self, pid: u32) -> u64 {
            u64::from(pid) * 4096
        }

        fn cpu_time_ms(&self, pid: u32) -> u64 {
            u64::from(pid)
        }
    }

    fn mock_sandbox(mode: SandboxMode) -> (MockAdapter, Sandbox<MockAdapter>) {
        let adapter = MockAdapter::default();
        let sandbox = Sandbox::with_adapter(adapter.clone(), mode, None).unwrap();
        (adapter, sandbox)
    }

    #[test]
    fn test_create_defaults() {
        let (_, sandbox) = mock_sandbox(SandboxMode::Process);
        assert_eq!(sandbox.id(), DEFAULT_ID);
        assert_eq!(sandbox.mode(), SandboxMode::Process);
        assert!(sandbox.limits().is_unbounded());
        assert_eq!(sandbox.status(), SandboxStatus::Idle);
        assert_eq!(sandbox.pid(), None);
        assert_eq!(sandbox.platform(), "mock");
    }

    #[test]
    fn test_limits_copied() {
        let limits = SandboxLimits::minimal();
        let sandbox =
            Sandbox::with_adapter(MockAdapter::default(), SandboxMode::Restricted, Some(limits))
                .unwrap();
        assert_eq!(*sandbox.limits(), limits);
    }

    #[test]
    fn test_exec_stop_transitions() {
        let (adapter, sandbox) = mock_sandbox(SandboxMode::Process);

        let pid = sandbox.exec("echo hi").unwrap();
        assert_eq!(sandbox.status(), SandboxStatus::Running);
        assert_eq!(sandbox.pid(), Some(pid));

        sandbox.stop().unwrap();
        assert_eq!(sandbox.status(), SandboxStatus::Idle);
        assert_eq!(sandbox.pid(), None);
        assert_eq!(*adapter.terminated.lock(), vec![pid]);

        // Stopping keeps the container.
        assert_eq!(adapter.live(), 1);
    }

    #[test]
    fn test_exec_while_running_rejected() {
        let (_, sandbox) = mock_sandbox(SandboxMode::Process);
        let pid = sandbox.exec("sleep 10").unwrap();

        let err = sandbox.exec("sleep 10").unwrap_err();
        assert!(matches!(err, SandboxError::AlreadyRunning { pid: p } if p == pid));
        assert_eq!(sandbox.pid(), Some(pid));

        sandbox.stop().unwrap();
        let next = sandbox.exec("true").unwrap();
        assert_ne!(next, pid);
    }

    #[test]
    fn test_spawn_failure_leaves_idle() {
        let sandbox =
            Sandbox::with_adapter(MockAdapter::failing(), SandboxMode::Process, None).unwrap();
        assert!(matches!(
            sandbox.exec("true"),
            Err(SandboxError::SpawnFailed(_))
        ));
        assert_eq!(sandbox.status(), SandboxStatus::Idle);
        assert_eq!(sandbox.pid(), None);
    }

    #[test]
    fn test_stop_without_child() {
        let (adapter, sandbox) = mock_sandbox(SandboxMode::Process);
        assert!(matches!(sandbox.stop(), Err(SandboxError::NoChild)));
        assert!(adapter.terminated.lock().is_empty());
    }

    #[test]
    fn test_destroy_releases_container() {
        let (adapter, sandbox) = mock_sandbox(SandboxMode::Restricted);
        assert_eq!(adapter.live(), 1);

        sandbox.destroy();
        assert_eq!(adapter.live(), 0);
        assert_eq!(sandbox.status(), SandboxStatus::Idle);
    }

    #[test]
    fn test_destroy_does_not_stop_child() {
        let (adapter, sandbox) = mock_sandbox(SandboxMode::Process);
        sandbox.exec("sleep 10").unwrap();

        sandbox.destroy();
        assert_eq!(sandbox.status(), SandboxStatus::Idle);
        assert_eq!(sandbox.pid(), None);
        assert!(adapter.terminated.lock().is_empty());
        assert_eq!(adapter.live(), 0);
    }

    #[test]
    fn test_exec_after_destroy_rejected() {
        let (adapter, sandbox) = mock_sandbox(SandboxMode::Restricted);
        sandbox.destroy();

        let err = sandbox.exec("echo hi").unwrap_err();
        assert!(matches!(err, SandboxError::Destroyed));
        assert!(err.is_input_error());
        assert_eq!(sandbox.pid(), None);
        assert_eq!(sandbox.status(), SandboxStatus::Idle);
        assert_eq!(adapter.next_pid.load(Ordering::SeqCst), 0);
        assert_eq!(adapter.live(), 0);

        // Destroy stays idempotent.
        sandbox.destroy();
        assert_eq!(sandbox.status(), SandboxStatus::Idle);
    }

    #[test]
    fn test_drop_releases_container() {
        let (adapter, sandbox) = mock_sandbox(SandboxMode::Process);
        assert_eq!(adapter.live(), 1);
        drop(sandbox);
        assert_eq!(adapter.live(), 0);
    }

    #[test]
    fn test_metrics_follow_child() {
        let (_, sandbox) = mock_sandbox(SandboxMode::Process);
        assert_eq!(sandbox.memory(), 0);
        assert_eq!(sandbox.cpu_time(), 0);

        let pid = sandbox.exec("work").unwrap();
        assert_eq!(sandbox.memory(), u64::from(pid) * 4096);
        assert_eq!(sandbox.cpu_time(), u64::from(pid));
    }

    #[test]
    fn test_status_code() {
        let (_, sandbox) = mock_sandbox(SandboxMode::Process);
        assert_eq!(status_code::<MockAdapter>(None), -1);
        assert_eq!(status_code(Some(&sandbox)), 0);
        sandbox.exec("true").unwrap();
        assert_eq!(status_code(Some(&sandbox)), 1);
    }

    #[test]
    fn test_sandbox_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Sandbox<MockAdapter>>();
        assert_send_sync::<Sandbox>();
    }

    #[cfg(feature = "vm")]
    #[test]
    fn test_exec_code_mode_mismatch() {
        let (_, sandbox) = mock_sandbox(SandboxMode::Process);
        let cap = unsafe { VmCapability::new() };

        let err = sandbox.exec_code(cap, &[0u8; 16]).unwrap_err();
        assert!(matches!(
            err,
            SandboxError::ModeMismatch {
                expected: SandboxMode::Vm,
                actual: SandboxMode::Process
            }
        ));
        assert_eq!(sandbox.status(), SandboxStatus::Idle);
    }

    #[cfg(feature = "vm")]
    #[test]
    fn test_exec_code_empty_buffer() {
        let (_, sandbox) = mock_sandbox(SandboxMode::Vm);
        let cap = unsafe { VmCapability::new() };
        assert!(sandbox.exec_code(cap, &[]).unwrap_err().is_input_error());
        assert_eq!(sandbox.status(), SandboxStatus::Idle);
    }

    #[cfg(all(feature = "vm", target_os = "linux", target_arch = "x86_64"))]
    #[test]
    fn test_exec_code_runs_and_retains_region() {
        let (adapter, sandbox) = mock_sandbox(SandboxMode::Vm);
        assert_eq!(adapter.live(), 0);
        let cap = unsafe { VmCapability::new() };

        sandbox.exec_code(cap, &[0xC3]).unwrap();
        assert_eq!(sandbox.status(), SandboxStatus::Running);
        assert!(sandbox.state.lock().region.is_some());

        // Replacing the region frees the old one.
        sandbox.exec_code(cap, &[0x90, 0xC3]).unwrap();
        assert_eq!(sandbox.state.lock().region.as_ref().map(|r| r.len()), Some(2));

        sandbox.stop().unwrap();
        assert_eq!(sandbox.status(), SandboxStatus::Idle);
        assert!(sandbox.state.lock().region.is_some());

        sandbox.destroy();
        assert!(sandbox.state.lock().region.is_none());
        assert!(matches!(
            sandbox.exec_code(cap, &[0xC3]),
            Err(SandboxError::Destroyed)
        ));
    }
}
