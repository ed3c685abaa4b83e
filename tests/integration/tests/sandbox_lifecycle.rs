//! Sandbox lifecycle against the host platform.

use oskit_integration_tests::init_tracing;
use oskit_sandbox::{
    status_code, Sandbox, SandboxConfig, SandboxError, SandboxLimits, SandboxMode,
    SandboxStatus,
};
use tempfile::TempDir;

#[cfg(unix)]
mod posix {
    use super::*;
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::sys::wait::{waitpid, WaitStatus};
    use nix::unistd::Pid;

    #[test]
    fn test_echo_child_exits_cleanly() {
        init_tracing();

        let sandbox = Sandbox::create(SandboxMode::Process, None).unwrap();
        assert_eq!(sandbox.status(), SandboxStatus::Idle);

        let pid = sandbox.exec("echo hi").unwrap();
        assert!(pid > 0);
        assert_eq!(sandbox.status(), SandboxStatus::Running);
        assert_eq!(status_code(Some(&sandbox)), 1);

        let status = waitpid(Pid::from_raw(pid as i32), None).unwrap();
        assert_eq!(status, WaitStatus::Exited(Pid::from_raw(pid as i32), 0));

        sandbox.destroy();
        assert_eq!(sandbox.status(), SandboxStatus::Idle);
        assert_eq!(status_code(Some(&sandbox)), 0);
    }

    #[test]
    fn test_stop_kills_child() {
        init_tracing();

        let sandbox = Sandbox::create(SandboxMode::Process, None).unwrap();
        let pid = sandbox.exec("sleep 10").unwrap();

        sandbox.stop().unwrap();
        assert_eq!(sandbox.status(), SandboxStatus::Idle);
        assert_eq!(sandbox.pid(), None);
        assert_eq!(kill(Pid::from_raw(pid as i32), None), Err(Errno::ESRCH));
    }

    #[test]
    fn test_restricted_child_sees_limits() {
        init_tracing();

        let limits = SandboxLimits::new()
            .with_files(20)
            .with_cpu_time(2_500)
            .with_memory(512 << 20);
        let sandbox = Sandbox::create(SandboxMode::Restricted, Some(limits)).unwrap();
        // `ulimit -v` reports KiB.
        let pid = sandbox
            .exec(
                "test \"$(ulimit -n)\" = 20 && test \"$(ulimit -t)\" = 4 \
                 && test \"$(ulimit -v)\" = 524288",
            )
            .unwrap();

        let status = waitpid(Pid::from_raw(pid as i32), None).unwrap();
        assert_eq!(status, WaitStatus::Exited(Pid::from_raw(pid as i32), 0));
    }

    #[test]
    fn test_stop_after_child_exited() {
        init_tracing();

        let sandbox = Sandbox::create(SandboxMode::Process, None).unwrap();
        let pid = sandbox.exec("true").unwrap();
        let status = waitpid(Pid::from_raw(pid as i32), None).unwrap();
        assert_eq!(status, WaitStatus::Exited(Pid::from_raw(pid as i32), 0));

        sandbox.stop().unwrap();
        assert_eq!(sandbox.status(), SandboxStatus::Idle);
        assert_eq!(sandbox.pid(), None);

        let next = sandbox.exec("true").unwrap();
        waitpid(Pid::from_raw(next as i32), None).unwrap();
        sandbox.stop().unwrap();
    }

    #[test]
    fn test_missing_program_exits_127() {
        let sandbox = Sandbox::create(SandboxMode::Process, None).unwrap();
        let pid = sandbox.exec("/definitely/not/a/program").unwrap();

        let status = waitpid(Pid::from_raw(pid as i32), None).unwrap();
        assert_eq!(status, WaitStatus::Exited(Pid::from_raw(pid as i32), 127));
    }

    #[test]
    fn test_posix_metrics_are_zero() {
        let sandbox = Sandbox::create(SandboxMode::Process, None).unwrap();
        sandbox.exec("sleep 5").unwrap();
        assert_eq!(sandbox.memory(), 0);
        assert_eq!(sandbox.cpu_time(), 0);
        sandbox.stop().unwrap();
    }
}

#[test]
fn test_mode_mismatch_leaves_idle() {
    init_tracing();

    let sandbox = Sandbox::create(SandboxMode::Process, None).unwrap();
    // SAFETY: the buffer is never executed; the call is rejected by mode.
    let cap = unsafe { oskit_sandbox::VmCapability::new() };

    let err = sandbox.exec_code(cap, &[0u8; 16]).unwrap_err();
    assert!(matches!(err, SandboxError::ModeMismatch { .. }));
    assert!(err.is_input_error());
    assert_eq!(sandbox.status(), SandboxStatus::Idle);
}

#[test]
fn test_stop_without_child_fails() {
    let sandbox = Sandbox::create(SandboxMode::Process, None).unwrap();
    assert!(matches!(sandbox.stop(), Err(SandboxError::NoChild)));
    assert_eq!(status_code::<oskit_sandbox::NativeAdapter>(None), -1);
}

#[test]
fn test_from_config_file() {
    init_tracing();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sandbox.json5");
    std::fs::write(
        &path,
        r#"{
            id: "integration",
            mode: "restricted",
            limits: { max_files: 64 },
        }"#,
    )
    .unwrap();

    let config = SandboxConfig::load(&path).unwrap();
    let sandbox = Sandbox::from_config(&config).unwrap();
    assert_eq!(sandbox.id(), "integration");
    assert_eq!(sandbox.mode(), SandboxMode::Restricted);
    assert_eq!(sandbox.limits().max_files, 64);
    assert_eq!(sandbox.status(), SandboxStatus::Idle);

    config.save(&path).unwrap();
    assert_eq!(SandboxConfig::load(&path).unwrap(), config);
}

#[test]
fn test_from_invalid_config_fails() {
    let config = SandboxConfig {
        mode: SandboxMode::Restricted,
        ..SandboxConfig::default()
    };
    assert!(matches!(
        Sandbox::from_config(&config),
        Err(SandboxError::Config(_))
    ));
}
