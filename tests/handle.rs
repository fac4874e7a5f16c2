// tests/handle.rs
#![cfg(unix)]

use std::error::Error;
use std::thread;
use std::time::{Duration, Instant};

use devctl::errors::DevctlError;
use devctl::exec::{Command, HandleState, NonBlockingHandle, ProcessRegistry};
use devctl::types::Timeout;
use devctl_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

const POLL: Duration = Duration::from_millis(10);

fn wait_for<F: FnMut() -> bool>(mut ready: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if ready() {
            return true;
        }
        thread::sleep(POLL);
    }
    false
}

#[test]
fn kill_twice_stays_killed() -> TestResult {
    init_tracing();

    let registry = ProcessRegistry::new();
    let mut handle =
        NonBlockingHandle::spawn_interactive(&Command::with_args("sleep", ["30"]), &registry, POLL)?;
    assert_eq!(handle.state(), HandleState::Running);
    assert!(handle.is_alive());

    handle.kill()?;
    assert_eq!(handle.state(), HandleState::Killed);

    handle.kill()?;
    assert_eq!(handle.state(), HandleState::Killed);
    assert!(!handle.is_alive());
    Ok(())
}

#[test]
fn join_times_out_on_running_process() -> TestResult {
    init_tracing();

    let registry = ProcessRegistry::new();
    let mut handle =
        NonBlockingHandle::spawn_interactive(&Command::with_args("sleep", ["30"]), &registry, POLL)?;

    let started = Instant::now();
    assert!(!handle.join(Timeout::from_millis(200)));
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert!(handle.is_alive());

    handle.kill()?;
    Ok(())
}

#[test]
fn join_returns_once_process_exits() -> TestResult {
    init_tracing();

    let registry = ProcessRegistry::new();
    let handle = NonBlockingHandle::spawn_interactive(
        &Command::with_args("sh", ["-c", "sleep 0.1"]),
        &registry,
        POLL,
    )?;

    assert!(handle.join(Timeout::from_secs(5)));
    assert_eq!(handle.state(), HandleState::Exited);
    Ok(())
}

#[test]
fn interactive_round_trip_preserves_non_ascii() -> TestResult {
    init_tracing();

    let registry = ProcessRegistry::new();
    let mut handle = NonBlockingHandle::spawn_interactive(&Command::new("cat"), &registry, POLL)?;

    handle.write("中文\n")?;

    let mut echoed = String::new();
    assert!(wait_for(|| {
        echoed.push_str(&handle.read_stdout());
        echoed.contains('\n')
    }));
    assert_eq!(echoed, "中文\n");
    assert_eq!(handle.read_stderr(), "");

    handle.kill()?;
    Ok(())
}

#[test]
fn closing_input_lets_the_process_finish() -> TestResult {
    init_tracing();

    let registry = ProcessRegistry::new();
    let mut handle = NonBlockingHandle::spawn_interactive(&Command::new("cat"), &registry, POLL)?;

    handle.write("bye\n")?;
    handle.close_input();

    assert!(handle.join(Timeout::from_secs(5)));
    assert_eq!(handle.state(), HandleState::Exited);

    match handle.write("too late\n") {
        Err(DevctlError::Usage(_)) => {}
        other => panic!("expected Usage error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn capture_writes_stdout_into_sink() -> TestResult {
    init_tracing();

    let capture = tempfile::NamedTempFile::new()?;
    let sink = capture.reopen()?;

    let registry = ProcessRegistry::new();
    let cmd = Command::with_args("sh", ["-c", "echo 'I/boot: completed'; exec sleep 30"]);
    let mut handle = NonBlockingHandle::spawn_capture(&cmd, sink, &registry, POLL)?;

    assert!(wait_for(|| {
        std::fs::read_to_string(capture.path())
            .map(|text| text.contains("I/boot: completed"))
            .unwrap_or(false)
    }));
    assert_eq!(handle.read_stdout(), "");
    assert!(handle.write("ignored").is_err());

    handle.kill()?;
    assert_eq!(handle.state(), HandleState::Killed);
    Ok(())
}

#[test]
fn dropping_a_handle_kills_its_process() -> TestResult {
    init_tracing();

    let registry = ProcessRegistry::new();
    let handle =
        NonBlockingHandle::spawn_interactive(&Command::with_args("sleep", ["30"]), &registry, POLL)?;
    let pid = handle.pid();
    assert_eq!(registry.running_pids(), vec![pid]);

    drop(handle);

    assert!(registry.is_empty());
    let alive = std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()?
        .success();
    assert!(!alive, "process {pid} outlived its handle");
    Ok(())
}
