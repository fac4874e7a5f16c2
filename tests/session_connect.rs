// tests/session_connect.rs

use std::error::Error;

use devctl::config::SignatureSection;
use devctl::errors::DevctlError;
use devctl::exec::ProcessRegistry;
use devctl::session::DeviceSession;
use devctl::types::{DeviceIdentity, TargetState};
use devctl_test_utils::init_tracing;
use devctl_test_utils::scripted_backend::{ScriptedBackend, ScriptedFailure};

type TestResult = Result<(), Box<dyn Error>>;

const HEADER: &str = "List of devices attached";

fn session(backend: ScriptedBackend) -> DeviceSession<ScriptedBackend> {
    DeviceSession::new(backend, ProcessRegistry::new())
        .with_signatures(SignatureSection::default().signature_table())
}

fn id(s: &str) -> DeviceIdentity {
    DeviceIdentity::new(s).expect("valid identity")
}

#[test]
fn listing_skips_header_and_daemon_lines() -> TestResult {
    init_tracing();

    let backend = ScriptedBackend::new();
    backend.always(
        "devices",
        "* daemon not running; starting now at tcp:5037\n* daemon started successfully\nList of devices attached\nemulator-5554\tdevice\n10.0.0.7:5555\tunauthorized\n",
        "",
    );
    let session = session(backend);

    let targets = session.targets()?;
    assert_eq!(targets.len(), 2);
    assert_eq!(targets.get(&id("emulator-5554")), Some(&TargetState::Device));
    assert_eq!(targets.get(&id("10.0.0.7:5555")), Some(&TargetState::Unauthorized));
    Ok(())
}

#[test]
fn healthy_listed_target_is_verified_not_reconnected() -> TestResult {
    init_tracing();

    let backend = ScriptedBackend::new();
    backend
        .always("devices", &format!("{HEADER}\n192.168.1.10:5555\tdevice"), "")
        .always("shell exit", "", "");
    let session = session(backend);

    // A bare IP resolves to the listed IP:PORT entry.
    let name = session.connect_with_retry(Some(&id("192.168.1.10")), 3)?;

    assert_eq!(name, id("192.168.1.10:5555"));
    assert_eq!(session.backend().count("shell exit"), 1);
    assert_eq!(session.backend().count("connect"), 0);
    Ok(())
}

#[test]
fn stale_listing_falls_back_to_connect() -> TestResult {
    init_tracing();

    let backend = ScriptedBackend::new();
    backend
        .always("devices", &format!("{HEADER}\n192.168.1.10:5555\tdevice"), "")
        .reply("shell exit", "", "error: closed")
        .always("shell exit", "", "")
        .always("connect", "already connected to 192.168.1.10:5555", "");
    let session = session(backend);

    let name = session.connect_with_retry(Some(&id("192.168.1.10:5555")), 3)?;

    assert_eq!(name, id("192.168.1.10:5555"));
    assert_eq!(session.backend().count("connect"), 1);
    assert_eq!(session.backend().count("shell exit"), 2);
    Ok(())
}

#[test]
fn offline_target_is_disconnected_first() -> TestResult {
    init_tracing();

    let backend = ScriptedBackend::new();
    backend
        .always("devices", &format!("{HEADER}\n192.168.1.10:5555\toffline"), "")
        .always("disconnect", "disconnected 192.168.1.10:5555", "")
        .always("connect", "connected to 192.168.1.10:5555", "")
        .always("shell exit", "", "");
    let session = session(backend);

    session.connect_with_retry(Some(&id("192.168.1.10:5555")), 3)?;

    assert_eq!(
        session.backend().keys(),
        ["devices", "disconnect", "connect", "shell exit"]
    );
    Ok(())
}

#[test]
fn retries_until_liveness_probe_passes() -> TestResult {
    init_tracing();

    let backend = ScriptedBackend::new();
    backend
        .always("devices", HEADER, "")
        .always("connect", "connected to 192.168.1.10:5555", "")
        .reply("shell exit", "", "error: device offline")
        .always("shell exit", "", "");
    let session = session(backend);

    let name = session.connect_with_retry(Some(&id("192.168.1.10:5555")), 3)?;

    assert_eq!(name.as_str(), "192.168.1.10:5555");
    assert_eq!(session.backend().count("connect"), 2);
    Ok(())
}

#[test]
fn exhausting_attempts_is_connect_fail() {
    init_tracing();

    let backend = ScriptedBackend::new();
    backend
        .always("devices", HEADER, "")
        .always("connect", "failed to connect to '192.168.1.10:5555': Connection refused", "");
    let session = session(backend);

    match session.connect_with_retry(Some(&id("192.168.1.10:5555")), 3) {
        Err(DevctlError::ConnectFail { target, attempts }) => {
            assert_eq!(target, "192.168.1.10:5555");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected ConnectFail, got {other:?}"),
    }
    assert_eq!(session.backend().count("connect"), 3);
}

#[test]
fn no_target_abandons_remaining_attempts() {
    init_tracing();

    let backend = ScriptedBackend::new();
    backend.always("devices", HEADER, "");
    backend.fail("connect", ScriptedFailure::NoTarget("error: no devices/emulators found".into()));
    let session = session(backend);

    let result = session.connect_with_retry(Some(&id("emulator-5554")), 3);

    assert!(matches!(result, Err(DevctlError::NoTarget { .. })), "got {result:?}");
    assert_eq!(session.backend().count("connect"), 1);
}

#[test]
fn listing_failure_still_tries_to_connect() -> TestResult {
    init_tracing();

    let backend = ScriptedBackend::new();
    backend
        .fail("devices", ScriptedFailure::Timeout)
        .always("connect", "connected to 192.168.1.10:5555", "")
        .always("shell exit", "", "");
    let session = session(backend);

    session.connect_with_retry(Some(&id("192.168.1.10:5555")), 1)?;
    assert_eq!(session.backend().count("connect"), 1);
    Ok(())
}

#[test]
fn zero_attempts_is_a_usage_error() {
    let session = session(ScriptedBackend::new());

    let result = session.connect_with_retry(Some(&id("emulator-5554")), 0);
    assert!(matches!(result, Err(DevctlError::Usage(_))));
    assert!(session.backend().calls().is_empty());
}

#[test]
fn missing_target_without_default_is_a_usage_error() {
    let session = session(ScriptedBackend::new());

    assert!(matches!(session.resolve_target(None), Err(DevctlError::Usage(_))));
    assert!(matches!(
        session.connect_with_retry(None, 3),
        Err(DevctlError::Usage(_))
    ));
    assert!(session.backend().calls().is_empty());
}

#[test]
fn default_target_is_used_when_none_given() -> TestResult {
    init_tracing();

    let backend = ScriptedBackend::new();
    backend
        .always("devices", &format!("{HEADER}\nemulator-5554\tdevice"), "")
        .always("shell exit", "", "");
    let mut session = session(backend);
    session.set_default_target(id("emulator-5554"));

    let name = session.connect_with_retry(None, 3)?;
    assert_eq!(name, id("emulator-5554"));

    let explicit = session.resolve_target(Some(&id("other-1")))?;
    assert_eq!(explicit, id("other-1"));
    Ok(())
}

#[test]
fn liveness_probe_requires_silence() {
    let backend = ScriptedBackend::new();
    backend
        .reply("shell exit", "", "")
        .reply("shell exit", "", "error: closed")
        .fail("shell exit", ScriptedFailure::Timeout);
    let session = session(backend);
    let target = id("emulator-5554");

    assert!(session.check_connection(&target));
    assert!(!session.check_connection(&target));
    assert!(!session.check_connection(&target));
    assert_eq!(
        session.backend().calls()[0],
        ["-s", "emulator-5554", "shell", "exit"]
    );
}

#[test]
fn disconnect_tolerates_unknown_target() -> TestResult {
    let backend = ScriptedBackend::new();
    backend
        .reply("disconnect", "error: no such device '10.0.0.9:5555'", "")
        .reply("disconnect", "", "")
        .reply("disconnect", "something unexpected", "");
    let session = session(backend);
    let target = id("10.0.0.9:5555");

    session.disconnect(&target)?;
    session.disconnect(&target)?;
    assert!(matches!(
        session.disconnect(&target),
        Err(DevctlError::Unknown { .. })
    ));
    Ok(())
}
