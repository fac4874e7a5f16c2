// tests/config_loading.rs

use std::error::Error;
use std::time::Duration;

use devctl::config::{load_and_validate, load_from_path, ConfigFile};
use devctl::errors::DevctlError;
use devctl::types::{LogLevel, RecoverableSignature, Timeout};
use devctl_test_utils::builders::ConfigFileBuilder;
use devctl_test_utils::temp_config;

type TestResult = Result<(), Box<dyn Error>>;

fn expect_config_error(toml: &str, needle: &str) -> TestResult {
    let file = temp_config(toml)?;
    match load_and_validate(file.path()) {
        Err(DevctlError::ConfigError(msg)) => {
            assert!(msg.contains(needle), "message {msg:?} lacks {needle:?}");
            Ok(())
        }
        other => panic!("expected ConfigError containing {needle:?}, got {other:?}"),
    }
}

#[test]
fn empty_file_uses_defaults() -> TestResult {
    let file = temp_config("")?;
    let cfg = load_and_validate(file.path())?;

    assert_eq!(cfg.tool.binary, "adb");
    assert_eq!(cfg.tool.poll_interval, Duration::from_millis(50));
    assert_eq!(cfg.tool.default_timeout, Timeout::from_secs(30));
    assert_eq!(cfg.tool.transfer_timeout, Timeout::from_secs(60));
    assert_eq!(cfg.session.connect_attempts, 3);
    assert_eq!(cfg.session.default_target, None);
    assert!(!cfg.signatures.no_target.is_empty());
    Ok(())
}

#[test]
fn full_file_is_read() -> TestResult {
    let file = temp_config(
        r#"
[tool]
binary = "/opt/platform-tools/adb"
poll_interval = "20ms"
default_timeout = "infinite"
transfer_timeout = "5m"
help_timeout = "2s"
log_level = "debug"

[session]
connect_attempts = 5
probe_timeout = "3s"
default_target = "10.0.0.2:5555"

[signatures]
no_target = ["error: no devices/emulators found"]
permission_denied = ["Permission denied"]
read_only = ["Read-only file system"]
device_offline = ["error: device offline"]
shell_failed = ["inaccessible or not found"]
"#,
    )?;
    let cfg = load_and_validate(file.path())?;

    assert_eq!(cfg.tool.binary, "/opt/platform-tools/adb");
    assert_eq!(cfg.tool.poll_interval, Duration::from_millis(20));
    assert_eq!(cfg.tool.default_timeout, Timeout::Infinite);
    assert_eq!(cfg.tool.transfer_timeout, Timeout::from_secs(300));
    assert_eq!(cfg.tool.log_level, Some(LogLevel::Debug));
    assert_eq!(cfg.session.connect_attempts, 5);
    assert_eq!(cfg.session.default_target.as_deref(), Some("10.0.0.2:5555"));

    let table = cfg.signatures.signature_table();
    assert_eq!(
        table.classify("sh: foo: inaccessible or not found"),
        Some(RecoverableSignature::ShellCommandFailed)
    );
    assert_eq!(cfg.signatures.no_target_patterns()?.len(), 1);
    Ok(())
}

#[test]
fn zero_poll_interval_is_rejected() -> TestResult {
    expect_config_error("[tool]\npoll_interval = \"0ms\"\n", "poll_interval")
}

#[test]
fn zero_connect_attempts_is_rejected() -> TestResult {
    expect_config_error("[session]\nconnect_attempts = 0\n", "connect_attempts")
}

#[test]
fn empty_binary_is_rejected() -> TestResult {
    expect_config_error("[tool]\nbinary = \"  \"\n", "binary")
}

#[test]
fn zero_timeout_is_rejected() -> TestResult {
    expect_config_error("[session]\nprobe_timeout = \"0s\"\n", "probe_timeout")
}

#[test]
fn invalid_no_target_regex_is_rejected() -> TestResult {
    expect_config_error("[signatures]\nno_target = [\"error: (unclosed\"]\n", "no-target pattern")
}

#[test]
fn empty_signature_string_is_rejected() -> TestResult {
    expect_config_error("[signatures]\nread_only = [\"\"]\n", "read_only")
}

#[test]
fn malformed_duration_is_a_toml_error() -> TestResult {
    let file = temp_config("[tool]\ndefault_timeout = \"5 fortnights\"\n")?;
    let result = load_from_path(file.path());

    assert!(matches!(result, Err(DevctlError::TomlError(_))), "got {result:?}");
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    let result = load_and_validate("/nonexistent/Devctl.toml");
    assert!(matches!(result, Err(DevctlError::IoError(_))));
}

#[test]
fn builder_output_passes_validation() {
    let cfg: ConfigFile = ConfigFileBuilder::new()
        .binary("/usr/bin/true")
        .connect_attempts(1)
        .default_target("emulator-5554")
        .build();

    assert_eq!(cfg.session.connect_attempts, 1);
    assert_eq!(cfg.tool.binary, "/usr/bin/true");
}

#[test]
fn builder_invalid_raw_config_fails_conversion() {
    let raw = ConfigFileBuilder::new().connect_attempts(0).raw();
    assert!(matches!(
        ConfigFile::try_from(raw),
        Err(DevctlError::ConfigError(_))
    ));
}
