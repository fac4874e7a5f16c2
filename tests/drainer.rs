// tests/drainer.rs

use std::error::Error;
use std::io::Cursor;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use devctl::exec::StreamDrainer;
use devctl_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn lines_arrive_in_stream_order() -> TestResult {
    init_tracing();

    let drainer = StreamDrainer::start(Cursor::new(b"one\ntwo\nthree".to_vec()), "cursor")?;
    let text = drainer.finish();

    assert_eq!(text, "one\ntwo\nthree");
    Ok(())
}

#[test]
fn undecodable_bytes_are_replaced_not_raised() -> TestResult {
    init_tracing();

    let drainer = StreamDrainer::start(Cursor::new(vec![b'o', b'k', 0xff, b'\n']), "bad-utf8")?;
    let text = drainer.finish();

    assert!(text.starts_with("ok"), "got {text:?}");
    assert!(text.contains('\u{FFFD}'), "expected replacement char in {text:?}");
    Ok(())
}

#[test]
fn try_drain_returns_only_new_text() -> TestResult {
    init_tracing();

    let drainer = StreamDrainer::start(Cursor::new(b"a\nb\n".to_vec()), "cursor")?;

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut seen = String::new();
    while seen != "a\nb\n" && Instant::now() < deadline {
        seen.push_str(&drainer.try_drain());
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(seen, "a\nb\n");
    assert_eq!(drainer.try_drain(), "");
    Ok(())
}

#[cfg(unix)]
#[test]
fn stop_and_join_after_process_is_killed() -> TestResult {
    init_tracing();

    let mut child = Command::new("sh")
        .args(["-c", "echo first; exec sleep 30"])
        .stdout(Stdio::piped())
        .spawn()?;
    let stdout = child.stdout.take().ok_or("no stdout pipe")?;
    let mut drainer = StreamDrainer::start(stdout, "live")?;

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut seen = String::new();
    while !seen.contains("first") && Instant::now() < deadline {
        drainer.drain_into(&mut seen);
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(seen, "first\n");
    assert!(!drainer.is_stopped());

    child.kill()?;
    child.wait()?;

    drainer.stop();
    drainer.join();
    assert!(drainer.is_stopped());

    // A second join is a no-op.
    drainer.join();
    assert!(drainer.is_stopped());
    Ok(())
}
