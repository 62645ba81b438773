use super::wait::classify_revents;
use super::*;
use std::fs::File;
use std::io::{self, Write};
use std::os::fd::{AsFd, FromRawFd, OwnedFd};
use std::ptr;
use std::sync::MutexGuard;
use std::thread;
use std::time::Duration;

const METER_28: &[u8] =
    b" 28 20.0M  28 5936k    0     0  2970k      0  0:00:06  0:00:01  0:00:05 2969k\r";
const METER_61: &[u8] =
    b" 61 20.0M  61 12.2M    0     0  3100k      0  0:00:06  0:00:04  0:00:02 3210k\r";
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

fn pipe_pair() -> (OwnedFd, File) {
    let mut fds = [0; 2];
    let result = unsafe { libc::pipe(fds.as_mut_ptr()) };
    assert_eq!(
        result,
        0,
        "pipe() failed with errno {}",
        io::Error::last_os_error()
    );
    // SAFETY: pipe() returned two fresh descriptors we now own.
    unsafe { (OwnedFd::from_raw_fd(fds[0]), File::from_raw_fd(fds[1])) }
}

fn lock_signals() -> MutexGuard<'static, ()> {
    signal_test_lock()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn raise(signo: libc::c_int) {
    // SAFETY: raising a guarded signal in-process; the handler only stores an atomic.
    let rc = unsafe { libc::raise(signo) };
    assert_eq!(rc, 0);
}

fn signal_blocked(signo: libc::c_int) -> bool {
    unsafe {
        let mut current: libc::sigset_t = std::mem::zeroed();
        libc::pthread_sigmask(libc::SIG_BLOCK, ptr::null(), &mut current);
        libc::sigismember(&current, signo) == 1
    }
}

struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn closed_input_ends_loop_after_forwarding_records() {
    let _lock = lock_signals();
    let guard = SignalGuard::install().expect("install guard");
    let (reader, mut writer) = pipe_pair();
    writer.write_all(METER_28).unwrap();
    writer.write_all(METER_61).unwrap();
    drop(writer);

    let mut out = Vec::new();
    let exit = run_filter(reader.as_fd(), &mut out, ProgressFormat::Meter, TEST_TIMEOUT, &guard);
    assert!(exit.is_clean_end(), "unexpected exit {exit:?}");
    assert_eq!(exit.code(), 0);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "28\n# 28% (2969k/s)\n61\n# 61% (3210k/s)\n"
    );
}

#[test]
fn tiny_reads_produce_the_same_output() {
    let _lock = lock_signals();
    let guard = SignalGuard::install().expect("install guard");
    let (reader, mut writer) = pipe_pair();
    writer.write_all(b"\r").unwrap();
    writer.write_all(METER_28).unwrap();
    writer.write_all(METER_61).unwrap();
    drop(writer);

    set_read_limit(Some(3));
    reset_wait_count();
    let mut out = Vec::new();
    let exit = run_filter(reader.as_fd(), &mut out, ProgressFormat::Meter, TEST_TIMEOUT, &guard);
    set_read_limit(None);
    assert!(exit.is_clean_end());
    assert!(wait_count() > 40, "expected many small reads");
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "28\n# 28% (2969k/s)\n61\n# 61% (3210k/s)\n"
    );
}

#[test]
fn terminate_signal_interrupts_without_flushing_partial_record() {
    let _lock = lock_signals();
    let guard = SignalGuard::install().expect("install guard");
    let (reader, mut writer) = pipe_pair();
    writer.write_all(b"\r 42 partial").unwrap();
    raise(libc::SIGTERM);

    let mut out = Vec::new();
    let exit = run_filter(reader.as_fd(), &mut out, ProgressFormat::Meter, TEST_TIMEOUT, &guard);
    assert!(matches!(exit, LoopExit::Interrupted), "unexpected exit {exit:?}");
    assert_eq!(exit.code(), -1);
    assert!(!exit.producer_finished());
    assert!(out.is_empty());
    drop(writer);
}

#[test]
fn interrupt_signal_is_reported_as_interrupted() {
    let _lock = lock_signals();
    let guard = SignalGuard::install().expect("install guard");
    let (reader, _writer) = pipe_pair();
    raise(libc::SIGINT);

    let mut out = Vec::new();
    let exit = run_filter(reader.as_fd(), &mut out, ProgressFormat::Bar, TEST_TIMEOUT, &guard);
    assert!(matches!(exit, LoopExit::Interrupted));
}

#[test]
fn child_exit_forwards_records_already_written() {
    let _lock = lock_signals();
    let guard = SignalGuard::install().expect("install guard");
    let (reader, mut writer) = pipe_pair();
    writer.write_all(METER_28).unwrap();
    raise(libc::SIGCHLD);

    let mut out = Vec::new();
    let exit = run_filter(reader.as_fd(), &mut out, ProgressFormat::Meter, TEST_TIMEOUT, &guard);
    assert!(matches!(exit, LoopExit::ChildExited), "unexpected exit {exit:?}");
    assert!(exit.code() > 0);
    assert!(exit.producer_finished());
    assert_eq!(String::from_utf8(out).unwrap(), "28\n# 28% (2969k/s)\n");
    assert_eq!(ExitSignal::peek(), ExitSignal::None);
    drop(writer);
}

#[test]
fn output_failure_stops_the_loop() {
    let _lock = lock_signals();
    let guard = SignalGuard::install().expect("install guard");
    let (reader, mut writer) = pipe_pair();
    writer.write_all(METER_28).unwrap();

    let exit = run_filter(
        reader.as_fd(),
        &mut BrokenPipe,
        ProgressFormat::Meter,
        TEST_TIMEOUT,
        &guard,
    );
    match exit {
        LoopExit::StreamError(err) => assert_eq!(err.kind(), io::ErrorKind::BrokenPipe),
        other => panic!("unexpected exit {other:?}"),
    }
    drop(writer);
}

#[test]
fn liveness_timeout_keeps_waiting() {
    let _lock = lock_signals();
    let guard = SignalGuard::install().expect("install guard");
    let (reader, mut writer) = pipe_pair();
    let producer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(120));
        writer.write_all(METER_61).unwrap();
    });

    reset_wait_count();
    let mut out = Vec::new();
    let exit = run_filter(
        reader.as_fd(),
        &mut out,
        ProgressFormat::Meter,
        Duration::from_millis(10),
        &guard,
    );
    producer.join().unwrap();
    assert!(exit.is_clean_end());
    assert!(wait_count() > 2, "timeouts should loop back into the wait");
    assert_eq!(String::from_utf8(out).unwrap(), "61\n# 61% (3210k/s)\n");
}

#[test]
fn guard_blocks_signals_until_dropped() {
    let _lock = lock_signals();
    assert!(!signal_blocked(libc::SIGCHLD));
    let guard = SignalGuard::install().expect("install guard");
    assert!(signal_blocked(libc::SIGINT));
    assert!(signal_blocked(libc::SIGTERM));
    assert!(signal_blocked(libc::SIGCHLD));
    assert!(SignalGuard::install().is_err(), "second guard must be refused");
    drop(guard);
    assert!(!signal_blocked(libc::SIGCHLD));
    let again = SignalGuard::install().expect("reinstall after drop");
    drop(again);
}

#[test]
fn exit_signal_take_clears_flag() {
    let _lock = lock_signals();
    let guard = SignalGuard::install().expect("install guard");
    raise(libc::SIGCHLD);
    // Blocked: nothing is recorded until the wait primitive unblocks it.
    assert_eq!(ExitSignal::peek(), ExitSignal::None);
    let (reader, _writer) = pipe_pair();
    match wait_readable(reader.as_fd(), TEST_TIMEOUT, &guard) {
        WaitOutcome::SignalReceived(signal) => assert_eq!(signal, ExitSignal::ChildExited),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(ExitSignal::take(), ExitSignal::None);
}

#[test]
fn revents_classification_prefers_pending_data() {
    assert!(matches!(
        classify_revents(libc::POLLIN | libc::POLLHUP),
        WaitOutcome::Readable
    ));
    assert!(matches!(classify_revents(libc::POLLHUP), WaitOutcome::Closed));
    assert!(matches!(classify_revents(libc::POLLERR), WaitOutcome::Closed));
    assert!(matches!(classify_revents(0), WaitOutcome::TimedOut));
}

#[test]
fn loop_exit_codes_follow_sign_convention() {
    assert_eq!(LoopExit::EndOfStream.code(), 0);
    assert_eq!(LoopExit::HangUp.code(), 0);
    assert!(LoopExit::ChildExited.code() > 0);
    assert!(LoopExit::Interrupted.code() < 0);
    let err = LoopExit::StreamError(io::Error::from(io::ErrorKind::Other));
    assert!(err.code() < 0);
    assert!(!err.producer_finished());
}
