//! Process supervisor for the pytest run.
//!
//! The child gets one pipe as both stdout and stderr. A reader thread waits
//! on the read end with `poll(2)`, drains it without blocking, and hands the
//! whole transcript captured so far to an [`OutputSink`] after every chunk.
//! The child is started in its own process group so stopping the supervisor
//! also takes down the xdist workers it forked.

use std::fs::File;
use std::io::{self, Read};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::types::{DashboardConfig, OutputBuffer};

/// Largest single read from the output pipe.
const READ_CHUNK: usize = 0x1000;

/// How long one readiness wait lasts before the stop flag is checked again.
const POLL_TIMEOUT_MS: libc::c_int = 100;

/// Interval between exit checks once the output stream has closed.
const REAP_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to create output pipe: {0}")]
    Pipe(#[source] io::Error),

    #[error("Test runner has no readable output stream: {0}")]
    NoOutputStream(#[source] io::Error),
}

/// Receives what the supervised process produces. Called from the reader
/// thread only, in the order things happen.
pub trait OutputSink: Send + 'static {
    /// The complete transcript so far. Never shorter than the previous call.
    fn output(&mut self, text: &str);

    /// A diagnostic line about the process itself.
    fn log(&mut self, _line: &str) {}

    /// The child has been reaped. `None` when it died from a signal or could
    /// not be waited on.
    fn exited(&mut self, _code: Option<i32>) {}
}

/// Compose the pytest command line for one run.
pub fn build_runner_args(
    config: &DashboardConfig,
    scratch_dir: &Path,
    extra: &[String],
) -> Vec<String> {
    let runner = &config.runner;
    let mut args = vec!["-m".to_string(), "pytest".to_string()];
    if runner.color {
        args.extend(["--color".to_string(), "yes".to_string()]);
    }
    args.push(format!("-n{}", runner.workers));
    args.extend(["--dist".to_string(), runner.dist.clone()]);
    if runner.stress {
        args.push("--xstress".to_string());
    }
    if runner.verbose {
        args.push("-v".to_string());
    }
    args.extend([
        "--publish".to_string(),
        config.callback_url(),
        "--pubdir".to_string(),
        scratch_dir.display().to_string(),
    ]);
    args.extend(extra.iter().cloned());
    args
}

/// A running child process plus the thread that reads its output.
pub struct Supervisor {
    pid: u32,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl Supervisor {
    /// Spawn `program` in `workdir` and start streaming its output to `sink`.
    pub fn start<S: OutputSink>(
        program: &str,
        args: &[String],
        workdir: &Path,
        sink: S,
    ) -> Result<Self, SupervisorError> {
        let (stream, write_end) = output_pipe()?;

        let child = {
            let stdout = write_end
                .try_clone()
                .map_err(SupervisorError::Pipe)?;
            let mut command = Command::new(program);
            command
                .args(args)
                .current_dir(workdir)
                .stdin(Stdio::null())
                .stdout(Stdio::from(stdout))
                .stderr(Stdio::from(write_end))
                .process_group(0);
            // The command owns the write ends; it must be dropped before
            // reading so EOF arrives once the child exits.
            command.spawn().map_err(|source| SupervisorError::Spawn {
                program: program.to_string(),
                source,
            })?
        };

        let pid = child.id();
        info!(pid, program, workdir = %workdir.display(), "started test runner");

        let stop = Arc::new(AtomicBool::new(false));
        let reader = {
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("runner-output".to_string())
                .spawn(move || pump(child, stream, sink, &stop))
                .map_err(|source| SupervisorError::Spawn {
                    program: program.to_string(),
                    source,
                })?
        };

        Ok(Self {
            pid,
            stop,
            reader: Some(reader),
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Kill the child if it is still running and wait for it.
    pub fn stop(mut self) {
        self.shutdown(true);
    }

    /// Wait for the child to exit on its own.
    pub fn wait(mut self) {
        self.shutdown(false);
    }

    fn shutdown(&mut self, request_stop: bool) {
        if request_stop {
            self.stop.store(true, Ordering::Release);
        }
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                warn!(pid = self.pid, "runner output thread panicked");
            }
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.shutdown(true);
    }
}

/// Why the read loop ended.
enum StreamEnd {
    Eof,
    Stopped,
    Failed(io::Error),
}

/// Drain result for one readiness notification.
enum Drain {
    Open,
    Closed,
    Failed(io::Error),
}

fn pump<S: OutputSink>(mut child: Child, mut stream: File, mut sink: S, stop: &AtomicBool) {
    let mut buffer = OutputBuffer::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    let fd = stream.as_raw_fd();

    let end = loop {
        if stop.load(Ordering::Acquire) {
            break StreamEnd::Stopped;
        }
        if !wait_readable(fd, POLL_TIMEOUT_MS) {
            continue;
        }

        let mut grew = false;
        let state = drain(&mut stream, &mut chunk, |bytes| grew |= buffer.push(bytes));
        if grew {
            sink.output(buffer.as_str());
        }
        match state {
            Drain::Open => {}
            Drain::Closed => break StreamEnd::Eof,
            Drain::Failed(err) => break StreamEnd::Failed(err),
        }
    };

    if buffer.finish() {
        sink.output(buffer.as_str());
    }

    let status = match end {
        StreamEnd::Eof => {
            debug!(pid = child.id(), "runner output closed");
            reap(&mut child, stop)
        }
        StreamEnd::Stopped => {
            debug!(pid = child.id(), "stopping test runner");
            terminate(&mut child)
        }
        StreamEnd::Failed(err) => {
            warn!(pid = child.id(), %err, "reading runner output failed");
            sink.log(&format!("reading runner output failed: {err}"));
            terminate(&mut child)
        }
    };

    match status {
        Some(status) => {
            info!(pid = child.id(), %status, "test runner exited");
            sink.log(&format!("test runner exited with {status}"));
            sink.exited(status.code());
        }
        None => {
            sink.log("test runner could not be reaped");
            sink.exited(None);
        }
    }
}

/// Read until the pipe is empty, the writer side is gone, or a read fails.
fn drain(stream: &mut File, chunk: &mut [u8], mut on_bytes: impl FnMut(&[u8])) -> Drain {
    loop {
        match stream.read(chunk) {
            Ok(0) => return Drain::Closed,
            Ok(n) => on_bytes(&chunk[..n]),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Drain::Open,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Drain::Failed(err),
        }
    }
}

/// Wait for the child after its output closed, unless asked to stop first.
fn reap(child: &mut Child, stop: &AtomicBool) -> Option<ExitStatus> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(status),
            Ok(None) if stop.load(Ordering::Acquire) => return terminate(child),
            Ok(None) => thread::sleep(REAP_INTERVAL),
            Err(err) => {
                warn!(pid = child.id(), %err, "cannot poll test runner");
                return terminate(child);
            }
        }
    }
}

/// Kill the child's process group and wait for the child.
///
/// The group is killed even when the leader already exited: workers can
/// outlive it while still holding the output pipe.
fn terminate(child: &mut Child) -> Option<ExitStatus> {
    kill_group(child.id());
    if let Ok(Some(status)) = child.try_wait() {
        return Some(status);
    }
    let _ = child.kill();
    match child.wait() {
        Ok(status) => Some(status),
        Err(err) => {
            warn!(pid = child.id(), %err, "cannot wait for test runner");
            None
        }
    }
}

/// SIGKILL every process in the group led by `pgid`. A group that is already
/// gone is not an error.
fn kill_group(pgid: u32) {
    let result = unsafe { libc::kill(-(pgid as libc::pid_t), libc::SIGKILL) };
    if result != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!(pgid, %err, "cannot kill test runner process group");
        }
    }
}

/// Block until `fd` is readable or hung up, or the timeout passes.
fn wait_readable(fd: RawFd, timeout_ms: libc::c_int) -> bool {
    let mut fds = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let result = unsafe { libc::poll(&mut fds, 1, timeout_ms) };
    result > 0 && (fds.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR)) != 0
}

/// Create the shared output pipe: a non-blocking read end for the reader
/// thread and a write end for the child.
fn output_pipe() -> Result<(File, OwnedFd), SupervisorError> {
    let mut fds = [0 as libc::c_int; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(SupervisorError::Pipe(io::Error::last_os_error()));
    }
    // SAFETY: pipe(2) succeeded, so both descriptors are open and unowned.
    let (read_end, write_end) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

    set_cloexec(write_end.as_raw_fd()).map_err(SupervisorError::Pipe)?;
    set_cloexec(read_end.as_raw_fd()).map_err(SupervisorError::NoOutputStream)?;
    set_nonblocking(read_end.as_raw_fd()).map_err(SupervisorError::NoOutputStream)?;

    Ok((File::from(read_end), write_end))
}

fn set_cloexec(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 || unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 || unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorded {
        outputs: Vec<String>,
        logs: Vec<String>,
        exit: Option<Option<i32>>,
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Recorded>>);

    impl OutputSink for Recorder {
        fn output(&mut self, text: &str) {
            self.0.lock().unwrap().outputs.push(text.to_string());
        }

        fn log(&mut self, line: &str) {
            self.0.lock().unwrap().logs.push(line.to_string());
        }

        fn exited(&mut self, code: Option<i32>) {
            self.0.lock().unwrap().exit = Some(code);
        }
    }

    fn sh(script: &str, recorder: &Recorder) -> Supervisor {
        let args = vec!["-c".to_string(), script.to_string()];
        Supervisor::start("/bin/sh", &args, Path::new("/"), recorder.clone()).unwrap()
    }

    fn is_alive(pid: u32) -> bool {
        unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
    }

    #[test]
    fn test_output_is_cumulative_and_in_order() {
        let recorder = Recorder::default();
        sh("printf A; sleep 0.3; printf B; sleep 0.3; printf C", &recorder).wait();

        let recorded = recorder.0.lock().unwrap();
        assert_eq!(recorded.outputs, ["A", "AB", "ABC"]);
        assert_eq!(recorded.exit, Some(Some(0)));
    }

    #[test]
    fn test_stderr_is_merged_into_output() {
        let recorder = Recorder::default();
        sh("echo out; echo err >&2", &recorder).wait();

        let recorded = recorder.0.lock().unwrap();
        let last = recorded.outputs.last().unwrap();
        assert!(last.contains("out\n"));
        assert!(last.contains("err\n"));
        for pair in recorded.outputs.windows(2) {
            assert!(pair[1].starts_with(&pair[0]));
        }
    }

    #[test]
    fn test_exit_status_is_reported() {
        let recorder = Recorder::default();
        sh("exit 3", &recorder).wait();

        let recorded = recorder.0.lock().unwrap();
        assert!(recorded.outputs.is_empty());
        assert_eq!(recorded.exit, Some(Some(3)));
        assert!(recorded
            .logs
            .iter()
            .any(|line| line.starts_with("test runner exited with")));
    }

    #[test]
    fn test_stop_kills_running_child() {
        let recorder = Recorder::default();
        let supervisor = sh("echo started; exec sleep 30", &recorder);
        let pid = supervisor.pid();
        assert!(is_alive(pid));

        supervisor.stop();

        assert!(!is_alive(pid));
        assert_eq!(recorder.0.lock().unwrap().exit, Some(None));
    }

    /// Orphaned workers are reparented, and their new parent may never reap
    /// them, so a zombie counts as gone.
    fn is_running(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.trim_start().chars().next())
                .is_some_and(|state| state != 'Z'),
            Err(_) => false,
        }
    }

    fn wait_until_gone(pid: u32) -> bool {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while is_running(pid) {
            if std::time::Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(20));
        }
        true
    }

    #[test]
    fn test_stop_kills_workers_that_outlive_the_leader() {
        let tmp = tempfile::tempdir().unwrap();
        let pid_file = tmp.path().join("worker.pid");
        let recorder = Recorder::default();
        // The background worker inherits the pipe, so no EOF arrives when
        // the leader exits.
        let supervisor = sh(
            &format!("sleep 30 & echo $! > {}; exit 0", pid_file.display()),
            &recorder,
        );

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        let worker: u32 = loop {
            if let Ok(text) = std::fs::read_to_string(&pid_file) {
                if let Ok(pid) = text.trim().parse() {
                    break pid;
                }
            }
            assert!(std::time::Instant::now() < deadline, "worker pid never written");
            thread::sleep(Duration::from_millis(20));
        };
        thread::sleep(Duration::from_millis(200));
        assert!(is_running(worker));

        supervisor.stop();

        assert!(wait_until_gone(worker), "worker {worker} survived stop");
        assert_eq!(recorder.0.lock().unwrap().exit, Some(Some(0)));
    }

    #[test]
    fn test_drop_stops_child() {
        let recorder = Recorder::default();
        let pid = {
            let supervisor = sh("sleep 30", &recorder);
            supervisor.pid()
        };
        assert!(!is_alive(pid));
    }

    #[test]
    fn test_missing_program_is_a_spawn_error() {
        let result = Supervisor::start(
            "/nonexistent/python-for-infinity",
            &[],
            Path::new("/"),
            Recorder::default(),
        );
        assert!(matches!(result, Err(SupervisorError::Spawn { .. })));
    }

    #[test]
    fn test_build_runner_args() {
        let config = DashboardConfig::default();
        let args = build_runner_args(
            &config,
            Path::new("/tmp/pytest-infinity/run"),
            &["-k".to_string(), "smoke".to_string()],
        );
        assert_eq!(
            args,
            [
                "-m",
                "pytest",
                "--color",
                "yes",
                "-nauto",
                "--dist",
                "loadgroup",
                "--xstress",
                "-v",
                "--publish",
                "http://localhost:7778/test-update",
                "--pubdir",
                "/tmp/pytest-infinity/run",
                "-k",
                "smoke",
            ]
        );
    }

    #[test]
    fn test_build_runner_args_without_optional_flags() {
        let mut config = DashboardConfig::default();
        config.runner.color = false;
        config.runner.stress = false;
        config.runner.verbose = false;
        config.runner.workers = "4".to_string();

        let args = build_runner_args(&config, Path::new("/scratch"), &[]);
        assert_eq!(
            args,
            [
                "-m",
                "pytest",
                "-n4",
                "--dist",
                "loadgroup",
                "--publish",
                "http://localhost:7778/test-update",
                "--pubdir",
                "/scratch",
            ]
        );
    }
}
