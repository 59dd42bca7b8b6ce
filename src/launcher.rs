//! Child-process lifecycle: spawning external programs, forking builtins, and
//! waiting for either to terminate.
//!
//! The shell runs at most one child at a time and blocks until it is gone, so
//! a command's output is complete before the next prompt is printed. The only
//! way a child is cut short is a deadline it asked for itself with `--tkill`.

use crate::command::ExitCode;
use crate::error::{Result, ShellError};
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::process::{Child, Command, ExitStatus};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Exit code of a forked child whose body panicked.
pub const PANIC_EXIT_CODE: ExitCode = 101;

/// Marker that asks the launcher to kill the program after N seconds.
pub const TIMEOUT_FLAG: &str = "--tkill";

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Normal exit with this status.
    Exited(ExitCode),
    /// Killed by this signal number.
    Signaled(i32),
}

impl Termination {
    /// Shell-style status: the exit code, or 128 + signal number.
    pub fn code(self) -> ExitCode {
        match self {
            Termination::Exited(code) => code,
            Termination::Signaled(signal) => 128 + signal,
        }
    }
}

/// An external program invocation with the timeout marker already removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Name or path of the program, looked up on `PATH` if bare.
    pub program: String,
    pub args: Vec<String>,
    /// How long the program may run before it is signalled.
    pub timeout: Option<Duration>,
}

impl LaunchRequest {
    /// Build a request from a full argument vector (`words[0]` is the program).
    ///
    /// The first [`TIMEOUT_FLAG`] after the program name is removed together
    /// with the token following it. That token is read as whole seconds; a
    /// missing or malformed value means a deadline of zero.
    pub fn from_words(words: &[String]) -> Option<Self> {
        let (program, rest) = words.split_first()?;
        let mut args = rest.to_vec();
        let mut timeout = None;
        if let Some(at) = args.iter().position(|a| a == TIMEOUT_FLAG) {
            let end = (at + 2).min(args.len());
            let seconds = args
                .get(at + 1)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0);
            args.drain(at..end);
            timeout = Some(Duration::from_secs(seconds));
        }
        Some(Self {
            program: program.clone(),
            args,
            timeout,
        })
    }
}

/// A spawned child that has not been reaped yet.
///
/// [`ChildProcessHandle::wait`] consumes the handle, so a child is observed
/// terminating exactly once.
#[derive(Debug)]
pub struct ChildProcessHandle {
    child: Child,
    deadline: Option<Instant>,
}

impl ChildProcessHandle {
    /// Block until the child exits or is killed by a signal.
    ///
    /// If a deadline was requested and passes first, `signal` is delivered and
    /// the child is reaped like any other signalled process.
    pub fn wait(mut self, signal: Signal, poll_interval: Duration) -> Result<Termination> {
        let pid = self.child.id() as i32;
        let wait_error = |source| ShellError::Wait { pid, source };

        let status = match self.deadline {
            None => self.child.wait().map_err(wait_error)?,
            Some(deadline) => loop {
                if let Some(status) = self.child.try_wait().map_err(wait_error)? {
                    break status;
                }
                let now = Instant::now();
                if now >= deadline {
                    debug!(pid, ?signal, "deadline passed, signalling child");
                    // The child may have exited in the meantime; reaping below still works.
                    if let Err(e) = kill(Pid::from_raw(pid), signal) {
                        debug!(pid, error = %e, "kill after deadline failed");
                    }
                    break self.child.wait().map_err(wait_error)?;
                }
                std::thread::sleep(poll_interval.min(deadline - now));
            },
        };

        let termination = termination_of(status);
        debug!(pid, ?termination, "child reaped");
        Ok(termination)
    }
}

fn termination_of(status: ExitStatus) -> Termination {
    match status.code() {
        Some(code) => Termination::Exited(code),
        None => Termination::Signaled(terminated_by_signal(status)),
    }
}

#[cfg(unix)]
fn terminated_by_signal(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.signal().unwrap_or(-1)
}

#[cfg(not(unix))]
fn terminated_by_signal(_status: ExitStatus) -> i32 {
    -1
}

/// Starts children and waits for them.
#[derive(Debug, Clone, Copy)]
pub struct Launcher {
    timeout_signal: Signal,
    poll_interval: Duration,
}

impl Launcher {
    /// A launcher that delivers `timeout_signal` to programs past their
    /// deadline, checking every `poll_interval`.
    pub fn new(timeout_signal: Signal, poll_interval: Duration) -> Self {
        Self {
            timeout_signal,
            poll_interval,
        }
    }

    /// Start `request` with `cwd` as its working directory.
    ///
    /// A program that cannot be found or executed fails here, in the parent;
    /// the shell is never re-entered inside a child that failed to exec.
    pub fn spawn(&self, request: &LaunchRequest, cwd: &Path) -> Result<ChildProcessHandle> {
        let child = Command::new(&request.program)
            .args(&request.args)
            .current_dir(cwd)
            .spawn()
            .map_err(|source| ShellError::Spawn {
                program: request.program.clone(),
                source,
            })?;
        debug!(pid = child.id(), program = %request.program, timeout = ?request.timeout, "spawned");
        Ok(ChildProcessHandle {
            child,
            deadline: request.timeout.map(|t| Instant::now() + t),
        })
    }

    /// Spawn `request` and block until it terminates.
    pub fn launch(&self, request: &LaunchRequest, cwd: &Path) -> Result<Termination> {
        self.spawn(request, cwd)?
            .wait(self.timeout_signal, self.poll_interval)
    }

    /// Run `body` in a forked copy of this process and wait for it.
    ///
    /// The child leaves through `_exit` with the code `body` returns, so no
    /// destructor or exit handler of the parent runs twice. A panic in `body`
    /// is caught in the child and ends it with [`PANIC_EXIT_CODE`]; it never
    /// unwinds back into the caller's loop. Buffered writers
    /// must be flushed by the caller before this is called (or their bytes are
    /// written by both processes) and by `body` before it returns (or its
    /// output is lost).
    pub fn run_forked(&self, body: impl FnOnce() -> ExitCode) -> Result<Termination> {
        // SAFETY: the shell is single-threaded while it forks, and the child
        // only runs `body` before calling `_exit`.
        match unsafe { nix::unistd::fork() }.map_err(ShellError::Fork)? {
            ForkResult::Child => {
                let code = panic::catch_unwind(AssertUnwindSafe(body))
                    .unwrap_or(PANIC_EXIT_CODE);
                // SAFETY: `_exit` only terminates the calling process.
                unsafe { libc::_exit(code) }
            }
            ForkResult::Parent { child } => {
                trace!(pid = child.as_raw(), "forked builtin");
                wait_for(child)
            }
        }
    }
}

/// Reap `pid`, ignoring stop and continue notifications.
fn wait_for(pid: Pid) -> Result<Termination> {
    loop {
        match waitpid(pid, Some(WaitPidFlag::WUNTRACED)) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(Termination::Exited(code)),
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                return Ok(Termination::Signaled(signal as i32));
            }
            Ok(other) => trace!(?other, "ignoring wait notification"),
            Err(nix::errno::Errno::EINTR) => continue,
            Err(errno) => {
                return Err(ShellError::Wait {
                    pid: pid.as_raw(),
                    source: errno.into(),
                });
            }
        }
    }
}
