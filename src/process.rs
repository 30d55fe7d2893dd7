//! The `Process` record (spec.md §3, §4.3).
//!
//! Owns the master fd, child pid, read buffer, terminfo snapshot, optional
//! log sink, and last wait status. Grounded on
//! `examples/other_examples/130763cc_zhiburt-ptyprocess__src-process.rs.rs`
//! for the `status`/`kill`/`wait`/`is_alive` shape and the teacher's
//! `wait_for_exit` (`src/pty/child.rs`) for the `WaitStatus` → combined
//! exit-code convention (128 + signal).

use std::cell::RefCell;
use std::os::fd::{AsFd, OwnedFd};
use std::rc::{Rc, Weak};
use std::time::Instant;

use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{self, Pid};

use crate::error::{EngineError, Result};
use crate::log::LogSink;
use crate::terminfo::Terminfo;

/// Sentinel `pid` value exposed to the host once the child has been
/// reaped (spec.md §3 "once reaped, pid becomes 'collected'", §8).
pub const COLLECTED_PID: i32 = -1;

/// Shared handle to a [`Process`].
///
/// `Pattern` holds a [`Weak`] clone (spec.md §3 "Patterns hold a weak
/// reference to a Process... never extend the Process's lifetime") — safe
/// single-threaded `Rc`/`Weak` is the correct idiom here because spec.md §5
/// mandates a single-threaded, cooperative engine; there is no need for
/// `Arc`/`Mutex`.
pub type ProcessHandle = Rc<RefCell<Process>>;
pub type ProcessWeak = Weak<RefCell<Process>>;

/// The outcome of a successful `wait` (spec.md §4.3): a shell-style
/// combined status plus the exit code / signal number taken separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOutcome {
    /// Exit code, or `128 + signal` for a signal-terminated child.
    pub combined: i32,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
}

impl WaitOutcome {
    fn from_status(status: WaitStatus) -> Option<Self> {
        match status {
            WaitStatus::Exited(_, code) => Some(Self {
                combined: code,
                exit_code: Some(code),
                signal: None,
            }),
            WaitStatus::Signaled(_, sig, _) => {
                let sig = sig as i32;
                Some(Self {
                    combined: 128 + sig,
                    exit_code: None,
                    signal: Some(sig),
                })
            }
            _ => None,
        }
    }
}

/// A spawned child, its PTY master, and everything the Expect engine needs
/// to read from / write to / wait on it (spec.md §3).
pub struct Process {
    master: OwnedFd,
    child_pid: Pid,
    collected: bool,
    last_status: Option<WaitOutcome>,
    buffer: Vec<u8>,
    terminfo: Terminfo,
    start: Instant,
    log_sink: Option<LogSink>,
    /// Whether the read channel has been observed closed (spec.md §4.6
    /// step 4). Shared by every pattern attached to this process.
    eof_observed: bool,
}

impl Process {
    pub(crate) fn new(master: OwnedFd, child_pid: Pid, terminfo: Terminfo, log_sink: Option<LogSink>) -> ProcessHandle {
        Rc::new(RefCell::new(Self {
            master,
            child_pid,
            collected: false,
            last_status: None,
            buffer: Vec::new(),
            terminfo,
            start: Instant::now(),
            log_sink,
            eof_observed: false,
        }))
    }

    pub fn master_fd(&self) -> std::os::fd::BorrowedFd<'_> {
        self.master.as_fd()
    }

    /// `Process.buffer` (spec.md §4.3, §6): output not yet consumed by a
    /// match.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buffer
    }

    /// `Process.pid` (spec.md §4.3, §6): the real pid before the first
    /// successful `wait`, [`COLLECTED_PID`] afterward.
    pub fn pid(&self) -> i32 {
        if self.collected {
            COLLECTED_PID
        } else {
            self.child_pid.as_raw()
        }
    }

    /// `Process.term` (spec.md §4.3, §6): the terminfo snapshot captured
    /// at spawn time.
    pub fn term(&self) -> &Terminfo {
        &self.terminfo
    }

    pub fn start_time(&self) -> Instant {
        self.start
    }

    pub(crate) fn eof_observed(&self) -> bool {
        self.eof_observed
    }

    pub(crate) fn mark_eof(&mut self) {
        self.eof_observed = true;
    }

    pub(crate) fn log_sink_mut(&mut self) -> Option<&mut LogSink> {
        self.log_sink.as_mut()
    }

    /// `send(bytes…)` (spec.md §4.3): one blocking write per argument; a
    /// short write is an error.
    pub fn send(&mut self, parts: &[&[u8]]) -> Result<()> {
        for part in parts {
            self.write_one(part)?;
            if let Some(sink) = self.log_sink.as_mut() {
                sink.log_input(part);
            }
        }
        Ok(())
    }

    fn write_one(&mut self, data: &[u8]) -> Result<()> {
        loop {
            match unistd::write(&self.master, data) {
                Ok(n) if n == data.len() => return Ok(()),
                Ok(n) => {
                    return Err(EngineError::ShortWrite {
                        wrote: n,
                        requested: data.len(),
                    })
                }
                Err(nix::Error::EINTR) => continue,
                Err(e) => return Err(EngineError::Io(std::io::Error::from_raw_os_error(e as i32))),
            }
        }
    }

    /// Read one chunk from the master into the buffer (spec.md §4.6 step
    /// 4). Returns `true` if the channel is now known closed (zero-length
    /// read, or Linux `EIO` on a master whose slave is fully closed).
    pub(crate) fn read_chunk(&mut self) -> Result<bool> {
        let mut chunk = [0u8; 4096];
        loop {
            match unistd::read(&self.master, &mut chunk) {
                Ok(0) => {
                    self.eof_observed = true;
                    return Ok(true);
                }
                Ok(n) => {
                    let data = &chunk[..n];
                    if let Some(sink) = self.log_sink.as_mut() {
                        sink.log_output(data);
                    }
                    self.buffer.extend_from_slice(data);
                    return Ok(false);
                }
                Err(nix::Error::EINTR) => continue,
                Err(nix::Error::EIO) => {
                    // Linux: EIO on a master whose slave has been fully
                    // closed is treated as EOF (spec.md §4.6 step 4).
                    self.eof_observed = true;
                    return Ok(true);
                }
                Err(nix::Error::EAGAIN) => return Ok(false),
                Err(e) => return Err(EngineError::Io(std::io::Error::from_raw_os_error(e as i32))),
            }
        }
    }

    /// `wait(nowait?)` (spec.md §4.3): blocking or `WNOHANG`. `Ok(None)`
    /// means "nonblocking, still running — zero values" (spec.md §4.3,
    /// §8 scenario 5).
    pub fn wait(&mut self, nowait: bool) -> Result<Option<WaitOutcome>> {
        if self.collected {
            return Ok(self.last_status);
        }

        let flag = if nowait {
            Some(WaitPidFlag::WNOHANG)
        } else {
            None
        };

        loop {
            match waitpid(self.child_pid, flag) {
                Ok(status) => match WaitOutcome::from_status(status) {
                    Some(outcome) => {
                        self.collected = true;
                        self.last_status = Some(outcome);
                        return Ok(Some(outcome));
                    }
                    None => {
                        // StillAlive / Stopped / Continued.
                        if nowait {
                            return Ok(None);
                        }
                        continue;
                    }
                },
                Err(nix::Error::EINTR) => continue,
                Err(e) => return Err(EngineError::Wait(e)),
            }
        }
    }
}

impl Drop for Process {
    /// Best-effort `killpg(-pid, SIGKILL)` if the child hasn't already
    /// been reaped (spec.md §3, §5, §7, §8 scenario 6).
    fn drop(&mut self) {
        if self.collected {
            return;
        }
        let pgid = Pid::from_raw(-self.child_pid.as_raw());
        if let Err(e) = signal::kill(pgid, Signal::SIGKILL) {
            tracing::warn!(error = %e, pid = self.child_pid.as_raw(), "SIGKILL on process group failed");
        }
    }
}
