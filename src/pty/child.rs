//! `pty_fork` — PTY allocation, fork, exec (spec.md §4.1).
//!
//! Grounded on the teacher's `spawn_child` (same fork/exec skeleton:
//! `openpty`, child does `setsid` + `TIOCSCTTY` + `dup2` onto 0/1/2 + close
//! other fds + `execvp`). A failed `exec` in the child falls straight
//! through to `_exit(127)` with no pipe back to the parent — spec.md §4.1
//! is explicit that "the child has no route to report errors to the
//! parent"; the parent only ever observes a failed exec as a 127 exit
//! status via `wait` (spec.md §7). Diverges from the teacher in two ways,
//! both required by spec.md:
//! - the master fd is left blocking (the teacher uses `O_NONBLOCK` for its
//!   `tokio::AsyncFd` loop; this engine reads only after `poll()` reports
//!   readable, so blocking is correct and simpler — spec.md §5),
//! - `close-on-exec` is applied to the master *after* fork, in the parent,
//!   per spec.md §4.1's explicit sequencing ("Sets close-on-exec on the
//!   master fd in the caller after return").

use std::ffi::CString;
use std::os::fd::{AsRawFd, OwnedFd};

use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::libc;
use nix::pty::openpty;
use nix::sys::termios::{self, SetArg};
use nix::unistd::{execvp, fork, setsid, ForkResult, Pid};

use super::Winsize;
use crate::error::{EngineError, Result};

/// A freshly spawned child on its own PTY.
#[derive(Debug)]
pub struct PtyChild {
    pub pid: Pid,
    pub master: OwnedFd,
}

/// Spawn `argv` on a new PTY (spec.md §4.1).
///
/// `termios` (if given) is applied to the slave before the child execs;
/// `winsize` sets the initial terminal geometry. Returns the master fd
/// (blocking, close-on-exec) and the child's pid.
///
/// # Safety
///
/// Uses `fork()`. Only async-signal-safe operations run in the child
/// between `fork()` and `exec`/`_exit` (spec.md §4.1's failure-handling
/// note: "failures in the child cause child-process termination with a
/// fatal message; the child has no route to report errors to the parent").
pub fn pty_fork(
    argv: &[String],
    termios: Option<&termios::Termios>,
    winsize: &Winsize,
) -> Result<PtyChild> {
    if argv.is_empty() {
        return Err(EngineError::Usage("argv must have at least one element".into()));
    }

    let c_args: Vec<CString> = argv
        .iter()
        .map(|s| {
            CString::new(s.as_bytes())
                .map_err(|_| EngineError::Usage(format!("argument contains NUL byte: {s:?}")))
        })
        .collect::<std::result::Result<_, _>>()?;

    let pty = openpty(Some(winsize), None).map_err(EngineError::PtyAlloc)?;
    let master = pty.master;
    let slave = pty.slave;

    // SAFETY: between fork() and exec()/_exit() in the child branch, only
    // async-signal-safe calls are made; all heap allocation above happens
    // before fork.
    match unsafe { fork() }.map_err(EngineError::Fork)? {
        ForkResult::Parent { child } => {
            drop(slave);
            fcntl(&master, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)).map_err(EngineError::PtyAlloc)?;
            Ok(PtyChild { pid: child, master })
        }
        ForkResult::Child => {
            drop(master);

            if setsid().is_err() {
                unsafe { libc::_exit(1) };
            }

            let slave_fd = slave.as_raw_fd();
            if unsafe { libc::ioctl(slave_fd, libc::TIOCSCTTY as _, 0) } < 0 {
                unsafe { libc::_exit(1) };
            }

            if let Some(t) = termios {
                // Best-effort: an unsupported termios setting shouldn't
                // prevent the child from running.
                let _ = termios::tcsetattr(&slave, SetArg::TCSANOW, t);
            }

            if unsafe { libc::dup2(slave_fd, 0) } < 0
                || unsafe { libc::dup2(slave_fd, 1) } < 0
                || unsafe { libc::dup2(slave_fd, 2) } < 0
            {
                unsafe { libc::_exit(1) };
            }

            if slave_fd > 2 {
                drop(slave);
            } else {
                std::mem::forget(slave);
            }

            for fd in 3..1024 {
                unsafe { libc::close(fd) };
            }

            let _ = execvp(&c_args[0], &c_args);
            unsafe { libc::_exit(127) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};

    fn test_winsize() -> Winsize {
        Winsize {
            ws_row: 24,
            ws_col: 80,
            ws_xpixel: 0,
            ws_ypixel: 0,
        }
    }

    fn wait_for_exit(pid: Pid) -> i32 {
        loop {
            match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(_, code)) => return code,
                Ok(WaitStatus::Signaled(_, sig, _)) => return 128 + sig as i32,
                _ => std::thread::sleep(std::time::Duration::from_millis(10)),
            }
        }
    }

    #[test]
    fn empty_argv_rejected() {
        let ws = test_winsize();
        let err = pty_fork(&[], None, &ws).unwrap_err();
        assert!(matches!(err, EngineError::Usage(_)));
    }

    #[test]
    fn nul_byte_in_argument_rejected() {
        let ws = test_winsize();
        let argv = vec!["echo".into(), "hello\0world".into()];
        let err = pty_fork(&argv, None, &ws).unwrap_err();
        assert!(matches!(err, EngineError::Usage(ref msg) if msg.contains("NUL")));
    }

    #[test]
    fn spawn_true_exits_zero() {
        let ws = test_winsize();
        let child = pty_fork(&["true".into()], None, &ws).unwrap();
        assert_eq!(wait_for_exit(child.pid), 0);
    }

    #[test]
    fn spawn_false_exits_nonzero() {
        let ws = test_winsize();
        let child = pty_fork(&["false".into()], None, &ws).unwrap();
        assert_eq!(wait_for_exit(child.pid), 1);
    }

    #[test]
    fn nonexistent_command_exits_127() {
        let ws = test_winsize();
        let child = pty_fork(&["__wdye_nonexistent_cmd_12345__".into()], None, &ws).unwrap();
        assert_eq!(wait_for_exit(child.pid), 127);
    }

    #[test]
    fn master_is_close_on_exec() {
        let ws = test_winsize();
        let child = pty_fork(&["true".into()], None, &ws).unwrap();
        let flags = fcntl(&child.master, FcntlArg::F_GETFD).unwrap();
        assert_eq!(flags & FdFlag::FD_CLOEXEC.bits(), FdFlag::FD_CLOEXEC.bits());
        wait_for_exit(child.pid);
    }
}
