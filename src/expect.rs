//! The Expect wait loop (spec.md §4.6) — the heart of the engine.
//!
//! Schedules a set of patterns against the master fds of the processes they
//! reference with a single deadline, runs `poll`, feeds each readable fd,
//! re-evaluates, selects the first matching pattern in declaration order,
//! then runs value realization with restart support (spec.md §4.7).
//!
//! Grounded on `examples/other_examples/933dde83_razorback16-streamdown-rs__src-pty.rs.rs`'s
//! `PollFd`/`PollTimeout` usage and
//! `examples/other_examples/d883f8d8_solomatovs-sshpass__src-unix-mod.rs.rs`'s
//! `BorrowedFd::borrow_raw` pattern for building a poll set over fds owned
//! elsewhere. Deliberately does NOT reuse the teacher's `tokio::AsyncFd` +
//! `select!` loop (`src/pty/mod.rs`) — spec.md §9 rules out a generic async
//! reactor here ("a local poll-set sized to the patterns of a single Expect
//! call"), so this module calls `nix::poll::poll` directly.

use std::collections::{HashMap, HashSet};
use std::os::fd::{AsRawFd, BorrowedFd, RawFd};
use std::time::{Duration, Instant};

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use crate::config::EngineConfig;
use crate::error::{CallbackOutcome, Result};
use crate::match_kernel::try_match;
use crate::pattern::{MatchedPattern, Pattern};
use crate::process::ProcessHandle;
use crate::value::{PatternValue, Value};

enum Outcome {
    Values(Vec<Value>),
    Restart,
}

/// Run one Expect call to completion (spec.md §4.6), transparently
/// re-entering the loop each time a callback signals restart (spec.md §4.7).
pub fn expect(patterns: &mut [Pattern], config: &EngineConfig) -> Result<Vec<Value>> {
    loop {
        match run_once(patterns, config)? {
            Outcome::Values(values) => return Ok(values),
            Outcome::Restart => {
                tracing::debug!("expect: restart signal, re-entering loop");
                continue;
            }
        }
    }
}

fn run_once(patterns: &mut [Pattern], config: &EngineConfig) -> Result<Outcome> {
    // Step 1: preparation. Distinct processes referenced by non-Timeout
    // patterns, and the effective deadline.
    let mut processes: HashMap<RawFd, ProcessHandle> = HashMap::new();
    for pattern in patterns.iter() {
        if let Some(handle) = pattern.process_handle() {
            let fd = handle.borrow().master_fd().as_raw_fd();
            processes.entry(fd).or_insert(handle);
        }
    }

    let mut first_timeout: Option<f64> = None;
    for pattern in patterns.iter() {
        if pattern.is_timeout_like() {
            let effective = pattern.timeout.unwrap_or(config.default_timeout_secs);
            first_timeout = Some(match first_timeout {
                Some(current) if current <= effective => current,
                _ => effective,
            });
        }
    }
    let effective_timeout = first_timeout.unwrap_or(config.default_timeout_secs);

    // Step 2: initial scan, before blocking on anything.
    if let Some((index, matched)) = scan(patterns)? {
        return realize(patterns, index, &matched);
    }

    // Step 3: deadline arithmetic.
    let deadline = Instant::now() + Duration::from_secs_f64(effective_timeout.max(0.0));
    let mut closed: HashSet<RawFd> = HashSet::new();

    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        let active: Vec<(RawFd, ProcessHandle)> = processes
            .iter()
            .filter(|(fd, _)| !closed.contains(*fd))
            .map(|(fd, handle)| (*fd, handle.clone()))
            .collect();

        if active.is_empty() {
            // Nothing left to read; just wait out the remaining deadline.
            std::thread::sleep(deadline - now);
            break;
        }

        let remaining_ms = (deadline - now).as_millis().min(i32::MAX as u128) as i32;
        let timeout = PollTimeout::try_from(remaining_ms).unwrap_or(PollTimeout::MAX);

        let mut poll_fds: Vec<PollFd> = active
            .iter()
            .map(|(fd, _)| {
                // SAFETY: each fd is kept alive by the `ProcessHandle` held
                // in `active` for the duration of this poll call.
                PollFd::new(
                    unsafe { BorrowedFd::borrow_raw(*fd) },
                    PollFlags::POLLIN | PollFlags::POLLHUP,
                )
            })
            .collect();

        let nready = match poll(&mut poll_fds, timeout) {
            Ok(n) => n,
            Err(nix::Error::EINTR) => continue,
            Err(e) => return Err(crate::error::EngineError::Io(std::io::Error::from_raw_os_error(e as i32))),
        };

        if nready == 0 {
            break; // deadline fired
        }

        // Step 4: feed every ready fd, then re-scan once.
        for (poll_fd, (fd, handle)) in poll_fds.iter().zip(active.iter()) {
            let revents = poll_fd.revents().unwrap_or(PollFlags::empty());
            if !revents.intersects(PollFlags::POLLIN | PollFlags::POLLHUP) {
                continue;
            }
            let eof = handle.borrow_mut().read_chunk()?;
            if eof {
                closed.insert(*fd);
                tracing::debug!(fd, "expect: fd observed at EOF, removed from poll set");
            }
        }

        if let Some((index, matched)) = scan(patterns)? {
            return realize(patterns, index, &matched);
        }
    }

    // Step 5: timeout handling.
    let selected = patterns
        .iter()
        .enumerate()
        .find(|(_, p)| p.is_timeout_like() && p.timeout.unwrap_or(config.default_timeout_secs) == effective_timeout);

    match selected {
        Some((index, pattern)) => {
            let matched = MatchedPattern {
                groups: Vec::new(),
                process: pattern.process().cloned(),
                eof: false,
            };
            realize(patterns, index, &matched)
        }
        None => Ok(Outcome::Values(Vec::new())),
    }
}

/// Attempt a data/eof match over every non-Timeout pattern in declaration
/// order (spec.md §4.6 steps 2/4).
fn scan(patterns: &mut [Pattern]) -> Result<Option<(usize, MatchedPattern)>> {
    for (index, pattern) in patterns.iter_mut().enumerate() {
        if pattern.is_timeout_like() && !pattern.is_eof_like() {
            continue; // plain Timeout never matches on data (spec.md §4.5)
        }
        if let Some(matched) = try_match(pattern)? {
            return Ok(Some((index, matched)));
        }
    }
    Ok(None)
}

/// Step 6: value realization, with restart handling (spec.md §4.6 step 6,
/// §4.7). Values are read through `&mut` rather than drained, since a
/// restart re-enters the loop with the same pattern list and its callbacks
/// (each `FnMut`) must still be callable.
fn realize(patterns: &mut [Pattern], index: usize, matched: &MatchedPattern) -> Result<Outcome> {
    let pattern = &mut patterns[index];
    let mut output = Vec::with_capacity(pattern.values.len());
    for value in pattern.values.iter_mut() {
        match value {
            PatternValue::Plain(v) => output.push(v.clone()),
            PatternValue::Callback(callback) => match callback(matched) {
                CallbackOutcome::Values(values) => output.extend(values),
                CallbackOutcome::Restart => return Ok(Outcome::Restart),
                CallbackOutcome::Err(e) => return Err(e),
            },
        }
    }
    Ok(Outcome::Values(output))
}
