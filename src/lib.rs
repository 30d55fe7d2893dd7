//! Expect-style pseudoterminal automation engine.
//!
//! Spawns a child process inside a pseudoterminal, sends bytes, and waits
//! for regex/exact/timeout/EOF/default patterns to match accumulated
//! output, collecting capture groups and script values along the way. The
//! engine is single-threaded and cooperative: the only blocking operations
//! are `poll`, `write`, `waitpid`, and the `read` that follows a readable
//! `poll` result (spec.md §5).
//!
//! The embedded script host, terminfo capability *lookup table contents*,
//! the asciicast logging *policy*, and a command-line entry point are not
//! part of this crate — it exposes the Rust-level operations and data those
//! collaborators are built on.

mod config;
mod error;
mod expect;
mod log;
mod match_kernel;
mod pattern;
mod process;
mod pty;
mod spawn;
mod terminfo;
mod value;

pub use config::EngineConfig;
pub use error::{CallbackOutcome, EngineError, Result};
pub use expect::expect;
pub use pattern::{MatchedPattern, Pattern};
pub use process::{Process, ProcessHandle, ProcessWeak, WaitOutcome, COLLECTED_PID};
pub use pty::Winsize;
pub use spawn::{spawn, SpawnRequest};
pub use terminfo::{Cap, Terminfo};
pub use value::{PatternValue, Value};
