//! Engine-wide error taxonomy.
//!
//! Mirrors the teacher's per-module `thiserror` enums (`PtyError`,
//! `TurnError`) collapsed into one type, since this crate has a single
//! public surface rather than several cooperating binaries.

use std::io;

/// All errors the engine can surface to a host.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("PTY allocation failed: {0}")]
    PtyAlloc(nix::Error),

    #[error("fork failed: {0}")]
    Fork(nix::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("wait error: {0}")]
    Wait(nix::Error),

    #[error("write to child failed: wrote {wrote} of {requested} bytes")]
    ShortWrite { wrote: usize, requested: usize },

    #[error("invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("usage error: {0}")]
    Usage(String),

    #[error("callback error: {0}")]
    Callback(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// The outcome of invoking a pattern's attached callback (spec.md §4.6 step
/// 6, §4.7, §7).
///
/// `Restart` is the distinguished sentinel produced by the host's `continue`
/// primitive. It is handled exclusively by [`crate::expect::expect`]'s value
/// realization step and must never be allowed to unwind past it — any other
/// variant propagates to the caller of `expect`.
pub enum CallbackOutcome {
    /// The callback completed normally, producing zero or more values to
    /// splice into the `expect()` return sequence.
    Values(Vec<crate::value::Value>),
    /// `continue()` was invoked — discard progress and restart the Expect
    /// loop with the same pattern list (spec.md §4.6 step 6, §4.7).
    Restart,
    /// Any other error from the callback; propagates to the script host.
    Err(EngineError),
}
