//! Pattern objects — the five-kind tagged waitable condition (spec.md §3,
//! §4.4).
//!
//! A `Pattern` is constructed once by a factory and consumed once by
//! [`crate::expect::expect`]. Per-kind fields are unreachable for other
//! kinds, realized here as a Rust enum rather than one struct with optional
//! fields for every kind (spec.md §9: "per-kind fields should be
//! unreachable for other kinds").

use std::rc::Rc;

use regex::bytes::Regex;

use crate::process::{ProcessHandle, ProcessWeak};
use crate::value::PatternValue;

/// The per-kind payload of a [`Pattern`].
#[derive(Debug)]
pub enum PatternKind {
    /// A compiled POSIX-extended-style regular expression (realized with
    /// `regex::bytes::Regex`, which is NUL-safe unconditionally — see
    /// DESIGN.md's Open Question resolution).
    Regex(Regex),
    /// A literal byte string, matched by substring search.
    Exact { literal: Vec<u8>, nocase: bool },
    /// Matches only via the Expect loop's timeout selection; never attached
    /// to a process.
    Timeout,
    /// Matches iff the process's read channel has been observed closed.
    Eof,
    /// Combines `Timeout` and `Eof` semantics: a deadline pattern that can
    /// also be satisfied by the process closing (spec.md §3, §4.6 step 5).
    Default,
}

/// A script-visible waitable condition (spec.md §3).
///
/// Invariants (spec.md §3):
/// - `Regex`/`Exact`/`Eof`/`Default` patterns always have `process = Some`.
/// - `Timeout` patterns never have a process.
#[derive(Debug)]
pub struct Pattern {
    pub(crate) kind: PatternKind,
    pub(crate) process: Option<ProcessWeak>,
    /// Seconds; only meaningful for `Timeout`/`Default`. `None` means "use
    /// the engine default".
    pub(crate) timeout: Option<f64>,
    /// If true, a successful match leaves the process buffer unchanged
    /// (spec.md §3, §4.5).
    pub(crate) notransfer: bool,
    /// Payload returned on a successful match, in declaration order
    /// (spec.md §3, §4.4, §4.6 step 6).
    pub(crate) values: Vec<PatternValue>,
}

impl Pattern {
    /// `regex{string, nocase?, notransfer?, values…}` (spec.md §4.4).
    pub fn regex(
        process: &ProcessHandle,
        source: &str,
        nocase: bool,
        notransfer: bool,
        values: Vec<PatternValue>,
    ) -> Result<Self, regex::Error> {
        let compiled = regex::bytes::RegexBuilder::new(source)
            .case_insensitive(nocase)
            .build()?;
        Ok(Self {
            kind: PatternKind::Regex(compiled),
            process: Some(Rc::downgrade(process)),
            timeout: None,
            notransfer,
            values,
        })
    }

    /// `exact{string, nocase?, notransfer?, values…}` (spec.md §4.4).
    pub fn exact(
        process: &ProcessHandle,
        literal: impl Into<Vec<u8>>,
        nocase: bool,
        notransfer: bool,
        values: Vec<PatternValue>,
    ) -> Self {
        Self {
            kind: PatternKind::Exact {
                literal: literal.into(),
                nocase,
            },
            process: Some(Rc::downgrade(process)),
            timeout: None,
            notransfer,
            values,
        }
    }

    /// `eof{notransfer?, values…}` (spec.md §4.4).
    pub fn eof(process: &ProcessHandle, notransfer: bool, values: Vec<PatternValue>) -> Self {
        Self {
            kind: PatternKind::Eof,
            process: Some(Rc::downgrade(process)),
            timeout: None,
            notransfer,
            values,
        }
    }

    /// `default{timeout?, notransfer?, values…}` (spec.md §4.4).
    pub fn default_pattern(
        process: &ProcessHandle,
        timeout: Option<f64>,
        notransfer: bool,
        values: Vec<PatternValue>,
    ) -> Self {
        Self {
            kind: PatternKind::Default,
            process: Some(Rc::downgrade(process)),
            timeout,
            notransfer,
            values,
        }
    }

    /// Free `timeout{timeout?, values…}` (spec.md §4.4) — not attached to a
    /// process.
    pub fn timeout(timeout: Option<f64>, values: Vec<PatternValue>) -> Self {
        Self {
            kind: PatternKind::Timeout,
            process: None,
            timeout,
            notransfer: false,
            values,
        }
    }

    pub fn is_timeout_like(&self) -> bool {
        matches!(self.kind, PatternKind::Timeout | PatternKind::Default)
    }

    pub fn is_eof_like(&self) -> bool {
        matches!(self.kind, PatternKind::Eof | PatternKind::Default)
    }

    pub fn is_data_pattern(&self) -> bool {
        matches!(self.kind, PatternKind::Regex(_) | PatternKind::Exact { .. })
    }

    pub fn process(&self) -> Option<&ProcessWeak> {
        self.process.as_ref()
    }

    /// Upgrade the pattern's weak process reference. `None` only if the
    /// host already dropped the `Process` while a pattern referencing it
    /// was still alive, which spec.md §5 says never happens in a valid
    /// script program.
    pub(crate) fn process_handle(&self) -> Option<ProcessHandle> {
        self.process.as_ref().and_then(|w| w.upgrade())
    }
}

/// Ephemeral per-Expect-call record of what a pattern matched (spec.md §3
/// "Match record"): the span considered group 0, the regex capture ranges
/// if any, and whether the process was observed at EOF.
///
/// Handed to a pattern's callbacks and usable for `pattern[0|k]` /
/// `pattern.process` indexing (spec.md §3, §6). Kept separate from
/// [`Pattern`] itself so that `expect()` can drain `Pattern::values` (an
/// owned `Vec`) and invoke each callback with a `&MatchedPattern` without
/// a simultaneous mutable/immutable borrow of the same `Pattern`.
#[derive(Debug, Clone, Default)]
pub struct MatchedPattern {
    /// Capture groups, materialized as owned bytes (index 0 is the full
    /// match / group 0; indices ≥1 are regex captures, `None` when unset).
    pub(crate) groups: Vec<Option<Vec<u8>>>,
    pub(crate) process: Option<ProcessWeak>,
    pub(crate) eof: bool,
}

impl MatchedPattern {
    /// `pattern[0]` → matched bytes; `pattern[k>0]` on a Regex pattern →
    /// the k-th capture or `None`; other kinds → `None` for k≠0 (spec.md
    /// §3).
    pub fn group(&self, index: usize) -> Option<&[u8]> {
        self.groups.get(index).and_then(|g| g.as_deref())
    }

    /// `pattern.process` (spec.md §3, §6): the weakly referenced Process,
    /// upgraded, or `None` if it no longer exists.
    pub fn process(&self) -> Option<ProcessHandle> {
        self.process.as_ref().and_then(|w| w.upgrade())
    }

    /// Whether the process's read channel was known closed at match time.
    pub fn eof(&self) -> bool {
        self.eof
    }
}
