//! Spawn facade (spec.md §4.2): validates script arguments, materializes
//! the child environment, captures a terminfo snapshot, chooses the
//! initial winsize, and starts the child via [`crate::pty::pty_fork`].
//!
//! Grounded on the teacher's `src/cli.rs`/`src/main.rs` argument-validation
//! texture for the "missing/invalid argv" errors, and on
//! `examples/RyderFreeman4Logos-cli-sub-agent/crates/csa-executor/src/executor.rs`'s
//! "strip/inject environment variables before exec" shape for the
//! set/remove-on-absent override rule (that example builds a `Command`;
//! this engine forks directly, so the override is applied to the parent's
//! own environment for the narrow, single-threaded window between building
//! overrides and `pty_fork` returning — safe because spec.md §5 mandates a
//! single-threaded, cooperative engine with no concurrent fork from another
//! thread).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::log::LogSink;
use crate::process::{Process, ProcessHandle};
use crate::pty::{pty_fork, Winsize};
use crate::terminfo;

/// `spawn{argv[0..n-1], environ=?}` input (spec.md §4.2, §6).
///
/// `environ` overrides follow spec.md's set/remove rule: `Some(value)` sets
/// the variable, `None` removes it from the inherited parent environment
/// (the Rust realization of the host's dynamically-typed "string → set;
/// false/nil → remove").
#[derive(Debug, Default, Clone)]
pub struct SpawnRequest {
    pub argv: Vec<String>,
    pub environ: HashMap<String, Option<String>>,
}

impl SpawnRequest {
    pub fn new(argv: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            environ: HashMap::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        self.environ.insert(key.into(), value.map(Into::into));
        self
    }
}

/// `spawn{...}` (spec.md §4.2, §6): validate argv, materialize the
/// environment, snapshot terminfo, start the child.
pub fn spawn(request: SpawnRequest, config: &EngineConfig) -> Result<ProcessHandle> {
    if request.argv.is_empty() || request.argv[0].is_empty() {
        return Err(EngineError::Usage("spawn requires a non-empty argv[0]".into()));
    }

    let mut overrides = request.environ;
    let effective_term = match overrides.get("TERM") {
        Some(Some(term)) => term.clone(),
        Some(None) => String::new(),
        None => {
            overrides.insert("TERM".to_string(), Some(config.default_term.clone()));
            config.default_term.clone()
        }
    };

    let snapshot = terminfo::load(&effective_term);
    let winsize = match snapshot.lines_columns() {
        Some((lines, columns)) => Winsize {
            ws_row: lines,
            ws_col: columns,
            ws_xpixel: 0,
            ws_ypixel: 0,
        },
        None => Winsize {
            ws_row: 24,
            ws_col: 80,
            ws_xpixel: 0,
            ws_ypixel: 0,
        },
    };

    let saved = apply_env_overrides(&overrides);
    let spawned = pty_fork(&request.argv, None, &winsize);
    restore_env_overrides(saved);
    let child = spawned?;

    let log_sink = if config.logging_enabled {
        match create_log_sink(&request.argv, child.pid.as_raw(), &winsize, &effective_term) {
            Ok(sink) => Some(sink),
            Err(e) => {
                tracing::warn!(error = %e, "failed to create asciicast log sink");
                None
            }
        }
    } else {
        None
    };

    tracing::info!(pid = child.pid.as_raw(), argv0 = %request.argv[0], "spawned child");
    Ok(Process::new(child.master, child.pid, snapshot, log_sink))
}

fn apply_env_overrides(overrides: &HashMap<String, Option<String>>) -> Vec<(String, Option<String>)> {
    let mut saved = Vec::with_capacity(overrides.len());
    for (key, value) in overrides {
        saved.push((key.clone(), std::env::var(key).ok()));
        // SAFETY: the engine is single-threaded and cooperative (spec.md
        // §5); nothing else forks or reads the environment concurrently.
        match value {
            Some(v) => unsafe { std::env::set_var(key, v) },
            None => unsafe { std::env::remove_var(key) },
        }
    }
    saved
}

fn restore_env_overrides(saved: Vec<(String, Option<String>)>) {
    for (key, original) in saved {
        // SAFETY: see `apply_env_overrides`.
        match original {
            Some(v) => unsafe { std::env::set_var(&key, v) },
            None => unsafe { std::env::remove_var(&key) },
        }
    }
}

/// `<program-name>-<basename-of-argv0>.<pid>.cast` (spec.md §4.2). The
/// engine has no script-host program name of its own (out of scope, spec.md
/// §1), so the running binary's file stem stands in for it.
fn log_file_name(argv0: &str, pid: i32) -> PathBuf {
    let program = std::env::current_exe()
        .ok()
        .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "wdye".to_string());
    let basename = Path::new(argv0)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| argv0.to_string());
    PathBuf::from(format!("{program}-{basename}.{pid}.cast"))
}

fn create_log_sink(argv: &[String], pid: i32, winsize: &Winsize, term: &str) -> Result<LogSink> {
    let path = log_file_name(&argv[0], pid);
    LogSink::create(&path, winsize.ws_col, winsize.ws_row, term)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_argv0_is_rejected() {
        let request = SpawnRequest::default();
        let err = spawn(request, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, EngineError::Usage(_)));
    }

    #[test]
    fn spawn_true_succeeds_and_reaps_zero() {
        let request = SpawnRequest::new(["true"]);
        let handle = spawn(request, &EngineConfig::default()).unwrap();
        assert!(handle.borrow().pid() > 0);
        let outcome = handle.borrow_mut().wait(false).unwrap().unwrap();
        assert_eq!(outcome.combined, 0);
    }

    #[test]
    fn default_term_is_inserted_when_absent() {
        let request = SpawnRequest::new(["true"]);
        let handle = spawn(request, &EngineConfig::default()).unwrap();
        // `dumb` has no known terminfo entry in most minimal environments,
        // so the snapshot is typically empty; the important invariant is
        // that spawning didn't fail and a Process was produced.
        let _ = handle.borrow().term();
    }

    #[test]
    fn removed_term_override_falls_back_to_empty_terminfo() {
        let request = SpawnRequest::new(["true"]).with_env("TERM", None::<String>);
        let handle = spawn(request, &EngineConfig::default()).unwrap();
        assert!(handle.borrow().term().is_empty());
    }

    #[test]
    fn log_file_name_uses_argv0_basename_and_pid() {
        let name = log_file_name("/usr/bin/bash", 4242);
        let rendered = name.to_string_lossy();
        assert!(rendered.ends_with("bash.4242.cast"));
    }
}
