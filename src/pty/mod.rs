//! PTY primitive (spec.md §4.1).
//!
//! Opens a pseudoterminal pair, forks a child that becomes its own session
//! leader with the slave as its controlling terminal, and execs the
//! requested command. Grounded on the teacher's `src/pty/child.rs`
//! `spawn_child`.

mod child;

pub use child::{pty_fork, PtyChild};

/// Initial terminal geometry applied to the child's slave (spec.md §4.1,
/// §4.2).
pub type Winsize = nix::pty::Winsize;
