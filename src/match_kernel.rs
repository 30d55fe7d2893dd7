//! Match kernel — applies a single pattern against its process's buffer, or
//! against the observed EOF/timeout state (spec.md §4.5).
//!
//! Grounded on `src/turn/mod.rs`'s line-buffer/regex-match loop for the
//! general "scan accumulated bytes, mutate the buffer on a hit" shape;
//! byte-level case-insensitive exact search has no teacher analogue and is
//! built directly from spec.md §4.5.

use crate::error::Result;
use crate::pattern::{MatchedPattern, Pattern, PatternKind};

/// Attempt a *data* match for `pattern` (spec.md §4.6 steps 2/4): Regex,
/// Exact, and the Eof-branch of Eof/Default. `Timeout` never matches here
/// (spec.md §4.5) — it is selected only by [`crate::expect::expect`]'s
/// timeout-handling step.
pub fn try_match(pattern: &mut Pattern) -> Result<Option<MatchedPattern>> {
    match &pattern.kind {
        PatternKind::Timeout => Ok(None),
        PatternKind::Regex(_) => match_regex(pattern),
        PatternKind::Exact { .. } => match_exact(pattern),
        PatternKind::Eof | PatternKind::Default => match_eof(pattern),
    }
}

fn match_regex(pattern: &Pattern) -> Result<Option<MatchedPattern>> {
    let regex = match &pattern.kind {
        PatternKind::Regex(re) => re,
        _ => unreachable!("match_regex called on non-Regex pattern"),
    };
    let handle = pattern
        .process_handle()
        .expect("Regex pattern always has a process (spec.md §3 invariant)");
    let mut process = handle.borrow_mut();

    // A snapshot is taken because `captures` needs to read while we may
    // mutate `buffer` right after on a hit; the buffer only ever grows
    // between Expect iterations (spec.md §3), so this is never stale
    // within one match attempt.
    let buf = process.buffer().to_vec();
    let Some(caps) = regex.captures(&buf) else {
        return Ok(None);
    };

    let whole = caps.get(0).expect("capture group 0 always present on a match");
    debug_assert!(whole.start() <= whole.end());
    debug_assert!(whole.end() <= buf.len());

    let mut groups = Vec::with_capacity(caps.len());
    for i in 0..caps.len() {
        groups.push(caps.get(i).map(|g| g.as_bytes().to_vec()));
    }

    if !pattern.notransfer {
        process.buffer_mut().drain(0..whole.end());
    }

    Ok(Some(MatchedPattern {
        groups,
        process: pattern.process().cloned(),
        eof: process.eof_observed(),
    }))
}

fn match_exact(pattern: &Pattern) -> Result<Option<MatchedPattern>> {
    let (literal, nocase) = match &pattern.kind {
        PatternKind::Exact { literal, nocase } => (literal, *nocase),
        _ => unreachable!("match_exact called on non-Exact pattern"),
    };
    let handle = pattern
        .process_handle()
        .expect("Exact pattern always has a process (spec.md §3 invariant)");
    let mut process = handle.borrow_mut();

    let buf = process.buffer().to_vec();
    let found = if nocase {
        find_subslice_nocase(&buf, literal)
    } else {
        find_subslice(&buf, literal)
    };

    let Some(start) = found else {
        return Ok(None);
    };
    let end = start + literal.len();

    if !pattern.notransfer {
        process.buffer_mut().drain(0..end);
    }

    Ok(Some(MatchedPattern {
        groups: vec![Some(literal.clone())],
        process: pattern.process().cloned(),
        eof: process.eof_observed(),
    }))
}

fn match_eof(pattern: &Pattern) -> Result<Option<MatchedPattern>> {
    let handle = pattern
        .process_handle()
        .expect("Eof/Default pattern always has a process (spec.md §3 invariant)");
    let mut process = handle.borrow_mut();

    if !process.eof_observed() {
        return Ok(None);
    }

    let whole = process.buffer().to_vec();
    if !pattern.notransfer {
        process.buffer_mut().clear();
    }

    Ok(Some(MatchedPattern {
        groups: vec![Some(whole)],
        process: pattern.process().cloned(),
        eof: true,
    }))
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn find_subslice_nocase(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    let lowered_needle: Vec<u8> = needle.iter().map(|b| b.to_ascii_lowercase()).collect();
    haystack.windows(needle.len()).position(|window| {
        window
            .iter()
            .zip(lowered_needle.iter())
            .all(|(w, n)| w.to_ascii_lowercase() == *n)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Process;
    use crate::pty::pty_fork;
    use crate::terminfo::Terminfo;

    fn spawn_cat() -> crate::process::ProcessHandle {
        let ws = nix::pty::Winsize {
            ws_row: 24,
            ws_col: 80,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        let child = pty_fork(&["sh".into(), "-c".into(), "cat".into()], None, &ws).unwrap();
        Process::new(child.master, child.pid, Terminfo::empty(), None)
    }

    #[test]
    fn exact_match_trims_buffer_by_default() {
        let handle = spawn_cat();
        handle.borrow_mut().buffer_mut().extend_from_slice(b"Hello\r\nrest");
        let mut pattern = Pattern::exact(&handle, b"Hello\r\n".to_vec(), false, false, vec![]);
        let matched = try_match(&mut pattern).unwrap().unwrap();
        assert_eq!(matched.group(0), Some(&b"Hello\r\n"[..]));
        assert_eq!(handle.borrow().buffer(), b"rest");
    }

    #[test]
    fn notransfer_leaves_buffer_unchanged() {
        let handle = spawn_cat();
        handle.borrow_mut().buffer_mut().extend_from_slice(b"Hello\r\nrest");
        let mut pattern = Pattern::exact(&handle, b"Hello\r\n".to_vec(), false, true, vec![]);
        try_match(&mut pattern).unwrap().unwrap();
        assert_eq!(handle.borrow().buffer(), b"Hello\r\nrest");
    }

    #[test]
    fn nocase_exact_matches_regardless_of_case() {
        let handle = spawn_cat();
        handle.borrow_mut().buffer_mut().extend_from_slice(b"HELLO world");
        let mut pattern = Pattern::exact(&handle, b"hello".to_vec(), true, true, vec![]);
        let matched = try_match(&mut pattern).unwrap();
        assert!(matched.is_some());
    }

    #[test]
    fn regex_capture_groups_are_indexable() {
        let handle = spawn_cat();
        handle.borrow_mut().buffer_mut().extend_from_slice(b"abc123\r");
        let mut pattern = Pattern::regex(&handle, r"(?i)A(.*)3", true, false, vec![]).unwrap();
        let matched = try_match(&mut pattern).unwrap().unwrap();
        assert_eq!(matched.group(0), Some(&b"abc123"[..]));
        assert_eq!(matched.group(1), Some(&b"bc12"[..]));
    }

    #[test]
    fn regex_rejects_out_of_order_spans_never_happens() {
        let handle = spawn_cat();
        handle.borrow_mut().buffer_mut().extend_from_slice(b"xxxfooyyy");
        let mut pattern = Pattern::regex(&handle, "foo", false, false, vec![]).unwrap();
        let matched = try_match(&mut pattern).unwrap().unwrap();
        assert_eq!(matched.group(0), Some(&b"foo"[..]));
        assert_eq!(handle.borrow().buffer(), b"yyy");
    }

    #[test]
    fn eof_pattern_does_not_match_before_eof_observed() {
        let handle = spawn_cat();
        handle.borrow_mut().buffer_mut().extend_from_slice(b"still running");
        let mut pattern = Pattern::eof(&handle, false, vec![]);
        assert!(try_match(&mut pattern).unwrap().is_none());
    }

    #[test]
    fn eof_pattern_matches_and_clears_buffer_after_eof() {
        let handle = spawn_cat();
        handle.borrow_mut().buffer_mut().extend_from_slice(b"final output");
        handle.borrow_mut().mark_eof();
        let mut pattern = Pattern::eof(&handle, false, vec![]);
        let matched = try_match(&mut pattern).unwrap().unwrap();
        assert_eq!(matched.group(0), Some(&b"final output"[..]));
        assert!(handle.borrow().buffer().is_empty());
        assert!(matched.eof());
    }

    #[test]
    fn timeout_pattern_never_matches_data() {
        let mut pattern = Pattern::timeout(Some(1.0), vec![]);
        assert!(try_match(&mut pattern).unwrap().is_none());
    }
}
