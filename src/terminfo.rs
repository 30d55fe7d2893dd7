//! Terminal capability snapshot (spec.md §1 "Terminal capability lookup",
//! §4.2, §9).
//!
//! The real lookup lives behind the `terminfo-backend` Cargo feature,
//! gated the way the teacher's sibling example `squall` gates its optional
//! `global-memory` feature (`examples/DSado88-squall/Cargo.toml`) — the
//! teacher itself has no terminfo code to ground this on directly.

use std::collections::HashMap;

/// A single terminfo capability value (boolean, numeric, or string), per
/// spec.md §1's "optional key→(bool|int|string) map".
#[derive(Debug, Clone, PartialEq)]
pub enum Cap {
    Bool(bool),
    Num(i32),
    Str(String),
}

/// An immutable snapshot of a terminal's capabilities, captured once at
/// spawn time (spec.md §3 `terminfo`, §9 "Terminfo snapshot").
#[derive(Debug, Clone, Default)]
pub struct Terminfo {
    caps: HashMap<String, Cap>,
}

impl Terminfo {
    pub fn empty() -> Self {
        Self {
            caps: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Cap> {
        self.caps.get(name)
    }

    /// `lines`/`columns`, if present, used to pick the initial winsize
    /// (spec.md §4.2).
    pub fn lines_columns(&self) -> Option<(u16, u16)> {
        let lines = match self.caps.get("lines")? {
            Cap::Num(n) if *n > 0 => *n as u16,
            _ => return None,
        };
        let columns = match self.caps.get("columns")? {
            Cap::Num(n) if *n > 0 => *n as u16,
            _ => return None,
        };
        Some((lines, columns))
    }

    pub fn is_empty(&self) -> bool {
        self.caps.is_empty()
    }
}

#[cfg(feature = "terminfo-backend")]
pub fn load(term: &str) -> Terminfo {
    use terminfo::capability as cap;
    use terminfo::Database;

    let db = match Database::from_name(term) {
        Ok(db) => db,
        Err(_) => return Terminfo::empty(),
    };

    let mut caps = HashMap::new();
    if let Some(lines) = db.get::<cap::Lines>() {
        caps.insert("lines".to_string(), Cap::Num(lines.0 as i32));
    }
    if let Some(cols) = db.get::<cap::Columns>() {
        caps.insert("columns".to_string(), Cap::Num(cols.0 as i32));
    }
    if db.get::<cap::AutoRightMargin>().is_some() {
        caps.insert("am".to_string(), Cap::Bool(true));
    }
    if let Some(bell) = db.get::<cap::Bell>() {
        if let Ok(s) = std::str::from_utf8(bell.as_ref()) {
            caps.insert("bel".to_string(), Cap::Str(s.to_string()));
        }
    }

    Terminfo { caps }
}

#[cfg(not(feature = "terminfo-backend"))]
pub fn load(_term: &str) -> Terminfo {
    Terminfo::empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_terminfo_has_no_lines_columns() {
        let t = Terminfo::empty();
        assert_eq!(t.lines_columns(), None);
        assert!(t.is_empty());
    }

    #[test]
    fn lines_columns_present() {
        let mut caps = HashMap::new();
        caps.insert("lines".to_string(), Cap::Num(50));
        caps.insert("columns".to_string(), Cap::Num(132));
        let t = Terminfo { caps };
        assert_eq!(t.lines_columns(), Some((50, 132)));
    }
}
