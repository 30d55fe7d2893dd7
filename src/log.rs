//! Asciicast v2 session log sink (spec.md §4.2, §4.3, §6).
//!
//! A JSON-lines file: header line `{"version":2,"width":W,"height":H,
//! "env":{"TERM":"…"}}`, then one `[t,"i"|"o",bytes]` line per `send`/read.
//! Writes are best-effort — failures are logged and swallowed, never
//! propagated (spec.md §5, §7), mirroring the teacher's `src/broker/sink.rs`
//! warn-only-on-failure texture.

use std::fs::File;
use std::io::Write;
use std::time::Instant;

use serde::Serialize;

use crate::error::Result;

#[derive(Serialize)]
struct Header<'a> {
    version: u8,
    width: u16,
    height: u16,
    env: HeaderEnv<'a>,
}

#[derive(Serialize)]
struct HeaderEnv<'a> {
    #[serde(rename = "TERM")]
    term: &'a str,
}

/// A single asciicast event: `[seconds, "i"|"o", data]`.
struct Event<'a> {
    t: f64,
    channel: &'a str,
    data: &'a [u8],
}

impl<'a> Serialize for Event<'a> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(3))?;
        seq.serialize_element(&self.t)?;
        seq.serialize_element(self.channel)?;
        // Invalid UTF-8 is replaced with U+FFFD (spec.md §4.2, §6); C0
        // controls are escaped as \u00XX by serde_json's string escaper.
        seq.serialize_element(&String::from_utf8_lossy(self.data).into_owned())?;
        seq.end()
    }
}

/// The asciicast log sink owned by a [`crate::process::Process`].
pub struct LogSink {
    file: File,
    start: Instant,
}

impl LogSink {
    /// Create a new log file and write the asciicast v2 header
    /// (spec.md §4.2).
    pub fn create(path: &std::path::Path, width: u16, height: u16, term: &str) -> Result<Self> {
        let mut file = File::create(path)?;
        let header = Header {
            version: 2,
            width,
            height,
            env: HeaderEnv { term },
        };
        let line = serde_json::to_string(&header).map_err(|e| {
            crate::error::EngineError::Usage(format!("failed to encode asciicast header: {e}"))
        })?;
        writeln!(file, "{line}")?;
        Ok(Self {
            file,
            start: Instant::now(),
        })
    }

    fn write_event(&mut self, channel: &str, data: &[u8]) {
        let elapsed = self.start.elapsed().as_secs_f64();
        let event = Event {
            t: elapsed,
            channel,
            data,
        };
        let line = match serde_json::to_string(&event) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode asciicast event");
                return;
            }
        };
        if let Err(e) = writeln!(self.file, "{line}") {
            tracing::warn!(error = %e, "asciicast log write failed");
        }
    }

    /// Record bytes sent to the child (`"i"`).
    pub fn log_input(&mut self, data: &[u8]) {
        self.write_event("i", data);
    }

    /// Record bytes read from the child (`"o"`).
    pub fn log_output(&mut self, data: &[u8]) {
        self.write_event("o", data);
    }
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;

    #[test]
    fn header_and_events_are_valid_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.cast");

        let mut sink = LogSink::create(&path, 80, 24, "xterm").unwrap();
        sink.log_input(b"Hello\r");
        sink.log_output(b"Hello\r\n$ ");

        let file = File::open(&path).unwrap();
        let lines: Vec<String> = std::io::BufReader::new(file)
            .lines()
            .map(|l| l.unwrap())
            .collect();
        assert_eq!(lines.len(), 3);

        let header: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(header["version"], 2);
        assert_eq!(header["width"], 80);
        assert_eq!(header["height"], 24);
        assert_eq!(header["env"]["TERM"], "xterm");

        let ev: serde_json::Value = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(ev[1], "i");
        assert_eq!(ev[2], "Hello\r");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.cast");
        let mut sink = LogSink::create(&path, 80, 24, "dumb").unwrap();
        sink.log_output(&[0xff, 0xfe, b'x']);

        let contents = std::fs::read_to_string(&path).unwrap();
        let last_line = contents.lines().last().unwrap();
        let ev: serde_json::Value = serde_json::from_str(last_line).unwrap();
        assert!(ev[2].as_str().unwrap().contains('\u{FFFD}'));
    }
}
