//! Streaming line reader for session logs.
//!
//! Produces a lazy, finite, restartable sequence of decoded records: one
//! buffered line in memory at a time regardless of file size. Re-opening the
//! same unchanged file always yields the same sequence, which is what makes
//! whole-file retry safe. A line that fails to decode - broken JSON or bytes
//! that are not valid UTF-8 - is yielded as a [`LineItem::Malformed`] item so
//! the caller can count and log it; it never aborts the sequence. `Err` is
//! reserved for real I/O failures.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::Value;

use crate::error::{Error, Result};

/// How much of a malformed line is preserved for diagnostics.
const MALFORMED_SNIPPET_LEN: usize = 120;

/// One item in the decoded sequence.
#[derive(Debug)]
pub enum LineItem {
    Record { line_no: u64, value: Value },
    Malformed { line_no: u64, snippet: String },
}

#[derive(Debug)]
pub struct LogReader {
    reader: BufReader<File>,
    line_no: u64,
}

impl LogReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::SourceUnreadable {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self {
            reader: BufReader::new(file),
            line_no: 0,
        })
    }
}

impl Iterator for LogReader {
    type Item = Result<LineItem>;

    fn next(&mut self) -> Option<Self::Item> {
        // Lines are read as raw bytes: the log is written by an external
        // tool, so a line that is not valid UTF-8 is malformed input, not
        // an I/O failure.
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match self.reader.read_until(b'\n', &mut buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(Error::Io(e))),
            }
            self.line_no += 1;
            if buf.last() == Some(&b'\n') {
                buf.pop();
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
            }

            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line,
                Err(_) => {
                    let snippet = String::from_utf8_lossy(&buf).into_owned();
                    return Some(Ok(LineItem::Malformed {
                        line_no: self.line_no,
                        snippet: truncate_chars(&snippet, MALFORMED_SNIPPET_LEN),
                    }));
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            return Some(Ok(match serde_json::from_str::<Value>(line) {
                Ok(value) => LineItem::Record {
                    line_no: self.line_no,
                    value,
                },
                Err(_) => LineItem::Malformed {
                    line_no: self.line_no,
                    snippet: truncate_chars(line, MALFORMED_SNIPPET_LEN),
                },
            }));
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_log(lines: &[&str]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        fs::write(&path, lines.join("\n")).unwrap();
        (dir, path)
    }

    #[test]
    fn yields_records_with_line_numbers() {
        let (_dir, path) = write_log(&[r#"{"a":1}"#, r#"{"b":2}"#]);
        let items: Vec<_> = LogReader::open(&path).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(items.len(), 2);
        match &items[1] {
            LineItem::Record { line_no, value } => {
                assert_eq!(*line_no, 2);
                assert_eq!(value["b"], 2);
            }
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[test]
    fn malformed_line_is_yielded_not_fatal() {
        let (_dir, path) = write_log(&[r#"{"ok":true}"#, "{not json", r#"{"ok":2}"#]);
        let items: Vec<_> = LogReader::open(&path).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(items.len(), 3);
        match &items[1] {
            LineItem::Malformed { line_no, snippet } => {
                assert_eq!(*line_no, 2);
                assert_eq!(snippet, "{not json");
            }
            other => panic!("expected malformed, got {other:?}"),
        }
    }

    #[test]
    fn invalid_utf8_line_is_malformed_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"{\"a\":1}\n");
        bytes.extend_from_slice(b"\xff\xfe garbage\n");
        bytes.extend_from_slice(b"{\"b\":2}\n");
        fs::write(&path, bytes).unwrap();

        let items: Vec<_> = LogReader::open(&path).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(items.len(), 3);
        match &items[1] {
            LineItem::Malformed { line_no, .. } => assert_eq!(*line_no, 2),
            other => panic!("expected malformed, got {other:?}"),
        }
        // The bad line does not disturb numbering of what follows.
        match &items[2] {
            LineItem::Record { line_no, value } => {
                assert_eq!(*line_no, 3);
                assert_eq!(value["b"], 2);
            }
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[test]
    fn blank_lines_skipped_but_counted_in_numbering() {
        let (_dir, path) = write_log(&[r#"{"a":1}"#, "", "   ", r#"{"b":2}"#]);
        let items: Vec<_> = LogReader::open(&path).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(items.len(), 2);
        match &items[1] {
            LineItem::Record { line_no, .. } => assert_eq!(*line_no, 4),
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[test]
    fn rereading_unchanged_file_yields_same_sequence() {
        let (_dir, path) = write_log(&[r#"{"a":1}"#, "bad", r#"{"b":2}"#]);
        let pass = |p: &std::path::Path| -> Vec<String> {
            LogReader::open(p)
                .unwrap()
                .map(|r| format!("{:?}", r.unwrap()))
                .collect()
        };
        assert_eq!(pass(&path), pass(&path));
    }

    #[test]
    fn long_malformed_lines_are_truncated_for_diagnostics() {
        let long = format!("{}{}", "x".repeat(500), "tail");
        let (_dir, path) = write_log(&[&long]);
        let items: Vec<_> = LogReader::open(&path).unwrap().map(|r| r.unwrap()).collect();
        match &items[0] {
            LineItem::Malformed { snippet, .. } => {
                assert_eq!(snippet.chars().count(), MALFORMED_SNIPPET_LEN)
            }
            other => panic!("expected malformed, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_source_unreadable() {
        let err = LogReader::open(Path::new("/nonexistent/log.jsonl")).unwrap_err();
        assert_eq!(err.category(), "source_unreadable");
    }
}
