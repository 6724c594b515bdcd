//! Audit event bus: fan-out of execution events to live subscribers and a
//! JSONL file sink.
//!
//! The bus is best-effort by contract: failures here never prevent plan
//! progress. Each subscriber has its own bounded channel; slow subscribers
//! drop events rather than blocking producers. Sensitive payloads (params,
//! results) are omitted from events — only ids, timestamps, and terse
//! detail fields are carried.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use llmos_protocol::now_epoch;

const SUBSCRIBER_BUFFER: usize = 64;
const RECENT_BUFFER: usize = 256;

/// One event kind per state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    PlanSubmitted,
    PlanStarted,
    ActionRequested,
    ApprovalRequested,
    ApprovalDecided,
    ActionStarted,
    ActionCompleted,
    ActionFailed,
    ActionRolledBack,
    PlanCompleted,
    PlanFailed,
    PlanCancelled,
}

/// One audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub kind: AuditEventKind,
    pub plan_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub detail: Value,
}

impl AuditEvent {
    pub fn plan(kind: AuditEventKind, plan_id: &str) -> Self {
        AuditEvent {
            kind,
            plan_id: plan_id.to_string(),
            action_id: None,
            timestamp: now_epoch(),
            detail: Value::Null,
        }
    }

    pub fn action(kind: AuditEventKind, plan_id: &str, action_id: &str) -> Self {
        AuditEvent {
            kind,
            plan_id: plan_id.to_string(),
            action_id: Some(action_id.to_string()),
            timestamp: now_epoch(),
            detail: Value::Null,
        }
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = detail;
        self
    }
}

/// Append-only JSONL sink, one JSON object per line.
struct JsonlSink {
    writer: Mutex<BufWriter<File>>,
}

impl JsonlSink {
    fn open(path: &str) -> Option<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(err) = std::fs::create_dir_all(parent) {
                    tracing::warn!("cannot create event log directory {}: {}", parent.display(), err);
                    return None;
                }
            }
        }
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(JsonlSink {
                writer: Mutex::new(BufWriter::new(file)),
            }),
            Err(err) => {
                tracing::warn!("cannot open event log {}: {}", path, err);
                None
            }
        }
    }

    fn write(&self, event: &AuditEvent) {
        let Ok(line) = serde_json::to_string(event) else {
            return;
        };
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line);
            let _ = writer.flush();
        }
    }
}

/// Lock-light fan-out of audit events.
pub struct EventBus {
    subscribers: Mutex<Vec<mpsc::Sender<AuditEvent>>>,
    recent: Mutex<VecDeque<AuditEvent>>,
    sink: Option<JsonlSink>,
}

impl EventBus {
    pub fn new(event_log_path: Option<&str>) -> Self {
        EventBus {
            subscribers: Mutex::new(Vec::new()),
            recent: Mutex::new(VecDeque::with_capacity(RECENT_BUFFER)),
            sink: event_log_path.and_then(JsonlSink::open),
        }
    }

    /// Registers a live subscriber with its own bounded channel.
    pub fn subscribe(&self) -> mpsc::Receiver<AuditEvent> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.subscribers
            .lock()
            .expect("subscriber list lock")
            .push(tx);
        rx
    }

    /// Emits one event to the ring, the file sink, and all subscribers.
    pub fn emit(&self, event: AuditEvent) {
        {
            let mut recent = self.recent.lock().expect("recent ring lock");
            if recent.len() == RECENT_BUFFER {
                recent.pop_front();
            }
            recent.push_back(event.clone());
        }

        if let Some(sink) = &self.sink {
            sink.write(&event);
        }

        let mut subscribers = self.subscribers.lock().expect("subscriber list lock");
        // try_send: a full or closed subscriber loses the event; closed
        // subscribers are dropped from the list.
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    /// Snapshot of the most recent events, newest last.
    pub fn recent(&self, limit: usize) -> Vec<AuditEvent> {
        let recent = self.recent.lock().expect("recent ring lock");
        recent
            .iter()
            .rev()
            .take(limit)
            .rev()
            .cloned()
            .collect()
    }
}
