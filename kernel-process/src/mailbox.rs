//! The per-process IPC mailbox (spec.md §3 `IPCMessage`, §4.4
//! `sendMessage`/`drainMessages`).

use chrono::{DateTime, Utc};
use kernel_core::Pid;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct IpcMessage {
    pub from_pid: Pid,
    pub to_pid: Pid,
    pub channel: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

/// A FIFO queue drained atomically by the owning process.
#[derive(Default)]
pub struct Mailbox {
    queue: Mutex<VecDeque<IpcMessage>>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, message: IpcMessage) {
        self.queue.lock().push_back(message);
    }

    /// Atomically empties the mailbox, returning everything that was in it.
    pub fn drain(&self) -> Vec<IpcMessage> {
        std::mem::take(&mut *self.queue.lock()).into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}
