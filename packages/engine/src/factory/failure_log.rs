// packages/engine/src/factory/failure_log.rs
//! Per-instance failure journal
//!
//! Bounded journal of invocation failures on a lock-free queue. Every
//! failure on the forwarding path is recorded here, whether it was
//! propagated or swallowed. When the journal is full the oldest record is
//! evicted. Snapshots are consistent: a record is never lost or reordered
//! by a concurrent snapshot.

use crate::contract::operation::Signature;
use crate::utils::errors::InvocationError;
use chrono::{DateTime, Utc};
use crossbeam::queue::ArrayQueue;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::error::Error as _;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Handler failed on an operation with a body
    Handler,
    /// Handler failed on an abstract operation
    NotImplemented,
    /// Handler result did not match the return type
    ReturnType,
    Other,
}

impl From<&InvocationError> for FailureKind {
    fn from(err: &InvocationError) -> Self {
        match err {
            InvocationError::Handler { .. } => FailureKind::Handler,
            InvocationError::NotImplemented { .. } => FailureKind::NotImplemented,
            InvocationError::ReturnType { .. } => FailureKind::ReturnType,
            _ => FailureKind::Other,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Handler => "handler",
            FailureKind::NotImplemented => "not_implemented",
            FailureKind::ReturnType => "return_type",
            FailureKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// One recorded failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Signature of the failed operation, e.g. `greet(str)`
    pub signature: String,
    pub kind: FailureKind,
    /// Error message including its source chain
    pub message: String,
    pub at: DateTime<Utc>,
}

impl FailureRecord {
    pub fn new(signature: &Signature, err: &InvocationError) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }

        Self {
            signature: signature.to_string(),
            kind: FailureKind::from(err),
            message,
            at: Utc::now(),
        }
    }
}

/// Bounded failure journal
///
/// Cheap to clone; clones share the same journal.
#[derive(Clone)]
pub struct FailureLog {
    queue: Arc<ArrayQueue<FailureRecord>>,

    /// Pushes share it; snapshots and drains hold it exclusively
    gate: Arc<RwLock<()>>,

    pushed: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
}

impl FailureLog {
    /// Create a journal holding at most `capacity` records
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(capacity.max(1))),
            gate: Arc::new(RwLock::new(())),
            pushed: Arc::new(AtomicU64::new(0)),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record a failure of `signature`
    pub fn record(&self, signature: &Signature, err: &InvocationError) {
        self.push(FailureRecord::new(signature, err));
    }

    pub fn push(&self, record: FailureRecord) {
        let _gate = self.gate.read();
        self.pushed.fetch_add(1, Ordering::Relaxed);
        if self.queue.force_push(record).is_some() {
            // Oldest record evicted
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Copy of the retained records, oldest first
    ///
    /// Concurrent pushes wait for the snapshot and land after it.
    pub fn snapshot(&self) -> Vec<FailureRecord> {
        let _gate = self.gate.write();
        let mut records = Vec::with_capacity(self.queue.len());
        while let Some(record) = self.queue.pop() {
            records.push(record);
        }
        for record in &records {
            // Same records, same capacity, no pusher inside the gate
            let _ = self.queue.push(record.clone());
        }
        records
    }

    /// Remove and return every retained record, oldest first
    pub fn drain(&self) -> Vec<FailureRecord> {
        let _gate = self.gate.write();
        let mut records = Vec::with_capacity(self.queue.len());
        while let Some(record) = self.queue.pop() {
            records.push(record);
        }
        records
    }

    /// Total failures recorded
    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    /// Records evicted because the journal was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

impl fmt::Debug for FailureLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureLog")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("pushed", &self.pushed())
            .field("dropped", &self.dropped())
            .finish()
    }
}
