//! Dispatch trace for replay verification
//!
//! An append-only log of every dispatch an engine performed. Two trials that
//! were seeded identically must produce identical traces; `digest` reduces a
//! trace to a SHA-256 so drivers can compare runs cheaply.
//!
//! # Critical Invariants
//!
//! 1. Records are appended in dispatch order and never rewritten
//! 2. The digest depends only on the records (no maps, so the JSON form is
//!    canonical)

use crate::core::time::SimTime;
use crate::events::types::SignalKind;
use crate::models::dispatch::DispatchRecord;
use crate::orchestrator::error::EngineError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchTrace {
    records: Vec<DispatchRecord>,
}

impl DispatchTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: DispatchRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[DispatchRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Dispatch times in order
    pub fn times(&self) -> Vec<SimTime> {
        self.records.iter().map(|r| r.time).collect()
    }

    /// Event names in dispatch order
    pub fn names(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn records_at(&self, time: SimTime) -> Vec<&DispatchRecord> {
        self.records.iter().filter(|r| r.time == time).collect()
    }

    pub fn records_named(&self, name: &str) -> Vec<&DispatchRecord> {
        self.records.iter().filter(|r| r.name == name).collect()
    }

    pub fn records_with_signal(&self, signal: SignalKind) -> Vec<&DispatchRecord> {
        self.records.iter().filter(|r| r.signal == signal).collect()
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        serde_json::to_string(self)
            .map_err(|e| EngineError::Serialization(format!("trace export failed: {}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json)
            .map_err(|e| EngineError::Serialization(format!("trace import failed: {}", e)))
    }

    /// Hex SHA-256 of the trace's JSON form
    pub fn digest(&self) -> Result<String, EngineError> {
        let json = self.to_json()?;
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }
}
