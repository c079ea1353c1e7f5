//! Named start/end timestamps collected during boot.
//!
//! Purely observational: nothing in the lifecycle reads these back.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingRecord {
    pub index: usize,
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    /// Milliseconds between `start` and `end`
    pub duration: Option<i64>,
    pub pid: u32,
}

#[derive(Default)]
struct TimingTable {
    records: Vec<TimingRecord>,
    by_name: HashMap<String, usize>,
}

#[derive(Clone, Default)]
pub struct Timing {
    table: Arc<Mutex<TimingTable>>,
}

impl Timing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a record. Starting a name that is already open restarts it.
    pub fn start(&self, name: impl Into<String>) {
        let name = name.into();
        let mut table = self.lock();
        let index = table.records.len();
        table.records.push(TimingRecord {
            index,
            name: name.clone(),
            start: Utc::now(),
            end: None,
            duration: None,
            pid: std::process::id(),
        });
        table.by_name.insert(name, index);
    }

    /// Close a record; unknown names are ignored.
    pub fn end(&self, name: &str) {
        let mut table = self.lock();
        let Some(&index) = table.by_name.get(name) else {
            tracing::debug!("timing end without start: {}", name);
            return;
        };
        let record = &mut table.records[index];
        if record.end.is_some() {
            return;
        }
        let end = Utc::now();
        record.duration = Some((end - record.start).num_milliseconds());
        record.end = Some(end);
    }

    pub fn get(&self, name: &str) -> Option<TimingRecord> {
        let table = self.lock();
        table
            .by_name
            .get(name)
            .map(|&index| table.records[index].clone())
    }

    pub fn records(&self) -> Vec<TimingRecord> {
        self.lock().records.clone()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.lock().records)
    }

    fn lock(&self) -> MutexGuard<'_, TimingTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
