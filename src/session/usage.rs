use std::collections::HashMap;

use crate::models::UsageRecord;

/// Per-model usage, written only at stream-terminal events
#[derive(Debug, Default, Clone)]
pub struct UsageLedger {
    records: HashMap<String, UsageRecord>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the record for `model_id`
    pub fn record(&mut self, model_id: impl Into<String>, usage: UsageRecord) {
        self.records.insert(model_id.into(), usage);
    }

    pub fn get(&self, model_id: &str) -> Option<&UsageRecord> {
        self.records.get(model_id)
    }

    pub fn snapshot(&self) -> HashMap<String, UsageRecord> {
        self.records.clone()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
