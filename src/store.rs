//! Record store abstraction (§6): the production-grade backing store is
//! an external collaborator (§1 Non-goals); this crate ships only the
//! trait plus an in-memory implementation sufficient to drive the
//! pipeline and its tests.

use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;

use crate::model::BillRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record `{0}` not found")]
    NotFound(String),
}

/// A filter over scalar record fields: a conjunction of equalities and
/// booleans (§6 — no join semantics assumed).
#[derive(Debug, Clone, Default)]
pub struct FilterExpr {
    pub chamber_of_origin: Option<crate::model::Chamber>,
    pub status: Option<crate::model::Status>,
    pub session_number: Option<u32>,
}

impl FilterExpr {
    fn matches(&self, record: &BillRecord) -> bool {
        self.chamber_of_origin.is_none_or(|c| c == record.chamber_of_origin)
            && self.status.is_none_or(|s| s == record.status)
            && self.session_number.is_none_or(|s| s == record.session_number)
    }
}

pub trait RecordStore: Send + Sync {
    fn get(&self, id: &str) -> Option<BillRecord>;
    fn list(&self, filter: &FilterExpr, max: usize) -> Vec<BillRecord>;
    fn create(&self, record: BillRecord) -> Result<(), StoreError>;
    fn update(&self, id: &str, record: BillRecord) -> Result<(), StoreError>;
    fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Artifact namespace used by the migration orchestrator's report
    /// sink (§6 persisted artifacts) rather than a bare filesystem path.
    fn put_artifact(&self, key: &str, value: Vec<u8>);
    fn get_artifact(&self, key: &str) -> Option<Vec<u8>>;
}

#[derive(Default)]
pub struct InMemoryRecordStore {
    records: Mutex<HashMap<String, BillRecord>>,
    artifacts: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn get(&self, id: &str) -> Option<BillRecord> {
        self.records.lock().unwrap().get(id).cloned()
    }

    fn list(&self, filter: &FilterExpr, max: usize) -> Vec<BillRecord> {
        self.records.lock().unwrap().values().filter(|r| filter.matches(r)).take(max).cloned().collect()
    }

    fn create(&self, record: BillRecord) -> Result<(), StoreError> {
        self.records.lock().unwrap().insert(record.bill_id.clone(), record);
        Ok(())
    }

    fn update(&self, id: &str, record: BillRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap();
        if !records.contains_key(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }
        records.insert(id.to_string(), record);
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.records.lock().unwrap().remove(id).map(|_| ()).ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn put_artifact(&self, key: &str, value: Vec<u8>) {
        self.artifacts.lock().unwrap().insert(key.to_string(), value);
    }

    fn get_artifact(&self, key: &str) -> Option<Vec<u8>> {
        self.artifacts.lock().unwrap().get(key).cloned()
    }
}

/// Adapts any [`RecordStore`] into a [`crate::migration::ReportSink`],
/// keying reports as `migration_report_<execution_id>` (§6).
pub struct StoreBackedReportSink<'a> {
    pub store: &'a dyn RecordStore,
}

impl crate::migration::ReportSink for StoreBackedReportSink<'_> {
    fn save(&self, report: &crate::migration::MigrationReport) -> anyhow::Result<()> {
        let key = format!("migration_report_{}", report.execution_id);
        let value = serde_json::to_vec(report)?;
        self.store.put_artifact(&key, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Chamber;

    #[test]
    fn create_then_get_round_trips() {
        let store = InMemoryRecordStore::new();
        let record = BillRecord::new("217-1", Chamber::A, 217);
        store.create(record.clone()).unwrap();
        let fetched = store.get("217-1").unwrap();
        assert_eq!(fetched.bill_id, record.bill_id);
    }

    #[test]
    fn update_missing_record_errors() {
        let store = InMemoryRecordStore::new();
        let record = BillRecord::new("217-1", Chamber::A, 217);
        assert!(store.update("217-1", record).is_err());
    }

    #[test]
    fn list_applies_filter() {
        let store = InMemoryRecordStore::new();
        store.create(BillRecord::new("a-1", Chamber::A, 217)).unwrap();
        store.create(BillRecord::new("b-1", Chamber::B, 217)).unwrap();
        let filter = FilterExpr { chamber_of_origin: Some(Chamber::A), ..Default::default() };
        let results = store.list(&filter, 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].bill_id, "a-1");
    }
}
