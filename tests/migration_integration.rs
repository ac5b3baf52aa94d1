mod common;

use std::collections::HashMap;

use common::plausible_record;
use diet_ingest::migration;
use diet_ingest::model::Chamber;
use diet_ingest::store::{InMemoryRecordStore, RecordStore, StoreBackedReportSink};

// Runs the five-phase migration orchestrator over a small record set and
// confirms the report is both returned and durably persisted through the
// record store's artifact namespace, end to end.

#[test]
fn migration_report_round_trips_through_store() {
    let mut records = HashMap::new();
    for (id, chamber) in [("a-1", Chamber::A), ("a-2", Chamber::A), ("b-1", Chamber::B)] {
        let mut record = plausible_record(id, chamber, "", "");
        record.title = String::new();
        records.insert(id.to_string(), record);
    }

    let store = InMemoryRecordStore::new();
    let sink = StoreBackedReportSink { store: &store };

    let report = migration::run_migration(&mut records, &sink).expect("migration should not error");
    assert_eq!(report.phases_timing.len(), 5);

    let key = format!("migration_report_{}", report.execution_id);
    let persisted = store.get_artifact(&key).expect("report should be persisted");
    let decoded: migration::MigrationReport = serde_json::from_slice(&persisted).unwrap();
    assert_eq!(decoded.execution_id, report.execution_id);
    assert_eq!(decoded.plan_id, report.plan_id);
}
