mod common;

use chrono::Utc;
use common::plausible_record;
use diet_ingest::merge::{self, MergeStrategy};
use diet_ingest::model::{Chamber, SourceChambers};
use diet_ingest::progress;
use diet_ingest::validator::{self, ValidationLevel};

// Full pipeline: two per-chamber scrapes of the same bill merge into one
// record, that record validates cleanly, and its progress can be tracked
// — exercising merge -> validate -> track in one pass rather than each
// component in isolation.

#[test]
fn merged_record_validates_and_tracks() {
    let a = plausible_record("S-217-1", Chamber::A, "デジタル社会形成基本法案", "短い概要");
    let mut b = plausible_record(
        "H-217-1",
        Chamber::B,
        "デジタル社会形成基本法案",
        "デジタル社会の形成に関する基本理念を定め、施策を総合的かつ計画的に推進する",
    );
    b.data_quality_score = 0.8;

    let results = merge::merge(&[a], &[b], MergeStrategy::MostComplete);
    assert_eq!(results.len(), 1);
    let merged = &results[0].record;
    assert_eq!(merged.source_chambers, SourceChambers::Both);
    assert!(!merged.outline.is_empty());

    let validation = validator::validate(merged, ValidationLevel::Standard);
    assert!(validation.is_valid, "issues: {:?}", validation.issues);

    let tracking = progress::track(merged, &[], Utc::now());
    assert_eq!(tracking.snapshot.bill_id, merged.bill_id);
    assert!(tracking.alerts.iter().all(|a| a.kind != diet_ingest::progress::AlertKind::MissingOutline));
}
