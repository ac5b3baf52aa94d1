use diet_ingest::model::{BillRecord, Chamber, Status};

/// A record with just enough filled in to be a plausible bill, for
/// tests that exercise the pipeline rather than edge-case inputs.
pub fn plausible_record(id: &str, chamber: Chamber, title: &str, outline: &str) -> BillRecord {
    let mut record = BillRecord::new(id, chamber, 217);
    record.title = title.to_string();
    record.outline = outline.to_string();
    record.status = Status::UnderReview;
    record
}
