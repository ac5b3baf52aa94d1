//! Core domain types shared by every pipeline stage: the bill record, its
//! enums, and the small value types (`ValidationIssue`, `ProgressSnapshot`,
//! `StageTransition`) that flow between components.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One of the two legislative chambers a bill can originate in or pass
/// through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chamber {
    A,
    B,
}

impl Chamber {
    pub fn other(self) -> Chamber {
        match self {
            Chamber::A => Chamber::B,
            Chamber::B => Chamber::A,
        }
    }
}

/// Which chamber(s) a merged record's data currently comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceChambers {
    AOnly,
    BOnly,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitterKind {
    Government,
    Member,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Budget,
    Taxation,
    SocialSecurity,
    Diplomacy,
    Justice,
    Administration,
    Other,
    Unknown,
}

/// Bill lifecycle status. Roughly ten values, per the data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Draft,
    Submitted,
    UnderReview,
    CommitteeReview,
    PlenaryReview,
    Enacted,
    Rejected,
    Withdrawn,
    Expired,
    Unknown,
}

impl Status {
    /// The status a terminal `stage` implies, used to canonicalize a
    /// status/stage mismatch (§4.9 `validate_and_fix`) back to the value
    /// the consistency check expects. `None` for non-terminal stages,
    /// which tolerate any status.
    pub fn from_terminal_stage(stage: Stage) -> Option<Status> {
        match stage {
            Stage::Enacted => Some(Status::Enacted),
            Stage::Rejected => Some(Status::Rejected),
            Stage::Withdrawn => Some(Status::Withdrawn),
            Stage::Expired => Some(Status::Expired),
            _ => None,
        }
    }
}

/// Legislative stage machine position. Twelve values: the eight-stage
/// forward progression plus the five terminal branches (`Continued`
/// overlaps in count with `Unknown` bringing the enum to twelve variants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Submitted,
    Received,
    CommitteeReferred,
    CommitteeReview,
    CommitteeVote,
    PlenaryDebate,
    PlenaryVote,
    InterHouseSent,
    Enacted,
    Rejected,
    Withdrawn,
    Expired,
    Continued,
    Unknown,
}

impl Stage {
    /// Forward progression order used for transition detection and
    /// `unusual_progression` (backward transition) checks.
    pub const FORWARD_ORDER: &'static [Stage] = &[
        Stage::Submitted,
        Stage::Received,
        Stage::CommitteeReferred,
        Stage::CommitteeReview,
        Stage::CommitteeVote,
        Stage::PlenaryDebate,
        Stage::PlenaryVote,
        Stage::InterHouseSent,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Stage::Enacted | Stage::Rejected | Stage::Withdrawn | Stage::Expired | Stage::Continued
        )
    }

    pub fn forward_index(self) -> Option<usize> {
        Self::FORWARD_ORDER.iter().position(|s| *s == self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmendmentKind {
    Textual,
    Procedural,
    Withdrawal,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amendment {
    pub description: String,
    pub date: Option<DateTime<Utc>>,
    pub kind: AmendmentKind,
}

/// The six canonical lifecycle dates, in the order monotonicity is checked
/// against (§3 invariant, §8 property 5).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LifecycleDates {
    pub submitted_date: Option<DateTime<Utc>>,
    pub committee_referral_date: Option<DateTime<Utc>>,
    pub committee_report_date: Option<DateTime<Utc>>,
    pub final_vote_date: Option<DateTime<Utc>>,
    pub promulgated_date: Option<DateTime<Utc>>,
    pub implementation_date: Option<DateTime<Utc>>,
}

impl LifecycleDates {
    /// Dates in canonical order, skipping unset fields.
    pub fn ordered(&self) -> Vec<(&'static str, DateTime<Utc>)> {
        let mut out = Vec::with_capacity(6);
        if let Some(d) = self.submitted_date {
            out.push(("submitted_date", d));
        }
        if let Some(d) = self.committee_referral_date {
            out.push(("committee_referral_date", d));
        }
        if let Some(d) = self.committee_report_date {
            out.push(("committee_report_date", d));
        }
        if let Some(d) = self.final_vote_date {
            out.push(("final_vote_date", d));
        }
        if let Some(d) = self.promulgated_date {
            out.push(("promulgated_date", d));
        }
        if let Some(d) = self.implementation_date {
            out.push(("implementation_date", d));
        }
        out
    }

    /// Indices (into the canonical six-field order) where `d_i > d_{i+1}`.
    pub fn monotonicity_violations(&self) -> Vec<(&'static str, &'static str)> {
        let ordered = self.ordered();
        let mut violations = Vec::new();
        for window in ordered.windows(2) {
            let (name_a, a) = window[0];
            let (name_b, b) = window[1];
            if a > b {
                violations.push((name_a, name_b));
            }
        }
        violations
    }

    fn field(&self, name: &str) -> Option<DateTime<Utc>> {
        match name {
            "submitted_date" => self.submitted_date,
            "committee_referral_date" => self.committee_referral_date,
            "committee_report_date" => self.committee_report_date,
            "final_vote_date" => self.final_vote_date,
            "promulgated_date" => self.promulgated_date,
            "implementation_date" => self.implementation_date,
            _ => None,
        }
    }

    fn set_field(&mut self, name: &str, value: Option<DateTime<Utc>>) {
        match name {
            "submitted_date" => self.submitted_date = value,
            "committee_referral_date" => self.committee_referral_date = value,
            "committee_report_date" => self.committee_report_date = value,
            "final_vote_date" => self.final_vote_date = value,
            "promulgated_date" => self.promulgated_date = value,
            "implementation_date" => self.implementation_date = value,
            _ => {}
        }
    }

    /// Reformat the out-of-order pair reported by `monotonicity_violations`
    /// for the violation starting at `field`: swap it with the next
    /// present date in canonical order. Returns whether a swap was made.
    pub fn fix_violation(&mut self, field: &str) -> bool {
        let ordered = self.ordered();
        let Some(pos) = ordered.iter().position(|(name, _)| *name == field) else { return false };
        let Some(&(next_name, _)) = ordered.get(pos + 1) else { return false };
        let (Some(a), Some(b)) = (self.field(field), self.field(next_name)) else { return false };
        if a > b {
            self.set_field(field, Some(b));
            self.set_field(next_name, Some(a));
            true
        } else {
            false
        }
    }
}

/// The central record type. Identity is `bill_id` + `chamber_of_origin`
/// before merge; `bill_id` alone afterwards (§3 invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillRecord {
    pub bill_id: String,
    pub chamber_of_origin: Chamber,
    pub session_number: u32,
    pub source_urls: BTreeSet<String>,

    pub title: String,
    pub outline: String,
    pub background: String,
    pub expected_effects: String,
    pub key_provisions: Vec<String>,
    pub related_laws: BTreeSet<String>,
    pub category: Category,
    pub submitter_kind: SubmitterKind,
    pub sponsoring_ministry: Option<String>,
    pub submitting_members: Vec<String>,
    pub supporting_members: Vec<String>,

    pub dates: LifecycleDates,

    pub status: Status,
    pub stage: Stage,
    pub committee_assignments: BTreeMap<Chamber, String>,
    pub voting_results: BTreeMap<Chamber, String>,
    pub amendments: Vec<Amendment>,

    pub source_chambers: SourceChambers,
    pub last_updated: DateTime<Utc>,
    pub data_quality_score: f64,
}

impl BillRecord {
    /// A bare record with every optional/collection field empty, used as
    /// the starting point for parsers and for minimal-record test fixtures
    /// (Scenario B).
    pub fn new(bill_id: impl Into<String>, chamber_of_origin: Chamber, session_number: u32) -> Self {
        BillRecord {
            bill_id: bill_id.into(),
            chamber_of_origin,
            session_number,
            source_urls: BTreeSet::new(),
            title: String::new(),
            outline: String::new(),
            background: String::new(),
            expected_effects: String::new(),
            key_provisions: Vec::new(),
            related_laws: BTreeSet::new(),
            category: Category::Unknown,
            submitter_kind: SubmitterKind::Unknown,
            sponsoring_ministry: None,
            submitting_members: Vec::new(),
            supporting_members: Vec::new(),
            dates: LifecycleDates::default(),
            status: Status::Unknown,
            stage: Stage::Unknown,
            committee_assignments: BTreeMap::new(),
            voting_results: BTreeMap::new(),
            amendments: Vec::new(),
            source_chambers: match chamber_of_origin {
                Chamber::A => SourceChambers::AOnly,
                Chamber::B => SourceChambers::BOnly,
            },
            last_updated: Utc::now(),
            data_quality_score: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    /// Weight used by the validator's consistency score (§4.6).
    pub fn weight(self) -> f64 {
        match self {
            Severity::Critical => 0.2,
            Severity::Warning => 0.1,
            Severity::Info => 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingRequired,
    InvalidFormat,
    InvalidEnum,
    PoorJapaneseText,
    InconsistentData,
    DuplicateRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub bill_id: String,
    pub field_name: Option<String>,
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
    pub current_value: String,
    pub suggested_fix: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub bill_id: String,
    pub snapshot_at: DateTime<Utc>,
    pub stage: Stage,
    pub chamber: Chamber,
    pub committee: Option<String>,
    pub last_action: Option<String>,
    pub last_action_at: Option<DateTime<Utc>>,
    pub next_expected_action: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTransition {
    pub from_stage: Stage,
    pub to_stage: Stage,
    pub at: DateTime<Utc>,
    pub chamber: Chamber,
    pub committee: Option<String>,
    pub duration_days: i64,
}
