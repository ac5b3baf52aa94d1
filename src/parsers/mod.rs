//! HTML listing/detail parsers (C2 chamber A, C3 chamber B). Both chambers
//! implement the same [`ChamberParser`] contract; only their header-term
//! vocabularies and table layouts differ, so the field-extraction
//! machinery lives here and is shared.

pub mod chamber_a;
pub mod chamber_b;

use std::collections::BTreeSet;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

use crate::model::{BillRecord, Category, Chamber, Status, SubmitterKind};

/// A seed record scraped from an index/listing page, before the detail
/// page has been fetched and parsed.
#[derive(Debug, Clone)]
pub struct BillSeed {
    pub bill_id: String,
    pub title: String,
    pub status: Status,
    pub submitter_kind: SubmitterKind,
    pub detail_url: String,
}

/// Shared contract both chamber parsers implement (§4.2).
pub trait ChamberParser {
    const CHAMBER: Chamber;
    /// Header terms (in this chamber's table vocabulary) that mark a
    /// table as a bill listing.
    const HEADER_TERMS: &'static [&'static str];

    fn parse_index(html: &str) -> Vec<BillSeed> {
        let doc = Html::parse_document(html);
        let table_sel = Selector::parse("table").unwrap();
        let row_sel = Selector::parse("tr").unwrap();
        let cell_sel = Selector::parse("td,th").unwrap();

        let mut seeds = Vec::new();
        for table in doc.select(&table_sel) {
            let rows: Vec<ElementRef> = table.select(&row_sel).collect();
            let Some(header_row) = rows.first() else { continue };
            let header_text = collapse_whitespace(&header_row.text().collect::<String>());
            if !Self::HEADER_TERMS.iter().any(|term| header_text.contains(term)) {
                continue;
            }
            for row in rows.iter().skip(1) {
                let cells: Vec<String> = row
                    .select(&cell_sel)
                    .map(|c| collapse_whitespace(&c.text().collect::<String>()))
                    .collect();
                let Some(first) = cells.first() else { continue };
                if first.is_empty() || Self::HEADER_TERMS.contains(&first.as_str()) {
                    continue;
                }
                let detail_url = row
                    .select(&Selector::parse("a").unwrap())
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .unwrap_or("")
                    .to_string();
                seeds.push(BillSeed {
                    bill_id: first.clone(),
                    title: cells.get(1).cloned().unwrap_or_default(),
                    status: parse_status(cells.get(2).map(String::as_str).unwrap_or("")),
                    submitter_kind: parse_submitter_kind(cells.get(3).map(String::as_str).unwrap_or("")),
                    detail_url,
                });
            }
        }
        seeds
    }

    fn parse_detail(html: &str, bill_id: &str, session_number: u32) -> BillRecord {
        let doc = Html::parse_document(html);
        let mut record = BillRecord::new(bill_id, Self::CHAMBER, session_number);
        record.source_urls = BTreeSet::new();

        record.title = find_section(&doc, &["題名", "法律案名"]).unwrap_or_default();
        record.outline = find_section(&doc, &["概要", "要旨"]).unwrap_or_default();
        record.background = find_section(&doc, &["提案理由", "背景"]).unwrap_or_default();
        record.expected_effects = find_section(&doc, &["期待される効果", "効果"]).unwrap_or_default();
        if let Some(text) = find_section(&doc, &["主な内容", "主要条項"]) {
            record.key_provisions = text.split(['、', '\n']).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect();
        }
        if let Some(text) = find_section(&doc, &["関係法律", "関連法令"]) {
            record.related_laws = text.split(['、', '\n']).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect();
        }
        if let Some(text) = find_section(&doc, &["提出者", "発議者"]) {
            record.submitting_members = text.split(['、', ' ']).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect();
        }
        if let Some(text) = find_section(&doc, &["賛成者", "賛同者"]) {
            record.supporting_members = text.split(['、', ' ']).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect();
        }
        record.sponsoring_ministry = find_section(&doc, &["所管省庁", "提出省庁"])
            .and_then(|t| MINISTRY_RE.find(&t).map(|m| m.as_str().to_string()));
        if let Some(text) = find_section(&doc, &["委員会付託", "付託委員会"])
            && let Some(m) = COMMITTEE_RE.find(&text) {
                record.committee_assignments.insert(Self::CHAMBER, m.as_str().to_string());
            }
        if let Some(text) = find_section(&doc, &["施行期日", "施行日"])
            && let Some(m) = DATE_RE.find(&text) {
                record.dates.implementation_date = parse_era_date(m.as_str());
            }
        if let Some(text) = find_section(&doc, &["修正", "附帯決議"]) {
            for line in text.split('\n').map(str::trim).filter(|s| !s.is_empty()) {
                record.amendments.push(crate::model::Amendment {
                    description: line.to_string(),
                    date: DATE_RE.find(line).and_then(|m| parse_era_date(m.as_str())),
                    kind: crate::model::AmendmentKind::Unknown,
                });
            }
        }

        record.category = Category::Unknown;
        record.data_quality_score = quality_score(&record);
        record
    }
}

static MINISTRY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+省|\S+庁").unwrap());
static COMMITTEE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+委員会").unwrap());
/// Matches dates in any of the three Japanese era notations, or ISO form.
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(令和|平成|昭和)\d{1,2}年\d{1,2}月\d{1,2}日|\d{4}-\d{2}-\d{2}").unwrap()
});

/// Dispatch to the chamber-appropriate detail parser (C10 `scrape_missing`
/// calls this once it has a fetched detail page in hand).
pub fn parse_detail(chamber: Chamber, html: &str, bill_id: &str, session_number: u32) -> BillRecord {
    match chamber {
        Chamber::A => chamber_a::ChamberAParser::parse_detail(html, bill_id, session_number),
        Chamber::B => chamber_b::ChamberBParser::parse_detail(html, bill_id, session_number),
    }
}

pub fn collapse_whitespace(s: &str) -> String {
    let normalized: String = s
        .chars()
        .map(|c| match c {
            '\u{3000}' => ' ', // full-width space
            '，' => ',',
            '．' => '.',
            other => other,
        })
        .collect();
    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Search the document for a keyword-matching section header, then take
/// the nearest following sibling with substantial (>50 char) content, or
/// fall back to the header's parent's text (§4.2 field extraction).
fn find_section(doc: &Html, keywords: &[&str]) -> Option<String> {
    let all_sel = Selector::parse("h1,h2,h3,h4,dt,th,strong,b").unwrap();
    for el in doc.select(&all_sel) {
        let header_text = collapse_whitespace(&el.text().collect::<String>());
        if !keywords.iter().any(|k| header_text.contains(k)) {
            continue;
        }
        if let Some(sibling) = next_element_sibling(el) {
            let text = collapse_whitespace(&sibling.text().collect::<String>());
            if text.chars().count() > 50 {
                return Some(text);
            }
        }
        if let Some(parent) = el.parent().and_then(ElementRef::wrap) {
            let text = collapse_whitespace(&parent.text().collect::<String>());
            let stripped = text.replacen(&header_text, "", 1);
            let stripped = stripped.trim();
            if !stripped.is_empty() {
                return Some(stripped.to_string());
            }
        }
    }
    None
}

fn next_element_sibling(el: ElementRef) -> Option<ElementRef> {
    let mut node = el.next_sibling();
    while let Some(n) = node {
        if let Some(er) = ElementRef::wrap(n) {
            return Some(er);
        }
        node = n.next_sibling();
    }
    None
}

fn parse_status(text: &str) -> Status {
    match text {
        t if t.contains("可決") || t.contains("成立") => Status::Enacted,
        t if t.contains("否決") => Status::Rejected,
        t if t.contains("撤回") => Status::Withdrawn,
        t if t.contains("廃案") => Status::Expired,
        t if t.contains("審議中") || t.contains("審査中") => Status::UnderReview,
        t if t.contains("委員会") => Status::CommitteeReview,
        t if t.contains("本会議") => Status::PlenaryReview,
        t if t.contains("提出") => Status::Submitted,
        _ => Status::Unknown,
    }
}

fn parse_submitter_kind(text: &str) -> SubmitterKind {
    match text {
        t if t.contains("内閣") || t.contains("政府") => SubmitterKind::Government,
        t if t.contains("議員") => SubmitterKind::Member,
        _ => SubmitterKind::Unknown,
    }
}

/// Converts a Japanese-era or ISO date string into a UTC timestamp. Eras:
/// Reiwa (2019-), Heisei (1989-2019), Showa (1926-1989).
fn parse_era_date(text: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    use chrono::{NaiveDate, TimeZone, Utc};

    if let Ok(d) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Utc.from_local_datetime(&d.and_hms_opt(0, 0, 0)?).single();
    }
    let era_base = if text.starts_with('令') {
        2018
    } else if text.starts_with('平') {
        1988
    } else if text.starts_with('昭') {
        1925
    } else {
        return None;
    };
    let numbers: Vec<u32> = text
        .chars()
        .collect::<String>()
        .split(|c: char| !c.is_ascii_digit())
        .filter_map(|s| s.parse().ok())
        .collect();
    let [year_offset, month, day] = numbers.as_slice() else { return None };
    let year = era_base + *year_offset as i32;
    let date = NaiveDate::from_ymd_opt(year, *month, *day)?;
    Utc.from_local_datetime(&date.and_hms_opt(0, 0, 0)?).single()
}

/// Weighted completeness score: core fields weight 2, enhanced weight 1,
/// clamped to [0,1] (§4.2 quality score).
fn quality_score(record: &BillRecord) -> f64 {
    let core: [bool; 3] = [!record.title.is_empty(), !record.bill_id.is_empty(), record.session_number > 0];
    let enhanced: [bool; 6] = [
        !record.outline.is_empty(),
        !record.background.is_empty(),
        !record.expected_effects.is_empty(),
        !record.key_provisions.is_empty(),
        !record.related_laws.is_empty(),
        !record.submitting_members.is_empty(),
    ];
    let accumulated: f64 = core.iter().filter(|b| **b).count() as f64 * 2.0 + enhanced.iter().filter(|b| **b).count() as f64;
    let total = core.len() as f64 * 2.0 + enhanced.len() as f64;
    (accumulated / total).clamp(0.0, 1.0)
}
