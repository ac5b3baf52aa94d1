//! Fuzzy reconciliation of OCR-extracted member names against a roster of
//! known members (C5).

use std::collections::BTreeSet;

const HONORIFIC_SUFFIXES: &[&str] = &["議員", "君", "氏", "委員"];
const HONORIFIC_PREFIXES: &[&str] = &["衆議院議員", "参議院議員"];

/// Known OCR confusions for the glyph set this domain's PDFs use most
/// often (a small substitution table, same shape as a confusable-glyph
/// table in any OCR post-processing pipeline).
const OCR_CONFUSIONS: &[(&str, &str)] = &[("渡邊", "渡辺"), ("髙橋", "高橋"), ("齋藤", "斉藤"), ("﨑", "崎")];

pub fn normalize(name: &str) -> String {
    let mut s = name.trim().to_string();
    for prefix in HONORIFIC_PREFIXES {
        if let Some(stripped) = s.strip_prefix(prefix) {
            s = stripped.to_string();
        }
    }
    for suffix in HONORIFIC_SUFFIXES {
        if let Some(stripped) = s.strip_suffix(suffix) {
            s = stripped.to_string();
        }
    }
    s.trim().to_string()
}

fn apply_confusion_table(name: &str) -> String {
    let mut s = name.to_string();
    for (confused, canonical) in OCR_CONFUSIONS {
        s = s.replace(confused, canonical);
    }
    s
}

/// Character-level Jaccard similarity over the (multi-)set of Unicode
/// scalar values in each string.
fn char_jaccard(a: &str, b: &str) -> f64 {
    let sa: BTreeSet<char> = a.chars().collect();
    let sb: BTreeSet<char> = b.chars().collect();
    if sa.is_empty() && sb.is_empty() {
        return 1.0;
    }
    let intersection = sa.intersection(&sb).count();
    let union = sa.union(&sb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Find the best match for `ocr_name` among `candidates`, returning the
/// canonical candidate string and a similarity score, or `None` if no
/// candidate scores at or above `threshold`.
pub fn best_match<'a>(ocr_name: &str, candidates: &'a [String], threshold: f64) -> (Option<&'a str>, f64) {
    let normalized = normalize(ocr_name);
    let corrected = apply_confusion_table(&normalized);

    for candidate in candidates {
        if normalize(candidate) == normalized {
            return (Some(candidate.as_str()), 1.0);
        }
    }
    for candidate in candidates {
        if normalize(candidate) == corrected {
            return (Some(candidate.as_str()), 1.0);
        }
    }

    let mut best: Option<(&str, f64)> = None;
    for candidate in candidates {
        let score = char_jaccard(&corrected, &normalize(candidate));
        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((candidate.as_str(), score));
        }
    }

    match best {
        Some((name, score)) if score >= threshold => (Some(name), score),
        Some((_, score)) => (None, score),
        None => (None, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_scores_one() {
        let candidates = vec!["山田太郎".to_string()];
        let (m, score) = best_match("山田太郎議員", &candidates, 0.7);
        assert_eq!(m, Some("山田太郎"));
        assert_eq!(score, 1.0);
    }

    #[test]
    fn ocr_confusion_is_corrected() {
        let candidates = vec!["渡辺次郎".to_string()];
        let (m, score) = best_match("渡邊次郎", &candidates, 0.7);
        assert_eq!(m, Some("渡辺次郎"));
        assert_eq!(score, 1.0);
    }

    #[test]
    fn below_threshold_returns_none() {
        let candidates = vec!["完全に異なる名前".to_string()];
        let (m, _score) = best_match("山田太郎", &candidates, 0.7);
        assert_eq!(m, None);
    }
}
