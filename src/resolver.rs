use crate::schema::{CompiledCell, RawLineItem};
use chrono::NaiveDate;

/// Preference key for one candidate, compared descending. Valued
/// observations beat missing cells, restatements beat originals, later
/// filings beat earlier ones, and the document id is the deterministic
/// last resort. The value's bit pattern closes the order: duplicate
/// observations from one document must not resolve by arrival order.
fn rank(item: &RawLineItem) -> (bool, bool, NaiveDate, &str, Option<u64>) {
    (
        item.value.is_some(),
        item.is_restatement_candidate,
        item.filing_date,
        item.source_document_id.as_str(),
        value_bits(item.value),
    )
}

fn value_bits(value: Option<f64>) -> Option<u64> {
    value.map(f64::to_bits)
}

/// Decide which observation wins for one (identity, fiscal year) cell.
///
/// Policy, highest priority first:
/// 1. A restatement candidate supersedes the original filing's value.
/// 2. Among restatements, the most recently filed document wins.
/// 3. Otherwise the original filing's value stands.
/// 4. Disagreeing non-restatement candidates are a data-quality anomaly:
///    the most recently filed document wins and the cell is flagged
///    `conflict` for downstream audit.
///
/// `candidates` must be non-empty; callers only build groups from observed
/// items.
pub fn resolve(identity_id: u32, fiscal_year: i32, candidates: &[&RawLineItem]) -> CompiledCell {
    debug_assert!(!candidates.is_empty());

    let mut pool: Vec<&RawLineItem> = candidates.to_vec();
    pool.sort_by(|a, b| rank(b).cmp(&rank(a)));
    let winner = pool[0];

    // Tied on everything but document id, with different values: only the
    // arbitrary fallback decided, so mark the cell.
    let tied_conflict = pool.get(1).is_some_and(|runner| {
        runner.is_restatement_candidate == winner.is_restatement_candidate
            && runner.filing_date == winner.filing_date
            && runner.value.is_some() == winner.value.is_some()
            && value_bits(runner.value) != value_bits(winner.value)
    });

    // No restatement in play, yet the valued originals disagree.
    let original_conflict = !winner.is_restatement_candidate && {
        let mut distinct: Vec<u64> = candidates
            .iter()
            .filter(|c| !c.is_restatement_candidate)
            .filter_map(|c| value_bits(c.value))
            .collect();
        distinct.sort_unstable();
        distinct.dedup();
        distinct.len() > 1
    };

    CompiledCell {
        identity_id,
        fiscal_year,
        value: winner.value,
        restated: winner.is_restatement_candidate,
        conflict: tied_conflict || original_conflict,
        source_document_id: winner.source_document_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::StatementType;
    use chrono::NaiveDate;

    fn item(doc: &str, filed: (i32, u32, u32), year: i32, value: Option<f64>) -> RawLineItem {
        let filing_date = NaiveDate::from_ymd_opt(filed.0, filed.1, filed.2).unwrap();
        RawLineItem {
            source_document_id: doc.to_string(),
            label: "Revenue".to_string(),
            fiscal_year: year,
            value,
            statement_type: StatementType::IncomeStatement,
            filing_date,
            ordinal: None,
            level: None,
            is_total: None,
            is_restatement_candidate: filed.0 > year,
        }
    }

    #[test]
    fn test_restatement_beats_original() {
        let original = item("fy2022", (2022, 12, 31), 2022, Some(100.0));
        let restated = item("fy2023", (2024, 3, 1), 2022, Some(110.0));

        let cell = resolve(0, 2022, &[&original, &restated]);
        assert_eq!(cell.value, Some(110.0));
        assert!(cell.restated);
        assert!(!cell.conflict);
        assert_eq!(cell.source_document_id, "fy2023");
    }

    #[test]
    fn test_latest_restatement_wins() {
        let original = item("fy2022", (2022, 12, 31), 2022, Some(100.0));
        let first_restatement = item("fy2023", (2024, 3, 1), 2022, Some(110.0));
        let second_restatement = item("fy2024", (2025, 3, 1), 2022, Some(115.0));

        let cell = resolve(0, 2022, &[&original, &second_restatement, &first_restatement]);
        assert_eq!(cell.value, Some(115.0));
        assert!(cell.restated);
        assert!(!cell.conflict);
    }

    #[test]
    fn test_original_stands_without_restatement() {
        // Filed within its own fiscal year, so not a restatement candidate.
        let original = item("fy2022", (2022, 12, 31), 2022, Some(100.0));

        let cell = resolve(0, 2022, &[&original]);
        assert_eq!(cell.value, Some(100.0));
        assert!(!cell.restated);
        assert!(!cell.conflict);
    }

    #[test]
    fn test_conflicting_originals_flagged() {
        let earlier = item("doc-a", (2023, 2, 1), 2023, Some(100.0));
        let later = item("doc-b", (2023, 5, 1), 2023, Some(105.0));

        let cell = resolve(0, 2023, &[&earlier, &later]);
        assert_eq!(cell.value, Some(105.0));
        assert!(!cell.restated);
        assert!(cell.conflict);
        assert_eq!(cell.source_document_id, "doc-b");
    }

    #[test]
    fn test_agreeing_originals_not_flagged() {
        let a = item("doc-a", (2023, 2, 1), 2023, Some(100.0));
        let b = item("doc-b", (2023, 5, 1), 2023, Some(100.0));

        let cell = resolve(0, 2023, &[&a, &b]);
        assert_eq!(cell.value, Some(100.0));
        assert!(!cell.conflict);
    }

    #[test]
    fn test_same_day_restatements_tie_break_and_flag() {
        let a = item("doc-a", (2024, 3, 1), 2022, Some(110.0));
        let b = item("doc-b", (2024, 3, 1), 2022, Some(112.0));

        let cell = resolve(0, 2022, &[&a, &b]);
        // Larger document id wins the deterministic fallback.
        assert_eq!(cell.source_document_id, "doc-b");
        assert_eq!(cell.value, Some(112.0));
        assert!(cell.restated);
        assert!(cell.conflict);
    }

    #[test]
    fn test_duplicate_observations_resolve_order_independently() {
        // Same document, same filing date, two disagreeing values: the
        // winner must not depend on which one arrived first.
        let a = item("doc-a", (2023, 5, 1), 2023, Some(100.0));
        let b = item("doc-a", (2023, 5, 1), 2023, Some(105.0));

        let forward = resolve(0, 2023, &[&a, &b]);
        let backward = resolve(0, 2023, &[&b, &a]);

        assert_eq!(forward, backward);
        assert_eq!(forward.value, Some(105.0));
        assert!(forward.conflict);
    }

    #[test]
    fn test_null_never_beats_value() {
        let valued_original = item("fy2022", (2022, 12, 31), 2022, Some(100.0));
        let null_restatement = item("fy2023", (2024, 3, 1), 2022, None);

        let cell = resolve(0, 2022, &[&valued_original, &null_restatement]);
        assert_eq!(cell.value, Some(100.0));
        assert!(!cell.restated);
    }

    #[test]
    fn test_all_null_yields_null_cell() {
        let a = item("doc-a", (2023, 3, 1), 2022, None);
        let b = item("doc-b", (2024, 3, 1), 2022, None);

        let cell = resolve(0, 2022, &[&a, &b]);
        assert_eq!(cell.value, None);
        assert!(cell.restated);
        assert!(!cell.conflict);
    }
}
