use crate::schema::{DiscardedRecord, ExtractedRecord, RawLineItem};
use chrono::{Datelike, NaiveDate};
use log::debug;

/// Fiscal years outside this window are treated as extraction garbage.
const FISCAL_YEAR_RANGE: std::ops::RangeInclusive<i32> = 1900..=2200;

/// A document restates a year when it files after that year closed.
pub fn is_restatement(filing_date: NaiveDate, fiscal_year: i32) -> bool {
    filing_date.year() > fiscal_year
}

/// Validate extractor output into the engine's read-only input model.
/// Malformed records become discard entries with a reason; they never abort
/// ingestion of the rest.
pub fn convert_records(
    records: &[ExtractedRecord],
) -> (Vec<RawLineItem>, Vec<DiscardedRecord>) {
    let mut items = Vec::with_capacity(records.len());
    let mut discards = Vec::new();

    for record in records {
        match validate(record) {
            Ok(item) => items.push(item),
            Err(reason) => {
                debug!(
                    "Discarding record from document {}: {}",
                    record.source_document_id, reason
                );
                discards.push(DiscardedRecord {
                    source_document_id: record.source_document_id.clone(),
                    label: record.label.clone(),
                    fiscal_year: record.fiscal_year,
                    reason,
                });
            }
        }
    }

    (items, discards)
}

fn validate(record: &ExtractedRecord) -> Result<RawLineItem, String> {
    let label = match &record.label {
        None => return Err("missing label".to_string()),
        Some(label) if label.trim().is_empty() => {
            return Err("blank label".to_string());
        }
        Some(label) => label.clone(),
    };

    if let Some(value) = record.value {
        if !value.is_finite() {
            return Err(format!("non-finite value {value}"));
        }
    }

    if !FISCAL_YEAR_RANGE.contains(&record.fiscal_year) {
        return Err(format!("implausible fiscal year {}", record.fiscal_year));
    }

    Ok(RawLineItem {
        source_document_id: record.source_document_id.clone(),
        label,
        fiscal_year: record.fiscal_year,
        value: record.value,
        statement_type: record.statement_type,
        filing_date: record.filing_date,
        ordinal: record.ordinal,
        level: record.level,
        is_total: record.is_total,
        is_restatement_candidate: is_restatement(record.filing_date, record.fiscal_year),
    })
}
