use crate::normalizer::normalize;
use crate::registry::IdentityRegistry;
use crate::resolver;
use crate::schema::{
    CompilationOutput, CompiledRow, CompiledStatement, CompilerConfig, DiscardedRecord,
    RawLineItem, StatementType,
};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// Runs one full compilation for a (company, statement type) pair. Owns no
/// state across runs: the identity registry is rebuilt from the complete
/// raw-item history every time, which keeps the output a pure function of
/// its input.
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn compile(
        &self,
        company_id: &str,
        statement_type: StatementType,
        items: &[RawLineItem],
    ) -> CompilationOutput {
        let mut discards = Vec::new();

        let mut relevant: Vec<&RawLineItem> = Vec::with_capacity(items.len());
        for item in items {
            if item.statement_type == statement_type {
                relevant.push(item);
            } else {
                discards.push(DiscardedRecord {
                    source_document_id: item.source_document_id.clone(),
                    label: Some(item.label.clone()),
                    fiscal_year: item.fiscal_year,
                    reason: format!(
                        "statement type mismatch: expected {:?}, got {:?}",
                        statement_type, item.statement_type
                    ),
                });
            }
        }

        // Canonical processing order. Registration order must not depend on
        // how the caller happened to arrange the input: sort by filing date,
        // document, then in-document position (alphabetical when the
        // extractor gave no ordinals).
        relevant.sort_by(|a, b| canonical_order(a).cmp(&canonical_order(b)));

        let mut registry =
            IdentityRegistry::new(company_id, statement_type, self.config.clone());
        let mut groups: BTreeMap<(u32, i32), Vec<&RawLineItem>> = BTreeMap::new();

        for item in relevant {
            let key = normalize(&item.label, &self.config.abbreviations);
            if key.is_empty() {
                discards.push(DiscardedRecord {
                    source_document_id: item.source_document_id.clone(),
                    label: Some(item.label.clone()),
                    fiscal_year: item.fiscal_year,
                    reason: "label normalizes to empty".to_string(),
                });
                continue;
            }

            let total_hint = item.is_total.or_else(|| infer_total_hint(&key));
            let id = registry.register(&key, &item.label, item.level, total_hint);
            groups.entry((id, item.fiscal_year)).or_default().push(item);
        }

        let mut cells = BTreeMap::new();
        let mut years = BTreeSet::new();
        for ((identity_id, fiscal_year), candidates) in &groups {
            let cell = resolver::resolve(*identity_id, *fiscal_year, candidates);
            years.insert(*fiscal_year);
            cells.insert((*identity_id, *fiscal_year), cell);
        }

        let years: Vec<i32> = years.into_iter().rev().collect();

        // Presentation order: shallow rows first, totals after their
        // constituents, registration order within each group.
        let mut ordered: Vec<_> = registry.identities().to_vec();
        ordered.sort_by_key(|identity| {
            (
                identity.effective_level(),
                identity.is_total_row(),
                identity.identity_id,
            )
        });

        let rows: Vec<CompiledRow> = ordered
            .into_iter()
            .map(|identity| {
                let row_cells = years
                    .iter()
                    .filter_map(|year| cells.get(&(identity.identity_id, *year)).cloned())
                    .collect();
                CompiledRow {
                    identity,
                    cells: row_cells,
                }
            })
            .collect();

        debug!(
            "Compiled {:?} for company {}: {} rows, {} years, {} discards",
            statement_type,
            company_id,
            rows.len(),
            years.len(),
            discards.len()
        );

        CompilationOutput {
            statement: CompiledStatement {
                company_id: company_id.to_string(),
                statement_type,
                years,
                rows,
            },
            discards,
            warnings: registry.take_warnings(),
        }
    }
}

fn canonical_order<'a>(
    item: &'a RawLineItem,
) -> (
    chrono::NaiveDate,
    &'a str,
    bool,
    u32,
    &'a str,
    i32,
) {
    (
        item.filing_date,
        item.source_document_id.as_str(),
        item.ordinal.is_none(),
        item.ordinal.unwrap_or(0),
        item.label.as_str(),
        item.fiscal_year,
    )
}

/// Rows whose canonical key starts with "total" are subtotals even when the
/// extractor captured no layout.
fn infer_total_hint(canonical_key: &str) -> Option<bool> {
    if canonical_key == "total" || canonical_key.starts_with("total ") {
        Some(true)
    } else {
        None
    }
}

/// Compile validated raw line items into a statement. Convenience wrapper
/// mirroring [`Compiler::compile`].
pub fn compile_records(
    company_id: &str,
    statement_type: StatementType,
    items: &[RawLineItem],
    config: &CompilerConfig,
) -> CompilationOutput {
    Compiler::new(config.clone()).compile(company_id, statement_type, items)
}
