use crate::error::Result;
use crate::schema::{CompiledStatement, StatementType, TABLE_SCHEMA_VERSION};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One resolved value in the persisted table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TableCell {
    #[schemars(description = "The resolved monetary value; null for a missing cell")]
    pub value: Option<f64>,

    #[schemars(description = "True if the value came from a restatement rather than the original filing")]
    pub restated: bool,

    #[schemars(description = "True if conflicting candidates were resolved only by the deterministic tie-break; flagged for audit")]
    pub conflict: bool,

    #[schemars(description = "Identifier of the document the winning value came from")]
    pub source_document_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TableRow {
    #[schemars(description = "Display label for the line item")]
    pub line_item: String,

    #[schemars(description = "Hierarchy depth: 0 = top-level, higher = more indented")]
    pub level: u32,

    #[schemars(description = "True for subtotal/total rows")]
    pub is_total: bool,

    #[schemars(description = "Resolved cell per fiscal year; years without an observation are absent")]
    pub values: BTreeMap<i32, TableCell>,
}

/// The canonical persisted shape of a compiled statement. This is the one
/// schema consumers get; the version field exists so it can evolve without
/// the defensive multi-format parsing it replaces.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatementTable {
    #[schemars(description = "Version of this table schema")]
    pub schema_version: u32,

    #[schemars(description = "Company the statement belongs to")]
    pub company_id: String,

    #[schemars(description = "Which financial statement this table holds")]
    pub statement_type: StatementType,

    #[schemars(description = "All fiscal years present, sorted descending")]
    pub years: Vec<i32>,

    #[schemars(description = "Line-item rows in presentation order")]
    pub rows: Vec<TableRow>,
}

impl CompiledStatement {
    /// Project the compiled statement into the persisted table shape.
    pub fn to_table(&self) -> StatementTable {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let values = row
                    .cells
                    .iter()
                    .map(|cell| {
                        (
                            cell.fiscal_year,
                            TableCell {
                                value: cell.value,
                                restated: cell.restated,
                                conflict: cell.conflict,
                                source_document_id: cell.source_document_id.clone(),
                            },
                        )
                    })
                    .collect();

                TableRow {
                    line_item: row.identity.display_label.clone(),
                    level: row.identity.effective_level(),
                    is_total: row.identity.is_total_row(),
                    values,
                }
            })
            .collect();

        StatementTable {
            schema_version: TABLE_SCHEMA_VERSION,
            company_id: self.company_id.clone(),
            statement_type: self.statement_type,
            years: self.years.clone(),
            rows,
        }
    }
}

impl StatementTable {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(StatementTable)
    }

    pub fn schema_as_json() -> Result<String> {
        let schema = Self::generate_json_schema();
        Ok(serde_json::to_string_pretty(&schema)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_csv(&self) -> String {
        let mut output = String::new();

        output.push_str("Line Item,Level,Is Total");
        for year in &self.years {
            output.push_str(&format!(",{}", year));
        }
        output.push('\n');

        for row in &self.rows {
            output.push_str(&format!(
                "{},{},{}",
                escape_csv(&row.line_item),
                row.level,
                row.is_total
            ));
            for year in &self.years {
                match row.values.get(year).and_then(|c| c.value) {
                    Some(value) => output.push_str(&format!(",{:.2}", value)),
                    None => output.push(','),
                }
            }
            output.push('\n');
        }

        output
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "# {:?} - {}\n\n",
            self.statement_type, self.company_id
        ));

        output.push_str("| Line Item |");
        for year in &self.years {
            output.push_str(&format!(" {} |", year));
        }
        output.push('\n');

        output.push_str("| --- |");
        for _ in &self.years {
            output.push_str(" --- |");
        }
        output.push('\n');

        for row in &self.rows {
            let indent = "  ".repeat(row.level as usize);
            let label = if row.is_total {
                format!("**{}**", row.line_item)
            } else {
                row.line_item.clone()
            };
            output.push_str(&format!("| {}{} |", indent, label));

            for year in &self.years {
                match row.values.get(year) {
                    Some(cell) => {
                        let value = cell
                            .value
                            .map(|v| format!("{:.2}", v))
                            .unwrap_or_else(|| "-".to_string());
                        let mut markers = String::new();
                        if cell.restated {
                            markers.push('†');
                        }
                        if cell.conflict {
                            markers.push('‡');
                        }
                        output.push_str(&format!(" {}{} |", value, markers));
                    }
                    None => output.push_str(" - |"),
                }
            }
            output.push('\n');
        }

        output.push_str("\n† restated · ‡ conflict flagged for audit\n");
        output
    }
}

fn escape_csv(field: &str) -> String {
    if field.contains(',') || field.contains('"') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
