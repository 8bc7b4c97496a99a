use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Default minimum similarity for merging two canonical labels into one
/// identity. The primary precision/recall lever: raising it produces
/// duplicate rows for restated label variants, lowering it silently merges
/// distinct line items.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Keys shorter than this never enter the fuzzy tier; short labels like
/// "eps" or "tax" produce too many spurious high scores.
pub const DEFAULT_MIN_FUZZY_LEN: usize = 5;

/// Version tag carried by every persisted [`StatementTable`]. Bump on any
/// breaking change to the table shape.
pub const TABLE_SCHEMA_VERSION: u32 = 1;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum StatementType {
    #[schemars(description = "Income statement / profit and loss")]
    IncomeStatement,

    #[schemars(description = "Balance sheet / statement of financial position")]
    BalanceSheet,

    #[schemars(description = "Cash flow statement")]
    CashFlowStatement,
}

impl StatementType {
    pub fn all() -> [StatementType; 3] {
        [
            StatementType::IncomeStatement,
            StatementType::BalanceSheet,
            StatementType::CashFlowStatement,
        ]
    }
}

/// One observation emitted by the extraction collaborator for one document.
/// Defensive by design: the LLM extractor occasionally omits labels or
/// values, so those fields are optional and validated during ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedRecord {
    #[schemars(description = "Opaque identifier of the source document this observation came from")]
    pub source_document_id: String,

    #[schemars(
        description = "The line-item label exactly as it appears in the document (e.g., 'Cost of Goods Sold', 'SG&A'). May be missing in malformed extractions."
    )]
    pub label: Option<String>,

    #[schemars(description = "The fiscal year the figure pertains to, independent of filing date")]
    pub fiscal_year: i32,

    #[schemars(description = "The reported monetary value. None represents a missing cell.")]
    pub value: Option<f64>,

    #[schemars(description = "Which financial statement this line item belongs to")]
    pub statement_type: StatementType,

    #[schemars(
        description = "Date the source document was published. Used to detect restatements (filing year later than fiscal year) and to rank competing values."
    )]
    pub filing_date: NaiveDate,

    #[serde(default)]
    #[schemars(
        description = "Zero-based row position of this line item within the source document, when the extractor preserves presentation order. Optional."
    )]
    pub ordinal: Option<u32>,

    #[serde(default)]
    #[schemars(
        description = "Indentation depth of the row in the source statement (0 = top-level), when the extractor captures layout. Optional."
    )]
    pub level: Option<u32>,

    #[serde(default)]
    #[schemars(
        description = "True when the row is a subtotal or total line, when the extractor captures layout. Optional."
    )]
    pub is_total: Option<bool>,
}

/// A validated observation, produced once by ingestion and read-only from
/// then on. `is_restatement_candidate` is derived, never supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLineItem {
    pub source_document_id: String,
    pub label: String,
    pub fiscal_year: i32,
    pub value: Option<f64>,
    pub statement_type: StatementType,
    pub filing_date: NaiveDate,
    pub ordinal: Option<u32>,
    pub level: Option<u32>,
    pub is_total: Option<bool>,
    /// True when the document files later than the year it reports on,
    /// i.e. this observation restates a prior year's figure.
    pub is_restatement_candidate: bool,
}

/// The canonical, deduplicated representation of one line item across every
/// document and year observed for a (company, statement type) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemIdentity {
    /// Registration order within one compilation run. Stable across runs
    /// over identical input because the registry is rebuilt canonically.
    pub identity_id: u32,
    pub canonical_label: String,
    /// The alias elected for display: most frequent, tie-broken by most
    /// recently observed.
    pub display_label: String,
    /// Every raw label that mapped to this identity.
    pub aliases: BTreeSet<String>,
    /// Hierarchy depth (0 = top-level). First non-null observation wins.
    pub level: Option<u32>,
    /// Subtotal/total row marker. First non-null observation wins.
    pub is_total: Option<bool>,
}

impl LineItemIdentity {
    pub fn effective_level(&self) -> u32 {
        self.level.unwrap_or(0)
    }

    pub fn is_total_row(&self) -> bool {
        self.is_total.unwrap_or(false)
    }
}

/// The resolved value for one (identity, fiscal year) cell, with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledCell {
    pub identity_id: u32,
    pub fiscal_year: i32,
    pub value: Option<f64>,
    /// True iff the winning value came from a restatement candidate.
    pub restated: bool,
    /// True when candidates disagreed and only the deterministic tie-break
    /// decided the winner. Flagged for downstream audit, never fatal.
    pub conflict: bool,
    pub source_document_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledRow {
    pub identity: LineItemIdentity,
    /// One cell per observed fiscal year, ordered by descending year to
    /// match the statement's `years` list.
    pub cells: Vec<CompiledCell>,
}

/// The final compiled artifact for one (company, statement type) pair.
/// Replaced wholesale on every compilation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledStatement {
    pub company_id: String,
    pub statement_type: StatementType,
    /// Every fiscal year observed across all cells, sorted descending.
    pub years: Vec<i32>,
    pub rows: Vec<CompiledRow>,
}

/// A record rejected during ingestion or compilation, with the reason.
/// One bad record never aborts compilation of the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscardedRecord {
    pub source_document_id: String,
    pub label: Option<String>,
    pub fiscal_year: i32,
    pub reason: String,
}

/// Everything a compilation run produces: the statement plus the audit
/// trail of discarded records and registry warnings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationOutput {
    pub statement: CompiledStatement,
    pub discards: Vec<DiscardedRecord>,
    pub warnings: Vec<String>,
}

/// Explicit configuration for normalization and matching. Passed into the
/// engine rather than read from module-level state, so callers can override
/// the threshold or dictionary per statement type or locale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Similarity floor for merging two canonical labels. See
    /// [`DEFAULT_SIMILARITY_THRESHOLD`].
    pub similarity_threshold: f64,
    /// Canonical keys shorter than this skip the fuzzy tier entirely.
    pub min_fuzzy_len: usize,
    /// Lowercase token → expansion phrase, applied during normalization.
    pub abbreviations: BTreeMap<String, String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            min_fuzzy_len: DEFAULT_MIN_FUZZY_LEN,
            abbreviations: default_abbreviations(),
        }
    }
}

/// The built-in abbreviation dictionary. Callers extend a copy of this
/// rather than replacing it when adding locale-specific entries.
pub fn default_abbreviations() -> BTreeMap<String, String> {
    let entries: &[(&str, &str)] = &[
        ("cogs", "cost of goods sold"),
        ("cos", "cost of sales"),
        ("sg&a", "selling general and administrative expenses"),
        ("sga", "selling general and administrative expenses"),
        ("g&a", "general and administrative expenses"),
        ("r&d", "research and development"),
        ("d&a", "depreciation and amortization"),
        ("pp&e", "property plant and equipment"),
        ("ppe", "property plant and equipment"),
        ("opex", "operating expenses"),
        ("capex", "capital expenditures"),
        ("a/r", "accounts receivable"),
        ("a/p", "accounts payable"),
        ("eps", "earnings per share"),
        ("fx", "foreign exchange"),
        ("ebit", "earnings before interest and taxes"),
    ];

    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
