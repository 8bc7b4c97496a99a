//! # Statement Compiler
//!
//! A library for compiling per-document, LLM-extracted financial statement
//! line items into a single canonical, deduplicated, restatement-aware
//! multi-year statement per company and statement type.
//!
//! ## Core Concepts
//!
//! - **Raw line items**: one observation per document, a bag of
//!   {label, fiscal year, value} tuples as the extractor produced them
//! - **Canonical identities**: label variants ("COGS", "Cost of Goods Sold",
//!   "Cost of goods sold.") deduplicated into one stable row via
//!   normalization and fuzzy matching
//! - **Temporal resolution**: restated figures from later filings supersede
//!   originals; the latest restatement wins
//! - **Determinism**: compilation is a pure function of its input — same
//!   records in, byte-identical statement out, regardless of input order
//!
//! ## Example
//!
//! ```rust,ignore
//! use statement_compiler::*;
//! use chrono::NaiveDate;
//!
//! let records = vec![
//!     ExtractedRecord {
//!         source_document_id: "annual-report-2023".to_string(),
//!         label: Some("Revenue".to_string()),
//!         fiscal_year: 2023,
//!         value: Some(1_200_000.0),
//!         statement_type: StatementType::IncomeStatement,
//!         filing_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
//!         ordinal: Some(0),
//!         level: None,
//!         is_total: None,
//!     },
//! ];
//!
//! let output = compile_statement(
//!     "acme",
//!     StatementType::IncomeStatement,
//!     &records,
//!     &CompilerConfig::default(),
//! )
//! .unwrap();
//!
//! let table = output.statement.to_table();
//! println!("{}", table.to_markdown());
//! ```

pub mod compiler;
pub mod error;
pub mod ingestion;
pub mod matcher;
pub mod normalizer;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod table;

pub use compiler::{compile_records, Compiler};
pub use error::{CompileError, Result};
pub use ingestion::{convert_records, is_restatement};
pub use matcher::{find_match, similarity, MatchOutcome};
pub use normalizer::normalize;
pub use registry::IdentityRegistry;
pub use resolver::resolve;
pub use schema::*;
pub use table::{StatementTable, TableCell, TableRow};

use log::{debug, info};
use std::collections::BTreeMap;

/// The compilation facade: validates configuration once, then compiles any
/// number of statements with it.
pub struct StatementCompiler {
    config: CompilerConfig,
}

impl StatementCompiler {
    pub fn new(config: CompilerConfig) -> Result<Self> {
        validate_config(&config)?;
        Ok(Self { config })
    }

    pub fn with_defaults() -> Self {
        Self {
            config: CompilerConfig::default(),
        }
    }

    /// Compile one statement type for one company from extractor output.
    /// Malformed records are discarded with reasons, never fatal.
    pub fn compile_statement(
        &self,
        company_id: &str,
        statement_type: StatementType,
        records: &[ExtractedRecord],
    ) -> CompilationOutput {
        info!(
            "Compiling {:?} for company {} from {} extracted records",
            statement_type,
            company_id,
            records.len()
        );

        let (items, mut discards) = ingestion::convert_records(records);
        debug!(
            "{} records survived ingestion, {} discarded",
            items.len(),
            discards.len()
        );

        let mut output = compiler::compile_records(
            company_id,
            statement_type,
            &items,
            &self.config,
        );

        discards.append(&mut output.discards);
        output.discards = discards;
        output
    }

    /// Compile every statement type present in the records. Statement types
    /// with no records are omitted from the result.
    pub fn compile_all_statements(
        &self,
        company_id: &str,
        records: &[ExtractedRecord],
    ) -> BTreeMap<StatementType, CompilationOutput> {
        let mut outputs = BTreeMap::new();

        for statement_type in StatementType::all() {
            let partition: Vec<ExtractedRecord> = records
                .iter()
                .filter(|r| r.statement_type == statement_type)
                .cloned()
                .collect();
            if partition.is_empty() {
                continue;
            }
            outputs.insert(
                statement_type,
                self.compile_statement(company_id, statement_type, &partition),
            );
        }

        outputs
    }
}

/// Compile one statement for a company. See [`StatementCompiler`].
pub fn compile_statement(
    company_id: &str,
    statement_type: StatementType,
    records: &[ExtractedRecord],
    config: &CompilerConfig,
) -> Result<CompilationOutput> {
    let engine = StatementCompiler::new(config.clone())?;
    Ok(engine.compile_statement(company_id, statement_type, records))
}

/// Compile every statement type present in the records for a company.
pub fn compile_all_statements(
    company_id: &str,
    records: &[ExtractedRecord],
    config: &CompilerConfig,
) -> Result<BTreeMap<StatementType, CompilationOutput>> {
    let engine = StatementCompiler::new(config.clone())?;
    Ok(engine.compile_all_statements(company_id, records))
}

fn validate_config(config: &CompilerConfig) -> Result<()> {
    if !(0.0..=1.0).contains(&config.similarity_threshold) {
        return Err(CompileError::InvalidSimilarityThreshold(
            config.similarity_threshold,
        ));
    }

    for (key, expansion) in &config.abbreviations {
        if key.is_empty() || key.chars().any(|c| c.is_uppercase()) {
            return Err(CompileError::InvalidAbbreviationKey(key.clone()));
        }

        // Expansions feed straight into canonical keys, so they must
        // already be in normalized form or a second normalize pass would
        // change them.
        let well_formed = expansion
            .chars()
            .all(|c| c.is_whitespace() || (c.is_alphanumeric() && !c.is_uppercase()));
        if expansion.trim().is_empty() || !well_formed {
            return Err(CompileError::InvalidAbbreviationExpansion(expansion.clone()));
        }
    }

    Ok(())
}
