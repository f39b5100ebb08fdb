// 🔍 Deduplication Engine - one filing per accounting unit
//
// Filter:    reporting year >= earliest_accounting_year, register == required name
// Group:     (RegulatedEntityName, AccountingUnitName), trimmed, exact
// Keep:      highest numeric ECRef ("ST015" → 15); non-numeric ECRefs sort last
// Ties:      first in input order (stable sort)

use crate::config::{PipelineConfig, DEFAULT_EARLIEST_ACCOUNTING_YEAR, DEFAULT_REQUIRED_REGISTER_NAME};
use crate::data_quality::{DataIssue, IssueKind, WarningSink};
use crate::entities::Filing;
use crate::error::Result;
use crate::tables::Table;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::path::Path;

// ============================================================================
// DEDUP REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupReport {
    pub initial_rows: usize,
    pub after_year_filter: usize,
    pub after_register_filter: usize,
    pub deduplicated: usize,

    /// Survivors of the filters whose ECRef has no numeric part
    pub invalid_ec_refs: usize,
}

impl DedupReport {
    pub fn summary(&self) -> String {
        format!(
            "{} rows → {} after year filter → {} after register filter → {} units",
            self.initial_rows, self.after_year_filter, self.after_register_filter, self.deduplicated
        )
    }
}

// ============================================================================
// DEDUPLICATION ENGINE
// ============================================================================

pub struct DeduplicationEngine {
    /// Filings reporting before this year are dropped (default: 2021)
    pub earliest_accounting_year: i32,

    /// Exact, case-sensitive register name to keep (default: "Great Britain")
    pub required_register_name: String,
}

impl DeduplicationEngine {
    /// Create engine with default filters
    pub fn new() -> Self {
        DeduplicationEngine {
            earliest_accounting_year: DEFAULT_EARLIEST_ACCOUNTING_YEAR,
            required_register_name: DEFAULT_REQUIRED_REGISTER_NAME.to_string(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        DeduplicationEngine {
            earliest_accounting_year: config.earliest_accounting_year,
            required_register_name: config.required_register_name.clone(),
        }
    }

    /// Keep exactly one filing per unit.
    ///
    /// Output is ordered by (party, unit) but callers should not rely on it.
    pub fn deduplicate(&self, filings: Vec<Filing>, sink: &dyn WarningSink) -> (Vec<Filing>, DedupReport) {
        let mut report = DedupReport {
            initial_rows: filings.len(),
            ..Default::default()
        };

        let recent: Vec<Filing> = filings
            .into_iter()
            .filter(|f| self.is_recent(f))
            .collect();
        report.after_year_filter = recent.len();

        let mut survivors: Vec<Filing> = recent
            .into_iter()
            .filter(|f| f.register_name == self.required_register_name)
            .collect();
        report.after_register_filter = survivors.len();

        report.invalid_ec_refs = survivors.iter().filter(|f| f.ec_ref_number().is_none()).count();
        if report.invalid_ec_refs > 0 {
            sink.report(DataIssue::warning(
                IssueKind::InvalidEcRef,
                format!(
                    "{} filings have an ECRef with no numeric part; they are only kept when their unit has nothing else",
                    report.invalid_ec_refs
                ),
            ));
        }

        // Stable: equal keys keep their input order, so dedup_by keeps the first
        survivors.sort_by(compare_for_dedup);
        survivors.dedup_by(|later, kept| later.unit_key() == kept.unit_key());
        report.deduplicated = survivors.len();

        (survivors, report)
    }

    fn is_recent(&self, filing: &Filing) -> bool {
        matches!(filing.reporting_year(), Some(year) if year >= self.earliest_accounting_year)
    }
}

impl Default for DeduplicationEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Names ascending, then numeric ECRef descending, non-numeric last
fn compare_for_dedup(a: &Filing, b: &Filing) -> Ordering {
    a.unit_key()
        .cmp(&b.unit_key())
        .then_with(|| ec_rank(a).cmp(&ec_rank(b)))
}

fn ec_rank(filing: &Filing) -> (bool, Reverse<u64>) {
    match filing.ec_ref_number() {
        Some(n) => (false, Reverse(n)),
        None => (true, Reverse(0)),
    }
}

// ============================================================================
// STAGE
// ============================================================================

/// Stage entry point: raw accounting-units table → one row per unit.
/// All original columns are written; key columns come out trimmed.
pub fn dedupe_accounting_units(
    input_path: &Path,
    output_path: &Path,
    config: &PipelineConfig,
    sink: &dyn WarningSink,
) -> Result<DedupReport> {
    let table = Table::read(input_path, &Filing::REQUIRED_COLUMNS)?;
    tracing::info!(rows = table.len(), "read accounting units from {}", input_path.display());

    let filings: Vec<Filing> = table
        .iter()
        .map(|row| Filing::from_row(row, &table.headers))
        .collect();

    let engine = DeduplicationEngine::from_config(config);
    let (kept, report) = engine.deduplicate(filings, sink);

    if kept.is_empty() {
        tracing::warn!("no filings left after filtering; writing header only");
    }

    let output = Table::from_parts(
        table.headers.clone(),
        kept.into_iter().map(|f| f.values).collect(),
    );
    output.write_atomic(output_path)?;

    tracing::info!("{}", report.summary());
    Ok(report)
}

// ============================================================================
// TESTS
// ============================================================================
