// 📋 Results Table - rows for the sortable HTML table
//
// Include:  income >= rental_income_threshold AND (rate missing OR rate <= include_rate_ceiling)
// Order:    rented to an MP first, then income descending (stable)
// Dedup:    "{unit_name} {entity_name}" exactly as given; first row wins

use crate::config::PipelineConfig;
use crate::data_quality::{DataIssue, IssueKind, WarningSink};
use crate::entities::AnalysisRecord;
use crate::error::Result;
use crate::report::format_thousands;
use crate::tables::{write_records, Table};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;

// ============================================================================
// ROW TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HighlightTier {
    NoTax,   // rate missing or effectively zero
    LowTax,  // below the highlight rate
    GoodTax,
}

impl HighlightTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            HighlightTier::NoTax => "no-tax",
            HighlightTier::LowTax => "low-tax",
            HighlightTier::GoodTax => "good-tax",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub party: String,
    pub constituency: String,
    pub accounts_url: String,
    pub rental_income: String,
    pub rental_income_sort: f64,
    pub tax_rate: String,
    pub tax_rate_sort: Option<f64>,
    pub rented_to_mp: String,
    pub mp_name: String,
    pub highlight: HighlightTier,
}

impl TableRow {
    /// Header of results_table.csv, in field order
    pub const COLUMNS: [&'static str; 10] = [
        "party",
        "constituency",
        "accounts_url",
        "rental_income",
        "rental_income_sort",
        "tax_rate",
        "tax_rate_sort",
        "rented_to_mp",
        "mp_name",
        "highlight",
    ];
}

/// Tax that would have been paid at the expected rate, over the included rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MissingTaxEstimate {
    pub total: f64,
    pub rented_to_mp_single_year: f64,
    pub rented_to_mp_all_years: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsTable {
    pub rows: Vec<TableRow>,
    pub estimate: MissingTaxEstimate,
    pub skipped_duplicates: usize,
}

impl ResultsTable {
    pub fn summary(&self) -> String {
        format!(
            "{} rows; missing tax £{} overall, £{} on MP rentals (£{} across all years)",
            self.rows.len(),
            format_thousands(self.estimate.total.round() as i64),
            format_thousands(self.estimate.rented_to_mp_single_year.round() as i64),
            format_thousands(self.estimate.rented_to_mp_all_years.round() as i64)
        )
    }
}

// ============================================================================
// FORMATTING
// ============================================================================

/// 12345.6 → "£12,346"
pub fn format_income(income: f64) -> String {
    format!("£{}", format_thousands(income.round() as i64))
}

/// 0.153 → "15%"
pub fn format_rate(rate: f64) -> String {
    format!("{}%", (rate * 100.0).round() as i64)
}

// ============================================================================
// BUILD
// ============================================================================

pub fn build_results_table(records: &[AnalysisRecord], config: &PipelineConfig, sink: &dyn WarningSink) -> ResultsTable {
    let options = &config.table;

    let mut included: Vec<(usize, &AnalysisRecord)> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| {
            let income = r.rental_income.unwrap_or(0.0);
            let rate_ok = r.approx_tax_rate.map_or(true, |rate| rate <= options.include_rate_ceiling);
            income >= config.rental_income_threshold && rate_ok
        })
        .collect();

    included.sort_by(|(_, a), (_, b)| compare_for_display(a, b));

    let mut seen = HashSet::new();
    let mut table = ResultsTable {
        rows: Vec::new(),
        estimate: MissingTaxEstimate::default(),
        skipped_duplicates: 0,
    };

    for (i, record) in included {
        let identifier = format!("{} {}", record.unit_name, record.entity_name);
        if !seen.insert(identifier.clone()) {
            table.skipped_duplicates += 1;
            sink.report(
                DataIssue::warning(IssueKind::DuplicateUnit, format!("duplicate row '{}' left out of the table", identifier))
                    .at_row(i + 1),
            );
            continue;
        }

        let income = record.rental_income.unwrap_or(0.0);
        let effective_rate = record.approx_tax_rate.unwrap_or(0.0);
        let missing = income * (options.expected_tax_rate - effective_rate).max(0.0);
        table.estimate.total += missing;
        if record.rented_to_mp {
            table.estimate.rented_to_mp_single_year += missing;
            table.estimate.rented_to_mp_all_years += missing * record.years_rented_to_mp.unwrap_or(1.0);
        }

        table.rows.push(TableRow {
            party: record.entity_name.clone(),
            constituency: record.unit_name.clone(),
            accounts_url: accounts_url(&options.accounts_url_prefix, &record.number),
            rental_income: format_income(income),
            rental_income_sort: income,
            tax_rate: record.approx_tax_rate.map(format_rate).unwrap_or_default(),
            tax_rate_sort: record.approx_tax_rate,
            rented_to_mp: if record.rented_to_mp { "Yes".to_string() } else { String::new() },
            mp_name: record.mp_name.clone(),
            highlight: highlight_tier(record.approx_tax_rate, config.tax_rate_epsilon, options.highlight_rate),
        });
    }

    table
}

fn compare_for_display(a: &AnalysisRecord, b: &AnalysisRecord) -> Ordering {
    let income = |r: &AnalysisRecord| r.rental_income.unwrap_or(f64::NEG_INFINITY);
    b.rented_to_mp
        .cmp(&a.rented_to_mp)
        .then_with(|| income(b).total_cmp(&income(a)))
}

fn highlight_tier(rate: Option<f64>, epsilon: f64, highlight_rate: f64) -> HighlightTier {
    match rate {
        None => HighlightTier::NoTax,
        Some(rate) if rate < epsilon => HighlightTier::NoTax,
        Some(rate) if rate < highlight_rate => HighlightTier::LowTax,
        Some(_) => HighlightTier::GoodTax,
    }
}

fn accounts_url(prefix: &str, number: &str) -> String {
    if number.is_empty() {
        String::new()
    } else {
        format!("{}{}.pdf", prefix, number)
    }
}

// ============================================================================
// STAGE
// ============================================================================

/// Stage entry point: enriched analysis table → results_table.csv
pub fn write_results_table(
    input_path: &Path,
    output_path: &Path,
    config: &PipelineConfig,
    sink: &dyn WarningSink,
) -> Result<ResultsTable> {
    let input = Table::read(input_path, &AnalysisRecord::REQUIRED_COLUMNS)?;
    let records: Vec<AnalysisRecord> = input.iter().map(|row| AnalysisRecord::from_row(row, sink)).collect();

    let table = build_results_table(&records, config, sink);
    write_records(output_path, &TableRow::COLUMNS, &table.rows)?;

    tracing::info!("{}", table.summary());
    Ok(table)
}

// ============================================================================
// TESTS
// ============================================================================
