// 📊 Aggregator - category counts overall and per party
//
// Identity is the combined name "{unit} {entity}" (trimmed, lower-cased).
// First occurrence wins; later duplicates and nameless rows are skipped and
// counted, never merged. Party names go through PartyAliases before grouping.

use crate::classifier::{Category, CategoryClassifier};
use crate::config::PipelineConfig;
use crate::data_quality::{DataIssue, IssueKind, WarningSink};
use crate::entities::records::{ACCOUNTING_UNIT_NAME, REGULATED_ENTITY_NAME};
use crate::entities::{AnalysisRecord, PartyAliases};
use crate::error::Result;
use crate::normalize::combined_name;
use crate::reconciliation::{reconcile, ReconciliationSummary};
use crate::tables::{write_records, Table};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

pub const OVERALL_LABEL: &str = "Overall";

// ============================================================================
// CATEGORY COUNTS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    counts: BTreeMap<Category, usize>,
}

impl CategoryCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, category: Category) -> usize {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, category: Category) {
        self.add(category, 1);
    }

    pub fn add(&mut self, category: Category, amount: usize) {
        *self.counts.entry(category).or_insert(0) += amount;
    }

    /// Sum over every category
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Sum over the categories that have rental income
    pub fn with_income_total(&self) -> usize {
        Category::WITH_INCOME.iter().map(|c| self.get(*c)).sum()
    }
}

// ============================================================================
// BASE COUNTS
// ============================================================================

/// Distinct units per party in the raw registry, independent of the analysis file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseCounts {
    pub total: usize,
    pub per_party: BTreeMap<String, usize>,
}

impl BaseCounts {
    pub fn from_table(table: &Table, aliases: &PartyAliases, sink: &dyn WarningSink) -> Self {
        let mut seen = HashSet::new();
        let mut counts = BaseCounts::default();
        let mut skipped = 0;

        for row in table.iter() {
            let unit = row.get(ACCOUNTING_UNIT_NAME);
            let entity = row.get(REGULATED_ENTITY_NAME);

            let Some(name) = combined_name(unit, entity) else {
                skipped += 1;
                continue;
            };
            if !seen.insert(name) {
                continue;
            }

            counts.total += 1;
            *counts
                .per_party
                .entry(aliases.canonicalize(entity))
                .or_insert(0) += 1;
        }

        if skipped > 0 {
            sink.report(DataIssue::info(
                IssueKind::MissingName,
                format!("{} registry rows without a unit or party name ignored in base counts", skipped),
            ));
        }

        counts
    }

    pub fn for_party(&self, party: &str) -> usize {
        self.per_party.get(party).copied().unwrap_or(0)
    }

    /// Parties by descending unit count, ties by name
    pub fn parties_by_size(&self) -> Vec<&str> {
        let mut parties: Vec<(&str, usize)> = self
            .per_party
            .iter()
            .map(|(party, count)| (party.as_str(), *count))
            .collect();
        parties.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        parties.into_iter().map(|(party, _)| party).collect()
    }
}

/// Read the accounting-units table and count distinct units per party
pub fn base_counts(path: &Path, aliases: &PartyAliases, sink: &dyn WarningSink) -> Result<BaseCounts> {
    let table = Table::read(path, &[ACCOUNTING_UNIT_NAME, REGULATED_ENTITY_NAME])?;
    let counts = BaseCounts::from_table(&table, aliases, sink);
    tracing::info!(
        units = counts.total,
        parties = counts.per_party.len(),
        "base counts from {}",
        path.display()
    );
    Ok(counts)
}

// ============================================================================
// AGGREGATE REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub overall: CategoryCounts,
    pub per_party: BTreeMap<String, CategoryCounts>,
    pub rows_read: usize,
    pub analyzed: usize,
    pub skipped: usize,
    pub generated_at: DateTime<Utc>,
}

impl AggregateReport {
    pub fn party(&self, party: &str) -> CategoryCounts {
        self.per_party.get(party).cloned().unwrap_or_default()
    }

    pub fn summary(&self) -> String {
        format!(
            "read {} rows, analyzed {} unique units, skipped {} (duplicates/missing names)",
            self.rows_read, self.analyzed, self.skipped
        )
    }
}

/// Classify and tally each unique unit.
pub fn aggregate(
    records: &[AnalysisRecord],
    classifier: &CategoryClassifier,
    aliases: &PartyAliases,
    sink: &dyn WarningSink,
) -> AggregateReport {
    let mut seen = HashSet::new();
    let mut report = AggregateReport {
        overall: CategoryCounts::new(),
        per_party: BTreeMap::new(),
        rows_read: records.len(),
        analyzed: 0,
        skipped: 0,
        generated_at: Utc::now(),
    };

    for (i, record) in records.iter().enumerate() {
        let Some(name) = combined_name(&record.unit_name, &record.entity_name) else {
            report.skipped += 1;
            sink.report(
                DataIssue::warning(IssueKind::MissingName, "row has no unit or party name").at_row(i + 1),
            );
            continue;
        };

        if !seen.insert(name.clone()) {
            report.skipped += 1;
            sink.report(
                DataIssue::info(IssueKind::DuplicateUnit, format!("'{}' already counted", name)).at_row(i + 1),
            );
            continue;
        }

        let category = classifier.classify(record.rental_income, record.approx_tax_rate);
        let party = aliases.canonicalize(&record.entity_name);
        tracing::debug!(unit = %name, party = %party, category = %category, "classified");

        report.overall.increment(category);
        report.per_party.entry(party).or_default().increment(category);
        report.analyzed += 1;
    }

    report
}

// ============================================================================
// COUNTS TABLE
// ============================================================================

/// One row of the wide category-counts table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountsRow {
    pub group: String,
    #[serde(rename = "No rental income")]
    pub no_rental_income: usize,
    #[serde(rename = "Tax paid")]
    pub tax_paid: usize,
    #[serde(rename = "Low tax paid")]
    pub low_tax_paid: usize,
    #[serde(rename = "No tax paid")]
    pub no_tax_paid: usize,
    #[serde(rename = "Total")]
    pub total: usize,
    #[serde(rename = "Base")]
    pub base: usize,
}

impl CountsRow {
    /// Header of category_counts.csv
    pub const COLUMNS: [&'static str; 7] = [
        "group",
        "No rental income",
        "Tax paid",
        "Low tax paid",
        "No tax paid",
        "Total",
        "Base",
    ];

    fn new(group: &str, counts: &CategoryCounts, base: usize) -> Self {
        CountsRow {
            group: group.to_string(),
            no_rental_income: counts.get(Category::NoRentalIncome),
            tax_paid: counts.get(Category::TaxPaid),
            low_tax_paid: counts.get(Category::LowTaxPaid),
            no_tax_paid: counts.get(Category::NoTaxPaid),
            total: counts.total(),
            base,
        }
    }

    pub fn count(&self, category: Category) -> usize {
        match category {
            Category::NoRentalIncome => self.no_rental_income,
            Category::TaxPaid => self.tax_paid,
            Category::LowTaxPaid => self.low_tax_paid,
            Category::NoTaxPaid => self.no_tax_paid,
        }
    }
}

/// "Overall" first, then every party in the report or the registry, by name
pub fn counts_rows(report: &AggregateReport, base: &BaseCounts) -> Vec<CountsRow> {
    let mut rows = vec![CountsRow::new(OVERALL_LABEL, &report.overall, base.total)];

    let mut parties: Vec<&String> = report.per_party.keys().chain(base.per_party.keys()).collect();
    parties.sort();
    parties.dedup();

    for party in parties {
        rows.push(CountsRow::new(party, &report.party(party), base.for_party(party)));
    }
    rows
}

// ============================================================================
// STAGE
// ============================================================================

/// Everything the aggregate stage produced, for the chart stage to reuse
#[derive(Debug, Clone)]
pub struct AggregateOutcome {
    pub report: AggregateReport,
    pub base: BaseCounts,
    pub reconciliation: ReconciliationSummary,
}

/// Stage entry point: analysis results + registry → reconciled counts table
pub fn aggregate_categories(
    accounting_units_path: &Path,
    analysis_path: &Path,
    output_path: &Path,
    config: &PipelineConfig,
    sink: &dyn WarningSink,
) -> Result<AggregateOutcome> {
    let base = base_counts(accounting_units_path, &config.party_aliases, sink)?;
    let table = Table::read(analysis_path, &AnalysisRecord::REQUIRED_COLUMNS)?;

    let records: Vec<AnalysisRecord> = table.iter().map(|row| AnalysisRecord::from_row(row, sink)).collect();
    let classifier = CategoryClassifier::from_config(config);
    let mut report = aggregate(&records, &classifier, &config.party_aliases, sink);
    tracing::info!("{}", report.summary());

    let reconciliation = reconcile(&mut report, &base, sink);
    tracing::info!("{}", reconciliation.summary());

    write_records(output_path, &CountsRow::COLUMNS, &counts_rows(&report, &base))?;
    tracing::info!("wrote category counts to {}", output_path.display());

    Ok(AggregateOutcome {
        report,
        base,
        reconciliation,
    })
}

// ============================================================================
// TESTS
// ============================================================================
