// ⚖️ Reconciliation Engine - analyzed counts vs registry base counts
//
// For the overall bucket and every party:
//   difference = base_count - analyzed_sum
//   difference > 0  → add it to "No rental income" (units not yet analyzed)
//   difference < 0  → warn; counts are left untouched
//
// Parties known only to the registry get a fresh entry; parties known only to
// the analysis file have base 0 and always warn.

use crate::aggregation::{AggregateReport, BaseCounts, CategoryCounts, OVERALL_LABEL};
use crate::classifier::Category;
use crate::data_quality::{DataIssue, IssueKind, WarningSink};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// RECONCILIATION RESULT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconciliationResult {
    /// Analyzed sum already equals the base count
    Balanced,

    /// Base count exceeded the analyzed sum; the gap was added
    Adjusted { added: usize },

    /// More analyzed units than registered ones; nothing written
    Negative { excess: usize },
}

impl ReconciliationResult {
    pub fn difference(&self) -> i64 {
        match self {
            ReconciliationResult::Balanced => 0,
            ReconciliationResult::Adjusted { added } => *added as i64,
            ReconciliationResult::Negative { excess } => -(*excess as i64),
        }
    }

    pub fn is_negative(&self) -> bool {
        matches!(self, ReconciliationResult::Negative { .. })
    }
}

/// Reconcile one bucket set against its base count
pub fn reconcile_counts(counts: &mut CategoryCounts, base: usize) -> ReconciliationResult {
    let analyzed = counts.total();

    if base > analyzed {
        let added = base - analyzed;
        counts.add(Category::NoRentalIncome, added);
        ReconciliationResult::Adjusted { added }
    } else if base < analyzed {
        ReconciliationResult::Negative { excess: analyzed - base }
    } else {
        ReconciliationResult::Balanced
    }
}

// ============================================================================
// RECONCILIATION SUMMARY
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub overall_difference: i64,
    pub parties_adjusted: usize,
    pub units_added: usize,
    pub negative_parties: Vec<String>,
}

impl ReconciliationSummary {
    pub fn is_clean(&self) -> bool {
        self.overall_difference >= 0 && self.negative_parties.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "reconciliation: overall difference {}, {} parties adjusted (+{} units), {} parties with more analyzed than registered units",
            self.overall_difference,
            self.parties_adjusted,
            self.units_added,
            self.negative_parties.len()
        )
    }
}

/// Reconcile the overall and per-party counts of `report` against `base`.
pub fn reconcile(report: &mut AggregateReport, base: &BaseCounts, sink: &dyn WarningSink) -> ReconciliationSummary {
    let mut summary = ReconciliationSummary::default();

    let overall = reconcile_counts(&mut report.overall, base.total);
    summary.overall_difference = overall.difference();
    if let ReconciliationResult::Negative { excess } = overall {
        sink.report(negative_issue(OVERALL_LABEL, base.total, excess));
    }

    let parties: BTreeSet<String> = report
        .per_party
        .keys()
        .chain(base.per_party.keys())
        .cloned()
        .collect();

    for party in parties {
        let party_base = base.for_party(&party);
        let counts = report.per_party.entry(party.clone()).or_default();

        match reconcile_counts(counts, party_base) {
            ReconciliationResult::Balanced => {}
            ReconciliationResult::Adjusted { added } => {
                summary.parties_adjusted += 1;
                summary.units_added += added;
                tracing::debug!(party = %party, added, "added unanalyzed units to '{}'", Category::NoRentalIncome);
            }
            ReconciliationResult::Negative { excess } => {
                sink.report(negative_issue(&party, party_base, excess));
                summary.negative_parties.push(party);
            }
        }
    }

    summary
}

fn negative_issue(group: &str, base: usize, excess: usize) -> DataIssue {
    DataIssue::warning(
        IssueKind::NegativeReconciliation,
        format!(
            "{}: {} analyzed units but only {} registered ({} too many); counts left unadjusted",
            group,
            base + excess,
            base,
            excess
        ),
    )
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_quality::CollectingSink;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn create_test_counts(no_income: usize, paid: usize, low: usize, none: usize) -> CategoryCounts {
        let mut counts = CategoryCounts::new();
        counts.add(Category::NoRentalIncome, no_income);
        counts.add(Category::TaxPaid, paid);
        counts.add(Category::LowTaxPaid, low);
        counts.add(Category::NoTaxPaid, none);
        counts
    }

    fn create_test_report(per_party: Vec<(&str, CategoryCounts)>) -> AggregateReport {
        let mut overall = CategoryCounts::new();
        let mut map = BTreeMap::new();
        for (party, counts) in per_party {
            for category in Category::ALL {
                overall.add(category, counts.get(category));
            }
            map.insert(party.to_string(), counts);
        }
        AggregateReport {
            analyzed: overall.total(),
            rows_read: overall.total(),
            skipped: 0,
            overall,
            per_party: map,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_positive_difference_added_to_no_rental_income() {
        let mut counts = create_test_counts(10, 20, 7, 10);
        assert_eq!(counts.total(), 47);

        let result = reconcile_counts(&mut counts, 50);

        assert_eq!(result, ReconciliationResult::Adjusted { added: 3 });
        assert_eq!(counts.get(Category::NoRentalIncome), 13);
        assert_eq!(counts.get(Category::TaxPaid), 20);
        assert_eq!(counts.total(), 50);
    }

    #[test]
    fn test_negative_difference_warns_and_leaves_counts() {
        let report_counts = create_test_counts(12, 10, 10, 10);
        assert_eq!(report_counts.total(), 42);
        let mut report = create_test_report(vec![("Party P", report_counts.clone())]);

        let mut base = BaseCounts::default();
        base.total = 40;
        base.per_party.insert("Party P".to_string(), 40);

        let sink = CollectingSink::new();
        let summary = reconcile(&mut report, &base, &sink);

        assert_eq!(report.party("Party P"), report_counts);
        assert_eq!(summary.negative_parties, vec!["Party P".to_string()]);
        assert_eq!(summary.overall_difference, -2);
        assert!(!summary.is_clean());
        // One warning for the overall bucket, one for the party
        assert_eq!(sink.count(IssueKind::NegativeReconciliation), 2);
    }

    #[test]
    fn test_registry_only_party_gets_entry() {
        let mut report = create_test_report(vec![("Labour Party", create_test_counts(0, 1, 0, 0))]);

        let mut base = BaseCounts::default();
        base.total = 4;
        base.per_party.insert("Labour Party".to_string(), 1);
        base.per_party.insert("Green Party".to_string(), 3);

        let sink = CollectingSink::new();
        let summary = reconcile(&mut report, &base, &sink);

        assert!(sink.is_empty());
        assert!(summary.is_clean());
        assert_eq!(summary.overall_difference, 3);
        assert_eq!(summary.parties_adjusted, 1);
        assert_eq!(summary.units_added, 3);
        assert_eq!(report.party("Green Party").get(Category::NoRentalIncome), 3);
        assert_eq!(report.overall.get(Category::NoRentalIncome), 3);
    }

    #[test]
    fn test_analysis_only_party_is_negative() {
        let mut report = create_test_report(vec![("Mystery Party", create_test_counts(0, 0, 0, 2))]);
        let base = BaseCounts {
            total: 2,
            per_party: BTreeMap::new(),
        };

        let sink = CollectingSink::new();
        let summary = reconcile(&mut report, &base, &sink);

        assert_eq!(summary.overall_difference, 0);
        assert_eq!(summary.negative_parties, vec!["Mystery Party".to_string()]);
        assert_eq!(sink.count(IssueKind::NegativeReconciliation), 1);
    }

    #[test]
    fn test_balanced_counts_untouched() {
        let mut counts = create_test_counts(1, 1, 1, 1);
        let result = reconcile_counts(&mut counts, 4);

        assert_eq!(result, ReconciliationResult::Balanced);
        assert_eq!(result.difference(), 0);
        assert_eq!(counts.get(Category::NoRentalIncome), 1);
    }
}
