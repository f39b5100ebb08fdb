// 📈 Chart Data - the two stacked-bar series, in long form
//
// counts       every category, reconciled unit counts per label
// percentages  Tax paid / Low tax paid / No tax paid as a share of units
//              that have rental income
//
// Labels: "Overall", then parties by descending registry size (ties by name).

use crate::aggregation::{AggregateOutcome, AggregateReport, BaseCounts, CategoryCounts, OVERALL_LABEL};
use crate::classifier::Category;
use crate::error::Result;
use crate::report::format_thousands;
use crate::tables::write_records;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartSeries {
    Counts,
    Percentages,
}

/// One bar segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub series: ChartSeries,
    pub label: String,
    pub category: Category,
    pub value: f64,
    pub count: usize,
    pub text: String,
    pub colour: String,
}

impl ChartPoint {
    /// Header of chart_data.csv
    pub const COLUMNS: [&'static str; 7] = ["series", "label", "category", "value", "count", "text", "colour"];
}

/// Build both series from reconciled counts.
pub fn build_chart_data(report: &AggregateReport, base: &BaseCounts) -> Vec<ChartPoint> {
    let mut labels = vec![OVERALL_LABEL];
    labels.extend(base.parties_by_size());

    let mut points = Vec::new();

    for category in Category::ALL {
        for label in &labels {
            let count = counts_for(report, label).get(category);
            points.push(ChartPoint {
                series: ChartSeries::Counts,
                label: label.to_string(),
                category,
                value: count as f64,
                count,
                text: if count > 0 { format_thousands(count as i64) } else { String::new() },
                colour: category.colour().to_string(),
            });
        }
    }

    for category in Category::WITH_INCOME {
        for label in &labels {
            let counts = counts_for(report, label);
            let count = counts.get(category);
            let denominator = counts.with_income_total();
            let pct = if denominator > 0 {
                count as f64 / denominator as f64 * 100.0
            } else {
                0.0
            };

            points.push(ChartPoint {
                series: ChartSeries::Percentages,
                label: label.to_string(),
                category,
                value: pct,
                count,
                text: if pct >= 1.0 && count > 0 {
                    format!("{:.1}% ({} units)", pct, format_thousands(count as i64))
                } else {
                    String::new()
                },
                colour: category.colour().to_string(),
            });
        }
    }

    points
}

fn counts_for(report: &AggregateReport, label: &str) -> CategoryCounts {
    if label == OVERALL_LABEL {
        report.overall.clone()
    } else {
        report.party(label)
    }
}

/// Stage entry point: reconciled aggregate → chart_data.csv
pub fn write_chart_data(outcome: &AggregateOutcome, output_path: &Path) -> Result<Vec<ChartPoint>> {
    let points = build_chart_data(&outcome.report, &outcome.base);
    write_records(output_path, &ChartPoint::COLUMNS, &points)?;
    tracing::info!(points = points.len(), "wrote chart data to {}", output_path.display());
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::aggregate_categories;
    use crate::config::{PipelineConfig, CHART_TAX_RATE_THRESHOLD};
    use crate::data_quality::CollectingSink;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_counts(no_income: usize, paid: usize, low: usize, none: usize) -> CategoryCounts {
        let mut counts = CategoryCounts::new();
        counts.add(Category::NoRentalIncome, no_income);
        counts.add(Category::TaxPaid, paid);
        counts.add(Category::LowTaxPaid, low);
        counts.add(Category::NoTaxPaid, none);
        counts
    }

    fn create_test_report() -> (AggregateReport, BaseCounts) {
        let mut per_party = BTreeMap::new();
        per_party.insert("Green Party".to_string(), create_test_counts(1, 0, 0, 0));
        per_party.insert("Labour Party".to_string(), create_test_counts(1500, 150, 50, 300));

        let report = AggregateReport {
            overall: create_test_counts(1501, 150, 50, 300),
            per_party,
            rows_read: 2001,
            analyzed: 2001,
            skipped: 0,
            generated_at: Utc::now(),
        };

        let mut base = BaseCounts::default();
        base.total = 2001;
        base.per_party.insert("Green Party".to_string(), 1);
        base.per_party.insert("Labour Party".to_string(), 2000);

        (report, base)
    }

    fn find<'a>(points: &'a [ChartPoint], series: ChartSeries, label: &str, category: Category) -> &'a ChartPoint {
        points
            .iter()
            .find(|p| p.series == series && p.label == label && p.category == category)
            .unwrap()
    }

    #[test]
    fn test_labels_ordered_by_base_size() {
        let (report, base) = create_test_report();
        let points = build_chart_data(&report, &base);

        let labels: Vec<&str> = points
            .iter()
            .filter(|p| p.series == ChartSeries::Counts && p.category == Category::TaxPaid)
            .map(|p| p.label.as_str())
            .collect();
        assert_eq!(labels, vec!["Overall", "Labour Party", "Green Party"]);

        // 4 categories x 3 labels + 3 categories x 3 labels
        assert_eq!(points.len(), 21);
    }

    #[test]
    fn test_counts_series_text() {
        let (report, base) = create_test_report();
        let points = build_chart_data(&report, &base);

        let labour = find(&points, ChartSeries::Counts, "Labour Party", Category::NoRentalIncome);
        assert_eq!(labour.count, 1500);
        assert_eq!(labour.text, "1,500");
        assert_eq!(labour.colour, "#AEC6CF");

        let green = find(&points, ChartSeries::Counts, "Green Party", Category::TaxPaid);
        assert_eq!(green.count, 0);
        assert_eq!(green.text, "");
    }

    #[test]
    fn test_percentages_exclude_no_rental_income() {
        let (report, base) = create_test_report();
        let points = build_chart_data(&report, &base);

        assert!(!points
            .iter()
            .any(|p| p.series == ChartSeries::Percentages && p.category == Category::NoRentalIncome));

        let paid = find(&points, ChartSeries::Percentages, "Labour Party", Category::TaxPaid);
        assert!((paid.value - 30.0).abs() < 1e-9);
        assert_eq!(paid.text, "30.0% (150 units)");

        let none = find(&points, ChartSeries::Percentages, "Labour Party", Category::NoTaxPaid);
        assert_eq!(none.text, "60.0% (300 units)");

        // No units with income: every share is zero and unlabelled
        let green = find(&points, ChartSeries::Percentages, "Green Party", Category::TaxPaid);
        assert_eq!(green.value, 0.0);
        assert_eq!(green.text, "");
    }

    #[test]
    fn test_stage_writes_long_form() {
        let dir = TempDir::new().unwrap();
        let units = dir.path().join("accounting_units.csv");
        let analysis = dir.path().join("analysis_results_checked.csv");
        let counts = dir.path().join("category_counts.csv");
        let output = dir.path().join("chart_data.csv");

        fs::write(&units, "RegulatedEntityName,AccountingUnitName\nLabour Party,Leeds\n").unwrap();
        fs::write(
            &analysis,
            "unit_name,entity_name,rental_income,approx_tax_rate\nLeeds,Labour Party,5000,0.2\n",
        )
        .unwrap();

        let sink = CollectingSink::new();
        let config = PipelineConfig::new(CHART_TAX_RATE_THRESHOLD);
        let outcome = aggregate_categories(&units, &analysis, &counts, &config, &sink).unwrap();
        let points = write_chart_data(&outcome, &output).unwrap();

        assert_eq!(points.len(), 14);
        let written = fs::read_to_string(&output).unwrap();
        let mut lines = written.lines();
        assert_eq!(lines.next(), Some("series,label,category,value,count,text,colour"));
        assert_eq!(ChartPoint::COLUMNS.join(","), "series,label,category,value,count,text,colour");
        assert!(written.contains("percentages,Labour Party,Tax paid,100.0,1,100.0% (1 units),#77DD77"));
        assert!(counts.exists());
    }
}
