// Report data
// Flat tables handed to the HTML templater and the charting library.

pub mod charts;
pub mod table;

pub use charts::{build_chart_data, write_chart_data, ChartPoint, ChartSeries};
pub use table::{build_results_table, write_results_table, HighlightTier, MissingTaxEstimate, ResultsTable, TableRow};

/// 12345 → "12,345"
pub fn format_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if value < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}
