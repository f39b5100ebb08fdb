// 🏷️ Category Classifier - income/tax thresholds as data
//
// Rules, first match wins:
//   1. income missing or <= rental_income_threshold   → No rental income
//   2. rate >= tax_rate_threshold                      → Tax paid
//   3. tax_rate_epsilon < rate < tax_rate_threshold    → Low tax paid
//   4. otherwise (rate missing, zero, <= epsilon)      → No tax paid

use crate::config::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// CATEGORY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "No rental income")]
    NoRentalIncome,
    #[serde(rename = "Tax paid")]
    TaxPaid,
    #[serde(rename = "Low tax paid")]
    LowTaxPaid,
    #[serde(rename = "No tax paid")]
    NoTaxPaid,
}

impl Category {
    /// Display order used by every report
    pub const ALL: [Category; 4] = [
        Category::NoRentalIncome,
        Category::TaxPaid,
        Category::LowTaxPaid,
        Category::NoTaxPaid,
    ];

    /// Categories for units that do have rental income
    pub const WITH_INCOME: [Category; 3] = [Category::TaxPaid, Category::LowTaxPaid, Category::NoTaxPaid];

    pub fn label(&self) -> &'static str {
        match self {
            Category::NoRentalIncome => "No rental income",
            Category::TaxPaid => "Tax paid",
            Category::LowTaxPaid => "Low tax paid",
            Category::NoTaxPaid => "No tax paid",
        }
    }

    /// Bar colour in the charts
    pub fn colour(&self) -> &'static str {
        match self {
            Category::NoRentalIncome => "#AEC6CF",
            Category::TaxPaid => "#77DD77",
            Category::LowTaxPaid => "#FFB347",
            Category::NoTaxPaid => "#FF6961",
        }
    }

    pub fn from_label(label: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.label() == label)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// CLASSIFIER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryClassifier {
    pub rental_income_threshold: f64,
    pub tax_rate_threshold: f64,
    pub tax_rate_epsilon: f64,
}

impl CategoryClassifier {
    pub fn new(rental_income_threshold: f64, tax_rate_threshold: f64, tax_rate_epsilon: f64) -> Self {
        CategoryClassifier {
            rental_income_threshold,
            tax_rate_threshold,
            tax_rate_epsilon,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        CategoryClassifier::new(
            config.rental_income_threshold,
            config.tax_rate_threshold,
            config.tax_rate_epsilon,
        )
    }

    /// NaN and infinities are treated as missing
    pub fn classify(&self, rental_income: Option<f64>, tax_rate: Option<f64>) -> Category {
        let income = rental_income.filter(|v| v.is_finite());
        let rate = tax_rate.filter(|v| v.is_finite());

        match income {
            None => return Category::NoRentalIncome,
            Some(income) if income <= self.rental_income_threshold => return Category::NoRentalIncome,
            Some(_) => {}
        }

        match rate {
            Some(rate) if rate >= self.tax_rate_threshold => Category::TaxPaid,
            Some(rate) if rate > self.tax_rate_epsilon => Category::LowTaxPaid,
            _ => Category::NoTaxPaid,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CHART_TAX_RATE_THRESHOLD, TABLE_TAX_RATE_THRESHOLD};

    fn create_test_classifier() -> CategoryClassifier {
        CategoryClassifier::from_config(&PipelineConfig::new(CHART_TAX_RATE_THRESHOLD))
    }

    #[test]
    fn test_zero_income_is_no_rental_income() {
        let classifier = create_test_classifier();
        assert_eq!(classifier.classify(Some(0.0), None), Category::NoRentalIncome);
    }

    #[test]
    fn test_rate_above_threshold_is_tax_paid() {
        let classifier = create_test_classifier();
        assert_eq!(classifier.classify(Some(1000.0), Some(0.20)), Category::TaxPaid);
    }

    #[test]
    fn test_rate_between_epsilon_and_threshold_is_low_tax() {
        let classifier = create_test_classifier();
        assert_eq!(classifier.classify(Some(1000.0), Some(0.05)), Category::LowTaxPaid);
    }

    #[test]
    fn test_missing_rate_is_no_tax_paid() {
        let classifier = create_test_classifier();
        assert_eq!(classifier.classify(Some(1000.0), None), Category::NoTaxPaid);
    }

    #[test]
    fn test_boundaries() {
        let classifier = create_test_classifier();

        // Income threshold is inclusive for "No rental income"
        assert_eq!(classifier.classify(Some(1.0), Some(0.5)), Category::NoRentalIncome);
        assert_eq!(classifier.classify(Some(1.01), Some(0.5)), Category::TaxPaid);

        // Threshold rate itself counts as paid
        assert_eq!(classifier.classify(Some(500.0), Some(0.10)), Category::TaxPaid);

        // Epsilon itself counts as zero
        assert_eq!(classifier.classify(Some(500.0), Some(0.005)), Category::NoTaxPaid);
        assert_eq!(classifier.classify(Some(500.0), Some(0.0)), Category::NoTaxPaid);
        assert_eq!(classifier.classify(Some(500.0), Some(0.006)), Category::LowTaxPaid);
    }

    #[test]
    fn test_non_finite_values_are_missing() {
        let classifier = create_test_classifier();

        assert_eq!(classifier.classify(Some(f64::NAN), Some(0.2)), Category::NoRentalIncome);
        assert_eq!(classifier.classify(Some(f64::INFINITY), Some(0.2)), Category::NoRentalIncome);
        assert_eq!(classifier.classify(Some(800.0), Some(f64::NAN)), Category::NoTaxPaid);
    }

    #[test]
    fn test_threshold_variant_changes_result() {
        let chart = create_test_classifier();
        let table = CategoryClassifier::from_config(&PipelineConfig::new(TABLE_TAX_RATE_THRESHOLD));

        assert_eq!(chart.classify(Some(1000.0), Some(0.12)), Category::TaxPaid);
        assert_eq!(table.classify(Some(1000.0), Some(0.12)), Category::LowTaxPaid);
    }

    #[test]
    fn test_category_labels_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::from_label(category.label()), Some(category));
        }
        assert_eq!(Category::from_label("Other"), None);
    }
}
