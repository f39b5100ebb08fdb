// ⚙️ Pipeline Configuration - thresholds, file names, party aliases
//
// One explicit object handed to every stage entry point. Loaded from JSON;
// `tax_rate_threshold` has no silent default because two report variants
// disagree on it (CHART_TAX_RATE_THRESHOLD vs TABLE_TAX_RATE_THRESHOLD).

use crate::entities::PartyAliases;
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_EARLIEST_ACCOUNTING_YEAR: i32 = 2021;
pub const DEFAULT_REQUIRED_REGISTER_NAME: &str = "Great Britain";
pub const DEFAULT_RENTAL_INCOME_THRESHOLD: f64 = 1.0;
pub const DEFAULT_TAX_RATE_EPSILON: f64 = 0.005;

/// Tax-rate threshold used by the category charts
pub const CHART_TAX_RATE_THRESHOLD: f64 = 0.10;
/// Tax-rate threshold used by the results table highlight
pub const TABLE_TAX_RATE_THRESHOLD: f64 = 0.15;

// ============================================================================
// PIPELINE CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Filings reporting before this year are dropped
    #[serde(default = "default_earliest_year")]
    pub earliest_accounting_year: i32,

    /// Only filings on this register survive (exact, case-sensitive)
    #[serde(default = "default_register_name")]
    pub required_register_name: String,

    /// Income at or below this is "No rental income"
    #[serde(default = "default_income_threshold")]
    pub rental_income_threshold: f64,

    /// Rate at or above this is "Tax paid"
    pub tax_rate_threshold: f64,

    /// Rates at or below this count as zero
    #[serde(default = "default_epsilon")]
    pub tax_rate_epsilon: f64,

    #[serde(default)]
    pub table: TableConfig,

    #[serde(default = "PartyAliases::uk_defaults")]
    pub party_aliases: PartyAliases,

    /// Replaces `party_aliases` when set (relative to the config file)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party_aliases_file: Option<PathBuf>,

    #[serde(default)]
    pub files: FilePaths,
}

const TAX_RATE_THRESHOLD_FIELD: &str = "tax_rate_threshold";

fn missing_threshold() -> PipelineError {
    PipelineError::InvalidConfig(format!(
        "{} is not set; pass --tax-rate-threshold or add it to the config file (the chart report uses {:.2}, the results table {:.2})",
        TAX_RATE_THRESHOLD_FIELD, CHART_TAX_RATE_THRESHOLD, TABLE_TAX_RATE_THRESHOLD
    ))
}

fn default_earliest_year() -> i32 {
    DEFAULT_EARLIEST_ACCOUNTING_YEAR
}

fn default_register_name() -> String {
    DEFAULT_REQUIRED_REGISTER_NAME.to_string()
}

fn default_income_threshold() -> f64 {
    DEFAULT_RENTAL_INCOME_THRESHOLD
}

fn default_epsilon() -> f64 {
    DEFAULT_TAX_RATE_EPSILON
}

impl PipelineConfig {
    /// Everything defaulted except the tax-rate threshold, which the caller must choose
    pub fn new(tax_rate_threshold: f64) -> Self {
        PipelineConfig {
            earliest_accounting_year: DEFAULT_EARLIEST_ACCOUNTING_YEAR,
            required_register_name: DEFAULT_REQUIRED_REGISTER_NAME.to_string(),
            rental_income_threshold: DEFAULT_RENTAL_INCOME_THRESHOLD,
            tax_rate_threshold,
            tax_rate_epsilon: DEFAULT_TAX_RATE_EPSILON,
            table: TableConfig::default(),
            party_aliases: PartyAliases::uk_defaults(),
            party_aliases_file: None,
            files: FilePaths::default(),
        }
    }

    /// Load from JSON, resolve the alias file, and validate
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::resolve(Some(path.as_ref()), None, None)
    }

    /// Build the config a run uses.
    ///
    /// The tax-rate threshold comes from `threshold` if given, then the file,
    /// then `fallback`; with none of them the config is rejected.
    pub fn resolve(path: Option<&Path>, threshold: Option<f64>, fallback: Option<f64>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => {
                let threshold = threshold.or(fallback).ok_or_else(missing_threshold)?;
                let config = PipelineConfig::new(threshold);
                config.validate()?;
                return Ok(config);
            }
        };

        let invalid = |e: serde_json::Error| PipelineError::InvalidConfig(format!("{}: {}", path.display(), e));

        let content = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let mut value: serde_json::Value = serde_json::from_str(&content).map_err(invalid)?;
        let fields = value.as_object_mut().ok_or_else(|| {
            PipelineError::InvalidConfig(format!("{}: expected a JSON object", path.display()))
        })?;

        match threshold {
            Some(t) => {
                fields.insert(TAX_RATE_THRESHOLD_FIELD.to_string(), t.into());
            }
            None if !fields.contains_key(TAX_RATE_THRESHOLD_FIELD) => {
                let t = fallback.ok_or_else(missing_threshold)?;
                fields.insert(TAX_RATE_THRESHOLD_FIELD.to_string(), t.into());
            }
            None => {}
        }

        let mut config: PipelineConfig = serde_json::from_value(value).map_err(invalid)?;

        if let Some(aliases_file) = &config.party_aliases_file {
            let resolved = match path.parent() {
                Some(dir) => dir.join(aliases_file),
                None => aliases_file.clone(),
            };
            config.party_aliases = PartyAliases::from_file(resolved)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let finite = [
            ("rental_income_threshold", self.rental_income_threshold),
            ("tax_rate_threshold", self.tax_rate_threshold),
            ("tax_rate_epsilon", self.tax_rate_epsilon),
            ("table.include_rate_ceiling", self.table.include_rate_ceiling),
            ("table.highlight_rate", self.table.highlight_rate),
            ("table.expected_tax_rate", self.table.expected_tax_rate),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(PipelineError::InvalidConfig(format!("{} must be a finite number", name)));
            }
        }

        if self.tax_rate_epsilon < 0.0 || self.tax_rate_epsilon >= self.tax_rate_threshold {
            return Err(PipelineError::InvalidConfig(format!(
                "tax_rate_epsilon ({}) must be in [0, tax_rate_threshold ({}))",
                self.tax_rate_epsilon, self.tax_rate_threshold
            )));
        }

        if self.required_register_name.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "required_register_name must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn summary(&self) -> String {
        format!(
            "year >= {}, register = '{}', income > £{:.2}, tax paid >= {:.0}%, zero <= {:.1}%",
            self.earliest_accounting_year,
            self.required_register_name,
            self.rental_income_threshold,
            self.tax_rate_threshold * 100.0,
            self.tax_rate_epsilon * 100.0
        )
    }
}

// ============================================================================
// RESULTS TABLE OPTIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Rows whose rate is above this are left out of the table
    pub include_rate_ceiling: f64,

    /// Rows below this rate are highlighted as low tax
    pub highlight_rate: f64,

    /// Rate used to estimate tax that should have been paid
    pub expected_tax_rate: f64,

    /// Prefix for links to the accounts PDFs ("{prefix}{number}.pdf")
    pub accounts_url_prefix: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        TableConfig {
            include_rate_ceiling: 1.0,
            highlight_rate: TABLE_TAX_RATE_THRESHOLD,
            expected_tax_rate: 0.15,
            accounts_url_prefix: String::new(),
        }
    }
}

// ============================================================================
// FILE PATHS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePaths {
    pub accounting_units: PathBuf,
    pub accounting_units_deduped: PathBuf,
    pub mp_roster: PathBuf,
    pub analysis_results: PathBuf,
    pub enriched_results: PathBuf,
    pub category_counts: PathBuf,
    pub results_table: PathBuf,
    pub chart_data: PathBuf,
}

impl Default for FilePaths {
    fn default() -> Self {
        FilePaths {
            accounting_units: PathBuf::from("accounting_units.csv"),
            accounting_units_deduped: PathBuf::from("accounting_units2.csv"),
            mp_roster: PathBuf::from("list_of_mps.csv"),
            analysis_results: PathBuf::from("analysis_results_checked.csv"),
            enriched_results: PathBuf::from("analysis_results_checked2.csv"),
            category_counts: PathBuf::from("category_counts.csv"),
            results_table: PathBuf::from("results_table.csv"),
            chart_data: PathBuf::from("chart_data.csv"),
        }
    }
}

impl FilePaths {
    /// Resolve every relative path against `dir` (absolute paths are kept)
    pub fn in_dir(&self, dir: &Path) -> FilePaths {
        FilePaths {
            accounting_units: dir.join(&self.accounting_units),
            accounting_units_deduped: dir.join(&self.accounting_units_deduped),
            mp_roster: dir.join(&self.mp_roster),
            analysis_results: dir.join(&self.analysis_results),
            enriched_results: dir.join(&self.enriched_results),
            category_counts: dir.join(&self.category_counts),
            results_table: dir.join(&self.results_table),
            chart_data: dir.join(&self.chart_data),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_uses_documented_defaults() {
        let config = PipelineConfig::new(CHART_TAX_RATE_THRESHOLD);

        assert_eq!(config.earliest_accounting_year, 2021);
        assert_eq!(config.required_register_name, "Great Britain");
        assert_eq!(config.rental_income_threshold, 1.0);
        assert_eq!(config.tax_rate_threshold, 0.10);
        assert_eq!(config.tax_rate_epsilon, 0.005);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_requires_tax_rate_threshold() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"earliest_accounting_year": 2022}"#).unwrap();

        let err = PipelineConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn test_from_file_with_alias_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("aliases.json"), r#"{"Alba": "Alba Party"}"#).unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "tax_rate_threshold": 0.15,
                "party_aliases_file": "aliases.json",
                "table": {"accounts_url_prefix": "https://example.org/accounts/"},
                "files": {"mp_roster": "mps_2024.csv"}
            }"#,
        )
        .unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();

        assert_eq!(config.tax_rate_threshold, 0.15);
        assert_eq!(config.earliest_accounting_year, 2021);
        assert_eq!(config.party_aliases.canonicalize("Alba"), "Alba Party");
        assert_eq!(config.party_aliases.len(), 1);
        assert_eq!(config.table.accounts_url_prefix, "https://example.org/accounts/");
        assert_eq!(config.table.highlight_rate, 0.15);
        assert_eq!(config.files.mp_roster, PathBuf::from("mps_2024.csv"));
        assert_eq!(config.files.analysis_results, PathBuf::from("analysis_results_checked.csv"));
    }

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("config.json");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_resolve_without_file() {
        let config = PipelineConfig::resolve(None, Some(0.15), None).unwrap();
        assert_eq!(config.tax_rate_threshold, 0.15);

        let config = PipelineConfig::resolve(None, None, Some(CHART_TAX_RATE_THRESHOLD)).unwrap();
        assert_eq!(config.tax_rate_threshold, 0.10);

        let err = PipelineConfig::resolve(None, None, None).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn test_resolve_threshold_from_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"tax_rate_threshold": 0.15}"#);

        let config = PipelineConfig::resolve(Some(&path), None, Some(0.10)).unwrap();
        assert_eq!(config.tax_rate_threshold, 0.15);
    }

    #[test]
    fn test_resolve_flag_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"tax_rate_threshold": 0.15}"#);

        let config = PipelineConfig::resolve(Some(&path), Some(0.10), None).unwrap();
        assert_eq!(config.tax_rate_threshold, 0.10);
    }

    #[test]
    fn test_resolve_flag_completes_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"table": {"accounts_url_prefix": "https://example.org/"}}"#);

        let config = PipelineConfig::resolve(Some(&path), Some(0.15), None).unwrap();
        assert_eq!(config.tax_rate_threshold, 0.15);
        assert_eq!(config.table.accounts_url_prefix, "https://example.org/");
    }

    #[test]
    fn test_resolve_fallback_completes_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"earliest_accounting_year": 2022}"#);

        let config = PipelineConfig::resolve(Some(&path), None, Some(CHART_TAX_RATE_THRESHOLD)).unwrap();
        assert_eq!(config.tax_rate_threshold, 0.10);
        assert_eq!(config.earliest_accounting_year, 2022);

        let err = PipelineConfig::resolve(Some(&path), None, None).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn test_inline_party_aliases_are_cleaned() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"{"tax_rate_threshold": 0.10, "party_aliases": {" Alba ": "Alba Party", "Reform UK": "Reform UK"}}"#,
        );

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.party_aliases.len(), 1);
        assert_eq!(config.party_aliases.canonicalize("Alba"), "Alba Party");
    }

    #[test]
    fn test_validate_rejects_epsilon_above_threshold() {
        let mut config = PipelineConfig::new(0.10);
        config.tax_rate_epsilon = 0.2;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::new(f64::NAN);
        config.tax_rate_epsilon = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_paths_in_dir() {
        let files = FilePaths::default().in_dir(Path::new("/data/run"));
        assert_eq!(files.mp_roster, PathBuf::from("/data/run/list_of_mps.csv"));
    }
}
