// 🧾 Input records - typed views over the three input tables
//
// Filing        ← accounting-units table (one reported account)
// MpRecord      ← MP roster
// AnalysisRecord← analysis-results table (output of the manual/LLM extraction)

use crate::data_quality::{DataIssue, IssueKind, WarningSink};
use crate::tables::{parse_amount, parse_flag, Row};
use serde::{Deserialize, Serialize};

// ============================================================================
// FILING
// ============================================================================

pub const REGULATED_ENTITY_NAME: &str = "RegulatedEntityName";
pub const ACCOUNTING_UNIT_NAME: &str = "AccountingUnitName";
pub const EC_REF: &str = "ECRef";
pub const REGISTER_NAME: &str = "RegisterName";
pub const REPORTING_PERIOD: &str = "ReportingPeriodDescription";

/// One reported account for an accounting unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filing {
    pub regulated_entity_name: String,
    pub accounting_unit_name: String,
    pub ec_ref: String,
    pub register_name: String,
    pub reporting_period: String,

    /// Every cell of the source row, key columns already trimmed
    #[serde(default)]
    pub values: Vec<String>,

    /// 1-based data row in the source table
    #[serde(default)]
    pub row: usize,
}

impl Filing {
    pub const REQUIRED_COLUMNS: [&'static str; 5] = [
        REGULATED_ENTITY_NAME,
        ACCOUNTING_UNIT_NAME,
        EC_REF,
        REGISTER_NAME,
        REPORTING_PERIOD,
    ];

    pub fn new(
        regulated_entity_name: &str,
        accounting_unit_name: &str,
        ec_ref: &str,
        register_name: &str,
        reporting_period: &str,
    ) -> Self {
        Filing {
            regulated_entity_name: regulated_entity_name.trim().to_string(),
            accounting_unit_name: accounting_unit_name.trim().to_string(),
            ec_ref: ec_ref.trim().to_string(),
            register_name: register_name.trim().to_string(),
            reporting_period: reporting_period.trim().to_string(),
            values: Vec::new(),
            row: 0,
        }
    }

    /// Build from a table row; key columns are trimmed in `values` too.
    pub fn from_row(row: Row<'_>, headers: &[String]) -> Self {
        let mut filing = Filing::new(
            row.get(REGULATED_ENTITY_NAME),
            row.get(ACCOUNTING_UNIT_NAME),
            row.get(EC_REF),
            row.get(REGISTER_NAME),
            row.get(REPORTING_PERIOD),
        );

        let mut values = row.values().to_vec();
        for (i, header) in headers.iter().enumerate() {
            if Self::REQUIRED_COLUMNS.contains(&header.as_str()) {
                if let Some(cell) = values.get_mut(i) {
                    *cell = cell.trim().to_string();
                }
            }
        }

        filing.values = values;
        filing.row = row.number();
        filing
    }

    /// Reporting period as a plain integer year ("2022"), else None
    pub fn reporting_year(&self) -> Option<i32> {
        self.reporting_period.parse::<i32>().ok()
    }

    /// Numeric part of the ECRef: "ST015" → 15, "7" → 7, "ST" / "X12" → None
    pub fn ec_ref_number(&self) -> Option<u64> {
        let digits = match self.ec_ref.get(..2) {
            Some(prefix) if prefix.eq_ignore_ascii_case("st") => &self.ec_ref[2..],
            _ => self.ec_ref.as_str(),
        };
        digits.trim().parse::<u64>().ok()
    }

    /// Grouping key: (party, unit) exactly as given after trimming
    pub fn unit_key(&self) -> (&str, &str) {
        (&self.regulated_entity_name, &self.accounting_unit_name)
    }
}

// ============================================================================
// MP RECORD
// ============================================================================

pub const CONSTITUENCY: &str = "Constituency";
pub const MP_NAME: &str = "Name (Display as)";
pub const MP_EMAIL: &str = "Email";
pub const MP_PARTY: &str = "Party";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MpRecord {
    pub constituency: String,
    pub name: String,
    pub email: String,
    pub party: String,
}

impl MpRecord {
    pub const REQUIRED_COLUMNS: [&'static str; 4] = [CONSTITUENCY, MP_NAME, MP_EMAIL, MP_PARTY];

    pub fn new(constituency: &str, name: &str, email: &str, party: &str) -> Self {
        MpRecord {
            constituency: constituency.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            party: party.to_string(),
        }
    }

    pub fn from_row(row: Row<'_>) -> Self {
        MpRecord::new(
            row.get(CONSTITUENCY),
            row.get(MP_NAME),
            row.get(MP_EMAIL),
            row.get(MP_PARTY),
        )
    }
}

// ============================================================================
// ANALYSIS RECORD
// ============================================================================

pub const UNIT_NAME: &str = "unit_name";
pub const ENTITY_NAME: &str = "entity_name";
pub const RENTAL_INCOME: &str = "rental_income";
pub const APPROX_TAX_RATE: &str = "approx_tax_rate";
pub const RENTED_TO_MP: &str = "rented_to_mp";
pub const YEARS_RENTED_TO_MP: &str = "years_rented_to_mp";
pub const ENRICHED_MP_NAME: &str = "mp_name";
pub const ENRICHED_MP_EMAIL: &str = "mp_email";
pub const DOCUMENT_NUMBER: &str = "number";

/// One unit's extracted rental income and tax figures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub unit_name: String,
    pub entity_name: String,
    pub rental_income: Option<f64>,
    pub approx_tax_rate: Option<f64>,
    pub rented_to_mp: bool,
    pub years_rented_to_mp: Option<f64>,
    pub mp_name: String,
    pub mp_email: String,
    /// Accounts document number, used to build links to the PDF
    pub number: String,
}

impl AnalysisRecord {
    pub const REQUIRED_COLUMNS: [&'static str; 4] =
        [UNIT_NAME, ENTITY_NAME, RENTAL_INCOME, APPROX_TAX_RATE];

    pub fn new(unit_name: &str, entity_name: &str) -> Self {
        AnalysisRecord {
            unit_name: unit_name.to_string(),
            entity_name: entity_name.to_string(),
            ..Default::default()
        }
    }

    /// Builder pattern: add rental income
    pub fn with_income(mut self, income: f64) -> Self {
        self.rental_income = Some(income);
        self
    }

    /// Builder pattern: add tax rate
    pub fn with_tax_rate(mut self, rate: f64) -> Self {
        self.approx_tax_rate = Some(rate);
        self
    }

    /// Builder pattern: mark as rented to an MP
    pub fn with_rented_to_mp(mut self, years: Option<f64>) -> Self {
        self.rented_to_mp = true;
        self.years_rented_to_mp = years;
        self
    }

    /// Parse a row; unparsable numbers become missing and are reported.
    pub fn from_row(row: Row<'_>, sink: &dyn WarningSink) -> Self {
        let unit_name = row.get(UNIT_NAME);
        let number = |column: &str| -> Option<f64> {
            let raw = row.get(column);
            let parsed = parse_amount(raw);
            if parsed.is_none() && !raw.trim().is_empty() {
                sink.report(
                    DataIssue::warning(
                        IssueKind::UnparsableNumber,
                        format!("{} = {:?} for '{}' treated as missing", column, raw, unit_name),
                    )
                    .at_row(row.number()),
                );
            }
            parsed
        };

        let rental_income = number(RENTAL_INCOME);
        let approx_tax_rate = number(APPROX_TAX_RATE);

        AnalysisRecord {
            unit_name: unit_name.to_string(),
            entity_name: row.get(ENTITY_NAME).to_string(),
            rental_income,
            approx_tax_rate,
            rented_to_mp: parse_flag(row.get(RENTED_TO_MP)),
            years_rented_to_mp: parse_amount(row.get(YEARS_RENTED_TO_MP)),
            mp_name: row.get(ENRICHED_MP_NAME).to_string(),
            mp_email: row.get(ENRICHED_MP_EMAIL).to_string(),
            number: row.get(DOCUMENT_NUMBER).trim().to_string(),
        }
    }
}
