// 🔗 Entity Matcher - join analysis rows to the MP roster
//
// Two datasets, no shared key. Constituencies are matched on canonical_key()
// of the name, then a party gate rejects same-named seats held by another party:
// the MP's party (lower-cased) must appear inside the unit's entity name.

use crate::data_quality::{DataIssue, IssueKind, WarningSink};
use crate::entities::records::{ENRICHED_MP_EMAIL, ENRICHED_MP_NAME, ENTITY_NAME, UNIT_NAME};
use crate::entities::MpRecord;
use crate::error::Result;
use crate::normalize::canonical_key;
use crate::tables::Table;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

// ============================================================================
// MATCH OUTCOME
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome<'a> {
    /// Constituency and party both agree
    Matched(&'a MpRecord),

    /// Constituency found but the party gate rejected it
    PartyMismatch(&'a MpRecord),

    /// No constituency with this key (or the key was empty)
    NoMatch,
}

impl<'a> MatchOutcome<'a> {
    pub fn mp(&self) -> Option<&'a MpRecord> {
        match self {
            MatchOutcome::Matched(mp) => Some(*mp),
            _ => None,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, MatchOutcome::Matched(_))
    }
}

// ============================================================================
// MP LOOKUP
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupStats {
    pub loaded: usize,
    pub duplicate_keys: usize,
    pub missing_constituency: usize,
    pub empty_keys: usize,
}

/// canonical_key(constituency) → MP. Later rows overwrite earlier ones on a
/// key collision (last write wins), and every collision is reported.
#[derive(Debug, Clone, Default)]
pub struct MpLookup {
    entries: HashMap<String, MpRecord>,
    pub stats: LookupStats,
}

impl MpLookup {
    pub fn build(roster: &[MpRecord], sink: &dyn WarningSink) -> Self {
        let mut lookup = MpLookup::default();

        for (i, mp) in roster.iter().enumerate() {
            let row = i + 1;

            if mp.constituency.trim().is_empty() {
                lookup.stats.missing_constituency += 1;
                sink.report(
                    DataIssue::info(IssueKind::MissingConstituency, format!("MP '{}' has no constituency", mp.name))
                        .at_row(row),
                );
                continue;
            }

            let key = canonical_key(&mp.constituency);
            if key.is_empty() {
                lookup.stats.empty_keys += 1;
                sink.report(
                    DataIssue::warning(
                        IssueKind::EmptyCanonicalKey,
                        format!("could not build a key for constituency '{}'", mp.constituency),
                    )
                    .at_row(row),
                );
                continue;
            }

            if let Some(previous) = lookup.entries.get(&key) {
                lookup.stats.duplicate_keys += 1;
                sink.report(
                    DataIssue::warning(
                        IssueKind::DuplicateCanonicalKey,
                        format!(
                            "key '{}' for '{}' already used by '{}'; keeping the later row",
                            key, mp.constituency, previous.constituency
                        ),
                    )
                    .at_row(row),
                );
            }

            lookup.entries.insert(key, mp.clone());
            lookup.stats.loaded += 1;
        }

        lookup
    }

    pub fn get(&self, key: &str) -> Option<&MpRecord> {
        if key.is_empty() {
            return None;
        }
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a unit and apply the party gate.
    pub fn resolve_detailed(&self, unit_name: &str, entity_name: &str) -> MatchOutcome<'_> {
        let candidate = match self.get(&canonical_key(unit_name)) {
            Some(mp) => mp,
            None => return MatchOutcome::NoMatch,
        };

        let party = candidate.party.trim().to_lowercase();
        let entity = entity_name.to_lowercase();
        if !party.is_empty() && !entity.trim().is_empty() && entity.contains(&party) {
            MatchOutcome::Matched(candidate)
        } else {
            MatchOutcome::PartyMismatch(candidate)
        }
    }

    /// The MP for a unit, or None. Gate rejections are reported to `sink`.
    pub fn resolve(&self, unit_name: &str, entity_name: &str, sink: &dyn WarningSink) -> Option<&MpRecord> {
        let outcome = self.resolve_detailed(unit_name, entity_name);
        if let MatchOutcome::PartyMismatch(mp) = &outcome {
            sink.report(party_mismatch(unit_name, mp, entity_name));
        }
        outcome.mp()
    }
}

fn party_mismatch(unit_name: &str, mp: &MpRecord, entity_name: &str) -> DataIssue {
    DataIssue::warning(
        IssueKind::PartyMismatch,
        format!(
            "constituency match for '{}', but party '{}' not in entity '{}'",
            unit_name, mp.party, entity_name
        ),
    )
}

// ============================================================================
// ENRICHMENT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchReport {
    pub rows_processed: usize,
    pub matched: usize,
    pub party_mismatches: usize,
    pub unmatched: usize,
    pub roster: LookupStats,
}

impl MatchReport {
    pub fn summary(&self) -> String {
        format!(
            "{} rows: {} matched, {} party mismatches, {} unmatched (roster: {} loaded, {} duplicate keys)",
            self.rows_processed,
            self.matched,
            self.party_mismatches,
            self.unmatched,
            self.roster.loaded,
            self.roster.duplicate_keys
        )
    }
}

/// Fill `mp_name` / `mp_email` on every row (blank when unmatched).
/// Existing columns are overwritten rather than duplicated.
pub fn enrich_table(table: &mut Table, lookup: &MpLookup, sink: &dyn WarningSink) -> MatchReport {
    let name_col = table.ensure_column(ENRICHED_MP_NAME);
    let email_col = table.ensure_column(ENRICHED_MP_EMAIL);
    let unit_col = table.index_of(UNIT_NAME);
    let entity_col = table.index_of(ENTITY_NAME);

    let mut report = MatchReport {
        roster: lookup.stats.clone(),
        ..Default::default()
    };

    for (i, row) in table.rows.iter_mut().enumerate() {
        report.rows_processed += 1;

        let cell = |col: Option<usize>| col.and_then(|c| row.get(c)).cloned().unwrap_or_default();
        let unit_name = cell(unit_col);
        let entity_name = cell(entity_col);

        let (name, email) = match lookup.resolve_detailed(&unit_name, &entity_name) {
            MatchOutcome::Matched(mp) => {
                report.matched += 1;
                (mp.name.clone(), mp.email.clone())
            }
            MatchOutcome::PartyMismatch(mp) => {
                report.party_mismatches += 1;
                sink.report(party_mismatch(&unit_name, mp, &entity_name).at_row(i + 1));
                (String::new(), String::new())
            }
            MatchOutcome::NoMatch => {
                report.unmatched += 1;
                tracing::debug!(unit = %unit_name, "no constituency match");
                (String::new(), String::new())
            }
        };

        row[name_col] = name;
        row[email_col] = email;
    }

    report
}

/// Stage entry point: roster + analysis results → enriched analysis results.
pub fn match_mps(
    roster_path: &Path,
    analysis_path: &Path,
    output_path: &Path,
    sink: &dyn WarningSink,
) -> Result<MatchReport> {
    let roster_table = Table::read(roster_path, &MpRecord::REQUIRED_COLUMNS)?;
    let mut analysis = Table::read(analysis_path, &[UNIT_NAME, ENTITY_NAME])?;

    let roster: Vec<MpRecord> = roster_table.iter().map(MpRecord::from_row).collect();
    let lookup = MpLookup::build(&roster, sink);
    tracing::info!(
        mps = lookup.stats.loaded,
        duplicates = lookup.stats.duplicate_keys,
        "loaded MP roster from {}",
        roster_path.display()
    );
    if lookup.is_empty() {
        tracing::warn!("no MP data loaded; output will have blank MP details");
    }

    let report = enrich_table(&mut analysis, &lookup, sink);
    analysis.write_atomic(output_path)?;

    tracing::info!("{}", report.summary());
    Ok(report)
}

/// Blank `mp_name` and `mp_email` (adding them if absent), e.g. before a re-match.
pub fn clear_mp_columns(table: &mut Table) {
    let name_col = table.ensure_column(ENRICHED_MP_NAME);
    let email_col = table.ensure_column(ENRICHED_MP_EMAIL);
    for row in &mut table.rows {
        row[name_col].clear();
        row[email_col].clear();
    }
}

/// Stage entry point for `clear_mp_columns`
pub fn clear_mps(input_path: &Path, output_path: &Path) -> Result<usize> {
    let mut table = Table::read(input_path, &[])?;
    clear_mp_columns(&mut table);
    table.write_atomic(output_path)?;
    tracing::info!(rows = table.len(), "cleared MP columns into {}", output_path.display());
    Ok(table.len())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_quality::CollectingSink;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_mp(constituency: &str, name: &str, party: &str) -> MpRecord {
        let email = format!("{}@parliament.uk", name.to_lowercase().replace(' ', "."));
        MpRecord::new(constituency, name, &email, party)
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_match_accepted_through_party_gate() {
        let sink = CollectingSink::new();
        let lookup = MpLookup::build(
            &[create_test_mp("Cities of London and Westminster", "Rachel Blake", "Conservative")],
            &sink,
        );

        let mp = lookup.resolve("Cities of London & Westminster", "Conservative and Unionist Party", &sink);

        assert_eq!(mp.map(|m| m.name.as_str()), Some("Rachel Blake"));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_party_gate_rejects_other_party() {
        let sink = CollectingSink::new();
        let lookup = MpLookup::build(&[create_test_mp("Bristol Central", "Carla Denyer", "Green Party")], &sink);

        let mp = lookup.resolve("Bristol Central", "Labour Party", &sink);

        assert!(mp.is_none());
        assert_eq!(sink.count(IssueKind::PartyMismatch), 1);
        let issue = &sink.issues()[0];
        assert!(issue.message.contains("Green Party"));
        assert!(issue.message.contains("Labour Party"));
    }

    #[test]
    fn test_party_gate_rejects_blank_party_or_entity() {
        let sink = CollectingSink::new();
        let lookup = MpLookup::build(&[create_test_mp("Chorley", "Lindsay Hoyle", "")], &sink);

        assert!(matches!(lookup.resolve_detailed("Chorley", "Labour Party"), MatchOutcome::PartyMismatch(_)));
        assert!(matches!(lookup.resolve_detailed("Chorley", ""), MatchOutcome::PartyMismatch(_)));
    }

    #[test]
    fn test_word_order_and_saint_variants_match() {
        let sink = CollectingSink::new();
        let lookup = MpLookup::build(
            &[
                create_test_mp("St Ives", "Andrew George", "Liberal Democrats"),
                create_test_mp("East Ham", "Stephen Timms", "Labour"),
            ],
            &sink,
        );

        assert!(lookup.resolve_detailed("St. Ives CLP", "Liberal Democrats").is_match());
        assert!(lookup.resolve_detailed("Ham East", "Labour Party").is_match());
        assert_eq!(lookup.resolve_detailed("West Ham", "Labour Party"), MatchOutcome::NoMatch);
    }

    #[test]
    fn test_duplicate_keys_last_write_wins_with_warning() {
        let sink = CollectingSink::new();
        let lookup = MpLookup::build(
            &[
                create_test_mp("Ham East", "First MP", "Labour"),
                create_test_mp("East Ham", "Second MP", "Labour"),
            ],
            &sink,
        );

        assert_eq!(lookup.len(), 1);
        assert_eq!(lookup.stats.duplicate_keys, 1);
        assert_eq!(lookup.get("east ham").map(|m| m.name.as_str()), Some("Second MP"));
        assert_eq!(sink.count(IssueKind::DuplicateCanonicalKey), 1);
        assert_eq!(sink.issues()[0].row, Some(2));
    }

    #[test]
    fn test_empty_keys_are_never_inserted_or_matched() {
        let sink = CollectingSink::new();
        let lookup = MpLookup::build(
            &[
                create_test_mp("&", "Nobody", "Labour"),
                create_test_mp("", "Vacant", "Labour"),
            ],
            &sink,
        );

        assert!(lookup.is_empty());
        assert_eq!(lookup.stats.empty_keys, 1);
        assert_eq!(lookup.stats.missing_constituency, 1);
        assert_eq!(lookup.get(""), None);
        assert_eq!(lookup.resolve_detailed("and", "Labour Party"), MatchOutcome::NoMatch);
    }

    #[test]
    fn test_enrich_table_overwrites_existing_columns() {
        let sink = CollectingSink::new();
        let lookup = MpLookup::build(&[create_test_mp("Leeds Central", "Alex Sobel", "Labour")], &sink);
        let mut table = Table::from_parts(
            strings(&["unit_name", "entity_name", "mp_name", "mp_email"]),
            vec![
                strings(&["Leeds Central", "Labour Party", "stale", "stale"]),
                strings(&["Leeds Central", "Green Party", "stale", "stale"]),
                strings(&["Nowhere", "Labour Party", "", ""]),
            ],
        );

        let report = enrich_table(&mut table, &lookup, &sink);

        assert_eq!(table.headers.len(), 4);
        assert_eq!(table.rows[0][2], "Alex Sobel");
        assert_eq!(table.rows[0][3], "alex.sobel@parliament.uk");
        assert_eq!(table.rows[1][2], "");
        assert_eq!(table.rows[2][3], "");
        assert_eq!(report.matched, 1);
        assert_eq!(report.party_mismatches, 1);
        assert_eq!(report.unmatched, 1);
    }

    #[test]
    fn test_match_mps_stage_writes_enriched_file() {
        let dir = TempDir::new().unwrap();
        let roster = dir.path().join("list_of_mps.csv");
        let analysis = dir.path().join("analysis.csv");
        let output = dir.path().join("analysis2.csv");
        fs::write(
            &roster,
            "\u{feff}Constituency,Name (Display as),Email,Party\nEast Ham,Stephen Timms,s.timms@example.org,Labour\n",
        )
        .unwrap();
        fs::write(
            &analysis,
            "unit_name,entity_name,rental_income,approx_tax_rate\nHam East,Labour Party,1000,0.2\n",
        )
        .unwrap();

        let sink = CollectingSink::new();
        let report = match_mps(&roster, &analysis, &output, &sink).unwrap();

        assert_eq!(report.matched, 1);
        let written = fs::read_to_string(&output).unwrap();
        assert_eq!(
            written,
            "unit_name,entity_name,rental_income,approx_tax_rate,mp_name,mp_email\n\
             Ham East,Labour Party,1000,0.2,Stephen Timms,s.timms@example.org\n"
        );
    }

    #[test]
    fn test_match_mps_missing_roster_column_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let roster = dir.path().join("list_of_mps.csv");
        let analysis = dir.path().join("analysis.csv");
        let output = dir.path().join("analysis2.csv");
        fs::write(&roster, "Constituency,Email\nEast Ham,x@example.org\n").unwrap();
        fs::write(&analysis, "unit_name,entity_name\nEast Ham,Labour Party\n").unwrap();

        let sink = CollectingSink::new();
        let err = match_mps(&roster, &analysis, &output, &sink).unwrap_err();

        assert!(matches!(err, crate::error::PipelineError::MissingColumns { .. }));
        assert!(!output.exists());
    }

    #[test]
    fn test_clear_mp_columns() {
        let mut table = Table::from_parts(
            strings(&["unit_name", "mp_name"]),
            vec![strings(&["Leeds Central", "Alex Sobel"])],
        );

        clear_mp_columns(&mut table);

        assert_eq!(table.headers, strings(&["unit_name", "mp_name", "mp_email"]));
        assert_eq!(table.rows[0], strings(&["Leeds Central", "", ""]));
    }
}
