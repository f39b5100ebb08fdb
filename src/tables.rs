// 📄 Tables - header-named CSV files on disk
//
// Every stage reads its inputs completely through Table::read (which checks
// required columns up front) and writes its output through write_atomic, so a
// failed stage never leaves a half-written file behind.

use crate::error::{PipelineError, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

const BOM: char = '\u{feff}';

// ============================================================================
// TABLE
// ============================================================================

#[derive(Debug, Clone)]
pub struct Table {
    pub path: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Read a whole CSV file, failing before anything else happens if the file
    /// or any of `required` columns is missing.
    pub fn read(path: &Path, required: &[&str]) -> Result<Table> {
        if !path.exists() {
            return Err(PipelineError::MissingInput { path: path.to_path_buf() });
        }

        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|e| PipelineError::csv(path, e))?;

        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| PipelineError::csv(path, e))?
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let h = if i == 0 { h.trim_start_matches(BOM) } else { h };
                h.trim().to_string()
            })
            .collect();

        let headers = if headers.len() == 1 && headers[0].is_empty() {
            Vec::new()
        } else {
            headers
        };

        let missing: Vec<String> = required
            .iter()
            .filter(|col| !headers.iter().any(|h| h == *col))
            .map(|col| col.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::MissingColumns {
                path: path.to_path_buf(),
                columns: missing,
            });
        }

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| PipelineError::csv(path, e))?;
            let mut row: Vec<String> = record.iter().map(|v| v.to_string()).collect();
            if row.len() < headers.len() {
                row.resize(headers.len(), String::new());
            }
            rows.push(row);
        }

        Ok(Table {
            path: path.to_path_buf(),
            headers,
            rows,
        })
    }

    pub fn from_parts(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Table {
            path: PathBuf::new(),
            headers,
            rows,
        }
    }

    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Row<'_> {
        Row { table: self, index }
    }

    pub fn iter(&self) -> impl Iterator<Item = Row<'_>> {
        (0..self.rows.len()).map(move |index| Row { table: self, index })
    }

    /// Index of `column`, appending it (blank in every row) if absent
    pub fn ensure_column(&mut self, column: &str) -> usize {
        if let Some(i) = self.index_of(column) {
            return i;
        }
        self.headers.push(column.to_string());
        for row in &mut self.rows {
            row.resize(self.headers.len(), String::new());
        }
        self.headers.len() - 1
    }

    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        write_atomic(path, |w| {
            w.write_record(&self.headers)?;
            for row in &self.rows {
                w.write_record(row)?;
            }
            Ok(())
        })
    }
}

/// Borrowed view of one data row
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    table: &'a Table,
    index: usize,
}

impl<'a> Row<'a> {
    /// Cell value, or "" if the column does not exist
    pub fn get(&self, column: &str) -> &'a str {
        self.table
            .index_of(column)
            .and_then(|i| self.table.rows[self.index].get(i))
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    /// 1-based data row number (header excluded)
    pub fn number(&self) -> usize {
        self.index + 1
    }

    pub fn values(&self) -> &'a [String] {
        &self.table.rows[self.index]
    }
}

// ============================================================================
// WRITING
// ============================================================================

/// Write `rows` with serde. The csv writer only emits the header alongside the
/// first row, so `headers` is written by hand when there are no rows.
pub fn write_records<T: Serialize>(path: &Path, headers: &[&str], rows: &[T]) -> Result<()> {
    write_atomic(path, |w| {
        if rows.is_empty() {
            return w.write_record(headers);
        }
        for row in rows {
            w.serialize(row)?;
        }
        Ok(())
    })
}

/// Write to a sibling temp file and rename it into place only on success.
pub fn write_atomic<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut csv::Writer<File>) -> csv::Result<()>,
{
    let tmp = temp_path(path);

    let outcome: Result<()> = (|| {
        let mut wtr = csv::Writer::from_path(&tmp).map_err(|e| PipelineError::csv(&tmp, e))?;
        fill(&mut wtr).map_err(|e| PipelineError::csv(path, e))?;
        wtr.flush().map_err(|e| PipelineError::io(&tmp, e))?;
        drop(wtr);
        fs::rename(&tmp, path).map_err(|e| PipelineError::io(path, e))
    })();

    if outcome.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    outcome
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

// ============================================================================
// CELL PARSING
// ============================================================================

/// "£12,345.60" → 12345.6; blank, junk, NaN and infinities are missing.
pub fn parse_amount(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| *c != '£' && *c != ',').collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Only a (case-insensitive) "true" counts.
pub fn parse_flag(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("true")
}

// ============================================================================
// TESTS
// ============================================================================
