//! Tabular sources: the row/column contract the engines read from, and a
//! CSV-backed sheet implementing it.

use crate::error::{Result, SyncError};
use crate::model::{CellValue, RowUpdate, SourceRow};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

/// A header row followed by data rows.
pub trait TabularSource {
    /// Name used for routing and log lines (the spreadsheet/file name).
    fn name(&self) -> &str;

    fn headers(&self) -> &[String];

    /// Number of data rows (the header is not counted).
    fn row_count(&self) -> usize;

    fn column_count(&self) -> usize {
        self.headers().len()
    }

    /// All data rows in source order.
    fn rows(&self) -> Vec<SourceRow>;

    fn read_cell(&self, row: usize, column: &str) -> CellValue<'_>;

    fn write_cell(&mut self, row: usize, column: &str, value: &str) -> Result<()>;

    /// Column headers from `required` that this source lacks.
    fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|column| !self.headers().iter().any(|h| h.as_str() == **column))
            .map(|column| column.to_string())
            .collect()
    }

    /// Fail with [`SyncError::Schema`] unless every column in `required` exists.
    fn require_columns(&self, required: &[&str]) -> Result<()> {
        let missing = self.missing_columns(required);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SyncError::schema(self.name(), missing))
        }
    }

    /// Persist assigned remote ids into `column`.
    fn apply_row_updates(&mut self, column: &str, updates: &[RowUpdate]) -> Result<()> {
        for update in updates {
            self.write_cell(update.position, column, update.remote_id.as_str())?;
        }
        Ok(())
    }
}

/// In-memory sheet of text cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    name: String,
    headers: Arc<[String]>,
    rows: Vec<Vec<String>>,
}

impl Sheet {
    /// Build a sheet; short rows are padded with empty cells.
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                if row.len() < width {
                    row.resize(width, String::new());
                }
                row
            })
            .collect();
        Self {
            name: name.into(),
            headers: headers.into(),
            rows,
        }
    }

    /// Parse CSV with a header row.
    pub fn from_csv_reader<R: Read>(name: impl Into<String>, reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let headers: Vec<String> = csv
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let mut rows = Vec::new();
        for record in csv.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self::new(name, headers, rows))
    }

    /// Load a CSV file; the sheet is named after the file stem.
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(name, file)
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::WriterBuilder::new().flexible(true).from_writer(writer);
        csv.write_record(self.headers.iter())?;
        for row in &self.rows {
            csv.write_record(row)?;
        }
        csv.flush()?;
        Ok(())
    }

    pub fn save_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_csv(file)
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }
}

impl TabularSource for Sheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn headers(&self) -> &[String] {
        &self.headers
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn rows(&self) -> Vec<SourceRow> {
        self.rows
            .iter()
            .enumerate()
            .map(|(position, values)| SourceRow::new(position, self.headers.clone(), values.clone()))
            .collect()
    }

    fn read_cell(&self, row: usize, column: &str) -> CellValue<'_> {
        let Some(idx) = self.column_index(column) else {
            return CellValue::Missing;
        };
        match self.rows.get(row).and_then(|values| values.get(idx)) {
            Some(value) if !value.is_empty() => CellValue::Text(value.as_str()),
            _ => CellValue::Empty,
        }
    }

    fn write_cell(&mut self, row: usize, column: &str, value: &str) -> Result<()> {
        let idx = self
            .column_index(column)
            .ok_or_else(|| SyncError::schema(&self.name, vec![column.to_string()]))?;
        let width = self.headers.len();
        let name = self.name.clone();
        let cells = self.rows.get_mut(row).ok_or_else(|| {
            SyncError::schema(&name, vec![format!("row {} out of range", row + 2)])
        })?;
        if cells.len() < width {
            cells.resize(width, String::new());
        }
        cells[idx] = value.to_string();
        Ok(())
    }
}
