//! Batch output: per-file outcomes, the aggregated table and run statistics.
//!
//! [`aggregate`] is the only place where failures turn into rows. Successes
//! keep their record; failures become all-[`crate::record::NO_DATA`] rows with the file name
//! intact and the failure attached, so consumers never special-case them.

use crate::error::{ExtractError, FileError};
use crate::record::{Field, FieldRecord, FILE_NAME_COLUMN};
use serde::{Deserialize, Serialize};
use std::io;

/// Column headers in output order.
pub const COLUMNS: [&str; 5] = ["名前", "住所", "電話番号", "免許証番号", FILE_NAME_COLUMN];

/// Result of driving one file through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileOutcome {
    /// 0-based position in the directory enumeration.
    pub index: usize,
    pub file_name: String,
    pub result: Result<FieldRecord, FileError>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
    pub retries: u32,
}

impl FileOutcome {
    pub fn failed(index: usize, file_name: impl Into<String>, error: FileError) -> Self {
        Self {
            index,
            file_name: file_name.into(),
            result: Err(error),
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
            retries: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// One table row: a record plus the failure that emptied it, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub record: FieldRecord,
    pub error: Option<FileError>,
}

impl TableRow {
    pub fn file_name(&self) -> &str {
        &self.record.file_name
    }

    pub fn value(&self, field: Field) -> &str {
        self.record.value(field)
    }

    /// Cells in [`COLUMNS`] order.
    pub fn cells(&self) -> [&str; 5] {
        [
            self.record.value(Field::Name),
            self.record.value(Field::Address),
            self.record.value(Field::Phone),
            self.record.value(Field::LicenseNumber),
            &self.record.file_name,
        ]
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Ordered rows, one per processed file, in enumeration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    rows: Vec<TableRow>,
}

impl ResultTable {
    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TableRow> {
        self.rows.iter()
    }

    /// Rows whose file failed, for manual review.
    pub fn failed_rows(&self) -> impl Iterator<Item = &TableRow> {
        self.rows.iter().filter(|r| r.is_failed())
    }

    /// Write the table as CSV with a header row.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(COLUMNS)?;
        for row in &self.rows {
            out.write_record(row.cells())?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String, ExtractError> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)
            .map_err(|e| ExtractError::Internal(format!("CSV encoding: {e}")))?;
        String::from_utf8(buf).map_err(|e| ExtractError::Internal(format!("CSV encoding: {e}")))
    }

    /// Rows as JSON objects keyed by column header, plus an error column
    /// for failed rows.
    pub fn to_json_string(&self) -> Result<String, ExtractError> {
        let rows: Vec<JsonRow<'_>> = self.rows.iter().map(JsonRow::from).collect();
        serde_json::to_string_pretty(&rows)
            .map_err(|e| ExtractError::Internal(format!("JSON encoding: {e}")))
    }

    /// Render in the requested format.
    pub fn render(&self, format: OutputFormat) -> Result<String, ExtractError> {
        match format {
            OutputFormat::Csv => self.to_csv_string(),
            OutputFormat::Json => self.to_json_string(),
        }
    }
}

impl<'a> IntoIterator for &'a ResultTable {
    type Item = &'a TableRow;
    type IntoIter = std::slice::Iter<'a, TableRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[derive(Serialize)]
struct JsonRow<'a> {
    #[serde(rename = "名前")]
    name: &'a str,
    #[serde(rename = "住所")]
    address: &'a str,
    #[serde(rename = "電話番号")]
    phone: &'a str,
    #[serde(rename = "免許証番号")]
    license_number: &'a str,
    #[serde(rename = "ファイル名")]
    file_name: &'a str,
    #[serde(rename = "エラー", skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<'a> From<&'a TableRow> for JsonRow<'a> {
    fn from(row: &'a TableRow) -> Self {
        let [name, address, phone, license_number, file_name] = row.cells();
        Self {
            name,
            address,
            phone,
            license_number,
            file_name,
            error: row.error.as_ref().map(|e| e.to_string()),
        }
    }
}

/// Serialisation format for a [`ResultTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

/// Collect outcomes into a table, preserving their order.
pub fn aggregate(outcomes: Vec<FileOutcome>) -> ResultTable {
    let rows = outcomes
        .into_iter()
        .map(|outcome| match outcome.result {
            Ok(record) => TableRow {
                record: record.with_file_name(outcome.file_name),
                error: None,
            },
            Err(error) => TableRow {
                record: FieldRecord::empty(outcome.file_name),
                error: Some(error),
            },
        })
        .collect();
    ResultTable { rows }
}

/// Aggregate statistics for one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub total_files: usize,
    pub succeeded_files: usize,
    pub failed_files: usize,
    /// Subset of `failed_files` cut off by the batch deadline.
    pub timed_out_files: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
}

impl ExtractionStats {
    pub fn from_outcomes(outcomes: &[FileOutcome], total_duration_ms: u64) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        let timed_out = outcomes
            .iter()
            .filter(|o| matches!(o.result, Err(FileError::Timeout { .. })))
            .count();
        Self {
            total_files: outcomes.len(),
            succeeded_files: succeeded,
            failed_files: outcomes.len() - succeeded,
            timed_out_files: timed_out,
            total_input_tokens: outcomes.iter().map(|o| o.input_tokens).sum(),
            total_output_tokens: outcomes.iter().map(|o| o.output_tokens).sum(),
            total_duration_ms,
        }
    }
}

/// Everything a batch run produces.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub table: ResultTable,
    pub stats: ExtractionStats,
}

impl ExtractionOutput {
    /// Treat any failed file as an error.
    pub fn into_result(self) -> Result<Self, ExtractError> {
        if self.stats.failed_files > 0 {
            return Err(ExtractError::PartialFailure {
                failed: self.stats.failed_files,
                total: self.stats.total_files,
            });
        }
        Ok(self)
    }
}
