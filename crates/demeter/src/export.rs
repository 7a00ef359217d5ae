// ABOUTME: Renders accumulated records into CSV, TSV, or key-value text.
// ABOUTME: Also stamps export filenames and groups records into partitions.

//! Export formatting.
//!
//! Key behaviors:
//! - rows are rendered in accumulation order and never re-sorted
//! - `Unavailable` cells render as the empty string
//! - CSV/TSV quoting is delegated to the `csv` crate (quotes only when needed)
//! - the key-value format has a fixed line shape and ignores column selection

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::SweepError;
use crate::normalize::render_value;
use crate::record::Record;

/// One column of the tabular export. `Date` repeats the run's date stamp on
/// every row; the rest come from the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Date,
    Symbol,
    Name,
    Price,
    Category,
    Volume,
    MarketCap,
}

impl Column {
    pub const ALL: [Column; 7] = [
        Column::Date,
        Column::Symbol,
        Column::Name,
        Column::Price,
        Column::Category,
        Column::Volume,
        Column::MarketCap,
    ];

    pub fn header(&self) -> &'static str {
        match self {
            Column::Date => "date",
            Column::Symbol => "symbol",
            Column::Name => "name",
            Column::Price => "price",
            Column::Category => "category",
            Column::Volume => "volume",
            Column::MarketCap => "market_cap",
        }
    }

    /// Looks a column up by its header name. Used by the CLI column list.
    pub fn from_name(name: &str) -> Option<Column> {
        let name = name.trim().to_ascii_lowercase();
        Column::ALL.into_iter().find(|c| c.header() == name)
    }

    fn render(&self, record: &Record, date: NaiveDate) -> String {
        match self {
            Column::Date => date.format("%Y-%m-%d").to_string(),
            Column::Symbol => record.symbol.clone(),
            Column::Name => record.name.clone().unwrap_or_default(),
            Column::Price => render_value(&record.price),
            Column::Category => record.category.clone(),
            Column::Volume => render_value(&record.volume),
            Column::MarketCap => render_value(&record.market_cap),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Csv,
    Tsv,
    KeyValue,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Tsv => "tsv",
            ExportFormat::KeyValue => "txt",
        }
    }

    pub fn from_name(name: &str) -> Option<ExportFormat> {
        match name.trim().to_ascii_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "tsv" => Some(ExportFormat::Tsv),
            "kv" | "key_value" => Some(ExportFormat::KeyValue),
            _ => None,
        }
    }
}

/// Which date the `Date` column carries. After-close data is conventionally
/// stamped with the previous day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateStamp {
    Today,
    Yesterday,
}

impl DateStamp {
    pub fn resolve(&self, today: NaiveDate) -> NaiveDate {
        match self {
            DateStamp::Today => today,
            DateStamp::Yesterday => today.pred_opt().unwrap_or(today),
        }
    }
}

/// Timestamp style embedded in export filenames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilenameStamp {
    /// `20260825T143000`
    Timestamp,
    /// `260825`
    ShortDate,
}

impl FilenameStamp {
    fn format(&self, now: &DateTime<Local>) -> String {
        match self {
            FilenameStamp::Timestamp => now.format("%Y%m%dT%H%M%S").to_string(),
            FilenameStamp::ShortDate => now.format("%y%m%d").to_string(),
        }
    }
}

/// A named subset of the final records, exported as its own file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partition {
    pub name: String,
    #[serde(flatten)]
    pub rule: PartitionRule,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PartitionRule {
    All,
    Category { equals: String },
    MinMarketCap { floor: f64 },
}

impl PartitionRule {
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            PartitionRule::All => true,
            PartitionRule::Category { equals } => record.category == *equals,
            // Unavailable market caps never clear the floor.
            PartitionRule::MinMarketCap { floor } => record.market_cap.at_least(*floor),
        }
    }
}

/// Everything the orchestrator needs to turn records into named export files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportPlan {
    pub columns: Vec<Column>,
    pub format: ExportFormat,
    pub stamp: DateStamp,
    pub filename_stamp: FilenameStamp,
    pub prefix: String,
    /// Empty means a single unnamed bucket holding every record.
    pub partitions: Vec<Partition>,
}

impl Default for ExportPlan {
    fn default() -> Self {
        Self {
            columns: vec![Column::Date, Column::Symbol, Column::Price, Column::Category],
            format: ExportFormat::Csv,
            stamp: DateStamp::Today,
            filename_stamp: FilenameStamp::Timestamp,
            prefix: "sweep".to_string(),
            partitions: Vec::new(),
        }
    }
}

impl ExportPlan {
    /// Filename for one bucket, e.g. `topetf_20260825T143000.csv` or
    /// `screener_260825.txt`. The bucket name, when present, sits between the
    /// prefix and the stamp.
    pub fn filename_for(&self, bucket: Option<&str>, now: DateTime<Local>) -> String {
        let stamp = self.filename_stamp.format(&now);
        let ext = self.format.extension();
        match bucket {
            Some(name) => format!("{}_{}_{}.{}", self.prefix, name, stamp, ext),
            None => format!("{}_{}.{}", self.prefix, stamp, ext),
        }
    }
}

/// Renders records as one export blob. The header row is always emitted for
/// CSV/TSV, even with zero records; key-value output has no header.
pub fn render_table(
    records: &[Record],
    columns: &[Column],
    format: ExportFormat,
    date: NaiveDate,
) -> Result<String, SweepError> {
    match format {
        ExportFormat::Csv => render_delimited(records, columns, b',', date),
        ExportFormat::Tsv => render_delimited(records, columns, b'\t', date),
        ExportFormat::KeyValue => Ok(render_key_value(records)),
    }
}

fn render_delimited(
    records: &[Record],
    columns: &[Column],
    delimiter: u8,
    date: NaiveDate,
) -> Result<String, SweepError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    writer
        .write_record(columns.iter().map(|c| c.header()))
        .map_err(render_err)?;
    for record in records {
        writer
            .write_record(columns.iter().map(|c| c.render(record, date)))
            .map_err(render_err)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| SweepError::sink("export", "Render", Some(anyhow::anyhow!("{e}"))))?;
    String::from_utf8(bytes).map_err(|e| SweepError::sink("export", "Render", Some(e.into())))
}

fn render_err(err: csv::Error) -> SweepError {
    SweepError::sink("export", "Render", Some(err.into()))
}

// Screener-style lines: `SYMBOL: market_cap, category, price, volume`.
fn render_key_value(records: &[Record]) -> String {
    let mut out = String::new();
    for record in records {
        out.push_str(&format!(
            "{}: {}, {}, {}, {}\n",
            record.symbol,
            render_value(&record.market_cap),
            record.category,
            render_value(&record.price),
            render_value(&record.volume),
        ));
    }
    out
}
