//! Post-fetch summary of a persisted run-metadata artifact.
//!
//! The artifact is loaded back from disk, checked for the columns the report
//! needs, coerced into typed records and aggregated into organism, run and
//! read counts split by long-read vs short-read platform.

use std::collections::BTreeMap;
use std::fs;
use std::io::IsTerminal;
use std::path::Path;

use crossterm::style::Stylize;
use csv::ReaderBuilder;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::OutputFormat;
use crate::error::EnaError;

/// Instrument platforms producing long reads; every other platform is short-read.
pub const LONG_READ_PLATFORMS: [&str; 2] = ["OXFORD_NANOPORE", "PACBIO_SMRT"];

pub const REQUIRED_COLUMNS: [&str; 3] = ["tax_id", "instrument_platform", "read_count"];

const TITLE: &str = "EnaTrieve-TX Metadata Summary";

/// Row-oriented view of an artifact. Cells are kept as text; absent values are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl MetadataTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Value of `column` in `row`, or `None` when the column or the cell is absent.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows
            .get(row)
            .and_then(|cells| cells.get(index))
            .and_then(|cell| cell.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadClass {
    LongRead,
    ShortRead,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    pub tax_id: Option<String>,
    /// Upper-cased; empty when the artifact had no value.
    pub instrument_platform: String,
    pub read_count: u64,
}

impl MetadataRecord {
    pub fn read_class(&self) -> ReadClass {
        classify(&self.instrument_platform)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SummaryStats {
    pub unique_organisms: u64,
    pub organisms_long: u64,
    pub organisms_short: u64,
    pub runs_total: u64,
    pub runs_long: u64,
    pub runs_short: u64,
    pub reads_total: u64,
    pub reads_long: u64,
    pub reads_short: u64,
}

#[derive(Debug)]
pub enum SummaryOutcome {
    Rendered(SummaryStats),
    /// The artifact was missing, unreadable, or lacked required columns.
    Skipped(EnaError),
    Empty,
}

pub fn load(path: &Path, format: OutputFormat) -> Result<MetadataTable, EnaError> {
    if !path.exists() {
        return Err(EnaError::SummaryMissingFile(path.to_path_buf()));
    }
    match format {
        OutputFormat::Tsv => load_tsv(path),
        OutputFormat::Json => load_json(path),
    }
}

fn load_tsv(path: &Path) -> Result<MetadataTable, EnaError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|err| EnaError::SummaryParse(err.to_string()))?;

    let headers = reader
        .headers()
        .map_err(|err| EnaError::SummaryParse(err.to_string()))?
        .clone();
    if headers.is_empty() {
        return Err(EnaError::SummaryParse(
            "no columns to parse from file".to_string(),
        ));
    }
    let columns: Vec<String> = headers.iter().map(|name| name.to_string()).collect();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|err| EnaError::SummaryParse(err.to_string()))?;
        if record.len() > columns.len() {
            return Err(EnaError::SummaryParse(format!(
                "expected {} fields in line {}, saw {}",
                columns.len(),
                index + 2,
                record.len()
            )));
        }
        let mut row: Vec<Option<String>> = record
            .iter()
            .map(|value| (!value.is_empty()).then(|| value.to_string()))
            .collect();
        row.resize(columns.len(), None);
        rows.push(row);
    }

    Ok(MetadataTable::new(columns, rows))
}

fn load_json(path: &Path) -> Result<MetadataTable, EnaError> {
    let content =
        fs::read_to_string(path).map_err(|err| EnaError::SummaryParse(err.to_string()))?;
    let objects: Vec<Map<String, Value>> =
        serde_json::from_str(&content).map_err(|err| EnaError::SummaryParse(err.to_string()))?;

    let mut columns: Vec<String> = Vec::new();
    for object in &objects {
        for key in object.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let rows = objects
        .iter()
        .map(|object| {
            columns
                .iter()
                .map(|column| object.get(column).and_then(json_cell))
                .collect()
        })
        .collect();

    Ok(MetadataTable::new(columns, rows))
}

// Identifiers stay textual so large or zero-padded tax ids survive untouched.
fn json_cell(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Returns the sorted names of any required columns the table lacks.
pub fn validate(table: &MetadataTable) -> Result<(), EnaError> {
    let mut missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|column| table.column_index(column).is_none())
        .map(|column| column.to_string())
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    missing.sort();
    Err(EnaError::MissingColumns(missing))
}

/// Non-numeric, negative and missing counts become 0; fractional counts are truncated.
pub fn parse_read_count(value: Option<&str>) -> u64 {
    let Some(text) = value.map(str::trim).filter(|text| !text.is_empty()) else {
        return 0;
    };
    if let Ok(count) = text.parse::<u64>() {
        return count;
    }
    match text.parse::<f64>() {
        Ok(count) if count.is_finite() && count > 0.0 => count as u64,
        _ => 0,
    }
}

pub fn normalize_platform(value: Option<&str>) -> String {
    value.unwrap_or_default().to_uppercase()
}

pub fn classify(normalized_platform: &str) -> ReadClass {
    if LONG_READ_PLATFORMS
        .iter()
        .any(|platform| *platform == normalized_platform)
    {
        ReadClass::LongRead
    } else {
        ReadClass::ShortRead
    }
}

/// Classification of a raw, not yet normalized platform value.
pub fn is_long_read(platform: Option<&str>) -> bool {
    classify(&normalize_platform(platform)) == ReadClass::LongRead
}

pub fn is_short_read(platform: Option<&str>) -> bool {
    classify(&normalize_platform(platform)) == ReadClass::ShortRead
}

pub fn clean(table: &MetadataTable) -> Vec<MetadataRecord> {
    (0..table.len())
        .map(|row| MetadataRecord {
            tax_id: table.cell(row, "tax_id").map(str::to_string),
            instrument_platform: normalize_platform(table.cell(row, "instrument_platform")),
            read_count: parse_read_count(table.cell(row, "read_count")),
        })
        .collect()
}

/// Organism buckets are "has at least one run of this class", so an organism
/// with mixed platforms counts in both. Run and read buckets are exclusive.
pub fn aggregate(records: &[MetadataRecord]) -> SummaryStats {
    let mut stats = SummaryStats::default();
    let mut organisms: BTreeMap<&str, (bool, bool)> = BTreeMap::new();

    for record in records {
        let class = record.read_class();
        stats.runs_total += 1;
        stats.reads_total = stats.reads_total.saturating_add(record.read_count);
        match class {
            ReadClass::LongRead => {
                stats.runs_long += 1;
                stats.reads_long = stats.reads_long.saturating_add(record.read_count);
            }
            ReadClass::ShortRead => {
                stats.runs_short += 1;
                stats.reads_short = stats.reads_short.saturating_add(record.read_count);
            }
        }

        // Rows without a tax id still count as runs but not as organisms.
        if let Some(tax_id) = record.tax_id.as_deref() {
            let flags = organisms.entry(tax_id).or_default();
            match class {
                ReadClass::LongRead => flags.0 = true,
                ReadClass::ShortRead => flags.1 = true,
            }
        }
    }

    stats.unique_organisms = organisms.len() as u64;
    stats.organisms_long = organisms.values().filter(|flags| flags.0).count() as u64;
    stats.organisms_short = organisms.values().filter(|flags| flags.1).count() as u64;
    stats
}

/// Loads, validates, cleans and aggregates an artifact. `Ok(None)` means it had no rows.
pub fn summarize(path: &Path, format: OutputFormat) -> Result<Option<SummaryStats>, EnaError> {
    let table = load(path, format)?;
    if table.is_empty() {
        return Ok(None);
    }
    validate(&table)?;
    let records = clean(&table);
    Ok(Some(aggregate(&records)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Title,
    Rule,
    Section,
    Total,
    ShortRead,
    LongRead,
}

pub trait Renderer {
    fn paint(&self, text: &str, style: Style) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlainRenderer;

impl Renderer for PlainRenderer {
    fn paint(&self, text: &str, _style: Style) -> String {
        text.to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ColorRenderer;

impl Renderer for ColorRenderer {
    fn paint(&self, text: &str, style: Style) -> String {
        let text = text.to_string();
        match style {
            Style::Title => text.bold().cyan().to_string(),
            Style::Rule => text.dark_grey().to_string(),
            Style::Section => text.bold().to_string(),
            Style::Total => text.bold().white().to_string(),
            Style::ShortRead => text.green().to_string(),
            Style::LongRead => text.magenta().to_string(),
        }
    }
}

/// Decides whether ANSI styling is safe for a diagnostic stream.
///
/// `env` looks up environment variables so the probe stays testable.
pub fn supports_color<F>(is_terminal: bool, windows: bool, env: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    if !is_terminal {
        return false;
    }
    if env("NO_COLOR").is_some_and(|value| !value.is_empty()) {
        return false;
    }
    let term = env("TERM");
    if term.as_deref() == Some("dumb") {
        return false;
    }
    if windows {
        return env("WT_SESSION").is_some()
            || env("ANSICON").is_some()
            || env("ConEmuANSI").as_deref() == Some("ON")
            || term.is_some();
    }
    true
}

/// Picks the renderer for stderr once, at startup.
pub fn select_renderer() -> Box<dyn Renderer> {
    let color = supports_color(std::io::stderr().is_terminal(), cfg!(windows), |key| {
        std::env::var(key).ok()
    });
    if color {
        Box::new(ColorRenderer)
    } else {
        Box::new(PlainRenderer)
    }
}

pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// `part / total` as a percentage: whole numbers without decimals, otherwise one decimal digit.
///
/// A partial share never rounds to `100.0%` and a non-zero share never rounds to `0.0%`.
pub fn format_percentage(part: u64, total: u64) -> String {
    if total == 0 {
        return "0%".to_string();
    }
    let percent = part as f64 * 100.0 / total as f64;
    if percent.fract() == 0.0 {
        return format!("{percent:.0}%");
    }
    let percent = if part < total {
        percent.clamp(0.1, 99.9)
    } else {
        percent
    };
    format!("{percent:.1}%")
}

pub fn render(stats: &SummaryStats, renderer: &dyn Renderer) -> String {
    let rule = renderer.paint(&"-".repeat(TITLE.len()), Style::Rule);
    let mut lines = vec![
        String::new(),
        rule.clone(),
        renderer.paint(TITLE, Style::Title),
        rule.clone(),
    ];

    let sections = [
        (
            "ORGANISMS",
            stats.unique_organisms,
            stats.organisms_short,
            stats.organisms_long,
        ),
        (
            "SEQUENCING RUNS",
            stats.runs_total,
            stats.runs_short,
            stats.runs_long,
        ),
        (
            "TOTAL READS",
            stats.reads_total,
            stats.reads_short,
            stats.reads_long,
        ),
    ];

    for (index, (heading, total, short, long)) in sections.into_iter().enumerate() {
        if index > 0 {
            lines.push(String::new());
        }
        lines.push(renderer.paint(heading, Style::Section));
        lines.push(format!(
            "  Total:      {}",
            renderer.paint(&format_count(total), Style::Total)
        ));
        lines.push(format!(
            "  Short-read: {} ({})",
            renderer.paint(&format_count(short), Style::ShortRead),
            format_percentage(short, total)
        ));
        lines.push(format!(
            "  Long-read:  {} ({})",
            renderer.paint(&format_count(long), Style::LongRead),
            format_percentage(long, total)
        ));
    }

    lines.push(rule);
    lines.push(String::new());
    lines.join("\n")
}

/// Best-effort report: problems are logged and returned as an outcome, never raised.
pub fn generate_summary(
    path: &Path,
    format: OutputFormat,
    renderer: &dyn Renderer,
    sink: &dyn ProgressSink,
) -> SummaryOutcome {
    match summarize(path, format) {
        Ok(Some(stats)) => {
            eprintln!("{}", render(&stats, renderer));
            SummaryOutcome::Rendered(stats)
        }
        Ok(None) => {
            sink.event(ProgressEvent::warn(
                "no data retrieved; summary is empty".to_string(),
            ));
            SummaryOutcome::Empty
        }
        Err(err @ EnaError::MissingColumns(_)) => {
            sink.event(ProgressEvent::warn(format!("{err}; skipping summary")));
            SummaryOutcome::Skipped(err)
        }
        Err(err) => {
            sink.event(ProgressEvent::error(err.to_string()));
            SummaryOutcome::Skipped(err)
        }
    }
}
