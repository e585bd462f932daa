use std::fs;
use std::io::Write;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::domain::{OutputFormat, OutputTarget, TaxOperator};
use crate::error::EnaError;
use crate::fetch::SearchClient;
use crate::output::write_to_target;
use crate::query::{QueryRequest, RUN_FIELDS, build_query, build_request};
use crate::summary::{Renderer, SummaryOutcome, generate_summary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub level: EventLevel,
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    pub fn info(message: String) -> Self {
        Self {
            level: EventLevel::Info,
            message,
            elapsed: None,
        }
    }

    pub fn warn(message: String) -> Self {
        Self {
            level: EventLevel::Warn,
            message,
            elapsed: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            level: EventLevel::Error,
            message,
            elapsed: None,
        }
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }
}

/// Observer every component reports progress through.
pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Forwards progress to the installed `tracing` subscriber.
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn event(&self, event: ProgressEvent) {
        let message = match event.elapsed {
            Some(elapsed) => format!("{} ({elapsed:.2?})", event.message),
            None => event.message,
        };
        match event.level {
            EventLevel::Info => tracing::info!("{message}"),
            EventLevel::Warn => tracing::warn!("{message}"),
            EventLevel::Error => tracing::error!("{message}"),
        }
    }
}

pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub tax_id: String,
    pub strategy: String,
    pub operator: TaxOperator,
    pub limit: u64,
    pub format: OutputFormat,
    pub target: OutputTarget,
    pub summary: bool,
}

#[derive(Debug)]
pub struct FetchReport {
    pub query: String,
    pub lines: usize,
    pub target: OutputTarget,
    /// `None` when the summary was disabled or the output went to stdout.
    pub summary: Option<SummaryOutcome>,
}

#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub tax_id: String,
    pub limit: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub tax_id: String,
    pub tsv_lines: usize,
    pub json_records: usize,
}

pub struct App<C: SearchClient> {
    client: C,
    renderer: Box<dyn Renderer>,
}

impl<C: SearchClient> App<C> {
    pub fn new(client: C, renderer: Box<dyn Renderer>) -> Self {
        Self { client, renderer }
    }

    /// Runs one query, persists the raw response and, for file targets, prints the summary.
    pub fn fetch(
        &self,
        options: FetchOptions,
        sink: &dyn ProgressSink,
    ) -> Result<FetchReport, EnaError> {
        sink.event(ProgressEvent::info(format!(
            "tax_id={} strategy={} limit={} output={}",
            options.tax_id, options.strategy, options.limit, options.target
        )));

        let request = build_request(
            &options.tax_id,
            options.limit,
            &options.strategy,
            options.operator,
            options.format,
        );
        let lines = self.fetch_into(&request, &options.target, sink)?;

        let summary = match options.target.path() {
            Some(path) if options.summary => Some(generate_summary(
                path.as_std_path(),
                options.format,
                self.renderer.as_ref(),
                sink,
            )),
            None if options.summary => {
                sink.event(ProgressEvent::info(
                    "output written to stdout; summary skipped".to_string(),
                ));
                None
            }
            _ => None,
        };

        Ok(FetchReport {
            query: request.query(),
            lines,
            target: options.target,
            summary,
        })
    }

    /// Summarizes an artifact that is already on disk.
    pub fn summarize(
        &self,
        path: &Utf8Path,
        format: OutputFormat,
        sink: &dyn ProgressSink,
    ) -> SummaryOutcome {
        generate_summary(path.as_std_path(), format, self.renderer.as_ref(), sink)
    }

    /// Live smoke check: query building, a TSV fetch with summary, then a small JSON fetch.
    pub fn check(
        &self,
        options: CheckOptions,
        out: &mut dyn Write,
        sink: &dyn ProgressSink,
    ) -> Result<CheckReport, EnaError> {
        let tax_id = options.tax_id.as_str();

        section(out, "Query building")?;
        let subtree = build_query(tax_id, "RNA-Seq", TaxOperator::Subtree);
        let exact = build_query(tax_id, "RNA-Seq", TaxOperator::Exact);
        if !subtree.contains(&format!("tax_tree({tax_id})")) {
            return Err(EnaError::CheckFailed(format!(
                "unexpected tax_tree query: {subtree}"
            )));
        }
        if !exact.contains(&format!("tax_eq({tax_id})")) {
            return Err(EnaError::CheckFailed(format!(
                "unexpected tax_eq query: {exact}"
            )));
        }
        let probe = build_request(tax_id, 1, "RNA-Seq", TaxOperator::Subtree, OutputFormat::Tsv);
        let keys: Vec<&str> = probe.form_pairs().iter().map(|(key, _)| *key).collect();
        for key in ["result", "query", "fields", "format", "limit"] {
            if !keys.contains(&key) {
                return Err(EnaError::CheckFailed(format!(
                    "POST payload missing key: {key}"
                )));
            }
        }
        ok(out, "build_query/build_request")?;

        section(out, "Live ENA fetch")?;
        let workdir =
            tempfile::tempdir().map_err(|err| EnaError::Filesystem(err.to_string()))?;
        let workdir_path = Utf8PathBuf::from_path_buf(workdir.path().to_path_buf())
            .map_err(|_| EnaError::Filesystem("invalid temporary path".to_string()))?;

        let tsv_target = OutputTarget::File(workdir_path.join("ena_smoke.tsv"));
        let tsv_request = build_request(
            tax_id,
            options.limit,
            "RNA-Seq",
            TaxOperator::Subtree,
            OutputFormat::Tsv,
        );
        let tsv_lines = self.fetch_into(&tsv_request, &tsv_target, sink)?;
        if tsv_lines < 1 {
            return Err(EnaError::CheckFailed(
                "ENA returned no lines".to_string(),
            ));
        }
        let tsv_path = workdir_path.join("ena_smoke.tsv");
        let content = fs::read_to_string(&tsv_path)
            .map_err(|err| EnaError::Filesystem(err.to_string()))?;
        let header: Vec<&str> = content
            .lines()
            .next()
            .unwrap_or_default()
            .split('\t')
            .collect();
        let mut missing: Vec<&str> = RUN_FIELDS
            .iter()
            .copied()
            .filter(|field| !header.contains(field))
            .collect();
        if !missing.is_empty() {
            missing.sort();
            return Err(EnaError::CheckFailed(format!(
                "TSV header missing expected columns: {}",
                missing.join(", ")
            )));
        }
        generate_summary(
            tsv_path.as_std_path(),
            OutputFormat::Tsv,
            self.renderer.as_ref(),
            sink,
        );

        let json_target = OutputTarget::File(workdir_path.join("ena_smoke.json"));
        let json_request = build_request(
            tax_id,
            options.limit.min(5),
            "RNA-Seq",
            TaxOperator::Subtree,
            OutputFormat::Json,
        );
        self.fetch_into(&json_request, &json_target, sink)?;
        let raw = fs::read_to_string(workdir_path.join("ena_smoke.json"))
            .map_err(|err| EnaError::Filesystem(err.to_string()))?;
        let parsed: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|err| EnaError::CheckFailed(format!("JSON response did not parse: {err}")))?;
        let Some(records) = parsed.as_array() else {
            return Err(EnaError::CheckFailed(
                "JSON response was not a list".to_string(),
            ));
        };
        ok(
            out,
            &format!("Live ENA fetch OK (tax_id={tax_id}, limit={})", options.limit),
        )?;

        section(out, "Result")?;
        writeln!(out, "All smoke checks passed.")
            .map_err(|err| EnaError::Filesystem(err.to_string()))?;

        Ok(CheckReport {
            tax_id: options.tax_id,
            tsv_lines,
            json_records: records.len(),
        })
    }

    fn fetch_into(
        &self,
        request: &QueryRequest,
        target: &OutputTarget,
        sink: &dyn ProgressSink,
    ) -> Result<usize, EnaError> {
        let started = Instant::now();
        let result = self.client.fetch(request, sink)?;
        let lines = write_to_target(result.lines(), target)?;
        sink.event(
            ProgressEvent::info(format!("wrote {lines} lines")).with_elapsed(started.elapsed()),
        );
        if let Some(path) = target.path() {
            sink.event(ProgressEvent::info(format!("output saved to {path}")));
        }
        Ok(lines)
    }
}

fn section(out: &mut dyn Write, title: &str) -> Result<(), EnaError> {
    writeln!(out, "\n== {title} ==").map_err(|err| EnaError::Filesystem(err.to_string()))
}

fn ok(out: &mut dyn Write, message: &str) -> Result<(), EnaError> {
    writeln!(out, "OK: {message}").map_err(|err| EnaError::Filesystem(err.to_string()))
}
