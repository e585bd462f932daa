use std::io::{BufRead, BufReader, Read};

use crate::app::{ProgressEvent, ProgressSink};
use crate::client::EnaHttpClient;
use crate::error::EnaError;
use crate::query::QueryRequest;

/// A successful, not yet consumed search response.
pub struct FetchResult {
    status: u16,
    reader: BufReader<Box<dyn Read + Send>>,
}

impl FetchResult {
    pub fn new(status: u16, body: impl Read + Send + 'static) -> Self {
        let body: Box<dyn Read + Send> = Box::new(body);
        Self {
            status,
            reader: BufReader::new(body),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Single-pass line iterator over the raw body bytes; `\n` and `\r\n` terminators are stripped.
    pub fn lines(self) -> ResponseLines {
        ResponseLines {
            reader: self.reader,
        }
    }
}

/// Lines are passed through as bytes, so non-UTF-8 content is never rejected or rewritten.
pub struct ResponseLines {
    reader: BufReader<Box<dyn Read + Send>>,
}

impl Iterator for ResponseLines {
    type Item = Result<Vec<u8>, EnaError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = Vec::new();
        match self.reader.read_until(b'\n', &mut line) {
            Ok(0) => None,
            Ok(_) => {
                if line.ends_with(b"\n") {
                    line.pop();
                    if line.ends_with(b"\r") {
                        line.pop();
                    }
                }
                Some(Ok(line))
            }
            Err(err) => Some(Err(EnaError::Stream(err.to_string()))),
        }
    }
}

pub trait SearchClient {
    fn fetch(
        &self,
        request: &QueryRequest,
        sink: &dyn ProgressSink,
    ) -> Result<FetchResult, EnaError>;
}

impl SearchClient for EnaHttpClient {
    fn fetch(
        &self,
        request: &QueryRequest,
        sink: &dyn ProgressSink,
    ) -> Result<FetchResult, EnaError> {
        fetch(self, request, sink)
    }
}

/// Sends the search request and hands back the streaming body.
///
/// Transient statuses are retried by the client; whatever non-success status
/// remains afterwards is fatal and carries the response text.
pub fn fetch(
    client: &EnaHttpClient,
    request: &QueryRequest,
    sink: &dyn ProgressSink,
) -> Result<FetchResult, EnaError> {
    sink.event(ProgressEvent::info(format!(
        "sending query to ENA portal: {}",
        request.query()
    )));
    let response = client.post_form(&request.form_pairs(), sink)?;
    let status = response.status().as_u16();
    if !response.status().is_success() {
        let message = response
            .text()
            .map(|text| text.trim().to_string())
            .unwrap_or_else(|_| "ENA request failed".to_string());
        sink.event(ProgressEvent::error(format!("HTTP error {status}: {message}")));
        return Err(EnaError::EnaStatus { status, message });
    }
    sink.event(ProgressEvent::info(format!("received response (status {status})")));
    Ok(FetchResult::new(status, response))
}
