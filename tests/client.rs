use std::time::Duration;

use assert_matches::assert_matches;
use tokio::runtime::Runtime;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use enatrieve_tx::app::NoopSink;
use enatrieve_tx::client::{EnaHttpClient, RetryPolicy};
use enatrieve_tx::domain::{OutputFormat, TaxOperator};
use enatrieve_tx::error::EnaError;
use enatrieve_tx::fetch::fetch;
use enatrieve_tx::query::{QueryRequest, build_request};

const TSV_BODY: &str = "run_accession\ttax_id\nSRR1\t7460\n";

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        backoff_factor: Duration::ZERO,
        ..RetryPolicy::default()
    }
}

fn client_for(server: &MockServer) -> EnaHttpClient {
    EnaHttpClient::with_policy(format!("{}/search", server.uri()), fast_policy()).unwrap()
}

fn honey_bee_request() -> QueryRequest {
    build_request("7460", 5, "RNA-Seq", TaxOperator::Subtree, OutputFormat::Tsv)
}

fn request_count(runtime: &Runtime, server: &MockServer) -> usize {
    runtime
        .block_on(server.received_requests())
        .map(|requests| requests.len())
        .unwrap_or_default()
}

#[test]
fn retries_transient_503_until_success() {
    let runtime = Runtime::new().unwrap();
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(3)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string(TSV_BODY))
            .mount(&server)
            .await;
        server
    });

    let result = fetch(&client_for(&server), &honey_bee_request(), &NoopSink).unwrap();
    assert_eq!(result.status(), 200);
    let lines = result.lines().collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(
        lines,
        vec![b"run_accession\ttax_id".to_vec(), b"SRR1\t7460".to_vec()]
    );
    assert_eq!(request_count(&runtime, &server), 4);
}

#[test]
fn not_found_is_not_retried() {
    let runtime = Runtime::new().unwrap();
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such endpoint\n"))
            .mount(&server)
            .await;
        server
    });

    let err = match fetch(&client_for(&server), &honey_bee_request(), &NoopSink) {
        Ok(_) => panic!("expected a 404 failure"),
        Err(err) => err,
    };
    assert_matches!(err, EnaError::EnaStatus { status: 404, ref message } if message == "no such endpoint");
    assert_eq!(err.status(), Some(404));
    assert_eq!(request_count(&runtime, &server), 1);
}

#[test]
fn exhausted_retries_surface_the_last_status() {
    let runtime = Runtime::new().unwrap();
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;
        server
    });

    let err = match fetch(&client_for(&server), &honey_bee_request(), &NoopSink) {
        Ok(_) => panic!("expected a 502 failure"),
        Err(err) => err,
    };
    assert_eq!(err.status(), Some(502));
    assert_eq!(request_count(&runtime, &server), 6);
}

#[test]
fn retry_after_header_is_honoured() {
    let runtime = Runtime::new().unwrap();
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(TSV_BODY))
            .mount(&server)
            .await;
        server
    });

    let client = EnaHttpClient::with_policy(
        format!("{}/search", server.uri()),
        RetryPolicy::default(),
    )
    .unwrap();
    let result = fetch(&client, &honey_bee_request(), &NoopSink).unwrap();
    assert_eq!(result.status(), 200);
    assert_eq!(request_count(&runtime, &server), 2);
}

#[test]
fn posts_form_encoded_search() {
    let runtime = Runtime::new().unwrap();
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("result=read_run"))
            .and(body_string_contains("format=tsv"))
            .and(body_string_contains("limit=5"))
            .and(body_string_contains("fields=run_accession%2Cexperiment_title"))
            .respond_with(ResponseTemplate::new(200).set_body_string(TSV_BODY))
            .mount(&server)
            .await;
        server
    });

    let result = fetch(&client_for(&server), &honey_bee_request(), &NoopSink).unwrap();
    assert_eq!(result.lines().count(), 2);
}
