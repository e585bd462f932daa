use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use enatrieve_tx::domain::{OutputFormat, OutputTarget};
use enatrieve_tx::error::EnaError;
use enatrieve_tx::fetch::FetchResult;
use enatrieve_tx::app::CheckReport;
use enatrieve_tx::output::{write_json, write_lines, write_to_target};
use enatrieve_tx::summary::SummaryStats;

fn ok_lines(lines: &[&str]) -> Vec<Result<String, EnaError>> {
    lines.iter().map(|line| Ok(line.to_string())).collect()
}

#[test]
fn file_round_trip_is_verbatim() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("nested/runs.tsv")).unwrap();
    let lines = [
        "run_accession\ttax_id\tinstrument_platform\tread_count",
        "SRR1\t7460\tILLUMINA\t100",
        "",
        "SRR2\t7460\tOXFORD_NANOPORE\t",
    ];

    let count = write_to_target(ok_lines(&lines), &OutputTarget::File(path.clone())).unwrap();
    assert_eq!(count, 4);

    let written = fs::read_to_string(&path).unwrap();
    let read_back: Vec<&str> = written.lines().collect();
    assert_eq!(read_back, lines);
    assert!(written.ends_with('\n'));
}

#[test]
fn streamed_body_is_split_into_lines() {
    let body = "a\tb\r\n1\t2\n3\t4";
    let result = FetchResult::new(200, body.as_bytes());
    assert_eq!(result.status(), 200);

    let mut out = Vec::new();
    let count = write_lines(result.lines(), &mut out).unwrap();
    assert_eq!(count, 3);
    assert_eq!(String::from_utf8(out).unwrap(), "a\tb\n1\t2\n3\t4\n");
}

#[test]
fn non_utf8_bytes_pass_through_unchanged() {
    let body: &[u8] = b"run_accession\tsample_title\nSRR1\tcaf\xe9 title\r\nSRR2\tplain\n";
    let result = FetchResult::new(200, body);

    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("latin1.tsv")).unwrap();
    let count = write_to_target(result.lines(), &OutputTarget::File(path.clone())).unwrap();
    assert_eq!(count, 3);
    assert_eq!(
        fs::read(&path).unwrap(),
        b"run_accession\tsample_title\nSRR1\tcaf\xe9 title\nSRR2\tplain\n"
    );
}

#[test]
fn stream_failure_propagates() {
    let lines = vec![
        Ok("header".to_string()),
        Err(EnaError::Stream("connection reset".to_string())),
        Ok("never written".to_string()),
    ];
    let mut out = Vec::new();
    let err = write_lines(lines, &mut out).unwrap_err();
    assert_matches!(err, EnaError::Stream(_));
    assert_eq!(out, b"header\n");
}

#[test]
fn unwritable_file_is_a_filesystem_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let err = write_to_target(ok_lines(&["x"]), &OutputTarget::File(path)).unwrap_err();
    assert_matches!(err, EnaError::Filesystem(_));
}

#[test]
fn dash_means_stdout() {
    assert_eq!("-".parse::<OutputTarget>().unwrap(), OutputTarget::Stdout);
    assert_eq!(
        "runs.tsv".parse::<OutputTarget>().unwrap(),
        OutputTarget::File(Utf8PathBuf::from("runs.tsv"))
    );
    assert_eq!(
        OutputTarget::default_for("2759", OutputFormat::Json),
        OutputTarget::File(Utf8PathBuf::from("ena_transcriptomics_2759.json"))
    );
}

#[test]
fn reports_serialize_as_json() {
    let stats = SummaryStats {
        unique_organisms: 2,
        runs_total: 3,
        reads_total: 300,
        ..SummaryStats::default()
    };
    let mut out = Vec::new();
    write_json(&stats, &mut out).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(value["unique_organisms"], 2);
    assert_eq!(value["reads_total"], 300);
    assert_eq!(value["reads_long"], 0);
    assert!(out.ends_with(b"\n"));

    let report = CheckReport {
        tax_id: "7460".to_string(),
        tsv_lines: 6,
        json_records: 5,
    };
    let mut out = Vec::new();
    write_json(&report, &mut out).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(value["tax_id"], "7460");
    assert_eq!(value["json_records"], 5);
}
