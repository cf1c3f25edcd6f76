use ithaki_core::prelude::*;
use ithaki_core::report::OperationSummary;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

fn demo_config(output: &Path, corruption_rate: f64) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.connection.transport = Transport::Demo;
    config.demo.seed = Some(42);
    config.demo.corruption_rate = corruption_rate;
    config.measurement.window_secs = 1;
    config.gps.route = "R=1000040".into();
    config.output_dir = output.to_path_buf();
    config
}

fn demo_client(output: &Path, corruption_rate: f64) -> Client {
    Client::from_config(demo_config(output, corruption_rate))
        .with_clock(Box::new(ManualClock::new(Duration::from_millis(50))))
}

#[test]
fn test_echo_statistics_against_demo_station() {
    let dir = tempdir().unwrap();
    let client = demo_client(dir.path(), 0.0);

    let report = client.echo_statistics().unwrap();

    // 1 s window, three 50 ms clock reads per packet
    assert_eq!(report.data.records.len(), 7);
    let csv = fs::read_to_string(dir.path().join("echo.csv")).unwrap();
    assert_eq!(csv.lines().count(), 7);
    assert!(csv.starts_with("Packet #1, Response Time:, 50, ms, PSTART "));
}

#[test]
fn test_arq_without_corruption_never_nacks() {
    let dir = tempdir().unwrap();
    let client = demo_client(dir.path(), 0.0);

    let report = client.arq_statistics().unwrap();
    let summary = report.data.summary();

    assert!(summary.iterations > 0);
    assert_eq!(summary.failed, 0);
    assert!(report
        .data
        .records
        .iter()
        .all(|r| r.fail_count == Some(0)));
}

#[test]
fn test_arq_with_full_corruption_keeps_retrying_first_packet() {
    let dir = tempdir().unwrap();
    let client = demo_client(dir.path(), 1.0);

    let report = client.arq_statistics().unwrap();

    assert!(report.data.records.iter().all(|r| r.sequence == 1));
    assert!(report.data.records.iter().all(|r| r.latency().is_none()));
    let csv = fs::read_to_string(dir.path().join("arq.csv")).unwrap();
    assert!(csv.starts_with("Failed attempt for packet #1, ---, ---, PSTART "));
}

#[test]
fn test_images_are_saved() {
    let dir = tempdir().unwrap();
    let client = demo_client(dir.path(), 0.0);

    let clear = client.receive_image(ImageKind::Clear).unwrap();
    let damaged = client.receive_image(ImageKind::Damaged).unwrap();

    assert_eq!(clear.artifact, Some(dir.path().join("image.jpg")));
    assert_eq!(damaged.artifact, Some(dir.path().join("damagedimage.jpg")));
    let saved = fs::read(dir.path().join("image.jpg")).unwrap();
    assert_eq!(saved, clear.data);
    assert!(saved.ends_with(&[0xFF, 0xD9]));
}

#[test]
fn test_gps_tracking_and_map() {
    let dir = tempdir().unwrap();
    let client = demo_client(dir.path(), 0.0);

    let track = client.gps_tracking("R=1000040", 4, 9).unwrap();
    assert_eq!(track.samples.len(), 40);
    assert_eq!(track.pins.len(), 4);
    assert_eq!(track.request.suffix().matches("T=").count(), 4);

    let map = client.gps_image(&track.request).unwrap();
    assert_eq!(map.artifact, Some(dir.path().join("gpsimage.jpg")));
}

#[test]
fn test_run_all_writes_every_result() {
    let _ = tracing_subscriber::fmt::try_init();
    let dir = tempdir().unwrap();
    let client = demo_client(dir.path(), 0.3);

    let summary = client.run_all().unwrap();

    let operations: Vec<&str> = summary
        .operations
        .iter()
        .map(|op| match op {
            OperationSummary::Echo { .. } => "echo",
            OperationSummary::Image { .. } => "image",
            OperationSummary::Gps { .. } => "gps",
            OperationSummary::Arq { .. } => "arq",
        })
        .collect();
    assert_eq!(operations, vec!["echo", "image", "image", "gps", "image", "arq"]);
    assert!(summary.finished_at.is_some());

    for file in [
        "echo.csv",
        "image.jpg",
        "damagedimage.jpg",
        "gpsimage.jpg",
        "arq.csv",
        "summary.json",
    ] {
        assert!(dir.path().join(file).exists(), "{} missing", file);
    }
}

#[test]
fn test_invalid_code_fails_before_connecting() {
    let dir = tempdir().unwrap();
    let mut config = demo_config(dir.path(), 0.0);
    config.codes.echo = "Q0000".into();
    let client = Client::from_config(config);

    assert!(matches!(
        client.echo_statistics(),
        Err(ProtocolError::InvalidRequestCode { .. })
    ));
}
