// End-to-end conversion tests across multiple input streams

use declog::config::SecondaryConfig;
use declog::record::{Record, RecordLayout};
use declog::{
    decode_msgpack_envelope, decode_protobuf_envelope, DeclogConfig, EnvelopeFormat, Error,
    OutputFormat, Pipeline,
};
use std::io::{self, Write};
use std::path::PathBuf;

// 2019-05-23 10:15:30.250 UTC
const MORNING: u64 = 1_558_606_530_250;

fn epoch(start_tm: u64) -> Record {
    Record {
        start_tm,
        epoch_len: 1000,
        v_latest_pts: 90_000,
        v_ingress_bytes: 125_000,
        a_ingress_bytes: 4000,
        v_width: 1280,
        v_height: 720,
        acc_param: 1,
        ..Default::default()
    }
}

fn stream(starts: &[u64]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for &start_tm in starts {
        epoch(start_tm).encode(&mut bytes, RecordLayout::Legacy);
    }
    bytes
}

fn config(format: OutputFormat) -> DeclogConfig {
    let mut config = DeclogConfig::default();
    config.output.format = format;
    config
}

fn run(config: &DeclogConfig, streams: &[Vec<u8>]) -> String {
    let mut pipeline = Pipeline::new(config, Vec::new()).unwrap();
    for bytes in streams {
        pipeline.process_stream(&bytes[..]).unwrap();
    }
    String::from_utf8(pipeline.finish().unwrap().primary).unwrap()
}

fn csv_starts(output: &str) -> Vec<u64> {
    output
        .lines()
        .map(|line| line.split(',').next().unwrap().parse().unwrap())
        .collect()
}

#[test]
fn test_table_row_layout() {
    let mut cfg = config(OutputFormat::Table);
    cfg.output.header = false;
    let output = run(&cfg, &[stream(&[MORNING])]);

    let expected = format!(
        "2019-05-23 10:15:30,250 {:<7}{:<11}{:<11}{:<11}{:<7}{:<7}{:<7}{}{:<5}{:<5}{:<5}\n",
        1000,
        90_000,
        0,
        0,
        1000,
        32,
        0,
        "0      ".repeat(15),
        1280,
        720,
        1
    );
    assert_eq!(output, expected);
}

#[test]
fn test_table_fifteen_minutes_apart() {
    let mut cfg = config(OutputFormat::Table);
    cfg.output.header = false;
    let output = run(&cfg, &[stream(&[MORNING, MORNING + 900_000])]);

    let times: Vec<&str> = output.lines().map(|l| &l[..23]).collect();
    assert_eq!(times, vec!["2019-05-23 10:15:30,250", "2019-05-23 10:30:30,250"]);
}

#[test]
fn test_table_label_column() {
    let mut cfg = config(OutputFormat::Table);
    cfg.output.label = Some("cam2".to_string());
    let output = run(&cfg, &[stream(&[MORNING])]);

    let mut lines = output.lines();
    assert!(lines.next().unwrap().starts_with("     Start Time"));
    assert!(lines.next().unwrap().starts_with("cam2 2019-05-23 10:15:30,250 1000   "));
}

#[test]
fn test_header_and_descriptions_once_per_run() {
    let mut cfg = config(OutputFormat::Table);
    cfg.output.verbose = true;
    let output = run(
        &cfg,
        &[stream(&[MORNING]), Vec::new(), stream(&[MORNING + 1000])],
    );

    assert_eq!(output.matches("Start Time              Epoch").count(), 1);
    assert_eq!(output.matches("Epoch length in milliseconds").count(), 1);
    assert_eq!(output.lines().filter(|l| l.starts_with("2019-05-23")).count(), 2);
}

#[test]
fn test_header_even_for_empty_first_stream() {
    let output = run(&config(OutputFormat::Table), &[Vec::new()]);
    assert!(output.starts_with("Start Time"));
    assert_eq!(output.lines().count(), 1);
}

#[test]
fn test_dedup_spans_streams() {
    let mut cfg = config(OutputFormat::Csv);
    cfg.filter.dedup = true;
    let output = run(
        &cfg,
        &[stream(&[1000, 2000, 3000]), stream(&[2000, 3000, 4000, 4000, 5000])],
    );
    assert_eq!(csv_starts(&output), vec![1000, 2000, 3000, 4000, 5000]);
}

#[test]
fn test_without_dedup_everything_passes() {
    let output = run(
        &config(OutputFormat::Csv),
        &[stream(&[3000, 1000]), stream(&[1000])],
    );
    assert_eq!(csv_starts(&output), vec![3000, 1000, 1000]);
}

#[test]
fn test_window_inclusive_bounds() {
    let mut cfg = config(OutputFormat::Csv);
    cfg.filter.start_ts = Some(2000);
    cfg.filter.duration_ms = Some(2000);
    let output = run(
        &cfg,
        &[stream(&[1000, 2000, 3000]), stream(&[4000, 5000])],
    );
    assert_eq!(csv_starts(&output), vec![2000, 3000, 4000]);
}

#[test]
fn test_duration_from_first_record() {
    let mut cfg = config(OutputFormat::Csv);
    cfg.filter.duration_ms = Some(1500);
    let output = run(&cfg, &[stream(&[10_000, 11_000, 12_000])]);
    assert_eq!(csv_starts(&output), vec![10_000, 11_000]);
}

#[test]
fn test_window_drop_keeps_dedup_state() {
    let mut cfg = config(OutputFormat::Csv);
    cfg.filter.dedup = true;
    cfg.filter.start_ts = Some(5000);
    let output = run(&cfg, &[stream(&[9000, 1000, 6000, 9500])]);
    assert_eq!(csv_starts(&output), vec![9000, 9500]);
}

#[test]
fn test_alignment_grid() {
    let mut cfg = config(OutputFormat::Csv);
    cfg.filter.align_interval_ms = Some(500);
    let mut bytes = Vec::new();
    Record {
        start_tm: 1500,
        epoch_len: 1200,
        a_num_err: 7,
        ..Default::default()
    }
    .encode(&mut bytes, RecordLayout::Legacy);

    let output = run(&cfg, &[bytes]);
    assert_eq!(csv_starts(&output), vec![1500, 2000, 2500]);
    for line in output.lines() {
        let cols: Vec<&str> = line.split(',').collect();
        assert_eq!(cols[1], "500");
        assert_eq!(cols[13], "3");
    }
}

#[test]
fn test_alignment_with_dedup_strictly_increasing() {
    let mut cfg = config(OutputFormat::Csv);
    cfg.filter.dedup = true;
    cfg.filter.align_interval_ms = Some(1000);

    let mut bytes = Vec::new();
    for (start_tm, epoch_len) in [(1000, 2001), (3000, 2000)] {
        Record {
            start_tm,
            epoch_len,
            ..Default::default()
        }
        .encode(&mut bytes, RecordLayout::Legacy);
    }

    let mut pipeline = Pipeline::new(&cfg, Vec::new()).unwrap();
    pipeline.process_stream(&bytes[..]).unwrap();
    let finished = pipeline.finish().unwrap();

    let output = String::from_utf8(finished.primary).unwrap();
    assert_eq!(csv_starts(&output), vec![1000, 2000, 3000, 4000]);
    assert_eq!(finished.stats.dropped_duplicate, 1);
    assert_eq!(finished.stats.emitted, 4);
}

#[test]
fn test_alignment_without_dedup_keeps_overlap() {
    let mut cfg = config(OutputFormat::Csv);
    cfg.filter.align_interval_ms = Some(1000);

    let mut bytes = Vec::new();
    for (start_tm, epoch_len) in [(1000, 2001), (3000, 2000)] {
        Record {
            start_tm,
            epoch_len,
            ..Default::default()
        }
        .encode(&mut bytes, RecordLayout::Legacy);
    }
    let output = run(&cfg, &[bytes]);
    assert_eq!(csv_starts(&output), vec![1000, 2000, 3000, 3000, 4000]);
}

#[test]
fn test_partial_trailing_record_dropped() {
    let mut bytes = stream(&[1000, 2000]);
    bytes.truncate(56 + 30);

    let mut pipeline = Pipeline::new(&config(OutputFormat::Csv), Vec::new()).unwrap();
    pipeline.process_stream(&bytes[..]).unwrap();
    let finished = pipeline.finish().unwrap();

    assert_eq!(finished.stats.emitted, 1);
    assert_eq!(finished.stats.partial_bytes, 30);
}

#[test]
fn test_protobuf_secondary_matches_primary() {
    let mut cfg = config(OutputFormat::Csv);
    cfg.filter.dedup = true;
    cfg.output.label = Some("room-9".to_string());
    cfg.output.secondary = Some(SecondaryConfig {
        path: PathBuf::from("unused.pb"),
        format: EnvelopeFormat::Protobuf,
    });

    let mut pipeline = Pipeline::build(&cfg, Vec::new(), Some(Vec::new())).unwrap();
    pipeline.process_stream(&stream(&[1000, 1000, 2000])[..]).unwrap();
    let finished = pipeline.finish().unwrap();

    let csv = String::from_utf8(finished.primary).unwrap();
    assert_eq!(csv.lines().count(), 2);
    assert!(csv.lines().all(|l| l.starts_with("room-9,")));

    let secondary = finished.secondary.unwrap();
    let mut buf = &secondary[..];
    let mut decoded = Vec::new();
    while let Some(envelope) = decode_protobuf_envelope(&mut buf).unwrap() {
        assert_eq!(envelope.label.as_deref(), Some("room-9"));
        decoded.push(envelope.record);
    }
    assert_eq!(decoded, vec![epoch(1000), epoch(2000)]);
}

#[test]
fn test_msgpack_primary_output() {
    let mut cfg = config(OutputFormat::Msgpack);
    cfg.output.msgpack_layout = RecordLayout::Packed;
    let output = {
        let mut pipeline = Pipeline::new(&cfg, Vec::new()).unwrap();
        pipeline.process_stream(&stream(&[MORNING])[..]).unwrap();
        pipeline.finish().unwrap().primary
    };

    assert_eq!(output.len(), 2 + 53);
    let envelope = decode_msgpack_envelope(&mut &output[..], RecordLayout::Packed)
        .unwrap()
        .unwrap();
    assert_eq!(envelope.label, None);
    assert_eq!(envelope.record, epoch(MORNING));
}

#[test]
fn test_secondary_requires_writer() {
    let mut cfg = config(OutputFormat::Table);
    cfg.output.secondary = Some(SecondaryConfig {
        path: PathBuf::from("out.mp"),
        format: EnvelopeFormat::Msgpack,
    });
    assert!(matches!(
        Pipeline::new(&cfg, Vec::new()),
        Err(Error::InvalidConfig(_))
    ));
}

struct ClosedPipe;

impl Write for ClosedPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_write_failure_is_fatal() {
    let mut pipeline = Pipeline::new(&config(OutputFormat::Csv), ClosedPipe).unwrap();
    let err = pipeline.process_stream(&stream(&[1000])[..]).unwrap_err();
    assert!(matches!(err, Error::Write { sink: "primary", .. }));
}
