use replaybus::codec::{FrameEncoder, SampleRecord};
use replaybus::error::{ParseError, SeriesError};
use replaybus::{ReplayLog, Value, ValueKind};

fn record(name: &str, value: Value, cycle: u64) -> SampleRecord {
    SampleRecord {
        name: name.into(),
        value,
        cycle,
    }
}

fn push_record(bytes: &mut Vec<u8>, encoder: &mut FrameEncoder, name: &str, value: Value) {
    for frame in encoder.encode_record(&record(name, value, 0)) {
        bytes.extend_from_slice(frame.as_slice());
    }
}

fn push_marks(bytes: &mut Vec<u8>, count: u64) {
    for _ in 0..count {
        bytes.extend_from_slice(&FrameEncoder::encode_cycle_mark(false));
    }
}

/// Ten cycles with updates at cycles 2, 5 and 9.
fn sparse_speed_log() -> ReplayLog {
    let mut encoder = FrameEncoder::new();
    let mut bytes = Vec::new();

    push_marks(&mut bytes, 2);
    push_record(&mut bytes, &mut encoder, "drive/speed", Value::Double(1.0));
    push_marks(&mut bytes, 3);
    push_record(&mut bytes, &mut encoder, "drive/speed", Value::Double(2.0));
    push_marks(&mut bytes, 4);
    push_record(&mut bytes, &mut encoder, "drive/speed", Value::Double(3.0));
    push_marks(&mut bytes, 1);

    let log = ReplayLog::parse(&bytes).unwrap();
    assert!(!log.truncated());
    log
}

#[test]
fn gap_fill_returns_the_latest_update_at_or_before_the_cycle() {
    let log = sparse_speed_log();
    assert_eq!(log.cycles(), 10);

    let speed = log.series("drive/speed").unwrap();
    assert_eq!(speed.kind(), ValueKind::Double);
    assert_eq!(speed.entries().len(), 3);
    assert_eq!(speed.first_cycle(), Some(2));
    assert_eq!(speed.last_cycle(), Some(9));

    for (cycle, expected) in [(2, 1.0), (3, 1.0), (4, 1.0), (5, 2.0), (8, 2.0), (9, 3.0)] {
        assert_eq!(
            log.series_at("drive/speed", cycle).unwrap(),
            &Value::Double(expected),
            "cycle {cycle}"
        );
    }
}

#[test]
fn gap_fill_carries_the_last_value_forward() {
    let log = sparse_speed_log();
    assert_eq!(
        log.series_at("drive/speed", 500).unwrap(),
        &Value::Double(3.0)
    );
}

#[test]
fn querying_before_the_first_update_is_an_error() {
    let log = sparse_speed_log();
    for cycle in [0, 1] {
        assert!(matches!(
            log.series_at("drive/speed", cycle),
            Err(SeriesError::NoDataYet { .. })
        ));
    }
}

#[test]
fn unknown_channels_are_reported_by_name() {
    let log = sparse_speed_log();
    assert!(matches!(
        log.series_at("drive/missing", 0),
        Err(SeriesError::UnknownSeries(name)) if name == "drive/missing"
    ));
}

#[test]
fn resampling_within_a_cycle_keeps_only_the_latest_value() {
    let mut encoder = FrameEncoder::new();
    let mut bytes = Vec::new();
    push_record(&mut bytes, &mut encoder, "imu/heading", Value::Double(10.0));
    push_record(&mut bytes, &mut encoder, "imu/heading", Value::Double(20.0));
    push_marks(&mut bytes, 1);

    let log = ReplayLog::parse(&bytes).unwrap();
    let heading = log.series("imu/heading").unwrap();
    assert_eq!(heading.entries().len(), 1);
    assert_eq!(heading.entries()[0].value, Value::Double(20.0));
}

#[test]
fn duplicate_declarations_are_fatal() {
    // Two independent encoders both hand out reference 0, as happens when a
    // capture file is accidentally concatenated with another.
    let mut bytes = Vec::new();
    push_record(
        &mut bytes,
        &mut FrameEncoder::new(),
        "drive/speed",
        Value::Double(1.0),
    );
    push_record(
        &mut bytes,
        &mut FrameEncoder::new(),
        "imu/heading",
        Value::Double(2.0),
    );

    assert!(matches!(
        ReplayLog::parse(&bytes),
        Err(ParseError::DuplicateReference(0))
    ));
}

#[test]
fn undeclared_reference_truncates_but_keeps_recovered_cycles() {
    let mut encoder = FrameEncoder::new();
    let mut bytes = Vec::new();
    push_record(&mut bytes, &mut encoder, "drive/speed", Value::Double(1.0));
    push_marks(&mut bytes, 1);

    // A data frame citing reference 1, which this stream never declared.
    let mut other = FrameEncoder::new();
    let _ = other.encode_record(&record("drive/speed", Value::Double(1.0), 0));
    let stray = other.encode_record(&record("imu/heading", Value::Double(9.0), 0));
    bytes.extend_from_slice(&stray[1]);
    push_marks(&mut bytes, 1);

    let log = ReplayLog::parse(&bytes).unwrap();
    assert!(log.truncated());
    assert_eq!(log.cycles(), 1);
    assert_eq!(log.series_at("drive/speed", 0).unwrap(), &Value::Double(1.0));
}

#[test]
fn kind_disagreement_with_the_declaration_truncates() {
    // Declaration says Double, the stray data frame carries a Boolean under
    // the same reference.
    let declare_only = FrameEncoder::new()
        .encode_record(&record("drive/speed", Value::Double(1.0), 0))
        .remove(0);
    let bad_data = FrameEncoder::new()
        .encode_record(&record("drive/speed", Value::Boolean(true), 0))
        .remove(1);

    let mut bytes = declare_only;
    bytes.extend_from_slice(&bad_data);
    push_marks(&mut bytes, 1);

    let log = ReplayLog::parse(&bytes).unwrap();
    assert!(log.truncated());
    assert_eq!(log.series("drive/speed").unwrap().entries().len(), 0);
}

#[test]
fn early_cycle_marks_are_counted_separately() {
    let mut bytes = Vec::new();
    for _ in 0..3 {
        bytes.extend_from_slice(&FrameEncoder::encode_cycle_mark(true));
    }
    push_record(
        &mut bytes,
        &mut FrameEncoder::new(),
        "drive/speed",
        Value::Double(1.0),
    );
    push_marks(&mut bytes, 2);

    let log = ReplayLog::parse(&bytes).unwrap();
    assert_eq!(log.cycles(), 5);
    assert_eq!(log.early_cycles(), 3);
    assert_eq!(log.data_cycles(), 2);
}

#[test]
fn free_text_lines_become_messages() {
    let mut bytes = b"log opened at 1700000000\n".to_vec();
    push_record(
        &mut bytes,
        &mut FrameEncoder::new(),
        "drive/speed",
        Value::Double(1.0),
    );
    bytes.extend_from_slice(b"auton started\n");
    push_marks(&mut bytes, 1);

    let log = ReplayLog::parse(&bytes).unwrap();
    assert_eq!(
        log.messages(),
        ["log opened at 1700000000".to_string(), "auton started".to_string()]
    );
}

#[test]
fn summary_lists_channels_sorted_by_name() {
    let mut encoder = FrameEncoder::new();
    let mut bytes = Vec::new();
    push_record(&mut bytes, &mut encoder, "imu/heading", Value::Double(0.0));
    push_record(&mut bytes, &mut encoder, "drive/speed", Value::Double(0.0));
    push_marks(&mut bytes, 1);

    let summary = ReplayLog::parse(&bytes).unwrap().summary();
    let names: Vec<&str> = summary.channels.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["drive/speed", "imu/heading"]);
    assert_eq!(summary.cycles, 1);
    assert!(!summary.truncated);
}
