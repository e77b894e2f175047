use replaybus::error::{BusError, ConfigError};
use replaybus::layer::LayerDescriptor;
use replaybus::{
    AutoSampler, IoBus, Layer, LayerHandle, MemberSpec, Permission, ReplayLog, Value, ValueKind,
};
use replaybus::sink::BufferSink;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Scriptable layer: tests set member values directly and inspect what the
/// bus routed back.
struct TestLayer {
    descriptor: LayerDescriptor,
    values: HashMap<String, Value>,
    fail_reads: bool,
    reject_writes: bool,
    real: bool,
    closed: bool,
    writes: Vec<(String, Value)>,
}

impl TestLayer {
    fn new(base_name: &str, permission: Permission, members: Vec<MemberSpec>) -> Self {
        Self {
            descriptor: LayerDescriptor::new(base_name, permission, members).unwrap(),
            values: HashMap::new(),
            fail_reads: false,
            reject_writes: false,
            real: true,
            closed: false,
            writes: Vec::new(),
        }
    }

    fn drive() -> Self {
        let mut layer = Self::new(
            "drive",
            Permission::ReadWrite,
            vec![
                MemberSpec::read_linked("speed", ValueKind::Double, "set_speed"),
                MemberSpec::read("enabled", ValueKind::Boolean),
                MemberSpec::read_silent("raw_counts", ValueKind::Int),
                MemberSpec::write("set_speed", ValueKind::Double),
            ],
        );
        layer.values.insert("speed".into(), Value::Double(1.5));
        layer.values.insert("enabled".into(), Value::Boolean(true));
        layer.values.insert("raw_counts".into(), Value::Int(42));
        layer
    }

    fn imu() -> Self {
        let mut layer = Self::new(
            "imu",
            Permission::Read,
            vec![MemberSpec::read("heading", ValueKind::Double)],
        );
        layer.values.insert("heading".into(), Value::Double(90.0));
        layer
    }
}

impl Layer for TestLayer {
    fn descriptor(&self) -> &LayerDescriptor {
        &self.descriptor
    }

    fn read(&self, member: &str) -> Result<Value, String> {
        if self.fail_reads {
            return Err("sensor offline".into());
        }
        self.values
            .get(member)
            .cloned()
            .ok_or_else(|| format!("no value for {member}"))
    }

    fn write(&mut self, member: &str, value: Value) -> Result<(), String> {
        if self.reject_writes {
            return Err("actuator disabled".into());
        }
        self.writes.push((member.into(), value));
        Ok(())
    }

    fn is_real(&self) -> bool {
        self.real
    }

    fn set_real(&mut self, real: bool) {
        self.real = real;
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

fn register(bus: &mut IoBus, layer: TestLayer) -> Arc<Mutex<TestLayer>> {
    let typed = Arc::new(Mutex::new(layer));
    let handle: LayerHandle = typed.clone();
    bus.register(handle).unwrap();
    typed
}

#[test]
fn duplicate_base_names_are_rejected_at_registration() {
    let mut bus = IoBus::new();
    register(&mut bus, TestLayer::drive());

    let second: LayerHandle = Arc::new(Mutex::new(TestLayer::drive()));
    assert_eq!(
        bus.register(second),
        Err(ConfigError::DuplicateLayer("drive".into()))
    );
    assert_eq!(bus.len(), 1);
}

#[test]
fn sampling_collects_auto_logged_members_under_channel_keys() {
    let mut bus = IoBus::new();
    register(&mut bus, TestLayer::drive());
    register(&mut bus, TestLayer::imu());

    let mut names: Vec<String> = bus.sample(0).into_iter().map(|r| r.name).collect();
    names.sort();

    // Silent members and write members never appear.
    assert_eq!(names, vec!["drive/enabled", "drive/speed", "imu/heading"]);
}

#[test]
fn one_failing_layer_does_not_block_the_others() {
    let mut bus = IoBus::new();
    let mut broken = TestLayer::drive();
    broken.fail_reads = true;
    register(&mut bus, broken);
    register(&mut bus, TestLayer::imu());

    let records = bus.sample(0);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "imu/heading");
}

#[test]
fn mismatched_accessor_kind_skips_the_channel() {
    let mut bus = IoBus::new();
    let mut layer = TestLayer::drive();
    // The descriptor promises Double but the accessor produces a string.
    layer.values.insert("speed".into(), Value::Str("fast".into()));
    register(&mut bus, layer);

    let names: Vec<String> = bus.sample(0).into_iter().map(|r| r.name).collect();
    assert!(!names.contains(&"drive/speed".to_string()));
    assert!(names.contains(&"drive/enabled".to_string()));
}

#[test]
fn writes_route_to_the_matching_member() {
    let mut bus = IoBus::new();
    let drive = register(&mut bus, TestLayer::drive());

    bus.write("drive/set_speed", Value::Double(2.5)).unwrap();

    let layer = drive.lock().unwrap();
    assert_eq!(layer.writes, vec![("set_speed".into(), Value::Double(2.5))]);
}

#[test]
fn writes_to_unknown_channels_fail() {
    let mut bus = IoBus::new();
    register(&mut bus, TestLayer::drive());

    assert!(matches!(
        bus.write("elevator/height", Value::Double(0.0)),
        Err(BusError::UnknownChannel(_))
    ));
    assert!(matches!(
        bus.write("drive/nonexistent", Value::Double(0.0)),
        Err(BusError::UnknownChannel(_))
    ));
    assert!(matches!(
        bus.write("no-slash", Value::Double(0.0)),
        Err(BusError::UnknownChannel(_))
    ));
}

#[test]
fn writes_to_read_members_are_denied() {
    let mut bus = IoBus::new();
    register(&mut bus, TestLayer::drive());

    assert_eq!(
        bus.write("drive/speed", Value::Double(0.0)),
        Err(BusError::PermissionDenied("drive/speed".into()))
    );
}

#[test]
fn writes_with_the_wrong_kind_are_rejected_before_the_layer() {
    let mut bus = IoBus::new();
    let drive = register(&mut bus, TestLayer::drive());

    assert_eq!(
        bus.write("drive/set_speed", Value::Boolean(true)),
        Err(BusError::KindMismatch {
            channel: "drive/set_speed".into(),
            expected: ValueKind::Double,
            got: ValueKind::Boolean,
        })
    );
    assert!(drive.lock().unwrap().writes.is_empty());
}

#[test]
fn layer_rejections_surface_with_the_reason() {
    let mut bus = IoBus::new();
    let mut layer = TestLayer::drive();
    layer.reject_writes = true;
    register(&mut bus, layer);

    assert_eq!(
        bus.write("drive/set_speed", Value::Double(1.0)),
        Err(BusError::WriteRejected {
            channel: "drive/set_speed".into(),
            reason: "actuator disabled".into(),
        })
    );
}

#[test]
fn unregister_closes_the_layer() {
    let mut bus = IoBus::new();
    let drive = register(&mut bus, TestLayer::drive());

    bus.unregister("drive");
    assert!(bus.is_empty());
    assert!(drive.lock().unwrap().closed);
}

#[test]
fn cycle_marks_are_written_even_when_every_accessor_fails() {
    let mut bus = IoBus::new();
    let mut broken = TestLayer::drive();
    broken.fail_reads = true;
    register(&mut bus, broken);

    let sink = BufferSink::new();
    let mut sampler = AutoSampler::new(Box::new(sink.clone())).unwrap();
    sampler.tick(&bus);
    sampler.tick(&bus);

    let log = ReplayLog::parse(&sink.contents()).unwrap();
    assert_eq!(log.cycles(), 2);
    assert_eq!(log.early_cycles(), 2);
    assert!(log.channel_names().is_empty());
}

#[test]
fn unchanged_values_produce_one_series_entry() {
    let mut bus = IoBus::new();
    register(&mut bus, TestLayer::imu());

    let sink = BufferSink::new();
    let mut sampler = AutoSampler::new(Box::new(sink.clone())).unwrap();
    for _ in 0..5 {
        sampler.tick(&bus);
    }

    let log = ReplayLog::parse(&sink.contents()).unwrap();
    assert_eq!(log.cycles(), 5);
    assert_eq!(log.early_cycles(), 0);

    let heading = log.series("imu/heading").unwrap();
    assert_eq!(heading.entries().len(), 1);
    assert_eq!(log.series_at("imu/heading", 4).unwrap(), &Value::Double(90.0));
}

#[test]
fn logged_lines_survive_the_round_trip() {
    let bus = IoBus::new();
    let sink = BufferSink::new();
    let mut sampler = AutoSampler::new(Box::new(sink.clone())).unwrap();

    sampler.log_line("match started");
    sampler.tick(&bus);
    sampler.log_line("match ended");

    let log = ReplayLog::parse(&sink.contents()).unwrap();
    assert_eq!(
        log.messages(),
        ["match started".to_string(), "match ended".to_string()]
    );
    assert_eq!(sampler.stats().lines_written, 2);
}
