//! Simulated layers for the runner binaries, doc examples and manual
//! testing. They stand in for real drivetrain and IMU sources: each one
//! produces a deterministic waveform while "real" and accepts replayed
//! values through its linked write members otherwise.

use crate::layer::{Layer, LayerDescriptor, MemberSpec, Permission};
use crate::value::{Value, ValueKind};

/// A simulated drivetrain exposing velocity, pose and a status string.
pub struct DriveLayer {
    descriptor: LayerDescriptor,
    velocity: f64,
    pose: Vec<f64>,
    status: String,
    real: bool,
    step: u64,
}

impl DriveLayer {
    pub fn new() -> Self {
        let descriptor = LayerDescriptor::new(
            "drive",
            Permission::ReadWrite,
            vec![
                MemberSpec::read_linked("velocity", ValueKind::Double, "set_velocity"),
                MemberSpec::read_linked("pose", ValueKind::DoubleArray, "set_pose"),
                MemberSpec::read("status", ValueKind::Str),
                MemberSpec::write("set_velocity", ValueKind::Double),
                MemberSpec::write("set_pose", ValueKind::DoubleArray),
            ],
        )
        .expect("drive layer wiring is statically correct");

        Self {
            descriptor,
            velocity: 0.0,
            pose: vec![0.0, 0.0, 0.0],
            status: "idle".into(),
            real: true,
            step: 0,
        }
    }

    /// Advances the simulated drivetrain by one control step. A layer in
    /// replay ignores this: its values come from the write-back path.
    pub fn simulate(&mut self) {
        if !self.real {
            return;
        }

        self.step += 1;
        let t = self.step as f64 * 0.1;
        self.velocity = (t.sin() * 10.0 * 4.0).round() / 4.0;
        self.pose[0] += self.velocity * 0.1;
        self.pose[2] = t % std::f64::consts::TAU;
        self.status = if self.velocity.abs() < 0.01 {
            "idle".into()
        } else {
            "moving".into()
        };
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn pose(&self) -> &[f64] {
        &self.pose
    }
}

impl Default for DriveLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Layer for DriveLayer {
    fn descriptor(&self) -> &LayerDescriptor {
        &self.descriptor
    }

    fn read(&self, member: &str) -> Result<Value, String> {
        match member {
            "velocity" => Ok(Value::Double(self.velocity)),
            "pose" => Ok(Value::DoubleArray(self.pose.clone())),
            "status" => Ok(Value::Str(self.status.clone())),
            other => Err(format!("no read member `{other}`")),
        }
    }

    fn write(&mut self, member: &str, value: Value) -> Result<(), String> {
        match (member, value) {
            ("set_velocity", Value::Double(v)) => {
                self.velocity = v;
                Ok(())
            }
            ("set_pose", Value::DoubleArray(p)) => {
                self.pose = p;
                Ok(())
            }
            (other, _) => Err(format!("no write member `{other}`")),
        }
    }

    fn is_real(&self) -> bool {
        self.real
    }

    fn set_real(&mut self, real: bool) {
        self.real = real;
    }

    fn replay_init(&mut self) {
        self.status = "replaying".into();
    }

    fn exit_replay(&mut self) {
        self.status = "idle".into();
    }
}

/// A simulated inertial unit: heading plus a calibration flag.
pub struct ImuLayer {
    descriptor: LayerDescriptor,
    heading: f64,
    calibrated: bool,
    real: bool,
    step: u64,
}

impl ImuLayer {
    pub fn new() -> Self {
        let descriptor = LayerDescriptor::new(
            "imu",
            Permission::ReadWrite,
            vec![
                MemberSpec::read_linked("heading", ValueKind::Double, "set_heading"),
                MemberSpec::read_linked("calibrated", ValueKind::Boolean, "set_calibrated"),
                MemberSpec::write("set_heading", ValueKind::Double),
                MemberSpec::write("set_calibrated", ValueKind::Boolean),
            ],
        )
        .expect("imu layer wiring is statically correct");

        Self {
            descriptor,
            heading: 0.0,
            calibrated: false,
            real: true,
            step: 0,
        }
    }

    pub fn simulate(&mut self) {
        if !self.real {
            return;
        }

        self.step += 1;
        self.heading = (self.heading + 2.5) % 360.0;
        self.calibrated = self.step > 5;
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }
}

impl Default for ImuLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Layer for ImuLayer {
    fn descriptor(&self) -> &LayerDescriptor {
        &self.descriptor
    }

    fn read(&self, member: &str) -> Result<Value, String> {
        match member {
            "heading" => Ok(Value::Double(self.heading)),
            "calibrated" => Ok(Value::Boolean(self.calibrated)),
            other => Err(format!("no read member `{other}`")),
        }
    }

    fn write(&mut self, member: &str, value: Value) -> Result<(), String> {
        match (member, value) {
            ("set_heading", Value::Double(h)) => {
                self.heading = h;
                Ok(())
            }
            ("set_calibrated", Value::Boolean(c)) => {
                self.calibrated = c;
                Ok(())
            }
            (other, _) => Err(format!("no write member `{other}`")),
        }
    }

    fn is_real(&self) -> bool {
        self.real
    }

    fn set_real(&mut self, real: bool) {
        self.real = real;
    }
}
