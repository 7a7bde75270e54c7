use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

/// Message stream label on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Accel,
    Gyro,
}

impl Topic {
    pub const ALL: [Topic; 2] = [Topic::Accel, Topic::Gyro];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Accel => "accel",
            Topic::Gyro => "gyro",
        }
    }

    /// Human readable name used by the GUI and CSV header.
    pub fn label(&self) -> &'static str {
        match self {
            Topic::Accel => "Accelerometer",
            Topic::Gyro => "Gyroscope",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accel" => Ok(Topic::Accel),
            "gyro" => Ok(Topic::Gyro),
            other => Err(format!("unknown topic '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

/// One labeled reading produced per BLE notification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorFrame {
    pub topic: Topic,
    pub values: Vector3,
}

impl SensorFrame {
    pub fn new(topic: Topic, values: Vector3) -> Self {
        Self { topic, values }
    }
}

/// Element type of a bus payload. All encodings are little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    Float32,
    Float64,
    Int16,
    Int32,
    Uint8,
}

impl DType {
    pub fn name(&self) -> &'static str {
        match self {
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::Uint8 => "uint8",
        }
    }

    pub fn item_size(&self) -> usize {
        match self {
            DType::Float32 | DType::Int32 => 4,
            DType::Float64 => 8,
            DType::Int16 => 2,
            DType::Uint8 => 1,
        }
    }

    /// Accepts NumPy dtype names and their array-protocol strings.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "float32" | "<f4" | "f4" => Some(DType::Float32),
            "float64" | "<f8" | "f8" => Some(DType::Float64),
            "int16" | "<i2" | "i2" => Some(DType::Int16),
            "int32" | "<i4" | "i4" => Some(DType::Int32),
            "uint8" | "|u1" | "u1" => Some(DType::Uint8),
            _ => None,
        }
    }
}

/// Numeric array rebuilt from a header and raw payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorArray {
    pub shape: Vec<usize>,
    pub dtype: DType,
    pub values: Vec<f64>,
}

impl SensorArray {
    /// Reads the array as an (x, y, z) triple when it holds exactly three values.
    pub fn as_vector3(&self) -> Option<Vector3> {
        match self.values.as_slice() {
            [x, y, z] => Some(Vector3::new(*x as f32, *y as f32, *z as f32)),
            _ => None,
        }
    }
}

impl fmt::Display for SensorArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:.6}", v)?;
        }
        write!(f, "] shape={:?} dtype={}", self.shape, self.dtype.name())
    }
}

/// Decoded bus message: either a sample or the end-of-stream sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum BusMessage {
    Sample {
        topic: Option<String>,
        array: SensorArray,
    },
    EndOfStream,
}

impl BusMessage {
    /// Known topic of a sample, if any.
    pub fn topic(&self) -> Option<Topic> {
        match self {
            BusMessage::Sample {
                topic: Some(topic), ..
            } => topic.parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScannedDevice {
    pub name: Option<String>,
    pub address: String,
    pub id: String,
    pub signal_strength: Option<i16>,
}

impl ScannedDevice {
    /// Identifier shown to the user; the BD address when requested, else the platform id.
    pub fn display_id(&self, use_bdaddr: bool) -> &str {
        if use_bdaddr {
            &self.address
        } else {
            &self.id
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

impl StatusMessage {
    pub fn new(message: impl Into<String>, severity: MessageSeverity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}

/// A bus message stamped with the moment the receive worker got it.
#[derive(Debug, Clone, PartialEq)]
pub struct Received {
    pub message: BusMessage,
    pub at: Instant,
}

impl Received {
    pub fn new(message: BusMessage, at: Instant) -> Self {
        Self { message, at }
    }
}

/// Events flowing from the bus worker thread to the GUI.
#[derive(Debug, Clone)]
pub enum AppEvent {
    Bus(Received),
    ConnectionStatus(ConnectionStatus),
    LogMessage(StatusMessage),
}

/// Commands from the GUI to the bus worker thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusCommand {
    Subscribe(Topic),
    Unsubscribe(Topic),
}
