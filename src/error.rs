//! Error types for the BLE, bus and export layers.

use thiserror::Error;
use uuid::Uuid;

/// Problems decoding a bus message or a raw sensor notification.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("header is not valid JSON: {0}")]
    Header(#[from] serde_json::Error),

    #[error("unsupported dtype '{0}'")]
    UnsupportedDtype(String),

    #[error("end-of-stream header must carry \"done\": true")]
    InvalidSentinel,

    #[error("sample header arrived without a payload frame")]
    MissingPayload,

    #[error("payload is {actual} bytes, header declares {expected}")]
    PayloadLength { expected: usize, actual: usize },

    #[error("shape {0:?} overflows the addressable payload size")]
    ShapeOverflow(Vec<usize>),

    #[error("expected 1 to 3 frames, got {0}")]
    FrameCount(usize),

    #[error("topic frame is not valid UTF-8")]
    TopicEncoding,

    #[error("sensor notification must be {expected} bytes, got {actual}")]
    SensorPayload { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum BleError {
    #[error("no Bluetooth adapter available")]
    NoAdapter,

    #[error("Bluetooth error: {0}")]
    Btleplug(#[from] btleplug::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("characteristic {0} not found on device")]
    CharacteristicNotFound(Uuid),
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus socket error: {0}")]
    Socket(#[from] zeromq::ZmqError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("bus source closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write CSV: {0}")]
    Io(#[from] std::io::Error),
}
