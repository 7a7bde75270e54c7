//! Bluetooth Module
//!
//! BLE central side of the lab: find the board, blink its LED, and stream
//! its motion sensor notifications.
//!
//! ## Modules
//!
//! - [`protocol`] - Characteristic UUIDs and payload parsing
//! - [`scanner`] - Timed discovery and name/address lookup
//! - [`connection`] - Connected peripheral, GATT read/write and notifications
//! - [`led`] - LED blink loop

pub mod connection;
pub mod led;
pub mod protocol;
pub mod scanner;

pub use connection::{BleConnection, GattClient, NotifyClient};
pub use scanner::BleScanner;
