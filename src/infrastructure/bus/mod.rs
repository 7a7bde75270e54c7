//! Message Bus Module
//!
//! ZeroMQ PUB/SUB plumbing between the BLE publisher and the console and
//! GUI subscribers.
//!
//! - [`codec`] - Header and multipart frame encoding
//! - [`publisher`] - Notification to frame publisher
//! - [`subscriber`] - Console receive loop and GUI receive worker

pub mod codec;
pub mod publisher;
pub mod subscriber;
