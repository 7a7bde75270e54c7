//! Lab Peripheral Protocol
//!
//! GATT characteristic identifiers and payload layouts exposed by the lab
//! board firmware.

use crate::domain::models::{Topic, Vector3};
use crate::error::{BleError, FrameError};
use tracing::trace;
use uuid::Uuid;

/// Advertised local name of the lab board.
pub const DEFAULT_DEVICE_NAME: &str = "BLE-LAB55";

/// LED control characteristic (1 byte, 0x00 = off, 0x01 = on)
pub const LED_CHAR_UUID: Uuid = Uuid::from_u128(0x19b10001_e8f2_537e_4f6c_d104768a1214);

/// Accelerometer notification characteristic (12 bytes)
pub const ACCEL_CHAR_UUID: Uuid = Uuid::from_u128(0x4664e7a1_5a13_bfff_4636_7d0a4b16496c);

/// Gyroscope notification characteristic (12 bytes)
pub const GYRO_CHAR_UUID: Uuid = Uuid::from_u128(0x4664e7a1_5a13_bfff_4636_7d0a4b16496d);

pub const LED_ON: &[u8] = &[0x01];
pub const LED_OFF: &[u8] = &[0x00];

/// Size of an accelerometer or gyroscope notification
pub const SENSOR_PAYLOAD_LEN: usize = 12;

/// Parse a sensor notification into x, y, z
///
/// # Payload Structure (12 bytes)
///
/// ```text
/// [0-3]  : X (f32 little-endian)
/// [4-7]  : Y (f32 little-endian)
/// [8-11] : Z (f32 little-endian)
/// ```
pub fn parse_sensor_payload(bytes: &[u8]) -> Result<Vector3, FrameError> {
    if bytes.len() != SENSOR_PAYLOAD_LEN {
        return Err(FrameError::SensorPayload {
            expected: SENSOR_PAYLOAD_LEN,
            actual: bytes.len(),
        });
    }

    #[cfg(debug_assertions)]
    trace!("Raw notification: {:02X?}", bytes);

    let read = |i: usize| f32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
    Ok(Vector3::new(read(0), read(4), read(8)))
}

/// Interpret an LED characteristic read; any non-zero first byte is "on".
pub fn led_state(value: &[u8]) -> Option<bool> {
    value.first().map(|b| *b != 0)
}

/// Parse a UUID string (case-insensitive, hyphenated or not)
pub fn parse_uuid(uuid_str: &str) -> Result<Uuid, BleError> {
    Ok(Uuid::parse_str(uuid_str.trim())?)
}

/// Characteristic UUIDs that carry sensor notifications, keyed by topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorCharacteristics {
    pub accel: Uuid,
    pub gyro: Uuid,
}

impl SensorCharacteristics {
    pub fn from_strs(accel: &str, gyro: &str) -> Result<Self, BleError> {
        Ok(Self {
            accel: parse_uuid(accel)?,
            gyro: parse_uuid(gyro)?,
        })
    }

    pub fn topic_for(&self, uuid: Uuid) -> Option<Topic> {
        if uuid == self.accel {
            Some(Topic::Accel)
        } else if uuid == self.gyro {
            Some(Topic::Gyro)
        } else {
            None
        }
    }

    pub fn all(&self) -> [Uuid; 2] {
        [self.accel, self.gyro]
    }
}

impl Default for SensorCharacteristics {
    fn default() -> Self {
        Self {
            accel: ACCEL_CHAR_UUID,
            gyro: GYRO_CHAR_UUID,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uuid() {
        let uuid = parse_uuid("4664E7A1-5A13-BFFF-4636-7D0A4B16496C").unwrap();
        assert_eq!(uuid, SensorCharacteristics::default().accel);
        assert_eq!(
            parse_uuid("4664e7a1-5a13-bfff-4636-7d0a4b16496d").unwrap(),
            SensorCharacteristics::default().gyro
        );
        assert!(parse_uuid("not-a-uuid").is_err());
    }

    #[test]
    fn test_parse_sensor_payload() {
        let mut bytes = Vec::new();
        for v in [1.0f32, -2.5, 9.81] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let values = parse_sensor_payload(&bytes).unwrap();
        assert_eq!(values, Vector3::new(1.0, -2.5, 9.81));
    }

    #[test]
    fn test_parse_sensor_payload_wrong_size() {
        let err = parse_sensor_payload(&[0u8; 8]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::SensorPayload {
                expected: 12,
                actual: 8
            }
        ));
    }

    #[test]
    fn test_led_state() {
        assert_eq!(led_state(LED_ON), Some(true));
        assert_eq!(led_state(LED_OFF), Some(false));
        assert_eq!(led_state(&[]), None);
    }

    #[test]
    fn test_topic_routing() {
        let chars = SensorCharacteristics::default();
        assert_eq!(chars.topic_for(chars.accel), Some(Topic::Accel));
        assert_eq!(chars.topic_for(chars.gyro), Some(Topic::Gyro));
        assert_eq!(chars.topic_for(LED_CHAR_UUID), None);
    }
}
