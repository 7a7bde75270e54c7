//! Bus wire format
//!
//! A message is a list of frames:
//!
//! ```text
//! topic layout : [ topic ] [ {"shape": [3], "dtype": "float32"} ] [ payload ]
//! bare layout  :           [ {"shape": [3], "dtype": "float32"} ] [ payload ]
//! sentinel     :           [ {"done": true} ]
//! ```
//!
//! Payload bytes are little-endian values of the declared dtype, row-major.

use crate::domain::models::{BusMessage, DType, SensorArray, SensorFrame};
use crate::error::FrameError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Subscription prefix that matches the end-of-stream frame.
pub const SENTINEL_PREFIX: &str = "{\"done\"";

/// Whether published samples carry a leading topic frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameLayout {
    #[default]
    Topic,
    Bare,
}

/// Validated header frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    Sample { shape: Vec<usize>, dtype: DType },
    EndOfStream,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireHeader {
    Done { done: bool },
    Array { shape: Vec<usize>, dtype: String },
}

impl Header {
    pub fn to_json(&self) -> Result<Vec<u8>, FrameError> {
        let wire = match self {
            Header::Sample { shape, dtype } => WireHeader::Array {
                shape: shape.clone(),
                dtype: dtype.name().to_string(),
            },
            Header::EndOfStream => WireHeader::Done { done: true },
        };
        Ok(serde_json::to_vec(&wire)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, FrameError> {
        match serde_json::from_slice::<WireHeader>(bytes)? {
            WireHeader::Done { done: true } => Ok(Header::EndOfStream),
            WireHeader::Done { done: false } => Err(FrameError::InvalidSentinel),
            WireHeader::Array { shape, dtype } => {
                let dtype = DType::parse(&dtype).ok_or(FrameError::UnsupportedDtype(dtype))?;
                Ok(Header::Sample { shape, dtype })
            }
        }
    }
}

/// Frames for one sensor reading as float32 values of shape `[3]`.
pub fn encode_frame(frame: &SensorFrame, layout: FrameLayout) -> Result<Vec<Bytes>, FrameError> {
    let header = Header::Sample {
        shape: vec![3],
        dtype: DType::Float32,
    };
    let mut payload = Vec::with_capacity(12);
    for v in frame.values.to_array() {
        payload.extend_from_slice(&v.to_le_bytes());
    }

    let mut frames = Vec::with_capacity(3);
    if layout == FrameLayout::Topic {
        frames.push(Bytes::from_static(frame.topic.as_str().as_bytes()));
    }
    frames.push(Bytes::from(header.to_json()?));
    frames.push(Bytes::from(payload));
    Ok(frames)
}

pub fn encode_end_of_stream() -> Result<Vec<Bytes>, FrameError> {
    Ok(vec![Bytes::from(Header::EndOfStream.to_json()?)])
}

/// Decode a received message. The layout is inferred from the frame count.
pub fn decode_frames(frames: &[Bytes]) -> Result<BusMessage, FrameError> {
    match frames {
        [header] => match Header::from_json(header)? {
            Header::EndOfStream => Ok(BusMessage::EndOfStream),
            Header::Sample { .. } => Err(FrameError::MissingPayload),
        },
        [header, payload] => decode_sample(None, header, payload),
        [topic, header, payload] => {
            let topic = std::str::from_utf8(topic).map_err(|_| FrameError::TopicEncoding)?;
            decode_sample(Some(topic.to_string()), header, payload)
        }
        other => Err(FrameError::FrameCount(other.len())),
    }
}

fn decode_sample(
    topic: Option<String>,
    header: &[u8],
    payload: &[u8],
) -> Result<BusMessage, FrameError> {
    match Header::from_json(header)? {
        Header::EndOfStream => Ok(BusMessage::EndOfStream),
        Header::Sample { shape, dtype } => {
            let array = decode_payload(payload, shape, dtype)?;
            Ok(BusMessage::Sample { topic, array })
        }
    }
}

/// Rebuild an array from raw bytes, checking the length against the header.
pub fn decode_payload(
    payload: &[u8],
    shape: Vec<usize>,
    dtype: DType,
) -> Result<SensorArray, FrameError> {
    let expected = shape
        .iter()
        .try_fold(dtype.item_size(), |acc, dim| acc.checked_mul(*dim))
        .ok_or_else(|| FrameError::ShapeOverflow(shape.clone()))?;
    if payload.len() != expected {
        return Err(FrameError::PayloadLength {
            expected,
            actual: payload.len(),
        });
    }

    let values = payload
        .chunks_exact(dtype.item_size())
        .map(|c| match dtype {
            DType::Float32 => f32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64,
            DType::Float64 => {
                f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]])
            }
            DType::Int16 => i16::from_le_bytes([c[0], c[1]]) as f64,
            DType::Int32 => i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64,
            DType::Uint8 => c[0] as f64,
        })
        .collect();

    Ok(SensorArray {
        shape,
        dtype,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Topic, Vector3};

    fn f32_payload(values: &[f32]) -> Bytes {
        Bytes::from(
            values
                .iter()
                .flat_map(|v| v.to_le_bytes())
                .collect::<Vec<u8>>(),
        )
    }

    #[test]
    fn accel_frame_decodes_to_array() {
        let frame = SensorFrame::new(Topic::Accel, Vector3::new(1.0, 2.0, 3.0));
        let frames = encode_frame(&frame, FrameLayout::Topic).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(&frames[0][..], b"accel");
        assert_eq!(&frames[1][..], br#"{"shape":[3],"dtype":"float32"}"#);
        assert_eq!(frames[2].len(), 12);

        match decode_frames(&frames).unwrap() {
            BusMessage::Sample { topic, array } => {
                assert_eq!(topic.as_deref(), Some("accel"));
                assert_eq!(array.shape, vec![3]);
                assert_eq!(array.dtype, DType::Float32);
                assert_eq!(array.values, vec![1.0, 2.0, 3.0]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn bare_layout_has_no_topic() {
        let frame = SensorFrame::new(Topic::Gyro, Vector3::new(0.5, -0.5, 0.25));
        let frames = encode_frame(&frame, FrameLayout::Bare).unwrap();
        assert_eq!(frames.len(), 2);

        let msg = decode_frames(&frames).unwrap();
        assert_eq!(msg.topic(), None);
        match msg {
            BusMessage::Sample { array, .. } => {
                assert_eq!(array.as_vector3(), Some(frame.values))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn sentinel_decodes_as_end_of_stream() {
        assert_eq!(
            decode_frames(&encode_end_of_stream().unwrap()).unwrap(),
            BusMessage::EndOfStream
        );
        // Python's json module puts a space after the colon.
        let python = [Bytes::from_static(b"{\"done\": true}")];
        assert_eq!(decode_frames(&python).unwrap(), BusMessage::EndOfStream);
        assert!(python[0].starts_with(SENTINEL_PREFIX.as_bytes()));
    }

    #[test]
    fn done_false_is_rejected() {
        let frames = [Bytes::from_static(br#"{"done": false}"#)];
        assert!(matches!(
            decode_frames(&frames),
            Err(FrameError::InvalidSentinel)
        ));
    }

    #[test]
    fn payload_length_must_match_header() {
        let frames = [
            Bytes::from_static(br#"{"shape": [3], "dtype": "float32"}"#),
            f32_payload(&[1.0, 2.0]),
        ];
        assert!(matches!(
            decode_frames(&frames),
            Err(FrameError::PayloadLength {
                expected: 12,
                actual: 8
            })
        ));
    }

    #[test]
    fn unknown_dtype_is_rejected() {
        let frames = [
            Bytes::from_static(br#"{"shape": [1], "dtype": "complex64"}"#),
            Bytes::from_static(&[0u8; 8]),
        ];
        assert!(matches!(
            decode_frames(&frames),
            Err(FrameError::UnsupportedDtype(d)) if d == "complex64"
        ));
    }

    #[test]
    fn sample_header_without_payload_is_rejected() {
        let frames = [Bytes::from_static(br#"{"shape": [3], "dtype": "float32"}"#)];
        assert!(matches!(
            decode_frames(&frames),
            Err(FrameError::MissingPayload)
        ));
        assert!(matches!(decode_frames(&[]), Err(FrameError::FrameCount(0))));
    }

    #[test]
    fn oversized_shape_is_an_error_not_a_panic() {
        let frames = [
            Bytes::from_static(br#"{"shape": [4611686018427387904, 8], "dtype": "float32"}"#),
            f32_payload(&[1.0, 2.0, 3.0]),
        ];
        assert!(matches!(
            decode_frames(&frames),
            Err(FrameError::ShapeOverflow(shape)) if shape == vec![4611686018427387904, 8]
        ));

        let huge = vec![usize::MAX, 2];
        assert!(matches!(
            decode_payload(&[0u8; 4], huge, DType::Uint8),
            Err(FrameError::ShapeOverflow(_))
        ));
    }

    #[test]
    fn multidimensional_int_payload() {
        let payload: Vec<u8> = [1i16, -2, 3, -4, 5, -6]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let array = decode_payload(&payload, vec![2, 3], DType::Int16).unwrap();
        assert_eq!(array.values, vec![1.0, -2.0, 3.0, -4.0, 5.0, -6.0]);
        assert_eq!(array.as_vector3(), None);
    }
}
