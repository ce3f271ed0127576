//! State Compression
//!
//! Serializes a `GameState` for `PositionUpdate` frames. Floats are
//! quantized to fixed-point `i32` by dividing by a per-field precision and
//! truncating toward zero; decoding multiplies back. The first byte is a
//! format version and any other version is a hard error.
//!
//! Layout (big-endian):
//! ```text
//! version u8 | sequence u32 | timestamp u64 | world map | count i32
//! per object:
//!   id [16] | type u8 | flags u8 | pos 2×i32 | vel 2×i32 | rot i32
//!   scale 2×i32 | health i32 | mass f32 | last_input u32 | timestamp u64
//!   animation tag string | animation time f32 | custom map
//! ```

use std::collections::BTreeMap;

use bytes::Bytes;
use thiserror::Error;

use crate::core::vec2::Vec2;
use crate::game::object::ObjectType;
use crate::game::state::{GameObjectState, GameState};
use crate::network::codec::{BinaryReader, BinaryWriter, WireError};

/// Current format version.
pub const FORMAT_VERSION: u8 = 1;

/// Position and velocity step: 1 cm.
pub const POSITION_PRECISION: f64 = 0.01;

/// Rotation step: 0.1 degree.
pub const ROTATION_PRECISION: f64 = 0.1;

/// Scale step: 1 %.
pub const SCALE_PRECISION: f64 = 0.01;

/// Health step.
pub const HEALTH_PRECISION: f64 = 0.1;

const FLAG_ACTIVE: u8 = 0x01;

/// Fixed bytes per object before its variable-length fields.
const OBJECT_FIXED_LEN: usize = 16 + 1 + 1 + 8 + 8 + 4 + 8 + 4 + 4 + 4 + 8;

/// Decode failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompressionError {
    #[error("state format version {found}, expected {expected}")]
    VersionMismatch { expected: u8, found: u8 },

    #[error("unknown object type {0}")]
    UnknownObjectType(u8),

    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Quantize to steps of `precision`, truncating. Saturates at the `i32`
/// range; NaN becomes 0.
#[inline]
pub fn quantize(value: f32, precision: f64) -> i32 {
    (value as f64 / precision) as i32
}

/// Inverse of [`quantize`].
#[inline]
pub fn dequantize(value: i32, precision: f64) -> f32 {
    (value as f64 * precision) as f32
}

/// Versioned snapshot codec.
#[derive(Clone, Copy, Debug, Default)]
pub struct StateCompressor;

impl StateCompressor {
    pub fn new() -> Self {
        Self
    }

    /// Encode a snapshot.
    pub fn compress(&self, state: &GameState) -> Bytes {
        let mut w = BinaryWriter::with_capacity(32 + state.len() * (OBJECT_FIXED_LEN + 32));
        w.write_u8(FORMAT_VERSION);
        w.write_u32(state.sequence());
        w.write_u64(state.timestamp());
        w.write_property_map(state.world());
        w.write_len(state.len());

        for (id, object) in state.objects() {
            w.write_uuid(id);
            w.write_u8(object.object_type.as_u8());
            w.write_u8(if object.active { FLAG_ACTIVE } else { 0 });
            write_quantized_vec2(&mut w, object.position, POSITION_PRECISION);
            write_quantized_vec2(&mut w, object.velocity, POSITION_PRECISION);
            w.write_i32(quantize(object.rotation, ROTATION_PRECISION));
            write_quantized_vec2(&mut w, object.scale, SCALE_PRECISION);
            w.write_i32(quantize(object.health, HEALTH_PRECISION));
            w.write_f32(object.mass);
            w.write_u32(object.last_input_sequence);
            w.write_u64(object.timestamp);
            w.write_string(&object.animation_tag);
            w.write_f32(object.animation_time);
            w.write_property_map(&object.custom);
        }

        w.into_bytes()
    }

    /// Decode a snapshot. Nothing is returned on any error.
    pub fn decompress(&self, bytes: &[u8]) -> Result<GameState, CompressionError> {
        let mut r = BinaryReader::new(bytes);

        let version = r.read_u8()?;
        if version != FORMAT_VERSION {
            return Err(CompressionError::VersionMismatch {
                expected: FORMAT_VERSION,
                found: version,
            });
        }

        let sequence = r.read_u32()?;
        let timestamp = r.read_u64()?;
        let world = r.read_property_map()?;
        let count = r.read_len(OBJECT_FIXED_LEN)?;

        let mut objects = BTreeMap::new();
        for _ in 0..count {
            let id = r.read_uuid()?;
            let type_byte = r.read_u8()?;
            let object_type =
                ObjectType::from_u8(type_byte).ok_or(CompressionError::UnknownObjectType(type_byte))?;
            let flags = r.read_u8()?;
            let position = read_quantized_vec2(&mut r, POSITION_PRECISION)?;
            let velocity = read_quantized_vec2(&mut r, POSITION_PRECISION)?;
            let rotation = dequantize(r.read_i32()?, ROTATION_PRECISION);
            let scale = read_quantized_vec2(&mut r, SCALE_PRECISION)?;
            let health = dequantize(r.read_i32()?, HEALTH_PRECISION);
            let mass = r.read_f32()?;
            let last_input_sequence = r.read_u32()?;
            let object_timestamp = r.read_u64()?;
            let animation_tag = r.read_string()?;
            let animation_time = r.read_f32()?;
            let custom = r.read_property_map()?;

            objects.insert(
                id,
                GameObjectState {
                    position,
                    velocity,
                    rotation,
                    scale,
                    active: flags & FLAG_ACTIVE != 0,
                    health,
                    mass,
                    object_type,
                    custom,
                    animation_tag,
                    animation_time,
                    last_input_sequence,
                    timestamp: object_timestamp,
                },
            );
        }
        r.finish()?;

        Ok(GameState::new(sequence, timestamp, objects, world))
    }
}

fn write_quantized_vec2(w: &mut BinaryWriter, v: Vec2, precision: f64) {
    w.write_i32(quantize(v.x, precision));
    w.write_i32(quantize(v.y, precision));
}

fn read_quantized_vec2(r: &mut BinaryReader<'_>, precision: f64) -> Result<Vec2, WireError> {
    Ok(Vec2::new(
        dequantize(r.read_i32()?, precision),
        dequantize(r.read_i32()?, precision),
    ))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::props::PropertyMap;
    use crate::game::state::WORLD_PHASE;
    use uuid::Uuid;

    fn object(x: f32, health: f32) -> GameObjectState {
        let mut custom = PropertyMap::new();
        custom.insert("type".into(), "Tank".into());
        GameObjectState {
            position: Vec2::new(x, -x),
            velocity: Vec2::new(12.345, -0.5),
            rotation: 123.45,
            scale: Vec2::new(1.0, 1.5),
            active: true,
            health,
            mass: 10.0,
            object_type: ObjectType::Tank,
            custom,
            animation_tag: "drive".into(),
            animation_time: 0.75,
            last_input_sequence: 42,
            timestamp: 1_000,
        }
    }

    fn state() -> GameState {
        let mut world = PropertyMap::new();
        world.insert(WORLD_PHASE.into(), "round".into());
        let objects = [
            (Uuid::from_bytes([1; 16]), object(100.257, 87.65)),
            (Uuid::from_bytes([2; 16]), object(-3.5, 100.0)),
        ]
        .into_iter()
        .collect();
        GameState::new(7, 123_456, objects, world)
    }

    fn close(a: f32, b: f32, precision: f64) -> bool {
        ((a - b).abs() as f64) <= precision + 1e-4
    }

    #[test]
    fn test_round_trip_within_precision() {
        let compressor = StateCompressor::new();
        let original = state();
        let decoded = compressor.decompress(&compressor.compress(&original)).unwrap();

        assert_eq!(decoded.sequence(), 7);
        assert_eq!(decoded.timestamp(), 123_456);
        assert_eq!(decoded.phase(), Some("round"));
        assert_eq!(decoded.len(), 2);

        for (id, a) in original.objects() {
            let b = decoded.get(id).unwrap();
            assert!(close(a.position.x, b.position.x, POSITION_PRECISION));
            assert!(close(a.position.y, b.position.y, POSITION_PRECISION));
            assert!(close(a.velocity.x, b.velocity.x, POSITION_PRECISION));
            assert!(close(a.rotation, b.rotation, ROTATION_PRECISION));
            assert!(close(a.scale.y, b.scale.y, SCALE_PRECISION));
            assert!(close(a.health, b.health, HEALTH_PRECISION));
            assert_eq!(a.object_type, b.object_type);
            assert_eq!(a.active, b.active);
            assert_eq!(a.custom, b.custom);
            assert_eq!(a.animation_tag, b.animation_tag);
            assert_eq!(a.last_input_sequence, b.last_input_sequence);
        }
    }

    #[test]
    fn test_quantize_truncates() {
        assert_eq!(quantize(1.239, POSITION_PRECISION), 123);
        assert_eq!(quantize(-1.239, POSITION_PRECISION), -123);
        assert_eq!(quantize(f32::NAN, POSITION_PRECISION), 0);
        assert_eq!(quantize(f32::INFINITY, POSITION_PRECISION), i32::MAX);
    }

    #[test]
    fn test_version_mismatch_is_hard_error() {
        let compressor = StateCompressor::new();
        let mut bytes = compressor.compress(&state()).to_vec();
        bytes[0] = FORMAT_VERSION + 1;
        assert_eq!(
            compressor.decompress(&bytes),
            Err(CompressionError::VersionMismatch {
                expected: FORMAT_VERSION,
                found: FORMAT_VERSION + 1
            })
        );
    }

    #[test]
    fn test_truncated_rejected() {
        let compressor = StateCompressor::new();
        let bytes = compressor.compress(&state());
        assert!(compressor.decompress(&bytes[..bytes.len() - 3]).is_err());
        assert!(compressor.decompress(&[]).is_err());
    }

    #[test]
    fn test_unknown_object_type_rejected() {
        let compressor = StateCompressor::new();
        let single = GameState::new(
            1,
            1,
            [(Uuid::nil(), object(1.0, 1.0))].into_iter().collect(),
            PropertyMap::new(),
        );
        let mut bytes = compressor.compress(&single).to_vec();
        // version + seq + ts + empty world map + count + id
        let type_at = 1 + 4 + 8 + 4 + 4 + 16;
        bytes[type_at] = 99;
        assert_eq!(
            compressor.decompress(&bytes),
            Err(CompressionError::UnknownObjectType(99))
        );
    }
}
