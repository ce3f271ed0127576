//! Binary Wire Codec
//!
//! Canonical encode/decode for every value that crosses the wire. All
//! multi-byte numerics are big-endian. Strings and collections carry a
//! 4-byte signed length; negative or implausible lengths are rejected
//! before anything is allocated, and every read checks the remaining
//! buffer first.
//!
//! Tagged values: 0=null 1=i32 2=f32 3=f64 4=i64 5=i16 6=string 7=bool 8=u8.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use uuid::Uuid;

use crate::core::props::{PropertyMap, PropertyValue};
use crate::core::vec2::{Bounds, Vec2};

/// Fixed bytes of one object record before its property map.
pub const OBJECT_RECORD_FIXED_LEN: usize = 16 + 4 + 16 + 8 + 4 + 8 + 1 + 4;

/// Smallest possible property entry: empty key plus a null tag.
const MIN_PROPERTY_ENTRY_LEN: usize = 4 + 1;

// =============================================================================
// ERRORS
// =============================================================================

/// Decode failures. Every one is a malformed input; none is retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("invalid length or count: {0}")]
    InvalidLength(i64),

    #[error("unknown value tag: {0}")]
    UnknownValueTag(u8),

    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("unknown action code: {0}")]
    InvalidAction(u8),

    #[error("missing or invalid property: {0}")]
    InvalidProperty(String),

    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),
}

// =============================================================================
// OBJECT RECORD
// =============================================================================

/// One game object as carried by the `GameObjects` message.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectRecord {
    pub id: Uuid,
    pub health: f32,
    pub bounds: Bounds,
    pub velocity: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
    pub is_static: bool,
    pub mass: f32,
    pub properties: PropertyMap,
}

// =============================================================================
// WRITER
// =============================================================================

/// Growable big-endian writer.
#[derive(Debug, Default)]
pub struct BinaryWriter {
    buf: BytesMut,
}

impl BinaryWriter {
    /// Empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer with preallocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finish and take the buffer.
    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.put_u8(v as u8);
    }

    pub fn write_i16(&mut self, v: i16) {
        self.buf.put_i16(v);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.put_u32(v);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.put_i32(v);
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.put_u64(v);
    }

    pub fn write_i64(&mut self, v: i64) {
        self.buf.put_i64(v);
    }

    pub fn write_f32(&mut self, v: f32) {
        self.buf.put_f32(v);
    }

    pub fn write_f64(&mut self, v: f64) {
        self.buf.put_f64(v);
    }

    /// Raw bytes, no prefix.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Length or count prefix (4-byte signed).
    pub fn write_len(&mut self, len: usize) {
        let len = i32::try_from(len).unwrap_or(i32::MAX);
        self.buf.put_i32(len);
    }

    /// Length-prefixed UTF-8.
    pub fn write_string(&mut self, s: &str) {
        self.write_len(s.len());
        self.buf.put_slice(s.as_bytes());
    }

    /// 16 raw bytes.
    pub fn write_uuid(&mut self, id: &Uuid) {
        self.buf.put_slice(id.as_bytes());
    }

    pub fn write_vec2(&mut self, v: Vec2) {
        self.write_f32(v.x);
        self.write_f32(v.y);
    }

    /// pos.x, pos.y, size.x, size.y
    pub fn write_bounds(&mut self, b: &Bounds) {
        self.write_vec2(b.position);
        self.write_vec2(b.size);
    }

    /// Tag byte then value.
    pub fn write_value(&mut self, value: &PropertyValue) {
        self.write_u8(value.tag());
        match value {
            PropertyValue::Null => {}
            PropertyValue::Int(v) => self.write_i32(*v),
            PropertyValue::Float(v) => self.write_f32(*v),
            PropertyValue::Double(v) => self.write_f64(*v),
            PropertyValue::Long(v) => self.write_i64(*v),
            PropertyValue::Short(v) => self.write_i16(*v),
            PropertyValue::String(v) => self.write_string(v),
            PropertyValue::Bool(v) => self.write_bool(*v),
            PropertyValue::Byte(v) => self.write_u8(*v),
        }
    }

    /// Count, then `[key][tag][value]` per entry in key order.
    pub fn write_property_map(&mut self, map: &PropertyMap) {
        self.write_len(map.len());
        for (key, value) in map {
            self.write_string(key);
            self.write_value(value);
        }
    }

    /// One object record.
    pub fn write_object_record(&mut self, record: &ObjectRecord) {
        self.write_uuid(&record.id);
        self.write_f32(record.health);
        self.write_bounds(&record.bounds);
        self.write_vec2(record.velocity);
        self.write_f32(record.rotation);
        self.write_vec2(record.scale);
        self.write_bool(record.is_static);
        self.write_f32(record.mass);
        self.write_property_map(&record.properties);
    }

    /// Count then records.
    pub fn write_object_array(&mut self, records: &[ObjectRecord]) {
        self.write_len(records.len());
        for record in records {
            self.write_object_record(record);
        }
    }
}

// =============================================================================
// READER
// =============================================================================

/// Bounds-checked big-endian reader over a borrowed slice.
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    buf: &'a [u8],
}

impl<'a> BinaryReader<'a> {
    /// Read from the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Unread bytes.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Fail unless at least `needed` bytes remain.
    #[inline]
    fn ensure(&self, needed: usize) -> Result<(), WireError> {
        if self.buf.len() < needed {
            return Err(WireError::Truncated {
                needed,
                remaining: self.buf.len(),
            });
        }
        Ok(())
    }

    /// Fail if anything is left over.
    pub fn finish(&self) -> Result<(), WireError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(WireError::TrailingBytes(self.buf.len()))
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    /// Any non-zero byte is true.
    pub fn read_bool(&mut self) -> Result<bool, WireError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_i16(&mut self) -> Result<i16, WireError> {
        self.ensure(2)?;
        Ok(self.buf.get_i16())
    }

    pub fn read_u32(&mut self) -> Result<u32, WireError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    pub fn read_i32(&mut self) -> Result<i32, WireError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn read_u64(&mut self) -> Result<u64, WireError> {
        self.ensure(8)?;
        Ok(self.buf.get_u64())
    }

    pub fn read_i64(&mut self) -> Result<i64, WireError> {
        self.ensure(8)?;
        Ok(self.buf.get_i64())
    }

    pub fn read_f32(&mut self) -> Result<f32, WireError> {
        self.ensure(4)?;
        Ok(self.buf.get_f32())
    }

    pub fn read_f64(&mut self) -> Result<f64, WireError> {
        self.ensure(8)?;
        Ok(self.buf.get_f64())
    }

    /// Borrow the next `n` bytes.
    pub fn read_raw(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        self.ensure(n)?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    /// Length or count prefix.
    ///
    /// Rejects negative values and values that could not fit in the rest of
    /// the buffer given `min_item_len` bytes per item, so callers may size
    /// allocations from the result.
    pub fn read_len(&mut self, min_item_len: usize) -> Result<usize, WireError> {
        let raw = self.read_i32()?;
        if raw < 0 {
            return Err(WireError::InvalidLength(raw as i64));
        }
        let len = raw as usize;
        if len.saturating_mul(min_item_len.max(1)) > self.remaining() {
            return Err(WireError::InvalidLength(raw as i64));
        }
        Ok(len)
    }

    /// Length-prefixed UTF-8.
    pub fn read_string(&mut self) -> Result<String, WireError> {
        let len = self.read_len(1)?;
        let bytes = self.read_raw(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| WireError::InvalidUtf8)
    }

    pub fn read_uuid(&mut self) -> Result<Uuid, WireError> {
        let bytes = self.read_raw(16)?;
        let mut id = [0u8; 16];
        id.copy_from_slice(bytes);
        Ok(Uuid::from_bytes(id))
    }

    pub fn read_vec2(&mut self) -> Result<Vec2, WireError> {
        Ok(Vec2::new(self.read_f32()?, self.read_f32()?))
    }

    pub fn read_bounds(&mut self) -> Result<Bounds, WireError> {
        Ok(Bounds::new(self.read_vec2()?, self.read_vec2()?))
    }

    /// Tag byte then value.
    pub fn read_value(&mut self) -> Result<PropertyValue, WireError> {
        let tag = self.read_u8()?;
        Ok(match tag {
            0 => PropertyValue::Null,
            1 => PropertyValue::Int(self.read_i32()?),
            2 => PropertyValue::Float(self.read_f32()?),
            3 => PropertyValue::Double(self.read_f64()?),
            4 => PropertyValue::Long(self.read_i64()?),
            5 => PropertyValue::Short(self.read_i16()?),
            6 => PropertyValue::String(self.read_string()?),
            7 => PropertyValue::Bool(self.read_bool()?),
            8 => PropertyValue::Byte(self.read_u8()?),
            other => return Err(WireError::UnknownValueTag(other)),
        })
    }

    /// Tagged map. Duplicate keys keep the last value.
    pub fn read_property_map(&mut self) -> Result<PropertyMap, WireError> {
        let count = self.read_len(MIN_PROPERTY_ENTRY_LEN)?;
        let mut map = PropertyMap::new();
        for _ in 0..count {
            let key = self.read_string()?;
            let value = self.read_value()?;
            map.insert(key, value);
        }
        Ok(map)
    }

    pub fn read_object_record(&mut self) -> Result<ObjectRecord, WireError> {
        self.ensure(OBJECT_RECORD_FIXED_LEN)?;
        Ok(ObjectRecord {
            id: self.read_uuid()?,
            health: self.read_f32()?,
            bounds: self.read_bounds()?,
            velocity: self.read_vec2()?,
            rotation: self.read_f32()?,
            scale: self.read_vec2()?,
            is_static: self.read_bool()?,
            mass: self.read_f32()?,
            properties: self.read_property_map()?,
        })
    }

    pub fn read_object_array(&mut self) -> Result<Vec<ObjectRecord>, WireError> {
        let count = self.read_len(OBJECT_RECORD_FIXED_LEN + 4)?;
        let mut records = Vec::with_capacity(count);
        for _ in 0..count {
            records.push(self.read_object_record()?);
        }
        Ok(records)
    }
}

// =============================================================================
// CONVENIENCE
// =============================================================================

/// Encode one object record.
pub fn encode_object(record: &ObjectRecord) -> Bytes {
    let mut w = BinaryWriter::with_capacity(OBJECT_RECORD_FIXED_LEN + 64);
    w.write_object_record(record);
    w.into_bytes()
}

/// Decode exactly one object record.
pub fn decode_object(buf: &[u8]) -> Result<ObjectRecord, WireError> {
    let mut r = BinaryReader::new(buf);
    let record = r.read_object_record()?;
    r.finish()?;
    Ok(record)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_record() -> ObjectRecord {
        let mut properties = PropertyMap::new();
        properties.insert("type".into(), "Tank".into());
        properties.insert("ammo".into(), PropertyValue::Int(7));
        ObjectRecord {
            id: Uuid::from_bytes([0xAB; 16]),
            health: 90.0,
            bounds: Bounds::from_xywh(1.0, 2.0, 64.0, 64.0),
            velocity: Vec2::new(-3.5, 0.25),
            rotation: 90.0,
            scale: Vec2::ONE,
            is_static: false,
            mass: 10.0,
            properties,
        }
    }

    #[test]
    fn test_record_layout_big_endian() {
        let bytes = encode_object(&sample_record());
        assert_eq!(&bytes[..16], &[0xAB; 16]);
        // health 90.0f32 big-endian
        assert_eq!(&bytes[16..20], &90.0f32.to_be_bytes());
        // bounds.pos.x
        assert_eq!(&bytes[20..24], &1.0f32.to_be_bytes());
        // is_static byte sits right after scale
        assert_eq!(bytes[16 + 4 + 16 + 8 + 4 + 8], 0);
        // property count
        let count_at = OBJECT_RECORD_FIXED_LEN;
        assert_eq!(&bytes[count_at..count_at + 4], &2i32.to_be_bytes());
    }

    #[test]
    fn test_value_tags() {
        let values = [
            PropertyValue::Null,
            PropertyValue::Int(-5),
            PropertyValue::Float(1.5),
            PropertyValue::Double(-2.25),
            PropertyValue::Long(1 << 40),
            PropertyValue::Short(-300),
            PropertyValue::String("héllo".into()),
            PropertyValue::Bool(true),
            PropertyValue::Byte(255),
        ];
        for (i, value) in values.iter().enumerate() {
            let mut w = BinaryWriter::new();
            w.write_value(value);
            let bytes = w.into_bytes();
            assert_eq!(bytes[0] as usize, i);
            let mut r = BinaryReader::new(&bytes);
            assert_eq!(&r.read_value().unwrap(), value);
            r.finish().unwrap();
        }
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let mut r = BinaryReader::new(&[9, 0, 0, 0, 0]);
        assert_eq!(r.read_value(), Err(WireError::UnknownValueTag(9)));
    }

    #[test]
    fn test_truncated_record_rejected() {
        let bytes = encode_object(&sample_record());
        for cut in [0, 10, OBJECT_RECORD_FIXED_LEN, bytes.len() - 1] {
            assert!(decode_object(&bytes[..cut]).is_err(), "cut at {}", cut);
        }
    }

    #[test]
    fn test_negative_and_huge_counts_rejected() {
        let mut w = BinaryWriter::new();
        w.write_i32(-1);
        let bytes = w.into_bytes();
        assert_eq!(
            BinaryReader::new(&bytes).read_property_map(),
            Err(WireError::InvalidLength(-1))
        );

        let mut w = BinaryWriter::new();
        w.write_i32(1_000_000);
        w.write_raw(&[0; 20]);
        let bytes = w.into_bytes();
        assert_eq!(
            BinaryReader::new(&bytes).read_object_array(),
            Err(WireError::InvalidLength(1_000_000))
        );
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let mut w = BinaryWriter::new();
        w.write_len(2);
        w.write_raw(&[0xC3, 0x28]);
        let bytes = w.into_bytes();
        assert_eq!(BinaryReader::new(&bytes).read_string(), Err(WireError::InvalidUtf8));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = encode_object(&sample_record()).to_vec();
        bytes.push(0);
        assert_eq!(decode_object(&bytes), Err(WireError::TrailingBytes(1)));
    }

    fn arb_value() -> impl Strategy<Value = PropertyValue> {
        prop_oneof![
            Just(PropertyValue::Null),
            any::<i32>().prop_map(PropertyValue::Int),
            (-1e6f32..1e6).prop_map(PropertyValue::Float),
            (-1e12f64..1e12).prop_map(PropertyValue::Double),
            any::<i64>().prop_map(PropertyValue::Long),
            any::<i16>().prop_map(PropertyValue::Short),
            "[a-z0-9 ]{0,12}".prop_map(PropertyValue::String),
            any::<bool>().prop_map(PropertyValue::Bool),
            any::<u8>().prop_map(PropertyValue::Byte),
        ]
    }

    fn arb_record() -> impl Strategy<Value = ObjectRecord> {
        (
            any::<[u8; 16]>(),
            -1e4f32..1e4,
            prop::array::uniform4(-1e5f32..1e5),
            prop::array::uniform2(-1e3f32..1e3),
            -360f32..360.0,
            prop::array::uniform2(0f32..10.0),
            any::<bool>(),
            0f32..1e3,
            prop::collection::btree_map("[a-z_]{0,8}", arb_value(), 0..6),
        )
            .prop_map(|(id, health, b, v, rotation, s, is_static, mass, properties)| ObjectRecord {
                id: Uuid::from_bytes(id),
                health,
                bounds: Bounds::from_xywh(b[0], b[1], b[2].abs(), b[3].abs()),
                velocity: Vec2::new(v[0], v[1]),
                rotation,
                scale: Vec2::new(s[0], s[1]),
                is_static,
                mass,
                properties,
            })
    }

    proptest! {
        #[test]
        fn prop_object_record_round_trip(record in arb_record()) {
            let bytes = encode_object(&record);
            prop_assert_eq!(decode_object(&bytes)?, record);
        }

        #[test]
        fn prop_object_array_round_trip(records in prop::collection::vec(arb_record(), 0..4)) {
            let mut w = BinaryWriter::new();
            w.write_object_array(&records);
            let bytes = w.into_bytes();
            let mut r = BinaryReader::new(&bytes);
            prop_assert_eq!(r.read_object_array()?, records);
            prop_assert!(r.finish().is_ok());
        }
    }
}
