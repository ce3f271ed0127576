//! Tagged Property Values
//!
//! Closed set of value kinds carried in custom-property and world-state maps.
//! The same enum is the in-memory form and the wire form (see `network::codec`).

use std::collections::BTreeMap;
use std::fmt;
use serde::{Serialize, Deserialize};

/// Custom-property map. BTreeMap keeps encode order stable.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// One heterogeneous property value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// No value
    Null,
    /// 32-bit signed integer
    Int(i32),
    /// 32-bit float
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// 64-bit signed integer
    Long(i64),
    /// 16-bit signed integer
    Short(i16),
    /// UTF-8 string
    String(String),
    /// Boolean
    Bool(bool),
    /// Unsigned byte
    Byte(u8),
}

impl PropertyValue {
    /// Wire tag for this value kind.
    pub const fn tag(&self) -> u8 {
        match self {
            PropertyValue::Null => 0,
            PropertyValue::Int(_) => 1,
            PropertyValue::Float(_) => 2,
            PropertyValue::Double(_) => 3,
            PropertyValue::Long(_) => 4,
            PropertyValue::Short(_) => 5,
            PropertyValue::String(_) => 6,
            PropertyValue::Bool(_) => 7,
            PropertyValue::Byte(_) => 8,
        }
    }

    /// Numeric view as f64, for integer and float kinds.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            PropertyValue::Int(v) => Some(v as f64),
            PropertyValue::Float(v) => Some(v as f64),
            PropertyValue::Double(v) => Some(v),
            PropertyValue::Long(v) => Some(v as f64),
            PropertyValue::Short(v) => Some(v as f64),
            PropertyValue::Byte(v) => Some(v as f64),
            _ => None,
        }
    }

    /// Integer view, for integer kinds only.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            PropertyValue::Int(v) => Some(v as i64),
            PropertyValue::Long(v) => Some(v),
            PropertyValue::Short(v) => Some(v as i64),
            PropertyValue::Byte(v) => Some(v as i64),
            _ => None,
        }
    }

    /// String view.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Null => write!(f, "null"),
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::Float(v) => write!(f, "{}", v),
            PropertyValue::Double(v) => write!(f, "{}", v),
            PropertyValue::Long(v) => write!(f, "{}", v),
            PropertyValue::Short(v) => write!(f, "{}", v),
            PropertyValue::String(v) => write!(f, "{:?}", v),
            PropertyValue::Bool(v) => write!(f, "{}", v),
            PropertyValue::Byte(v) => write!(f, "{}", v),
        }
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<f32> for PropertyValue {
    fn from(v: f32) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}
