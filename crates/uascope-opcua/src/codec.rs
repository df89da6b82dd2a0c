// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Value codec: converts textual input into the typed value a target
//! node's declared data type requires.
//!
//! The codec is deliberately permissive: input that does not parse as the
//! declared type passes through unchanged as a string value. Malformed
//! writes are then rejected by the server at the protocol layer rather
//! than pre-validated here. See [`encode`].

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::UaDataType;

// ============================================================================
// Typed values
// ============================================================================

/// A typed OPC UA value as carried through read, write, and notification
/// paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UaValue {
    /// Boolean value.
    Boolean(bool),
    /// Signed 8-bit integer.
    SByte(i8),
    /// Unsigned 8-bit integer.
    Byte(u8),
    /// Signed 16-bit integer.
    Int16(i16),
    /// Unsigned 16-bit integer.
    UInt16(u16),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Unsigned 32-bit integer.
    UInt32(u32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Unsigned 64-bit integer.
    UInt64(u64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// UTF-8 string.
    String(String),
    /// Calendar timestamp.
    DateTime(DateTime<Utc>),
    /// Absent value (bad-status reads).
    Null,
}

impl UaValue {
    /// The built-in data type of this value, if it has one.
    pub fn data_type(&self) -> Option<UaDataType> {
        match self {
            Self::Boolean(_) => Some(UaDataType::Boolean),
            Self::SByte(_) => Some(UaDataType::SByte),
            Self::Byte(_) => Some(UaDataType::Byte),
            Self::Int16(_) => Some(UaDataType::Int16),
            Self::UInt16(_) => Some(UaDataType::UInt16),
            Self::Int32(_) => Some(UaDataType::Int32),
            Self::UInt32(_) => Some(UaDataType::UInt32),
            Self::Int64(_) => Some(UaDataType::Int64),
            Self::UInt64(_) => Some(UaDataType::UInt64),
            Self::Float(_) => Some(UaDataType::Float),
            Self::Double(_) => Some(UaDataType::Double),
            Self::String(_) => Some(UaDataType::String),
            Self::DateTime(_) => Some(UaDataType::DateTime),
            Self::Null => None,
        }
    }

    /// Returns the value as a bool if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value widened to i64 if it is any signed or small
    /// unsigned integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::SByte(v) => Some(i64::from(*v)),
            Self::Byte(v) => Some(i64::from(*v)),
            Self::Int16(v) => Some(i64::from(*v)),
            Self::UInt16(v) => Some(i64::from(*v)),
            Self::Int32(v) => Some(i64::from(*v)),
            Self::UInt32(v) => Some(i64::from(*v)),
            Self::Int64(v) => Some(*v),
            Self::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Returns the value widened to f64 if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(f64::from(*v)),
            Self::Double(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Returns the value as a string slice if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns `true` for [`UaValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for UaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{v}"),
            Self::SByte(v) => write!(f, "{v}"),
            Self::Byte(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
            Self::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Null => write!(f, "null"),
        }
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Encodes textual input as the typed value matching `data_type`.
///
/// Parse rules: booleans accept `true`/`false` (case-insensitive), integer
/// and float widths use standard decimal parsing, strings pass through
/// unchanged, and timestamps accept RFC 3339 or `YYYY-MM-DD HH:MM:SS`.
///
/// Input that fails its parse rule falls back to `UaValue::String(raw)`
/// instead of erroring. The server rejects the mistyped write; this layer
/// never blocks it. Intentional behavior, relied on by callers that let
/// the server be the authority on value validity.
pub fn encode(text: &str, data_type: UaDataType) -> UaValue {
    let trimmed = text.trim();
    let fallback = || UaValue::String(text.to_string());

    match data_type {
        UaDataType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" => UaValue::Boolean(true),
            "false" => UaValue::Boolean(false),
            _ => fallback(),
        },
        UaDataType::SByte => trimmed.parse().map(UaValue::SByte).unwrap_or_else(|_| fallback()),
        UaDataType::Byte => trimmed.parse().map(UaValue::Byte).unwrap_or_else(|_| fallback()),
        UaDataType::Int16 => trimmed.parse().map(UaValue::Int16).unwrap_or_else(|_| fallback()),
        UaDataType::UInt16 => trimmed.parse().map(UaValue::UInt16).unwrap_or_else(|_| fallback()),
        UaDataType::Int32 => trimmed.parse().map(UaValue::Int32).unwrap_or_else(|_| fallback()),
        UaDataType::UInt32 => trimmed.parse().map(UaValue::UInt32).unwrap_or_else(|_| fallback()),
        UaDataType::Int64 => trimmed.parse().map(UaValue::Int64).unwrap_or_else(|_| fallback()),
        UaDataType::UInt64 => trimmed.parse().map(UaValue::UInt64).unwrap_or_else(|_| fallback()),
        UaDataType::Float => trimmed.parse().map(UaValue::Float).unwrap_or_else(|_| fallback()),
        UaDataType::Double => trimmed.parse().map(UaValue::Double).unwrap_or_else(|_| fallback()),
        UaDataType::String => UaValue::String(text.to_string()),
        UaDataType::DateTime => parse_datetime(trimmed).map(UaValue::DateTime).unwrap_or_else(fallback),
    }
}

/// Accepts RFC 3339 first, then the space-separated calendar form.
fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
