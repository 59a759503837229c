//! Typed property values and the wire decoder
//!
//! The device registry describes every property with a 32-bit type tag and
//! a raw byte buffer. [`PropertyType`] is the closed set of tags this crate
//! understands; anything else is rejected with
//! [`DecodeError::UnsupportedType`] rather than being passed through as raw
//! bytes. [`decode`] turns a (tag, buffer) pair into a [`PropertyValue`].
//!
//! # Buffer sizes
//!
//! The probe call reports how many bytes a value needs. Scalars always use
//! their natural width, strings are rounded to whole UTF-16 code units and
//! blobs use exactly the reported size. See [`PropertyType::fetch_len`].

use super::key::{Guid, PropertyKey};
use super::security::{AccessDescriptor, SecurityDescriptor};
use crate::core::error::DecodeError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Ticks between 1601-01-01 and 1970-01-01, in 100ns units
const FILETIME_UNIX_EPOCH: i128 = 116_444_736_000_000_000;
const FILETIME_TICKS_PER_SECOND: i128 = 10_000_000;

const TYPEMOD_ARRAY: u32 = 0x1000;
const TYPEMOD_LIST: u32 = 0x2000;

/// Wire type tag of a device property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PropertyType {
    Null,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    /// 16-byte decimal, surfaced as an identifier
    Decimal,
    Guid,
    /// Fixed-point currency, surfaced as its raw 64-bit integer
    Currency,
    /// OLE automation date, surfaced as its raw double
    Date,
    FileTime,
    Boolean,
    String,
    SecurityDescriptor,
    SecurityDescriptorString,
    PropertyKey,
    TypeTag,
    Error,
    NtStatus,
    StringIndirect,
    StringList,
    Binary,
}

impl PropertyType {
    /// Every supported tag, in wire order
    pub const ALL: [PropertyType; 27] = [
        PropertyType::Null,
        PropertyType::SByte,
        PropertyType::Byte,
        PropertyType::Int16,
        PropertyType::UInt16,
        PropertyType::Int32,
        PropertyType::UInt32,
        PropertyType::Int64,
        PropertyType::UInt64,
        PropertyType::Float,
        PropertyType::Double,
        PropertyType::Decimal,
        PropertyType::Guid,
        PropertyType::Currency,
        PropertyType::Date,
        PropertyType::FileTime,
        PropertyType::Boolean,
        PropertyType::String,
        PropertyType::SecurityDescriptor,
        PropertyType::SecurityDescriptorString,
        PropertyType::PropertyKey,
        PropertyType::TypeTag,
        PropertyType::Error,
        PropertyType::NtStatus,
        PropertyType::StringIndirect,
        PropertyType::StringList,
        PropertyType::Binary,
    ];

    /// Map a raw wire tag onto a known type
    ///
    /// `EMPTY` (0) and every tag outside the documented set are unsupported.
    pub fn from_raw(raw: u32) -> Result<Self, DecodeError> {
        let ty = match raw {
            0x01 => PropertyType::Null,
            0x02 => PropertyType::SByte,
            0x03 => PropertyType::Byte,
            0x04 => PropertyType::Int16,
            0x05 => PropertyType::UInt16,
            0x06 => PropertyType::Int32,
            0x07 => PropertyType::UInt32,
            0x08 => PropertyType::Int64,
            0x09 => PropertyType::UInt64,
            0x0A => PropertyType::Float,
            0x0B => PropertyType::Double,
            0x0C => PropertyType::Decimal,
            0x0D => PropertyType::Guid,
            0x0E => PropertyType::Currency,
            0x0F => PropertyType::Date,
            0x10 => PropertyType::FileTime,
            0x11 => PropertyType::Boolean,
            0x12 => PropertyType::String,
            0x13 => PropertyType::SecurityDescriptor,
            0x14 => PropertyType::SecurityDescriptorString,
            0x15 => PropertyType::PropertyKey,
            0x16 => PropertyType::TypeTag,
            0x17 => PropertyType::Error,
            0x18 => PropertyType::NtStatus,
            0x19 => PropertyType::StringIndirect,
            r if r == TYPEMOD_LIST | 0x12 => PropertyType::StringList,
            r if r == TYPEMOD_ARRAY | 0x03 => PropertyType::Binary,
            other => return Err(DecodeError::UnsupportedType(other)),
        };
        Ok(ty)
    }

    /// Raw wire tag
    pub fn as_raw(&self) -> u32 {
        match self {
            PropertyType::Null => 0x01,
            PropertyType::SByte => 0x02,
            PropertyType::Byte => 0x03,
            PropertyType::Int16 => 0x04,
            PropertyType::UInt16 => 0x05,
            PropertyType::Int32 => 0x06,
            PropertyType::UInt32 => 0x07,
            PropertyType::Int64 => 0x08,
            PropertyType::UInt64 => 0x09,
            PropertyType::Float => 0x0A,
            PropertyType::Double => 0x0B,
            PropertyType::Decimal => 0x0C,
            PropertyType::Guid => 0x0D,
            PropertyType::Currency => 0x0E,
            PropertyType::Date => 0x0F,
            PropertyType::FileTime => 0x10,
            PropertyType::Boolean => 0x11,
            PropertyType::String => 0x12,
            PropertyType::SecurityDescriptor => 0x13,
            PropertyType::SecurityDescriptorString => 0x14,
            PropertyType::PropertyKey => 0x15,
            PropertyType::TypeTag => 0x16,
            PropertyType::Error => 0x17,
            PropertyType::NtStatus => 0x18,
            PropertyType::StringIndirect => 0x19,
            PropertyType::StringList => TYPEMOD_LIST | 0x12,
            PropertyType::Binary => TYPEMOD_ARRAY | 0x03,
        }
    }

    /// Display name of the tag
    pub fn name(&self) -> &'static str {
        match self {
            PropertyType::Null => "NULL",
            PropertyType::SByte => "SBYTE",
            PropertyType::Byte => "BYTE",
            PropertyType::Int16 => "INT16",
            PropertyType::UInt16 => "UINT16",
            PropertyType::Int32 => "INT32",
            PropertyType::UInt32 => "UINT32",
            PropertyType::Int64 => "INT64",
            PropertyType::UInt64 => "UINT64",
            PropertyType::Float => "FLOAT",
            PropertyType::Double => "DOUBLE",
            PropertyType::Decimal => "DECIMAL",
            PropertyType::Guid => "GUID",
            PropertyType::Currency => "CURRENCY",
            PropertyType::Date => "DATE",
            PropertyType::FileTime => "FILETIME",
            PropertyType::Boolean => "BOOLEAN",
            PropertyType::String => "STRING",
            PropertyType::SecurityDescriptor => "SECURITY_DESCRIPTOR",
            PropertyType::SecurityDescriptorString => "SECURITY_DESCRIPTOR_STRING",
            PropertyType::PropertyKey => "DEVPROPKEY",
            PropertyType::TypeTag => "DEVPROPTYPE",
            PropertyType::Error => "ERROR",
            PropertyType::NtStatus => "NTSTATUS",
            PropertyType::StringIndirect => "STRING_INDIRECT",
            PropertyType::StringList => "STRING_LIST",
            PropertyType::Binary => "BINARY",
        }
    }

    /// Natural width of fixed-size types
    pub fn fixed_width(&self) -> Option<usize> {
        let width = match self {
            PropertyType::SByte | PropertyType::Byte => 1,
            PropertyType::Int16 | PropertyType::UInt16 => 2,
            PropertyType::Int32
            | PropertyType::UInt32
            | PropertyType::Float
            | PropertyType::Boolean
            | PropertyType::TypeTag
            | PropertyType::Error
            | PropertyType::NtStatus => 4,
            PropertyType::Int64
            | PropertyType::UInt64
            | PropertyType::Double
            | PropertyType::Currency
            | PropertyType::Date
            | PropertyType::FileTime => 8,
            PropertyType::Decimal | PropertyType::Guid => Guid::SIZE,
            PropertyType::PropertyKey => PropertyKey::SIZE,
            _ => return None,
        };
        Some(width)
    }

    /// Bytes to allocate for the fetch call, given the probed size
    ///
    /// `None` means the value is carried by the tag alone and no fetch call
    /// is issued. `Some(0)` means an empty value: nothing to fetch either.
    pub fn fetch_len(&self, probed_size: u32) -> Option<usize> {
        if let Some(width) = self.fixed_width() {
            return Some(width);
        }
        let size = probed_size as usize;
        match self {
            PropertyType::Null => None,
            PropertyType::String
            | PropertyType::SecurityDescriptorString
            | PropertyType::StringIndirect
            | PropertyType::StringList => {
                if size == 0 {
                    Some(0)
                } else {
                    // whole UTF-16 units, room for the terminator
                    Some(((size - 1) / 2 + 1) * 2)
                }
            }
            _ => Some(size),
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded device property
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Guid(Guid),
    Key(PropertyKey),
    Timestamp(DateTime<Utc>),
    String(String),
    StringList(Vec<String>),
    Blob(Vec<u8>),
    Security(AccessDescriptor),
    /// A property whose value is itself a wire type tag
    TypeTag(u32),
}

impl PropertyValue {
    /// Short label of the populated arm
    pub fn kind(&self) -> &'static str {
        match self {
            PropertyValue::Null => "null",
            PropertyValue::Bool(_) => "bool",
            PropertyValue::I8(_) => "i8",
            PropertyValue::U8(_) => "u8",
            PropertyValue::I16(_) => "i16",
            PropertyValue::U16(_) => "u16",
            PropertyValue::I32(_) => "i32",
            PropertyValue::U32(_) => "u32",
            PropertyValue::I64(_) => "i64",
            PropertyValue::U64(_) => "u64",
            PropertyValue::F32(_) => "f32",
            PropertyValue::F64(_) => "f64",
            PropertyValue::Guid(_) => "guid",
            PropertyValue::Key(_) => "key",
            PropertyValue::Timestamp(_) => "timestamp",
            PropertyValue::String(_) => "string",
            PropertyValue::StringList(_) => "string list",
            PropertyValue::Blob(_) => "blob",
            PropertyValue::Security(_) => "security",
            PropertyValue::TypeTag(_) => "type",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// True for values that carry nothing worth printing
    pub fn is_empty(&self) -> bool {
        match self {
            PropertyValue::Null => true,
            PropertyValue::String(s) => s.is_empty(),
            PropertyValue::StringList(list) => list.is_empty(),
            PropertyValue::Blob(bytes) => bytes.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Null => write!(f, "<null>"),
            PropertyValue::Bool(v) => write!(f, "{}", v),
            PropertyValue::I8(v) => write!(f, "{}", v),
            PropertyValue::U8(v) => write!(f, "{}", v),
            PropertyValue::I16(v) => write!(f, "{}", v),
            PropertyValue::U16(v) => write!(f, "0x{:04X}", v),
            PropertyValue::I32(v) => write!(f, "{}", v),
            PropertyValue::U32(v) => write!(f, "{}", v),
            PropertyValue::I64(v) => write!(f, "{}", v),
            PropertyValue::U64(v) => write!(f, "{}", v),
            PropertyValue::F32(v) => write!(f, "{}", v),
            PropertyValue::F64(v) => write!(f, "{}", v),
            PropertyValue::Guid(v) => write!(f, "{}", v),
            PropertyValue::Key(v) => write!(f, "{}", v),
            PropertyValue::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S UTC")),
            PropertyValue::String(v) => write!(f, "{}", v),
            PropertyValue::StringList(v) => write!(f, "[{}]", v.join(", ")),
            PropertyValue::Blob(v) => {
                for (i, b) in v.iter().take(32).enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{:02X}", b)?;
                }
                if v.len() > 32 {
                    write!(f, " ... ({} bytes)", v.len())?;
                }
                Ok(())
            }
            PropertyValue::Security(v) => write!(f, "{}", v),
            PropertyValue::TypeTag(raw) => match PropertyType::from_raw(*raw) {
                Ok(ty) => write!(f, "{}", ty),
                Err(_) => write!(f, "0x{:08X}", raw),
            },
        }
    }
}

/// Decode a fetched buffer according to its wire type
pub fn decode(ty: PropertyType, buf: &[u8]) -> Result<PropertyValue, DecodeError> {
    let value = match ty {
        PropertyType::Null => PropertyValue::Null,
        PropertyType::SByte => PropertyValue::I8(i8::from_le_bytes(fixed(buf)?)),
        PropertyType::Byte => PropertyValue::U8(u8::from_le_bytes(fixed(buf)?)),
        PropertyType::Int16 => PropertyValue::I16(i16::from_le_bytes(fixed(buf)?)),
        PropertyType::UInt16 => PropertyValue::U16(u16::from_le_bytes(fixed(buf)?)),
        PropertyType::Int32 => PropertyValue::I32(i32::from_le_bytes(fixed(buf)?)),
        PropertyType::UInt32 => PropertyValue::U32(u32::from_le_bytes(fixed(buf)?)),
        PropertyType::Int64 => PropertyValue::I64(i64::from_le_bytes(fixed(buf)?)),
        PropertyType::UInt64 => PropertyValue::U64(u64::from_le_bytes(fixed(buf)?)),
        PropertyType::Float => PropertyValue::F32(f32::from_le_bytes(fixed(buf)?)),
        PropertyType::Double => PropertyValue::F64(f64::from_le_bytes(fixed(buf)?)),
        PropertyType::Decimal | PropertyType::Guid => {
            PropertyValue::Guid(Guid::from_bytes_le(fixed(buf)?))
        }
        PropertyType::Currency => PropertyValue::I64(i64::from_le_bytes(fixed(buf)?)),
        PropertyType::Date => PropertyValue::F64(f64::from_le_bytes(fixed(buf)?)),
        PropertyType::FileTime => {
            PropertyValue::Timestamp(filetime_to_utc(u64::from_le_bytes(fixed(buf)?))?)
        }
        PropertyType::Boolean => {
            fixed::<1>(buf)?;
            // DEVPROP_TRUE is 0xFF; accept any non-zero byte
            PropertyValue::Bool(buf.iter().any(|b| *b != 0))
        }
        PropertyType::String | PropertyType::StringIndirect => {
            PropertyValue::String(utf16_until_nul(buf))
        }
        PropertyType::SecurityDescriptorString => {
            PropertyValue::Security(AccessDescriptor::Sddl(utf16_until_nul(buf)))
        }
        PropertyType::StringList => PropertyValue::StringList(utf16_list(buf)),
        PropertyType::SecurityDescriptor => PropertyValue::Security(AccessDescriptor::Binary(
            SecurityDescriptor::parse(buf)?,
        )),
        PropertyType::PropertyKey => {
            let raw: [u8; PropertyKey::SIZE] = fixed(buf)?;
            PropertyValue::Key(PropertyKey::from_bytes(&raw).ok_or(DecodeError::Truncated {
                expected: PropertyKey::SIZE,
                actual: buf.len(),
            })?)
        }
        PropertyType::TypeTag => PropertyValue::TypeTag(u32::from_le_bytes(fixed(buf)?)),
        PropertyType::Error | PropertyType::NtStatus => {
            PropertyValue::I32(i32::from_le_bytes(fixed(buf)?))
        }
        PropertyType::Binary => PropertyValue::Blob(buf.to_vec()),
    };
    Ok(value)
}

/// Convert a FILETIME tick count (100ns units since 1601) to UTC
pub fn filetime_to_utc(ticks: u64) -> Result<DateTime<Utc>, DecodeError> {
    let since_unix = ticks as i128 - FILETIME_UNIX_EPOCH;
    let secs = since_unix.div_euclid(FILETIME_TICKS_PER_SECOND);
    let nanos = since_unix.rem_euclid(FILETIME_TICKS_PER_SECOND) * 100;
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, nanos as u32))
        .ok_or(DecodeError::InvalidTimestamp(ticks as i64))
}

/// Inverse of [`filetime_to_utc`]
pub fn utc_to_filetime(time: DateTime<Utc>) -> u64 {
    let ticks = time.timestamp() as i128 * FILETIME_TICKS_PER_SECOND
        + (time.timestamp_subsec_nanos() / 100) as i128
        + FILETIME_UNIX_EPOCH;
    ticks.clamp(0, u64::MAX as i128) as u64
}

fn fixed<const N: usize>(buf: &[u8]) -> Result<[u8; N], DecodeError> {
    buf.get(..N)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(DecodeError::Truncated {
            expected: N,
            actual: buf.len(),
        })
}

fn utf16_units(buf: &[u8]) -> impl Iterator<Item = u16> + '_ {
    buf.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]]))
}

/// Decode UTF-16LE text, stopping at the first NUL unit
pub(crate) fn utf16_until_nul(buf: &[u8]) -> String {
    let units: Vec<u16> = utf16_units(buf).take_while(|u| *u != 0).collect();
    String::from_utf16_lossy(&units)
}

/// Decode a NUL-separated, double-NUL-terminated UTF-16LE list
pub(crate) fn utf16_list(buf: &[u8]) -> Vec<String> {
    let units: Vec<u16> = utf16_units(buf).collect();
    units
        .split(|u| *u == 0)
        .filter(|part| !part.is_empty())
        .map(String::from_utf16_lossy)
        .collect()
}

/// Encode text as UTF-16LE with a terminating NUL
pub fn encode_utf16(text: &str) -> Vec<u8> {
    text.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(|u| u.to_le_bytes())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::key::keys;
    use crate::device::security::tests::sample_descriptor;
    use chrono::TimeZone;

    #[test]
    fn test_raw_tags_round_trip() {
        for ty in PropertyType::ALL {
            assert_eq!(PropertyType::from_raw(ty.as_raw()), Ok(ty));
        }
        assert_eq!(PropertyType::StringList.as_raw(), 0x2012);
        assert_eq!(PropertyType::Binary.as_raw(), 0x1003);
    }

    #[test]
    fn test_unknown_tags_are_rejected() {
        for raw in [0x00, 0x1A, 0x20, 0x1012, 0x2003, 0xFFFF_FFFF] {
            assert_eq!(
                PropertyType::from_raw(raw),
                Err(DecodeError::UnsupportedType(raw))
            );
        }
    }

    #[test]
    fn test_every_tag_decodes_its_exact_size() {
        let guid = Guid::from_u128(0x4d1e55b2_f16f_11cf_88cb_001111000030);
        let when = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();

        let cases: Vec<(PropertyType, Vec<u8>, PropertyValue)> = vec![
            (PropertyType::SByte, vec![0xFE], PropertyValue::I8(-2)),
            (PropertyType::Byte, vec![0xFE], PropertyValue::U8(254)),
            (PropertyType::Int16, (-300i16).to_le_bytes().to_vec(), PropertyValue::I16(-300)),
            (PropertyType::UInt16, 0x046Du16.to_le_bytes().to_vec(), PropertyValue::U16(0x046D)),
            (PropertyType::Int32, (-7i32).to_le_bytes().to_vec(), PropertyValue::I32(-7)),
            (PropertyType::UInt32, 7u32.to_le_bytes().to_vec(), PropertyValue::U32(7)),
            (PropertyType::Int64, (-9i64).to_le_bytes().to_vec(), PropertyValue::I64(-9)),
            (PropertyType::UInt64, 9u64.to_le_bytes().to_vec(), PropertyValue::U64(9)),
            (PropertyType::Float, 1.5f32.to_le_bytes().to_vec(), PropertyValue::F32(1.5)),
            (PropertyType::Double, 2.25f64.to_le_bytes().to_vec(), PropertyValue::F64(2.25)),
            (PropertyType::Decimal, guid.to_bytes_le().to_vec(), PropertyValue::Guid(guid)),
            (PropertyType::Guid, guid.to_bytes_le().to_vec(), PropertyValue::Guid(guid)),
            (PropertyType::Currency, 15000i64.to_le_bytes().to_vec(), PropertyValue::I64(15000)),
            (PropertyType::Date, 45000.5f64.to_le_bytes().to_vec(), PropertyValue::F64(45000.5)),
            (
                PropertyType::FileTime,
                utc_to_filetime(when).to_le_bytes().to_vec(),
                PropertyValue::Timestamp(when),
            ),
            (PropertyType::Boolean, vec![0xFF, 0, 0, 0], PropertyValue::Bool(true)),
            (PropertyType::Boolean, vec![0, 0, 0, 0], PropertyValue::Bool(false)),
            (
                PropertyType::String,
                encode_utf16("USB Input Device"),
                PropertyValue::String("USB Input Device".into()),
            ),
            (
                PropertyType::StringIndirect,
                encode_utf16("@input.inf,%hid%"),
                PropertyValue::String("@input.inf,%hid%".into()),
            ),
            (
                PropertyType::SecurityDescriptorString,
                encode_utf16("D:P(A;;GA;;;SY)"),
                PropertyValue::Security(AccessDescriptor::Sddl("D:P(A;;GA;;;SY)".into())),
            ),
            (
                PropertyType::PropertyKey,
                keys::NAME.to_bytes().to_vec(),
                PropertyValue::Key(keys::NAME),
            ),
            (
                PropertyType::TypeTag,
                0x2012u32.to_le_bytes().to_vec(),
                PropertyValue::TypeTag(0x2012),
            ),
            (PropertyType::Error, 5i32.to_le_bytes().to_vec(), PropertyValue::I32(5)),
            (
                PropertyType::NtStatus,
                (-1073741823i32).to_le_bytes().to_vec(),
                PropertyValue::I32(-1073741823),
            ),
            (PropertyType::Binary, vec![1, 2, 3], PropertyValue::Blob(vec![1, 2, 3])),
        ];

        for (ty, bytes, expected) in cases {
            let len = ty.fetch_len(bytes.len() as u32).unwrap();
            assert!(len >= bytes.len(), "{} allocates too little", ty);
            let mut buf = vec![0u8; len];
            buf[..bytes.len()].copy_from_slice(&bytes);
            assert_eq!(decode(ty, &buf), Ok(expected), "decoding {}", ty);
        }
    }

    #[test]
    fn test_null_needs_no_fetch() {
        assert_eq!(PropertyType::Null.fetch_len(0), None);
        assert_eq!(decode(PropertyType::Null, &[]), Ok(PropertyValue::Null));
    }

    #[test]
    fn test_string_list_splits_and_discards_empties() {
        let buf: Vec<u8> = "A\0B\0\0"
            .encode_utf16()
            .flat_map(|u| u.to_le_bytes())
            .collect();
        assert_eq!(
            decode(PropertyType::StringList, &buf),
            Ok(PropertyValue::StringList(vec!["A".into(), "B".into()]))
        );
        assert_eq!(
            decode(PropertyType::StringList, &[0u8; 8]),
            Ok(PropertyValue::StringList(vec![]))
        );
        assert_eq!(
            decode(PropertyType::StringList, &[]),
            Ok(PropertyValue::StringList(vec![]))
        );
    }

    #[test]
    fn test_string_trims_at_first_nul() {
        let mut buf = encode_utf16("HID");
        buf.extend(encode_utf16("garbage"));
        assert_eq!(
            decode(PropertyType::String, &buf),
            Ok(PropertyValue::String("HID".into()))
        );
    }

    #[test]
    fn test_string_fetch_len_rounds_to_units() {
        assert_eq!(PropertyType::String.fetch_len(0), Some(0));
        assert_eq!(PropertyType::String.fetch_len(8), Some(8));
        assert_eq!(PropertyType::String.fetch_len(7), Some(8));
        assert_eq!(PropertyType::Binary.fetch_len(13), Some(13));
        assert_eq!(PropertyType::Boolean.fetch_len(1), Some(4));
        assert_eq!(PropertyType::PropertyKey.fetch_len(16), Some(20));
    }

    #[test]
    fn test_short_buffer_is_truncated() {
        assert_eq!(
            decode(PropertyType::UInt32, &[1, 2]),
            Err(DecodeError::Truncated {
                expected: 4,
                actual: 2
            })
        );
        assert!(decode(PropertyType::SecurityDescriptor, &[1, 0]).is_err());
    }

    #[test]
    fn test_binary_security_descriptor_decodes() {
        let bytes = sample_descriptor();
        let len = PropertyType::SecurityDescriptor
            .fetch_len(bytes.len() as u32)
            .unwrap();
        assert_eq!(len, bytes.len());

        let value = decode(PropertyType::SecurityDescriptor, &bytes).unwrap();
        let PropertyValue::Security(AccessDescriptor::Binary(sd)) = &value else {
            panic!("expected a parsed descriptor, got {:?}", value);
        };
        assert_eq!(sd.owner.as_ref().unwrap().to_string(), "S-1-5-18");
        assert_eq!(sd.group.as_ref().unwrap().to_string(), "S-1-5-18");
        let dacl = sd.dacl.as_ref().unwrap();
        assert_eq!(dacl.aces.len(), 1);
        assert_eq!(
            dacl.aces[0].sid.as_ref().unwrap().to_string(),
            "S-1-5-32-544"
        );
        assert_eq!(value.kind(), "security");
    }

    #[test]
    fn test_filetime_conversion() {
        assert_eq!(
            filetime_to_utc(116_444_736_000_000_000).unwrap(),
            Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap()
        );
        // 1601-01-01 is representable too
        assert_eq!(
            filetime_to_utc(0).unwrap(),
            Utc.with_ymd_and_hms(1601, 1, 1, 0, 0, 0).unwrap()
        );
        let when = Utc.with_ymd_and_hms(2023, 11, 5, 8, 0, 0).unwrap();
        assert_eq!(filetime_to_utc(utc_to_filetime(when)).unwrap(), when);
    }

    #[test]
    fn test_display() {
        assert_eq!(PropertyValue::U16(0x46D).to_string(), "0x046D");
        assert_eq!(
            PropertyValue::StringList(vec!["a".into(), "b".into()]).to_string(),
            "[a, b]"
        );
        assert_eq!(PropertyValue::TypeTag(0x11).to_string(), "BOOLEAN");
        assert_eq!(PropertyValue::Blob(vec![0xAB, 1]).to_string(), "AB 01");
    }
}
