//! Key encoding.
//!
//! Every indexed value is turned into a fixed-length byte string whose
//! unsigned lexicographic order follows the order of the values. Nodes never
//! look at field types; they only compare key bytes.

use std::fmt;

use crate::common::config::MAX_KEY_LENGTH;
use crate::common::{Error, Result};

/// Type of the table field an index is built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Fixed-width text.
    Char,
    /// 4-byte signed integer.
    Integer,
    /// 2-byte signed integer.
    SmallInt,
    /// Fixed-point decimal, indexed as a double.
    Decimal,
    /// Double-precision float.
    Float,
    /// Calendar date.
    Date,
    /// Boolean.
    Logical,
    /// Time of day.
    Time,
    /// Date and time of day. Has a key length but no key encoding.
    DateTime,
}

impl FieldType {
    /// Key length for a field of this type and width.
    ///
    /// Text keys take the field width, capped at [`MAX_KEY_LENGTH`]. Other
    /// types have a fixed length and ignore `width`.
    ///
    /// # Errors
    /// `Error::InvalidFieldWidth` for a text field of width 0.
    pub fn key_length(self, width: usize) -> Result<usize> {
        Ok(match self {
            FieldType::Char => {
                if width == 0 {
                    return Err(Error::InvalidFieldWidth(width));
                }
                width.min(MAX_KEY_LENGTH)
            }
            FieldType::SmallInt => 2,
            FieldType::Integer | FieldType::Date | FieldType::Time | FieldType::Logical => 4,
            FieldType::Decimal | FieldType::Float | FieldType::DateTime => 8,
        })
    }

    /// Whether keys can be built for this field type.
    pub fn is_indexable(self) -> bool {
        !matches!(self, FieldType::DateTime)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Char => "char",
            FieldType::Integer => "integer",
            FieldType::SmallInt => "smallint",
            FieldType::Decimal => "decimal",
            FieldType::Float => "float",
            FieldType::Date => "date",
            FieldType::Logical => "logical",
            FieldType::Time => "time",
            FieldType::DateTime => "datetime",
        };
        f.write_str(name)
    }
}

/// A field value to build a key from.
///
/// Dates, times and logicals are indexed as integers; use
/// [`KeyValue::date`], [`KeyValue::time`] and [`KeyValue::logical`] to get
/// the integer form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyValue<'a> {
    Integer(i32),
    Text(&'a str),
    Float(f64),
}

impl KeyValue<'_> {
    /// Date key: `year * 0x10000 + month * 0x100 + day`.
    ///
    /// Out-of-range components wrap instead of overflowing.
    pub fn date(year: i32, month: u32, day: u32) -> KeyValue<'static> {
        let v = year
            .wrapping_mul(0x10000)
            .wrapping_add((month as i32).wrapping_mul(0x100))
            .wrapping_add(day as i32);
        KeyValue::Integer(v)
    }

    /// Time key: milliseconds since midnight.
    pub fn time(hour: u32, minute: u32, second: u32, millis: u32) -> KeyValue<'static> {
        let ms = hour
            .wrapping_mul(60)
            .wrapping_add(minute)
            .wrapping_mul(60)
            .wrapping_add(second)
            .wrapping_mul(1000)
            .wrapping_add(millis);
        KeyValue::Integer(ms as i32)
    }

    /// Logical key: 1 for true, 0 for false.
    pub fn logical(value: bool) -> KeyValue<'static> {
        KeyValue::Integer(i32::from(value))
    }
}

/// Encoder chosen once per index from its field type and key length.
///
/// # Encodings
/// - `Integer`: big-endian two's complement, truncated to the low
///   `length` bytes, with the sign bit flipped so negatives sort first.
/// - `Text`: ASCII upper-cased, cut at the first NUL, truncated or
///   zero-padded to `length`.
/// - `Float`: the negated value as big-endian IEEE-754 bits. Negative
///   values sort below zero and positive values, positives ascend. `-0.0`
///   is encoded as `0.0`.
///
/// # Example
/// ```
/// use tabindex::index::{KeyCodec, KeyValue};
///
/// let codec = KeyCodec::integer(4).unwrap();
/// let mut a = [0u8; 4];
/// let mut b = [0u8; 4];
/// codec.encode(&KeyValue::Integer(-1), &mut a).unwrap();
/// codec.encode(&KeyValue::Integer(1), &mut b).unwrap();
/// assert!(a < b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCodec {
    Integer { length: usize },
    Text { length: usize },
    Float,
}

impl KeyCodec {
    /// Select the codec for a field type, checking that `key_length` is
    /// the one the type requires.
    ///
    /// # Errors
    /// - `Error::UnsupportedFieldType` for date-time fields.
    /// - `Error::KeyLengthMismatch` if `key_length` does not fit the type.
    pub fn for_field(field_type: FieldType, key_length: usize) -> Result<Self> {
        let mismatch = || Error::KeyLengthMismatch {
            key_length,
            field_type,
        };

        match field_type {
            FieldType::DateTime => Err(Error::UnsupportedFieldType(field_type)),
            FieldType::Char => {
                if key_length == 0 || key_length > MAX_KEY_LENGTH {
                    return Err(mismatch());
                }
                Ok(KeyCodec::Text { length: key_length })
            }
            FieldType::Decimal | FieldType::Float => {
                if key_length != 8 {
                    return Err(mismatch());
                }
                Ok(KeyCodec::Float)
            }
            FieldType::SmallInt
            | FieldType::Integer
            | FieldType::Date
            | FieldType::Time
            | FieldType::Logical => {
                if key_length != field_type.key_length(key_length)? {
                    return Err(mismatch());
                }
                Ok(KeyCodec::Integer { length: key_length })
            }
        }
    }

    /// Integer codec of 1, 2 or 4 bytes.
    pub fn integer(length: usize) -> Result<Self> {
        match length {
            1 | 2 | 4 => Ok(KeyCodec::Integer { length }),
            _ => Err(Error::KeyLengthMismatch {
                key_length: length,
                field_type: FieldType::Integer,
            }),
        }
    }

    /// Number of bytes this codec writes.
    pub fn key_length(&self) -> usize {
        match *self {
            KeyCodec::Integer { length } | KeyCodec::Text { length } => length,
            KeyCodec::Float => 8,
        }
    }

    /// Encode `value` into `out`, which must be exactly
    /// [`key_length`](Self::key_length) bytes.
    ///
    /// Integer values are accepted by the float codec.
    ///
    /// # Errors
    /// - `Error::KeySizeMismatch` if `out` has the wrong length.
    /// - `Error::ValueTypeMismatch` if the value variant does not fit.
    pub fn encode(&self, value: &KeyValue<'_>, out: &mut [u8]) -> Result<()> {
        if out.len() != self.key_length() {
            return Err(Error::KeySizeMismatch {
                found: out.len(),
                expected: self.key_length(),
            });
        }

        match (*self, *value) {
            (KeyCodec::Integer { length }, KeyValue::Integer(v)) => {
                let bytes = v.to_be_bytes();
                out.copy_from_slice(&bytes[4 - length..]);
                out[0] ^= 0x80;
            }
            (KeyCodec::Text { .. }, KeyValue::Text(s)) => {
                out.fill(0);
                let text = s.as_bytes().split(|&b| b == 0).next().unwrap_or_default();
                for (dst, src) in out.iter_mut().zip(text) {
                    *dst = src.to_ascii_uppercase();
                }
            }
            (KeyCodec::Float, KeyValue::Float(v)) => {
                // -0.0 and 0.0 share one key.
                let v = if v == 0.0 { 0.0 } else { v };
                out.copy_from_slice(&(-v).to_be_bytes());
            }
            (KeyCodec::Float, KeyValue::Integer(v)) => {
                out.copy_from_slice(&(-f64::from(v)).to_be_bytes());
            }
            (KeyCodec::Integer { .. }, _) => return Err(Error::ValueTypeMismatch("integer")),
            (KeyCodec::Text { .. }, _) => return Err(Error::ValueTypeMismatch("text")),
            (KeyCodec::Float, _) => return Err(Error::ValueTypeMismatch("float")),
        }
        Ok(())
    }

    /// Encode into a new buffer.
    pub fn encode_to_vec(&self, value: &KeyValue<'_>) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.key_length()];
        self.encode(value, &mut out)?;
        Ok(out)
    }
}
