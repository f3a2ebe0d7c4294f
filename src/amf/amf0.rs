// AMF0 value

use byteorder::{BigEndian, ByteOrder};

use crate::error::RtmpError;
use crate::utils::ByteCursor;

pub const AMF0_TYPE_NUMBER: u8 = 0x00;
pub const AMF0_TYPE_BOOLEAN: u8 = 0x01;
pub const AMF0_TYPE_STRING: u8 = 0x02;
pub const AMF0_TYPE_OBJECT: u8 = 0x03;
pub const AMF0_TYPE_NULL: u8 = 0x05;
pub const AMF0_TYPE_UNDEFINED: u8 = 0x06;
pub const AMF0_TYPE_ECMA_ARRAY: u8 = 0x08;
pub const AMF0_TYPE_STRICT_ARRAY: u8 = 0x0A;
pub const AMF0_TYPE_DATE: u8 = 0x0B;
pub const AMF0_TYPE_LONG_STRING: u8 = 0x0C;

pub const AMF0_OBJECT_TERM_CODE: u8 = 0x09;

/// Largest string encodable with the short STRING marker
const SHORT_STRING_MAX: usize = 0xFFFF;

/// AMF0 compatible value
///
/// Objects and ECMA arrays keep their entries in insertion order,
/// which is also the order they are written on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Amf0Value {
    Number(f64),
    Boolean(bool),
    String(String),
    Object(Vec<(String, Amf0Value)>),
    Null,
    Undefined,
    EcmaArray(Vec<(String, Amf0Value)>),
    StrictArray(Vec<Amf0Value>),
    Date {
        /// Milliseconds since the UNIX epoch
        timestamp: f64,
        /// Time zone offset, always written as 0
        zone: i16,
    },
    LongString(String),
}

impl Amf0Value {
    /// Creates a Date value with no zone offset
    pub fn date(timestamp: f64) -> Amf0Value {
        Amf0Value::Date { timestamp, zone: 0 }
    }

    /// Creates an object from key/value pairs
    pub fn object<K: Into<String>>(entries: Vec<(K, Amf0Value)>) -> Amf0Value {
        Amf0Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    // Value check functions:

    /// Returns true if the value is null or undefined
    pub fn is_null(&self) -> bool {
        matches!(self, Amf0Value::Null | Amf0Value::Undefined)
    }

    /// Returns the value as a float, if it is a Number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Amf0Value::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the value as a boolean, if it is a Boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Amf0Value::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the value as a string slice, for both string encodings
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Amf0Value::String(value) => Some(value.as_str()),
            Amf0Value::LongString(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Returns the key/value entries of an Object or EcmaArray
    pub fn as_entries(&self) -> Option<&[(String, Amf0Value)]> {
        match self {
            Amf0Value::Object(entries) => Some(entries),
            Amf0Value::EcmaArray(entries) => Some(entries),
            _ => None,
        }
    }

    /// Returns the items of a StrictArray
    pub fn as_array(&self) -> Option<&[Amf0Value]> {
        match self {
            Amf0Value::StrictArray(items) => Some(items),
            _ => None,
        }
    }

    /// Gets the value of a property (for objects and ECMA arrays)
    pub fn get_property(&self, property_name: &str) -> Option<&Amf0Value> {
        self.as_entries()?
            .iter()
            .find(|(key, _)| key == property_name)
            .map(|(_, value)| value)
    }

    // Encoding functions:

    /// Encodes the value into bytes, appending to the buffer
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Amf0Value::Number(value) => {
                out.push(AMF0_TYPE_NUMBER);
                encode_f64(*value, out);
            }
            Amf0Value::Boolean(value) => {
                out.push(AMF0_TYPE_BOOLEAN);
                out.push(if *value { 0x01 } else { 0x00 });
            }
            Amf0Value::String(value) | Amf0Value::LongString(value) => {
                // The wire encoding is chosen by length, not by variant
                if value.len() <= SHORT_STRING_MAX {
                    out.push(AMF0_TYPE_STRING);
                    encode_utf8(value, out);
                } else {
                    out.push(AMF0_TYPE_LONG_STRING);
                    encode_utf8_long(value, out);
                }
            }
            Amf0Value::Object(entries) => {
                out.push(AMF0_TYPE_OBJECT);
                encode_entries(entries, out);
            }
            Amf0Value::Null => out.push(AMF0_TYPE_NULL),
            Amf0Value::Undefined => out.push(AMF0_TYPE_UNDEFINED),
            Amf0Value::EcmaArray(entries) => {
                out.push(AMF0_TYPE_ECMA_ARRAY);
                let mut count = [0; 4];
                BigEndian::write_u32(&mut count, entries.len() as u32);
                out.extend_from_slice(&count);
                encode_entries(entries, out);
            }
            Amf0Value::StrictArray(items) => {
                out.push(AMF0_TYPE_STRICT_ARRAY);
                let mut count = [0; 4];
                BigEndian::write_u32(&mut count, items.len() as u32);
                out.extend_from_slice(&count);

                for item in items {
                    item.encode(out);
                }
            }
            Amf0Value::Date { timestamp, zone: _ } => {
                out.push(AMF0_TYPE_DATE);
                encode_f64(*timestamp, out);
                // The zone is not meaningful on the wire, always 0
                out.extend_from_slice(&[0x00, 0x00]);
            }
        }
    }

    /// Encodes the value into a fresh buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }

    // Decoding functions:

    /// Reads one value from the cursor
    pub fn read(cursor: &mut ByteCursor) -> Result<Amf0Value, RtmpError> {
        let marker = cursor.read_u8()?;

        match marker {
            AMF0_TYPE_NUMBER => Ok(Amf0Value::Number(cursor.read_f64()?)),
            AMF0_TYPE_BOOLEAN => Ok(Amf0Value::Boolean(cursor.read_u8()? != 0)),
            AMF0_TYPE_STRING => Ok(Amf0Value::String(read_utf8(cursor)?)),
            AMF0_TYPE_OBJECT => Ok(Amf0Value::Object(read_entries(cursor)?)),
            AMF0_TYPE_NULL => Ok(Amf0Value::Null),
            AMF0_TYPE_UNDEFINED => Ok(Amf0Value::Undefined),
            AMF0_TYPE_ECMA_ARRAY => {
                // The associative count is informative only: read until the
                // object-end marker regardless of what it claims
                let _count = cursor.read_u32()?;
                Ok(Amf0Value::EcmaArray(read_entries(cursor)?))
            }
            AMF0_TYPE_STRICT_ARRAY => {
                let count = cursor.read_u32()? as usize;

                // Each element takes at least one marker byte
                if count > cursor.remaining() {
                    return Err(RtmpError::invalid_format(format!(
                        "strict array claims {} elements with only {} bytes left",
                        count,
                        cursor.remaining()
                    )));
                }

                let mut items = Vec::with_capacity(count);

                for _ in 0..count {
                    items.push(Amf0Value::read(cursor)?);
                }

                Ok(Amf0Value::StrictArray(items))
            }
            AMF0_TYPE_DATE => {
                let timestamp = cursor.read_f64()?;
                let zone = cursor.read_i16()?;
                Ok(Amf0Value::Date { timestamp, zone })
            }
            AMF0_TYPE_LONG_STRING => Ok(Amf0Value::LongString(read_utf8_long(cursor)?)),
            other => Err(RtmpError::invalid_format(format!(
                "unknown AMF0 marker: 0x{:02x}",
                other
            ))),
        }
    }

    /// Reads a single value from a byte slice
    pub fn from_bytes(data: &[u8]) -> Result<Amf0Value, RtmpError> {
        let mut cursor = ByteCursor::new(data);
        Amf0Value::read(&mut cursor)
    }
}

/// Encodes an IEEE-754 double, big endian
fn encode_f64(value: f64, out: &mut Vec<u8>) {
    let mut buf = [0; 8];
    BigEndian::write_f64(&mut buf, value);
    out.extend_from_slice(&buf);
}

/// Encodes a string with a 16-bit length prefix
pub(crate) fn encode_utf8(value: &str, out: &mut Vec<u8>) {
    let mut len = [0; 2];
    BigEndian::write_u16(&mut len, value.len() as u16);
    out.extend_from_slice(&len);
    out.extend_from_slice(value.as_bytes());
}

/// Encodes a string with a 32-bit length prefix
fn encode_utf8_long(value: &str, out: &mut Vec<u8>) {
    let mut len = [0; 4];
    BigEndian::write_u32(&mut len, value.len() as u32);
    out.extend_from_slice(&len);
    out.extend_from_slice(value.as_bytes());
}

/// Encodes object entries followed by the object-end marker
fn encode_entries(entries: &[(String, Amf0Value)], out: &mut Vec<u8>) {
    for (key, value) in entries {
        encode_utf8(key, out);
        value.encode(out);
    }

    encode_utf8("", out);
    out.push(AMF0_OBJECT_TERM_CODE);
}

fn read_utf8(cursor: &mut ByteCursor) -> Result<String, RtmpError> {
    let len = cursor.read_u16()? as usize;
    let bytes = cursor.read_bytes(len)?;

    String::from_utf8(bytes.to_vec())
        .map_err(|_| RtmpError::invalid_format("AMF0 string is not valid UTF-8"))
}

fn read_utf8_long(cursor: &mut ByteCursor) -> Result<String, RtmpError> {
    let len = cursor.read_u32()? as usize;
    let bytes = cursor.read_bytes(len)?;

    String::from_utf8(bytes.to_vec())
        .map_err(|_| RtmpError::invalid_format("AMF0 long string is not valid UTF-8"))
}

/// Reads key/value pairs until the object-end marker
///
/// Duplicate keys keep the last value seen, so keys are unique
/// within the decoded value.
fn read_entries(cursor: &mut ByteCursor) -> Result<Vec<(String, Amf0Value)>, RtmpError> {
    let mut entries: Vec<(String, Amf0Value)> = Vec::new();

    loop {
        if cursor.ended() {
            return Err(RtmpError::invalid_format(
                "AMF0 object is missing its end marker",
            ));
        }

        let key = read_utf8(cursor)?;

        if key.is_empty() && cursor.peek_u8()? == AMF0_OBJECT_TERM_CODE {
            cursor.read_u8()?;
            return Ok(entries);
        }

        let value = Amf0Value::read(cursor)?;

        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => entries.push((key, value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: Amf0Value) {
        let bytes = value.to_bytes();
        let decoded = Amf0Value::from_bytes(&bytes).expect("decode failed");
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_boolean_wire_format() {
        assert_eq!(Amf0Value::Boolean(true).to_bytes(), hex::decode("0101").unwrap());
        assert_eq!(
            Amf0Value::from_bytes(&[0x01, 0x01]).unwrap(),
            Amf0Value::Boolean(true)
        );
    }

    #[test]
    fn test_number_wire_format() {
        let bytes = hex::decode("004045000000000000").unwrap();
        assert_eq!(Amf0Value::Number(42.0).to_bytes(), bytes);
        assert_eq!(Amf0Value::from_bytes(&bytes).unwrap(), Amf0Value::Number(42.0));
    }

    #[test]
    fn test_string_wire_format() {
        let bytes = hex::decode("02000D737472696E67546F5772697465").unwrap();
        assert_eq!(
            Amf0Value::String("stringToWrite".to_string()).to_bytes(),
            bytes
        );
        assert_eq!(
            Amf0Value::from_bytes(&bytes).unwrap(),
            Amf0Value::String("stringToWrite".to_string())
        );
    }

    #[test]
    fn test_object_round_trip() {
        round_trip(Amf0Value::object(vec![
            ("app", Amf0Value::String("live".to_string())),
            ("capabilities", Amf0Value::Number(239.0)),
            ("fpad", Amf0Value::Boolean(false)),
            ("nested", Amf0Value::object(vec![("x", Amf0Value::Null)])),
        ]));
    }

    #[test]
    fn test_ecma_array_round_trip() {
        round_trip(Amf0Value::EcmaArray(vec![
            ("duration".to_string(), Amf0Value::Number(0.0)),
            ("encoder".to_string(), Amf0Value::String("test".to_string())),
        ]));
    }

    #[test]
    fn test_strict_array_preserves_order() {
        let items = vec![
            Amf0Value::Number(1.0),
            Amf0Value::String("two".to_string()),
            Amf0Value::Number(3.0),
        ];
        let value = Amf0Value::StrictArray(items.clone());
        let decoded = Amf0Value::from_bytes(&value.to_bytes()).unwrap();
        assert_eq!(decoded.as_array().unwrap(), items.as_slice());
    }

    #[test]
    fn test_date_zone_written_as_zero() {
        let bytes = Amf0Value::Date {
            timestamp: 1234.5,
            zone: 120,
        }
        .to_bytes();

        assert_eq!(&bytes[bytes.len() - 2..], &[0x00, 0x00]);
        round_trip(Amf0Value::date(1234.5));
    }

    #[test]
    fn test_long_string_encoding_picked_by_length() {
        let long = "x".repeat(70000);
        let bytes = Amf0Value::String(long.clone()).to_bytes();
        assert_eq!(bytes[0], AMF0_TYPE_LONG_STRING);
        assert_eq!(
            Amf0Value::from_bytes(&bytes).unwrap(),
            Amf0Value::LongString(long)
        );
    }

    #[test]
    fn test_ecma_count_is_informative() {
        // Claims 7 entries but carries one: the reader must not care
        let mut bytes = vec![AMF0_TYPE_ECMA_ARRAY, 0x00, 0x00, 0x00, 0x07];
        encode_utf8("k", &mut bytes);
        Amf0Value::Number(1.0).encode(&mut bytes);
        encode_utf8("", &mut bytes);
        bytes.push(AMF0_OBJECT_TERM_CODE);

        let decoded = Amf0Value::from_bytes(&bytes).unwrap();
        assert_eq!(
            decoded,
            Amf0Value::EcmaArray(vec![("k".to_string(), Amf0Value::Number(1.0))])
        );
    }

    #[test]
    fn test_unterminated_object_is_invalid() {
        let mut bytes = vec![AMF0_TYPE_OBJECT];
        encode_utf8("key", &mut bytes);
        Amf0Value::Number(1.0).encode(&mut bytes);
        // No 00 00 09 terminator

        assert!(matches!(
            Amf0Value::from_bytes(&bytes),
            Err(RtmpError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_unknown_marker_is_invalid() {
        assert!(matches!(
            Amf0Value::from_bytes(&[0x42]),
            Err(RtmpError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_truncated_string_is_invalid() {
        // Claims 13 bytes, carries 2
        assert!(matches!(
            Amf0Value::from_bytes(&[0x02, 0x00, 0x0D, 0x61, 0x62]),
            Err(RtmpError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_oversized_strict_array_is_invalid() {
        assert!(matches!(
            Amf0Value::from_bytes(&[AMF0_TYPE_STRICT_ARRAY, 0xFF, 0xFF, 0xFF, 0xFF, 0x00]),
            Err(RtmpError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_duplicate_keys_keep_last() {
        let mut bytes = vec![AMF0_TYPE_OBJECT];
        encode_utf8("k", &mut bytes);
        Amf0Value::Number(1.0).encode(&mut bytes);
        encode_utf8("k", &mut bytes);
        Amf0Value::Number(2.0).encode(&mut bytes);
        encode_utf8("", &mut bytes);
        bytes.push(AMF0_OBJECT_TERM_CODE);

        let decoded = Amf0Value::from_bytes(&bytes).unwrap();
        assert_eq!(
            decoded,
            Amf0Value::Object(vec![("k".to_string(), Amf0Value::Number(2.0))])
        );
    }
}
