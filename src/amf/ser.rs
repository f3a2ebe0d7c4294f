// Structured serialization onto AMF0
//
// Maps application data types onto AMF0 values through serde. Struct
// fields become object entries in declaration order, unit enum variants
// become their name as a String, sequences become strict arrays and
// maps become ECMA arrays.
//
// AMF0 numbers are IEEE-754 doubles, so integers beyond +/- 2^53 lose
// precision when serialized.

use std::fmt::Display;

use serde::ser::{self, Serialize};

use crate::error::RtmpError;

use super::Amf0Value;

/// Newtype-struct name used to mark values that must encode as Date
pub(crate) const DATE_TOKEN: &str = "$amf0::date";

/// Milliseconds-since-epoch timestamp that maps to an AMF0 Date
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Amf0Date(pub f64);

impl Amf0Date {
    /// Builds a date from a chrono UTC timestamp
    pub fn from_datetime(value: chrono::DateTime<chrono::Utc>) -> Amf0Date {
        Amf0Date(value.timestamp_millis() as f64)
    }

    /// Converts back to a chrono UTC timestamp, truncating sub-millisecond
    pub fn to_datetime(self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp_millis(self.0 as i64)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for Amf0Date {
    fn from(value: chrono::DateTime<chrono::Utc>) -> Amf0Date {
        Amf0Date::from_datetime(value)
    }
}

impl Serialize for Amf0Date {
    fn serialize<S: ser::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(DATE_TOKEN, &self.0)
    }
}

impl ser::Error for RtmpError {
    fn custom<T: Display>(msg: T) -> Self {
        RtmpError::InvalidFormat(msg.to_string())
    }
}

/// Options for the structured serializer
#[derive(Debug, Clone, Copy, Default)]
pub struct Amf0SerOptions {
    /// When enabled, fields serializing to Null are written as AMF0 Null.
    /// When disabled (the default), such fields are omitted entirely.
    pub explicit_nulls: bool,
}

/// Serializes a value into an AMF0 value with default options
pub fn to_amf0<T: Serialize>(value: &T) -> Result<Amf0Value, RtmpError> {
    to_amf0_with(value, Amf0SerOptions::default())
}

/// Serializes a value into an AMF0 value
pub fn to_amf0_with<T: Serialize>(
    value: &T,
    options: Amf0SerOptions,
) -> Result<Amf0Value, RtmpError> {
    value.serialize(ValueSerializer { options })
}

#[derive(Clone, Copy)]
struct ValueSerializer {
    options: Amf0SerOptions,
}

impl ser::Serializer for ValueSerializer {
    type Ok = Amf0Value;
    type Error = RtmpError;

    type SerializeSeq = SeqSerializer;
    type SerializeTuple = SeqSerializer;
    type SerializeTupleStruct = SeqSerializer;
    type SerializeTupleVariant = ser::Impossible<Amf0Value, RtmpError>;
    type SerializeMap = MapSerializer;
    type SerializeStruct = StructSerializer;
    type SerializeStructVariant = ser::Impossible<Amf0Value, RtmpError>;

    fn serialize_bool(self, v: bool) -> Result<Amf0Value, RtmpError> {
        Ok(Amf0Value::Boolean(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Amf0Value, RtmpError> {
        Ok(Amf0Value::Number(v as f64))
    }

    fn serialize_i16(self, v: i16) -> Result<Amf0Value, RtmpError> {
        Ok(Amf0Value::Number(v as f64))
    }

    fn serialize_i32(self, v: i32) -> Result<Amf0Value, RtmpError> {
        Ok(Amf0Value::Number(v as f64))
    }

    fn serialize_i64(self, v: i64) -> Result<Amf0Value, RtmpError> {
        // Lossy beyond +/- 2^53
        Ok(Amf0Value::Number(v as f64))
    }

    fn serialize_u8(self, v: u8) -> Result<Amf0Value, RtmpError> {
        Ok(Amf0Value::Number(v as f64))
    }

    fn serialize_u16(self, v: u16) -> Result<Amf0Value, RtmpError> {
        Ok(Amf0Value::Number(v as f64))
    }

    fn serialize_u32(self, v: u32) -> Result<Amf0Value, RtmpError> {
        Ok(Amf0Value::Number(v as f64))
    }

    fn serialize_u64(self, v: u64) -> Result<Amf0Value, RtmpError> {
        // Lossy beyond 2^53
        Ok(Amf0Value::Number(v as f64))
    }

    fn serialize_f32(self, v: f32) -> Result<Amf0Value, RtmpError> {
        Ok(Amf0Value::Number(v as f64))
    }

    fn serialize_f64(self, v: f64) -> Result<Amf0Value, RtmpError> {
        Ok(Amf0Value::Number(v))
    }

    fn serialize_char(self, v: char) -> Result<Amf0Value, RtmpError> {
        Ok(Amf0Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Amf0Value, RtmpError> {
        Ok(Amf0Value::String(v.to_string()))
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<Amf0Value, RtmpError> {
        Err(ser::Error::custom("AMF0 has no byte array representation"))
    }

    fn serialize_none(self) -> Result<Amf0Value, RtmpError> {
        Ok(Amf0Value::Null)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Amf0Value, RtmpError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Amf0Value, RtmpError> {
        Ok(Amf0Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Amf0Value, RtmpError> {
        Ok(Amf0Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Amf0Value, RtmpError> {
        // Enumerations map to their variant name
        Ok(Amf0Value::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<Amf0Value, RtmpError> {
        let inner = value.serialize(self)?;

        if name == DATE_TOKEN {
            return match inner {
                Amf0Value::Number(timestamp) => Ok(Amf0Value::Date { timestamp, zone: 0 }),
                _ => Err(ser::Error::custom("AMF0 date payload must be a number")),
            };
        }

        Ok(inner)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<Amf0Value, RtmpError> {
        Err(ser::Error::custom(
            "enum variants with data have no AMF0 representation",
        ))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqSerializer, RtmpError> {
        Ok(SeqSerializer {
            items: Vec::with_capacity(len.unwrap_or(0)),
            options: self.options,
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqSerializer, RtmpError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqSerializer, RtmpError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, RtmpError> {
        Err(ser::Error::custom(
            "enum variants with data have no AMF0 representation",
        ))
    }

    fn serialize_map(self, len: Option<usize>) -> Result<MapSerializer, RtmpError> {
        Ok(MapSerializer {
            entries: Vec::with_capacity(len.unwrap_or(0)),
            next_key: None,
            options: self.options,
        })
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<StructSerializer, RtmpError> {
        Ok(StructSerializer {
            entries: Vec::with_capacity(len),
            options: self.options,
        })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, RtmpError> {
        Err(ser::Error::custom(
            "enum variants with data have no AMF0 representation",
        ))
    }
}

pub struct SeqSerializer {
    items: Vec<Amf0Value>,
    options: Amf0SerOptions,
}

impl ser::SerializeSeq for SeqSerializer {
    type Ok = Amf0Value;
    type Error = RtmpError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), RtmpError> {
        self.items.push(value.serialize(ValueSerializer {
            options: self.options,
        })?);
        Ok(())
    }

    fn end(self) -> Result<Amf0Value, RtmpError> {
        Ok(Amf0Value::StrictArray(self.items))
    }
}

impl ser::SerializeTuple for SeqSerializer {
    type Ok = Amf0Value;
    type Error = RtmpError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), RtmpError> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Amf0Value, RtmpError> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SeqSerializer {
    type Ok = Amf0Value;
    type Error = RtmpError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), RtmpError> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Amf0Value, RtmpError> {
        ser::SerializeSeq::end(self)
    }
}

pub struct MapSerializer {
    entries: Vec<(String, Amf0Value)>,
    next_key: Option<String>,
    options: Amf0SerOptions,
}

impl ser::SerializeMap for MapSerializer {
    type Ok = Amf0Value;
    type Error = RtmpError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), RtmpError> {
        let key = key.serialize(ValueSerializer {
            options: self.options,
        })?;

        match key.as_str() {
            Some(key) => {
                self.next_key = Some(key.to_string());
                Ok(())
            }
            None => Err(ser::Error::custom("AMF0 object keys must be strings")),
        }
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), RtmpError> {
        let key = self
            .next_key
            .take()
            .ok_or_else(|| <RtmpError as ser::Error>::custom("map value serialized before its key"))?;

        let value = value.serialize(ValueSerializer {
            options: self.options,
        })?;

        self.entries.push((key, value));
        Ok(())
    }

    fn end(self) -> Result<Amf0Value, RtmpError> {
        Ok(Amf0Value::EcmaArray(self.entries))
    }
}

pub struct StructSerializer {
    entries: Vec<(String, Amf0Value)>,
    options: Amf0SerOptions,
}

impl ser::SerializeStruct for StructSerializer {
    type Ok = Amf0Value;
    type Error = RtmpError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), RtmpError> {
        let value = value.serialize(ValueSerializer {
            options: self.options,
        })?;

        // Null fields are written only when explicit nulls are requested
        if value == Amf0Value::Null && !self.options.explicit_nulls {
            return Ok(());
        }

        self.entries.push((key.to_string(), value));
        Ok(())
    }

    fn end(self) -> Result<Amf0Value, RtmpError> {
        Ok(Amf0Value::Object(self.entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Sample {
        app: String,
        capabilities: f64,
        tc_url: Option<String>,
        object_encoding: Option<f64>,
    }

    #[test]
    fn test_struct_fields_in_declaration_order() {
        let value = to_amf0(&Sample {
            app: "live".to_string(),
            capabilities: 239.0,
            tc_url: Some("rtmp://localhost/live".to_string()),
            object_encoding: None,
        })
        .unwrap();

        assert_eq!(
            value,
            Amf0Value::Object(vec![
                ("app".to_string(), Amf0Value::String("live".to_string())),
                ("capabilities".to_string(), Amf0Value::Number(239.0)),
                (
                    "tcUrl".to_string(),
                    Amf0Value::String("rtmp://localhost/live".to_string())
                ),
            ])
        );
    }

    #[test]
    fn test_explicit_nulls() {
        let value = to_amf0_with(
            &Sample {
                app: "live".to_string(),
                capabilities: 239.0,
                tc_url: None,
                object_encoding: None,
            },
            Amf0SerOptions {
                explicit_nulls: true,
            },
        )
        .unwrap();

        let entries = value.as_entries().unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[2], ("tcUrl".to_string(), Amf0Value::Null));
        assert_eq!(entries[3], ("objectEncoding".to_string(), Amf0Value::Null));
    }

    #[derive(Serialize)]
    enum Mode {
        Live,
        Record,
    }

    #[test]
    fn test_enum_maps_to_variant_name() {
        assert_eq!(
            to_amf0(&Mode::Live).unwrap(),
            Amf0Value::String("Live".to_string())
        );
        assert_eq!(
            to_amf0(&Mode::Record).unwrap(),
            Amf0Value::String("Record".to_string())
        );
    }

    #[test]
    fn test_sequences_and_maps() {
        let value = to_amf0(&vec!["hvc1", "av01"]).unwrap();
        assert_eq!(
            value,
            Amf0Value::StrictArray(vec![
                Amf0Value::String("hvc1".to_string()),
                Amf0Value::String("av01".to_string()),
            ])
        );

        let mut map = std::collections::BTreeMap::new();
        map.insert("duration".to_string(), 12.5f64);
        let value = to_amf0(&map).unwrap();
        assert_eq!(
            value,
            Amf0Value::EcmaArray(vec![("duration".to_string(), Amf0Value::Number(12.5))])
        );
    }

    #[test]
    fn test_date_token() {
        let value = to_amf0(&Amf0Date(1700000000000.0)).unwrap();
        assert_eq!(
            value,
            Amf0Value::Date {
                timestamp: 1700000000000.0,
                zone: 0
            }
        );
    }

    #[test]
    fn test_large_integers_lose_precision() {
        // 2^53 is the last contiguously representable integer: the next
        // one collapses onto it when pushed through an AMF0 Number
        let exact = to_amf0(&((1i64 << 53))).unwrap();
        let collapsed = to_amf0(&((1i64 << 53) + 1)).unwrap();
        assert_eq!(exact, collapsed);

        let in_range = to_amf0(&((1i64 << 53) - 1)).unwrap();
        assert_eq!(in_range, Amf0Value::Number(9007199254740991.0));
    }
}
