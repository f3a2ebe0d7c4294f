// Structured deserialization from AMF0

use std::fmt;

use serde::de::{self, IntoDeserializer, Visitor};

use crate::error::RtmpError;

use super::ser::DATE_TOKEN;
use super::{Amf0Date, Amf0Value};

impl de::Error for RtmpError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        RtmpError::InvalidFormat(msg.to_string())
    }
}

/// Deserializes a typed value out of an AMF0 value
///
/// Object keys with no matching field are ignored.
pub fn from_amf0<'de, T: de::Deserialize<'de>>(value: &'de Amf0Value) -> Result<T, RtmpError> {
    T::deserialize(ValueDeserializer { value })
}

struct ValueDeserializer<'de> {
    value: &'de Amf0Value,
}

impl<'de> ValueDeserializer<'de> {
    fn number(&self) -> Result<f64, RtmpError> {
        match self.value {
            Amf0Value::Number(n) => Ok(*n),
            Amf0Value::Date { timestamp, .. } => Ok(*timestamp),
            other => Err(de::Error::custom(format!(
                "expected an AMF0 number, found {:?}",
                other
            ))),
        }
    }
}

impl<'de> de::Deserializer<'de> for ValueDeserializer<'de> {
    type Error = RtmpError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, RtmpError> {
        match self.value {
            Amf0Value::Number(n) => visitor.visit_f64(*n),
            Amf0Value::Boolean(b) => visitor.visit_bool(*b),
            Amf0Value::String(s) | Amf0Value::LongString(s) => visitor.visit_borrowed_str(s),
            Amf0Value::Object(entries) | Amf0Value::EcmaArray(entries) => {
                visitor.visit_map(EntriesAccess::new(entries))
            }
            Amf0Value::Null | Amf0Value::Undefined => visitor.visit_unit(),
            Amf0Value::StrictArray(items) => visitor.visit_seq(ItemsAccess::new(items)),
            Amf0Value::Date { timestamp, .. } => visitor.visit_f64(*timestamp),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, RtmpError> {
        match self.value {
            Amf0Value::Boolean(b) => visitor.visit_bool(*b),
            other => Err(de::Error::custom(format!(
                "expected an AMF0 boolean, found {:?}",
                other
            ))),
        }
    }

    fn deserialize_i8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, RtmpError> {
        self.deserialize_i64(visitor)
    }

    fn deserialize_i16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, RtmpError> {
        self.deserialize_i64(visitor)
    }

    fn deserialize_i32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, RtmpError> {
        self.deserialize_i64(visitor)
    }

    fn deserialize_i64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, RtmpError> {
        visitor.visit_i64(self.number()? as i64)
    }

    fn deserialize_u8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, RtmpError> {
        self.deserialize_u64(visitor)
    }

    fn deserialize_u16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, RtmpError> {
        self.deserialize_u64(visitor)
    }

    fn deserialize_u32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, RtmpError> {
        self.deserialize_u64(visitor)
    }

    fn deserialize_u64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, RtmpError> {
        let n = self.number()?;

        if n < 0.0 {
            return Err(de::Error::custom("negative number for unsigned field"));
        }

        visitor.visit_u64(n as u64)
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, RtmpError> {
        self.deserialize_f64(visitor)
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, RtmpError> {
        visitor.visit_f64(self.number()?)
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, RtmpError> {
        self.deserialize_str(visitor)
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, RtmpError> {
        match self.value {
            Amf0Value::String(s) | Amf0Value::LongString(s) => visitor.visit_borrowed_str(s),
            other => Err(de::Error::custom(format!(
                "expected an AMF0 string, found {:?}",
                other
            ))),
        }
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, RtmpError> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, RtmpError> {
        Err(de::Error::custom("AMF0 has no byte array representation"))
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, RtmpError> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, RtmpError> {
        match self.value {
            Amf0Value::Null | Amf0Value::Undefined => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, RtmpError> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, RtmpError> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, RtmpError> {
        if name == DATE_TOKEN {
            return visitor.visit_f64(self.number()?);
        }

        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, RtmpError> {
        match self.value {
            Amf0Value::StrictArray(items) => visitor.visit_seq(ItemsAccess::new(items)),
            other => Err(de::Error::custom(format!(
                "expected an AMF0 strict array, found {:?}",
                other
            ))),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, RtmpError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, RtmpError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, RtmpError> {
        match self.value {
            Amf0Value::Object(entries) | Amf0Value::EcmaArray(entries) => {
                visitor.visit_map(EntriesAccess::new(entries))
            }
            other => Err(de::Error::custom(format!(
                "expected an AMF0 object, found {:?}",
                other
            ))),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, RtmpError> {
        self.deserialize_map(visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, RtmpError> {
        match self.value {
            Amf0Value::String(s) | Amf0Value::LongString(s) => {
                visitor.visit_enum(s.as_str().into_deserializer())
            }
            other => Err(de::Error::custom(format!(
                "expected an AMF0 string for an enum, found {:?}",
                other
            ))),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, RtmpError> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, RtmpError> {
        visitor.visit_unit()
    }
}

struct EntriesAccess<'de> {
    entries: std::slice::Iter<'de, (String, Amf0Value)>,
    pending: Option<&'de Amf0Value>,
}

impl<'de> EntriesAccess<'de> {
    fn new(entries: &'de [(String, Amf0Value)]) -> EntriesAccess<'de> {
        EntriesAccess {
            entries: entries.iter(),
            pending: None,
        }
    }
}

impl<'de> de::MapAccess<'de> for EntriesAccess<'de> {
    type Error = RtmpError;

    fn next_key_seed<K: de::DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, RtmpError> {
        match self.entries.next() {
            Some((key, value)) => {
                self.pending = Some(value);
                seed.deserialize(key.as_str().into_deserializer()).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: de::DeserializeSeed<'de>>(
        &mut self,
        seed: V,
    ) -> Result<V::Value, RtmpError> {
        let value = self
            .pending
            .take()
            .ok_or_else(|| <RtmpError as de::Error>::custom("map value requested before its key"))?;

        seed.deserialize(ValueDeserializer { value })
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}

struct ItemsAccess<'de> {
    items: std::slice::Iter<'de, Amf0Value>,
}

impl<'de> ItemsAccess<'de> {
    fn new(items: &'de [Amf0Value]) -> ItemsAccess<'de> {
        ItemsAccess { items: items.iter() }
    }
}

impl<'de> de::SeqAccess<'de> for ItemsAccess<'de> {
    type Error = RtmpError;

    fn next_element_seed<T: de::DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, RtmpError> {
        match self.items.next() {
            Some(value) => seed.deserialize(ValueDeserializer { value }).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }
}

impl<'de> de::Deserialize<'de> for Amf0Date {
    fn deserialize<D: de::Deserializer<'de>>(deserializer: D) -> Result<Amf0Date, D::Error> {
        struct DateVisitor;

        impl<'de> Visitor<'de> for DateVisitor {
            type Value = Amf0Date;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an AMF0 date")
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amf0Date, E> {
                Ok(Amf0Date(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amf0Date, E> {
                Ok(Amf0Date(v as f64))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amf0Date, E> {
                Ok(Amf0Date(v as f64))
            }

            fn visit_newtype_struct<D: de::Deserializer<'de>>(
                self,
                deserializer: D,
            ) -> Result<Amf0Date, D::Error> {
                deserializer.deserialize_f64(DateVisitor)
            }
        }

        deserializer.deserialize_newtype_struct(DATE_TOKEN, DateVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::super::to_amf0;
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct StreamInfo {
        app: String,
        capabilities: f64,
        tc_url: Option<String>,
        started_at: Option<Amf0Date>,
    }

    #[test]
    fn test_struct_round_trip() {
        let info = StreamInfo {
            app: "live".to_string(),
            capabilities: 239.0,
            tc_url: Some("rtmp://localhost/live".to_string()),
            started_at: Some(Amf0Date(1700000000000.0)),
        };

        let value = to_amf0(&info).unwrap();
        let back: StreamInfo = from_amf0(&value).unwrap();
        assert_eq!(back, info);
    }

    #[test]
    fn test_missing_optional_fields_become_none() {
        let value = Amf0Value::object(vec![
            ("app", Amf0Value::String("live".to_string())),
            ("capabilities", Amf0Value::Number(31.0)),
        ]);

        let info: StreamInfo = from_amf0(&value).unwrap();
        assert_eq!(info.tc_url, None);
        assert_eq!(info.started_at, None);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let value = Amf0Value::object(vec![
            ("app", Amf0Value::String("live".to_string())),
            ("flashVer", Amf0Value::String("FMLE/3.0".to_string())),
            ("capabilities", Amf0Value::Number(31.0)),
            ("swfUrl", Amf0Value::Null),
        ]);

        let info: StreamInfo = from_amf0(&value).unwrap();
        assert_eq!(info.app, "live");
    }

    #[derive(Debug, PartialEq, Deserialize)]
    enum Mode {
        Live,
        Record,
    }

    #[test]
    fn test_enum_from_string() {
        let value = Amf0Value::String("Record".to_string());
        let mode: Mode = from_amf0(&value).unwrap();
        assert_eq!(mode, Mode::Record);
    }

    #[test]
    fn test_integers_from_numbers() {
        let value = Amf0Value::Number(42.0);
        let n: u32 = from_amf0(&value).unwrap();
        assert_eq!(n, 42);

        let value = Amf0Value::Number(-7.0);
        let n: i32 = from_amf0(&value).unwrap();
        assert_eq!(n, -7);

        let unsigned: Result<u32, _> = from_amf0(&Amf0Value::Number(-7.0));
        assert!(unsigned.is_err());
    }

    #[test]
    fn test_type_mismatch_is_an_error() {
        let value = Amf0Value::String("not a number".to_string());
        let res: Result<f64, _> = from_amf0(&value);
        assert!(res.is_err());
    }
}
