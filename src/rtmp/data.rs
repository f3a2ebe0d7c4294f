// RTMP data message

use crate::amf::Amf0Value;
use crate::error::RtmpError;
use crate::utils::ByteCursor;

/// An AMF0 data message: a sequence of values, the first of which is
/// conventionally a handler name such as `@setDataFrame` or
/// `onMetaData`
#[derive(Debug, Clone, PartialEq)]
pub struct RtmpData {
    pub values: Vec<Amf0Value>,
}

impl RtmpData {
    /// Creates a data message starting with a handler name
    pub fn named(name: impl Into<String>) -> RtmpData {
        RtmpData {
            values: vec![Amf0Value::String(name.into())],
        }
    }

    /// Appends a value
    pub fn with_value(mut self, value: Amf0Value) -> RtmpData {
        self.values.push(value);
        self
    }

    /// The handler name, when the first value is a string
    pub fn name(&self) -> Option<&str> {
        self.values.first()?.as_str()
    }

    /// Builds the @setDataFrame(onMetaData, metadata) message a
    /// publisher sends ahead of media
    pub fn set_data_frame(metadata: Amf0Value) -> RtmpData {
        RtmpData::named("@setDataFrame")
            .with_value(Amf0Value::String("onMetaData".to_string()))
            .with_value(metadata)
    }

    /// True for @setDataFrame messages
    pub fn is_set_data_frame(&self) -> bool {
        self.name() == Some("@setDataFrame")
    }

    /// Serializes the data message into a message payload
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();

        for value in &self.values {
            value.encode(&mut out);
        }

        out
    }

    /// Decodes a data message from a message payload
    pub fn decode(payload: &[u8]) -> Result<RtmpData, RtmpError> {
        let mut cursor = ByteCursor::new(payload);
        let mut values = Vec::new();

        while !cursor.ended() {
            values.push(Amf0Value::read(&mut cursor)?);
        }

        if values.is_empty() {
            return Err(RtmpError::invalid_format("data message carries no values"));
        }

        Ok(RtmpData { values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_data_frame_round_trip() {
        let data = RtmpData::set_data_frame(Amf0Value::EcmaArray(vec![
            ("width".to_string(), Amf0Value::Number(1280.0)),
            ("height".to_string(), Amf0Value::Number(720.0)),
        ]));

        let decoded = RtmpData::decode(&data.encode()).unwrap();

        assert!(decoded.is_set_data_frame());
        assert_eq!(decoded, data);
        assert_eq!(decoded.values.len(), 3);
    }

    #[test]
    fn test_empty_data_rejected() {
        assert!(matches!(
            RtmpData::decode(&[]),
            Err(RtmpError::InvalidFormat(_))
        ));
    }
}
