// FLV script tag bodies

use crate::amf::Amf0Value;
use crate::error::RtmpError;
use crate::utils::ByteCursor;

/// Script data body: a name and a parameters value
///
/// The name is almost always `onMetaData` and the value an ECMA array
/// of stream properties.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptData {
    pub name: String,
    pub value: Amf0Value,
}

impl ScriptData {
    /// Builds an onMetaData body from property entries
    pub fn on_meta_data(entries: Vec<(String, Amf0Value)>) -> ScriptData {
        ScriptData {
            name: "onMetaData".to_string(),
            value: Amf0Value::EcmaArray(entries),
        }
    }

    /// Parses the two concatenated AMF0 values of a script body
    pub fn parse(data: &[u8]) -> Result<ScriptData, RtmpError> {
        let mut cursor = ByteCursor::new(data);

        let name = match Amf0Value::read(&mut cursor)? {
            Amf0Value::String(name) | Amf0Value::LongString(name) => name,
            other => {
                return Err(RtmpError::invalid_format(format!(
                    "script tag name must be a string, found {:?}",
                    other
                )))
            }
        };

        let value = Amf0Value::read(&mut cursor)?;

        Ok(ScriptData { name, value })
    }

    /// Serializes the script body
    pub fn encode(&self, out: &mut Vec<u8>) {
        Amf0Value::String(self.name.clone()).encode(out);
        self.value.encode(out);
    }
}
