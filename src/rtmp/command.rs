// RTMP command

use crate::amf::Amf0Value;
use crate::error::RtmpError;
use crate::utils::ByteCursor;

/// An AMF0 command message
///
/// On the wire: name (String), transaction id (Number), command object
/// (Object or Null), then positional arguments. Responses reuse the
/// request's transaction id; `onStatus` notifications carry id 0 and
/// are matched by their info-object `code` instead.
#[derive(Debug, Clone, PartialEq)]
pub struct RtmpCommand {
    pub name: String,
    pub transaction_id: f64,
    pub command_object: Amf0Value,
    pub arguments: Vec<Amf0Value>,
}

impl RtmpCommand {
    /// Creates a command with a Null command object and no arguments
    pub fn new(name: impl Into<String>, transaction_id: f64) -> RtmpCommand {
        RtmpCommand {
            name: name.into(),
            transaction_id,
            command_object: Amf0Value::Null,
            arguments: Vec::new(),
        }
    }

    /// Sets the command object
    pub fn with_object(mut self, command_object: Amf0Value) -> RtmpCommand {
        self.command_object = command_object;
        self
    }

    /// Appends a positional argument
    pub fn with_argument(mut self, argument: Amf0Value) -> RtmpCommand {
        self.arguments.push(argument);
        self
    }

    /// Gets a positional argument
    pub fn argument(&self, index: usize) -> Option<&Amf0Value> {
        self.arguments.get(index)
    }

    pub fn is_result(&self) -> bool {
        self.name == "_result"
    }

    pub fn is_error(&self) -> bool {
        self.name == "_error"
    }

    pub fn is_on_status(&self) -> bool {
        self.name == "onStatus"
    }

    /// The info object: first argument of responses and onStatus
    pub fn info(&self) -> Option<&Amf0Value> {
        self.arguments.first()
    }

    /// `code` field of the info object
    pub fn info_code(&self) -> Option<&str> {
        self.info()?.get_property("code")?.as_str()
    }

    /// `level` field of the info object
    pub fn info_level(&self) -> Option<&str> {
        self.info()?.get_property("level")?.as_str()
    }

    /// True for onStatus or _error responses carrying level "error"
    pub fn is_error_status(&self) -> bool {
        self.is_error() || self.info_level() == Some("error")
    }

    /// Short description for error reporting
    pub fn describe(&self) -> String {
        match self.info_code() {
            Some(code) => format!("{} ({})", self.name, code),
            None => self.name.clone(),
        }
    }

    /// Serializes the command into a message payload
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();

        Amf0Value::String(self.name.clone()).encode(&mut out);
        Amf0Value::Number(self.transaction_id).encode(&mut out);
        self.command_object.encode(&mut out);

        for argument in &self.arguments {
            argument.encode(&mut out);
        }

        out
    }

    /// Decodes a command from a message payload
    pub fn decode(payload: &[u8]) -> Result<RtmpCommand, RtmpError> {
        let mut cursor = ByteCursor::new(payload);

        let name = match Amf0Value::read(&mut cursor)? {
            Amf0Value::String(name) | Amf0Value::LongString(name) => name,
            other => {
                return Err(RtmpError::invalid_format(format!(
                    "command name must be a string, found {:?}",
                    other
                )))
            }
        };

        let transaction_id = match Amf0Value::read(&mut cursor)? {
            Amf0Value::Number(id) => id,
            other => {
                return Err(RtmpError::invalid_format(format!(
                    "transaction id must be a number, found {:?}",
                    other
                )))
            }
        };

        let command_object = if cursor.ended() {
            Amf0Value::Null
        } else {
            Amf0Value::read(&mut cursor)?
        };

        let mut arguments = Vec::new();

        while !cursor.ended() {
            arguments.push(Amf0Value::read(&mut cursor)?);
        }

        Ok(RtmpCommand {
            name,
            transaction_id,
            command_object,
            arguments,
        })
    }

    /// Builds an onStatus notification
    pub fn on_status(level: &str, code: &str, description: Option<&str>) -> RtmpCommand {
        let mut info = vec![
            ("level".to_string(), Amf0Value::String(level.to_string())),
            ("code".to_string(), Amf0Value::String(code.to_string())),
        ];

        if let Some(description) = description {
            info.push((
                "description".to_string(),
                Amf0Value::String(description.to_string()),
            ));
        }

        RtmpCommand::new("onStatus", 0.0).with_argument(Amf0Value::Object(info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_round_trip() {
        let command = RtmpCommand::new("createStream", 4.0);
        let decoded = RtmpCommand::decode(&command.encode()).unwrap();

        assert_eq!(decoded, command);
        assert_eq!(decoded.transaction_id, 4.0);
        assert_eq!(decoded.command_object, Amf0Value::Null);
    }

    #[test]
    fn test_connect_shape() {
        let command = RtmpCommand::new("connect", 1.0)
            .with_object(Amf0Value::object(vec![
                ("app", Amf0Value::String("live".to_string())),
                ("tcUrl", Amf0Value::String("rtmp://example/live".to_string())),
            ]))
            .with_argument(Amf0Value::String("extra".to_string()));

        let decoded = RtmpCommand::decode(&command.encode()).unwrap();

        assert_eq!(decoded.name, "connect");
        assert_eq!(
            decoded
                .command_object
                .get_property("app")
                .and_then(|v| v.as_str()),
            Some("live")
        );
        assert_eq!(decoded.arguments.len(), 1);
    }

    #[test]
    fn test_on_status_helpers() {
        let status = RtmpCommand::on_status(
            "status",
            "NetStream.Publish.Start",
            Some("/live/key is now published."),
        );

        assert!(status.is_on_status());
        assert_eq!(status.info_code(), Some("NetStream.Publish.Start"));
        assert_eq!(status.info_level(), Some("status"));
        assert!(!status.is_error_status());

        let failure = RtmpCommand::on_status("error", "NetStream.Publish.Failed", None);
        assert!(failure.is_error_status());
        assert_eq!(failure.describe(), "onStatus (NetStream.Publish.Failed)");
    }

    #[test]
    fn test_command_name_must_be_string() {
        let mut payload = Vec::new();
        Amf0Value::Number(1.0).encode(&mut payload);
        Amf0Value::Number(2.0).encode(&mut payload);

        assert!(matches!(
            RtmpCommand::decode(&payload),
            Err(RtmpError::InvalidFormat(_))
        ));
    }
}
