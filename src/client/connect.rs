// Connect command object

use serde::Serialize;

use crate::amf::{to_amf0, Amf0Value};
use crate::error::RtmpError;
use crate::rtmp::CAPABILITIES;

/// The `connect` command object
///
/// Serialized through the structured AMF0 adapter: fields appear in
/// declaration order and unset optionals are omitted from the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectOptions {
    pub app: String,
    pub flash_ver: Option<String>,
    pub tc_url: Option<String>,
    pub fpad: Option<bool>,
    pub capabilities: Option<f64>,
    pub audio_codecs: Option<f64>,
    pub video_codecs: Option<f64>,
    pub video_function: Option<f64>,
    pub four_cc_list: Option<Vec<String>>,
    pub object_encoding: Option<f64>,
}

impl ConnectOptions {
    /// Options for an app, with the standard advertisements filled in
    pub fn new(app: impl Into<String>) -> ConnectOptions {
        ConnectOptions {
            app: app.into(),
            flash_ver: None,
            tc_url: None,
            fpad: Some(false),
            capabilities: Some(CAPABILITIES),
            audio_codecs: None,
            video_codecs: None,
            video_function: Some(1.0),
            four_cc_list: None,
            object_encoding: Some(0.0),
        }
    }

    pub fn with_flash_ver(mut self, flash_ver: impl Into<String>) -> ConnectOptions {
        self.flash_ver = Some(flash_ver.into());
        self
    }

    pub fn with_tc_url(mut self, tc_url: impl Into<String>) -> ConnectOptions {
        self.tc_url = Some(tc_url.into());
        self
    }

    pub fn with_audio_codecs(mut self, audio_codecs: f64) -> ConnectOptions {
        self.audio_codecs = Some(audio_codecs);
        self
    }

    pub fn with_video_codecs(mut self, video_codecs: f64) -> ConnectOptions {
        self.video_codecs = Some(video_codecs);
        self
    }

    pub fn with_four_cc_list(mut self, four_cc_list: Vec<String>) -> ConnectOptions {
        if !four_cc_list.is_empty() {
            self.four_cc_list = Some(four_cc_list);
        }
        self
    }

    /// Serializes into the AMF0 command object
    pub fn to_command_object(&self) -> Result<Amf0Value, RtmpError> {
        to_amf0(self)
    }
}

/// How the server should treat the published stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishType {
    Live,
    Record,
    Append,
}

impl PublishType {
    /// The exact lowercase string the publish command carries
    pub fn as_str(self) -> &'static str {
        match self {
            PublishType::Live => "live",
            PublishType::Record => "record",
            PublishType::Append => "append",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_fields_are_omitted() {
        let object = ConnectOptions::new("live").to_command_object().unwrap();
        let entries = object.as_entries().unwrap();

        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec!["app", "fpad", "capabilities", "videoFunction", "objectEncoding"]
        );
    }

    #[test]
    fn test_field_names_and_order() {
        let object = ConnectOptions::new("live")
            .with_flash_ver("FMLE/3.0")
            .with_tc_url("rtmp://h:1935/live")
            .with_audio_codecs(3575.0)
            .with_video_codecs(252.0)
            .with_four_cc_list(vec!["hvc1".to_string(), "av01".to_string()])
            .to_command_object()
            .unwrap();

        let keys: Vec<&str> = object
            .as_entries()
            .unwrap()
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();

        assert_eq!(
            keys,
            vec![
                "app",
                "flashVer",
                "tcUrl",
                "fpad",
                "capabilities",
                "audioCodecs",
                "videoCodecs",
                "videoFunction",
                "fourCcList",
                "objectEncoding",
            ]
        );

        assert_eq!(
            object.get_property("fourCcList"),
            Some(&Amf0Value::StrictArray(vec![
                Amf0Value::String("hvc1".to_string()),
                Amf0Value::String("av01".to_string()),
            ]))
        );
        assert_eq!(
            object.get_property("capabilities"),
            Some(&Amf0Value::Number(239.0))
        );
    }

    #[test]
    fn test_publish_type_strings() {
        assert_eq!(PublishType::Live.as_str(), "live");
        assert_eq!(PublishType::Record.as_str(), "record");
        assert_eq!(PublishType::Append.as_str(), "append");
    }
}
