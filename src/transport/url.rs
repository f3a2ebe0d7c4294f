// RTMP URL surface

use url::Url;

use crate::error::RtmpError;

/// RTMP URL schemes and their transports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtmpScheme {
    /// Plain TCP
    Rtmp,
    /// TLS-wrapped TCP
    Rtmps,
    /// HTTP tunneling
    Rtmpt,
    /// HTTP tunneling, unencrypted variant of rtmpte
    Rtmpte,
    /// HTTPS tunneling
    Rtmpts,
}

impl RtmpScheme {
    fn parse(scheme: &str) -> Result<RtmpScheme, RtmpError> {
        match scheme {
            "rtmp" => Ok(RtmpScheme::Rtmp),
            "rtmps" => Ok(RtmpScheme::Rtmps),
            "rtmpt" => Ok(RtmpScheme::Rtmpt),
            "rtmpte" => Ok(RtmpScheme::Rtmpte),
            "rtmpts" => Ok(RtmpScheme::Rtmpts),
            other => Err(RtmpError::InvalidUrl(format!(
                "unsupported scheme: {}",
                other
            ))),
        }
    }

    /// Default port for the scheme
    pub fn default_port(self) -> u16 {
        match self {
            RtmpScheme::Rtmp => 1935,
            RtmpScheme::Rtmps => 443,
            RtmpScheme::Rtmpt => 80,
            RtmpScheme::Rtmpte => 1935,
            RtmpScheme::Rtmpts => 443,
        }
    }

    /// Scheme name as written in URLs
    pub fn as_str(self) -> &'static str {
        match self {
            RtmpScheme::Rtmp => "rtmp",
            RtmpScheme::Rtmps => "rtmps",
            RtmpScheme::Rtmpt => "rtmpt",
            RtmpScheme::Rtmpte => "rtmpte",
            RtmpScheme::Rtmpts => "rtmpts",
        }
    }
}

/// A parsed `rtmp[s|t|te|ts]://host[:port]/app/streamKey` URL
///
/// The path needs at least two segments; the last one is the stream
/// key and everything before it is the application name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtmpUrl {
    pub scheme: RtmpScheme,
    pub host: String,
    pub port: u16,
    pub app: String,
    pub stream_key: String,
}

impl RtmpUrl {
    /// Parses an RTMP URL
    pub fn parse(input: &str) -> Result<RtmpUrl, RtmpError> {
        let url = Url::parse(input).map_err(|e| RtmpError::InvalidUrl(e.to_string()))?;

        let scheme = RtmpScheme::parse(url.scheme())?;

        let host = url
            .host_str()
            .ok_or_else(|| RtmpError::InvalidUrl("missing host".to_string()))?
            .to_string();

        let port = url.port().unwrap_or_else(|| scheme.default_port());

        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        if segments.len() < 2 {
            return Err(RtmpError::InvalidUrl(
                "path must be /app/streamKey".to_string(),
            ));
        }

        let stream_key = segments[segments.len() - 1].to_string();
        let app = segments[..segments.len() - 1].join("/");

        Ok(RtmpUrl {
            scheme,
            host,
            port,
            app,
            stream_key,
        })
    }

    /// The tcUrl value sent in connect: scheme, authority and app,
    /// without the stream key
    pub fn tc_url(&self) -> String {
        format!(
            "{}://{}:{}/{}",
            self.scheme.as_str(),
            self.host,
            self.port,
            self.app
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_url() {
        let url = RtmpUrl::parse("rtmp://media.example.com/live/abcd1234").unwrap();

        assert_eq!(url.scheme, RtmpScheme::Rtmp);
        assert_eq!(url.host, "media.example.com");
        assert_eq!(url.port, 1935);
        assert_eq!(url.app, "live");
        assert_eq!(url.stream_key, "abcd1234");
        assert_eq!(url.tc_url(), "rtmp://media.example.com:1935/live");
    }

    #[test]
    fn test_default_ports() {
        let cases = [
            ("rtmp://h/a/k", 1935),
            ("rtmps://h/a/k", 443),
            ("rtmpt://h/a/k", 80),
            ("rtmpte://h/a/k", 1935),
            ("rtmpts://h/a/k", 443),
        ];

        for (input, port) in cases {
            assert_eq!(RtmpUrl::parse(input).unwrap().port, port, "{}", input);
        }
    }

    #[test]
    fn test_explicit_port() {
        let url = RtmpUrl::parse("rtmp://localhost:19350/live/key").unwrap();
        assert_eq!(url.port, 19350);
    }

    #[test]
    fn test_multi_segment_app() {
        let url = RtmpUrl::parse("rtmp://h/live/eu-west/key").unwrap();
        assert_eq!(url.app, "live/eu-west");
        assert_eq!(url.stream_key, "key");
    }

    #[test]
    fn test_too_few_segments_rejected() {
        assert!(matches!(
            RtmpUrl::parse("rtmp://h/onlyapp"),
            Err(RtmpError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_unsupported_scheme_rejected() {
        assert!(matches!(
            RtmpUrl::parse("http://h/a/k"),
            Err(RtmpError::InvalidUrl(_))
        ));
    }
}
