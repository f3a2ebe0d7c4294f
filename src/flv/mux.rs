// FLV muxer

use byteorder::{BigEndian, ByteOrder};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::RtmpError;

use super::{FlvFileHeader, FlvTagHeader, FlvTagType, ScriptData};

/// Writes FLV files from pre-formed tag bodies
///
/// The muxer does no bitstream parsing: audio and video bodies arrive
/// already framed (see AudioTag/VideoTag). The 9-byte file header and
/// PreviousTagSize0 are emitted lazily before the first tag.
pub struct FlvMuxer<W: AsyncWrite + Unpin> {
    writer: W,
    has_audio: bool,
    has_video: bool,
    header_written: bool,
}

impl<W: AsyncWrite + Unpin> FlvMuxer<W> {
    /// Creates a muxer. The flags declare which track kinds the file
    /// will carry, for the file header.
    pub fn new(writer: W, has_audio: bool, has_video: bool) -> FlvMuxer<W> {
        FlvMuxer {
            writer,
            has_audio,
            has_video,
            header_written: false,
        }
    }

    /// Writes one tag: 11-byte header, body, PreviousTagSize
    pub async fn write_tag(
        &mut self,
        tag_type: FlvTagType,
        timestamp: u32,
        body: &[u8],
    ) -> Result<(), RtmpError> {
        let mut buf = Vec::with_capacity(body.len() + 24);

        if !self.header_written {
            buf.extend_from_slice(&FlvFileHeader::new(self.has_audio, self.has_video).encode());
            // PreviousTagSize0
            buf.extend_from_slice(&[0, 0, 0, 0]);
            self.header_written = true;
        }

        let header = FlvTagHeader {
            tag_type,
            data_size: body.len() as u32,
            timestamp,
            stream_id: 0,
        };

        header.encode(&mut buf);
        buf.extend_from_slice(body);

        let mut prev_size = [0; 4];
        BigEndian::write_u32(&mut prev_size, header.total_size());
        buf.extend_from_slice(&prev_size);

        self.writer.write_all(&buf).await?;
        Ok(())
    }

    /// Writes an audio tag body
    pub async fn write_audio(&mut self, timestamp: u32, body: &[u8]) -> Result<(), RtmpError> {
        self.write_tag(FlvTagType::Audio, timestamp, body).await
    }

    /// Writes a video tag body
    pub async fn write_video(&mut self, timestamp: u32, body: &[u8]) -> Result<(), RtmpError> {
        self.write_tag(FlvTagType::Video, timestamp, body).await
    }

    /// Writes a script tag at timestamp 0
    pub async fn write_script(&mut self, script: &ScriptData) -> Result<(), RtmpError> {
        self.write_script_at(0, script).await
    }

    /// Writes a script tag at a caller-chosen timestamp
    pub async fn write_script_at(
        &mut self,
        timestamp: u32,
        script: &ScriptData,
    ) -> Result<(), RtmpError> {
        let mut body = Vec::new();
        script.encode(&mut body);
        self.write_tag(FlvTagType::Script, timestamp, &body).await
    }

    /// Flushes the underlying writer
    pub async fn flush(&mut self) -> Result<(), RtmpError> {
        self.writer.flush().await?;
        Ok(())
    }

    /// Consumes the muxer, returning the writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf::Amf0Value;

    #[tokio::test]
    async fn test_file_header_emitted_once() {
        let mut muxer = FlvMuxer::new(Vec::new(), true, true);

        muxer.write_audio(0, &[0xAF, 0x00, 0x12, 0x10]).await.unwrap();
        muxer.write_audio(23, &[0xAF, 0x01, 0x21]).await.unwrap();

        let bytes = muxer.into_inner();

        // Signature + version + flags + offset, then PreviousTagSize0
        assert_eq!(&bytes[0..9], &hex::decode("464C56010500000009").unwrap()[..]);
        assert_eq!(&bytes[9..13], &[0, 0, 0, 0]);

        // First tag header starts right after
        assert_eq!(bytes[13], FlvTagType::Audio as u8);
    }

    #[tokio::test]
    async fn test_previous_tag_size_tracks_tag() {
        let body = [0xAF, 0x01, 0x01, 0x02, 0x03];
        let mut muxer = FlvMuxer::new(Vec::new(), true, false);
        muxer.write_audio(0, &body).await.unwrap();

        let bytes = muxer.into_inner();
        let total = 11 + body.len() as u32;
        let trailer = &bytes[bytes.len() - 4..];

        assert_eq!(BigEndian::read_u32(trailer), total);
    }

    #[tokio::test]
    async fn test_script_timestamp_defaults_to_zero() {
        let script = ScriptData::on_meta_data(vec![(
            "duration".to_string(),
            Amf0Value::Number(0.0),
        )]);

        let mut muxer = FlvMuxer::new(Vec::new(), false, true);
        muxer.write_script(&script).await.unwrap();

        let bytes = muxer.into_inner();
        let header = FlvTagHeader::parse(&bytes[13..24]).unwrap();

        assert_eq!(header.tag_type, FlvTagType::Script);
        assert_eq!(header.timestamp, 0);
    }
}
