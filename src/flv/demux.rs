// FLV demuxer

use tokio::io::{AsyncRead, AsyncReadExt};

use byteorder::{BigEndian, ByteOrder};

use crate::error::RtmpError;

use super::{
    AudioTag, FlvFileHeader, FlvTagHeader, FlvTagType, ScriptData, VideoTag, FLV_HEADER_SIZE,
    FLV_TAG_HEADER_SIZE,
};

/// A fully parsed tag
#[derive(Debug, Clone, PartialEq)]
pub struct FlvTag {
    pub header: FlvTagHeader,
    pub data: FlvTagData,
}

/// Parsed tag bodies per tag type
#[derive(Debug, Clone, PartialEq)]
pub enum FlvTagData {
    Audio(AudioTag),
    Video(VideoTag),
    Script(ScriptData),
}

/// Reads FLV files tag by tag
///
/// Two reading modes: `next_tag` parses bodies into the tag model,
/// `next_tag_raw` hands back the header plus the raw body so callers
/// can copy tags without a re-parse.
pub struct FlvDemuxer<R: AsyncRead + Unpin> {
    reader: R,
    file_header: Option<FlvFileHeader>,
    last_tag_size: u32,
}

impl<R: AsyncRead + Unpin> FlvDemuxer<R> {
    pub fn new(reader: R) -> FlvDemuxer<R> {
        FlvDemuxer {
            reader,
            file_header: None,
            last_tag_size: 0,
        }
    }

    /// Reads and validates the 9-byte file header
    pub async fn read_header(&mut self) -> Result<FlvFileHeader, RtmpError> {
        if let Some(header) = self.file_header {
            return Ok(header);
        }

        let mut buf = [0; 9];
        self.reader.read_exact(&mut buf).await?;

        let header = FlvFileHeader::parse(&buf)?;

        // Versions beyond 1 may extend the header, skip the extra bytes
        if header.data_offset > FLV_HEADER_SIZE {
            let mut skip = vec![0; (header.data_offset - FLV_HEADER_SIZE) as usize];
            self.reader.read_exact(&mut skip).await?;
        }

        self.file_header = Some(header);
        Ok(header)
    }

    /// Reads the next tag and parses its body.
    /// Returns None once the file is exhausted.
    pub async fn next_tag(&mut self) -> Result<Option<FlvTag>, RtmpError> {
        let (header, body) = match self.next_tag_raw().await? {
            Some(raw) => raw,
            None => return Ok(None),
        };

        let data = match header.tag_type {
            FlvTagType::Audio => FlvTagData::Audio(AudioTag::parse(&body)?),
            FlvTagType::Video => FlvTagData::Video(VideoTag::parse(&body)?),
            FlvTagType::Script => FlvTagData::Script(ScriptData::parse(&body)?),
        };

        Ok(Some(FlvTag { header, data }))
    }

    /// Reads the next tag without parsing the body.
    /// Returns None once the file is exhausted.
    pub async fn next_tag_raw(
        &mut self,
    ) -> Result<Option<(FlvTagHeader, Vec<u8>)>, RtmpError> {
        if self.file_header.is_none() {
            self.read_header().await?;
        }

        // PreviousTagSize of the tag before this one
        let first = match self.read_byte_or_eof().await? {
            Some(byte) => byte,
            None => return Ok(None),
        };

        let mut rest = [0; 3];
        self.reader.read_exact(&mut rest).await?;

        let prev_size =
            ((first as u32) << 24) | BigEndian::read_u24(&rest);

        if prev_size != self.last_tag_size {
            return Err(RtmpError::invalid_format(format!(
                "PreviousTagSize is {} but the preceding tag took {} bytes",
                prev_size, self.last_tag_size
            )));
        }

        // Fewer than 5 bytes left after the trailer means the file ends here
        let first = match self.read_byte_or_eof().await? {
            Some(byte) => byte,
            None => return Ok(None),
        };

        let mut header_buf = [0; FLV_TAG_HEADER_SIZE];
        header_buf[0] = first;
        self.reader.read_exact(&mut header_buf[1..]).await?;

        let header = FlvTagHeader::parse(&header_buf)?;

        let mut body = vec![0; header.data_size as usize];
        self.reader.read_exact(&mut body).await?;

        self.last_tag_size = header.total_size();

        Ok(Some((header, body)))
    }

    async fn read_byte_or_eof(&mut self) -> Result<Option<u8>, RtmpError> {
        let mut byte = [0; 1];

        match self.reader.read(&mut byte).await? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf::Amf0Value;
    use crate::flv::{
        AacPacketType, FlvMuxer, LegacyAudioBody, LegacyAudioTag, SoundFormat, SoundRate,
        SoundSize, SoundType,
    };

    async fn sample_file() -> Vec<u8> {
        let mut muxer = FlvMuxer::new(Vec::new(), true, true);

        let script = ScriptData::on_meta_data(vec![(
            "audiocodecid".to_string(),
            Amf0Value::Number(10.0),
        )]);
        muxer.write_script(&script).await.unwrap();

        let audio = AudioTag::Legacy(LegacyAudioTag {
            sound_format: SoundFormat::Aac,
            sound_rate: SoundRate::Hz44100,
            sound_size: SoundSize::Bits16,
            sound_type: SoundType::Stereo,
            body: LegacyAudioBody::Aac {
                packet_type: AacPacketType::Raw,
                data: vec![0x21, 0x42],
            },
        });

        let mut body = Vec::new();
        audio.encode(&mut body).unwrap();
        muxer.write_audio(40, &body).await.unwrap();
        muxer.write_video(40, &[0x17, 0x01, 0x00, 0x00, 0x00, 0x65]).await.unwrap();

        muxer.into_inner()
    }

    #[tokio::test]
    async fn test_demux_parses_all_tags() {
        let file = sample_file().await;
        let mut demuxer = FlvDemuxer::new(&file[..]);

        let header = demuxer.read_header().await.unwrap();
        assert!(header.has_audio);
        assert!(header.has_video);

        let script = demuxer.next_tag().await.unwrap().unwrap();
        assert!(matches!(script.data, FlvTagData::Script(_)));
        assert_eq!(script.header.timestamp, 0);

        let audio = demuxer.next_tag().await.unwrap().unwrap();
        assert_eq!(audio.header.timestamp, 40);
        assert!(matches!(audio.data, FlvTagData::Audio(_)));

        let video = demuxer.next_tag().await.unwrap().unwrap();
        assert!(matches!(video.data, FlvTagData::Video(_)));

        assert!(demuxer.next_tag().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_raw_mode_returns_body_bytes() {
        let file = sample_file().await;
        let mut demuxer = FlvDemuxer::new(&file[..]);

        let (header, body) = demuxer.next_tag_raw().await.unwrap().unwrap();
        assert_eq!(header.tag_type, FlvTagType::Script);
        assert_eq!(body.len(), header.data_size as usize);

        // The raw body re-parses to the same script data
        assert!(ScriptData::parse(&body).is_ok());
    }

    #[tokio::test]
    async fn test_previous_tag_size_mismatch_rejected() {
        let mut file = sample_file().await;

        // Corrupt the PreviousTagSize trailer after the first tag
        let first_trailer = 9 + 4 + 11 + {
            let header = FlvTagHeader::parse(&file[13..24]).unwrap();
            header.data_size as usize
        };
        file[first_trailer] ^= 0xFF;

        let mut demuxer = FlvDemuxer::new(&file[..]);
        demuxer.next_tag().await.unwrap();

        assert!(matches!(
            demuxer.next_tag().await,
            Err(RtmpError::InvalidFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_round_trip_preserves_tags() {
        let file = sample_file().await;

        // Copy via raw mode into a second muxer
        let mut demuxer = FlvDemuxer::new(&file[..]);
        let mut muxer = FlvMuxer::new(Vec::new(), true, true);

        while let Some((header, body)) = demuxer.next_tag_raw().await.unwrap() {
            muxer
                .write_tag(header.tag_type, header.timestamp, &body)
                .await
                .unwrap();
        }

        assert_eq!(muxer.into_inner(), file);
    }
}
