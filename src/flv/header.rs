// FLV file header and tag header

use byteorder::{BigEndian, ByteOrder};

use crate::error::RtmpError;
use crate::utils::ByteCursor;

/// File signature, the first 3 bytes of every FLV file
pub const FLV_SIGNATURE: [u8; 3] = *b"FLV";

/// Current FLV version
pub const FLV_VERSION: u8 = 1;

/// Size of the file header
pub const FLV_HEADER_SIZE: u32 = 9;

/// Size of a tag header
pub const FLV_TAG_HEADER_SIZE: usize = 11;

/// FLV tag types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FlvTagType {
    Audio = 8,
    Video = 9,
    Script = 18,
}

impl TryFrom<u8> for FlvTagType {
    type Error = RtmpError;

    fn try_from(value: u8) -> Result<FlvTagType, RtmpError> {
        match value {
            8 => Ok(FlvTagType::Audio),
            9 => Ok(FlvTagType::Video),
            18 => Ok(FlvTagType::Script),
            other => Err(RtmpError::invalid_format(format!(
                "unknown FLV tag type: {}",
                other
            ))),
        }
    }
}

/// The 9-byte FLV file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlvFileHeader {
    pub version: u8,
    pub has_audio: bool,
    pub has_video: bool,
    pub data_offset: u32,
}

impl FlvFileHeader {
    /// Creates a header for the given track presence flags
    pub fn new(has_audio: bool, has_video: bool) -> FlvFileHeader {
        FlvFileHeader {
            version: FLV_VERSION,
            has_audio,
            has_video,
            data_offset: FLV_HEADER_SIZE,
        }
    }

    /// Serializes the file header
    pub fn encode(&self) -> [u8; 9] {
        let mut out = [0; 9];

        out[0..3].copy_from_slice(&FLV_SIGNATURE);
        out[3] = self.version;
        out[4] = ((self.has_audio as u8) << 2) | (self.has_video as u8);
        BigEndian::write_u32(&mut out[5..9], self.data_offset);

        out
    }

    /// Parses the file header, validating the signature
    pub fn parse(data: &[u8]) -> Result<FlvFileHeader, RtmpError> {
        if data.len() < 9 {
            return Err(RtmpError::invalid_format("FLV header is truncated"));
        }

        if data[0..3] != FLV_SIGNATURE {
            return Err(RtmpError::invalid_format("bad FLV signature"));
        }

        let flags = data[4];

        Ok(FlvFileHeader {
            version: data[3],
            has_audio: flags & 0x04 != 0,
            has_video: flags & 0x01 != 0,
            data_offset: BigEndian::read_u32(&data[5..9]),
        })
    }
}

/// The 11-byte header preceding every FLV tag body
///
/// The same header layout frames the audio/video bodies RTMP carries,
/// so this type is shared between the container and the wire layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlvTagHeader {
    pub tag_type: FlvTagType,

    /// Length of the body, excluding this header
    pub data_size: u32,

    /// Milliseconds, relative to the first tag of the stream
    pub timestamp: u32,

    /// Always 0 in practice
    pub stream_id: u32,
}

impl FlvTagHeader {
    /// Serializes the tag header
    pub fn encode(&self, out: &mut Vec<u8>) {
        let mut buf = [0; FLV_TAG_HEADER_SIZE];

        buf[0] = self.tag_type as u8;
        BigEndian::write_u24(&mut buf[1..4], self.data_size);
        // Lower 24 bits first, the extension byte carries bits 24..32
        BigEndian::write_u24(&mut buf[4..7], self.timestamp & 0x00FF_FFFF);
        buf[7] = (self.timestamp >> 24) as u8;
        BigEndian::write_u24(&mut buf[8..11], self.stream_id);

        out.extend_from_slice(&buf);
    }

    /// Parses a tag header, rejecting encrypted tags
    pub fn parse(data: &[u8]) -> Result<FlvTagHeader, RtmpError> {
        let mut cursor = ByteCursor::new(data);

        let first = cursor.read_u8()?;

        // Bit 5 is the filter (encryption) flag
        if first & 0x20 != 0 {
            return Err(RtmpError::UnsupportedFeature("encrypted FLV tag"));
        }

        let tag_type = FlvTagType::try_from(first & 0x1F)?;
        let data_size = cursor.read_u24()?;
        let timestamp_low = cursor.read_u24()?;
        let timestamp_ext = cursor.read_u8()?;
        let stream_id = cursor.read_u24()?;

        Ok(FlvTagHeader {
            tag_type,
            data_size,
            timestamp: ((timestamp_ext as u32) << 24) | timestamp_low,
            stream_id,
        })
    }

    /// Total size of the tag, header included, as recorded in the
    /// following PreviousTagSize field
    pub fn total_size(&self) -> u32 {
        FLV_TAG_HEADER_SIZE as u32 + self.data_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_header_audio_video() {
        let header = FlvFileHeader::new(true, true);
        assert_eq!(
            header.encode().to_vec(),
            hex::decode("464C56010500000009").unwrap()
        );

        let parsed = FlvFileHeader::parse(&header.encode()).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_file_header_flags() {
        let audio_only = FlvFileHeader::new(true, false).encode();
        assert_eq!(audio_only[4], 0x04);

        let video_only = FlvFileHeader::new(false, true).encode();
        assert_eq!(video_only[4], 0x01);
    }

    #[test]
    fn test_bad_signature() {
        let mut bytes = FlvFileHeader::new(true, true).encode();
        bytes[0] = b'X';
        assert!(matches!(
            FlvFileHeader::parse(&bytes),
            Err(RtmpError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_tag_header_round_trip() {
        let header = FlvTagHeader {
            tag_type: FlvTagType::Video,
            data_size: 1024,
            timestamp: 0x0123_4567,
            stream_id: 0,
        };

        let mut out = Vec::new();
        header.encode(&mut out);
        assert_eq!(out.len(), FLV_TAG_HEADER_SIZE);

        // Extended timestamp byte holds the high bits
        assert_eq!(out[7], 0x01);
        assert_eq!(&out[4..7], &[0x23, 0x45, 0x67]);

        assert_eq!(FlvTagHeader::parse(&out).unwrap(), header);
    }

    #[test]
    fn test_encrypted_tag_rejected() {
        let header = FlvTagHeader {
            tag_type: FlvTagType::Audio,
            data_size: 2,
            timestamp: 0,
            stream_id: 0,
        };

        let mut out = Vec::new();
        header.encode(&mut out);
        out[0] |= 0x20;

        assert!(matches!(
            FlvTagHeader::parse(&out),
            Err(RtmpError::UnsupportedFeature(_))
        ));
    }
}
