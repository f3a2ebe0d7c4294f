// FLV video tag bodies, legacy and extended

use byteorder::{BigEndian, ByteOrder};

use crate::error::RtmpError;
use crate::utils::ByteCursor;

use super::{FourCc, MultitrackBody};

/// Video frame classification, the high bits of the first body byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    Keyframe = 1,
    Interframe = 2,
    DisposableInterframe = 3,
    GeneratedKeyframe = 4,
    CommandFrame = 5,
}

impl TryFrom<u8> for FrameType {
    type Error = RtmpError;

    fn try_from(value: u8) -> Result<FrameType, RtmpError> {
        match value {
            1 => Ok(FrameType::Keyframe),
            2 => Ok(FrameType::Interframe),
            3 => Ok(FrameType::DisposableInterframe),
            4 => Ok(FrameType::GeneratedKeyframe),
            5 => Ok(FrameType::CommandFrame),
            other => Err(RtmpError::invalid_format(format!(
                "unknown frame type: {}",
                other
            ))),
        }
    }
}

/// Legacy video codec ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VideoCodecId {
    SorensonH263 = 2,
    ScreenVideo = 3,
    On2Vp6 = 4,
    On2Vp6Alpha = 5,
    ScreenVideo2 = 6,
    Avc = 7,
}

impl TryFrom<u8> for VideoCodecId {
    type Error = RtmpError;

    fn try_from(value: u8) -> Result<VideoCodecId, RtmpError> {
        match value {
            2 => Ok(VideoCodecId::SorensonH263),
            3 => Ok(VideoCodecId::ScreenVideo),
            4 => Ok(VideoCodecId::On2Vp6),
            5 => Ok(VideoCodecId::On2Vp6Alpha),
            6 => Ok(VideoCodecId::ScreenVideo2),
            7 => Ok(VideoCodecId::Avc),
            other => Err(RtmpError::invalid_format(format!(
                "unknown video codec id: {}",
                other
            ))),
        }
    }
}

/// Legacy AVC body framing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AvcPacketType {
    SequenceHeader = 0,
    Nalu = 1,
    EndOfSequence = 2,
}

impl TryFrom<u8> for AvcPacketType {
    type Error = RtmpError;

    fn try_from(value: u8) -> Result<AvcPacketType, RtmpError> {
        match value {
            0 => Ok(AvcPacketType::SequenceHeader),
            1 => Ok(AvcPacketType::Nalu),
            2 => Ok(AvcPacketType::EndOfSequence),
            other => Err(RtmpError::invalid_format(format!(
                "unknown AVC packet type: {}",
                other
            ))),
        }
    }
}

/// Extended video packet types, the low nibble of the first byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VideoPacketType {
    SequenceStart = 0,
    CodedFrames = 1,
    SequenceEnd = 2,
    /// Coded frames with an implicit composition time of zero
    CodedFramesX = 3,
    Metadata = 4,
    Mpeg2TsSequenceStart = 5,
    Multitrack = 6,
}

impl TryFrom<u8> for VideoPacketType {
    type Error = RtmpError;

    fn try_from(value: u8) -> Result<VideoPacketType, RtmpError> {
        match value {
            0 => Ok(VideoPacketType::SequenceStart),
            1 => Ok(VideoPacketType::CodedFrames),
            2 => Ok(VideoPacketType::SequenceEnd),
            3 => Ok(VideoPacketType::CodedFramesX),
            4 => Ok(VideoPacketType::Metadata),
            5 => Ok(VideoPacketType::Mpeg2TsSequenceStart),
            6 => Ok(VideoPacketType::Multitrack),
            other => Err(RtmpError::invalid_format(format!(
                "unknown video packet type: {}",
                other
            ))),
        }
    }
}

/// Enhanced video codec identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoFourCc {
    Avc,
    Hevc,
    Av1,
    Vp9,
    Vp8,
}

impl VideoFourCc {
    /// True for codecs whose coded frames carry a composition time offset
    pub fn has_composition_time(self) -> bool {
        matches!(self, VideoFourCc::Avc | VideoFourCc::Hevc)
    }
}

impl FourCc for VideoFourCc {
    fn to_bytes(self) -> [u8; 4] {
        match self {
            VideoFourCc::Avc => *b"avc1",
            VideoFourCc::Hevc => *b"hvc1",
            VideoFourCc::Av1 => *b"av01",
            VideoFourCc::Vp9 => *b"vp09",
            VideoFourCc::Vp8 => *b"vp08",
        }
    }

    fn parse(bytes: [u8; 4]) -> Result<VideoFourCc, RtmpError> {
        match &bytes {
            b"avc1" => Ok(VideoFourCc::Avc),
            b"hvc1" => Ok(VideoFourCc::Hevc),
            b"av01" => Ok(VideoFourCc::Av1),
            b"vp09" => Ok(VideoFourCc::Vp9),
            b"vp08" => Ok(VideoFourCc::Vp8),
            other => Err(RtmpError::invalid_format(format!(
                "unknown video FourCC: {:?}",
                String::from_utf8_lossy(other)
            ))),
        }
    }
}

/// Parsed video tag body
#[derive(Debug, Clone, PartialEq)]
pub enum VideoTag {
    Legacy(LegacyVideoTag),
    Extended(ExVideoTag),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyVideoTag {
    pub frame_type: FrameType,
    pub body: LegacyVideoBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LegacyVideoBody {
    /// AVC carries framing byte, composition time and AVCC NALUs
    Avc {
        packet_type: AvcPacketType,
        /// Signed 24-bit offset between decode and presentation time
        composition_time: i32,
        data: Vec<u8>,
    },
    Other {
        codec_id: VideoCodecId,
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExVideoTag {
    pub frame_type: FrameType,
    pub packet_type: VideoPacketType,
    pub body: ExVideoBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExVideoBody {
    SingleTrack {
        four_cc: VideoFourCc,
        /// Present for CodedFrames of codecs with a composition time
        composition_time: Option<i32>,
        data: Vec<u8>,
    },
    Multitrack(MultitrackBody<VideoFourCc>),
}

impl VideoTag {
    /// Parses a video tag body
    pub fn parse(data: &[u8]) -> Result<VideoTag, RtmpError> {
        let mut cursor = ByteCursor::new(data);
        let head = cursor.read_u8()?;

        // The high bit selects the extended header layout
        if head & 0x80 != 0 {
            return Ok(VideoTag::Extended(Self::parse_extended(head, &mut cursor)?));
        }

        let frame_type = FrameType::try_from(head >> 4)?;
        let codec_id = VideoCodecId::try_from(head & 0x0F)?;

        let body = if codec_id == VideoCodecId::Avc {
            let packet_type = AvcPacketType::try_from(cursor.read_u8()?)?;
            let composition_time = cursor.read_i24()?;

            LegacyVideoBody::Avc {
                packet_type,
                composition_time,
                data: cursor.read_remaining().to_vec(),
            }
        } else {
            LegacyVideoBody::Other {
                codec_id,
                data: cursor.read_remaining().to_vec(),
            }
        };

        Ok(VideoTag::Legacy(LegacyVideoTag { frame_type, body }))
    }

    fn parse_extended(head: u8, cursor: &mut ByteCursor) -> Result<ExVideoTag, RtmpError> {
        let frame_type = FrameType::try_from((head >> 4) & 0x07)?;
        let packet_type = VideoPacketType::try_from(head & 0x0F)?;

        let body = if packet_type == VideoPacketType::Multitrack {
            ExVideoBody::Multitrack(MultitrackBody::parse(cursor)?)
        } else {
            let four_cc = VideoFourCc::parse(cursor.read_four_bytes()?)?;

            let composition_time = if packet_type == VideoPacketType::CodedFrames
                && four_cc.has_composition_time()
            {
                Some(cursor.read_i24()?)
            } else {
                None
            };

            ExVideoBody::SingleTrack {
                four_cc,
                composition_time,
                data: cursor.read_remaining().to_vec(),
            }
        };

        Ok(ExVideoTag {
            frame_type,
            packet_type,
            body,
        })
    }

    /// Serializes the video tag body
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), RtmpError> {
        match self {
            VideoTag::Legacy(tag) => {
                match &tag.body {
                    LegacyVideoBody::Avc {
                        packet_type,
                        composition_time,
                        data,
                    } => {
                        out.push(((tag.frame_type as u8) << 4) | (VideoCodecId::Avc as u8));
                        out.push(*packet_type as u8);

                        let mut ct = [0; 3];
                        BigEndian::write_i24(&mut ct, *composition_time);
                        out.extend_from_slice(&ct);
                        out.extend_from_slice(data);
                    }
                    LegacyVideoBody::Other { codec_id, data } => {
                        out.push(((tag.frame_type as u8) << 4) | (*codec_id as u8));
                        out.extend_from_slice(data);
                    }
                }

                Ok(())
            }
            VideoTag::Extended(tag) => {
                out.push(0x80 | ((tag.frame_type as u8) << 4) | (tag.packet_type as u8));

                match &tag.body {
                    ExVideoBody::SingleTrack {
                        four_cc,
                        composition_time,
                        data,
                    } => {
                        out.extend_from_slice(&four_cc.to_bytes());

                        if tag.packet_type == VideoPacketType::CodedFrames
                            && four_cc.has_composition_time()
                        {
                            let mut ct = [0; 3];
                            BigEndian::write_i24(&mut ct, composition_time.unwrap_or(0));
                            out.extend_from_slice(&ct);
                        }

                        out.extend_from_slice(data);
                        Ok(())
                    }
                    ExVideoBody::Multitrack(body) => body.encode(out),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flv::{AvMultitrackType, Track};

    fn round_trip(tag: VideoTag) {
        let mut out = Vec::new();
        tag.encode(&mut out).unwrap();
        assert_eq!(VideoTag::parse(&out).unwrap(), tag);
    }

    #[test]
    fn test_avc_keyframe_round_trip() {
        round_trip(VideoTag::Legacy(LegacyVideoTag {
            frame_type: FrameType::Keyframe,
            body: LegacyVideoBody::Avc {
                packet_type: AvcPacketType::Nalu,
                composition_time: -40,
                data: vec![0x00, 0x00, 0x00, 0x02, 0x09, 0xF0],
            },
        }));
    }

    #[test]
    fn test_avc_sequence_header_byte() {
        let tag = VideoTag::Legacy(LegacyVideoTag {
            frame_type: FrameType::Keyframe,
            body: LegacyVideoBody::Avc {
                packet_type: AvcPacketType::SequenceHeader,
                composition_time: 0,
                data: vec![0x01, 0x64, 0x00, 0x1F],
            },
        });

        let mut out = Vec::new();
        tag.encode(&mut out).unwrap();
        // Keyframe + AVC packs to 0x17, then packet type 0, CT 0
        assert_eq!(&out[0..5], &[0x17, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_sorenson_round_trip() {
        round_trip(VideoTag::Legacy(LegacyVideoTag {
            frame_type: FrameType::Interframe,
            body: LegacyVideoBody::Other {
                codec_id: VideoCodecId::SorensonH263,
                data: vec![0x11, 0x22],
            },
        }));
    }

    #[test]
    fn test_extended_hevc_coded_frames() {
        round_trip(VideoTag::Extended(ExVideoTag {
            frame_type: FrameType::Keyframe,
            packet_type: VideoPacketType::CodedFrames,
            body: ExVideoBody::SingleTrack {
                four_cc: VideoFourCc::Hevc,
                composition_time: Some(80),
                data: vec![0x00, 0x00, 0x00, 0x01, 0x40],
            },
        }));
    }

    #[test]
    fn test_extended_av1_has_no_composition_time() {
        let tag = VideoTag::Extended(ExVideoTag {
            frame_type: FrameType::Keyframe,
            packet_type: VideoPacketType::CodedFrames,
            body: ExVideoBody::SingleTrack {
                four_cc: VideoFourCc::Av1,
                composition_time: None,
                data: vec![0x12, 0x00],
            },
        });

        let mut out = Vec::new();
        tag.encode(&mut out).unwrap();
        // Header byte + FourCC, then straight into the payload
        assert_eq!(&out[1..5], b"av01");
        assert_eq!(&out[5..], &[0x12, 0x00]);
        round_trip(tag);
    }

    #[test]
    fn test_extended_coded_frames_x_omits_composition_time() {
        round_trip(VideoTag::Extended(ExVideoTag {
            frame_type: FrameType::Interframe,
            packet_type: VideoPacketType::CodedFramesX,
            body: ExVideoBody::SingleTrack {
                four_cc: VideoFourCc::Hevc,
                composition_time: None,
                data: vec![0xAB],
            },
        }));
    }

    #[test]
    fn test_extended_bit_detected() {
        let mut out = Vec::new();
        VideoTag::Extended(ExVideoTag {
            frame_type: FrameType::Keyframe,
            packet_type: VideoPacketType::SequenceStart,
            body: ExVideoBody::SingleTrack {
                four_cc: VideoFourCc::Vp9,
                composition_time: None,
                data: vec![],
            },
        })
        .encode(&mut out)
        .unwrap();

        assert_eq!(out[0], 0x90);
        assert_eq!(&out[1..5], b"vp09");
    }

    #[test]
    fn test_multitrack_many_codecs() {
        round_trip(VideoTag::Extended(ExVideoTag {
            frame_type: FrameType::Keyframe,
            packet_type: VideoPacketType::Multitrack,
            body: ExVideoBody::Multitrack(MultitrackBody {
                multitrack_type: AvMultitrackType::ManyTracksManyCodecs,
                packet_type: VideoPacketType::CodedFramesX as u8,
                tracks: vec![
                    Track {
                        track_id: 0,
                        four_cc: VideoFourCc::Hevc,
                        data: vec![0x01; 6],
                    },
                    Track {
                        track_id: 1,
                        four_cc: VideoFourCc::Av1,
                        data: vec![0x02; 3],
                    },
                ],
            }),
        }));
    }
}
