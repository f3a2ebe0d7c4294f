// FLV audio tag bodies, legacy and extended

use crate::error::RtmpError;
use crate::utils::ByteCursor;

use super::{FourCc, MultitrackBody};

/// Legacy SoundFormat codes, the high nibble of the first body byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SoundFormat {
    Lpcm = 0,
    Adpcm = 1,
    Mp3 = 2,
    LpcmLittleEndian = 3,
    Nellymoser16kMono = 4,
    Nellymoser8kMono = 5,
    Nellymoser = 6,
    G711ALaw = 7,
    G711MuLaw = 8,
    /// Escape into the extended (FourCC) audio header
    ExHeader = 9,
    Aac = 10,
    Speex = 11,
    Mp38k = 14,
    DeviceSpecific = 15,
}

impl TryFrom<u8> for SoundFormat {
    type Error = RtmpError;

    fn try_from(value: u8) -> Result<SoundFormat, RtmpError> {
        match value {
            0 => Ok(SoundFormat::Lpcm),
            1 => Ok(SoundFormat::Adpcm),
            2 => Ok(SoundFormat::Mp3),
            3 => Ok(SoundFormat::LpcmLittleEndian),
            4 => Ok(SoundFormat::Nellymoser16kMono),
            5 => Ok(SoundFormat::Nellymoser8kMono),
            6 => Ok(SoundFormat::Nellymoser),
            7 => Ok(SoundFormat::G711ALaw),
            8 => Ok(SoundFormat::G711MuLaw),
            9 => Ok(SoundFormat::ExHeader),
            10 => Ok(SoundFormat::Aac),
            11 => Ok(SoundFormat::Speex),
            14 => Ok(SoundFormat::Mp38k),
            15 => Ok(SoundFormat::DeviceSpecific),
            other => Err(RtmpError::invalid_format(format!(
                "unknown sound format: {}",
                other
            ))),
        }
    }
}

/// Nominal sampling rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SoundRate {
    Hz5500 = 0,
    Hz11025 = 1,
    Hz22050 = 2,
    Hz44100 = 3,
}

impl From<u8> for SoundRate {
    fn from(value: u8) -> SoundRate {
        match value & 0x03 {
            0 => SoundRate::Hz5500,
            1 => SoundRate::Hz11025,
            2 => SoundRate::Hz22050,
            _ => SoundRate::Hz44100,
        }
    }
}

/// Sample width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SoundSize {
    Bits8 = 0,
    Bits16 = 1,
}

/// Channel layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SoundType {
    Mono = 0,
    Stereo = 1,
}

/// AAC body framing, present when SoundFormat is AAC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AacPacketType {
    SequenceHeader = 0,
    Raw = 1,
}

impl TryFrom<u8> for AacPacketType {
    type Error = RtmpError;

    fn try_from(value: u8) -> Result<AacPacketType, RtmpError> {
        match value {
            0 => Ok(AacPacketType::SequenceHeader),
            1 => Ok(AacPacketType::Raw),
            other => Err(RtmpError::invalid_format(format!(
                "unknown AAC packet type: {}",
                other
            ))),
        }
    }
}

/// Extended audio packet types, the low nibble of the first byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AudioPacketType {
    SequenceStart = 0,
    CodedFrames = 1,
    SequenceEnd = 2,
    MultichannelConfig = 4,
    Multitrack = 5,
}

impl TryFrom<u8> for AudioPacketType {
    type Error = RtmpError;

    fn try_from(value: u8) -> Result<AudioPacketType, RtmpError> {
        match value {
            0 => Ok(AudioPacketType::SequenceStart),
            1 => Ok(AudioPacketType::CodedFrames),
            2 => Ok(AudioPacketType::SequenceEnd),
            4 => Ok(AudioPacketType::MultichannelConfig),
            5 => Ok(AudioPacketType::Multitrack),
            other => Err(RtmpError::invalid_format(format!(
                "unknown audio packet type: {}",
                other
            ))),
        }
    }
}

/// Enhanced audio codec identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFourCc {
    Aac,
    Opus,
    Ac3,
    Eac3,
    Flac,
    Mp3,
}

impl FourCc for AudioFourCc {
    fn to_bytes(self) -> [u8; 4] {
        match self {
            AudioFourCc::Aac => *b"mp4a",
            AudioFourCc::Opus => *b"Opus",
            AudioFourCc::Ac3 => *b"ac-3",
            AudioFourCc::Eac3 => *b"ec-3",
            AudioFourCc::Flac => *b"fLaC",
            AudioFourCc::Mp3 => *b".mp3",
        }
    }

    fn parse(bytes: [u8; 4]) -> Result<AudioFourCc, RtmpError> {
        match &bytes {
            b"mp4a" => Ok(AudioFourCc::Aac),
            b"Opus" => Ok(AudioFourCc::Opus),
            b"ac-3" => Ok(AudioFourCc::Ac3),
            b"ec-3" => Ok(AudioFourCc::Eac3),
            b"fLaC" => Ok(AudioFourCc::Flac),
            b".mp3" => Ok(AudioFourCc::Mp3),
            other => Err(RtmpError::invalid_format(format!(
                "unknown audio FourCC: {:?}",
                String::from_utf8_lossy(other)
            ))),
        }
    }
}

/// Parsed audio tag body
#[derive(Debug, Clone, PartialEq)]
pub enum AudioTag {
    Legacy(LegacyAudioTag),
    Extended(ExAudioTag),
}

/// Pre-enhanced audio body: packed header byte plus codec data
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyAudioTag {
    pub sound_format: SoundFormat,
    pub sound_rate: SoundRate,
    pub sound_size: SoundSize,
    pub sound_type: SoundType,
    pub body: LegacyAudioBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LegacyAudioBody {
    /// AAC carries one extra framing byte before the payload
    Aac {
        packet_type: AacPacketType,
        data: Vec<u8>,
    },
    Other {
        data: Vec<u8>,
    },
}

/// Enhanced audio body addressed by FourCC
#[derive(Debug, Clone, PartialEq)]
pub struct ExAudioTag {
    pub packet_type: AudioPacketType,
    pub body: ExAudioBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExAudioBody {
    SingleTrack {
        four_cc: AudioFourCc,
        data: Vec<u8>,
    },
    Multitrack(MultitrackBody<AudioFourCc>),
}

impl AudioTag {
    /// Parses an audio tag body
    pub fn parse(data: &[u8]) -> Result<AudioTag, RtmpError> {
        let mut cursor = ByteCursor::new(data);
        let head = cursor.read_u8()?;
        let sound_format = SoundFormat::try_from(head >> 4)?;

        if sound_format == SoundFormat::ExHeader {
            return Ok(AudioTag::Extended(Self::parse_extended(
                head & 0x0F,
                &mut cursor,
            )?));
        }

        let sound_rate = SoundRate::from((head >> 2) & 0x03);
        let sound_size = if head & 0x02 != 0 {
            SoundSize::Bits16
        } else {
            SoundSize::Bits8
        };
        let sound_type = if head & 0x01 != 0 {
            SoundType::Stereo
        } else {
            SoundType::Mono
        };

        let body = if sound_format == SoundFormat::Aac {
            let packet_type = AacPacketType::try_from(cursor.read_u8()?)?;
            LegacyAudioBody::Aac {
                packet_type,
                data: cursor.read_remaining().to_vec(),
            }
        } else {
            LegacyAudioBody::Other {
                data: cursor.read_remaining().to_vec(),
            }
        };

        Ok(AudioTag::Legacy(LegacyAudioTag {
            sound_format,
            sound_rate,
            sound_size,
            sound_type,
            body,
        }))
    }

    fn parse_extended(
        packet_type_bits: u8,
        cursor: &mut ByteCursor,
    ) -> Result<ExAudioTag, RtmpError> {
        let packet_type = AudioPacketType::try_from(packet_type_bits)?;

        let body = if packet_type == AudioPacketType::Multitrack {
            ExAudioBody::Multitrack(MultitrackBody::parse(cursor)?)
        } else {
            let four_cc = AudioFourCc::parse(cursor.read_four_bytes()?)?;
            ExAudioBody::SingleTrack {
                four_cc,
                data: cursor.read_remaining().to_vec(),
            }
        };

        Ok(ExAudioTag { packet_type, body })
    }

    /// Serializes the audio tag body
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), RtmpError> {
        match self {
            AudioTag::Legacy(tag) => {
                out.push(
                    ((tag.sound_format as u8) << 4)
                        | ((tag.sound_rate as u8) << 2)
                        | ((tag.sound_size as u8) << 1)
                        | (tag.sound_type as u8),
                );

                match &tag.body {
                    LegacyAudioBody::Aac { packet_type, data } => {
                        out.push(*packet_type as u8);
                        out.extend_from_slice(data);
                    }
                    LegacyAudioBody::Other { data } => out.extend_from_slice(data),
                }

                Ok(())
            }
            AudioTag::Extended(tag) => {
                out.push(((SoundFormat::ExHeader as u8) << 4) | (tag.packet_type as u8));

                match &tag.body {
                    ExAudioBody::SingleTrack { four_cc, data } => {
                        out.extend_from_slice(&four_cc.to_bytes());
                        out.extend_from_slice(data);
                        Ok(())
                    }
                    ExAudioBody::Multitrack(body) => body.encode(out),
                }
            }
        }
    }
}
