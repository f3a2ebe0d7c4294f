// Enhanced multitrack descriptor
//
// Shared between the extended audio and video tag bodies: the descriptor
// layout is identical, only the FourCC alphabet differs.

use byteorder::{BigEndian, ByteOrder};

use crate::error::RtmpError;
use crate::utils::ByteCursor;

/// Codec identifier alphabet for one media kind
pub trait FourCc: Copy + Eq {
    fn to_bytes(self) -> [u8; 4];
    fn parse(bytes: [u8; 4]) -> Result<Self, RtmpError>;
}

/// How tracks and codecs are laid out inside a multitrack body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AvMultitrackType {
    OneTrack = 0,
    ManyTracks = 1,
    ManyTracksManyCodecs = 2,
}

impl TryFrom<u8> for AvMultitrackType {
    type Error = RtmpError;

    fn try_from(value: u8) -> Result<AvMultitrackType, RtmpError> {
        match value {
            0 => Ok(AvMultitrackType::OneTrack),
            1 => Ok(AvMultitrackType::ManyTracks),
            2 => Ok(AvMultitrackType::ManyTracksManyCodecs),
            other => Err(RtmpError::invalid_format(format!(
                "unknown multitrack type: {}",
                other
            ))),
        }
    }
}

/// One track inside a multitrack body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track<C> {
    pub track_id: u8,
    pub four_cc: C,
    pub data: Vec<u8>,
}

/// Parsed multitrack descriptor plus its track payloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultitrackBody<C> {
    pub multitrack_type: AvMultitrackType,

    /// Inner packet type applying to every track
    pub packet_type: u8,

    pub tracks: Vec<Track<C>>,
}

impl<C: FourCc> MultitrackBody<C> {
    /// Parses the descriptor and all track payloads.
    /// The cursor must sit on the multitrack type byte.
    pub fn parse(cursor: &mut ByteCursor) -> Result<MultitrackBody<C>, RtmpError> {
        let head = cursor.read_u8()?;
        let multitrack_type = AvMultitrackType::try_from(head >> 4)?;
        let packet_type = head & 0x0F;

        let mut tracks = Vec::new();

        match multitrack_type {
            AvMultitrackType::OneTrack => {
                // Single codec, single track, body runs to the end
                let four_cc = C::parse(cursor.read_four_bytes()?)?;
                let track_id = cursor.read_u8()?;

                tracks.push(Track {
                    track_id,
                    four_cc,
                    data: cursor.read_remaining().to_vec(),
                });
            }
            AvMultitrackType::ManyTracks => {
                let four_cc = C::parse(cursor.read_four_bytes()?)?;

                while !cursor.ended() {
                    let track_id = cursor.read_u8()?;
                    let size = cursor.read_u24()? as usize;

                    tracks.push(Track {
                        track_id,
                        four_cc,
                        data: cursor.read_bytes(size)?.to_vec(),
                    });
                }
            }
            AvMultitrackType::ManyTracksManyCodecs => {
                // The per-track FourCC takes the FourCC slot ahead of
                // each track id / length / body block
                while !cursor.ended() {
                    let four_cc = C::parse(cursor.read_four_bytes()?)?;
                    let track_id = cursor.read_u8()?;
                    let size = cursor.read_u24()? as usize;

                    tracks.push(Track {
                        track_id,
                        four_cc,
                        data: cursor.read_bytes(size)?.to_vec(),
                    });
                }
            }
        }

        if tracks.is_empty() {
            return Err(RtmpError::invalid_format(
                "multitrack body carries no tracks",
            ));
        }

        Ok(MultitrackBody {
            multitrack_type,
            packet_type,
            tracks,
        })
    }

    /// Serializes the descriptor and track payloads
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), RtmpError> {
        match self.multitrack_type {
            AvMultitrackType::OneTrack if self.tracks.len() != 1 => {
                return Err(RtmpError::invalid_format(
                    "one-track multitrack body must carry exactly one track",
                ));
            }
            _ if self.tracks.is_empty() => {
                return Err(RtmpError::invalid_format(
                    "multitrack body carries no tracks",
                ));
            }
            _ => {}
        }

        out.push(((self.multitrack_type as u8) << 4) | (self.packet_type & 0x0F));

        if self.multitrack_type != AvMultitrackType::ManyTracksManyCodecs {
            out.extend_from_slice(&self.tracks[0].four_cc.to_bytes());
        }

        for track in &self.tracks {
            if self.multitrack_type == AvMultitrackType::ManyTracksManyCodecs {
                out.extend_from_slice(&track.four_cc.to_bytes());
            }

            out.push(track.track_id);

            if self.multitrack_type != AvMultitrackType::OneTrack {
                let mut size = [0; 3];
                BigEndian::write_u24(&mut size, track.data.len() as u32);
                out.extend_from_slice(&size);
            }

            out.extend_from_slice(&track.data);
        }

        Ok(())
    }
}
