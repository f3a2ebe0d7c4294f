// AVCDecoderConfigurationRecord

use byteorder::{BigEndian, ByteOrder};

use crate::error::RtmpError;
use crate::utils::ByteCursor;

/// NALU length prefix size used by the AVCC framing in FLV bodies
pub const NALU_LENGTH_SIZE: u8 = 4;

/// The AVC decoder configuration carried by sequence-header tags
///
/// Profile, compatibility and level are copied from the first SPS.
/// Parameter sets must be raw NALUs: strip Annex-B start codes first
/// (see split_annex_b).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvcDecoderConfigurationRecord {
    pub configuration_version: u8,
    pub profile_indication: u8,
    pub profile_compatibility: u8,
    pub level_indication: u8,
    pub nalu_length_size: u8,
    pub sps: Vec<Vec<u8>>,
    pub pps: Vec<Vec<u8>>,
}

impl AvcDecoderConfigurationRecord {
    /// Builds a record from raw SPS and PPS NALUs
    pub fn from_parameter_sets(
        sps: Vec<Vec<u8>>,
        pps: Vec<Vec<u8>>,
    ) -> Result<AvcDecoderConfigurationRecord, RtmpError> {
        let first_sps = sps
            .first()
            .ok_or_else(|| RtmpError::invalid_format("at least one SPS is required"))?;

        // NAL header byte, then profile_idc, constraint flags, level_idc
        if first_sps.len() < 4 {
            return Err(RtmpError::invalid_format("SPS is too short"));
        }

        if pps.is_empty() {
            return Err(RtmpError::invalid_format("at least one PPS is required"));
        }

        Ok(AvcDecoderConfigurationRecord {
            configuration_version: 1,
            profile_indication: first_sps[1],
            profile_compatibility: first_sps[2],
            level_indication: first_sps[3],
            nalu_length_size: NALU_LENGTH_SIZE,
            sps,
            pps,
        })
    }

    /// Serializes the record
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.configuration_version);
        out.push(self.profile_indication);
        out.push(self.profile_compatibility);
        out.push(self.level_indication);
        out.push(0xFC | (self.nalu_length_size - 1));
        out.push(0xE0 | (self.sps.len() as u8 & 0x1F));

        for sps in &self.sps {
            let mut len = [0; 2];
            BigEndian::write_u16(&mut len, sps.len() as u16);
            out.extend_from_slice(&len);
            out.extend_from_slice(sps);
        }

        out.push(self.pps.len() as u8);

        for pps in &self.pps {
            let mut len = [0; 2];
            BigEndian::write_u16(&mut len, pps.len() as u16);
            out.extend_from_slice(&len);
            out.extend_from_slice(pps);
        }
    }

    /// Parses a record
    pub fn parse(data: &[u8]) -> Result<AvcDecoderConfigurationRecord, RtmpError> {
        let mut cursor = ByteCursor::new(data);

        let configuration_version = cursor.read_u8()?;
        let profile_indication = cursor.read_u8()?;
        let profile_compatibility = cursor.read_u8()?;
        let level_indication = cursor.read_u8()?;
        let nalu_length_size = (cursor.read_u8()? & 0x03) + 1;

        let sps_count = (cursor.read_u8()? & 0x1F) as usize;
        let mut sps = Vec::with_capacity(sps_count);

        for _ in 0..sps_count {
            let len = cursor.read_u16()? as usize;
            sps.push(cursor.read_bytes(len)?.to_vec());
        }

        let pps_count = cursor.read_u8()? as usize;
        let mut pps = Vec::with_capacity(pps_count);

        for _ in 0..pps_count {
            let len = cursor.read_u16()? as usize;
            pps.push(cursor.read_bytes(len)?.to_vec());
        }

        Ok(AvcDecoderConfigurationRecord {
            configuration_version,
            profile_indication,
            profile_compatibility,
            level_indication,
            nalu_length_size,
            sps,
            pps,
        })
    }
}

/// Converts raw NALUs into the length-prefixed AVCC layout used in
/// FLV video bodies
pub fn nalus_to_avcc(nalus: &[Vec<u8>]) -> Vec<u8> {
    let total: usize = nalus.iter().map(|n| n.len() + 4).sum();
    let mut out = Vec::with_capacity(total);

    for nalu in nalus {
        let mut len = [0; 4];
        BigEndian::write_u32(&mut len, nalu.len() as u32);
        out.extend_from_slice(&len);
        out.extend_from_slice(nalu);
    }

    out
}
