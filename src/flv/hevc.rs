// HEVCDecoderConfigurationRecord

use byteorder::{BigEndian, ByteOrder};

use crate::error::RtmpError;
use crate::utils::ByteCursor;

use super::bitread::{unescape_rbsp, BitReader};
use super::NALU_LENGTH_SIZE;

pub const HEVC_NAL_VPS: u8 = 32;
pub const HEVC_NAL_SPS: u8 = 33;
pub const HEVC_NAL_PPS: u8 = 34;
pub const HEVC_NAL_SEI_PREFIX: u8 = 39;
pub const HEVC_NAL_SEI_SUFFIX: u8 = 40;

/// One parameter set array inside the record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaluArray {
    pub completeness: bool,
    pub nal_unit_type: u8,
    pub nalus: Vec<Vec<u8>>,
}

/// The HEVC decoder configuration carried by sequence-start tags
///
/// The profile-tier-level and format fields are derived from the first
/// SPS; parameter sets must be raw NALUs with Annex-B start codes
/// already stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HevcDecoderConfigurationRecord {
    pub configuration_version: u8,
    pub general_profile_space: u8,
    pub general_tier_flag: bool,
    pub general_profile_idc: u8,
    pub general_profile_compatibility_flags: u32,
    /// 48-bit field, stored in the low bits
    pub general_constraint_indicator_flags: u64,
    pub general_level_idc: u8,
    pub min_spatial_segmentation_idc: u16,
    pub parallelism_type: u8,
    pub chroma_format_idc: u8,
    pub bit_depth_luma_minus8: u8,
    pub bit_depth_chroma_minus8: u8,
    pub avg_frame_rate: u16,
    pub constant_frame_rate: u8,
    pub num_temporal_layers: u8,
    pub temporal_id_nested: bool,
    pub nalu_length_size: u8,
    /// Ordered: VPS, SPS, PPS, then SEI
    pub arrays: Vec<NaluArray>,
}

/// Fields read out of an SPS for record building
struct SpsSummary {
    max_sub_layers_minus1: u8,
    temporal_id_nesting: bool,
    profile_space: u8,
    tier_flag: bool,
    profile_idc: u8,
    compatibility_flags: u32,
    constraint_flags: u64,
    level_idc: u8,
    chroma_format_idc: u8,
    bit_depth_luma_minus8: u8,
    bit_depth_chroma_minus8: u8,
}

fn parse_sps_summary(sps: &[u8]) -> Result<SpsSummary, RtmpError> {
    // 2-byte NAL header before the RBSP
    if sps.len() < 3 {
        return Err(RtmpError::invalid_format("SPS is too short"));
    }

    let rbsp = unescape_rbsp(&sps[2..]);
    let mut bits = BitReader::new(&rbsp);

    bits.skip(4)?; // sps_video_parameter_set_id
    let max_sub_layers_minus1 = bits.read_bits(3)? as u8;
    let temporal_id_nesting = bits.read_bit()? == 1;

    // profile_tier_level
    let profile_space = bits.read_bits(2)? as u8;
    let tier_flag = bits.read_bit()? == 1;
    let profile_idc = bits.read_bits(5)? as u8;
    let compatibility_flags = bits.read_bits(32)?;
    let constraint_flags =
        ((bits.read_bits(32)? as u64) << 16) | bits.read_bits(16)? as u64;
    let level_idc = bits.read_bits(8)? as u8;

    let mut profile_present = [false; 8];
    let mut level_present = [false; 8];

    for i in 0..max_sub_layers_minus1 as usize {
        profile_present[i] = bits.read_bit()? == 1;
        level_present[i] = bits.read_bit()? == 1;
    }

    if max_sub_layers_minus1 > 0 {
        for _ in max_sub_layers_minus1..8 {
            bits.skip(2)?; // reserved_zero_2bits
        }
    }

    for i in 0..max_sub_layers_minus1 as usize {
        if profile_present[i] {
            bits.skip(88)?;
        }

        if level_present[i] {
            bits.skip(8)?;
        }
    }

    bits.read_ue()?; // sps_seq_parameter_set_id
    let chroma_format_idc = bits.read_ue()? as u8;

    if chroma_format_idc == 3 {
        bits.read_bit()?; // separate_colour_plane_flag
    }

    bits.read_ue()?; // pic_width_in_luma_samples
    bits.read_ue()?; // pic_height_in_luma_samples

    if bits.read_bit()? == 1 {
        // conformance window offsets
        bits.read_ue()?;
        bits.read_ue()?;
        bits.read_ue()?;
        bits.read_ue()?;
    }

    let bit_depth_luma_minus8 = bits.read_ue()? as u8;
    let bit_depth_chroma_minus8 = bits.read_ue()? as u8;

    Ok(SpsSummary {
        max_sub_layers_minus1,
        temporal_id_nesting,
        profile_space,
        tier_flag,
        profile_idc,
        compatibility_flags,
        constraint_flags,
        level_idc,
        chroma_format_idc,
        bit_depth_luma_minus8,
        bit_depth_chroma_minus8,
    })
}

impl HevcDecoderConfigurationRecord {
    /// Builds a record from raw parameter set NALUs
    pub fn from_parameter_sets(
        vps: Vec<Vec<u8>>,
        sps: Vec<Vec<u8>>,
        pps: Vec<Vec<u8>>,
        prefix_sei: Vec<Vec<u8>>,
        suffix_sei: Vec<Vec<u8>>,
    ) -> Result<HevcDecoderConfigurationRecord, RtmpError> {
        let first_sps = sps
            .first()
            .ok_or_else(|| RtmpError::invalid_format("at least one SPS is required"))?;

        if pps.is_empty() {
            return Err(RtmpError::invalid_format("at least one PPS is required"));
        }

        let summary = parse_sps_summary(first_sps)?;

        let mut arrays = vec![
            NaluArray {
                completeness: true,
                nal_unit_type: HEVC_NAL_VPS,
                nalus: vps,
            },
            NaluArray {
                completeness: true,
                nal_unit_type: HEVC_NAL_SPS,
                nalus: sps,
            },
            NaluArray {
                completeness: true,
                nal_unit_type: HEVC_NAL_PPS,
                nalus: pps,
            },
        ];

        if !prefix_sei.is_empty() {
            arrays.push(NaluArray {
                completeness: true,
                nal_unit_type: HEVC_NAL_SEI_PREFIX,
                nalus: prefix_sei,
            });
        }

        if !suffix_sei.is_empty() {
            arrays.push(NaluArray {
                completeness: true,
                nal_unit_type: HEVC_NAL_SEI_SUFFIX,
                nalus: suffix_sei,
            });
        }

        Ok(HevcDecoderConfigurationRecord {
            configuration_version: 1,
            general_profile_space: summary.profile_space,
            general_tier_flag: summary.tier_flag,
            general_profile_idc: summary.profile_idc,
            general_profile_compatibility_flags: summary.compatibility_flags,
            general_constraint_indicator_flags: summary.constraint_flags,
            general_level_idc: summary.level_idc,
            // Lives in the VUI, which sequence headers rarely carry: 0
            // means unbounded segmentation
            min_spatial_segmentation_idc: 0,
            parallelism_type: 0,
            chroma_format_idc: summary.chroma_format_idc,
            bit_depth_luma_minus8: summary.bit_depth_luma_minus8,
            bit_depth_chroma_minus8: summary.bit_depth_chroma_minus8,
            avg_frame_rate: 0,
            constant_frame_rate: 0,
            num_temporal_layers: summary.max_sub_layers_minus1 + 1,
            temporal_id_nested: summary.temporal_id_nesting,
            nalu_length_size: NALU_LENGTH_SIZE,
            arrays,
        })
    }

    /// Serializes the record
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.configuration_version);
        out.push(
            (self.general_profile_space << 6)
                | ((self.general_tier_flag as u8) << 5)
                | (self.general_profile_idc & 0x1F),
        );

        let mut compat = [0; 4];
        BigEndian::write_u32(&mut compat, self.general_profile_compatibility_flags);
        out.extend_from_slice(&compat);

        let mut constraint = [0; 8];
        BigEndian::write_u64(&mut constraint, self.general_constraint_indicator_flags << 16);
        out.extend_from_slice(&constraint[0..6]);

        out.push(self.general_level_idc);

        let mut seg = [0; 2];
        BigEndian::write_u16(&mut seg, 0xF000 | (self.min_spatial_segmentation_idc & 0x0FFF));
        out.extend_from_slice(&seg);

        out.push(0xFC | (self.parallelism_type & 0x03));
        out.push(0xFC | (self.chroma_format_idc & 0x03));
        out.push(0xF8 | (self.bit_depth_luma_minus8 & 0x07));
        out.push(0xF8 | (self.bit_depth_chroma_minus8 & 0x07));

        let mut rate = [0; 2];
        BigEndian::write_u16(&mut rate, self.avg_frame_rate);
        out.extend_from_slice(&rate);

        out.push(
            (self.constant_frame_rate << 6)
                | ((self.num_temporal_layers & 0x07) << 3)
                | ((self.temporal_id_nested as u8) << 2)
                | ((self.nalu_length_size - 1) & 0x03),
        );

        out.push(self.arrays.len() as u8);

        for array in &self.arrays {
            out.push(((array.completeness as u8) << 7) | (array.nal_unit_type & 0x3F));

            let mut count = [0; 2];
            BigEndian::write_u16(&mut count, array.nalus.len() as u16);
            out.extend_from_slice(&count);

            for nalu in &array.nalus {
                let mut len = [0; 2];
                BigEndian::write_u16(&mut len, nalu.len() as u16);
                out.extend_from_slice(&len);
                out.extend_from_slice(nalu);
            }
        }
    }

    /// Parses a record
    pub fn parse(data: &[u8]) -> Result<HevcDecoderConfigurationRecord, RtmpError> {
        let mut cursor = ByteCursor::new(data);

        let configuration_version = cursor.read_u8()?;
        let b = cursor.read_u8()?;
        let general_profile_space = b >> 6;
        let general_tier_flag = b & 0x20 != 0;
        let general_profile_idc = b & 0x1F;
        let general_profile_compatibility_flags = cursor.read_u32()?;

        let constraint_high = cursor.read_u32()? as u64;
        let constraint_low = cursor.read_u16()? as u64;
        let general_constraint_indicator_flags = (constraint_high << 16) | constraint_low;

        let general_level_idc = cursor.read_u8()?;
        let min_spatial_segmentation_idc = cursor.read_u16()? & 0x0FFF;
        let parallelism_type = cursor.read_u8()? & 0x03;
        let chroma_format_idc = cursor.read_u8()? & 0x03;
        let bit_depth_luma_minus8 = cursor.read_u8()? & 0x07;
        let bit_depth_chroma_minus8 = cursor.read_u8()? & 0x07;
        let avg_frame_rate = cursor.read_u16()?;

        let b = cursor.read_u8()?;
        let constant_frame_rate = b >> 6;
        let num_temporal_layers = (b >> 3) & 0x07;
        let temporal_id_nested = b & 0x04 != 0;
        let nalu_length_size = (b & 0x03) + 1;

        let array_count = cursor.read_u8()? as usize;
        let mut arrays = Vec::with_capacity(array_count);

        for _ in 0..array_count {
            let b = cursor.read_u8()?;
            let completeness = b & 0x80 != 0;
            let nal_unit_type = b & 0x3F;

            let nalu_count = cursor.read_u16()? as usize;
            let mut nalus = Vec::with_capacity(nalu_count);

            for _ in 0..nalu_count {
                let len = cursor.read_u16()? as usize;
                nalus.push(cursor.read_bytes(len)?.to_vec());
            }

            arrays.push(NaluArray {
                completeness,
                nal_unit_type,
                nalus,
            });
        }

        Ok(HevcDecoderConfigurationRecord {
            configuration_version,
            general_profile_space,
            general_tier_flag,
            general_profile_idc,
            general_profile_compatibility_flags,
            general_constraint_indicator_flags,
            general_level_idc,
            min_spatial_segmentation_idc,
            parallelism_type,
            chroma_format_idc,
            bit_depth_luma_minus8,
            bit_depth_chroma_minus8,
            avg_frame_rate,
            constant_frame_rate,
            num_temporal_layers,
            temporal_id_nested,
            nalu_length_size,
            arrays,
        })
    }
}
