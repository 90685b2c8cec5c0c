use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, VidError};
use crate::utils::BitReader;

use super::types::NalUnit;

/// Picture dimensions and profile information carried by an SPS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpsInfo {
    /// `profile_idc`
    pub profile_idc: u8,
    /// `level_idc`
    pub level_idc: u8,
    /// Coded width in pixels.
    pub width: u32,
    /// Coded height in pixels.
    pub height: u32,
}

/// Splits a raw Annex-B elementary stream at its 3- or 4-byte start codes.
///
/// Each returned unit owns its payload (start code stripped, NAL header
/// retained) and has already been classified.
pub fn split_annex_b(data: &[u8]) -> Vec<NalUnit> {
    let mut units = Vec::new();
    let mut start: Option<usize> = None;
    let mut i = 0;

    while i + 2 < data.len() {
        if data[i] == 0x00 && data[i + 1] == 0x00 && data[i + 2] == 0x01 {
            // back up over the optional fourth zero byte
            let code_start = if i > 0 && data[i - 1] == 0x00 { i - 1 } else { i };
            if let Some(s) = start {
                units.push(NalUnit::new(Bytes::copy_from_slice(&data[s..code_start])));
            }
            start = Some(i + 3);
            i += 3;
        } else {
            i += 1;
        }
    }

    if let Some(s) = start {
        if s < data.len() {
            units.push(NalUnit::new(Bytes::copy_from_slice(&data[s..])));
        }
    }

    units
}

/// Removes emulation-prevention bytes (00 00 03 -> 00 00) so that RBSP
/// syntax can be bit-parsed.
pub fn strip_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut buffer = BytesMut::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        if i + 2 < data.len() && data[i] == 0x00 && data[i + 1] == 0x00 && data[i + 2] == 0x03 {
            buffer.put_u8(0x00);
            buffer.put_u8(0x00);
            i += 3;
            continue;
        }
        buffer.put_u8(data[i]);
        i += 1;
    }

    buffer.to_vec()
}

/// Parses the dimension-bearing prefix of a sequence parameter set.
///
/// `unit` must be an SPS NAL unit including its header byte. Only the fields
/// up to `frame_mbs_only_flag` are consumed; cropping and VUI are ignored
/// since the stream is re-wrapped, not decoded.
pub fn parse_sps(unit: &NalUnit) -> Result<SpsInfo> {
    if unit.payload.len() < 4 {
        return Err(VidError::Codec("SPS payload too short".into()));
    }

    let rbsp = strip_emulation_prevention(&unit.payload[1..]);
    let mut reader = BitReader::new(&rbsp);

    let profile_idc = reader.read_bits(8) as u8;
    reader.skip_bits(8); // constraint flags and reserved bits
    let level_idc = reader.read_bits(8) as u8;

    reader.read_golomb(); // seq_parameter_set_id

    // chroma format fields only present for the high profiles
    if matches!(
        profile_idc,
        100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138
    ) {
        let chroma_format_idc = reader.read_golomb();
        if chroma_format_idc == 3 {
            reader.read_bits(1); // separate_colour_plane_flag
        }
        reader.read_golomb(); // bit_depth_luma_minus8
        reader.read_golomb(); // bit_depth_chroma_minus8
        reader.read_bits(1); // qpprime_y_zero_transform_bypass_flag

        if reader.read_bits(1) == 1 {
            let count = if chroma_format_idc != 3 { 8 } else { 12 };
            for list in 0..count {
                if reader.read_bits(1) == 1 {
                    skip_scaling_list(&mut reader, if list < 6 { 16 } else { 64 });
                }
            }
        }
    }

    reader.read_golomb(); // log2_max_frame_num_minus4
    let pic_order_cnt_type = reader.read_golomb();

    if pic_order_cnt_type == 0 {
        reader.read_golomb(); // log2_max_pic_order_cnt_lsb_minus4
    } else if pic_order_cnt_type == 1 {
        reader.read_bits(1); // delta_pic_order_always_zero_flag
        reader.read_signed_golomb(); // offset_for_non_ref_pic
        reader.read_signed_golomb(); // offset_for_top_to_bottom_field
        let num_ref_frames_in_pic_order_cnt_cycle = reader.read_golomb();
        for _ in 0..num_ref_frames_in_pic_order_cnt_cycle {
            reader.read_signed_golomb();
        }
    }

    reader.read_golomb(); // max_num_ref_frames
    reader.read_bits(1); // gaps_in_frame_num_value_allowed_flag

    let pic_width_in_mbs = reader.read_golomb() + 1;
    let pic_height_in_map_units = reader.read_golomb() + 1;
    let frame_mbs_only_flag = reader.read_bits(1);

    if reader.available_bits() == 0 {
        return Err(VidError::Codec("SPS truncated".into()));
    }

    Ok(SpsInfo {
        profile_idc,
        level_idc,
        width: pic_width_in_mbs * 16,
        height: (2 - frame_mbs_only_flag) * pic_height_in_map_units * 16,
    })
}

fn skip_scaling_list(reader: &mut BitReader, size: usize) {
    let mut last_scale: i32 = 8;
    let mut next_scale: i32 = 8;

    for _ in 0..size {
        if next_scale != 0 {
            let delta_scale = reader.read_signed_golomb();
            next_scale = (last_scale + delta_scale + 256) % 256;
        }
        if next_scale != 0 {
            last_scale = next_scale;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::h264::NalUnitType;
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_three_and_four_byte_start_codes() {
        let stream = [
            0x00, 0x00, 0x00, 0x01, 0x67, 0xAA, // SPS, 4-byte code
            0x00, 0x00, 0x01, 0x68, 0xBB, // PPS, 3-byte code
            0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x80, // IDR slice
        ];
        let units = split_annex_b(&stream);
        assert_eq!(units.len(), 3);
        assert_eq!(units[0].unit_type, NalUnitType::Sps);
        assert_eq!(units[0].payload.as_ref(), &[0x67, 0xAA]);
        assert_eq!(units[1].unit_type, NalUnitType::Pps);
        assert_eq!(units[1].payload.as_ref(), &[0x68, 0xBB]);
        assert_eq!(units[2].unit_type, NalUnitType::Idr);
    }

    #[test]
    fn split_ignores_garbage_before_first_start_code() {
        let stream = [0xDE, 0xAD, 0x00, 0x00, 0x01, 0x41, 0x9A];
        let units = split_annex_b(&stream);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].unit_type, NalUnitType::Ndr);
    }

    #[test]
    fn strips_emulation_prevention_bytes() {
        let data = [0x00, 0x00, 0x03, 0x01, 0x42];
        assert_eq!(strip_emulation_prevention(&data), vec![0x00, 0x00, 0x01, 0x42]);

        let data = [0x10, 0x20, 0x30];
        assert_eq!(strip_emulation_prevention(&data), vec![0x10, 0x20, 0x30]);
    }

    #[test]
    fn parses_baseline_sps_dimensions() {
        // Baseline profile, level 3.0, 320x240 (20x15 macroblocks),
        // pic_order_cnt_type 0, frame_mbs_only_flag 1.
        let sps = build_sps(66, 30, 20, 15);
        let unit = NalUnit::new(sps);
        let info = parse_sps(&unit).unwrap();
        assert_eq!(info.profile_idc, 66);
        assert_eq!(info.level_idc, 30);
        assert_eq!(info.width, 320);
        assert_eq!(info.height, 240);
    }

    #[test]
    fn rejects_truncated_sps() {
        let unit = NalUnit::new(vec![0x67, 0x42, 0x00]);
        assert!(parse_sps(&unit).is_err());
    }

    /// Hand-assembles a minimal baseline SPS for the given macroblock grid.
    fn build_sps(profile: u8, level: u8, mbs_wide: u32, mbs_high: u32) -> Vec<u8> {
        let mut bits = BitWriter::new();
        bits.bytes(&[0x67, profile, 0x00, level]);
        bits.ue(0); // seq_parameter_set_id
        bits.ue(0); // log2_max_frame_num_minus4
        bits.ue(0); // pic_order_cnt_type 0
        bits.ue(0); // log2_max_pic_order_cnt_lsb_minus4
        bits.ue(1); // max_num_ref_frames
        bits.bit(0); // gaps_in_frame_num_value_allowed_flag
        bits.ue(mbs_wide - 1);
        bits.ue(mbs_high - 1);
        bits.bit(1); // frame_mbs_only_flag
        bits.bit(1); // direct_8x8_inference_flag
        bits.bit(0); // frame_cropping_flag
        bits.bit(0); // vui_parameters_present_flag
        bits.finish()
    }

    struct BitWriter {
        bits: Vec<u8>,
    }

    impl BitWriter {
        fn new() -> Self {
            Self { bits: Vec::new() }
        }

        fn bit(&mut self, b: u8) {
            self.bits.push(b & 1);
        }

        fn bytes(&mut self, data: &[u8]) {
            for byte in data {
                for i in (0..8).rev() {
                    self.bit((byte >> i) & 1);
                }
            }
        }

        fn ue(&mut self, value: u32) {
            let code = value + 1;
            let len = 32 - code.leading_zeros();
            for _ in 0..len - 1 {
                self.bit(0);
            }
            for i in (0..len).rev() {
                self.bit(((code >> i) & 1) as u8);
            }
        }

        fn finish(self) -> Vec<u8> {
            let mut out = vec![0u8; (self.bits.len() + 7) / 8];
            for (i, bit) in self.bits.iter().enumerate() {
                if *bit == 1 {
                    out[i / 8] |= 1 << (7 - (i % 8));
                }
            }
            out
        }
    }
}
