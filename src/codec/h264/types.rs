use bytes::Bytes;

use crate::utils::BitReader;

use super::segmenter::Frame;

/// NAL unit classification per ISO/IEC 14496-10 table 7-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalUnitType {
    /// Coded slice of a non-IDR picture
    Ndr,
    /// Coded slice data partition A
    PartitionA,
    /// Coded slice data partition B
    PartitionB,
    /// Coded slice data partition C
    PartitionC,
    /// Coded slice of an IDR picture
    Idr,
    /// Supplemental enhancement information
    Sei,
    /// Sequence parameter set
    Sps,
    /// Picture parameter set
    Pps,
    /// Access unit delimiter
    Aud,
    /// End of sequence
    EndOfSequence,
    /// End of stream
    EndOfStream,
    /// Filler data
    FillerData,
    /// Reserved or unspecified type
    Unspecified,
}

impl From<u8> for NalUnitType {
    fn from(value: u8) -> Self {
        match value {
            1 => NalUnitType::Ndr,
            2 => NalUnitType::PartitionA,
            3 => NalUnitType::PartitionB,
            4 => NalUnitType::PartitionC,
            5 => NalUnitType::Idr,
            6 => NalUnitType::Sei,
            7 => NalUnitType::Sps,
            8 => NalUnitType::Pps,
            9 => NalUnitType::Aud,
            10 => NalUnitType::EndOfSequence,
            11 => NalUnitType::EndOfStream,
            12 => NalUnitType::FillerData,
            _ => NalUnitType::Unspecified,
        }
    }
}

/// One Network Abstraction Layer unit, start code already stripped.
///
/// The first payload byte is the NAL header; classification and, for slice
/// types, the slice-header prefix are derived once at construction and the
/// unit is immutable afterwards.
#[derive(Debug, Clone)]
pub struct NalUnit {
    /// Raw unit bytes including the one-byte NAL header.
    pub payload: Bytes,
    /// `nal_ref_idc`, two bits.
    pub ref_idc: u8,
    /// Unit classification.
    pub unit_type: NalUnitType,
    /// True only for the NDR/IDR slice types.
    pub is_vcl: bool,
    /// True when the slice starts at macroblock 0, i.e. opens a new picture.
    pub first_mb_in_slice: bool,
    /// `slice_type` syntax element; 0 for non-VCL units.
    pub slice_type: u8,
}

impl NalUnit {
    /// Wraps a start-code-stripped payload, classifying it and parsing the
    /// slice-header prefix for VCL units.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        let header = payload.first().copied().unwrap_or(0);
        let unit_type = NalUnitType::from(header & 0x1F);
        let is_vcl = matches!(unit_type, NalUnitType::Ndr | NalUnitType::Idr);

        let mut unit = Self {
            ref_idc: (header >> 5) & 0x03,
            unit_type,
            is_vcl,
            first_mb_in_slice: false,
            slice_type: 0,
            payload,
        };
        if unit.is_vcl {
            unit.parse_slice_header();
        }
        unit
    }

    /// True for units that carry an IDR slice.
    pub fn is_keyframe(&self) -> bool {
        self.unit_type == NalUnitType::Idr
    }

    /// Byte length of the unit when written with a 4-byte length prefix.
    pub fn prefixed_len(&self) -> usize {
        self.payload.len() + 4
    }

    fn parse_slice_header(&mut self) {
        let mut reader = BitReader::new(&self.payload);
        reader.read_bits(8); // NAL header byte
        self.first_mb_in_slice = reader.read_golomb() == 0;
        self.slice_type = reader.read_golomb() as u8;
    }
}

/// One video elementary stream extracted from an animation document,
/// ready for muxing.
#[derive(Debug, Clone, Default)]
pub struct VideoSequence {
    /// Coded width in pixels.
    pub width: u32,
    /// Coded height in pixels.
    pub height: u32,
    /// Nominal frame rate.
    pub frame_rate: f64,
    /// Out-of-band parameter sets, SPS first then PPS.
    pub headers: Vec<NalUnit>,
    /// Access units in decode order.
    pub frames: Vec<Frame>,
    /// Per-sample display-order indices; empty means decode order equals
    /// display order.
    pub pts_list: Vec<i64>,
}

impl VideoSequence {
    /// Display-order index for the sample at decode position `index`.
    pub fn pts_at(&self, index: usize) -> i64 {
        self.pts_list
            .get(index)
            .copied()
            .unwrap_or(index as i64)
    }
}
