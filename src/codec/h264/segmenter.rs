use crate::error::{Result, VidError};

use super::types::NalUnit;

/// One access unit: the NAL units that decode to a single picture.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    /// Units in bitstream order; owned exclusively by this frame.
    pub units: Vec<NalUnit>,
    /// True when the frame contains an IDR slice.
    pub is_key_frame: bool,
}

impl Frame {
    /// Byte length of the frame when every unit is written with a 4-byte
    /// length prefix.
    pub fn prefixed_len(&self) -> usize {
        self.units.iter().map(|u| u.prefixed_len()).sum()
    }
}

/// Groups a decode-ordered NAL unit sequence into access units.
///
/// A frame closes when a unit arrives while the open buffer already holds at
/// least one VCL unit and the new unit either opens a new slice group
/// (`first_mb_in_slice`) or is non-VCL. Trailing non-VCL units that never see
/// a VCL sibling are folded into the previously emitted frame instead of
/// forming a sliceless frame of their own.
pub fn segment_frames(units: Vec<NalUnit>) -> Result<Vec<Frame>> {
    if units.is_empty() {
        return Err(VidError::InvalidData("empty NAL unit sequence".into()));
    }

    let mut frames: Vec<Frame> = Vec::new();
    let mut buffer: Vec<NalUnit> = Vec::new();
    let mut has_vcl = false;
    let mut is_key_frame = false;

    for unit in units {
        let opens_picture = unit.is_vcl && unit.first_mb_in_slice;
        if !buffer.is_empty() && has_vcl && (opens_picture || !unit.is_vcl) {
            frames.push(Frame {
                units: std::mem::take(&mut buffer),
                is_key_frame,
            });
            has_vcl = false;
            is_key_frame = false;
        }

        if unit.is_keyframe() {
            is_key_frame = true;
        }
        has_vcl |= unit.is_vcl;
        buffer.push(unit);
    }

    if has_vcl {
        frames.push(Frame {
            units: buffer,
            is_key_frame,
        });
    } else if let Some(last) = frames.last_mut() {
        last.units.append(&mut buffer);
    } else if !buffer.is_empty() {
        log::debug!(
            "dropping {} non-VCL unit(s) with no slice data in the stream",
            buffer.len()
        );
    }

    Ok(frames)
}
