//! H.264/AVC elementary-stream handling.
//!
//! The pipeline here turns a raw Annex-B bitstream (or pre-split NAL units)
//! into decode-ordered access units ready for the fragmented-MP4 muxer:
//!
//! 1. [`parser::split_annex_b`] cuts the stream at start codes.
//! 2. [`NalUnit::new`] classifies each unit and, for slice data, parses the
//!    slice-header prefix that marks access-unit boundaries.
//! 3. [`segmenter::segment_frames`] groups units into [`Frame`]s.
//!
//! ```
//! use vidsync::codec::h264::{segment_frames, split_annex_b};
//!
//! # fn main() -> vidsync::Result<()> {
//! // IDR slice starting at macroblock 0 (first_mb_in_slice ue(v) == 0)
//! let stream = [0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x80, 0x00];
//! let units = split_annex_b(&stream);
//! let frames = segment_frames(units)?;
//! assert_eq!(frames.len(), 1);
//! assert!(frames[0].is_key_frame);
//! # Ok(())
//! # }
//! ```

/// NAL unit model and video sequence aggregate
pub mod types;

/// Annex-B splitting and parameter-set parsing
pub mod parser;

/// Access-unit (frame) segmentation
pub mod segmenter;

#[doc(inline)]
pub use parser::{parse_sps, split_annex_b, SpsInfo};
#[doc(inline)]
pub use segmenter::{segment_frames, Frame};
#[doc(inline)]
pub use types::{NalUnit, NalUnitType, VideoSequence};
