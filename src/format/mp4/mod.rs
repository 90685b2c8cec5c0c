//! Fragmented-MP4 muxing.
//!
//! Produces the minimal standards-conforming container a built-in video
//! element needs to decode a re-wrapped H.264 elementary stream:
//! `ftyp`, `moov` (with `mvex`), then a single `moof`/`mdat` fragment pair.
//! Box serialization is bit-exact big-endian throughout; see [`generator`].
//!
//! ```
//! use vidsync::codec::h264::{segment_frames, NalUnit, VideoSequence};
//! use vidsync::format::mp4::{Mp4Muxer, TrackIdAllocator};
//!
//! # fn main() -> vidsync::Result<()> {
//! let sequence = VideoSequence {
//!     width: 320,
//!     height: 240,
//!     frame_rate: 30.0,
//!     headers: vec![
//!         NalUnit::new(vec![0x67, 0x42, 0x00, 0x1E]),
//!         NalUnit::new(vec![0x68, 0xCE, 0x38, 0x80]),
//!     ],
//!     frames: segment_frames(vec![NalUnit::new(vec![0x65, 0x88, 0x80, 0x00])])?,
//!     pts_list: Vec::new(),
//! };
//!
//! let buffer = Mp4Muxer::new().mux(&sequence, &TrackIdAllocator::new())?;
//! assert_eq!(&buffer[4..8], b"ftyp");
//! # Ok(())
//! # }
//! ```

/// Box-tree serialization primitives
pub mod generator;

/// Sequence-to-container translation
pub mod muxer;

/// Track, sample and allocator models
pub mod types;

#[doc(inline)]
pub use muxer::Mp4Muxer;
#[doc(inline)]
pub use types::{
    Mp4Sample, Mp4Track, SampleFlags, TrackIdAllocator, TrackKind, BASE_MEDIA_TIMESCALE,
};
