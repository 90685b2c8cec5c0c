#![doc(html_root_url = "https://docs.rs/vidsync/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

//! # vidsync - H.264 re-wrapping and video position synchronization
//!
//! `vidsync` takes raw H.264 elementary streams as animation compositions
//! ship them, re-wraps them into fragmented MP4 buffers any built-in video
//! element can decode, and keeps each element's decode position in lock-step
//! with an externally driven animation clock.
//!
//! ## Features
//!
//! ### Bitstream handling
//! - Annex-B NAL unit splitting with 3- and 4-byte start codes
//! - Exp-Golomb bitstream reading and SPS dimension extraction
//! - Access-unit segmentation driven by slice-header boundaries
//!
//! ### Fragmented-MP4 muxing
//! - `ftyp`/`moov`/`moof`/`mdat` serialization with byte-exact offsets
//! - Composition-time reordering with automatic non-negative offsets
//! - Length-prefixed sample payloads ready for `avc1` decoding
//!
//! ### Position synchronization
//! - Per-element synchronizer with seek avoidance inside a drift tolerance
//! - Bounded seek waits that degrade to the stale frame on timeout
//! - Playback-rate alignment against the observed animation tick rate
//! - Multi-resource fan-out with shared-resource overlap detection
//!
//! ## Quick Start
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! vidsync = "0.1.0"
//! ```
//!
//! ### Re-wrapping an elementary stream
//!
//! ```rust,no_run
//! use vidsync::codec::h264::{parse_sps, segment_frames, split_annex_b, NalUnitType, VideoSequence};
//! use vidsync::format::mp4::{Mp4Muxer, TrackIdAllocator};
//!
//! fn main() -> vidsync::Result<()> {
//!     let stream = std::fs::read("video.h264")?;
//!     let units = split_annex_b(&stream);
//!
//!     let (headers, slices): (Vec<_>, Vec<_>) = units
//!         .into_iter()
//!         .partition(|u| matches!(u.unit_type, NalUnitType::Sps | NalUnitType::Pps));
//!     let sps = parse_sps(&headers[0])?;
//!
//!     let sequence = VideoSequence {
//!         width: sps.width,
//!         height: sps.height,
//!         frame_rate: 30.0,
//!         headers,
//!         frames: segment_frames(slices)?,
//!         pts_list: Vec::new(),
//!     };
//!
//!     let buffer = Mp4Muxer::new().mux(&sequence, &TrackIdAllocator::new())?;
//!     std::fs::write("video.mp4", &buffer)?;
//!     Ok(())
//! }
//! ```
//!
//! ### Driving a video element from an animation clock
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use vidsync::av::VideoFormat;
//! use vidsync::reader::{SimElement, VideoReader};
//!
//! #[tokio::main]
//! async fn main() -> vidsync::Result<()> {
//!     let buffer = Bytes::from(std::fs::read("video.mp4")?);
//!     let format = VideoFormat { width: 1280, height: 720, frame_rate: 24.0 };
//!
//!     let mut reader = VideoReader::new(
//!         Arc::new(SimElement::new()),
//!         Some(buffer),
//!         format,
//!         Vec::new(),
//!     )?;
//!
//!     // the animation loop calls this once per tick
//!     for frame in 0..240 {
//!         reader.prepare(frame, 1.0).await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - `av`: Core value types shared across layers
//!   - Frame-unit time ranges
//!   - Video display formats
//!
//! - `codec`: Elementary-stream parsing
//!   - NAL unit model and slice-header inspection
//!   - SPS parsing and frame segmentation
//!
//! - `format`: Container production
//!   - Fragmented-MP4 box tree serialization
//!   - Track and sample models
//!
//! - `reader`: Position synchronization
//!   - Media-element capability seam with event subscriptions
//!   - Per-element synchronizer and multi-resource manager
//!
//! - `error`: Error handling types and utilities
//!   - Failure categories for every layer
//!   - Result type alias for convenience
//!
//! - `utils`: Common utilities and helper functions
//!   - Bitstream reading with Exp-Golomb support
//!
/// Audio/Video base types
pub mod av;

/// Codec implementations for elementary-stream parsing
pub mod codec;

/// Error types and utilities
pub mod error;

/// Media container implementations
pub mod format;

/// Video position synchronization
pub mod reader;

/// Common utilities and helper functions
pub mod utils;

/// Configuration module
pub mod config;

pub use error::{Result, VidError};
