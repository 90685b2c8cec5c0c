//! Video position synchronization.
//!
//! A composition drives an animation clock; each referenced video is decoded
//! by a host media element with its own clock. This module keeps the two in
//! step: [`VideoReader`] owns one element and turns "show frame N now" calls
//! into the cheapest element command that gets there, and
//! [`VideoReaderManager`] fans composition ticks out over every video
//! resource the composition uses.
//!
//! Elements are reached only through the [`MediaElement`] trait, so the same
//! synchronizer drives browser-backed, worker-proxied and headless
//! implementations. [`SimElement`] ships as the in-process implementation.
//!
//! ```
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use vidsync::av::VideoFormat;
//! use vidsync::reader::{SimElement, VideoReader};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> vidsync::Result<()> {
//! let element = SimElement::new();
//! let format = VideoFormat { width: 320, height: 240, frame_rate: 30.0 };
//! let mut reader = VideoReader::new(
//!     Arc::new(element),
//!     Some(Bytes::from_static(b"fmp4")),
//!     format,
//!     Vec::new(),
//! )?;
//!
//! reader.prepare(10, 1.0).await?;
//! assert_eq!(reader.current_frame(), 10);
//! # Ok(())
//! # }
//! ```

/// Media-element capability seam and event plumbing
pub mod element;

/// Per-composition fan-out over video resources
pub mod manager;

/// Headless media element
pub mod sim;

/// Single-element synchronizer
pub mod video_reader;

#[doc(inline)]
pub use element::{await_event, MediaElement, MediaEvent};
#[doc(inline)]
pub use manager::{
    CompositionSource, MediaElementFactory, ResourceId, VideoLayer, VideoReaderManager,
};
#[doc(inline)]
pub use sim::SimElement;
#[doc(inline)]
pub use video_reader::{StaticTimeRanges, VideoReader};
