//! Codec-level parsing.
//!
//! Only the H.264 syntax needed to re-wrap an already-encoded elementary
//! stream is implemented: NAL-unit classification, the slice-header prefix
//! that drives access-unit segmentation, and the SPS fields that carry the
//! coded picture dimensions.

pub mod h264;
