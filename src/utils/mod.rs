//! Common utilities shared across the crate.
//!
//! Currently this is the bit-level reader used by the H.264 slice-header and
//! parameter-set parsing in [`crate::codec`].

pub mod bits;

pub use bits::BitReader;
