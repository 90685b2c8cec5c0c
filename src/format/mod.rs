//! Media container implementations.
//!
//! The only container produced here is the minimal fragmented MP4 the host's
//! built-in decoder needs in order to play back a re-wrapped elementary
//! stream: `ftyp` + `moov`(+`mvex`) followed by a single `moof`/`mdat` pair.

pub mod mp4;
