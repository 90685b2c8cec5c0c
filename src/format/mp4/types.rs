use std::sync::atomic::{AtomicU32, Ordering};

use bytes::Bytes;

/// Movie timescale used for every muxed track, in ticks per second.
pub const BASE_MEDIA_TIMESCALE: u32 = 1000;

/// Per-sample dependency flags, mirroring the ISO BMFF `sample_flags`
/// semantics bit for bit.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleFlags {
    /// `is_leading`, two bits.
    pub is_leading: u8,
    /// `sample_depends_on`: 2 = independent (sync), 1 = dependent.
    pub depends_on: u8,
    /// `sample_is_depended_on`, two bits.
    pub is_depended_on: u8,
    /// `sample_has_redundancy`, two bits.
    pub has_redundancy: u8,
    /// `sample_padding_value`, three bits.
    pub padding_value: u8,
    /// `sample_is_non_sync_sample`, one bit.
    pub is_non_sync: u8,
    /// `sample_degradation_priority`.
    pub degradation_priority: u16,
    /// Convenience mirror of `depends_on == 2`; drives the `stss` table.
    pub is_key_frame: bool,
}

impl SampleFlags {
    /// Flags for a sync (key) sample.
    pub fn key() -> Self {
        Self {
            depends_on: 2,
            is_non_sync: 0,
            is_key_frame: true,
            ..Default::default()
        }
    }

    /// Flags for a predicted sample.
    pub fn non_key() -> Self {
        Self {
            depends_on: 1,
            is_non_sync: 1,
            is_key_frame: false,
            ..Default::default()
        }
    }
}

/// One muxed access unit as referenced by `trun`/`sdtp`.
#[derive(Debug, Clone)]
pub struct Mp4Sample {
    /// Decode-order index, zero based.
    pub index: u32,
    /// Byte span of the sample inside `mdat`.
    pub size: u32,
    /// Sample duration in track timescale ticks.
    pub duration: u32,
    /// `sample_composition_time_offset` in ticks; never negative once the
    /// track's implicit offset has been applied.
    pub composition_time_offset: u32,
    /// Dependency flag bundle.
    pub flags: SampleFlags,
}

/// Track media kind. Audio is carried in the data model (sample entry and
/// handler boxes exist) but is never produced by the video muxing path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    /// `vide` handler, `avc1` sample entry
    Video,
    /// `soun` handler, `mp4a` sample entry
    Audio,
}

/// Aggregate for one elementary stream inside the produced container.
#[derive(Debug, Clone)]
pub struct Mp4Track {
    /// Track ID, unique within the allocator that produced it.
    pub id: u32,
    /// Media kind.
    pub kind: TrackKind,
    /// Total `mdat` payload length in bytes (headers plus every sample).
    pub len: usize,
    /// Sequence parameter sets (payloads with NAL header byte).
    pub sps: Vec<Bytes>,
    /// Picture parameter sets.
    pub pps: Vec<Bytes>,
    /// Coded width in pixels.
    pub width: u32,
    /// Coded height in pixels.
    pub height: u32,
    /// Ticks per second.
    pub timescale: u32,
    /// Track duration in ticks.
    pub duration: u32,
    /// Nominal frame rate.
    pub frame_rate: f64,
    /// Samples in decode order.
    pub samples: Vec<Mp4Sample>,
    /// Per-sample display-order indices.
    pub pts_list: Vec<i64>,
    /// Correction added to every presentation offset so none are negative.
    pub implicit_offset: i64,
    /// Audio channel count; 0 for video tracks.
    pub channel_count: u16,
    /// Audio sample rate; 0 for video tracks.
    pub sample_rate: u32,
    /// Audio-specific decoder configuration (fed into `esds`).
    pub audio_config: Bytes,
}

impl Mp4Track {
    /// Integer sample duration in ticks. The division truncates, so tracks
    /// whose duration is not divisible by the sample count accumulate a small
    /// timestamp drift; the edit list absorbs it at presentation time.
    pub fn sample_delta(&self) -> u32 {
        if self.samples.is_empty() {
            0
        } else {
            self.duration / self.samples.len() as u32
        }
    }
}

/// Monotonic track-ID source, starting at 1.
///
/// An explicit allocator value rather than a process-global counter, so
/// callers control ID scope and tests can pin IDs deterministically.
#[derive(Debug)]
pub struct TrackIdAllocator {
    next: AtomicU32,
}

impl TrackIdAllocator {
    /// Creates an allocator whose first ID is 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }

    /// Returns the next ID, advancing the counter.
    pub fn allocate(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for TrackIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
