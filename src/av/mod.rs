//! Core audio/video value types shared between the codec, container and
//! reader layers.

/// Half-open interval `[start, end)` expressed in animation-frame units.
///
/// The composition layer hands these to the reader to mark spans during which
/// the visible video content does not change, so the synchronizer can scrub
/// with a paused seek instead of resuming playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// First frame of the range (inclusive).
    pub start: i64,
    /// End of the range (exclusive).
    pub end: i64,
}

impl TimeRange {
    /// Creates a range covering `[start, end)`.
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// True if `frame` falls inside the range.
    pub fn contains(&self, frame: i64) -> bool {
        self.start <= frame && frame < self.end
    }

    /// True if this range and `other` share at least one frame.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Display properties of one decodable video stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoFormat {
    /// Coded width in pixels.
    pub width: u32,
    /// Coded height in pixels.
    pub height: u32,
    /// Nominal frame rate of the stream.
    pub frame_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_range_is_half_open() {
        let range = TimeRange::new(0, 10);
        assert!(range.contains(0));
        assert!(range.contains(9));
        assert!(!range.contains(10));
        assert!(!range.contains(-1));
    }

    #[test]
    fn time_range_overlap() {
        let a = TimeRange::new(0, 10);
        let b = TimeRange::new(5, 15);
        let c = TimeRange::new(10, 20);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
    }
}
