use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::h264::{NalUnitType, VideoSequence};
use crate::error::{Result, VidError};

use super::generator;
use super::types::{
    Mp4Sample, Mp4Track, SampleFlags, TrackIdAllocator, TrackKind, BASE_MEDIA_TIMESCALE,
};

/// Builds the complete fragmented container for one video sequence.
///
/// The output is `ftyp` + `moov`(+`mvex`) + one `moof`/`mdat` pair, with the
/// parameter sets and every access unit written into `mdat` as 4-byte
/// big-endian length-prefixed NAL payloads. The buffer is immutable once
/// produced and can be handed to any number of media elements.
#[derive(Debug, Default)]
pub struct Mp4Muxer;

impl Mp4Muxer {
    /// Creates a muxer. The muxer itself is stateless; track identity comes
    /// from the allocator passed to [`Mp4Muxer::mux`].
    pub fn new() -> Self {
        Self
    }

    /// Encodes `sequence` into a standalone fragmented-MP4 buffer.
    ///
    /// Fails before producing any byte when the sequence carries fewer than
    /// two parameter-set units (SPS and PPS are both required) or no frames.
    pub fn mux(&self, sequence: &VideoSequence, ids: &TrackIdAllocator) -> Result<Bytes> {
        let track = self.build_track(sequence, ids)?;

        let mut payload = BytesMut::with_capacity(track.len);
        for header in &sequence.headers {
            put_prefixed(&mut payload, &header.payload);
        }
        for frame in &sequence.frames {
            for unit in &frame.units {
                put_prefixed(&mut payload, &unit.payload);
            }
        }

        let ftyp = generator::ftyp();
        let moov = generator::moov(std::slice::from_ref(&track), track.duration, track.timescale);
        let moof = generator::moof(1, 0, &track);
        let mdat = generator::mdat(&payload);

        let mut out = BytesMut::with_capacity(ftyp.len() + moov.len() + moof.len() + mdat.len());
        out.put_slice(&ftyp);
        out.put_slice(&moov);
        out.put_slice(&moof);
        out.put_slice(&mdat);
        Ok(out.freeze())
    }

    fn build_track(&self, sequence: &VideoSequence, ids: &TrackIdAllocator) -> Result<Mp4Track> {
        if sequence.headers.len() < 2 {
            return Err(VidError::Config(
                "video sequence needs both SPS and PPS header units".into(),
            ));
        }
        if sequence.frames.is_empty() {
            return Err(VidError::InvalidData("video sequence has no frames".into()));
        }
        if sequence.frame_rate <= 0.0 {
            return Err(VidError::Config("frame rate must be positive".into()));
        }

        let sps: Vec<Bytes> = sequence
            .headers
            .iter()
            .filter(|u| u.unit_type == NalUnitType::Sps)
            .map(|u| u.payload.clone())
            .collect();
        let pps: Vec<Bytes> = sequence
            .headers
            .iter()
            .filter(|u| u.unit_type == NalUnitType::Pps)
            .map(|u| u.payload.clone())
            .collect();
        if sps.is_empty() || pps.is_empty() {
            return Err(VidError::Config(
                "header units must include at least one SPS and one PPS".into(),
            ));
        }
        // the decoder configuration record reads profile/compat/level from
        // bytes 1..4 of the first SPS
        if sps.iter().any(|s| s.len() < 4) {
            return Err(VidError::Codec("SPS payload too short".into()));
        }

        let sample_count = sequence.frames.len();
        let duration =
            (sample_count as f64 * BASE_MEDIA_TIMESCALE as f64 / sequence.frame_rate) as u32;
        let sample_delta = duration / sample_count as u32;
        let implicit_offset = implicit_offset(sequence);

        let header_len: usize = sequence.headers.iter().map(|u| u.prefixed_len()).sum();

        let mut samples = Vec::with_capacity(sample_count);
        let mut mdat_len = header_len;
        for (index, frame) in sequence.frames.iter().enumerate() {
            let mut size = frame.prefixed_len();
            mdat_len += size;
            if index == 0 {
                // the out-of-band headers sit at the head of mdat and are
                // accounted to the first sample's span
                size += header_len;
            }

            let pts = sequence.pts_at(index) + implicit_offset;
            let composition_time_offset = (pts - index as i64) as u32 * sample_delta;

            samples.push(Mp4Sample {
                index: index as u32,
                size: size as u32,
                duration: sample_delta,
                composition_time_offset,
                flags: if frame.is_key_frame {
                    SampleFlags::key()
                } else {
                    SampleFlags::non_key()
                },
            });
        }

        Ok(Mp4Track {
            id: ids.allocate(),
            kind: TrackKind::Video,
            len: mdat_len,
            sps,
            pps,
            width: sequence.width,
            height: sequence.height,
            timescale: BASE_MEDIA_TIMESCALE,
            duration,
            frame_rate: sequence.frame_rate,
            samples,
            pts_list: (0..sample_count)
                .map(|i| sequence.pts_at(i))
                .collect(),
            implicit_offset,
            channel_count: 0,
            sample_rate: 0,
            audio_config: Bytes::new(),
        })
    }
}

/// Smallest correction that keeps every presentation offset non-negative:
/// `max(0, -(min(pts[i] - i)))` over all samples.
fn implicit_offset(sequence: &VideoSequence) -> i64 {
    let min_delta = (0..sequence.frames.len())
        .map(|i| sequence.pts_at(i) - i as i64)
        .min()
        .unwrap_or(0);
    (-min_delta).max(0)
}

fn put_prefixed(buffer: &mut BytesMut, payload: &Bytes) {
    buffer.put_u32(payload.len() as u32);
    buffer.put_slice(payload);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::h264::{segment_frames, NalUnit};
    use pretty_assertions::assert_eq;

    fn sps() -> NalUnit {
        NalUnit::new(vec![0x67, 0x42, 0x00, 0x1E, 0x8C, 0x8D, 0x40])
    }

    fn pps() -> NalUnit {
        NalUnit::new(vec![0x68, 0xCE, 0x38, 0x80])
    }

    fn slice_units(count: usize) -> Vec<NalUnit> {
        (0..count)
            .map(|i| {
                let header = if i == 0 { 0x65 } else { 0x41 };
                NalUnit::new(vec![header, 0x88, 0x80, 0x00, i as u8])
            })
            .collect()
    }

    fn sequence(frame_count: usize, frame_rate: f64) -> VideoSequence {
        VideoSequence {
            width: 320,
            height: 240,
            frame_rate,
            headers: vec![sps(), pps()],
            frames: segment_frames(slice_units(frame_count)).unwrap(),
            pts_list: Vec::new(),
        }
    }

    #[test]
    fn rejects_missing_headers() {
        let mut seq = sequence(5, 30.0);
        seq.headers.truncate(1);
        let err = Mp4Muxer::new().mux(&seq, &TrackIdAllocator::new());
        assert!(matches!(err, Err(VidError::Config(_))));
    }

    #[test]
    fn rejects_sps_without_pps() {
        let mut seq = sequence(5, 30.0);
        seq.headers = vec![sps(), sps()];
        let err = Mp4Muxer::new().mux(&seq, &TrackIdAllocator::new());
        assert!(matches!(err, Err(VidError::Config(_))));
    }

    #[test]
    fn rejects_undersized_sps_payload() {
        let mut seq = sequence(5, 30.0);
        seq.headers[0] = NalUnit::new(vec![0x67, 0x42]);
        let err = Mp4Muxer::new().mux(&seq, &TrackIdAllocator::new());
        assert!(matches!(err, Err(VidError::Codec(_))));
    }

    #[test]
    fn rejects_empty_frame_list() {
        let mut seq = sequence(5, 30.0);
        seq.frames.clear();
        let err = Mp4Muxer::new().mux(&seq, &TrackIdAllocator::new());
        assert!(matches!(err, Err(VidError::InvalidData(_))));
    }

    #[test]
    fn first_sample_absorbs_header_bytes() {
        let seq = sequence(3, 30.0);
        let track = Mp4Muxer::new()
            .build_track(&seq, &TrackIdAllocator::new())
            .unwrap();

        let header_len: usize = seq.headers.iter().map(|u| u.prefixed_len()).sum();
        let frame_len = seq.frames[0].prefixed_len();
        assert_eq!(track.samples[0].size as usize, frame_len + header_len);
        assert_eq!(track.samples[1].size as usize, seq.frames[1].prefixed_len());
        assert_eq!(
            track.len,
            header_len + seq.frames.iter().map(|f| f.prefixed_len()).sum::<usize>()
        );
    }

    #[test]
    fn implicit_offset_keeps_offsets_non_negative() {
        let mut seq = sequence(4, 30.0);
        // decode order 0..4 displayed as 0,2,1,3 with a leading B-frame shift
        seq.pts_list = vec![1, 3, 0, 2];
        let track = Mp4Muxer::new()
            .build_track(&seq, &TrackIdAllocator::new())
            .unwrap();

        assert_eq!(track.implicit_offset, 2);
        for (i, sample) in track.samples.iter().enumerate() {
            let pts = seq.pts_at(i) + track.implicit_offset;
            assert!(pts - i as i64 >= 0);
            assert_eq!(
                sample.composition_time_offset,
                (pts - i as i64) as u32 * track.sample_delta()
            );
        }
    }

    #[test]
    fn key_frames_get_sync_flags() {
        let seq = sequence(3, 30.0);
        let track = Mp4Muxer::new()
            .build_track(&seq, &TrackIdAllocator::new())
            .unwrap();
        assert!(track.samples[0].flags.is_key_frame);
        assert_eq!(track.samples[0].flags.depends_on, 2);
        assert_eq!(track.samples[0].flags.is_non_sync, 0);
        assert!(!track.samples[1].flags.is_key_frame);
        assert_eq!(track.samples[1].flags.depends_on, 1);
        assert_eq!(track.samples[1].flags.is_non_sync, 1);
    }

    #[test]
    fn thirty_frames_at_thirty_fps_give_second_long_track() {
        let seq = sequence(30, 30.0);
        let track = Mp4Muxer::new()
            .build_track(&seq, &TrackIdAllocator::new())
            .unwrap();
        assert_eq!(track.duration, 1000);
        assert_eq!(track.sample_delta(), 33);
        assert_eq!(track.samples.len(), 30);
    }
}
