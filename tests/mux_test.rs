//! End-to-end container checks: a synthetic elementary stream goes through
//! segmentation and muxing, and the resulting box tree is walked byte by
//! byte.

use pretty_assertions::assert_eq;
use vidsync::codec::h264::{segment_frames, NalUnit, VideoSequence};
use vidsync::format::mp4::{Mp4Muxer, TrackIdAllocator};

fn sps() -> NalUnit {
    NalUnit::new(vec![0x67, 0x42, 0x00, 0x1E, 0x8C, 0x8D, 0x40])
}

fn pps() -> NalUnit {
    NalUnit::new(vec![0x68, 0xCE, 0x38, 0x80])
}

fn sequence(frame_count: usize, frame_rate: f64) -> VideoSequence {
    let units = (0..frame_count)
        .map(|i| {
            let header = if i == 0 { 0x65 } else { 0x41 };
            NalUnit::new(vec![header, 0x88, 0x80, 0x00, i as u8])
        })
        .collect();

    VideoSequence {
        width: 320,
        height: 240,
        frame_rate,
        headers: vec![sps(), pps()],
        frames: segment_frames(units).unwrap(),
        pts_list: Vec::new(),
    }
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// Returns the full span (header included) of the first direct child named
/// `fourcc` inside `container`, which must be a sequence of boxes.
fn find_box<'a>(container: &'a [u8], fourcc: &[u8; 4]) -> &'a [u8] {
    let mut at = 0;
    while at + 8 <= container.len() {
        let size = read_u32(container, at) as usize;
        assert!(size >= 8, "box at {} declares size {}", at, size);
        assert!(at + size <= container.len(), "box overruns container");
        if &container[at + 4..at + 8] == fourcc {
            return &container[at..at + size];
        }
        at += size;
    }
    panic!(
        "box {:?} not found",
        std::str::from_utf8(fourcc).unwrap_or("????")
    );
}

fn is_container(fourcc: &[u8]) -> bool {
    matches!(
        fourcc,
        b"moov" | b"trak" | b"edts" | b"mdia" | b"minf" | b"dinf" | b"stbl" | b"mvex" | b"moof"
            | b"traf"
    )
}

/// Every declared box size must equal the span it encloses, recursively.
fn walk(container: &[u8]) -> usize {
    let mut at = 0;
    let mut count = 0;
    while at < container.len() {
        assert!(at + 8 <= container.len(), "trailing bytes are not a box");
        let size = read_u32(container, at) as usize;
        let fourcc = &container[at + 4..at + 8];
        assert!(size >= 8, "box {:?} declares size {}", fourcc, size);
        assert!(
            at + size <= container.len(),
            "box {:?} overruns its container",
            fourcc
        );
        count += 1;
        if is_container(fourcc) {
            count += walk(&container[at + 8..at + size]);
        }
        at += size;
    }
    assert_eq!(at, container.len(), "children must tile the container");
    count
}

#[test]
fn thirty_frames_at_thirty_fps() {
    let buffer = Mp4Muxer::new()
        .mux(&sequence(30, 30.0), &TrackIdAllocator::new())
        .unwrap();

    let moov = find_box(&buffer, b"moov");
    let mvhd = find_box(&moov[8..], b"mvhd");
    // version 0 mvhd: timescale at 20, duration at 24
    assert_eq!(read_u32(mvhd, 20), 1000);
    assert_eq!(read_u32(mvhd, 24), 1000);

    let moof = find_box(&buffer, b"moof");
    let traf = find_box(&moof[8..], b"traf");
    let trun = find_box(&traf[8..], b"trun");
    // version 0 trun: sample_count right after version/flags
    assert_eq!(read_u32(trun, 12), 30);
}

#[test]
fn box_sizes_tile_the_buffer_exactly() {
    let buffer = Mp4Muxer::new()
        .mux(&sequence(12, 24.0), &TrackIdAllocator::new())
        .unwrap();

    let boxes = walk(&buffer);
    assert!(boxes > 20, "expected a full tree, saw {} boxes", boxes);
}

#[test]
fn root_boxes_appear_in_streaming_order() {
    let buffer = Mp4Muxer::new()
        .mux(&sequence(5, 30.0), &TrackIdAllocator::new())
        .unwrap();

    let mut at = 0;
    let mut roots = Vec::new();
    while at < buffer.len() {
        let size = read_u32(&buffer, at) as usize;
        roots.push(buffer[at + 4..at + 8].to_vec());
        at += size;
    }
    let expected: Vec<Vec<u8>> = [b"ftyp", b"moov", b"moof", b"mdat"]
        .iter()
        .map(|b| b.to_vec())
        .collect();
    assert_eq!(roots, expected);
}

#[test]
fn mdat_holds_length_prefixed_units() {
    let seq = sequence(3, 30.0);
    let buffer = Mp4Muxer::new().mux(&seq, &TrackIdAllocator::new()).unwrap();

    let mdat = find_box(&buffer, b"mdat");
    let payload = &mdat[8..];

    // parameter sets first, then the slices, each 4-byte length prefixed
    let mut at = 0;
    let mut payloads = Vec::new();
    while at < payload.len() {
        let len = read_u32(payload, at) as usize;
        payloads.push(&payload[at + 4..at + 4 + len]);
        at += 4 + len;
    }
    assert_eq!(at, payload.len());
    assert_eq!(payloads.len(), 2 + 3);
    assert_eq!(payloads[0], &seq.headers[0].payload[..]);
    assert_eq!(payloads[1], &seq.headers[1].payload[..]);
    assert_eq!(payloads[2][0], 0x65);
}

#[test]
fn trun_data_offset_points_at_mdat_payload() {
    let buffer = Mp4Muxer::new()
        .mux(&sequence(8, 30.0), &TrackIdAllocator::new())
        .unwrap();

    let ftyp = find_box(&buffer, b"ftyp");
    let moov = find_box(&buffer, b"moov");
    let moof = find_box(&buffer, b"moof");
    let traf = find_box(&moof[8..], b"traf");
    let trun = find_box(&traf[8..], b"trun");

    // trun v0 with data-offset flag: version/flags, sample_count, data_offset
    let data_offset = read_u32(trun, 16) as usize;
    let moof_start = ftyp.len() + moov.len();
    let mdat_payload_start = moof_start + moof.len() + 8;
    assert_eq!(moof_start + data_offset, mdat_payload_start);
}
