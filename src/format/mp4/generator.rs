//! ISO BMFF box serialization.
//!
//! Every box is `{u32 big-endian total size}{4-byte ASCII type}{payload}`,
//! composed recursively; every multi-byte integer in every payload is
//! big-endian. The host decoder accepts no tolerance in sizes or offsets, so
//! the `trun` data offset below is accounted byte for byte against the boxes
//! that precede the `mdat` payload.

use std::time::{SystemTime, UNIX_EPOCH};

use super::types::{Mp4Track, TrackKind};

// seconds between 1904-01-01 (MP4 epoch) and 1970-01-01
const CORRECTION_UTC: u64 = 2_082_873_600;

fn make_box(kind: &[u8; 4], payloads: &[&[u8]]) -> Vec<u8> {
    let size = 8 + payloads.iter().map(|p| p.len()).sum::<usize>();
    let mut out = Vec::with_capacity(size);
    out.extend_from_slice(&(size as u32).to_be_bytes());
    out.extend_from_slice(kind);
    for payload in payloads {
        out.extend_from_slice(payload);
    }
    out
}

fn creation_time() -> u32 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    (now + CORRECTION_UTC) as u32
}

// 16.16 fixed-point identity matrix shared by mvhd and tkhd
const UNITY_MATRIX: [u8; 36] = [
    0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x00,
];

/// `ftyp`: isom major brand, isom/iso2/avc1/mp41 compatible brands.
pub fn ftyp() -> Vec<u8> {
    make_box(
        b"ftyp",
        &[
            b"isom",
            &1u32.to_be_bytes(), // minor_version
            b"isom",
            b"iso2",
            b"avc1",
            b"mp41",
        ],
    )
}

/// `moov`: movie header, one `trak` per track, `mvex` for fragmenting.
pub fn moov(tracks: &[Mp4Track], duration: u32, timescale: u32) -> Vec<u8> {
    let next_track_id = tracks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
    let mut payloads: Vec<Vec<u8>> = vec![mvhd(timescale, duration, next_track_id)];
    for track in tracks {
        payloads.push(trak(track));
    }
    payloads.push(mvex(tracks));

    let refs: Vec<&[u8]> = payloads.iter().map(|p| p.as_slice()).collect();
    make_box(b"moov", &refs)
}

/// `moof`: one fragment header plus the track fragment for `track`.
pub fn moof(sequence_number: u32, base_media_decode_time: u32, track: &Mp4Track) -> Vec<u8> {
    make_box(
        b"moof",
        &[&mfhd(sequence_number), &traf(base_media_decode_time, track)],
    )
}

/// `mdat` wrapping the concatenated length-prefixed NAL payloads.
pub fn mdat(data: &[u8]) -> Vec<u8> {
    make_box(b"mdat", &[data])
}

fn mvhd(timescale: u32, duration: u32, next_track_id: u32) -> Vec<u8> {
    let now = creation_time();
    let mut payload = Vec::with_capacity(100);
    payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // version 0, flags
    payload.extend_from_slice(&now.to_be_bytes()); // creation_time
    payload.extend_from_slice(&now.to_be_bytes()); // modification_time
    payload.extend_from_slice(&timescale.to_be_bytes());
    payload.extend_from_slice(&duration.to_be_bytes());
    payload.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // rate 1.0
    payload.extend_from_slice(&0x0100u16.to_be_bytes()); // volume 1.0
    payload.extend_from_slice(&[0u8; 2]); // reserved
    payload.extend_from_slice(&[0u8; 8]); // reserved
    payload.extend_from_slice(&UNITY_MATRIX);
    payload.extend_from_slice(&[0u8; 24]); // pre_defined
    payload.extend_from_slice(&next_track_id.to_be_bytes());
    make_box(b"mvhd", &[&payload])
}

fn trak(track: &Mp4Track) -> Vec<u8> {
    make_box(b"trak", &[&tkhd(track), &edts(track), &mdia(track)])
}

fn tkhd(track: &Mp4Track) -> Vec<u8> {
    let now = creation_time();
    let volume: u16 = if track.kind == TrackKind::Audio { 0x0100 } else { 0 };
    let mut payload = Vec::with_capacity(84);
    payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]); // version 0, flags: enabled
    payload.extend_from_slice(&now.to_be_bytes());
    payload.extend_from_slice(&now.to_be_bytes());
    payload.extend_from_slice(&track.id.to_be_bytes());
    payload.extend_from_slice(&[0u8; 4]); // reserved
    payload.extend_from_slice(&track.duration.to_be_bytes());
    payload.extend_from_slice(&[0u8; 8]); // reserved
    payload.extend_from_slice(&[0u8; 2]); // layer
    payload.extend_from_slice(&[0u8; 2]); // alternate_group
    payload.extend_from_slice(&volume.to_be_bytes());
    payload.extend_from_slice(&[0u8; 2]); // reserved
    payload.extend_from_slice(&UNITY_MATRIX);
    payload.extend_from_slice(&((track.width as u32) << 16).to_be_bytes()); // 16.16
    payload.extend_from_slice(&((track.height as u32) << 16).to_be_bytes());
    make_box(b"tkhd", &[&payload])
}

fn edts(track: &Mp4Track) -> Vec<u8> {
    make_box(b"edts", &[&elst(track)])
}

// Single edit shifting presentation by the implicit composition offset, so
// the first displayed frame lines up with time zero.
fn elst(track: &Mp4Track) -> Vec<u8> {
    let media_time = track.implicit_offset as u32 * track.sample_delta();
    let mut payload = Vec::with_capacity(20);
    payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    payload.extend_from_slice(&1u32.to_be_bytes()); // entry_count
    payload.extend_from_slice(&track.duration.to_be_bytes()); // segment_duration
    payload.extend_from_slice(&media_time.to_be_bytes());
    payload.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // media_rate 1.0
    make_box(b"elst", &[&payload])
}

fn mdia(track: &Mp4Track) -> Vec<u8> {
    make_box(
        b"mdia",
        &[
            &mdhd(track.timescale, track.duration),
            &hdlr(track.kind),
            &minf(track),
        ],
    )
}

fn mdhd(timescale: u32, duration: u32) -> Vec<u8> {
    let now = creation_time();
    let mut payload = Vec::with_capacity(24);
    payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    payload.extend_from_slice(&now.to_be_bytes());
    payload.extend_from_slice(&now.to_be_bytes());
    payload.extend_from_slice(&timescale.to_be_bytes());
    payload.extend_from_slice(&duration.to_be_bytes());
    payload.extend_from_slice(&0x55C4u16.to_be_bytes()); // language 'und'
    payload.extend_from_slice(&[0u8; 2]); // pre_defined
    make_box(b"mdhd", &[&payload])
}

fn hdlr(kind: TrackKind) -> Vec<u8> {
    let (handler, name): (&[u8; 4], &[u8]) = match kind {
        TrackKind::Video => (b"vide", b"VideoHandler\0"),
        TrackKind::Audio => (b"soun", b"SoundHandler\0"),
    };
    let mut payload = Vec::with_capacity(25 + name.len());
    payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    payload.extend_from_slice(&[0u8; 4]); // pre_defined
    payload.extend_from_slice(handler);
    payload.extend_from_slice(&[0u8; 12]); // reserved
    payload.extend_from_slice(name);
    make_box(b"hdlr", &[&payload])
}

fn minf(track: &Mp4Track) -> Vec<u8> {
    let media_header = match track.kind {
        TrackKind::Video => vmhd(),
        TrackKind::Audio => smhd(),
    };
    make_box(b"minf", &[&media_header, &dinf(), &stbl(track)])
}

fn vmhd() -> Vec<u8> {
    let mut payload = Vec::with_capacity(12);
    payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]); // flags
    payload.extend_from_slice(&[0u8; 2]); // graphicsmode
    payload.extend_from_slice(&[0u8; 6]); // opcolor
    make_box(b"vmhd", &[&payload])
}

fn smhd() -> Vec<u8> {
    let mut payload = Vec::with_capacity(8);
    payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    payload.extend_from_slice(&[0u8; 2]); // balance
    payload.extend_from_slice(&[0u8; 2]); // reserved
    make_box(b"smhd", &[&payload])
}

// Data stored in-file: one self-contained 'url ' entry.
fn dinf() -> Vec<u8> {
    let mut dref = Vec::with_capacity(20);
    dref.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    dref.extend_from_slice(&1u32.to_be_bytes()); // entry_count
    dref.extend_from_slice(&12u32.to_be_bytes()); // entry_size
    dref.extend_from_slice(b"url ");
    dref.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]); // entry_flags: self-contained
    make_box(b"dinf", &[&make_box(b"dref", &[&dref])])
}

fn stbl(track: &Mp4Track) -> Vec<u8> {
    make_box(
        b"stbl",
        &[
            &stsd(track),
            &stts(track),
            &ctts(track),
            &stss(track),
            &empty_full_box(b"stsc"),
            &empty_stsz(),
            &empty_full_box(b"stco"),
        ],
    )
}

fn stsd(track: &Mp4Track) -> Vec<u8> {
    let mut header = Vec::with_capacity(8);
    header.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    header.extend_from_slice(&1u32.to_be_bytes()); // entry_count
    let entry = match track.kind {
        TrackKind::Video => avc1(track),
        TrackKind::Audio => mp4a(track),
    };
    make_box(b"stsd", &[&header, &entry])
}

fn avc1(track: &Mp4Track) -> Vec<u8> {
    let mut payload = Vec::with_capacity(78);
    payload.extend_from_slice(&[0u8; 6]); // reserved
    payload.extend_from_slice(&1u16.to_be_bytes()); // data_reference_index
    payload.extend_from_slice(&[0u8; 2]); // pre_defined
    payload.extend_from_slice(&[0u8; 2]); // reserved
    payload.extend_from_slice(&[0u8; 12]); // pre_defined
    payload.extend_from_slice(&(track.width as u16).to_be_bytes());
    payload.extend_from_slice(&(track.height as u16).to_be_bytes());
    payload.extend_from_slice(&0x0048_0000u32.to_be_bytes()); // horizresolution 72dpi
    payload.extend_from_slice(&0x0048_0000u32.to_be_bytes()); // vertresolution
    payload.extend_from_slice(&[0u8; 4]); // reserved
    payload.extend_from_slice(&1u16.to_be_bytes()); // frame_count
    payload.extend_from_slice(&[0u8; 32]); // compressorname (empty)
    payload.extend_from_slice(&0x0018u16.to_be_bytes()); // depth = 24
    payload.extend_from_slice(&0xFFFFu16.to_be_bytes()); // pre_defined = -1
    make_box(b"avc1", &[&payload, &avcc(track)])
}

fn avcc(track: &Mp4Track) -> Vec<u8> {
    // profile/compat/level come straight from the first SPS, right after its
    // NAL header byte
    let sps0 = &track.sps[0];
    let mut payload = Vec::new();
    payload.push(0x01); // configurationVersion
    payload.push(sps0[1]); // AVCProfileIndication
    payload.push(sps0[2]); // profile_compatibility
    payload.push(sps0[3]); // AVCLevelIndication
    payload.push(0xFC | 3); // lengthSizeMinusOne: 4-byte prefixes
    payload.push(0xE0 | track.sps.len() as u8);
    for sps in &track.sps {
        payload.extend_from_slice(&(sps.len() as u16).to_be_bytes());
        payload.extend_from_slice(sps);
    }
    payload.push(track.pps.len() as u8);
    for pps in &track.pps {
        payload.extend_from_slice(&(pps.len() as u16).to_be_bytes());
        payload.extend_from_slice(pps);
    }
    make_box(b"avcC", &[&payload])
}

fn mp4a(track: &Mp4Track) -> Vec<u8> {
    let mut payload = Vec::with_capacity(28);
    payload.extend_from_slice(&[0u8; 6]); // reserved
    payload.extend_from_slice(&1u16.to_be_bytes()); // data_reference_index
    payload.extend_from_slice(&[0u8; 8]); // reserved
    payload.extend_from_slice(&track.channel_count.to_be_bytes());
    payload.extend_from_slice(&16u16.to_be_bytes()); // samplesize
    payload.extend_from_slice(&[0u8; 2]); // pre_defined
    payload.extend_from_slice(&[0u8; 2]); // reserved
    payload.extend_from_slice(&(track.sample_rate << 16).to_be_bytes()); // 16.16
    make_box(b"mp4a", &[&payload, &make_box(b"esds", &[&esds(track)])])
}

fn esds(track: &Mp4Track) -> Vec<u8> {
    let config_len = track.audio_config.len() as u8;
    let mut payload = Vec::with_capacity(29 + config_len as usize);
    payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    payload.push(0x03); // ES_Descriptor
    payload.push(0x17 + config_len);
    payload.extend_from_slice(&1u16.to_be_bytes()); // es_id
    payload.push(0x00); // stream_priority
    payload.push(0x04); // DecoderConfigDescriptor
    payload.push(0x0F + config_len);
    payload.push(0x40); // object type: mpeg4 audio
    payload.push(0x15); // stream type
    payload.extend_from_slice(&[0u8; 3]); // buffer_size
    payload.extend_from_slice(&[0u8; 4]); // maxBitrate
    payload.extend_from_slice(&[0u8; 4]); // avgBitrate
    payload.push(0x05); // DecoderSpecificInfo
    payload.push(config_len);
    payload.extend_from_slice(&track.audio_config);
    payload.extend_from_slice(&[0x06, 0x01, 0x02]); // SLConfigDescriptor
    payload
}

// One stts run covering every sample at the truncated sample delta.
fn stts(track: &Mp4Track) -> Vec<u8> {
    let mut payload = Vec::with_capacity(16);
    payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    payload.extend_from_slice(&1u32.to_be_bytes()); // entry_count
    payload.extend_from_slice(&(track.samples.len() as u32).to_be_bytes());
    payload.extend_from_slice(&track.sample_delta().to_be_bytes());
    make_box(b"stts", &[&payload])
}

// One ctts entry per sample; correctness over compactness.
fn ctts(track: &Mp4Track) -> Vec<u8> {
    let mut payload = Vec::with_capacity(8 + track.samples.len() * 8);
    payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    payload.extend_from_slice(&(track.samples.len() as u32).to_be_bytes());
    for sample in &track.samples {
        payload.extend_from_slice(&1u32.to_be_bytes()); // sample_count
        payload.extend_from_slice(&sample.composition_time_offset.to_be_bytes());
    }
    make_box(b"ctts", &[&payload])
}

// 1-based indices of sync samples.
fn stss(track: &Mp4Track) -> Vec<u8> {
    let key_frames: Vec<u32> = track
        .samples
        .iter()
        .filter(|s| s.flags.is_key_frame)
        .map(|s| s.index + 1)
        .collect();
    let mut payload = Vec::with_capacity(8 + key_frames.len() * 4);
    payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    payload.extend_from_slice(&(key_frames.len() as u32).to_be_bytes());
    for index in key_frames {
        payload.extend_from_slice(&index.to_be_bytes());
    }
    make_box(b"stss", &[&payload])
}

fn empty_full_box(kind: &[u8; 4]) -> Vec<u8> {
    make_box(kind, &[&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]])
}

fn empty_stsz() -> Vec<u8> {
    let mut payload = Vec::with_capacity(12);
    payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    payload.extend_from_slice(&[0u8; 4]); // sample_size
    payload.extend_from_slice(&[0u8; 4]); // sample_count
    make_box(b"stsz", &[&payload])
}

fn mvex(tracks: &[Mp4Track]) -> Vec<u8> {
    let trexes: Vec<Vec<u8>> = tracks.iter().map(trex).collect();
    let refs: Vec<&[u8]> = trexes.iter().map(|p| p.as_slice()).collect();
    make_box(b"mvex", &refs)
}

fn trex(track: &Mp4Track) -> Vec<u8> {
    let mut payload = Vec::with_capacity(24);
    payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    payload.extend_from_slice(&track.id.to_be_bytes());
    payload.extend_from_slice(&1u32.to_be_bytes()); // default_sample_description_index
    payload.extend_from_slice(&[0u8; 4]); // default_sample_duration
    payload.extend_from_slice(&[0u8; 4]); // default_sample_size
    payload.extend_from_slice(&0x0001_0001u32.to_be_bytes()); // default_sample_flags
    make_box(b"trex", &[&payload])
}

fn mfhd(sequence_number: u32) -> Vec<u8> {
    let mut payload = Vec::with_capacity(8);
    payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    payload.extend_from_slice(&sequence_number.to_be_bytes());
    make_box(b"mfhd", &[&payload])
}

fn traf(base_media_decode_time: u32, track: &Mp4Track) -> Vec<u8> {
    let sdtp = sdtp(track);
    // bytes between the start of moof and the trun box, plus the mdat header;
    // trun() adds its own size on top
    let offset = sdtp.len()
        + 16 // tfhd
        + 16 // tfdt
        + 8 // traf header
        + 16 // mfhd
        + 8 // moof header
        + 8; // mdat header
    make_box(
        b"traf",
        &[
            &tfhd(track.id),
            &tfdt(base_media_decode_time),
            &trun(track, offset),
            &sdtp,
        ],
    )
}

fn tfhd(track_id: u32) -> Vec<u8> {
    let mut payload = Vec::with_capacity(8);
    payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    payload.extend_from_slice(&track_id.to_be_bytes());
    make_box(b"tfhd", &[&payload])
}

fn tfdt(base_media_decode_time: u32) -> Vec<u8> {
    let mut payload = Vec::with_capacity(8);
    payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    payload.extend_from_slice(&base_media_decode_time.to_be_bytes());
    make_box(b"tfdt", &[&payload])
}

fn trun(track: &Mp4Track, offset: usize) -> Vec<u8> {
    let len = track.samples.len();
    let data_offset = (offset + 8 + 12 + 16 * len) as u32;
    let mut payload = Vec::with_capacity(12 + 16 * len);
    // flags: data-offset, sample-duration, sample-size, sample-flags,
    // sample-composition-time-offset all present
    payload.extend_from_slice(&[0x00, 0x00, 0x0F, 0x01]);
    payload.extend_from_slice(&(len as u32).to_be_bytes());
    payload.extend_from_slice(&data_offset.to_be_bytes());
    for sample in &track.samples {
        let flags = &sample.flags;
        payload.extend_from_slice(&sample.duration.to_be_bytes());
        payload.extend_from_slice(&sample.size.to_be_bytes());
        payload.push((flags.is_leading << 2) | flags.depends_on);
        payload.push(
            (flags.is_depended_on << 6)
                | (flags.has_redundancy << 4)
                | (flags.padding_value << 1)
                | flags.is_non_sync,
        );
        payload.extend_from_slice(&flags.degradation_priority.to_be_bytes());
        payload.extend_from_slice(&sample.composition_time_offset.to_be_bytes());
    }
    make_box(b"trun", &[&payload])
}

fn sdtp(track: &Mp4Track) -> Vec<u8> {
    let mut payload = Vec::with_capacity(4 + track.samples.len());
    payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    for sample in &track.samples {
        let flags = &sample.flags;
        payload.push((flags.depends_on << 4) | (flags.is_depended_on << 2) | flags.has_redundancy);
    }
    make_box(b"sdtp", &[&payload])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn box_header_carries_exact_size() {
        let inner = make_box(b"free", &[&[1, 2, 3]]);
        assert_eq!(inner.len(), 11);
        assert_eq!(&inner[0..4], &11u32.to_be_bytes());
        assert_eq!(&inner[4..8], b"free");

        let outer = make_box(b"moov", &[&inner, &inner]);
        assert_eq!(outer.len(), 8 + 22);
        assert_eq!(&outer[0..4], &(30u32).to_be_bytes());
    }

    #[test]
    fn ftyp_brands() {
        let ftyp = ftyp();
        assert_eq!(&ftyp[4..8], b"ftyp");
        assert_eq!(&ftyp[8..12], b"isom");
        assert_eq!(&ftyp[24..28], b"avc1");
        assert_eq!(ftyp.len(), 32);
    }

    #[test]
    fn empty_full_boxes_are_16_bytes() {
        assert_eq!(empty_full_box(b"stsc").len(), 16);
        assert_eq!(empty_full_box(b"stco").len(), 16);
        assert_eq!(empty_stsz().len(), 20);
    }
}
