//! Self-describing segment framing: `{u32 tag, u64 length, payload, u32
//! crc32}`, little-endian, payload-only checksum. An unknown tag is
//! skipped via its length prefix rather than rejected, so a newer writer's
//! extra segments don't break an older reader.

use crate::error::{PersistError, RabitqError, Result};
use std::io::{Read, Write};

/// 4-byte file magic, written once at the start of a dump.
pub const MAGIC: [u8; 4] = *b"ZVIX";
/// Dump format version, bumped on any incompatible segment-layout change.
pub const VERSION: u32 = 1;

macro_rules! tags {
    ($($name:ident = $val:expr),+ $(,)?) => {
        $(pub const $name: u32 = $val;)+
    };
}
tags! {
    TAG_META = 1,
    TAG_RBQ_CODEBOOK = 2,
    TAG_GRAPH_META = 3,
    TAG_NODE_KEYS = 4,
    TAG_NODE_LEVELS = 5,
    TAG_ENCODED_CHUNKS = 6,
    TAG_NEIGHBORS_BASE = 100, // NEIGHBORS_L{level}: TAG_NEIGHBORS_BASE + level
    TAG_KEY_MAP = 7,
}

/// Writes `{tag, len(payload), payload, crc32(payload)}` to `w`.
pub fn write_segment(w: &mut impl Write, tag: u32, payload: &[u8]) -> Result<()> {
    w.write_all(&tag.to_le_bytes())?;
    w.write_all(&(payload.len() as u64).to_le_bytes())?;
    w.write_all(payload)?;
    let crc = crc32fast::hash(payload);
    w.write_all(&crc.to_le_bytes())?;
    Ok(())
}

/// One decoded segment: its tag and payload (checksum already verified).
pub struct Segment {
    pub tag: u32,
    pub payload: Vec<u8>,
}

/// Reads one segment from `r`, verifying its CRC. Returns `Ok(None)` at a
/// clean end-of-stream (zero bytes read for the tag).
pub fn read_segment(r: &mut impl Read, check_crc: bool) -> Result<Option<Segment>> {
    let mut tag_buf = [0u8; 4];
    match r.read(&mut tag_buf)? {
        0 => return Ok(None),
        4 => {}
        n => {
            r.read_exact(&mut tag_buf[n..])?;
        }
    }
    let tag = u32::from_le_bytes(tag_buf);

    let mut len_buf = [0u8; 8];
    r.read_exact(&mut len_buf)?;
    let len = u64::from_le_bytes(len_buf);

    let mut payload = vec![0u8; len as usize];
    r.read_exact(&mut payload).map_err(|_| {
        RabitqError::Corrupt(PersistError::Truncated {
            tag,
            expected: len,
            actual: 0,
        })
    })?;

    let mut crc_buf = [0u8; 4];
    r.read_exact(&mut crc_buf)?;
    let expected_crc = u32::from_le_bytes(crc_buf);
    if check_crc {
        let actual_crc = crc32fast::hash(&payload);
        if actual_crc != expected_crc {
            return Err(RabitqError::Corrupt(PersistError::ChecksumMismatch {
                tag,
                expected: expected_crc,
                actual: actual_crc,
            }));
        }
    }
    Ok(Some(Segment { tag, payload }))
}

/// The `NEIGHBORS_L{level}` tag for a given graph level.
#[must_use]
pub fn neighbors_tag(level: u8) -> u32 {
    TAG_NEIGHBORS_BASE + u32::from(level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn write_then_read_roundtrips() {
        let mut buf = Vec::new();
        write_segment(&mut buf, TAG_META, b"hello").unwrap();
        write_segment(&mut buf, TAG_GRAPH_META, b"world").unwrap();
        let mut cur = Cursor::new(buf);
        let s1 = read_segment(&mut cur, true).unwrap().unwrap();
        assert_eq!(s1.tag, TAG_META);
        assert_eq!(s1.payload, b"hello");
        let s2 = read_segment(&mut cur, true).unwrap().unwrap();
        assert_eq!(s2.tag, TAG_GRAPH_META);
        assert!(read_segment(&mut cur, true).unwrap().is_none());
    }

    #[test]
    fn checksum_mismatch_detected() {
        let mut buf = Vec::new();
        write_segment(&mut buf, TAG_META, b"hello").unwrap();
        buf[12] ^= 0xFF; // corrupt a payload byte
        let mut cur = Cursor::new(buf);
        assert!(matches!(
            read_segment(&mut cur, true),
            Err(RabitqError::Corrupt(PersistError::ChecksumMismatch { .. }))
        ));
    }

    #[test]
    fn unknown_tag_is_skippable_via_length_prefix() {
        let mut buf = Vec::new();
        write_segment(&mut buf, 9999, b"from-the-future").unwrap();
        write_segment(&mut buf, TAG_META, b"known").unwrap();
        let mut cur = Cursor::new(buf);
        let unknown = read_segment(&mut cur, true).unwrap().unwrap();
        assert_eq!(unknown.tag, 9999);
        let known = read_segment(&mut cur, true).unwrap().unwrap();
        assert_eq!(known.payload, b"known");
    }
}
