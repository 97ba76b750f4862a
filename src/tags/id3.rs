//! ID3 tag decoding for MP3 files.
//!
//! Reads the leading ID3v2 tag (2.2, 2.3 and 2.4) and falls back to the trailing
//! 128-byte ID3v1 block for anything the v2 tag did not supply.

use super::{DecodeError, SeekRead, TagDecoder, TagKey, TagSet};
use std::borrow::Cow;
use std::io::{Read, SeekFrom};
use tracing::trace;

const FORMAT: &str = "ID3";
const HEADER_LEN: usize = 10;
const V1_TAG_LEN: usize = 128;

const FLAG_UNSYNC: u8 = 0x80;
const FLAG_EXTENDED: u8 = 0x40;

#[derive(Debug, Default, Clone, Copy)]
pub struct Id3Decoder;

impl Id3Decoder {
    pub fn new() -> Self {
        Self
    }
}

impl TagDecoder for Id3Decoder {
    fn name(&self) -> &'static str {
        "id3"
    }

    fn decode_from(&self, reader: &mut dyn SeekRead) -> Result<TagSet, DecodeError> {
        let (mut tags, v2_error) = match read_v2(reader) {
            Ok(tags) => (tags, None),
            Err(err) => (TagSet::new(), Some(err)),
        };

        if tags.keys().len() < 4 {
            if let Some(v1) = read_v1(reader)? {
                tags.merge_missing(v1);
            }
        }

        match v2_error {
            Some(err) if tags.is_empty() => Err(err),
            _ => tags.into_result(),
        }
    }
}

fn read_v2(reader: &mut dyn SeekRead) -> Result<TagSet, DecodeError> {
    reader.seek(SeekFrom::Start(0))?;

    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = reader.read(&mut header[filled..])?;
        if n == 0 {
            return Ok(TagSet::new());
        }
        filled += n;
    }

    if &header[..3] != b"ID3" {
        return Ok(TagSet::new());
    }

    let major = header[3];
    let flags = header[5];
    if !(2..=4).contains(&major) {
        return Err(DecodeError::malformed(
            FORMAT,
            format!("unsupported version 2.{}", major),
        ));
    }

    let size = synchsafe(&header[6..10])
        .ok_or_else(|| DecodeError::malformed(FORMAT, "tag size is not synchsafe"))?
        as usize;

    let mut body = Vec::with_capacity(size.min(1 << 20));
    (&mut *reader).take(size as u64).read_to_end(&mut body)?;
    if body.len() < size {
        return Err(DecodeError::malformed(FORMAT, "tag is truncated"));
    }

    if major == 2 && flags & FLAG_EXTENDED != 0 {
        // v2.2 used this bit for a compression scheme that was never defined
        return Err(DecodeError::malformed(FORMAT, "compressed v2.2 tag"));
    }

    let tag_unsync = flags & FLAG_UNSYNC != 0;
    if tag_unsync && major < 4 {
        body = remove_unsync(&body);
    }

    let mut start = 0;
    if major >= 3 && flags & FLAG_EXTENDED != 0 {
        if body.len() < 4 {
            return Err(DecodeError::malformed(FORMAT, "extended header is truncated"));
        }
        let ext_len = if major == 3 {
            u32::from_be_bytes([body[0], body[1], body[2], body[3]]) as usize + 4
        } else {
            synchsafe(&body[..4])
                .ok_or_else(|| DecodeError::malformed(FORMAT, "bad extended header size"))?
                as usize
        };
        if ext_len > body.len() {
            return Err(DecodeError::malformed(FORMAT, "extended header overruns tag"));
        }
        start = ext_len;
    }

    parse_frames(&body[start..], major, tag_unsync && major == 4)
}

fn parse_frames(mut data: &[u8], major: u8, tag_unsync: bool) -> Result<TagSet, DecodeError> {
    let (id_len, header_len) = if major == 2 { (3, 6) } else { (4, 10) };
    let mut tags = TagSet::new();
    let mut overrun = None;

    while data.len() >= header_len {
        if data[0] == 0 {
            break; // padding
        }

        let id = &data[..id_len];
        if !id.iter().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()) {
            break;
        }

        let size = match major {
            2 => u32::from_be_bytes([0, data[3], data[4], data[5]]),
            3 => u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            _ => synchsafe(&data[4..8])
                .unwrap_or_else(|| u32::from_be_bytes([data[4], data[5], data[6], data[7]])),
        } as usize;
        let flags = if major == 2 { 0 } else { data[9] };

        let end = header_len + size;
        if end > data.len() {
            overrun = Some(String::from_utf8_lossy(id).into_owned());
            break;
        }

        let payload = &data[header_len..end];
        data = &data[end..];

        let Some(key) = frame_key(id) else {
            continue;
        };

        let Some(payload) = frame_payload(payload, major, flags, tag_unsync) else {
            trace!(frame = %String::from_utf8_lossy(id), "skipping compressed or encrypted frame");
            continue;
        };

        if let Some(text) = decode_text(&payload) {
            tags.set_text(key, text);
        }
    }

    match overrun {
        Some(frame) if tags.is_empty() => Err(DecodeError::malformed(
            FORMAT,
            format!("frame {} overruns tag", frame),
        )),
        _ => Ok(tags),
    }
}

fn frame_key(id: &[u8]) -> Option<TagKey> {
    match id {
        b"TPE1" | b"TP1" => Some(TagKey::Artist),
        b"TALB" | b"TAL" => Some(TagKey::Album),
        b"TRCK" | b"TRK" => Some(TagKey::Track),
        b"TIT2" | b"TT2" => Some(TagKey::Title),
        _ => None,
    }
}

/// Strips per-frame prefixes. Returns None for frames we cannot read.
fn frame_payload(payload: &[u8], major: u8, flags: u8, tag_unsync: bool) -> Option<Cow<'_, [u8]>> {
    let mut payload = payload;
    match major {
        3 => {
            if flags & 0xC0 != 0 {
                return None;
            }
            if flags & 0x20 != 0 {
                payload = payload.get(1..)?;
            }
            Some(Cow::Borrowed(payload))
        }
        4 => {
            if flags & 0x0C != 0 {
                return None;
            }
            if flags & 0x40 != 0 {
                payload = payload.get(1..)?;
            }
            if flags & 0x01 != 0 {
                payload = payload.get(4..)?;
            }
            if flags & 0x02 != 0 || tag_unsync {
                Some(Cow::Owned(remove_unsync(payload)))
            } else {
                Some(Cow::Borrowed(payload))
            }
        }
        _ => Some(Cow::Borrowed(payload)),
    }
}

/// Decodes the first value of a text frame.
fn decode_text(payload: &[u8]) -> Option<String> {
    let (&encoding, text) = payload.split_first()?;
    let value = match encoding {
        0 => latin1(text),
        1 => utf16(text, false),
        2 => utf16(text, true),
        3 => String::from_utf8_lossy(until_nul(text)).into_owned(),
        _ => return None,
    };
    Some(value)
}

fn until_nul(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(end) => &bytes[..end],
        None => bytes,
    }
}

fn latin1(bytes: &[u8]) -> String {
    until_nul(bytes).iter().map(|&b| b as char).collect()
}

fn utf16(bytes: &[u8], mut big_endian: bool) -> String {
    let mut bytes = bytes;
    match bytes {
        [0xFF, 0xFE, rest @ ..] => {
            big_endian = false;
            bytes = rest;
        }
        [0xFE, 0xFF, rest @ ..] => {
            big_endian = true;
            bytes = rest;
        }
        _ => {}
    }

    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| {
            if big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                u16::from_le_bytes([pair[0], pair[1]])
            }
        })
        .take_while(|&unit| unit != 0)
        .collect();

    String::from_utf16_lossy(&units)
}

fn synchsafe(bytes: &[u8]) -> Option<u32> {
    if bytes.iter().any(|b| b & 0x80 != 0) {
        return None;
    }
    Some(bytes.iter().fold(0u32, |acc, &b| (acc << 7) | b as u32))
}

fn remove_unsync(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut prev_ff = false;
    for &b in data {
        if prev_ff && b == 0x00 {
            prev_ff = false;
            continue;
        }
        out.push(b);
        prev_ff = b == 0xFF;
    }
    out
}

fn read_v1(reader: &mut dyn SeekRead) -> Result<Option<TagSet>, DecodeError> {
    let len = reader.seek(SeekFrom::End(0))?;
    if len < V1_TAG_LEN as u64 {
        return Ok(None);
    }

    reader.seek(SeekFrom::End(-(V1_TAG_LEN as i64)))?;
    let mut block = [0u8; V1_TAG_LEN];
    reader.read_exact(&mut block)?;

    if &block[..3] != b"TAG" {
        return Ok(None);
    }

    let mut tags = TagSet::new();
    tags.set_text(TagKey::Title, latin1(&block[3..33]));
    tags.set_text(TagKey::Artist, latin1(&block[33..63]));
    tags.set_text(TagKey::Album, latin1(&block[63..93]));

    // ID3v1.1 keeps the track number in the last comment byte
    if block[125] == 0 && block[126] != 0 {
        tags.set_track(block[126] as u32);
    }

    Ok(Some(tags))
}
