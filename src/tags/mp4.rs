//! iTunes-style metadata from MP4 containers (`.m4a`, `.m4v`, `.m4p`).
//!
//! Only the `moov` box is loaded; media data is skipped with seeks. Tags live at
//! `moov/udta/meta/ilst`, one child atom per field, each wrapping a `data` atom.

use super::{DecodeError, SeekRead, TagDecoder, TagKey, TagSet};
use std::io::{Read, SeekFrom};
use tracing::trace;

const FORMAT: &str = "MP4";
const MAX_DEPTH: usize = 8;

const ITEM_ARTIST: [u8; 4] = *b"\xA9ART";
const ITEM_ALBUM: [u8; 4] = *b"\xA9alb";
const ITEM_TITLE: [u8; 4] = *b"\xA9nam";
const ITEM_TRACK: [u8; 4] = *b"trkn";

const DATA_UTF8: u32 = 1;
const DATA_UTF16: u32 = 2;

#[derive(Debug, Default, Clone, Copy)]
pub struct Mp4Decoder;

impl Mp4Decoder {
    pub fn new() -> Self {
        Self
    }
}

impl TagDecoder for Mp4Decoder {
    fn name(&self) -> &'static str {
        "mp4"
    }

    fn decode_from(&self, reader: &mut dyn SeekRead) -> Result<TagSet, DecodeError> {
        let mut tags = TagSet::new();

        match walk_file(reader, &mut tags) {
            Err(err) if tags.is_empty() => Err(err),
            _ => tags.into_result(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct BoxHeader {
    kind: [u8; 4],
    size: u64,
    header_len: u64,
}

fn fourcc(kind: &[u8]) -> String {
    kind.iter()
        .map(|&b| if b.is_ascii_graphic() { b as char } else { '?' })
        .collect()
}

fn check_size(kind: [u8; 4], size: u64, header_len: u64, available: u64) -> Result<(), DecodeError> {
    if size < header_len || size > available {
        return Err(DecodeError::malformed(
            FORMAT,
            format!("box '{}' has invalid size {}", fourcc(&kind), size),
        ));
    }
    Ok(())
}

fn read_header(reader: &mut dyn SeekRead, available: u64) -> Result<BoxHeader, DecodeError> {
    if available < 8 {
        return Err(DecodeError::malformed(FORMAT, "truncated box header"));
    }

    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    let kind = [buf[4], buf[5], buf[6], buf[7]];

    let (size, header_len) = match u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) {
        0 => (available, 8),
        1 => {
            if available < 16 {
                return Err(DecodeError::malformed(FORMAT, "truncated large box header"));
            }
            let mut large = [0u8; 8];
            reader.read_exact(&mut large)?;
            (u64::from_be_bytes(large), 16)
        }
        n => (n as u64, 8),
    };

    check_size(kind, size, header_len, available)?;
    Ok(BoxHeader {
        kind,
        size,
        header_len,
    })
}

/// Walks top-level boxes, loading and parsing every `moov` box.
fn walk_file(reader: &mut dyn SeekRead, tags: &mut TagSet) -> Result<(), DecodeError> {
    let file_len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;

    let mut pos = 0u64;
    while pos < file_len {
        let header = read_header(reader, file_len - pos)?;
        trace!(kind = %fourcc(&header.kind), size = header.size, offset = pos, "top-level box");

        if &header.kind == b"moov" {
            let payload_len = header.size - header.header_len;
            let mut moov = Vec::with_capacity(payload_len.min(1 << 24) as usize);
            (&mut *reader).take(payload_len).read_to_end(&mut moov)?;
            if (moov.len() as u64) < payload_len {
                return Err(DecodeError::malformed(FORMAT, "moov box is truncated"));
            }
            walk(&moov, 1, tags)?;
        }

        pos += header.size;
        reader.seek(SeekFrom::Start(pos))?;
    }

    Ok(())
}

struct Atom<'a> {
    kind: [u8; 4],
    payload: &'a [u8],
}

/// Iterates the child atoms packed into an in-memory container payload.
struct Atoms<'a> {
    data: &'a [u8],
}

impl<'a> Atoms<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn split(data: &'a [u8]) -> Result<(Atom<'a>, &'a [u8]), DecodeError> {
        if data.len() < 8 {
            return Err(DecodeError::malformed(FORMAT, "truncated atom header"));
        }

        let kind = [data[4], data[5], data[6], data[7]];
        let available = data.len() as u64;
        let (size, header_len) = match u32::from_be_bytes([data[0], data[1], data[2], data[3]]) {
            0 => (available, 8),
            1 => {
                if data.len() < 16 {
                    return Err(DecodeError::malformed(FORMAT, "truncated large atom header"));
                }
                let mut large = [0u8; 8];
                large.copy_from_slice(&data[8..16]);
                (u64::from_be_bytes(large), 16)
            }
            n => (n as u64, 8),
        };
        check_size(kind, size, header_len, available)?;

        let (atom, rest) = data.split_at(size as usize);
        Ok((
            Atom {
                kind,
                payload: &atom[header_len as usize..],
            },
            rest,
        ))
    }
}

impl<'a> Iterator for Atoms<'a> {
    type Item = Result<Atom<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        // QuickTime writers sometimes close a container with a zero terminator
        if self.data.len() < 8 && self.data.iter().all(|&b| b == 0) {
            return None;
        }

        match Self::split(self.data) {
            Ok((atom, rest)) => {
                self.data = rest;
                Some(Ok(atom))
            }
            Err(err) => {
                self.data = &[];
                Some(Err(err))
            }
        }
    }
}

fn walk(data: &[u8], depth: usize, tags: &mut TagSet) -> Result<(), DecodeError> {
    if depth > MAX_DEPTH {
        return Err(DecodeError::malformed(FORMAT, "atoms nested too deeply"));
    }

    for atom in Atoms::new(data) {
        let atom = atom?;
        match &atom.kind {
            b"udta" => walk(atom.payload, depth + 1, tags)?,
            b"meta" => walk(meta_children(atom.payload)?, depth + 1, tags)?,
            b"ilst" => read_items(atom.payload, tags)?,
            _ => {}
        }
    }

    Ok(())
}

/// `meta` is a full box in MP4 files but a plain container in QuickTime files.
fn meta_children(payload: &[u8]) -> Result<&[u8], DecodeError> {
    if payload.len() >= 8 && &payload[4..8] == b"hdlr" {
        return Ok(payload);
    }
    payload
        .get(4..)
        .ok_or_else(|| DecodeError::malformed(FORMAT, "meta box is truncated"))
}

fn item_key(kind: &[u8; 4]) -> Option<TagKey> {
    match *kind {
        ITEM_ARTIST => Some(TagKey::Artist),
        ITEM_ALBUM => Some(TagKey::Album),
        ITEM_TITLE => Some(TagKey::Title),
        ITEM_TRACK => Some(TagKey::Track),
        _ => None,
    }
}

fn read_items(ilst: &[u8], tags: &mut TagSet) -> Result<(), DecodeError> {
    for item in Atoms::new(ilst) {
        let item = item?;
        let Some(key) = item_key(&item.kind) else {
            continue;
        };

        for child in Atoms::new(item.payload) {
            let child = child?;
            if &child.kind == b"data" {
                apply_data(key, child.payload, tags);
                break;
            }
        }
    }

    Ok(())
}

fn apply_data(key: TagKey, payload: &[u8], tags: &mut TagSet) {
    if payload.len() < 8 {
        return;
    }

    let type_code = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) & 0x00FF_FFFF;
    let value = &payload[8..];

    match key {
        TagKey::Track => {
            // reserved u16, track u16, total u16, reserved u16
            if value.len() >= 4 {
                tags.set_track(u16::from_be_bytes([value[2], value[3]]) as u32);
            }
        }
        _ => {
            let text = match type_code {
                DATA_UTF8 => String::from_utf8_lossy(value).into_owned(),
                DATA_UTF16 => {
                    let units: Vec<u16> = value
                        .chunks_exact(2)
                        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                        .collect();
                    String::from_utf16_lossy(&units)
                }
                _ => return,
            };
            tags.set_text(key, text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn atom(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(payload);
        out
    }

    fn data_atom(type_code: u32, value: &[u8]) -> Vec<u8> {
        let mut payload = type_code.to_be_bytes().to_vec();
        payload.extend_from_slice(&[0, 0, 0, 0]);
        payload.extend_from_slice(value);
        atom(b"data", &payload)
    }

    fn text_item(kind: &[u8; 4], text: &str) -> Vec<u8> {
        atom(kind, &data_atom(DATA_UTF8, text.as_bytes()))
    }

    fn track_item(track: u16, total: u16) -> Vec<u8> {
        let mut value = vec![0, 0];
        value.extend_from_slice(&track.to_be_bytes());
        value.extend_from_slice(&total.to_be_bytes());
        value.extend_from_slice(&[0, 0]);
        atom(&ITEM_TRACK, &data_atom(0, &value))
    }

    fn hdlr() -> Vec<u8> {
        let mut payload = vec![0u8; 8];
        payload.extend_from_slice(b"mdir");
        payload.extend_from_slice(b"appl");
        payload.extend_from_slice(&[0u8; 9]);
        atom(b"hdlr", &payload)
    }

    fn moov_with_items(items: &[Vec<u8>]) -> Vec<u8> {
        let ilst = atom(b"ilst", &items.concat());
        let mut meta_payload = vec![0, 0, 0, 0];
        meta_payload.extend_from_slice(&hdlr());
        meta_payload.extend_from_slice(&ilst);
        let meta = atom(b"meta", &meta_payload);
        let udta = atom(b"udta", &meta);

        let mut moov_payload = atom(b"mvhd", &[0u8; 100]);
        moov_payload.extend_from_slice(&atom(b"trak", &[0u8; 64]));
        moov_payload.extend_from_slice(&udta);
        atom(b"moov", &moov_payload)
    }

    fn file(parts: &[Vec<u8>]) -> Vec<u8> {
        let mut ftyp = b"M4A ".to_vec();
        ftyp.extend_from_slice(&[0, 0, 0, 0]);
        ftyp.extend_from_slice(b"M4A mp42isom");
        let mut out = atom(b"ftyp", &ftyp);
        for part in parts {
            out.extend_from_slice(part);
        }
        out
    }

    fn decode(bytes: Vec<u8>) -> Result<TagSet, DecodeError> {
        Mp4Decoder::new().decode_from(&mut Cursor::new(bytes))
    }

    #[test]
    fn test_reads_all_four_items() {
        let moov = moov_with_items(&[
            text_item(&ITEM_ARTIST, "Stereolab"),
            text_item(&ITEM_ALBUM, "Dots and Loops"),
            track_item(2, 10),
            text_item(&ITEM_TITLE, "Miss Modular"),
            text_item(b"\xA9day", "1997"),
        ]);
        let bytes = file(&[moov, atom(b"mdat", &[0xAB; 2048])]);

        let tags = decode(bytes).unwrap();
        assert_eq!(tags.artist.as_deref(), Some("Stereolab"));
        assert_eq!(tags.album.as_deref(), Some("Dots and Loops"));
        assert_eq!(tags.track, Some(2));
        assert_eq!(tags.title.as_deref(), Some("Miss Modular"));
    }

    #[test]
    fn test_moov_after_mdat_with_large_size() {
        let mdat_payload = vec![0u8; 512];
        let mut mdat = 1u32.to_be_bytes().to_vec();
        mdat.extend_from_slice(b"mdat");
        mdat.extend_from_slice(&((mdat_payload.len() + 16) as u64).to_be_bytes());
        mdat.extend_from_slice(&mdat_payload);

        let moov = moov_with_items(&[text_item(&ITEM_TITLE, "Late Moov")]);
        let tags = decode(file(&[mdat, moov])).unwrap();
        assert_eq!(tags.title.as_deref(), Some("Late Moov"));
    }

    #[test]
    fn test_quicktime_meta_without_version() {
        let ilst = atom(b"ilst", &text_item(&ITEM_ALBUM, "Kid A"));
        let mut meta_payload = hdlr();
        meta_payload.extend_from_slice(&ilst);
        let udta = atom(b"udta", &atom(b"meta", &meta_payload));
        let moov = atom(b"moov", &udta);

        let tags = decode(file(&[moov])).unwrap();
        assert_eq!(tags.album.as_deref(), Some("Kid A"));
    }

    #[test]
    fn test_utf16_text_item() {
        let value: Vec<u8> = "Múm"
            .encode_utf16()
            .flat_map(|unit| unit.to_be_bytes())
            .collect();
        let item = atom(&ITEM_ARTIST, &data_atom(DATA_UTF16, &value));

        let tags = decode(file(&[moov_with_items(&[item])])).unwrap();
        assert_eq!(tags.artist.as_deref(), Some("Múm"));
    }

    #[test]
    fn test_zero_track_is_absent() {
        let moov = moov_with_items(&[track_item(0, 0), text_item(&ITEM_TITLE, "Untracked")]);
        let tags = decode(file(&[moov])).unwrap();
        assert_eq!(tags.track, None);
        assert_eq!(tags.title.as_deref(), Some("Untracked"));
    }

    #[test]
    fn test_file_without_ilst_is_untagged() {
        let moov = atom(b"moov", &atom(b"mvhd", &[0u8; 100]));
        let err = decode(file(&[moov, atom(b"mdat", &[1u8; 64])])).unwrap_err();
        assert!(err.is_untagged());
    }

    #[test]
    fn test_invalid_box_size_is_malformed() {
        let mut bytes = file(&[]);
        bytes.extend_from_slice(&[0, 0, 0, 4]);
        bytes.extend_from_slice(b"junk");

        let err = decode(bytes).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { .. }));
    }

    #[test]
    fn test_truncated_moov_is_malformed() {
        let mut moov = moov_with_items(&[text_item(&ITEM_TITLE, "Gone")]);
        moov[3] = moov[3].wrapping_add(40);

        let err = decode(file(&[moov])).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { .. }));
    }

    #[test]
    fn test_trailing_box_extending_to_eof() {
        let moov = moov_with_items(&[text_item(&ITEM_ARTIST, "Broadcast")]);
        let mut mdat = vec![0, 0, 0, 0];
        mdat.extend_from_slice(b"mdat");
        mdat.extend_from_slice(&[7u8; 300]);

        let tags = decode(file(&[moov, mdat])).unwrap();
        assert_eq!(tags.artist.as_deref(), Some("Broadcast"));
    }

    #[test]
    fn test_zero_terminated_container() {
        let ilst = atom(b"ilst", &text_item(&ITEM_TITLE, "Terminated"));
        let mut meta_payload = vec![0, 0, 0, 0];
        meta_payload.extend_from_slice(&ilst);
        let mut udta_payload = atom(b"meta", &meta_payload);
        udta_payload.extend_from_slice(&[0, 0, 0, 0]);
        let moov = atom(b"moov", &atom(b"udta", &udta_payload));

        let tags = decode(file(&[moov])).unwrap();
        assert_eq!(tags.title.as_deref(), Some("Terminated"));
    }
}
