//! Natural dimensions of media, read from the file header without decoding
//! pixel data or fetching the whole file.

use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use crate::asset::{Dimensions, MediaKind};
use crate::error::Error;

/// Most bytes buffered while looking for an image size.
pub const IMAGE_HEADER_LIMIT: usize = 2 << 20;
/// Most bytes buffered while looking for a video size. Skipped boxes such as
/// `mdat` are not buffered and do not count.
pub const VIDEO_HEADER_LIMIT: usize = 8 << 20;

const READ_CHUNK: usize = 64 * 1024;

/// Incremental header reader. Feed it the start of a file chunk by chunk
/// until it reports a size.
#[derive(Debug)]
pub struct HeaderScan {
    kind: MediaKind,
    locator: String,
    buf: Vec<u8>,
    /// Bytes of the current top-level mp4 box still to be skipped.
    skip: u64,
}

impl HeaderScan {
    pub fn new(kind: MediaKind, locator: &str) -> Self {
        Self {
            kind,
            locator: locator.to_owned(),
            buf: Vec::new(),
            skip: 0,
        }
    }

    /// Bytes held so far.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Hands the pending skip to a caller that can seek past it instead of
    /// feeding those bytes.
    pub fn take_skip(&mut self) -> u64 {
        std::mem::take(&mut self.skip)
    }

    /// Feeds the next chunk. `Ok(None)` means more input is needed.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Option<Dimensions>, Error> {
        let skipped = usize::try_from(self.skip).map_or(chunk.len(), |s| s.min(chunk.len()));
        self.skip -= skipped as u64;
        self.buf.extend_from_slice(&chunk[skipped..]);

        let found = match self.kind {
            MediaKind::Photos => Ok(image_dimensions(&self.buf)),
            MediaKind::Videos => self.scan_mp4(),
        }
        .map_err(|reason| Error::not_found(&self.locator, reason))?;

        let limit = match self.kind {
            MediaKind::Photos => IMAGE_HEADER_LIMIT,
            MediaKind::Videos => VIDEO_HEADER_LIMIT,
        };
        if found.is_none() && self.buf.len() > limit {
            return Err(Error::not_found(
                &self.locator,
                format!("no size within the first {limit} header bytes"),
            ));
        }
        Ok(found)
    }

    /// The input ended before a size was found.
    pub fn end_of_input(&self) -> Error {
        let reason = match self.kind {
            MediaKind::Photos => "truncated or unrecognized image header",
            MediaKind::Videos => "no video track with dimensions in mp4 header",
        };
        Error::not_found(&self.locator, reason)
    }

    // Drops complete top-level boxes other than `moov` and arranges to skip
    // the rest of a partial one.
    fn scan_mp4(&mut self) -> Result<Option<Dimensions>, &'static str> {
        loop {
            let Some((kind, header, total)) = box_header(&self.buf) else {
                return Ok(None);
            };
            let Some(total) = total else {
                // Box runs to the end of the file.
                if &kind != b"moov" {
                    return Err("file ends before a moov box");
                }
                return Ok(moov_dimensions(&self.buf[header..]));
            };
            if total < header as u64 {
                return Err("malformed mp4 box size");
            }
            let have = self.buf.len() as u64;
            if &kind == b"moov" {
                if have < total {
                    return Ok(None);
                }
                let end = usize::try_from(total).map_err(|_| "mp4 box too large")?;
                return moov_dimensions(&self.buf[header..end])
                    .map(Some)
                    .ok_or("no video track with dimensions in mp4 header");
            }
            if have < total {
                self.skip = total - have;
                self.buf.clear();
                return Ok(None);
            }
            let end = usize::try_from(total).map_err(|_| "mp4 box too large")?;
            self.buf.drain(..end);
        }
    }
}

/// Dimensions of a fully fetched `bytes` interpreted as `kind`.
pub fn from_bytes(kind: MediaKind, locator: &str, bytes: &[u8]) -> Result<Dimensions, Error> {
    let mut scan = HeaderScan::new(kind, locator);
    scan.push(bytes)?.ok_or_else(|| scan.end_of_input())
}

/// Reads the header of `path` in chunks, seeking over mp4 boxes that carry
/// no size. Blocking; run off the async thread.
pub fn from_file(kind: MediaKind, path: &Path) -> Result<Dimensions, Error> {
    let locator = path.display().to_string();
    let mut file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::not_found(&locator, e)
        } else {
            Error::Io(e)
        }
    })?;
    let mut scan = HeaderScan::new(kind, &locator);
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let skip = scan.take_skip();
        if skip > 0 {
            let offset = i64::try_from(skip)
                .map_err(|_| Error::not_found(&locator, "mp4 box too large"))?;
            file.seek(SeekFrom::Current(offset))?;
        }
        let read = file.read(&mut chunk)?;
        if read == 0 {
            return Err(scan.end_of_input());
        }
        if let Some(dims) = scan.push(&chunk[..read])? {
            return Ok(dims);
        }
    }
}

fn image_dimensions(bytes: &[u8]) -> Option<Dimensions> {
    let (width, height) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()?;
    let raw = Dimensions::new(width, height);
    // Orientations 5..=8 rotate by a quarter turn; browsers report the rotated size.
    match exif_orientation(bytes) {
        Some(5..=8) => Some(raw.swapped()),
        _ => Some(raw),
    }
}

fn exif_orientation(bytes: &[u8]) -> Option<u32> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;
    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?
        .value
        .get_uint(0)
}

/// Walks `moov/trak/tkhd` boxes and returns the first non-empty track size.
pub fn mp4_dimensions(bytes: &[u8]) -> Option<Dimensions> {
    let moov = boxes(bytes).find(|(kind, _)| kind == b"moov")?.1;
    moov_dimensions(moov)
}

fn moov_dimensions(moov: &[u8]) -> Option<Dimensions> {
    boxes(moov)
        .filter(|(kind, _)| kind == b"trak")
        .filter_map(|(_, trak)| boxes(trak).find(|(kind, _)| kind == b"tkhd"))
        .find_map(|(_, tkhd)| track_header_dimensions(tkhd))
}

// tkhd payload: version(1) flags(3), then the version-dependent time fields,
// reserved(8) layer(2) alternate_group(2) volume(2) reserved(2), matrix(36),
// width(4, 16.16) height(4, 16.16).
fn track_header_dimensions(tkhd: &[u8]) -> Option<Dimensions> {
    let version = *tkhd.first()?;
    let times = if version == 1 { 32 } else { 20 };
    let matrix_at = 4 + times + 16;
    let size_at = matrix_at + 36;
    let width = read_u32(tkhd, size_at)? >> 16;
    let height = read_u32(tkhd, size_at + 4)? >> 16;
    if width == 0 || height == 0 {
        return None;
    }
    let dims = Dimensions::new(width, height);
    // A zero `a` coefficient in the display matrix means a quarter-turn rotation.
    let a = read_u32(tkhd, matrix_at)?;
    Some(if a == 0 { dims.swapped() } else { dims })
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let raw: [u8; 4] = bytes.get(at..at.checked_add(4)?)?.try_into().ok()?;
    Some(u32::from_be_bytes(raw))
}

fn read_u64(bytes: &[u8], at: usize) -> Option<u64> {
    let raw: [u8; 8] = bytes.get(at..at.checked_add(8)?)?.try_into().ok()?;
    Some(u64::from_be_bytes(raw))
}

/// `(fourcc, header length, total size)` of the box starting at `bytes[0]`.
/// The size is `None` for a box that runs to the end of the file.
fn box_header(bytes: &[u8]) -> Option<([u8; 4], usize, Option<u64>)> {
    let size = read_u32(bytes, 0)?;
    let kind: [u8; 4] = bytes.get(4..8)?.try_into().ok()?;
    Some(match size {
        0 => (kind, 8, None),
        1 => (kind, 16, Some(read_u64(bytes, 8)?)),
        n => (kind, 8, Some(u64::from(n))),
    })
}

/// Iterator over `(fourcc, payload)` of the ISO-BMFF boxes in `bytes`.
fn boxes(bytes: &[u8]) -> impl Iterator<Item = ([u8; 4], &[u8])> {
    let mut offset = 0usize;
    std::iter::from_fn(move || {
        let rest = bytes.get(offset..)?;
        let (kind, header, total) = box_header(rest)?;
        let total = total.unwrap_or(rest.len() as u64);
        if total < header as u64 {
            return None;
        }
        let len = usize::try_from(total).ok()?;
        let payload = rest.get(header..len)?;
        offset += len;
        Some((kind, payload))
    })
}
