//! # Media Probes
//!
//! Header sniffing behind `read_file_info` for the audio, video and image
//! kinds. Only container headers are read; nothing is decoded.
//!
//! - image: PNG, GIF, BMP, JPEG dimensions via the `image` crate
//! - audio: RIFF/WAVE duration
//! - video: ISO-BMFF (MP4/MOV) duration and track dimensions

use std::io::Cursor;

use image::ImageReader;

use super::facade::InfoKind;

/// Media-specific part of a `FileInfo`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MediaInfo {
    pub duration_secs: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Probe `bytes` as `kind`. `None` when the format is not recognized.
pub fn probe_media(kind: InfoKind, bytes: &[u8]) -> Option<MediaInfo> {
    match kind {
        InfoKind::File => None,
        InfoKind::Image => image_dimensions(bytes).map(|(width, height)| MediaInfo {
            duration_secs: None,
            width: Some(width),
            height: Some(height),
        }),
        InfoKind::Audio => wav_duration(bytes).map(|duration| MediaInfo {
            duration_secs: Some(duration),
            ..Default::default()
        }),
        InfoKind::Video => mp4_info(bytes),
    }
}

fn field<const N: usize>(b: &[u8], at: usize) -> Option<[u8; N]> {
    b.get(at..at.checked_add(N)?)?.try_into().ok()
}

fn be_u32(b: &[u8], at: usize) -> Option<u32> {
    field(b, at).map(u32::from_be_bytes)
}

fn be_u64(b: &[u8], at: usize) -> Option<u64> {
    field(b, at).map(u64::from_be_bytes)
}

fn le_u32(b: &[u8], at: usize) -> Option<u32> {
    field(b, at).map(u32::from_le_bytes)
}

// =============================================================================
// Images
// =============================================================================

/// Width and height of any image format the `image` crate can sniff.
/// Only the header is read.
pub fn image_dimensions(b: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(b))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

// =============================================================================
// Audio
// =============================================================================

/// Duration in seconds of a RIFF/WAVE file
pub fn wav_duration(b: &[u8]) -> Option<f64> {
    if b.get(0..4)? != b"RIFF" || b.get(8..12)? != b"WAVE" {
        return None;
    }

    let mut byte_rate = None;
    let mut data_len = None;
    let mut i = 12;

    while let Some(id) = field::<4>(b, i) {
        let size = usize::try_from(le_u32(b, i + 4)?).ok()?;
        let body = i + 8;

        if &id == b"fmt " {
            byte_rate = Some(le_u32(b, body + 8)?);
        } else if &id == b"data" {
            data_len = Some(size as u64);
        }

        if byte_rate.is_some() && data_len.is_some() {
            break;
        }

        // Chunks are word aligned
        i = match body.checked_add(size).and_then(|end| end.checked_add(size & 1)) {
            Some(next) => next,
            None => break,
        };
    }

    match (byte_rate, data_len) {
        (Some(rate), Some(len)) if rate > 0 => Some(len as f64 / rate as f64),
        _ => None,
    }
}

// =============================================================================
// Video
// =============================================================================

/// Iterator over ISO-BMFF boxes in a byte range
struct Boxes<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Boxes<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl<'a> Iterator for Boxes<'a> {
    type Item = ([u8; 4], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.pos;
        let kind: [u8; 4] = field(self.data, start.checked_add(4)?)?;

        // 0 runs to the end of the range, 1 means a 64-bit size follows
        let (header, size) = match be_u32(self.data, start)? {
            0 => (8, self.data.len().checked_sub(start)?),
            1 => (16, usize::try_from(be_u64(self.data, start + 8)?).ok()?),
            n => (8, usize::try_from(n).ok()?),
        };

        let end = start.checked_add(size)?;
        if size < header || end > self.data.len() {
            return None;
        }

        self.pos = end;
        Some((kind, &self.data[start + header..end]))
    }
}

fn find_box<'a>(data: &'a [u8], kind: &[u8; 4]) -> Option<&'a [u8]> {
    Boxes::new(data).find(|(k, _)| k == kind).map(|(_, body)| body)
}

/// Duration and dimensions of an MP4/MOV file
pub fn mp4_info(b: &[u8]) -> Option<MediaInfo> {
    let moov = find_box(b, b"moov")?;
    let mvhd = find_box(moov, b"mvhd")?;

    let (timescale, duration) = match mvhd.first()? {
        0 => (be_u32(mvhd, 12)?, be_u32(mvhd, 16)? as u64),
        1 => (be_u32(mvhd, 20)?, be_u64(mvhd, 24)?),
        _ => return None,
    };

    let mut info = MediaInfo {
        duration_secs: (timescale > 0).then(|| duration as f64 / timescale as f64),
        ..Default::default()
    };

    // First track with a visual size wins
    for (kind, trak) in Boxes::new(moov) {
        if &kind != b"trak" {
            continue;
        }
        let Some(tkhd) = find_box(trak, b"tkhd") else {
            continue;
        };
        let offset = match tkhd.first() {
            Some(0) => 76,
            Some(1) => 88,
            _ => continue,
        };
        // 16.16 fixed point
        let width = be_u32(tkhd, offset).map(|w| w >> 16).unwrap_or(0);
        let height = be_u32(tkhd, offset + 4).map(|h| h >> 16).unwrap_or(0);
        if width > 0 && height > 0 {
            info.width = Some(width);
            info.height = Some(height);
            break;
        }
    }

    Some(info)
}
