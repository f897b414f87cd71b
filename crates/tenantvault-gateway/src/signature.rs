//! Content signature validation.
//!
//! The declared content type of an upload is never trusted: binary types must
//! start with one of their registered magic numbers, text types must decode
//! without null bytes. Unknown types are rejected.

use std::collections::HashMap;
use std::io::{self, Read, Seek, SeekFrom};

/// Longest prefix any signature inspects.
pub const PROBE_LEN: usize = 16;

/// A byte sequence expected at a fixed offset.
#[derive(Debug, Clone, Copy)]
struct Marker {
    offset: usize,
    bytes: &'static [u8],
}

const fn at(offset: usize, bytes: &'static [u8]) -> Marker {
    Marker { offset, bytes }
}

/// One accepted signature. Every marker must match.
type Signature = &'static [Marker];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextKind {
    Plain,
    Svg,
}

#[derive(Debug, Clone, Copy)]
enum ContentRule {
    Binary(&'static [Signature]),
    Text(TextKind),
}

const PNG: &[Signature] = &[&[at(0, &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A])]];
const JPEG: &[Signature] = &[&[at(0, &[0xFF, 0xD8, 0xFF])]];
const GIF: &[Signature] = &[&[at(0, b"GIF87a")], &[at(0, b"GIF89a")]];
// RIFF is a generic container; the form type at offset 8 names the format.
const WEBP: &[Signature] = &[&[at(0, b"RIFF"), at(8, b"WEBP")]];
const WAV: &[Signature] = &[&[at(0, b"RIFF"), at(8, b"WAVE")]];
const BMP: &[Signature] = &[&[at(0, b"BM")]];
const TIFF: &[Signature] = &[
    &[at(0, &[0x49, 0x49, 0x2A, 0x00])],
    &[at(0, &[0x4D, 0x4D, 0x00, 0x2A])],
];
const ICO: &[Signature] = &[&[at(0, &[0x00, 0x00, 0x01, 0x00])]];
const AVIF: &[Signature] = &[&[at(4, b"ftypavif")], &[at(4, b"ftypavis")]];
const PDF: &[Signature] = &[&[at(0, b"%PDF-")]];
const ZIP: &[Signature] = &[
    &[at(0, &[0x50, 0x4B, 0x03, 0x04])],
    &[at(0, &[0x50, 0x4B, 0x05, 0x06])],
    &[at(0, &[0x50, 0x4B, 0x07, 0x08])],
];
const OOXML: &[Signature] = &[&[at(0, &[0x50, 0x4B, 0x03, 0x04])]];
const OLE: &[Signature] = &[&[at(0, &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1])]];
const GZIP: &[Signature] = &[&[at(0, &[0x1F, 0x8B])]];
const MP4: &[Signature] = &[&[at(4, b"ftyp")]];
const QUICKTIME: &[Signature] = &[
    &[at(4, b"ftyp")],
    &[at(4, b"moov")],
    &[at(4, b"mdat")],
    &[at(4, b"wide")],
];
const MP3: &[Signature] = &[
    &[at(0, b"ID3")],
    &[at(0, &[0xFF, 0xFB])],
    &[at(0, &[0xFF, 0xF3])],
    &[at(0, &[0xFF, 0xF2])],
];
const OGG: &[Signature] = &[&[at(0, b"OggS")]];
const FLAC: &[Signature] = &[&[at(0, b"fLaC")]];

const RULES: &[(&str, ContentRule)] = &[
    ("image/png", ContentRule::Binary(PNG)),
    ("image/jpeg", ContentRule::Binary(JPEG)),
    ("image/jpg", ContentRule::Binary(JPEG)),
    ("image/gif", ContentRule::Binary(GIF)),
    ("image/webp", ContentRule::Binary(WEBP)),
    ("image/bmp", ContentRule::Binary(BMP)),
    ("image/tiff", ContentRule::Binary(TIFF)),
    ("image/x-icon", ContentRule::Binary(ICO)),
    ("image/vnd.microsoft.icon", ContentRule::Binary(ICO)),
    ("image/avif", ContentRule::Binary(AVIF)),
    ("application/pdf", ContentRule::Binary(PDF)),
    ("application/zip", ContentRule::Binary(ZIP)),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ContentRule::Binary(OOXML),
    ),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ContentRule::Binary(OOXML),
    ),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        ContentRule::Binary(OOXML),
    ),
    ("application/msword", ContentRule::Binary(OLE)),
    ("application/vnd.ms-excel", ContentRule::Binary(OLE)),
    ("application/vnd.ms-powerpoint", ContentRule::Binary(OLE)),
    ("application/gzip", ContentRule::Binary(GZIP)),
    ("application/x-gzip", ContentRule::Binary(GZIP)),
    ("video/mp4", ContentRule::Binary(MP4)),
    ("video/quicktime", ContentRule::Binary(QUICKTIME)),
    ("audio/mpeg", ContentRule::Binary(MP3)),
    ("audio/wav", ContentRule::Binary(WAV)),
    ("audio/wave", ContentRule::Binary(WAV)),
    ("audio/x-wav", ContentRule::Binary(WAV)),
    ("audio/ogg", ContentRule::Binary(OGG)),
    ("application/ogg", ContentRule::Binary(OGG)),
    ("audio/flac", ContentRule::Binary(FLAC)),
    ("image/svg+xml", ContentRule::Text(TextKind::Svg)),
    ("text/plain", ContentRule::Text(TextKind::Plain)),
    ("text/csv", ContentRule::Text(TextKind::Plain)),
    ("text/markdown", ContentRule::Text(TextKind::Plain)),
    ("application/json", ContentRule::Text(TextKind::Plain)),
    ("application/xml", ContentRule::Text(TextKind::Plain)),
    ("text/xml", ContentRule::Text(TextKind::Plain)),
];

const SVG_OPENINGS: [&[u8]; 3] = [b"<?xml", b"<svg", b"<!doctype"];

/// Lower-case a content type and drop parameters such as `; charset=utf-8`.
pub fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Seeks the reader back to where inspection started when dropped, so an
/// early return or a panic still leaves the caller's position untouched.
struct Rewind<'a, R: Read + Seek> {
    reader: &'a mut R,
    origin: u64,
    restored: bool,
}

impl<'a, R: Read + Seek> Rewind<'a, R> {
    fn new(reader: &'a mut R) -> io::Result<Self> {
        let origin = reader.stream_position()?;
        Ok(Self {
            reader,
            origin,
            restored: false,
        })
    }

    fn read_probe(&mut self) -> io::Result<Vec<u8>> {
        let mut probe = Vec::with_capacity(PROBE_LEN);
        self.reader
            .by_ref()
            .take(PROBE_LEN as u64)
            .read_to_end(&mut probe)?;
        Ok(probe)
    }

    fn read_all(&mut self) -> io::Result<Vec<u8>> {
        let mut content = Vec::new();
        self.reader.read_to_end(&mut content)?;
        Ok(content)
    }

    fn restore(mut self) -> io::Result<()> {
        self.restored = true;
        self.reader.seek(SeekFrom::Start(self.origin)).map(|_| ())
    }
}

impl<R: Read + Seek> Drop for Rewind<'_, R> {
    fn drop(&mut self) {
        if !self.restored {
            if let Err(error) = self.reader.seek(SeekFrom::Start(self.origin)) {
                tracing::warn!(error = %error, "Failed to rewind stream after inspection");
            }
        }
    }
}

/// Validates declared content types against payload signatures.
///
/// The rule table is built once and never mutated; supporting a new type
/// means adding an entry to it.
#[derive(Debug, Clone)]
pub struct SignatureValidator {
    rules: HashMap<&'static str, ContentRule>,
}

impl Default for SignatureValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureValidator {
    pub fn new() -> Self {
        Self {
            rules: RULES.iter().copied().collect(),
        }
    }

    /// Whether a declared content type has a rule at all.
    pub fn supports(&self, content_type: &str) -> bool {
        self.rules
            .contains_key(normalize_content_type(content_type).as_str())
    }

    /// Check that the stream's content matches `declared_content_type`.
    ///
    /// Never fails: unknown types, mismatches and read errors all yield
    /// `false`. The reader's position is restored on every path.
    pub fn validate<R: Read + Seek>(&self, reader: &mut R, declared_content_type: &str) -> bool {
        let content_type = normalize_content_type(declared_content_type);
        let Some(rule) = self.rules.get(content_type.as_str()).copied() else {
            tracing::debug!(content_type = %content_type, "No signature rule for content type");
            return false;
        };

        let Ok(mut guard) = Rewind::new(reader) else {
            return false;
        };

        let verdict = match rule {
            ContentRule::Binary(signatures) => guard
                .read_probe()
                .map(|probe| matches_any(signatures, &probe)),
            ContentRule::Text(kind) => guard.read_all().map(|content| accepts_text(kind, &content)),
        };

        let restored = guard.restore().is_ok();
        verdict.unwrap_or(false) && restored
    }
}

fn matches_any(signatures: &[Signature], probe: &[u8]) -> bool {
    signatures.iter().any(|signature| {
        signature.iter().all(|marker| {
            probe
                .get(marker.offset..marker.offset + marker.bytes.len())
                .is_some_and(|window| window == marker.bytes)
        })
    })
}

fn accepts_text(kind: TextKind, content: &[u8]) -> bool {
    if content.is_empty() {
        return false;
    }

    // Invalid UTF-8 or a null byte is the tell of a binary payload dressed
    // up as text.
    let Ok(text) = std::str::from_utf8(content) else {
        return false;
    };
    if text.contains('\0') {
        return false;
    }

    match kind {
        TextKind::Plain => true,
        TextKind::Svg => {
            let body = text.trim_start_matches('\u{feff}').trim_start();
            let head = &body.as_bytes()[..body.len().min(9)];
            let lower = head.to_ascii_lowercase();
            SVG_OPENINGS.iter().any(|opening| lower.starts_with(opening))
        }
    }
}
