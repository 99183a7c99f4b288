//! Container-level scan for embedded metadata blocks.
//!
//! Walks JPEG segments, PNG chunks and WebP RIFF chunks without decoding
//! pixels. Other containers (GIF, BMP, TIFF) are not inspected and report
//! no blocks. A truncated container stops the walk; whatever was found up
//! to that point is returned.

use std::fmt;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const EXIF_HEADER: &[u8] = b"Exif\0\0";
const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
const XMP_EXTENSION_HEADER: &[u8] = b"http://ns.adobe.com/xmp/extension/\0";
const PHOTOSHOP_HEADER: &[u8] = b"Photoshop 3.0\0";
const ICC_HEADER: &[u8] = b"ICC_PROFILE\0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKind {
    Exif,
    Xmp,
    Iptc,
    IccProfile,
    Comment,
    Text,
}

impl MetadataKind {
    /// Whether the block describes the image or its origin, as opposed to
    /// data needed to render its colors correctly.
    pub fn is_descriptive(self) -> bool {
        !matches!(self, MetadataKind::IccProfile)
    }
}

impl fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetadataKind::Exif => "EXIF",
            MetadataKind::Xmp => "XMP",
            MetadataKind::Iptc => "IPTC",
            MetadataKind::IccProfile => "ICC profile",
            MetadataKind::Comment => "comment",
            MetadataKind::Text => "text",
        };
        f.write_str(name)
    }
}

/// Kinds of the metadata blocks in an encoded image, in container order.
pub fn metadata_blocks(data: &[u8]) -> Vec<MetadataKind> {
    if data.starts_with(&[0xFF, 0xD8]) {
        jpeg_blocks(data)
    } else if data.starts_with(&PNG_SIGNATURE) {
        png_blocks(data)
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        webp_blocks(data)
    } else {
        Vec::new()
    }
}

fn jpeg_blocks(data: &[u8]) -> Vec<MetadataKind> {
    let mut blocks = Vec::new();
    let mut pos = 2;

    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            break;
        }
        // Fill bytes may precede a marker.
        let mut marker_pos = pos + 1;
        while marker_pos < data.len() && data[marker_pos] == 0xFF {
            marker_pos += 1;
        }
        let Some(&marker) = data.get(marker_pos) else {
            break;
        };

        match marker {
            // Start of scan / end of image: no more header segments.
            0xDA | 0xD9 => break,
            0x01 | 0xD0..=0xD7 => {
                pos = marker_pos + 1;
                continue;
            }
            _ => {}
        }

        let Some(len) = read_u16_be(data, marker_pos + 1) else {
            break;
        };
        let len = len as usize;
        if len < 2 {
            break;
        }
        let body_start = marker_pos + 3;
        let body_end = marker_pos + 1 + len;
        if body_end > data.len() {
            break;
        }
        let body = &data[body_start..body_end];

        let kind = match marker {
            0xE1 if body.starts_with(EXIF_HEADER) => Some(MetadataKind::Exif),
            0xE1 if body.starts_with(XMP_HEADER) || body.starts_with(XMP_EXTENSION_HEADER) => {
                Some(MetadataKind::Xmp)
            }
            0xE2 if body.starts_with(ICC_HEADER) => Some(MetadataKind::IccProfile),
            0xED if body.starts_with(PHOTOSHOP_HEADER) => Some(MetadataKind::Iptc),
            0xFE => Some(MetadataKind::Comment),
            _ => None,
        };
        if let Some(kind) = kind {
            blocks.push(kind);
        }

        pos = body_end;
    }

    blocks
}

fn png_blocks(data: &[u8]) -> Vec<MetadataKind> {
    let mut blocks = Vec::new();
    let mut pos = PNG_SIGNATURE.len();

    while let Some(len) = read_u32_be(data, pos) {
        let len = len as usize;
        let Some(chunk_type) = data.get(pos + 4..pos + 8) else {
            break;
        };
        let body_start = pos + 8;
        let Some(body_end) = body_start.checked_add(len) else {
            break;
        };
        if body_end + 4 > data.len() {
            break;
        }
        let body = &data[body_start..body_end];

        let kind = match chunk_type {
            b"eXIf" => Some(MetadataKind::Exif),
            b"iCCP" => Some(MetadataKind::IccProfile),
            b"tEXt" | b"zTXt" | b"iTXt" => Some(png_text_kind(body)),
            _ => None,
        };
        if let Some(kind) = kind {
            blocks.push(kind);
        }

        if chunk_type == b"IEND" {
            break;
        }
        pos = body_end + 4;
    }

    blocks
}

/// Text chunks double as carriers for XMP and raw EXIF/IPTC profiles.
fn png_text_kind(body: &[u8]) -> MetadataKind {
    let keyword_end = body.iter().position(|&b| b == 0).unwrap_or(body.len());
    let keyword = String::from_utf8_lossy(&body[..keyword_end]).to_ascii_lowercase();
    match keyword.as_str() {
        "xml:com.adobe.xmp" => MetadataKind::Xmp,
        "raw profile type exif" | "raw profile type app1" => MetadataKind::Exif,
        "raw profile type iptc" | "raw profile type 8bim" => MetadataKind::Iptc,
        "comment" => MetadataKind::Comment,
        _ => MetadataKind::Text,
    }
}

fn webp_blocks(data: &[u8]) -> Vec<MetadataKind> {
    let mut blocks = Vec::new();
    let mut pos = 12;

    while pos + 8 <= data.len() {
        let fourcc = &data[pos..pos + 4];
        let Some(len) = read_u32_le(data, pos + 4) else {
            break;
        };
        let len = len as usize;

        let kind = match fourcc {
            b"EXIF" => Some(MetadataKind::Exif),
            b"XMP " => Some(MetadataKind::Xmp),
            b"ICCP" => Some(MetadataKind::IccProfile),
            _ => None,
        };
        if let Some(kind) = kind {
            blocks.push(kind);
        }

        // Chunk payloads are padded to an even length.
        let Some(next) = (pos + 8).checked_add(len + (len & 1)) else {
            break;
        };
        pos = next;
    }

    blocks
}

fn read_u16_be(data: &[u8], pos: usize) -> Option<u16> {
    let bytes = data.get(pos..pos + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn read_u32_be(data: &[u8], pos: usize) -> Option<u32> {
    let bytes = data.get(pos..pos + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_u32_le(data: &[u8], pos: usize) -> Option<u32> {
    let bytes = data.get(pos..pos + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
