#![allow(dead_code)]

use bytes::Bytes;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use media_sanitizer::{
    config::{API_KEY_VAR, ENDPOINT_VAR, EVENT_DATA_VAR, PROJECT_ID_VAR, TRIGGER_VAR},
    models::{file::ObjectMetadata, invocation::FunctionRequest, reference::ObjectReference},
    store::memory::MemoryStore,
};
use serde_json::Value;
use std::io::Cursor;

/// Big-endian TIFF block with a single `Make` entry.
pub const TIFF_MAKE: &[u8] = b"MM\0*\0\0\0\x08\0\x01\x01\x0F\0\x02\0\0\0\x04ACM\0\0\0\0\0";

pub fn encoded(format: ImageFormat, width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x * 11) as u8, (y * 13) as u8, 90u8])
    });
    let mut data = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut data), format)
        .unwrap();
    data
}

/// JPEG carrying an APP1 EXIF segment right after SOI.
pub fn jpeg_with_exif() -> Vec<u8> {
    let jpeg = encoded(ImageFormat::Jpeg, 16, 12);
    let mut body = b"Exif\0\0".to_vec();
    body.extend_from_slice(TIFF_MAKE);

    let mut out = jpeg[..2].to_vec();
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&((body.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(&body);
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// PNG carrying `eXIf` and `tEXt` chunks after IHDR.
pub fn png_with_metadata() -> Vec<u8> {
    let png = encoded(ImageFormat::Png, 10, 6);
    // Signature (8) plus the IHDR chunk (4 + 4 + 13 + 4).
    let split = 33;
    let mut out = png[..split].to_vec();
    out.extend(png_chunk(b"eXIf", TIFF_MAKE));
    out.extend(png_chunk(b"tEXt", b"Author\0Someone"));
    out.extend_from_slice(&png[split..]);
    out
}

fn png_chunk(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = (body.len() as u32).to_be_bytes().to_vec();
    out.extend_from_slice(kind);
    out.extend_from_slice(body);
    let mut crc_input = kind.to_vec();
    crc_input.extend_from_slice(body);
    out.extend_from_slice(&crc32(&crc_input).to_be_bytes());
    out
}

fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}

/// Whether an independent EXIF reader finds anything in `data`.
pub fn has_exif(data: &[u8]) -> bool {
    exif::Reader::new()
        .read_from_container(&mut Cursor::new(data))
        .is_ok()
}

pub fn metadata(mime_type: &str, name: &str) -> ObjectMetadata {
    ObjectMetadata {
        mime_type: mime_type.to_string(),
        name: name.to_string(),
        read_permissions: vec!["role:all".to_string()],
        write_permissions: vec!["user:owner".to_string()],
    }
}

pub fn seed(store: &MemoryStore, bucket: &str, file: &str, mime_type: &str, content: Vec<u8>) {
    store.insert(
        ObjectReference::new(bucket, file),
        metadata(mime_type, &format!("{}.upload", file)),
        Bytes::from(content),
    );
}

pub fn credentials() -> Vec<(String, String)> {
    [
        (ENDPOINT_VAR, "http://localhost/v1"),
        (PROJECT_ID_VAR, "project"),
        (API_KEY_VAR, "key"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub fn direct_request(payload: Value) -> FunctionRequest {
    FunctionRequest {
        variables: credentials().into_iter().collect(),
        payload: Some(payload),
    }
}

pub fn event_request(event_data: &str) -> FunctionRequest {
    let mut variables: std::collections::HashMap<String, String> =
        credentials().into_iter().collect();
    variables.insert(TRIGGER_VAR.to_string(), "event".to_string());
    variables.insert(EVENT_DATA_VAR.to_string(), event_data.to_string());
    FunctionRequest {
        variables,
        payload: None,
    }
}
