//! Metadata stripping by decode and re-encode.
//!
//! The container format is guessed from the bytes, the pixels are decoded
//! and written back out with the same format's encoder, which carries over
//! nothing but pixel data and, for JPEG, PNG and WebP, the embedded color
//! profile. The profile is rendering data rather than metadata: dropping it
//! would make wide-gamut images display with shifted colors. EXIF
//! orientation is dropped rather than applied; viewers that relied on the
//! tag may show the image with a different default rotation.
//!
//! Animated GIF, APNG and animated WebP are refused because re-encoding
//! would keep only the first frame.

use crate::services::inspect::{self, MetadataKind};
use bytes::Bytes;
use image::{
    AnimationDecoder, DynamicImage, ImageDecoder, ImageEncoder, ImageError, ImageFormat,
    ImageReader, ImageResult,
    codecs::{
        gif::GifDecoder,
        jpeg::JpegEncoder,
        png::{PngDecoder, PngEncoder},
        webp::{WebPDecoder, WebPEncoder},
    },
};
use std::io::{self, Cursor};
use thiserror::Error;
use tracing::debug;

/// JPEG has no lossless re-encode; use the highest quality setting.
const JPEG_QUALITY: u8 = 100;

#[derive(Debug, Error)]
pub enum StripError {
    #[error("image format could not be determined")]
    UnknownFormat,
    #[error("{0:?} images are not supported")]
    UnsupportedFormat(ImageFormat),
    #[error("animated {0:?} images are not supported")]
    Animated(ImageFormat),
    #[error("failed to decode image: {0}")]
    Decode(#[source] ImageError),
    #[error("failed to encode {format:?} image: {source}")]
    Encode {
        format: ImageFormat,
        #[source]
        source: ImageError,
    },
    #[error("stripped image still carries metadata: {0:?}")]
    MetadataRemains(Vec<MetadataKind>),
    #[error("stripping task failed: {0}")]
    Task(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A metadata-free re-encoding of an image.
#[derive(Debug, Clone)]
pub struct StrippedImage {
    pub bytes: Bytes,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    /// Descriptive metadata blocks found in the input.
    pub removed: Vec<MetadataKind>,
    /// Whether the input's color profile was written into the output.
    pub kept_color_profile: bool,
}

/// Strip metadata off the blocking thread pool.
pub async fn strip_metadata(data: Bytes) -> Result<StrippedImage, StripError> {
    tokio::task::spawn_blocking(move || strip(&data))
        .await
        .map_err(|e| StripError::Task(e.to_string()))?
}

/// Re-encode `data` in its own format without descriptive metadata.
pub fn strip(data: &[u8]) -> Result<StrippedImage, StripError> {
    let removed = descriptive(inspect::metadata_blocks(data));

    let reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;
    let format = reader.format().ok_or(StripError::UnknownFormat)?;
    ensure_still(data, format)?;

    let mut decoder = reader.into_decoder().map_err(StripError::Decode)?;
    let icc_profile = decoder.icc_profile().map_err(StripError::Decode)?;
    let img = DynamicImage::from_decoder(decoder).map_err(StripError::Decode)?;
    let (encoded, kept_color_profile) = encode(&img, format, icc_profile)?;

    let leftover = descriptive(inspect::metadata_blocks(&encoded));
    if !leftover.is_empty() {
        return Err(StripError::MetadataRemains(leftover));
    }

    debug!(
        "re-encoded {:?} {}x{}: {} -> {} bytes, removed {:?}, color profile kept: {}",
        format,
        img.width(),
        img.height(),
        data.len(),
        encoded.len(),
        removed,
        kept_color_profile
    );

    Ok(StrippedImage {
        bytes: Bytes::from(encoded),
        format,
        width: img.width(),
        height: img.height(),
        removed,
        kept_color_profile,
    })
}

fn descriptive(kinds: Vec<MetadataKind>) -> Vec<MetadataKind> {
    kinds.into_iter().filter(|k| k.is_descriptive()).collect()
}

/// Encode `img` as `format`, embedding `icc_profile` where the format allows it.
fn encode(
    img: &DynamicImage,
    format: ImageFormat,
    icc_profile: Option<Vec<u8>>,
) -> Result<(Vec<u8>, bool), StripError> {
    let mut output = Vec::new();
    let encode_err = |source| StripError::Encode { format, source };

    let kept = match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut output, JPEG_QUALITY);
            write_with_profile(encoder, img, icc_profile).map_err(encode_err)?
        }
        ImageFormat::Png => {
            write_with_profile(PngEncoder::new(&mut output), img, icc_profile)
                .map_err(encode_err)?
        }
        ImageFormat::WebP => {
            write_with_profile(WebPEncoder::new_lossless(&mut output), img, icc_profile)
                .map_err(encode_err)?
        }
        // These encoders have no metadata or profile options.
        ImageFormat::Gif | ImageFormat::Bmp | ImageFormat::Tiff => {
            img.write_to(&mut Cursor::new(&mut output), format)
                .map_err(encode_err)?;
            false
        }
        other => return Err(StripError::UnsupportedFormat(other)),
    };

    Ok((output, kept))
}

fn write_with_profile<E: ImageEncoder>(
    mut encoder: E,
    img: &DynamicImage,
    icc_profile: Option<Vec<u8>>,
) -> ImageResult<bool> {
    let kept = match icc_profile {
        Some(profile) => {
            encoder
                .set_icc_profile(profile)
                .map_err(ImageError::Unsupported)?;
            true
        }
        None => false,
    };
    encoder.write_image(img.as_bytes(), img.width(), img.height(), img.color().into())?;
    Ok(kept)
}

/// Refuse multi-frame images.
fn ensure_still(data: &[u8], format: ImageFormat) -> Result<(), StripError> {
    let animated = match format {
        ImageFormat::Gif => {
            let decoder = GifDecoder::new(Cursor::new(data)).map_err(StripError::Decode)?;
            decoder.into_frames().take(2).count() > 1
        }
        ImageFormat::Png => {
            let decoder = PngDecoder::new(Cursor::new(data)).map_err(StripError::Decode)?;
            decoder.is_apng().map_err(StripError::Decode)?
        }
        ImageFormat::WebP => {
            let decoder = WebPDecoder::new(Cursor::new(data)).map_err(StripError::Decode)?;
            decoder.has_animation()
        }
        _ => false,
    };

    if animated {
        Err(StripError::Animated(format))
    } else {
        Ok(())
    }
}

/// MIME type family of a detected format, for logging.
pub fn format_mime(format: ImageFormat) -> &'static str {
    format.to_mime_type()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{
        Frame, ImageBuffer, Rgb, Rgba, RgbaImage,
        codecs::{gif::GifEncoder, jpeg::JpegDecoder},
    };

    /// Stand-in for a wide-gamut profile; the codecs carry it as opaque bytes.
    fn color_profile() -> Vec<u8> {
        (0..=255u8).cycle().take(300).collect()
    }

    fn rgb(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x * 20) as u8, (y * 20) as u8, 128u8])
        }))
    }

    fn riff_chunk(out: &mut Vec<u8>, fourcc: &[u8; 4], payload: &[u8]) {
        out.extend_from_slice(fourcc);
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            out.push(0);
        }
    }

    fn encoded(format: ImageFormat, width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x * 20) as u8, (y * 20) as u8, 128u8])
        });
        let mut data = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut data), format)
            .unwrap();
        data
    }

    fn with_jpeg_segment(jpeg: &[u8], marker: u8, body: &[u8]) -> Vec<u8> {
        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&[0xFF, marker]);
        out.extend_from_slice(&((body.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    #[test]
    fn strips_jpeg_app_segments_and_keeps_dimensions() {
        let jpeg = encoded(ImageFormat::Jpeg, 12, 7);
        let tagged = with_jpeg_segment(&jpeg, 0xE1, b"Exif\0\0MM\0*\0\0\0\x08\0\0\0\0\0\0");
        let tagged = with_jpeg_segment(&tagged, 0xFE, b"shot on a phone");

        let stripped = strip(&tagged).unwrap();

        assert_eq!(stripped.format, ImageFormat::Jpeg);
        assert_eq!((stripped.width, stripped.height), (12, 7));
        assert_eq!(
            stripped.removed,
            vec![MetadataKind::Comment, MetadataKind::Exif]
        );
        assert!(inspect::metadata_blocks(&stripped.bytes).is_empty());
        assert_eq!(
            image::guess_format(&stripped.bytes).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn keeps_format_family_for_lossless_formats() {
        for format in [
            ImageFormat::Png,
            ImageFormat::Bmp,
            ImageFormat::Tiff,
            ImageFormat::Gif,
        ] {
            let data = encoded(format, 9, 4);
            let stripped = strip(&data).unwrap();
            assert_eq!(stripped.format, format);
            assert_eq!(image::guess_format(&stripped.bytes).unwrap(), format);
            assert_eq!((stripped.width, stripped.height), (9, 4));
        }
    }

    #[test]
    fn png_pixels_survive_unchanged() {
        let img = ImageBuffer::from_fn(5, 5, |x, y| Rgba([x as u8 * 40, y as u8 * 40, 7, 200]));
        let mut data = Vec::new();
        DynamicImage::ImageRgba8(img.clone())
            .write_to(&mut Cursor::new(&mut data), ImageFormat::Png)
            .unwrap();

        let stripped = strip(&data).unwrap();
        let decoded = image::load_from_memory(&stripped.bytes).unwrap().to_rgba8();
        assert_eq!(decoded, img);
    }

    #[test]
    fn stripping_twice_keeps_metadata_absent() {
        let jpeg = encoded(ImageFormat::Jpeg, 8, 8);
        let tagged = with_jpeg_segment(&jpeg, 0xE1, b"http://ns.adobe.com/xap/1.0/\0<x/>");

        let once = strip(&tagged).unwrap();
        let twice = strip(&once.bytes).unwrap();

        assert!(twice.removed.is_empty());
        assert!(inspect::metadata_blocks(&twice.bytes).is_empty());
        assert_eq!((twice.width, twice.height), (once.width, once.height));
    }

    #[test]
    fn rejects_garbage_and_truncated_input() {
        assert!(matches!(
            strip(b"definitely not an image"),
            Err(StripError::UnknownFormat)
        ));

        let jpeg = encoded(ImageFormat::Jpeg, 16, 16);
        // SOI plus the JFIF header, no frame.
        let truncated = &jpeg[..20];
        assert!(matches!(strip(truncated), Err(StripError::Decode(_))));
    }

    #[test]
    fn jpeg_color_profile_survives_while_exif_goes() {
        let img = rgb(10, 10);
        let mut jpeg = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, 90);
        encoder.set_icc_profile(color_profile()).unwrap();
        encoder
            .write_image(img.as_bytes(), 10, 10, img.color().into())
            .unwrap();
        let tagged = with_jpeg_segment(&jpeg, 0xE1, b"Exif\0\0MM\0*\0\0\0\x08\0\0\0\0\0\0");
        assert_eq!(
            inspect::metadata_blocks(&tagged),
            vec![MetadataKind::Exif, MetadataKind::IccProfile]
        );

        let stripped = strip(&tagged).unwrap();

        assert_eq!(stripped.removed, vec![MetadataKind::Exif]);
        assert!(stripped.kept_color_profile);
        assert_eq!(
            inspect::metadata_blocks(&stripped.bytes),
            vec![MetadataKind::IccProfile]
        );
        let mut decoder = JpegDecoder::new(Cursor::new(&stripped.bytes[..])).unwrap();
        assert_eq!(decoder.icc_profile().unwrap(), Some(color_profile()));
    }

    #[test]
    fn png_color_profile_survives() {
        let img = rgb(6, 3);
        let mut png = Vec::new();
        let mut encoder = PngEncoder::new(&mut png);
        encoder.set_icc_profile(color_profile()).unwrap();
        encoder
            .write_image(img.as_bytes(), 6, 3, img.color().into())
            .unwrap();

        let stripped = strip(&png).unwrap();

        assert!(stripped.kept_color_profile);
        assert!(stripped.removed.is_empty());
        let mut decoder = PngDecoder::new(Cursor::new(&stripped.bytes[..])).unwrap();
        assert_eq!(decoder.icc_profile().unwrap(), Some(color_profile()));
        let decoded = image::load_from_memory(&stripped.bytes).unwrap().to_rgb8();
        assert_eq!(decoded, img.to_rgb8());
    }

    #[test]
    fn webp_exif_chunk_is_removed() {
        let (width, height) = (7u32, 5u32);
        let simple = encoded(ImageFormat::WebP, width, height);

        // Extended layout: VP8X header flagging EXIF, the image chunk, then EXIF.
        let mut vp8x = vec![0x08, 0, 0, 0];
        vp8x.extend_from_slice(&(width - 1).to_le_bytes()[..3]);
        vp8x.extend_from_slice(&(height - 1).to_le_bytes()[..3]);
        let mut body = b"WEBP".to_vec();
        riff_chunk(&mut body, b"VP8X", &vp8x);
        body.extend_from_slice(&simple[12..]);
        riff_chunk(&mut body, b"EXIF", b"MM\0*\0\0\0\x08\0\0\0\0\0\0");
        let mut webp = b"RIFF".to_vec();
        webp.extend_from_slice(&(body.len() as u32).to_le_bytes());
        webp.extend(body);
        assert_eq!(inspect::metadata_blocks(&webp), vec![MetadataKind::Exif]);

        let stripped = strip(&webp).unwrap();

        assert_eq!(stripped.format, ImageFormat::WebP);
        assert_eq!(stripped.removed, vec![MetadataKind::Exif]);
        assert_eq!(
            image::guess_format(&stripped.bytes).unwrap(),
            ImageFormat::WebP
        );
        assert!(inspect::metadata_blocks(&stripped.bytes).is_empty());
        let decoded = image::load_from_memory(&stripped.bytes).unwrap().to_rgb8();
        assert_eq!(decoded, rgb(width, height).to_rgb8());
    }

    #[test]
    fn animated_gif_is_refused() {
        let mut gif = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut gif);
            let frames = (0..2u8)
                .map(|i| Frame::new(RgbaImage::from_pixel(4, 4, Rgba([i * 200, 0, 0, 255]))));
            encoder.encode_frames(frames).unwrap();
        }

        assert!(matches!(
            strip(&gif),
            Err(StripError::Animated(ImageFormat::Gif))
        ));
    }

    #[tokio::test]
    async fn async_wrapper_runs_on_blocking_pool() {
        let data = Bytes::from(encoded(ImageFormat::Png, 3, 3));
        let stripped = strip_metadata(data).await.unwrap();
        assert_eq!(stripped.format, ImageFormat::Png);
        assert_eq!(format_mime(stripped.format), "image/png");
    }
}
