//! Image preparation before OCR.
//!
//! Phone photos carry an EXIF orientation; rendered PDF pages do not. Both
//! end up as a grayscale PNG no larger than `MAX_OCR_DIMENSION`.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageOutputFormat};
use tracing::debug;

use super::AcquisitionError;

/// Maximum input image size (in bytes) before rejecting.
const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024; // 50 MB

/// Minimum valid image size in bytes (smallest valid PNG is ~67 bytes).
const MIN_IMAGE_BYTES: usize = 67;

/// Longest edge handed to the OCR engine.
pub const MAX_OCR_DIMENSION: u32 = 4096;

/// Decode, orient, grayscale and re-encode an image for OCR.
///
/// `apply_exif` should be false for images rendered from PDF pages.
pub fn prepare_for_ocr(image_bytes: &[u8], apply_exif: bool) -> Result<Vec<u8>, AcquisitionError> {
    validate_image_bytes(image_bytes)?;

    let img = image::load_from_memory(image_bytes)
        .map_err(|e| AcquisitionError::ImageProcessing(format!("Decode failed: {e}")))?;

    let img = if apply_exif {
        apply_orientation(img, read_exif_orientation(image_bytes))
    } else {
        img
    };

    let gray = downscale_if_needed(img.to_luma8(), MAX_OCR_DIMENSION);
    encode_png(gray)
}

/// Rejects clearly invalid input before decoding.
pub fn validate_image_bytes(bytes: &[u8]) -> Result<(), AcquisitionError> {
    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(AcquisitionError::ImageProcessing(
            "Image data too small to be valid".into(),
        ));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(AcquisitionError::ImageProcessing(format!(
            "Image data exceeds {}MB limit",
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Read EXIF orientation tag from raw image bytes.
/// Returns 1 (normal) if no EXIF data or tag not present.
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let reader = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(r) => r,
        Err(_) => return 1,
    };

    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

/// EXIF orientation values:
/// 1 = Normal, 2 = Mirrored, 3 = 180deg, 4 = Flipped V,
/// 5 = Mirrored + 90deg CW, 6 = 90deg CW, 7 = Mirrored + 270deg CW, 8 = 270deg CW
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

fn downscale_if_needed(img: GrayImage, max_dim: u32) -> GrayImage {
    let (w, h) = img.dimensions();
    let largest = w.max(h);
    if largest <= max_dim {
        return img;
    }

    let scale = max_dim as f32 / largest as f32;
    let new_w = ((w as f32 * scale).round() as u32).max(1);
    let new_h = ((h as f32 * scale).round() as u32).max(1);

    debug!(
        from = format!("{w}x{h}"),
        to = format!("{new_w}x{new_h}"),
        "Downscaling oversized image before OCR"
    );

    image::imageops::resize(&img, new_w, new_h, FilterType::Triangle)
}

fn encode_png(img: GrayImage) -> Result<Vec<u8>, AcquisitionError> {
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(img)
        .write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| AcquisitionError::ImageProcessing(format!("PNG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};

    fn make_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([120u8, 200, 40]));
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .unwrap();
        cursor.into_inner()
    }

    #[test]
    fn prepared_image_is_grayscale_png() {
        let png = make_png(40, 20);
        let out = prepare_for_ocr(&png, true).unwrap();
        assert_eq!(&out[..4], &[0x89, 0x50, 0x4E, 0x47]);
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.dimensions(), (40, 20));
        assert!(matches!(decoded, DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn tiny_input_is_rejected() {
        let err = prepare_for_ocr(&[0x89, 0x50, 0x4E, 0x47], false).unwrap_err();
        assert!(matches!(err, AcquisitionError::ImageProcessing(_)));
    }

    #[test]
    fn undecodable_input_is_rejected() {
        let garbage = vec![0x42u8; 512];
        assert!(prepare_for_ocr(&garbage, false).is_err());
    }

    #[test]
    fn exif_no_data_returns_identity() {
        assert_eq!(read_exif_orientation(&make_png(4, 4)), 1);
    }

    #[test]
    fn orientation_six_swaps_dimensions() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(30, 10));
        let rotated = apply_orientation(img, 6);
        assert_eq!(rotated.dimensions(), (10, 30));
    }

    #[test]
    fn unknown_orientation_is_noop() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(30, 10));
        assert_eq!(apply_orientation(img, 42).dimensions(), (30, 10));
    }

    #[test]
    fn oversized_image_is_downscaled_preserving_ratio() {
        let img = GrayImage::new(200, 100);
        let out = downscale_if_needed(img, 50);
        assert_eq!(out.dimensions(), (50, 25));
    }
}
