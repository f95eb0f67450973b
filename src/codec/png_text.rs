//! PNG encoding with textual metadata chunks

use image::DynamicImage;
use png::{BitDepth, ColorType, Encoder};

use crate::error::{AppError, Result};

fn encode_failed(e: impl std::fmt::Display) -> AppError {
    AppError::InvalidResource {
        detail: "Failed to encode image".to_string(),
        cause: e.to_string(),
    }
}

fn be_bytes(samples: &[u16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_be_bytes()).collect()
}

fn is_latin1(s: &str) -> bool {
    s.chars().all(|c| (c as u32) < 256)
}

/// Encode `image` as PNG, one text chunk per metadata pair (tEXt when the
/// pair is Latin-1, iTXt otherwise)
pub fn encode_png(image: &DynamicImage, text: &[(String, String)]) -> Result<Vec<u8>> {
    let (color, depth, data) = match image {
        DynamicImage::ImageLuma8(img) => (ColorType::Grayscale, BitDepth::Eight, img.as_raw().clone()),
        DynamicImage::ImageLumaA8(img) => (ColorType::GrayscaleAlpha, BitDepth::Eight, img.as_raw().clone()),
        DynamicImage::ImageRgb8(img) => (ColorType::Rgb, BitDepth::Eight, img.as_raw().clone()),
        DynamicImage::ImageRgba8(img) => (ColorType::Rgba, BitDepth::Eight, img.as_raw().clone()),
        DynamicImage::ImageLuma16(img) => (ColorType::Grayscale, BitDepth::Sixteen, be_bytes(img.as_raw())),
        DynamicImage::ImageLumaA16(img) => (ColorType::GrayscaleAlpha, BitDepth::Sixteen, be_bytes(img.as_raw())),
        DynamicImage::ImageRgb16(img) => (ColorType::Rgb, BitDepth::Sixteen, be_bytes(img.as_raw())),
        DynamicImage::ImageRgba16(img) => (ColorType::Rgba, BitDepth::Sixteen, be_bytes(img.as_raw())),
        other => (ColorType::Rgba, BitDepth::Eight, other.to_rgba8().into_raw()),
    };

    let mut out = Vec::new();
    {
        let mut encoder = Encoder::new(&mut out, image.width(), image.height());
        encoder.set_color(color);
        encoder.set_depth(depth);
        for (key, value) in text {
            if is_latin1(key) && is_latin1(value) {
                encoder.add_text_chunk(key.clone(), value.clone()).map_err(encode_failed)?;
            } else {
                encoder.add_itxt_chunk(key.clone(), value.clone()).map_err(encode_failed)?;
            }
        }
        let mut writer = encoder.write_header().map_err(encode_failed)?;
        writer.write_image_data(&data).map_err(encode_failed)?;
        writer.finish().map_err(encode_failed)?;
    }
    Ok(out)
}

/// Text chunks found before the image data, in file order per chunk type
pub fn read_png_text(bytes: &[u8]) -> Vec<(String, String)> {
    let mut decoder = png::Decoder::new(bytes);
    decoder.set_ignore_text_chunk(false);
    let reader = match decoder.read_info() {
        Ok(reader) => reader,
        Err(_) => return Vec::new(),
    };
    let info = reader.info();

    let mut text = Vec::new();
    for chunk in &info.uncompressed_latin1_text {
        text.push((chunk.keyword.clone(), chunk.text.clone()));
    }
    for chunk in &info.compressed_latin1_text {
        if let Ok(value) = chunk.get_text() {
            text.push((chunk.keyword.clone(), value));
        }
    }
    for chunk in &info.utf8_text {
        if let Ok(value) = chunk.get_text() {
            text.push((chunk.keyword.clone(), value));
        }
    }
    text
}
