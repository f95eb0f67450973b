//! EXIF user-comment metadata for JPEG and WEBP containers
//!
//! The TIFF block is written and parsed by `kamadak-exif`, and the containers
//! are handled by `img-parts`. Only the UserComment payload is encoded here:
//! the `UNICODE\0` character-code prefix followed by UTF-16 text in the byte
//! order of the TIFF block.

use bytes::Bytes;
use ::exif::{experimental::Writer, Field, In, Reader, Tag, Value};
use img_parts::{jpeg::Jpeg, webp::WebP, ImageEXIF};
use std::io::Cursor;

use crate::error::{AppError, Result};

const UNICODE_PREFIX: &[u8; 8] = b"UNICODE\0";
const EXIF_HEADER: &[u8] = b"Exif\0\0";

// APP1 segment length is a u16 covering itself and the Exif header
const MAX_JPEG_EXIF: usize = u16::MAX as usize - 2 - EXIF_HEADER.len();

fn container_failed(e: impl std::fmt::Display) -> AppError {
    AppError::Internal(format!("Failed to write image metadata: {}", e))
}

/// Build a big-endian TIFF block carrying `comment` as the EXIF user comment
pub fn user_comment_tiff(comment: &str) -> Result<Vec<u8>> {
    let mut payload = UNICODE_PREFIX.to_vec();
    for unit in comment.encode_utf16() {
        payload.extend_from_slice(&unit.to_be_bytes());
    }

    let field = Field {
        tag: Tag::UserComment,
        ifd_num: In::PRIMARY,
        value: Value::Undefined(payload, 0),
    };
    let mut writer = Writer::new();
    writer.push_field(&field);

    let mut out = Cursor::new(Vec::new());
    writer.write(&mut out, false).map_err(container_failed)?;
    Ok(out.into_inner())
}

/// Read the user comment back out of a TIFF block
pub fn read_user_comment(tiff: &[u8]) -> Option<String> {
    let exif = Reader::new().read_raw(tiff.to_vec()).ok()?;
    let field = exif.get_field(Tag::UserComment, In::PRIMARY)?;
    match &field.value {
        Value::Undefined(raw, _) => Some(decode_user_comment(raw, exif.little_endian())),
        _ => None,
    }
}

fn decode_user_comment(raw: &[u8], little_endian: bool) -> String {
    let (prefix, payload) = if raw.len() >= 8 {
        raw.split_at(8)
    } else {
        (&raw[..0], raw)
    };

    if prefix == UNICODE_PREFIX {
        let units: Vec<u16> = payload
            .chunks_exact(2)
            .map(|pair| {
                if little_endian {
                    u16::from_le_bytes([pair[0], pair[1]])
                } else {
                    u16::from_be_bytes([pair[0], pair[1]])
                }
            })
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        // ASCII, JIS and undefined character codes all read as bytes
        String::from_utf8_lossy(payload).trim_end_matches('\0').to_string()
    }
}

/// Attach `tiff` to a JPEG stream as its APP1 Exif segment
pub fn insert_jpeg_exif(jpeg: Vec<u8>, tiff: Vec<u8>) -> Result<Vec<u8>> {
    if tiff.len() > MAX_JPEG_EXIF {
        return Err(AppError::InvalidResource {
            detail: "Metadata too large for JPEG".to_string(),
            cause: format!("EXIF block of {} bytes exceeds {}", tiff.len(), MAX_JPEG_EXIF),
        });
    }

    let mut image = Jpeg::from_bytes(Bytes::from(jpeg)).map_err(container_failed)?;
    image.set_exif(Some(Bytes::from(tiff)));

    let mut out = Vec::new();
    image.encoder().write_to(&mut out).map_err(container_failed)?;
    Ok(out)
}

/// TIFF block of the JPEG's Exif segment, if any
pub fn jpeg_exif(jpeg: &[u8]) -> Option<Vec<u8>> {
    let image = Jpeg::from_bytes(Bytes::copy_from_slice(jpeg)).ok()?;
    image.exif().map(|tiff| tiff.to_vec())
}

/// Attach `tiff` as the EXIF chunk of a WEBP file (extended layout)
pub fn insert_webp_exif(webp: Vec<u8>, tiff: Vec<u8>) -> Result<Vec<u8>> {
    let mut image = WebP::from_bytes(Bytes::from(webp)).map_err(container_failed)?;
    image.set_exif(Some(Bytes::from(tiff)));

    let mut out = Vec::new();
    image.encoder().write_to(&mut out).map_err(container_failed)?;
    Ok(out)
}

/// TIFF block of the EXIF chunk of a WEBP file, if any
pub fn webp_exif(webp: &[u8]) -> Option<Vec<u8>> {
    let image = WebP::from_bytes(Bytes::copy_from_slice(webp)).ok()?;
    let data = image.exif()?;
    // some writers keep the JPEG style header inside the chunk
    Some(data.strip_prefix(EXIF_HEADER).unwrap_or(&data).to_vec())
}
