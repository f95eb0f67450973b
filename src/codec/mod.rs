//! Image codec - decode base64 / data URI / remote URL images and re-encode
//! them with their generation metadata

pub mod base64;
pub mod exif;
pub mod png_text;

use image::{
    codecs::jpeg::JpegEncoder,
    DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat,
};

use crate::config::OptionsStore;
use crate::error::{AppError, Result};
use crate::gateway::{FetchPolicy, ResourceFetcher};

pub const PARAMETERS_KEY: &str = "parameters";

/// A decoded bitmap plus its textual metadata; request scoped
#[derive(Debug, Clone)]
pub struct ImageResource {
    pub image: DynamicImage,
    pub metadata: Vec<(String, String)>,
}

impl ImageResource {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image,
            metadata: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    /// The generation parameters text, if present
    pub fn parameters(&self) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k == PARAMETERS_KEY)
            .map(|(_, v)| v.as_str())
    }
}

/// Output container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg,
    Webp,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            other => Err(AppError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Output format and quality taken from the settings store
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub format: String,
    pub quality: u8,
}

impl EncodeOptions {
    pub fn from_options(options: &OptionsStore) -> Self {
        let quality = options
            .get("jpeg_quality")
            .and_then(|v| v.as_u64())
            .unwrap_or(80)
            .clamp(1, 100) as u8;
        Self {
            format: options.get_str("samples_format"),
            quality,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImageCodec {
    fetcher: ResourceFetcher,
}

impl ImageCodec {
    pub fn new(fetcher: ResourceFetcher) -> Self {
        Self { fetcher }
    }

    pub fn is_remote(encoding: &str) -> bool {
        encoding.starts_with("http://") || encoding.starts_with("https://")
    }

    /// Decode an image from an http(s) URL, a data URI or raw base64
    pub async fn decode(&self, encoding: &str, policy: &FetchPolicy) -> Result<ImageResource> {
        if Self::is_remote(encoding) {
            let bytes = self.fetcher.fetch(encoding, policy).await?;
            return read_image(&bytes).map_err(|e| AppError::InvalidResource {
                detail: "Invalid image url".to_string(),
                cause: e.to_string(),
            });
        }

        let bytes = base64::decode(encoding)?;
        read_image(&bytes).map_err(|e| AppError::InvalidResource {
            detail: "Invalid encoded image".to_string(),
            cause: e.to_string(),
        })
    }

    /// Encode to base64 in `format`; PNG keeps every metadata pair as text
    /// chunks, JPEG/WEBP flatten to RGB and carry `parameters` as EXIF
    pub fn encode(resource: &ImageResource, format: &str, quality: u8) -> Result<String> {
        let bytes = match OutputFormat::parse(format)? {
            OutputFormat::Png => png_text::encode_png(&resource.image, &resource.metadata)?,
            OutputFormat::Jpeg => {
                let rgb = resource.image.to_rgb8();
                let mut buf = Vec::new();
                JpegEncoder::new_with_quality(&mut buf, quality)
                    .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
                    .map_err(encode_failed)?;
                let tiff = exif::user_comment_tiff(resource.parameters().unwrap_or(""))?;
                exif::insert_jpeg_exif(buf, tiff)?
            }
            OutputFormat::Webp => {
                let rgb = resource.image.to_rgb8();
                let buf = webp::Encoder::from_rgb(rgb.as_raw(), rgb.width(), rgb.height())
                    .encode(quality as f32)
                    .to_vec();
                let tiff = exif::user_comment_tiff(resource.parameters().unwrap_or(""))?;
                exif::insert_webp_exif(buf, tiff)?
            }
        };
        Ok(base64::encode(&bytes))
    }
}

fn encode_failed(e: image::ImageError) -> AppError {
    AppError::InvalidResource {
        detail: "Failed to encode image".to_string(),
        cause: e.to_string(),
    }
}

/// Decode container bytes, pulling metadata out of the container as well
pub fn read_image(bytes: &[u8]) -> std::result::Result<ImageResource, image::ImageError> {
    let format = image::guess_format(bytes)?;
    let image = image::load_from_memory_with_format(bytes, format)?;

    let metadata = match format {
        ImageFormat::Png => png_text::read_png_text(bytes),
        ImageFormat::Jpeg | ImageFormat::WebP => {
            let tiff = if format == ImageFormat::Jpeg {
                exif::jpeg_exif(bytes)
            } else {
                exif::webp_exif(bytes)
            };
            tiff.and_then(|tiff| exif::read_user_comment(&tiff))
                .filter(|p| !p.is_empty())
                .map(|p| vec![(PARAMETERS_KEY.to_string(), p)])
                .unwrap_or_default()
        }
        _ => Vec::new(),
    };

    Ok(ImageResource { image, metadata })
}
