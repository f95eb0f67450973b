//! Resolution of remote image references before forwarding
//!
//! Image fields holding an http(s) URL are fetched through the codec (policy
//! flags, SSRF guard, bounded fetch) and replaced with the base64 encoding in
//! the configured output format. Base64 and data URI values are left as is.

use serde_json::Value;
use tracing::debug;

use crate::backend::{BackendOperation, Payload};
use crate::codec::{EncodeOptions, ImageCodec};
use crate::error::Result;
use crate::gateway::FetchPolicy;

pub struct ReferenceResolver<'a> {
    codec: &'a ImageCodec,
    policy: FetchPolicy,
    encode: EncodeOptions,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(codec: &'a ImageCodec, policy: FetchPolicy, encode: EncodeOptions) -> Self {
        Self {
            codec,
            policy,
            encode,
        }
    }

    /// Rewrite the image fields `operation` is known to carry
    pub async fn resolve(&self, operation: BackendOperation, payload: &mut Payload) -> Result<()> {
        match operation {
            BackendOperation::Img2Img => {
                if let Some(Value::Array(images)) = payload.get_mut("init_images") {
                    for image in images.iter_mut() {
                        self.resolve_value(image).await?;
                    }
                }
                if let Some(mask) = payload.get_mut("mask") {
                    self.resolve_value(mask).await?;
                }
            }
            BackendOperation::ExtraSingleImage
            | BackendOperation::PngInfo
            | BackendOperation::Interrogate => {
                if let Some(image) = payload.get_mut("image") {
                    self.resolve_value(image).await?;
                }
            }
            BackendOperation::ExtraBatchImages => {
                if let Some(Value::Array(files)) = payload.get_mut("imageList") {
                    for file in files.iter_mut() {
                        if let Some(data) = file.get_mut("data") {
                            self.resolve_value(data).await?;
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn resolve_value(&self, value: &mut Value) -> Result<()> {
        let url = match value {
            Value::String(s) if ImageCodec::is_remote(s) => s.clone(),
            _ => return Ok(()),
        };
        debug!(url = %url, "Resolving remote image reference");
        let resource = self.codec.decode(&url, &self.policy).await?;
        let encoded = ImageCodec::encode(&resource, &self.encode.format, self.encode.quality)?;
        *value = Value::String(encoded);
        Ok(())
    }
}
