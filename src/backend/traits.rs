//! Common traits and types for the remote generation backend

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;

/// Opaque, ordered request document passed through to the backend untouched
pub type Payload = Map<String, Value>;

/// Operations the backend exposes, each bound to a fixed path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendOperation {
    Txt2Img,
    Img2Img,
    ExtraSingleImage,
    ExtraBatchImages,
    PngInfo,
    Interrogate,
    Progress,
    Interrupt,
    Skip,
}

impl BackendOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Txt2Img => "txt2img",
            Self::Img2Img => "img2img",
            Self::ExtraSingleImage => "extra-single-image",
            Self::ExtraBatchImages => "extra-batch-images",
            Self::PngInfo => "png-info",
            Self::Interrogate => "interrogate",
            Self::Progress => "progress",
            Self::Interrupt => "interrupt",
            Self::Skip => "skip",
        }
    }

    pub fn path(&self) -> String {
        format!("/sdapi/v1/{}", self.name())
    }

    /// Control calls use the short timeout and carry no body
    pub fn is_control(&self) -> bool {
        matches!(self, Self::Progress | Self::Interrupt | Self::Skip)
    }

    pub fn is_get(&self) -> bool {
        matches!(self, Self::Progress)
    }
}

/// Client of the remote image-generation service
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Forward one call and return the backend JSON unmodified
    async fn forward(&self, operation: BackendOperation, payload: Option<Payload>) -> Result<Value>;

    async fn txt2img(&self, params: Payload) -> Result<Value> {
        self.forward(BackendOperation::Txt2Img, Some(params)).await
    }

    async fn img2img(&self, params: Payload) -> Result<Value> {
        self.forward(BackendOperation::Img2Img, Some(params)).await
    }

    async fn extras_single_image(&self, params: Payload) -> Result<Value> {
        self.forward(BackendOperation::ExtraSingleImage, Some(params)).await
    }

    async fn extras_batch_images(&self, params: Payload) -> Result<Value> {
        self.forward(BackendOperation::ExtraBatchImages, Some(params)).await
    }

    async fn png_info(&self, params: Payload) -> Result<Value> {
        self.forward(BackendOperation::PngInfo, Some(params)).await
    }

    async fn interrogate(&self, params: Payload) -> Result<Value> {
        self.forward(BackendOperation::Interrogate, Some(params)).await
    }

    async fn progress(&self) -> Result<Value> {
        self.forward(BackendOperation::Progress, None).await
    }

    async fn interrupt(&self) -> Result<Value> {
        self.forward(BackendOperation::Interrupt, None).await
    }

    async fn skip(&self) -> Result<Value> {
        self.forward(BackendOperation::Skip, None).await
    }
}
