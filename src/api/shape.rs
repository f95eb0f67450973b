//! Declared request shapes for the forwarded routes
//!
//! Only the top level is checked: required fields must be present and known
//! fields must have the right JSON kind. Everything else passes through.

use serde_json::Value;

use crate::backend::{BackendOperation, Payload};
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Bool,
    Array,
    Object,
}

impl FieldKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Bool => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::Number => "a number",
            Self::Bool => "a boolean",
            Self::Array => "an array",
            Self::Object => "an object",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

const fn optional(name: &'static str, kind: FieldKind) -> FieldRule {
    FieldRule {
        name,
        kind,
        required: false,
    }
}

const fn required(name: &'static str, kind: FieldKind) -> FieldRule {
    FieldRule {
        name,
        kind,
        required: true,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RequestShape {
    pub fields: &'static [FieldRule],
}

const GENERATION_FIELDS: &[FieldRule] = &[
    optional("prompt", FieldKind::String),
    optional("negative_prompt", FieldKind::String),
    optional("styles", FieldKind::Array),
    optional("seed", FieldKind::Number),
    optional("steps", FieldKind::Number),
    optional("cfg_scale", FieldKind::Number),
    optional("width", FieldKind::Number),
    optional("height", FieldKind::Number),
    optional("batch_size", FieldKind::Number),
    optional("n_iter", FieldKind::Number),
    optional("sampler_name", FieldKind::String),
    optional("override_settings", FieldKind::Object),
    optional("alwayson_scripts", FieldKind::Object),
    optional("send_images", FieldKind::Bool),
    optional("save_images", FieldKind::Bool),
];

const IMG2IMG_FIELDS: &[FieldRule] = &[
    optional("init_images", FieldKind::Array),
    optional("mask", FieldKind::String),
    optional("denoising_strength", FieldKind::Number),
    optional("prompt", FieldKind::String),
    optional("negative_prompt", FieldKind::String),
    optional("seed", FieldKind::Number),
    optional("steps", FieldKind::Number),
    optional("width", FieldKind::Number),
    optional("height", FieldKind::Number),
    optional("override_settings", FieldKind::Object),
    optional("alwayson_scripts", FieldKind::Object),
];

impl RequestShape {
    pub const TXT2IMG: RequestShape = RequestShape {
        fields: GENERATION_FIELDS,
    };
    pub const IMG2IMG: RequestShape = RequestShape {
        fields: IMG2IMG_FIELDS,
    };
    pub const EXTRA_SINGLE_IMAGE: RequestShape = RequestShape {
        fields: &[
            required("image", FieldKind::String),
            optional("upscaling_resize", FieldKind::Number),
            optional("upscaler_1", FieldKind::String),
            optional("upscaler_2", FieldKind::String),
        ],
    };
    pub const EXTRA_BATCH_IMAGES: RequestShape = RequestShape {
        fields: &[
            required("imageList", FieldKind::Array),
            optional("upscaling_resize", FieldKind::Number),
            optional("upscaler_1", FieldKind::String),
            optional("upscaler_2", FieldKind::String),
        ],
    };
    pub const PNG_INFO: RequestShape = RequestShape {
        fields: &[required("image", FieldKind::String)],
    };
    pub const INTERROGATE: RequestShape = RequestShape {
        fields: &[
            required("image", FieldKind::String),
            optional("model", FieldKind::String),
        ],
    };
    pub const NONE: RequestShape = RequestShape { fields: &[] };

    pub fn for_operation(operation: BackendOperation) -> RequestShape {
        match operation {
            BackendOperation::Txt2Img => Self::TXT2IMG,
            BackendOperation::Img2Img => Self::IMG2IMG,
            BackendOperation::ExtraSingleImage => Self::EXTRA_SINGLE_IMAGE,
            BackendOperation::ExtraBatchImages => Self::EXTRA_BATCH_IMAGES,
            BackendOperation::PngInfo => Self::PNG_INFO,
            BackendOperation::Interrogate => Self::INTERROGATE,
            _ => Self::NONE,
        }
    }

    pub fn validate(&self, payload: &Payload) -> Result<()> {
        for rule in self.fields {
            match payload.get(rule.name) {
                None | Some(Value::Null) if rule.required => {
                    return Err(AppError::InvalidRequest(format!(
                        "field '{}' is required",
                        rule.name
                    )));
                }
                None | Some(Value::Null) => {}
                Some(value) if !rule.kind.matches(value) => {
                    return Err(AppError::InvalidRequest(format!(
                        "field '{}' must be {}",
                        rule.name,
                        rule.kind.describe()
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}
