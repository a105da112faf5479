use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum MissiveError {
    #[error("malformed PDF document: {0}")]
    MalformedDocument(String),

    #[error("unsupported image codec '{filter}'")]
    UnsupportedCodec { filter: String },

    #[error("failed to decode image '{name}': {reason}")]
    ImageDecode { name: String, reason: String },

    #[error("failed to read background of template '{template}': {reason}")]
    Catalog { template: String, reason: String },

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("invalid configuration in {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MissiveError {
    /// True for errors confined to a single embedded image.
    pub fn is_image_level(&self) -> bool {
        matches!(
            self,
            MissiveError::UnsupportedCodec { .. } | MissiveError::ImageDecode { .. }
        )
    }
}

impl From<lopdf::Error> for MissiveError {
    fn from(e: lopdf::Error) -> Self {
        MissiveError::MalformedDocument(e.to_string())
    }
}
