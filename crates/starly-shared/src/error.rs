use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Envelope encoding error: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Envelope decoding error: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MediaError {
    #[error("Not a data URI")]
    NotDataUri,

    #[error("Only base64 data URIs are supported")]
    NotBase64,

    #[error("Invalid base64 payload")]
    InvalidPayload,

    #[error("Attachment too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },
}
