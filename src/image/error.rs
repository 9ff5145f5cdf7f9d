use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image API returned status {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("image service returned no image data")]
    EmptyData,

    #[error("image payload is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("image host rejected the upload: {0}")]
    UploadRejected(String),

    #[error("image host returned no public URL")]
    MissingUrl,

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}
