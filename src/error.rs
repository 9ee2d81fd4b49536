use thiserror::Error;

#[derive(Error, Debug)]
pub enum VideoError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Missing precondition: {0}")]
    MissingPrecondition(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Video generation error: {0}")]
    VideoGenerationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("FFmpeg error: {0}")]
    FfmpegError(String),
}

pub type Result<T> = std::result::Result<T, VideoError>;
