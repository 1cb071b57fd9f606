// src/error.rs

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SentinelError>;

#[derive(Debug, Error)]
pub enum SentinelError {
    /// Image payload could not be decoded. Fails the frame, not the session.
    #[error("undecodable frame: {0}")]
    Decode(String),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("ensemble training failed: {0}")]
    Training(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<base64::DecodeError> for SentinelError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Decode(format!("base64: {err}"))
    }
}

impl From<image::ImageError> for SentinelError {
    fn from(err: image::ImageError) -> Self {
        Self::Decode(format!("image: {err}"))
    }
}
