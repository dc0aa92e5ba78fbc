use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to access '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read input stream")]
    Stream(#[from] std::io::Error),

    #[error("pixel buffer too short: expected {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("image must be at least 1x1 pixel")]
    EmptyImage,

    #[error("image dimensions overflow when computing buffer size")]
    DimensionsOverflow,

    #[error("failed to encode PNG")]
    Encoding(#[from] png::EncodingError),

    #[error("failed to decode PNG")]
    Decoding(#[from] png::DecodingError),

    #[error("unsupported PNG layout: {color_type:?} at {bit_depth} bits, only 8-bit RGBA is supported")]
    UnsupportedPng {
        color_type: png::ColorType,
        bit_depth: u8,
    },

    #[error("invalid PNG: {0}")]
    InvalidPng(String),

    #[error("failed to open preview window")]
    Window(#[from] winit::error::OsError),

    #[error("failed to draw preview")]
    Display(#[from] pixels::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
