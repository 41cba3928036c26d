use std::fs;
use std::path::{Path, PathBuf};

use psdui_core::document::Document;
use thiserror::Error;

pub mod cursor;
pub mod rle;
pub mod writer;

mod channel;
mod container;
mod descriptor;
mod engine_data;
mod layer;
mod mask;
mod text;

pub use channel::load_channel_plane;
pub use container::{ParseOptions, parse_document};

/// 结构性解析错误，均携带出错位置在输入中的绝对偏移。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PsdError {
    #[error("truncated input at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        offset: u64,
        needed: u64,
        available: u64,
    },
    #[error("unsupported format at offset {offset}: {reason}")]
    UnsupportedFormat { offset: u64, reason: String },
    #[error("unsupported channel compression mode {mode} at offset {offset}")]
    UnsupportedCompression { offset: u64, mode: u16 },
    #[error("malformed layer record at offset {offset}: {message}")]
    MalformedLayerRecord { offset: u64, message: String },
    #[error("invalid run-length stream at offset {offset}: {message}")]
    InvalidRunLength { offset: u64, message: String },
}

impl PsdError {
    pub fn offset(&self) -> u64 {
        match self {
            Self::Truncated { offset, .. }
            | Self::UnsupportedFormat { offset, .. }
            | Self::UnsupportedCompression { offset, .. }
            | Self::MalformedLayerRecord { offset, .. }
            | Self::InvalidRunLength { offset, .. } => *offset,
        }
    }

    pub(crate) fn unsupported(offset: u64, reason: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(offset: u64, message: impl Into<String>) -> Self {
        Self::MalformedLayerRecord {
            offset,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum IoError {
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: PsdError,
    },
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError>;
}

pub struct PsdFacade {
    options: ParseOptions,
}

impl PsdFacade {
    pub fn new() -> Self {
        Self::with_options(ParseOptions::default())
    }

    pub fn with_options(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }
}

impl Default for PsdFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for PsdFacade {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        let data = fs::read(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        parse_document(&data, &self.options).map_err(|source| IoError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl DocumentSaver for PsdFacade {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError> {
        let bytes = writer::write_document(document)?;
        fs::write(path, bytes).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })
    }
}
