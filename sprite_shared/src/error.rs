//! Error types for the store, the wire codec, and the transport.

use std::io;
use std::path::PathBuf;

use crate::store::Format;

/// A structured codec could not encode or decode an entity document.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON syntax or schema error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// XML syntax or schema error.
    #[error("xml: {0}")]
    Xml(String),

    /// The file is not valid UTF-8 text.
    #[error("not utf-8 text: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Errors surfaced by [`EntityStore`](crate::store::EntityStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The entity file does not exist.
    #[error("entity file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The entity file exists but could not be read.
    #[error("failed to read entity file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file is not a well-formed document of its format, or does not
    /// match the entity record schema.
    #[error("failed to parse {format} entity file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        format: Format,
        #[source]
        source: CodecError,
    },

    /// The entities could not be encoded.
    #[error("failed to encode {format} entity file {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        format: Format,
        #[source]
        source: CodecError,
    },

    /// The encoded document could not be written.
    #[error("failed to write entity file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    /// True when the file is missing or unusable and a freshly generated
    /// default file would fix it.
    pub fn needs_bootstrap(&self) -> bool {
        matches!(self, StoreError::NotFound { .. } | StoreError::Parse { .. })
    }
}

/// Wire message codec errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// A coordinate does not fit the agreed field width.
    #[error("value {value} does not fit a {width}-character field")]
    FieldOverflow { value: i32, width: usize },

    /// The payload is not four numeric fields (plus the sentinel, if one is
    /// configured).
    #[error("malformed sync message {payload:?}: {reason}")]
    Malformed { payload: String, reason: String },
}

/// Transport errors.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// The publisher could not bind its endpoint.
    #[error("failed to bind publisher on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The subscriber could not reach the publisher.
    #[error("failed to connect subscriber to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The endpoint string is not a socket address.
    #[error("invalid endpoint {addr:?}")]
    InvalidAddr { addr: String },

    /// Frame-level I/O failure on an established connection.
    #[error("frame i/o: {0}")]
    Io(#[from] io::Error),

    /// A frame exceeded [`MAX_FRAME_LEN`](crate::net::MAX_FRAME_LEN).
    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    /// The subscription handshake was not understood.
    #[error("bad handshake: {0}")]
    Handshake(String),
}
