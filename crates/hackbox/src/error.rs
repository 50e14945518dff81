//! Unified error type for the Hackbox server.

use std::path::PathBuf;

use hackbox_protocol::ProtocolError;
use hackbox_room::RoomError;
use hackbox_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// The `#[from]` variants let `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum HackboxError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An event could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room request failed.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The server configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A file the server needs could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
