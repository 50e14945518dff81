//! Error types for the protocol layer.

/// Errors raised while turning events into text or back.
///
/// A `Decode` error on an inbound frame is what the server reports to the
/// client as a malformed payload; it never reaches room state.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serializing an outbound event failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The inbound text is not valid JSON, names an unknown event, or is
    /// missing a required field.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),
}
