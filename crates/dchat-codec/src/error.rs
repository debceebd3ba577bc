use thiserror::Error;

use dchat_core::ContactLineError;

/// Errors returned by PDU encode/parse operations.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A contact's onion/port failed validation; the core reports and skips
    /// this contact rather than aborting the whole PDU (spec.md §7).
    #[error("invalid contact: {0}")]
    InvalidContact(&'static str),
    /// The frame was truncated or missing a required header/delimiter.
    #[error("malformed frame: {0}")]
    MalformedFrame(&'static str),
    /// A single `<onion_id> <port>\n` payload line did not parse.
    #[error("malformed contact line: {0}")]
    MalformedContactLine(#[from] ContactLineError),
}
