use thiserror::Error;

/// Reason a contact-line failed to parse, from `string_to_contact`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContactLineError {
    #[error("missing onion field")]
    MissingOnion,
    #[error("missing port field")]
    MissingPort,
    #[error("onion address failed validation")]
    BadOnion,
    #[error("port failed validation")]
    BadPort,
}

/// Shared error type for the contact/discovery core.
///
/// Validation and parse errors on individual contact lines are non-fatal:
/// callers log them at `Severity::Warning` and continue (see `dchat-node`'s
/// logging sink and `dchat-discovery::receive_contacts`). Only
/// `OutOfMemory` is fatal by convention.
#[derive(Debug, Error)]
pub enum DChatError {
    #[error("invalid contact: {0}")]
    InvalidContact(&'static str),
    #[error("malformed frame: {0}")]
    MalformedFrame(&'static str),
    #[error("malformed contact line: {0}")]
    MalformedContactLine(#[from] ContactLineError),
    #[error("index {index} out of bounds for table of size {size}")]
    IndexOutOfBounds { index: usize, size: usize },
    #[error("invalid resize to {requested} (used={used})")]
    InvalidSize { requested: usize, used: usize },
    #[error("out of memory growing contact table")]
    OutOfMemory,
    #[error("transport error: {0}")]
    TransportError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_line_error_messages_are_stable() {
        assert_eq!(ContactLineError::MissingOnion.to_string(), "missing onion field");
        assert_eq!(ContactLineError::BadPort.to_string(), "port failed validation");
    }

    #[test]
    fn malformed_contact_line_wraps_subreason() {
        let err = DChatError::from(ContactLineError::BadOnion);
        assert!(matches!(
            err,
            DChatError::MalformedContactLine(ContactLineError::BadOnion)
        ));
        assert_eq!(
            err.to_string(),
            "malformed contact line: onion address failed validation"
        );
    }
}
