use thiserror::Error;

use dchat_core::DChatError;
use dchat_transport::TransportError;

/// Errors surfaced by the discovery protocol that a caller needs to
/// distinguish from ordinary malformed-line warnings (those are logged and
/// folded into `ReceiveOutcome::had_errors` instead of returned).
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Core(#[from] DChatError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
