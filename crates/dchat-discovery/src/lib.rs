//! Discovery protocol and duplicate resolver: spec.md §4.D, §4.E.

pub mod duplicate;
pub mod error;
pub mod protocol;

pub use duplicate::check_duplicates;
pub use error::DiscoveryError;
pub use protocol::{receive_contacts, send_contacts, ReceiveOutcome};
