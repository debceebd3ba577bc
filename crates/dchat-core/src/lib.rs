//! Shared types for the DChat peer-gossip core: contacts, errors, and the
//! onion/port validators every other crate in the workspace builds on.
//!
//! Contains no I/O — transports, the contact table, and the discovery
//! protocol live in their own crates and depend on this one.

pub mod contact;
pub mod error;
pub mod validate;

pub use contact::{Contact, ConnectionId, FindResult, SelfDescriptor, Slot, MAX_NAME_LEN};
pub use error::{ContactLineError, DChatError};
pub use validate::{is_valid_onion, is_valid_onion_versioned, is_valid_port, OnionVersion};
