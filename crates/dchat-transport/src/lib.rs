//! Transport abstractions for DChat: spec.md §4.G / §6.
//!
//! Node code and the discovery protocol depend only on [`PeerTransport`];
//! concrete connection handling lives in a separate crate per transport
//! (`dchat-transport-tcp`), keeping the trait free of any one medium.

pub mod adapter;

pub use adapter::{InMemoryTransport, PeerTransport, TransportError, TransportEvent};
