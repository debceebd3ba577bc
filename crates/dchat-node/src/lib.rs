//! Node-layer wiring for DChat: the peer-gossip and contact-lifecycle event
//! loop (spec.md §5) on top of the `dchat-discovery` protocol and a pluggable
//! `dchat-transport::PeerTransport`.

pub mod config;
pub mod logging;
pub mod service;
pub mod ui;

pub use config::{Bootstrap, NodeConfig, NodeConfigBuilder};
pub use logging::{LogSink, Severity};
pub use service::NodeService;
pub use ui::{NodeUi, TracingUi};
