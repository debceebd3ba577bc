//! Node configuration, with a fluent builder.

use dchat_contacts::DEFAULT_INIT_CONTACTS;
use dchat_core::SelfDescriptor;

use crate::logging::Severity;

/// A peer to dial at startup, before the discovery protocol has had a chance
/// to learn anyone on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bootstrap {
    pub onion_id: String,
    pub port: u16,
}

/// Everything [`crate::service::NodeService`] needs to start running.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub me: SelfDescriptor,
    pub init_contacts: usize,
    pub bootstrap: Vec<Bootstrap>,
    pub log_level: Severity,
}

impl NodeConfig {
    pub fn builder(me: SelfDescriptor) -> NodeConfigBuilder {
        NodeConfigBuilder::new(me)
    }
}

/// Fluent builder for [`NodeConfig`], defaulting `init_contacts` to
/// [`DEFAULT_INIT_CONTACTS`] and `log_level` to [`Severity::Info`].
#[derive(Debug, Clone)]
pub struct NodeConfigBuilder {
    me: SelfDescriptor,
    init_contacts: usize,
    bootstrap: Vec<Bootstrap>,
    log_level: Severity,
}

impl NodeConfigBuilder {
    pub fn new(me: SelfDescriptor) -> Self {
        Self {
            me,
            init_contacts: DEFAULT_INIT_CONTACTS,
            bootstrap: Vec::new(),
            log_level: Severity::Info,
        }
    }

    pub fn init_contacts(mut self, n: usize) -> Self {
        self.init_contacts = n;
        self
    }

    pub fn bootstrap(mut self, onion_id: impl Into<String>, port: u16) -> Self {
        self.bootstrap.push(Bootstrap {
            onion_id: onion_id.into(),
            port,
        });
        self
    }

    pub fn log_level(mut self, level: Severity) -> Self {
        self.log_level = level;
        self
    }

    pub fn build(self) -> NodeConfig {
        NodeConfig {
            me: self.me,
            init_contacts: self.init_contacts,
            bootstrap: self.bootstrap,
            log_level: self.log_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn me() -> SelfDescriptor {
        SelfDescriptor {
            onion_id: "aaaaaaaaaaaaaaaa.onion".to_string(),
            lport: 9000,
            name: "node".to_string(),
        }
    }

    #[test]
    fn builder_defaults_match_contact_table_defaults() {
        let cfg = NodeConfig::builder(me()).build();
        assert_eq!(cfg.init_contacts, DEFAULT_INIT_CONTACTS);
        assert!(cfg.bootstrap.is_empty());
        assert_eq!(cfg.log_level, Severity::Info);
    }

    #[test]
    fn builder_accumulates_multiple_bootstrap_peers() {
        let cfg = NodeConfig::builder(me())
            .bootstrap("bbbbbbbbbbbbbbbb.onion", 7000)
            .bootstrap("cccccccccccccccc.onion", 7001)
            .log_level(Severity::Debug)
            .build();
        assert_eq!(cfg.bootstrap.len(), 2);
        assert_eq!(cfg.log_level, Severity::Debug);
    }
}
