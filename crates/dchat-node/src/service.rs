//! The node's event loop (spec.md §5): single-threaded-cooperative, owns the
//! `ContactTable` exclusively, and drives one transport event to completion
//! before the next is polled.

use std::time::Duration;

use dchat_codec::parse_frame;
use dchat_contacts::ContactTable;
use dchat_core::ConnectionId;
use dchat_discovery::{check_duplicates, receive_contacts, send_contacts};
use dchat_transport::{PeerTransport, TransportEvent};

use crate::config::NodeConfig;
use crate::logging::Severity;
use crate::ui::{NodeUi, TracingUi};

/// How long `run` sleeps between empty polls of the transport. The core has
/// no notion of a timer; this is purely a cooperative-scheduling yield point
/// so the event loop doesn't spin a CPU core on an idle connection.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Owns the table and a transport, and drives spec.md §4.D/§4.E against
/// whatever events the transport surfaces.
pub struct NodeService<T: PeerTransport> {
    config: NodeConfig,
    table: ContactTable,
    transport: T,
    ui: Box<dyn NodeUi>,
}

impl<T: PeerTransport> NodeService<T> {
    pub fn new(config: NodeConfig, transport: T) -> Self {
        Self::with_ui(config, transport, Box::new(TracingUi))
    }

    pub fn with_ui(config: NodeConfig, transport: T, ui: Box<dyn NodeUi>) -> Self {
        let table = ContactTable::new(config.init_contacts);
        Self {
            config,
            table,
            transport,
            ui,
        }
    }

    pub fn table(&self) -> &ContactTable {
        &self.table
    }

    /// Dials every configured bootstrap peer and announces our identity to
    /// each, so the node has at least one known contact before any inbound
    /// traffic arrives (spec.md §8 S1's "X dials Y and sends its
    /// self-identity").
    pub fn start(&mut self) {
        let bootstrap = self.config.bootstrap.clone();
        for peer in bootstrap {
            match self.transport.dial(&peer.onion_id, peer.port) {
                Ok(fd) => self.on_new_outbound_connection(fd),
                Err(err) => self.ui.ui_log(
                    Severity::Warning,
                    &format!("bootstrap dial to {}:{} failed: {err}", peer.onion_id, peer.port),
                ),
            }
        }
    }

    /// Drains and fully processes every currently-pending transport event.
    /// Returns the number of events processed.
    pub fn drain(&mut self) -> usize {
        let mut processed = 0;
        while let Some(event) = self.transport.poll_event() {
            self.handle_event(event);
            processed += 1;
        }
        processed
    }

    /// Runs forever: drain whatever is pending, then yield briefly. Intended
    /// for the CLI binary's main task; a host embedding this crate
    /// differently can call [`Self::drain`] directly instead on its own
    /// schedule.
    pub async fn run(&mut self) -> ! {
        loop {
            if self.drain() == 0 {
                tokio::time::sleep(IDLE_POLL_INTERVAL).await;
            }
        }
    }

    fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Accepted(fd) => self.on_accepted(fd),
            TransportEvent::Inbound(fd, bytes) => self.on_inbound(fd, bytes),
            TransportEvent::Closed(fd) => self.on_closed(fd),
        }
    }

    fn on_accepted(&mut self, fd: ConnectionId) {
        match self.table.add_contact(fd, true) {
            Ok(idx) => self.announce_self(idx),
            Err(err) => {
                self.ui
                    .ui_log(Severity::Err, &format!("failed to register accepted connection: {err}"));
                self.transport.close(fd);
            }
        }
    }

    fn on_new_outbound_connection(&mut self, fd: ConnectionId) {
        match self.table.add_contact(fd, false) {
            Ok(idx) => self.announce_self(idx),
            Err(err) => {
                self.ui
                    .ui_log(Severity::Err, &format!("failed to register dialed connection: {err}"));
                self.transport.close(fd);
            }
        }
    }

    /// Sends our own discover PDU (identity header plus whatever contacts we
    /// already know) to a freshly opened slot.
    fn announce_self(&mut self, idx: usize) {
        if let Err(err) = send_contacts(&self.table, &self.config.me, &mut self.transport, idx) {
            self.ui
                .ui_log(Severity::Warning, &format!("send_contacts to slot {idx} failed: {err}"));
        }
    }

    fn on_inbound(&mut self, fd: ConnectionId, bytes: Vec<u8>) {
        let Some(idx) = self.index_of(fd) else {
            return;
        };

        let pdu = match parse_frame(&bytes) {
            Ok(pdu) => pdu,
            Err(err) => {
                self.ui
                    .ui_log(Severity::Warning, &format!("malformed PDU from slot {idx}: {err}"));
                self.drop_slot(idx);
                return;
            }
        };

        if let Some(contact) = self.table.contact_mut(idx) {
            if !contact.is_established() {
                contact.establish(
                    pdu.sender_onion_id.clone(),
                    pdu.sender_lport,
                    pdu.sender_name.clone(),
                );
            }
        }

        let outcome = receive_contacts(&mut self.table, &self.config.me, &mut self.transport, &pdu);
        if outcome.had_errors {
            self.ui.ui_log(
                Severity::Warning,
                &format!(
                    "receive_contacts from slot {idx}: {} new, {} known, with errors",
                    outcome.new_count, outcome.known_count
                ),
            );
        } else {
            self.ui.ui_log(
                Severity::Debug,
                &format!(
                    "receive_contacts from slot {idx}: {} new, {} known",
                    outcome.new_count, outcome.known_count
                ),
            );
        }

        if let Some(victim) = check_duplicates(&self.table, &self.config.me, idx) {
            self.ui
                .ui_log(Severity::Notice, &format!("resolving duplicate connection at slot {victim}"));
            self.drop_slot(victim);
        }
    }

    fn on_closed(&mut self, fd: ConnectionId) {
        if let Some(idx) = self.index_of(fd) {
            self.drop_slot(idx);
        }
    }

    fn drop_slot(&mut self, idx: usize) {
        match self.table.del_contact(idx) {
            Ok(Some(fd)) => self.transport.close(fd),
            Ok(None) => {}
            Err(err) => self
                .ui
                .ui_log(Severity::Err, &format!("failed to delete slot {idx}: {err}")),
        }
    }

    fn index_of(&self, fd: ConnectionId) -> Option<usize> {
        (0..self.table.cl_size()).find(|&i| self.table.contact(i).map(|c| c.fd) == Some(fd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dchat_core::SelfDescriptor;
    use dchat_transport::InMemoryTransport;

    fn me(onion: &str, port: u16) -> SelfDescriptor {
        SelfDescriptor {
            onion_id: onion.to_string(),
            lport: port,
            name: "node".to_string(),
        }
    }

    fn service(onion: &str, port: u16) -> NodeService<InMemoryTransport> {
        let config = NodeConfig::builder(me(onion, port)).build();
        NodeService::new(config, InMemoryTransport::new())
    }

    #[test]
    fn accepted_connection_gets_announced_to() {
        let mut svc = service("aaaaaaaaaaaaaaaa.onion", 5000);
        svc.transport.push_event(TransportEvent::Accepted(ConnectionId::new(1).unwrap()));
        assert_eq!(svc.drain(), 1);
        assert_eq!(svc.table.used_contacts(), 1);
        assert_eq!(svc.transport.writes().len(), 1);
    }

    #[test]
    fn inbound_discover_establishes_sender_and_dials_new_peers() {
        let mut svc = service("aaaaaaaaaaaaaaaa.onion", 5000);
        let conn = ConnectionId::new(1).unwrap();
        svc.transport.push_event(TransportEvent::Accepted(conn));
        svc.drain();
        svc.transport.take_writes();

        let sender = me("bbbbbbbbbbbbbbbb.onion", 6000);
        let encoded = dchat_codec::encode_discover(&sender, std::iter::empty());
        let mut pdu_bytes = encoded.bytes;
        // Rebuild with a non-empty payload advertising a third peer.
        let mut pdu = dchat_codec::parse_frame(&pdu_bytes).unwrap();
        pdu.content = b"cccccccccccccccc.onion 6002\n".to_vec();
        pdu_bytes = rebuild(&pdu);

        svc.transport.push_event(TransportEvent::Inbound(conn, pdu_bytes));
        svc.drain();

        assert_eq!(svc.table.contact(0).unwrap().onion_id, "bbbbbbbbbbbbbbbb.onion");
        assert_eq!(svc.table.used_contacts(), 2);
        assert_eq!(svc.transport.dials(), &[("cccccccccccccccc.onion".to_string(), 6002)]);
    }

    #[test]
    fn closed_event_removes_the_slot() {
        let mut svc = service("aaaaaaaaaaaaaaaa.onion", 5000);
        let conn = ConnectionId::new(1).unwrap();
        svc.transport.push_event(TransportEvent::Accepted(conn));
        svc.drain();
        assert_eq!(svc.table.used_contacts(), 1);

        svc.transport.push_event(TransportEvent::Closed(conn));
        svc.drain();
        assert_eq!(svc.table.used_contacts(), 0);
    }

    fn rebuild(pdu: &dchat_codec::DiscoverPdu) -> Vec<u8> {
        let sender = SelfDescriptor {
            onion_id: pdu.sender_onion_id.clone(),
            lport: pdu.sender_lport,
            name: pdu.sender_name.clone(),
        };
        let mut bytes = format!(
            "Version: {}\nContent-Type: control/discover\nOnion-ID: {}\nListen-Port: {}\nNickname: {}\nContent-Length: {}\n\n",
            pdu.version, sender.onion_id, sender.lport, sender.name, pdu.content.len()
        )
        .into_bytes();
        bytes.extend_from_slice(&pdu.content);
        bytes
    }
}
