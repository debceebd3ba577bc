//! The external transport seam (spec.md §4.G, §6): `dial`/`write_pdu`/
//! `close`, plus an in-memory double for tests. The concrete tokio/TCP
//! implementation lives in the separate `dchat-transport-tcp` crate, keeping
//! the adapter trait free of any particular I/O stack.

use std::collections::VecDeque;

use thiserror::Error;

use dchat_core::ConnectionId;

/// Transport-level failure. `dial`/`write_pdu` failures are reported to the
/// caller, who decides whether to `del_contact` the affected peer
/// (spec.md §7).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("dial to {onion_id}:{port} failed: {reason}")]
    DialFailed {
        onion_id: String,
        port: u16,
        reason: String,
    },
    #[error("write failed: {0}")]
    WriteFailed(String),
}

/// An event surfaced by a transport's connection-handling background work,
/// drained one at a time by the node's single-threaded event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A new inbound connection was accepted.
    Accepted(ConnectionId),
    /// A complete PDU's worth of bytes arrived from a connection.
    Inbound(ConnectionId, Vec<u8>),
    /// A connection was closed by the remote end or the transport itself.
    Closed(ConnectionId),
}

/// The contract the discovery protocol and node event loop depend on.
/// Mirrors spec.md §4.G / §6: `dial(onion_id, lport) -> fd | error`,
/// `write_pdu(fd, pdu) -> bytes | error`, `close(fd)`, plus an event source
/// replacing a blocking accept/read loop with one the caller can poll.
pub trait PeerTransport {
    /// Opens an outbound connection to a peer, returning its connection id.
    fn dial(&mut self, onion_id: &str, port: u16) -> Result<ConnectionId, TransportError>;

    /// Writes a complete PDU's bytes to an open connection.
    fn write_pdu(&mut self, conn: ConnectionId, bytes: &[u8]) -> Result<usize, TransportError>;

    /// Closes a connection. Best-effort: failures aren't surfaced because
    /// the contact slot is being torn down regardless.
    fn close(&mut self, conn: ConnectionId);

    /// Returns the next pending transport event, if any, without blocking.
    fn poll_event(&mut self) -> Option<TransportEvent>;
}

/// Deterministic in-process transport for unit/integration tests and the
/// duplicate-resolution simulation (spec.md §8 S2). Connection ids are
/// minted in dial order starting at 1; inbound events are queued explicitly
/// by the test via [`InMemoryTransport::push_event`].
#[derive(Debug, Default)]
pub struct InMemoryTransport {
    next_id: u64,
    dial_failures: Vec<(String, u16)>,
    dials: Vec<(String, u16)>,
    writes: Vec<(ConnectionId, Vec<u8>)>,
    closed: Vec<ConnectionId>,
    events: VecDeque<TransportEvent>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent dials to this `(onion_id, port)` fail.
    pub fn fail_dial(&mut self, onion_id: impl Into<String>, port: u16) {
        self.dial_failures.push((onion_id.into(), port));
    }

    /// Queues an event to be returned by a future `poll_event`.
    pub fn push_event(&mut self, event: TransportEvent) {
        self.events.push_back(event);
    }

    pub fn dials(&self) -> &[(String, u16)] {
        &self.dials
    }

    pub fn writes(&self) -> &[(ConnectionId, Vec<u8>)] {
        &self.writes
    }

    pub fn take_writes(&mut self) -> Vec<(ConnectionId, Vec<u8>)> {
        std::mem::take(&mut self.writes)
    }

    pub fn closed(&self) -> &[ConnectionId] {
        &self.closed
    }
}

impl PeerTransport for InMemoryTransport {
    fn dial(&mut self, onion_id: &str, port: u16) -> Result<ConnectionId, TransportError> {
        self.dials.push((onion_id.to_string(), port));
        if self
            .dial_failures
            .iter()
            .any(|(o, p)| o == onion_id && *p == port)
        {
            return Err(TransportError::DialFailed {
                onion_id: onion_id.to_string(),
                port,
                reason: "simulated dial failure".to_string(),
            });
        }
        self.next_id += 1;
        Ok(ConnectionId::new(self.next_id).expect("next_id starts at 1"))
    }

    fn write_pdu(&mut self, conn: ConnectionId, bytes: &[u8]) -> Result<usize, TransportError> {
        self.writes.push((conn, bytes.to_vec()));
        Ok(bytes.len())
    }

    fn close(&mut self, conn: ConnectionId) {
        self.closed.push(conn);
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        self.events.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dial_mints_increasing_connection_ids() {
        let mut t = InMemoryTransport::new();
        let a = t.dial("aaaaaaaaaaaaaaaa.onion", 6000).unwrap();
        let b = t.dial("bbbbbbbbbbbbbbbb.onion", 6001).unwrap();
        assert!(b.get() > a.get());
        assert_eq!(t.dials().len(), 2);
    }

    #[test]
    fn dial_failure_is_reported() {
        let mut t = InMemoryTransport::new();
        t.fail_dial("aaaaaaaaaaaaaaaa.onion", 6000);
        assert!(t.dial("aaaaaaaaaaaaaaaa.onion", 6000).is_err());
    }

    #[test]
    fn write_and_close_are_recorded() {
        let mut t = InMemoryTransport::new();
        let conn = t.dial("aaaaaaaaaaaaaaaa.onion", 6000).unwrap();
        t.write_pdu(conn, b"hello").unwrap();
        t.close(conn);
        assert_eq!(t.writes(), &[(conn, b"hello".to_vec())]);
        assert_eq!(t.closed(), &[conn]);
    }

    #[test]
    fn events_drain_in_fifo_order() {
        let mut t = InMemoryTransport::new();
        let conn = t.dial("aaaaaaaaaaaaaaaa.onion", 6000).unwrap();
        t.push_event(TransportEvent::Accepted(conn));
        t.push_event(TransportEvent::Inbound(conn, vec![1, 2, 3]));
        assert_eq!(t.poll_event(), Some(TransportEvent::Accepted(conn)));
        assert_eq!(
            t.poll_event(),
            Some(TransportEvent::Inbound(conn, vec![1, 2, 3]))
        );
        assert_eq!(t.poll_event(), None);
    }
}
