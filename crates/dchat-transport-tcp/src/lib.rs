//! A concrete tokio-based TCP implementation of `dchat_transport::PeerTransport`
//! (spec.md §4.G, §6): listens for inbound connections, dials outbound ones,
//! and surfaces accept/inbound-data/close events through a channel the
//! node's event loop polls without blocking.
//!
//! Framing duplicates just enough of `dchat-codec`'s header format to find a
//! frame boundary (`Content-Length:` line, blank line, N payload bytes); the
//! reassembled raw bytes are handed to the caller to parse. Onion-routing /
//! SOCKS proxying is out of scope here — a real deployment would substitute
//! a SOCKS5-dialing transport behind the same `PeerTransport` trait.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use dchat_core::ConnectionId;
use dchat_transport::{PeerTransport, TransportError, TransportEvent};

#[derive(Debug, Error)]
pub enum TcpTransportError {
    #[error("failed to bind listener: {0}")]
    Bind(#[source] io::Error),
}

type WriterMap = Arc<Mutex<HashMap<ConnectionId, mpsc::UnboundedSender<Vec<u8>>>>>;

/// A tokio TCP transport bound to a single local address. Background tasks
/// handle accept, read, and write work; `poll_event` drains their results.
pub struct TcpTransport {
    local_addr: SocketAddr,
    next_id: Arc<AtomicU64>,
    writers: WriterMap,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl TcpTransport {
    /// Binds a listener and spawns its accept loop on the current runtime.
    pub async fn bind(addr: SocketAddr) -> Result<Self, TcpTransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TcpTransportError::Bind)?;
        let local_addr = listener.local_addr().map_err(TcpTransportError::Bind)?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let next_id = Arc::new(AtomicU64::new(1));
        let writers: WriterMap = Arc::new(Mutex::new(HashMap::new()));

        let accept_events_tx = events_tx.clone();
        let accept_next_id = Arc::clone(&next_id);
        let accept_writers = Arc::clone(&writers);
        tokio::spawn(async move {
            loop {
                let (stream, peer) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(err) => {
                        tracing::warn!(%err, "tcp accept failed, stopping listener");
                        break;
                    }
                };
                let id = next_connection_id(&accept_next_id);
                tracing::debug!(%peer, conn = %id, "accepted inbound connection");
                spawn_connection(id, stream, accept_events_tx.clone(), Arc::clone(&accept_writers));
                let _ = accept_events_tx.send(TransportEvent::Accepted(id));
            }
        });

        Ok(Self {
            local_addr,
            next_id,
            writers,
            events_tx,
            events_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl PeerTransport for TcpTransport {
    fn dial(&mut self, onion_id: &str, port: u16) -> Result<ConnectionId, TransportError> {
        let id = next_connection_id(&self.next_id);
        let (write_tx, write_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        self.writers.lock().unwrap().insert(id, write_tx);

        let target = format!("{onion_id}:{port}");
        let events_tx = self.events_tx.clone();
        let writers = Arc::clone(&self.writers);
        let onion_id = onion_id.to_string();
        tokio::spawn(async move {
            match TcpStream::connect(&target).await {
                Ok(stream) => run_connection(id, stream, write_rx, events_tx, writers).await,
                Err(err) => {
                    tracing::warn!(%err, %onion_id, port, "dial failed");
                    writers.lock().unwrap().remove(&id);
                    let _ = events_tx.send(TransportEvent::Closed(id));
                }
            }
        });
        Ok(id)
    }

    fn write_pdu(&mut self, conn: ConnectionId, bytes: &[u8]) -> Result<usize, TransportError> {
        let writers = self.writers.lock().unwrap();
        let sender = writers
            .get(&conn)
            .ok_or_else(|| TransportError::WriteFailed(format!("no open connection {conn}")))?;
        sender
            .send(bytes.to_vec())
            .map_err(|_| TransportError::WriteFailed(format!("connection {conn} closed")))?;
        Ok(bytes.len())
    }

    fn close(&mut self, conn: ConnectionId) {
        self.writers.lock().unwrap().remove(&conn);
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        self.events_rx.try_recv().ok()
    }
}

fn next_connection_id(counter: &AtomicU64) -> ConnectionId {
    let id = counter.fetch_add(1, Ordering::SeqCst);
    ConnectionId::new(id).expect("counter starts at 1 and only increases")
}

fn spawn_connection(
    id: ConnectionId,
    stream: TcpStream,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    writers: WriterMap,
) {
    let (write_tx, write_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    writers.lock().unwrap().insert(id, write_tx);
    tokio::spawn(run_connection(id, stream, write_rx, events_tx, writers));
}

async fn run_connection(
    id: ConnectionId,
    stream: TcpStream,
    mut write_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    writers: WriterMap,
) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        tokio::select! {
            maybe_bytes = write_rx.recv() => {
                match maybe_bytes {
                    Some(bytes) => {
                        if write_half.write_all(&bytes).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            frame = read_one_frame(&mut reader) => {
                match frame {
                    Ok(Some(bytes)) => {
                        let _ = events_tx.send(TransportEvent::Inbound(id, bytes));
                    }
                    Ok(None) => break,
                    Err(err) => {
                        tracing::debug!(%err, conn = %id, "frame read failed, closing connection");
                        break;
                    }
                }
            }
        }
    }

    writers.lock().unwrap().remove(&id);
    let _ = events_tx.send(TransportEvent::Closed(id));
}

/// Reads one `Content-Length`-framed PDU off `reader`: header lines up to
/// the blank line, then exactly that many payload bytes. Returns `Ok(None)`
/// on a clean close before any bytes arrived.
async fn read_one_frame<R>(reader: &mut R) -> io::Result<Option<Vec<u8>>>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut frame = Vec::new();
    let mut content_length = None;

    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return if frame.is_empty() {
                Ok(None)
            } else {
                Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed mid-frame",
                ))
            };
        }
        frame.extend_from_slice(line.as_bytes());
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed.is_empty() {
            break;
        }
        if let Some(value) = trimmed.strip_prefix("Content-Length: ") {
            content_length = value.parse::<usize>().ok();
        }
    }

    let content_length = content_length.unwrap_or(0);
    let mut content = vec![0_u8; content_length];
    reader.read_exact(&mut content).await?;
    frame.extend_from_slice(&content);
    Ok(Some(frame))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn wait_for_event(transport: &mut TcpTransport) -> TransportEvent {
        for _ in 0..200 {
            if let Some(event) = transport.poll_event() {
                return event;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for transport event");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dial_accept_and_frame_round_trip() {
        let mut server = TcpTransport::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let server_addr = server.local_addr();
        let mut client = TcpTransport::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();

        let client_conn = client
            .dial(&server_addr.ip().to_string(), server_addr.port())
            .unwrap();

        let accepted = wait_for_event(&mut server).await;
        let server_conn = match accepted {
            TransportEvent::Accepted(id) => id,
            other => panic!("expected Accepted, got {other:?}"),
        };

        let frame = b"Version: 1.0\nContent-Type: control/discover\nOnion-ID: zzzzzzzzzzzzzzzz.onion\nListen-Port: 5001\nNickname: z\nContent-Length: 0\n\n".to_vec();
        client.write_pdu(client_conn, &frame).unwrap();

        let inbound = wait_for_event(&mut server).await;
        match inbound {
            TransportEvent::Inbound(conn, bytes) => {
                assert_eq!(conn, server_conn);
                assert_eq!(bytes, frame);
            }
            other => panic!("expected Inbound, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dial_to_unreachable_port_reports_closed_event() {
        let mut client = TcpTransport::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let conn = client.dial("127.0.0.1", 1).unwrap();
        let event = wait_for_event(&mut client).await;
        assert_eq!(event, TransportEvent::Closed(conn));
    }
}
