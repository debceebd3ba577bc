//! `send_contacts` / `receive_contacts` (spec.md §4.D), generic over a
//! `PeerTransport` the caller supplies — the protocol never owns a concrete
//! transport.

use dchat_codec::{encode_discover, get_content_part, string_to_contact, DiscoverPdu};
use dchat_contacts::ContactTable;
use dchat_core::{Contact, ConnectionId, DChatError, FindResult, SelfDescriptor};
use dchat_transport::PeerTransport;

use crate::error::DiscoveryError;

/// Stand-in identity used only to query `find_contact`; `same_identity`
/// never inspects `fd`, so any nonzero value works here.
const PLACEHOLDER_FD: ConnectionId = ConnectionId::MIN;

/// Outcome of `receive_contacts`: the new-peer and already-known counts from
/// spec.md §4.D, plus whether any line failed to parse or dial, represented
/// as a flag instead of a magic count so `new_count`/`known_count` stay
/// trustworthy on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReceiveOutcome {
    pub new_count: u32,
    pub known_count: u32,
    pub had_errors: bool,
}

/// Builds a `control/discover` PDU enumerating every established contact
/// except `to_index` itself, and writes it to that slot's connection.
/// Invalid contacts are skipped during serialization (logged, non-fatal);
/// a transport write failure is returned so the caller can `del_contact`
/// the recipient (spec.md §7).
pub fn send_contacts(
    table: &ContactTable,
    me: &SelfDescriptor,
    transport: &mut impl PeerTransport,
    to_index: usize,
) -> Result<usize, DiscoveryError> {
    let recipient = table.contact(to_index).ok_or(DChatError::IndexOutOfBounds {
        index: to_index,
        size: table.cl_size(),
    })?;
    let fd = recipient.fd;

    let contacts = table
        .iter_established()
        .filter(|&(idx, _)| idx != to_index)
        .map(|(_, c)| c);
    let encoded = encode_discover(me, contacts);
    if encoded.skipped_contacts > 0 {
        tracing::warn!(
            skipped = encoded.skipped_contacts,
            "skipped invalid contacts while building discover PDU"
        );
    }

    transport
        .write_pdu(fd, &encoded.bytes)
        .map_err(DiscoveryError::from)
}

/// Processes every `<onion_id> <port>\n` line of a received discover PDU's
/// payload in order, fully handling line *k* (including dialing unknown
/// peers) before moving to line *k+1* (spec.md §5 ordering guarantee).
///
/// A line that fails to parse is logged at WARN and skipped, counted in
/// `had_errors` but not fatal to the remaining lines. A dial failure for a
/// newly discovered peer is likewise logged and recorded without aborting.
pub fn receive_contacts(
    table: &mut ContactTable,
    me: &SelfDescriptor,
    transport: &mut impl PeerTransport,
    pdu: &DiscoverPdu,
) -> ReceiveOutcome {
    let mut outcome = ReceiveOutcome::default();
    let mut start = 0usize;

    while start < pdu.content.len() {
        let (end, line) = match get_content_part(pdu, start, b'\n') {
            Ok(parts) => parts,
            Err(_) => {
                tracing::warn!("discover payload missing trailing newline, stopping parse");
                outcome.had_errors = true;
                break;
            }
        };
        start = end + 1;

        let line_str = match std::str::from_utf8(line) {
            Ok(s) => s,
            Err(_) => {
                tracing::warn!("discover payload line was not valid utf-8, skipping");
                outcome.had_errors = true;
                continue;
            }
        };
        let (onion_id, port) = match string_to_contact(line_str) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(%err, "malformed contact line, skipping");
                outcome.had_errors = true;
                continue;
            }
        };

        let mut candidate = Contact::pending(PLACEHOLDER_FD, false);
        candidate.establish(onion_id.as_str(), port, "");

        match table.find_contact(&candidate, 0, me) {
            FindResult::SelfMatch | FindResult::Found(_) => {
                outcome.known_count += 1;
            }
            FindResult::NotFound => {
                outcome.new_count += 1;
                match transport.dial(&onion_id, port) {
                    Ok(fd) => match table.add_contact(fd, false) {
                        Ok(idx) => {
                            if let Some(c) = table.contact_mut(idx) {
                                c.establish(onion_id.as_str(), port, "");
                            }
                        }
                        Err(err) => {
                            tracing::warn!(%err, "failed to register newly dialed contact");
                            outcome.had_errors = true;
                        }
                    },
                    Err(err) => {
                        tracing::warn!(%err, %onion_id, port, "dial to newly discovered peer failed");
                        outcome.had_errors = true;
                    }
                }
            }
        }
    }

    outcome
}
