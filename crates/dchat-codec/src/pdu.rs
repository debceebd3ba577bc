//! Frames and parses the `control/discover` PDU (spec.md §4.B, §6).
//!
//! ```text
//! Version: 1.0
//! Content-Type: control/discover
//! Onion-ID: <sender onion_id>
//! Listen-Port: <sender lport>
//! Nickname: <sender name>
//! Content-Length: <N>
//!
//! <N bytes of payload>
//! ```
//!
//! The payload is zero or more `<onion_id> <port>\n` contact lines.

use std::fmt;

use dchat_core::{is_valid_onion, is_valid_port, Contact, ContactLineError, SelfDescriptor};

use crate::error::CodecError;

/// Currently the only version this codec emits or accepts.
pub const PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion { major: 1, minor: 0 };

/// Content-type identifier for the discover PDU.
pub const CONTENT_TYPE_DISCOVER: &str = "control/discover";

/// Decimal protocol version, e.g. `1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub major: u16,
    pub minor: u16,
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A parsed `control/discover` PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverPdu {
    pub version: ProtocolVersion,
    pub sender_onion_id: String,
    pub sender_lport: u16,
    pub sender_name: String,
    /// Raw payload bytes: zero or more `<onion_id> <port>\n` lines.
    pub content: Vec<u8>,
}

/// Result of `encode_discover`: the framed bytes, plus a count of contacts
/// that failed validation and were skipped rather than aborting the whole
/// PDU (spec.md §7 propagation policy). Callers log the skip count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedDiscover {
    pub bytes: Vec<u8>,
    pub skipped_contacts: usize,
}

/// Renders a single contact as `"<onion_id> <port>\n"`.
///
/// Fails with `InvalidContact` if the onion or port fails validation, or if
/// the contact is still temporary (no `lport` yet — there is nothing valid
/// to advertise).
pub fn contact_to_string(c: &Contact) -> Result<String, CodecError> {
    let Some(port) = c.lport else {
        return Err(CodecError::InvalidContact("contact has no listening port yet"));
    };
    if !is_valid_onion(&c.onion_id) {
        return Err(CodecError::InvalidContact("onion address failed validation"));
    }
    if !is_valid_port(port) {
        return Err(CodecError::InvalidContact("port failed validation"));
    }
    Ok(format!("{} {}\n", c.onion_id, port))
}

/// Parses a single `<onion_id> <port>` line (trailing newline optional, and
/// anything after the first newline is ignored — this lets callers pass
/// either a delimiter-stripped slice or a raw remaining buffer).
///
/// Requires both fields present, a fully-numeric port (no trailing
/// garbage), and both fields passing their respective validators.
pub fn string_to_contact(s: &str) -> Result<(String, u16), ContactLineError> {
    let line = s.split('\n').next().unwrap_or("");
    let mut parts = line.splitn(2, ' ');
    let onion = parts.next().unwrap_or("");
    let port_str = parts.next();

    if onion.is_empty() {
        return Err(ContactLineError::MissingOnion);
    }
    let port_str = match port_str {
        Some(p) if !p.is_empty() => p,
        _ => return Err(ContactLineError::MissingPort),
    };
    if !is_valid_onion(onion) {
        return Err(ContactLineError::BadOnion);
    }
    let port: u16 = port_str.parse().map_err(|_| ContactLineError::BadPort)?;
    if !is_valid_port(port) {
        return Err(ContactLineError::BadPort);
    }
    Ok((onion.to_string(), port))
}

/// Builds a `control/discover` PDU's wire bytes from a sender identity and
/// an iterator of contacts to advertise, in iteration order (not sorted).
/// Contacts that fail to serialize are skipped, not fatal to the PDU.
pub fn encode_discover<'c>(
    sender: &SelfDescriptor,
    contacts: impl IntoIterator<Item = &'c Contact>,
) -> EncodedDiscover {
    let mut payload = Vec::new();
    let mut skipped_contacts = 0usize;
    for c in contacts {
        match contact_to_string(c) {
            Ok(line) => payload.extend_from_slice(line.as_bytes()),
            Err(_) => skipped_contacts += 1,
        }
    }

    let mut bytes = Vec::with_capacity(payload.len() + 128);
    bytes.extend_from_slice(format!("Version: {PROTOCOL_VERSION}\n").as_bytes());
    bytes.extend_from_slice(format!("Content-Type: {CONTENT_TYPE_DISCOVER}\n").as_bytes());
    bytes.extend_from_slice(format!("Onion-ID: {}\n", sender.onion_id).as_bytes());
    bytes.extend_from_slice(format!("Listen-Port: {}\n", sender.lport).as_bytes());
    bytes.extend_from_slice(format!("Nickname: {}\n", sender.name).as_bytes());
    bytes.extend_from_slice(format!("Content-Length: {}\n", payload.len()).as_bytes());
    bytes.push(b'\n');
    bytes.extend_from_slice(&payload);

    EncodedDiscover { bytes, skipped_contacts }
}

/// Returns the position of the next `delim` byte at or after `start` within
/// `pdu.content`, and the slice `[start, end)` (delimiter excluded).
pub fn get_content_part(pdu: &DiscoverPdu, start: usize, delim: u8) -> Result<(usize, &[u8]), CodecError> {
    if start > pdu.content.len() {
        return Err(CodecError::MalformedFrame("start index beyond content"));
    }
    match pdu.content[start..].iter().position(|&b| b == delim) {
        Some(rel) => {
            let end = start + rel;
            Ok((end, &pdu.content[start..end]))
        }
        None => Err(CodecError::MalformedFrame("delimiter not found in content")),
    }
}

/// Parses a complete PDU (header block + exactly `Content-Length` payload
/// bytes) from a byte buffer, the inverse of `encode_discover`.
pub fn parse_frame(bytes: &[u8]) -> Result<DiscoverPdu, CodecError> {
    let mut pos = 0usize;
    let mut version_str = None;
    let mut content_type_ok = false;
    let mut onion_id = None;
    let mut lport = None;
    let mut name = None;
    let mut content_length = None;

    loop {
        let nl = bytes[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .ok_or(CodecError::MalformedFrame("unterminated header line"))?;
        let line_end = pos + nl;
        let line = std::str::from_utf8(&bytes[pos..line_end])
            .map_err(|_| CodecError::MalformedFrame("header line is not valid utf-8"))?;
        pos = line_end + 1;
        if line.is_empty() {
            break;
        }
        let (key, value) = line
            .split_once(": ")
            .ok_or(CodecError::MalformedFrame("malformed header line"))?;
        match key {
            "Version" => version_str = Some(value.to_string()),
            "Content-Type" => content_type_ok = value == CONTENT_TYPE_DISCOVER,
            "Onion-ID" => onion_id = Some(value.to_string()),
            "Listen-Port" => lport = value.parse::<u16>().ok(),
            "Nickname" => name = Some(value.to_string()),
            "Content-Length" => content_length = value.parse::<usize>().ok(),
            _ => {}
        }
    }

    let version_str = version_str.ok_or(CodecError::MalformedFrame("missing Version header"))?;
    if !content_type_ok {
        return Err(CodecError::MalformedFrame("missing or unexpected Content-Type header"));
    }
    let onion_id = onion_id.ok_or(CodecError::MalformedFrame("missing Onion-ID header"))?;
    let lport = lport.ok_or(CodecError::MalformedFrame("missing or invalid Listen-Port header"))?;
    let name = name.ok_or(CodecError::MalformedFrame("missing Nickname header"))?;
    let content_length =
        content_length.ok_or(CodecError::MalformedFrame("missing or invalid Content-Length header"))?;

    if bytes.len() - pos < content_length {
        return Err(CodecError::MalformedFrame("truncated payload"));
    }
    let content = bytes[pos..pos + content_length].to_vec();

    Ok(DiscoverPdu {
        version: parse_version(&version_str)?,
        sender_onion_id: onion_id,
        sender_lport: lport,
        sender_name: name,
        content,
    })
}

fn parse_version(s: &str) -> Result<ProtocolVersion, CodecError> {
    let (major, minor) = s
        .split_once('.')
        .ok_or(CodecError::MalformedFrame("malformed Version header"))?;
    let major = major
        .parse()
        .map_err(|_| CodecError::MalformedFrame("malformed Version header"))?;
    let minor = minor
        .parse()
        .map_err(|_| CodecError::MalformedFrame("malformed Version header"))?;
    Ok(ProtocolVersion { major, minor })
}
