//! DChat wire codec: frames and parses the `control/discover` PDU.

pub mod error;
pub mod pdu;

pub use error::CodecError;
pub use pdu::{
    contact_to_string, encode_discover, get_content_part, parse_frame, string_to_contact,
    DiscoverPdu, EncodedDiscover, ProtocolVersion, CONTENT_TYPE_DISCOVER, PROTOCOL_VERSION,
};
