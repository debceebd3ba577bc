use std::num::NonZeroU64;

/// Bounded length for a contact's display handle (spec.md §3: "bounded length").
pub const MAX_NAME_LEN: usize = 64;

/// Opaque connection handle minted by a `PeerTransport` (the "fd" of
/// spec.md). Always nonzero by construction, so "fd > 0" is a type-level
/// invariant rather than a runtime check at `add_contact`'s call sites.
pub type ConnectionId = NonZeroU64;

/// A peer record. See spec.md §3 for the full invariant description.
///
/// An "empty slot" simply doesn't exist as a `Contact` here — see [`Slot`].
/// The temporary/established distinction is `lport: None`/`Some(_)` instead
/// of a `0` sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    /// Fixed-length textual onion address. Empty until the first discover
    /// PDU from this peer establishes identity.
    pub onion_id: String,
    /// TCP listening port of the peer, once known. `None` means temporary:
    /// the connection is open but no discover PDU has arrived yet.
    pub lport: Option<u16>,
    /// Display handle, bounded to `MAX_NAME_LEN` bytes.
    pub name: String,
    /// The active socket handle for this slot.
    pub fd: ConnectionId,
    /// `true` if this slot was created from an inbound accept, `false` if
    /// from an outbound dial.
    pub accepted: bool,
}

impl Contact {
    /// A freshly accepted/dialed connection with no identity yet (temporary).
    pub fn pending(fd: ConnectionId, accepted: bool) -> Self {
        Self {
            onion_id: String::new(),
            lport: None,
            name: String::new(),
            fd,
            accepted,
        }
    }

    /// `true` if a discover PDU has established this peer's identity.
    pub fn is_established(&self) -> bool {
        self.lport.is_some()
    }

    /// Mutates `onion_id`/`lport`/`name` in place, transitioning a pending
    /// slot to established. Per spec.md §3, these fields are "mutated once
    /// when the first discovery PDU arrives"; callers are expected to only
    /// invoke this on a slot that is still temporary, though re-invoking is
    /// harmless (idempotent overwrite).
    pub fn establish(&mut self, onion_id: impl Into<String>, lport: u16, name: impl Into<String>) {
        self.onion_id = onion_id.into();
        self.lport = Some(lport);
        let mut name = name.into();
        name.truncate(MAX_NAME_LEN);
        self.name = name;
    }

    /// Compares identity by the `(onion_id, lport)` pair directly, avoiding
    /// a string-rendering allocation (spec.md §9 design note (c)). Temporary
    /// contacts (`lport == None`) never match anything, matching §4.C's
    /// "temporary slots are skipped".
    pub fn same_identity(&self, other: &Contact) -> bool {
        match (self.lport, other.lport) {
            (Some(a), Some(b)) => a == b && self.onion_id == other.onion_id,
            _ => false,
        }
    }

    /// Compares identity against a self-descriptor using the same rule.
    pub fn matches_self(&self, me: &SelfDescriptor) -> bool {
        match self.lport {
            Some(port) => port == me.lport && self.onion_id == me.onion_id,
            None => false,
        }
    }
}

/// A table slot: empty, or occupied by a (possibly temporary) contact.
///
/// Representing emptiness as its own variant (rather than a zeroed
/// `Contact`) makes spec.md §8 invariant 1 ("a slot with fd == 0 has all
/// other fields zero") true by construction.
#[derive(Debug, Clone)]
pub enum Slot {
    Empty,
    Occupied(Contact),
}

impl Slot {
    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }

    pub fn as_contact(&self) -> Option<&Contact> {
        match self {
            Slot::Empty => None,
            Slot::Occupied(c) => Some(c),
        }
    }

    pub fn as_contact_mut(&mut self) -> Option<&mut Contact> {
        match self {
            Slot::Empty => None,
            Slot::Occupied(c) => Some(c),
        }
    }
}

/// The local node's own identity. Never a member of the contact table;
/// used by the duplicate resolver and filtered out during lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfDescriptor {
    pub onion_id: String,
    pub lport: u16,
    pub name: String,
}

/// Outcome of `ContactTable::find_contact` (spec.md §4.C).
///
/// A proper enum instead of `-1`/`-2` sentinel indices: same information, no
/// risk of a sentinel colliding with a real index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindResult {
    /// Matched a live slot at this index.
    Found(usize),
    /// Matched the local node's own self-descriptor.
    SelfMatch,
    /// No match.
    NotFound,
}

impl FindResult {
    pub fn index(self) -> Option<usize> {
        match self {
            FindResult::Found(i) => Some(i),
            _ => None,
        }
    }
}
