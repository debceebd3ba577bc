//! Pure well-formedness predicates for onion addresses and ports.
//!
//! These never fail; they return `bool`. Callers decide what to do with a
//! `false` (log and skip, per spec.md §7's propagation policy).

/// Onion address grammar targeted by this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnionVersion {
    /// 16 base32 characters + `.onion` (22 chars total).
    V2,
    /// 56 base32 characters + `.onion` (62 chars total).
    V3,
}

const ONION_SUFFIX: &str = ".onion";

impl OnionVersion {
    const fn label_len(self) -> usize {
        match self {
            OnionVersion::V2 => 16,
            OnionVersion::V3 => 56,
        }
    }
}

/// RFC 4648 base32 alphabet, case-insensitive, used by onion addresses.
fn is_base32_char(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '2'..='7')
}

/// True iff `s` is exactly `<label>.onion` for the given onion version: a
/// fixed-length run of base32 characters followed by the literal `.onion`
/// suffix. The core treats the label itself as opaque.
pub fn is_valid_onion_versioned(s: &str, version: OnionVersion) -> bool {
    let Some(label) = s.strip_suffix(ONION_SUFFIX) else {
        return false;
    };
    label.len() == version.label_len() && label.chars().all(is_base32_char)
}

/// `is_valid_onion` against the canonical v2 form (spec.md §6's default).
pub fn is_valid_onion(s: &str) -> bool {
    is_valid_onion_versioned(s, OnionVersion::V2)
}

/// True iff `1 <= p <= 65535`. `p` is already a `u16`, so only the lower
/// bound needs checking; port `0` is reserved for "unknown listening port"
/// (the temporary-slot marker) and is never a valid advertised port.
pub fn is_valid_port(p: u16) -> bool {
    p >= 1
}
