//! `check_duplicates` (spec.md §4.E): resolves the race where two peers dial
//! each other simultaneously and both end up with two slots for the same
//! remote identity.

use dchat_contacts::ContactTable;
use dchat_core::{FindResult, SelfDescriptor};

/// Returns the index of the duplicate slot to delete, or `None` if slot `n`
/// has no duplicate (or no match at all — including the case where `n` is
/// empty).
///
/// The identity tuple comparison (§4.E step 5) is symmetric across peers: it
/// only consults `me`/`c`, never which side happened to accept vs connect,
/// so two independently-running nodes converge on deleting complementary
/// slots (spec.md §8 invariant 7).
pub fn check_duplicates(table: &ContactTable, me: &SelfDescriptor, n: usize) -> Option<usize> {
    let c = table.contact(n)?;

    let fst = match table.find_contact(c, 0, me) {
        FindResult::SelfMatch => return Some(n),
        FindResult::NotFound => return None,
        FindResult::Found(i) => i,
    };
    let sec = table.find_contact(c, fst + 1, me).index()?;

    let fst_contact = table.contact(fst)?;
    let sec_contact = table.contact(sec)?;
    let (accept_slot, connect_slot) = if fst_contact.accepted {
        (fst, sec)
    } else {
        (sec, fst)
    };

    let local_identity = (me.onion_id.as_str(), me.lport);
    let remote_identity = (c.onion_id.as_str(), c.lport.expect("c is an established slot"));

    if local_identity > remote_identity {
        Some(connect_slot)
    } else {
        // Lesser or exactly equal (the "connected to ourselves" case from
        // §4.E step 5, which should not occur in practice) both delete the
        // accept slot.
        Some(accept_slot)
    }
}
