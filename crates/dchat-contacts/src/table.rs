//! The contact table: an ordered slotted array of [`Contact`]s with a
//! grow/shrink policy driven by a fixed step (spec.md §3, §4.C).

use dchat_core::{Contact, ConnectionId, DChatError, FindResult, SelfDescriptor, Slot};

/// Grow/shrink step used when no explicit value is supplied to
/// [`ContactTable::new`]. Spec.md §3: "reference implementation uses a
/// small integer such as 4".
pub const DEFAULT_INIT_CONTACTS: usize = 4;

/// An ordered slotted array of contacts. See spec.md §3 for the full
/// invariant description; §9 explains why this uses a `Slot` enum instead
/// of a zeroed-struct sentinel.
#[derive(Debug)]
pub struct ContactTable {
    slots: Vec<Slot>,
    used_contacts: usize,
    init_contacts: usize,
}

impl Default for ContactTable {
    fn default() -> Self {
        Self::new(DEFAULT_INIT_CONTACTS)
    }
}

impl ContactTable {
    /// Creates an empty table of capacity `init_contacts`, which also
    /// becomes the fixed grow/shrink step for this table's lifetime.
    ///
    /// # Panics
    /// Panics if `init_contacts < 1` — a table with a zero grow step could
    /// never grow past its initial (also zero) capacity.
    pub fn new(init_contacts: usize) -> Self {
        assert!(init_contacts >= 1, "init_contacts must be >= 1");
        Self {
            slots: (0..init_contacts).map(|_| Slot::Empty).collect(),
            used_contacts: 0,
            init_contacts,
        }
    }

    /// Current capacity (`cl_size` in spec.md).
    pub fn cl_size(&self) -> usize {
        self.slots.len()
    }

    /// Current population (`used_contacts` in spec.md).
    pub fn used_contacts(&self) -> usize {
        self.used_contacts
    }

    pub fn init_contacts(&self) -> usize {
        self.init_contacts
    }

    pub fn slot(&self, i: usize) -> Option<&Slot> {
        self.slots.get(i)
    }

    pub fn contact(&self, i: usize) -> Option<&Contact> {
        self.slots.get(i)?.as_contact()
    }

    pub fn contact_mut(&mut self, i: usize) -> Option<&mut Contact> {
        self.slots.get_mut(i)?.as_contact_mut()
    }

    /// Iterates established (non-temporary) contacts with their indices.
    pub fn iter_established(&self) -> impl Iterator<Item = (usize, &Contact)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.as_contact()
                .filter(|c| c.is_established())
                .map(|c| (i, c))
        })
    }

    /// Inserts a new slot for a freshly opened connection.
    ///
    /// Grows the table by `init_contacts` first if it's full. `accepted`
    /// records whether this connection came from an inbound accept (`true`)
    /// or an outbound dial (`false`) — spec.md §3's `accepted` field, known
    /// at connection-open time by the caller.
    pub fn add_contact(&mut self, fd: ConnectionId, accepted: bool) -> Result<usize, DChatError> {
        if self.used_contacts == self.cl_size() {
            self.resize_unchecked(self.cl_size() + self.init_contacts)?;
        }
        let idx = self
            .slots
            .iter()
            .position(Slot::is_empty)
            .expect("grew table or had a free slot");
        self.slots[idx] = Slot::Occupied(Contact::pending(fd, accepted));
        self.used_contacts += 1;
        Ok(idx)
    }

    /// Removes the contact at `i`, if any, returning the freed connection id
    /// so the caller can close it. Per spec.md §9(a), there is no "only free
    /// when nonempty" special case — an empty slot is simply a no-op.
    ///
    /// Shrinks the table by `init_contacts` if the deletion brought
    /// `used_contacts` down to exactly `cl_size - init_contacts` (and the
    /// table isn't now empty).
    pub fn del_contact(&mut self, i: usize) -> Result<Option<ConnectionId>, DChatError> {
        if i >= self.cl_size() {
            return Err(DChatError::IndexOutOfBounds { index: i, size: self.cl_size() });
        }
        if self.slots[i].is_empty() {
            return Ok(None);
        }
        let Slot::Occupied(contact) = std::mem::replace(&mut self.slots[i], Slot::Empty) else {
            unreachable!("checked non-empty above");
        };
        self.used_contacts -= 1;

        if self.used_contacts != 0 && self.used_contacts == self.cl_size() - self.init_contacts {
            self.resize_unchecked(self.cl_size() - self.init_contacts)?;
        }
        Ok(Some(contact.fd))
    }

    /// Searches for a slot whose identity matches `c`, comparing the
    /// `(onion_id, lport)` tuple directly (spec.md §9 design note (c)).
    /// Temporary slots are never matched. Checks the self-descriptor first;
    /// `begin` outside `[0, cl_size)` is `NotFound`, not an error.
    pub fn find_contact(&self, c: &Contact, begin: usize, me: &SelfDescriptor) -> FindResult {
        if c.matches_self(me) {
            return FindResult::SelfMatch;
        }
        if begin >= self.cl_size() {
            return FindResult::NotFound;
        }
        for (idx, slot) in self.slots.iter().enumerate().skip(begin) {
            if let Some(candidate) = slot.as_contact() {
                if candidate.is_established() && candidate.same_identity(c) {
                    return FindResult::Found(idx);
                }
            }
        }
        FindResult::NotFound
    }

    /// Explicit resize to `newsize`. Fails if `newsize < 1` or `newsize` is
    /// smaller than the current live population.
    pub fn resize(&mut self, newsize: usize) -> Result<(), DChatError> {
        if newsize < 1 || newsize < self.used_contacts {
            return Err(DChatError::InvalidSize { requested: newsize, used: self.used_contacts });
        }
        self.resize_unchecked(newsize)
    }

    /// Allocates a table of `newsize` slots and compacts all live (occupied)
    /// slots into its prefix, preserving their original relative order.
    /// Invalidates every previously returned index.
    fn resize_unchecked(&mut self, newsize: usize) -> Result<(), DChatError> {
        let mut new_slots: Vec<Slot> = Vec::new();
        new_slots.try_reserve_exact(newsize).map_err(|_| DChatError::OutOfMemory)?;
        for slot in self.slots.drain(..) {
            if let Slot::Occupied(c) = slot {
                new_slots.push(Slot::Occupied(c));
            }
        }
        new_slots.resize_with(newsize, || Slot::Empty);
        self.slots = new_slots;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU64;

    fn fd(n: u64) -> ConnectionId {
        NonZeroU64::new(n).unwrap()
    }

    fn me() -> SelfDescriptor {
        SelfDescriptor {
            onion_id: "meeeeeeeeeeeeeeee.onion".to_string(),
            lport: 1234,
            name: "me".to_string(),
        }
    }

    fn established(table: &mut ContactTable, idx: usize, onion: &str, port: u16) {
        table.contact_mut(idx).unwrap().establish(onion, port, "n");
    }

    #[test]
    fn new_table_starts_empty() {
        let table = ContactTable::new(4);
        assert_eq!(table.cl_size(), 4);
        assert_eq!(table.used_contacts(), 0);
        for i in 0..4 {
            assert!(table.slot(i).unwrap().is_empty());
        }
    }

    #[test]
    fn add_contact_fills_first_empty_slot() {
        let mut table = ContactTable::new(4);
        let i0 = table.add_contact(fd(1), true).unwrap();
        assert_eq!(i0, 0);
        assert_eq!(table.used_contacts(), 1);
        assert!(table.contact(0).unwrap().accepted);
    }

    #[test]
    fn add_contact_grows_when_full() {
        let mut table = ContactTable::new(4);
        for i in 1..=4 {
            table.add_contact(fd(i), false).unwrap();
        }
        assert_eq!(table.cl_size(), 4);
        assert_eq!(table.used_contacts(), 4);

        let idx = table.add_contact(fd(5), false).unwrap();
        assert_eq!(table.cl_size(), 8);
        assert_eq!(table.used_contacts(), 5);
        assert_eq!(idx, 4);
    }

    #[test]
    fn del_contact_on_empty_slot_is_a_noop() {
        let mut table = ContactTable::new(4);
        assert_eq!(table.del_contact(0).unwrap(), None);
        assert_eq!(table.used_contacts(), 0);
    }

    #[test]
    fn del_contact_frees_slot_and_returns_fd() {
        let mut table = ContactTable::new(4);
        let i0 = table.add_contact(fd(7), true).unwrap();
        let freed = table.del_contact(i0).unwrap();
        assert_eq!(freed, Some(fd(7)));
        assert_eq!(table.used_contacts(), 0);
        assert!(table.slot(i0).unwrap().is_empty());
    }

    #[test]
    fn del_contact_out_of_bounds_is_an_error() {
        let mut table = ContactTable::new(4);
        assert!(matches!(
            table.del_contact(99),
            Err(DChatError::IndexOutOfBounds { index: 99, size: 4 })
        ));
    }

    /// A resize (including the one triggered by shrinking) invalidates
    /// every previously returned index, so this helper re-finds a slot by
    /// its connection id rather than trusting a cached index.
    fn index_of(table: &ContactTable, target: ConnectionId) -> usize {
        (0..table.cl_size())
            .find(|&i| table.contact(i).map(|c| c.fd) == Some(target))
            .expect("fd present in table")
    }

    #[test]
    fn grow_then_shrink_preserves_remaining_peer_in_slot_zero() {
        let mut table = ContactTable::new(4);
        for i in 1..=5u64 {
            table.add_contact(fd(i), false).unwrap();
        }
        assert_eq!(table.cl_size(), 8);
        assert_eq!(table.used_contacts(), 5);

        // Delete 4 of the 5, keeping the first one added (fd 1).
        for i in 2..=5u64 {
            let idx = index_of(&table, fd(i));
            table.del_contact(idx).unwrap();
        }
        assert_eq!(table.used_contacts(), 1);
        assert_eq!(table.cl_size(), 4);
        assert_eq!(table.contact(0).unwrap().fd, fd(1));
    }

    #[test]
    fn resize_rejects_too_small_or_below_used() {
        let mut table = ContactTable::new(4);
        table.add_contact(fd(1), true).unwrap();
        assert!(table.resize(0).is_err());
        // used_contacts is 1, so shrinking to 0 contacts worth of capacity fails too.
        table.add_contact(fd(2), true).unwrap();
        assert!(table.resize(1).is_err());
        assert!(table.resize(2).is_ok());
        assert_eq!(table.cl_size(), 2);
    }

    #[test]
    fn resize_preserves_relative_order_of_live_slots() {
        let mut table = ContactTable::new(4);
        let i0 = table.add_contact(fd(1), true).unwrap();
        let _i1 = table.add_contact(fd(2), true).unwrap();
        let i2 = table.add_contact(fd(3), true).unwrap();
        table.del_contact(i0).unwrap();
        table.resize(4).unwrap();
        // slot 2's old occupant was at relative position 1 among live slots
        // (fd 2 was first, then fd 3); after compaction they keep that order.
        assert_eq!(table.contact(0).unwrap().fd, fd(2));
        assert_eq!(table.contact(1).unwrap().fd, fd(3));
        let _ = i2;
    }

    #[test]
    fn find_contact_matches_self_first() {
        let mut table = ContactTable::new(4);
        table.add_contact(fd(1), true).unwrap();
        established(&mut table, 0, "aaaaaaaaaaaaaaaa.onion", 9000);

        let mut needle = Contact::pending(fd(99), false);
        needle.establish(me().onion_id, me().lport, "x");
        assert_eq!(table.find_contact(&needle, 0, &me()), FindResult::SelfMatch);
    }

    #[test]
    fn find_contact_skips_temporary_slots() {
        let mut table = ContactTable::new(4);
        table.add_contact(fd(1), true).unwrap(); // stays temporary

        let mut needle = Contact::pending(fd(99), false);
        needle.establish("aaaaaaaaaaaaaaaa.onion", 9000, "x");
        assert_eq!(table.find_contact(&needle, 0, &me()), FindResult::NotFound);
    }

    #[test]
    fn find_contact_returns_first_match_from_begin() {
        let mut table = ContactTable::new(4);
        table.add_contact(fd(1), true).unwrap();
        table.add_contact(fd(2), true).unwrap();
        established(&mut table, 0, "aaaaaaaaaaaaaaaa.onion", 9000);
        established(&mut table, 1, "aaaaaaaaaaaaaaaa.onion", 9000);

        let mut needle = Contact::pending(fd(99), false);
        needle.establish("aaaaaaaaaaaaaaaa.onion", 9000, "x");
        assert_eq!(table.find_contact(&needle, 0, &me()), FindResult::Found(0));
        assert_eq!(table.find_contact(&needle, 1, &me()), FindResult::Found(1));
        assert_eq!(table.find_contact(&needle, 2, &me()), FindResult::NotFound);
    }

    #[test]
    fn find_contact_begin_out_of_range_is_not_found() {
        let table = ContactTable::new(4);
        let mut needle = Contact::pending(fd(99), false);
        needle.establish("aaaaaaaaaaaaaaaa.onion", 9000, "x");
        assert_eq!(table.find_contact(&needle, 10, &me()), FindResult::NotFound);
    }
}
