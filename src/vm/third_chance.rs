//! Third-chance page replacement (enhanced clock)
//!
//! Resident pages sit in a ring of slots indexed by frame number. A clock
//! hand persists across faults and resumes each eviction scan where the
//! last one stopped.
//!
//! Every page carries a reference state and a modified bit. Reference
//! state is tracked in software: when the scan clears it, the page's
//! protection is revoked too, so the next touch traps and reacquires it.
//!
//! ```text
//!  reference  modified  on scan
//!  Fresh      any       -> Cleared, revoke access, advance
//!  Cleared    clean     evict
//!  Cleared    dirty     -> Reprieved, advance
//!  Reprieved  dirty     evict with write-back
//! ```
//!
//! A clean page survives one pass, a dirty page two, so every scan ends
//! within two full turns of the ring.

use alloc::vec::Vec;

use crate::error::Result;
use crate::types::{FaultCause, FaultRecord, FrameNumber, PageNumber, Protection};
use crate::vm::pmap::ProtectionController;
use crate::vm::translate::AddressTranslator;

/// Software reference state of a resident page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reference {
    /// Touched since the hand last passed
    Fresh,
    /// Hand passed once without a touch in between
    Cleared,
    /// Dirty page that already used its extra pass
    Reprieved,
}

/// A resident page under third-chance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockEntry {
    pub page: PageNumber,
    pub frame: FrameNumber,
    pub protection: Protection,
    pub reference: Reference,
    pub modified: bool,
}

impl ClockEntry {
    fn admitted(page: PageNumber, frame: FrameNumber) -> Self {
        Self {
            page,
            frame,
            protection: Protection::Read,
            reference: Reference::Fresh,
            modified: false,
        }
    }
}

/// What the hand does with the slot it is looking at
enum ScanStep {
    Evict { write_back: bool },
    Demote,
    Reprieve,
}

impl ScanStep {
    fn for_entry(entry: &ClockEntry) -> Self {
        match (entry.reference, entry.modified) {
            // Reprieved is only entered while dirty and modified is only
            // cleared by replacement, so (Reprieved, clean) cannot occur.
            (Reference::Cleared, false) | (Reference::Reprieved, false) => {
                ScanStep::Evict { write_back: false }
            }
            (Reference::Reprieved, true) => ScanStep::Evict { write_back: true },
            (Reference::Fresh, _) => ScanStep::Demote,
            (Reference::Cleared, true) => ScanStep::Reprieve,
        }
    }
}

/// Third-chance page table
#[derive(Debug, Clone)]
pub struct ThirdChanceTable {
    /// Ring of resident pages, indexed by frame number
    slots: Vec<ClockEntry>,
    /// Clock hand, a slot index
    hand: usize,
    capacity: usize,
    /// Slots visited by the most recent eviction scan
    last_scan: usize,
    /// Total Fresh -> Cleared transitions
    demotions: u64,
    /// Emit `log` records while resolving
    tracing: bool,
}

impl ThirdChanceTable {
    /// Create an empty table for `capacity` frames
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            hand: 0,
            capacity,
            last_scan: 0,
            demotions: 0,
            tracing: true,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Turn the `log` facade calls made while resolving on or off
    pub fn set_tracing(&mut self, on: bool) {
        self.tracing = on;
    }

    /// Slot the next eviction scan starts from
    pub fn hand(&self) -> usize {
        self.hand
    }

    /// Number of slots the last eviction scan visited, victim included
    pub fn last_scan(&self) -> usize {
        self.last_scan
    }

    /// Total reference clears performed by eviction scans
    pub fn demotions(&self) -> u64 {
        self.demotions
    }

    /// Slot index of a resident page, scanning once from slot 0
    pub fn find(&self, page: PageNumber) -> Option<usize> {
        self.slots.iter().position(|e| e.page == page)
    }

    /// Resident entry for `page`
    pub fn entry(&self, page: PageNumber) -> Option<&ClockEntry> {
        self.find(page).map(|slot| &self.slots[slot])
    }

    /// Resident entries in ring order
    pub fn iter(&self) -> impl Iterator<Item = &ClockEntry> + '_ {
        self.slots.iter()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.hand = 0;
        self.last_scan = 0;
        self.demotions = 0;
    }

    /// Resolve one fault on `page`.
    ///
    /// Returns the record to emit, or `None` for a write to a page whose
    /// first write was already reported.
    pub fn resolve<P>(
        &mut self,
        page: PageNumber,
        offset: usize,
        geom: &AddressTranslator,
        pmap: &mut P,
    ) -> Result<Option<FaultRecord>>
    where
        P: ProtectionController + ?Sized,
    {
        if let Some(slot) = self.find(page) {
            return self.resolve_resident(slot, offset, geom, pmap);
        }

        pmap.set_permission(page, Protection::Read)?;

        if !self.is_full() {
            let frame = FrameNumber(self.slots.len());
            self.slots.push(ClockEntry::admitted(page, frame));
            return Ok(Some(FaultRecord::miss(
                page,
                None,
                false,
                geom.physical(frame, offset),
            )));
        }

        let (slot, write_back) = self.select_victim(pmap)?;
        let victim = self.slots[slot];
        pmap.set_permission(victim.page, Protection::None)?;
        self.hand = (slot + 1) % self.slots.len();
        self.slots[slot] = ClockEntry::admitted(page, victim.frame);

        if self.tracing {
            log::trace!(
                "third-chance: evict page {} from frame {} after {} steps (write_back={})",
                victim.page,
                victim.frame,
                self.last_scan,
                write_back
            );
        }

        Ok(Some(FaultRecord::miss(
            page,
            Some(victim.page),
            write_back,
            geom.physical(victim.frame, offset),
        )))
    }

    fn resolve_resident<P>(
        &mut self,
        slot: usize,
        offset: usize,
        geom: &AddressTranslator,
        pmap: &mut P,
    ) -> Result<Option<FaultRecord>>
    where
        P: ProtectionController + ?Sized,
    {
        let entry = &mut self.slots[slot];
        let phys = geom.physical(entry.frame, offset);

        if entry.protection == Protection::None {
            // Touched after a scan revoked it: reacquire read access only,
            // a pending write faults again and lands in the branch below.
            pmap.set_permission(entry.page, Protection::Read)?;
            entry.reference = Reference::Fresh;
            entry.protection = Protection::Read;
            return Ok(Some(FaultRecord::resident(
                entry.page,
                FaultCause::ReferenceReacquire,
                phys,
            )));
        }

        pmap.set_permission(entry.page, Protection::ReadWrite)?;
        let first_write = !entry.modified;
        entry.reference = Reference::Fresh;
        entry.modified = true;
        entry.protection = Protection::ReadWrite;

        Ok(first_write.then(|| FaultRecord::resident(entry.page, FaultCause::FirstWrite, phys)))
    }

    /// Run the hand until it stops on an evictable slot.
    ///
    /// Leaves the hand on the victim; the caller advances it.
    fn select_victim<P>(&mut self, pmap: &mut P) -> Result<(usize, bool)>
    where
        P: ProtectionController + ?Sized,
    {
        let len = self.slots.len();
        let mut steps = 0;

        loop {
            steps += 1;
            debug_assert!(steps <= 2 * len + 1, "clock scan did not terminate");

            let entry = &mut self.slots[self.hand];
            match ScanStep::for_entry(entry) {
                ScanStep::Evict { write_back } => {
                    self.last_scan = steps;
                    return Ok((self.hand, write_back));
                }
                ScanStep::Demote => {
                    pmap.set_permission(entry.page, Protection::None)?;
                    entry.reference = Reference::Cleared;
                    entry.protection = Protection::None;
                    self.demotions += 1;
                    if self.tracing {
                        log::trace!("third-chance: clear page {}", entry.page);
                    }
                }
                ScanStep::Reprieve => {
                    entry.reference = Reference::Reprieved;
                    if self.tracing {
                        log::trace!("third-chance: reprieve dirty page {}", entry.page);
                    }
                }
            }

            self.hand = (self.hand + 1) % len;
        }
    }
}
