//! FIFO page replacement
//!
//! Resident pages live in an arena of slots indexed by frame number; a
//! queue of frame numbers records admission order. The front of the queue
//! is always the next victim, and a write to a resident page never moves
//! it in the queue.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::error::Result;
use crate::types::{FaultCause, FaultRecord, FrameNumber, PageNumber, Protection};
use crate::vm::pmap::ProtectionController;
use crate::vm::translate::AddressTranslator;

/// A resident page under FIFO
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FifoEntry {
    pub page: PageNumber,
    pub frame: FrameNumber,
    pub protection: Protection,
}

impl FifoEntry {
    /// Page has been written since admission
    pub fn is_dirty(&self) -> bool {
        self.protection == Protection::ReadWrite
    }
}

/// FIFO page table
#[derive(Debug, Clone)]
pub struct FifoTable {
    /// Indexed by frame number
    slots: Vec<FifoEntry>,
    /// Admission order, front is the oldest
    queue: VecDeque<FrameNumber>,
    capacity: usize,
    /// Emit `log` records while resolving
    tracing: bool,
}

impl FifoTable {
    /// Create an empty table for `capacity` frames.
    ///
    /// All storage is reserved here so resolving a fault never allocates.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            queue: VecDeque::with_capacity(capacity),
            capacity,
            tracing: true,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Turn the `log` facade calls made while resolving on or off
    pub fn set_tracing(&mut self, on: bool) {
        self.tracing = on;
    }

    /// Find the frame holding `page`, scanning from the oldest entry
    pub fn find(&self, page: PageNumber) -> Option<FrameNumber> {
        self.queue
            .iter()
            .copied()
            .find(|frame| self.slots[frame.0].page == page)
    }

    /// Entry held in a frame
    pub fn entry(&self, frame: FrameNumber) -> Option<&FifoEntry> {
        self.slots.get(frame.0)
    }

    /// Resident entries in admission order
    pub fn iter(&self) -> impl Iterator<Item = &FifoEntry> + '_ {
        self.queue.iter().map(move |frame| &self.slots[frame.0])
    }

    /// Drop every resident page
    pub fn clear(&mut self) {
        self.slots.clear();
        self.queue.clear();
    }

    /// Resolve one fault on `page`.
    ///
    /// A resident page can only fault on a write, so a hit upgrades it to
    /// read-write. A miss admits the page read-only, evicting the oldest
    /// page first when every frame is taken.
    pub fn resolve<P>(
        &mut self,
        page: PageNumber,
        offset: usize,
        geom: &AddressTranslator,
        pmap: &mut P,
    ) -> Result<FaultRecord>
    where
        P: ProtectionController + ?Sized,
    {
        if let Some(frame) = self.find(page) {
            pmap.set_permission(page, Protection::ReadWrite)?;
            self.slots[frame.0].protection = Protection::ReadWrite;
            return Ok(FaultRecord::resident(
                page,
                FaultCause::FirstWrite,
                geom.physical(frame, offset),
            ));
        }

        let mut evicted = None;
        let mut write_back = false;

        let frame = if !self.is_full() {
            let frame = FrameNumber(self.slots.len());
            self.slots.push(FifoEntry {
                page,
                frame,
                protection: Protection::Read,
            });
            frame
        } else {
            // Capacity is at least one, so a full table has a head.
            let Some(frame) = self.queue.pop_front() else {
                unreachable!("full FIFO table with empty queue");
            };
            let victim = self.slots[frame.0];
            pmap.set_permission(victim.page, Protection::None)?;
            write_back = victim.is_dirty();
            evicted = Some(victim.page);
            if self.tracing {
                log::trace!(
                    "fifo: evict page {} from frame {} (write_back={})",
                    victim.page,
                    frame,
                    write_back
                );
            }
            self.slots[frame.0] = FifoEntry {
                page,
                frame,
                protection: Protection::Read,
            };
            frame
        };
        self.queue.push_back(frame);

        pmap.set_permission(page, Protection::Read)?;

        Ok(FaultRecord::miss(
            page,
            evicted,
            write_back,
            geom.physical(frame, offset),
        ))
    }
}
