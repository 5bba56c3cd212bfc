//! Address translation
//!
//! Splits an address of the reserved range into (virtual page, offset)
//! and maps (frame, offset) back to an emulated physical address.

use crate::config::MmuConfig;
use crate::types::{FrameNumber, PageNumber};

/// Geometry of the reserved range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressTranslator {
    base: usize,
    page_size: usize,
    pages: usize,
}

impl AddressTranslator {
    pub const fn new(base: usize, page_size: usize, pages: usize) -> Self {
        Self {
            base,
            page_size,
            pages,
        }
    }

    pub const fn from_config(config: &MmuConfig) -> Self {
        Self::new(config.base, config.page_size, config.pages())
    }

    /// Split a faulting address into page number and in-page offset.
    ///
    /// The address must lie inside the range; callers route only
    /// in-range faults here.
    pub const fn translate(&self, addr: usize) -> (PageNumber, usize) {
        let rel = addr - self.base;
        (PageNumber(rel / self.page_size), rel % self.page_size)
    }

    /// First address of a virtual page
    pub const fn page_base(&self, page: PageNumber) -> usize {
        self.base + page.0 * self.page_size
    }

    /// Emulated physical address of an offset within a frame
    pub const fn physical(&self, frame: FrameNumber, offset: usize) -> usize {
        frame.0 * self.page_size + offset
    }

    pub const fn contains(&self, addr: usize) -> bool {
        addr >= self.base && (addr - self.base) / self.page_size < self.pages
    }

    pub const fn base(&self) -> usize {
        self.base
    }

    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    pub const fn pages(&self) -> usize {
        self.pages
    }
}
