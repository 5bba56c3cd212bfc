//! VM Fault - fault dispatch
//!
//! `Mmu` is the owned engine state: range geometry, the page table of the
//! selected policy and fault statistics. The host's trap mechanism calls
//! [`Mmu::handle_fault`] once per protection fault; the call runs to
//! completion, adjusts protections through the pmap, and hands at most one
//! record to the fault logger.

use alloc::vec::Vec;

use crate::config::{MmuConfig, Policy};
use crate::error::Result;
use crate::logger::FaultLogger;
use crate::types::{FaultCause, FaultRecord, FrameNumber, PageNumber, Protection};
use crate::vm::fifo::FifoTable;
use crate::vm::pmap::ProtectionController;
use crate::vm::third_chance::ThirdChanceTable;
use crate::vm::translate::AddressTranslator;

// ============================================================================
// Fault Statistics
// ============================================================================

/// Fault counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultStats {
    /// Faults delivered to the engine
    pub faults: u64,
    /// Admissions
    pub misses: u64,
    /// First writes to clean pages
    pub first_writes: u64,
    /// Reference reacquisitions
    pub reacquires: u64,
    /// Admissions that replaced a resident page
    pub evictions: u64,
    /// Evictions of dirty pages
    pub write_backs: u64,
    /// Reference clears done by clock scans
    pub demotions: u64,
}

impl FaultStats {
    fn record(&mut self, record: &FaultRecord) {
        match record.cause {
            FaultCause::Miss => self.misses += 1,
            FaultCause::FirstWrite => self.first_writes += 1,
            FaultCause::ReferenceReacquire => self.reacquires += 1,
        }
        if record.evicted_page.is_some() {
            self.evictions += 1;
        }
        if record.write_back {
            self.write_backs += 1;
        }
    }
}

// ============================================================================
// Policy Tables
// ============================================================================

/// Page table of the selected replacement policy
#[derive(Debug, Clone)]
pub enum PageTable {
    Fifo(FifoTable),
    ThirdChance(ThirdChanceTable),
}

impl PageTable {
    fn new(policy: Policy, frames: usize) -> Self {
        match policy {
            Policy::Fifo => PageTable::Fifo(FifoTable::new(frames)),
            Policy::ThirdChance => PageTable::ThirdChance(ThirdChanceTable::new(frames)),
        }
    }

    pub fn policy(&self) -> Policy {
        match self {
            PageTable::Fifo(_) => Policy::Fifo,
            PageTable::ThirdChance(_) => Policy::ThirdChance,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PageTable::Fifo(t) => t.len(),
            PageTable::ThirdChance(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self) {
        match self {
            PageTable::Fifo(t) => t.clear(),
            PageTable::ThirdChance(t) => t.clear(),
        }
    }

    fn set_tracing(&mut self, on: bool) {
        match self {
            PageTable::Fifo(t) => t.set_tracing(on),
            PageTable::ThirdChance(t) => t.set_tracing(on),
        }
    }
}

// ============================================================================
// MMU
// ============================================================================

/// A resident page as seen from outside the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResidentPage {
    pub page: PageNumber,
    pub frame: FrameNumber,
    pub protection: Protection,
}

/// Fault-resolution engine for one reserved range
#[derive(Debug, Clone)]
pub struct Mmu {
    config: MmuConfig,
    geom: AddressTranslator,
    table: PageTable,
    stats: FaultStats,
    /// Emit `log` records from `handle_fault`
    tracing: bool,
}

impl Mmu {
    /// Build an engine without touching any protections.
    ///
    /// Use [`Mmu::init`] unless the range is already fully revoked.
    pub fn new(config: &MmuConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: *config,
            geom: AddressTranslator::from_config(config),
            table: PageTable::new(config.policy, config.frame_count),
            stats: FaultStats::default(),
            tracing: true,
        })
    }

    /// Validate `config`, revoke every page through `pmap` and return an
    /// empty engine. No page is resident afterwards.
    pub fn init<P>(config: &MmuConfig, pmap: &mut P) -> Result<Self>
    where
        P: ProtectionController + ?Sized,
    {
        let mmu = Self::new(config)?;
        pmap.revoke_all()?;
        log::info!(
            "mmu: {} pages of {} bytes at {:#x}, {} frames, policy {}",
            config.pages(),
            config.page_size,
            config.base,
            config.frame_count,
            config.policy
        );
        Ok(mmu)
    }

    /// Resolve a protection fault at `addr`.
    ///
    /// `addr` must lie inside the range. Returns the record handed to
    /// `logger`, if the fault produced one. Errors come only from the pmap
    /// and leave the engine in an unspecified state.
    pub fn handle_fault<P, L>(
        &mut self,
        addr: usize,
        pmap: &mut P,
        logger: &mut L,
    ) -> Result<Option<FaultRecord>>
    where
        P: ProtectionController + ?Sized,
        L: FaultLogger + ?Sized,
    {
        debug_assert!(self.geom.contains(addr), "fault outside reserved range");

        let (page, offset) = self.geom.translate(addr);
        self.stats.faults += 1;

        let record = match &mut self.table {
            PageTable::Fifo(table) => Some(table.resolve(page, offset, &self.geom, pmap)?),
            PageTable::ThirdChance(table) => table.resolve(page, offset, &self.geom, pmap)?,
        };

        if let Some(record) = &record {
            self.stats.record(record);
            if self.tracing {
                log::debug!("fault: {}", record);
            }
            logger.log_fault(record);
        }

        Ok(record)
    }

    /// Forget every resident page and zero the counters.
    ///
    /// Protections are not touched; pair with `ProtectionController::revoke_all`.
    pub fn reset(&mut self) {
        self.table.clear();
        self.stats = FaultStats::default();
    }

    /// Turn the `log` facade calls on the fault path on or off.
    ///
    /// A `log::Log` implementation may allocate or lock, so a signal
    /// handler must run the engine with tracing off. Records still reach
    /// the `FaultLogger` and the counters.
    pub fn set_tracing(&mut self, on: bool) {
        self.tracing = on;
        self.table.set_tracing(on);
    }

    pub fn tracing(&self) -> bool {
        self.tracing
    }

    pub fn config(&self) -> &MmuConfig {
        &self.config
    }

    pub fn policy(&self) -> Policy {
        self.config.policy
    }

    pub fn translator(&self) -> &AddressTranslator {
        &self.geom
    }

    pub fn table(&self) -> &PageTable {
        &self.table
    }

    /// Number of resident pages
    pub fn resident(&self) -> usize {
        self.table.len()
    }

    /// Resident pages, in eviction order for FIFO and ring order otherwise
    pub fn resident_pages(&self) -> Vec<ResidentPage> {
        match &self.table {
            PageTable::Fifo(t) => t
                .iter()
                .map(|e| ResidentPage {
                    page: e.page,
                    frame: e.frame,
                    protection: e.protection,
                })
                .collect(),
            PageTable::ThirdChance(t) => t
                .iter()
                .map(|e| ResidentPage {
                    page: e.page,
                    frame: e.frame,
                    protection: e.protection,
                })
                .collect(),
        }
    }

    /// Third-chance table, when that policy is selected
    pub fn third_chance(&self) -> Option<&ThirdChanceTable> {
        match &self.table {
            PageTable::ThirdChance(t) => Some(t),
            PageTable::Fifo(_) => None,
        }
    }

    /// Current counters
    pub fn stats(&self) -> FaultStats {
        let mut stats = self.stats;
        if let PageTable::ThirdChance(t) = &self.table {
            stats.demotions = t.demotions();
        }
        stats
    }
}
