//! Simulated host
//!
//! Stands in for the hardware trap: an access is checked against a
//! [`SoftPmap`], and while it would fault the engine is invoked and the
//! access retried, exactly as a faulting instruction re-executes after the
//! signal handler returns.

use crate::config::MmuConfig;
use crate::error::{MmuError, Result};
use crate::logger::FaultLogger;
use crate::types::{Access, PageNumber};
use crate::vm::fault::Mmu;
use crate::vm::pmap::SoftPmap;

/// Faults one access may take before it is considered stuck.
///
/// The worst legitimate case is two faults: a write to a non-resident page
/// (miss, then upgrade) or to a revoked resident page (reacquire, then
/// upgrade).
pub const MAX_FAULTS_PER_ACCESS: u32 = 2;

/// Engine, permission table and logger wired together
#[derive(Debug)]
pub struct SimHost<L> {
    mmu: Mmu,
    pmap: SoftPmap,
    logger: L,
    /// Accesses performed
    accesses: u64,
}

impl<L: FaultLogger> SimHost<L> {
    /// Initialize an engine over a fresh, fully revoked permission table
    pub fn new(config: &MmuConfig, logger: L) -> Result<Self> {
        config.validate()?;
        let mut pmap = SoftPmap::new(config.pages());
        let mmu = Mmu::init(config, &mut pmap)?;
        Ok(Self {
            mmu,
            pmap,
            logger,
            accesses: 0,
        })
    }

    /// Perform one access at `addr`, resolving faults until it completes.
    ///
    /// Returns the number of faults taken; zero means the access was
    /// already authorized.
    pub fn access(&mut self, addr: usize, access: Access) -> Result<u32> {
        let geom = *self.mmu.translator();
        if !geom.contains(addr) {
            let page = addr.wrapping_sub(geom.base()) / geom.page_size();
            return Err(MmuError::PageOutOfRange {
                page,
                pages: geom.pages(),
            });
        }

        let (page, _) = geom.translate(addr);
        self.accesses += 1;

        let mut faults = 0;
        while !self.pmap.permits(page, access) {
            if faults == MAX_FAULTS_PER_ACCESS {
                return Err(MmuError::Unresolved { page: page.0 });
            }
            faults += 1;
            self.mmu
                .handle_fault(addr, &mut self.pmap, &mut self.logger)?;
        }
        Ok(faults)
    }

    /// Access `offset` bytes into virtual page `page`
    pub fn touch(&mut self, page: usize, offset: usize, access: Access) -> Result<u32> {
        let addr = self.mmu.translator().page_base(PageNumber(page)) + offset;
        self.access(addr, access)
    }

    pub fn read(&mut self, page: usize) -> Result<u32> {
        self.touch(page, 0, Access::Read)
    }

    pub fn write(&mut self, page: usize) -> Result<u32> {
        self.touch(page, 0, Access::Write)
    }

    pub fn accesses(&self) -> u64 {
        self.accesses
    }

    pub fn mmu(&self) -> &Mmu {
        &self.mmu
    }

    pub fn pmap(&self) -> &SoftPmap {
        &self.pmap
    }

    pub fn pmap_mut(&mut self) -> &mut SoftPmap {
        &mut self.pmap
    }

    pub fn logger(&self) -> &L {
        &self.logger
    }

    pub fn logger_mut(&mut self) -> &mut L {
        &mut self.logger
    }

    pub fn into_logger(self) -> L {
        self.logger
    }
}
