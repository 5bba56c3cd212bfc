//! Common types used across softmmu
//!
//! Page and frame identifiers, protection levels, and the fault record
//! handed to the logging collaborator.

use core::fmt;

/// Raw value used for "no page" in the numeric record form
pub const NO_PAGE: i64 = -1;

/// Virtual page number within the reserved range
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PageNumber(pub usize);

/// Physical frame index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FrameNumber(pub usize);

impl fmt::Display for PageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for FrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Protection
// ============================================================================

/// Access permission on a page of the reserved range
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum Protection {
    /// Any access traps
    #[default]
    None = 0,
    /// Reads succeed, writes trap
    Read = 1,
    /// Reads and writes succeed
    ReadWrite = 3,
}

impl Protection {
    /// Whether an access of the given kind is allowed without trapping
    pub const fn permits(self, access: Access) -> bool {
        match (self, access) {
            (Protection::None, _) => false,
            (Protection::Read, Access::Read) => true,
            (Protection::Read, Access::Write) => false,
            (Protection::ReadWrite, _) => true,
        }
    }

    /// Equivalent `PROT_*` bits for `mprotect`
    #[cfg(unix)]
    pub const fn to_prot_bits(self) -> libc::c_int {
        match self {
            Protection::None => libc::PROT_NONE,
            Protection::Read => libc::PROT_READ,
            Protection::ReadWrite => libc::PROT_READ | libc::PROT_WRITE,
        }
    }
}

/// Kind of memory access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
}

// ============================================================================
// Fault Record
// ============================================================================

/// Why a fault record was emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FaultCause {
    /// Page was not resident (admission, possibly with eviction)
    Miss = 0,
    /// First write to a clean resident page
    FirstWrite = 1,
    /// Access to a resident page whose reference state was cleared by a scan
    ReferenceReacquire = 2,
}

impl FaultCause {
    /// Fixed numeric cause code
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// One resolved fault, in the field order the logging collaborator expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaultRecord {
    pub virt_page: PageNumber,
    pub cause: FaultCause,
    pub evicted_page: Option<PageNumber>,
    pub write_back: bool,
    pub phys_addr: usize,
}

impl FaultRecord {
    /// Record for an admission, with or without eviction
    pub const fn miss(
        virt_page: PageNumber,
        evicted_page: Option<PageNumber>,
        write_back: bool,
        phys_addr: usize,
    ) -> Self {
        Self {
            virt_page,
            cause: FaultCause::Miss,
            evicted_page,
            write_back,
            phys_addr,
        }
    }

    /// Record for a fault on a resident page (no eviction, no write-back)
    pub const fn resident(virt_page: PageNumber, cause: FaultCause, phys_addr: usize) -> Self {
        Self {
            virt_page,
            cause,
            evicted_page: None,
            write_back: false,
            phys_addr,
        }
    }

    /// Evicted page in raw form, `NO_PAGE` when nothing was evicted
    pub fn evicted_raw(&self) -> i64 {
        self.evicted_page.map_or(NO_PAGE, |p| p.0 as i64)
    }

    /// Raw tuple (virt_page, cause, evicted_page, write_back, phys_addr)
    pub fn to_raw(&self) -> (usize, u8, i64, u8, usize) {
        (
            self.virt_page.0,
            self.cause.code(),
            self.evicted_raw(),
            self.write_back as u8,
            self.phys_addr,
        )
    }
}

impl fmt::Display for FaultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (vp, cause, evicted, wb, pa) = self.to_raw();
        write!(f, "{} {} {} {} {}", vp, cause, evicted, wb, pa)
    }
}
