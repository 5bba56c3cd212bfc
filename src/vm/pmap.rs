//! Physical map (pmap) - protection control for the reserved range
//!
//! The pmap is the only way the engine observes accesses: a page with
//! `Protection::None` traps on any access, `Protection::Read` traps on
//! writes, `Protection::ReadWrite` never traps. Changing a page's level is
//! how the engine admits, upgrades and evicts pages.
//!
//! ## Implementations
//!
//! - [`SoftPmap`]: permission table in memory, for the simulated host
//! - [`MprotectPmap`]: real `mprotect(2)` on a reserved mapping

use alloc::vec;
use alloc::vec::Vec;

use crate::error::{MmuError, Result};
use crate::types::{Access, PageNumber, Protection};

/// Sets access levels on page-sized regions of the reserved range.
///
/// A returned error means the protection state can no longer be trusted;
/// callers treat it as fatal.
pub trait ProtectionController {
    /// Set the access level of one page
    fn set_permission(&mut self, page: PageNumber, level: Protection) -> Result<()>;

    /// Number of pages in the controlled range
    fn pages(&self) -> usize;

    /// Revoke access to every page of the range
    fn revoke_all(&mut self) -> Result<()> {
        for page in 0..self.pages() {
            self.set_permission(PageNumber(page), Protection::None)?;
        }
        Ok(())
    }
}

impl<P: ProtectionController + ?Sized> ProtectionController for &mut P {
    fn set_permission(&mut self, page: PageNumber, level: Protection) -> Result<()> {
        (**self).set_permission(page, level)
    }

    fn pages(&self) -> usize {
        (**self).pages()
    }

    fn revoke_all(&mut self) -> Result<()> {
        (**self).revoke_all()
    }
}

// ============================================================================
// Software Pmap
// ============================================================================

/// In-memory permission table
#[derive(Debug, Clone)]
pub struct SoftPmap {
    levels: Vec<Protection>,
    /// Number of permission changes applied
    changes: u64,
    /// Next change on this page fails
    poisoned: Option<PageNumber>,
}

impl SoftPmap {
    /// Create a table for `pages` pages, all inaccessible
    pub fn new(pages: usize) -> Self {
        Self {
            levels: vec![Protection::None; pages],
            changes: 0,
            poisoned: None,
        }
    }

    /// Current level of a page (`None` outside the range)
    pub fn permission(&self, page: PageNumber) -> Protection {
        self.levels.get(page.0).copied().unwrap_or(Protection::None)
    }

    /// Whether an access would complete without trapping
    pub fn permits(&self, page: PageNumber, access: Access) -> bool {
        self.permission(page).permits(access)
    }

    /// Number of permission changes applied so far
    pub fn changes(&self) -> u64 {
        self.changes
    }

    /// Make the next permission change on `page` fail
    pub fn poison(&mut self, page: PageNumber) {
        self.poisoned = Some(page);
    }

    /// Pages that are currently accessible in any way
    pub fn accessible(&self) -> impl Iterator<Item = (PageNumber, Protection)> + '_ {
        self.levels
            .iter()
            .enumerate()
            .filter(|(_, level)| **level != Protection::None)
            .map(|(page, level)| (PageNumber(page), *level))
    }
}

impl ProtectionController for SoftPmap {
    fn set_permission(&mut self, page: PageNumber, level: Protection) -> Result<()> {
        if self.poisoned == Some(page) {
            self.poisoned = None;
            return Err(MmuError::Protect {
                page: page.0,
                errno: libc::EINVAL,
            });
        }
        let pages = self.levels.len();
        let slot = self
            .levels
            .get_mut(page.0)
            .ok_or(MmuError::PageOutOfRange { page: page.0, pages })?;
        *slot = level;
        self.changes += 1;
        Ok(())
    }

    fn pages(&self) -> usize {
        self.levels.len()
    }
}

// ============================================================================
// mprotect Pmap
// ============================================================================

/// Applies protection changes with `mprotect(2)`
#[cfg(all(unix, feature = "std"))]
#[derive(Debug)]
pub struct MprotectPmap {
    base: usize,
    page_size: usize,
    pages: usize,
}

#[cfg(all(unix, feature = "std"))]
impl MprotectPmap {
    /// # Safety
    ///
    /// `base..base + page_size * pages` must be a mapping owned by the
    /// caller for the lifetime of this value, aligned to the host page size,
    /// and not used for anything but emulated pages.
    pub unsafe fn new(base: usize, page_size: usize, pages: usize) -> Self {
        Self {
            base,
            page_size,
            pages,
        }
    }

    fn apply(&self, addr: usize, len: usize, level: Protection) -> core::result::Result<(), i32> {
        // SAFETY: the range was handed to us in `new` and stays mapped.
        let rc = unsafe { libc::mprotect(addr as *mut libc::c_void, len, level.to_prot_bits()) };
        if rc == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error().raw_os_error().unwrap_or(0))
        }
    }
}

#[cfg(all(unix, feature = "std"))]
impl ProtectionController for MprotectPmap {
    fn set_permission(&mut self, page: PageNumber, level: Protection) -> Result<()> {
        if page.0 >= self.pages {
            return Err(MmuError::PageOutOfRange {
                page: page.0,
                pages: self.pages,
            });
        }
        let addr = self.base + page.0 * self.page_size;
        self.apply(addr, self.page_size, level)
            .map_err(|errno| MmuError::Protect { page: page.0, errno })
    }

    fn pages(&self) -> usize {
        self.pages
    }

    fn revoke_all(&mut self) -> Result<()> {
        self.apply(self.base, self.page_size * self.pages, Protection::None)
            .map_err(|errno| MmuError::Protect { page: 0, errno })
    }
}
