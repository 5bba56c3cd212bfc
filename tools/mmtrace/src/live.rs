//! Live replay over real protection faults
//!
//! Maps an anonymous `PROT_NONE` region, installs the engine as the
//! signal handler with records going straight to stdout, and performs
//! every access with a volatile load or store.

use std::io::{self, Write};
use std::ptr;

use softmmu::{trap, Access, FaultStats, FdLogger};

use crate::config::TraceConfig;
use crate::error::Result;
use crate::run::check_ops;
use crate::trace::TraceOp;

/// Anonymous mapping released on drop
struct Region {
    base: *mut libc::c_void,
    len: usize,
}

impl Region {
    fn map(len: usize) -> Result<Self> {
        // SAFETY: anonymous private mapping with no fixed address.
        let base = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_NONE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(io::Error::last_os_error().into());
        }
        Ok(Self { base, len })
    }

    fn addr(&self) -> usize {
        self.base as usize
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        // SAFETY: `base`/`len` describe a mapping created by `map`.
        unsafe {
            libc::munmap(self.base, self.len);
        }
    }
}

pub fn replay(config: &TraceConfig, ops: &[TraceOp]) -> Result<FaultStats> {
    check_ops(config, ops)?;
    let region = Region::map(config.range_size()?)?;
    let mmu_config = config.mmu_config(region.addr())?;

    // Records bypass the std buffer from here on.
    io::stdout().flush()?;

    // SAFETY: the region is private to this function and stays mapped
    // until after `uninstall`; only this thread touches it.
    unsafe { trap::install(&mmu_config, FdLogger::stdout())? };

    for op in ops {
        let addr = region.addr() + op.page * config.page_size + op.offset;
        // SAFETY: `addr` lies inside the region; faults are resolved by
        // the installed handler before the access completes.
        unsafe {
            match op.access {
                Access::Read => {
                    ptr::read_volatile(addr as *const u8);
                }
                Access::Write => ptr::write_volatile(addr as *mut u8, op.line as u8),
            }
        }
    }

    let state = trap::uninstall()?;
    Ok(state.stats())
}
