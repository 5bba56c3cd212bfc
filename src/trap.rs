//! Trap wiring - protection faults delivered as signals
//!
//! Installs the engine as the process's `SIGSEGV` handler (`SIGBUS` as
//! well on BSD-derived systems, where protection faults on mapped pages
//! arrive as bus errors). The handler runs with every signal blocked,
//! resolves the fault through `mprotect(2)` and returns; the faulting
//! instruction then re-executes.
//!
//! ## Handler Rules
//!
//! - The engine lives in a process-wide slot taken with `try_lock`. A
//!   failed `try_lock` means the engine faulted while resolving a fault,
//!   and the process aborts.
//! - Faults outside the reserved range are handed back: the previous
//!   signal action is restored and the access re-executes under it.
//! - Any engine error is fatal. A diagnostic is written to stderr with
//!   `write(2)` and the process aborts.
//! - The engine runs with tracing off: nothing on the fault path calls
//!   into the `log` facade, whose backend may allocate or lock. Diagnostics
//!   go to stderr through `write(2)` and records only reach the installed
//!   `FaultLogger`, which must itself be signal-safe (see `crate::logger`).

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt::Write;
use spin::Mutex;

use crate::config::MmuConfig;
use crate::error::{MmuError, Result};
use crate::logger::{write_fd, FaultLogger, LineBuf};
use crate::vm::fault::{FaultStats, Mmu};
use crate::vm::pmap::MprotectPmap;

/// Signals protection faults arrive on
#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd"
))]
const TRAP_SIGNALS: [libc::c_int; 2] = [libc::SIGSEGV, libc::SIGBUS];

#[cfg(not(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd"
)))]
const TRAP_SIGNALS: [libc::c_int; 1] = [libc::SIGSEGV];

/// Logger owned by the installed handler
pub type BoxedLogger = Box<dyn FaultLogger + Send>;

/// Engine state while the handler is installed
pub struct Installed {
    mmu: Mmu,
    pmap: MprotectPmap,
    logger: BoxedLogger,
    /// Actions replaced by `install`, restored by `uninstall`
    previous: Vec<(libc::c_int, libc::sigaction)>,
}

impl Installed {
    pub fn mmu(&self) -> &Mmu {
        &self.mmu
    }

    pub fn stats(&self) -> FaultStats {
        self.mmu.stats()
    }

    pub fn into_logger(self) -> BoxedLogger {
        self.logger
    }

    fn restore(&self, sig: libc::c_int) {
        if let Some((_, action)) = self.previous.iter().find(|(s, _)| *s == sig) {
            // SAFETY: `action` was filled in by a successful sigaction call.
            unsafe {
                libc::sigaction(sig, action, core::ptr::null_mut());
            }
        }
    }
}

static TRAP: Mutex<Option<Installed>> = Mutex::new(None);

/// Host page size
pub fn host_page_size() -> usize {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        4096
    }
}

/// Install the fault handler for the range described by `config`.
///
/// Revokes all access to the range, selects the configured policy and
/// routes protection faults to it. The engine's `log` output is switched
/// off while installed; `logger` is called from the signal handler and
/// must not allocate or take locks the interrupted code may hold.
///
/// Fails without side effects on a configuration error; fails with the
/// range revoked but no handler installed if `sigaction` fails.
///
/// # Safety
///
/// `config.base .. config.base + config.range_size` must be a mapping
/// reserved by the caller, used only through this engine, and kept mapped
/// until [`uninstall`] returns. Only one thread may touch the range.
pub unsafe fn install<L>(config: &MmuConfig, logger: L) -> Result<()>
where
    L: FaultLogger + Send + 'static,
{
    config.validate()?;
    let host = host_page_size();
    if config.base % host != 0 || config.page_size % host != 0 {
        return Err(MmuError::MisalignedRegion {
            base: config.base,
            page_size: config.page_size,
            host_page_size: host,
        });
    }

    let mut slot = TRAP.lock();
    if slot.is_some() {
        return Err(MmuError::AlreadyInstalled);
    }

    let mut pmap = MprotectPmap::new(config.base, config.page_size, config.pages());
    let mut mmu = Mmu::init(config, &mut pmap)?;
    mmu.set_tracing(false);

    let mut action: libc::sigaction = core::mem::zeroed();
    action.sa_sigaction = fault_handler as libc::sighandler_t;
    action.sa_flags = libc::SA_SIGINFO;
    libc::sigfillset(&mut action.sa_mask);

    let mut previous = Vec::with_capacity(TRAP_SIGNALS.len());
    for sig in TRAP_SIGNALS {
        let mut old: libc::sigaction = core::mem::zeroed();
        if libc::sigaction(sig, &action, &mut old) != 0 {
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            for (sig, old) in &previous {
                libc::sigaction(*sig, old, core::ptr::null_mut());
            }
            return Err(MmuError::HandlerInstall { errno });
        }
        previous.push((sig, old));
    }

    *slot = Some(Installed {
        mmu,
        pmap,
        logger: Box::new(logger),
        previous,
    });
    log::info!("trap: fault handler installed");
    Ok(())
}

/// Restore the previous signal actions and hand back the engine state.
///
/// Page protections are left as they are.
pub fn uninstall() -> Result<Installed> {
    let mut slot = TRAP.lock();
    let state = slot.take().ok_or(MmuError::NotInstalled)?;
    for (sig, _) in &state.previous {
        state.restore(*sig);
    }
    let stats = state.stats();
    log::info!(
        "trap: fault handler removed after {} faults ({} evictions)",
        stats.faults,
        stats.evictions
    );
    Ok(state)
}

pub fn is_installed() -> bool {
    TRAP.lock().is_some()
}

/// Run `f` against the installed engine
pub fn with_installed<R>(f: impl FnOnce(&Installed) -> R) -> Option<R> {
    TRAP.lock().as_ref().map(f)
}

fn fatal(err: &dyn core::fmt::Display) -> ! {
    let mut line = LineBuf::new();
    let _ = writeln!(line, "softmmu: {}", err);
    write_fd(libc::STDERR_FILENO, line.as_bytes());
    // SAFETY: abort has no preconditions.
    unsafe { libc::abort() }
}

extern "C" fn fault_handler(sig: libc::c_int, info: *mut libc::siginfo_t, _ctx: *mut libc::c_void) {
    // SAFETY: the kernel passes a valid siginfo for SA_SIGINFO handlers.
    let addr = unsafe { (*info).si_addr() } as usize;

    let Some(mut slot) = TRAP.try_lock() else {
        fatal(&"fault while resolving a fault");
    };
    let Some(state) = slot.as_mut() else {
        // Raced with uninstall; fall back to the default action.
        // SAFETY: resetting to SIG_DFL is always valid.
        unsafe {
            libc::signal(sig, libc::SIG_DFL);
        }
        return;
    };

    if !state.mmu.config().contains(addr) {
        let mut line = LineBuf::new();
        let _ = writeln!(line, "softmmu: fault at {:#x} outside reserved range", addr);
        write_fd(libc::STDERR_FILENO, line.as_bytes());
        state.restore(sig);
        return;
    }

    let Installed {
        mmu, pmap, logger, ..
    } = state;
    if let Err(err) = mmu.handle_fault(addr, pmap, logger) {
        fatal(&err);
    }
}
