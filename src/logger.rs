//! Fault logging
//!
//! The engine reports every observable fault through [`FaultLogger`], once
//! per fault and with fields in the order (virt_page, cause, evicted_page,
//! write_back, phys_addr). Sinks used from a signal handler must not
//! allocate or take locks the interrupted code may hold: [`RecordRing`]
//! and [`FdLogger`] are safe there, `Vec` and [`LogFacade`] are not. The
//! engine's own `log` calls are switched off under the trap for the same
//! reason (`Mmu::set_tracing`).

use alloc::vec::Vec;
use heapless::Deque;
use spin::Mutex;

use crate::types::FaultRecord;

/// Receives one call per resolved fault
pub trait FaultLogger {
    fn log_fault(&mut self, record: &FaultRecord);
}

impl<L: FaultLogger + ?Sized> FaultLogger for &mut L {
    fn log_fault(&mut self, record: &FaultRecord) {
        (**self).log_fault(record);
    }
}

impl<L: FaultLogger + ?Sized> FaultLogger for alloc::boxed::Box<L> {
    fn log_fault(&mut self, record: &FaultRecord) {
        (**self).log_fault(record);
    }
}

impl FaultLogger for Vec<FaultRecord> {
    fn log_fault(&mut self, record: &FaultRecord) {
        self.push(*record);
    }
}

/// Forwards to a logger behind a lock, so a `static` sink can be handed to
/// the trap handler and drained afterwards
impl<L: FaultLogger> FaultLogger for &Mutex<L> {
    fn log_fault(&mut self, record: &FaultRecord) {
        self.lock().log_fault(record);
    }
}

/// Discards every record
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl FaultLogger for NullLogger {
    fn log_fault(&mut self, _record: &FaultRecord) {}
}

/// Adapts a closure
pub struct FnLogger<F>(pub F);

impl<F: FnMut(&FaultRecord)> FaultLogger for FnLogger<F> {
    fn log_fault(&mut self, record: &FaultRecord) {
        (self.0)(record);
    }
}

// ============================================================================
// Record Ring
// ============================================================================

/// Keeps the newest `N` records without allocating
#[derive(Debug)]
pub struct RecordRing<const N: usize> {
    records: Deque<FaultRecord, N>,
    /// Records pushed out by newer ones
    dropped: u64,
}

impl<const N: usize> RecordRing<N> {
    pub const fn new() -> Self {
        Self {
            records: Deque::new(),
            dropped: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Records oldest first
    pub fn iter(&self) -> impl Iterator<Item = &FaultRecord> + '_ {
        self.records.iter()
    }

    /// Remove and return the oldest record
    pub fn pop(&mut self) -> Option<FaultRecord> {
        self.records.pop_front()
    }

    /// Take every record, oldest first
    pub fn drain(&mut self) -> Vec<FaultRecord> {
        let mut out = Vec::with_capacity(self.records.len());
        while let Some(record) = self.records.pop_front() {
            out.push(record);
        }
        out
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.dropped = 0;
    }
}

impl<const N: usize> Default for RecordRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> FaultLogger for RecordRing<N> {
    fn log_fault(&mut self, record: &FaultRecord) {
        if self.records.is_full() {
            self.records.pop_front();
            self.dropped += 1;
        }
        // Cannot fail: a slot was freed above when full.
        let _ = self.records.push_back(*record);
    }
}

// ============================================================================
// log Facade
// ============================================================================

/// Forwards records to the `log` facade under the `softmmu::fault` target
#[derive(Debug, Clone, Copy)]
pub struct LogFacade {
    pub level: log::Level,
}

impl Default for LogFacade {
    fn default() -> Self {
        Self {
            level: log::Level::Info,
        }
    }
}

impl FaultLogger for LogFacade {
    fn log_fault(&mut self, record: &FaultRecord) {
        log::log!(target: "softmmu::fault", self.level, "{}", record);
    }
}

// ============================================================================
// File Descriptor Logger
// ============================================================================

/// Writes one line per record straight to a file descriptor.
///
/// Formatting goes into a stack buffer and output is a single `write(2)`,
/// so this is usable from inside the fault handler.
#[cfg(all(unix, feature = "std"))]
#[derive(Debug, Clone, Copy)]
pub struct FdLogger {
    fd: libc::c_int,
}

#[cfg(all(unix, feature = "std"))]
impl FdLogger {
    pub const fn new(fd: libc::c_int) -> Self {
        Self { fd }
    }

    pub const fn stdout() -> Self {
        Self::new(libc::STDOUT_FILENO)
    }

    pub const fn stderr() -> Self {
        Self::new(libc::STDERR_FILENO)
    }
}

/// Fits five numbers with separators and a newline
#[cfg(all(unix, feature = "std"))]
pub(crate) type LineBuf = heapless::String<96>;

#[cfg(all(unix, feature = "std"))]
pub(crate) fn write_fd(fd: libc::c_int, bytes: &[u8]) {
    let mut rest = bytes;
    while !rest.is_empty() {
        // SAFETY: `rest` is a valid buffer for its length.
        let n = unsafe { libc::write(fd, rest.as_ptr().cast(), rest.len()) };
        if n <= 0 {
            break;
        }
        rest = &rest[n as usize..];
    }
}

#[cfg(all(unix, feature = "std"))]
impl FaultLogger for FdLogger {
    fn log_fault(&mut self, record: &FaultRecord) {
        use core::fmt::Write;

        let mut line = LineBuf::new();
        if writeln!(line, "{}", record).is_ok() {
            write_fd(self.fd, line.as_bytes());
        }
    }
}
