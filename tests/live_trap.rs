//! Live trap test
//!
//! Drives the engine from real protection faults over an anonymous
//! mapping. Kept to a single test: the handler is process-wide and the
//! harness runs tests of one binary on several threads.

#![cfg(unix)]

use core::ptr;

use softmmu::trap;
use softmmu::{FaultCause, FaultLogger, FaultRecord, MmuConfig, Policy, RecordRing, NO_PAGE};
use spin::Mutex;

static SINK: Mutex<RecordRing<64>> = Mutex::new(RecordRing::new());

struct Mapping {
    base: *mut libc::c_void,
    len: usize,
}

impl Mapping {
    fn new(len: usize) -> Self {
        // SAFETY: anonymous private mapping, no file descriptor involved.
        let base = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        assert_ne!(base, libc::MAP_FAILED, "mmap failed");
        Self { base, len }
    }

    fn addr(&self) -> usize {
        self.base as usize
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        // SAFETY: `base`/`len` came from a successful mmap.
        unsafe {
            libc::munmap(self.base, self.len);
        }
    }
}

fn read(addr: usize) -> u8 {
    // SAFETY: inside the live mapping; faults are resolved by the handler.
    unsafe { ptr::read_volatile(addr as *const u8) }
}

fn write(addr: usize, value: u8) {
    // SAFETY: as for `read`.
    unsafe { ptr::write_volatile(addr as *mut u8, value) }
}

fn drain_raw() -> Vec<(usize, u8, i64, u8, usize)> {
    SINK.lock().drain().iter().map(FaultRecord::to_raw).collect()
}

fn fifo_over_real_faults(page_size: usize) {
    let map = Mapping::new(4 * page_size);
    let config = MmuConfig::new(map.addr(), 4 * page_size, 2, page_size, Policy::Fifo);
    let page = |n: usize| map.addr() + n * page_size;

    // SAFETY: the mapping is owned by this test and outlives the handler.
    unsafe { trap::install(&config, &SINK).expect("install failed") };
    assert!(trap::is_installed());
    assert!(matches!(
        unsafe { trap::install(&config, softmmu::NullLogger) },
        Err(softmmu::MmuError::AlreadyInstalled)
    ));
    assert_eq!(trap::with_installed(|state| state.mmu().tracing()), Some(false));

    let _ = read(page(0));
    let _ = read(page(1));
    write(page(0) + 8, 0xa5);
    assert_eq!(read(page(0) + 8), 0xa5);
    let _ = read(page(2));

    let faults = trap::with_installed(|state| state.stats().faults);
    let state = trap::uninstall().expect("uninstall failed");
    assert!(!trap::is_installed());
    assert_eq!(faults, Some(4));
    assert_eq!(state.stats().evictions, 1);
    assert_eq!(state.stats().write_backs, 1);

    let records: Vec<FaultRecord> = SINK.lock().drain();
    let raw: Vec<_> = records.iter().map(FaultRecord::to_raw).collect();
    assert_eq!(
        raw,
        [
            (0, 0, NO_PAGE, 0, 0),
            (1, 0, NO_PAGE, 0, page_size),
            (0, 1, NO_PAGE, 0, 8),
            (2, 0, 0, 1, 0),
        ]
    );
    assert_eq!(records[2].cause, FaultCause::FirstWrite);

    // The logger handed back by uninstall is still usable.
    let mut logger = state.into_logger();
    logger.log_fault(&records[0]);
    assert_eq!(SINK.lock().len(), 1);
    SINK.lock().clear();
}

fn third_chance_over_real_faults(page_size: usize) {
    let ps = page_size;
    let map = Mapping::new(8 * ps);
    let config = MmuConfig::new(map.addr(), 8 * ps, 2, ps, Policy::ThirdChance);
    let page = |n: usize| map.addr() + n * ps;

    // SAFETY: as in the FIFO run; the previous handler was removed.
    unsafe { trap::install(&config, &SINK).expect("install failed") };

    write(page(0), 1);
    let _ = read(page(1));
    // Scan revokes pages 0 and 1, reprieves dirty page 0, evicts page 1.
    let _ = read(page(2));
    // Hand resumes on page 0: reprieved and dirty, evicted with write-back.
    let _ = read(page(3));
    write(page(2), 0x5a);
    assert_eq!(read(page(2)), 0x5a);

    assert_eq!(
        drain_raw(),
        [
            (0, 0, NO_PAGE, 0, 0),
            (0, 1, NO_PAGE, 0, 0),
            (1, 0, NO_PAGE, 0, ps),
            (2, 0, 1, 0, ps),
            (3, 0, 0, 1, 0),
            (2, 1, NO_PAGE, 0, ps),
        ]
    );

    // Scan from page 2 revokes 2 and 3, reprieves 2, evicts 3. The next
    // touch of page 2 takes a real reacquire fault and sees its data.
    let _ = read(page(4));
    assert_eq!(read(page(2)), 0x5a);
    // Already dirty: the upgrade fault is silent.
    write(page(2), 0x5b);

    assert_eq!(drain_raw(), [(4, 0, 3, 0, 0), (2, 2, NO_PAGE, 0, ps)]);

    let state = trap::uninstall().expect("uninstall failed");
    let stats = state.stats();
    assert_eq!(stats.faults, 9);
    assert_eq!(stats.reacquires, 1);
    assert_eq!(stats.demotions, 4);
    assert_eq!(stats.write_backs, 1);
}

#[test]
fn test_policies_over_real_faults() {
    let page_size = trap::host_page_size();
    fifo_over_real_faults(page_size);
    third_chance_over_real_faults(page_size);
}
