//! Fault-resolution engine
//!
//! - translate: address -> (page, offset) and frame -> physical address
//! - pmap: protection control over the reserved range
//! - fifo: FIFO page table and resolver
//! - third_chance: enhanced clock page table and resolver
//! - fault: the `Mmu` dispatcher and fault statistics

pub mod fault;
pub mod fifo;
pub mod pmap;
pub mod third_chance;
pub mod translate;

pub use fault::{FaultStats, Mmu, PageTable, ResidentPage};
pub use fifo::{FifoEntry, FifoTable};
pub use pmap::{ProtectionController, SoftPmap};
pub use third_chance::{ClockEntry, Reference, ThirdChanceTable};
pub use translate::AddressTranslator;

#[cfg(all(unix, feature = "std"))]
pub use pmap::MprotectPmap;
