//! softmmu - virtual memory emulated in user space
//!
//! A reserved address range starts out inaccessible. Every access that
//! traps is handed to the fault engine, which keeps a page table of a
//! fixed number of resident frames, admits and evicts pages under a FIFO
//! or third-chance (enhanced clock) policy, and raises or revokes page
//! protections so that the next trap reveals the next interesting event:
//! a miss, a first write, or a touch after the clock hand passed.
//!
//! Each fault that changes observable state produces one [`FaultRecord`]
//! for a [`FaultLogger`].
//!
//! # Hosts
//!
//! - [`sim::SimHost`] drives the engine from a software permission table
//!   and is what the tests and the `mmtrace` tool use by default.
//! - [`trap::install`] (unix, `std` feature) installs the engine as the
//!   process's protection-fault signal handler over a real mapping.
//!
//! # Features
//!
//! - `std` (default): `mprotect`-backed pmap, signal wiring, `FdLogger`
//! - `serde`: `Serialize`/`Deserialize` for [`MmuConfig`] and [`Policy`]

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod config;
pub mod error;
pub mod logger;
pub mod sim;
pub mod types;
pub mod vm;

#[cfg(all(unix, feature = "std"))]
pub mod trap;

// Re-exports
pub use config::{MmuConfig, ParsePolicyError, Policy};
pub use error::{MmuError, Result};
pub use logger::{FaultLogger, FnLogger, LogFacade, NullLogger, RecordRing};
pub use sim::SimHost;
pub use types::{Access, FaultCause, FaultRecord, FrameNumber, PageNumber, Protection, NO_PAGE};
pub use vm::{AddressTranslator, FaultStats, Mmu, ProtectionController, SoftPmap};

#[cfg(all(unix, feature = "std"))]
pub use logger::FdLogger;
#[cfg(all(unix, feature = "std"))]
pub use vm::MprotectPmap;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
