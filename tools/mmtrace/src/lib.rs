//! mmtrace - access trace replay for the softmmu fault engine
//!
//! Parses a trace of page reads and writes, then replays it either
//! through the simulated host or against a real `mprotect`-guarded
//! mapping, printing one line per fault record.

pub mod config;
pub mod error;
#[cfg(unix)]
pub mod live;
pub mod logger;
pub mod run;
pub mod trace;

pub use config::{Overrides, TraceConfig};
pub use error::{Result, TraceError};
pub use run::{simulate, write_records, write_stats, RunReport};
pub use trace::{parse_trace, TraceOp};
