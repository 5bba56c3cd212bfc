//! Simulated replay
//!
//! Runs a parsed trace through [`SimHost`] and reports what the engine
//! logged.

use std::io::Write;

use softmmu::{FaultRecord, FaultStats, SimHost};

use crate::config::TraceConfig;
use crate::error::{Result, TraceError};
use crate::trace::TraceOp;

/// Outcome of one replay
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub records: Vec<FaultRecord>,
    pub stats: FaultStats,
    pub accesses: u64,
}

/// Reject accesses that fall outside the configured range
pub fn check_ops(config: &TraceConfig, ops: &[TraceOp]) -> Result<()> {
    for op in ops {
        if op.page >= config.pages {
            return Err(TraceError::PageOutOfRange {
                line: op.line,
                page: op.page,
                pages: config.pages,
            });
        }
        if op.offset >= config.page_size {
            return Err(TraceError::OffsetOutOfRange {
                line: op.line,
                offset: op.offset,
                page_size: config.page_size,
            });
        }
    }
    Ok(())
}

pub fn simulate(config: &TraceConfig, ops: &[TraceOp]) -> Result<RunReport> {
    check_ops(config, ops)?;
    let mmu_config = config.mmu_config(0)?;
    let mut host = SimHost::new(&mmu_config, Vec::new())?;

    for op in ops {
        let faults = host.touch(op.page, op.offset, op.access)?;
        log::trace!("line {}: {:?} page {} took {} faults", op.line, op.access, op.page, faults);
    }

    Ok(RunReport {
        stats: host.mmu().stats(),
        accesses: host.accesses(),
        records: host.into_logger(),
    })
}

pub fn write_records(out: &mut impl Write, records: &[FaultRecord]) -> std::io::Result<()> {
    for record in records {
        writeln!(out, "{}", record)?;
    }
    Ok(())
}

pub fn write_stats(out: &mut impl Write, stats: &FaultStats) -> std::io::Result<()> {
    writeln!(out, "# faults       {}", stats.faults)?;
    writeln!(out, "# misses       {}", stats.misses)?;
    writeln!(out, "# first writes {}", stats.first_writes)?;
    writeln!(out, "# reacquires   {}", stats.reacquires)?;
    writeln!(out, "# evictions    {}", stats.evictions)?;
    writeln!(out, "# write-backs  {}", stats.write_backs)?;
    writeln!(out, "# demotions    {}", stats.demotions)?;
    Ok(())
}
