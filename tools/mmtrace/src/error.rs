//! Error types for mmtrace

use std::path::PathBuf;

use softmmu::MmuError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TraceError>;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("line {line}: {msg}")]
    Parse { line: usize, msg: String },

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("range of {pages} pages of {page_size} bytes overflows the address space")]
    RangeOverflow { pages: usize, page_size: usize },

    #[error("line {line}: page {page} outside the {pages}-page range")]
    PageOutOfRange {
        line: usize,
        page: usize,
        pages: usize,
    },

    #[error("line {line}: offset {offset:#x} past the {page_size}-byte page")]
    OffsetOutOfRange {
        line: usize,
        offset: usize,
        page_size: usize,
    },

    #[error("engine error: {0}")]
    Mmu(#[from] MmuError),
}

impl TraceError {
    pub(crate) fn parse(line: usize, msg: impl Into<String>) -> Self {
        TraceError::Parse {
            line,
            msg: msg.into(),
        }
    }
}
