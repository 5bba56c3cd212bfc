//! Error types for softmmu

use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = core::result::Result<T, MmuError>;

/// Errors raised by configuration, protection changes and trap wiring.
///
/// Every variant is fatal for the engine that produced it: misses,
/// evictions and write faults are normal outcomes and never surface here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MmuError {
    /// Frame count must be at least one
    #[error("invalid frame count: {0}")]
    InvalidFrameCount(usize),

    /// Page size must be a non-zero power of two
    #[error("invalid page size: {0}")]
    InvalidPageSize(usize),

    /// Range must be non-empty and a whole number of pages
    #[error("invalid range: {size} bytes is not a positive multiple of page size {page_size}")]
    InvalidRange { size: usize, page_size: usize },

    /// Unknown replacement policy code
    #[error("unsupported policy: {0}")]
    UnsupportedPolicy(i32),

    /// Base or page size not aligned to the host page size
    #[error("region not aligned to host page size {host_page_size}: base {base:#x}, page size {page_size}")]
    MisalignedRegion {
        base: usize,
        page_size: usize,
        host_page_size: usize,
    },

    /// Permission change could not be applied
    #[error("failed to set protection on page {page} (errno {errno})")]
    Protect { page: usize, errno: i32 },

    /// Page lies outside the reserved range
    #[error("page {page} outside range of {pages} pages")]
    PageOutOfRange { page: usize, pages: usize },

    /// Installing or restoring a signal action failed
    #[error("failed to install fault handler (errno {errno})")]
    HandlerInstall { errno: i32 },

    /// A fault handler is already installed in this process
    #[error("fault handler already installed")]
    AlreadyInstalled,

    /// No fault handler is installed
    #[error("fault handler not installed")]
    NotInstalled,

    /// Access still traps after the resolver ran
    #[error("access to page {page} still faults after resolution")]
    Unresolved { page: usize },
}

impl MmuError {
    /// Whether this is a configuration error caught before any state changed
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            MmuError::InvalidFrameCount(_)
                | MmuError::InvalidPageSize(_)
                | MmuError::InvalidRange { .. }
                | MmuError::UnsupportedPolicy(_)
                | MmuError::MisalignedRegion { .. }
        )
    }
}
