//! Run configuration
//!
//! Loaded from a TOML file, then overridden field by field from the
//! command line.
//!
//! ```toml
//! policy = "third-chance"
//! frames = 4
//! page_size = 4096
//! pages = 16
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use softmmu::{MmuConfig, Policy};

use crate::error::{Result, TraceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TraceConfig {
    pub policy: Policy,
    pub frames: usize,
    pub page_size: usize,
    pub pages: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            policy: Policy::Fifo,
            frames: 4,
            page_size: 4096,
            pages: 16,
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub policy: Option<Policy>,
    pub frames: Option<usize>,
    pub page_size: Option<usize>,
    pub pages: Option<usize>,
}

impl TraceConfig {
    pub fn from_toml(src: &str) -> Result<Self> {
        Ok(toml::from_str(src)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let src = fs::read_to_string(path).map_err(|source| TraceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&src)
    }

    pub fn with_overrides(mut self, overrides: &Overrides) -> Self {
        if let Some(policy) = overrides.policy {
            self.policy = policy;
        }
        if let Some(frames) = overrides.frames {
            self.frames = frames;
        }
        if let Some(page_size) = overrides.page_size {
            self.page_size = page_size;
        }
        if let Some(pages) = overrides.pages {
            self.pages = pages;
        }
        self
    }

    pub fn range_size(&self) -> Result<usize> {
        self.pages
            .checked_mul(self.page_size)
            .ok_or(TraceError::RangeOverflow {
                pages: self.pages,
                page_size: self.page_size,
            })
    }

    /// Engine configuration for a range starting at `base`, validated
    pub fn mmu_config(&self, base: usize) -> Result<MmuConfig> {
        let config = MmuConfig::new(
            base,
            self.range_size()?,
            self.frames,
            self.page_size,
            self.policy,
        );
        config.validate()?;
        Ok(config)
    }
}
