//! Engine configuration
//!
//! `MmuConfig` carries everything initialization binds: the reserved
//! range, its page size, the number of resident frames and the
//! replacement policy.

use alloc::string::String;
use core::fmt;
use core::str::FromStr;
use thiserror::Error;

use crate::error::{MmuError, Result};

/// Page replacement policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[repr(i32)]
pub enum Policy {
    /// Evict in admission order
    #[default]
    Fifo = 1,
    /// Enhanced clock with a second reprieve for dirty pages
    #[cfg_attr(feature = "serde", serde(alias = "tc", alias = "clock"))]
    ThirdChance = 2,
}

impl Policy {
    /// Numeric policy code
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Canonical name
    pub const fn name(self) -> &'static str {
        match self {
            Policy::Fifo => "fifo",
            Policy::ThirdChance => "third-chance",
        }
    }
}

impl TryFrom<i32> for Policy {
    type Error = MmuError;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            1 => Ok(Policy::Fifo),
            2 => Ok(Policy::ThirdChance),
            other => Err(MmuError::UnsupportedPolicy(other)),
        }
    }
}

/// Unknown policy name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown policy `{0}` (expected fifo or third-chance)")]
pub struct ParsePolicyError(pub String);

impl FromStr for Policy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fifo" | "1" => Ok(Policy::Fifo),
            "third-chance" | "third_chance" | "tc" | "clock" | "2" => Ok(Policy::ThirdChance),
            _ => Err(ParsePolicyError(String::from(s))),
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Initialization parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MmuConfig {
    /// Start of the reserved range
    pub base: usize,
    /// Size of the reserved range in bytes
    pub range_size: usize,
    /// Number of resident frames
    pub frame_count: usize,
    /// Size of both virtual pages and frames
    pub page_size: usize,
    /// Replacement policy
    pub policy: Policy,
}

impl MmuConfig {
    pub const fn new(
        base: usize,
        range_size: usize,
        frame_count: usize,
        page_size: usize,
        policy: Policy,
    ) -> Self {
        Self {
            base,
            range_size,
            frame_count,
            page_size,
            policy,
        }
    }

    /// Check the parameters before any state is touched
    pub fn validate(&self) -> Result<()> {
        if self.frame_count == 0 {
            return Err(MmuError::InvalidFrameCount(self.frame_count));
        }
        if !self.page_size.is_power_of_two() {
            return Err(MmuError::InvalidPageSize(self.page_size));
        }
        if self.range_size == 0 || self.range_size % self.page_size != 0 {
            return Err(MmuError::InvalidRange {
                size: self.range_size,
                page_size: self.page_size,
            });
        }
        if self.base.checked_add(self.range_size).is_none() {
            return Err(MmuError::InvalidRange {
                size: self.range_size,
                page_size: self.page_size,
            });
        }
        Ok(())
    }

    /// Number of virtual pages in the range
    pub const fn pages(&self) -> usize {
        self.range_size / self.page_size
    }

    /// Whether `addr` lies inside the reserved range
    pub const fn contains(&self, addr: usize) -> bool {
        addr >= self.base && addr - self.base < self.range_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_codes() {
        assert_eq!(Policy::try_from(1), Ok(Policy::Fifo));
        assert_eq!(Policy::try_from(2), Ok(Policy::ThirdChance));
        assert_eq!(Policy::try_from(3), Err(MmuError::UnsupportedPolicy(3)));
        assert_eq!(Policy::ThirdChance.code(), 2);
    }

    #[test]
    fn test_policy_names() {
        assert_eq!("fifo".parse::<Policy>(), Ok(Policy::Fifo));
        assert_eq!("TC".parse::<Policy>(), Ok(Policy::ThirdChance));
        assert_eq!("clock".parse::<Policy>(), Ok(Policy::ThirdChance));
        assert!("lru".parse::<Policy>().is_err());
    }

    #[test]
    fn test_validate() {
        let ok = MmuConfig::new(0, 4 * 4096, 2, 4096, Policy::Fifo);
        assert_eq!(ok.validate(), Ok(()));
        assert_eq!(ok.pages(), 4);
        assert!(ok.contains(4 * 4096 - 1));
        assert!(!ok.contains(4 * 4096));

        let bad = MmuConfig { frame_count: 0, ..ok };
        assert_eq!(bad.validate(), Err(MmuError::InvalidFrameCount(0)));

        let bad = MmuConfig { page_size: 3000, ..ok };
        assert_eq!(bad.validate(), Err(MmuError::InvalidPageSize(3000)));

        let bad = MmuConfig { page_size: 0, ..ok };
        assert_eq!(bad.validate(), Err(MmuError::InvalidPageSize(0)));

        let bad = MmuConfig { range_size: 4096 + 1, ..ok };
        assert!(matches!(bad.validate(), Err(MmuError::InvalidRange { .. })));
        assert!(bad.validate().unwrap_err().is_config());
    }
}
