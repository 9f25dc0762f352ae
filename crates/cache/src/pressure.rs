//! Memory pressure levels
//!
//! A coarse classification of how close the process is to running out of
//! memory. Event sources report a level; the memory cache is dropped on
//! [`MemoryPressure::High`] and [`MemoryPressure::Critical`].

use crate::ram::CacheStats;

/// Memory pressure level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MemoryPressure {
    /// Memory usage is low (< 50% utilization)
    #[default]
    Low,
    /// Memory usage is moderate (50-75% utilization)
    Moderate,
    /// Memory usage is high (75-90% utilization)
    High,
    /// Memory usage is critical (> 90% utilization)
    Critical,
}

impl MemoryPressure {
    /// Get the memory pressure level from a utilization ratio (0.0 to 1.0)
    pub fn from_utilization(utilization: f64) -> Self {
        if utilization < 0.5 {
            MemoryPressure::Low
        } else if utilization < 0.75 {
            MemoryPressure::Moderate
        } else if utilization < 0.90 {
            MemoryPressure::High
        } else {
            MemoryPressure::Critical
        }
    }

    /// Level from a used/available byte pair
    pub fn from_usage(used: u64, total: u64) -> Self {
        if total == 0 {
            return MemoryPressure::Critical;
        }
        Self::from_utilization(used as f64 / total as f64)
    }

    /// Level of a memory cache relative to its own byte limit
    pub fn of_cache(stats: &CacheStats) -> Self {
        Self::from_utilization(stats.memory_utilization())
    }

    /// Returns true if memory pressure requires action (High or Critical)
    pub fn needs_eviction(&self) -> bool {
        matches!(self, MemoryPressure::High | MemoryPressure::Critical)
    }
}
