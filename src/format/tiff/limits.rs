//! Resource limits for parsing untrusted streams.
//!
//! Every buffer whose size comes from the file (entry tables, indirect values,
//! offset arrays, unit payloads) is checked here before it is allocated.

use crate::error::TiffError;

/// Default cap on a single allocation: 256MB.
pub const DEFAULT_MAX_SINGLE_ALLOC: u64 = 256 * 1024 * 1024;

/// Default cap on the bytes held by one operation: 1GB.
pub const DEFAULT_MAX_CUMULATIVE_ALLOC: u64 = 1024 * 1024 * 1024;

/// Default cap on the number of main-chain directories visited.
pub const DEFAULT_MAX_DIRECTORIES: usize = 65_536;

/// Default cap on the entry count of one directory.
pub const DEFAULT_MAX_FIELDS_PER_DIRECTORY: u64 = 4096;

/// Resource caps applied while navigating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Largest single buffer requested on behalf of the file
    pub max_single_alloc: u64,

    /// Largest total of buffers held by one directory or one addressing view
    pub max_cumulative_alloc: u64,

    /// Main-chain traversal stops after this many directories
    pub max_directories: usize,

    /// Directories declaring more entries are rejected
    pub max_fields_per_directory: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_single_alloc: DEFAULT_MAX_SINGLE_ALLOC,
            max_cumulative_alloc: DEFAULT_MAX_CUMULATIVE_ALLOC,
            max_directories: DEFAULT_MAX_DIRECTORIES,
            max_fields_per_directory: DEFAULT_MAX_FIELDS_PER_DIRECTORY,
        }
    }
}

impl Limits {
    /// No caps at all. Only for trusted input.
    pub fn unlimited() -> Self {
        Self {
            max_single_alloc: u64::MAX,
            max_cumulative_alloc: u64::MAX,
            max_directories: usize::MAX,
            max_fields_per_directory: u64::MAX,
        }
    }

    pub fn with_max_single_alloc(mut self, bytes: u64) -> Self {
        self.max_single_alloc = bytes;
        self
    }

    pub fn with_max_cumulative_alloc(mut self, bytes: u64) -> Self {
        self.max_cumulative_alloc = bytes;
        self
    }

    pub fn with_max_directories(mut self, count: usize) -> Self {
        self.max_directories = count;
        self
    }

    pub fn with_max_fields_per_directory(mut self, count: u64) -> Self {
        self.max_fields_per_directory = count;
        self
    }

    /// Check one allocation against `max_single_alloc`.
    pub fn check_single(&self, requested: u64) -> Result<(), TiffError> {
        if requested > self.max_single_alloc {
            return Err(TiffError::AllocationLimitExceeded {
                requested,
                limit: self.max_single_alloc,
            });
        }
        Ok(())
    }

    /// Start a fresh cumulative budget.
    pub fn budget(&self) -> AllocationBudget {
        AllocationBudget {
            single: self.max_single_alloc,
            cumulative: self.max_cumulative_alloc,
            used: 0,
        }
    }
}

/// Running total of bytes requested within one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationBudget {
    single: u64,
    cumulative: u64,
    used: u64,
}

impl AllocationBudget {
    /// Account for `requested` bytes, failing if either cap would be exceeded.
    ///
    /// Nothing is recorded on failure.
    pub fn reserve(&mut self, requested: u64) -> Result<(), TiffError> {
        if requested > self.single {
            return Err(TiffError::AllocationLimitExceeded {
                requested,
                limit: self.single,
            });
        }
        let total = self
            .used
            .checked_add(requested)
            .filter(|total| *total <= self.cumulative)
            .ok_or(TiffError::AllocationLimitExceeded {
                requested,
                limit: self.cumulative,
            })?;
        self.used = total;
        Ok(())
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn remaining(&self) -> u64 {
        self.cumulative - self.used
    }
}

/// Multiply dimensions without wrapping.
///
/// `what` names the quantity in the error message.
pub fn checked_product(factors: &[u64], what: &str) -> Result<u64, TiffError> {
    factors.iter().try_fold(1u64, |acc, &factor| {
        acc.checked_mul(factor)
            .ok_or_else(|| TiffError::InvalidGeometry(format!("{what} overflows 64 bits")))
    })
}

/// Add two counts without wrapping.
pub fn checked_sum(a: u64, b: u64, what: &str) -> Result<u64, TiffError> {
    a.checked_add(b)
        .ok_or_else(|| TiffError::InvalidGeometry(format!("{what} overflows 64 bits")))
}

/// Integer division rounding up; `divisor` must be non-zero.
#[inline]
pub fn div_ceil(value: u64, divisor: u64) -> u64 {
    value / divisor + u64::from(value % divisor != 0)
}
