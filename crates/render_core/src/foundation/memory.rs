//! Memory management utilities
//!
//! [`ByteRegion`] models a single device buffer that only ever grows: bytes
//! are appended at a monotonic cursor and a growth event reallocates the
//! backing storage and copies every written byte forward, so offsets handed
//! out earlier stay valid.

use log::debug;

/// Result type for region operations
pub type RegionResult<T> = Result<T, RegionError>;

/// Errors raised when a region cannot satisfy a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegionError {
    /// The write would take the region past its configured limit
    #[error("region limit exceeded: {requested} bytes required, limit is {limit}")]
    LimitExceeded {
        /// Total bytes the region would need
        requested: usize,
        /// Configured upper bound
        limit: usize,
    },

    /// The allocator refused the grown backing store
    #[error("failed to allocate {bytes} bytes for region growth")]
    AllocationFailed {
        /// Size of the refused allocation
        bytes: usize,
    },
}

/// Growable byte region with a monotonic write cursor
#[derive(Debug, Clone)]
pub struct ByteRegion {
    /// Backing store; `data.len()` is the region capacity
    data: Vec<u8>,

    /// Number of bytes written so far
    cursor: usize,

    /// Minimum number of bytes added by a growth event
    growth_increment: usize,

    /// Hard upper bound on capacity
    limit: usize,

    /// Number of times the region has been reallocated
    growth_events: u32,
}

impl ByteRegion {
    /// Create a region with `capacity` zeroed bytes
    pub fn with_capacity(
        capacity: usize,
        growth_increment: usize,
        limit: usize,
    ) -> RegionResult<Self> {
        if capacity > limit {
            return Err(RegionError::LimitExceeded { requested: capacity, limit });
        }

        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|_| RegionError::AllocationFailed { bytes: capacity })?;
        data.resize(capacity, 0);

        Ok(Self {
            data,
            cursor: 0,
            growth_increment: growth_increment.max(1),
            limit,
            growth_events: 0,
        })
    }

    /// Append `bytes` at the cursor, growing first if needed.
    ///
    /// Returns the byte offset the data was written at.
    pub fn append(&mut self, bytes: &[u8]) -> RegionResult<usize> {
        let required = self.cursor + bytes.len();
        if required > self.data.len() {
            self.grow(required)?;
        }

        let offset = self.cursor;
        self.data[offset..required].copy_from_slice(bytes);
        self.cursor = required;
        Ok(offset)
    }

    /// Reallocate so that at least `required` bytes fit.
    ///
    /// The new capacity is the current one plus the larger of the shortfall
    /// and the growth increment, clamped to the limit.
    fn grow(&mut self, required: usize) -> RegionResult<()> {
        if required > self.limit {
            return Err(RegionError::LimitExceeded { requested: required, limit: self.limit });
        }

        let shortfall = required - self.data.len();
        let new_capacity = (self.data.len() + shortfall.max(self.growth_increment)).min(self.limit);

        let mut grown = Vec::new();
        grown.try_reserve_exact(new_capacity)
            .map_err(|_| RegionError::AllocationFailed { bytes: new_capacity })?;
        grown.extend_from_slice(&self.data[..self.cursor]);
        grown.resize(new_capacity, 0);

        debug!(
            "Byte region grew {} -> {} bytes ({} written)",
            self.data.len(),
            new_capacity,
            self.cursor
        );

        self.data = grown;
        self.growth_events += 1;
        Ok(())
    }

    /// Whether `additional` more bytes could be appended without passing
    /// the limit
    pub fn fits(&self, additional: usize) -> bool {
        self.cursor
            .checked_add(additional)
            .map_or(false, |required| required <= self.limit)
    }

    /// Bytes written so far
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.cursor]
    }

    /// Read `len` written bytes starting at `offset`
    pub fn read(&self, offset: usize, len: usize) -> Option<&[u8]> {
        let end = offset.checked_add(len)?;
        if end > self.cursor {
            return None;
        }
        Some(&self.data[offset..end])
    }

    /// Number of bytes written
    pub fn len(&self) -> usize {
        self.cursor
    }

    /// Whether nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    /// Current capacity in bytes
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Configured upper bound on capacity
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of growth events so far
    pub fn growth_events(&self) -> u32 {
        self.growth_events
    }
}
