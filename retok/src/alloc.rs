//! Allocation capability injected into every scan and conversion.
//!
//! The front end never reaches for a global allocator policy. Every node it
//! creates, and every buffer that holds nodes, is first charged against the
//! [`Allocator`] handed in by the caller, which is free to pool, cap, or
//! refuse the request. A refused charge surfaces as [`AllocError`] and unwinds
//! the half-built stream.

use std::cell::Cell;
use std::fmt;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
#[error("out of memory: could not allocate {size} bytes")]
pub struct AllocError {
    pub size: usize,
}

/// Source of memory blocks for tokens, sequence slots, class sets,
/// operator-stack entries and the buffers that hold them.
///
/// `allocate` either grants the whole request or fails; there is no partial
/// block. `deallocate` is called exactly once for every granted block, with the
/// size it was granted for, and must not fail.
pub trait Allocator {
    fn allocate(&self, size: usize) -> Result<(), AllocError>;

    fn deallocate(&self, size: usize);
}

/// A granted allocation. Returns itself to the allocator when dropped.
pub struct Block<'a> {
    allocator: &'a dyn Allocator,
    size: usize,
}

impl<'a> Block<'a> {
    pub fn new(allocator: &'a dyn Allocator, size: usize) -> Result<Self, AllocError> {
        allocator.allocate(size)?;
        Ok(Self { allocator, size })
    }

    /// Charges a block sized for one `T`.
    pub fn of<T>(allocator: &'a dyn Allocator) -> Result<Self, AllocError> {
        Self::new(allocator, std::mem::size_of::<T>())
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl Drop for Block<'_> {
    fn drop(&mut self) {
        self.allocator.deallocate(self.size);
    }
}

impl fmt::Debug for Block<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block").field("size", &self.size).finish()
    }
}

/// Growable buffer whose capacity is charged to an allocator.
///
/// Growth charges the new buffer before the old one is released, and the
/// global heap is only touched once that charge has been granted.
pub(crate) struct ChargedVec<'a, T> {
    allocator: &'a dyn Allocator,
    items: Vec<T>,
    capacity: usize,
    buffer: Option<Block<'a>>,
}

impl<'a, T> ChargedVec<'a, T> {
    const MIN_CAPACITY: usize = 4;

    pub(crate) fn new(allocator: &'a dyn Allocator) -> Self {
        Self {
            allocator,
            items: Vec::new(),
            capacity: 0,
            buffer: None,
        }
    }

    /// Appends `item`, growing the charged buffer first when it is full. On
    /// failure `item` is dropped along with any blocks it owns.
    pub(crate) fn try_push(&mut self, item: T) -> Result<(), AllocError> {
        if self.items.len() == self.capacity {
            self.grow()?;
        }
        self.items.push(item);
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    fn grow(&mut self) -> Result<(), AllocError> {
        let capacity = self.capacity.saturating_mul(2).max(Self::MIN_CAPACITY);
        let size = capacity.saturating_mul(std::mem::size_of::<T>());
        let block = Block::new(self.allocator, size)?;
        self.items
            .try_reserve_exact(capacity - self.items.len())
            .map_err(|_| AllocError { size })?;
        self.buffer = Some(block);
        self.capacity = capacity;
        Ok(())
    }
}

impl<T> std::ops::Deref for ChargedVec<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

/// Grants every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAllocator;

impl Allocator for SystemAllocator {
    fn allocate(&self, _size: usize) -> Result<(), AllocError> {
        Ok(())
    }

    fn deallocate(&self, _size: usize) {}
}

/// Bookkeeping allocator used for limits and fault injection.
///
/// Counts live blocks and bytes so callers can assert that a failed scan left
/// nothing behind. Not `Sync`: give each concurrent scan its own instance.
#[derive(Debug, Default)]
pub struct TrackingAllocator {
    byte_limit: Option<usize>,
    fail_at: Option<usize>,
    allocations: Cell<usize>,
    outstanding_blocks: Cell<usize>,
    outstanding_bytes: Cell<usize>,
    peak_bytes: Cell<usize>,
    double_frees: Cell<usize>,
}

impl TrackingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse any request that would push live bytes above `limit`.
    pub fn with_byte_limit(mut self, limit: usize) -> Self {
        self.byte_limit = Some(limit);
        self
    }

    /// Refuse the `index`-th request (0-based), counting refused ones too.
    pub fn with_fail_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Number of `allocate` calls seen so far, granted or not.
    pub fn allocations(&self) -> usize {
        self.allocations.get()
    }

    pub fn outstanding_blocks(&self) -> usize {
        self.outstanding_blocks.get()
    }

    pub fn outstanding_bytes(&self) -> usize {
        self.outstanding_bytes.get()
    }

    pub fn peak_bytes(&self) -> usize {
        self.peak_bytes.get()
    }

    /// Releases that had no live block or bytes left to return.
    pub fn double_frees(&self) -> usize {
        self.double_frees.get()
    }
}

impl Allocator for TrackingAllocator {
    fn allocate(&self, size: usize) -> Result<(), AllocError> {
        let index = self.allocations.get();
        self.allocations.set(index + 1);

        if self.fail_at == Some(index) {
            debug!(index, size, "injected allocation failure");
            return Err(AllocError { size });
        }

        let live = self.outstanding_bytes.get().saturating_add(size);
        if let Some(limit) = self.byte_limit {
            if live > limit {
                debug!(size, live, limit, "allocation over byte limit");
                return Err(AllocError { size });
            }
        }

        self.outstanding_blocks.set(self.outstanding_blocks.get() + 1);
        self.outstanding_bytes.set(live);
        self.peak_bytes.set(self.peak_bytes.get().max(live));
        Ok(())
    }

    fn deallocate(&self, size: usize) {
        if self.outstanding_blocks.get() == 0 || self.outstanding_bytes.get() < size {
            debug!(size, "release without a matching live block");
            self.double_frees.set(self.double_frees.get() + 1);
        }
        self.outstanding_blocks
            .set(self.outstanding_blocks.get().saturating_sub(1));
        self.outstanding_bytes
            .set(self.outstanding_bytes.get().saturating_sub(size));
    }
}
