//! Fixed-Capacity Ring Buffer
//!
//! Circular store of the most recent samples for a single key. Inserts are
//! O(1) and a read of the last `k` samples is O(k), so per-tick signal
//! computation never scans unbounded history.

use std::num::NonZeroUsize;

/// Fixed-capacity circular buffer holding the most recent values.
///
/// Holds `min(capacity, inserted)` values and returns them oldest to newest.
///
/// # Example
///
/// ```rust
/// use std::num::NonZeroUsize;
/// use tick_engine::domain::ring_buffer::RingBuffer;
///
/// let mut buffer = RingBuffer::new(NonZeroUsize::new(3).unwrap());
/// for price in [100.0, 200.0, 300.0, 400.0] {
///     buffer.insert(price);
/// }
/// assert_eq!(buffer.read_last(3), vec![200.0, 300.0, 400.0]);
/// ```
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<T>,
    capacity: usize,
    /// Next write position.
    index: usize,
    /// Set once `index` has wrapped back to zero.
    full: bool,
}

impl<T: Clone> RingBuffer<T> {
    /// Create an empty buffer with the given capacity.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity.get()),
            capacity: capacity.get(),
            index: 0,
            full: false,
        }
    }

    /// Insert a value, overwriting the oldest one once the buffer is full.
    pub fn insert(&mut self, value: T) {
        if self.slots.len() < self.capacity {
            self.slots.push(value);
        } else {
            self.slots[self.index] = value;
        }

        self.index = (self.index + 1) % self.capacity;
        if self.index == 0 {
            self.full = true;
        }
    }

    /// Return up to `count` most recent values in chronological order.
    ///
    /// `count` is clamped to the capacity and to the number of values
    /// written so far; no padding is added.
    #[must_use]
    pub fn read_last(&self, count: usize) -> Vec<T> {
        let count = count.min(self.len());
        if count == 0 {
            return Vec::new();
        }

        let start = (self.index + self.capacity - count) % self.capacity;
        let mut out = Vec::with_capacity(count);

        if start + count <= self.capacity {
            out.extend_from_slice(&self.slots[start..start + count]);
        } else {
            let head = self.capacity - start;
            out.extend_from_slice(&self.slots[start..]);
            out.extend_from_slice(&self.slots[..count - head]);
        }

        out
    }

    /// Number of values currently held.
    #[must_use]
    pub const fn len(&self) -> usize {
        if self.full { self.capacity } else { self.index }
    }

    /// Whether nothing has been written yet.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of values held.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the write cursor has wrapped at least once.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.full
    }
}
