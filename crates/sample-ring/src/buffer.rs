//! History Ring Implementation

/// Default number of slots
pub const DEFAULT_STORAGE_SIZE: usize = 32;

/// Fixed-capacity circular store with head/tail cursors.
///
/// `head` is the most recently written slot and `tail` the oldest unread
/// one. The unread count is `(head - tail) mod capacity`, so a ring that has
/// taken exactly `capacity` appends since its tail reads as empty again.
/// Not synchronized: share it across threads behind a lock.
#[derive(Debug, Clone)]
pub struct HistoryRing<T> {
    storage: Box<[T]>,
    head: usize,
    tail: usize,
    total_written: u64,
}

impl<T: Copy + Default> HistoryRing<T> {
    /// Create an empty ring.
    ///
    /// # Panics
    /// If `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "history ring capacity must be at least 1");
        Self {
            storage: vec![T::default(); capacity].into_boxed_slice(),
            head: 0,
            tail: 0,
            total_written: 0,
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_STORAGE_SIZE)
    }

    /// Advance `head` one slot and store `value` there, overwriting whatever
    /// the slot held
    pub fn append(&mut self, value: T) {
        self.head = (self.head + 1) % self.capacity();
        self.storage[self.head] = value;
        self.total_written += 1;
    }

    /// Number of unread entries
    pub fn available(&self) -> usize {
        let capacity = self.capacity();
        (self.head + capacity - self.tail) % capacity
    }

    /// Entry at `head`, without advancing anything
    pub fn newest(&self) -> T {
        self.storage[self.head]
    }

    /// Entry at `tail`, without removing it
    pub fn oldest(&self) -> T {
        self.storage[self.tail]
    }

    /// Move `tail` forward one slot. Returns `false` when nothing is unread.
    pub fn advance_tail(&mut self) -> bool {
        if self.available() == 0 {
            return false;
        }
        self.tail = (self.tail + 1) % self.capacity();
        true
    }

    /// Mark every entry as read
    pub fn clear(&mut self) {
        self.tail = self.head;
    }

    /// Up to `count` unread entries, most recent first
    pub fn read_last(&self, count: usize) -> Vec<T> {
        let capacity = self.capacity();
        let count = count.min(self.available());
        (0..count)
            .map(|i| self.storage[(self.head + capacity - i) % capacity])
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn tail(&self) -> usize {
        self.tail
    }

    /// Total appends since creation, including overwritten ones
    pub fn total_written(&self) -> u64 {
        self.total_written
    }
}

impl<T: Copy + Default> Default for HistoryRing<T> {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}
