//! Fixed-capacity history buffer.

use serde::{Serialize, Serializer};

/// Ring buffer over a preallocated arena; pushing into a full buffer
/// overwrites the oldest entry.
///
/// # Examples
///
/// ```
/// use grid_engine::board::history::RingBuffer;
///
/// let mut buf = RingBuffer::with_capacity(2);
/// buf.push(1);
/// buf.push(2);
/// buf.push(3);
/// assert_eq!(buf.iter().copied().collect::<Vec<_>>(), vec![2, 3]);
/// ```
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<T>,
    capacity: usize,
    /// Index of the oldest element once the arena is full.
    head: usize,
}

impl<T> RingBuffer<T> {
    /// Creates an empty buffer holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "history capacity must be > 0");
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        }
    }

    /// Appends `item`, evicting the oldest entry when full.
    pub fn push(&mut self, item: T) {
        if self.slots.len() < self.capacity {
            self.slots.push(item);
        } else {
            self.slots[self.head] = item;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently pushed item.
    pub fn latest(&self) -> Option<&T> {
        if self.slots.is_empty() {
            return None;
        }
        let idx = (self.head + self.slots.len() - 1) % self.slots.len();
        self.slots.get(idx)
    }

    /// Iterates oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let (newer, older) = self.slots.split_at(self.head);
        older.iter().chain(newer.iter())
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
    }
}

impl<T: Serialize> Serialize for RingBuffer<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(buf: &RingBuffer<u32>) -> Vec<u32> {
        buf.iter().copied().collect()
    }

    #[test]
    fn fills_then_evicts_oldest_first() {
        let mut buf = RingBuffer::with_capacity(3);
        for i in 1..=3 {
            buf.push(i);
        }
        assert_eq!(contents(&buf), vec![1, 2, 3]);

        buf.push(4);
        buf.push(5);
        assert_eq!(contents(&buf), vec![3, 4, 5]);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.latest(), Some(&5));
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut buf = RingBuffer::with_capacity(4);
        for i in 0..1000 {
            buf.push(i);
            assert!(buf.len() <= buf.capacity());
        }
        assert_eq!(contents(&buf), vec![996, 997, 998, 999]);
    }

    #[test]
    fn latest_on_empty_is_none() {
        let buf: RingBuffer<u32> = RingBuffer::with_capacity(2);
        assert!(buf.is_empty());
        assert_eq!(buf.latest(), None);
    }

    #[test]
    fn clear_resets_order() {
        let mut buf = RingBuffer::with_capacity(2);
        buf.push(1);
        buf.push(2);
        buf.push(3);
        buf.clear();
        buf.push(9);
        assert_eq!(contents(&buf), vec![9]);
    }

    #[test]
    #[should_panic]
    fn zero_capacity_panics() {
        let _ = RingBuffer::<u8>::with_capacity(0);
    }
}
