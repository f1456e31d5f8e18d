// Fixed-capacity FIFO history buffer
use crate::domain::error::DomainError;
use serde::{Deserialize, Serialize};

/// Raw positional state of a [`HistoryRingBuffer`], as persisted.
///
/// `buffer` always has `capacity` slots. Slots outside the logical range are
/// `None` until the buffer wraps for the first time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingBufferState<T> {
    pub capacity: i64,
    pub buffer: Vec<Option<T>>,
    pub head: usize,
    pub tail: usize,
    pub count: usize,
}

/// Fixed-capacity FIFO. Once full, every insert overwrites the oldest element.
///
/// Values cross the API boundary by value: `add` takes ownership and the
/// accessors hand out clones, so callers never alias stored history.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRingBuffer<T> {
    capacity: usize,
    buffer: Vec<Option<T>>,
    /// Slot of the oldest element.
    head: usize,
    /// Slot the next insert writes to.
    tail: usize,
    count: usize,
}

impl<T: Clone> HistoryRingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buffer: vec![None; capacity],
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn add(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }

        self.buffer[self.tail] = Some(item);
        self.tail = (self.tail + 1) % self.capacity;

        if self.count == self.capacity {
            // The write above landed on the oldest slot
            self.head = (self.head + 1) % self.capacity;
        } else {
            self.count += 1;
        }
    }

    /// Oldest element, or `None` when the buffer is empty.
    pub fn first(&self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        self.buffer[self.head].clone()
    }

    /// Newest element, or `None` when the buffer is empty.
    pub fn last(&self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        let newest = (self.tail + self.capacity - 1) % self.capacity;
        self.buffer[newest].clone()
    }

    /// Borrowing iterator, oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.count).filter_map(move |offset| {
            self.buffer[(self.head + offset) % self.capacity].as_ref()
        })
    }

    /// Owned copy of the logical contents, oldest to newest.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.buffer.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }

    pub fn serialize_state(&self) -> RingBufferState<T> {
        RingBufferState {
            capacity: self.capacity as i64,
            buffer: self.buffer.clone(),
            head: self.head,
            tail: self.tail,
            count: self.count,
        }
    }

    /// Rebuild a buffer from captured positional state, rejecting anything a
    /// buffer could not have produced.
    pub fn restore_state(state: RingBufferState<T>) -> Result<Self, DomainError> {
        let capacity = usize::try_from(state.capacity).map_err(|_| {
            DomainError::InvalidArgument(format!(
                "ring buffer capacity must be non-negative, got {}",
                state.capacity
            ))
        })?;

        if state.buffer.len() != capacity {
            return Err(DomainError::InvalidArgument(format!(
                "ring buffer has {} slots but capacity {}",
                state.buffer.len(),
                capacity
            )));
        }
        if state.count > capacity {
            return Err(DomainError::InvalidArgument(format!(
                "ring buffer count {} exceeds capacity {}",
                state.count, capacity
            )));
        }

        if capacity == 0 {
            if state.head != 0 || state.tail != 0 {
                return Err(DomainError::InvalidArgument(
                    "zero-capacity ring buffer must have both cursors at 0".to_string(),
                ));
            }
        } else {
            if state.head >= capacity || state.tail >= capacity {
                return Err(DomainError::InvalidArgument(format!(
                    "ring buffer cursors out of range: head {}, tail {}, capacity {}",
                    state.head, state.tail, capacity
                )));
            }
            if (state.head + state.count) % capacity != state.tail {
                return Err(DomainError::InvalidArgument(format!(
                    "ring buffer cursors disagree with count: head {}, tail {}, count {}",
                    state.head, state.tail, state.count
                )));
            }
            let has_gap = (0..state.count)
                .any(|offset| state.buffer[(state.head + offset) % capacity].is_none());
            if has_gap {
                return Err(DomainError::InvalidArgument(
                    "ring buffer has an empty slot inside its logical range".to_string(),
                ));
            }
        }

        Ok(Self {
            capacity,
            buffer: state.buffer,
            head: state.head,
            tail: state.tail,
            count: state.count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(capacity: usize, items: impl IntoIterator<Item = u32>) -> HistoryRingBuffer<u32> {
        let mut buffer = HistoryRingBuffer::new(capacity);
        for item in items {
            buffer.add(item);
        }
        buffer
    }

    #[test]
    fn test_length_is_min_of_inserts_and_capacity() {
        for capacity in 0..6 {
            for inserts in 0..15u32 {
                let buffer = filled(capacity, 0..inserts);
                let expected = (inserts as usize).min(capacity);
                assert_eq!(buffer.len(), expected, "capacity {capacity}, inserts {inserts}");
                assert_eq!(buffer.to_vec().len(), expected);
            }
        }
    }

    #[test]
    fn test_evicts_oldest_first() {
        let buffer = filled(3, 1..=5);
        assert_eq!(buffer.to_vec(), vec![3, 4, 5]);
        assert_eq!(buffer.first(), Some(3));
        assert_eq!(buffer.last(), Some(5));
    }

    #[test]
    fn test_repeated_overflow_keeps_most_recent_in_order() {
        let buffer = filled(4, 1..=23);
        assert_eq!(buffer.to_vec(), vec![20, 21, 22, 23]);
        assert_eq!(buffer.len(), buffer.capacity());
    }

    #[test]
    fn test_zero_capacity_discards_everything() {
        let buffer = filled(0, 1..=10);
        assert!(buffer.is_empty());
        assert_eq!(buffer.first(), None);
        assert_eq!(buffer.last(), None);
        assert!(buffer.to_vec().is_empty());
    }

    #[test]
    fn test_negative_capacity_is_rejected() {
        let state = RingBufferState::<u32> {
            capacity: -1,
            buffer: vec![],
            head: 0,
            tail: 0,
            count: 0,
        };
        assert!(matches!(
            HistoryRingBuffer::restore_state(state),
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_empty_differs_from_stored_none_payload() {
        let mut buffer: HistoryRingBuffer<Option<u32>> = HistoryRingBuffer::new(2);
        assert_eq!(buffer.first(), None);

        buffer.add(None);
        assert_eq!(buffer.first(), Some(None));
        assert_eq!(buffer.last(), Some(None));
    }

    #[test]
    fn test_returned_values_are_independent_copies() {
        let mut buffer: HistoryRingBuffer<Vec<String>> = HistoryRingBuffer::new(2);
        let mut original = vec!["a".to_string()];
        buffer.add(original.clone());
        original.push("changed".to_string());

        let mut first = buffer.first().unwrap();
        first.push("x".to_string());
        let mut last = buffer.last().unwrap();
        last.clear();
        let mut all = buffer.to_vec();
        all[0].push("y".to_string());

        assert_eq!(buffer.first(), Some(vec!["a".to_string()]));
        assert_eq!(buffer.to_vec(), vec![vec!["a".to_string()]]);
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut buffer = filled(3, 1..=5);
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 3);

        buffer.add(9);
        assert_eq!(buffer.to_vec(), vec![9]);
    }

    #[test]
    fn test_clone_is_independent() {
        let original = filled(3, 1..=4);
        let mut copy = original.clone();
        copy.add(99);

        assert_eq!(original.to_vec(), vec![2, 3, 4]);
        assert_eq!(copy.to_vec(), vec![3, 4, 99]);
    }

    #[test]
    fn test_state_round_trip_after_wrap() {
        let buffer = filled(5, 1..=12);
        let json = serde_json::to_string(&buffer.serialize_state()).unwrap();
        let state: RingBufferState<u32> = serde_json::from_str(&json).unwrap();
        let restored = HistoryRingBuffer::restore_state(state).unwrap();

        assert_eq!(restored.to_vec(), buffer.to_vec());
        assert_eq!(restored.first(), buffer.first());
        assert_eq!(restored.last(), buffer.last());

        // Cursor positions survive, so the next insert evicts the same element
        let mut restored = restored;
        let mut buffer = buffer;
        restored.add(13);
        buffer.add(13);
        assert_eq!(restored.to_vec(), buffer.to_vec());
    }

    #[test]
    fn test_unwrapped_state_pads_with_null() {
        let buffer = filled(4, [7, 8]);
        let json = serde_json::to_value(buffer.serialize_state()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "capacity": 4,
                "buffer": [7, 8, null, null],
                "head": 0,
                "tail": 2,
                "count": 2
            })
        );
    }

    #[test]
    fn test_restore_rejects_inconsistent_state() {
        let negative = RingBufferState::<u32> {
            capacity: -3,
            buffer: vec![],
            head: 0,
            tail: 0,
            count: 0,
        };
        assert!(HistoryRingBuffer::restore_state(negative).is_err());

        let short_buffer = RingBufferState {
            capacity: 3,
            buffer: vec![Some(1u32)],
            head: 0,
            tail: 1,
            count: 1,
        };
        assert!(HistoryRingBuffer::restore_state(short_buffer).is_err());

        let bad_cursor = RingBufferState {
            capacity: 3,
            buffer: vec![Some(1u32), None, None],
            head: 0,
            tail: 2,
            count: 1,
        };
        assert!(HistoryRingBuffer::restore_state(bad_cursor).is_err());

        let gap = RingBufferState {
            capacity: 3,
            buffer: vec![Some(1u32), None, None],
            head: 0,
            tail: 2,
            count: 2,
        };
        assert!(HistoryRingBuffer::restore_state(gap).is_err());
    }
}
