//! Affinity partitioning
//!
//! Groups items by key and hands whole groups out, on demand, to any number
//! of independently consumed streams. Items sharing a key are always consumed
//! by one stream, in their original order; the only synchronisation is a
//! single lock taken while claiming the next group.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use std::vec;

/// Dynamic partitioner that keeps same-key items together
pub struct AffinityPartitioner<T> {
    cursor: Arc<GroupCursor<T>>,
    group_count: usize,
}

/// Shared position in the sequence of not-yet-claimed groups
struct GroupCursor<T> {
    remaining: Mutex<vec::IntoIter<Vec<T>>>,
}

impl<T> GroupCursor<T> {
    fn claim_next_group(&self) -> Option<vec::IntoIter<T>> {
        let group = self
            .remaining
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next();
        group.map(Vec::into_iter)
    }
}

impl<T> AffinityPartitioner<T> {
    /// Group `items` by `key_of`, keeping first-seen group order and the
    /// original order within each group. A "no key" value such as `None` is
    /// just another key and forms a single group.
    pub fn new<I, K, F>(items: I, mut key_of: F) -> Self
    where
        I: IntoIterator<Item = T>,
        K: Eq + Hash,
        F: FnMut(&T) -> K,
    {
        let mut slots: HashMap<K, usize> = HashMap::new();
        let mut groups: Vec<Vec<T>> = Vec::new();

        for item in items {
            let slot = *slots.entry(key_of(&item)).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(item);
        }

        let group_count = groups.len();
        Self {
            cursor: Arc::new(GroupCursor {
                remaining: Mutex::new(groups.into_iter()),
            }),
            group_count,
        }
    }

    /// Number of groups formed at construction
    pub fn group_count(&self) -> usize {
        self.group_count
    }

    /// Claim the next unclaimed group, or `None` once every group is taken.
    pub fn claim_next_group(&self) -> Option<vec::IntoIter<T>> {
        self.cursor.claim_next_group()
    }

    /// Open a new stream. Streams opened after every group has been claimed
    /// are immediately exhausted.
    pub fn stream(&self) -> AffinityStream<T> {
        AffinityStream {
            cursor: Arc::clone(&self.cursor),
            current: None,
        }
    }

    /// Open `count` streams up front.
    pub fn streams(&self, count: usize) -> Vec<AffinityStream<T>> {
        (0..count).map(|_| self.stream()).collect()
    }
}

/// One consumer's view of a partitioner
///
/// Drains its current group without locking and claims another group when
/// that one runs out.
pub struct AffinityStream<T> {
    cursor: Arc<GroupCursor<T>>,
    current: Option<vec::IntoIter<T>>,
}

impl<T> Iterator for AffinityStream<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        loop {
            if let Some(item) = self.current.as_mut().and_then(Iterator::next) {
                return Some(item);
            }
            self.current = Some(self.cursor.claim_next_group()?);
        }
    }
}
