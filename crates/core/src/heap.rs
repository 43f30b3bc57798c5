//! A binary min-heap with decrease-key, keyed by node identity.
//!
//! Callers of the shortest-path/potential passes need to distinguish three
//! per-key situations: "distance not yet known" (never inserted),
//! "tentative" (currently in the heap), and "finalized" (extracted). The
//! heap tracks all three and keeps the final priority of extracted keys
//! available for lookup.

use core::hash::Hash;

use hashbrown::HashMap;

/// Observable state of a key with respect to the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// The key was never inserted; its distance is unknown.
    NeverInserted,
    /// The key is in the heap with a tentative priority.
    InHeap,
    /// The key was extracted; its priority is final (unless re-inserted).
    Extracted,
}

/// Binary min-heap with `O(log n)` insert/decrease/pop and `O(1)` state and
/// priority lookup.
#[derive(Debug, Clone)]
pub struct NodeHeap<K, P> {
    data: Vec<(P, K)>,
    position: HashMap<K, usize>,
    extracted: HashMap<K, P>,
}

impl<K, P> Default for NodeHeap<K, P>
where
    K: Eq + Hash + Clone,
    P: Ord + Copy,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, P> NodeHeap<K, P>
where
    K: Eq + Hash + Clone,
    P: Ord + Copy,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            position: HashMap::new(),
            extracted: HashMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// State of `key` with respect to this heap.
    #[must_use]
    pub fn state(&self, key: &K) -> EntryState {
        if self.position.contains_key(key) {
            EntryState::InHeap
        } else if self.extracted.contains_key(key) {
            EntryState::Extracted
        } else {
            EntryState::NeverInserted
        }
    }

    /// Tentative or final priority of `key`, if any.
    #[must_use]
    pub fn priority(&self, key: &K) -> Option<P> {
        if let Some(&i) = self.position.get(key) {
            return Some(self.data[i].0);
        }
        self.extracted.get(key).copied()
    }

    /// Inserts `key` or lowers its priority.
    ///
    /// Returns `true` if the key was inserted or its priority improved. An
    /// extracted key is re-inserted only if the new priority beats its final
    /// one, so label-correcting passes can re-open settled nodes on negative
    /// edges.
    pub fn insert_or_decrease(&mut self, key: K, priority: P) -> bool {
        if let Some(&i) = self.position.get(&key) {
            if priority >= self.data[i].0 {
                return false;
            }
            self.data[i].0 = priority;
            self.sift_up(i);
            return true;
        }
        if let Some(&done) = self.extracted.get(&key) {
            if priority >= done {
                return false;
            }
            let _ = self.extracted.remove(&key);
        }
        self.data.push((priority, key.clone()));
        let last = self.data.len() - 1;
        let _ = self.position.insert(key, last);
        self.sift_up(last);
        true
    }

    /// Removes and returns the minimum entry, marking it extracted.
    pub fn pop(&mut self) -> Option<(K, P)> {
        if self.data.is_empty() {
            return None;
        }
        let last = self.data.len() - 1;
        self.data.swap(0, last);
        let (priority, key) = self.data.pop()?;
        let _ = self.position.remove(&key);
        if !self.data.is_empty() {
            let _ = self.position.insert(self.data[0].1.clone(), 0);
            self.sift_down(0);
        }
        let _ = self.extracted.insert(key.clone(), priority);
        Some((key, priority))
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.data[i].0 >= self.data[parent].0 {
                break;
            }
            self.swap(i, parent);
            i = parent;
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        loop {
            let left = 2 * i + 1;
            let right = 2 * i + 2;
            let mut smallest = i;
            if left < self.data.len() && self.data[left].0 < self.data[smallest].0 {
                smallest = left;
            }
            if right < self.data.len() && self.data[right].0 < self.data[smallest].0 {
                smallest = right;
            }
            if smallest == i {
                break;
            }
            self.swap(i, smallest);
            i = smallest;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.data.swap(a, b);
        let _ = self.position.insert(self.data[a].1.clone(), a);
        let _ = self.position.insert(self.data[b].1.clone(), b);
    }
}
