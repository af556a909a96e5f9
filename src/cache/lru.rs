//! LRU Tracker Module
//!
//! Implements Least Recently Used ordering for cache eviction.

// == Recency Token ==
/// Handle to a key's position in the recency order.
///
/// Tokens are slot indices and are reused once their key leaves the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecencyToken(usize);

#[derive(Debug)]
struct Node {
    key: String,
    /// Neighbour towards the most recently used end
    prev: Option<usize>,
    /// Neighbour towards the least recently used end
    next: Option<usize>,
}

// == LRU Tracker ==
/// Tracks access order for LRU eviction strategy.
///
/// Keys live in an arena backed doubly linked list where:
/// - Front = Most recently used
/// - Back = Least recently used
///
/// Touch, remove and eviction are O(1) given a token.
#[derive(Debug, Default)]
pub struct LruTracker {
    slots: Vec<Option<Node>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl LruTracker {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Push ==
    /// Adds a key at the most recently used end.
    pub fn push_front(&mut self, key: String) -> RecencyToken {
        let node = Node {
            key,
            prev: None,
            next: None,
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(node);
                index
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };
        self.link_front(index);
        self.len += 1;
        RecencyToken(index)
    }

    // == Touch ==
    /// Marks a key as recently used (moves to front).
    ///
    /// Returns false if the token does not point at a tracked key.
    pub fn touch(&mut self, token: RecencyToken) -> bool {
        if !self.is_live(token) {
            return false;
        }
        if self.head != Some(token.0) {
            self.unlink(token.0);
            self.link_front(token.0);
        }
        true
    }

    // == Remove ==
    /// Removes a key from the tracker, returning it.
    pub fn remove(&mut self, token: RecencyToken) -> Option<String> {
        if !self.is_live(token) {
            return None;
        }
        self.unlink(token.0);
        self.release(token.0)
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    ///
    /// Returns None if tracker is empty.
    pub fn evict_oldest(&mut self) -> Option<String> {
        let tail = self.tail?;
        self.unlink(tail);
        self.release(tail)
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.len
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn is_live(&self, token: RecencyToken) -> bool {
        matches!(self.slots.get(token.0), Some(Some(_)))
    }

    fn link_front(&mut self, index: usize) {
        let old_head = self.head;
        if let Some(node) = self.slots[index].as_mut() {
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(head) => {
                if let Some(node) = self.slots[head].as_mut() {
                    node.prev = Some(index);
                }
            }
            None => self.tail = Some(index),
        }
        self.head = Some(index);
    }

    fn unlink(&mut self, index: usize) {
        let (prev, next) = match self.slots[index].as_ref() {
            Some(node) => (node.prev, node.next),
            None => return,
        };
        match prev {
            Some(prev) => {
                if let Some(node) = self.slots[prev].as_mut() {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(next) => {
                if let Some(node) = self.slots[next].as_mut() {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }

    fn release(&mut self, index: usize) -> Option<String> {
        let node = self.slots[index].take()?;
        self.free.push(index);
        self.len -= 1;
        Some(node.key)
    }
}
