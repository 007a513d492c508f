//! Recency Index Module
//!
//! Arena-backed doubly linked list used for LRU ordering.
//!
//! Nodes live in a flat `Vec` and link to each other by integer handle, so
//! the structure holds no references and can be inspected directly in
//! tests. Freed slots are recycled through a free list.

// == Handle ==
/// Index of a node in the arena.
pub type Handle = usize;

/// Sentinel for "no neighbour".
const NIL: Handle = usize::MAX;

#[derive(Debug, Clone)]
struct Node<T> {
    value: T,
    /// Towards the most recently used end
    prev: Handle,
    /// Towards the least recently used end
    next: Handle,
}

// == Recency Index ==
/// Doubly linked recency list over an arena.
///
/// - Head = most recently used
/// - Tail = least recently used
///
/// Every operation is O(1).
#[derive(Debug, Clone)]
pub struct RecencyIndex<T> {
    nodes: Vec<Option<Node<T>>>,
    free: Vec<Handle>,
    head: Handle,
    tail: Handle,
    len: usize,
}

impl<T> Default for RecencyIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RecencyIndex<T> {
    // == Constructor ==
    /// Creates a new empty recency index.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            len: 0,
        }
    }

    /// Creates an empty index with room for `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            ..Self::new()
        }
    }

    // == Push Front ==
    /// Inserts `value` as the most recently used node and returns its handle.
    pub fn push_front(&mut self, value: T) -> Handle {
        let node = Node {
            value,
            prev: NIL,
            next: self.head,
        };
        let handle = match self.free.pop() {
            Some(handle) => {
                self.nodes[handle] = Some(node);
                handle
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };

        if self.head != NIL {
            self.node_mut(self.head).prev = handle;
        }
        self.head = handle;
        if self.tail == NIL {
            self.tail = handle;
        }
        self.len += 1;
        handle
    }

    // == Touch ==
    /// Moves the node at `handle` to the most recently used position.
    pub fn touch(&mut self, handle: Handle) {
        if self.head == handle || !self.contains(handle) {
            return;
        }
        self.unlink(handle);

        let old_head = self.head;
        {
            let node = self.node_mut(handle);
            node.prev = NIL;
            node.next = old_head;
        }
        if old_head != NIL {
            self.node_mut(old_head).prev = handle;
        }
        self.head = handle;
        if self.tail == NIL {
            self.tail = handle;
        }
    }

    // == Remove ==
    /// Removes the node at `handle`, returning its value.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        if !self.contains(handle) {
            return None;
        }
        self.unlink(handle);
        self.len -= 1;
        self.free.push(handle);
        self.nodes[handle].take().map(|node| node.value)
    }

    // == Pop Back ==
    /// Removes and returns the least recently used value.
    pub fn pop_back(&mut self) -> Option<T> {
        if self.tail == NIL {
            return None;
        }
        self.remove(self.tail)
    }

    // == Accessors ==
    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.nodes
            .get(handle)
            .and_then(|slot| slot.as_ref())
            .map(|node| &node.value)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.nodes
            .get_mut(handle)
            .and_then(|slot| slot.as_mut())
            .map(|node| &mut node.value)
    }

    pub fn contains(&self, handle: Handle) -> bool {
        matches!(self.nodes.get(handle), Some(Some(_)))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drops every node and releases the arena.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
        self.len = 0;
    }

    // == Iteration ==
    /// Iterates values from most to least recently used.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            index: self,
            cursor: self.head,
        }
    }

    // == Internal: Linking ==
    fn node_mut(&mut self, handle: Handle) -> &mut Node<T> {
        match self.nodes[handle].as_mut() {
            Some(node) => node,
            None => unreachable!("recency handle {handle} points at a free slot"),
        }
    }

    /// Detaches a live node from its neighbours without freeing it.
    fn unlink(&mut self, handle: Handle) {
        let (prev, next) = {
            let node = self.node_mut(handle);
            (node.prev, node.next)
        };

        if prev != NIL {
            self.node_mut(prev).next = next;
        } else {
            self.head = next;
        }

        if next != NIL {
            self.node_mut(next).prev = prev;
        } else {
            self.tail = prev;
        }

        let node = self.node_mut(handle);
        node.prev = NIL;
        node.next = NIL;
    }
}

/// Front-to-back iterator over a [`RecencyIndex`].
pub struct Iter<'a, T> {
    index: &'a RecencyIndex<T>,
    cursor: Handle,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NIL {
            return None;
        }
        let node = self.index.nodes[self.cursor].as_ref()?;
        self.cursor = node.next;
        Some(&node.value)
    }
}
