// Per-instance cache of expanded states, bounded in bytes.
// Origin: compact-fst.h:27-33 (CompactFstOptions), cache.h

use std::collections::VecDeque;
use std::sync::Arc as Shared;

use hashbrown::HashMap;
use wfst_core::{Arc, Semiring, StateId};

/// Configuration of the arc cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// Evict states once the cache exceeds `gc_limit` bytes.
    pub gc: bool,
    /// Byte bound honoured when `gc` is set. The most recently expanded
    /// state is always retained.
    pub gc_limit: usize,
}

impl Default for CacheOptions {
    /// Decompaction is cheap, so compact FSTs keep almost nothing cached.
    fn default() -> Self {
        Self {
            gc: true,
            gc_limit: 0,
        }
    }
}

/// A fully expanded state.
#[derive(Debug, Clone)]
pub struct CachedState<W> {
    pub final_weight: W,
    pub arcs: Shared<[Arc<W>]>,
}

impl<W> CachedState<W> {
    fn size_in_bytes(&self) -> usize {
        size_of::<Self>() + self.arcs.len() * size_of::<Arc<W>>()
    }
}

/// Expanded states keyed by id, evicted in expansion order.
#[derive(Debug)]
pub struct ArcCache<W> {
    options: CacheOptions,
    states: HashMap<StateId, CachedState<W>>,
    order: VecDeque<StateId>,
    size: usize,
}

impl<W: Semiring> ArcCache<W> {
    pub fn new(options: CacheOptions) -> Self {
        Self {
            options,
            states: HashMap::new(),
            order: VecDeque::new(),
            size: 0,
        }
    }

    pub fn options(&self) -> CacheOptions {
        self.options
    }

    pub fn get(&self, s: StateId) -> Option<&CachedState<W>> {
        self.states.get(&s)
    }

    /// Stores an expanded state, then evicts the least recently expanded
    /// states while over the limit.
    pub fn insert(&mut self, s: StateId, state: CachedState<W>) {
        self.size += state.size_in_bytes();
        if let Some(old) = self.states.insert(s, state) {
            self.size -= old.size_in_bytes();
            self.order.retain(|&t| t != s);
        }
        self.order.push_back(s);
        if self.options.gc {
            self.collect();
        }
    }

    fn collect(&mut self) {
        while self.size > self.options.gc_limit && self.order.len() > 1 {
            let Some(victim) = self.order.pop_front() else {
                break;
            };
            if let Some(old) = self.states.remove(&victim) {
                self.size -= old.size_in_bytes();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Bytes currently accounted to cached states.
    pub fn size_in_bytes(&self) -> usize {
        self.size
    }

    pub fn clear(&mut self) {
        self.states.clear();
        self.order.clear();
        self.size = 0;
    }
}
