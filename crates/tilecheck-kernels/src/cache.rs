//! Compiled-artifact cache keyed by codegen signature.
//!
//! Replaces the single "last compiled" memo with an explicit cache object
//! whose scope and lifetime are visible: bounded capacity, FIFO eviction,
//! evicted artifacts dropped immediately (their `Drop` impls dispose any
//! files or handles). Capacity 1 reproduces the single-slot memo.

use std::collections::VecDeque;
use tilecheck_common::{CodegenSignature, Result};

/// Bounded cache from codegen signature to compiled artifact.
pub struct ArtifactCache<T> {
    capacity: usize,
    slots: VecDeque<(CodegenSignature, T)>,
}

impl<T> ArtifactCache<T> {
    /// Create a cache holding at most `capacity` artifacts (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), slots: VecDeque::new() }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, sig: &CodegenSignature) -> bool {
        self.slots.iter().any(|(s, _)| s == sig)
    }

    /// Look up the artifact for `sig`.
    pub fn get(&self, sig: &CodegenSignature) -> Option<&T> {
        self.slots.iter().find(|(s, _)| s == sig).map(|(_, a)| a)
    }

    /// Return the cached artifact for `sig`, building it on a miss.
    ///
    /// The builder runs only on a miss; a build failure leaves the cache
    /// unchanged. On insertion the oldest entry is evicted once the cache
    /// is full.
    pub fn ensure_with<F>(&mut self, sig: &CodegenSignature, build: F) -> Result<&T>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(pos) = self.slots.iter().position(|(s, _)| s == sig) {
            return Ok(&self.slots[pos].1);
        }

        let artifact = build()?;
        if self.slots.len() >= self.capacity {
            self.slots.pop_front();
        }
        self.slots.push_back((sig.clone(), artifact));
        let (_, artifact) = self.slots.back().expect("slot just inserted");
        Ok(artifact)
    }

    /// Drop every cached artifact.
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
