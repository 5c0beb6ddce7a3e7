// Tensor pool: caching allocator for transient buffers.
//
// Backward passes without an explicit seed need an all-ones buffer shaped like the
// target's value. The buffer only lives for the duration of the seeding step, so it is
// taken from a per-graph free list keyed by element count and handed back when the
// `PooledTensor` guard drops, on every exit path.

use crate::tensor::Tensor;
use log::warn;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Snapshot of the pool's allocation statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of buffers currently held in the cache (not lent out).
    pub cached_buffers: usize,
    /// Total elements held in the cache.
    pub cached_elements: usize,
    /// Acquisitions served from the cache.
    pub hits: u64,
    /// Acquisitions that had to allocate.
    pub misses: u64,
    /// Buffers currently lent out through a guard.
    pub outstanding: u64,
}

/// A free list of tensors keyed by element count.
#[derive(Debug, Default)]
pub struct TensorPool {
    buckets: Mutex<HashMap<usize, Vec<Tensor>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    outstanding: AtomicU64,
}

impl TensorPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires a tensor shaped like `like` and filled with ones.
    pub fn ones_like(&self, like: &Tensor) -> PooledTensor<'_> {
        let shape = like.shape().to_vec();
        let numel: usize = shape.iter().product();
        let cached = match self.buckets.lock() {
            Ok(mut map) => map.get_mut(&numel).and_then(|stack| stack.pop()),
            Err(_) => {
                warn!("TensorPool: free list lock poisoned, allocating a fresh buffer");
                None
            }
        };
        let tensor = match cached {
            Some(mut t) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                t.reshape_in_place(shape);
                t.fill(1.0);
                t
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Tensor::ones(shape)
            }
        };
        self.outstanding.fetch_add(1, Ordering::Relaxed);
        PooledTensor {
            pool: self,
            tensor,
        }
    }

    fn release(&self, tensor: Tensor) {
        self.outstanding.fetch_sub(1, Ordering::Relaxed);
        if let Ok(mut map) = self.buckets.lock() {
            map.entry(tensor.numel()).or_default().push(tensor);
        }
    }

    /// Drops every cached buffer.
    pub fn empty_cache(&self) {
        if let Ok(mut map) = self.buckets.lock() {
            map.clear();
        }
    }

    pub fn stats(&self) -> PoolStats {
        let (cached_buffers, cached_elements) = match self.buckets.lock() {
            Ok(map) => map.iter().fold((0, 0), |(count, elems), (n, stack)| {
                (count + stack.len(), elems + n * stack.len())
            }),
            Err(_) => (0, 0),
        };
        PoolStats {
            cached_buffers,
            cached_elements,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            outstanding: self.outstanding.load(Ordering::Relaxed),
        }
    }
}

/// Scoped loan of a pooled tensor. The buffer returns to its pool on drop.
#[derive(Debug)]
pub struct PooledTensor<'a> {
    pool: &'a TensorPool,
    tensor: Tensor,
}

impl Deref for PooledTensor<'_> {
    type Target = Tensor;

    fn deref(&self) -> &Tensor {
        &self.tensor
    }
}

impl Drop for PooledTensor<'_> {
    fn drop(&mut self) {
        // An empty placeholder does not allocate.
        let t = std::mem::replace(&mut self.tensor, Tensor::zeros(vec![0]));
        self.pool.release(t);
    }
}
