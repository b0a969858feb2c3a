//! Scratch-string pool, amortising the render allocations the filter
//! evaluator would otherwise make once per row (spec.md §5 "Resource
//! pools"). [`crate::filter::text`] keeps one pool per thread and checks out
//! a buffer for the lifetime of one column's row-visitor callback, clearing
//! and reusing it across rows instead of allocating a fresh `String` per
//! cell.
//!
//! Each checkout is scoped to one visitor callback and returned on every
//! exit path — modelled here with a guard whose `Drop` returns the buffer,
//! so early returns and panics both give it back.

use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};

pub struct BufferPool {
    free: Mutex<Vec<String>>,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferPool {
    pub fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
        }
    }

    pub fn get(&self) -> PooledBuffer<'_> {
        let buf = self.free.lock().pop().unwrap_or_default();
        PooledBuffer { pool: self, buf: Some(buf) }
    }
}

pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: Option<String>,
}

impl Deref for PooledBuffer<'_> {
    type Target = String;
    fn deref(&self) -> &String {
        self.buf.as_ref().expect("buffer taken before drop")
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut String {
        self.buf.as_mut().expect("buffer taken before drop")
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(mut buf) = self.buf.take() {
            buf.clear();
            self.pool.free.lock().push(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_returned_buffers() {
        let pool = BufferPool::new();
        {
            let mut buf = pool.get();
            buf.push_str("hello");
        }
        assert_eq!(pool.free.lock().len(), 1);
        let buf = pool.get();
        assert!(buf.is_empty());
        assert_eq!(pool.free.lock().len(), 0);
    }
}
