// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

//! Reusable encode buffers.
//!
//! A [`PooledBuffer`] goes back to its pool, emptied, whenever it is dropped,
//! whether the encode that used it succeeded or not.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, LazyLock};

use object_pool::{Pool, ReusableOwned};

use crate::config::CodecConfig;

static GLOBAL: LazyLock<BufferPool> = LazyLock::new(|| BufferPool::from_config(&CodecConfig::default()));

/// The process-wide pool used by the free encode functions.
pub fn global() -> &'static BufferPool {
    &GLOBAL
}

/// A thread-safe pool of byte buffers.
#[derive(Clone)]
pub struct BufferPool {
    pool: Arc<Pool<Vec<u8>>>,
    buffer_capacity: usize,
}

impl BufferPool {
    pub fn new(size: usize, buffer_capacity: usize) -> BufferPool {
        BufferPool {
            pool: Arc::new(Pool::new(size, move || Vec::with_capacity(buffer_capacity))),
            buffer_capacity: buffer_capacity,
        }
    }

    pub fn from_config(config: &CodecConfig) -> BufferPool {
        BufferPool::new(config.pool_size, config.buffer_capacity)
    }

    /// Takes an empty buffer, allocating a fresh one when the pool is dry.
    pub fn get(&self) -> PooledBuffer {
        let capacity = self.buffer_capacity;
        PooledBuffer {
            inner: self.pool.pull_owned(move || Vec::with_capacity(capacity)),
            buffer_capacity: capacity,
        }
    }

    /// Buffers currently waiting in the pool.
    pub fn available(&self) -> usize {
        self.pool.len()
    }
}

impl Default for BufferPool {
    fn default() -> BufferPool {
        BufferPool::from_config(&CodecConfig::default())
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("available", &self.pool.len())
            .field("buffer_capacity", &self.buffer_capacity)
            .finish()
    }
}

/// A buffer on loan from a [`BufferPool`].
pub struct PooledBuffer {
    inner: ReusableOwned<Vec<u8>>,
    buffer_capacity: usize,
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.inner
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.inner
    }
}

impl AsRef<[u8]> for PooledBuffer {
    fn as_ref(&self) -> &[u8] {
        self.inner.as_slice()
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.inner.clear();
        // one oversized payload should not pin its allocation in the pool
        if self.inner.capacity() > self.buffer_capacity * 16 {
            self.inner.shrink_to(self.buffer_capacity);
        }
    }
}

impl fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.inner.len())
            .field("capacity", &self.inner.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::thread;

    #[test]
    fn test_buffer_returns_empty() {
        let pool = BufferPool::new(1, 64);
        {
            let mut buf = pool.get();
            assert_eq!(0, pool.available());
            buf.extend_from_slice(b"<value><int>1</int></value>");
        }
        assert_eq!(1, pool.available());
        let buf = pool.get();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 27);
    }

    #[test]
    fn test_returned_on_error_path() {
        fn fails(pool: &BufferPool) -> std::io::Result<()> {
            let mut buf = pool.get();
            buf.write_all(b"partial")?;
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"))
        }
        let pool = BufferPool::new(2, 64);
        assert!(fails(&pool).is_err());
        assert_eq!(2, pool.available());
        assert!(pool.get().is_empty());
    }

    #[test]
    fn test_dry_pool_allocates() {
        let pool = BufferPool::new(0, 8);
        let a = pool.get();
        let b = pool.get();
        drop(a);
        drop(b);
        assert_eq!(2, pool.available());
    }

    #[test]
    fn test_oversized_buffer_shrinks() {
        let pool = BufferPool::new(1, 4);
        {
            let mut buf = pool.get();
            buf.resize(4096, 0);
        }
        assert!(pool.get().capacity() < 4096);
    }

    #[test]
    fn test_concurrent_use() {
        let pool = BufferPool::new(4, 32);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pool = pool.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        let mut buf = pool.get();
                        assert!(buf.is_empty());
                        write!(buf, "{}", i).unwrap();
                        assert_eq!(i.to_string().as_bytes(), &buf[..]);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(pool.available() >= 4);
    }
}
