//! Fixed-capacity pools.
//!
//! Allocation never blocks; an empty pool is an error the caller records
//! as a stream-alloc statistic and recovers from by dropping the current
//! operation. Deallocation always returns to the originating pool (both
//! guard types do this on drop).

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

use bytes::BytesMut;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("pool exhausted")]
pub struct PoolExhausted;

/// Pool of raw encode/decode buffers of a fixed size B.
pub struct BufferPool {
    free: Mutex<Vec<BytesMut>>,
    buf_size: usize,
}

impl BufferPool {
    pub fn new(capacity: usize, buf_size: usize) -> Arc<Self> {
        let mut free = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            free.push(BytesMut::zeroed(buf_size));
        }
        Arc::new(BufferPool { free: Mutex::new(free), buf_size })
    }

    pub fn buf_size(&self) -> usize {
        self.buf_size
    }

    pub fn try_get(self: &Arc<Self>) -> Result<PooledBuf, PoolExhausted> {
        let mut free = self.free.lock().unwrap();
        let buf = free.pop().ok_or(PoolExhausted)?;
        Ok(PooledBuf { buf: Some(buf), pool: Arc::clone(self) })
    }

    pub fn available(&self) -> usize {
        self.free.lock().unwrap().len()
    }

    fn put(&self, mut buf: BytesMut) {
        buf.clear();
        buf.resize(self.buf_size, 0);
        self.free.lock().unwrap().push(buf);
    }
}

/// A buffer checked out of a [`BufferPool`]; returned on drop.
pub struct PooledBuf {
    buf: Option<BytesMut>,
    pool: Arc<BufferPool>,
}

impl Deref for PooledBuf {
    type Target = BytesMut;

    fn deref(&self) -> &BytesMut {
        self.buf.as_ref().unwrap()
    }
}

impl DerefMut for PooledBuf {
    fn deref_mut(&mut self) -> &mut BytesMut {
        self.buf.as_mut().unwrap()
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.put(buf);
        }
    }
}

impl std::fmt::Debug for PooledBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuf").field("len", &self.len()).finish()
    }
}

/// Slot accounting for live streams; bounds concurrent streams per client.
pub struct SlotPool {
    free: Mutex<usize>,
    capacity: usize,
}

impl SlotPool {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(SlotPool { free: Mutex::new(capacity), capacity })
    }

    pub fn try_acquire(self: &Arc<Self>) -> Result<SlotPermit, PoolExhausted> {
        let mut free = self.free.lock().unwrap();
        if *free == 0 {
            return Err(PoolExhausted);
        }
        *free -= 1;
        Ok(SlotPermit { pool: Arc::clone(self) })
    }

    pub fn available(&self) -> usize {
        *self.free.lock().unwrap()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn release(&self) {
        *self.free.lock().unwrap() += 1;
    }
}

/// One live-stream slot; released on drop.
pub struct SlotPermit {
    pool: Arc<SlotPool>,
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        self.pool.release();
    }
}

impl std::fmt::Debug for SlotPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SlotPermit")
    }
}
