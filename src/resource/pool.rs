//! Free-list of read buffers for streamed resources
//!
//! Borrowing never blocks: an empty pool allocates. Returning never blocks: a
//! full pool drops the buffer, which bounds the memory parked in the list.

use crossbeam_queue::ArrayQueue;

/// Bounded lock-free buffer pool
#[derive(Debug)]
pub struct BufferPool {
    free: ArrayQueue<Vec<u8>>,
}

impl BufferPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            free: ArrayQueue::new(capacity.max(1)),
        }
    }

    /// Borrow a buffer of at least `size` bytes
    pub fn acquire(&self, size: usize) -> Vec<u8> {
        match self.free.pop() {
            Some(mut buffer) => {
                if buffer.len() < size {
                    buffer.resize(size, 0);
                }
                buffer
            }
            None => vec![0; size],
        }
    }

    /// Return a buffer; dropped if the pool is already full
    pub fn release(&self, buffer: Vec<u8>) {
        let _ = self.free.push(buffer);
    }

    /// Buffers currently parked in the pool
    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn capacity(&self) -> usize {
        self.free.capacity()
    }
}
