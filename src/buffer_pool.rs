use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Free list of reusable byte buffers sized for one chunk.
///
/// Buffers are exclusively owned by whoever checked them out; the pool only
/// hands them out and takes them back. Contents are cleared on checkout.
#[derive(Debug)]
pub struct BufferPool {
    capacity: usize,
    max_retained: usize,
    free: Mutex<Vec<Vec<u8>>>,
    allocated: AtomicUsize,
}

impl BufferPool {
    /// Pool of buffers with at least `capacity` bytes, keeping up to
    /// `max_retained` idle buffers around for reuse.
    pub fn new(capacity: usize, max_retained: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            max_retained,
            free: Mutex::new(Vec::with_capacity(max_retained)),
            allocated: AtomicUsize::new(0),
        })
    }

    /// Check out an empty buffer; it goes back to the pool when dropped.
    pub fn acquire(self: &Arc<Self>) -> PooledBuffer {
        let reused = self.free.lock().unwrap_or_else(PoisonError::into_inner).pop();
        let mut buf = reused.unwrap_or_else(|| {
            self.allocated.fetch_add(1, Ordering::Relaxed);
            Vec::with_capacity(self.capacity)
        });
        buf.clear();
        PooledBuffer {
            buf: Some(buf),
            pool: Arc::clone(self),
        }
    }

    /// Return a buffer for future reuse. Undersized or surplus buffers are freed.
    pub fn release(&self, buf: Vec<u8>) {
        if buf.capacity() < self.capacity {
            return;
        }
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.max_retained {
            free.push(buf);
        }
    }

    /// Minimum capacity of handed out buffers
    pub fn buffer_capacity(&self) -> usize {
        self.capacity
    }

    /// Number of buffers allocated over the pool's lifetime
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    /// Number of idle buffers waiting for reuse
    pub fn idle(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// A buffer checked out of a [`BufferPool`], released back on drop.
#[derive(Debug)]
pub struct PooledBuffer {
    buf: Option<Vec<u8>>,
    pool: Arc<BufferPool>,
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        // only `None` inside `drop`
        self.buf.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        self.buf.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffers_are_reused() {
        let pool = BufferPool::new(64, 4);
        {
            let mut buf = pool.acquire();
            assert!(buf.capacity() >= 64);
            buf.extend_from_slice(b"10.0.0.1\n");
        }
        assert_eq!(pool.idle(), 1);

        let buf = pool.acquire();
        assert!(buf.is_empty());
        assert_eq!(pool.allocated(), 1);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_surplus_buffers_are_freed() {
        let pool = BufferPool::new(16, 2);
        let buffers: Vec<_> = (0..5).map(|_| pool.acquire()).collect();
        assert_eq!(pool.allocated(), 5);
        drop(buffers);
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn test_released_on_early_return() {
        fn fails(pool: &Arc<BufferPool>) -> Result<(), String> {
            let mut buf = pool.acquire();
            buf.push(b'x');
            if buf.len() == 1 {
                return Err("scan failed".to_string());
            }
            Ok(())
        }

        let pool = BufferPool::new(16, 2);
        assert!(fails(&pool).is_err());
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_undersized_buffers_are_not_retained() {
        let pool = BufferPool::new(1024, 2);
        pool.release(Vec::with_capacity(8));
        assert_eq!(pool.idle(), 0);
    }
}
