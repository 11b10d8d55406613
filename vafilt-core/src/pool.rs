//! # Output Surface Pool
//!
//! A bounded set of reusable destination surfaces, fixed at session open.
//! Acquisition either fails immediately or blocks with a deadline; there
//! is no internal retry. A frame handed out by the pool returns its slot
//! through the frame's release hook, so the holder can treat it as any
//! other owned frame.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::frame::{Frame, FrameMeta};
use crate::vaproc::SurfaceId;

struct PoolInner {
    free: Mutex<Vec<SurfaceId>>,
    available: Condvar,
}

/// Fixed-capacity pool over the session's output surfaces. The pool hands
/// out slots; surface creation and destruction stay with the session.
pub struct SurfacePool {
    surfaces: Vec<SurfaceId>,
    inner: Arc<PoolInner>,
}

impl SurfacePool {
    pub fn new(surfaces: Vec<SurfaceId>) -> Self {
        let inner = Arc::new(PoolInner {
            free: Mutex::new(surfaces.clone()),
            available: Condvar::new(),
        });
        Self { surfaces, inner }
    }

    pub fn capacity(&self) -> usize {
        self.surfaces.len()
    }

    pub fn free_count(&self) -> usize {
        self.inner.free.lock().len()
    }

    /// All surfaces backing the pool, free or not. Used to bind the
    /// execution context to its render targets.
    pub fn surfaces(&self) -> &[SurfaceId] {
        &self.surfaces
    }

    /// Take a free surface now, or report exhaustion.
    pub fn try_acquire(&self) -> Option<Frame> {
        let surface = self.inner.free.lock().pop()?;
        Some(self.wrap(surface))
    }

    /// Take a free surface, waiting up to `timeout` for one to come back.
    pub fn acquire(&self, timeout: Duration) -> Option<Frame> {
        let mut free = self.inner.free.lock();
        if free.is_empty() {
            let deadline = std::time::Instant::now() + timeout;
            while free.is_empty() {
                if self.inner.available.wait_until(&mut free, deadline).timed_out() {
                    return None;
                }
            }
        }
        let surface = free.pop()?;
        drop(free);
        Some(self.wrap(surface))
    }

    fn wrap(&self, surface: SurfaceId) -> Frame {
        let inner = Arc::clone(&self.inner);
        Frame::with_release(surface, FrameMeta::default(), move |sid| {
            inner.free.lock().push(sid);
            inner.available.notify_one();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_of(n: u32) -> SurfacePool {
        SurfacePool::new((0..n).map(SurfaceId).collect())
    }

    #[test]
    fn exhaustion_fails_without_blocking() {
        let pool = pool_of(3);
        let held: Vec<Frame> = (0..3).map(|_| pool.try_acquire().unwrap()).collect();
        assert_eq!(pool.free_count(), 0);
        assert!(pool.try_acquire().is_none());
        drop(held);
        assert_eq!(pool.free_count(), 3);
    }

    #[test]
    fn dropped_frame_returns_its_slot() {
        let pool = pool_of(1);
        let frame = pool.try_acquire().unwrap();
        let surface = frame.surface();
        assert!(pool.try_acquire().is_none());
        drop(frame);
        let again = pool.try_acquire().unwrap();
        assert_eq!(again.surface(), surface);
    }

    #[test]
    fn acquire_times_out_when_nothing_comes_back() {
        let pool = pool_of(1);
        let _held = pool.try_acquire().unwrap();
        assert!(pool.acquire(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn acquire_wakes_when_a_frame_is_released() {
        let pool = Arc::new(pool_of(1));
        let held = pool.try_acquire().unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || pool.acquire(Duration::from_secs(5)).is_some())
        };
        std::thread::sleep(Duration::from_millis(20));
        drop(held);
        assert!(waiter.join().unwrap());
    }
}
