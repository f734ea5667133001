//! Counting semaphore used as the admission gate for parallel queries.
//!
//! Uses `Mutex + Condvar` from std. A closed gate admits nobody, which is how
//! the query runner stops scheduling after the first failure.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

struct State {
    permits: usize,
    closed: bool,
}

/// A counting semaphore that can be closed.
pub struct Semaphore {
    state: Mutex<State>,
    cond: Condvar,
}

/// RAII permit; releases its slot on drop.
pub struct Permit<'a>(&'a Semaphore);

impl Semaphore {
    /// Create a semaphore with `permits` initial permits.
    pub fn new(permits: usize) -> Self {
        Self {
            state: Mutex::new(State {
                permits,
                closed: false,
            }),
            cond: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until a permit is available, then take it.
    ///
    /// Returns `None` once the semaphore is closed, including for callers
    /// already waiting when it closes.
    pub fn acquire(&self) -> Option<Permit<'_>> {
        let mut state = self.lock();
        while state.permits == 0 && !state.closed {
            state = self.cond.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        if state.closed {
            return None;
        }
        state.permits -= 1;
        Some(Permit(self))
    }

    /// Stop admitting; outstanding permits stay valid until dropped.
    pub fn close(&self) {
        self.lock().closed = true;
        self.cond.notify_all();
    }

    #[cfg(test)]
    fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let mut state = self.0.lock();
        state.permits += 1;
        self.0.cond.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn available(sem: &Semaphore) -> usize {
        sem.lock().permits
    }

    #[test]
    fn acquire_and_release() {
        let sem = Semaphore::new(2);
        let p1 = sem.acquire().unwrap();
        let _p2 = sem.acquire().unwrap();
        assert_eq!(available(&sem), 0);
        drop(p1);
        assert_eq!(available(&sem), 1);
    }

    #[test]
    fn blocking_acquire() {
        let sem = Arc::new(Semaphore::new(1));
        let permit = sem.acquire().unwrap();

        let sem2 = sem.clone();
        let handle = std::thread::spawn(move || sem2.acquire().map(|_| 42));

        // Give thread time to block
        std::thread::sleep(Duration::from_millis(50));
        drop(permit);

        assert_eq!(handle.join().unwrap(), Some(42));
    }

    #[test]
    fn closed_refuses_new_permits() {
        let sem = Semaphore::new(3);
        let held = sem.acquire().unwrap();
        sem.close();
        assert!(sem.is_closed());
        assert!(sem.acquire().is_none());
        drop(held);
        assert!(sem.acquire().is_none());
    }

    #[test]
    fn close_wakes_waiters() {
        let sem = Arc::new(Semaphore::new(1));
        let _held = sem.acquire().unwrap();

        let sem2 = sem.clone();
        let handle = std::thread::spawn(move || sem2.acquire().is_none());

        std::thread::sleep(Duration::from_millis(50));
        sem.close();

        assert!(handle.join().unwrap());
    }
}
