use parking_lot::{Condvar, Mutex};

/// Counts tasks that were accepted but have not finished yet.
///
/// The pool increments the count before a task reaches the queue and
/// decrements it after a worker ran it, so a waiter can never observe
/// zero while an accepted task is still in flight.
#[derive(Debug, Default)]
pub(crate) struct CompletionTracker {
    pending: Mutex<usize>,
    drained: Condvar,
}

impl CompletionTracker {
    pub(crate) fn add(&self, n: usize) {
        *self.pending.lock() += n;
    }

    pub(crate) fn done(&self) {
        let mut pending = self.pending.lock();
        debug_assert!(*pending > 0, "done() without a matching add()");
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.drained.notify_all();
        }
    }

    /// Blocks until the count reaches zero.
    pub(crate) fn wait(&self) {
        let mut pending = self.pending.lock();
        while *pending > 0 {
            self.drained.wait(&mut pending);
        }
    }

    pub(crate) fn pending(&self) -> usize {
        *self.pending.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::CompletionTracker;
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        thread,
        time::Duration,
    };

    #[test]
    fn test_wait_on_zero_returns() {
        CompletionTracker::default().wait();
    }

    #[test]
    fn test_wait_blocks_until_done() {
        let tracker = Arc::new(CompletionTracker::default());
        let finished = Arc::new(AtomicBool::new(false));
        tracker.add(2);

        let handle = {
            let tracker = tracker.clone();
            let finished = finished.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                tracker.done();
                thread::sleep(Duration::from_millis(50));
                finished.store(true, Ordering::SeqCst);
                tracker.done();
            })
        };

        tracker.wait();
        assert!(finished.load(Ordering::SeqCst));
        assert_eq!(0, tracker.pending());
        handle.join().unwrap();
    }
}
