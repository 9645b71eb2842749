use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};

use crossbeam_channel::Receiver;

use crate::{
    task::{Task, TaskHooks},
    tracker::CompletionTracker,
    Result, ThreadFactory,
};

/// A worker holds the handle of a thread that drains the task queue.
pub(crate) struct Worker {
    pub(crate) index: usize,
    pub(crate) handle: JoinHandle<()>,
}

/// Everything a worker thread needs besides its receiver.
pub(crate) struct WorkerContext {
    pub(crate) tracker: Arc<CompletionTracker>,
    pub(crate) hooks: Arc<TaskHooks>,
}

/// Marks one task finished when dropped, even while unwinding.
struct Done<'a>(&'a CompletionTracker);

impl Drop for Done<'_> {
    fn drop(&mut self) {
        self.0.done();
    }
}

impl Worker {
    /// Spawns a thread that runs tasks from `receiver` until the
    /// channel is disconnected and empty.
    pub(crate) fn spawn(
        index: usize,
        thread_factory: &ThreadFactory,
        receiver: Receiver<Task>,
        context: WorkerContext,
    ) -> Result<Self> {
        let handle = thread_factory(index).spawn(move || {
            tracing::debug!(worker = index, "worker started");
            while let Ok(task) = receiver.recv() {
                tracing::trace!(worker = index, task = task.id, "running task");
                let _done = Done(&context.tracker);
                task.run(&context.hooks);
            }
            tracing::debug!(worker = index, "worker exited");
        })?;
        Ok(Worker { index, handle })
    }

    #[inline]
    pub(crate) fn is_current(&self) -> bool {
        self.handle.thread().id() == thread::current().id()
    }

    #[inline]
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    #[inline]
    pub(crate) fn join(self) -> thread::Result<()> {
        if !self.is_current() {
            self.handle.join()?
        }
        Ok(())
    }
}
