use crate::{
    task::{Arg, Callable, Task},
    tracker::CompletionTracker,
    worker::{Worker, WorkerContext},
    Error, Limiter, PoolBuilder, PoolConfig, Result,
};

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
};

/// A function that used to create a custom worker thread.
pub type ThreadFactory = dyn Fn(usize) -> thread::Builder + Send + Sync + 'static;

/// A `Pool` consists of a fixed set of worker threads and a bounded
/// channel that holds submitted tasks until a worker claims them.
///
/// # Admission
///
/// Before a task enters the channel the pool takes a permit from its
/// admission gate, if one is configured (see
/// [`PoolConfig::requests_per_second`] and [`PoolBuilder::limiter`]).
/// The submitting thread blocks until the permit is granted.
///
/// # Bounded Channel(Queue)
///
/// The channel holds at most `queue_capacity` tasks. When it is full,
/// submission blocks until a worker frees a slot; tasks are never
/// dropped.
///
/// # Worker Thread
///
/// All `worker_count` workers are started by the constructor. Each
/// keeps receiving and running tasks until the pool is closed and the
/// channel is empty. A task that panics is reported to the panic
/// handler and its worker keeps running.
///
/// # Completion
///
/// Every accepted task is counted before it is enqueued and uncounted
/// after it ran. [`Pool::wait`] blocks until the count drops to zero;
/// [`Pool::close`] waits, closes the channel and joins every worker.
///
/// Calling `wait` or `close` from inside a task never returns, because
/// the calling task is itself outstanding. Dropping the last handle of
/// a pool inside a task is fine: the queue is closed and the workers
/// exit on their own once it is drained.
pub struct Pool {
    sender: Mutex<Option<Sender<Task>>>,
    // Keeps the channel connected for a pool without workers.
    _receiver: Receiver<Task>,
    workers: Mutex<Option<Vec<Worker>>>,
    pub(crate) limiter: Option<Arc<dyn Limiter>>,
    tracker: Arc<CompletionTracker>,
    next_task_id: AtomicUsize,
    worker_count: usize,
}

impl Pool {
    /// Validates `config` and starts a pool with `worker_count`
    /// running workers.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`]: a field is out of range. No worker is
    ///   started.
    /// - [`Error::Spawn`]: a worker thread could not be created.
    pub fn new(config: PoolConfig) -> Result<Self> {
        PoolBuilder::from_config(config).build()
    }

    /// Returns a builder with the default configuration.
    #[must_use]
    pub fn builder() -> PoolBuilder {
        PoolBuilder::default()
    }

    /// Starts the workers. This assumes the builder was validated.
    pub(crate) fn from_builder(builder: PoolBuilder) -> Result<Self> {
        let PoolBuilder {
            config,
            limiter,
            hooks,
            thread_factory,
        } = builder;

        if config.worker_count == 0 {
            tracing::warn!("pool has no workers; submitted tasks will never run");
        }

        let (sender, receiver) = bounded(config.queue_capacity);
        let tracker = Arc::new(CompletionTracker::default());
        let hooks = Arc::new(hooks);

        let mut workers = Vec::with_capacity(config.worker_count);
        for index in 0..config.worker_count {
            let context = WorkerContext {
                tracker: tracker.clone(),
                hooks: hooks.clone(),
            };
            match Worker::spawn(index, &*thread_factory, receiver.clone(), context) {
                Ok(worker) => workers.push(worker),
                Err(err) => {
                    // Disconnect the channel so the started workers exit.
                    drop(sender);
                    Self::join_workers(Some(workers));
                    return Err(err);
                }
            }
        }

        tracing::debug!(
            workers = config.worker_count,
            queue_capacity = config.queue_capacity,
            requests_per_second = config.requests_per_second,
            rate_limited = limiter.is_some(),
            "pool started"
        );

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            _receiver: receiver,
            workers: Mutex::new(Some(workers)),
            limiter,
            tracker,
            next_task_id: AtomicUsize::new(0),
            worker_count: config.worker_count,
        })
    }

    /// Binds `args` to `callable` and submits the resulting task.
    ///
    /// # Errors
    ///
    /// - [`Error::TooFewArguments`], [`Error::TooManyArguments`],
    ///   [`Error::ArgumentType`]: the task could not be built. The pool
    ///   is left untouched.
    /// - [`Error::Closed`]: the pool is closed.
    ///
    /// # Examples
    ///
    /// ```
    /// use ratepool::{args, Error, Pool, PoolConfig};
    ///
    /// fn sum(a: i32, b: i32) {
    ///     println!("{} + {} = {}", a, b, a + b);
    /// }
    ///
    /// let pool = Pool::new(PoolConfig::default()).unwrap();
    /// pool.submit(sum, args![1, 2]).unwrap();
    ///
    /// let err = pool.submit(sum, args![1]).unwrap_err();
    /// assert!(matches!(err, Error::TooFewArguments { .. }));
    /// pool.close();
    /// ```
    pub fn submit<C, P>(&self, callable: C, args: Vec<Arg>) -> Result<()>
    where
        C: Callable<P>,
    {
        let task = Task::from_callable(callable, args)?;
        self.publish_task(task)
    }

    /// Submits a closure that has captured its own arguments.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`]: the pool is closed.
    ///
    /// # Examples
    ///
    /// ```
    /// use ratepool::Pool;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    ///
    /// let pool = Pool::builder().worker_count(4).build().unwrap();
    ///
    /// let sum = Arc::new(AtomicUsize::new(0));
    /// for _ in 0..10 {
    ///     let sum = sum.clone();
    ///     pool.execute(move || {
    ///         sum.fetch_add(1, Ordering::SeqCst);
    ///     })
    ///     .unwrap();
    /// }
    ///
    /// // Block the current thread until every task has run.
    /// pool.wait();
    /// assert_eq!(10, sum.load(Ordering::Relaxed));
    /// ```
    pub fn execute<F>(&self, task_fn: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.publish_task(Task::new(task_fn))
    }

    /// Enqueues an already built task.
    ///
    /// Blocks on the admission gate, if any, and then while the queue
    /// is full.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`]: the pool is closed. The task is dropped
    /// without running.
    pub fn publish_task(&self, mut task: Task) -> Result<()> {
        // A cloned sender keeps the channel open for this task even if
        // the pool is closed meanwhile.
        let sender = self.sender.lock().clone().ok_or(Error::Closed)?;

        if let Some(limiter) = &self.limiter {
            limiter.take();
        }

        task.id = self.next_task_id.fetch_add(1, Ordering::Relaxed);
        self.tracker.add(1);
        if sender.send(task).is_err() {
            self.tracker.done();
            return Err(Error::Closed);
        }
        Ok(())
    }

    /// Blocks until every submitted task has completed.
    ///
    /// Returns immediately if nothing is outstanding. The pool keeps
    /// accepting tasks afterwards.
    pub fn wait(&self) {
        self.tracker.wait();
    }

    /// Waits for all tasks, closes the queue and joins every worker
    /// thread.
    ///
    /// Calling it again is a no-op. It is also called when the pool is
    /// dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use ratepool::{Error, Pool};
    ///
    /// let pool = Pool::builder().build().unwrap();
    /// pool.close();
    ///
    /// assert!(pool.is_closed());
    /// assert_eq!(0, pool.active_count());
    /// assert!(matches!(pool.execute(|| ()), Err(Error::Closed)));
    /// ```
    pub fn close(&self) {
        self.wait();
        if self.sender.lock().take().is_none() {
            return;
        }
        Self::join_workers(self.workers.lock().take());
        tracing::debug!("pool closed");
    }

    /// Returns `true` if the pool is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// The number of workers the pool was started with.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Counts the worker threads that are still running.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.workers.lock().as_ref().map_or(0, |workers| {
            workers.iter().filter(|worker| !worker.is_finished()).count()
        })
    }

    /// The number of accepted tasks that have not finished yet.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tracker.pending()
    }

    fn on_worker_thread(&self) -> bool {
        self.workers
            .lock()
            .as_ref()
            .is_some_and(|workers| workers.iter().any(Worker::is_current))
    }

    fn join_workers(workers: Option<Vec<Worker>>) {
        for worker in workers.into_iter().flatten() {
            let index = worker.index;
            if worker.join().is_err() {
                tracing::error!(worker = index, "worker thread panicked");
            }
        }
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        if self.on_worker_thread() {
            // The running task is still outstanding, so waiting here
            // would never return. Disconnect the channel and detach the
            // workers; each exits once the queue is drained.
            self.sender.lock().take();
            self.workers.lock().take();
            tracing::debug!("pool dropped on a worker thread; workers detached");
            return;
        }
        self.close();
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("worker_count", &self.worker_count)
            .field("rate_limited", &self.limiter.is_some())
            .field("pending", &self.pending())
            .field("closed", &self.is_closed())
            .finish()
    }
}
