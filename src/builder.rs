use std::{num::NonZeroU32, sync::Arc, thread};

use crate::{
    task::TaskHooks, Error, GovernorLimiter, Limiter, Pool, Result, ThreadFactory,
};

/// The plain configuration of a [`Pool`].
///
/// # Examples
///
/// ```
/// use ratepool::{Pool, PoolConfig};
///
/// let pool = Pool::new(PoolConfig {
///     requests_per_second: 0,
///     queue_capacity: 4,
///     worker_count: 2,
/// })
/// .unwrap();
/// assert_eq!(2, pool.worker_count());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Average admission rate; 0 disables rate limiting.
    pub requests_per_second: u32,
    /// Capacity of the task queue; must be positive.
    pub queue_capacity: usize,
    /// Number of worker threads. A pool with no workers accepts tasks
    /// but never runs them, so `wait` on it blocks forever.
    pub worker_count: usize,
}

impl Default for PoolConfig {
    /// - `requests_per_second`: 0
    /// - `queue_capacity`: twice the number of logical CPUs
    /// - `worker_count`: the number of logical CPUs
    fn default() -> Self {
        Self {
            requests_per_second: 0,
            queue_capacity: 2 * num_cpus::get(),
            worker_count: num_cpus::get(),
        }
    }
}

impl PoolConfig {
    /// Checks every field.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] naming the first field that is out of
    /// range.
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::InvalidConfig {
                field: "queue_capacity",
                reason: "must be positive",
            });
        }
        Ok(())
    }
}

/// A builder of the [`Pool`], for configuration beyond [`PoolConfig`].
///
/// # Examples
///
/// ```
/// use ratepool::PoolBuilder;
///
/// let pool = PoolBuilder::default()
///     .worker_count(3)
///     .queue_capacity(16)
///     .requests_per_second(100)
///     .listener_before_execute(|id| println!("task {} starts.", id))
///     .listener_after_execute(|id| println!("task {} has finished.", id))
///     .panic_handler(|id, message| eprintln!("task {} panicked: {}", id, message))
///     .thread_factory_fn(|index| {
///         std::thread::Builder::new()
///             .name(format!("io-{}", index))
///             .stack_size(256 * 1024)
///     })
///     .build()
///     .unwrap();
///
/// pool.execute(|| println!("Hello World")).unwrap();
/// pool.close();
/// ```
pub struct PoolBuilder {
    pub(crate) config: PoolConfig,
    pub(crate) limiter: Option<Arc<dyn Limiter>>,
    pub(crate) hooks: TaskHooks,
    pub(crate) thread_factory: Arc<ThreadFactory>,
}

impl Default for PoolBuilder {
    /// Creates a builder with [`PoolConfig::default`], no injected
    /// limiter, empty listeners, a panic handler that logs through
    /// `tracing`, and threads named `ratepool-worker-{index}`.
    fn default() -> Self {
        Self::from_config(PoolConfig::default())
    }
}

impl PoolBuilder {
    /// See [`PoolBuilder::default`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration.
    #[must_use]
    pub fn from_config(config: PoolConfig) -> Self {
        Self {
            config,
            limiter: None,
            hooks: TaskHooks::default(),
            thread_factory: Arc::new(|index| {
                thread::Builder::new().name(format!("ratepool-worker-{index}"))
            }),
        }
    }

    /// Sets the admission rate; 0 disables rate limiting.
    #[must_use]
    pub fn requests_per_second(mut self, rate: u32) -> Self {
        self.config.requests_per_second = rate;
        self
    }

    /// Sets the capacity of the bounded task queue.
    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Sets the number of worker threads.
    #[must_use]
    pub fn worker_count(mut self, count: usize) -> Self {
        self.config.worker_count = count;
        self
    }

    /// Injects an admission gate. It takes precedence over
    /// [`requests_per_second`](Self::requests_per_second).
    #[must_use]
    pub fn limiter(mut self, limiter: Arc<dyn Limiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Sets the listener invoked with the task id before a task runs.
    #[must_use]
    pub fn listener_before_execute<F>(mut self, listener: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.hooks.before_execute = Box::new(listener);
        self
    }

    /// Sets the listener invoked with the task id after a task ran,
    /// including after a panic.
    #[must_use]
    pub fn listener_after_execute<F>(mut self, listener: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.hooks.after_execute = Box::new(listener);
        self
    }

    /// Sets the function that receives the task id and the panic
    /// message of a panicking task.
    #[must_use]
    pub fn panic_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(usize, &str) + Send + Sync + 'static,
    {
        self.hooks.on_panic = Box::new(handler);
        self
    }

    /// Sets the factory used to create worker threads. It receives the
    /// index of the worker, starting at 0.
    #[must_use]
    pub fn thread_factory_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) -> thread::Builder + Send + Sync + 'static,
    {
        self.thread_factory = Arc::new(f);
        self
    }

    /// Validates the configuration and starts the pool.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if a field is out of range; no thread
    ///   is started.
    /// - [`Error::Spawn`] if a worker thread could not be created.
    pub fn build(mut self) -> Result<Pool> {
        self.config.validate()?;
        if self.limiter.is_none() {
            self.limiter = NonZeroU32::new(self.config.requests_per_second)
                .map(|rate| Arc::new(GovernorLimiter::per_second(rate)) as Arc<dyn Limiter>);
        }
        Pool::from_builder(self)
    }
}
