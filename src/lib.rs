//! # Rate-limited Thread Pool
//!
//! A pool runs submitted tasks on a fixed set of worker threads. Tasks
//! wait in a bounded queue, so a fast submitter is slowed down to the
//! pace of the workers instead of exhausting memory. An optional
//! admission gate caps how many tasks per second are accepted.
//!
//! # Build a pool
//!
//! Use [`Pool::new`] with a [`PoolConfig`], or the [`PoolBuilder`] for
//! listeners, a custom rate limiter, a panic handler or a thread
//! factory.
//!
//! # Examples
//!
//! ```
//! use ratepool::{args, Pool, PoolConfig};
//!
//! fn double(input: i32) {
//!     println!("2 * {} = {}", input, 2 * input);
//! }
//!
//! fn sum(a: i32, b: i32) {
//!     println!("{} + {} = {}", a, b, a + b);
//! }
//!
//! let pool = Pool::new(PoolConfig::default()).unwrap();
//!
//! for i in 0..3 {
//!     pool.submit(double, args![i]).unwrap();
//!     pool.submit(sum, args![i, i + 1]).unwrap();
//!     pool.execute(move || println!("{} ^ 2 = {}", i, i * i)).unwrap();
//! }
//!
//! // Wait for all tasks and stop the worker threads.
//! pool.close();
//! ```

mod builder;
mod error;
mod limiter;
mod pool;
mod task;
mod tracker;
mod worker;

pub use builder::*;
pub use error::*;
pub use limiter::*;
pub use pool::*;
pub use task::{Arg, Callable, Task, TaskFn};

/// Builds the `Vec<Arg>` argument list of [`Pool::submit`] and
/// [`Task::from_callable`].
///
/// ```
/// let args = ratepool::args![1, "two", 3.0f64];
/// assert_eq!(3, args.len());
/// ```
#[macro_export]
macro_rules! args {
    ($($arg:expr),* $(,)?) => {
        ::std::vec![$(::std::boxed::Box::new($arg) as $crate::Arg),*]
    };
}
