use thiserror::Error;

/// Result type alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned synchronously by the pool and task constructors.
///
/// A task that panics while running is not an error of this kind; it
/// is reported to the panic handler set with
/// [`PoolBuilder::panic_handler`](crate::PoolBuilder::panic_handler).
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration was rejected before any worker was started.
    #[error("invalid config: {field} {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: &'static str,
    },

    /// Fewer arguments than the callable declares.
    #[error("call with too few input arguments (expected {expected}, got {got})")]
    TooFewArguments { expected: usize, got: usize },

    /// More arguments than the callable declares.
    #[error("call with too many input arguments (expected {expected}, got {got})")]
    TooManyArguments { expected: usize, got: usize },

    /// The argument at `index` does not have the parameter's type.
    #[error("argument {index} is not of type `{expected}`")]
    ArgumentType {
        index: usize,
        expected: &'static str,
    },

    /// The pool has been closed.
    #[error("the pool is closed")]
    Closed,

    /// The OS refused to spawn a worker thread.
    #[error("failed to spawn a worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}
