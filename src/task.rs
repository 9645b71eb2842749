use std::{
    any::{type_name, Any},
    panic::{self, AssertUnwindSafe},
};

use crate::{Error, Result};

/// The closure a worker finally invokes.
pub type TaskFn = Box<dyn FnOnce() + Send + 'static>;

/// A dynamically typed argument for [`Task::from_callable`].
///
/// Build a list of them with the [`args!`](crate::args) macro.
pub type Arg = Box<dyn Any + Send>;

pub(crate) type Listener = Box<dyn Fn(usize) + Send + Sync>;
pub(crate) type PanicHandler = Box<dyn Fn(usize, &str) + Send + Sync>;

/// Hooks that workers invoke around every task.
pub(crate) struct TaskHooks {
    pub(crate) before_execute: Listener,
    pub(crate) after_execute: Listener,
    pub(crate) on_panic: PanicHandler,
}

impl Default for TaskHooks {
    fn default() -> Self {
        Self {
            before_execute: Box::new(|_| {}),
            after_execute: Box::new(|_| {}),
            on_panic: Box::new(|id, message| {
                tracing::error!(task = id, panic = message, "task panicked");
            }),
        }
    }
}

/// An immutable unit of work: a callable with every argument already
/// bound to it.
///
/// A `Task` can only be constructed in an executable state, so
/// workers never validate what they dequeue.
pub struct Task {
    pub(crate) id: usize,
    task_fn: TaskFn,
}

impl Task {
    /// Wraps a closure that has captured its own arguments.
    pub fn new<F>(task_fn: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            id: 0,
            task_fn: Box::new(task_fn),
        }
    }

    /// Binds `args` to `callable`, checking the argument count and
    /// each argument's type.
    ///
    /// # Errors
    ///
    /// - [`Error::TooFewArguments`] if `args` is shorter than the
    ///   callable's parameter list.
    /// - [`Error::TooManyArguments`] if it is longer.
    /// - [`Error::ArgumentType`] if an argument has the wrong type.
    ///
    /// # Examples
    ///
    /// ```
    /// use ratepool::{args, Error, Task};
    ///
    /// let add = |a: i32, b: i32| println!("{}", a + b);
    /// assert!(Task::from_callable(add, args![1, 2]).is_ok());
    ///
    /// let err = Task::from_callable(add, args![1]).err().unwrap();
    /// assert!(matches!(err, Error::TooFewArguments { expected: 2, got: 1 }));
    /// ```
    pub fn from_callable<C, P>(callable: C, args: Vec<Arg>) -> Result<Self>
    where
        C: Callable<P>,
    {
        Ok(Self {
            id: 0,
            task_fn: callable.bind(args)?,
        })
    }

    /// Runs the task and its hooks, isolating any panic so the calling
    /// worker survives.
    ///
    /// A panic in the task goes to the panic handler. A panic in a hook
    /// is logged; if `before_execute` panics the task does not run.
    pub(crate) fn run(self, hooks: &TaskHooks) {
        let id = self.id;
        let task_fn = self.task_fn;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            (hooks.before_execute)(id);
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task_fn)) {
                (hooks.on_panic)(id, panic_message(payload.as_ref()));
            }
            (hooks.after_execute)(id);
        }));
        if let Err(payload) = outcome {
            tracing::error!(
                task = id,
                panic = panic_message(payload.as_ref()),
                "task hook panicked"
            );
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("id", &self.id).finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "Box<dyn Any>"
    }
}

/// A function-like value whose arguments can be supplied at runtime.
///
/// Implemented for every `FnOnce` of up to eight parameters whose
/// parameter types are `Send + 'static`. The `P` parameter is a marker
/// (`fn(A, B, ..)`) that lets one closure type pick its implementation.
pub trait Callable<P>: Send + 'static {
    /// The number of parameters.
    const ARITY: usize;

    /// Consumes the callable and `args`, producing a closure with
    /// every argument bound.
    ///
    /// # Errors
    ///
    /// See [`Task::from_callable`].
    fn bind(self, args: Vec<Arg>) -> Result<TaskFn>;
}

fn check_arity(expected: usize, got: usize) -> Result<()> {
    if got < expected {
        Err(Error::TooFewArguments { expected, got })
    } else if got > expected {
        Err(Error::TooManyArguments { expected, got })
    } else {
        Ok(())
    }
}

fn downcast<T: Any>(next: Option<(usize, Arg)>, expected: usize) -> Result<T> {
    let (index, arg) = next.ok_or(Error::TooFewArguments {
        expected,
        got: expected - 1,
    })?;
    arg.downcast::<T>()
        .map(|value| *value)
        .map_err(|_| Error::ArgumentType {
            index,
            expected: type_name::<T>(),
        })
}

macro_rules! impl_callable {
    ($arity:literal $(, $param:ident $arg:ident)*) => {
        impl<F, $($param,)*> Callable<fn($($param,)*)> for F
        where
            F: FnOnce($($param),*) + Send + 'static,
            $($param: Send + 'static,)*
        {
            const ARITY: usize = $arity;

            #[allow(unused_mut, unused_variables)]
            fn bind(self, args: Vec<Arg>) -> Result<TaskFn> {
                check_arity(Self::ARITY, args.len())?;
                let mut args = args.into_iter().enumerate();
                $(let $arg = downcast::<$param>(args.next(), Self::ARITY)?;)*
                Ok(Box::new(move || self($($arg),*)))
            }
        }
    };
}

impl_callable!(0);
impl_callable!(1, A0 a0);
impl_callable!(2, A0 a0, A1 a1);
impl_callable!(3, A0 a0, A1 a1, A2 a2);
impl_callable!(4, A0 a0, A1 a1, A2 a2, A3 a3);
impl_callable!(5, A0 a0, A1 a1, A2 a2, A3 a3, A4 a4);
impl_callable!(6, A0 a0, A1 a1, A2 a2, A3 a3, A4 a4, A5 a5);
impl_callable!(7, A0 a0, A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6);
impl_callable!(8, A0 a0, A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7);
