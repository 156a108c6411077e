use std::fmt;
use std::sync::Arc;

use layertx_core::{BoxError, Context, Error, recover};

use crate::retry::{RetryPolicy, retry};

type ActionFn = dyn Fn(&Context) -> Result<(), Error> + Send + Sync;
type CompensationFn = dyn Fn(&Context, &Error) -> Result<(), Error> + Send + Sync;

/// The forward operation of a saga step.
///
/// Decorators consume the action and return a new one wrapping it, so the
/// decorator applied last runs outermost:
///
/// ```
/// # use std::time::Duration;
/// # use layertx_saga::{Action, ConstantRetry};
/// let action = Action::new(|_ctx| Ok(()))
///     .with_panic_recovery()
///     .with_retry(ConstantRetry::new(2, Duration::from_millis(10)));
/// ```
///
/// Here every retry attempt is individually protected against panics.
#[derive(Clone)]
pub struct Action {
    run: Arc<ActionFn>,
}

impl Action {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Context) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self::from_fn(move |ctx| f(ctx).map_err(Error::from_boxed))
    }

    /// Wrap a function that already reports [`Error`].
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Context) -> Result<(), Error> + Send + Sync + 'static,
    {
        Self { run: Arc::new(f) }
    }

    /// # Errors
    ///
    /// Returns whatever the wrapped operation and its decorators return.
    pub fn run(&self, ctx: &Context) -> Result<(), Error> {
        (self.run)(ctx)
    }

    #[must_use]
    pub fn with_panic_recovery(self) -> Self {
        let run = self.run;
        Self::from_fn(move |ctx| recover(|| run(ctx)))
    }

    #[must_use]
    pub fn with_retry<P>(self, policy: P) -> Self
    where
        P: RetryPolicy + 'static,
    {
        let run = self.run;
        Self::from_fn(move |ctx| retry(&policy, ctx, &*run))
    }

    /// Run `hook` first; an error from it is returned without running the
    /// action.
    #[must_use]
    pub fn with_before_hook<H>(self, hook: H) -> Self
    where
        H: Fn(&Context) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let run = self.run;
        Self::from_fn(move |ctx| {
            hook(ctx).map_err(Error::from_boxed)?;
            run(ctx)
        })
    }

    /// Pass the action's result through `hook`, which may keep or replace it.
    #[must_use]
    pub fn with_after_hook<H>(self, hook: H) -> Self
    where
        H: Fn(&Context, Result<(), Error>) -> Result<(), Error> + Send + Sync + 'static,
    {
        let run = self.run;
        Self::from_fn(move |ctx| hook(ctx, run(ctx)))
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Action")
    }
}

/// The undo operation of a saga step.
///
/// It receives the error that made the saga compensate. Decorators mirror
/// those of [`Action`] and hand the same error to every wrapped layer.
#[derive(Clone)]
pub struct Compensation {
    run: Arc<CompensationFn>,
}

impl Compensation {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Context, &Error) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self::from_fn(move |ctx, cause| f(ctx, cause).map_err(Error::from_boxed))
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Context, &Error) -> Result<(), Error> + Send + Sync + 'static,
    {
        Self { run: Arc::new(f) }
    }

    /// # Errors
    ///
    /// Returns whatever the wrapped operation and its decorators return.
    pub fn run(&self, ctx: &Context, cause: &Error) -> Result<(), Error> {
        (self.run)(ctx, cause)
    }

    #[must_use]
    pub fn with_panic_recovery(self) -> Self {
        let run = self.run;
        Self::from_fn(move |ctx, cause| recover(|| run(ctx, cause)))
    }

    #[must_use]
    pub fn with_retry<P>(self, policy: P) -> Self
    where
        P: RetryPolicy + 'static,
    {
        let run = self.run;
        Self::from_fn(move |ctx, cause| retry(&policy, ctx, |ctx| run(ctx, cause)))
    }

    #[must_use]
    pub fn with_before_hook<H>(self, hook: H) -> Self
    where
        H: Fn(&Context, &Error) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let run = self.run;
        Self::from_fn(move |ctx, cause| {
            hook(ctx, cause).map_err(Error::from_boxed)?;
            run(ctx, cause)
        })
    }

    #[must_use]
    pub fn with_after_hook<H>(self, hook: H) -> Self
    where
        H: Fn(&Context, &Error, Result<(), Error>) -> Result<(), Error> + Send + Sync + 'static,
    {
        let run = self.run;
        Self::from_fn(move |ctx, cause| hook(ctx, cause, run(ctx, cause)))
    }
}

impl fmt::Debug for Compensation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Compensation")
    }
}
