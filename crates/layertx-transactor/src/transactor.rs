use std::fmt;
use std::sync::Arc;

use layertx_core::{BoxError, Context, Error, Result, recover};
use tracing::{debug, warn};

use crate::operator::ContextOperator;
use crate::options::{TxOption, build_options};
use crate::traits::{Beginner, CarrierAccessor, Transaction};

/// Runs units of work inside one physical transaction per call tree.
///
/// The outermost [`within_transaction`](Self::within_transaction) call begins
/// a transaction, stores it in the context passed to the unit of work and
/// commits or rolls it back once the work returns. Calls made with that
/// context (or anything derived from it) find the stored transaction and
/// simply run inside it: they never begin, commit or roll back.
///
/// The transactor keeps no per-call state, so one instance can serve any
/// number of independent call trees at once.
pub struct Transactor<B, A = ContextOperator<<B as Beginner>::Tx>>
where
    B: Beginner,
{
    beginner: Option<B>,
    accessor: Option<A>,
}

impl<B> Transactor<B>
where
    B: Beginner,
{
    /// Coordinate transactions of `beginner`, stored in the context under a
    /// key owned by this transactor.
    #[must_use]
    pub fn new(beginner: B) -> Self {
        Self {
            beginner: Some(beginner),
            accessor: Some(ContextOperator::new()),
        }
    }
}

impl<B, A> Transactor<B, A>
where
    B: Beginner,
    A: CarrierAccessor<B::Tx>,
{
    #[must_use]
    pub fn with_accessor(beginner: B, accessor: A) -> Self {
        Self {
            beginner: Some(beginner),
            accessor: Some(accessor),
        }
    }

    #[must_use]
    pub fn builder() -> TransactorBuilder<B, A> {
        TransactorBuilder {
            beginner: None,
            accessor: None,
        }
    }

    #[must_use]
    pub fn beginner(&self) -> Option<&B> {
        self.beginner.as_ref()
    }

    /// The transaction visible in `ctx`, if a scope of this transactor is
    /// active there.
    #[must_use]
    pub fn try_get_tx(&self, ctx: &Context) -> Option<Arc<B::Tx>> {
        self.accessor.as_ref()?.extract(ctx)
    }

    /// Run `f` inside a transaction, beginning one with default options if
    /// none is active in `ctx`.
    ///
    /// # Errors
    ///
    /// See [`within_transaction_with`](Self::within_transaction_with).
    pub fn within_transaction<T, F>(&self, ctx: &Context, f: F) -> Result<T>
    where
        F: FnOnce(&Context) -> std::result::Result<T, BoxError>,
    {
        self.within_transaction_with(ctx, Vec::new(), f)
    }

    /// Run `f` inside a transaction, beginning one with `options` if none is
    /// active in `ctx`.
    ///
    /// Options are ignored when an active transaction is reused.
    ///
    /// # Errors
    ///
    /// - [`Error::NilBeginner`] / [`Error::NilCarrierAccessor`] when the
    ///   transactor is missing a collaborator; nothing runs.
    /// - [`Error::Begin`] when the transaction cannot be started; `f` does
    ///   not run.
    /// - [`Error::RolledBack`] or [`Error::RollbackFailed`] wrapping the
    ///   failure of `f` (a returned error or a recovered panic).
    /// - [`Error::Commit`] when `f` succeeded but the commit did not.
    ///
    /// In a nested call the error of `f` is returned as is.
    pub fn within_transaction_with<T, F, I>(&self, ctx: &Context, options: I, f: F) -> Result<T>
    where
        F: FnOnce(&Context) -> std::result::Result<T, BoxError>,
        I: IntoIterator<Item = TxOption<B::Options>>,
    {
        let Some(beginner) = &self.beginner else {
            return Err(Error::NilBeginner);
        };
        let Some(accessor) = &self.accessor else {
            return Err(Error::NilCarrierAccessor);
        };

        if accessor.extract(ctx).is_some() {
            debug!("joining active transaction");
            return f(ctx).map_err(Error::from_boxed);
        }

        let tx = match beginner.begin_tx(ctx, build_options(options)) {
            Ok(tx) => Arc::new(tx),
            Err(source) => {
                warn!(error = %source, "failed to begin transaction");
                return Err(Error::Begin(source));
            }
        };
        debug!("began transaction");

        let tx_ctx = accessor.inject(ctx, Arc::clone(&tx));
        match recover(|| f(&tx_ctx).map_err(Error::from_boxed)) {
            Ok(value) => match tx.commit(ctx) {
                Ok(()) => {
                    debug!("committed transaction");
                    Ok(value)
                }
                Err(source) => {
                    warn!(error = %source, "failed to commit transaction");
                    Err(Error::Commit(source))
                }
            },
            Err(cause) => Err(roll_back(tx.as_ref(), ctx, cause)),
        }
    }
}

fn roll_back<T: Transaction>(tx: &T, ctx: &Context, cause: Error) -> Error {
    match tx.rollback(ctx) {
        Ok(()) => {
            debug!(cause = %cause, "rolled back transaction");
            Error::RolledBack {
                source: Box::new(cause),
            }
        }
        Err(rollback) => {
            warn!(cause = %cause, error = %rollback, "failed to roll back transaction");
            Error::RollbackFailed {
                source: Box::new(cause),
                rollback,
            }
        }
    }
}

impl<B, A> Clone for Transactor<B, A>
where
    B: Beginner + Clone,
    A: Clone,
{
    fn clone(&self) -> Self {
        Self {
            beginner: self.beginner.clone(),
            accessor: self.accessor.clone(),
        }
    }
}

impl<B, A> fmt::Debug for Transactor<B, A>
where
    B: Beginner,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transactor")
            .field("has_beginner", &self.beginner.is_some())
            .field("has_accessor", &self.accessor.is_some())
            .finish()
    }
}

/// Assembles a [`Transactor`] from optional collaborators.
///
/// A transactor built without a beginner or accessor is valid but reports a
/// configuration error from every call.
pub struct TransactorBuilder<B, A>
where
    B: Beginner,
{
    beginner: Option<B>,
    accessor: Option<A>,
}

impl<B, A> TransactorBuilder<B, A>
where
    B: Beginner,
    A: CarrierAccessor<B::Tx>,
{
    #[must_use]
    pub fn beginner(mut self, beginner: B) -> Self {
        self.beginner = Some(beginner);
        self
    }

    #[must_use]
    pub fn accessor(mut self, accessor: A) -> Self {
        self.accessor = Some(accessor);
        self
    }

    #[must_use]
    pub fn build(self) -> Transactor<B, A> {
        Transactor {
            beginner: self.beginner,
            accessor: self.accessor,
        }
    }
}
