use std::sync::Arc;

use layertx_core::{BoxError, Context};

/// One physical, in-flight transaction.
///
/// The coordinator calls exactly one of `commit` or `rollback`, exactly once,
/// on every handle it begins.
pub trait Transaction: Send + Sync + 'static {
    /// # Errors
    ///
    /// Returns the driver's error if the commit did not go through.
    fn commit(&self, ctx: &Context) -> Result<(), BoxError>;

    /// # Errors
    ///
    /// Returns the driver's error if the rollback did not go through.
    fn rollback(&self, ctx: &Context) -> Result<(), BoxError>;
}

/// Starts new transactions for one store.
pub trait Beginner {
    type Tx: Transaction;

    /// Driver-specific begin options, built by folding every
    /// [`TxOption`](crate::TxOption) over `Default::default()`.
    type Options: Default;

    /// # Errors
    ///
    /// Returns the driver's error if no transaction could be started.
    fn begin_tx(&self, ctx: &Context, options: Self::Options) -> Result<Self::Tx, BoxError>;
}

impl<B: Beginner + ?Sized> Beginner for Arc<B> {
    type Tx = B::Tx;
    type Options = B::Options;

    fn begin_tx(&self, ctx: &Context, options: Self::Options) -> Result<Self::Tx, BoxError> {
        (**self).begin_tx(ctx, options)
    }
}

/// Stores a transaction handle in a [`Context`] and finds it again.
pub trait CarrierAccessor<T> {
    /// Return a context in which `extract` yields `tx`.
    fn inject(&self, ctx: &Context, tx: Arc<T>) -> Context;

    fn extract(&self, ctx: &Context) -> Option<Arc<T>>;
}

impl<T, A: CarrierAccessor<T> + ?Sized> CarrierAccessor<T> for Arc<A> {
    fn inject(&self, ctx: &Context, tx: Arc<T>) -> Context {
        (**self).inject(ctx, tx)
    }

    fn extract(&self, ctx: &Context) -> Option<Arc<T>> {
        (**self).extract(ctx)
    }
}
