use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use layertx_core::{Context, ContextKey};

use crate::traits::CarrierAccessor;

/// Default [`CarrierAccessor`]: stores the handle under a key of its own.
///
/// Every operator created with [`ContextOperator::new`] gets a fresh key, so
/// two coordinators never see each other's transactions. Clones share the
/// key.
pub struct ContextOperator<T> {
    key: ContextKey,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ContextOperator<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_key(ContextKey::unique())
    }

    /// Use a caller-chosen key, e.g. to share transactions between two
    /// coordinators over the same store.
    #[must_use]
    pub fn with_key(key: ContextKey) -> Self {
        Self {
            key,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn key(&self) -> ContextKey {
        self.key
    }
}

impl<T> Default for ContextOperator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ContextOperator<T> {
    fn clone(&self) -> Self {
        Self::with_key(self.key)
    }
}

impl<T> fmt::Debug for ContextOperator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextOperator")
            .field("key", &self.key)
            .finish()
    }
}

impl<T> CarrierAccessor<T> for ContextOperator<T>
where
    T: Any + Send + Sync,
{
    fn inject(&self, ctx: &Context, tx: Arc<T>) -> Context {
        ctx.with_value(self.key, tx)
    }

    fn extract(&self, ctx: &Context) -> Option<Arc<T>> {
        ctx.value::<T>(self.key)
    }
}
