use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Identity under which a value is stored in a [`Context`].
///
/// Keys are never reused within a process, so two owners that each call
/// [`ContextKey::unique`] can never observe each other's entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextKey(u64);

impl ContextKey {
    /// Allocate a key no other caller has been given.
    #[must_use]
    pub fn unique() -> Self {
        Self(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-key#{}", self.0)
    }
}

/// Why a context stopped accepting new work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum Interruption {
    #[error("context cancelled")]
    Cancelled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

struct Entry {
    key: ContextKey,
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<Entry>>,
}

struct Signal {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    parent: Option<Arc<Signal>>,
}

impl Signal {
    fn check(&self) -> Result<(), Interruption> {
        let mut current = Some(self);
        while let Some(signal) = current {
            if signal.cancelled.load(Ordering::Acquire) {
                return Err(Interruption::Cancelled);
            }
            if signal
                .deadline
                .is_some_and(|deadline| Instant::now() >= deadline)
            {
                return Err(Interruption::DeadlineExceeded);
            }
            current = signal.parent.as_deref();
        }
        Ok(())
    }
}

/// Request-scoped state threaded through a call tree.
///
/// A context is immutable. Deriving a child (`with_value`, `with_cancel`,
/// `with_deadline`) returns a new value that overlays the parent; the parent
/// keeps seeing exactly what it saw before. Cloning is cheap.
#[derive(Clone, Default)]
pub struct Context {
    values: Option<Arc<Entry>>,
    signal: Option<Arc<Signal>>,
}

impl Context {
    /// The empty root context: no values, never cancelled.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a context in which `key` resolves to `value`.
    #[must_use]
    pub fn with_value<T>(&self, key: ContextKey, value: Arc<T>) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            values: Some(Arc::new(Entry {
                key,
                value,
                parent: self.values.clone(),
            })),
            signal: self.signal.clone(),
        }
    }

    /// Look up the innermost value stored under `key`.
    ///
    /// Returns `None` when nothing is stored under the key or when the stored
    /// value is not a `T`.
    #[must_use]
    pub fn value<T>(&self, key: ContextKey) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let mut current = self.values.as_deref();
        while let Some(entry) = current {
            if entry.key == key {
                return Arc::clone(&entry.value).downcast::<T>().ok();
            }
            current = entry.parent.as_deref();
        }
        None
    }

    #[must_use]
    pub fn contains(&self, key: ContextKey) -> bool {
        let mut current = self.values.as_deref();
        while let Some(entry) = current {
            if entry.key == key {
                return true;
            }
            current = entry.parent.as_deref();
        }
        false
    }

    /// Derive a cancellable context.
    ///
    /// Cancelling the returned handle interrupts the new context and every
    /// context later derived from it, but not `self`.
    #[must_use]
    pub fn with_cancel(&self) -> (Self, CancelHandle) {
        let signal = Arc::new(Signal {
            cancelled: AtomicBool::new(false),
            deadline: None,
            parent: self.signal.clone(),
        });
        let handle = CancelHandle {
            signal: Arc::clone(&signal),
        };
        let ctx = Self {
            values: self.values.clone(),
            signal: Some(signal),
        };
        (ctx, handle)
    }

    /// Derive a context that is interrupted once `deadline` has passed.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self {
            values: self.values.clone(),
            signal: Some(Arc::new(Signal {
                cancelled: AtomicBool::new(false),
                deadline: Some(deadline),
                parent: self.signal.clone(),
            })),
        }
    }

    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a context that keeps every value of `self` but ignores its
    /// cancellation and deadlines.
    #[must_use]
    pub fn without_cancel(&self) -> Self {
        Self {
            values: self.values.clone(),
            signal: None,
        }
    }

    /// Report whether this context (or any parent) has been interrupted.
    ///
    /// # Errors
    ///
    /// Returns the interruption reason once the context is cancelled or its
    /// deadline has passed.
    pub fn check(&self) -> Result<(), Interruption> {
        match &self.signal {
            Some(signal) => signal.check(),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.check().is_err()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys = Vec::new();
        let mut current = self.values.as_deref();
        while let Some(entry) = current {
            keys.push(entry.key);
            current = entry.parent.as_deref();
        }
        f.debug_struct("Context")
            .field("keys", &keys)
            .field("interruption", &self.check().err())
            .finish()
    }
}

/// Fires the cancellation signal of a context created by
/// [`Context::with_cancel`].
#[derive(Clone)]
pub struct CancelHandle {
    signal: Arc<Signal>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.signal.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.signal.cancelled.load(Ordering::Acquire)
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_context_is_empty_and_live() {
        let ctx = Context::background();
        assert!(!ctx.contains(ContextKey::unique()));
        assert!(ctx.check().is_ok());
    }

    #[test]
    fn unique_keys_never_repeat() {
        let a = ContextKey::unique();
        let b = ContextKey::unique();
        assert_ne!(a, b);
        assert!(b.id() > a.id());
    }

    #[test]
    fn child_sees_value_and_parent_does_not() {
        let key = ContextKey::unique();
        let parent = Context::background();
        let child = parent.with_value(key, Arc::new(7_u32));

        assert_eq!(child.value::<u32>(key).as_deref(), Some(&7));
        assert!(parent.value::<u32>(key).is_none());
    }

    #[test]
    fn inner_value_shadows_outer_value() {
        let key = ContextKey::unique();
        let outer = Context::background().with_value(key, Arc::new("outer".to_string()));
        let inner = outer.with_value(key, Arc::new("inner".to_string()));

        assert_eq!(inner.value::<String>(key).as_deref().map(String::as_str), Some("inner"));
        assert_eq!(outer.value::<String>(key).as_deref().map(String::as_str), Some("outer"));
    }

    #[test]
    fn value_with_wrong_type_is_none() {
        let key = ContextKey::unique();
        let ctx = Context::background().with_value(key, Arc::new(1_i64));

        assert!(ctx.contains(key));
        assert!(ctx.value::<String>(key).is_none());
    }

    #[test]
    fn unrelated_keys_do_not_collide() {
        let first = ContextKey::unique();
        let second = ContextKey::unique();
        let ctx = Context::background()
            .with_value(first, Arc::new(1_u8))
            .with_value(second, Arc::new(2_u8));

        assert_eq!(ctx.value::<u8>(first).as_deref(), Some(&1));
        assert_eq!(ctx.value::<u8>(second).as_deref(), Some(&2));
    }

    #[test]
    fn cancel_reaches_derived_contexts_only() {
        let root = Context::background();
        let (cancellable, handle) = root.with_cancel();
        let derived = cancellable.with_value(ContextKey::unique(), Arc::new(()));

        handle.cancel();

        assert!(handle.is_cancelled());
        assert_eq!(cancellable.check(), Err(Interruption::Cancelled));
        assert_eq!(derived.check(), Err(Interruption::Cancelled));
        assert!(root.check().is_ok());
    }

    #[test]
    fn values_survive_derivation_of_cancel_scope() {
        let key = ContextKey::unique();
        let (ctx, _handle) = Context::background()
            .with_value(key, Arc::new(5_u16))
            .with_cancel();

        assert_eq!(ctx.value::<u16>(key).as_deref(), Some(&5));
    }

    #[test]
    fn elapsed_deadline_interrupts() {
        let ctx = Context::background().with_deadline(Instant::now());
        assert_eq!(ctx.check(), Err(Interruption::DeadlineExceeded));
        assert!(ctx.is_done());
    }

    #[test]
    fn future_deadline_does_not_interrupt() {
        let ctx = Context::background().with_timeout(Duration::from_secs(3600));
        assert!(ctx.check().is_ok());
    }

    #[test]
    fn parent_deadline_applies_to_child_cancel_scope() {
        let (ctx, _handle) = Context::background()
            .with_deadline(Instant::now())
            .with_cancel();
        assert_eq!(ctx.check(), Err(Interruption::DeadlineExceeded));
    }

    #[test]
    fn detached_context_keeps_values_but_not_cancellation() {
        let key = ContextKey::unique();
        let (ctx, handle) = Context::background()
            .with_value(key, Arc::new(3_u8))
            .with_cancel();
        handle.cancel();

        let detached = ctx.without_cancel();

        assert!(ctx.is_done());
        assert!(detached.check().is_ok());
        assert_eq!(detached.value::<u8>(key).as_deref(), Some(&3));
    }

    #[test]
    fn detached_context_ignores_deadline() {
        let detached = Context::background()
            .with_deadline(Instant::now())
            .without_cancel();
        assert!(!detached.is_done());
    }
}
