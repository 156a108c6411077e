//! Test doubles for the transaction traits.
//!
//! [`MockBeginner`] records every begin, commit and rollback and can be told
//! to fail any of them. [`MemoryStore`] is a small transactional key-value
//! store whose writes only become visible on commit.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use layertx_core::{BoxError, Context};

use crate::options::TxOptions;
use crate::traits::{Beginner, Transaction};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct MockError(pub String);

impl MockError {
    #[must_use]
    pub fn new(message: &str) -> Self {
        Self(message.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxEvent {
    Begin { id: usize },
    Commit { id: usize },
    Rollback { id: usize },
}

#[derive(Default)]
struct Failures {
    begin: Option<String>,
    commit: Option<String>,
    rollback: Option<String>,
}

#[derive(Default)]
struct MockState {
    events: Mutex<Vec<TxEvent>>,
    last_options: Mutex<Option<TxOptions>>,
    next_id: AtomicUsize,
    failures: Mutex<Failures>,
}

impl MockState {
    fn record(&self, event: TxEvent) {
        self.events.lock().expect("lock poisoned").push(event);
    }

    fn failure(&self, select: impl Fn(&Failures) -> Option<&String>) -> Result<(), BoxError> {
        let failures = self.failures.lock().expect("lock poisoned");
        match select(&*failures) {
            Some(message) => Err(Box::new(MockError::new(message))),
            None => Ok(()),
        }
    }
}

/// Beginner that records what the coordinator does with its transactions.
///
/// Clones share the same record.
#[derive(Clone, Default)]
pub struct MockBeginner {
    state: Arc<MockState>,
}

impl MockBeginner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn configure(self, apply: impl FnOnce(&mut Failures)) -> Self {
        let mut failures = self.state.failures.lock().expect("lock poisoned");
        apply(&mut *failures);
        drop(failures);
        self
    }

    /// Make every `begin_tx` fail with `message`.
    ///
    /// Failures are shared state: clones made earlier see them too.
    #[must_use]
    pub fn with_begin_error(self, message: &str) -> Self {
        let message = message.to_string();
        self.configure(|failures| failures.begin = Some(message))
    }

    #[must_use]
    pub fn with_commit_error(self, message: &str) -> Self {
        let message = message.to_string();
        self.configure(|failures| failures.commit = Some(message))
    }

    #[must_use]
    pub fn with_rollback_error(self, message: &str) -> Self {
        let message = message.to_string();
        self.configure(|failures| failures.rollback = Some(message))
    }

    /// A transaction that shares this beginner's record without having been
    /// begun through it.
    #[must_use]
    pub fn detached_tx(&self, id: usize) -> MockTx {
        MockTx {
            id,
            state: Arc::clone(&self.state),
            finished: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn events(&self) -> Vec<TxEvent> {
        self.state.events.lock().expect("lock poisoned").clone()
    }

    #[must_use]
    pub fn last_options(&self) -> Option<TxOptions> {
        *self.state.last_options.lock().expect("lock poisoned")
    }

    fn count(&self, matches: impl Fn(&TxEvent) -> bool) -> usize {
        self.events().iter().filter(|event| matches(event)).count()
    }

    #[must_use]
    pub fn begin_count(&self) -> usize {
        self.count(|event| matches!(event, TxEvent::Begin { .. }))
    }

    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.count(|event| matches!(event, TxEvent::Commit { .. }))
    }

    #[must_use]
    pub fn rollback_count(&self) -> usize {
        self.count(|event| matches!(event, TxEvent::Rollback { .. }))
    }
}

impl Beginner for MockBeginner {
    type Tx = MockTx;
    type Options = TxOptions;

    fn begin_tx(&self, _ctx: &Context, options: Self::Options) -> Result<Self::Tx, BoxError> {
        *self.state.last_options.lock().expect("lock poisoned") = Some(options);
        self.state.failure(|failures| failures.begin.as_ref())?;
        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.record(TxEvent::Begin { id });
        Ok(self.detached_tx(id))
    }
}

pub struct MockTx {
    id: usize,
    state: Arc<MockState>,
    finished: AtomicBool,
}

impl MockTx {
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    fn finish(&self) -> Result<(), BoxError> {
        if self.finished.swap(true, Ordering::SeqCst) {
            return Err(Box::new(MockError(format!(
                "transaction {} already finished",
                self.id
            ))));
        }
        Ok(())
    }
}

impl Transaction for MockTx {
    fn commit(&self, _ctx: &Context) -> Result<(), BoxError> {
        self.finish()?;
        self.state.record(TxEvent::Commit { id: self.id });
        self.state.failure(|failures| failures.commit.as_ref())
    }

    fn rollback(&self, _ctx: &Context) -> Result<(), BoxError> {
        self.finish()?;
        self.state.record(TxEvent::Rollback { id: self.id });
        self.state.failure(|failures| failures.rollback.as_ref())
    }
}

/// In-memory store of integer values with staged, all-or-nothing writes.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<BTreeMap<String, i64>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_entries(entries: &[(&str, i64)]) -> Self {
        let data = entries
            .iter()
            .map(|(key, value)| ((*key).to_string(), *value))
            .collect();
        Self {
            data: Arc::new(Mutex::new(data)),
        }
    }

    /// Committed value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<i64> {
        self.data.lock().expect("lock poisoned").get(key).copied()
    }

    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, i64> {
        self.data.lock().expect("lock poisoned").clone()
    }
}

impl Beginner for MemoryStore {
    type Tx = MemoryTx;
    type Options = TxOptions;

    fn begin_tx(&self, _ctx: &Context, options: Self::Options) -> Result<Self::Tx, BoxError> {
        Ok(MemoryTx {
            data: Arc::clone(&self.data),
            staged: Mutex::new(BTreeMap::new()),
            read_only: options.read_only,
        })
    }
}

/// Transaction over a [`MemoryStore`]: reads see its own staged writes.
pub struct MemoryTx {
    data: Arc<Mutex<BTreeMap<String, i64>>>,
    staged: Mutex<BTreeMap<String, Option<i64>>>,
    read_only: bool,
}

impl MemoryTx {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<i64> {
        if let Some(staged) = self.staged.lock().expect("lock poisoned").get(key) {
            return *staged;
        }
        self.data.lock().expect("lock poisoned").get(key).copied()
    }

    /// # Errors
    ///
    /// Fails when the transaction was begun read-only.
    pub fn put(&self, key: &str, value: i64) -> Result<(), MockError> {
        self.stage(key, Some(value))
    }

    /// # Errors
    ///
    /// Fails when the transaction was begun read-only.
    pub fn delete(&self, key: &str) -> Result<(), MockError> {
        self.stage(key, None)
    }

    fn stage(&self, key: &str, value: Option<i64>) -> Result<(), MockError> {
        if self.read_only {
            return Err(MockError(format!("cannot write '{key}' in read-only transaction")));
        }
        self.staged
            .lock()
            .expect("lock poisoned")
            .insert(key.to_string(), value);
        Ok(())
    }
}

impl Transaction for MemoryTx {
    fn commit(&self, _ctx: &Context) -> Result<(), BoxError> {
        let staged = std::mem::take(&mut *self.staged.lock().expect("lock poisoned"));
        let mut data = self.data.lock().expect("lock poisoned");
        for (key, value) in staged {
            match value {
                Some(value) => data.insert(key, value),
                None => data.remove(&key),
            };
        }
        Ok(())
    }

    fn rollback(&self, _ctx: &Context) -> Result<(), BoxError> {
        self.staged.lock().expect("lock poisoned").clear();
        Ok(())
    }
}
