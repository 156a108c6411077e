//! Nested transactions and compensating sagas over an ambient [`Context`].
//!
//! - [`Transactor`] shares one physical transaction between every nested
//!   call of a call tree and commits or rolls it back once, at the top.
//! - [`Saga`] runs ordered [`Step`]s and undoes the completed ones in
//!   reverse order when a step fails.
//! - [`transactional`] joins the two: a saga step whose action runs in a
//!   local transaction of its own store.
//!
//! Every layer reports the same [`Error`] tree, so a caller can ask whether
//! a failure was rolled back, compensated, retried or caused by a panic
//! with [`Error::is`] and reach any concrete cause with [`Error::find`].

mod transactional;

pub use layertx_core::{
    BoxError, CancelHandle, Context, ContextKey, Error, ErrorKind, Interruption, Report, Result,
    panic_message, recover,
};
pub use layertx_saga::{
    Action, Backoff, BackoffKind, BackoffRetry, Compensation, ConfigError, ConstantBackoff,
    ConstantRetry, EqualJitter, ExponentialBackoff, FullJitter, Jitter, JitterKind, NoJitter,
    RetryConfig, RetryPolicy, Saga, SagaAuditLog, SagaBuilder, SagaStep, Step, StepRecord,
    StepStatus, with_panic_recovery, with_retry,
};
pub use layertx_transactor::{
    Beginner, CarrierAccessor, ContextOperator, IsolationLevel, Transaction, Transactor,
    TransactorBuilder, TxOption, TxOptions, isolation_level, read_only,
};
pub use transactional::{transactional, transactional_compensation};

#[cfg(feature = "testing")]
pub use layertx_transactor::mocks;
