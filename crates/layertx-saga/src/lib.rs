//! Saga execution with compensating rollback.
//!
//! A [`Saga`] runs a list of [`Step`]s in order. Each step has an
//! [`Action`] and optionally a [`Compensation`]; when an action fails, the
//! compensations of the steps registered so far run back to front with the
//! triggering error. Actions and compensations can be decorated with
//! retries ([`RetryPolicy`], [`Backoff`], [`Jitter`]), panic recovery and
//! before/after hooks.

mod action;
mod audit;
mod backoff;
mod builder;
mod config;
mod jitter;
mod retry;
mod saga;
mod step;

pub use action::{Action, Compensation};
pub use audit::{SagaAuditLog, StepRecord, StepStatus};
pub use backoff::{Backoff, ConstantBackoff, ExponentialBackoff};
pub use builder::SagaBuilder;
pub use config::{BackoffKind, ConfigError, JitterKind, RetryConfig};
pub use jitter::{EqualJitter, FullJitter, Jitter, NoJitter};
pub use retry::{BackoffRetry, ConstantRetry, RetryPolicy, retry, with_panic_recovery, with_retry};
pub use saga::Saga;
pub use step::{SagaStep, Step};
