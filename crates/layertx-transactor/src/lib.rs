//! Nested transaction coordination.
//!
//! A [`Transactor`] begins a transaction for the outermost unit of work,
//! stores the handle in the [`Context`](layertx_core::Context) it passes
//! down and lets every nested call reuse that handle. Only the outermost
//! call commits or rolls back.
//!
//! Drivers plug in through [`Beginner`] and [`Transaction`]; how the handle
//! lives inside the context is decided by a [`CarrierAccessor`], by default
//! a [`ContextOperator`].

mod operator;
mod options;
mod traits;
mod transactor;

#[cfg(any(test, feature = "testing"))]
pub mod mocks;

pub use operator::ContextOperator;
pub use options::{IsolationLevel, TxOption, TxOptions, build_options, isolation_level, read_only};
pub use traits::{Beginner, CarrierAccessor, Transaction};
pub use transactor::{Transactor, TransactorBuilder};
