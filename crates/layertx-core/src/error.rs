use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use crate::context::Interruption;

/// A foreign error carried inside the [`Error`] tree.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Outcome markers attached to nodes of the [`Error`] tree.
///
/// Several markers describe a successful cleanup (`RollbackSucceeded`,
/// `CompensationSucceeded`): the overall call still failed, but whatever it
/// had started was undone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The coordinator has no beginner to start transactions with.
    NilBeginner,
    /// The coordinator has no accessor to store transactions in a context.
    NilCarrierAccessor,
    /// The driver failed to start a transaction.
    BeginFailed,
    /// The driver failed to commit.
    CommitFailed,
    /// The driver failed to roll back.
    RollbackFailed,
    /// The unit of work failed and the transaction was rolled back.
    RollbackSucceeded,
    /// A panic was caught and converted into an error.
    PanicRecovered,
    /// A saga step's action failed.
    ActionFailed,
    /// At least one compensation failed.
    CompensationFailed,
    /// Every registered compensation ran successfully.
    CompensationSucceeded,
    /// A retry loop stopped early because its context was interrupted.
    RetryInterrupted,
    /// A saga stopped before running a step because its context was interrupted.
    Interrupted,
}

/// Error produced by the transaction coordinator, the retry decorators and
/// the saga engine.
///
/// Errors compose instead of replacing each other: a rollback failure keeps
/// the error that caused the rollback, a failed compensation keeps the step
/// error that triggered it. Use [`Error::is`] to test for an outcome marker
/// anywhere in the tree and [`Error::find`] to reach a concrete cause.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("transaction beginner is not configured")]
    NilBeginner,

    #[error("transaction carrier accessor is not configured")]
    NilCarrierAccessor,

    #[error("cannot begin transaction")]
    Begin(#[source] BoxError),

    #[error("cannot commit transaction")]
    Commit(#[source] BoxError),

    #[error("transaction rolled back")]
    RolledBack {
        /// The failure that caused the rollback.
        #[source]
        source: Box<Error>,
    },

    #[error("transaction rollback failed: {rollback}")]
    RollbackFailed {
        /// The failure that caused the rollback.
        #[source]
        source: Box<Error>,
        /// The driver's rollback error.
        rollback: BoxError,
    },

    #[error("panic recovered: {message}")]
    Panicked { message: String },

    #[error(transparent)]
    Operation(BoxError),

    #[error("step {index} ({name}) failed")]
    Step {
        index: usize,
        name: String,
        #[source]
        source: Box<Error>,
    },

    #[error("saga failed, compensation executed")]
    Compensated {
        /// The failure that triggered compensation.
        #[source]
        source: Box<Error>,
    },

    #[error("saga failed, {} compensation(s) also failed", failures.len())]
    CompensationFailed {
        /// The failure that triggered compensation.
        #[source]
        source: Box<Error>,
        /// One [`Error::Compensation`] per failed compensation, in the order
        /// they ran.
        failures: Vec<Error>,
    },

    #[error("compensation for step {index} ({name}) failed")]
    Compensation {
        index: usize,
        name: String,
        #[source]
        source: Box<Error>,
    },

    #[error("attempt {attempt} failed")]
    Attempt {
        attempt: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("all {} attempt(s) failed", attempts.len())]
    Retries { attempts: Vec<Error> },

    #[error("retry interrupted after {} attempt(s): {reason}", attempts.len())]
    RetryInterrupted {
        reason: Interruption,
        attempts: Vec<Error>,
    },

    #[error("execution interrupted: {0}")]
    Interrupted(Interruption),
}

impl Error {
    /// Wrap a foreign error, unwrapping it instead if it already is an
    /// [`Error`] so nested layers never double-wrap.
    #[must_use]
    pub fn from_boxed(error: BoxError) -> Self {
        match error.downcast::<Error>() {
            Ok(error) => *error,
            Err(other) => Self::Operation(other),
        }
    }

    /// Wrap any error value as an operation failure.
    #[must_use]
    pub fn operation(error: impl Into<BoxError>) -> Self {
        Self::from_boxed(error.into())
    }

    /// The marker carried by this node, ignoring its causes.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::NilBeginner => Some(ErrorKind::NilBeginner),
            Self::NilCarrierAccessor => Some(ErrorKind::NilCarrierAccessor),
            Self::Begin(_) => Some(ErrorKind::BeginFailed),
            Self::Commit(_) => Some(ErrorKind::CommitFailed),
            Self::RolledBack { .. } => Some(ErrorKind::RollbackSucceeded),
            Self::RollbackFailed { .. } => Some(ErrorKind::RollbackFailed),
            Self::Panicked { .. } => Some(ErrorKind::PanicRecovered),
            Self::Step { .. } => Some(ErrorKind::ActionFailed),
            Self::Compensated { .. } => Some(ErrorKind::CompensationSucceeded),
            Self::CompensationFailed { .. } | Self::Compensation { .. } => {
                Some(ErrorKind::CompensationFailed)
            }
            Self::RetryInterrupted { .. } => Some(ErrorKind::RetryInterrupted),
            Self::Interrupted(_) => Some(ErrorKind::Interrupted),
            Self::Operation(_) | Self::Attempt { .. } | Self::Retries { .. } => None,
        }
    }

    /// Direct children of this node, including list members that
    /// `source()` cannot express.
    #[must_use]
    pub fn causes(&self) -> Vec<&Error> {
        match self {
            Self::RolledBack { source }
            | Self::RollbackFailed { source, .. }
            | Self::Step { source, .. }
            | Self::Compensated { source }
            | Self::Compensation { source, .. }
            | Self::Attempt { source, .. } => vec![&**source],
            Self::CompensationFailed { source, failures } => {
                let mut causes: Vec<&Error> = failures.iter().collect();
                causes.push(&**source);
                causes
            }
            Self::Retries { attempts } | Self::RetryInterrupted { attempts, .. } => {
                attempts.iter().collect()
            }
            Self::NilBeginner
            | Self::NilCarrierAccessor
            | Self::Begin(_)
            | Self::Commit(_)
            | Self::Panicked { .. }
            | Self::Operation(_)
            | Self::Interrupted(_) => Vec::new(),
        }
    }

    /// Non-[`Error`] values held by this node.
    fn foreign(&self) -> Option<&(dyn StdError + 'static)> {
        let error: &(dyn StdError + 'static) = match self {
            Self::Begin(error) | Self::Commit(error) | Self::Operation(error) => &**error,
            Self::RollbackFailed { rollback, .. } => &**rollback,
            Self::RetryInterrupted { reason, .. } | Self::Interrupted(reason) => reason,
            _ => return None,
        };
        Some(error)
    }

    /// Whether this node or any of its causes carries `kind`.
    #[must_use]
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind() == Some(kind) || self.causes().into_iter().any(|cause| cause.is(kind))
    }

    /// Find the first cause of type `E`, searching the whole tree and the
    /// `source()` chain of every foreign error in it.
    #[must_use]
    pub fn find<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        if let Some(foreign) = self.foreign() {
            let mut current = Some(foreign);
            while let Some(error) = current {
                if let Some(found) = error.downcast_ref::<E>() {
                    return Some(found);
                }
                current = error.source();
            }
        }
        self.causes().into_iter().find_map(Error::find::<E>)
    }

    #[must_use]
    pub fn contains<E>(&self) -> bool
    where
        E: StdError + 'static,
    {
        self.find::<E>().is_some()
    }

    /// Whether any node in the tree satisfies `predicate`.
    #[must_use]
    pub fn any(&self, predicate: &dyn Fn(&Error) -> bool) -> bool {
        predicate(self) || self.causes().into_iter().any(|cause| cause.any(predicate))
    }

    /// Render the whole tree, one node per line, children indented below
    /// their parent.
    #[must_use]
    pub fn report(&self) -> Report<'_> {
        Report(self)
    }
}

impl From<BoxError> for Error {
    fn from(error: BoxError) -> Self {
        Self::from_boxed(error)
    }
}

impl From<Interruption> for Error {
    fn from(reason: Interruption) -> Self {
        Self::Interrupted(reason)
    }
}

/// Multi-line rendering of an [`Error`] tree, see [`Error::report`].
pub struct Report<'a>(&'a Error);

impl Report<'_> {
    fn write_node(f: &mut fmt::Formatter<'_>, error: &Error, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        if depth == 0 {
            write!(f, "{error}")?;
        } else {
            write!(f, "\n{indent}caused by: {error}")?;
        }
        let mut source = match error {
            Error::Begin(_) | Error::Commit(_) => error.foreign(),
            _ => error.foreign().and_then(|foreign| foreign.source()),
        };
        while let Some(cause) = source {
            write!(f, "\n{indent}  caused by: {cause}")?;
            source = cause.source();
        }
        for cause in error.causes() {
            Self::write_node(f, cause, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Self::write_node(f, self.0, 0)
    }
}

impl fmt::Debug for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("disk full")]
    struct DiskFull;

    #[derive(Debug, Error)]
    #[error("write failed")]
    struct WriteFailed(#[source] DiskFull);

    fn step_failure() -> Error {
        Error::Step {
            index: 1,
            name: "reserve".to_string(),
            source: Box::new(Error::operation(DiskFull)),
        }
    }

    #[test]
    fn from_boxed_unwraps_nested_error() {
        let original = Error::Panicked {
            message: "boom".to_string(),
        };
        let boxed: BoxError = Box::new(original);

        let restored = Error::from_boxed(boxed);

        assert!(matches!(restored, Error::Panicked { ref message } if message == "boom"));
    }

    #[test]
    fn from_boxed_wraps_foreign_error() {
        let restored = Error::from_boxed(Box::new(DiskFull));
        assert!(matches!(restored, Error::Operation(_)));
        assert_eq!(restored.to_string(), "disk full");
    }

    #[test]
    fn is_searches_the_whole_tree() {
        let error = Error::Compensated {
            source: Box::new(step_failure()),
        };

        assert!(error.is(ErrorKind::CompensationSucceeded));
        assert!(error.is(ErrorKind::ActionFailed));
        assert!(!error.is(ErrorKind::CompensationFailed));
    }

    #[test]
    fn is_searches_list_members() {
        let error = Error::CompensationFailed {
            source: Box::new(step_failure()),
            failures: vec![Error::Compensation {
                index: 0,
                name: "open".to_string(),
                source: Box::new(Error::Panicked {
                    message: "oops".to_string(),
                }),
            }],
        };

        assert!(error.is(ErrorKind::PanicRecovered));
        assert!(error.is(ErrorKind::ActionFailed));
    }

    #[test]
    fn find_reaches_foreign_source_chain() {
        let error = Error::RolledBack {
            source: Box::new(Error::operation(WriteFailed(DiskFull))),
        };

        assert!(error.contains::<WriteFailed>());
        assert!(error.contains::<DiskFull>());
        assert!(!error.contains::<Interruption>());
    }

    #[test]
    fn find_reaches_interruption_reason() {
        let error = Error::RetryInterrupted {
            reason: Interruption::Cancelled,
            attempts: vec![Error::operation("first")],
        };

        assert_eq!(error.find::<Interruption>(), Some(&Interruption::Cancelled));
    }

    #[test]
    fn find_reaches_rollback_cause() {
        let error = Error::RollbackFailed {
            source: Box::new(Error::operation("work failed")),
            rollback: Box::new(DiskFull),
        };

        assert!(error.contains::<DiskFull>());
        assert!(error.is(ErrorKind::RollbackFailed));
    }

    #[test]
    fn report_includes_every_cause() {
        let error = Error::Compensated {
            source: Box::new(step_failure()),
        };

        let report = error.report().to_string();

        assert!(report.starts_with("saga failed, compensation executed"));
        assert!(report.contains("caused by: step 1 (reserve) failed"));
        assert!(report.contains("caused by: disk full"));
    }

    #[test]
    fn display_prints_only_the_node() {
        let error = Error::Compensated {
            source: Box::new(step_failure()),
        };
        assert_eq!(error.to_string(), "saga failed, compensation executed");
    }

    #[test]
    fn any_matches_nested_node() {
        let error = Error::Retries {
            attempts: vec![
                Error::Attempt {
                    attempt: 0,
                    source: Box::new(Error::operation("a")),
                },
                Error::Attempt {
                    attempt: 1,
                    source: Box::new(Error::operation("b")),
                },
            ],
        };

        assert!(error.any(&|node| matches!(node, Error::Attempt { attempt: 1, .. })));
        assert!(!error.any(&|node| matches!(node, Error::Attempt { attempt: 2, .. })));
    }
}
