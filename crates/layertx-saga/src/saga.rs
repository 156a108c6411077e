use layertx_core::{Context, Error};
use tracing::{debug, warn};

use crate::audit::SagaAuditLog;
use crate::builder::SagaBuilder;
use crate::step::Step;

/// An ordered list of steps executed with compensating rollback.
///
/// Steps run one after the other on the caller's thread. When an action
/// fails, the steps registered for compensation so far are undone in reverse
/// order and no further step runs.
#[derive(Debug, Clone, Default)]
pub struct Saga {
    steps: Vec<Step>,
}

impl Saga {
    #[must_use]
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    #[must_use]
    pub fn builder() -> SagaBuilder {
        SagaBuilder::new()
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Run every step's action, compensating on the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Compensated`] when a step failed (or the context was
    /// interrupted) and every compensation succeeded, and
    /// [`Error::CompensationFailed`] when at least one compensation failed.
    /// Either way the triggering failure is the error's source: an
    /// [`Error::Step`] naming the failed step, or [`Error::Interrupted`].
    ///
    /// Compensations run with the caller's context values but without its
    /// cancellation or deadline, so an interrupted saga still undoes every
    /// registered step, retries included.
    pub fn execute(&self, ctx: &Context) -> Result<(), Error> {
        let (result, _audit_log) = self.execute_internal(ctx);
        result
    }

    /// Execute the saga and return both the result and an audit log.
    pub fn execute_with_audit(&self, ctx: &Context) -> (Result<(), Error>, SagaAuditLog) {
        self.execute_internal(ctx)
    }

    fn execute_internal(&self, ctx: &Context) -> (Result<(), Error>, SagaAuditLog) {
        let mut audit_log = SagaAuditLog::new();
        let mut ledger: Vec<(usize, &Step)> = Vec::new();

        for (index, step) in self.steps.iter().enumerate() {
            if let Err(reason) = ctx.check() {
                warn!(step = step.name(), index, %reason, "saga interrupted");
                audit_log.record_interrupted(index);
                let error = Self::compensate(ctx, &mut audit_log, ledger, Error::Interrupted(reason));
                return (Err(error), audit_log);
            }

            let Some(action) = step.action() else {
                debug!(step = step.name(), index, "skipping step without action");
                audit_log.record_skipped(index, step.name());
                continue;
            };

            debug!(step = step.name(), index, "executing saga step");
            audit_log.record_start(index, step.name());
            if step.compensation_on_fail() {
                ledger.push((index, step));
            }

            match action.run(ctx) {
                Ok(()) => {
                    audit_log.record_success(step.compensation_description());
                    if !step.compensation_on_fail() {
                        ledger.push((index, step));
                    }
                }
                Err(source) => {
                    warn!(step = step.name(), index, error = %source, "saga step failed");
                    audit_log.record_failure();
                    let cause = Error::Step {
                        index,
                        name: step.name().to_string(),
                        source: Box::new(source),
                    };
                    let error = Self::compensate(ctx, &mut audit_log, ledger, cause);
                    return (Err(error), audit_log);
                }
            }
        }

        debug!(steps = self.steps.len(), "saga completed");
        (Ok(()), audit_log)
    }

    fn compensate(
        ctx: &Context,
        audit_log: &mut SagaAuditLog,
        ledger: Vec<(usize, &Step)>,
        cause: Error,
    ) -> Error {
        let ctx = &ctx.without_cancel();
        let mut failures = Vec::new();

        for (index, step) in ledger.into_iter().rev() {
            let Some(compensation) = step.compensation() else {
                continue;
            };
            debug!(step = step.name(), index, "compensating saga step");

            match compensation.run(ctx, &cause) {
                Ok(()) => audit_log.record_compensated(index),
                Err(source) => {
                    warn!(step = step.name(), index, error = %source, "compensation failed");
                    audit_log.record_compensation_failed(index);
                    failures.push(Error::Compensation {
                        index,
                        name: step.name().to_string(),
                        source: Box::new(source),
                    });
                }
            }
        }

        if failures.is_empty() {
            Error::Compensated {
                source: Box::new(cause),
            }
        } else {
            Error::CompensationFailed {
                source: Box::new(cause),
                failures,
            }
        }
    }
}
