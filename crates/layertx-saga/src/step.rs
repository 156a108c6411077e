use std::sync::Arc;

use layertx_core::{BoxError, Context, Error};

use crate::action::{Action, Compensation};

/// One unit of saga work: an action, an optional compensation and the rule
/// deciding when that compensation becomes eligible.
///
/// By default a step's compensation is registered only once its action has
/// succeeded. With [`with_compensation_on_fail`](Self::with_compensation_on_fail)
/// it is registered before the action runs, so the step is also undone when
/// its own action is the one that fails.
#[derive(Debug, Clone)]
pub struct Step {
    name: String,
    action: Option<Action>,
    compensation: Option<Compensation>,
    compensation_on_fail: bool,
    compensation_description: Option<String>,
}

impl Step {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action: None,
            compensation: None,
            compensation_on_fail: false,
            compensation_description: None,
        }
    }

    /// Build a step from a [`SagaStep`] implementation.
    #[must_use]
    pub fn from_saga_step<S>(step: S) -> Self
    where
        S: SagaStep + 'static,
    {
        let step = Arc::new(step);
        let executing = Arc::clone(&step);
        let compensating = Arc::clone(&step);
        Self::new(step.name())
            .with_action(Action::new(move |ctx| executing.execute(ctx)))
            .with_compensation(Compensation::new(move |ctx, cause| {
                compensating.compensate(ctx, cause)
            }))
            .with_compensation_on_fail(step.compensation_on_fail())
            .with_compensation_description(step.compensation_description())
    }

    #[must_use]
    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    #[must_use]
    pub fn with_compensation(mut self, compensation: Compensation) -> Self {
        self.compensation = Some(compensation);
        self
    }

    #[must_use]
    pub fn with_compensation_on_fail(mut self, compensation_on_fail: bool) -> Self {
        self.compensation_on_fail = compensation_on_fail;
        self
    }

    /// Human-readable description of the undo, shown in the audit log.
    #[must_use]
    pub fn with_compensation_description(mut self, description: impl Into<String>) -> Self {
        self.compensation_description = Some(description.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn action(&self) -> Option<&Action> {
        self.action.as_ref()
    }

    #[must_use]
    pub fn compensation(&self) -> Option<&Compensation> {
        self.compensation.as_ref()
    }

    #[must_use]
    pub fn compensation_on_fail(&self) -> bool {
        self.compensation_on_fail
    }

    /// The configured description, or `undo <name>` when the step has a
    /// compensation but no description.
    #[must_use]
    pub fn compensation_description(&self) -> Option<String> {
        match (&self.compensation_description, &self.compensation) {
            (Some(description), _) => Some(description.clone()),
            (None, Some(_)) => Some(format!("undo {}", self.name)),
            (None, None) => None,
        }
    }
}

/// A saga step written as a type instead of a set of closures.
///
/// Convert it with [`Step::from_saga_step`].
pub trait SagaStep: Send + Sync {
    /// Human-readable name for logging and error messages.
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// Returns an error if the step fails to complete.
    fn execute(&self, ctx: &Context) -> Result<(), BoxError>;

    /// Undo the step's effects. `cause` is the failure that made the saga
    /// compensate.
    ///
    /// The default implementation is a no-op, suitable for read-only steps.
    ///
    /// # Errors
    ///
    /// Returns an error if compensation fails.
    fn compensate(&self, ctx: &Context, cause: &Error) -> Result<(), BoxError> {
        let _ = (ctx, cause);
        Ok(())
    }

    fn compensation_on_fail(&self) -> bool {
        false
    }

    fn compensation_description(&self) -> String {
        format!("undo {}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Reserve {
        undone: Mutex<Vec<String>>,
    }

    impl SagaStep for Reserve {
        fn name(&self) -> &str {
            "reserve"
        }

        fn execute(&self, _ctx: &Context) -> Result<(), BoxError> {
            Ok(())
        }

        fn compensate(&self, _ctx: &Context, cause: &Error) -> Result<(), BoxError> {
            self.undone
                .lock()
                .expect("lock poisoned")
                .push(cause.to_string());
            Ok(())
        }

        fn compensation_on_fail(&self) -> bool {
            true
        }
    }

    #[test]
    fn new_step_has_no_operations() {
        let step = Step::new("noop");

        assert_eq!(step.name(), "noop");
        assert!(step.action().is_none());
        assert!(step.compensation().is_none());
        assert!(!step.compensation_on_fail());
        assert!(step.compensation_description().is_none());
    }

    #[test]
    fn description_defaults_to_undo_name() {
        let step = Step::new("charge").with_compensation(Compensation::new(|_, _| Ok(())));
        assert_eq!(step.compensation_description().as_deref(), Some("undo charge"));
    }

    #[test]
    fn explicit_description_wins() {
        let step = Step::new("charge")
            .with_compensation(Compensation::new(|_, _| Ok(())))
            .with_compensation_description("refund card");
        assert_eq!(step.compensation_description().as_deref(), Some("refund card"));
    }

    #[test]
    fn saga_step_impl_becomes_step() -> anyhow::Result<()> {
        let step = Step::from_saga_step(Reserve::default());

        assert_eq!(step.name(), "reserve");
        assert!(step.compensation_on_fail());
        assert_eq!(step.compensation_description().as_deref(), Some("undo reserve"));

        let ctx = Context::background();
        step.action()
            .ok_or_else(|| anyhow::anyhow!("missing action"))?
            .run(&ctx)?;
        step.compensation()
            .ok_or_else(|| anyhow::anyhow!("missing compensation"))?
            .run(&ctx, &Error::operation("later step failed"))?;
        Ok(())
    }
}
