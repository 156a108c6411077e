use crate::action::{Action, Compensation};
use crate::saga::Saga;
use crate::step::{SagaStep, Step};

/// Collects steps in execution order.
///
/// ```
/// use layertx_saga::{Action, Compensation, Saga, Step};
///
/// let saga = Saga::builder()
///     .step(
///         Step::new("reserve")
///             .with_action(Action::new(|_ctx| Ok(())))
///             .with_compensation(Compensation::new(|_ctx, _cause| Ok(()))),
///     )
///     .action("notify", Action::new(|_ctx| Ok(())))
///     .build();
///
/// assert_eq!(saga.steps().len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct SagaBuilder {
    steps: Vec<Step>,
}

impl SagaBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    #[must_use]
    pub fn saga_step<S>(self, step: S) -> Self
    where
        S: SagaStep + 'static,
    {
        self.step(Step::from_saga_step(step))
    }

    /// Add a step that has nothing to undo.
    #[must_use]
    pub fn action(self, name: impl Into<String>, action: Action) -> Self {
        self.step(Step::new(name).with_action(action))
    }

    /// Add a step whose compensation runs only after its action succeeded.
    #[must_use]
    pub fn compensated(
        self,
        name: impl Into<String>,
        action: Action,
        compensation: Compensation,
    ) -> Self {
        self.step(
            Step::new(name)
                .with_action(action)
                .with_compensation(compensation),
        )
    }

    #[must_use]
    pub fn build(self) -> Saga {
        Saga::new(self.steps)
    }
}

impl Extend<Step> for SagaBuilder {
    fn extend<I: IntoIterator<Item = Step>>(&mut self, steps: I) {
        self.steps.extend(steps);
    }
}
