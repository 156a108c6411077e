//! Integration tests for saga audit logging.

use layertx_core::Context;
use layertx_saga::{Action, Compensation, Saga, Step, StepStatus};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct TestError(&'static str);

fn simple(name: &'static str) -> Step {
    Step::new(name)
        .with_action(Action::new(|_| Ok(())))
        .with_compensation(Compensation::new(|_, _| Ok(())))
}

fn failing(name: &'static str) -> Step {
    Step::new(name).with_action(Action::new(|_| Err(TestError("nope").into())))
}

#[test]
fn successful_saga_records_every_step() -> anyhow::Result<()> {
    let saga = Saga::new(vec![simple("first"), simple("second")]);

    let (result, audit) = saga.execute_with_audit(&Context::background());
    result?;

    assert_eq!(audit.records().len(), 2);
    for record in audit.records() {
        assert_eq!(record.status, StepStatus::Executed);
        assert!(record.completed_at.is_some());
        assert_eq!(
            record.compensation_description.as_deref(),
            Some(format!("undo {}", record.name).as_str())
        );
    }
    assert_eq!(audit.summary(), "✓ first\n✓ second");
    Ok(())
}

#[test]
fn failed_saga_records_compensation() {
    let saga = Saga::new(vec![simple("first"), simple("second"), failing("third")]);

    let (result, audit) = saga.execute_with_audit(&Context::background());

    assert!(result.is_err());
    let statuses: Vec<StepStatus> = audit.records().iter().map(|record| record.status).collect();
    assert_eq!(
        statuses,
        vec![
            StepStatus::Compensated,
            StepStatus::Compensated,
            StepStatus::Failed
        ]
    );
    assert_eq!(audit.summary(), "↩ first\n↩ second\n✗ third");
}

#[test]
fn failed_compensation_is_flagged() {
    let saga = Saga::new(vec![
        Step::new("charge")
            .with_action(Action::new(|_| Ok(())))
            .with_compensation(Compensation::new(|_, _| Err(TestError("refund").into())))
            .with_compensation_description("refund card"),
        failing("ship"),
    ]);

    let (result, audit) = saga.execute_with_audit(&Context::background());

    assert!(result.is_err());
    let charge = audit.record(0).expect("charge should be recorded");
    assert_eq!(charge.status, StepStatus::CompensationFailed);
    assert_eq!(charge.compensation_description.as_deref(), Some("refund card"));
    assert!(audit.summary().starts_with("⚠ charge"));
}

#[test]
fn compensation_on_fail_step_ends_compensated() {
    let saga = Saga::new(vec![
        failing("lock")
            .with_compensation(Compensation::new(|_, _| Ok(())))
            .with_compensation_on_fail(true),
    ]);

    let (_, audit) = saga.execute_with_audit(&Context::background());

    assert_eq!(audit.records()[0].status, StepStatus::Compensated);
}

#[test]
fn steps_after_failure_are_not_recorded() {
    let saga = Saga::new(vec![failing("first"), simple("never")]);

    let (_, audit) = saga.execute_with_audit(&Context::background());

    assert_eq!(audit.records().len(), 1);
    assert!(audit.record(1).is_none());
}
