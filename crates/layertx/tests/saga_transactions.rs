//! End-to-end tests: sagas coordinating steps that each commit to their own
//! transactional store.

use std::time::Duration;

use layertx::{
    Action, Compensation, ConstantRetry, Context, Error, ErrorKind, Saga, Step, Transactor,
    transactional, transactional_compensation,
};
use layertx_transactor::mocks::{MemoryStore, MockError};

fn transfer_saga(
    accounts: &Transactor<MemoryStore>,
    ledger: &Transactor<MemoryStore>,
    amount: i64,
) -> Saga {
    let debit = accounts.clone();
    let credit_back = accounts.clone();
    let record = ledger.clone();

    Saga::builder()
        .step(
            Step::new("debit")
                .with_action(transactional(
                    accounts,
                    Action::new(move |ctx| {
                        let tx = debit.try_get_tx(ctx).ok_or("no accounts transaction")?;
                        let balance = tx.get("alice").unwrap_or_default();
                        if balance < amount {
                            return Err(MockError::new("insufficient funds").into());
                        }
                        tx.put("alice", balance - amount)?;
                        Ok(())
                    }),
                ))
                .with_compensation(transactional_compensation(
                    accounts,
                    Compensation::new(move |ctx, _| {
                        let tx = credit_back.try_get_tx(ctx).ok_or("no accounts transaction")?;
                        let balance = tx.get("alice").unwrap_or_default();
                        tx.put("alice", balance + amount)?;
                        Ok(())
                    }),
                )),
        )
        .step(Step::new("record").with_action(transactional(
            ledger,
            Action::new(move |ctx| {
                let tx = record.try_get_tx(ctx).ok_or("no ledger transaction")?;
                if tx.get("frozen").is_some() {
                    return Err(MockError::new("ledger frozen").into());
                }
                tx.put("transfers", tx.get("transfers").unwrap_or_default() + 1)?;
                Ok(())
            }),
        )))
        .build()
}

#[test]
fn successful_transfer_commits_both_stores() -> anyhow::Result<()> {
    let accounts = MemoryStore::with_entries(&[("alice", 100)]);
    let ledger = MemoryStore::new();
    let saga = transfer_saga(
        &Transactor::new(accounts.clone()),
        &Transactor::new(ledger.clone()),
        40,
    );

    saga.execute(&Context::background())?;

    assert_eq!(accounts.get("alice"), Some(60));
    assert_eq!(ledger.get("transfers"), Some(1));
    Ok(())
}

#[test]
fn failing_second_step_compensates_committed_first_step() {
    let accounts = MemoryStore::with_entries(&[("alice", 100)]);
    let ledger = MemoryStore::with_entries(&[("frozen", 1)]);
    let saga = transfer_saga(
        &Transactor::new(accounts.clone()),
        &Transactor::new(ledger.clone()),
        40,
    );

    let err = saga.execute(&Context::background()).expect_err("should fail");

    assert!(err.is(ErrorKind::ActionFailed));
    assert!(err.is(ErrorKind::RollbackSucceeded));
    assert!(err.is(ErrorKind::CompensationSucceeded));
    assert_eq!(err.find::<MockError>(), Some(&MockError::new("ledger frozen")));
    assert_eq!(accounts.get("alice"), Some(100));
    assert_eq!(ledger.get("transfers"), None);
}

#[test]
fn failing_first_step_leaves_store_untouched() {
    let accounts = MemoryStore::with_entries(&[("alice", 10)]);
    let ledger = MemoryStore::new();
    let saga = transfer_saga(
        &Transactor::new(accounts.clone()),
        &Transactor::new(ledger.clone()),
        40,
    );

    let err = saga.execute(&Context::background()).expect_err("should fail");

    let Error::Compensated { source } = &err else {
        panic!("expected Compensated, got {err:?}");
    };
    assert!(matches!(source.as_ref(), Error::Step { index: 0, .. }));
    assert_eq!(accounts.get("alice"), Some(10));
    assert!(ledger.snapshot().is_empty());
}

#[test]
fn saga_inside_outer_transaction_joins_it() {
    let store = MemoryStore::with_entries(&[("stock", 3)]);
    let transactor = Transactor::new(store.clone());
    let writer = transactor.clone();
    let saga = Saga::new(vec![
        Step::new("reserve").with_action(transactional(
            &transactor,
            Action::new(move |ctx| {
                let tx = writer.try_get_tx(ctx).ok_or("no transaction")?;
                tx.put("stock", 2)?;
                Ok(())
            }),
        )),
        Step::new("charge")
            .with_action(Action::new(|_| Err(MockError::new("card declined").into()))),
    ]);

    let result: layertx::Result<()> =
        transactor.within_transaction(&Context::background(), |ctx| {
            saga.execute(ctx)?;
            Ok(())
        });

    let err = result.expect_err("should fail");
    assert!(err.is(ErrorKind::RollbackSucceeded));
    assert!(err.is(ErrorKind::CompensationSucceeded));
    assert_eq!(store.get("stock"), Some(3));
}

#[test]
fn every_retry_runs_in_a_fresh_transaction() {
    let store = MemoryStore::new();
    let transactor = Transactor::new(store.clone());
    let writer = transactor.clone();
    let action = transactional(
        &transactor,
        Action::new(move |ctx| {
            let tx = writer.try_get_tx(ctx).ok_or("no transaction")?;
            let tries = tx.get("tries").unwrap_or_default();
            tx.put("tries", tries + 1)?;
            Err(MockError::new("deadlock detected").into())
        }),
    )
    .with_retry(ConstantRetry::new(2, Duration::ZERO));

    let err = action.run(&Context::background()).expect_err("should fail");

    assert!(err.is(ErrorKind::RollbackSucceeded));
    assert_eq!(store.get("tries"), None);
}
