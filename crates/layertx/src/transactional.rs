use layertx_core::BoxError;
use layertx_saga::{Action, Compensation};
use layertx_transactor::{Beginner, CarrierAccessor, Transactor};

/// Run `action` inside a transaction of `transactor`.
///
/// Each invocation of the returned action is a transactional scope of its
/// own: it commits when the action succeeds and rolls back when it fails, so
/// a saga step built from it leaves its store untouched on failure. Inside a
/// scope that already holds a transaction of `transactor`, the action joins
/// that transaction instead.
///
/// ```
/// use layertx::{Action, Context, Saga, Step, Transactor, transactional};
/// use layertx_transactor::mocks::MemoryStore;
///
/// # fn main() -> layertx::Result<()> {
/// let store = MemoryStore::new();
/// let transactor = Transactor::new(store.clone());
/// let reader = transactor.clone();
/// let action = transactional(
///     &transactor,
///     Action::new(move |ctx| {
///         let tx = reader.try_get_tx(ctx).ok_or("no transaction")?;
///         tx.put("orders", 1)?;
///         Ok(())
///     }),
/// );
///
/// Saga::new(vec![Step::new("record").with_action(action)])
///     .execute(&Context::background())?;
/// assert_eq!(store.get("orders"), Some(1));
/// # Ok(())
/// # }
/// ```
pub fn transactional<B, A>(transactor: &Transactor<B, A>, action: Action) -> Action
where
    B: Beginner + Clone + Send + Sync + 'static,
    A: CarrierAccessor<B::Tx> + Clone + Send + Sync + 'static,
{
    let transactor = transactor.clone();
    Action::from_fn(move |ctx| {
        transactor.within_transaction(ctx, |tx_ctx| action.run(tx_ctx).map_err(BoxError::from))
    })
}

/// Run `compensation` inside a transaction of `transactor`.
pub fn transactional_compensation<B, A>(
    transactor: &Transactor<B, A>,
    compensation: Compensation,
) -> Compensation
where
    B: Beginner + Clone + Send + Sync + 'static,
    A: CarrierAccessor<B::Tx> + Clone + Send + Sync + 'static,
{
    let transactor = transactor.clone();
    Compensation::from_fn(move |ctx, cause| {
        transactor.within_transaction(ctx, |tx_ctx| {
            compensation.run(tx_ctx, cause).map_err(BoxError::from)
        })
    })
}
