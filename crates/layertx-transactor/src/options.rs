use std::fmt;

/// One configuration change applied to a driver's begin options.
///
/// The coordinator applies every option it is given, in order, to
/// `Options::default()` before beginning a transaction.
pub struct TxOption<O>(Box<dyn FnOnce(&mut O) + Send>);

impl<O> TxOption<O> {
    pub fn new<F>(apply: F) -> Self
    where
        F: FnOnce(&mut O) + Send + 'static,
    {
        Self(Box::new(apply))
    }

    pub fn apply(self, options: &mut O) {
        (self.0)(options);
    }
}

impl<O> fmt::Debug for TxOption<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TxOption")
    }
}

/// Fold `options` over `O::default()`.
pub fn build_options<O, I>(options: I) -> O
where
    O: Default,
    I: IntoIterator<Item = TxOption<O>>,
{
    let mut built = O::default();
    for option in options {
        option.apply(&mut built);
    }
    built
}

/// Standard SQL isolation levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum IsolationLevel {
    /// Whatever the driver uses when nothing is requested.
    #[default]
    Default,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Snapshot,
    Serializable,
}

impl IsolationLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::ReadUncommitted => "read-uncommitted",
            Self::ReadCommitted => "read-committed",
            Self::RepeatableRead => "repeatable-read",
            Self::Snapshot => "snapshot",
            Self::Serializable => "serializable",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Begin options shared by SQL-like drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxOptions {
    pub isolation: IsolationLevel,
    pub read_only: bool,
}

#[must_use]
pub fn read_only(read_only: bool) -> TxOption<TxOptions> {
    TxOption::new(move |options: &mut TxOptions| options.read_only = read_only)
}

#[must_use]
pub fn isolation_level(level: IsolationLevel) -> TxOption<TxOptions> {
    TxOption::new(move |options: &mut TxOptions| options.isolation = level)
}
