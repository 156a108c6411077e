use std::time::Instant;

/// Status of a step in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StepStatus {
    /// Step executed successfully.
    Executed,
    /// Step failed during execution.
    Failed,
    /// Step had no action and was passed over.
    Skipped,
    /// Step was compensated successfully.
    Compensated,
    /// Step compensation failed.
    CompensationFailed,
}

impl StepStatus {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Executed => "✓",
            Self::Failed => "✗",
            Self::Skipped => "-",
            Self::Compensated => "↩",
            Self::CompensationFailed => "⚠",
        }
    }
}

/// Record of a step's execution in the saga.
#[derive(Debug)]
pub struct StepRecord {
    /// Position of the step in the saga.
    pub index: usize,
    pub name: String,
    pub status: StepStatus,
    pub started_at: Instant,
    /// When the step completed (execution or compensation).
    pub completed_at: Option<Instant>,
    pub compensation_description: Option<String>,
}

/// Audit log tracking all step executions in a saga.
#[derive(Debug, Default)]
pub struct SagaAuditLog {
    records: Vec<StepRecord>,
    interrupted_before: Option<usize>,
}

impl SagaAuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_start(&mut self, index: usize, name: &str) {
        self.records.push(StepRecord {
            index,
            name: name.to_string(),
            status: StepStatus::Executed,
            started_at: Instant::now(),
            completed_at: None,
            compensation_description: None,
        });
    }

    pub(crate) fn record_skipped(&mut self, index: usize, name: &str) {
        let now = Instant::now();
        self.records.push(StepRecord {
            index,
            name: name.to_string(),
            status: StepStatus::Skipped,
            started_at: now,
            completed_at: Some(now),
            compensation_description: None,
        });
    }

    /// Mark the last step as failed.
    pub(crate) fn record_failure(&mut self) {
        if let Some(record) = self.records.last_mut() {
            record.status = StepStatus::Failed;
            record.completed_at = Some(Instant::now());
        }
    }

    /// Mark the last step as completed successfully.
    pub(crate) fn record_success(&mut self, compensation_description: Option<String>) {
        if let Some(record) = self.records.last_mut() {
            record.status = StepStatus::Executed;
            record.completed_at = Some(Instant::now());
            record.compensation_description = compensation_description;
        }
    }

    pub(crate) fn record_interrupted(&mut self, index: usize) {
        self.interrupted_before = Some(index);
    }

    pub(crate) fn record_compensated(&mut self, index: usize) {
        self.update(index, StepStatus::Compensated);
    }

    pub(crate) fn record_compensation_failed(&mut self, index: usize) {
        self.update(index, StepStatus::CompensationFailed);
    }

    fn update(&mut self, index: usize, status: StepStatus) {
        if let Some(record) = self.records.iter_mut().find(|record| record.index == index) {
            record.status = status;
            record.completed_at = Some(Instant::now());
        }
    }

    #[must_use]
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    #[must_use]
    pub fn record(&self, index: usize) -> Option<&StepRecord> {
        self.records.iter().find(|record| record.index == index)
    }

    /// Index of the step the saga was about to run when its context was
    /// interrupted.
    #[must_use]
    pub fn interrupted_before(&self) -> Option<usize> {
        self.interrupted_before
    }

    /// One line per recorded step, prefixed with its status symbol.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut lines: Vec<String> = self
            .records
            .iter()
            .map(|record| format!("{} {}", record.status.symbol(), record.name))
            .collect();
        if let Some(index) = self.interrupted_before {
            lines.push(format!("⏹ interrupted before step {index}"));
        }
        lines.join("\n")
    }
}
