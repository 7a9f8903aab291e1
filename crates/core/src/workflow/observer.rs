use crate::domain::order::GroupStatus;
use crate::domain::portfolio::PortfolioSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Operator-facing message raised by a dialog.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub severity: Severity,
    pub text: String,
}

impl Alert {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            text: text.into(),
        }
    }
}

/// Callbacks a dialog fires towards whoever renders it. All default to no-ops.
pub trait WorkflowObserver: Send + Sync {
    fn on_alert(&self, _alert: &Alert) {}

    fn on_status(&self, _status: &GroupStatus) {}

    /// Fresh server-side portfolio after a group completed.
    fn on_reconciled(&self, _snapshot: &PortfolioSnapshot) {}

    /// The dialog closed itself after its group completed.
    fn on_close(&self) {}
}
