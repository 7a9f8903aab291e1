//! Buy and sell dialogs: submit an order group, poll it until it is executed, then reconcile.

use crate::backend::http::BackendClient;
use crate::backend::{OrderExecutionService, PortfolioDataService, QuoteService};
use crate::domain::order::{GroupId, LegSubmission};
use std::fmt;
use std::sync::Arc;

pub mod buy;
mod dialog;
pub mod observer;
pub mod poll;
pub mod sell;
pub mod state;
pub mod timer;

#[cfg(test)]
mod testing;

pub use buy::{BuyDialog, BuyTicket};
pub use observer::{Alert, Severity, WorkflowObserver};
pub use poll::Flow;
pub use sell::SellDialog;
pub use state::{FailureReason, IllegalTransition, OrderEvent, OrderState};
pub use timer::PollTimer;

pub(crate) const DEFAULT_CONFLICT_DETAIL: &str =
    "Client already has an open position or a pending order for this ticker.";

/// The collaborators a dialog talks to.
#[derive(Clone)]
pub struct Services {
    pub execution: Arc<dyn OrderExecutionService>,
    pub portfolio: Arc<dyn PortfolioDataService>,
    pub quotes: Arc<dyn QuoteService>,
}

impl Services {
    pub fn from_backend(client: Arc<BackendClient>) -> Self {
        Self {
            execution: client.clone(),
            portfolio: client.clone(),
            quotes: client,
        }
    }
}

/// Why a submit was refused before reaching the network.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitBlocked {
    NoTicket,
    NoAmount,
    NoLegs,
    ExposureExceeded { estimated: f64, max: f64 },
    Busy { state: &'static str },
    PositionClosed { operation_id: i64 },
}

impl fmt::Display for SubmitBlocked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitBlocked::NoTicket => f.write_str("no order ticket is open"),
            SubmitBlocked::NoAmount => f.write_str("set a quantity or a value first"),
            SubmitBlocked::NoLegs => f.write_str("no legs to send; validate the distribution first"),
            SubmitBlocked::ExposureExceeded { estimated, max } => write!(
                f,
                "estimated total {estimated:.2} exceeds the client's maximum of {max:.2}"
            ),
            SubmitBlocked::Busy { state } => {
                write!(f, "a submission is already in progress (state={state})")
            }
            SubmitBlocked::PositionClosed { operation_id } => {
                write!(f, "operation {operation_id} is already closed")
            }
        }
    }
}

impl std::error::Error for SubmitBlocked {}

/// What happened to a submit that reached the execution service.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Accepted; the group is being polled.
    Polling {
        group_id: GroupId,
        legs: Vec<LegSubmission>,
    },
    /// Accepted without a group: nothing left to execute.
    NothingToExecute { legs: Vec<LegSubmission> },
    /// 409 from the server.
    Conflict { detail: String },
    Failed { detail: String },
}

impl SubmitOutcome {
    pub fn group_id(&self) -> Option<&GroupId> {
        match self {
            SubmitOutcome::Polling { group_id, .. } => Some(group_id),
            _ => None,
        }
    }
}
