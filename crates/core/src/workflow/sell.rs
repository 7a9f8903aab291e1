use crate::backend::ClientId;
use crate::domain::order::Execution;
use crate::domain::portfolio::Operation;
use crate::workflow::dialog::DialogCore;
use crate::workflow::observer::WorkflowObserver;
use crate::workflow::poll::Flow;
use crate::workflow::state::OrderState;
use crate::workflow::{Services, SubmitBlocked, SubmitOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Sell dialog: closes one open operation through the MT5 bridge.
pub struct SellDialog {
    core: DialogCore,
    operation: Option<Operation>,
    execution: Execution,
}

impl SellDialog {
    pub fn new(
        client_id: ClientId,
        services: Services,
        observer: Arc<dyn WorkflowObserver>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            core: DialogCore::new(Flow::Sell, client_id, services, observer, poll_interval),
            operation: None,
            execution: Execution::Market,
        }
    }

    pub fn state(&self) -> OrderState {
        self.core.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<OrderState> {
        self.core.subscribe()
    }

    pub fn is_polling(&self) -> bool {
        self.core.is_polling()
    }

    pub fn operation(&self) -> Option<&Operation> {
        self.operation.as_ref()
    }

    pub fn open(&mut self, operation: Operation) {
        self.core.close();
        tracing::info!(
            client_id = self.core.client_id,
            operation_id = operation.id,
            ticker = operation.ticker().as_deref().unwrap_or("?"),
            "sell ticket opened"
        );
        self.operation = Some(operation);
        self.execution = Execution::Market;
    }

    pub fn set_execution(&mut self, execution: Execution) {
        self.execution = execution;
    }

    pub async fn submit(&mut self) -> Result<SubmitOutcome, SubmitBlocked> {
        let operation = self.operation.as_ref().ok_or(SubmitBlocked::NoTicket)?;
        if !operation.is_open() {
            return Err(SubmitBlocked::PositionClosed {
                operation_id: operation.id,
            });
        }
        self.core.begin_submit()?;

        let result = self
            .core
            .services
            .execution
            .submit_sell(self.core.client_id, operation.id, self.execution)
            .await;
        Ok(self.core.settle(result))
    }

    pub fn close(&mut self) {
        self.core.close();
    }

    pub async fn finished(&mut self) {
        self.core.finished().await;
    }
}
