use crate::backend::ClientId;
use crate::domain::order::{GroupId, GroupStatus};
use crate::domain::portfolio::PortfolioSnapshot;
use crate::workflow::observer::{Alert, WorkflowObserver};
use crate::workflow::state::{OrderEvent, OrderState};
use crate::workflow::Services;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Buy,
    Sell,
}

impl Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::Buy => "buy",
            Flow::Sell => "sell",
        }
    }
}

/// Applies `event` to the shared state. Returns false (state untouched) when illegal.
pub(crate) fn apply(state: &watch::Sender<OrderState>, event: OrderEvent) -> bool {
    state.send_if_modified(|current| match current.transition(event) {
        Ok(next) => {
            *current = next;
            true
        }
        Err(err) => {
            tracing::debug!(error = %err, "ignoring order event");
            false
        }
    })
}

/// Watches one order group until it is fully executed.
pub(crate) struct PollJob {
    pub flow: Flow,
    pub client_id: ClientId,
    pub group_id: GroupId,
    pub interval: Duration,
    pub services: Services,
    pub observer: Arc<dyn WorkflowObserver>,
    pub state: Arc<watch::Sender<OrderState>>,
}

impl PollJob {
    async fn fetch(&self) -> anyhow::Result<GroupStatus> {
        match self.flow {
            Flow::Buy => {
                self.services
                    .execution
                    .buy_status(self.client_id, &self.group_id)
                    .await
            }
            Flow::Sell => {
                self.services
                    .execution
                    .sell_status(self.client_id, &self.group_id)
                    .await
            }
        }
    }

    /// Sleeps a full interval after each answer before asking again, so requests never overlap.
    pub(crate) async fn run(self) {
        let mut tick: u64 = 0;
        loop {
            tokio::time::sleep(self.interval).await;
            tick += 1;

            let status = match self.fetch().await {
                Ok(status) => status,
                Err(err) => {
                    tracing::warn!(
                        flow = self.flow.as_str(),
                        group_id = %self.group_id,
                        tick,
                        error = %err,
                        "group status poll failed; retrying next tick"
                    );
                    continue;
                }
            };

            let executed = status.legs.iter().filter(|l| l.executed).count();
            tracing::debug!(
                flow = self.flow.as_str(),
                group_id = %self.group_id,
                tick,
                executed_all = status.executed_all,
                legs = status.legs.len(),
                executed,
                "group status polled"
            );

            if !apply(
                &self.state,
                OrderEvent::Polled(self.group_id.clone(), status.clone()),
            ) {
                // Dialog was closed or moved on; stop observing.
                return;
            }
            self.observer.on_status(&status);

            if status.executed_all {
                tracing::info!(
                    flow = self.flow.as_str(),
                    group_id = %self.group_id,
                    tick,
                    "order group fully executed"
                );
                self.reconcile().await;
                if apply(&self.state, OrderEvent::Executed(self.group_id.clone())) {
                    self.observer.on_close();
                } else {
                    tracing::debug!(
                        group_id = %self.group_id,
                        "dialog closed during reconciliation; not closing it again"
                    );
                }
                return;
            }
        }
    }

    /// Refreshes operations and summary from the server; never computes positions locally.
    async fn reconcile(&self) {
        let portfolio = &self.services.portfolio;
        let (operations, summary) = tokio::join!(
            portfolio.operations(self.client_id),
            portfolio.summary(self.client_id)
        );

        match (operations, summary) {
            (Ok(operations), Ok(summary)) => {
                tracing::info!(
                    client_id = self.client_id,
                    operations = operations.len(),
                    "portfolio reconciled"
                );
                self.observer
                    .on_reconciled(&PortfolioSnapshot { operations, summary });
            }
            (operations, summary) => {
                for err in [operations.err(), summary.err()].into_iter().flatten() {
                    tracing::error!(
                        client_id = self.client_id,
                        group_id = %self.group_id,
                        error = %err,
                        "portfolio refresh after execution failed"
                    );
                }
                self.observer.on_alert(&Alert::error(
                    "Order executed, but the portfolio could not be refreshed. Reload it to see the new position.",
                ));
            }
        }
    }
}
