use crate::backend::error::{api_error, conflict};
use crate::backend::ClientId;
use crate::domain::order::{GroupId, SubmitOutcomeReport};
use crate::workflow::observer::{Alert, WorkflowObserver};
use crate::workflow::poll::{apply, Flow, PollJob};
use crate::workflow::state::{FailureReason, OrderEvent, OrderState};
use crate::workflow::timer::PollTimer;
use crate::workflow::{Services, SubmitBlocked, SubmitOutcome, DEFAULT_CONFLICT_DETAIL};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// State, timer and collaborators shared by the buy and sell dialogs.
pub(crate) struct DialogCore {
    pub flow: Flow,
    pub client_id: ClientId,
    pub services: Services,
    pub observer: Arc<dyn WorkflowObserver>,
    state: Arc<watch::Sender<OrderState>>,
    timer: PollTimer,
    poll_interval: Duration,
}

impl DialogCore {
    pub fn new(
        flow: Flow,
        client_id: ClientId,
        services: Services,
        observer: Arc<dyn WorkflowObserver>,
        poll_interval: Duration,
    ) -> Self {
        let (state, _) = watch::channel(OrderState::Idle);
        Self {
            flow,
            client_id,
            services,
            observer,
            state: Arc::new(state),
            timer: PollTimer::new(),
            poll_interval,
        }
    }

    pub fn state(&self) -> OrderState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<OrderState> {
        self.state.subscribe()
    }

    pub fn is_polling(&self) -> bool {
        self.timer.is_active()
    }

    pub fn alert(&self, alert: Alert) {
        self.observer.on_alert(&alert);
    }

    /// Moves into `Submitting`, refusing when a submission is already underway.
    pub fn begin_submit(&self) -> Result<(), SubmitBlocked> {
        let current = self.state.borrow().name();
        if apply(&self.state, OrderEvent::Submit) {
            Ok(())
        } else {
            Err(SubmitBlocked::Busy { state: current })
        }
    }

    /// Turns the execution service's answer into the next state, alerting and arming the poll
    /// task as needed.
    pub fn settle(&mut self, result: anyhow::Result<SubmitOutcomeReport>) -> SubmitOutcome {
        let report = match result {
            Ok(report) => report,
            Err(err) => return self.reject(err),
        };

        for leg in report.legs.iter().filter(|l| !l.accepted) {
            tracing::warn!(
                flow = self.flow.as_str(),
                symbol = %leg.symbol,
                detail = leg.detail.as_deref().unwrap_or(""),
                "leg rejected by the execution service"
            );
            self.alert(Alert::warning(match &leg.detail {
                Some(detail) => format!("{}: order rejected ({detail})", leg.symbol),
                None => format!("{}: order rejected", leg.symbol),
            }));
        }

        match report.group_id {
            Some(group_id) => {
                tracing::info!(
                    flow = self.flow.as_str(),
                    client_id = self.client_id,
                    %group_id,
                    legs = report.legs.len(),
                    "order group submitted"
                );
                apply(&self.state, OrderEvent::Accepted(group_id.clone()));
                self.alert(Alert::info(format!(
                    "Order sent (group {group_id}); waiting for execution."
                )));
                self.start_polling(group_id.clone());
                SubmitOutcome::Polling {
                    group_id,
                    legs: report.legs,
                }
            }
            None => {
                tracing::info!(
                    flow = self.flow.as_str(),
                    client_id = self.client_id,
                    "submit accepted with nothing to execute"
                );
                apply(&self.state, OrderEvent::NothingToExecute);
                self.alert(Alert::info("Nothing to execute."));
                SubmitOutcome::NothingToExecute { legs: report.legs }
            }
        }
    }

    fn reject(&mut self, err: anyhow::Error) -> SubmitOutcome {
        if let Some(api) = conflict(&err) {
            let detail = if api.detail.trim().is_empty() {
                DEFAULT_CONFLICT_DETAIL.to_string()
            } else {
                api.detail.clone()
            };
            tracing::warn!(
                flow = self.flow.as_str(),
                client_id = self.client_id,
                %detail,
                "submit refused with conflict"
            );
            apply(
                &self.state,
                OrderEvent::Rejected(FailureReason::Conflict(detail.clone())),
            );
            self.alert(Alert::warning(detail.clone()));
            return SubmitOutcome::Conflict { detail };
        }

        let detail = api_error(&err)
            .map(|e| e.detail.clone())
            .unwrap_or_else(|| format!("{err:#}"));
        tracing::error!(
            flow = self.flow.as_str(),
            client_id = self.client_id,
            error = %err,
            "submit failed"
        );
        apply(
            &self.state,
            OrderEvent::Rejected(FailureReason::Other(detail.clone())),
        );
        self.alert(Alert::error(format!("Failed to send the order: {detail}")));
        SubmitOutcome::Failed { detail }
    }

    fn start_polling(&mut self, group_id: GroupId) {
        let job = PollJob {
            flow: self.flow,
            client_id: self.client_id,
            group_id,
            interval: self.poll_interval,
            services: self.services.clone(),
            observer: self.observer.clone(),
            state: self.state.clone(),
        };
        self.timer.arm(job.run());
    }

    /// Stops observing and returns to `Idle`. The server is not asked to cancel anything.
    pub fn close(&mut self) {
        let was = self.state.borrow().name();
        self.timer.release();
        apply(&self.state, OrderEvent::Reset);
        tracing::debug!(flow = self.flow.as_str(), was, "dialog closed");
    }

    pub async fn finished(&mut self) {
        self.timer.finished().await;
    }
}
