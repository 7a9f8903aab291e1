//! In-memory collaborators for dialog tests.

use crate::backend::error::ApiError;
use crate::backend::{
    BuyOrder, ClientId, DistributionRequest, OrderExecutionService, PortfolioDataService,
    QuoteService,
};
use crate::domain::order::{
    Execution, GroupId, GroupStatus, LegExecution, LegProposal, OrderLeg, SubmitOutcomeReport,
};
use crate::domain::portfolio::{ClientRecord, Operation, PortfolioSnapshot, PortfolioSummary};
use crate::workflow::observer::{Alert, Severity, WorkflowObserver};
use crate::workflow::Services;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub(crate) enum Reply<T> {
    Ok(T),
    Status(u16, &'static str),
    Transport,
}

impl<T: Clone> Reply<T> {
    fn get(&self, endpoint: &str) -> anyhow::Result<T> {
        match self {
            Reply::Ok(v) => Ok(v.clone()),
            Reply::Status(status, detail) => Err(anyhow::Error::new(ApiError {
                endpoint: endpoint.to_string(),
                status: *status,
                detail: detail.to_string(),
                payload: None,
            })),
            Reply::Transport => Err(anyhow::anyhow!("connection reset by peer")),
        }
    }
}

pub(crate) fn leg(symbol: &str, quantity: f64) -> OrderLeg {
    OrderLeg {
        symbol: symbol.to_string(),
        quantity,
    }
}

pub(crate) fn pending() -> GroupStatus {
    GroupStatus {
        executed_all: false,
        legs: vec![LegExecution {
            symbol: "PETR4".into(),
            executed: false,
            executed_volume: Some(0.0),
            average_price: None,
        }],
        created_operation_id: None,
    }
}

pub(crate) fn executed() -> GroupStatus {
    GroupStatus {
        executed_all: true,
        legs: vec![LegExecution {
            symbol: "PETR4".into(),
            executed: true,
            executed_volume: Some(100.0),
            average_price: Some(10.0),
        }],
        created_operation_id: Some(99),
    }
}

pub(crate) fn accepted(group: &str) -> SubmitOutcomeReport {
    SubmitOutcomeReport {
        group_id: Some(GroupId::new(group)),
        legs: Vec::new(),
    }
}

pub(crate) struct FakeExecution {
    pub proposal: Mutex<Reply<LegProposal>>,
    pub submit: Mutex<Reply<SubmitOutcomeReport>>,
    /// Consumed one per poll; once empty every poll answers "pending".
    pub statuses: Mutex<VecDeque<Reply<GroupStatus>>>,
    pub validations: Mutex<Vec<DistributionRequest>>,
    pub buys: Mutex<Vec<BuyOrder>>,
    pub sells: Mutex<Vec<(i64, Execution)>>,
    pub status_calls: AtomicUsize,
}

impl FakeExecution {
    pub fn new() -> Self {
        Self {
            proposal: Mutex::new(Reply::Ok(LegProposal::default())),
            submit: Mutex::new(Reply::Ok(accepted("g-1"))),
            statuses: Mutex::new(VecDeque::new()),
            validations: Mutex::new(Vec::new()),
            buys: Mutex::new(Vec::new()),
            sells: Mutex::new(Vec::new()),
            status_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_statuses(self, statuses: Vec<Reply<GroupStatus>>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    pub fn with_submit(self, reply: Reply<SubmitOutcomeReport>) -> Self {
        *self.submit.lock().unwrap() = reply;
        self
    }

    pub fn with_proposal(self, reply: Reply<LegProposal>) -> Self {
        *self.proposal.lock().unwrap() = reply;
        self
    }

    pub fn polls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    fn next_status(&self, endpoint: &str) -> anyhow::Result<GroupStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.statuses.lock().unwrap().pop_front();
        next.unwrap_or(Reply::Ok(pending())).get(endpoint)
    }
}

#[async_trait::async_trait]
impl OrderExecutionService for FakeExecution {
    async fn validate_distribution(
        &self,
        _: ClientId,
        request: &DistributionRequest,
    ) -> anyhow::Result<LegProposal> {
        self.validations.lock().unwrap().push(request.clone());
        self.proposal.lock().unwrap().get("mt5/compra/validar/")
    }

    async fn submit_buy(&self, _: ClientId, order: &BuyOrder) -> anyhow::Result<SubmitOutcomeReport> {
        self.buys.lock().unwrap().push(order.clone());
        self.submit.lock().unwrap().get("mt5/compra/")
    }

    async fn buy_status(&self, _: ClientId, _: &GroupId) -> anyhow::Result<GroupStatus> {
        self.next_status("mt5/compra-status/")
    }

    async fn submit_sell(
        &self,
        _: ClientId,
        operation_id: i64,
        execution: Execution,
    ) -> anyhow::Result<SubmitOutcomeReport> {
        self.sells.lock().unwrap().push((operation_id, execution));
        self.submit.lock().unwrap().get("mt5/venda/")
    }

    async fn sell_status(&self, _: ClientId, _: &GroupId) -> anyhow::Result<GroupStatus> {
        self.next_status("mt5/venda-status/")
    }
}

pub(crate) struct FakePortfolio {
    pub client: ClientRecord,
    pub summary: PortfolioSummary,
    pub operations: Vec<Operation>,
    pub fail_operations: bool,
    pub operations_calls: AtomicUsize,
    pub summary_calls: AtomicUsize,
}

impl FakePortfolio {
    pub fn new() -> Self {
        Self {
            client: ClientRecord {
                id: 1,
                nome: Some("Ana".into()),
                percentual_patrimonio: Some(10.0),
            },
            summary: PortfolioSummary {
                patrimonio: Some(100_000.0),
                ..Default::default()
            },
            operations: Vec::new(),
            fail_operations: false,
            operations_calls: AtomicUsize::new(0),
            summary_calls: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> (usize, usize) {
        (
            self.operations_calls.load(Ordering::SeqCst),
            self.summary_calls.load(Ordering::SeqCst),
        )
    }

    /// Operations and summary fetches made after `before` was taken.
    pub fn fetched_since(&self, before: (usize, usize)) -> (usize, usize) {
        let (operations, summary) = self.fetches();
        (operations - before.0, summary - before.1)
    }
}

#[async_trait::async_trait]
impl PortfolioDataService for FakePortfolio {
    async fn client(&self, _: ClientId) -> anyhow::Result<ClientRecord> {
        Ok(self.client.clone())
    }

    async fn operations(&self, _: ClientId) -> anyhow::Result<Vec<Operation>> {
        self.operations_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_operations {
            anyhow::bail!("operations endpoint unavailable");
        }
        Ok(self.operations.clone())
    }

    async fn summary(&self, _: ClientId) -> anyhow::Result<PortfolioSummary> {
        self.summary_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.summary.clone())
    }
}

pub(crate) struct FakeQuotes {
    pub reply: Mutex<Reply<Option<f64>>>,
}

impl FakeQuotes {
    pub fn new(reply: Reply<Option<f64>>) -> Self {
        Self {
            reply: Mutex::new(reply),
        }
    }

    pub fn set(&self, reply: Reply<Option<f64>>) {
        *self.reply.lock().unwrap() = reply;
    }
}

#[async_trait::async_trait]
impl QuoteService for FakeQuotes {
    async fn live_quote(&self, _: ClientId, _: &str) -> anyhow::Result<Option<f64>> {
        self.reply.lock().unwrap().get("mt5/cotacao/")
    }
}

#[derive(Default)]
pub(crate) struct RecordingObserver {
    pub alerts: Mutex<Vec<Alert>>,
    pub statuses: Mutex<Vec<GroupStatus>>,
    pub reconciled: Mutex<Vec<PortfolioSnapshot>>,
    pub closes: AtomicUsize,
}

impl RecordingObserver {
    pub fn alerts_of(&self, severity: Severity) -> Vec<String> {
        self.alerts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.severity == severity)
            .map(|a| a.text.clone())
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl WorkflowObserver for RecordingObserver {
    fn on_alert(&self, alert: &Alert) {
        self.alerts.lock().unwrap().push(alert.clone());
    }

    fn on_status(&self, status: &GroupStatus) {
        self.statuses.lock().unwrap().push(status.clone());
    }

    fn on_reconciled(&self, snapshot: &PortfolioSnapshot) {
        self.reconciled.lock().unwrap().push(snapshot.clone());
    }

    fn on_close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) struct Harness {
    pub execution: Arc<FakeExecution>,
    pub portfolio: Arc<FakePortfolio>,
    pub quotes: Arc<FakeQuotes>,
    pub observer: Arc<RecordingObserver>,
}

impl Harness {
    pub fn new(execution: FakeExecution, portfolio: FakePortfolio) -> Self {
        Self {
            execution: Arc::new(execution),
            portfolio: Arc::new(portfolio),
            quotes: Arc::new(FakeQuotes::new(Reply::Ok(None))),
            observer: Arc::new(RecordingObserver::default()),
        }
    }

    pub fn services(&self) -> Services {
        Services {
            execution: self.execution.clone(),
            portfolio: self.portfolio.clone(),
            quotes: self.quotes.clone(),
        }
    }

    pub fn observer(&self) -> Arc<dyn WorkflowObserver> {
        self.observer.clone()
    }
}
