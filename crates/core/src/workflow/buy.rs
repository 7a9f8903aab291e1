use crate::backend::error::{api_error, conflict};
use crate::backend::{BuyOrder, ClientId, DistributionRequest};
use crate::domain::order::{EntryAmount, Execution, LegValidation, OrderLeg};
use crate::domain::recommendation::Candidate;
use crate::exposure;
use crate::workflow::dialog::DialogCore;
use crate::workflow::observer::{Alert, WorkflowObserver};
use crate::workflow::poll::Flow;
use crate::workflow::state::OrderState;
use crate::workflow::{Services, SubmitBlocked, SubmitOutcome, DEFAULT_CONFLICT_DETAIL};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Take-profit suggested over a refreshed quote. The dialog always buys.
const QUOTE_TARGET_FACTOR: f64 = 1.05;

/// Everything the operator has entered for one buy.
#[derive(Debug, Clone, PartialEq)]
pub struct BuyTicket {
    pub candidate: Candidate,
    pub execution: Execution,
    pub amount: Option<EntryAmount>,
    pub target_price: Option<f64>,
    pub live_quote: Option<f64>,
    /// Last target the dialog proposed; used to tell operator edits apart.
    pub suggested_target: Option<f64>,
    pub legs: Vec<OrderLeg>,
    pub validations: Vec<LegValidation>,
    pub messages: Vec<String>,
}

impl BuyTicket {
    fn new(candidate: Candidate) -> Self {
        let suggested = candidate.suggested_target.map(round_cents);
        Self {
            candidate,
            execution: Execution::Market,
            amount: None,
            target_price: suggested,
            live_quote: None,
            suggested_target: suggested,
            legs: Vec::new(),
            validations: Vec::new(),
            messages: Vec::new(),
        }
    }

    fn clear_proposal(&mut self) {
        self.legs.clear();
        self.validations.clear();
        self.messages.clear();
    }

    /// Live quote, else the candidate's reference, else the limit price.
    pub fn reference_price(&self) -> Option<f64> {
        self.live_quote
            .or(self.candidate.reference_price)
            .or(self.execution.limit_price())
    }
}

/// Buy dialog for one selected candidate at a time.
pub struct BuyDialog {
    core: DialogCore,
    ticket: Option<BuyTicket>,
    max_buy_value: Option<f64>,
}

impl BuyDialog {
    pub fn new(
        client_id: ClientId,
        services: Services,
        observer: Arc<dyn WorkflowObserver>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            core: DialogCore::new(Flow::Buy, client_id, services, observer, poll_interval),
            ticket: None,
            max_buy_value: None,
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

    pub fn ticket(&self) -> Option<&BuyTicket> {
        self.ticket.as_ref()
    }

    pub fn max_buy_value(&self) -> Option<f64> {
        self.max_buy_value
    }

    /// Starts a fresh ticket. Any poll task of a previous ticket is released.
    pub fn open(&mut self, candidate: Candidate) {
        self.core.close();
        tracing::info!(
            client_id = self.core.client_id,
            ticker = %candidate.ticker,
            side = candidate.side.as_str(),
            "buy ticket opened"
        );
        self.ticket = Some(BuyTicket::new(candidate));
    }

    /// Fetches the client record and summary and derives the exposure cap.
    pub async fn load_exposure(&mut self) -> Option<f64> {
        let client_id = self.core.client_id;
        let portfolio = &self.core.services.portfolio;
        let (client, summary) = tokio::join!(portfolio.client(client_id), portfolio.summary(client_id));

        let client = client
            .map_err(|err| tracing::warn!(client_id, error = %err, "client record unavailable"))
            .ok();
        let summary = summary
            .map_err(|err| tracing::warn!(client_id, error = %err, "portfolio summary unavailable"))
            .ok();

        let equity = summary.as_ref().and_then(|s| s.patrimonio);
        let pct = client
            .as_ref()
            .and_then(|c| c.percentual_patrimonio)
            .or_else(|| summary.as_ref().and_then(|s| s.percentual_patrimonio));
        let available = summary.as_ref().and_then(|s| s.valor_disponivel);

        self.max_buy_value = exposure::max_buy_value_for(equity, pct, available);
        tracing::info!(
            client_id,
            equity,
            pct,
            available,
            max_buy_value = self.max_buy_value,
            "exposure cap loaded"
        );
        self.max_buy_value
    }

    pub fn set_execution(&mut self, execution: Execution) {
        if let Some(ticket) = self.ticket.as_mut() {
            ticket.execution = execution;
        }
    }

    pub fn set_amount(&mut self, amount: EntryAmount) {
        if let Some(ticket) = self.ticket.as_mut() {
            ticket.amount = Some(amount);
        }
    }

    pub fn set_target_price(&mut self, target_price: Option<f64>) {
        if let Some(ticket) = self.ticket.as_mut() {
            ticket.target_price = target_price;
        }
    }

    /// Overrides one leg's quantity; the value is sent as given. False if no such leg.
    pub fn set_leg_quantity(&mut self, symbol: &str, quantity: f64) -> bool {
        let Some(leg) = self
            .ticket
            .as_mut()
            .and_then(|t| t.legs.iter_mut().find(|l| l.symbol.eq_ignore_ascii_case(symbol)))
        else {
            return false;
        };
        leg.quantity = quantity;
        true
    }

    /// Asks the quote service for a live price and re-suggests the target from it.
    ///
    /// The operator's target is replaced only when it was empty or still the previous
    /// suggestion.
    pub async fn refresh_quote(&mut self) -> Option<f64> {
        let ticket = self.ticket.as_mut()?;
        let ticker = ticket.candidate.ticker.clone();
        let quote = self
            .core
            .services
            .quotes
            .live_quote(self.core.client_id, &ticker)
            .await;

        match quote {
            Ok(Some(quote)) if quote.is_finite() && quote > 0.0 => {
                let suggested = round_cents(quote * QUOTE_TARGET_FACTOR);
                let operator_edited = ticket
                    .target_price
                    .is_some_and(|tp| !same_cent(tp, ticket.suggested_target));
                if !operator_edited {
                    ticket.target_price = Some(suggested);
                }
                ticket.live_quote = Some(quote);
                ticket.suggested_target = Some(suggested);
                tracing::info!(%ticker, quote, suggested, operator_edited, "live quote refreshed");
                Some(quote)
            }
            Ok(_) => {
                tracing::warn!(%ticker, "no live quote available");
                self.core
                    .alert(Alert::warning(format!("No live quote available for {ticker}.")));
                None
            }
            Err(err) => {
                tracing::error!(%ticker, error = %err, "live quote request failed");
                self.core.alert(Alert::error(format!(
                    "Could not fetch the live quote for {ticker}."
                )));
                None
            }
        }
    }

    /// Asks the execution service how to split the order and keeps its legs.
    pub async fn validate(&mut self) -> Result<(), SubmitBlocked> {
        let ticket = self.ticket.as_mut().ok_or(SubmitBlocked::NoTicket)?;
        let amount = ticket.amount.ok_or(SubmitBlocked::NoAmount)?;
        let request = DistributionRequest {
            ticker: ticket.candidate.ticker.clone(),
            execution: ticket.execution,
            amount,
            target_price: ticket.target_price,
        };

        let result = self
            .core
            .services
            .execution
            .validate_distribution(self.core.client_id, &request)
            .await;

        match result {
            Ok(proposal) => {
                for failed in proposal.failed_validations() {
                    self.core.alert(Alert::warning(match &failed.reason {
                        Some(reason) => format!("{}: {reason}", failed.symbol),
                        None => format!("{}: validation failed", failed.symbol),
                    }));
                }
                for message in &proposal.messages {
                    self.core.alert(Alert::info(message.clone()));
                }
                tracing::info!(
                    ticker = %request.ticker,
                    legs = proposal.legs.len(),
                    failed = proposal.failed_validations().count(),
                    "distribution validated"
                );
                ticket.legs = proposal.legs;
                ticket.validations = proposal.validations;
                ticket.messages = proposal.messages;
            }
            Err(err) => {
                ticket.clear_proposal();
                if let Some(api) = conflict(&err) {
                    let detail = if api.detail.trim().is_empty() {
                        DEFAULT_CONFLICT_DETAIL.to_string()
                    } else {
                        api.detail.clone()
                    };
                    tracing::warn!(ticker = %request.ticker, %detail, "distribution refused with conflict");
                    self.core.alert(Alert::warning(detail));
                } else {
                    let detail = api_error(&err)
                        .map(|e| e.detail.clone())
                        .unwrap_or_else(|| format!("{err:#}"));
                    tracing::error!(ticker = %request.ticker, error = %err, "distribution validation failed");
                    self.core.alert(Alert::error(format!(
                        "Failed to validate the distribution: {detail}"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn reference_price(&self) -> Option<f64> {
        self.ticket.as_ref().and_then(BuyTicket::reference_price)
    }

    pub fn estimated_total(&self) -> Option<f64> {
        let ticket = self.ticket.as_ref()?;
        exposure::estimate_total(&ticket.legs, ticket.reference_price())
    }

    pub fn exceeds_limit(&self) -> bool {
        exposure::exceeds_limit(self.estimated_total(), self.max_buy_value)
    }

    /// Sends the legs exactly as held and starts polling the resulting group.
    pub async fn submit(&mut self) -> Result<SubmitOutcome, SubmitBlocked> {
        let ticket = self.ticket.as_ref().ok_or(SubmitBlocked::NoTicket)?;
        if ticket.legs.is_empty() {
            return Err(SubmitBlocked::NoLegs);
        }
        if let (Some(estimated), Some(max)) = (self.estimated_total(), self.max_buy_value) {
            if exposure::exceeds_limit(Some(estimated), Some(max)) {
                tracing::warn!(
                    ticker = %ticket.candidate.ticker,
                    estimated,
                    max,
                    "buy blocked by exposure cap"
                );
                return Err(SubmitBlocked::ExposureExceeded { estimated, max });
            }
        }
        self.core.begin_submit()?;

        let order = BuyOrder {
            ticker_base: ticket.candidate.ticker.clone(),
            execution: ticket.execution,
            target_price: ticket.target_price,
            legs: ticket.legs.clone(),
        };
        let result = self
            .core
            .services
            .execution
            .submit_buy(self.core.client_id, &order)
            .await;

        let outcome = self.core.settle(result);
        if matches!(outcome, SubmitOutcome::Conflict { .. }) {
            if let Some(ticket) = self.ticket.as_mut() {
                ticket.clear_proposal();
            }
        }
        Ok(outcome)
    }

    /// Stops polling and resets the state. The ticket stays for a possible resubmit.
    pub fn close(&mut self) {
        self.core.close();
    }

    /// Resolves once the poll task ends on its own, i.e. the group executed.
    pub async fn finished(&mut self) {
        self.core.finished().await;
    }
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn same_cent(a: f64, b: Option<f64>) -> bool {
    b.is_some_and(|b| (a * 100.0).round() == (b * 100.0).round())
}
