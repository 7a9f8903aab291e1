use crate::domain::contract::{AiRecommendation, ClassicRecommendation};
use crate::domain::order::{
    EntryAmount, Execution, GroupId, GroupStatus, LegProposal, OrderLeg, SubmitOutcomeReport,
};
use crate::domain::portfolio::{ClientRecord, Operation, PortfolioSummary};
use crate::domain::recommendation::AiFeedFilter;

pub mod error;
pub mod http;

pub type ClientId = i64;

/// Request for a leg distribution of one base ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionRequest {
    pub ticker: String,
    pub execution: Execution,
    pub amount: EntryAmount,
    pub target_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuyOrder {
    pub ticker_base: String,
    pub execution: Execution,
    pub target_price: Option<f64>,
    pub legs: Vec<OrderLeg>,
}

#[async_trait::async_trait]
pub trait RecommendationFeed: Send + Sync {
    async fn classic_candidates(&self, client_id: ClientId)
        -> anyhow::Result<Vec<ClassicRecommendation>>;

    async fn ai_candidates(&self, filter: &AiFeedFilter) -> anyhow::Result<Vec<AiRecommendation>>;
}

/// The MT5 bridge: lot splitting, order placement and execution tracking.
#[async_trait::async_trait]
pub trait OrderExecutionService: Send + Sync {
    async fn validate_distribution(
        &self,
        client_id: ClientId,
        request: &DistributionRequest,
    ) -> anyhow::Result<LegProposal>;

    async fn submit_buy(
        &self,
        client_id: ClientId,
        order: &BuyOrder,
    ) -> anyhow::Result<SubmitOutcomeReport>;

    async fn buy_status(&self, client_id: ClientId, group_id: &GroupId)
        -> anyhow::Result<GroupStatus>;

    async fn submit_sell(
        &self,
        client_id: ClientId,
        operation_id: i64,
        execution: Execution,
    ) -> anyhow::Result<SubmitOutcomeReport>;

    async fn sell_status(&self, client_id: ClientId, group_id: &GroupId)
        -> anyhow::Result<GroupStatus>;
}

#[async_trait::async_trait]
pub trait QuoteService: Send + Sync {
    /// `Ok(None)` when the bridge answered but had no price.
    async fn live_quote(&self, client_id: ClientId, ticker: &str) -> anyhow::Result<Option<f64>>;
}

#[async_trait::async_trait]
pub trait PortfolioDataService: Send + Sync {
    async fn client(&self, client_id: ClientId) -> anyhow::Result<ClientRecord>;

    async fn operations(&self, client_id: ClientId) -> anyhow::Result<Vec<Operation>>;

    async fn summary(&self, client_id: ClientId) -> anyhow::Result<PortfolioSummary>;
}
