use crate::backend::error::ApiError;
use crate::backend::{
    BuyOrder, ClientId, DistributionRequest, OrderExecutionService, PortfolioDataService,
    QuoteService, RecommendationFeed,
};
use crate::config::Settings;
use crate::domain::contract::{
    AiRecommendation, ClassicRecommendation, ListEnvelope, QuoteResponse, StatusResponse,
    SubmitBuyBody, SubmitResponse, SubmitSellBody, ValidateBuyBody, ValidateBuyResponse, WireLeg,
};
use crate::domain::order::{Execution, GroupId, GroupStatus, LegProposal, SubmitOutcomeReport};
use crate::domain::portfolio::{ClientRecord, Operation, PortfolioSummary};
use crate::domain::recommendation::AiFeedFilter;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// REST client for the brokerage backend. Implements every collaborator trait.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    retries: u32,
}

impl BackendClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_api_url()?.to_string();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("failed to build backend http client")?;

        Ok(Self {
            http,
            base_url,
            token: settings.api_token.clone(),
            retries: settings.retries.max(1),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = &self.token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))
                    .context("bearer token is not a valid header value")?,
            );
        }
        Ok(headers)
    }

    /// Sends one request and decodes the JSON answer. Never retries.
    async fn send_once<B, T>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let mut req = self
            .http
            .request(method.clone(), self.url(endpoint))
            .headers(self.headers()?);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let res = req
            .send()
            .await
            .with_context(|| format!("backend request failed: {method} {endpoint}"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .with_context(|| format!("failed to read backend response: {method} {endpoint}"))?;

        if !status.is_success() {
            return Err(ApiError::from_response(endpoint, status, &text).into());
        }

        // Empty bodies decode as JSON null so unit-like answers still parse.
        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str::<T>(text)
            .with_context(|| format!("failed to parse backend response for {endpoint}: {text}"))
    }

    /// Idempotent GET with retry on transport errors, 429 and 5xx.
    async fn get_with_retry<T>(&self, endpoint: &str, query: &[(&str, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self
                .send_once::<(), T>(Method::GET, endpoint, query, None)
                .await
            {
                Ok(v) => return Ok(v),
                Err(err) => {
                    if attempt >= self.retries || !is_retryable(&err) {
                        return Err(err);
                    }
                    let backoff = backoff_for(attempt);
                    tracing::warn!(
                        attempt,
                        ?backoff,
                        endpoint,
                        error = %err,
                        "backend GET failed; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// Upper bound on the wait between GET attempts.
const MAX_BACKOFF_SECS: u64 = 30;

/// 1s, 2s, 4s, ... after each failed attempt, capped at `MAX_BACKOFF_SECS`.
fn backoff_for(attempt: u32) -> Duration {
    let secs = 1u64
        .checked_shl(attempt.saturating_sub(1))
        .unwrap_or(u64::MAX)
        .min(MAX_BACKOFF_SECS);
    Duration::from_secs(secs)
}

fn is_retryable(err: &anyhow::Error) -> bool {
    match crate::backend::error::api_error(err) {
        Some(api) => {
            let status = StatusCode::from_u16(api.status).unwrap_or(StatusCode::OK);
            status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
        }
        // Transport failures carry a reqwest error; parse failures do not and are final.
        None => err
            .chain()
            .any(|e| e.downcast_ref::<reqwest::Error>().is_some()),
    }
}

#[async_trait::async_trait]
impl RecommendationFeed for BackendClient {
    async fn classic_candidates(&self, client_id: ClientId) -> Result<Vec<ClassicRecommendation>> {
        let endpoint = format!("clientes/{client_id}/recomendacoes-disponiveis/");
        let list: ListEnvelope<ClassicRecommendation> =
            self.get_with_retry(&endpoint, &[]).await?;
        Ok(list.into_vec())
    }

    async fn ai_candidates(&self, filter: &AiFeedFilter) -> Result<Vec<AiRecommendation>> {
        let list: ListEnvelope<AiRecommendation> = self
            .get_with_retry("recomendacoes-ia/", &filter.query_pairs())
            .await?;
        Ok(list.into_vec())
    }
}

#[async_trait::async_trait]
impl OrderExecutionService for BackendClient {
    async fn validate_distribution(
        &self,
        client_id: ClientId,
        request: &DistributionRequest,
    ) -> Result<LegProposal> {
        let endpoint = format!("clientes/{client_id}/mt5/compra/validar/");
        let body = ValidateBuyBody::new(
            &request.ticker,
            request.execution,
            request.amount,
            request.target_price,
        );
        let res: ValidateBuyResponse = self
            .send_once(Method::POST, &endpoint, &[], Some(&body))
            .await?;

        Ok(LegProposal {
            legs: res.legs_sugeridas.into_iter().map(Into::into).collect(),
            validations: res.validacoes.into_iter().map(Into::into).collect(),
            messages: res
                .mensagens
                .into_iter()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect(),
        })
    }

    async fn submit_buy(&self, client_id: ClientId, order: &BuyOrder) -> Result<SubmitOutcomeReport> {
        let endpoint = format!("clientes/{client_id}/mt5/compra/");
        let body = SubmitBuyBody {
            ticker_base: order.ticker_base.clone(),
            execucao: order.execution.wire_name(),
            preco: order.execution.limit_price(),
            tp: order.target_price,
            legs: order.legs.iter().map(WireLeg::from).collect(),
        };
        let res: Option<SubmitResponse> = self
            .send_once(Method::POST, &endpoint, &[], Some(&body))
            .await?;
        Ok(res.unwrap_or_default().into_report())
    }

    async fn buy_status(&self, client_id: ClientId, group_id: &GroupId) -> Result<GroupStatus> {
        let endpoint = format!("clientes/{client_id}/mt5/compra-status/{group_id}/");
        let res: StatusResponse = self
            .send_once::<(), _>(Method::GET, &endpoint, &[], None)
            .await?;
        Ok(res.into())
    }

    async fn submit_sell(
        &self,
        client_id: ClientId,
        operation_id: i64,
        execution: Execution,
    ) -> Result<SubmitOutcomeReport> {
        let endpoint = format!("clientes/{client_id}/mt5/venda/{operation_id}/");
        let body = SubmitSellBody::new(execution);
        let res: Option<SubmitResponse> = self
            .send_once(Method::POST, &endpoint, &[], Some(&body))
            .await?;
        Ok(res.unwrap_or_default().into_report())
    }

    async fn sell_status(&self, client_id: ClientId, group_id: &GroupId) -> Result<GroupStatus> {
        let endpoint = format!("clientes/{client_id}/mt5/venda-status/{group_id}/");
        let res: StatusResponse = self
            .send_once::<(), _>(Method::GET, &endpoint, &[], None)
            .await?;
        Ok(res.into())
    }
}

#[async_trait::async_trait]
impl QuoteService for BackendClient {
    async fn live_quote(&self, client_id: ClientId, ticker: &str) -> Result<Option<f64>> {
        let endpoint = format!(
            "clientes/{client_id}/mt5/cotacao/{}/",
            ticker.trim().to_uppercase()
        );
        let res: Option<QuoteResponse> = self
            .send_once::<(), _>(Method::GET, &endpoint, &[], None)
            .await?;
        Ok(res.and_then(|r| r.cotacao))
    }
}

#[async_trait::async_trait]
impl PortfolioDataService for BackendClient {
    async fn client(&self, client_id: ClientId) -> Result<ClientRecord> {
        self.get_with_retry(&format!("clientes/{client_id}/"), &[])
            .await
    }

    async fn operations(&self, client_id: ClientId) -> Result<Vec<Operation>> {
        let list: ListEnvelope<Operation> = self
            .get_with_retry("operacoes/", &[("cliente", client_id.to_string())])
            .await?;
        Ok(list.into_vec())
    }

    async fn summary(&self, client_id: ClientId) -> Result<PortfolioSummary> {
        self.get_with_retry(&format!("clientes/{client_id}/resumo/"), &[])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderLeg;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn client(base_url: &str) -> BackendClient {
        BackendClient {
            http: reqwest::Client::new(),
            base_url: base_url.to_string(),
            token: Some("secret".to_string()),
            retries: 3,
        }
    }

    fn response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    /// Reads one request (headers and body) off the socket.
    async fn read_request(stream: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let header_end = loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
        let length = head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let mut read = buf.len() - header_end;
        while read < length {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            read += n;
        }
    }

    /// Local backend answering each connection with the next scripted response.
    /// Once the script runs out the last response repeats.
    async fn scripted_backend(script: Vec<String>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/api/", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                read_request(&mut stream).await;
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let reply = script
                    .get(n)
                    .or_else(|| script.last())
                    .cloned()
                    .unwrap_or_default();
                let _ = stream.write_all(reply.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        (base_url, hits)
    }

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(backoff_for(1), Duration::from_secs(1));
        assert_eq!(backoff_for(2), Duration::from_secs(2));
        assert_eq!(backoff_for(3), Duration::from_secs(4));
        assert_eq!(backoff_for(10), Duration::from_secs(MAX_BACKOFF_SECS));
        assert_eq!(backoff_for(64), Duration::from_secs(MAX_BACKOFF_SECS));
        assert_eq!(backoff_for(200), Duration::from_secs(MAX_BACKOFF_SECS));
    }

    #[tokio::test(start_paused = true)]
    async fn get_retries_unavailable_backend_until_it_answers() {
        let (base_url, hits) = scripted_backend(vec![
            response("503 Service Unavailable", ""),
            response("503 Service Unavailable", ""),
            response("200 OK", r#"{"patrimonio": "1500.50"}"#),
        ])
        .await;

        let summary = client(&base_url).summary(7).await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(summary.patrimonio, Some(1500.5));
    }

    #[tokio::test(start_paused = true)]
    async fn get_gives_up_after_configured_attempts() {
        let (base_url, hits) =
            scripted_backend(vec![response("503 Service Unavailable", "")]).await;

        let err = client(&base_url).summary(7).await.unwrap_err();

        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(crate::backend::error::api_error(&err).unwrap().status, 503);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_resource_is_not_retried() {
        let (base_url, hits) = scripted_backend(vec![
            response("404 Not Found", r#"{"detail": "not found"}"#),
            response("200 OK", "{}"),
        ])
        .await;

        let err = client(&base_url).summary(7).await.unwrap_err();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(crate::backend::error::api_error(&err).unwrap().status, 404);
    }

    #[tokio::test(start_paused = true)]
    async fn order_submission_is_sent_exactly_once() {
        let (base_url, hits) = scripted_backend(vec![
            response("503 Service Unavailable", ""),
            response("200 OK", r#"{"group_id": "g-1"}"#),
        ])
        .await;
        let order = BuyOrder {
            ticker_base: "PETR4".into(),
            execution: Execution::Market,
            target_price: Some(40.0),
            legs: vec![OrderLeg {
                symbol: "PETR4".into(),
                quantity: 100.0,
            }],
        };

        let err = client(&base_url).submit_buy(7, &order).await.unwrap_err();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(crate::backend::error::api_error(&err).unwrap().status, 503);
    }

    #[test]
    fn url_joins_without_double_slashes() {
        let c = client("https://desk.example.com/api/");
        assert_eq!(
            c.url("clientes/4/resumo/"),
            "https://desk.example.com/api/clientes/4/resumo/"
        );
        assert_eq!(c.url("/operacoes/"), "https://desk.example.com/api/operacoes/");
    }

    #[test]
    fn headers_carry_bearer_token() {
        let headers = client("https://x").headers().unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer secret");
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn only_transient_statuses_are_retried() {
        let busy = anyhow::Error::new(ApiError::from_response(
            "x/",
            StatusCode::SERVICE_UNAVAILABLE,
            "",
        ));
        let throttled = anyhow::Error::new(ApiError::from_response(
            "x/",
            StatusCode::TOO_MANY_REQUESTS,
            "",
        ));
        let missing = anyhow::Error::new(ApiError::from_response("x/", StatusCode::NOT_FOUND, ""));
        let parse = anyhow::anyhow!("failed to parse backend response");

        assert!(is_retryable(&busy));
        assert!(is_retryable(&throttled));
        assert!(!is_retryable(&missing));
        assert!(!is_retryable(&parse));
    }
}
