//! Wire shapes exchanged with the backend REST API.
//!
//! The backend serializes decimals inconsistently (JSON numbers from hand-built views, strings
//! from model serializers), so numeric fields go through the lenient helpers in [`lenient`].

use crate::domain::order::{
    EntryAmount, Execution, GroupId, GroupStatus, LegExecution, LegSubmission, LegValidation,
    OrderLeg, SubmitOutcomeReport,
};
use serde::{Deserialize, Serialize};

/// Classic rule-based candidate as returned by `clientes/{id}/recomendacoes-disponiveis/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassicRecommendation {
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub acao_id: Option<i64>,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub empresa: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub cotacao_atual: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub preco_compra: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub alvo_sugerido: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub alvo_sugerido_5pct: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub percentual_estimado: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub probabilidade: Option<f64>,
}

/// AI-directional candidate as returned by `recomendacoes-ia/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiRecommendation {
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub acao: Option<i64>,
    #[serde(default)]
    pub acao_ticker: Option<String>,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub acao_empresa: Option<String>,
    #[serde(default)]
    pub classe: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub prob_up: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub prob_down: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub preco_entrada: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub alvo_percentual: Option<f64>,
}

/// A raw feed record tagged by the feed it came from.
#[derive(Debug, Clone)]
pub enum RawCandidate {
    Classic(ClassicRecommendation),
    Ai(AiRecommendation),
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidateBuyBody {
    pub ticker: String,
    pub modo: &'static str,
    pub execucao: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preco: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantidade: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valor: Option<f64>,
    pub tp: Option<f64>,
}

impl ValidateBuyBody {
    pub fn new(
        ticker: &str,
        execution: Execution,
        amount: EntryAmount,
        target_price: Option<f64>,
    ) -> Self {
        let (quantidade, valor) = match amount {
            EntryAmount::Quantity(q) => (Some(q), None),
            EntryAmount::Value(v) => (None, Some(v)),
        };
        Self {
            ticker: ticker.to_string(),
            modo: amount.wire_mode(),
            execucao: execution.wire_name(),
            preco: execution.limit_price(),
            quantidade,
            valor,
            tp: target_price,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidateBuyResponse {
    #[serde(default)]
    pub legs_sugeridas: Vec<WireLeg>,
    #[serde(default)]
    pub validacoes: Vec<WireLegValidation>,
    #[serde(default)]
    pub mensagens: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireLeg {
    pub symbol: String,
    #[serde(deserialize_with = "lenient::f64_or_nan")]
    pub quantidade: f64,
}

impl From<WireLeg> for OrderLeg {
    fn from(w: WireLeg) -> Self {
        OrderLeg {
            symbol: w.symbol,
            quantity: w.quantidade,
        }
    }
}

impl From<&OrderLeg> for WireLeg {
    fn from(leg: &OrderLeg) -> Self {
        WireLeg {
            symbol: leg.symbol.clone(),
            quantidade: leg.quantity,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireLegValidation {
    pub symbol: String,
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub motivo: Option<String>,
}

impl From<WireLegValidation> for LegValidation {
    fn from(w: WireLegValidation) -> Self {
        LegValidation {
            symbol: w.symbol,
            ok: w.ok,
            reason: w.motivo.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitBuyBody {
    pub ticker_base: String,
    pub execucao: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preco: Option<f64>,
    pub tp: Option<f64>,
    pub legs: Vec<WireLeg>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitSellBody {
    pub execucao: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preco: Option<f64>,
}

impl SubmitSellBody {
    pub fn new(execution: Execution) -> Self {
        Self {
            execucao: execution.wire_name(),
            preco: execution.limit_price(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitResponse {
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub group_id: Option<String>,
    #[serde(default)]
    pub results: Vec<WireLegResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireLegResult {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub order_ticket: Option<i64>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl SubmitResponse {
    pub fn into_report(self) -> SubmitOutcomeReport {
        SubmitOutcomeReport {
            group_id: self.group_id.map(GroupId::new),
            legs: self
                .results
                .into_iter()
                .map(|r| LegSubmission {
                    symbol: r.symbol.unwrap_or_default(),
                    accepted: !matches!(r.status.as_deref(), Some("rejeitada")),
                    order_ticket: r.order_ticket,
                    detail: r.detail,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub executed_all: bool,
    #[serde(default)]
    pub summary: Vec<WireLegStatus>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub created_operacao_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireLegStatus {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub executada: bool,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub volume: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub volume_exec: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub preco_medio: Option<f64>,
}

impl From<StatusResponse> for GroupStatus {
    fn from(s: StatusResponse) -> Self {
        GroupStatus {
            executed_all: s.executed_all,
            legs: s
                .summary
                .into_iter()
                .map(|l| LegExecution {
                    // Executed legs report the filled volume as `volume`; pending ones as
                    // `volume_exec`.
                    executed_volume: if l.executada {
                        l.volume.or(l.volume_exec)
                    } else {
                        l.volume_exec
                    },
                    symbol: l.symbol,
                    executed: l.executada,
                    average_price: l.preco_medio,
                })
                .collect(),
            created_operation_id: s.created_operacao_id,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuoteResponse {
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub cotacao: Option<f64>,
}

/// List endpoints may answer with a bare array or a paginated envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListEnvelope<T> {
    Paginated { results: Vec<T> },
    Bare(Vec<T>),
}

impl<T> ListEnvelope<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            ListEnvelope::Paginated { results } => results,
            ListEnvelope::Bare(items) => items,
        }
    }
}

pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn number_from(v: &Value) -> Option<f64> {
        match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|n| n.is_finite())
    }

    pub fn opt_f64<'de, D>(de: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = Option::<Value>::deserialize(de)?;
        Ok(v.as_ref().and_then(number_from))
    }

    pub fn f64_or_nan<'de, D>(de: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = Option::<Value>::deserialize(de)?;
        Ok(v.as_ref().and_then(number_from).unwrap_or(f64::NAN))
    }

    pub fn opt_i64<'de, D>(de: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = Option::<Value>::deserialize(de)?;
        Ok(match v {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            _ => None,
        })
    }

    /// Opaque identifiers: strings are kept as-is, numbers are stringified.
    pub fn opt_id<'de, D>(de: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = Option::<Value>::deserialize(de)?;
        Ok(match v {
            Some(Value::String(s)) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }
}
