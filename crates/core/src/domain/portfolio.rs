use crate::domain::contract::lenient;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A client's buy record (and its paired sell once closed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: i64,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub cliente: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub acao: Option<i64>,
    #[serde(default)]
    pub acao_nome: Option<String>,
    #[serde(default)]
    pub data_compra: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub preco_unitario: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub quantidade: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub valor_total_compra: Option<f64>,
    #[serde(default)]
    pub data_venda: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub preco_venda_unitario: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub valor_total_venda: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub valor_alvo: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub lucro_percentual: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub dias_posicionado: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
}

impl Operation {
    pub fn is_open(&self) -> bool {
        self.data_venda.is_none()
    }

    pub fn ticker(&self) -> Option<String> {
        self.acao_nome
            .as_deref()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
    }

    /// Whole days since purchase; the server value wins when present.
    pub fn days_held(&self, today: NaiveDate) -> Option<i64> {
        if let Some(d) = self.dias_posicionado {
            return Some(d);
        }
        let bought = self.data_compra?;
        let days = (today - bought).num_days();
        (days >= 0).then_some(days)
    }

    pub fn total_cost(&self) -> Option<f64> {
        if let Some(v) = self.valor_total_compra {
            return Some(v);
        }
        Some(self.preco_unitario? * self.quantidade?)
    }
}

/// Tickers the client currently holds, uppercased.
pub fn open_tickers(operations: &[Operation]) -> BTreeSet<String> {
    operations
        .iter()
        .filter(|op| op.is_open())
        .filter_map(Operation::ticker)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub patrimonio: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub percentual_patrimonio: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub valor_disponivel: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub posicionadas: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub posicionado: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub realizadas: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub dias_total: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub rentabilidade_mensal: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub saldo_total: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: i64,
    #[serde(default)]
    pub nome: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub percentual_patrimonio: Option<f64>,
}

/// Server-side truth fetched after an order group completes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PortfolioSnapshot {
    pub operations: Vec<Operation>,
    pub summary: PortfolioSummary,
}
