use serde::{Deserialize, Serialize};
use std::fmt;

/// How the order reaches the book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Execution {
    Market,
    Limit { price: f64 },
}

impl Execution {
    pub fn wire_name(&self) -> &'static str {
        match self {
            Execution::Market => "mercado",
            Execution::Limit { .. } => "limite",
        }
    }

    pub fn limit_price(&self) -> Option<f64> {
        match self {
            Execution::Market => None,
            Execution::Limit { price } => Some(*price),
        }
    }
}

/// Desired size of a buy: a share count or a currency amount, never both.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EntryAmount {
    Quantity(f64),
    Value(f64),
}

impl EntryAmount {
    pub fn wire_mode(&self) -> &'static str {
        match self {
            EntryAmount::Quantity(_) => "quantidade",
            EntryAmount::Value(_) => "valor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLeg {
    pub symbol: String,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegValidation {
    pub symbol: String,
    pub ok: bool,
    pub reason: Option<String>,
}

/// Server-assigned identifier of a submitted order group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegExecution {
    pub symbol: String,
    pub executed: bool,
    pub executed_volume: Option<f64>,
    pub average_price: Option<f64>,
}

/// One polled snapshot of an order group.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GroupStatus {
    pub executed_all: bool,
    pub legs: Vec<LegExecution>,
    pub created_operation_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegSubmission {
    pub symbol: String,
    pub accepted: bool,
    pub order_ticket: Option<i64>,
    pub detail: Option<String>,
}

/// What the execution service answered to a submit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubmitOutcomeReport {
    pub group_id: Option<GroupId>,
    pub legs: Vec<LegSubmission>,
}

/// Outcome of a leg distribution request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LegProposal {
    pub legs: Vec<OrderLeg>,
    pub validations: Vec<LegValidation>,
    pub messages: Vec<String>,
}

impl LegProposal {
    pub fn failed_validations(&self) -> impl Iterator<Item = &LegValidation> {
        self.validations.iter().filter(|v| !v.ok)
    }
}
