use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    /// Default target multiplier when the source states no explicit target.
    pub fn fallback_target_factor(&self) -> f64 {
        match self {
            Side::Buy => 1.05,
            Side::Sell => 0.95,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Origin {
    Classic,
    Ai,
}

impl Origin {
    /// Higher wins when the same `(ticker, side)` comes from both feeds.
    pub fn precedence(&self) -> u8 {
        match self {
            Origin::Classic => 0,
            Origin::Ai => 1,
        }
    }
}

/// A normalized trade candidate, whichever feed it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub ticker: String,
    pub side: Side,
    pub reference_price: Option<f64>,
    pub suggested_target: Option<f64>,
    pub probability_pct: Option<f64>,
    pub origin: Origin,
    pub company: Option<String>,
    pub asset_id: Option<i64>,
    pub stated_target: Option<f64>,
}

impl Candidate {
    pub fn dedupe_key(&self) -> String {
        dedupe_key(&self.ticker, self.side)
    }
}

pub fn dedupe_key(ticker: &str, side: Side) -> String {
    format!("{}|{}", ticker.trim().to_uppercase(), side.as_str())
}

/// Query filters for the AI-directional feed.
#[derive(Debug, Clone, PartialEq)]
pub struct AiFeedFilter {
    pub tipo: String,
    pub date: Option<chrono::NaiveDate>,
    pub min_prob: Option<f64>,
}

impl Default for AiFeedFilter {
    fn default() -> Self {
        Self {
            tipo: "todos".to_string(),
            date: None,
            min_prob: None,
        }
    }
}

impl AiFeedFilter {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        if !self.tipo.trim().is_empty() {
            out.push(("tipo", self.tipo.trim().to_string()));
        }
        if let Some(d) = self.date {
            out.push(("data", d.format("%Y-%m-%d").to_string()));
        }
        if let Some(p) = self.min_prob {
            out.push(("min_prob", p.to_string()));
        }
        out
    }
}
