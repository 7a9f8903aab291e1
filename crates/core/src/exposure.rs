//! Client exposure cap for a single new buy.
//!
//! The cap is one tenth of the share of equity the client released for equities, plus a 5%
//! tolerance: `(equity × pct / 100) / 10 × 1.05`. Unknown inputs mean "no known limit", which is
//! never a violation.

use crate::domain::order::OrderLeg;

const SLICES: f64 = 10.0;
const TOLERANCE: f64 = 1.05;

pub fn compute_max_buy_value(equity: Option<f64>, allowed_pct: Option<f64>) -> Option<f64> {
    let base = released_amount(equity, allowed_pct)?;
    Some(cap_from_base(base))
}

/// Exposure base: released equity, else the backend's available amount.
pub fn exposure_base(
    equity: Option<f64>,
    allowed_pct: Option<f64>,
    available: Option<f64>,
) -> Option<f64> {
    released_amount(equity, allowed_pct).or(available.filter(|v| v.is_finite()))
}

pub fn max_buy_value_for(
    equity: Option<f64>,
    allowed_pct: Option<f64>,
    available: Option<f64>,
) -> Option<f64> {
    exposure_base(equity, allowed_pct, available).map(cap_from_base)
}

pub fn estimate_total(legs: &[OrderLeg], reference_price: Option<f64>) -> Option<f64> {
    let price = reference_price.filter(|p| p.is_finite())?;
    let values: Vec<f64> = legs
        .iter()
        .filter(|l| l.quantity.is_finite())
        .map(|l| l.quantity * price)
        .collect();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum())
}

pub fn exceeds_limit(total: Option<f64>, max: Option<f64>) -> bool {
    match (total, max) {
        (Some(total), Some(max)) => total > max + 1e-9,
        _ => false,
    }
}

fn released_amount(equity: Option<f64>, allowed_pct: Option<f64>) -> Option<f64> {
    let equity = equity.filter(|v| v.is_finite())?;
    let pct = allowed_pct.filter(|v| v.is_finite())?;
    Some(equity * (pct / 100.0))
}

fn cap_from_base(base: f64) -> f64 {
    (base / SLICES) * TOLERANCE
}
