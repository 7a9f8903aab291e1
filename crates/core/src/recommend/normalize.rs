use crate::domain::contract::{AiRecommendation, ClassicRecommendation, RawCandidate};
use crate::domain::recommendation::{Candidate, Origin, Side};

const DOWN_FIRST_LABEL: &str = "DOWN_FIRST";

impl RawCandidate {
    /// Maps a feed record to a [`Candidate`]; `None` when it has no ticker.
    pub fn normalize(self) -> Option<Candidate> {
        match self {
            RawCandidate::Classic(r) => normalize_classic(r),
            RawCandidate::Ai(r) => normalize_ai(r),
        }
    }
}

/// Probabilities arrive either as a fraction (0..=1) or as a percentage.
pub fn normalize_probability(p: Option<f64>) -> Option<f64> {
    let p = p.filter(|v| v.is_finite())?;
    Some(if p <= 1.0 { p * 100.0 } else { p })
}

pub fn fallback_target(reference_price: Option<f64>, side: Side) -> Option<f64> {
    reference_price.map(|p| p * side.fallback_target_factor())
}

fn clean_ticker(raw: Option<&str>) -> Option<String> {
    raw.map(|s| s.trim().to_uppercase()).filter(|s| !s.is_empty())
}

fn clean_text(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub fn normalize_classic(r: ClassicRecommendation) -> Option<Candidate> {
    let ticker = clean_ticker(r.ticker.as_deref())?;
    let side = Side::Buy;
    let reference_price = r.cotacao_atual.or(r.preco_compra);
    let suggested_target = r
        .alvo_sugerido_5pct
        .or_else(|| fallback_target(reference_price, side));

    Some(Candidate {
        ticker,
        side,
        reference_price,
        suggested_target,
        probability_pct: normalize_probability(r.probabilidade),
        origin: Origin::Classic,
        company: clean_text(r.empresa),
        asset_id: r.acao_id,
        stated_target: r.alvo_sugerido,
    })
}

pub fn normalize_ai(r: AiRecommendation) -> Option<Candidate> {
    let ticker = clean_ticker(r.acao_ticker.as_deref().filter(|s| !s.trim().is_empty()))
        .or_else(|| clean_ticker(r.ticker.as_deref()))?;

    let side = match r.classe.as_deref() {
        Some(c) if c.trim().eq_ignore_ascii_case(DOWN_FIRST_LABEL) => Side::Sell,
        _ => Side::Buy,
    };
    let probability = match side {
        Side::Buy => r.prob_up,
        Side::Sell => r.prob_down,
    };

    let entry = r.preco_entrada;
    let stated_target = match (entry, r.alvo_percentual) {
        (Some(price), Some(pct)) => {
            let direction = match side {
                Side::Buy => 1.0,
                Side::Sell => -1.0,
            };
            Some(price * (1.0 + direction * (pct / 100.0)))
        }
        _ => None,
    };

    Some(Candidate {
        ticker,
        side,
        reference_price: entry,
        suggested_target: stated_target.or_else(|| fallback_target(entry, side)),
        probability_pct: normalize_probability(probability),
        origin: Origin::Ai,
        company: clean_text(r.acao_empresa),
        asset_id: r.acao,
        stated_target,
    })
}
