use crate::domain::contract::RawCandidate;
use crate::domain::recommendation::Candidate;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

/// Normalizes, deduplicates by `(ticker, side)`, drops open tickers and sorts.
pub fn merge_candidates(
    raw: impl IntoIterator<Item = RawCandidate>,
    open_tickers: &BTreeSet<String>,
) -> Vec<Candidate> {
    let mut merged: HashMap<String, Candidate> = HashMap::new();

    for candidate in raw.into_iter().filter_map(RawCandidate::normalize) {
        if open_tickers.contains(&candidate.ticker) {
            continue;
        }
        let key = candidate.dedupe_key();
        match merged.remove(&key) {
            None => {
                merged.insert(key, candidate);
            }
            Some(existing) => {
                merged.insert(key, combine(existing, candidate));
            }
        }
    }

    let mut out: Vec<Candidate> = merged.into_values().collect();
    out.sort_by(compare_candidates);
    out
}

/// Higher-precedence origin wins field by field; same origin keeps the first record.
fn combine(existing: Candidate, incoming: Candidate) -> Candidate {
    let (winner, loser) = if incoming.origin.precedence() > existing.origin.precedence() {
        (incoming, existing)
    } else {
        (existing, incoming)
    };

    Candidate {
        ticker: winner.ticker,
        side: winner.side,
        reference_price: winner.reference_price.or(loser.reference_price),
        suggested_target: winner.suggested_target.or(loser.suggested_target),
        probability_pct: winner.probability_pct.or(loser.probability_pct),
        origin: winner.origin,
        company: winner.company.or(loser.company),
        asset_id: winner.asset_id.or(loser.asset_id),
        stated_target: winner.stated_target.or(loser.stated_target),
    }
}

fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    a.ticker
        .to_lowercase()
        .cmp(&b.ticker.to_lowercase())
        .then_with(|| {
            a.side
                .as_str()
                .to_lowercase()
                .cmp(&b.side.as_str().to_lowercase())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contract::{AiRecommendation, ClassicRecommendation};
    use crate::domain::recommendation::{Origin, Side};

    fn classic(ticker: &str, price: f64, prob: f64) -> RawCandidate {
        RawCandidate::Classic(ClassicRecommendation {
            ticker: Some(ticker.into()),
            empresa: Some(format!("{ticker} SA")),
            preco_compra: Some(price),
            probabilidade: Some(prob),
            ..Default::default()
        })
    }

    fn ai(ticker: &str, classe: &str, price: f64, prob: f64) -> RawCandidate {
        RawCandidate::Ai(AiRecommendation {
            acao_ticker: Some(ticker.into()),
            classe: Some(classe.into()),
            prob_up: Some(prob),
            prob_down: Some(prob),
            preco_entrada: Some(price),
            ..Default::default()
        })
    }

    #[test]
    fn same_pair_from_both_feeds_yields_one_ai_entry() {
        let raw = vec![
            classic("PETR4", 36.0, 0.55),
            ai("petr4", "UP_FIRST", 37.0, 0.81),
        ];
        let out = merge_candidates(raw, &BTreeSet::new());
        assert_eq!(out.len(), 1);
        let c = &out[0];
        assert_eq!(c.dedupe_key(), "PETR4|BUY");
        assert_eq!(c.origin, Origin::Ai);
        assert_eq!(c.reference_price, Some(37.0));
        assert!((c.probability_pct.unwrap() - 81.0).abs() < 1e-9);
        // AI has no company name here; classic fills the gap.
        assert_eq!(c.company.as_deref(), Some("PETR4 SA"));
    }

    #[test]
    fn ai_wins_regardless_of_arrival_order() {
        let raw = vec![
            ai("PETR4", "UP_FIRST", 37.0, 0.81),
            classic("PETR4", 36.0, 0.55),
        ];
        let out = merge_candidates(raw, &BTreeSet::new());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].origin, Origin::Ai);
        assert_eq!(out[0].reference_price, Some(37.0));
    }

    #[test]
    fn opposite_sides_are_distinct_candidates() {
        let raw = vec![
            classic("VALE3", 60.0, 0.5),
            ai("VALE3", "DOWN_FIRST", 61.0, 0.7),
        ];
        let out = merge_candidates(raw, &BTreeSet::new());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].side, Side::Buy);
        assert_eq!(out[1].side, Side::Sell);
    }

    #[test]
    fn open_tickers_are_excluded_from_every_source() {
        let open: BTreeSet<String> = ["VALE3".to_string()].into_iter().collect();
        let raw = vec![
            classic("vale3", 60.0, 0.5),
            ai("VALE3", "DOWN_FIRST", 61.0, 0.7),
            ai("VALE3", "UP_FIRST", 61.0, 0.7),
            classic("ITUB4", 30.0, 0.5),
        ];
        let out = merge_candidates(raw, &open);
        assert!(out.iter().all(|c| c.ticker != "VALE3"));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn sorted_by_ticker_then_side() {
        let raw = vec![
            ai("WEGE3", "UP_FIRST", 40.0, 0.6),
            ai("ABEV3", "DOWN_FIRST", 13.0, 0.6),
            classic("abev3", 13.0, 0.6),
            classic("MGLU3", 2.0, 0.6),
        ];
        let out = merge_candidates(raw, &BTreeSet::new());
        let keys: Vec<String> = out.iter().map(Candidate::dedupe_key).collect();
        assert_eq!(
            keys,
            vec!["ABEV3|BUY", "ABEV3|SELL", "MGLU3|BUY", "WEGE3|BUY"]
        );
    }

    #[test]
    fn duplicates_within_one_feed_keep_the_first() {
        let raw = vec![classic("PETR4", 36.0, 0.5), classic("PETR4", 99.0, 0.9)];
        let out = merge_candidates(raw, &BTreeSet::new());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].reference_price, Some(36.0));
    }
}
