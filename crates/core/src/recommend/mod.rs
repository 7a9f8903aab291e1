use crate::backend::{ClientId, RecommendationFeed};
use crate::domain::contract::RawCandidate;
use crate::domain::recommendation::{AiFeedFilter, Candidate};
use std::collections::BTreeSet;

pub mod merge;
pub mod normalize;

pub use merge::merge_candidates;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Classic,
    Ai,
}

#[derive(Debug, Clone)]
pub struct FeedFailure {
    pub feed: FeedKind,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct CandidateList {
    pub candidates: Vec<Candidate>,
    pub failures: Vec<FeedFailure>,
}

impl CandidateList {
    pub fn all_feeds_failed(&self) -> bool {
        self.failures.len() == 2
    }
}

/// Fetches both feeds concurrently and merges them. A failed feed counts as empty.
pub async fn gather_candidates(
    feed: &dyn RecommendationFeed,
    client_id: ClientId,
    filter: &AiFeedFilter,
    open_tickers: &BTreeSet<String>,
) -> CandidateList {
    let (classic, ai) = tokio::join!(feed.classic_candidates(client_id), feed.ai_candidates(filter));

    let mut failures = Vec::new();
    let classic = classic.unwrap_or_else(|err| {
        tracing::warn!(client_id, error = %err, "classic recommendation feed failed; using empty list");
        failures.push(FeedFailure {
            feed: FeedKind::Classic,
            error: format!("{err:#}"),
        });
        Vec::new()
    });
    let ai = ai.unwrap_or_else(|err| {
        tracing::warn!(client_id, error = %err, "AI recommendation feed failed; using empty list");
        failures.push(FeedFailure {
            feed: FeedKind::Ai,
            error: format!("{err:#}"),
        });
        Vec::new()
    });

    let raw_len = classic.len() + ai.len();
    let raw = classic
        .into_iter()
        .map(RawCandidate::Classic)
        .chain(ai.into_iter().map(RawCandidate::Ai));
    let candidates = merge_candidates(raw, open_tickers);

    let out = CandidateList {
        candidates,
        failures,
    };
    if out.all_feeds_failed() {
        tracing::error!(client_id, "both recommendation feeds failed; no candidates");
    } else {
        tracing::info!(
            client_id,
            raw = raw_len,
            merged = out.candidates.len(),
            open = open_tickers.len(),
            "recommendation candidates merged"
        );
    }
    out
}
