//! Query text -> ranked candidate list.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::candidate::Candidate;
use crate::lookup::PlaceSearch;
use crate::zones::ZoneTables;

pub struct CandidateProvider<P> {
    places: P,
    zones: Arc<ZoneTables>,
    limit: usize,
    issued: AtomicU64,
}

impl<P: PlaceSearch> CandidateProvider<P> {
    pub fn new(places: P, zones: Arc<ZoneTables>, limit: usize) -> Self {
        Self {
            places,
            zones,
            limit,
            issued: AtomicU64::new(0),
        }
    }

    /// Candidates for `text`, or `None` if a newer query was issued on this
    /// provider while this one was in flight.
    pub async fn query(&self, text: &str) -> Option<Vec<Candidate>> {
        let token = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let candidates = self.lookup(text).await;
        if self.issued.load(Ordering::SeqCst) == token {
            Some(candidates)
        } else {
            debug!(query = %text, token, "discarding superseded query result");
            None
        }
    }

    /// Candidates for `text`, with no supersession check.
    ///
    /// Offsets and abbreviations are answered from the local tables; only
    /// free text reaches the place-search service. A failing service yields
    /// an empty list.
    pub async fn lookup(&self, text: &str) -> Vec<Candidate> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }

        if let Some(candidate) = self.zones.classify(text) {
            debug!(query = %text, kind = candidate.kind(), "structured query");
            return vec![candidate];
        }

        match self.places.complete(text).await {
            Ok(places) => places
                .into_iter()
                .take(self.limit)
                .map(Candidate::from)
                .collect(),
            Err(err) => {
                warn!(query = %text, error = %err, "place search failed");
                Vec::new()
            }
        }
    }
}
