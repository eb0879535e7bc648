//! The search surface: typed text in, resolved time zone out.
//!
//! `SearchSession` is the only writer of the query, the candidate list and
//! the cursor. Lookups and resolutions run as background tasks; their
//! results come back through per-stream channels and are applied by
//! [`SearchSession::next`], which drops anything superseded in the
//! meantime.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, trace};

use crate::candidate::Candidate;
use crate::debounce::{Completion, Debouncer};
use crate::lookup::{Geocoder, PlaceSearch};
use crate::provider::CandidateProvider;
use crate::resolver::{CandidateResolver, ResolveError, ResolvedTimeZone};
use crate::selection::{Cursor, NavKey, SelectionIndex};

/// Where the session reports its outcome.
pub trait SessionCallbacks {
    /// A candidate was resolved. Called once per successful resolution.
    fn on_resolved(&mut self, resolved: ResolvedTimeZone);
    /// A resolution failed; the surface stays open.
    fn on_error(&mut self, message: String);
    /// The surface should be dismissed.
    fn on_dismiss_requested(&mut self);
}

/// What [`SearchSession::next`] applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionUpdate {
    /// The candidate list was replaced; carries the new length
    Candidates(usize),
    /// A candidate was resolved and the session closed
    Resolved,
    /// A resolution failed
    Failed,
}

type SearchOutput = Option<Vec<Candidate>>;
type ResolveOutput = Result<ResolvedTimeZone, ResolveError>;

enum Incoming {
    Search(Completion<SearchOutput>),
    Resolution(Completion<ResolveOutput>),
}

pub struct SearchSession<P, G, C> {
    provider: Arc<CandidateProvider<P>>,
    resolver: Arc<CandidateResolver<G>>,
    callbacks: C,
    query: String,
    candidates: Vec<Candidate>,
    selection: SelectionIndex,
    search: Debouncer<SearchOutput>,
    search_rx: UnboundedReceiver<Completion<SearchOutput>>,
    resolution: Debouncer<ResolveOutput>,
    resolution_rx: UnboundedReceiver<Completion<ResolveOutput>>,
    resolving: Option<usize>,
    open: bool,
}

impl<P, G, C> SearchSession<P, G, C>
where
    P: PlaceSearch + 'static,
    G: Geocoder + 'static,
    C: SessionCallbacks,
{
    pub fn new(
        provider: Arc<CandidateProvider<P>>,
        resolver: Arc<CandidateResolver<G>>,
        debounce: Duration,
        callbacks: C,
    ) -> Self {
        let (search, search_rx) = Debouncer::new(debounce);
        let (resolution, resolution_rx) = Debouncer::new(Duration::ZERO);
        Self {
            provider,
            resolver,
            callbacks,
            query: String::new(),
            candidates: Vec::new(),
            selection: SelectionIndex::new(),
            search,
            search_rx,
            resolution,
            resolution_rx,
            resolving: None,
            open: true,
        }
    }

    #[cfg(test)]
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn cursor(&self) -> Cursor {
        self.selection.cursor()
    }

    /// Row whose resolution is in flight.
    pub fn resolving(&self) -> Option<usize> {
        self.resolving
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn callbacks(&self) -> &C {
        &self.callbacks
    }

    pub fn into_callbacks(self) -> C {
        self.callbacks
    }

    /// Replace the query text.
    ///
    /// Pending lookups and resolutions for the old text are cancelled. Blank
    /// text empties the list right away; anything else is looked up once
    /// the input has been quiet for the debounce interval.
    pub fn set_query(&mut self, text: impl Into<String>) {
        if !self.open {
            return;
        }
        let text = text.into();
        if text == self.query {
            return;
        }
        self.query = text;
        self.cancel_resolution();

        if self.query.trim().is_empty() {
            self.search.cancel();
            self.replace_candidates(Vec::new());
            return;
        }

        let provider = Arc::clone(&self.provider);
        let text = self.query.clone();
        let token = self.search.submit(async move { provider.query(&text).await });
        debug!(query = %self.query, token, "query scheduled");
    }

    /// Feed a navigation key. Enter on a highlighted row starts resolving it
    /// and returns the row.
    pub fn handle_key(&mut self, key: NavKey) -> Option<usize> {
        if !self.open {
            return None;
        }
        let row = self.selection.apply(key, self.candidates.len())?;
        self.select(row).then_some(row)
    }

    /// Start resolving the candidate at `row` (keyboard or pointer).
    /// Supersedes any resolution already in flight.
    pub fn select(&mut self, row: usize) -> bool {
        if !self.open {
            return false;
        }
        let Some(candidate) = self.candidates.get(row).cloned() else {
            return false;
        };

        debug!(row, label = %candidate.label(), "resolving candidate");
        let resolver = Arc::clone(&self.resolver);
        self.resolving = Some(row);
        self.resolution
            .submit(async move { resolver.resolve(&candidate).await });
        true
    }

    /// Wait for the next background result and apply it.
    ///
    /// Stale results are skipped silently. Returns `None` once the session
    /// is closed. Cancel-safe: a result is applied in full or not received.
    pub async fn next(&mut self) -> Option<SessionUpdate> {
        loop {
            if !self.open {
                return None;
            }

            let incoming = tokio::select! {
                Some(completion) = self.search_rx.recv() => Incoming::Search(completion),
                Some(completion) = self.resolution_rx.recv() => Incoming::Resolution(completion),
                else => return None,
            };

            match incoming {
                Incoming::Search(completion) => {
                    match self.search.accept(completion) {
                        Some(Some(candidates)) => {
                            self.replace_candidates(candidates);
                            return Some(SessionUpdate::Candidates(self.candidates.len()));
                        }
                        Some(None) => trace!("dropping lookup superseded inside the provider"),
                        None => {}
                    }
                }
                Incoming::Resolution(completion) => {
                    if let Some(outcome) = self.resolution.accept(completion) {
                        return Some(self.finish_resolution(outcome));
                    }
                }
            }
        }
    }

    /// Tear down: cancel all background work and ignore further input.
    pub fn close(&mut self) {
        self.open = false;
        self.search.cancel();
        self.cancel_resolution();
    }

    /// Swap in a new list. A resolution started from the old list no
    /// longer refers to anything shown, so it is cancelled.
    fn replace_candidates(&mut self, candidates: Vec<Candidate>) {
        self.cancel_resolution();
        self.candidates = candidates;
        self.selection.reset();
    }

    fn cancel_resolution(&mut self) {
        self.resolution.cancel();
        self.resolving = None;
    }

    fn finish_resolution(&mut self, outcome: ResolveOutput) -> SessionUpdate {
        self.resolving = None;
        match outcome {
            Ok(resolved) => {
                info!(
                    identifier = resolved.identifier(),
                    label = resolved.label(),
                    "time zone resolved"
                );
                self.callbacks.on_resolved(resolved);
                self.callbacks.on_dismiss_requested();
                self.close();
                SessionUpdate::Resolved
            }
            Err(err) => {
                self.callbacks.on_error(err.to_string());
                SessionUpdate::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::tests::FakePlaces;
    use crate::resolver::tests::{FakeGeocoder, Reply};
    use crate::zones::ZoneTables;

    #[derive(Debug, Default)]
    struct Recorder {
        resolved: Vec<ResolvedTimeZone>,
        errors: Vec<String>,
        dismissed: usize,
    }

    impl SessionCallbacks for Recorder {
        fn on_resolved(&mut self, resolved: ResolvedTimeZone) {
            self.resolved.push(resolved);
        }

        fn on_error(&mut self, message: String) {
            self.errors.push(message);
        }

        fn on_dismiss_requested(&mut self) {
            self.dismissed += 1;
        }
    }

    const DEBOUNCE: Duration = Duration::from_millis(300);

    fn session(
        places: FakePlaces,
        geocoder: FakeGeocoder,
    ) -> SearchSession<FakePlaces, FakeGeocoder, Recorder> {
        let provider = CandidateProvider::new(places, Arc::new(ZoneTables::builtin()), 10);
        SearchSession::new(
            Arc::new(provider),
            Arc::new(CandidateResolver::new(geocoder)),
            DEBOUNCE,
            Recorder::default(),
        )
    }

    fn berlin_places() -> FakePlaces {
        FakePlaces::default().with(
            "Berlin",
            &[
                ("Berlin", "State of Berlin, Germany", "2950159"),
                ("Berlin", "New Hampshire, United States", "5083330"),
            ],
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_utc_offset_end_to_end() {
        let places = FakePlaces::default();
        let place_calls = Arc::clone(&places.calls);
        let geocoder = FakeGeocoder::default();
        let geocode_calls = Arc::clone(&geocoder.calls);
        let mut session = session(places, geocoder);

        session.set_query("UTC+3");
        assert_eq!(session.next().await, Some(SessionUpdate::Candidates(1)));
        assert!(matches!(
            &session.candidates()[0],
            Candidate::UtcOffset { identifier, .. } if identifier == "Etc/GMT-3"
        ));

        assert_eq!(session.handle_key(NavKey::Down), None);
        assert_eq!(session.handle_key(NavKey::Enter), Some(0));
        assert_eq!(session.next().await, Some(SessionUpdate::Resolved));

        assert!(!session.is_open());
        let recorder = session.into_callbacks();
        assert_eq!(recorder.resolved.len(), 1);
        assert_eq!(recorder.resolved[0].identifier(), "Etc/GMT-3");
        assert_eq!(recorder.dismissed, 1);
        assert!(place_calls.lock().unwrap().is_empty());
        assert!(geocode_calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_city_resolves_through_geocoder() {
        let geocoder =
            FakeGeocoder::default().reply("locator:2950159", Reply::Found("Europe/Berlin", Some("DE")));
        let mut session = session(berlin_places(), geocoder);

        session.set_query("Berlin");
        assert_eq!(session.next().await, Some(SessionUpdate::Candidates(2)));
        assert!(session.candidates().iter().all(|c| c.identifier().is_none()));

        // Pointer click on the first row
        assert!(session.select(0));
        assert_eq!(session.resolving(), Some(0));
        assert_eq!(session.next().await, Some(SessionUpdate::Resolved));

        let recorder = session.into_callbacks();
        assert_eq!(recorder.resolved[0].identifier(), "Europe/Berlin");
        assert_eq!(recorder.resolved[0].country_code(), Some("DE"));
        assert_eq!(recorder.dismissed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_burst_issues_one_lookup() {
        let places = berlin_places();
        let calls = Arc::clone(&places.calls);
        let mut session = session(places, FakeGeocoder::default());

        for prefix in ["B", "Be", "Ber", "Berl", "Berli", "Berlin"] {
            session.set_query(prefix);
            tokio::time::advance(Duration::from_millis(50)).await;
        }

        assert_eq!(session.next().await, Some(SessionUpdate::Candidates(2)));
        assert_eq!(*calls.lock().unwrap(), vec!["Berlin".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_query_wins_over_slow_older_one() {
        let places = FakePlaces::default()
            .with("Par", &[("Parma", "Emilia-Romagna, Italy", "3171457")])
            .with("Paris", &[("Paris", "Île-de-France, France", "2988507")])
            .delayed("Par", Duration::from_secs(5));
        let calls = Arc::clone(&places.calls);
        let mut session = session(places, FakeGeocoder::default());

        // Let the first lookup get past the debounce and into the slow call.
        session.set_query("Par");
        tokio::time::sleep(DEBOUNCE + Duration::from_millis(100)).await;
        session.set_query("Paris");

        assert_eq!(session.next().await, Some(SessionUpdate::Candidates(1)));
        assert_eq!(session.candidates()[0].title(), "Paris");

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(session.candidates()[0].title(), "Paris");
        assert_eq!(*calls.lock().unwrap(), vec!["Par".to_string(), "Paris".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_query_clears_without_lookup() {
        let places = berlin_places();
        let calls = Arc::clone(&places.calls);
        let mut session = session(places, FakeGeocoder::default());

        session.set_query("Berlin");
        assert_eq!(session.next().await, Some(SessionUpdate::Candidates(2)));
        session.handle_key(NavKey::Down);
        assert_eq!(session.cursor(), Cursor::Row(0));

        session.set_query("   ");
        assert!(session.candidates().is_empty());
        assert_eq!(session.cursor(), Cursor::Input);
        assert_eq!(session.handle_key(NavKey::Down), None);
        assert_eq!(session.cursor(), Cursor::Input);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_replacement_resets_cursor() {
        let places = berlin_places().with("Bern", &[("Bern", "Bern, Switzerland", "2661552")]);
        let mut session = session(places, FakeGeocoder::default());

        session.set_query("Berlin");
        session.next().await;
        session.handle_key(NavKey::Up);
        assert_eq!(session.cursor(), Cursor::Row(1));

        session.set_query("Bern");
        assert_eq!(session.next().await, Some(SessionUpdate::Candidates(1)));
        assert_eq!(session.cursor(), Cursor::Input);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresolvable_keeps_surface_open() {
        let geocoder = FakeGeocoder::default()
            .reply("locator:2950159", Reply::Fail)
            .reply("text:Berlin, State of Berlin, Germany", Reply::Fail)
            .reply("locator:5083330", Reply::Found("America/New_York", Some("US")));
        let mut session = session(berlin_places(), geocoder);

        session.set_query("Berlin");
        session.next().await;
        session.handle_key(NavKey::Down);
        assert_eq!(session.handle_key(NavKey::Enter), Some(0));
        assert_eq!(session.next().await, Some(SessionUpdate::Failed));

        assert!(session.is_open());
        assert_eq!(session.callbacks().errors.len(), 1);
        assert!(session.callbacks().errors[0].contains("Berlin, State of Berlin, Germany"));
        assert_eq!(session.callbacks().dismissed, 0);
        assert_eq!(session.cursor(), Cursor::Row(0));

        // The user can pick another row
        session.handle_key(NavKey::Down);
        assert_eq!(session.handle_key(NavKey::Enter), Some(1));
        assert_eq!(session.next().await, Some(SessionUpdate::Resolved));
        assert_eq!(session.callbacks().resolved[0].identifier(), "America/New_York");
    }

    #[tokio::test(start_paused = true)]
    async fn test_place_search_failure_shows_empty_list() {
        let places = FakePlaces {
            failing: true,
            ..Default::default()
        };
        let mut session = session(places, FakeGeocoder::default());

        session.set_query("Berlin");
        assert_eq!(session.next().await, Some(SessionUpdate::Candidates(0)));
        assert!(session.is_open());
        assert!(session.callbacks().errors.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_session_ignores_input() {
        let mut session = session(berlin_places(), FakeGeocoder::default());
        session.set_query("Berlin");
        session.close();

        assert_eq!(session.next().await, None);
        session.set_query("Bern");
        assert_eq!(session.query(), "Berlin");
        assert_eq!(session.handle_key(NavKey::Down), None);
        assert!(!session.select(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_selection_supersedes_earlier_one() {
        let geocoder = FakeGeocoder::default()
            .reply("locator:2950159", Reply::Found("Europe/Berlin", Some("DE")))
            .reply("locator:5083330", Reply::Found("America/New_York", Some("US")))
            .delayed("locator:2950159", Duration::from_secs(2));
        let mut session = session(berlin_places(), geocoder);

        session.set_query("Berlin");
        session.next().await;
        assert!(session.select(0));
        assert!(session.select(1));
        assert_eq!(session.resolving(), Some(1));

        assert_eq!(session.next().await, Some(SessionUpdate::Resolved));
        let recorder = session.into_callbacks();
        assert_eq!(recorder.resolved.len(), 1);
        assert_eq!(recorder.resolved[0].identifier(), "America/New_York");
        assert_eq!(recorder.dismissed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_change_cancels_resolution() {
        let geocoder = FakeGeocoder::default()
            .reply("locator:2950159", Reply::Found("Europe/Berlin", Some("DE")))
            .delayed("locator:2950159", Duration::from_secs(2));
        let places = berlin_places().with("Bern", &[("Bern", "Bern, Switzerland", "2661552")]);
        let mut session = session(places, geocoder);

        session.set_query("Berlin");
        session.next().await;
        assert!(session.select(0));
        session.set_query("Bern");
        assert_eq!(session.resolving(), None);

        assert_eq!(session.next().await, Some(SessionUpdate::Candidates(1)));
        // Nothing else is pending; the resolution must not surface later
        let later = tokio::time::timeout(Duration::from_secs(10), session.next()).await;
        assert!(later.is_err());
        assert!(session.is_open());
        assert!(session.callbacks().resolved.is_empty());
        assert!(session.callbacks().errors.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_list_cancels_pick_from_old_list() {
        let geocoder = FakeGeocoder::default()
            .reply("locator:5083330", Reply::Found("America/New_York", Some("US")))
            .delayed("locator:5083330", Duration::from_secs(2));
        let places = berlin_places().with(
            "Bern",
            &[
                ("Bern", "Bern, Switzerland", "2661552"),
                ("Bernau", "Brandenburg, Germany", "2949012"),
            ],
        );
        let mut session = session(places, geocoder);

        session.set_query("Berlin");
        session.next().await;

        // New text is typed, then a row of the still-visible old list is picked
        session.set_query("Bern");
        session.handle_key(NavKey::Up);
        assert_eq!(session.handle_key(NavKey::Enter), Some(1));
        assert_eq!(session.resolving(), Some(1));

        assert_eq!(session.next().await, Some(SessionUpdate::Candidates(2)));
        assert_eq!(session.resolving(), None);
        assert_eq!(session.cursor(), Cursor::Input);

        let later = tokio::time::timeout(Duration::from_secs(10), session.next()).await;
        assert!(later.is_err());
        assert!(session.is_open());
        assert!(session.callbacks().resolved.is_empty());
        assert_eq!(session.callbacks().dismissed, 0);
    }
}
