use crate::model::{FileEntry, IndexEntry};
use crate::navigation::DirectoryListing;
use crate::service::{ServiceHandle, ServiceRequest};
use crate::timer::TimerSlot;
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use std::time::{Duration, Instant};

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(100);
/// Indexed queries shorter than this are answered locally with nothing.
pub const MIN_INDEXED_QUERY_CHARS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    #[default]
    Local,
    Indexed,
}

impl SearchMode {
    pub fn toggled(self) -> Self {
        match self {
            SearchMode::Local => SearchMode::Indexed,
            SearchMode::Indexed => SearchMode::Local,
        }
    }
}

fn is_subsequence(query: &str, text: &str) -> bool {
    let mut qi = 0usize;
    let q: Vec<char> = query.chars().collect();
    for ch in text.chars() {
        if qi < q.len() && ch == q[qi] {
            qi += 1;
        }
    }
    qi == q.len()
}

/// Tolerates one stray or mistyped character: some single-character deletion
/// of the query must still be a subsequence of the name.
fn matches_with_one_typo(query: &str, text: &str) -> bool {
    let chars: Vec<char> = query.chars().collect();
    if chars.len() < 4 {
        return false;
    }
    (0..chars.len()).any(|skip| {
        let reduced: String = chars
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != skip)
            .map(|(_, c)| *c)
            .collect();
        is_subsequence(&reduced, text)
    })
}

fn fallback_score(query: &str, text: &str) -> i64 {
    let mut score = 0;
    if text.contains(query) {
        score += 25;
    }
    if text.starts_with(query) {
        score += 30;
    }
    score + query.len().min(text.len()) as i64
}

/// Fuzzy-ranks the current folder's entries by name. Equal scores keep the
/// listing order.
pub fn local_matches(listing: &DirectoryListing, query: &str) -> Vec<IndexEntry> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }
    let parent = listing.folder_name();
    let matcher = SkimMatcherV2::default();
    let mut scored: Vec<(i64, &FileEntry)> = listing
        .entries
        .iter()
        .filter_map(|entry| {
            let name = entry.name.to_lowercase();
            let score = matcher
                .fuzzy_match(&name, &query)
                .map(|s| s + fallback_score(&query, &name))
                .or_else(|| matches_with_one_typo(&query, &name).then_some(0))?;
            Some((score, entry))
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored
        .into_iter()
        .map(|(_, entry)| IndexEntry::from_file_entry(entry, &parent))
        .collect()
}

/// Directories first, then files, keeping the service's order inside each
/// group.
pub fn directories_first(results: Vec<IndexEntry>) -> Vec<IndexEntry> {
    let (mut dirs, files): (Vec<_>, Vec<_>) = results.into_iter().partition(|e| e.is_directory);
    dirs.extend(files);
    dirs
}

/// Owns query text and mode, debounces indexed dispatch and rejects results
/// whose generation is no longer current.
#[derive(Debug, Default)]
pub struct SearchCoordinator {
    query: String,
    mode: SearchMode,
    generation: u64,
    results: Vec<IndexEntry>,
    debounce: TimerSlot,
    in_flight: Option<u64>,
    index_ready: bool,
}

impl SearchCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn results(&self) -> &[IndexEntry] {
        &self.results
    }

    pub fn is_searching(&self) -> bool {
        self.debounce.is_pending() || self.in_flight.is_some()
    }

    pub fn is_active(&self) -> bool {
        !self.query.is_empty()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    /// Indexed mode only reaches the service once an index is Ready; until
    /// then queries are matched against the current folder.
    pub fn set_index_ready(&mut self, ready: bool, now: Instant, listing: &DirectoryListing) {
        if self.index_ready == ready {
            return;
        }
        let was_remote = self.dispatches_remotely();
        self.index_ready = ready;
        if was_remote != self.dispatches_remotely() {
            self.invalidate();
            self.run(now, listing);
        }
    }

    fn dispatches_remotely(&self) -> bool {
        self.mode == SearchMode::Indexed && self.index_ready
    }

    /// Drops every pending and in-flight request and clears results.
    fn invalidate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.debounce.cancel();
        self.in_flight = None;
        self.results.clear();
    }

    pub fn set_query(&mut self, text: &str, now: Instant, listing: &DirectoryListing) {
        self.query = text.to_string();
        self.run(now, listing);
    }

    fn run(&mut self, now: Instant, listing: &DirectoryListing) {
        if self.query.is_empty() {
            self.invalidate();
            return;
        }
        if self.dispatches_remotely() {
            self.debounce.schedule(now, SEARCH_DEBOUNCE);
        } else {
            self.debounce.cancel();
            self.results = local_matches(listing, &self.query);
        }
    }

    pub fn set_mode(&mut self, mode: SearchMode, now: Instant, listing: &DirectoryListing) {
        if self.mode == mode {
            return;
        }
        self.mode = mode;
        self.invalidate();
        self.run(now, listing);
    }

    pub fn toggle_mode(&mut self, now: Instant, listing: &DirectoryListing) {
        self.set_mode(self.mode.toggled(), now, listing);
    }

    pub fn clear(&mut self) {
        self.query.clear();
        self.invalidate();
    }

    /// A new listing arrived; local results follow it.
    pub fn refresh_local(&mut self, listing: &DirectoryListing) {
        if !self.query.is_empty() && !self.dispatches_remotely() {
            self.results = local_matches(listing, &self.query);
        }
    }

    /// Fires the debounced dispatch once its delay has elapsed. Returns true
    /// if a request went out.
    pub fn tick(&mut self, now: Instant, service: &ServiceHandle) -> bool {
        if !self.debounce.fire_if_due(now) {
            return false;
        }
        self.dispatch(service)
    }

    fn dispatch(&mut self, service: &ServiceHandle) -> bool {
        if self.query.chars().count() < MIN_INDEXED_QUERY_CHARS {
            self.invalidate();
            return false;
        }
        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        let sent = service.send(ServiceRequest::SearchIndex {
            generation,
            query: self.query.clone(),
        });
        if sent {
            self.in_flight = Some(generation);
        } else {
            tracing::warn!("search service is unavailable");
            self.in_flight = None;
        }
        sent
    }

    /// Applies results if `generation` is still current. Returns whether they
    /// were applied.
    pub fn finish(&mut self, generation: u64, result: Result<Vec<IndexEntry>, String>) -> bool {
        if generation != self.generation {
            tracing::debug!(generation, current = self.generation, "dropping stale search results");
            return false;
        }
        self.in_flight = None;
        match result {
            Ok(results) => self.results = directories_first(results),
            Err(error) => {
                tracing::warn!(error = %error, "indexed search failed");
                self.results.clear();
            }
        }
        true
    }

    pub fn cancel_timers(&mut self) {
        self.debounce.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ServicePeer;
    use std::path::PathBuf;

    fn listing(names: &[(&str, bool)]) -> DirectoryListing {
        DirectoryListing {
            path: Some(PathBuf::from("/work/site")),
            entries: names
                .iter()
                .map(|(name, dir)| FileEntry {
                    name: name.to_string(),
                    path: PathBuf::from("/work/site").join(name),
                    is_directory: *dir,
                })
                .collect(),
            is_loading: false,
            error_message: None,
        }
    }

    fn hit(name: &str, dir: bool) -> IndexEntry {
        IndexEntry {
            name: name.to_string(),
            path: PathBuf::from("/idx").join(name),
            is_directory: dir,
            parent_folder: "idx".to_string(),
        }
    }

    fn indexed() -> (SearchCoordinator, ServiceHandle, ServicePeer) {
        let (service, peer) = ServiceHandle::detached();
        let mut search = SearchCoordinator::new();
        let empty = DirectoryListing::default();
        search.set_index_ready(true, Instant::now(), &empty);
        search.set_mode(SearchMode::Indexed, Instant::now(), &empty);
        (search, service, peer)
    }

    fn search_generations(peer: &ServicePeer) -> Vec<(u64, String)> {
        peer
            .drain_requests()
            .into_iter()
            .filter_map(|r| match r {
                ServiceRequest::SearchIndex { generation, query } => Some((generation, query)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn local_mode_matches_synchronously_without_requests() {
        let (service, peer) = ServiceHandle::detached();
        let mut search = SearchCoordinator::new();
        let now = Instant::now();
        let folder = listing(&[("index.html", false), ("assets", true), ("style.css", false)]);
        search.set_query("idx", now, &folder);
        assert_eq!(search.results().len(), 1);
        assert_eq!(search.results()[0].name, "index.html");
        assert_eq!(search.results()[0].parent_folder, "site");
        assert!(!search.tick(now + Duration::from_secs(1), &service));
        assert!(peer.drain_requests().is_empty());
    }

    #[test]
    fn local_matching_tolerates_one_typo() {
        let folder = listing(&[("readme.md", false), ("main.rs", false)]);
        let hits = local_matches(&folder, "reamde");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "readme.md");
        let hits = local_matches(&folder, "rexdme");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "readme.md");
    }

    #[test]
    fn debounce_is_trailing_and_replaces_pending_dispatch() {
        let (mut search, service, peer) = indexed();
        let start = Instant::now();
        let empty = DirectoryListing::default();
        search.set_query("rea", start, &empty);
        search.set_query("read", start + Duration::from_millis(60), &empty);
        assert!(!search.tick(start + Duration::from_millis(120), &service));
        assert!(search.tick(start + Duration::from_millis(160), &service));
        let sent = search_generations(&peer);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "read");
    }

    #[test]
    fn short_query_is_never_sent() {
        let (mut search, service, peer) = indexed();
        let start = Instant::now();
        search.set_query("r", start, &DirectoryListing::default());
        assert!(!search.tick(start + SEARCH_DEBOUNCE, &service));
        assert!(search.results().is_empty());
        assert!(peer.drain_requests().is_empty());
    }

    #[test]
    fn clearing_before_debounce_fires_sends_nothing() {
        let (mut search, service, peer) = indexed();
        let start = Instant::now();
        let empty = DirectoryListing::default();
        search.set_query("re", start, &empty);
        search.set_query("", start + Duration::from_millis(50), &empty);
        assert!(!search.tick(start + Duration::from_secs(1), &service));
        assert!(peer.drain_requests().is_empty());
        assert!(search.results().is_empty());
    }

    #[test]
    fn stale_generation_never_mutates_results() {
        let (mut search, service, peer) = indexed();
        let start = Instant::now();
        let empty = DirectoryListing::default();
        search.set_query("rea", start, &empty);
        search.tick(start + SEARCH_DEBOUNCE, &service);
        search.set_query("readme", start + Duration::from_millis(200), &empty);
        search.tick(start + Duration::from_millis(300), &service);
        let sent = search_generations(&peer);
        assert_eq!(sent.len(), 2);
        let (old, new) = (sent[0].0, sent[1].0);

        assert!(search.finish(new, Ok(vec![hit("readme.md", false)])));
        assert!(!search.finish(old, Ok(vec![hit("stale", false)])));
        assert_eq!(search.results().len(), 1);
        assert_eq!(search.results()[0].name, "readme.md");
    }

    #[test]
    fn switching_to_local_invalidates_in_flight_request() {
        let (mut search, service, peer) = indexed();
        let start = Instant::now();
        let empty = DirectoryListing::default();
        search.set_query("notes", start, &empty);
        search.tick(start + SEARCH_DEBOUNCE, &service);
        let generation = search_generations(&peer)[0].0;
        search.set_mode(SearchMode::Local, start + Duration::from_millis(150), &empty);
        assert!(!search.is_searching());
        assert!(!search.finish(generation, Ok(vec![hit("notes", true)])));
        assert!(search.results().is_empty());
    }

    #[test]
    fn results_group_directories_first_preserving_order() {
        let (mut search, service, peer) = indexed();
        let start = Instant::now();
        search.set_query("src", start, &DirectoryListing::default());
        search.tick(start + SEARCH_DEBOUNCE, &service);
        let generation = search_generations(&peer)[0].0;
        search.finish(
            generation,
            Ok(vec![
                hit("src.rs", false),
                hit("src", true),
                hit("src.ts", false),
                hit("srcs", true),
            ]),
        );
        let names: Vec<&str> = search.results().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["src", "srcs", "src.rs", "src.ts"]);
    }

    #[test]
    fn indexed_mode_falls_back_to_local_until_index_ready() {
        let (service, peer) = ServiceHandle::detached();
        let mut search = SearchCoordinator::new();
        let start = Instant::now();
        let folder = listing(&[("notes.txt", false)]);
        search.set_mode(SearchMode::Indexed, start, &folder);
        search.set_query("notes", start, &folder);
        assert_eq!(search.results().len(), 1);
        assert!(!search.tick(start + SEARCH_DEBOUNCE, &service));
        assert!(peer.drain_requests().is_empty());

        search.set_index_ready(true, start + Duration::from_millis(200), &folder);
        assert!(search.results().is_empty());
        assert!(search.tick(start + Duration::from_millis(300), &service));
        assert_eq!(search_generations(&peer).len(), 1);
    }

    #[test]
    fn shrinking_below_floor_invalidates_earlier_dispatch() {
        let (mut search, service, peer) = indexed();
        let start = Instant::now();
        let empty = DirectoryListing::default();
        search.set_query("ab", start, &empty);
        search.tick(start + SEARCH_DEBOUNCE, &service);
        let generation = search_generations(&peer)[0].0;
        search.set_query("a", start + Duration::from_millis(150), &empty);
        search.tick(start + Duration::from_millis(300), &service);
        assert!(!search.finish(generation, Ok(vec![hit("ab", false)])));
        assert!(search.results().is_empty());
    }
}
