use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::api::{self, Channel};
use crate::data::ChannelService;

pub const INVALID_RESPONSE_MESSAGE: &str = "Invalid response format";
pub const KEYWORDS_FAILED_MESSAGE: &str = "Failed to load content keywords";

const CANCEL_POLL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeywordEntry {
    pub data: Vec<Channel>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordState {
    Pending,
    Loading,
    Loaded,
    Failed,
}

impl KeywordState {
    pub fn is_settled(self) -> bool {
        matches!(self, KeywordState::Loaded | KeywordState::Failed)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn wait(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(CANCEL_POLL.min(deadline - now));
        }
    }
}

#[derive(Debug, Clone)]
pub struct Batch {
    pub id: u64,
    pub keywords: Vec<String>,
    pub cancel: CancelToken,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Loaded(Vec<Channel>),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoaderEvent {
    Started {
        batch: u64,
        keyword: String,
    },
    Finished {
        batch: u64,
        keyword: String,
        outcome: Outcome,
    },
    BatchDone {
        batch: u64,
        cancelled: bool,
    },
}

#[derive(Debug)]
pub struct KeywordLoader {
    batch_size: usize,
    keywords: Vec<String>,
    entries: HashMap<String, KeywordEntry>,
    states: HashMap<String, KeywordState>,
    loaded: HashSet<String>,
    keywords_error: Option<String>,
    in_flight: Option<Batch>,
    // Cancelled batch whose thread has not reported BatchDone yet.
    draining: Option<u64>,
    deferred: bool,
    next_batch_id: u64,
}

impl KeywordLoader {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            keywords: Vec::new(),
            entries: HashMap::new(),
            states: HashMap::new(),
            loaded: HashSet::new(),
            keywords_error: None,
            in_flight: None,
            draining: None,
            deferred: false,
            next_batch_id: 1,
        }
    }

    pub fn set_keywords(&mut self, keywords: Vec<String>) -> Option<Batch> {
        self.reset();
        let mut seen = HashSet::new();
        for keyword in keywords {
            if !seen.insert(keyword.clone()) {
                continue;
            }
            self.entries.insert(
                keyword.clone(),
                KeywordEntry {
                    data: Vec::new(),
                    loading: true,
                    error: None,
                },
            );
            self.states.insert(keyword.clone(), KeywordState::Pending);
            self.keywords.push(keyword);
        }
        info!(count = self.keywords.len(), "keywords received");
        self.next_batch()
    }

    pub fn fail_keywords(&mut self, message: impl Into<String>) {
        self.reset();
        self.keywords_error = Some(message.into());
    }

    pub fn keywords_error(&self) -> Option<&str> {
        self.keywords_error.as_deref()
    }

    pub fn next_batch(&mut self) -> Option<Batch> {
        if self.in_flight.is_some() {
            return None;
        }
        if self.draining.is_some() {
            self.deferred = self.has_unloaded();
            return None;
        }
        let keywords: Vec<String> = self.unloaded().take(self.batch_size).cloned().collect();
        if keywords.is_empty() {
            return None;
        }
        let batch = Batch {
            id: self.next_batch_id,
            keywords,
            cancel: CancelToken::new(),
        };
        self.next_batch_id = self.next_batch_id.wrapping_add(1);
        debug!(batch = batch.id, keywords = ?batch.keywords, "batch selected");
        self.in_flight = Some(batch.clone());
        Some(batch)
    }

    pub fn on_sentinel_visible(&mut self) -> Option<Batch> {
        self.next_batch()
    }

    /// Returns the batch that was held back while a cancelled one drained.
    pub fn apply(&mut self, event: LoaderEvent) -> Option<Batch> {
        let current = self.in_flight.as_ref().map(|b| b.id);
        let batch_id = match &event {
            LoaderEvent::Started { batch, .. }
            | LoaderEvent::Finished { batch, .. }
            | LoaderEvent::BatchDone { batch, .. } => *batch,
        };
        if self.draining == Some(batch_id) {
            if matches!(event, LoaderEvent::BatchDone { .. }) {
                debug!(batch = batch_id, "cancelled batch drained");
                self.draining = None;
                if std::mem::take(&mut self.deferred) {
                    return self.next_batch();
                }
            }
            return None;
        }
        if current != Some(batch_id) {
            return None;
        }

        match event {
            LoaderEvent::Started { keyword, .. } => {
                if let Some(entry) = self.entries.get_mut(&keyword) {
                    entry.loading = true;
                    entry.error = None;
                    self.states.insert(keyword, KeywordState::Loading);
                }
            }
            LoaderEvent::Finished {
                keyword, outcome, ..
            } => {
                let Some(entry) = self.entries.get_mut(&keyword) else {
                    return None;
                };
                entry.loading = false;
                let state = match outcome {
                    Outcome::Loaded(data) => {
                        entry.data = data;
                        entry.error = None;
                        KeywordState::Loaded
                    }
                    Outcome::Failed(message) => {
                        entry.data.clear();
                        entry.error = Some(message);
                        KeywordState::Failed
                    }
                };
                self.states.insert(keyword.clone(), state);
                self.loaded.insert(keyword);
            }
            LoaderEvent::BatchDone { cancelled, .. } => {
                if cancelled {
                    debug!(batch = batch_id, "batch cancelled");
                }
                self.in_flight = None;
            }
        }
        None
    }

    pub fn cancel(&self) {
        if let Some(batch) = &self.in_flight {
            batch.cancel.cancel();
        }
    }

    /// Forgets all keywords. A running batch is cancelled and must report
    /// `BatchDone` before another batch can start.
    pub fn reset(&mut self) {
        if let Some(batch) = self.in_flight.take() {
            batch.cancel.cancel();
            self.draining = Some(batch.id);
        }
        self.deferred = false;
        self.keywords.clear();
        self.entries.clear();
        self.states.clear();
        self.loaded.clear();
        self.keywords_error = None;
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn entry(&self, keyword: &str) -> Option<&KeywordEntry> {
        self.entries.get(keyword)
    }

    pub fn state(&self, keyword: &str) -> Option<KeywordState> {
        self.states.get(keyword).copied()
    }

    pub fn is_loaded(&self, keyword: &str) -> bool {
        self.loaded.contains(keyword)
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some() || self.draining.is_some()
    }

    pub fn has_unloaded(&self) -> bool {
        self.unloaded().next().is_some()
    }

    fn unloaded(&self) -> impl Iterator<Item = &String> {
        self.keywords.iter().filter(|k| !self.loaded.contains(*k))
    }
}

/// Fetches each keyword of `batch` in order, pausing `delay` after each one.
/// Always finishes with [`LoaderEvent::BatchDone`].
pub fn run_batch<F>(service: &dyn ChannelService, batch: &Batch, delay: Duration, mut emit: F)
where
    F: FnMut(LoaderEvent),
{
    let mut cancelled = false;
    for keyword in &batch.keywords {
        if batch.cancel.is_cancelled() {
            cancelled = true;
            break;
        }
        emit(LoaderEvent::Started {
            batch: batch.id,
            keyword: keyword.clone(),
        });
        debug!(keyword = %keyword, "loading channels");
        let outcome = match service.channels_for_keyword(keyword) {
            Ok(channels) => Outcome::Loaded(channels),
            Err(err) if api::is_unexpected_shape(&err) => {
                warn!(keyword = %keyword, "unexpected channel response format");
                Outcome::Failed(INVALID_RESPONSE_MESSAGE.to_string())
            }
            Err(err) => {
                warn!(keyword = %keyword, error = %format!("{err:#}"), "channel fetch failed");
                Outcome::Failed(format!("Failed to load {keyword} channels"))
            }
        };
        emit(LoaderEvent::Finished {
            batch: batch.id,
            keyword: keyword.clone(),
            outcome,
        });
        if !batch.cancel.wait(delay) {
            cancelled = true;
            break;
        }
    }
    emit(LoaderEvent::BatchDone {
        batch: batch.id,
        cancelled,
    });
}

pub fn spawn_batch<F>(
    service: Arc<dyn ChannelService>,
    batch: Batch,
    delay: Duration,
    emit: F,
) -> thread::JoinHandle<()>
where
    F: FnMut(LoaderEvent) + Send + 'static,
{
    thread::spawn(move || run_batch(service.as_ref(), &batch, delay, emit))
}

pub fn display_keyword(keyword: &str) -> String {
    let mut chars = keyword.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingService {
        calls: Mutex<Vec<String>>,
        broken: Vec<&'static str>,
        malformed: Vec<&'static str>,
    }

    impl ChannelService for CountingService {
        fn popular_channels(&self) -> Result<Vec<Channel>> {
            Ok(Vec::new())
        }

        fn keywords(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn channels_for_keyword(&self, keyword: &str) -> Result<Vec<Channel>> {
            self.calls.lock().push(keyword.to_string());
            if self.broken.contains(&keyword) {
                return Err(anyhow!("status 500"));
            }
            if self.malformed.contains(&keyword) {
                return Err(anyhow::Error::new(api::ApiError::UnexpectedShape {
                    endpoint: "reddit/Category/search".into(),
                }));
            }
            Ok(vec![Channel {
                display_name: format!("{keyword}-channel"),
                ..Channel::default()
            }])
        }
    }

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn drive(loader: &mut KeywordLoader, service: &CountingService, batch: Batch) -> usize {
        let mut events = Vec::new();
        run_batch(service, &batch, Duration::ZERO, |e| events.push(e));
        let started = events
            .iter()
            .filter(|e| matches!(e, LoaderEvent::Started { .. }))
            .count();
        for event in events {
            loader.apply(event);
        }
        started
    }

    #[test]
    fn every_keyword_fetched_once_in_bounded_batches() {
        for (n, b) in [(0usize, 2usize), (1, 2), (5, 2), (6, 3), (4, 10)] {
            let keywords: Vec<String> = (0..n).map(|i| format!("kw{i}")).collect();
            let service = CountingService {
                broken: vec!["kw1"],
                ..Default::default()
            };
            let mut loader = KeywordLoader::new(b);
            let mut batch = loader.set_keywords(keywords.clone());
            while let Some(next) = batch {
                assert!(next.keywords.len() <= b);
                let started = drive(&mut loader, &service, next);
                assert!(started <= b);
                assert!(!loader.is_busy());
                batch = loader.on_sentinel_visible();
            }
            assert_eq!(service.calls.lock().clone(), keywords, "n={n} b={b}");
            for keyword in &keywords {
                assert!(loader.is_loaded(keyword));
                let state = loader.state(keyword).unwrap();
                assert!(state.is_settled());
                let entry = loader.entry(keyword).unwrap();
                assert!(!entry.loading);
                assert_eq!(state == KeywordState::Failed, entry.error.is_some());
            }
        }
    }

    #[test]
    fn initial_entries_are_loading_and_pending() {
        let mut loader = KeywordLoader::new(2);
        let batch = loader
            .set_keywords(words(&["cats", "dogs", "birds", "cats"]))
            .unwrap();
        assert_eq!(batch.keywords, words(&["cats", "dogs"]));
        assert_eq!(loader.keywords(), &words(&["cats", "dogs", "birds"])[..]);
        for keyword in loader.keywords() {
            let entry = loader.entry(keyword).unwrap();
            assert!(entry.loading);
            assert!(entry.data.is_empty());
            assert_eq!(loader.state(keyword), Some(KeywordState::Pending));
        }
    }

    #[test]
    fn busy_loader_refuses_second_batch() {
        let mut loader = KeywordLoader::new(1);
        let first = loader.set_keywords(words(&["a", "b"])).unwrap();
        assert!(loader.is_busy());
        assert!(loader.on_sentinel_visible().is_none());

        loader.apply(LoaderEvent::Started {
            batch: first.id,
            keyword: "a".into(),
        });
        assert_eq!(loader.state("a"), Some(KeywordState::Loading));
        assert!(!loader.is_loaded("a"));

        loader.apply(LoaderEvent::Finished {
            batch: first.id,
            keyword: "a".into(),
            outcome: Outcome::Loaded(Vec::new()),
        });
        assert!(loader.is_loaded("a"));
        assert!(loader.next_batch().is_none());

        loader.apply(LoaderEvent::BatchDone {
            batch: first.id,
            cancelled: false,
        });
        let second = loader.on_sentinel_visible().unwrap();
        assert_eq!(second.keywords, words(&["b"]));
    }

    #[test]
    fn failures_record_messages_and_still_count_as_loaded() {
        let service = CountingService {
            broken: vec!["dogs"],
            malformed: vec!["birds"],
            ..Default::default()
        };
        let mut loader = KeywordLoader::new(3);
        let batch = loader
            .set_keywords(words(&["cats", "dogs", "birds"]))
            .unwrap();
        drive(&mut loader, &service, batch);

        assert_eq!(loader.entry("cats").unwrap().data.len(), 1);
        assert_eq!(
            loader.entry("dogs").unwrap().error.as_deref(),
            Some("Failed to load dogs channels")
        );
        let birds = loader.entry("birds").unwrap();
        assert_eq!(birds.error.as_deref(), Some(INVALID_RESPONSE_MESSAGE));
        assert!(birds.data.is_empty());
        assert_eq!(loader.loaded_count(), 3);
        assert!(loader.on_sentinel_visible().is_none());
    }

    #[test]
    fn cancelled_batch_leaves_remaining_keywords_pending() {
        let service = CountingService::default();
        let mut loader = KeywordLoader::new(3);
        let batch = loader.set_keywords(words(&["a", "b", "c"])).unwrap();
        let token = batch.cancel.clone();
        let mut events = Vec::new();
        run_batch(&service, &batch, Duration::ZERO, |e| {
            if matches!(e, LoaderEvent::Finished { .. }) {
                token.cancel();
            }
            events.push(e);
        });
        assert_eq!(
            events.last(),
            Some(&LoaderEvent::BatchDone {
                batch: batch.id,
                cancelled: true
            })
        );
        for event in events {
            loader.apply(event);
        }
        assert_eq!(service.calls.lock().len(), 1);
        assert_eq!(loader.state("b"), Some(KeywordState::Pending));
        assert!(loader.has_unloaded());
        assert!(!loader.is_busy());
    }

    #[test]
    fn reset_waits_for_cancelled_batch_to_drain() {
        let mut loader = KeywordLoader::new(2);
        let old = loader.set_keywords(words(&["a"])).unwrap();
        assert!(!old.cancel.is_cancelled());

        assert!(loader.set_keywords(words(&["a", "b"])).is_none());
        assert!(old.cancel.is_cancelled());
        assert!(loader.is_busy());
        assert!(loader.on_sentinel_visible().is_none());

        let stale = loader.apply(LoaderEvent::Finished {
            batch: old.id,
            keyword: "a".into(),
            outcome: Outcome::Failed("stale".into()),
        });
        assert!(stale.is_none());
        assert!(!loader.is_loaded("a"));

        let fresh = loader
            .apply(LoaderEvent::BatchDone {
                batch: old.id,
                cancelled: true,
            })
            .unwrap();
        assert_ne!(old.id, fresh.id);
        assert_eq!(fresh.keywords, words(&["a", "b"]));
        assert!(loader.next_batch().is_none());
    }

    struct SlowService {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ChannelService for SlowService {
        fn popular_channels(&self) -> Result<Vec<Channel>> {
            Ok(Vec::new())
        }

        fn keywords(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn channels_for_keyword(&self, _keyword: &str) -> Result<Vec<Channel>> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(100));
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[test]
    fn refresh_during_fetch_never_overlaps_batches() {
        let service = Arc::new(SlowService {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let (tx, rx) = crossbeam_channel::unbounded();
        let spawn = |batch: Batch| {
            let tx = tx.clone();
            spawn_batch(service.clone(), batch, Duration::ZERO, move |e| {
                let _ = tx.send(e);
            })
        };

        let mut loader = KeywordLoader::new(2);
        let mut handles = vec![spawn(loader.set_keywords(words(&["a", "b"])).unwrap())];
        let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(first, LoaderEvent::Started { .. }));
        assert!(loader.set_keywords(words(&["a", "b"])).is_none());

        let deadline = Instant::now() + Duration::from_secs(5);
        while loader.is_busy() || loader.has_unloaded() {
            assert!(Instant::now() < deadline, "loader never settled");
            if let Ok(event) = rx.recv_timeout(Duration::from_millis(50)) {
                if let Some(batch) = loader.apply(event) {
                    handles.push(spawn(batch));
                }
            }
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(service.peak.load(Ordering::SeqCst), 1);
        assert_eq!(loader.loaded_count(), 2);
    }

    #[test]
    fn spawned_batch_waits_between_keywords() {
        let service: Arc<dyn ChannelService> = Arc::new(CountingService::default());
        let mut loader = KeywordLoader::new(2);
        let batch = loader.set_keywords(words(&["a", "b"])).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let started = Instant::now();
        spawn_batch(service, batch, Duration::from_millis(30), move |e| {
            let _ = tx.send(e);
        })
        .join()
        .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(60));
        for event in rx.try_iter() {
            loader.apply(event);
        }
        assert_eq!(loader.loaded_count(), 2);
        assert!(!loader.is_busy());
    }

    #[test]
    fn keyword_failure_is_recorded() {
        let mut loader = KeywordLoader::new(2);
        loader.fail_keywords(KEYWORDS_FAILED_MESSAGE);
        assert_eq!(loader.keywords_error(), Some(KEYWORDS_FAILED_MESSAGE));
        assert!(loader.keywords().is_empty());
        assert!(loader.next_batch().is_none());
    }

    #[test]
    fn display_keyword_capitalizes_first_letter() {
        assert_eq!(display_keyword("cosplay"), "Cosplay");
        assert_eq!(display_keyword("éclair"), "Éclair");
        assert_eq!(display_keyword(""), "");
    }
}
