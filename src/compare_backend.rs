//! Background comparison worker.
//!
//! Fetching both sides and diffing them can take a while on large files, so
//! it runs on a dedicated thread. Every request is tagged with a generation
//! number and carries a cancellation token; a newer request cancels the one
//! before it, and results from any generation but the latest are discarded.

use crate::backend::{FileRef, StoreError, VersionStore, fetch_content};
use crate::history::{ComparePair, DiffResult, compute_diff_with_deadline};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Fetch both sides of a comparison concurrently and wait for both
pub fn fetch_pair(
    store: &dyn VersionStore,
    file: &FileRef,
    pair: &ComparePair,
) -> Result<(String, String), StoreError> {
    thread::scope(|scope| {
        let left = scope.spawn(|| fetch_content(store, file, &pair.left));
        let right = fetch_content(store, file, &pair.right);
        let left = left.join().unwrap_or_else(|_| {
            Err(StoreError::Transport("content fetch panicked".to_string()))
        });
        Ok((left?, right?))
    })
}

/// Shared flag telling the worker to abandon a request
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Result of one comparison request
#[derive(Debug, Clone)]
pub struct CompareOutcome {
    pub generation: u64,
    pub file: FileRef,
    pub pair: ComparePair,
    pub result: Result<DiffResult, StoreError>,
}

/// Messages sent to the comparison thread
enum CompareMessage {
    Compare {
        generation: u64,
        file: FileRef,
        pair: ComparePair,
        cancel: CancelToken,
    },
    /// Stop the comparison thread
    Stop,
}

pub struct CompareBackend {
    /// Generation of the most recent request
    generation: Arc<AtomicU64>,
    cancel: Option<CancelToken>,
    sender: Sender<CompareMessage>,
    receiver: Receiver<CompareOutcome>,
    /// Handle to the comparison thread
    _thread_handle: thread::JoinHandle<()>,
}

impl CompareBackend {
    /// Start the worker. `diff_timeout` bounds each diff computation.
    pub fn new(store: Arc<dyn VersionStore>, diff_timeout: Option<Duration>) -> Self {
        let (sender, receiver) = mpsc::channel();
        let (response_sender, response_receiver) = mpsc::channel();
        let generation = Arc::new(AtomicU64::new(0));

        let latest = Arc::clone(&generation);
        let thread_handle = thread::spawn(move || {
            Self::compare_loop(store, diff_timeout, latest, receiver, response_sender);
        });

        Self {
            generation,
            cancel: None,
            sender,
            receiver: response_receiver,
            _thread_handle: thread_handle,
        }
    }

    /// Queue a comparison, superseding any request still in flight.
    /// Returns the generation the result will carry.
    pub fn request(&mut self, file: FileRef, pair: ComparePair) -> u64 {
        self.cancel_in_flight();
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let cancel = CancelToken::new();
        self.cancel = Some(cancel.clone());

        debug!(
            "Comparison {} requested for {}: {} -> {}",
            generation, file, pair.left, pair.right
        );
        let message = CompareMessage::Compare {
            generation,
            file,
            pair,
            cancel,
        };
        if self.sender.send(message).is_err() {
            warn!("Comparison thread is gone, request {} dropped", generation);
        }
        generation
    }

    /// Abandon the current request; its result will never be delivered
    pub fn cancel(&mut self) {
        self.cancel_in_flight();
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    fn cancel_in_flight(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn is_current(&self, outcome: &CompareOutcome) -> bool {
        outcome.generation == self.current_generation()
    }

    /// Non-blocking poll for the latest result; stale results are dropped
    pub fn try_recv(&self) -> Option<CompareOutcome> {
        let mut latest = None;
        while let Ok(outcome) = self.receiver.try_recv() {
            if self.is_current(&outcome) {
                latest = Some(outcome);
            } else {
                debug!("Discarding stale comparison {}", outcome.generation);
            }
        }
        latest
    }

    /// Block until the latest request finishes or `timeout` elapses
    pub fn recv_timeout(&self, timeout: Duration) -> Option<CompareOutcome> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(outcome) if self.is_current(&outcome) => return Some(outcome),
                Ok(outcome) => debug!("Discarding stale comparison {}", outcome.generation),
                Err(_) => return None,
            }
        }
    }

    /// The main comparison loop that runs in a separate thread
    fn compare_loop(
        store: Arc<dyn VersionStore>,
        diff_timeout: Option<Duration>,
        latest: Arc<AtomicU64>,
        receiver: Receiver<CompareMessage>,
        sender: Sender<CompareOutcome>,
    ) {
        let abandoned = |generation: u64, cancel: &CancelToken| {
            cancel.is_cancelled() || latest.load(Ordering::Acquire) != generation
        };

        while let Ok(message) = receiver.recv() {
            let (generation, file, pair, cancel) = match message {
                CompareMessage::Compare {
                    generation,
                    file,
                    pair,
                    cancel,
                } => (generation, file, pair, cancel),
                CompareMessage::Stop => break,
            };

            if abandoned(generation, &cancel) {
                debug!("Comparison {} cancelled before start", generation);
                continue;
            }

            let fetched = fetch_pair(store.as_ref(), &file, &pair);
            if abandoned(generation, &cancel) {
                debug!("Comparison {} cancelled after fetch", generation);
                continue;
            }

            let result =
                fetched.map(|(old, new)| compute_diff_with_deadline(&old, &new, diff_timeout));
            if abandoned(generation, &cancel) {
                debug!("Comparison {} cancelled after diff", generation);
                continue;
            }

            if let Err(e) = &result {
                warn!("Comparison {} for {} failed: {}", generation, file, e);
            }
            let outcome = CompareOutcome {
                generation,
                file,
                pair,
                result,
            };
            if sender.send(outcome).is_err() {
                break;
            }
        }
    }
}

impl Drop for CompareBackend {
    fn drop(&mut self) {
        self.cancel_in_flight();
        let _ = self.sender.send(CompareMessage::Stop);
        // The thread is not joined here to avoid blocking on a slow fetch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        ContentSource, FileChangeSummary, MemoryBackend, ScopeRef, Version, VersionId,
    };
    use crate::rollback::RollbackPlan;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    const WAIT: Duration = Duration::from_secs(5);

    /// Store whose live reads block until released, for ordering tests
    struct GatedStore {
        inner: MemoryBackend,
        gate: Mutex<Option<mpsc::Receiver<()>>>,
    }

    impl VersionStore for GatedStore {
        fn list_versions(&self, file: &FileRef) -> Result<Vec<Version>, StoreError> {
            self.inner.list_versions(file)
        }

        fn get_version_content(
            &self,
            file: &FileRef,
            version: &VersionId,
        ) -> Result<Option<String>, StoreError> {
            self.inner.get_version_content(file, version)
        }

        fn get_live_content(&self, file: &FileRef) -> Result<Option<String>, StoreError> {
            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                let _ = gate.recv_timeout(WAIT);
            }
            self.inner.get_live_content(file)
        }

        fn restore_version(&self, file: &FileRef, version: &VersionId) -> Result<(), StoreError> {
            self.inner.restore_version(file, version)
        }

        fn list_changed_since(
            &self,
            scope: &ScopeRef,
            cutoff: DateTime<Utc>,
        ) -> Result<Vec<FileChangeSummary>, StoreError> {
            self.inner.list_changed_since(scope, cutoff)
        }

        fn submit_rollback(
            &self,
            scope: &ScopeRef,
            plan: &RollbackPlan,
        ) -> Result<(), StoreError> {
            self.inner.submit_rollback(scope, plan)
        }
    }

    fn live_pair(id: &VersionId) -> ComparePair {
        ComparePair {
            left: ContentSource::Version(id.clone()),
            right: ContentSource::Live,
        }
    }

    #[test]
    fn fetch_pair_reads_both_sides() {
        let store = MemoryBackend::new();
        let file = FileRef::new("a.yml");
        let v1 = store.save(&file, "old");
        store.save(&file, "new");

        let (left, right) = fetch_pair(&store, &file, &live_pair(&v1)).unwrap();
        assert_eq!((left.as_str(), right.as_str()), ("old", "new"));
    }

    #[test]
    fn fetch_pair_reports_failures() {
        let store = MemoryBackend::new();
        let file = FileRef::new("a.yml");
        store.save(&file, "x");
        let missing = VersionId::new("missing");

        let result = fetch_pair(&store, &file, &live_pair(&missing));
        assert_eq!(result, Err(StoreError::VersionNotFound(missing)));
    }

    #[test]
    fn delivers_result_for_latest_request() {
        let store = Arc::new(MemoryBackend::new());
        let file = FileRef::new("a.yml");
        let v1 = store.save(&file, "a\nb\nc");
        store.save(&file, "a\nx\nc");

        let mut backend = CompareBackend::new(store, None);
        let generation = backend.request(file.clone(), live_pair(&v1));

        let outcome = backend.recv_timeout(WAIT).expect("comparison result");
        assert_eq!(outcome.generation, generation);
        assert_eq!(outcome.file, file);
        let diff = outcome.result.unwrap();
        assert_eq!((diff.summary.added, diff.summary.removed), (1, 1));
    }

    #[test]
    fn superseded_request_never_overwrites_newer_one() {
        let memory = MemoryBackend::new();
        let slow_file = FileRef::new("slow.yml");
        let fast_file = FileRef::new("fast.yml");
        let slow_v = memory.save(&slow_file, "1");
        memory.save(&slow_file, "2");
        let fast_v = memory.save(&fast_file, "a");
        memory.save(&fast_file, "b\nc");

        let (release, gate) = mpsc::channel();
        let store = Arc::new(GatedStore {
            inner: memory,
            gate: Mutex::new(Some(gate)),
        });

        let mut backend = CompareBackend::new(store, None);
        let first = backend.request(slow_file, live_pair(&slow_v));
        let second = backend.request(fast_file.clone(), live_pair(&fast_v));
        assert!(second > first);
        release.send(()).unwrap();

        let outcome = backend.recv_timeout(WAIT).expect("latest result");
        assert_eq!(outcome.generation, second);
        assert_eq!(outcome.file, fast_file);
        assert_eq!(outcome.result.unwrap().summary.added, 2);

        // Nothing from the first request shows up later
        assert!(backend.recv_timeout(Duration::from_millis(200)).is_none());
    }

    #[test]
    fn cancelled_request_yields_nothing() {
        let store = Arc::new(MemoryBackend::new());
        let file = FileRef::new("a.yml");
        let v1 = store.save(&file, "a");
        store.save(&file, "b");

        let mut backend = CompareBackend::new(store, None);
        backend.request(file, live_pair(&v1));
        backend.cancel();

        assert!(backend.recv_timeout(Duration::from_millis(300)).is_none());
        assert!(backend.try_recv().is_none());
    }

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
