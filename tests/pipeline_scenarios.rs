//! End-to-end pipeline scenarios against scripted collaborators.
//!
//! Each test drives a full run through the orchestrator with collaborators
//! whose behavior is programmed per item, then asserts on the run report,
//! the dedup index and which collaborators were actually invoked.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use paperforge::connectors::{
    CollaboratorSet, DocumentParser, SourceConnector, StorageBackend, Tagger,
};
use paperforge::dedup::{DedupIndex, InMemoryIndex};
use paperforge::error::CollaboratorError;
use paperforge::model::{ItemKey, ItemStatus, Labels, RawContent, StructuredDocument};
use paperforge::pipeline::{PipelineConfig, PipelineOrchestrator};

/// Long enough to clear the default minimum-abstract gate.
const LONG_ABSTRACT: &str =
    "We study sequential decision making under uncertainty and derive regret bounds \
     for a family of bandit algorithms applied to portfolio selection.";

fn key(id: &str) -> ItemKey {
    ItemKey::new("arxiv", id, 1)
}

/// Tracks how many collaborator calls run at once.
#[derive(Default)]
struct Gauge {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    fn high_water(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

/// Source with per-item scripted behavior: permanent failures, a budget
/// of transient failures, or a fixed delay.
struct FakeSource {
    gauge: Arc<Gauge>,
    fetches: AtomicUsize,
    fail_ids: HashSet<String>,
    transient_budget: Mutex<HashMap<String, u32>>,
    abstracts: HashMap<String, String>,
    delay: Duration,
}

impl FakeSource {
    fn new(gauge: Arc<Gauge>) -> Self {
        Self {
            gauge,
            fetches: AtomicUsize::new(0),
            fail_ids: HashSet::new(),
            transient_budget: Mutex::new(HashMap::new()),
            abstracts: HashMap::new(),
            delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl SourceConnector for FakeSource {
    async fn fetch(&self, key: &ItemKey) -> Result<RawContent, CollaboratorError> {
        self.gauge.enter();
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.gauge.exit();

        if self.fail_ids.contains(&key.local_id) {
            return Err(CollaboratorError::permanent(format!(
                "item {} not found at source",
                key.local_id
            )));
        }
        {
            let mut budget = self.transient_budget.lock().unwrap();
            if let Some(remaining) = budget.get_mut(&key.local_id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(CollaboratorError::transient("source temporarily unavailable"));
                }
            }
        }

        let body = self
            .abstracts
            .get(&key.local_id)
            .cloned()
            .unwrap_or_else(|| LONG_ABSTRACT.to_string());
        Ok(RawContent::new(key.clone(), body, "text/plain"))
    }
}

/// Parser that fails permanently on the `!parse` marker and otherwise
/// turns the raw body into the document abstract.
struct FakeParser {
    gauge: Arc<Gauge>,
    parses: AtomicUsize,
}

#[async_trait]
impl DocumentParser for FakeParser {
    async fn parse(&self, raw: &RawContent) -> Result<StructuredDocument, CollaboratorError> {
        self.gauge.enter();
        self.parses.fetch_add(1, Ordering::SeqCst);
        self.gauge.exit();

        if raw.data == "!parse" {
            return Err(CollaboratorError::permanent("unrecognized document format"));
        }
        Ok(StructuredDocument::new(
            raw.key.clone(),
            format!("Document {}", raw.key.local_id),
            raw.data.clone(),
        ))
    }
}

/// Tagger with a per-item category override.
struct FakeTagger {
    gauge: Arc<Gauge>,
    classifications: AtomicUsize,
    categories: HashMap<String, Vec<String>>,
}

#[async_trait]
impl Tagger for FakeTagger {
    async fn classify(&self, document: &StructuredDocument) -> Result<Labels, CollaboratorError> {
        self.gauge.enter();
        self.classifications.fetch_add(1, Ordering::SeqCst);
        self.gauge.exit();

        let categories = self
            .categories
            .get(&document.key.local_id)
            .cloned()
            .unwrap_or_else(|| vec!["machine-learning".to_string()]);
        Ok(Labels::new(categories))
    }
}

/// Storage that records which items were persisted.
struct RecordingStorage {
    gauge: Arc<Gauge>,
    persisted: Mutex<Vec<ItemKey>>,
}

#[async_trait]
impl StorageBackend for RecordingStorage {
    async fn persist(
        &self,
        key: &ItemKey,
        _document: &StructuredDocument,
        _labels: &Labels,
    ) -> Result<(), CollaboratorError> {
        self.gauge.enter();
        self.persisted.lock().unwrap().push(key.clone());
        self.gauge.exit();
        Ok(())
    }
}

/// Scripted collaborators plus the shared index, bundled per test.
struct Harness {
    gauge: Arc<Gauge>,
    source: Arc<FakeSource>,
    parser: Arc<FakeParser>,
    tagger: Arc<FakeTagger>,
    storage: Arc<RecordingStorage>,
    index: Arc<InMemoryIndex>,
}

impl Harness {
    fn new() -> Self {
        let gauge = Arc::new(Gauge::default());
        Self {
            source: Arc::new(FakeSource::new(Arc::clone(&gauge))),
            parser: Arc::new(FakeParser {
                gauge: Arc::clone(&gauge),
                parses: AtomicUsize::new(0),
            }),
            tagger: Arc::new(FakeTagger {
                gauge: Arc::clone(&gauge),
                classifications: AtomicUsize::new(0),
                categories: HashMap::new(),
            }),
            storage: Arc::new(RecordingStorage {
                gauge: Arc::clone(&gauge),
                persisted: Mutex::new(Vec::new()),
            }),
            index: Arc::new(InMemoryIndex::new()),
            gauge,
        }
    }

    fn with_source(mut self, configure: impl FnOnce(&mut FakeSource)) -> Self {
        let mut source = FakeSource::new(Arc::clone(&self.gauge));
        configure(&mut source);
        self.source = Arc::new(source);
        self
    }

    fn with_categories(mut self, local_id: &str, categories: &[&str]) -> Self {
        let mut map = self.tagger.categories.clone();
        map.insert(
            local_id.to_string(),
            categories.iter().map(|s| s.to_string()).collect(),
        );
        self.tagger = Arc::new(FakeTagger {
            gauge: Arc::clone(&self.gauge),
            classifications: AtomicUsize::new(0),
            categories: map,
        });
        self
    }

    fn orchestrator(&self, config: PipelineConfig) -> PipelineOrchestrator {
        let collaborators = CollaboratorSet::new(
            Arc::clone(&self.source) as Arc<dyn SourceConnector>,
            Arc::clone(&self.parser) as Arc<dyn DocumentParser>,
            Arc::clone(&self.tagger) as Arc<dyn Tagger>,
            Arc::clone(&self.storage) as Arc<dyn StorageBackend>,
        );
        PipelineOrchestrator::new(
            config,
            collaborators,
            Arc::clone(&self.index) as Arc<dyn DedupIndex>,
        )
        .expect("valid test configuration")
    }

    fn persisted(&self) -> Vec<ItemKey> {
        self.storage.persisted.lock().unwrap().clone()
    }
}

fn fast_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.retry_base_delay = Duration::from_millis(1);
    config.retry_max_delay = Duration::from_millis(5);
    config
}

#[tokio::test]
async fn one_failing_item_does_not_affect_the_rest_of_the_batch() {
    let harness = Harness::new().with_source(|source| {
        source
            .abstracts
            .insert("bad".to_string(), "!parse".to_string());
    });
    let orchestrator = harness.orchestrator(fast_config());

    let report = orchestrator.run(vec![key("bad"), key("good")]).await.unwrap();

    assert_eq!(report.counts.failed, 1);
    assert_eq!(report.counts.completed, 1);
    assert_eq!(report.items[0].status, ItemStatus::Failed);
    assert!(report.items[0]
        .reason
        .as_deref()
        .unwrap()
        .contains("unrecognized document format"));
    assert_eq!(report.items[1].status, ItemStatus::Completed);

    // Only the completed item was persisted and committed.
    assert_eq!(harness.persisted(), vec![key("good")]);
    assert!(!harness.index.seen(&key("bad").fingerprint()).unwrap());
    assert!(harness.index.seen(&key("good").fingerprint()).unwrap());
}

#[tokio::test]
async fn failed_acquire_skips_the_rest_of_the_chain() {
    let harness = Harness::new().with_source(|source| {
        source.fail_ids.insert("gone".to_string());
    });
    let orchestrator = harness.orchestrator(fast_config());

    let report = orchestrator.run(vec![key("gone")]).await.unwrap();

    assert_eq!(report.items[0].status, ItemStatus::Failed);
    assert_eq!(harness.parser.parses.load(Ordering::SeqCst), 0);
    assert_eq!(harness.tagger.classifications.load(Ordering::SeqCst), 0);
    assert!(harness.persisted().is_empty());
}

#[tokio::test]
async fn rerun_skips_committed_items_without_touching_the_source() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator(fast_config());

    let first = orchestrator.run(vec![key("a")]).await.unwrap();
    assert_eq!(first.counts.completed, 1);
    let fetches_after_first = harness.source.fetches.load(Ordering::SeqCst);

    let second = orchestrator.run(vec![key("a")]).await.unwrap();
    assert_eq!(second.counts.skipped_duplicate, 1);
    assert_eq!(second.items[0].status, ItemStatus::SkippedDuplicate);

    // No collaborator ran for the duplicate.
    assert_eq!(
        harness.source.fetches.load(Ordering::SeqCst),
        fetches_after_first
    );
    assert_eq!(harness.persisted().len(), 1);
}

#[tokio::test]
async fn new_version_of_a_committed_item_is_processed() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator(fast_config());

    orchestrator.run(vec![key("a")]).await.unwrap();

    let v2 = ItemKey::new("arxiv", "a", 2);
    let report = orchestrator.run(vec![v2.clone()]).await.unwrap();
    assert_eq!(report.counts.completed, 1);
    assert!(harness.index.seen(&v2.fingerprint()).unwrap());
}

#[tokio::test]
async fn short_abstract_is_rejected_not_failed() {
    let harness = Harness::new().with_source(|source| {
        source
            .abstracts
            .insert("thin".to_string(), "ten chars.".to_string());
    });
    let orchestrator = harness.orchestrator(fast_config());

    let report = orchestrator.run(vec![key("thin")]).await.unwrap();

    assert_eq!(report.counts.rejected, 1);
    assert_eq!(report.counts.failed, 0);
    assert!(!report.has_failures());

    // The reason names the gate and both counts.
    let reason = report.items[0].reason.as_deref().unwrap();
    assert!(reason.contains("min_abstract_length"));
    assert!(reason.contains("10"));
    assert!(reason.contains("50"));

    // Rejection short-circuits the chain and never commits.
    assert_eq!(harness.tagger.classifications.load(Ordering::SeqCst), 0);
    assert!(harness.persisted().is_empty());
    assert!(!harness.index.seen(&key("thin").fingerprint()).unwrap());
}

#[tokio::test]
async fn excluded_category_is_rejected_after_classification() {
    let harness = Harness::new().with_categories("spam", &["quant-spam"]);
    let config =
        fast_config().with_excluded_categories(vec!["^quant-spam$".to_string()]);
    let orchestrator = harness.orchestrator(config);

    let report = orchestrator.run(vec![key("spam"), key("ok")]).await.unwrap();

    assert_eq!(report.counts.rejected, 1);
    assert_eq!(report.counts.completed, 1);
    assert!(report.items[0]
        .reason
        .as_deref()
        .unwrap()
        .contains("quant-spam"));
    assert_eq!(harness.persisted(), vec![key("ok")]);
}

#[tokio::test]
async fn transient_source_failures_recover_within_the_retry_budget() {
    let harness = Harness::new().with_source(|source| {
        source
            .transient_budget
            .get_mut()
            .unwrap()
            .insert("flaky".to_string(), 2);
    });
    let orchestrator = harness.orchestrator(fast_config());

    let report = orchestrator.run(vec![key("flaky")]).await.unwrap();

    assert_eq!(report.counts.completed, 1);
    // Two transient failures plus the successful attempt.
    assert_eq!(harness.source.fetches.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn concurrency_never_exceeds_the_pool_size() {
    let harness = Harness::new().with_source(|source| {
        source.delay = Duration::from_millis(20);
    });
    let config = fast_config().with_max_concurrent_tasks(2);
    let orchestrator = harness.orchestrator(config);

    let keys: Vec<ItemKey> = (0..8).map(|i| key(&format!("item-{i}"))).collect();
    let report = orchestrator.run(keys).await.unwrap();

    assert_eq!(report.counts.completed, 8);
    assert!(harness.gauge.high_water() <= 2);
}

#[tokio::test]
async fn cancellation_finalizes_a_partial_report() {
    let harness = Harness::new().with_source(|source| {
        source.delay = Duration::from_millis(300);
    });
    let config = fast_config().with_max_concurrent_tasks(1);
    let orchestrator = harness.orchestrator(config);
    let cancel = orchestrator.cancel_handle();

    let keys: Vec<ItemKey> = (0..4).map(|i| key(&format!("item-{i}"))).collect();
    let run = tokio::spawn(async move { orchestrator.run(keys).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let report = run.await.unwrap().unwrap();
    assert!(report.cancelled);
    assert_eq!(report.counts.completed, 0);
    assert_eq!(report.counts.failed, 0);
    // Everything undispatched stays pending and can be resumed later.
    assert_eq!(report.counts.pending, 4);
    assert!(harness.persisted().is_empty());

    // With a pool of one, at most one task held a permit when the run
    // was cancelled; no queued item ever reached a collaborator.
    assert!(harness.source.fetches.load(Ordering::SeqCst) <= 1);
    assert_eq!(harness.parser.parses.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn report_preserves_batch_order() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator(fast_config().with_max_concurrent_tasks(4));

    let keys: Vec<ItemKey> = (0..5).map(|i| key(&format!("item-{i}"))).collect();
    let report = orchestrator.run(keys.clone()).await.unwrap();

    let reported: Vec<ItemKey> = report.items.iter().map(|i| i.key.clone()).collect();
    assert_eq!(reported, keys);
}
