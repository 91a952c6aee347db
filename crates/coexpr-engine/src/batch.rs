//! Pair ranking and batch processing.
//!
//! Processes one page of candidate pairs strictly sequentially:
//!   1. Emit `processing` for p1, fetch p1
//!   2. Emit `processing` for p2, fetch p2
//!   3. Align tissue and cell-type vectors, combine into a feature bundle
//!   4. Record success, or a pair-scoped error and move on
//!
//! Successful pairs are ranked by combined Pearson correlation. Before every
//! fetch the processor checks whether the progress consumer is still attached
//! and stops early if it is not.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, instrument, warn};

use coexpr_common::config::SimilarityConfig;
use coexpr_common::entities::{EntityPair, EntityProfile};
use coexpr_common::error::{CoexprError, Result};

use crate::combine::{combine, FeatureBundle};
use crate::pair_provider::{PairRequest, PairSource};
use crate::profile_provider::ProfileFetcher;
use crate::vector::align;

/// Buffered progress events per request before the processor waits on the consumer.
pub const PROGRESS_BUFFER: usize = 16;

// ── Results ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct PairProfiles {
    pub p1: EntityProfile,
    pub p2: EntityProfile,
}

#[derive(Debug, Clone, Serialize)]
pub struct PairResult {
    pub pair: EntityPair,
    pub features: FeatureBundle,
    pub profiles: PairProfiles,
}

/// Outcome of one processed page.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageOutcome {
    /// Ranked successes plus any pair-scoped errors. Empty when the page had no pairs.
    Ranked {
        page: usize,
        results: Vec<PairResult>,
        errors: Vec<String>,
        has_more: bool,
    },
    /// Every pair on a non-empty page failed.
    Failed {
        page: usize,
        errors: Vec<String>,
        has_more: bool,
    },
}

impl PageOutcome {
    pub fn page(&self) -> usize {
        match self {
            Self::Ranked { page, .. } | Self::Failed { page, .. } => *page,
        }
    }

    pub fn results(&self) -> &[PairResult] {
        match self {
            Self::Ranked { results, .. } => results,
            Self::Failed { .. } => &[],
        }
    }

    pub fn errors(&self) -> &[String] {
        match self {
            Self::Ranked { errors, .. } | Self::Failed { errors, .. } => errors,
        }
    }

    pub fn has_more(&self) -> bool {
        match self {
            Self::Ranked { has_more, .. } | Self::Failed { has_more, .. } => *has_more,
        }
    }
}

// ── Progress events ──────────────────────────────────────────────────────────

/// Notifications for one request: zero or more `Processing`, then exactly one
/// `Complete` or `Error`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Processing { entity: String },
    Complete { outcome: PageOutcome },
    Error { error: String, details: String },
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing { .. })
    }

    fn fatal(err: &CoexprError) -> Self {
        Self::Error { error: err.kind().to_string(), details: err.details() }
    }
}

// ── Per-pair state machine ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum PairState {
    Pending,
    FetchingP1,
    FetchingP2,
    Combining,
    Succeeded,
    Failed(String),
}

impl PairState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }
}

struct PairTask<'a> {
    pair: &'a EntityPair,
    state: PairState,
}

impl<'a> PairTask<'a> {
    fn new(pair: &'a EntityPair) -> Self {
        Self { pair, state: PairState::Pending }
    }

    fn advance(&mut self, next: PairState) {
        debug_assert!(!self.state.is_terminal(), "pair already reported");
        debug!(pair = %self.pair.label(), from = ?self.state, to = ?next, "Pair state");
        self.state = next;
    }
}

// ── Processor ────────────────────────────────────────────────────────────────

/// Process page `page` (1-based) of `pairs`.
///
/// Pair-scoped failures (`NotFound`, `FetchFailure`) are collected in the
/// outcome's `errors`. Any other fetch error aborts the page and is returned
/// as is. Returns `InvalidInput` for a zero page or page size, and `Cancelled`
/// if `progress` is closed before a fetch.
#[instrument(skip(pairs, fetcher, cfg, progress), fields(total = pairs.len()))]
pub async fn process(
    pairs: &[EntityPair],
    page: usize,
    page_size: usize,
    fetcher: &dyn ProfileFetcher,
    cfg: &SimilarityConfig,
    progress: Option<&mpsc::Sender<ProgressEvent>>,
) -> Result<PageOutcome> {
    if page == 0 {
        return Err(CoexprError::InvalidInput("page numbers start at 1".to_string()));
    }
    if page_size == 0 {
        return Err(CoexprError::InvalidInput("page size must be at least 1".to_string()));
    }

    let slice = page_slice(pairs, page, page_size);
    let has_more = slice.len() == page_size;
    info!(page, page_size, n = slice.len(), has_more, "Processing pair page");

    let mut results = Vec::with_capacity(slice.len());
    let mut errors = Vec::new();

    for pair in slice {
        let mut task = PairTask::new(pair);
        match run_pair(&mut task, fetcher, cfg, progress).await {
            Ok(result) => {
                task.advance(PairState::Succeeded);
                results.push(result);
            }
            Err(CoexprError::Cancelled) => {
                info!(pair = %pair.label(), "Progress consumer gone, stopping early");
                return Err(CoexprError::Cancelled);
            }
            Err(e) if !e.is_pair_scoped() => {
                warn!(pair = %pair.label(), "Collaborator failure aborts the page: {e}");
                return Err(e);
            }
            Err(e) => {
                let msg = format!("pair {} ({} / {}) failed: {e}", pair.label(), pair.p1_name, pair.p2_name);
                warn!("{}", &msg);
                task.advance(PairState::Failed(e.to_string()));
                errors.push(msg);
            }
        }
    }

    if !slice.is_empty() && results.is_empty() {
        return Ok(PageOutcome::Failed { page, errors, has_more });
    }

    rank(&mut results);
    Ok(PageOutcome::Ranked { page, results, errors, has_more })
}

/// Run [`PairRequest::resolve`] and [`process`] on a background task and
/// return its progress as a finite stream. The stream ends after exactly one
/// terminal event, or early if the consumer drops it.
pub fn stream(
    request: PairRequest,
    source: Arc<dyn PairSource>,
    fetcher: Arc<dyn ProfileFetcher>,
    page: usize,
    page_size: usize,
    cfg: SimilarityConfig,
) -> ReceiverStream<ProgressEvent> {
    let (tx, rx) = mpsc::channel(PROGRESS_BUFFER);

    tokio::spawn(async move {
        let pairs = match request.resolve(source.as_ref()).await {
            Ok(pairs) => pairs,
            Err(e) => {
                warn!("Pair request rejected: {e}");
                let _ = tx.send(ProgressEvent::fatal(&e)).await;
                return;
            }
        };

        let terminal = match process(&pairs, page, page_size, fetcher.as_ref(), &cfg, Some(&tx)).await {
            Ok(outcome) => ProgressEvent::Complete { outcome },
            Err(CoexprError::Cancelled) => return,
            Err(e) => ProgressEvent::fatal(&e),
        };
        if tx.send(terminal).await.is_err() {
            debug!("Progress consumer gone before terminal event");
        }
    });

    ReceiverStream::new(rx)
}

fn page_slice(pairs: &[EntityPair], page: usize, page_size: usize) -> &[EntityPair] {
    let start = (page - 1).saturating_mul(page_size);
    if start >= pairs.len() {
        return &[];
    }
    let end = start.saturating_add(page_size).min(pairs.len());
    &pairs[start..end]
}

/// Descending by combined Pearson; stable, so ties keep input order.
fn rank(results: &mut [PairResult]) {
    results.sort_by(|a, b| {
        b.features
            .combined
            .pearson_corr
            .partial_cmp(&a.features.combined.pearson_corr)
            .unwrap_or(Ordering::Equal)
    });
}

async fn run_pair(
    task: &mut PairTask<'_>,
    fetcher: &dyn ProfileFetcher,
    cfg: &SimilarityConfig,
    progress: Option<&mpsc::Sender<ProgressEvent>>,
) -> Result<PairResult> {
    let pair = task.pair;

    task.advance(PairState::FetchingP1);
    let p1 = fetch_with_progress(&pair.p1_id, fetcher, progress).await?;

    task.advance(PairState::FetchingP2);
    let p2 = fetch_with_progress(&pair.p2_id, fetcher, progress).await?;

    task.advance(PairState::Combining);
    let tissue = align(&p1.tissue, &p2.tissue, None)?;
    let cell = align(&p1.cell, &p2.cell, None)?;
    let features = combine(&tissue, &cell, cfg);

    let mut pair = pair.clone();
    if pair.p1_name.is_empty() || pair.p1_name == pair.p1_id {
        pair.p1_name = p1.display_name.clone();
    }
    if pair.p2_name.is_empty() || pair.p2_name == pair.p2_id {
        pair.p2_name = p2.display_name.clone();
    }

    Ok(PairResult { pair, features, profiles: PairProfiles { p1, p2 } })
}

async fn fetch_with_progress(
    entity: &str,
    fetcher: &dyn ProfileFetcher,
    progress: Option<&mpsc::Sender<ProgressEvent>>,
) -> Result<EntityProfile> {
    if let Some(tx) = progress {
        if tx.is_closed() {
            return Err(CoexprError::Cancelled);
        }
        tx.send(ProgressEvent::Processing { entity: entity.to_string() })
            .await
            .map_err(|_| CoexprError::Cancelled)?;
    }
    fetcher.fetch(entity).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile_provider::MockProfileFetcher;

    fn pairs(n: usize) -> Vec<EntityPair> {
        (0..n).map(|i| EntityPair::from_ids(&format!("L{i}"), &format!("R{i}"))).collect()
    }

    #[test]
    fn test_page_slice_bounds() {
        let all = pairs(120);
        assert_eq!(page_slice(&all, 1, 50).len(), 50);
        assert_eq!(page_slice(&all, 3, 50).len(), 20);
        assert_eq!(page_slice(&all, 3, 50)[0].p1_id, "L100");
        assert!(page_slice(&all, 4, 50).is_empty());
        assert!(page_slice(&all, usize::MAX, usize::MAX).is_empty());
    }

    #[test]
    fn test_state_terminality() {
        assert!(!PairState::Combining.is_terminal());
        assert!(PairState::Succeeded.is_terminal());
        assert!(PairState::Failed("x".into()).is_terminal());
    }

    #[tokio::test]
    async fn test_invalid_page_rejected() {
        let mock = MockProfileFetcher::new();
        let cfg = SimilarityConfig::default();
        let err = process(&pairs(3), 0, 10, &mock, &cfg, None).await.unwrap_err();
        assert!(matches!(err, CoexprError::InvalidInput(_)));
        let err = process(&pairs(3), 1, 0, &mock, &cfg, None).await.unwrap_err();
        assert!(matches!(err, CoexprError::InvalidInput(_)));
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_page_is_ranked_not_failed() {
        let mock = MockProfileFetcher::new();
        let outcome = process(&pairs(3), 2, 10, &mock, &SimilarityConfig::default(), None)
            .await
            .unwrap();
        assert!(matches!(outcome, PageOutcome::Ranked { ref results, .. } if results.is_empty()));
        assert!(!outcome.has_more());
    }

    #[tokio::test]
    async fn test_all_failures_return_errors_only() {
        let mock = MockProfileFetcher::new().failing("L0", "timeout");
        let outcome = process(&pairs(2), 1, 10, &mock, &SimilarityConfig::default(), None)
            .await
            .unwrap();
        match outcome {
            PageOutcome::Failed { errors, .. } => {
                assert_eq!(errors.len(), 2);
                assert!(errors[0].contains("L0–R0"));
                assert!(errors[0].contains("timeout"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_closed_consumer_stops_before_fetch() {
        let mock = MockProfileFetcher::new().with("L0", &[("liver", 1.0)], &[]);
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let err = process(&pairs(5), 1, 5, &mock, &SimilarityConfig::default(), Some(&tx))
            .await
            .unwrap_err();
        assert!(matches!(err, CoexprError::Cancelled));
        assert_eq!(mock.calls(), 0);
    }

    struct OfflineStore;

    #[async_trait::async_trait]
    impl ProfileFetcher for OfflineStore {
        async fn fetch(&self, _entity: &str) -> Result<EntityProfile> {
            Err(CoexprError::Source("observation store offline".into()))
        }
    }

    #[tokio::test]
    async fn test_unreachable_store_aborts_page() {
        let err = process(&pairs(2), 1, 10, &OfflineStore, &SimilarityConfig::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoexprError::Source(ref msg) if msg.contains("offline")));
    }

    #[tokio::test]
    async fn test_unreachable_store_streams_single_error() {
        use tokio_stream::StreamExt;

        let request = PairRequest {
            mode: Some("compare".into()),
            genes1: Some("EGF,TGFA".into()),
            genes2: Some("EGFR".into()),
            ..Default::default()
        };
        let source: Arc<dyn PairSource> = Arc::new(crate::pair_provider::CuratedPairs::default());
        let events: Vec<ProgressEvent> =
            stream(request, source, Arc::new(OfflineStore), 1, 10, SimilarityConfig::default())
                .collect()
                .await;

        // one processing event for the first fetch, then the fatal error
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ProgressEvent::Processing { ref entity } if entity == "EGF"));
        match &events[1] {
            ProgressEvent::Error { error, details } => {
                assert_eq!(error, "source_unavailable");
                assert!(details.contains("offline"));
            }
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[test]
    fn test_event_serialization() {
        let ev = ProgressEvent::Processing { entity: "EGF".into() };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "processing");
        assert_eq!(json["entity"], "EGF");

        let done = ProgressEvent::Complete {
            outcome: PageOutcome::Failed { page: 2, errors: vec!["e".into()], has_more: false },
        };
        let json = serde_json::to_value(&done).unwrap();
        assert_eq!(json["type"], "complete");
        assert_eq!(json["outcome"]["status"], "failed");
        assert_eq!(json["outcome"]["page"], 2);
        assert!(done.is_terminal());
    }
}
