//! Server-Sent Events (SSE) streaming of pair processing progress.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::Stream;
use tokio_stream::StreamExt;

use coexpr_engine::batch;
use coexpr_engine::pair_provider::PairSource;
use coexpr_engine::profile_provider::ProfileFetcher;

use crate::handlers::pairs::PairQuery;
use crate::state::SharedState;

/// GET /api/pairs/stream: one `processing` event per fetched entity, then one
/// `complete` or `error` event. Dropping the connection stops the processor
/// before its next fetch.
pub async fn pairs_stream(
    State(state): State<SharedState>,
    Query(query): Query<PairQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let page_size = query.page_size.unwrap_or(state.config.batch.page_size);
    let source: Arc<dyn PairSource> = state.pairs.clone();
    let fetcher: Arc<dyn ProfileFetcher> = state.store.clone();

    let stream = batch::stream(
        query.request(),
        source,
        fetcher,
        query.page.unwrap_or(1),
        page_size,
        state.config.similarity.clone(),
    )
    .filter_map(|event| {
        serde_json::to_string(&event).ok().map(|data| {
            Ok(Event::default().data(data))
        })
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
