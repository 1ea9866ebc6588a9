//! Batch fanout (C8): splits symbols into pool-sized batches, fetches every
//! `(symbol, resolution)` combination within a batch concurrently, and
//! aggregates the results (§4.8).

use std::time::{Duration, Instant};

use chartgate_types::{ChartPayload, ChartRequest, ErrorResponse, GatewayError, Resolution};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

/// The outcome of fetching one `(symbol, resolution)` combination.
#[derive(Debug, Clone)]
pub struct ChartOutcome {
    pub symbol: String,
    pub resolution: Resolution,
    pub result: Result<ChartPayload, ErrorResponse>,
    pub duration: Duration,
}

/// What a batch progress callback receives after each completed batch.
#[derive(Debug, Clone)]
pub struct BatchProgress {
    pub symbols: Vec<String>,
    pub outcomes: Vec<ChartOutcome>,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct BatchResult {
    pub total_charts: usize,
    pub successful_charts: usize,
    pub average_chart_duration: Duration,
    pub outcomes: Vec<ChartOutcome>,
}

/// Fetches every `(symbol, resolution)` pair from `symbols x resolutions`,
/// `batch_size` symbols at a time (default 18, the observed sweet spot for a
/// 5-connection pool, per §4.8). `fetch_one` is the orchestrator's `getChart`
/// (C9), injected so this module doesn't depend on it directly; the
/// orchestrator is single-tenant (§4.9's Open Question resolution), so no
/// credentials are threaded through the fanout, only the shared cancellation
/// signal (§5).
pub async fn run_batch<F, Fut>(
    symbols: &[String],
    resolutions: &[Resolution],
    batch_size: usize,
    cancel: &CancellationToken,
    fetch_one: F,
    mut on_progress: Option<impl FnMut(BatchProgress)>,
) -> BatchResult
where
    F: Fn(ChartRequest, CancellationToken) -> Fut + Clone,
    Fut: std::future::Future<Output = Result<ChartPayload, GatewayError>>,
{
    let mut outcomes = Vec::with_capacity(symbols.len() * resolutions.len());

    for batch in symbols.chunks(batch_size.max(1)) {
        let batch_start = Instant::now();
        let mut futures = Vec::with_capacity(batch.len() * resolutions.len());

        for symbol in batch {
            for resolution in resolutions {
                let request = ChartRequest {
                    symbol: symbol.clone(),
                    resolution: resolution.clone(),
                    bar_count: 300,
                    cvd: None,
                };
                let fetch_one = fetch_one.clone();
                let cancel = cancel.clone();
                let symbol = symbol.clone();
                let resolution = resolution.clone();
                futures.push(async move {
                    let started = Instant::now();
                    let result = fetch_one(request, cancel)
                        .await
                        .map_err(|e| ErrorResponse::from(&e));
                    ChartOutcome {
                        symbol,
                        resolution,
                        result,
                        duration: started.elapsed(),
                    }
                });
            }
        }

        let batch_outcomes = join_all(futures).await;

        if let Some(cb) = on_progress.as_mut() {
            cb(BatchProgress {
                symbols: batch.to_vec(),
                outcomes: batch_outcomes.clone(),
                duration: batch_start.elapsed(),
            });
        }

        outcomes.extend(batch_outcomes);
    }

    let successful_charts = outcomes.iter().filter(|o| o.result.is_ok()).count();
    let total_duration: Duration = outcomes.iter().map(|o| o.duration).sum();
    let average_chart_duration = if outcomes.is_empty() {
        Duration::ZERO
    } else {
        total_duration / outcomes.len() as u32
    };

    BatchResult {
        total_charts: outcomes.len(),
        successful_charts,
        average_chart_duration,
        outcomes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartgate_types::{Indicators, SymbolMetadata};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fake_payload(symbol: &str, resolution: &Resolution) -> ChartPayload {
        ChartPayload {
            symbol: symbol.to_string(),
            resolution: resolution.clone(),
            bars: Vec::new(),
            metadata: SymbolMetadata {
                qualified_symbol: symbol.to_string(),
                tick_size: 0.05,
                price_scale: 100,
                minimum_move: 1.0,
            },
            indicators: Indicators::default(),
        }
    }

    #[tokio::test]
    async fn batches_are_chunked_and_all_pairs_are_covered() {
        let symbols = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let resolutions = vec![Resolution::Daily, Resolution::Weekly];
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = calls.clone();
        let fetch_one = move |request: ChartRequest, _cancel: CancellationToken| {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(fake_payload(&request.symbol, &request.resolution))
            }
        };

        let result = run_batch(
            &symbols,
            &resolutions,
            2,
            &cancel,
            fetch_one,
            None::<fn(BatchProgress)>,
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(result.total_charts, 6);
        assert_eq!(result.successful_charts, 6);
    }

    #[tokio::test]
    async fn failures_are_counted_but_dont_abort_the_batch() {
        let symbols = vec!["A".to_string(), "B".to_string()];
        let resolutions = vec![Resolution::Daily];
        let cancel = CancellationToken::new();

        let fetch_one = |request: ChartRequest, _cancel: CancellationToken| async move {
            if request.symbol == "A" {
                Err(GatewayError::EmptySymbol)
            } else {
                Ok(fake_payload(&request.symbol, &request.resolution))
            }
        };

        let result = run_batch(
            &symbols,
            &resolutions,
            10,
            &cancel,
            fetch_one,
            None::<fn(BatchProgress)>,
        )
        .await;

        assert_eq!(result.total_charts, 2);
        assert_eq!(result.successful_charts, 1);
    }
}
