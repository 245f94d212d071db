//! Query fan-out, dispatch and aggregation.
//!
//! # Pipeline
//!
//! 1. [`FanoutBuilder`] expands a [`SearchRequest`](crate::models::SearchRequest)
//!    into independent [`QuerySpec`]s
//! 2. [`run_search`] dispatches them with bounded concurrency through a
//!    [`QueryDispatcher`], collecting batches as they complete
//! 3. Completed batches are merged into a [`ResultAggregator`] in spec order,
//!    so duplicate IDs resolve deterministically
//! 4. The merge is re-sorted when more than one spec contributed
//!
//! Failed specs are reported next to the results under
//! [`FailurePolicy::BestEffort`]; [`FailurePolicy::FailFast`] stops at the
//! first failure.

mod aggregate;
mod dispatch;
mod fanout;
pub mod mock;

pub use aggregate::{AggregatedResults, ResultAggregator};
pub use dispatch::{
    DispatchOptions, HttpSearchApi, QueryDispatcher, RemoteQueryError, SearchApi, SearchParams,
    SpecBatch,
};
pub use fanout::FanoutBuilder;
pub use mock::MockSearchApi;

use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::DispatchConfig;
use crate::models::{QuerySpec, RawRecord};

/// What to do when a spec fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Keep going and report failures next to the results
    #[default]
    BestEffort,
    /// Abort the search at the first failed spec
    FailFast,
}

/// Options for [`run_search`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Maximum number of specs in flight
    pub max_concurrent: usize,
    pub policy: FailurePolicy,
}

impl RunOptions {
    pub fn from_config(config: &DispatchConfig, policy: FailurePolicy) -> Self {
        Self {
            max_concurrent: config.max_concurrent,
            policy,
        }
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from_config(&DispatchConfig::default(), FailurePolicy::default())
    }
}

/// A spec that did not produce results
#[derive(Debug, Clone, PartialEq)]
pub struct SpecFailure {
    /// Position of the spec in the fan-out
    pub index: usize,
    pub spec: QuerySpec,
    pub error: RemoteQueryError,
}

/// Result of a fan-out search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub results: AggregatedResults,
    pub failures: Vec<SpecFailure>,
    /// Specs dropped by cancellation before completing
    pub cancelled: usize,
    /// Records dropped by the dispatcher for lacking an ID
    pub skipped: usize,
    pub spec_count: usize,
}

impl SearchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.cancelled == 0
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SearchError {
    #[error("Query spec {index} failed: {source}")]
    Remote {
        index: usize,
        #[source]
        source: RemoteQueryError,
    },
}

/// Dispatch every spec and merge the results.
///
/// At most `options.max_concurrent` specs are in flight and batches are
/// collected in completion order, but merged in spec order. Cancelling
/// `cancel` drops the specs still running; every batch completed before that
/// is kept.
pub async fn run_search(
    dispatcher: &QueryDispatcher,
    specs: &[QuerySpec],
    options: &RunOptions,
    cancel: &CancellationToken,
) -> Result<SearchOutcome, SearchError> {
    let spec_count = specs.len();
    let mut pending = std::pin::pin!(stream::iter(specs.iter().enumerate())
        .map(|(index, spec)| async move { (index, dispatcher.dispatch(spec).await) })
        .buffer_unordered(options.max_concurrent.max(1)));

    let mut slots: Vec<Option<Vec<RawRecord>>> = vec![None; spec_count];
    let mut failures = Vec::new();
    let mut skipped = 0;
    let mut completed = 0;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!(completed, spec_count, "search cancelled");
                break;
            }
            next = pending.next() => next,
        };

        let Some((index, result)) = next else {
            break;
        };
        completed += 1;

        match result {
            Ok(batch) => {
                tracing::debug!(index, count = batch.records.len(), "spec returned results");
                skipped += batch.skipped;
                slots[index] = Some(batch.records);
            }
            Err(error) => {
                tracing::warn!(index, error = %error, "query spec failed");
                if options.policy == FailurePolicy::FailFast {
                    return Err(SearchError::Remote {
                        index,
                        source: error,
                    });
                }
                failures.push(SpecFailure {
                    index,
                    spec: specs[index].clone(),
                    error,
                });
            }
        }
    }

    let mut aggregator = ResultAggregator::new();
    for batch in slots.into_iter().flatten() {
        aggregator.insert_batch(batch);
    }
    failures.sort_by_key(|f| f.index);

    let received = aggregator.received();
    let results = aggregator.finish(dispatcher.options().order, spec_count);

    tracing::info!(
        specs = spec_count,
        received,
        merged = results.len(),
        failed = failures.len(),
        skipped,
        "search finished"
    );

    Ok(SearchOutcome {
        results,
        failures,
        cancelled: spec_count - completed,
        skipped,
        spec_count,
    })
}
