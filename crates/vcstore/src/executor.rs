use futures::stream::{self, StreamExt};
use std::future::Future;
use vcstore_core::{StoreError, StoreResult};

/// Default number of sub-queries allowed in flight at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Runs independent lookups with bounded concurrency and concatenates their
/// results in input order.
///
/// Every lookup runs to completion even if an earlier one fails; the first
/// failure in input order is returned and no partial result is produced.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrentExecutor {
    limit: usize,
}

impl Default for ConcurrentExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

impl ConcurrentExecutor {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub async fn run<'a, J, R, F, Fut>(&self, jobs: &'a [J], lookup: F) -> StoreResult<Vec<R>>
    where
        F: Fn(usize, &'a J) -> Fut,
        Fut: Future<Output = StoreResult<Vec<R>>>,
    {
        // `buffered` yields in input order while keeping `limit` futures live
        let outcomes: Vec<StoreResult<Vec<R>>> = stream::iter(jobs.iter().enumerate())
            .map(|(index, job)| lookup(index, job))
            .buffered(self.limit)
            .collect()
            .await;

        let failures = outcomes.iter().filter(|o| o.is_err()).count();
        let mut results = Vec::new();
        let mut first_error: Option<StoreError> = None;
        for outcome in outcomes {
            match outcome {
                Ok(batch) => results.extend(batch),
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            tracing::warn!(jobs = jobs.len(), failures, error = %e, "lookup batch failed");
            return Err(e);
        }
        Ok(results)
    }
}
