//! Evaluation storage.
//!
//! The dashboard reaches its data only through an explicit
//! [`EvaluationStore`] handle; there is no global client. Ownership
//! filtering happens here, at the store boundary, so the aggregation core
//! only ever sees one owner's records.

mod json_file;

pub use json_file::JsonFileStore;

use crate::error::{DashError, Result};
use crate::models::{EvaluationRecord, NewEvaluation, UserSettings};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;

/// Backing store for evaluation records and per-user settings.
#[async_trait]
pub trait EvaluationStore: Send + Sync {
    /// All records of `user_id` created at or after `since`, in no particular order.
    ///
    /// Records whose timestamp cannot be parsed are returned as well, so
    /// that aggregation can report them instead of losing them.
    async fn evaluations_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<EvaluationRecord>>;

    /// A single record owned by `user_id`.
    async fn evaluation(&self, user_id: &str, id: &str) -> Result<EvaluationRecord>;

    /// Store a validated payload, assigning its id and creation time.
    async fn insert_evaluation(
        &self,
        user_id: &str,
        evaluation: NewEvaluation,
    ) -> Result<EvaluationRecord>;

    /// Settings of `user_id`, or defaults if none were saved.
    async fn settings(&self, user_id: &str) -> Result<UserSettings>;

    /// Insert or replace the settings of `user_id`.
    async fn save_settings(&self, user_id: &str, settings: UserSettings) -> Result<UserSettings>;
}

/// Bound a store call by `limit`.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, call).await.map_err(|_| {
        DashError::Store(format!(
            "store did not respond within {:.1}s",
            limit.as_secs_f64()
        ))
    })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_timeout_passes_through() {
        let value = tokio_test::block_on(with_timeout(Duration::from_secs(1), async { Ok(7) }));
        assert_eq!(value.unwrap(), 7);
    }

    #[test]
    fn test_with_timeout_expires() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        };
        let result: Result<()> =
            tokio_test::block_on(with_timeout(Duration::from_millis(10), slow));
        assert!(matches!(result, Err(DashError::Store(_))));
    }
}
