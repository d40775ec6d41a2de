//! StorageCleaner.
//!
//! Offloaded bodies are normally left in the bucket after their message is
//! handled (unless `flush_s3` is set). This removes the ones older than a
//! retention window.

use crate::transport::{MAX_DELETE_BATCH, ObjectStore, StoredObject, TransportError};
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum CleanupError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("s3 bucket name cannot be empty")]
    MissingBucket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CleanupReport {
    pub listed: usize,
    pub deleted: usize,
}

pub struct StorageCleaner {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl StorageCleaner {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Keys of objects last modified before `cutoff`.
    ///
    /// Objects without a modification time are kept.
    pub fn expired_keys(objects: &[StoredObject], cutoff: OffsetDateTime) -> Vec<String> {
        objects
            .iter()
            .filter(|object| object.last_modified.is_some_and(|at| at < cutoff))
            .map(|object| object.key.clone())
            .collect()
    }

    /// Delete every object older than `keep_days` days as of `now`.
    pub async fn clean(
        &self,
        keep_days: u32,
        now: OffsetDateTime,
    ) -> Result<CleanupReport, CleanupError> {
        if self.bucket.is_empty() {
            return Err(CleanupError::MissingBucket);
        }

        let cutoff = now - time::Duration::days(i64::from(keep_days));
        let objects = self.store.list(&self.bucket).await?;
        let expired = Self::expired_keys(&objects, cutoff);

        for batch in expired.chunks(MAX_DELETE_BATCH) {
            self.store.delete_many(&self.bucket, batch).await?;
            debug!(bucket = %self.bucket, count = batch.len(), "Deleted expired objects");
        }

        info!(
            bucket = %self.bucket,
            keep_days,
            listed = objects.len(),
            deleted = expired.len(),
            "Cleaned up offloaded message bodies"
        );

        Ok(CleanupReport {
            listed: objects.len(),
            deleted: expired.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InMemoryBroker;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use time::macros::datetime;

    /// Records the size of every batch delete before passing it on.
    struct BatchRecorder {
        broker: InMemoryBroker,
        batches: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl ObjectStore for BatchRecorder {
        async fn put_text(
            &self,
            bucket: &str,
            key: &str,
            body: String,
        ) -> Result<(), TransportError> {
            self.broker.put_text(bucket, key, body).await
        }

        async fn get_text(
            &self,
            bucket: &str,
            key: &str,
        ) -> Result<Option<String>, TransportError> {
            self.broker.get_text(bucket, key).await
        }

        async fn delete(&self, bucket: &str, key: &str) -> Result<(), TransportError> {
            ObjectStore::delete(&self.broker, bucket, key).await
        }

        async fn list(&self, bucket: &str) -> Result<Vec<StoredObject>, TransportError> {
            self.broker.list(bucket).await
        }

        async fn delete_many(&self, bucket: &str, keys: &[String]) -> Result<(), TransportError> {
            self.batches.lock().unwrap().push(keys.len());
            self.broker.delete_many(bucket, keys).await
        }
    }

    #[tokio::test]
    async fn test_deletes_are_batched_by_thousand() {
        let broker = InMemoryBroker::new();
        let now = datetime!(2024-06-10 12:00 UTC);
        for i in 0..2500 {
            let key = format!("old-{i:04}");
            broker.put_object_at("overflow", &key, "x", now - time::Duration::days(10));
        }
        broker.put_object_at("overflow", "recent", "y", now);
        let store = Arc::new(BatchRecorder {
            broker: broker.clone(),
            batches: Mutex::new(Vec::new()),
        });

        let cleaner = StorageCleaner::new(store.clone(), "overflow");
        let report = cleaner.clean(3, now).await.unwrap();

        assert_eq!(report, CleanupReport { listed: 2501, deleted: 2500 });
        assert_eq!(store.batches.lock().unwrap().as_slice(), &[1000, 1000, 500]);
        assert_eq!(broker.object_keys("overflow"), vec!["recent"]);
    }

    #[tokio::test]
    async fn test_clean_removes_only_expired_objects() {
        let broker = InMemoryBroker::new();
        let now = datetime!(2024-06-10 12:00 UTC);
        broker.put_object_at("overflow", "old", "a", now - time::Duration::days(5));
        broker.put_object_at("overflow", "edge", "b", now - time::Duration::hours(71));
        broker.put_object_at("overflow", "new", "c", now - time::Duration::hours(1));

        let cleaner = StorageCleaner::new(Arc::new(broker.clone()), "overflow");
        let report = cleaner.clean(3, now).await.unwrap();

        assert_eq!(report, CleanupReport { listed: 3, deleted: 1 });
        assert_eq!(broker.object_keys("overflow"), vec!["edge", "new"]);
    }

    #[tokio::test]
    async fn test_keep_zero_days_removes_everything_older_than_now() {
        let broker = InMemoryBroker::new();
        let now = datetime!(2024-06-10 12:00 UTC);
        broker.put_object_at("overflow", "a", "a", now - time::Duration::seconds(1));
        broker.put_object_at("overflow", "b", "b", now - time::Duration::days(30));

        let cleaner = StorageCleaner::new(Arc::new(broker.clone()), "overflow");
        let report = cleaner.clean(0, now).await.unwrap();

        assert_eq!(report.deleted, 2);
        assert_eq!(broker.object_count("overflow"), 0);
    }

    #[test]
    fn test_objects_without_timestamp_are_kept() {
        let objects = vec![StoredObject {
            key: "unknown".into(),
            last_modified: None,
        }];
        let cutoff = datetime!(2024-06-10 12:00 UTC);
        assert!(StorageCleaner::expired_keys(&objects, cutoff).is_empty());
    }

    #[tokio::test]
    async fn test_empty_bucket_name_is_rejected() {
        let cleaner = StorageCleaner::new(Arc::new(InMemoryBroker::new()), "");
        let err = cleaner
            .clean(3, datetime!(2024-06-10 12:00 UTC))
            .await
            .unwrap_err();
        assert!(matches!(err, CleanupError::MissingBucket));
    }
}
