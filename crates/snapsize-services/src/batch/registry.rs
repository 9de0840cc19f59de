use chrono::{DateTime, Utc};
use snapsize_core::models::Batch;
use snapsize_core::AppError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Exclusive hold on a batch while it is being processed.
#[derive(Debug)]
pub struct BatchLease {
    pub batch: Batch,
    cancelled: Arc<AtomicBool>,
}

impl BatchLease {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Shared flag set by [`BatchRegistry::cancel`] while the batch is in flight.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }
}

#[derive(Debug)]
pub enum CancelOutcome {
    /// The batch was waiting; it is gone and its temporary objects can be deleted.
    Removed(Batch),
    /// The batch is being processed; the pipeline stops at its next checkpoint.
    InFlight,
}

struct InFlight {
    account_id: Uuid,
    cancelled: Arc<AtomicBool>,
}

#[derive(Default)]
struct RegistryState {
    pending: HashMap<String, Batch>,
    in_flight: HashMap<String, InFlight>,
}

/// Batches issued by the upload broker and not yet processed.
///
/// Request-scoped state that must outlive one request: the slot set issued at upload
/// time is the only authority on which keys a later process request may name. Expired
/// batches are dropped lazily on every registration.
#[derive(Default)]
pub struct BatchRegistry {
    state: Mutex<RegistryState>,
}

impl BatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, batch: Batch) {
        let mut state = self.state.lock().await;
        let swept = sweep(&mut state, Utc::now());
        if swept > 0 {
            tracing::debug!(swept, "Expired batches dropped from registry");
        }
        tracing::debug!(batch_id = %batch.batch_id, "Batch registered");
        state.pending.insert(batch.batch_id.clone(), batch);
    }

    /// Take a batch for processing. Only one caller can hold it at a time.
    pub async fn take(
        &self,
        batch_id: &str,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<BatchLease, AppError> {
        let mut state = self.state.lock().await;

        if let Some(in_flight) = state.in_flight.get(batch_id) {
            if in_flight.account_id == account_id {
                return Err(AppError::BadRequest(
                    "Batch is already being processed".to_string(),
                ));
            }
            return Err(not_found(batch_id));
        }

        match state.pending.get(batch_id) {
            Some(batch) if batch.account_id != account_id => return Err(not_found(batch_id)),
            Some(batch) if batch.is_expired(now) => {
                state.pending.remove(batch_id);
                return Err(not_found(batch_id));
            }
            Some(_) => {}
            None => return Err(not_found(batch_id)),
        }

        let batch = state
            .pending
            .remove(batch_id)
            .ok_or_else(|| not_found(batch_id))?;
        let cancelled = Arc::new(AtomicBool::new(false));
        state.in_flight.insert(
            batch_id.to_string(),
            InFlight {
                account_id,
                cancelled: cancelled.clone(),
            },
        );

        Ok(BatchLease { batch, cancelled })
    }

    /// Hand a batch back after a failed run so the client can retry.
    ///
    /// Cancelled or expired batches are dropped instead.
    pub async fn restore(&self, lease: BatchLease, now: DateTime<Utc>) {
        let mut state = self.state.lock().await;
        state.in_flight.remove(&lease.batch.batch_id);
        if lease.is_cancelled() || lease.batch.is_expired(now) {
            tracing::debug!(batch_id = %lease.batch.batch_id, "Batch dropped after failed run");
            return;
        }
        state
            .pending
            .insert(lease.batch.batch_id.clone(), lease.batch);
    }

    /// Forget a batch that finished successfully.
    pub async fn complete(&self, lease: BatchLease) {
        self.state
            .lock()
            .await
            .in_flight
            .remove(&lease.batch.batch_id);
    }

    pub async fn cancel(&self, batch_id: &str, account_id: Uuid) -> Result<CancelOutcome, AppError> {
        let mut state = self.state.lock().await;

        if let Some(in_flight) = state.in_flight.get(batch_id) {
            if in_flight.account_id != account_id {
                return Err(not_found(batch_id));
            }
            in_flight.cancelled.store(true, Ordering::Release);
            return Ok(CancelOutcome::InFlight);
        }

        match state.pending.get(batch_id) {
            Some(batch) if batch.account_id == account_id => state
                .pending
                .remove(batch_id)
                .map(CancelOutcome::Removed)
                .ok_or_else(|| not_found(batch_id)),
            _ => Err(not_found(batch_id)),
        }
    }

    /// Drop every waiting batch whose TTL has elapsed. Returns how many were dropped.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        sweep(&mut *self.state.lock().await, now)
    }

    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.pending.len()
    }
}

fn sweep(state: &mut RegistryState, now: DateTime<Utc>) -> usize {
    let before = state.pending.len();
    state.pending.retain(|_, batch| !batch.is_expired(now));
    before - state.pending.len()
}

fn not_found(batch_id: &str) -> AppError {
    AppError::NotFound(format!("Batch {} not found or expired", batch_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn batch(id: &str, account_id: Uuid, ttl: Duration) -> Batch {
        let now = Utc::now();
        Batch {
            batch_id: id.to_string(),
            account_id,
            slots: Vec::new(),
            created_at: now,
            expires_at: now + ttl,
        }
    }

    #[tokio::test]
    async fn test_take_is_exclusive() {
        let registry = BatchRegistry::new();
        let account = Uuid::new_v4();
        registry
            .register(batch("b1", account, Duration::minutes(5)))
            .await;

        let lease = registry.take("b1", account, Utc::now()).await.unwrap();
        assert!(matches!(
            registry.take("b1", account, Utc::now()).await,
            Err(AppError::BadRequest(_))
        ));

        registry.complete(lease).await;
        assert!(matches!(
            registry.take("b1", account, Utc::now()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_other_account_sees_not_found() {
        let registry = BatchRegistry::new();
        registry
            .register(batch("b1", Uuid::new_v4(), Duration::minutes(5)))
            .await;

        let intruder = Uuid::new_v4();
        assert!(matches!(
            registry.take("b1", intruder, Utc::now()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            registry.cancel("b1", intruder).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(registry.pending_count().await, 1);
    }

    #[tokio::test]
    async fn test_expired_batch_not_taken() {
        let registry = BatchRegistry::new();
        let account = Uuid::new_v4();
        registry
            .register(batch("b1", account, Duration::minutes(5)))
            .await;

        let later = Utc::now() + Duration::minutes(10);
        assert!(matches!(
            registry.take("b1", account, later).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(registry.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_restore_after_failure() {
        let registry = BatchRegistry::new();
        let account = Uuid::new_v4();
        registry
            .register(batch("b1", account, Duration::minutes(5)))
            .await;

        let lease = registry.take("b1", account, Utc::now()).await.unwrap();
        registry.restore(lease, Utc::now()).await;
        assert!(registry.take("b1", account, Utc::now()).await.is_ok());
    }

    #[tokio::test]
    async fn test_cancel_in_flight_flags_lease() {
        let registry = BatchRegistry::new();
        let account = Uuid::new_v4();
        registry
            .register(batch("b1", account, Duration::minutes(5)))
            .await;

        let lease = registry.take("b1", account, Utc::now()).await.unwrap();
        assert!(matches!(
            registry.cancel("b1", account).await,
            Ok(CancelOutcome::InFlight)
        ));
        assert!(lease.is_cancelled());

        // a cancelled batch is not handed back
        registry.restore(lease, Utc::now()).await;
        assert_eq!(registry.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_cancel_pending_removes() {
        let registry = BatchRegistry::new();
        let account = Uuid::new_v4();
        registry
            .register(batch("b1", account, Duration::minutes(5)))
            .await;

        match registry.cancel("b1", account).await.unwrap() {
            CancelOutcome::Removed(batch) => assert_eq!(batch.batch_id, "b1"),
            other => panic!("expected removal, got {:?}", other),
        }
        assert_eq!(registry.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_sweep_expired() {
        let registry = BatchRegistry::new();
        let account = Uuid::new_v4();
        registry
            .register(batch("old", account, Duration::seconds(1)))
            .await;
        registry
            .register(batch("new", account, Duration::hours(1)))
            .await;

        let swept = registry
            .sweep_expired(Utc::now() + Duration::minutes(1))
            .await;
        assert_eq!(swept, 1);
        assert_eq!(registry.pending_count().await, 1);
    }
}
