// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Durable Work Queue
//!
//! SQLite-backed queue of pipeline step units in the central database. Each
//! unit carries `(tenant_id, job_id, step_index, attempt)` - tenant identity
//! is a first-class field of the payload, never ambient, so workers can
//! rebind context before touching any tenant data.
//!
//! Claiming is a conditional UPDATE on the oldest available row: exactly
//! one of two racing workers observes the row flip to `leased`. A leased
//! unit that is neither acked nor nacked before its lease expires is
//! reaped back to `queued`, which is what makes worker crashes survivable.

use std::time::Duration;

use sqlx::{Row, SqlitePool};
use tracing::debug;

use docuflow_domain::{EngineError, JobId, TenantId};

use crate::infrastructure::repositories::row;

/// Cap on exponential backoff between retries.
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Exponential backoff for a given attempt number: `2^attempt` seconds,
/// capped at five minutes.
pub fn backoff_delay(attempt: i64) -> Duration {
    let exponent = attempt.clamp(0, 16) as u32;
    let delay = Duration::from_secs(2u64.saturating_pow(exponent));
    delay.min(MAX_BACKOFF)
}

/// One claimed unit of pipeline work.
#[derive(Debug, Clone)]
pub struct WorkUnit {
    pub id: i64,
    pub tenant_id: TenantId,
    pub job_id: JobId,
    pub step_index: i64,
    pub attempt: i64,
}

/// Durable queue over the central database.
pub struct WorkQueue {
    pool: SqlitePool,
    lease: Duration,
}

impl WorkQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            lease: Duration::from_secs(120),
        }
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// Enqueues a step unit, visible after `delay`.
    pub async fn enqueue(
        &self,
        tenant_id: TenantId,
        job_id: JobId,
        step_index: i64,
        attempt: i64,
        delay: Duration,
    ) -> Result<(), EngineError> {
        let now = chrono::Utc::now();
        let available_at = now + chrono::Duration::from_std(delay).unwrap_or_default();
        sqlx::query(
            "INSERT INTO work_queue (tenant_id, job_id, step_index, attempt, state, available_at, created_at) \
             VALUES (?, ?, ?, ?, 'queued', ?, ?)",
        )
        .bind(tenant_id.to_string())
        .bind(job_id.to_string())
        .bind(step_index)
        .bind(attempt)
        .bind(row::fmt_ts(&available_at))
        .bind(row::fmt_ts(&now))
        .execute(&self.pool)
        .await
        .map_err(|e| row::db_err("enqueue work unit", e))?;
        debug!(job_id = %job_id, step_index, attempt, "Work unit enqueued");
        Ok(())
    }

    /// Claims the oldest available unit, if any. The conditional update is
    /// the single-writer guarantee: one claimer wins, the rest see nothing.
    pub async fn claim(&self) -> Result<Option<WorkUnit>, EngineError> {
        let now = chrono::Utc::now();
        let lease_until = now + chrono::Duration::from_std(self.lease).unwrap_or_default();
        let claimed = sqlx::query(
            "UPDATE work_queue SET state = 'leased', lease_expires_at = ? \
             WHERE id = ( \
                 SELECT id FROM work_queue WHERE state = 'queued' AND available_at <= ? \
                 ORDER BY id LIMIT 1 \
             ) AND state = 'queued' \
             RETURNING id, tenant_id, job_id, step_index, attempt",
        )
        .bind(row::fmt_ts(&lease_until))
        .bind(row::fmt_ts(&now))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| row::db_err("claim work unit", e))?;

        claimed
            .map(|r| {
                Ok(WorkUnit {
                    id: r.get("id"),
                    tenant_id: row::parse_id(&r.get::<String, _>("tenant_id"))?,
                    job_id: row::parse_id(&r.get::<String, _>("job_id"))?,
                    step_index: r.get("step_index"),
                    attempt: r.get("attempt"),
                })
            })
            .transpose()
    }

    /// Acknowledges a completed unit.
    pub async fn ack(&self, unit_id: i64) -> Result<(), EngineError> {
        sqlx::query("UPDATE work_queue SET state = 'done' WHERE id = ?")
            .bind(unit_id)
            .execute(&self.pool)
            .await
            .map_err(|e| row::db_err("ack work unit", e))?;
        Ok(())
    }

    /// Returns a failed unit to the queue after `delay`.
    pub async fn nack(&self, unit_id: i64, delay: Duration) -> Result<(), EngineError> {
        let available_at =
            chrono::Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
        sqlx::query(
            "UPDATE work_queue SET state = 'queued', lease_expires_at = NULL, available_at = ? \
             WHERE id = ?",
        )
        .bind(row::fmt_ts(&available_at))
        .bind(unit_id)
        .execute(&self.pool)
        .await
        .map_err(|e| row::db_err("nack work unit", e))?;
        Ok(())
    }

    /// Drops a unit without processing (suspended tenant, cancelled job).
    pub async fn discard(&self, unit_id: i64) -> Result<(), EngineError> {
        sqlx::query("UPDATE work_queue SET state = 'dead' WHERE id = ?")
            .bind(unit_id)
            .execute(&self.pool)
            .await
            .map_err(|e| row::db_err("discard work unit", e))?;
        Ok(())
    }

    /// Requeues leased units whose lease expired (crashed worker).
    pub async fn reap_expired(&self) -> Result<u64, EngineError> {
        let now = row::fmt_ts(&chrono::Utc::now());
        let result = sqlx::query(
            "UPDATE work_queue SET state = 'queued', lease_expires_at = NULL \
             WHERE state = 'leased' AND lease_expires_at < ?",
        )
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| row::db_err("reap expired leases", e))?;
        Ok(result.rows_affected())
    }

    /// Number of units waiting to be claimed.
    pub async fn depth(&self) -> Result<i64, EngineError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM work_queue WHERE state = 'queued'")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| row::db_err("queue depth", e))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::schema;

    async fn queue() -> (tempfile::TempDir, WorkQueue) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/central.db", dir.path().display());
        schema::create_database_if_missing(&url).await.unwrap();
        let pool = SqlitePool::connect(&url).await.unwrap();
        schema::ensure_central_schema(&pool).await.unwrap();
        (dir, WorkQueue::new(pool))
    }

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(2), Duration::from_secs(4));
        assert_eq!(backoff_delay(3), Duration::from_secs(8));
        assert_eq!(backoff_delay(20), MAX_BACKOFF);
    }

    proptest::proptest! {
        #[test]
        fn backoff_is_bounded_and_monotone_for_any_attempt(attempt in proptest::prelude::any::<i64>()) {
            let delay = backoff_delay(attempt);
            proptest::prop_assert!(delay >= Duration::from_secs(1));
            proptest::prop_assert!(delay <= MAX_BACKOFF);
            proptest::prop_assert!(backoff_delay(attempt.saturating_add(1)) >= delay);
        }
    }

    #[tokio::test]
    async fn claim_is_exclusive_and_fifo() {
        let (_dir, queue) = queue().await;
        let tenant = TenantId::new();
        let first_job = JobId::new();
        let second_job = JobId::new();
        queue
            .enqueue(tenant, first_job, 0, 1, Duration::ZERO)
            .await
            .unwrap();
        queue
            .enqueue(tenant, second_job, 0, 1, Duration::ZERO)
            .await
            .unwrap();

        let a = queue.claim().await.unwrap().unwrap();
        assert_eq!(a.job_id, first_job);
        let b = queue.claim().await.unwrap().unwrap();
        assert_eq!(b.job_id, second_job);
        assert!(queue.claim().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delayed_units_are_invisible_until_due() {
        let (_dir, queue) = queue().await;
        queue
            .enqueue(TenantId::new(), JobId::new(), 0, 2, Duration::from_secs(3600))
            .await
            .unwrap();
        assert!(queue.claim().await.unwrap().is_none());
        assert_eq!(queue.depth().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn nack_returns_the_unit_and_ack_retires_it() {
        let (_dir, queue) = queue().await;
        queue
            .enqueue(TenantId::new(), JobId::new(), 0, 1, Duration::ZERO)
            .await
            .unwrap();

        let unit = queue.claim().await.unwrap().unwrap();
        queue.nack(unit.id, Duration::ZERO).await.unwrap();
        let again = queue.claim().await.unwrap().unwrap();
        assert_eq!(again.id, unit.id);
        queue.ack(again.id).await.unwrap();
        assert!(queue.claim().await.unwrap().is_none());
        assert_eq!(queue.depth().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn expired_leases_are_reaped() {
        let (_dir, queue) = queue().await;
        let queue = WorkQueue {
            lease: Duration::ZERO,
            ..queue
        };
        queue
            .enqueue(TenantId::new(), JobId::new(), 0, 1, Duration::ZERO)
            .await
            .unwrap();
        let _unit = queue.claim().await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(queue.reap_expired().await.unwrap(), 1);
        assert!(queue.claim().await.unwrap().is_some());
    }
}
