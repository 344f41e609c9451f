//! The update engine: the six-step pipeline every authenticated,
//! validated update list goes through, shared by the DNS and HTTP
//! front-ends. Grounded on `original_source/duppy/dns_updates.py`'s
//! `handle_nsupdate` update branch: start a transaction, apply each op
//! in order, stop at the first failure, notify only if something
//! actually changed, then commit or roll back.

use std::sync::Arc;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::record::UpdateOp;

pub struct UpdateEngine {
    backend: Arc<dyn Backend>,
    minimum_ttl: u32,
}

/// Outcome of a successful run: how many operations in the list actually
/// changed something. Zero means the update was accepted but was a
/// no-op (e.g. re-adding a record that was already there).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub op_count: usize,
}

impl UpdateEngine {
    pub fn new(backend: Arc<dyn Backend>, minimum_ttl: u32) -> Self {
        Self { backend, minimum_ttl }
    }

    /// Validate every operation in `ops` against `zone`, then apply them
    /// in a single transaction. Validation failures and backend failures
    /// both cause the whole list to be rejected and any transaction
    /// already started to be rolled back; no partial set of operations
    /// is ever left committed.
    pub async fn apply(&self, zone: &str, ops: &[UpdateOp]) -> Result<Applied> {
        for op in ops {
            self.validate(zone, op).await?;
        }

        let tx = self.backend.transaction_start(zone).await?;

        let result = self.apply_ops(zone, tx, ops).await;

        match result {
            Ok(applied) => match self.finish(tx, zone, applied).await {
                Ok(()) => Ok(applied),
                Err(e) => {
                    self.backend.transaction_rollback(tx, applied.op_count == 0).await.ok();
                    Err(e)
                }
            },
            Err(e) => {
                self.backend.transaction_rollback(tx, false).await.ok();
                Err(e)
            }
        }
    }

    /// Notify-then-commit, per spec section 4.3: a failure in either step
    /// fails the whole batch and must not leave the transaction open.
    async fn finish(&self, tx: crate::backend::TxId, zone: &str, applied: Applied) -> Result<()> {
        if applied.op_count > 0 {
            self.backend.notify_changed(tx, zone).await?;
        }
        self.backend.transaction_commit(tx).await
    }

    async fn apply_ops(&self, zone: &str, tx: crate::backend::TxId, ops: &[UpdateOp]) -> Result<Applied> {
        let mut changes = 0usize;
        for op in ops {
            match op {
                UpdateOp::AddToRRset { owner, rtype, ttl, data } => {
                    self.backend.add_to_rrset(tx, owner, *rtype, *ttl, data).await?;
                }
                UpdateOp::DeleteFromRRset { owner, rtype, data } => {
                    self.backend.delete_from_rrset(tx, owner, *rtype, data).await?;
                }
                UpdateOp::DeleteRRset { owner, rtype } => {
                    self.backend.delete_rrset(tx, owner, *rtype).await?;
                }
                UpdateOp::DeleteAllRRsets { owner } => {
                    self.backend.delete_all_rrsets(tx, owner).await?;
                }
            }
            changes += 1;
        }
        let _ = zone;
        Ok(Applied { op_count: changes })
    }

    /// Invariants 1-4 from the data model: every owner must be in the
    /// target zone, additions must meet the minimum TTL, deletions must
    /// carry ttl == 0 (enforced by construction upstream, re-checked
    /// here), and the zone apex itself can't be wiped with a
    /// delete-all-rrsets.
    async fn validate(&self, zone: &str, op: &UpdateOp) -> Result<()> {
        let owner = op.owner();
        if !self.backend.is_in_zone(zone, owner).await? {
            return Err(Error::policy_rejected(format!("{owner} is not in zone {zone}")));
        }

        match op {
            UpdateOp::AddToRRset { ttl, .. } => {
                if *ttl < self.minimum_ttl {
                    return Err(Error::policy_rejected(format!("TTL is too low, {ttl} < {}", self.minimum_ttl)));
                }
            }
            UpdateOp::DeleteAllRRsets { owner } => {
                if owner.trim_end_matches('.') == zone.trim_end_matches('.') {
                    return Err(Error::policy_rejected(format!("refusing to delete entire zone {zone}")));
                }
            }
            _ => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::backend::{KeyInfo, TxId, ZoneInfo};
    use crate::record::{RecordData, RecordType};
    use std::collections::HashMap;

    /// Wraps a real backend but fails every commit, to exercise the
    /// engine's "commit failure fails the batch" path (spec section 4.3)
    /// without needing a backend that can fail mid-apply.
    struct FailingCommitBackend(Arc<MemoryBackend>);

    #[async_trait::async_trait]
    impl crate::backend::Backend for FailingCommitBackend {
        async fn get_all_zones(&self) -> Result<HashMap<String, ZoneInfo>> {
            self.0.get_all_zones().await
        }
        async fn get_all_keys(&self) -> Result<HashMap<String, KeyInfo>> {
            self.0.get_all_keys().await
        }
        async fn get_keys(&self, zone: &str) -> Result<Vec<KeyInfo>> {
            self.0.get_keys(zone).await
        }
        async fn check_key_in_zone(&self, key_name: &str, zone: &str) -> Result<bool> {
            self.0.check_key_in_zone(key_name, zone).await
        }
        async fn is_in_zone(&self, zone: &str, name: &str) -> Result<bool> {
            self.0.is_in_zone(zone, name).await
        }
        async fn transaction_start(&self, zone: &str) -> Result<TxId> {
            self.0.transaction_start(zone).await
        }
        async fn add_to_rrset(&self, tx: TxId, owner: &str, rtype: RecordType, ttl: u32, data: &RecordData) -> Result<()> {
            self.0.add_to_rrset(tx, owner, rtype, ttl, data).await
        }
        async fn delete_from_rrset(&self, tx: TxId, owner: &str, rtype: RecordType, data: &RecordData) -> Result<()> {
            self.0.delete_from_rrset(tx, owner, rtype, data).await
        }
        async fn delete_rrset(&self, tx: TxId, owner: &str, rtype: RecordType) -> Result<()> {
            self.0.delete_rrset(tx, owner, rtype).await
        }
        async fn delete_all_rrsets(&self, tx: TxId, owner: &str) -> Result<()> {
            self.0.delete_all_rrsets(tx, owner).await
        }
        async fn notify_changed(&self, tx: TxId, zone: &str) -> Result<()> {
            self.0.notify_changed(tx, zone).await
        }
        async fn transaction_commit(&self, _tx: TxId) -> Result<()> {
            Err(Error::backend_failure("simulated commit failure"))
        }
        async fn transaction_rollback(&self, tx: TxId, silent: bool) -> Result<()> {
            self.0.transaction_rollback(tx, silent).await
        }
    }

    async fn engine_with_zone() -> (UpdateEngine, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .add_zone(ZoneInfo {
                name: "example.com".to_string(),
                hostname: "ns1.example.com".to_string(),
                serial: 1,
                ttl: 300,
            })
            .await;
        let engine = UpdateEngine::new(backend.clone(), 120);
        (engine, backend)
    }

    #[tokio::test]
    async fn add_within_zone_succeeds() {
        let (engine, backend) = engine_with_zone().await;
        let ops = vec![UpdateOp::AddToRRset {
            owner: "www.example.com".to_string(),
            rtype: RecordType::A,
            ttl: 300,
            data: RecordData::A("192.0.2.1".parse().unwrap()),
        }];
        let applied = engine.apply("example.com", &ops).await.unwrap();
        assert_eq!(applied.op_count, 1);
        let zones = backend.get_all_zones().await.unwrap();
        assert_eq!(zones["example.com"].serial, 2);
    }

    #[tokio::test]
    async fn out_of_zone_owner_is_rejected() {
        let (engine, backend) = engine_with_zone().await;
        let ops = vec![UpdateOp::AddToRRset {
            owner: "www.example.org".to_string(),
            rtype: RecordType::A,
            ttl: 300,
            data: RecordData::A("192.0.2.1".parse().unwrap()),
        }];
        let err = engine.apply("example.com", &ops).await.unwrap_err();
        assert!(matches!(err, Error::PolicyRejected(_)));
        let zones = backend.get_all_zones().await.unwrap();
        assert_eq!(zones["example.com"].serial, 1, "rejected update must not bump the serial");
    }

    #[tokio::test]
    async fn ttl_below_minimum_is_rejected() {
        let (engine, _backend) = engine_with_zone().await;
        let ops = vec![UpdateOp::AddToRRset {
            owner: "www.example.com".to_string(),
            rtype: RecordType::A,
            ttl: 10,
            data: RecordData::A("192.0.2.1".parse().unwrap()),
        }];
        assert!(engine.apply("example.com", &ops).await.is_err());
    }

    #[tokio::test]
    async fn delete_all_rrsets_at_apex_is_rejected() {
        let (engine, _backend) = engine_with_zone().await;
        let ops = vec![UpdateOp::DeleteAllRRsets { owner: "example.com".to_string() }];
        assert!(engine.apply("example.com", &ops).await.is_err());
    }

    #[tokio::test]
    async fn commit_failure_rolls_back_and_does_not_leave_the_transaction_open() {
        let inner = Arc::new(MemoryBackend::new());
        inner
            .add_zone(ZoneInfo {
                name: "example.com".to_string(),
                hostname: "ns1.example.com".to_string(),
                serial: 1,
                ttl: 300,
            })
            .await;
        let backend: Arc<dyn crate::backend::Backend> = Arc::new(FailingCommitBackend(inner.clone()));
        let engine = UpdateEngine::new(backend, 120);

        let ops = vec![UpdateOp::AddToRRset {
            owner: "www.example.com".to_string(),
            rtype: RecordType::A,
            ttl: 300,
            data: RecordData::A("192.0.2.1".parse().unwrap()),
        }];
        let err = engine.apply("example.com", &ops).await.unwrap_err();
        assert!(matches!(err, Error::BackendFailure(_)));

        // the transaction must have been rolled back, not left dangling,
        // so a fresh transaction against the same zone can still proceed.
        let tx = inner.transaction_start("example.com").await.unwrap();
        inner.transaction_rollback(tx, true).await.unwrap();
        let zones = inner.get_all_zones().await.unwrap();
        assert_eq!(zones["example.com"].serial, 1, "failed commit must not bump the serial");
    }

    #[tokio::test]
    async fn a_rejected_op_rolls_back_earlier_ops_in_the_same_list() {
        let (engine, backend) = engine_with_zone().await;
        let ops = vec![
            UpdateOp::AddToRRset {
                owner: "www.example.com".to_string(),
                rtype: RecordType::A,
                ttl: 300,
                data: RecordData::A("192.0.2.1".parse().unwrap()),
            },
            UpdateOp::AddToRRset {
                owner: "www.example.org".to_string(),
                rtype: RecordType::A,
                ttl: 300,
                data: RecordData::A("192.0.2.2".parse().unwrap()),
            },
        ];
        assert!(engine.apply("example.com", &ops).await.is_err());
        let zones = backend.get_all_zones().await.unwrap();
        assert_eq!(zones["example.com"].serial, 1, "no op in the list should have been committed");
    }
}
