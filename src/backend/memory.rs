//! Reference backend: everything lives in memory, guarded by one lock
//! per zone so concurrent transactions against different zones don't
//! block each other, matching spec section 5's "backend responsible for
//! intra-zone serialization" rule.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::backend::{Backend, KeyInfo, TxId, ZoneInfo};
use crate::error::{Error, Result};
use crate::record::{RecordData, RecordType, ResourceRecord};

#[derive(Default)]
struct ZoneData {
    info: ZoneInfo,
    records: Vec<ResourceRecord>,
}

struct Transaction {
    zone: String,
    guard: OwnedMutexGuard<ZoneData>,
    snapshot: Vec<ResourceRecord>,
    changes: u32,
}

pub struct MemoryBackend {
    zones: RwLock<HashMap<String, Arc<Mutex<ZoneData>>>>,
    keys: RwLock<HashMap<String, KeyInfo>>,
    next_tx: AtomicU64,
    transactions: Mutex<HashMap<u64, Transaction>>,
}

impl Default for ZoneData {
    fn default() -> Self {
        Self {
            info: ZoneInfo {
                name: String::new(),
                hostname: String::new(),
                serial: 0,
                ttl: 300,
            },
            records: Vec::new(),
        }
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            zones: RwLock::new(HashMap::new()),
            keys: RwLock::new(HashMap::new()),
            next_tx: AtomicU64::new(1),
            transactions: Mutex::new(HashMap::new()),
        }
    }

    /// Configure a zone this backend is authoritative for. Intended for
    /// startup wiring from config, not for runtime use.
    pub async fn add_zone(&self, info: ZoneInfo) {
        let mut zones = self.zones.write().await;
        zones.insert(
            info.name.clone(),
            Arc::new(Mutex::new(ZoneData {
                info,
                records: Vec::new(),
            })),
        );
    }

    /// Configure a TSIG key. Intended for startup wiring from config.
    pub async fn add_key(&self, key: KeyInfo) {
        let mut keys = self.keys.write().await;
        keys.insert(key.name.clone(), key);
    }

    async fn zone_handle(&self, zone: &str) -> Result<Arc<Mutex<ZoneData>>> {
        let zones = self.zones.read().await;
        zones
            .get(zone)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("unknown zone {zone}")))
    }

    async fn with_tx<F, T>(&self, tx: TxId, f: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction) -> Result<T>,
    {
        let mut transactions = self.transactions.lock().await;
        let transaction = transactions
            .get_mut(&tx.0)
            .ok_or_else(|| Error::internal("unknown transaction id"))?;
        f(transaction)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn get_all_zones(&self) -> Result<HashMap<String, ZoneInfo>> {
        let zones = self.zones.read().await;
        let mut out = HashMap::with_capacity(zones.len());
        for (name, data) in zones.iter() {
            out.insert(name.clone(), data.lock().await.info.clone());
        }
        Ok(out)
    }

    async fn get_all_keys(&self) -> Result<HashMap<String, KeyInfo>> {
        Ok(self.keys.read().await.clone())
    }

    async fn get_keys(&self, zone: &str) -> Result<Vec<KeyInfo>> {
        let keys = self.keys.read().await;
        Ok(keys.values().filter(|k| k.zones.iter().any(|z| z == zone)).cloned().collect())
    }

    async fn check_key_in_zone(&self, key_name: &str, zone: &str) -> Result<bool> {
        let keys = self.keys.read().await;
        Ok(keys.get(key_name).is_some_and(|k| k.zones.iter().any(|z| z == zone)))
    }

    async fn is_in_zone(&self, zone: &str, name: &str) -> Result<bool> {
        let zone = zone.trim_end_matches('.');
        let name = name.trim_end_matches('.');
        Ok(name == zone || name.ends_with(&format!(".{zone}")))
    }

    async fn transaction_start(&self, zone: &str) -> Result<TxId> {
        let handle = self.zone_handle(zone).await?;
        let guard = handle.lock_owned().await;
        let snapshot = guard.records.clone();
        let id = self.next_tx.fetch_add(1, Ordering::Relaxed);
        let mut transactions = self.transactions.lock().await;
        transactions.insert(
            id,
            Transaction {
                zone: zone.to_string(),
                guard,
                snapshot,
                changes: 0,
            },
        );
        Ok(TxId(id))
    }

    async fn add_to_rrset(
        &self,
        tx: TxId,
        owner: &str,
        rtype: RecordType,
        ttl: u32,
        data: &RecordData,
    ) -> Result<()> {
        self.with_tx(tx, |transaction| {
            let already_present = transaction
                .guard
                .records
                .iter()
                .any(|r| r.owner == owner && r.rtype() == rtype && &r.data == data);
            if !already_present {
                transaction.guard.records.push(ResourceRecord {
                    owner: owner.to_string(),
                    ttl,
                    data: data.clone(),
                });
                transaction.changes += 1;
            }
            Ok(())
        })
        .await
    }

    async fn delete_from_rrset(
        &self,
        tx: TxId,
        owner: &str,
        rtype: RecordType,
        data: &RecordData,
    ) -> Result<()> {
        self.with_tx(tx, |transaction| {
            let before = transaction.guard.records.len();
            transaction
                .guard
                .records
                .retain(|r| !(r.owner == owner && r.rtype() == rtype && &r.data == data));
            transaction.changes += (before - transaction.guard.records.len()) as u32;
            Ok(())
        })
        .await
    }

    async fn delete_rrset(&self, tx: TxId, owner: &str, rtype: RecordType) -> Result<()> {
        self.with_tx(tx, |transaction| {
            let before = transaction.guard.records.len();
            transaction.guard.records.retain(|r| !(r.owner == owner && r.rtype() == rtype));
            transaction.changes += (before - transaction.guard.records.len()) as u32;
            Ok(())
        })
        .await
    }

    async fn delete_all_rrsets(&self, tx: TxId, owner: &str) -> Result<()> {
        self.with_tx(tx, |transaction| {
            let before = transaction.guard.records.len();
            transaction.guard.records.retain(|r| r.owner != owner);
            transaction.changes += (before - transaction.guard.records.len()) as u32;
            Ok(())
        })
        .await
    }

    async fn notify_changed(&self, tx: TxId, zone: &str) -> Result<()> {
        log::info!(target: "zone_change", "zone {zone} changed");
        self.with_tx(tx, |_| Ok(()))
    }

    async fn transaction_commit(&self, tx: TxId) -> Result<()> {
        let mut transactions = self.transactions.lock().await;
        let mut transaction = transactions
            .remove(&tx.0)
            .ok_or_else(|| Error::internal("unknown transaction id"))?;
        if transaction.changes > 0 {
            transaction.guard.info.serial = transaction.guard.info.serial.wrapping_add(1);
            log::info!(target: "update", "committed {} change(s) to {}, serial now {}", transaction.changes, transaction.zone, transaction.guard.info.serial);
        }
        Ok(())
    }

    async fn transaction_rollback(&self, tx: TxId, silent: bool) -> Result<()> {
        let mut transactions = self.transactions.lock().await;
        let mut transaction = transactions
            .remove(&tx.0)
            .ok_or_else(|| Error::internal("unknown transaction id"))?;
        transaction.guard.records = transaction.snapshot.clone();
        if !silent {
            log::warn!(target: "update", "rolled back transaction on {}", transaction.zone);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_zone() -> ZoneInfo {
        ZoneInfo {
            name: "example.com".to_string(),
            hostname: "ns1.example.com".to_string(),
            serial: 1,
            ttl: 300,
        }
    }

    #[tokio::test]
    async fn add_then_commit_bumps_serial() {
        let backend = MemoryBackend::new();
        backend.add_zone(test_zone()).await;

        let tx = backend.transaction_start("example.com").await.unwrap();
        backend
            .add_to_rrset(tx, "www.example.com", RecordType::A, 300, &RecordData::A("192.0.2.1".parse().unwrap()))
            .await
            .unwrap();
        backend.notify_changed(tx, "example.com").await.unwrap();
        backend.transaction_commit(tx).await.unwrap();

        let zones = backend.get_all_zones().await.unwrap();
        assert_eq!(zones["example.com"].serial, 2);
    }

    #[tokio::test]
    async fn duplicate_add_is_not_a_change() {
        let backend = MemoryBackend::new();
        backend.add_zone(test_zone()).await;

        let tx = backend.transaction_start("example.com").await.unwrap();
        let data = RecordData::A("192.0.2.1".parse().unwrap());
        backend.add_to_rrset(tx, "www.example.com", RecordType::A, 300, &data).await.unwrap();
        backend.transaction_commit(tx).await.unwrap();

        let tx = backend.transaction_start("example.com").await.unwrap();
        backend.add_to_rrset(tx, "www.example.com", RecordType::A, 300, &data).await.unwrap();
        backend.transaction_rollback(tx, true).await.unwrap();

        let zones = backend.get_all_zones().await.unwrap();
        assert_eq!(zones["example.com"].serial, 2);
    }

    #[tokio::test]
    async fn rollback_reverts_mutations_applied_during_the_transaction() {
        let backend = MemoryBackend::new();
        backend.add_zone(test_zone()).await;

        let tx = backend.transaction_start("example.com").await.unwrap();
        backend
            .add_to_rrset(tx, "www.example.com", RecordType::A, 300, &RecordData::A("192.0.2.1".parse().unwrap()))
            .await
            .unwrap();
        backend.transaction_rollback(tx, false).await.unwrap();

        let handle = backend.zone_handle("example.com").await.unwrap();
        let zone = handle.lock().await;
        assert!(zone.records.is_empty(), "rolled-back mutations must not persist");
        assert_eq!(zone.info.serial, 1);
    }

    #[tokio::test]
    async fn is_in_zone_matches_apex_and_subdomains() {
        let backend = MemoryBackend::new();
        assert!(backend.is_in_zone("example.com", "example.com").await.unwrap());
        assert!(backend.is_in_zone("example.com", "www.example.com").await.unwrap());
        assert!(!backend.is_in_zone("example.com", "example.org").await.unwrap());
        assert!(!backend.is_in_zone("example.com", "notexample.com").await.unwrap());
    }
}
