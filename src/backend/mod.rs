//! The pluggable storage contract. A `Backend` owns zone and key data and
//! exposes the narrow transaction protocol the update engine drives; it
//! does not know anything about DNS wire format or HTTP.

pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::record::{RecordData, RecordType};

/// Static facts about one zone the service is authoritative for.
#[derive(Debug, Clone)]
pub struct ZoneInfo {
    /// Apex name, no trailing dot, lower-cased.
    pub name: String,
    /// Hostname reported as the SOA `mname` when answering a
    /// zone-discovery query.
    pub hostname: String,
    /// SOA serial, bumped by the backend whenever a transaction commits
    /// with at least one change.
    pub serial: u32,
    /// TTL reported as the SOA `refresh` field.
    pub ttl: u32,
}

/// A TSIG key and the zones it is allowed to update.
#[derive(Debug, Clone)]
pub struct KeyInfo {
    /// Key name, no trailing dot, lower-cased.
    pub name: String,
    /// Shared secret, raw bytes (not base64-encoded).
    pub secret: Vec<u8>,
    /// HMAC algorithm name, e.g. "hmac-sha256".
    pub algorithm: String,
    /// Zones this key authenticates updates for. Empty means "no
    /// restriction" is not implied — a key authenticates only the zones
    /// listed here.
    pub zones: Vec<String>,
}

/// An opaque transaction handle a backend hands back from
/// `transaction_start` and expects back in every later call for that
/// transaction. `None` marks a backend that cannot roll back partial
/// work (see `TxHandle::None` in the design notes); such a backend must
/// still honor commit/rollback calls as no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxId(pub u64);

/// The pluggable storage contract the update engine and both front-ends
/// drive. Implementations are responsible for serializing concurrent
/// access to the same zone; the engine itself issues calls in program
/// order but does not lock anything.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Snapshot of every zone this service is authoritative for, keyed
    /// by apex name.
    async fn get_all_zones(&self) -> Result<HashMap<String, ZoneInfo>>;

    /// Snapshot of every configured key, keyed by key name.
    async fn get_all_keys(&self) -> Result<HashMap<String, KeyInfo>>;

    /// The keys allowed to authenticate updates against `zone`.
    async fn get_keys(&self, zone: &str) -> Result<Vec<KeyInfo>>;

    /// Whether `key_name` is one of the keys bound to `zone`.
    async fn check_key_in_zone(&self, key_name: &str, zone: &str) -> Result<bool>;

    /// Whether `name` is `zone` itself or a subdomain of it.
    async fn is_in_zone(&self, zone: &str, name: &str) -> Result<bool>;

    /// Begin a transaction against `zone`. The backend is responsible
    /// for serializing concurrent transactions on the same zone.
    async fn transaction_start(&self, zone: &str) -> Result<TxId>;

    async fn add_to_rrset(
        &self,
        tx: TxId,
        owner: &str,
        rtype: RecordType,
        ttl: u32,
        data: &RecordData,
    ) -> Result<()>;

    async fn delete_from_rrset(
        &self,
        tx: TxId,
        owner: &str,
        rtype: RecordType,
        data: &RecordData,
    ) -> Result<()>;

    async fn delete_rrset(&self, tx: TxId, owner: &str, rtype: RecordType) -> Result<()>;

    async fn delete_all_rrsets(&self, tx: TxId, owner: &str) -> Result<()>;

    /// Called once, after every operation in the update list has been
    /// applied, if and only if at least one of them actually changed
    /// something (an add of an already-present record, or a delete of
    /// an absent one, does not count as a change).
    async fn notify_changed(&self, tx: TxId, zone: &str) -> Result<()>;

    /// Commit a transaction, making its changes visible.
    async fn transaction_commit(&self, tx: TxId) -> Result<()>;

    /// Roll back a transaction. `silent` is true when nothing in the
    /// transaction actually changed anything, matching the original's
    /// `transaction_rollback(silent=not changes)` — backends may use
    /// this to avoid logging a rollback that was never going to change
    /// the zone's serial anyway.
    async fn transaction_rollback(&self, tx: TxId, silent: bool) -> Result<()>;
}
