//! Bridges the `Backend::get_all_keys()` snapshot to `domain::tsig`'s
//! key-store contract. The original builds a fresh `dns.tsigkeyring`
//! from `backend.get_all_keys()` on every request
//! (`dns_updates.handle_nsupdate`); we do the same, since keys can
//! change between requests and the ring is cheap to rebuild.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use domain::base::name::ToName;
use domain::tsig::{Algorithm, Key, KeyName};

use crate::backend::KeyInfo;
use crate::error::{Error, Result};

/// An in-memory ring of TSIG keys built from one backend snapshot,
/// implementing `domain::tsig::KeyStore` so it can be handed straight to
/// `ServerTransaction::request`/`ServerSequence`.
pub struct KeyRing {
    keys: HashMap<KeyName, Arc<Key>>,
}

impl KeyRing {
    /// Build a ring from a backend snapshot. Keys with a name or
    /// algorithm we can't parse are skipped and logged, not fatal: one
    /// bad key in the config shouldn't take down every other key.
    pub fn from_keys(keys: HashMap<String, KeyInfo>) -> Self {
        let mut ring = HashMap::with_capacity(keys.len());
        for (name, info) in keys {
            match build_key(&info) {
                Ok(key) => {
                    ring.insert(key.name().to_owned(), Arc::new(key));
                }
                Err(e) => {
                    log::warn!(target: "tsig", "skipping key {name}: {e}");
                }
            }
        }
        Self { keys: ring }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn build_key(info: &KeyInfo) -> Result<Key> {
    let name = KeyName::from_str(&info.name).map_err(|e| Error::internal(format!("invalid key name: {e}")))?;
    let algorithm = parse_algorithm(&info.algorithm)?;
    Key::new(algorithm, &info.secret, name, None, None)
        .map_err(|e| Error::internal(format!("invalid tsig secret for {}: {e}", info.name)))
}

fn parse_algorithm(name: &str) -> Result<Algorithm> {
    match name.to_ascii_lowercase().as_str() {
        "hmac-sha1" => Ok(Algorithm::Sha1),
        "hmac-sha256" => Ok(Algorithm::Sha256),
        "hmac-sha384" => Ok(Algorithm::Sha384),
        "hmac-sha512" => Ok(Algorithm::Sha512),
        other => Err(Error::internal(format!("unsupported tsig algorithm {other}"))),
    }
}

impl domain::tsig::KeyStore for KeyRing {
    type Key = Arc<Key>;

    fn get_key<N: ToName>(&self, name: &N, algorithm: Algorithm) -> Option<Self::Key> {
        let key = self.keys.get(&name.try_to_name().ok()?)?;
        if key.algorithm() == algorithm {
            Some(key.clone())
        } else {
            None
        }
    }
}
