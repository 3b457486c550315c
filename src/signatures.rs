//! Deduplication ledger of already-processed articles.
//!
//! A [`Signature`] is the SHA-256 of `title + "|" + canonical_url`. The
//! [`SignatureStore`] remembers at most `max_size` of them and evicts in
//! insertion order: an article seen once is never wanted again, so how often
//! a signature is looked up does not matter.
//!
//! The store is safe to share between keyword lanes behind an `Arc`.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::fs;
use tracing::{debug, info, instrument};
use url::Url;

/// Stable digest identifying one article.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    pub fn compute(title: &str, canonical_url: &Url) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(title.as_bytes());
        hasher.update(b"|");
        hasher.update(canonical_url.as_str().as_bytes());
        Signature(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Default)]
struct Ledger {
    order: VecDeque<Signature>,
    members: HashSet<Signature>,
}

/// FIFO-bounded set of [`Signature`]s.
#[derive(Debug)]
pub struct SignatureStore {
    ledger: Mutex<Ledger>,
    max_size: usize,
}

impl SignatureStore {
    /// Empty store. A `max_size` of zero is treated as one.
    pub fn new(max_size: usize) -> Self {
        Self {
            ledger: Mutex::new(Ledger::default()),
            max_size: max_size.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contains(&self, sig: &Signature) -> bool {
        self.lock().members.contains(sig)
    }

    /// Insert `sig`, evicting the oldest entries beyond `max_size`.
    ///
    /// Returns `false` (and changes nothing) if it was already present.
    pub fn add(&self, sig: Signature) -> bool {
        let mut ledger = self.lock();
        if ledger.members.contains(&sig) {
            return false;
        }
        ledger.members.insert(sig.clone());
        ledger.order.push_back(sig);
        while ledger.order.len() > self.max_size {
            if let Some(evicted) = ledger.order.pop_front() {
                ledger.members.remove(&evicted);
                debug!(signature = %evicted.as_str(), "Evicted oldest signature");
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Write all signatures, oldest first, as a JSON array.
    ///
    /// The file is written next to `path` and renamed over it, so a crash
    /// never leaves a truncated ledger behind.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn persist(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let snapshot: Vec<Signature> = self.lock().order.iter().cloned().collect();
        let json = serde_json::to_vec(&snapshot)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, path).await?;
        info!(count = snapshot.len(), "Persisted signature store");
        Ok(())
    }

    /// Load a ledger written by [`persist`](Self::persist).
    ///
    /// A missing file yields an empty store. If the file holds more than
    /// `max_size` entries only the newest are kept.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>, max_size: usize) -> Result<Self, StoreError> {
        let store = Self::new(max_size);
        let raw = match fs::read(path.as_ref()).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No signature store on disk; starting empty");
                return Ok(store);
            }
            Err(e) => return Err(e.into()),
        };
        let signatures: Vec<Signature> = serde_json::from_slice(&raw)?;
        for sig in signatures {
            store.add(sig);
        }
        info!(count = store.len(), "Loaded signature store");
        Ok(store)
    }
}
