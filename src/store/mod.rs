//! Durable storage for per-chain snapshots and mutes.
//!
//! Two backends:
//!   FileStore   → one JSON file holding every chain's state, one JSON file of mutes
//!   ValkeyStore → {prefix}:state:{chain} → JSON ChainInfo
//!                 {prefix}:mutes         → HASH "{chain|*}/{proposal|*}" → JSON Mute
//!
//! Store errors are never fatal to a run; callers log them and carry on.

use anyhow::Context;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::{StorageBackend, StorageConfig};
use crate::mutes::{mute_key, Mute};
use crate::state::ChainInfo;

#[async_trait]
pub trait Store: Send + Sync {
    /// Last committed state of a chain, `None` if it was never committed.
    async fn load_chain_state(&self, chain: &str) -> anyhow::Result<Option<ChainInfo>>;

    async fn commit_chain_state(&self, chain: &str, info: &ChainInfo) -> anyhow::Result<()>;

    /// All stored mutes, expired ones included.
    async fn load_mutes(&self) -> anyhow::Result<Vec<Mute>>;

    /// Insert or replace the mute with the same chain/proposal filters.
    async fn upsert_mute(&self, mute: &Mute) -> anyhow::Result<()>;

    /// Remove the mute with exactly these filters. Returns whether one existed.
    async fn delete_mute(&self, chain: Option<&str>, proposal_id: Option<&str>) -> anyhow::Result<bool>;
}

pub async fn open(config: &StorageConfig) -> anyhow::Result<Box<dyn Store>> {
    match config.backend {
        StorageBackend::File => Ok(Box::new(FileStore::new(&config.state_path, &config.mutes_path))),
        StorageBackend::Valkey => {
            let store = ValkeyStore::connect(&config.valkey_url, &config.valkey_prefix).await?;
            Ok(Box::new(store))
        }
    }
}

// --- File ---

pub struct FileStore {
    state_path: PathBuf,
    mutes_path: PathBuf,
    // read-modify-write of either file happens under this lock
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(state_path: impl AsRef<Path>, mutes_path: impl AsRef<Path>) -> Self {
        Self {
            state_path: state_path.as_ref().to_path_buf(),
            mutes_path: mutes_path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    async fn read_states(&self) -> anyhow::Result<BTreeMap<String, ChainInfo>> {
        read_json(&self.state_path).await
    }

    async fn read_mutes(&self) -> anyhow::Result<Vec<Mute>> {
        read_json(&self.mutes_path).await
    }
}

async fn read_json<T: serde::de::DeserializeOwned + Default>(path: &Path) -> anyhow::Result<T> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) if raw.trim().is_empty() => Ok(T::default()),
        Ok(raw) => serde_json::from_str(&raw).with_context(|| format!("corrupt store file {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

/// Write through a temp file and rename so a crash never leaves half a file.
async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, json)
        .await
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

#[async_trait]
impl Store for FileStore {
    async fn load_chain_state(&self, chain: &str) -> anyhow::Result<Option<ChainInfo>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_states().await?.remove(chain))
    }

    async fn commit_chain_state(&self, chain: &str, info: &ChainInfo) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut states = self.read_states().await?;
        states.insert(chain.to_string(), info.clone());
        write_json(&self.state_path, &states).await?;
        debug!(chain = chain, path = %self.state_path.display(), "state committed");
        Ok(())
    }

    async fn load_mutes(&self) -> anyhow::Result<Vec<Mute>> {
        let _guard = self.lock.lock().await;
        self.read_mutes().await
    }

    async fn upsert_mute(&self, mute: &Mute) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut mutes = self.read_mutes().await?;
        let key = mute.key();
        mutes.retain(|m| m.key() != key);
        mutes.push(mute.clone());
        write_json(&self.mutes_path, &mutes).await
    }

    async fn delete_mute(&self, chain: Option<&str>, proposal_id: Option<&str>) -> anyhow::Result<bool> {
        let _guard = self.lock.lock().await;
        let mut mutes = self.read_mutes().await?;
        let key = mute_key(chain, proposal_id);
        let before = mutes.len();
        mutes.retain(|m| m.key() != key);
        if mutes.len() == before {
            return Ok(false);
        }
        write_json(&self.mutes_path, &mutes).await?;
        Ok(true)
    }
}

// --- Valkey ---

/// Valkey/Redis-backed store.
///
/// All keys live under a configurable prefix so several deployments can share
/// one Valkey without collisions. Default prefix "govwatch" gives keys like
/// "govwatch:state:cosmoshub" and "govwatch:mutes".
#[derive(Clone)]
pub struct ValkeyStore {
    conn: MultiplexedConnection,
    prefix: String,
}

impl ValkeyStore {
    pub async fn connect(url: &str, prefix: &str) -> anyhow::Result<Self> {
        let client = Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!(url = url, prefix = prefix, "connected to Valkey");
        Ok(Self {
            conn,
            prefix: prefix.to_string(),
        })
    }

    /// Build a namespaced key: "{prefix}:{suffix}"
    fn key(&self, suffix: &str) -> String {
        format!("{}:{}", self.prefix, suffix)
    }
}

#[async_trait]
impl Store for ValkeyStore {
    async fn load_chain_state(&self, chain: &str) -> anyhow::Result<Option<ChainInfo>> {
        let key = self.key(&format!("state:{}", chain));
        let mut conn = self.conn.clone();
        let json: Option<String> = conn.get(&key).await?;
        match json {
            Some(j) => Ok(Some(serde_json::from_str(&j).with_context(|| format!("corrupt state at {}", key))?)),
            None => Ok(None),
        }
    }

    async fn commit_chain_state(&self, chain: &str, info: &ChainInfo) -> anyhow::Result<()> {
        let key = self.key(&format!("state:{}", chain));
        let json = serde_json::to_string(info)?;
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(&key, &json).await?;
        debug!(chain = chain, key = %key, "state committed");
        Ok(())
    }

    async fn load_mutes(&self) -> anyhow::Result<Vec<Mute>> {
        let mut conn = self.conn.clone();
        let raw: HashMap<String, String> = conn.hgetall(self.key("mutes")).await?;
        let mut mutes = Vec::with_capacity(raw.len());
        for (field, json) in raw {
            let mute: Mute = serde_json::from_str(&json).with_context(|| format!("corrupt mute {}", field))?;
            mutes.push(mute);
        }
        Ok(mutes)
    }

    async fn upsert_mute(&self, mute: &Mute) -> anyhow::Result<()> {
        let json = serde_json::to_string(mute)?;
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(self.key("mutes"), mute.key(), json).await?;
        Ok(())
    }

    async fn delete_mute(&self, chain: Option<&str>, proposal_id: Option<&str>) -> anyhow::Result<bool> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn.hdel(self.key("mutes"), mute_key(chain, proposal_id)).await?;
        Ok(removed > 0)
    }
}
