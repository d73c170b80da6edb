use std::collections::HashSet;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store::JsonStore;

/// Persisted allowlist shapes. Older deployments stored a single channel id;
/// both decode into one set here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum AllowlistRecord {
    Many {
        #[serde(rename = "channelIds")]
        channel_ids: Vec<String>,
    },
    One {
        #[serde(rename = "channelId")]
        channel_id: String,
    },
}

impl Default for AllowlistRecord {
    fn default() -> Self {
        AllowlistRecord::Many {
            channel_ids: Vec::new(),
        }
    }
}

impl AllowlistRecord {
    fn into_set(self) -> HashSet<String> {
        match self {
            AllowlistRecord::Many { channel_ids } => channel_ids.into_iter().collect(),
            AllowlistRecord::One { channel_id } => HashSet::from([channel_id]),
        }
    }
}

/// The set of channels where dispatch is active. Mutated only by the admin
/// command surface; the dispatch path reloads before each cycle and then
/// treats the snapshot as immutable.
#[derive(Debug)]
pub struct ChannelGate {
    store: JsonStore,
    channels: RwLock<HashSet<String>>,
}

impl ChannelGate {
    pub fn new(store: JsonStore) -> Self {
        Self {
            store,
            channels: RwLock::new(HashSet::new()),
        }
    }

    pub fn is_allowed(&self, channel_id: &str) -> bool {
        self.channels
            .read()
            .expect("allowlist lock poisoned")
            .contains(channel_id)
    }

    /// Re-read the persisted allowlist so the gate never serves a snapshot
    /// staler than the last completed admin command.
    pub async fn reload(&self) {
        let record: AllowlistRecord = self.store.load_or_default().await;
        *self.channels.write().expect("allowlist lock poisoned") = record.into_set();
    }

    pub fn channel_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .channels
            .read()
            .expect("allowlist lock poisoned")
            .iter()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Admin command surface: allow a channel. Persists and reloads.
    pub async fn add(&self, channel_id: &str) -> Result<()> {
        let mut set = self.store.load_or_default::<AllowlistRecord>().await.into_set();
        set.insert(channel_id.to_string());
        self.persist(set).await
    }

    /// Admin command surface: remove a channel. Persists and reloads.
    pub async fn remove(&self, channel_id: &str) -> Result<()> {
        let mut set = self.store.load_or_default::<AllowlistRecord>().await.into_set();
        set.remove(channel_id);
        self.persist(set).await
    }

    async fn persist(&self, set: HashSet<String>) -> Result<()> {
        let mut channel_ids: Vec<String> = set.iter().cloned().collect();
        channel_ids.sort();
        self.store.save(&AllowlistRecord::Many { channel_ids }).await?;
        self.reload().await;
        Ok(())
    }
}
