use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::lang;
use crate::store::JsonStore;

/// How a member receives translations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryMode {
    /// Every non-matching message is translated and delivered immediately.
    #[serde(rename = "auto")]
    Auto,
    /// The member invokes the shared affordance to receive a translation.
    /// Persisted as "button", the settings command's wire name for it.
    #[serde(rename = "button")]
    Trigger,
}

impl Default for DeliveryMode {
    fn default() -> Self {
        Self::Trigger
    }
}

impl DeliveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Trigger => "button",
        }
    }
}

/// A member's resolved translation preference. The language is always
/// canonical by the time this struct exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberPreference {
    pub member_id: String,
    pub language: String,
    pub mode: DeliveryMode,
}

/// Persisted record shapes. Legacy records are a bare language code string;
/// both decode into `MemberPreference` here so nothing downstream branches
/// on shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum PrefRecord {
    Structured {
        lang: String,
        #[serde(default)]
        mode: DeliveryMode,
    },
    Legacy(String),
}

impl PrefRecord {
    fn resolve(&self, member_id: &str) -> MemberPreference {
        match self {
            PrefRecord::Structured { lang, mode } => MemberPreference {
                member_id: member_id.to_string(),
                language: lang::normalize(lang),
                mode: *mode,
            },
            PrefRecord::Legacy(lang) => MemberPreference {
                member_id: member_id.to_string(),
                language: lang::normalize(lang),
                mode: DeliveryMode::Trigger,
            },
        }
    }
}

/// Read side of the member preference map. The dispatch core only reads;
/// mutation belongs to the settings command surface.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    store: JsonStore,
}

/// All preferences decoded at one point in time. One snapshot is taken per
/// dispatch cycle and treated as immutable for that cycle.
#[derive(Debug, Clone, Default)]
pub struct PreferenceSnapshot {
    members: HashMap<String, MemberPreference>,
}

impl PreferenceSnapshot {
    pub fn get(&self, member_id: &str) -> Option<&MemberPreference> {
        self.members.get(member_id)
    }

    pub fn member_ids(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl PreferenceStore {
    pub fn new(store: JsonStore) -> Self {
        Self { store }
    }

    pub async fn snapshot(&self) -> PreferenceSnapshot {
        let records: HashMap<String, PrefRecord> = self.store.load_or_default().await;
        let members = records
            .iter()
            .map(|(id, record)| (id.clone(), record.resolve(id)))
            .collect();
        PreferenceSnapshot { members }
    }

    pub async fn get(&self, member_id: &str) -> Option<MemberPreference> {
        self.snapshot().await.get(member_id).cloned()
    }

    /// Settings command surface: store a member's preference. Not called
    /// from the dispatch path.
    pub async fn set(&self, member_id: &str, language: &str, mode: DeliveryMode) -> Result<()> {
        let mut records: HashMap<String, PrefRecord> = self.store.load_or_default().await;
        records.insert(
            member_id.to_string(),
            PrefRecord::Structured {
                lang: lang::normalize(language),
                mode,
            },
        );
        self.store.save(&records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> PreferenceStore {
        PreferenceStore::new(JsonStore::new(dir.path().join("user_languages.json")))
    }

    #[tokio::test]
    async fn test_legacy_record_is_trigger_mode() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("user_languages.json"),
            r#"{"111": "de", "222": {"lang": "FR", "mode": "auto"}}"#,
        )
        .await
        .unwrap();

        let prefs = store_in(&dir);
        let snapshot = prefs.snapshot().await;

        let legacy = snapshot.get("111").unwrap();
        assert_eq!(legacy.language, "DE");
        assert_eq!(legacy.mode, DeliveryMode::Trigger);

        let structured = snapshot.get("222").unwrap();
        assert_eq!(structured.language, "FR");
        assert_eq!(structured.mode, DeliveryMode::Auto);
    }

    #[tokio::test]
    async fn test_language_normalized_at_boundary() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("user_languages.json"),
            r#"{"111": {"lang": "en", "mode": "button"}, "222": "pt"}"#,
        )
        .await
        .unwrap();

        let prefs = store_in(&dir);
        let snapshot = prefs.snapshot().await;
        assert_eq!(snapshot.get("111").unwrap().language, "EN-US");
        assert_eq!(snapshot.get("222").unwrap().language, "PT-BR");
    }

    #[tokio::test]
    async fn test_missing_member_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = store_in(&dir);
        assert!(prefs.get("nobody").await.is_none());
        assert!(prefs.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_set_then_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = store_in(&dir);

        prefs.set("333", "es", DeliveryMode::Auto).await.unwrap();

        let snapshot = prefs.snapshot().await;
        let pref = snapshot.get("333").unwrap();
        assert_eq!(pref.language, "ES");
        assert_eq!(pref.mode, DeliveryMode::Auto);
        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test]
    async fn test_set_preserves_other_records() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("user_languages.json"),
            r#"{"111": "de"}"#,
        )
        .await
        .unwrap();

        let prefs = store_in(&dir);
        prefs.set("222", "FR", DeliveryMode::Trigger).await.unwrap();

        let snapshot = prefs.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("111").unwrap().language, "DE");
    }
}
