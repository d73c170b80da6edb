use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use crate::cache::TranslationCache;
use crate::config::DispatchConfig;
use crate::error::Result;
use crate::provider::TranslationProvider;

/// Detection and translation against the external provider, cache-checked.
///
/// The cost invariant lives here: an identical `(source text, target
/// language)` pair reaches the provider at most once per cache TTL window,
/// however many members ask for it. A per-key async lock is held across the
/// provider call so concurrent identical requests coalesce instead of
/// racing.
pub struct Pipeline {
    provider: Box<dyn TranslationProvider>,
    cache: Arc<TranslationCache>,
    fallback_language: String,
    probe_target: String,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl Pipeline {
    pub fn new(
        provider: Box<dyn TranslationProvider>,
        cache: Arc<TranslationCache>,
        dispatch: &DispatchConfig,
    ) -> Self {
        Self {
            provider,
            cache,
            fallback_language: dispatch.fallback_language.clone(),
            probe_target: dispatch.probe_target.clone(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Learn the source language of `text` through a probe translate call.
    /// A provider that reports nothing yields the fallback language;
    /// provider failures propagate for classification by the caller.
    pub async fn detect_language(&self, text: &str) -> Result<String> {
        let result = self.provider.translate(text, None, &self.probe_target).await?;
        let detected = result.detected_source_lang.trim().to_uppercase();
        if detected.is_empty() {
            debug!("No detected source language, using fallback");
            Ok(self.fallback_language.clone())
        } else {
            Ok(detected)
        }
    }

    /// Translate `text` to `target_lang`, consulting the cache first. A hit
    /// returns without touching the provider; a miss translates and
    /// populates the cache.
    pub async fn translate(
        &self,
        text: &str,
        source_lang: Option<&str>,
        target_lang: &str,
    ) -> Result<String> {
        let key_lock = self.key_lock(text, target_lang);
        let _guard = key_lock.lock().await;

        if let Some(hit) = self.cache.get(text, target_lang) {
            debug!("Translation cache hit for target {}", target_lang);
            return Ok(hit);
        }

        let result = self.provider.translate(text, source_lang, target_lang).await?;
        self.cache.put(text, target_lang, &result.text).await;
        Ok(result.text)
    }

    fn key_lock(&self, text: &str, target_lang: &str) -> Arc<AsyncMutex<()>> {
        let key = format!("{}::{}", text, target_lang);
        self.locks
            .lock()
            .expect("pipeline lock table poisoned")
            .entry(key)
            .or_default()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatchConfig;
    use crate::error::{ProviderFault, TsujiError};
    use crate::provider::{MockMode, MockProvider};
    use crate::store::JsonStore;
    use chrono::Duration;

    fn pipeline_with(dir: &tempfile::TempDir, provider: Arc<MockProvider>) -> Pipeline {
        let cache = Arc::new(TranslationCache::new(
            JsonStore::new(dir.path().join("cache.json")),
            Duration::hours(6),
        ));
        Pipeline::new(Box::new(provider), cache, &DispatchConfig::default())
    }

    #[tokio::test]
    async fn test_provider_called_once_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::with_detected(MockMode::Suffix, "FR"));
        let pipeline = pipeline_with(&dir, provider.clone());

        pipeline.translate("bonjour", Some("FR"), "DE").await.unwrap();
        pipeline.translate("bonjour", Some("FR"), "DE").await.unwrap();
        assert_eq!(provider.call_count(), 1);

        // A different target is a different key
        pipeline.translate("bonjour", Some("FR"), "ES").await.unwrap();
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_identical_requests_coalesce() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::with_detected(MockMode::Suffix, "FR"));
        let pipeline = Arc::new(pipeline_with(&dir, provider.clone()));

        let a = tokio::spawn({
            let p = pipeline.clone();
            async move { p.translate("bonjour", Some("FR"), "DE").await }
        });
        let b = tokio::spawn({
            let p = pipeline.clone();
            async move { p.translate("bonjour", Some("FR"), "DE").await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_detect_uses_probe_and_uppercases() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::with_detected(MockMode::Suffix, "fr"));
        let pipeline = pipeline_with(&dir, provider.clone());

        let detected = pipeline.detect_language("bonjour").await.unwrap();
        assert_eq!(detected, "FR");

        let calls = provider.calls();
        assert_eq!(calls[0].target_lang, "EN-US");
        assert_eq!(calls[0].source_lang, None);
    }

    #[tokio::test]
    async fn test_detect_falls_back_when_provider_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::with_detected(MockMode::Suffix, ""));
        let pipeline = pipeline_with(&dir, provider);

        let detected = pipeline.detect_language("??").await.unwrap();
        assert_eq!(detected, "EN");
    }

    #[tokio::test]
    async fn test_detect_propagates_provider_fault() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::new(MockMode::Fail(ProviderFault::Unreachable)));
        let pipeline = pipeline_with(&dir, provider);

        let result = pipeline.detect_language("bonjour").await;
        assert!(matches!(
            result,
            Err(TsujiError::Provider(ProviderFault::Unreachable))
        ));
    }
}
