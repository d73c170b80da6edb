//! Deterministic, API-free provider for tests.
//!
//! Records every call so tests can assert on provider traffic, most
//! importantly the cache cost invariant (identical requests hit the
//! provider at most once per TTL window).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{ProviderFault, Result, TsujiError};

use super::{ProviderTranslation, TranslationProvider};

/// Behaviors the mock can simulate.
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Append the lowercased target code: "hello" → "hello_de"
    Suffix,
    /// Predefined (text, target) → translation mappings, suffix fallback
    Mappings(HashMap<(String, String), String>),
    /// Every call fails with the given fault
    Fail(ProviderFault),
    /// Return the input unchanged
    Echo,
}

/// One recorded provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub text: String,
    pub source_lang: Option<String>,
    pub target_lang: String,
}

pub struct MockProvider {
    mode: MockMode,
    detected_lang: String,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockProvider {
    pub fn new(mode: MockMode) -> Self {
        Self::with_detected(mode, "EN")
    }

    /// A mock whose every response reports `detected` as the source
    /// language.
    pub fn with_detected(mode: MockMode, detected: &str) -> Self {
        Self {
            mode,
            detected_lang: detected.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("mock lock poisoned").len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("mock lock poisoned").clone()
    }
}

#[async_trait]
impl TranslationProvider for MockProvider {
    async fn translate(
        &self,
        text: &str,
        source_lang: Option<&str>,
        target_lang: &str,
    ) -> Result<ProviderTranslation> {
        self.calls
            .lock()
            .expect("mock lock poisoned")
            .push(RecordedCall {
                text: text.to_string(),
                source_lang: source_lang.map(|s| s.to_string()),
                target_lang: target_lang.to_string(),
            });

        let translated = match &self.mode {
            MockMode::Suffix => format!("{}_{}", text, target_lang.to_lowercase()),
            MockMode::Mappings(map) => {
                let key = (text.to_string(), target_lang.to_string());
                map.get(&key)
                    .cloned()
                    .unwrap_or_else(|| format!("{}_{}", text, target_lang.to_lowercase()))
            }
            MockMode::Fail(fault) => return Err(TsujiError::Provider(fault.clone())),
            MockMode::Echo => text.to_string(),
        };

        Ok(ProviderTranslation {
            text: translated,
            detected_source_lang: self.detected_lang.clone(),
        })
    }

    fn provider_name(&self) -> &str {
        "Mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_suffix_mode() {
        let mock = MockProvider::new(MockMode::Suffix);
        let result = mock.translate("hello", None, "DE").await.unwrap();
        assert_eq!(result.text, "hello_de");
        assert_eq!(result.detected_source_lang, "EN");
    }

    #[tokio::test]
    async fn test_mappings_mode_with_fallback() {
        let mut map = HashMap::new();
        map.insert(
            ("bonjour".to_string(), "EN-US".to_string()),
            "hello".to_string(),
        );
        let mock = MockProvider::with_detected(MockMode::Mappings(map), "FR");

        let hit = mock.translate("bonjour", Some("FR"), "EN-US").await.unwrap();
        assert_eq!(hit.text, "hello");
        assert_eq!(hit.detected_source_lang, "FR");

        let miss = mock.translate("salut", Some("FR"), "EN-US").await.unwrap();
        assert_eq!(miss.text, "salut_en-us");
    }

    #[tokio::test]
    async fn test_fail_mode() {
        let mock = MockProvider::new(MockMode::Fail(ProviderFault::Unreachable));
        let result = mock.translate("hello", None, "DE").await;
        assert!(matches!(
            result,
            Err(TsujiError::Provider(ProviderFault::Unreachable))
        ));
    }

    #[tokio::test]
    async fn test_calls_are_recorded() {
        let mock = MockProvider::new(MockMode::Echo);
        mock.translate("a", None, "DE").await.unwrap();
        mock.translate("b", Some("FR"), "ES").await.unwrap();

        let calls = mock.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].text, "a");
        assert_eq!(calls[0].source_lang, None);
        assert_eq!(calls[1].source_lang, Some("FR".to_string()));
        assert_eq!(mock.call_count(), 2);
    }
}
