// Translation provider boundary
//
// The engine consumes exactly two capabilities from the outside world:
// detect a source language and translate to a target. Both arrive through
// the `TranslationProvider` trait:
// - DeepL: the production REST provider
// - Mock: deterministic, API-free provider for tests

pub mod deepl;
pub mod mock;

use async_trait::async_trait;

pub use deepl::DeeplProvider;
pub use mock::{MockMode, MockProvider};

use crate::error::Result;

/// One provider translation result. `detected_source_lang` is whatever the
/// provider inferred, empty when it reported nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderTranslation {
    pub text: String,
    pub detected_source_lang: String,
}

/// The external translation service, reduced to its one operation. Language
/// detection is a translate call whose only purpose is the detected source
/// field.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source_lang: Option<&str>,
        target_lang: &str,
    ) -> Result<ProviderTranslation>;

    fn provider_name(&self) -> &str;
}

#[async_trait]
impl<T: TranslationProvider + ?Sized> TranslationProvider for std::sync::Arc<T> {
    async fn translate(
        &self,
        text: &str,
        source_lang: Option<&str>,
        target_lang: &str,
    ) -> Result<ProviderTranslation> {
        (**self).translate(text, source_lang, target_lang).await
    }

    fn provider_name(&self) -> &str {
        (**self).provider_name()
    }
}
