use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::ProviderConfig;
use crate::error::{ProviderFault, Result, TsujiError};

use super::{ProviderTranslation, TranslationProvider};

/// DeepL REST API provider (v2, free or pro endpoint).
pub struct DeeplProvider {
    client: Client,
    endpoint: String,
    auth_key: String,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<TranslationEntry>,
}

#[derive(Debug, Deserialize)]
struct TranslationEntry {
    #[serde(default)]
    detected_source_language: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct UsageResponse {
    character_count: u64,
    character_limit: u64,
}

impl DeeplProvider {
    pub fn new(endpoint: &str, auth_key: &str, timeout: Duration) -> Result<Self> {
        if auth_key.trim().is_empty() {
            return Err(TsujiError::Config(
                "DeepL auth key cannot be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tsuji/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            auth_key: auth_key.to_string(),
        })
    }

    /// Build a provider from config, resolving the auth key from the named
    /// environment variable.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let auth_key = std::env::var(&config.auth_key_env).map_err(|_| {
            TsujiError::Config(format!(
                "environment variable {} not set",
                config.auth_key_env
            ))
        })?;
        Self::new(
            &config.endpoint,
            &auth_key,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn auth_header(&self) -> String {
        format!("DeepL-Auth-Key {}", self.auth_key)
    }
}

#[async_trait]
impl TranslationProvider for DeeplProvider {
    async fn translate(
        &self,
        text: &str,
        source_lang: Option<&str>,
        target_lang: &str,
    ) -> Result<ProviderTranslation> {
        let url = format!("{}/translate", self.endpoint);
        debug!("Sending translation request to: {}", url);

        let mut form = vec![
            ("text", text.to_string()),
            ("target_lang", target_lang.to_string()),
        ];
        if let Some(source) = source_lang {
            // DeepL expects a bare source code (DE, not DE-CH)
            form.push(("source_lang", crate::lang::base_language(source)));
        }

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .form(&form)
            .send()
            .await
            .map_err(|e| TsujiError::Provider(ProviderFault::from_transport(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("DeepL API error {}: {}", status, body);
            return Err(TsujiError::Provider(ProviderFault::from_status(
                status.as_u16(),
                &body,
            )));
        }

        let parsed: TranslateResponse = response.json().await?;
        let entry = parsed.translations.into_iter().next().ok_or_else(|| {
            warn!("DeepL response carried no translations");
            TsujiError::Provider(ProviderFault::Unknown)
        })?;

        Ok(ProviderTranslation {
            text: entry.text,
            detected_source_lang: entry.detected_source_language,
        })
    }

    fn provider_name(&self) -> &str {
        "DeepL"
    }
}

/// Check that the DeepL API accepts the configured key. Returns the used
/// and allowed character counts for the current period.
pub async fn check_availability(config: &ProviderConfig) -> Result<(u64, u64)> {
    let provider = DeeplProvider::from_config(config)?;
    let url = format!("{}/usage", provider.endpoint);

    let response = provider
        .client
        .get(&url)
        .header("Authorization", provider.auth_header())
        .send()
        .await
        .map_err(|e| TsujiError::Provider(ProviderFault::from_transport(&e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(TsujiError::Provider(ProviderFault::from_status(
            status.as_u16(),
            &body,
        )));
    }

    let usage: UsageResponse = response.json().await?;
    info!(
        "DeepL reachable: {}/{} characters used this period",
        usage.character_count, usage.character_limit
    );
    Ok((usage.character_count, usage.character_limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_with_empty_key() {
        let result = DeeplProvider::new("https://api-free.deepl.com/v2", "", Duration::from_secs(5));
        assert!(matches!(result, Err(TsujiError::Config(_))));
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let provider =
            DeeplProvider::new("https://api-free.deepl.com/v2/", "key", Duration::from_secs(5))
                .unwrap();
        assert_eq!(provider.endpoint, "https://api-free.deepl.com/v2");
        assert_eq!(provider.provider_name(), "DeepL");
    }

    #[test]
    fn test_auth_header_format() {
        let provider =
            DeeplProvider::new("https://api-free.deepl.com/v2", "abc:fx", Duration::from_secs(5))
                .unwrap();
        assert_eq!(provider.auth_header(), "DeepL-Auth-Key abc:fx");
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"translations":[{"detected_source_language":"FR","text":"hello"}]}"#;
        let parsed: TranslateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.translations[0].detected_source_language, "FR");
        assert_eq!(parsed.translations[0].text, "hello");
    }

    #[test]
    fn test_response_parsing_without_detection() {
        let body = r#"{"translations":[{"text":"hello"}]}"#;
        let parsed: TranslateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.translations[0].detected_source_language, "");
    }
}
