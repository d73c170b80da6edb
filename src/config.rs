use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::error::{Result, TsujiError};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub dispatch: DispatchConfig,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub trigger: TriggerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// DeepL REST endpoint (free tier by default; pro is api.deepl.com)
    pub endpoint: String,
    /// Environment variable holding the auth key
    pub auth_key_env: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Language assumed when the provider reports no detection
    pub fallback_language: String,
    /// Target used for the detection probe call
    pub probe_target: String,
    /// Reaction emoji that counts as invoking the shared affordance
    pub trigger_emoji: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding preference, allowlist and cache files plus logs
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum age of a cached translation in seconds
    pub max_age_secs: u64,
    /// Sweep timer period in seconds
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Lifetime of a shared affordance in seconds
    pub ttl_secs: u64,
    /// Expiry scan period in seconds
    pub sweep_interval_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api-free.deepl.com/v2".to_string(),
            auth_key_env: "DEEPL_AUTH_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            fallback_language: "EN".to_string(),
            probe_target: "EN-US".to_string(),
            trigger_emoji: "🌍".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: ".tsuji".to_string(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age_secs: 6 * 60 * 60,
            sweep_interval_secs: 6 * 60 * 60,
        }
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 10 * 60,
            sweep_interval_secs: 60,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TsujiError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| TsujiError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TsujiError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TsujiError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.provider.endpoint, "https://api-free.deepl.com/v2");
        assert_eq!(config.cache.max_age_secs, 21600);
        assert_eq!(config.trigger.ttl_secs, 600);
        assert_eq!(config.dispatch.fallback_language, "EN");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [trigger]
            ttl_secs = 120
            "#,
        )
        .unwrap();
        assert_eq!(parsed.trigger.ttl_secs, 120);
        assert_eq!(parsed.trigger.sweep_interval_secs, 60);
        assert_eq!(parsed.cache.max_age_secs, 21600);
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tsuji.toml");

        let config = Config::default();
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.provider.auth_key_env, config.provider.auth_key_env);
        assert_eq!(loaded.dispatch.trigger_emoji, config.dispatch.trigger_emoji);
    }
}
