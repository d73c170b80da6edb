use thiserror::Error;

#[derive(Error, Debug)]
pub enum TsujiError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Translation provider error: {0}")]
    Provider(#[from] ProviderFault),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Message unavailable: {0}")]
    MessageUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TsujiError>;

/// Classified provider/transport failure. Each class maps to one fixed
/// user-facing message; there is no automatic retry for any of them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderFault {
    #[error("translation quota exceeded")]
    QuotaExceeded,

    #[error("rate limited by the translation service")]
    RateLimited,

    #[error("translation service unreachable")]
    Unreachable,

    #[error("unsupported language")]
    UnsupportedLanguage,

    #[error("unknown translation failure")]
    Unknown,
}

impl ProviderFault {
    /// Classify an HTTP status returned by the provider. 456 is DeepL's
    /// quota-exhausted status.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            456 => Self::QuotaExceeded,
            429 => Self::RateLimited,
            400 if body.contains("target_lang") || body.contains("source_lang") => {
                Self::UnsupportedLanguage
            }
            _ => Self::Unknown,
        }
    }

    /// Classify a transport-level failure (DNS, connect, timeout).
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::Unreachable
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16(), "")
        } else {
            Self::Unknown
        }
    }

    /// The fixed message shown privately to a member whose explicit action
    /// failed. Passive scan failures are never shown, only logged.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::QuotaExceeded => "⚠️ Translation quota exceeded. Please try again later.",
            Self::RateLimited => "⏳ Too many translation requests. Please wait a moment.",
            Self::Unreachable => "🌐 Cannot reach the translation service. Please try again.",
            Self::UnsupportedLanguage => "❌ That language is not supported for translation.",
            Self::Unknown => "❌ Translation error occurred.",
        }
    }
}

/// Collapse any pipeline error into a fault class for user-facing reporting.
pub fn classify(err: &TsujiError) -> ProviderFault {
    match err {
        TsujiError::Provider(fault) => fault.clone(),
        TsujiError::Http(e) => ProviderFault::from_transport(e),
        _ => ProviderFault::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(ProviderFault::from_status(456, ""), ProviderFault::QuotaExceeded);
        assert_eq!(ProviderFault::from_status(429, ""), ProviderFault::RateLimited);
        assert_eq!(
            ProviderFault::from_status(400, "{\"message\":\"Value for 'target_lang' not supported.\"}"),
            ProviderFault::UnsupportedLanguage
        );
        assert_eq!(ProviderFault::from_status(500, ""), ProviderFault::Unknown);
    }

    #[test]
    fn test_user_messages_are_distinct() {
        let faults = [
            ProviderFault::QuotaExceeded,
            ProviderFault::RateLimited,
            ProviderFault::Unreachable,
            ProviderFault::UnsupportedLanguage,
            ProviderFault::Unknown,
        ];
        for a in &faults {
            for b in &faults {
                if a != b {
                    assert_ne!(a.user_message(), b.user_message());
                }
            }
        }
    }

    #[test]
    fn test_classify_wraps_fault() {
        let err = TsujiError::Provider(ProviderFault::RateLimited);
        assert_eq!(classify(&err), ProviderFault::RateLimited);
        let err = TsujiError::Config("bad".to_string());
        assert_eq!(classify(&err), ProviderFault::Unknown);
    }
}
