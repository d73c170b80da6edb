//! Language code normalization and base-language matching.
//!
//! Codes follow the DeepL convention: uppercase, base subtag plus an
//! optional region or script suffix (EN-US, PT-BR, ZH-HANS).

/// Languages accepted by the `prefs set` command, mirroring the choices the
/// settings command offers members.
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("Arabic", "AR"),
    ("Bulgarian", "BG"),
    ("Chinese", "ZH-HANS"),
    ("Czech", "CS"),
    ("Dutch", "NL"),
    ("English", "EN-US"),
    ("Finnish", "FI"),
    ("French", "FR"),
    ("German", "DE"),
    ("Greek", "EL"),
    ("Hungarian", "HU"),
    ("Italian", "IT"),
    ("Japanese", "JA"),
    ("Korean", "KO"),
    ("Latvian", "LV"),
    ("Lithuanian", "LT"),
    ("Polish", "PL"),
    ("Portuguese", "PT-BR"),
    ("Russian", "RU"),
    ("Slovak", "SK"),
    ("Slovenian", "SL"),
    ("Spanish", "ES"),
    ("Swedish", "SV"),
    ("Turkish", "TR"),
    ("Ukrainian", "UK"),
];

/// Canonicalize a raw language code. Uppercases and maps bare macro-codes
/// to their provider default variant. Empty input stays the canonical
/// "unset" value (empty string). Idempotent.
pub fn normalize(raw: &str) -> String {
    let code = raw.trim().to_uppercase();
    match code.as_str() {
        "EN" => "EN-US".to_string(),
        "PT" => "PT-BR".to_string(),
        "ZH" => "ZH-HANS".to_string(),
        _ => code,
    }
}

/// The leading subtag before any separator, uppercased.
pub fn base_language(code: &str) -> String {
    code.split(['-', '_'])
        .next()
        .unwrap_or("")
        .trim()
        .to_uppercase()
}

/// True iff both codes are non-empty and share a base subtag. This is the
/// sole definition of "message already in the user's language": region and
/// script differences inside one base language count as a match.
pub fn languages_match(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    base_language(a) == base_language(b)
}

/// True if the normalized code is one the settings command accepts.
pub fn is_supported(code: &str) -> bool {
    SUPPORTED_LANGUAGES.iter().any(|(_, c)| *c == code)
}
