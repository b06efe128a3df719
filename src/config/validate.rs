//! Configuration validation with unknown field detection.
//!
//! Used by `wagate config check` to flag typos before the gateway is started
//! with silently-defaulted settings.

use serde_json::{Map, Value};
use std::collections::HashSet;

use super::Config;

/// Known top-level config field names.
const KNOWN_TOP_LEVEL: &[&str] = &[
    "whatsapp", "model", "gateway", "storage", "agent", "tools", "logging",
];

/// Known fields for each section.
const KNOWN_SECTIONS: &[(&str, &[&str])] = &[
    (
        "whatsapp",
        &[
            "access_token",
            "phone_number_id",
            "verify_token",
            "api_base",
            "timeout_secs",
        ],
    ),
    (
        "model",
        &[
            "api_key",
            "model",
            "api_base",
            "temperature",
            "max_tokens",
            "timeout_secs",
            "max_retries",
        ],
    ),
    (
        "gateway",
        &[
            "host",
            "port",
            "path",
            "workers",
            "dedup_enabled",
            "dedup_ttl_secs",
            "dedup_max_entries",
        ],
    ),
    ("storage", &["db_path", "media_root"]),
    (
        "agent",
        &[
            "system_prompt",
            "end_marker",
            "max_tool_iterations",
            "tool_timeout_secs",
            "fallback_reply",
        ],
    ),
    ("tools", &["catalog_path"]),
    ("logging", &["format", "level", "file"]),
];

/// A validation diagnostic.
#[derive(Debug)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub path: String,
    pub message: String,
}

#[derive(Debug, PartialEq)]
pub enum DiagnosticLevel {
    Ok,
    Warn,
    Error,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.level {
            DiagnosticLevel::Ok => "[OK]",
            DiagnosticLevel::Warn => "[WARN]",
            DiagnosticLevel::Error => "[ERROR]",
        };
        if self.path.is_empty() {
            write!(f, "{} {}", prefix, self.message)
        } else {
            write!(f, "{} {}: {}", prefix, self.path, self.message)
        }
    }
}

/// Simple Levenshtein distance for "did you mean?" suggestions.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            cur[j + 1] = (prev[j + 1] + 1).min(cur[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Suggest the closest known field name (if distance <= 3).
pub fn suggest_field(unknown: &str, known: &[&str]) -> Option<String> {
    known
        .iter()
        .map(|k| (k, levenshtein(unknown, k)))
        .filter(|(_, d)| *d <= 3)
        .min_by_key(|(_, d)| *d)
        .map(|(k, _)| format!("did you mean '{}'?", k))
}

fn check_keys(
    obj: &Map<String, Value>,
    known: &[&str],
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> bool {
    let known_set: HashSet<&str> = known.iter().copied().collect();
    let mut has_unknown = false;
    for key in obj.keys() {
        if known_set.contains(key.as_str()) {
            continue;
        }
        has_unknown = true;
        let message = match suggest_field(key, known) {
            Some(suggestion) => format!("Unknown field '{}' ({})", key, suggestion),
            None => format!("Unknown field '{}'", key),
        };
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        diagnostics.push(Diagnostic {
            level: DiagnosticLevel::Error,
            path,
            message,
        });
    }
    has_unknown
}

/// Validate a raw JSON config value against known field names.
pub fn validate_config(raw: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let obj = match raw.as_object() {
        Some(o) => o,
        None => {
            diagnostics.push(Diagnostic {
                level: DiagnosticLevel::Error,
                path: String::new(),
                message: "Config must be a JSON object".to_string(),
            });
            return diagnostics;
        }
    };

    diagnostics.push(Diagnostic {
        level: DiagnosticLevel::Ok,
        path: String::new(),
        message: "Valid JSON".to_string(),
    });

    let mut has_unknown = check_keys(obj, KNOWN_TOP_LEVEL, "", &mut diagnostics);
    for (section, known) in KNOWN_SECTIONS {
        if let Some(inner) = obj.get(*section).and_then(|v| v.as_object()) {
            has_unknown |= check_keys(inner, known, section, &mut diagnostics);
        }
    }

    if !has_unknown {
        diagnostics.push(Diagnostic {
            level: DiagnosticLevel::Ok,
            path: String::new(),
            message: "All fields recognized".to_string(),
        });
    }

    diagnostics
}

/// Warnings about settings that are legal but probably not intended.
pub fn validate_settings(config: &Config) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if config.whatsapp.verify_token == "token" {
        diagnostics.push(Diagnostic {
            level: DiagnosticLevel::Warn,
            path: "whatsapp.verify_token".to_string(),
            message: "Still the default value; anyone can subscribe the webhook".to_string(),
        });
    }
    if config.agent.end_marker.is_empty() {
        diagnostics.push(Diagnostic {
            level: DiagnosticLevel::Warn,
            path: "agent.end_marker".to_string(),
            message: "Empty; conversations will never close on their own".to_string(),
        });
    }
    if !config.gateway.dedup_enabled {
        diagnostics.push(Diagnostic {
            level: DiagnosticLevel::Warn,
            path: "gateway.dedup_enabled".to_string(),
            message: "Redelivered webhooks will be processed twice".to_string(),
        });
    }
    if let Some(path) = config.catalog_path() {
        if !path.exists() {
            diagnostics.push(Diagnostic {
                level: DiagnosticLevel::Error,
                path: "tools.catalog_path".to_string(),
                message: format!("File not found: {}", path.display()),
            });
        }
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("hello", "hello"), 0);
        assert_eq!(levenshtein("hello", "helo"), 1);
        assert_eq!(levenshtein("", "abc"), 3);
        assert!(levenshtein("hello", "world") > 3);
    }

    #[test]
    fn test_suggest_field_match() {
        let result = suggest_field("gatway", KNOWN_TOP_LEVEL);
        assert!(result.unwrap().contains("gateway"));
        assert!(suggest_field("xyzabcdef", KNOWN_TOP_LEVEL).is_none());
    }

    #[test]
    fn test_validate_valid_config() {
        let raw = json!({
            "whatsapp": {"access_token": "x"},
            "gateway": {"port": 8080, "workers": 2}
        });
        let diags = validate_config(&raw);
        assert!(diags.iter().all(|d| d.level != DiagnosticLevel::Error));
        assert!(diags.iter().any(|d| d.message == "All fields recognized"));
    }

    #[test]
    fn test_validate_unknown_nested_field() {
        let raw = json!({"agent": {"end_makrer": "<END>"}});
        let diags = validate_config(&raw);
        let err = diags
            .iter()
            .find(|d| d.level == DiagnosticLevel::Error)
            .unwrap();
        assert_eq!(err.path, "agent.end_makrer");
        assert!(err.message.contains("end_marker"));
    }

    #[test]
    fn test_validate_not_an_object() {
        let diags = validate_config(&json!("nope"));
        assert!(diags
            .iter()
            .any(|d| d.level == DiagnosticLevel::Error && d.message.contains("JSON object")));
    }

    #[test]
    fn test_validate_settings_warnings() {
        let mut config = Config::default();
        config.agent.end_marker = String::new();
        config.tools.catalog_path = Some("/definitely/missing/catalog.json".into());
        let diags = validate_settings(&config);
        assert!(diags.iter().any(|d| d.path == "whatsapp.verify_token"));
        assert!(diags.iter().any(|d| d.path == "agent.end_marker"));
        assert!(diags
            .iter()
            .any(|d| d.path == "tools.catalog_path" && d.level == DiagnosticLevel::Error));
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic {
            level: DiagnosticLevel::Warn,
            path: "a.b".into(),
            message: "msg".into(),
        };
        assert_eq!(d.to_string(), "[WARN] a.b: msg");
    }
}
