use crate::bind::ErrorPolicy;
use crate::binding::EscapeCharacter;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Engine-wide settings shared by every compiled query method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Character used to escape `%`, `_` and itself in LIKE values (default: `\`)
    pub escape_character: char,
    /// Maximum number of compiled query methods kept (default: 256)
    pub cache_capacity: usize,
    /// Sorted variants kept per declared query (default: 16)
    pub sort_variant_capacity: usize,
    /// Accept sort keys containing function calls or punctuation
    pub allow_unsafe_sort: bool,
    /// How commit failures are treated when binding count queries
    pub count_binding_policy: ErrorPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            escape_character: '\\',
            cache_capacity: 256,
            sort_variant_capacity: 16,
            allow_unsafe_sort: false,
            count_binding_policy: ErrorPolicy::Lenient,
        }
    }
}

impl EngineConfig {
    /// Load config from a TOML file, with environment variable overrides.
    /// Falls back to defaults if the file is not found. RXREPO_CONFIG overrides the path.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = env::var("RXREPO_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| path.as_ref().to_path_buf());

        let mut cfg = match fs::read_to_string(&path) {
            Ok(s) => Self::from_toml(&s)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => return Err(e.into()),
        };
        cfg.apply_overrides(|key| env::var(key).ok());
        Ok(cfg)
    }

    pub fn from_toml(source: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Apply RXREPO_* overrides; unparsable values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("RXREPO_ESCAPE_CHARACTER")
            && let Some(c) = single_char(&v)
        {
            self.escape_character = c;
        }

        if let Some(v) = lookup("RXREPO_CACHE_CAPACITY") {
            match v.parse::<usize>() {
                Ok(capacity) => self.cache_capacity = capacity,
                Err(_) => tracing::warn!("Ignoring RXREPO_CACHE_CAPACITY={}", v),
            }
        }
    }

    pub fn escape(&self) -> EscapeCharacter {
        EscapeCharacter(self.escape_character)
    }
}

fn single_char(value: &str) -> Option<char> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = EngineConfig::from_toml("").unwrap();
        assert_eq!(cfg, EngineConfig::default());

        let missing = EngineConfig::load_from_path(dir.path().join("rxrepo.toml")).unwrap();
        assert_eq!(missing.count_binding_policy, ErrorPolicy::Lenient);
    }

    #[test]
    fn test_reads_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "escape_character = \"~\"\ncache_capacity = 8\nsort_variant_capacity = 0\ncount_binding_policy = \"strict\""
        )
        .unwrap();

        let cfg = EngineConfig::load_from_path(file.path()).unwrap();
        assert_eq!(cfg.escape(), EscapeCharacter('~'));
        assert_eq!(cfg.cache_capacity, 8);
        assert_eq!(cfg.sort_variant_capacity, 0);
        assert_eq!(cfg.count_binding_policy, ErrorPolicy::Strict);
        assert!(!cfg.allow_unsafe_sort);
    }

    #[test]
    fn test_rejects_malformed_toml() {
        assert!(EngineConfig::from_toml("cache_capacity = \"many\"").is_err());
    }

    #[test]
    fn test_environment_overrides() {
        let vars = HashMap::from([
            ("RXREPO_ESCAPE_CHARACTER", "!"),
            ("RXREPO_CACHE_CAPACITY", "nope"),
        ]);
        let mut cfg = EngineConfig::default();
        cfg.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(cfg.escape_character, '!');
        assert_eq!(cfg.cache_capacity, 256);
    }
}
