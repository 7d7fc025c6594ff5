// Persona Store
// Loads author profiles from JSON, validates required sections and caches by persona key

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use super::config_store::ConfigError;

/// Forbidden-phrase category exempt by policy: second-person address is allowed.
pub const EXEMPT_FORBIDDEN_CATEGORY: &str = "direct_address";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatternFamily {
    pub name: String,
    pub markers: Vec<String>,
}

/// A validated persona. Every field required by scoring is present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorProfile {
    pub id: String,
    pub name: String,
    pub country: String,
    pub signature_phrases: Vec<String>,
    pub pattern_families: Vec<PatternFamily>,
    pub forbidden_phrases: BTreeMap<String, Vec<String>>,
}

/// On-disk shape; every section optional so absence can be reported by name.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProfile {
    id: Option<String>,
    name: Option<String>,
    country: Option<String>,
    signature_phrases: Option<Vec<String>>,
    pattern_families: Option<Vec<PatternFamily>>,
    forbidden_phrases: Option<BTreeMap<String, Vec<String>>>,
}

impl AuthorProfile {
    /// Parse and validate a persona document.
    pub fn from_json(key: &str, raw: &str) -> Result<Self, ConfigError> {
        let parsed: RawProfile =
            serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
                path: PathBuf::from(format!("persona:{}", key)),
                source,
            })?;

        let missing = |section: &str| ConfigError::MissingSection {
            persona: key.to_string(),
            section: section.to_string(),
        };

        let id = parsed
            .id
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| missing("id"))?;
        let country = parsed
            .country
            .map(|c| c.trim().to_ascii_lowercase())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| missing("country"))?;
        let signature_phrases: Vec<String> = parsed
            .signature_phrases
            .unwrap_or_default()
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if signature_phrases.is_empty() {
            return Err(missing("signaturePhrases"));
        }
        let pattern_families = parsed
            .pattern_families
            .filter(|f| !f.is_empty())
            .ok_or_else(|| missing("patternFamilies"))?;
        if pattern_families
            .iter()
            .any(|f| f.name.trim().is_empty() || f.markers.is_empty())
        {
            return Err(missing("patternFamilies.markers"));
        }
        let forbidden_phrases = parsed
            .forbidden_phrases
            .ok_or_else(|| missing("forbiddenPhrases"))?;

        Ok(Self {
            name: parsed.name.unwrap_or_else(|| id.clone()),
            id,
            country,
            signature_phrases,
            pattern_families,
            forbidden_phrases,
        })
    }
}

/// Keyed lookup of persona documents.
pub trait PersonaSource: Send + Sync {
    fn load(&self, key: &str) -> Result<AuthorProfile, ConfigError>;
}

/// Reads `<dir>/<key>.json`.
pub struct DirectoryPersonaSource {
    dir: PathBuf,
}

impl DirectoryPersonaSource {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl PersonaSource for DirectoryPersonaSource {
    fn load(&self, key: &str) -> Result<AuthorProfile, ConfigError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.contains("..") {
            return Err(ConfigError::UnknownPersona(key.to_string()));
        }
        let path = self.dir.join(format!("{}.json", key));
        if !path.exists() {
            return Err(ConfigError::UnknownPersona(key.to_string()));
        }
        let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        AuthorProfile::from_json(key, &raw)
    }
}

/// Fixed set of already-validated profiles.
#[derive(Default)]
pub struct InMemoryPersonaSource {
    profiles: HashMap<String, AuthorProfile>,
}

impl InMemoryPersonaSource {
    pub fn new(profiles: impl IntoIterator<Item = AuthorProfile>) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }
}

impl PersonaSource for InMemoryPersonaSource {
    fn load(&self, key: &str) -> Result<AuthorProfile, ConfigError> {
        self.profiles
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownPersona(key.to_string()))
    }
}

/// Read-mostly persona cache. Profiles are loaded once per key and shared.
pub struct PersonaCatalog {
    source: Box<dyn PersonaSource>,
    cache: RwLock<HashMap<String, Arc<AuthorProfile>>>,
}

impl PersonaCatalog {
    pub fn new(source: Box<dyn PersonaSource>) -> Self {
        Self {
            source,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_dir(dir: PathBuf) -> Self {
        Self::new(Box::new(DirectoryPersonaSource::new(dir)))
    }

    pub fn from_profiles(profiles: impl IntoIterator<Item = AuthorProfile>) -> Self {
        Self::new(Box::new(InMemoryPersonaSource::new(profiles)))
    }

    pub fn get(&self, key: &str) -> Result<Arc<AuthorProfile>, ConfigError> {
        if let Some(hit) = self.read_cache().get(key) {
            return Ok(Arc::clone(hit));
        }

        let profile = Arc::new(self.source.load(key)?);
        info!(persona = key, country = %profile.country, "[PERSONA] profile loaded");

        let mut cache = self.write_cache();
        // Another reader may have loaded it meanwhile; keep the first copy.
        let entry = cache.entry(key.to_string()).or_insert(profile);
        Ok(Arc::clone(entry))
    }

    /// Drop one cached profile so the next lookup re-reads the source.
    pub fn evict(&self, key: &str) -> bool {
        let removed = self.write_cache().remove(key).is_some();
        if removed {
            debug!(persona = key, "[PERSONA] evicted");
        }
        removed
    }

    /// Re-read a profile immediately, replacing any cached copy.
    pub fn reload(&self, key: &str) -> Result<Arc<AuthorProfile>, ConfigError> {
        let profile = Arc::new(self.source.load(key)?);
        self.write_cache()
            .insert(key.to_string(), Arc::clone(&profile));
        Ok(profile)
    }

    pub fn clear(&self) {
        self.write_cache().clear();
    }

    pub fn cached_len(&self) -> usize {
        self.read_cache().len()
    }

    fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<AuthorProfile>>> {
        self.cache.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_cache(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<AuthorProfile>>> {
        self.cache.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_profile_normalizes_country() {
        let profile = taiwan_profile();
        assert_eq!(profile.country, "taiwan");
        assert_eq!(profile.pattern_families.len(), 3);
    }

    #[test]
    fn test_missing_section_is_loud() {
        let raw = r#"{"id": "x", "country": "italy", "signaturePhrases": ["a"], "forbiddenPhrases": {}}"#;
        let err = AuthorProfile::from_json("x", raw).unwrap_err();
        match err {
            ConfigError::MissingSection { persona, section } => {
                assert_eq!(persona, "x");
                assert_eq!(section, "patternFamilies");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_signature_phrases_rejected() {
        let raw = r#"{"id": "x", "country": "italy", "signaturePhrases": [" "],
            "patternFamilies": [{"name": "a", "markers": ["b"]}], "forbiddenPhrases": {}}"#;
        assert!(matches!(
            AuthorProfile::from_json("x", raw),
            Err(ConfigError::MissingSection { .. })
        ));
    }

    #[test]
    fn test_directory_source_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        let profile = united_states_profile();
        std::fs::write(
            dir.path().join("todd_dunning.json"),
            serde_json::to_string(&profile).unwrap(),
        )
        .unwrap();

        let catalog = PersonaCatalog::from_dir(dir.path().to_path_buf());
        let first = catalog.get("todd_dunning").unwrap();
        let second = catalog.get("todd_dunning").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(catalog.cached_len(), 1);

        assert!(catalog.evict("todd_dunning"));
        assert_eq!(catalog.cached_len(), 0);
        let third = catalog.get("todd_dunning").unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(*first, *third);
    }

    #[test]
    fn test_unknown_persona_and_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = PersonaCatalog::from_dir(dir.path().to_path_buf());
        assert!(matches!(catalog.get("nobody"), Err(ConfigError::UnknownPersona(_))));
        assert!(matches!(catalog.get("../etc"), Err(ConfigError::UnknownPersona(_))));
    }

    #[test]
    fn test_reload_replaces_cached_copy() {
        let catalog = PersonaCatalog::from_profiles(vec![taiwan_profile()]);
        let first = catalog.get("yi_chen").unwrap();
        let reloaded = catalog.reload("yi_chen").unwrap();
        assert!(!Arc::ptr_eq(&first, &reloaded));
        assert!(Arc::ptr_eq(&reloaded, &catalog.get("yi_chen").unwrap()));
    }
}
