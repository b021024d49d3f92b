use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const MODEL_KEY: &str = "model";

/// Persisted tool configuration (`properties.json`).
///
/// Only the `model` key is interpreted. Every other key is carried through
/// loads and saves untouched, in its original order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OracleProperties {
    values: Map<String, Value>,
}

impl OracleProperties {
    pub fn from_json(content: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(content).context("Properties file is not valid JSON")?;
        match value {
            Value::Object(values) => Ok(Self { values }),
            _ => anyhow::bail!("Properties file must contain a JSON object"),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.values).context("Failed to serialize properties")
    }

    /// The configured model, if it names something non-blank
    pub fn model(&self) -> Option<&str> {
        self.values
            .get(MODEL_KEY)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }

    pub fn set_model(&mut self, model: &str) {
        self.values
            .insert(MODEL_KEY.to_string(), Value::String(model.to_string()));
    }

    pub fn remove_model(&mut self) -> bool {
        self.values.shift_remove(MODEL_KEY).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

/// File-backed store for [`OracleProperties`]
#[derive(Debug, Clone)]
pub struct FilePropertiesRegistry {
    path: PathBuf,
}

impl FilePropertiesRegistry {
    /// Creates a new FilePropertiesRegistry
    ///
    /// # Arguments
    /// * `path` - Optional path to the properties file (defaults to "properties.json")
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path: path.unwrap_or_else(|| PathBuf::from("properties.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the properties. A missing file is an empty configuration.
    pub fn load(&self) -> Result<OracleProperties> {
        if !self.path.exists() {
            return Ok(OracleProperties::default());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        OracleProperties::from_json(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    /// Loads the properties, degrading to an empty configuration on any error.
    pub fn load_or_default(&self) -> OracleProperties {
        match self.load() {
            Ok(properties) => properties,
            Err(e) => {
                tracing::warn!("Ignoring unreadable properties: {:#}", e);
                OracleProperties::default()
            }
        }
    }

    pub fn save(&self, properties: &OracleProperties) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        fs::write(&self.path, properties.to_json()?)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

/// Outcome of asking the oracle which models it serves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelListing {
    Unreachable(String),
    Available(Vec<String>),
}

/// Where the resolved model came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSource {
    Configured,
    Selected,
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelResolution {
    pub model: String,
    pub source: ModelSource,
    /// Properties that must be written back, when anything changed
    pub persist: Option<OracleProperties>,
    pub warnings: Vec<String>,
}

/// Decides which model a run uses.
///
/// A configured model wins unless the oracle is reachable and does not list it, in
/// which case the key is stripped and resolution falls through to an operator
/// selection among the listed models. `choose` receives the listed names and
/// returns the operator's raw answer (a 1-based number). An unusable answer,
/// an empty listing or an unreachable oracle all leave the built-in default in
/// place, and a selection is the only thing that adds a key back.
pub fn resolve_model<F>(
    current: &OracleProperties,
    listing: &ModelListing,
    default_model: &str,
    choose: F,
) -> ModelResolution
where
    F: FnOnce(&[String]) -> Option<String>,
{
    let mut warnings = Vec::new();
    let mut persist = None;

    if let Some(configured) = current.model() {
        match listing {
            ModelListing::Available(models) if !is_listed(models, configured) => {
                warnings.push(format!(
                    "Configured model '{}' is not served by the oracle; removing it from the configuration",
                    configured
                ));
                let mut stripped = current.clone();
                stripped.remove_model();
                persist = Some(stripped);
            }
            ModelListing::Unreachable(reason) => {
                warnings.push(format!(
                    "Could not reach the oracle to validate model '{}': {}",
                    configured, reason
                ));
                return ModelResolution {
                    model: configured.to_string(),
                    source: ModelSource::Configured,
                    persist: None,
                    warnings,
                };
            }
            ModelListing::Available(_) => {
                return ModelResolution {
                    model: configured.to_string(),
                    source: ModelSource::Configured,
                    persist: None,
                    warnings,
                };
            }
        }
    }

    let fallback = |persist, mut warnings: Vec<String>, warning: String| {
        warnings.push(warning);
        ModelResolution {
            model: default_model.to_string(),
            source: ModelSource::Default,
            persist,
            warnings,
        }
    };

    let models = match listing {
        ModelListing::Unreachable(reason) => {
            return fallback(
                persist,
                warnings,
                format!(
                    "Could not list oracle models ({}); using default model '{}'",
                    reason, default_model
                ),
            );
        }
        ModelListing::Available(models) if models.is_empty() => {
            return fallback(
                persist,
                warnings,
                format!(
                    "The oracle lists no installed models; using default model '{}'",
                    default_model
                ),
            );
        }
        ModelListing::Available(models) => models,
    };

    let answer = choose(models);
    let selected = answer
        .as_deref()
        .map(str::trim)
        .and_then(|a| a.parse::<usize>().ok())
        .filter(|n| (1..=models.len()).contains(n))
        .map(|n| models[n - 1].clone());

    match selected {
        Some(model) => {
            let mut updated = persist.unwrap_or_else(|| current.clone());
            updated.set_model(&model);
            ModelResolution {
                model,
                source: ModelSource::Selected,
                persist: Some(updated),
                warnings,
            }
        }
        None => fallback(
            persist,
            warnings,
            format!("Invalid selection; using default model '{}'", default_model),
        ),
    }
}

/// An untagged name matches its `:latest` tag, the way the oracle resolves it.
fn is_listed(models: &[String], configured: &str) -> bool {
    models.iter().any(|m| {
        m == configured
            || (!configured.contains(':')
                && m.strip_suffix(":latest") == Some(configured))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(json: &str) -> OracleProperties {
        OracleProperties::from_json(json).unwrap()
    }

    fn listed(names: &[&str]) -> ModelListing {
        ModelListing::Available(names.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn configured_model_is_kept_when_listed() {
        let current = props(r#"{"model": "qwen2.5-coder"}"#);
        let resolution = resolve_model(
            &current,
            &listed(&["llama3", "qwen2.5-coder"]),
            "llama3",
            |_| panic!("no selection expected"),
        );
        assert_eq!(resolution.model, "qwen2.5-coder");
        assert_eq!(resolution.source, ModelSource::Configured);
        assert!(resolution.persist.is_none());
    }

    #[test]
    fn untagged_model_matches_latest_tag() {
        let current = props(r#"{"model": "llama3"}"#);
        let resolution = resolve_model(
            &current,
            &listed(&["llama3:latest", "mistral:7b"]),
            "mistral",
            |_| panic!("no selection expected"),
        );
        assert_eq!(resolution.model, "llama3");
        assert_eq!(resolution.source, ModelSource::Configured);
        assert!(resolution.persist.is_none());
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn other_tags_do_not_match() {
        let current = props(r#"{"model": "mistral"}"#);
        let resolution = resolve_model(&current, &listed(&["mistral:7b"]), "llama3", |_| {
            Some("1".to_string())
        });
        assert_eq!(resolution.model, "mistral:7b");
        assert_eq!(resolution.source, ModelSource::Selected);
    }

    #[test]
    fn configured_model_is_trusted_when_oracle_unreachable() {
        let current = props(r#"{"model": "mistral"}"#);
        let resolution = resolve_model(
            &current,
            &ModelListing::Unreachable("connection refused".to_string()),
            "llama3",
            |_| panic!("no selection expected"),
        );
        assert_eq!(resolution.model, "mistral");
        assert_eq!(resolution.warnings.len(), 1);
    }

    #[test]
    fn stale_model_is_stripped_and_selection_persisted() {
        let current = props(r#"{"theme": "dark", "model": "gone", "retries": 3}"#);
        let resolution = resolve_model(
            &current,
            &listed(&["llama3", "phi3"]),
            "llama3",
            |models| {
                assert_eq!(models, ["llama3", "phi3"]);
                Some("2\n".to_string())
            },
        );

        assert_eq!(resolution.model, "phi3");
        assert_eq!(resolution.source, ModelSource::Selected);
        let persisted = resolution.persist.unwrap();
        assert_eq!(persisted.model(), Some("phi3"));
        assert_eq!(persisted.get("theme"), Some(&Value::from("dark")));
        assert_eq!(persisted.get("retries"), Some(&Value::from(3)));
    }

    #[test]
    fn stale_model_with_bad_selection_only_persists_the_strip() {
        let current = props(r#"{"model": "gone", "theme": "dark"}"#);
        let resolution = resolve_model(&current, &listed(&["llama3"]), "llama3", |_| {
            Some("7".to_string())
        });

        assert_eq!(resolution.model, "llama3");
        assert_eq!(resolution.source, ModelSource::Default);
        let persisted = resolution.persist.unwrap();
        assert_eq!(persisted.model(), None);
        assert_eq!(persisted.get("theme"), Some(&Value::from("dark")));
    }

    #[test]
    fn invalid_selection_persists_nothing() {
        for answer in [None, Some("abc".to_string()), Some("0".to_string())] {
            let resolution = resolve_model(
                &OracleProperties::default(),
                &listed(&["llama3", "phi3"]),
                "llama3",
                |_| answer,
            );
            assert_eq!(resolution.model, "llama3");
            assert_eq!(resolution.source, ModelSource::Default);
            assert!(resolution.persist.is_none());
        }
    }

    #[test]
    fn unreachable_oracle_falls_back_to_default_with_warning() {
        let resolution = resolve_model(
            &OracleProperties::default(),
            &ModelListing::Unreachable("timeout".to_string()),
            "llama3",
            |_| panic!("no selection expected"),
        );
        assert_eq!(resolution.model, "llama3");
        assert!(resolution.persist.is_none());
        assert!(resolution.warnings[0].contains("timeout"));
    }

    #[test]
    fn empty_listing_keeps_default() {
        let resolution = resolve_model(
            &OracleProperties::default(),
            &ModelListing::Available(Vec::new()),
            "llama3",
            |_| panic!("no selection expected"),
        );
        assert_eq!(resolution.model, "llama3");
        assert!(resolution.persist.is_none());
    }

    #[test]
    fn properties_round_trip_preserves_key_order() {
        let mut properties = props(r#"{"b": 1, "model": "x", "a": {"nested": true}}"#);
        properties.set_model("y");
        let json = properties.to_json().unwrap();
        let b = json.find("\"b\"").unwrap();
        let model = json.find("\"model\"").unwrap();
        let a = json.find("\"a\"").unwrap();
        assert!(b < model && model < a);
        assert!(json.contains("\"y\""));
    }

    #[test]
    fn registry_load_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FilePropertiesRegistry::new(Some(dir.path().join("properties.json")));

        assert_eq!(registry.load().unwrap(), OracleProperties::default());

        let mut properties = OracleProperties::default();
        properties.set_model("llama3");
        registry.save(&properties).unwrap();
        assert_eq!(registry.load().unwrap().model(), Some("llama3"));

        fs::write(registry.path(), "not json").unwrap();
        assert!(registry.load().is_err());
        assert_eq!(registry.load_or_default(), OracleProperties::default());
    }
}
