//! Model loader for reading model documents from disk
//!
//! - One model per `*.json` file; the file stem is the model name
//! - Models are checked by the normalizer as they are registered
//! - Malformed files surface INVALID_SCHEMA naming the file
//! - Registered models are immutable: a name can be registered once

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::errors::{SchemaError, SchemaResult};
use super::normalizer::validate_model;
use super::tree::Schema;
use super::types::KeyPath;
use crate::observability::{self, Event};

/// Registry of named model documents backed by a directory.
pub struct ModelLoader {
    /// Directory containing model files
    model_dir: PathBuf,
    /// Raw model documents indexed by name
    models: BTreeMap<String, Value>,
}

impl ModelLoader {
    pub fn new(model_dir: &Path) -> Self {
        Self {
            model_dir: model_dir.to_path_buf(),
            models: BTreeMap::new(),
        }
    }

    /// Returns the model directory path.
    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Reads and parses a single model document.
    pub fn read_model(path: &Path) -> SchemaResult<Value> {
        let content = fs::read_to_string(path).map_err(|e| {
            SchemaError::invalid_schema(
                KeyPath::root(),
                format!("{}: Failed to read file: {}", path.display(), e),
            )
        })?;

        serde_json::from_str(&content).map_err(|e| {
            SchemaError::invalid_schema(
                KeyPath::root(),
                format!("{}: Invalid JSON: {}", path.display(), e),
            )
        })
    }

    /// Loads every `*.json` file in the model directory.
    ///
    /// A missing directory holds no models. Returns the number of models loaded.
    pub fn load_all(&mut self) -> SchemaResult<usize> {
        if !self.model_dir.exists() {
            return Ok(0);
        }

        let entries = fs::read_dir(&self.model_dir).map_err(|e| {
            SchemaError::invalid_schema(
                KeyPath::root(),
                format!("{}: Failed to read model directory: {}", self.model_dir.display(), e),
            )
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                SchemaError::invalid_schema(
                    KeyPath::root(),
                    format!("{}: Failed to read directory entry: {}", self.model_dir.display(), e),
                )
            })?;
            let path = entry.path();

            // Skip non-JSON files
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            paths.push(path);
        }
        paths.sort();

        for path in &paths {
            self.load_model_file(path)?;
        }

        tracing::info!(
            event = %Event::ModelsLoaded,
            dir = %self.model_dir.display(),
            count = paths.len(),
            "models loaded"
        );

        Ok(paths.len())
    }

    fn load_model_file(&mut self, path: &Path) -> SchemaResult<()> {
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| {
                SchemaError::invalid_schema(
                    KeyPath::root(),
                    format!("{}: Model file name is not valid UTF-8", path.display()),
                )
            })?
            .to_string();

        let model = Self::read_model(path)?;
        self.register(&name, model).map_err(|e| {
            SchemaError::invalid_schema(
                e.key_path().clone(),
                format!("{}: {}", path.display(), e.message()),
            )
        })?;

        tracing::debug!(event = %Event::ModelLoaded, model = %name, path = %path.display(), "model loaded");
        Ok(())
    }

    /// Registers a model directly.
    pub fn register(&mut self, name: &str, model: Value) -> SchemaResult<()> {
        validate_model(&model, &[], &KeyPath::root()).map_err(|e| {
            observability::model_rejected(&e);
            e
        })?;

        if self.models.contains_key(name) {
            return Err(SchemaError::invalid_schema(
                KeyPath::root(),
                format!("Model '{}' is already registered; models are immutable", name),
            ));
        }

        self.models.insert(name.to_string(), model);
        Ok(())
    }

    /// Gets a raw model document by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.models.get(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Names of the registered models, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Materializes the schema tree of a registered model.
    ///
    /// Models that name `get`/`set` transforms need [`Schema::builder`] instead,
    /// so the transforms can be registered before building.
    pub fn build(&self, name: &str) -> SchemaResult<Schema> {
        let model = self.get(name).ok_or_else(|| {
            SchemaError::invalid_schema(KeyPath::root(), format!("Unknown model '{}'", name))
        })?;
        Schema::new(model.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::errors::SchemaErrorKind;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_model() -> Value {
        json!({
            "name": {"type": "string", "required": true},
            "friends": {"string": "boolean"}
        })
    }

    #[test]
    fn test_register_and_build() {
        let temp_dir = TempDir::new().unwrap();
        let mut loader = ModelLoader::new(temp_dir.path());

        loader.register("users", sample_model()).unwrap();

        assert!(loader.exists("users"));
        let schema = loader.build("users").unwrap();
        assert!(schema.node(["friends", "amy"]).is_some());
    }

    #[test]
    fn test_model_immutability() {
        let temp_dir = TempDir::new().unwrap();
        let mut loader = ModelLoader::new(temp_dir.path());

        loader.register("users", sample_model()).unwrap();

        let result = loader.register("users", json!({"other": "string"}));
        assert_eq!(result.unwrap_err().kind(), SchemaErrorKind::InvalidSchema);
        assert_eq!(loader.get("users"), Some(&sample_model()));
    }

    #[test]
    fn test_register_rejects_invalid_model() {
        let temp_dir = TempDir::new().unwrap();
        let mut loader = ModelLoader::new(temp_dir.path());

        let err = loader.register("bad", json!({"cast": "string"})).unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::InvalidSchema);
        assert!(!loader.exists("bad"));
    }

    #[test]
    fn test_load_directory() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("users.json"),
            serde_json::to_string(&sample_model()).unwrap(),
        )
        .unwrap();
        fs::write(temp_dir.path().join("posts.json"), r#"{"title": "string"}"#).unwrap();
        fs::write(temp_dir.path().join("README.md"), "not a model").unwrap();

        let mut loader = ModelLoader::new(temp_dir.path());
        assert_eq!(loader.load_all().unwrap(), 2);
        assert_eq!(loader.names().collect::<Vec<_>>(), vec!["posts", "users"]);
    }

    #[test]
    fn test_malformed_file_names_path() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("broken.json"), "{ not json").unwrap();

        let mut loader = ModelLoader::new(temp_dir.path());
        let err = loader.load_all().unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::InvalidSchema);
        assert!(err.message().contains("broken.json"));
    }

    #[test]
    fn test_invalid_model_file_names_path() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("bad.json"), r#"{"a": "date"}"#).unwrap();

        let mut loader = ModelLoader::new(temp_dir.path());
        let err = loader.load_all().unwrap_err();
        assert!(err.message().contains("bad.json"));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let mut loader = ModelLoader::new(&temp_dir.path().join("absent"));

        assert_eq!(loader.load_all().unwrap(), 0);
        assert_eq!(loader.model_count(), 0);
        assert!(loader.build("users").is_err());
    }
}
