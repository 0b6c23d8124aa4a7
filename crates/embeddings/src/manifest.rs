//! `models/manifest.json`: declared model dimensions and asset locations.

use crate::config::EmbeddingConfig;
use crate::error::{EmbeddingError, Result};
use codeintel_code_chunker::Domain;
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Deserialize)]
pub struct ModelsManifest {
    pub schema_version: u32,
    pub models: Vec<ManifestModel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestModel {
    pub id: String,
    pub dimension: usize,
    pub max_length: usize,
    pub max_batch: usize,
    #[serde(default)]
    pub assets: Vec<ManifestAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestAsset {
    pub path: String,
}

/// Files of one model on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAssets {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
}

impl ModelsManifest {
    /// Read `<model_dir>/manifest.json`; `Ok(None)` when there is no manifest
    pub fn load(model_dir: &Path) -> Result<Option<Self>> {
        let path = model_dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)?;
        let manifest = Self::parse(&raw).map_err(|err| {
            EmbeddingError::configuration(format!("Invalid models manifest {}: {err}", path.display()))
        })?;
        Ok(Some(manifest))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let manifest: Self = serde_json::from_str(raw)?;
        if manifest.schema_version != 1 {
            return Err(EmbeddingError::configuration(format!(
                "Unsupported models manifest schema_version {} (expected 1)",
                manifest.schema_version
            )));
        }
        for model in &manifest.models {
            for asset in &model.assets {
                safe_rel_path_from_manifest(&model.id, &asset.path)?;
            }
        }
        Ok(manifest)
    }

    pub fn model(&self, id: &str) -> Option<&ManifestModel> {
        self.models.iter().find(|m| m.id.eq_ignore_ascii_case(id))
    }

    /// Every configured domain must declare the manifest's dimension for its model
    pub fn check_dimensions(&self, config: &EmbeddingConfig) -> Result<()> {
        for domain in Domain::ALL {
            let declared = config.domain(domain);
            let Some(model) = self.model(&declared.model_id) else {
                continue;
            };
            if model.dimension != declared.dimension {
                return Err(EmbeddingError::configuration(format!(
                    "{domain} model '{}' is configured with dimension {} but the manifest declares {}",
                    declared.model_id, declared.dimension, model.dimension
                )));
            }
        }
        Ok(())
    }

    /// Locate the ONNX file and tokenizer of `model_id` under `model_dir`
    pub fn assets_for(&self, model_dir: &Path, model_id: &str) -> Result<ModelAssets> {
        let Some(model) = self.model(model_id) else {
            let available = self
                .models
                .iter()
                .map(|m| m.id.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(EmbeddingError::configuration(format!(
                "Unknown embedding model id '{model_id}'. Available: {available}"
            )));
        };

        let prefix = format!("{}/", model.id);
        let mut onnx_rel_path: Option<PathBuf> = None;
        let mut tokenizer_rel_path: Option<PathBuf> = None;
        for asset in &model.assets {
            let rel = asset
                .path
                .strip_prefix(&prefix)
                .unwrap_or(asset.path.as_str());
            let asset_path = Path::new(asset.path.as_str());
            if onnx_rel_path.is_none()
                && asset_path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("onnx"))
            {
                onnx_rel_path = Some(safe_rel_path_from_manifest(&model.id, rel)?);
            }
            if tokenizer_rel_path.is_none()
                && asset_path
                    .file_name()
                    .is_some_and(|name| name.eq_ignore_ascii_case("tokenizer.json"))
            {
                tokenizer_rel_path = Some(safe_rel_path_from_manifest(&model.id, rel)?);
            }
        }

        Ok(default_assets(model_dir, &model.id, onnx_rel_path, tokenizer_rel_path))
    }
}

/// `<model_dir>/<id>/model.onnx` and `tokenizer.json` unless the manifest says otherwise
pub fn default_assets(
    model_dir: &Path,
    model_id: &str,
    onnx_rel_path: Option<PathBuf>,
    tokenizer_rel_path: Option<PathBuf>,
) -> ModelAssets {
    let dir = model_dir.join(model_id);
    ModelAssets {
        model_path: dir.join(onnx_rel_path.unwrap_or_else(|| PathBuf::from("model.onnx"))),
        tokenizer_path: dir
            .join(tokenizer_rel_path.unwrap_or_else(|| PathBuf::from("tokenizer.json"))),
    }
}

fn validate_relative_manifest_path(path: &Path) -> Result<()> {
    let mut has_component = false;
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                return Err(EmbeddingError::configuration(
                    "models manifest asset path must be relative",
                ));
            }
            Component::ParentDir => {
                return Err(EmbeddingError::configuration(
                    "models manifest asset path must not contain '..'",
                ));
            }
            Component::CurDir => {}
            Component::Normal(_) => {
                has_component = true;
            }
        }
    }

    if !has_component {
        return Err(EmbeddingError::configuration(
            "models manifest asset path is empty",
        ));
    }

    Ok(())
}

fn safe_rel_path_from_manifest(model_id: &str, rel: &str) -> Result<PathBuf> {
    let path = Path::new(rel);
    validate_relative_manifest_path(path).map_err(|err| {
        EmbeddingError::configuration(format!(
            "Invalid models manifest asset path for model '{model_id}': '{rel}' ({err})"
        ))
    })?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MANIFEST: &str = r#"
{
  "schema_version": 1,
  "models": [
    {"id":"bge-base-en-v1.5","dimension":768,"max_length":512,"max_batch":32,
     "assets":[{"path":"bge-base-en-v1.5/onnx/model.onnx"},{"path":"bge-base-en-v1.5/tokenizer.json"}]},
    {"id":"unixcoder-base","dimension":768,"max_length":1024,"max_batch":16}
  ]
}
"#;

    #[test]
    fn resolves_assets() {
        let manifest = ModelsManifest::parse(MANIFEST).unwrap();
        let dir = Path::new("/models");

        let assets = manifest.assets_for(dir, "BGE-base-en-v1.5").unwrap();
        assert_eq!(
            assets.model_path,
            PathBuf::from("/models/bge-base-en-v1.5/onnx/model.onnx")
        );
        assert_eq!(
            assets.tokenizer_path,
            PathBuf::from("/models/bge-base-en-v1.5/tokenizer.json")
        );

        let defaults = manifest.assets_for(dir, "unixcoder-base").unwrap();
        assert_eq!(
            defaults.model_path,
            PathBuf::from("/models/unixcoder-base/model.onnx")
        );
        assert!(manifest.assets_for(dir, "missing").is_err());
    }

    #[test]
    fn rejects_path_traversal_assets() {
        let raw = r#"{"schema_version":1,"models":[
            {"id":"m1","dimension":8,"max_length":16,"max_batch":2,"assets":[{"path":"m1/../evil.onnx"}]}]}"#;
        let err = ModelsManifest::parse(raw).unwrap_err();
        assert!(
            err.to_string().contains("Invalid models manifest asset path"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn rejects_absolute_assets() {
        let raw = r#"{"schema_version":1,"models":[
            {"id":"m1","dimension":8,"max_length":16,"max_batch":2,"assets":[{"path":"/etc/passwd.onnx"}]}]}"#;
        assert!(ModelsManifest::parse(raw).is_err());
    }

    #[test]
    fn rejects_unknown_schema() {
        let raw = r#"{"schema_version":2,"models":[]}"#;
        assert!(ModelsManifest::parse(raw).is_err());
    }

    #[test]
    fn dimension_cross_check() {
        let manifest = ModelsManifest::parse(MANIFEST).unwrap();
        let mut config = EmbeddingConfig::default();
        manifest.check_dimensions(&config).unwrap();

        config.text.dimension = 384;
        config.code.dimension = 384;
        let err = manifest.check_dimensions(&config).unwrap_err();
        assert!(err.to_string().contains("manifest declares 768"), "{err}");
    }

    #[test]
    fn missing_manifest_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ModelsManifest::load(dir.path()).unwrap().is_none());

        std::fs::write(dir.path().join(MANIFEST_FILE), MANIFEST).unwrap();
        let loaded = ModelsManifest::load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.models.len(), 2);
    }
}
