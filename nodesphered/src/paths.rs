//! Cross-platform application paths

use std::path::{Path, PathBuf};

use nodesphere::EngineConfig;
use tracing::info;

use crate::error::HostError;

#[derive(Debug, Clone)]
pub struct AppPaths {
    data_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> Result<Self, HostError> {
        let base = dirs::data_dir().ok_or(HostError::NoDataDir)?;
        Ok(Self::at(base.join("nodesphere")))
    }

    pub fn at(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }
}

/// Load the engine configuration.
///
/// An explicit path must exist. Otherwise the data-directory `config.json` is used when
/// present, and defaults when not.
pub fn load_config(
    paths: Option<&AppPaths>,
    explicit: Option<&Path>,
) -> Result<EngineConfig, HostError> {
    let path = match (explicit, paths) {
        (Some(p), _) => p.to_path_buf(),
        (None, Some(paths)) if paths.config_file().exists() => paths.config_file(),
        _ => {
            info!("No config file; using defaults");
            return Ok(EngineConfig::default());
        }
    };
    let text = std::fs::read_to_string(&path).map_err(|e| HostError::ConfigRead {
        path: path.clone(),
        source: e,
    })?;
    let cfg = EngineConfig::from_json(&text)?;
    info!("Config loaded from {:?}", path);
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_default_config_yields_defaults() {
        let paths = AppPaths::at(std::env::temp_dir().join("nodesphere-no-such-dir"));
        let cfg = load_config(Some(&paths), None).unwrap();
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn explicit_config_must_exist() {
        let missing = std::env::temp_dir().join("nodesphere-missing-config.json");
        let err = load_config(None, Some(&missing)).unwrap_err();
        assert!(matches!(err, HostError::ConfigRead { .. }));
    }

    #[test]
    fn explicit_config_is_parsed() {
        let path = std::env::temp_dir().join(format!(
            "nodesphere-config-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{"initial_node_count": 30, "seed": 5}"#).unwrap();
        let cfg = load_config(None, Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(cfg.initial_node_count, 30);
        assert_eq!(cfg.seed, Some(5));
    }
}
