//! User configuration at `<home>/.courier/config.yaml`.
//!
//! Every field has a default; a missing file, or a file that sets only some
//! fields, yields defaults for the rest.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};
use crate::store::{courier_dir_at, ensure_dir, home};
use crate::types::{normalize_render_modes, RenderMode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    /// Deadline for one target's pipeline, up to and including the commit.
    pub publish_timeout_secs: u64,
    /// How many targets a single publish processes at once.
    pub max_parallel_targets: usize,
    /// Render modes for organizations without a configuration row.
    pub default_render_modes: Vec<RenderMode>,
    /// Directory whose `*.tera` files override the embedded templates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<PathBuf>,
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            publish_timeout_secs: 60,
            max_parallel_targets: 4,
            default_render_modes: vec![RenderMode::AgentsMd],
            template_dir: None,
        }
    }
}

impl CourierConfig {
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }

    /// Never zero.
    pub fn parallelism(&self) -> usize {
        self.max_parallel_targets.max(1)
    }

    /// Default render modes, normalized; `[AGENTS_MD]` if the list is empty.
    pub fn default_modes(&self) -> Vec<RenderMode> {
        let modes = normalize_render_modes(self.default_render_modes.iter().copied());
        if modes.is_empty() {
            vec![RenderMode::AgentsMd]
        } else {
            modes
        }
    }
}

/// `<home>/.courier/config.yaml`
pub fn config_path_at(home: &Path) -> PathBuf {
    courier_dir_at(home).join("config.yaml")
}

pub fn load_config_at(home: &Path) -> Result<CourierConfig, StoreError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(CourierConfig::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(CourierConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| StoreError::Parse { path, source: e })
}

pub fn load_config() -> Result<CourierConfig, StoreError> {
    load_config_at(&home()?)
}

pub fn save_config_at(home: &Path, config: &CourierConfig) -> Result<(), StoreError> {
    let path = config_path_at(home);
    ensure_dir(&courier_dir_at(home))?;
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&path, yaml).map_err(|e| io_err(&path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let home = TempDir::new().unwrap();
        let config = load_config_at(home.path()).unwrap();
        assert_eq!(config, CourierConfig::default());
        assert_eq!(config.publish_timeout(), Duration::from_secs(60));
        assert_eq!(config.default_modes(), vec![RenderMode::AgentsMd]);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let home = TempDir::new().unwrap();
        let path = config_path_at(home.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "max_parallel_targets: 0\ndefault_render_modes: [CLAUDE, AGENTS_MD]\n")
            .unwrap();
        let config = load_config_at(home.path()).unwrap();
        assert_eq!(config.publish_timeout_secs, 60);
        assert_eq!(config.parallelism(), 1);
        assert_eq!(
            config.default_modes(),
            vec![RenderMode::AgentsMd, RenderMode::Claude]
        );
    }

    #[test]
    fn save_then_load() {
        let home = TempDir::new().unwrap();
        let config = CourierConfig {
            publish_timeout_secs: 5,
            template_dir: Some(PathBuf::from("/tmp/templates")),
            ..CourierConfig::default()
        };
        save_config_at(home.path(), &config).unwrap();
        assert_eq!(load_config_at(home.path()).unwrap(), config);
    }
}
