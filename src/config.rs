// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::transform::CumulativePolicy;

pub const ENV_CONFIG_PATH: &str = "PODCAST_METRICS_CONFIG";
pub const ENV_META_DIR: &str = "META_DIR";
pub const ENV_PAYLOAD_DIR: &str = "PAYLOAD_DIR";
pub const ENV_EVENTS_PATH: &str = "EVENT_MARKER_FILE_NAME";

pub const DEFAULT_TOML_PATH: &str = "config/pipeline.toml";
pub const DEFAULT_JSON_PATH: &str = "config/pipeline.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root of the metadata records.
    pub meta_dir: PathBuf,
    /// Root of the content-addressed payload blobs.
    pub payload_dir: PathBuf,
    /// Optional annotation events file (JSON or TOML).
    pub events_path: Option<PathBuf>,
    pub reconcile: CumulativePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            meta_dir: PathBuf::from("data/meta"),
            payload_dir: PathBuf::from("data/payload"),
            events_path: None,
            reconcile: CumulativePolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_config(&content, ext.as_str())
            .with_context(|| format!("parsing pipeline config {}", path.display()))
    }

    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $PODCAST_METRICS_CONFIG
    /// 2) config/pipeline.toml
    /// 3) config/pipeline.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else if Path::new(DEFAULT_TOML_PATH).exists() {
            Self::load_from(Path::new(DEFAULT_TOML_PATH))?
        } else if Path::new(DEFAULT_JSON_PATH).exists() {
            Self::load_from(Path::new(DEFAULT_JSON_PATH))?
        } else {
            Self::default()
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// $META_DIR, $PAYLOAD_DIR and $EVENT_MARKER_FILE_NAME win over file values.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = non_empty_env(ENV_META_DIR) {
            self.meta_dir = PathBuf::from(v);
        }
        if let Some(v) = non_empty_env(ENV_PAYLOAD_DIR) {
            self.payload_dir = PathBuf::from(v);
        }
        if let Some(v) = non_empty_env(ENV_EVENTS_PATH) {
            self.events_path = Some(PathBuf::from(v));
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<PipelineConfig> {
    if hint_ext == "toml" {
        return toml::from_str(s).context("invalid TOML");
    }
    if hint_ext == "json" {
        return serde_json::from_str(s).context("invalid JSON");
    }
    // Unknown extension: JSON first, then TOML.
    serde_json::from_str(s)
        .or_else(|_| toml::from_str(s))
        .map_err(|_| anyhow!("unsupported pipeline config format"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, Provider};
    use crate::transform::Accumulation;

    #[test]
    fn toml_overrides_selected_fields() {
        let cfg = parse_config(
            r#"
meta_dir = "/srv/meta"

[reconcile]
providers = ["Amazon"]

[reconcile.fields]
follower_count = "additive"
"#,
            "toml",
        )
        .unwrap();
        assert_eq!(cfg.meta_dir, PathBuf::from("/srv/meta"));
        assert_eq!(cfg.payload_dir, PathBuf::from("data/payload"));
        assert!(cfg.reconcile.is_cumulative(Provider::Amazon));
        assert!(!cfg.reconcile.is_cumulative(Provider::Spotify));
        assert_eq!(
            cfg.reconcile.accumulation(Field::FollowerCount),
            Accumulation::Additive
        );
        assert_eq!(
            cfg.reconcile.accumulation(Field::StreamCount),
            Accumulation::Additive
        );
    }

    #[test]
    fn json_and_unknown_extensions_parse() {
        let j = r#"{"payload_dir": "/p", "events_path": "events.json"}"#;
        let a = parse_config(j, "json").unwrap();
        let b = parse_config(j, "").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.events_path, Some(PathBuf::from("events.json")));
        assert_eq!(a.reconcile, CumulativePolicy::default());
        assert!(parse_config("[[[", "").is_err());
    }
}
