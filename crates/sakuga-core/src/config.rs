use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{SakugaError, SakugaResult};

/// Layer inclusion and deduplication policy for one export run.
///
/// A run's behavior is fully determined by its inputs, so the policy is a
/// plain immutable value threaded through every pipeline stage rather than
/// ambient state.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ExportPolicy {
    /// Include layers that are hidden in the source document.
    pub include_invisible: bool,
    /// Include layers carrying the reference (guide) marker.
    pub include_reference: bool,
    /// Include paint layers that have no keyframes, as single-image columns.
    pub include_static: bool,
    /// Export a group with animated descendants as one flattened unit
    /// instead of one unit per descendant.
    pub flatten_animated_groups: bool,
    /// Widen deduplication across units by hashing rendered content.
    pub cross_layer_dedup: bool,
}

impl Default for ExportPolicy {
    fn default() -> Self {
        Self {
            include_invisible: false,
            include_reference: false,
            include_static: false,
            flatten_animated_groups: true,
            cross_layer_dedup: false,
        }
    }
}

/// Full configuration for an export run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportConfig {
    /// Inclusion / dedup policy.
    #[serde(default)]
    pub policy: ExportPolicy,
    /// Base directory the run directory is created under.
    pub output_dir: PathBuf,
    /// Scene name override. Defaults to the sanitized document name.
    #[serde(default)]
    pub scene_name: Option<String>,
    /// Zero-pad width for output sequence numbers.
    #[serde(default = "default_pad_width")]
    pub pad_width: usize,
    /// Path to the OpenToonz executable. Used only by the (out of scope)
    /// launch step; the core pipeline never touches it.
    #[serde(default)]
    pub opentoonz_path: Option<PathBuf>,
}

fn default_pad_width() -> usize {
    4
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            policy: ExportPolicy::default(),
            output_dir: PathBuf::from("."),
            scene_name: None,
            pad_width: default_pad_width(),
            opentoonz_path: None,
        }
    }
}

impl ExportConfig {
    pub fn load_from_file(path: &std::path::Path) -> SakugaResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: ExportConfig =
            toml::from_str(&contents).map_err(|e| SakugaError::Config(e.to_string()))?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &std::path::Path) -> SakugaResult<()> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| SakugaError::Config(e.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_defaults() {
        let policy = ExportPolicy::default();
        assert!(!policy.include_invisible);
        assert!(!policy.include_reference);
        assert!(!policy.include_static);
        assert!(policy.flatten_animated_groups);
        assert!(!policy.cross_layer_dedup);
    }

    #[test]
    fn test_config_toml_round_trip() {
        let mut config = ExportConfig::default();
        config.output_dir = PathBuf::from("/exports");
        config.scene_name = Some("CutA".into());
        config.policy.include_static = true;

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: ExportConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.output_dir, PathBuf::from("/exports"));
        assert_eq!(parsed.scene_name.as_deref(), Some("CutA"));
        assert!(parsed.policy.include_static);
        assert_eq!(parsed.pad_width, 4);
    }

    #[test]
    fn test_config_minimal_toml() {
        let parsed: ExportConfig = toml::from_str("output_dir = \"/tmp/out\"").unwrap();
        assert_eq!(parsed.pad_width, 4);
        assert!(parsed.scene_name.is_none());
        assert!(!parsed.policy.cross_layer_dedup);
    }
}
