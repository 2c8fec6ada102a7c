//! Viewer configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Result, SvgKitError};

/// Viewer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Spatial index tuning
    pub index: IndexConfig,

    /// Raster output settings
    pub render: RenderConfig,

    /// Text defaults
    pub text: TextConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Entries a quadtree leaf holds before it splits
    pub max_node_capacity: usize,

    /// Depth past which leaves stop splitting and accept overflow
    pub max_depth: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Output width in pixels; 0 means use the document width
    pub width: u32,

    /// Output height in pixels; 0 means use the document height
    pub height: u32,

    /// Background RGBA, painted before the scene
    pub background: [u8; 4],

    /// Fill used for highlighted shapes
    pub highlight_color: [u8; 4],

    /// Anti-aliased rasterization
    pub anti_alias: bool,

    /// Line segments used when flattening one curve for hit-test bounds
    pub curve_segments: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    /// Font family when none is inherited
    pub default_font_family: String,

    /// Font size when none is inherited
    pub default_font_size: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            index: IndexConfig::default(),
            render: RenderConfig::default(),
            text: TextConfig::default(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_node_capacity: 10,
            max_depth: 12,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            background: [255, 255, 255, 255],
            highlight_color: [255, 200, 0, 160],
            anti_alias: true,
            curve_segments: 16,
        }
    }
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            default_font_family: "sans-serif".to_string(),
            default_font_size: 12.0,
        }
    }
}

impl ViewerConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SvgKitError::config_with_source("invalid viewer config", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "Loaded viewer config");
        Self::from_json_str(&json)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SvgKitError::config_with_source("cannot serialize viewer config", e))
    }

    /// Reject settings that would make the index or rasterizer unusable.
    pub fn validate(&self) -> Result<()> {
        if self.index.max_node_capacity == 0 {
            return Err(SvgKitError::config("index.max_node_capacity must be at least 1"));
        }
        if self.render.curve_segments == 0 {
            return Err(SvgKitError::config("render.curve_segments must be at least 1"));
        }
        if !(self.text.default_font_size > 0.0) {
            return Err(SvgKitError::config("text.default_font_size must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ViewerConfig::default();
        assert_eq!(config.index.max_node_capacity, 10);
        assert!(config.render.anti_alias);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = ViewerConfig::from_json_str(r#"{"index": {"max_depth": 4}}"#).unwrap();
        assert_eq!(config.index.max_depth, 4);
        assert_eq!(config.index.max_node_capacity, 10);
        assert_eq!(config.text.default_font_family, "sans-serif");
    }

    #[test]
    fn test_invalid_capacity() {
        let err = ViewerConfig::from_json_str(r#"{"index": {"max_node_capacity": 0}}"#)
            .unwrap_err();
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn test_malformed_json() {
        assert!(ViewerConfig::from_json_str("{ index: ").is_err());
    }

    #[test]
    fn test_load_roundtrip_file() {
        let mut config = ViewerConfig::default();
        config.render.width = 640;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_json_string().unwrap().as_bytes())
            .unwrap();

        let loaded = ViewerConfig::load(file.path()).unwrap();
        assert_eq!(loaded, config);
    }
}
