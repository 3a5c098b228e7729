//! Configuration for the matching engine.
//!
//! All parameters have defaults matching the reference anatomical template
//! and the original scoring pipeline. Configurations can be loaded from
//! YAML files for reproducible runs:
//!
//! ```rust,ignore
//! use hemimatch::EngineConfig;
//!
//! let config = EngineConfig::from_yaml_file("engine.yaml")?;
//! config.validate()?;
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{MatchError, Result};

/// Anatomical template parameters.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// X coordinate of the bilateral midline plane, in template units.
    /// Mirroring replaces x with `midline - x`.
    /// Default: 627.0 (JRC2018U template).
    pub midline: f32,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self { midline: 627.0 }
    }
}

impl TemplateConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter for the midline constant.
    pub fn with_midline(mut self, midline: f32) -> Self {
        self.midline = midline;
        self
    }
}

/// Dotprops derivation parameters (query and candidate sides alike).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DotpropsConfig {
    /// Template units per voxel when lifting a binary volume to a point
    /// cloud. Default: 1.0 (volumes already registered to template space).
    pub voxel_pitch: f32,

    /// Neighborhood size for tangent estimation.
    /// Default: 100, as used by the original NBLAST invocation.
    pub tangent_neighbors: usize,

    /// Grid cell size for density resampling, in template units.
    /// Default: 1.0.
    pub resample_spacing: f32,

    /// Maximum gap between points of the same connected piece. Fragments
    /// not linked to the dominant piece within this distance are pruned.
    /// Default: 5.0.
    pub fragment_link_distance: f32,
}

impl Default for DotpropsConfig {
    fn default() -> Self {
        Self {
            voxel_pitch: 1.0,
            tangent_neighbors: 100,
            resample_spacing: 1.0,
            fragment_link_distance: 5.0,
        }
    }
}

impl DotpropsConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter for the voxel pitch.
    pub fn with_voxel_pitch(mut self, pitch: f32) -> Self {
        self.voxel_pitch = pitch;
        self
    }

    /// Builder-style setter for the tangent neighborhood size.
    pub fn with_tangent_neighbors(mut self, k: usize) -> Self {
        self.tangent_neighbors = k;
        self
    }

    /// Builder-style setter for the resample spacing.
    pub fn with_resample_spacing(mut self, spacing: f32) -> Self {
        self.resample_spacing = spacing;
        self
    }

    /// Builder-style setter for the fragment link distance.
    pub fn with_fragment_link_distance(mut self, distance: f32) -> Self {
        self.fragment_link_distance = distance;
        self
    }
}

/// Parameters of the built-in shape similarity scorer.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ScorerConfig {
    /// Distance falloff of the nearest-neighbor kernel, in template units.
    /// Default: 5.0.
    pub sigma: f32,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self { sigma: 5.0 }
    }
}

impl ScorerConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter for the kernel falloff.
    pub fn with_sigma(mut self, sigma: f32) -> Self {
        self.sigma = sigma;
        self
    }
}

/// Top-level engine configuration.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Anatomical template parameters.
    #[serde(default)]
    pub template: TemplateConfig,
    /// Dotprops derivation parameters.
    #[serde(default)]
    pub dotprops: DotpropsConfig,
    /// Built-in shape scorer parameters.
    #[serde(default)]
    pub scorer: ScorerConfig,
}

impl EngineConfig {
    /// Parse a configuration from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if !self.template.midline.is_finite() {
            return Err(MatchError::Config(
                "template.midline must be finite".to_string(),
            ));
        }
        if self.dotprops.voxel_pitch <= 0.0 {
            return Err(MatchError::Config(
                "dotprops.voxel_pitch must be positive".to_string(),
            ));
        }
        if self.dotprops.tangent_neighbors < 2 {
            return Err(MatchError::Config(
                "dotprops.tangent_neighbors must be at least 2".to_string(),
            ));
        }
        if self.dotprops.resample_spacing <= 0.0 {
            return Err(MatchError::Config(
                "dotprops.resample_spacing must be positive".to_string(),
            ));
        }
        if self.dotprops.fragment_link_distance <= 0.0 {
            return Err(MatchError::Config(
                "dotprops.fragment_link_distance must be positive".to_string(),
            ));
        }
        if self.scorer.sigma <= 0.0 {
            return Err(MatchError::Config(
                "scorer.sigma must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
