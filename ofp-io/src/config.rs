//! Batch configuration, loaded from YAML

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use ofp_core::coordinate::CrsCode;
use ofp_core::footprint::VertexPolicy;
use ofp_core::raster::{BufferOptions, OutlineStyle};
use serde::{Deserialize, Serialize};

use crate::error::{IoError, Result};

/// Which renderings a batch produces per pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Footprint masked and cropped
    #[default]
    Masked,
    /// Buffered boundary drawn on the unmasked crop
    Outlined,
    Both,
}

impl OutputMode {
    pub fn renderings(&self) -> &'static [Rendering] {
        match self {
            OutputMode::Masked => &[Rendering::Masked],
            OutputMode::Outlined => &[Rendering::Outlined],
            OutputMode::Both => &[Rendering::Masked, Rendering::Outlined],
        }
    }
}

/// One output image kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rendering {
    Masked,
    Outlined,
}

impl Rendering {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rendering::Masked => "masked",
            Rendering::Outlined => "outlined",
        }
    }
}

impl fmt::Display for Rendering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retry schedule for transient collaborator failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Pause before the first retry; doubled for every further retry
    pub initial_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
        }
    }
}

impl RetryPolicy {
    /// Pause after the given failed attempt (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Imagery collections, in the order results are reported
    pub collections: Vec<String>,
    /// Viewing directions, in the order results are reported within a collection
    pub directions: Vec<String>,
    /// Half-size in degrees of the catalog query box around the geocoded address
    pub bbox_margin_deg: f64,
    /// Projected CRS the footprint is brought into before terrain lookup
    pub working_crs: CrsCode,
    pub buffer: BufferOptions,
    pub vertex_policy: VertexPolicy,
    pub output: OutputMode,
    /// Fail a pair instead of passing the image through when the buffered footprint is empty
    pub require_visible_footprint: bool,
    /// Pairs processed concurrently; keep within the imagery service's rate limit
    pub max_workers: usize,
    pub retry: RetryPolicy,
    pub outline: OutlineStyle,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            collections: Vec::new(),
            directions: ["north", "east", "south", "west"]
                .into_iter()
                .map(String::from)
                .collect(),
            bbox_margin_deg: 0.0001,
            working_crs: CrsCode::ETRS89_UTM32N,
            buffer: BufferOptions::default(),
            vertex_policy: VertexPolicy::default(),
            output: OutputMode::default(),
            require_visible_footprint: false,
            max_workers: 4,
            retry: RetryPolicy::default(),
            outline: OutlineStyle::default(),
        }
    }
}

impl BatchConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: BatchConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.collections.is_empty() {
            return Err(IoError::InvalidInput("at least one collection is required".into()));
        }
        if self.directions.is_empty() {
            return Err(IoError::InvalidInput("at least one direction is required".into()));
        }
        ensure_unique("collection", &self.collections)?;
        ensure_unique("direction", &self.directions)?;

        if !(self.bbox_margin_deg.is_finite() && self.bbox_margin_deg > 0.0) {
            return Err(IoError::InvalidInput(format!(
                "bbox_margin_deg must be positive, got {}",
                self.bbox_margin_deg
            )));
        }
        if !(self.buffer.distance.is_finite() && self.buffer.distance >= 0.0) {
            return Err(IoError::InvalidInput(format!(
                "buffer distance must be >= 0, got {}",
                self.buffer.distance
            )));
        }
        if self.working_crs.is_geographic() {
            return Err(IoError::InvalidInput(format!(
                "working CRS must be projected, got {}",
                self.working_crs
            )));
        }
        if self.max_workers == 0 {
            return Err(IoError::InvalidInput("max_workers must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(IoError::InvalidInput("retry.max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

fn ensure_unique(kind: &str, names: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(IoError::InvalidInput(format!("duplicate {kind} `{name}`")));
        }
    }
    Ok(())
}
