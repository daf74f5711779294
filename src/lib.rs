pub mod detect;
pub mod display;
pub mod pipeline;
pub mod source;
pub mod utils;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

pub use detect::{Detection, DetectionError, DetectionModel, DetectionStage};
pub use pipeline::{frame_queue, FrameConsumer, FrameProducer};
pub use source::{AnnotatedFrame, PixelFormat, RawFrame, SourceDescriptor, SourceError};

/// Global configuration that can be atomically swapped at runtime
pub static CONFIG: once_cell::sync::Lazy<ArcSwap<Config>> =
    once_cell::sync::Lazy::new(|| ArcSwap::from_pointee(Config::default()));

/// System configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub detection: DetectionConfig,
    pub pipeline: PipelineConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Played when no --source argument is given
    pub default_source: String,
    /// How long startup waits for the first decoded frame
    pub startup_grace_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Detections below this score are not drawn
    pub confidence_threshold: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Capacity of the annotated-frame hand-off queue
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    /// Sleep between queue polls when no frame is ready
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            detection: DetectionConfig::default(),
            pipeline: PipelineConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            default_source: "demo_videos/people_walking.mp4".into(),
            startup_grace_ms: 5000,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { queue_capacity: 10 }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            poll_interval_ms: 10,
        }
    }
}

impl Config {
    /// Load configuration from an optional `argus.toml` plus `ARGUS_*`
    /// environment overrides, falling back to defaults for anything unset.
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("argus").required(false))
            .add_source(config::Environment::with_prefix("ARGUS").separator("__"))
            .build()?
            .try_deserialize()
    }
}
