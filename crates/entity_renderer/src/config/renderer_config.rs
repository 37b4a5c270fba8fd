//! # Renderer Configuration
//!
//! Tunables for the Vulkan backend and the resource cache: frames in flight,
//! descriptor pool ceiling, garbage collection cadence and debug features.

use serde::{Serialize, Deserialize};
use std::time::Duration;

use super::{Config, ConfigError};

/// Configuration for [`crate::render::Renderer`] and the Vulkan backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Number of frame slots recorded ahead of the GPU
    pub frames_in_flight: usize,
    /// Descriptor sets each pool in a pipeline's pool chain may hold
    pub max_sets_per_pool: u32,
    /// Seconds between sweeps of unused cached resources
    pub gc_interval_secs: f32,
    /// Whether to enable Vulkan validation layers
    pub enable_validation: bool,
    /// Present in FIFO order; when off, mailbox presentation is preferred if available
    pub vsync: bool,
    /// Default log level for [`crate::foundation::logging::init_with_level`]
    pub log_level: String,
}

impl RendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            frames_in_flight: 2,
            max_sets_per_pool: 1024,
            gc_interval_secs: 3.0,
            enable_validation: cfg!(debug_assertions),
            vsync: true,
            log_level: "info".to_string(),
        }
    }

    /// Set the number of frames in flight
    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    /// Set the per-pool descriptor set ceiling
    pub fn with_max_sets_per_pool(mut self, max_sets: u32) -> Self {
        self.max_sets_per_pool = max_sets;
        self
    }

    /// Set the garbage collection interval in seconds
    pub fn with_gc_interval_secs(mut self, seconds: f32) -> Self {
        self.gc_interval_secs = seconds;
        self
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = enabled;
        self
    }

    /// Enable or disable vertical sync
    pub fn with_vsync(mut self, enabled: bool) -> Self {
        self.vsync = enabled;
        self
    }

    /// Garbage collection interval as a [`Duration`]
    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs_f32(self.gc_interval_secs.max(0.0))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.is_empty() {
            return Err(ConfigError::Invalid("Application name cannot be empty".to_string()));
        }

        if self.frames_in_flight == 0 {
            return Err(ConfigError::Invalid("Frames in flight must be at least 1".to_string()));
        }

        if self.frames_in_flight > 8 {
            return Err(ConfigError::Invalid(
                "Frames in flight should not exceed 8".to_string(),
            ));
        }

        if self.max_sets_per_pool == 0 {
            return Err(ConfigError::Invalid("Descriptor pool ceiling must be non-zero".to_string()));
        }

        if !self.gc_interval_secs.is_finite() || self.gc_interval_secs <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "GC interval must be a positive number of seconds, got {}",
                self.gc_interval_secs
            )));
        }

        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new("Entity Renderer Application")
    }
}

impl Config for RendererConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::Builder;

    #[test]
    fn test_defaults_are_valid() {
        let config = RendererConfig::default();
        assert_eq!(config.frames_in_flight, 2);
        assert_eq!(config.max_sets_per_pool, 1024);
        assert_eq!(config.gc_interval(), Duration::from_secs(3));
        assert!(config.vsync);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(RendererConfig::new("").validate().is_err());
        assert!(RendererConfig::default().with_frames_in_flight(0).validate().is_err());
        assert!(RendererConfig::default().with_frames_in_flight(9).validate().is_err());
        assert!(RendererConfig::default().with_max_sets_per_pool(0).validate().is_err());
        assert!(RendererConfig::default().with_gc_interval_secs(0.0).validate().is_err());
        assert!(RendererConfig::default().with_gc_interval_secs(f32::NAN).validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let file = Builder::new().suffix(".toml").tempfile().unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = RendererConfig::new("Toml App").with_max_sets_per_pool(64);
        config.save_to_file(&path).unwrap();

        let loaded = RendererConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_ron_partial_file_uses_defaults() {
        let file = Builder::new().suffix(".ron").tempfile().unwrap();
        std::fs::write(file.path(), "(frames_in_flight: 3)").unwrap();

        let loaded = RendererConfig::load_from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(loaded.frames_in_flight, 3);
        assert_eq!(loaded.max_sets_per_pool, 1024);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = RendererConfig::load_or_default(dir.path().join("renderer.toml")).unwrap();
        assert_eq!(loaded, RendererConfig::default());
    }

    #[test]
    fn test_format_follows_extension() {
        use crate::config::ConfigFormat;
        use std::path::Path;

        assert_eq!(ConfigFormat::from_path(Path::new("a/renderer.toml")).unwrap(), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("renderer.ron")).unwrap(), ConfigFormat::Ron);
        assert!(ConfigFormat::from_path(Path::new("renderer")).is_err());
    }

    #[test]
    fn test_unsupported_extension() {
        let result = RendererConfig::default().save_to_file("renderer.yaml");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
