use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Tuning for a [`crate::TerrainPipeline`]
#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Worker threads for hashing and meshing (0 = available cores - 1, at least 1)
    #[serde(default)]
    pub worker_threads: usize,
    /// Unreferenced meshes kept in the shape cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Directory for region files; memory-only when absent
    #[serde(default)]
    pub store_dir: Option<PathBuf>,
    /// Clean, idle regions kept in memory before eviction
    #[serde(default = "default_max_resident_regions")]
    pub max_resident_regions: usize,
    /// Extra half-extent of the placeholder cuboid beyond the section
    #[serde(default = "default_placeholder_margin")]
    pub placeholder_margin: f32,
    /// Distance around dynamic bodies within which sections count as active
    #[serde(default = "default_activity_margin")]
    pub activity_margin: f32,
    /// Seconds between periodic store flushes
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: f32,
}

fn default_cache_capacity() -> usize {
    4096
}

fn default_max_resident_regions() -> usize {
    16
}

fn default_placeholder_margin() -> f32 {
    0.5
}

fn default_activity_margin() -> f32 {
    4.0
}

fn default_flush_interval_secs() -> f32 {
    10.0
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            cache_capacity: default_cache_capacity(),
            store_dir: None,
            max_resident_regions: default_max_resident_regions(),
            placeholder_margin: default_placeholder_margin(),
            activity_margin: default_activity_margin(),
            flush_interval_secs: default_flush_interval_secs(),
        }
    }
}

impl PipelineConfig {
    /// Number of worker threads to spawn
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads > 0 {
            return self.worker_threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1))
            .unwrap_or(1)
            .max(1)
    }

    /// Half extent of the placeholder cuboid
    pub fn placeholder_half_extent(&self) -> f32 {
        voxel::SECTION_SIZE as f32 / 2.0 + self.placeholder_margin
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.placeholder_margin.is_nan() || self.placeholder_margin < 0.0 {
            return Err(PipelineError::Config(format!(
                "placeholder_margin must be non-negative, got {}",
                self.placeholder_margin
            )));
        }
        if self.activity_margin.is_nan() || self.activity_margin < 0.0 {
            return Err(PipelineError::Config(format!(
                "activity_margin must be non-negative, got {}",
                self.activity_margin
            )));
        }
        if self.flush_interval_secs.is_nan() || self.flush_interval_secs <= 0.0 {
            return Err(PipelineError::Config(format!(
                "flush_interval_secs must be positive, got {}",
                self.flush_interval_secs
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: PipelineConfig = toml::from_str("").unwrap();
        assert_eq!(config.worker_threads, 0);
        assert_eq!(config.cache_capacity, 4096);
        assert!(config.store_dir.is_none());
        assert!(config.resolved_worker_threads() >= 1);
    }

    #[test]
    fn test_partial_toml() {
        let config: PipelineConfig = toml::from_str(
            r#"
            worker_threads = 3
            store_dir = "colliders"
            placeholder_margin = 1.0
            "#,
        )
        .unwrap();
        assert_eq!(config.resolved_worker_threads(), 3);
        assert_eq!(config.store_dir, Some(PathBuf::from("colliders")));
        assert_eq!(config.placeholder_half_extent(), 9.0);
        assert_eq!(config.max_resident_regions, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = PipelineConfig {
            placeholder_margin: -1.0,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));

        let config = PipelineConfig {
            flush_interval_secs: 0.0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
