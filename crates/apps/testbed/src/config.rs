use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use terrain_physics::PipelineConfig;

/// Configuration loaded from a testbed TOML file
///
/// Every table is optional; an empty file yields the defaults.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TestbedConfig {
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl TestbedConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorldConfig {
    #[serde(default = "default_seed")]
    pub seed: u32,
    /// Horizontal streaming radius around the focus, in sections
    #[serde(default = "default_radius")]
    pub radius: i32,
    #[serde(default = "default_min_section_y")]
    pub min_section_y: i32,
    #[serde(default = "default_max_section_y")]
    pub max_section_y: i32,
    /// Mean surface height in cells
    #[serde(default = "default_base_height")]
    pub base_height: f64,
    /// Surface height variation in cells
    #[serde(default = "default_height_scale")]
    pub height_scale: f64,
}

fn default_seed() -> u32 {
    7
}

fn default_radius() -> i32 {
    3
}

fn default_min_section_y() -> i32 {
    -2
}

fn default_max_section_y() -> i32 {
    3
}

fn default_base_height() -> f64 {
    12.0
}

fn default_height_scale() -> f64 {
    10.0
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            radius: default_radius(),
            min_section_y: default_min_section_y(),
            max_section_y: default_max_section_y(),
            base_height: default_base_height(),
            height_scale: default_height_scale(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimulationConfig {
    #[serde(default = "default_gravity")]
    pub gravity: f32,
    #[serde(default = "default_timestep")]
    pub timestep: f32,
    /// Focus movement along +x, in cells per second
    #[serde(default = "default_focus_speed")]
    pub focus_speed: f32,
    /// Dynamic balls dropped over the run
    #[serde(default = "default_ball_count")]
    pub ball_count: usize,
    #[serde(default = "default_ball_radius")]
    pub ball_radius: f32,
    /// Frames between drops
    #[serde(default = "default_drop_interval")]
    pub drop_interval: u64,
    /// Frames between digs under the focus; 0 disables digging
    #[serde(default = "default_dig_interval")]
    pub dig_interval: u64,
}

fn default_gravity() -> f32 {
    -9.81
}

fn default_timestep() -> f32 {
    1.0 / 60.0
}

fn default_focus_speed() -> f32 {
    8.0
}

fn default_ball_count() -> usize {
    16
}

fn default_ball_radius() -> f32 {
    0.4
}

fn default_drop_interval() -> u64 {
    15
}

fn default_dig_interval() -> u64 {
    30
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            gravity: default_gravity(),
            timestep: default_timestep(),
            focus_speed: default_focus_speed(),
            ball_count: default_ball_count(),
            ball_radius: default_ball_radius(),
            drop_interval: default_drop_interval(),
            dig_interval: default_dig_interval(),
        }
    }
}
