use std::{fmt, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};

/// Errors raised while loading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },
}

impl ConfigError {
    fn invalid(reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            reason: reason.into(),
        }
    }
}

/// Reward constants. No clipping or normalization is applied to the sum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Added once per colliding neighbour, per tick.
    pub collision_penalty: f32,
    pub pickup_base: f32,
    /// Multiplied by the remaining wait ticks of the claimed request.
    pub pickup_time_multiplier: f32,
    pub delivery: f32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        RewardConfig {
            collision_penalty: -1.0,
            pickup_base: 1.0,
            pickup_time_multiplier: 0.0025,
            delivery: 1.0,
        }
    }
}

/// Built-in warehouse sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Small,
    Medium,
    Large,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::Small, Preset::Medium, Preset::Large];
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Preset::Small => "small",
            Preset::Medium => "medium",
            Preset::Large => "large",
        };
        f.write_str(name)
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "small" => Ok(Preset::Small),
            "medium" => Ok(Preset::Medium),
            "large" => Ok(Preset::Large),
            other => Err(ConfigError::invalid(format!("unknown preset '{other}'"))),
        }
    }
}

/// Full simulation configuration.
///
/// Positions in `agent_initial_positions` and `pickup_racks_arrangement` are in
/// *area* coordinates; the world adds `border_width` on every side. Fields
/// missing from a TOML file take the small preset's values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    pub num_agents: usize,
    /// Number of pickup points kept in the waiting state at all times.
    pub num_requests: usize,
    pub area_dimension: f32,
    pub border_width: f32,
    pub agent_radius: f32,
    pub agent_initial_positions: Vec<[f32; 2]>,
    /// Rack centre coordinates, used on both axes.
    pub pickup_racks_arrangement: Vec<f32>,
    pub frames_per_second: u32,
    pub episode_duration_ticks: u64,
    /// Full timer of a freshly generated request.
    pub pickup_wait_ticks: u32,
    pub pickup_tolerance: f32,
    pub delivery_tolerance: f32,
    pub collision_epsilon: f32,
    /// Speed in m/s of an action with a component at magnitude 1.
    pub max_speed: f32,
    pub rewards: RewardConfig,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        WarehouseConfig::preset(Preset::Small)
    }
}

impl WarehouseConfig {
    /// Returns the configuration of a built-in warehouse size.
    pub fn preset(preset: Preset) -> Self {
        let (num_agents, num_requests, area_dimension, agent_initial_positions, racks) =
            match preset {
                Preset::Small => (2, 2, 8.0, vec![[2.0, 2.0], [6.0, 6.0]], vec![4.0]),
                Preset::Medium => (
                    4,
                    8,
                    12.0,
                    vec![[2.0, 2.0], [2.0, 10.0], [10.0, 2.0], [10.0, 10.0]],
                    vec![4.0, 8.0],
                ),
                Preset::Large => {
                    let mut positions = Vec::with_capacity(16);
                    for y in [2.0, 6.0, 10.0, 14.0, 18.0] {
                        positions.push([2.0, y]);
                    }
                    for y in [2.0, 6.0, 10.0, 14.0, 18.0] {
                        positions.push([18.0, y]);
                    }
                    for x in [6.0, 10.0, 14.0] {
                        positions.push([x, 2.0]);
                    }
                    for x in [6.0, 10.0, 14.0] {
                        positions.push([x, 18.0]);
                    }
                    (16, 24, 20.0, positions, vec![4.0, 8.0, 12.0, 16.0])
                }
            };

        let frames_per_second = 10;
        WarehouseConfig {
            num_agents,
            num_requests,
            area_dimension,
            border_width: 1.0,
            agent_radius: 0.4,
            agent_initial_positions,
            pickup_racks_arrangement: racks,
            frames_per_second,
            episode_duration_ticks: 200 * u64::from(frames_per_second),
            pickup_wait_ticks: 40 * frames_per_second,
            pickup_tolerance: 0.3,
            delivery_tolerance: 0.3,
            collision_epsilon: 0.05,
            max_speed: 1.0,
            rewards: RewardConfig::default(),
        }
    }

    /// Parses a TOML document. Does not validate.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Reads and parses a TOML file. Does not validate.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Side length of the whole world, walls included.
    pub fn world_dimension(&self) -> f32 {
        self.area_dimension + 2.0 * self.border_width
    }

    /// Duration of one tick in seconds.
    pub fn tick_duration(&self) -> f32 {
        1.0 / self.frames_per_second as f32
    }

    pub fn num_pickup_points(&self) -> usize {
        4 * self.pickup_racks_arrangement.len() * self.pickup_racks_arrangement.len()
    }

    pub fn num_delivery_points(&self) -> usize {
        if !(self.area_dimension > 4.0) {
            return 0;
        }
        4 * (self.area_dimension.floor() as usize - 4)
    }

    /// Checks every construction-time constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_agents == 0 {
            return Err(ConfigError::invalid("num_agents must be at least 1"));
        }
        if self.num_requests == 0 {
            return Err(ConfigError::invalid("num_requests must be at least 1"));
        }
        if self.agent_initial_positions.len() != self.num_agents {
            return Err(ConfigError::invalid(format!(
                "agent_initial_positions has {} entries but num_agents is {}",
                self.agent_initial_positions.len(),
                self.num_agents
            )));
        }

        let positive = [
            ("area_dimension", self.area_dimension),
            ("agent_radius", self.agent_radius),
            ("pickup_tolerance", self.pickup_tolerance),
            ("delivery_tolerance", self.delivery_tolerance),
            ("max_speed", self.max_speed),
        ];
        for (name, value) in positive {
            if !(value > 0.0) || !value.is_finite() {
                return Err(ConfigError::invalid(format!(
                    "{name} must be positive and finite, got {value}"
                )));
            }
        }
        for (name, value) in [
            ("border_width", self.border_width),
            ("collision_epsilon", self.collision_epsilon),
        ] {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(ConfigError::invalid(format!(
                    "{name} must be non-negative and finite, got {value}"
                )));
            }
        }

        if self.frames_per_second == 0 {
            return Err(ConfigError::invalid("frames_per_second must be at least 1"));
        }
        if self.episode_duration_ticks == 0 {
            return Err(ConfigError::invalid(
                "episode_duration_ticks must be at least 1",
            ));
        }
        if self.pickup_wait_ticks == 0 {
            return Err(ConfigError::invalid("pickup_wait_ticks must be at least 1"));
        }

        let num_pickup_points = self.num_pickup_points();
        if self.num_requests > num_pickup_points {
            return Err(ConfigError::invalid(format!(
                "num_requests ({}) exceeds the number of pickup points ({num_pickup_points})",
                self.num_requests
            )));
        }
        let num_delivery_points = self.num_delivery_points();
        if self.num_requests > num_delivery_points {
            return Err(ConfigError::invalid(format!(
                "num_requests ({}) exceeds the number of delivery points ({num_delivery_points})",
                self.num_requests
            )));
        }

        for (i, [x, y]) in self.agent_initial_positions.iter().enumerate() {
            let inside = |v: f32| v >= 0.0 && v <= self.area_dimension;
            if !inside(*x) || !inside(*y) {
                return Err(ConfigError::invalid(format!(
                    "initial position of agent {i} ({x}, {y}) is outside the area"
                )));
            }
        }

        Ok(())
    }
}
