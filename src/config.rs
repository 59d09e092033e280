use std::env;
use std::time::Duration;

use tracing::warn;

use crate::model::Arena;

pub const TIMESTEP_ENV_VAR: &str = "STARDRIFT_TIMESTEP";
pub const SEED_ENV_VAR: &str = "STARDRIFT_SEED";

/// How many fixed physics steps a scheduled frame runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimestepPolicy {
    /// Exactly one fixed step per frame callback, whatever the real interval was.
    /// Simulation speed follows the display refresh rate.
    PerFrame,
    /// Accumulate real elapsed time and run zero or more fixed steps per callback.
    Accumulated,
}

impl TimestepPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "per-frame" | "per_frame" | "frame" => Some(TimestepPolicy::PerFrame),
            "accumulated" | "fixed" | "accumulator" => Some(TimestepPolicy::Accumulated),
            _ => None,
        }
    }
}

/// Every tuning constant of the demo.
///
/// Usage:
///   // compiled-in defaults
///   let config = FlightConfig::default();
///
///   // or with STARDRIFT_TIMESTEP / STARDRIFT_SEED applied
///   let config = FlightConfig::from_env();
#[derive(Clone, Debug)]
pub struct FlightConfig {
    pub window_title: String,
    pub arena: Arena,

    // Flight model
    pub speed: f64,
    pub turn_speed: f64,
    pub craft_mass: f64,
    pub craft_size: (f64, f64),

    // Scene
    pub star_count: usize,
    pub wall_thickness: f32,
    /// `None` draws a fresh starfield every run.
    pub star_seed: Option<u64>,

    // Timing
    pub fixed_dt: f64,
    pub timestep: TimestepPolicy,
    pub max_frame_delta: Duration,
    pub max_steps_per_frame: u32,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            window_title: "stardrift".to_string(),
            arena: Arena::new(1280, 720),

            speed: 100.0,
            turn_speed: 2.0,
            craft_mass: 1.0,
            craft_size: (52.0, 69.0),

            star_count: 1500,
            wall_thickness: 10.0,
            star_seed: None,

            fixed_dt: 1.0 / 60.0,
            timestep: TimestepPolicy::PerFrame,
            max_frame_delta: Duration::from_millis(250),
            max_steps_per_frame: 5,
        }
    }
}

impl FlightConfig {
    /// Defaults with environment overrides applied. Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::with_overrides(|key| env::var(key).ok())
    }

    /// Defaults with overrides read through `lookup`, keyed by the env var names.
    pub fn with_overrides(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(TIMESTEP_ENV_VAR) {
            match TimestepPolicy::parse(&raw) {
                Some(policy) => config.timestep = policy,
                None => warn!(value = %raw, "ignoring unknown {}", TIMESTEP_ENV_VAR),
            }
        }

        if let Some(raw) = lookup(SEED_ENV_VAR) {
            match raw.trim().parse::<u64>() {
                Ok(seed) => config.star_seed = Some(seed),
                Err(_) => warn!(value = %raw, "ignoring non-numeric {}", SEED_ENV_VAR),
            }
        }

        config
    }
}
