use synthpop_core::simulation::DEFAULT_READY_PROBABILITY;

/// Default number of fulfillment attempts before a job is marked failed.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Engine configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How many times fulfillment is attempted before the job record is
    /// marked failed (default: `3`).
    pub max_attempts: u32,
    /// Share of submissions resolved immediately without a background run
    /// (default: `0.30`). Consumed when constructing the default simulator.
    pub ready_probability: f64,
    /// Multiplier applied to simulated waits, e.g. `0.001` to compress an
    /// hour-long run into seconds for local development (default: `1.0`).
    pub time_scale: f64,
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default |
    /// |----------------------------|---------|
    /// | `MAX_FULFILLMENT_ATTEMPTS` | `3`     |
    /// | `READY_PROBABILITY`        | `0.30`  |
    /// | `SIMULATION_TIME_SCALE`    | `1.0`   |
    pub fn from_env() -> Self {
        let max_attempts: u32 = std::env::var("MAX_FULFILLMENT_ATTEMPTS")
            .unwrap_or_else(|_| DEFAULT_MAX_ATTEMPTS.to_string())
            .parse()
            .expect("MAX_FULFILLMENT_ATTEMPTS must be a valid u32");

        let ready_probability: f64 = std::env::var("READY_PROBABILITY")
            .unwrap_or_else(|_| DEFAULT_READY_PROBABILITY.to_string())
            .parse()
            .expect("READY_PROBABILITY must be a valid f64");

        let time_scale: f64 = std::env::var("SIMULATION_TIME_SCALE")
            .unwrap_or_else(|_| "1.0".into())
            .parse()
            .expect("SIMULATION_TIME_SCALE must be a valid f64");

        Self {
            max_attempts,
            ready_probability,
            time_scale,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            ready_probability: DEFAULT_READY_PROBABILITY,
            time_scale: 1.0,
        }
    }
}
