use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

use crate::math::CheckerConfig;
use crate::services::step_service::StepConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub public_rps: u32,
    pub default_tolerance: f64,
    pub check_timeout_ms: u64,
    pub max_expansion_degree: u32,
    pub step_scorer_url: Option<String>,
    pub step_pass_threshold: f64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            public_rps: get_env_or("PUBLIC_RPS", 50)?,
            default_tolerance: get_env_or("DEFAULT_TOLERANCE", 0.01)?,
            check_timeout_ms: get_env_or("CHECK_TIMEOUT_MS", 2000)?,
            max_expansion_degree: get_env_or("MAX_EXPANSION_DEGREE", 64)?,
            step_scorer_url: env::var("STEP_SCORER_URL").ok().filter(|s| !s.is_empty()),
            step_pass_threshold: get_env_or("STEP_PASS_THRESHOLD", 0.7)?,
        })
    }

    pub fn checker_config(&self) -> CheckerConfig {
        CheckerConfig {
            default_tolerance: self.default_tolerance,
            max_expansion_degree: self.max_expansion_degree,
            ..CheckerConfig::default()
        }
    }

    pub fn step_config(&self) -> StepConfig {
        StepConfig {
            pass_threshold: self.step_pass_threshold,
            ..StepConfig::default()
        }
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms)
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}
