//! Target-runtime capacities consumed by the block-limit fixer.
use thiserror::Error;

pub const DEFAULT_CHANGE_LIMIT: usize = 10;
pub const DEFAULT_CONDITIONAL_LIMIT: usize = 15;

const CHANGE_LIMIT_VAR: &str = "STATC_CHANGE_LIMIT";
const CONDITIONAL_LIMIT_VAR: &str = "STATC_CONDITIONAL_LIMIT";

/// Hard per-container limits imposed by the target runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacities {
    /// Maximum variable changes of each kind per container (or per conditional body).
    pub change_limit: usize,
    /// Maximum combined `if and` / `if or` openings per container.
    pub conditional_limit: usize,
}

impl Default for Capacities {
    fn default() -> Self {
        Self {
            change_limit: DEFAULT_CHANGE_LIMIT,
            conditional_limit: DEFAULT_CONDITIONAL_LIMIT,
        }
    }
}

impl Capacities {
    pub fn with_change_limit(mut self, limit: usize) -> Self {
        self.change_limit = limit;
        self
    }

    pub fn with_conditional_limit(mut self, limit: usize) -> Self {
        self.conditional_limit = limit;
        self
    }

    /// Defaults overridden by `STATC_CHANGE_LIMIT` / `STATC_CONDITIONAL_LIMIT` when set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut capacities = Self::default();
        if let Some(raw) = lookup(CHANGE_LIMIT_VAR) {
            capacities.change_limit = parse_limit(CHANGE_LIMIT_VAR, &raw)?;
        }
        if let Some(raw) = lookup(CONDITIONAL_LIMIT_VAR) {
            capacities.conditional_limit = parse_limit(CONDITIONAL_LIMIT_VAR, &raw)?;
        }
        Ok(capacities)
    }
}

fn parse_limit(key: &'static str, raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(0) | Err(_) => Err(ConfigError::InvalidLimit {
            key,
            value: raw.to_string(),
        }),
        Ok(value) => Ok(value),
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("`{key}` must be a positive integer, got `{value}`")]
    InvalidLimit { key: &'static str, value: String },
}
