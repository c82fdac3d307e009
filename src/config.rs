use anyhow::Context;
use core::time::Duration;
use std::env;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Process settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Port of the health endpoint.
    pub port: u16,
    /// How often keys of expired quizzes are reclaimed.
    pub sweep_interval: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let port = match lookup("PORT") {
            Some(port) => port.parse().context("PORT must be a valid port number")?,
            None => DEFAULT_PORT,
        };
        let secs = match lookup("SWEEP_INTERVAL_SECS") {
            Some(secs) => secs.parse().context("SWEEP_INTERVAL_SECS must be a whole number of seconds")?,
            None => DEFAULT_SWEEP_INTERVAL_SECS,
        };
        anyhow::ensure!(secs > 0, "SWEEP_INTERVAL_SECS must be positive");
        Ok(Self { port, sweep_interval: Duration::from_secs(secs) })
    }
}
