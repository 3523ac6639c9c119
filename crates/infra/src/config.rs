//! Runtime configuration from the environment.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_WAQI_BASE_URL: &str = "https://api.waqi.info/feed";
/// Public token accepted by the provider for low-volume use.
pub const DEMO_TOKEN: &str = "demo";

#[derive(Debug, Clone, PartialEq)]
pub struct AqcastConfig {
    pub waqi_token: String,
    pub waqi_base_url: String,
    pub fetch_timeout: Duration,
    pub model_path: PathBuf,
    pub transform_path: PathBuf,
    pub dataset_path: PathBuf,
    pub buffer_capacity: usize,
}

impl Default for AqcastConfig {
    fn default() -> Self {
        Self {
            waqi_token: DEMO_TOKEN.to_string(),
            waqi_base_url: DEFAULT_WAQI_BASE_URL.to_string(),
            fetch_timeout: Duration::from_secs(5),
            model_path: PathBuf::from("models/lstm_aqi.json"),
            transform_path: PathBuf::from("models/scaler.json"),
            dataset_path: PathBuf::from("data/historical_aqi.csv"),
            buffer_capacity: 24,
        }
    }
}

impl AqcastConfig {
    /// Read `WAQI_TOKEN` and the `AQCAST_*` variables, keeping defaults for anything unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        match lookup("WAQI_TOKEN").filter(|t| !t.trim().is_empty()) {
            Some(token) => cfg.waqi_token = token,
            None => warn!("WAQI_TOKEN not set; using the provider's public demo token"),
        }
        if let Some(url) = lookup("AQCAST_WAQI_BASE_URL") {
            cfg.waqi_base_url = url;
        }
        if let Some(secs) = parsed::<u64>(&lookup, "AQCAST_FETCH_TIMEOUT_SECS") {
            cfg.fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(path) = lookup("AQCAST_MODEL_PATH") {
            cfg.model_path = path.into();
        }
        if let Some(path) = lookup("AQCAST_TRANSFORM_PATH") {
            cfg.transform_path = path.into();
        }
        if let Some(path) = lookup("AQCAST_DATASET_PATH") {
            cfg.dataset_path = path.into();
        }
        if let Some(capacity) = parsed::<usize>(&lookup, "AQCAST_BUFFER_CAPACITY").filter(|c| *c > 0) {
            cfg.buffer_capacity = capacity;
        }

        cfg
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable configuration value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let cfg = AqcastConfig::from_lookup(lookup(&[]));
        assert_eq!(cfg, AqcastConfig::default());
        assert_eq!(cfg.waqi_token, "demo");
        assert_eq!(cfg.fetch_timeout, Duration::from_secs(5));
        assert_eq!(cfg.buffer_capacity, 24);
    }

    #[test]
    fn variables_override_defaults() {
        let cfg = AqcastConfig::from_lookup(lookup(&[
            ("WAQI_TOKEN", "secret"),
            ("AQCAST_FETCH_TIMEOUT_SECS", "2"),
            ("AQCAST_DATASET_PATH", "/srv/aq.csv"),
            ("AQCAST_BUFFER_CAPACITY", "48"),
        ]));
        assert_eq!(cfg.waqi_token, "secret");
        assert_eq!(cfg.fetch_timeout, Duration::from_secs(2));
        assert_eq!(cfg.dataset_path, PathBuf::from("/srv/aq.csv"));
        assert_eq!(cfg.buffer_capacity, 48);
    }

    #[test]
    fn bad_numbers_are_ignored() {
        let cfg = AqcastConfig::from_lookup(lookup(&[
            ("AQCAST_FETCH_TIMEOUT_SECS", "soon"),
            ("AQCAST_BUFFER_CAPACITY", "0"),
        ]));
        assert_eq!(cfg.fetch_timeout, Duration::from_secs(5));
        assert_eq!(cfg.buffer_capacity, 24);
    }
}
