use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::device::constants::DEFAULT_SCAN_DURATION;

// a scan shorter than this rarely sees any advertisement
const MIN_SCAN_DURATION: u64 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    // milliseconds
    pub scan_duration_ms: u64,
    pub auto_select_single: bool,
}

impl Config {
    pub fn scan_duration(&self) -> Duration {
        Duration::from_millis(self.scan_duration_ms.max(MIN_SCAN_DURATION))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scan_duration_ms: DEFAULT_SCAN_DURATION,
            auto_select_single: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case() {
        let config: Config = serde_json::from_str(r#"{"scanDurationMs": 2500, "autoSelectSingle": true}"#).unwrap();
        assert_eq!(config, Config { scan_duration_ms: 2500, auto_select_single: true });
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config: Config = serde_json::from_str(r#"{"autoSelectSingle": true}"#).unwrap();
        assert_eq!(config.scan_duration_ms, DEFAULT_SCAN_DURATION);
        assert!(config.auto_select_single);
    }

    #[test]
    fn scan_duration_has_a_floor() {
        let config = Config { scan_duration_ms: 10, auto_select_single: false };
        assert_eq!(config.scan_duration(), Duration::from_millis(MIN_SCAN_DURATION));
    }
}
