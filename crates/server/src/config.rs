//! Command-line configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default autosave interval (5 minutes).
pub const AUTOSAVE_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// World directory; region files live in `<world>/region`.
    pub world_dir: PathBuf,
    /// Chunks generated in each direction around (0, 0).
    pub radius: i32,
    pub tick_interval: Duration,
    pub autosave_interval: Duration,
    /// Write a JSON dump of chunk (0, 0) here and exit instead of ticking.
    pub export: Option<PathBuf>,
    /// Stop after this many ticks; `None` runs until Ctrl+C.
    pub max_ticks: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            world_dir: "world".into(),
            radius: 4,
            tick_interval: Duration::from_millis(50),
            autosave_interval: AUTOSAVE_INTERVAL,
            export: None,
            max_ticks: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_args(std::env::args().collect::<Vec<_>>())
    }

    /// Parse `--flag value` pairs. Missing or unparsable values keep their
    /// defaults.
    pub fn from_args(args: Vec<String>) -> Self {
        let value = |flag: &str| args.iter().skip_while(|a| *a != flag).nth(1).cloned();
        let number = |flag: &str| value(flag).and_then(|s| s.parse::<u64>().ok());
        let defaults = Self::default();

        Self {
            world_dir: value("--world").map_or(defaults.world_dir, PathBuf::from),
            radius: value("--radius")
                .and_then(|s| s.parse().ok())
                .filter(|r: &i32| *r >= 0)
                .unwrap_or(defaults.radius),
            tick_interval: number("--tick-ms")
                .filter(|&ms| ms > 0)
                .map_or(defaults.tick_interval, Duration::from_millis),
            autosave_interval: number("--autosave-secs")
                .filter(|&s| s > 0)
                .map_or(defaults.autosave_interval, Duration::from_secs),
            export: value("--export").map(PathBuf::from),
            max_ticks: number("--ticks").filter(|&n| n > 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("blockstore-server")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn defaults_without_flags() {
        assert_eq!(ServerConfig::from_args(args(&[])), ServerConfig::default());
    }

    #[test]
    fn flags_override_defaults() {
        let config = ServerConfig::from_args(args(&[
            "--world", "/tmp/w", "--radius", "2", "--tick-ms", "20", "--ticks", "100", "--export",
            "dump.json",
        ]));
        assert_eq!(config.world_dir, PathBuf::from("/tmp/w"));
        assert_eq!(config.radius, 2);
        assert_eq!(config.tick_interval, Duration::from_millis(20));
        assert_eq!(config.max_ticks, Some(100));
        assert_eq!(config.export, Some(PathBuf::from("dump.json")));
        assert_eq!(config.autosave_interval, AUTOSAVE_INTERVAL);
    }

    #[test]
    fn bad_values_fall_back() {
        let config = ServerConfig::from_args(args(&["--radius", "-3", "--tick-ms", "fast", "--ticks", "0"]));
        assert_eq!(config.radius, 4);
        assert_eq!(config.tick_interval, Duration::from_millis(50));
        assert_eq!(config.max_ticks, None);
    }
}
