use std::{env, path::PathBuf, time::Duration};

// Runtime knobs read from the environment. Gameplay constants live in `tuning`.

pub const DEFAULT_PORT: u16 = 25565;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_ACCEPT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_TICK_HZ: u32 = 60;
pub const DEFAULT_HULL_SIZE: (u32, u32) = (256, 128);

/// How often the headless renderer logs a frame summary.
pub const RENDER_LOG_INTERVAL: Duration = Duration::from_secs(1);
/// Pause between render-thread frames.
pub const RENDER_FRAME_INTERVAL: Duration = Duration::from_millis(16);
/// Ticks a single frame may run before the accumulator is dropped.
pub const MAX_TICKS_PER_FRAME: u32 = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub port: u16,
    pub connect_timeout: Duration,
    pub accept_timeout: Duration,
    pub tick_hz: u32,
    pub build_file: Option<PathBuf>,
    pub hull_width: u32,
    pub hull_height: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            accept_timeout: DEFAULT_ACCEPT_TIMEOUT,
            tick_hz: DEFAULT_TICK_HZ,
            build_file: None,
            hull_width: DEFAULT_HULL_SIZE.0,
            hull_height: DEFAULT_HULL_SIZE.1,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: parsed("SHIPBATTLE_PORT").unwrap_or(defaults.port),
            connect_timeout: millis("SHIPBATTLE_CONNECT_TIMEOUT_MS")
                .unwrap_or(defaults.connect_timeout),
            accept_timeout: millis("SHIPBATTLE_ACCEPT_TIMEOUT_MS")
                .unwrap_or(defaults.accept_timeout),
            tick_hz: parsed::<u32>("SHIPBATTLE_TICK_HZ")
                .filter(|hz| *hz > 0)
                .unwrap_or(defaults.tick_hz),
            build_file: env::var("SHIPBATTLE_BUILD_FILE")
                .ok()
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
            hull_width: parsed("SHIPBATTLE_HULL_WIDTH").unwrap_or(defaults.hull_width),
            hull_height: parsed("SHIPBATTLE_HULL_HEIGHT").unwrap_or(defaults.hull_height),
        }
    }

    /// Length of one simulation step.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_hz.max(1)))
    }
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}

fn millis(key: &str) -> Option<Duration> {
    parsed::<u64>(key).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.port, 25565);
        assert_eq!(settings.connect_timeout, Duration::from_secs(5));
        assert_eq!(settings.tick_hz, 60);
        assert!(settings.build_file.is_none());
    }

    #[test]
    fn tick_interval_follows_the_rate() {
        let settings = Settings {
            tick_hz: 50,
            ..Settings::default()
        };
        assert_eq!(settings.tick_interval(), Duration::from_millis(20));
    }
}
