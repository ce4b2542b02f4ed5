//! Command-line configuration. Every option defaults to the values the demo
//! was tuned with, so running without arguments gives the stock experience.

use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "room-tiny", version, about = "Walk around a small textured room in a headset")]
pub struct Config {
    /// Desktop mirror window title.
    #[arg(long, default_value = "Room Tiny (D3D11 + OpenXR)")]
    pub title: String,

    /// Swap textures expected per eye; any other count from the runtime is fatal.
    #[arg(long, default_value_t = 3)]
    pub ring_length: usize,

    /// Near clip plane in metres.
    #[arg(long, default_value_t = 0.2)]
    pub near: f32,

    /// Far clip plane in metres.
    #[arg(long, default_value_t = 1000.0)]
    pub far: f32,

    /// Metres moved per frame while a movement key is held.
    #[arg(long, default_value_t = 0.05)]
    pub move_speed: f32,

    /// Radians turned per frame while a turn key is held.
    #[arg(long, default_value_t = 0.02)]
    pub turn_speed: f32,

    /// Pause before re-initializing after the headset was lost.
    #[arg(long, default_value_t = 10)]
    pub retry_delay_ms: u64,

    /// Mirror window size relative to both eye textures side by side.
    #[arg(long, default_value_t = 0.5)]
    pub mirror_scale: f32,
}

impl Config {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_from(["room-tiny"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_stock_demo() {
        let config = Config::default();
        assert_eq!(config.ring_length, 3);
        assert_eq!(config.near, 0.2);
        assert_eq!(config.far, 1000.0);
        assert_eq!(config.move_speed, 0.05);
        assert_eq!(config.turn_speed, 0.02);
        assert_eq!(config.retry_delay(), Duration::from_millis(10));
    }

    #[test]
    fn flags_override_defaults() {
        let config =
            Config::try_parse_from(["room-tiny", "--ring-length", "2", "--far", "50"]).unwrap();
        assert_eq!(config.ring_length, 2);
        assert_eq!(config.far, 50.0);
        assert_eq!(config.near, 0.2);
    }

    #[test]
    fn rejects_non_numeric_ring_length() {
        assert!(Config::try_parse_from(["room-tiny", "--ring-length", "three"]).is_err());
    }

    #[test]
    fn command_definition_is_consistent() {
        use clap::CommandFactory;
        Config::command().debug_assert();
    }
}
