use std::time::Duration;

use stretcher_config::{
    DEFAULT_ANIMATION_TIMEOUT_MS, DEFAULT_EXPONENT, DEFAULT_FRAME_INTERVAL_MS,
    DEFAULT_UNSTRETCH_SPEED,
};

/// Runtime tunables of the stretch gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StretchOptions {
    /// Exponent of the damping curve, in `(0, 1)`.
    pub exponent: f64,
    /// Spring-back velocity in pixels per second.
    pub unstretch_speed: f64,
    /// The spring-back is force-completed after this long.
    pub animation_timeout: Duration,
    /// Minimum time between two spring-back ticks.
    pub frame_interval: Duration,
    /// End released gestures right away instead of springing back.
    pub off: bool,
}

impl Default for StretchOptions {
    fn default() -> Self {
        Self {
            exponent: DEFAULT_EXPONENT,
            unstretch_speed: DEFAULT_UNSTRETCH_SPEED,
            animation_timeout: Duration::from_millis(u64::from(DEFAULT_ANIMATION_TIMEOUT_MS)),
            frame_interval: Duration::from_millis(u64::from(DEFAULT_FRAME_INTERVAL_MS)),
            off: false,
        }
    }
}

impl StretchOptions {
    pub fn from_config(config: &stretcher_config::Stretch) -> Self {
        Self {
            exponent: config.exponent.0,
            unstretch_speed: config.unstretch_speed.0,
            animation_timeout: Duration::from_millis(u64::from(config.animation_timeout_ms)),
            frame_interval: Duration::from_millis(u64::from(config.frame_interval_ms)),
            off: config.off,
        }
    }
}
