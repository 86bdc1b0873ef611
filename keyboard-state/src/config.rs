//! Configuration for the keyboard tracker
//!
//! The platform-anomaly workarounds live here as policy rather than being
//! hard-coded, so hosts on platforms that never report them can switch them
//! off.

use serde::{Deserialize, Serialize};

use crate::error::{KeyboardError, Result};

/// Configuration for the KeyboardTracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Re-anchor notification frames whose vertical origin is negative
    /// Default: true
    pub correct_negative_origin: bool,

    /// Visible heights at or below this value count as hidden
    /// Default: 0.0 (only an exact zero is hidden)
    pub hidden_epsilon: f64,

    /// Attach a pan recognizer to the root surface to follow interactive dismissal
    /// Default: true
    pub interactive_dismiss: bool,

    /// Distance a touch has to travel before the pan recognizer begins
    /// Default: 10.0
    pub pan_hysteresis: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            correct_negative_origin: true,
            hidden_epsilon: 0.0,
            interactive_dismiss: true,
            pan_hysteresis: 10.0,
        }
    }
}

impl TrackerConfig {
    /// Create a TrackerConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Take notification frames exactly as reported
    pub fn strict() -> Self {
        Self {
            correct_negative_origin: false,
            ..Default::default()
        }
    }

    /// Track notifications only, without a drag recognizer
    pub fn notifications_only() -> Self {
        Self {
            interactive_dismiss: false,
            ..Default::default()
        }
    }

    pub fn with_negative_origin_correction(mut self, enabled: bool) -> Self {
        self.correct_negative_origin = enabled;
        self
    }

    pub fn with_hidden_epsilon(mut self, epsilon: f64) -> Self {
        self.hidden_epsilon = epsilon;
        self
    }

    pub fn with_interactive_dismiss(mut self, enabled: bool) -> Self {
        self.interactive_dismiss = enabled;
        self
    }

    pub fn with_pan_hysteresis(mut self, distance: f64) -> Self {
        self.pan_hysteresis = distance;
        self
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if !self.hidden_epsilon.is_finite() || self.hidden_epsilon < 0.0 {
            return Err(KeyboardError::Configuration(format!(
                "hidden_epsilon must be a finite, non-negative number (got {})",
                self.hidden_epsilon
            )));
        }

        if !self.pan_hysteresis.is_finite() || self.pan_hysteresis < 0.0 {
            return Err(KeyboardError::Configuration(format!(
                "pan_hysteresis must be a finite, non-negative number (got {})",
                self.pan_hysteresis
            )));
        }

        Ok(())
    }

    /// Build a configuration from environment variables
    ///
    /// - `KEYBOARD_CORRECT_NEGATIVE_ORIGIN`: `true` / `false`
    /// - `KEYBOARD_HIDDEN_EPSILON`: number
    /// - `KEYBOARD_INTERACTIVE_DISMISS`: `true` / `false`
    /// - `KEYBOARD_PAN_HYSTERESIS`: number
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(value) = lookup("KEYBOARD_CORRECT_NEGATIVE_ORIGIN") {
            config.correct_negative_origin = parse_env("KEYBOARD_CORRECT_NEGATIVE_ORIGIN", &value)?;
        }
        if let Some(value) = lookup("KEYBOARD_HIDDEN_EPSILON") {
            config.hidden_epsilon = parse_env("KEYBOARD_HIDDEN_EPSILON", &value)?;
        }
        if let Some(value) = lookup("KEYBOARD_INTERACTIVE_DISMISS") {
            config.interactive_dismiss = parse_env("KEYBOARD_INTERACTIVE_DISMISS", &value)?;
        }
        if let Some(value) = lookup("KEYBOARD_PAN_HYSTERESIS") {
            config.pan_hysteresis = parse_env("KEYBOARD_PAN_HYSTERESIS", &value)?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        KeyboardError::Configuration(format!("Invalid value for {}: {:?}", key, value))
    })
}
