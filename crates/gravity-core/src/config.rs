//! Tunables shared by every body in a gravity world.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Dot product above which two ups count as the same (about one degree).
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.9998;

/// Fail-safe timeout for transitions that never report completion, in seconds.
pub const DEFAULT_TRANSITION_TIMEOUT: f32 = 1.0;

/// Gravity world configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GravityConfig {
    /// Down direction for bodies outside every area.
    #[serde(default = "GravityConfig::default_down")]
    pub default_down: Vec3,
    /// Ups whose dot product reaches this value do not start a transition.
    #[serde(default = "GravityConfig::default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Timeout applied to a transition when no duration hint was given.
    #[serde(default = "GravityConfig::default_transition_timeout")]
    pub transition_timeout: f32,
    /// Slack added on top of a consumer's duration hint.
    #[serde(default = "GravityConfig::default_transition_grace")]
    pub transition_grace: f32,
    /// Upper bound on any fail-safe timeout, hinted or not.
    #[serde(default = "GravityConfig::default_max_transition_timeout")]
    pub max_transition_timeout: f32,
}

impl GravityConfig {
    fn default_down() -> Vec3 {
        Vec3::NEG_Y
    }
    fn default_similarity_threshold() -> f32 {
        DEFAULT_SIMILARITY_THRESHOLD
    }
    fn default_transition_timeout() -> f32 {
        DEFAULT_TRANSITION_TIMEOUT
    }
    fn default_transition_grace() -> f32 {
        0.25
    }
    fn default_max_transition_timeout() -> f32 {
        5.0
    }

    /// Normalized default down, falling back to -Y if misconfigured.
    pub fn fallback_down(&self) -> Vec3 {
        let down = self.default_down.normalize_or_zero();
        if down == Vec3::ZERO {
            Vec3::NEG_Y
        } else {
            down
        }
    }

    /// Fail-safe timeout for a transition, given an optional duration hint.
    pub fn timeout_for(&self, hint: Option<f32>) -> f32 {
        let timeout = match hint {
            Some(hint) if hint.is_finite() && hint >= 0.0 => hint + self.transition_grace,
            _ => self.transition_timeout,
        };
        timeout.clamp(0.0, self.max_transition_timeout)
    }
}

impl Default for GravityConfig {
    fn default() -> Self {
        Self {
            default_down: Self::default_down(),
            similarity_threshold: Self::default_similarity_threshold(),
            transition_timeout: Self::default_transition_timeout(),
            transition_grace: Self::default_transition_grace(),
            max_transition_timeout: Self::default_max_transition_timeout(),
        }
    }
}
