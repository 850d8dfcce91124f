//! Error types for the gravity core.

use std::fmt;

/// Result type for gravity core operations.
pub type Result<T> = std::result::Result<T, GravityError>;

/// Errors that can occur while configuring gravity areas.
#[derive(Debug, Clone, PartialEq)]
pub enum GravityError {
    /// A trigger volume has zero, negative, or non-finite extents.
    DegenerateVolume {
        /// Which shape was being validated.
        context: &'static str,
        /// The offending half extents.
        half_extents: glam::Vec3,
    },
    /// A direction or normal has zero length or non-finite components.
    DegenerateDirection {
        /// Which direction was being validated.
        context: &'static str,
    },
    /// A rotation is not a finite, normalizable quaternion.
    InvalidRotation {
        /// Which rotation was being validated.
        context: &'static str,
    },
    /// The hysteresis delay is negative or non-finite.
    InvalidDelay {
        /// The rejected delay in seconds.
        delay: f32,
    },
    /// A level placement file could not be parsed.
    Placement {
        /// Where the placement came from.
        source: String,
        /// The parser message.
        message: String,
    },
}

impl fmt::Display for GravityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GravityError::DegenerateVolume {
                context,
                half_extents,
            } => {
                write!(f, "degenerate {context} volume: half extents {half_extents}")
            }
            GravityError::DegenerateDirection { context } => {
                write!(f, "degenerate {context} direction")
            }
            GravityError::InvalidRotation { context } => {
                write!(f, "invalid {context} rotation")
            }
            GravityError::InvalidDelay { delay } => {
                write!(f, "invalid hysteresis delay: {delay}s")
            }
            GravityError::Placement { source, message } => {
                write!(f, "failed to parse placement {source}: {message}")
            }
        }
    }
}

impl std::error::Error for GravityError {}

impl From<ron::error::SpannedError> for GravityError {
    fn from(e: ron::error::SpannedError) -> Self {
        GravityError::Placement {
            source: "<inline>".to_string(),
            message: e.to_string(),
        }
    }
}
