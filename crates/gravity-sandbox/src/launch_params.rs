//! Launch parameter parsing for the sandbox.
//!
//! On native, parameters are parsed from command-line arguments using clap.
//! On WASM, defaults are used (CLI argument parsing is not available).

use std::path::PathBuf;

use bevy::prelude::*;

/// Default fixed simulation rate in Hz.
const DEFAULT_FIXED_HZ: f64 = 60.0;

/// Launch parameters for the sandbox.
#[derive(Resource, Debug)]
pub struct LaunchParams {
    /// Level file to load instead of the built-in demo level.
    pub level: Option<PathBuf>,
    /// Fixed simulation rate in Hz.
    pub fixed_hz: f64,
    /// Draw gravity arrows and area outlines from the start.
    pub debug_gizmos: bool,
}

impl Default for LaunchParams {
    fn default() -> Self {
        Self {
            level: None,
            fixed_hz: DEFAULT_FIXED_HZ,
            debug_gizmos: false,
        }
    }
}

#[cfg(not(target_family = "wasm"))]
mod native {
    use clap::Parser;

    use super::*;

    /// Parse a positive, finite simulation rate.
    fn parse_hz(s: &str) -> Result<f64, String> {
        let hz = s
            .parse::<f64>()
            .map_err(|e| format!("invalid rate: {e}"))?;
        if !hz.is_finite() || hz <= 0.0 {
            return Err(format!("rate must be positive, got {hz}"));
        }
        if hz > 1000.0 {
            return Err(format!("rate out of range: {hz}"));
        }
        Ok(hz)
    }

    #[derive(Parser)]
    #[command(about = "Sandbox for multi-directional gravity zones")]
    struct CliArgs {
        /// Level file (RON) with gravity areas and solids.
        #[arg(long)]
        level: Option<PathBuf>,

        /// Fixed simulation rate in Hz.
        #[arg(long, default_value_t = DEFAULT_FIXED_HZ, value_parser = parse_hz)]
        fixed_hz: f64,

        /// Draw gravity arrows and area outlines.
        #[arg(long)]
        debug_gizmos: bool,
    }

    pub fn parse() -> LaunchParams {
        let args = CliArgs::parse();
        LaunchParams {
            level: args.level,
            fixed_hz: args.fixed_hz,
            debug_gizmos: args.debug_gizmos,
        }
    }

}

/// Parse launch parameters from CLI args (native) or use defaults (WASM).
pub fn parse() -> LaunchParams {
    #[cfg(not(target_family = "wasm"))]
    {
        native::parse()
    }
    #[cfg(target_family = "wasm")]
    {
        LaunchParams::default()
    }
}
