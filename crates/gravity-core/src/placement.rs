//! Level placement data.
//!
//! Levels describe their gravity areas in RON. Placement is static: areas are
//! validated once when the level loads and never change afterwards.
//!
//! ```ron
//! (
//!     gravity: (default_down: (0.0, -1.0, 0.0)),
//!     areas: [
//!         (
//!             name: Some("east wall"),
//!             shape: BoxFace(
//!                 volume: (center: (20.0, 5.0, 0.0), half_extents: (4.0, 6.0, 10.0)),
//!                 down: PosX,
//!             ),
//!             priority: 1,
//!             hysteresis_delay: 0.2,
//!         ),
//!     ],
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    area::{AreaId, AreaShape, GravityArea},
    config::GravityConfig,
    error::{GravityError, Result},
    world::GravityWorld,
};

/// One area as written in a level file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaPlacement {
    /// Optional label used in logs and debug views.
    #[serde(default)]
    pub name: Option<String>,
    pub shape: AreaShape,
    #[serde(default)]
    pub priority: i32,
    /// Seconds a membership change must persist before it commits.
    #[serde(default)]
    pub hysteresis_delay: f32,
}

impl AreaPlacement {
    /// Validate the placement into an area.
    pub fn build(&self) -> Result<GravityArea> {
        GravityArea::new(self.shape, self.priority, self.hysteresis_delay)
    }

    /// Name for logs, falling back to the placement index.
    pub fn label(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("area #{index}"))
    }
}

/// Gravity configuration and areas of one level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelPlacement {
    #[serde(default)]
    pub gravity: GravityConfig,
    #[serde(default)]
    pub areas: Vec<AreaPlacement>,
}

impl LevelPlacement {
    /// Parse a level from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        Ok(ron::from_str(text)?)
    }

    /// Read and parse a level file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| GravityError::Placement {
            source: path.display().to_string(),
            message: e.to_string(),
        })?;
        ron::from_str(&text).map_err(|e| GravityError::Placement {
            source: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Register every valid area with `world`.
    ///
    /// The result is index-aligned with [`LevelPlacement::areas`]. Invalid
    /// placements are logged and left out as `None`; the rest of the level
    /// still loads.
    pub fn spawn_into(&self, world: &mut GravityWorld) -> Vec<Option<AreaId>> {
        self.areas
            .iter()
            .enumerate()
            .map(|(index, placement)| match placement.build() {
                Ok(area) => Some(world.add_area(area)),
                Err(e) => {
                    tracing::warn!(
                        "Skipping gravity area '{}': {e}",
                        placement.label(index)
                    );
                    None
                }
            })
            .collect()
    }

    /// Create a world configured by this level and populated with its areas.
    pub fn into_world(&self) -> (GravityWorld, Vec<Option<AreaId>>) {
        let mut world = GravityWorld::new(self.gravity.clone());
        let ids = self.spawn_into(&mut world);
        (world, ids)
    }
}
