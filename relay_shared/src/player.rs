//! Player state records.
//!
//! A record is the full visual-proxy state for one connected client:
//! where its box is, what color it is, and how it is oriented. Records
//! are overwritten wholesale on every update; there is no merging.

use anyhow::bail;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::math::{Quat, Vec3};

/// Spawn position for a freshly connected client's box.
pub const SPAWN_POSITION: Vec3 = Vec3::new(70.0, 40.0, 70.0);

/// Largest representable RGB color (0xFFFFFF).
pub const COLOR_MAX: u32 = 0xFF_FF_FF;

/// Coordinates beyond this magnitude are rejected as garbage.
pub const MAX_COORD: f32 = 1.0e4;

/// Allowed deviation of a quaternion's squared norm from 1.
const UNIT_NORM_TOLERANCE: f32 = 0.05;

/// Full state of one client's box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub position: Vec3,
    /// Integer-encoded RGB, `0x000000..=0xFFFFFF`.
    pub color: u32,
    pub quaternion: Quat,
}

impl PlayerRecord {
    /// Builds the default record inserted when a client connects:
    /// spawn position, random color, identity orientation.
    pub fn spawn_default() -> Self {
        let color = rand::thread_rng().gen_range(0..=COLOR_MAX);
        Self {
            position: SPAWN_POSITION,
            color,
            quaternion: Quat::IDENTITY,
        }
    }

    /// Checks that a client-supplied record is structurally sound before
    /// it is admitted into shared state: finite numbers, position within
    /// the world range, color in the RGB range, quaternion near unit
    /// length.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.position.is_finite() {
            bail!("position has non-finite components");
        }
        if self.position.x.abs() > MAX_COORD
            || self.position.y.abs() > MAX_COORD
            || self.position.z.abs() > MAX_COORD
        {
            bail!("position out of world range");
        }
        if self.color > COLOR_MAX {
            bail!("color {:#x} exceeds 24-bit RGB", self.color);
        }
        if !self.quaternion.is_finite() {
            bail!("quaternion has non-finite components");
        }
        if (self.quaternion.norm_sq() - 1.0).abs() > UNIT_NORM_TOLERANCE {
            bail!("quaternion is not unit length");
        }
        Ok(())
    }
}
