//! Spawn placement policy.

use hearth_protocol::Position;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Inclusive bounding box that new players are placed in, uniformly at
/// random.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnBox {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl Default for SpawnBox {
    fn default() -> Self {
        Self {
            min_x: -3,
            max_x: 3,
            min_y: -2,
            max_y: 1,
        }
    }
}

impl SpawnBox {
    /// A box that always yields `at`.
    pub fn point(at: Position) -> Self {
        Self {
            min_x: at.x,
            max_x: at.x,
            min_y: at.y,
            max_y: at.y,
        }
    }

    /// `false` when either axis is inverted.
    pub fn is_valid(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y
    }

    pub fn contains(&self, p: Position) -> bool {
        (self.min_x..=self.max_x).contains(&p.x)
            && (self.min_y..=self.max_y).contains(&p.y)
    }

    /// Draws a spawn point. The box must be valid.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Position {
        Position::new(
            rng.random_range(self.min_x..=self.max_x),
            rng.random_range(self.min_y..=self.max_y),
        )
    }
}
