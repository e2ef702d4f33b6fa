//! Vector types for replicated positions and velocities

use serde::{Deserialize, Serialize};

/// Continuous 2D vector (positions, velocities)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec2f {
    pub x: f32,
    pub y: f32,
}

impl Vec2f {
    pub const ZERO: Vec2f = Vec2f { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Calculate distance to another vector
    pub fn distance_to(self, other: Vec2f) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl std::ops::Add for Vec2f {
    type Output = Vec2f;

    fn add(self, rhs: Vec2f) -> Vec2f {
        Vec2f::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Mul<f32> for Vec2f {
    type Output = Vec2f;

    fn mul(self, rhs: f32) -> Vec2f {
        Vec2f::new(self.x * rhs, self.y * rhs)
    }
}

/// Discrete 2D vector (tile coordinates, grid cells)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vec2i {
    pub x: i32,
    pub y: i32,
}

impl Vec2i {
    pub const ZERO: Vec2i = Vec2i { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl std::ops::Add for Vec2i {
    type Output = Vec2i;

    fn add(self, rhs: Vec2i) -> Vec2i {
        Vec2i::new(self.x + rhs.x, self.y + rhs.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_calculation() {
        let a = Vec2f::new(0.0, 0.0);
        let b = Vec2f::new(3.0, 4.0);
        assert!((a.distance_to(b) - 5.0).abs() < 0.001);
    }

    #[test]
    fn test_vector_arithmetic() {
        let v = Vec2f::new(1.0, -2.0) + Vec2f::new(0.5, 0.5);
        assert_eq!(v, Vec2f::new(1.5, -1.5));
        assert_eq!(Vec2f::new(1.0, 2.0) * 3.0, Vec2f::new(3.0, 6.0));
        assert_eq!(Vec2i::new(1, 2) + Vec2i::new(3, 4), Vec2i::new(4, 6));
    }
}
