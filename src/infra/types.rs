use std::ops::{Add, AddAssign, Mul, Neg, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(&self, other: &Vec2) -> f32 {
        (*self - *other).length()
    }

    /// Unit vector in the same direction, or zero for the zero vector.
    pub fn normalized(&self) -> Vec2 {
        let len = self.length();
        if len > f32::EPSILON {
            Vec2::new(self.x / len, self.y / len)
        } else {
            Vec2::ZERO
        }
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;

    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

/// Playable-area bounds. Move targets are exchanged with the network as
/// coordinates normalized into [0, 1]² over this rectangle, so the same
/// constants must be used on the label-encoding and decision-decoding sides.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayArea {
    pub origin: Vec2,
    pub size: Vec2,
}

impl PlayArea {
    pub fn new(origin: Vec2, size: Vec2) -> Self {
        Self { origin, size }
    }

    pub fn center(&self) -> Vec2 {
        self.origin + self.size * 0.5
    }

    pub fn contains(&self, point: &Vec2) -> bool {
        point.x >= self.origin.x
            && point.x <= self.origin.x + self.size.x
            && point.y >= self.origin.y
            && point.y <= self.origin.y + self.size.y
    }

    /// World coordinate -> normalized [0, 1]² coordinate.
    pub fn normalize(&self, point: Vec2) -> Vec2 {
        Vec2::new(
            (point.x - self.origin.x) / self.size.x,
            (point.y - self.origin.y) / self.size.y,
        )
    }

    /// Normalized [0, 1]² coordinate -> world coordinate.
    pub fn denormalize(&self, coord: Vec2) -> Vec2 {
        Vec2::new(
            coord.x * self.size.x + self.origin.x,
            coord.y * self.size.y + self.origin.y,
        )
    }
}

impl Default for PlayArea {
    fn default() -> Self {
        Self {
            origin: Vec2::new(32.0, 1376.0),
            size: Vec2::new(4096.0, 1408.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec2_arithmetic() {
        let a = Vec2::new(3.0, 4.0);
        let b = Vec2::new(1.0, 2.0);

        assert_eq!(a + b, Vec2::new(4.0, 6.0));
        assert_eq!(a - b, Vec2::new(2.0, 2.0));
        assert_eq!(a * 2.0, Vec2::new(6.0, 8.0));
        assert!((a.length() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalized_zero_vector() {
        assert_eq!(Vec2::ZERO.normalized(), Vec2::ZERO);
    }

    #[test]
    fn test_play_area_round_trip() {
        let area = PlayArea::default();
        let point = Vec2::new(1500.0, 2000.0);

        let coord = area.normalize(point);
        let back = area.denormalize(coord);

        assert!((back.x - point.x).abs() < 1e-3);
        assert!((back.y - point.y).abs() < 1e-3);
    }

    #[test]
    fn test_play_area_center() {
        let area = PlayArea::default();
        let center = area.denormalize(Vec2::new(0.5, 0.5));

        assert_eq!(center, area.center());
        assert!((center.x - 2080.0).abs() < 1e-3);
        assert!((center.y - 2080.0).abs() < 1e-3);
    }
}
