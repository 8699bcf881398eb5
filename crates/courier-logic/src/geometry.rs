//! Planet-surface geometry for courier flight paths.
//!
//! Fixed targets are flown along a straight chord; the moving mecha target
//! is chased along a great-circle arc so the courier hugs the planet
//! surface while the target walks around.

use serde::{Deserialize, Serialize};

/// 3D position relative to the planet centre.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance_squared(&self, other: &Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    pub fn distance(&self, other: &Self) -> f32 {
        self.distance_squared(other).sqrt()
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn dot(&self, other: &Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len > 0.0 {
            Self {
                x: self.x / len,
                y: self.y / len,
                z: self.z / len,
            }
        } else {
            Self::ZERO
        }
    }

    /// Straight-line interpolation, `t` in `[0, 1]`.
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        *self + (*other - *self) * t
    }

    /// Great-circle interpolation about the planet centre.
    ///
    /// Direction is spherically interpolated and radius linearly, so two
    /// points at altitude stay at altitude along the arc. Falls back to
    /// [`Vec3::lerp`] for degenerate (zero-length or near-parallel) inputs.
    pub fn slerp(&self, other: &Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let ra = self.length();
        let rb = other.length();
        if ra <= f32::EPSILON || rb <= f32::EPSILON {
            return self.lerp(other, t);
        }
        let a = self.normalize();
        let b = other.normalize();
        let cos = a.dot(&b).clamp(-1.0, 1.0);
        let angle = cos.acos();
        let sin = angle.sin();
        if sin.abs() < 1e-4 {
            return self.lerp(other, t);
        }
        let wa = ((1.0 - t) * angle).sin() / sin;
        let wb = (t * angle).sin() / sin;
        let dir = a * wa + b * wb;
        dir * (ra + (rb - ra) * t)
    }

    /// Arc length of the great circle between two points, at their mean radius.
    pub fn arc_distance(&self, other: &Self) -> f32 {
        let ra = self.length();
        let rb = other.length();
        if ra <= f32::EPSILON || rb <= f32::EPSILON {
            return self.distance(other);
        }
        let cos = self.normalize().dot(&other.normalize()).clamp(-1.0, 1.0);
        let arc = cos.acos() * (ra + rb) * 0.5;
        // Radial offset still has to be flown.
        (arc * arc + (rb - ra) * (rb - ra)).sqrt()
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, scalar: f32) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
            z: self.z * scalar,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn lerp_endpoints() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(10.0, 0.0, 0.0);
        assert_eq!(a.lerp(&b, 0.0), a);
        assert_eq!(a.lerp(&b, 1.0), b);
        assert!(approx(a.lerp(&b, 0.5).x, 5.0));
    }

    #[test]
    fn slerp_stays_on_sphere() {
        let r = 200.0;
        let a = Vec3::new(r, 0.0, 0.0);
        let b = Vec3::new(0.0, r, 0.0);
        for i in 0..=10 {
            let p = a.slerp(&b, i as f32 / 10.0);
            assert!(approx(p.length(), r), "point {i} left the sphere: {p:?}");
        }
        let mid = a.slerp(&b, 0.5);
        assert!(approx(mid.x, mid.y));
    }

    #[test]
    fn slerp_degenerate_falls_back_to_lerp() {
        let a = Vec3::ZERO;
        let b = Vec3::new(0.0, 0.0, 4.0);
        assert!(approx(a.slerp(&b, 0.25).z, 1.0));
    }

    #[test]
    fn arc_distance_quarter_circle() {
        let r = 100.0;
        let a = Vec3::new(r, 0.0, 0.0);
        let b = Vec3::new(0.0, 0.0, r);
        let expected = std::f32::consts::FRAC_PI_2 * r;
        assert!((a.arc_distance(&b) - expected).abs() < 0.01);
    }
}
