//! Math types.
//!
//! Two coordinate spaces meet here:
//! - `Point` / `BlockPos`: world coordinates used by instances (f64, block grid).
//! - `Vec3` / `Quat` / `Mat3`: single-precision types used by the rigid-body engine.
//!
//! Conversions between them are explicit `From` impls.

use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// 3D vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self::splat(0.0);
    pub const ONE: Self = Self::splat(1.0);
    pub const X: Self = Self::new(1.0, 0.0, 0.0);
    pub const Y: Self = Self::new(0.0, 1.0, 0.0);
    pub const Z: Self = Self::new(0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub const fn splat(v: f32) -> Self {
        Self::new(v, v, v)
    }

    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    pub fn cross(self, rhs: Self) -> Self {
        Self::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }

    pub fn len_sq(self) -> f32 {
        self.dot(self)
    }

    pub fn length(self) -> f32 {
        self.len_sq().sqrt()
    }

    /// Unit vector in the same direction, or zero for a (near) zero vector.
    pub fn normalize_or_zero(self) -> Self {
        let len = self.length();
        if len > f32::EPSILON {
            self / len
        } else {
            Self::ZERO
        }
    }

    pub fn lerp(self, to: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self::new(
            self.x + (to.x - self.x) * t,
            self.y + (to.y - self.y) * t,
            self.z + (to.z - self.z) * t,
        )
    }

    pub fn min(self, rhs: Self) -> Self {
        Self::new(self.x.min(rhs.x), self.y.min(rhs.y), self.z.min(rhs.z))
    }

    pub fn max(self, rhs: Self) -> Self {
        Self::new(self.x.max(rhs.x), self.y.max(rhs.y), self.z.max(rhs.z))
    }

    pub fn abs(self) -> Self {
        Self::new(self.x.abs(), self.y.abs(), self.z.abs())
    }

    /// Component-wise product.
    pub fn mul_elem(self, rhs: Self) -> Self {
        Self::new(self.x * rhs.x, self.y * rhs.y, self.z * rhs.z)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// Component by axis index (0 = x, 1 = y, 2 = z).
    pub fn axis(self, i: usize) -> f32 {
        match i {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl SubAssign for Vec3 {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl MulAssign<f32> for Vec3 {
    fn mul_assign(&mut self, rhs: f32) {
        *self = *self * rhs;
    }
}

impl Div<f32> for Vec3 {
    type Output = Self;
    fn div(self, rhs: f32) -> Self {
        Self::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// A position in an instance, in blocks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn add(self, rhs: Point) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    /// The block cell containing this point.
    pub fn block_pos(self) -> BlockPos {
        BlockPos::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }

    pub fn distance_sq(self, rhs: Point) -> f64 {
        let (dx, dy, dz) = (self.x - rhs.x, self.y - rhs.y, self.z - rhs.z);
        dx * dx + dy * dy + dz * dz
    }
}

/// Integer block coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Minimum corner of the cell.
    pub fn corner(self) -> Point {
        Point::new(self.x as f64, self.y as f64, self.z as f64)
    }

    /// Centre of the cell.
    pub fn center(self) -> Point {
        Point::new(
            self.x as f64 + 0.5,
            self.y as f64 + 0.5,
            self.z as f64 + 0.5,
        )
    }
}

impl From<Point> for BlockPos {
    fn from(p: Point) -> Self {
        p.block_pos()
    }
}

impl From<Vec3> for Point {
    fn from(v: Vec3) -> Self {
        Point::new(v.x as f64, v.y as f64, v.z as f64)
    }
}

impl From<Point> for Vec3 {
    fn from(p: Point) -> Self {
        Vec3::new(p.x as f32, p.y as f32, p.z as f32)
    }
}

/// Rotation quaternion.
///
/// Operations keep jME's conventions: `from_euler` takes (yaw, roll, pitch)
/// and `slerp` falls back to linear weights for nearly parallel inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quat {
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Rotation of `angle` radians around the unit vector `axis`.
    pub fn from_axis_angle(axis: Vec3, angle: f32) -> Self {
        let (s, c) = (angle / 2.0).sin_cos();
        Self::new(axis.x * s, axis.y * s, axis.z * s, c)
    }

    /// Builds a rotation from Euler angles in radians, jME naming: `yaw`
    /// about X, `roll` about Y, `pitch` about Z. The result is normalized.
    pub fn from_euler(yaw: f32, roll: f32, pitch: f32) -> Self {
        let (sin_pitch, cos_pitch) = (pitch * 0.5).sin_cos();
        let (sin_roll, cos_roll) = (roll * 0.5).sin_cos();
        let (sin_yaw, cos_yaw) = (yaw * 0.5).sin_cos();

        let cos_roll_cos_pitch = cos_roll * cos_pitch;
        let sin_roll_sin_pitch = sin_roll * sin_pitch;
        let cos_roll_sin_pitch = cos_roll * sin_pitch;
        let sin_roll_cos_pitch = sin_roll * cos_pitch;

        Self::new(
            cos_roll_cos_pitch * sin_yaw + sin_roll_sin_pitch * cos_yaw,
            sin_roll_cos_pitch * cos_yaw + cos_roll_sin_pitch * sin_yaw,
            cos_roll_sin_pitch * cos_yaw - sin_roll_cos_pitch * sin_yaw,
            cos_roll_cos_pitch * cos_yaw - sin_roll_sin_pitch * sin_yaw,
        )
        .normalize()
    }

    pub fn dot(self, q: Self) -> f32 {
        self.x * q.x + self.y * q.y + self.z * q.z + self.w * q.w
    }

    pub fn norm(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Hamilton product `self * q`.
    pub fn mul(self, q: Self) -> Self {
        Self::new(
            self.w * q.x + self.x * q.w + self.y * q.z - self.z * q.y,
            self.w * q.y + self.y * q.w + self.z * q.x - self.x * q.z,
            self.w * q.z + self.z * q.w + self.x * q.y - self.y * q.x,
            self.w * q.w - self.x * q.x - self.y * q.y - self.z * q.z,
        )
    }

    pub fn scale(self, s: f32) -> Self {
        if s == 1.0 {
            return self;
        }
        Self::new(self.x * s, self.y * s, self.z * s, self.w * s)
    }

    pub fn div(self, s: f32) -> Self {
        if s == 1.0 {
            return self;
        }
        Self::new(self.x / s, self.y / s, self.z / s, self.w / s)
    }

    pub fn normalize(self) -> Self {
        let n = self.norm();
        if n <= f32::EPSILON {
            return Self::IDENTITY;
        }
        self.div(n)
    }

    pub fn conjugate(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    /// Rotates `v` by this (unit) quaternion.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let u = Vec3::new(self.x, self.y, self.z);
        let t = u.cross(v) * 2.0;
        v + t * self.w + u.cross(t)
    }

    /// Spherical interpolation from `self` toward `q`.
    pub fn slerp(self, q: Self, t: f32) -> Self {
        if self == q {
            return self;
        }

        let mut d = self.dot(q);
        let q = if d < 0.0 {
            d = -d;
            Self::new(-q.x, -q.y, -q.z, -q.w)
        } else {
            q
        };

        let (f0, f1) = if 1.0 - d > 0.1 {
            let angle = d.acos();
            let s = angle.sin();
            let t_angle = t * angle;
            ((angle - t_angle).sin() / s, t_angle.sin() / s)
        } else {
            (1.0 - t, t)
        };

        Self::new(
            f0 * self.x + f1 * q.x,
            f0 * self.y + f1 * q.y,
            f0 * self.z + f1 * q.z,
            f0 * self.w + f1 * q.w,
        )
    }

    /// Rotation matrix, row-major, translation zero.
    pub fn to_matrix(self) -> Mat4 {
        let Self { x, y, z, w } = self;
        Mat4 {
            m: [
                [
                    1.0 - 2.0 * (y * y + z * z),
                    2.0 * (x * y - z * w),
                    2.0 * (x * z + y * w),
                    0.0,
                ],
                [
                    2.0 * (x * y + z * w),
                    1.0 - 2.0 * (x * x + z * z),
                    2.0 * (y * z - x * w),
                    0.0,
                ],
                [
                    2.0 * (x * z - y * w),
                    2.0 * (y * z + x * w),
                    1.0 - 2.0 * (x * x + y * y),
                    0.0,
                ],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// `[x, y, z, w]`, the layout display entities expect.
    pub fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }

    pub fn from_array(a: [f32; 4]) -> Self {
        Self::new(a[0], a[1], a[2], a[3])
    }
}

/// 4x4 matrix, row-major.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mat4 {
    pub m: [[f32; 4]; 4],
}

impl Default for Mat4 {
    fn default() -> Self {
        Self {
            m: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }
}

impl Mat4 {
    /// Flattened row by row, 16 floats.
    pub fn to_flat(&self) -> [f32; 16] {
        let mut out = [0.0; 16];
        for (r, row) in self.m.iter().enumerate() {
            out[r * 4..r * 4 + 4].copy_from_slice(row);
        }
        out
    }
}

/// 3x3 matrix, row-major. Used for inertia tensors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat3 {
    pub m: [[f32; 3]; 3],
}

impl Default for Mat3 {
    fn default() -> Self {
        Self::diagonal(Vec3::ONE)
    }
}

impl Mat3 {
    pub const ZERO: Self = Self { m: [[0.0; 3]; 3] };

    pub fn diagonal(d: Vec3) -> Self {
        Self {
            m: [[d.x, 0.0, 0.0], [0.0, d.y, 0.0], [0.0, 0.0, d.z]],
        }
    }

    pub fn from_quat(q: Quat) -> Self {
        let r = q.to_matrix().m;
        Self {
            m: [
                [r[0][0], r[0][1], r[0][2]],
                [r[1][0], r[1][1], r[1][2]],
                [r[2][0], r[2][1], r[2][2]],
            ],
        }
    }

    pub fn transpose(&self) -> Self {
        let m = &self.m;
        Self {
            m: [
                [m[0][0], m[1][0], m[2][0]],
                [m[0][1], m[1][1], m[2][1]],
                [m[0][2], m[1][2], m[2][2]],
            ],
        }
    }

    pub fn mul(&self, rhs: &Self) -> Self {
        let mut out = Self::ZERO;
        for r in 0..3 {
            for c in 0..3 {
                out.m[r][c] = (0..3).map(|k| self.m[r][k] * rhs.m[k][c]).sum();
            }
        }
        out
    }

    pub fn mul_vec(&self, v: Vec3) -> Vec3 {
        let m = &self.m;
        Vec3::new(
            m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z,
            m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z,
            m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    fn vec_approx(a: Vec3, b: Vec3) -> bool {
        approx(a.x, b.x) && approx(a.y, b.y) && approx(a.z, b.z)
    }

    #[test]
    fn vec3_lerp_midpoint() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(2.0, 4.0, 6.0);
        let mid = a.lerp(b, 0.5);
        assert_eq!(mid, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn vec3_cross_follows_right_hand_rule() {
        assert_eq!(Vec3::X.cross(Vec3::Y), Vec3::Z);
        assert_eq!(Vec3::ZERO.normalize_or_zero(), Vec3::ZERO);
    }

    #[test]
    fn point_floors_into_block_cell() {
        assert_eq!(Point::new(1.7, -0.2, 3.0).block_pos(), BlockPos::new(1, -1, 3));
        assert_eq!(BlockPos::new(2, 0, -3).center(), Point::new(2.5, 0.5, -2.5));
    }

    #[test]
    fn axis_angle_rotates_vector() {
        let q = Quat::from_axis_angle(Vec3::Y, std::f32::consts::FRAC_PI_2);
        assert!(vec_approx(q.rotate(Vec3::X), Vec3::new(0.0, 0.0, -1.0)));
        assert!(approx(q.norm(), 1.0));
    }

    #[test]
    fn product_composes_rotations() {
        let quarter = Quat::from_axis_angle(Vec3::Z, std::f32::consts::FRAC_PI_2);
        let half = quarter.mul(quarter);
        assert!(vec_approx(half.rotate(Vec3::X), Vec3::new(-1.0, 0.0, 0.0)));
    }

    #[test]
    fn slerp_halfway_between_identity_and_quarter_turn() {
        let q = Quat::from_axis_angle(Vec3::Y, std::f32::consts::FRAC_PI_2);
        let mid = Quat::IDENTITY.slerp(q, 0.5);
        let expected = Quat::from_axis_angle(Vec3::Y, std::f32::consts::FRAC_PI_4);
        assert!(approx(mid.dot(expected), 1.0));
    }

    #[test]
    fn slerp_takes_short_path_for_negated_target() {
        let q = Quat::from_axis_angle(Vec3::X, 0.3);
        let neg = q.scale(-1.0);
        let out = q.slerp(neg, 0.5);
        assert!(approx(out.dot(q).abs(), 1.0));
    }

    #[test]
    fn euler_result_is_normalized() {
        let q = Quat::from_euler(0.4, 1.1, -0.7);
        assert!(approx(q.norm(), 1.0));
        let yaw_only = Quat::from_euler(std::f32::consts::FRAC_PI_2, 0.0, 0.0);
        assert!(approx(yaw_only.x, (std::f32::consts::FRAC_PI_4).sin()));
    }

    #[test]
    fn identity_matrix_and_array_layout() {
        assert_eq!(Quat::IDENTITY.to_matrix(), Mat4::default());
        assert_eq!(Quat::new(1.0, 2.0, 3.0, 4.0).to_array(), [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn rotation_matrix_matches_quaternion_rotate() {
        let q = Quat::from_euler(0.3, -0.8, 1.2);
        let m = Mat3::from_quat(q);
        let v = Vec3::new(0.2, -1.0, 3.0);
        assert!(vec_approx(m.mul_vec(v), q.rotate(v)));
        let round = m.mul(&m.transpose());
        assert!(vec_approx(round.mul_vec(v), v));
    }
}
