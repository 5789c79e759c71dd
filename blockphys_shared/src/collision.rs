//! Collision shapes and narrowphase.
//!
//! Supported pairs: sphere-sphere, sphere-cuboid, cuboid-cuboid. Cuboid
//! pairs take their normal from the face axis of least overlap and their
//! points from vertices contained in the other box. Pure edge-edge crossings
//! produce no points.

use serde::{Deserialize, Serialize};

use crate::math::{Mat3, Quat, Vec3};

/// Collision shape, centred on the body origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Sphere { radius: f32 },
    Cuboid { half_extents: Vec3 },
}

impl Shape {
    pub fn sphere(radius: f32) -> Self {
        Shape::Sphere { radius }
    }

    pub fn cuboid(half_extents: Vec3) -> Self {
        Shape::Cuboid { half_extents }
    }

    /// A full block: 1x1x1 cuboid.
    pub fn block() -> Self {
        Shape::cuboid(Vec3::splat(0.5))
    }

    /// Diagonal of the inertia tensor in body space.
    pub fn local_inertia(&self, mass: f32) -> Vec3 {
        match *self {
            Shape::Sphere { radius } => Vec3::splat(0.4 * mass * radius * radius),
            Shape::Cuboid { half_extents } => {
                let s = half_extents * 2.0;
                let k = mass / 12.0;
                Vec3::new(
                    k * (s.y * s.y + s.z * s.z),
                    k * (s.x * s.x + s.z * s.z),
                    k * (s.x * s.x + s.y * s.y),
                )
            }
        }
    }

    /// World-space bounding box at the given pose.
    pub fn aabb(&self, position: Vec3, rotation: Quat) -> Aabb {
        let extents = match *self {
            Shape::Sphere { radius } => Vec3::splat(radius),
            Shape::Cuboid { half_extents } => {
                let r = Mat3::from_quat(rotation).m;
                let row = |i: usize| Vec3::new(r[i][0].abs(), r[i][1].abs(), r[i][2].abs());
                Vec3::new(
                    row(0).dot(half_extents),
                    row(1).dot(half_extents),
                    row(2).dot(half_extents),
                )
            }
        };
        Aabb {
            min: position - extents,
            max: position + extents,
        }
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }
}

/// One contact point between two shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    /// World-space contact location.
    pub point: Vec3,
    /// Unit normal pointing from shape A toward shape B.
    pub normal: Vec3,
    /// Penetration depth, positive when overlapping.
    pub depth: f32,
}

/// A shape placed in the world.
#[derive(Debug, Clone, Copy)]
pub struct Posed {
    pub shape: Shape,
    pub position: Vec3,
    pub rotation: Quat,
}

/// Contact points between `a` and `b`; empty when they do not touch.
pub fn collide(a: &Posed, b: &Posed) -> Vec<ContactPoint> {
    match (a.shape, b.shape) {
        (Shape::Sphere { radius: ra }, Shape::Sphere { radius: rb }) => {
            sphere_sphere(a.position, ra, b.position, rb)
                .into_iter()
                .collect()
        }
        (Shape::Sphere { radius }, Shape::Cuboid { half_extents }) => {
            sphere_cuboid(a.position, radius, b.position, b.rotation, half_extents)
                .into_iter()
                .collect()
        }
        (Shape::Cuboid { half_extents }, Shape::Sphere { radius }) => {
            sphere_cuboid(b.position, radius, a.position, a.rotation, half_extents)
                .into_iter()
                .map(flip)
                .collect()
        }
        (Shape::Cuboid { half_extents: ha }, Shape::Cuboid { half_extents: hb }) => {
            cuboid_cuboid(a, ha, b, hb)
        }
    }
}

fn flip(c: ContactPoint) -> ContactPoint {
    ContactPoint {
        normal: -c.normal,
        ..c
    }
}

fn sphere_sphere(pa: Vec3, ra: f32, pb: Vec3, rb: f32) -> Option<ContactPoint> {
    let d = pb - pa;
    let dist_sq = d.len_sq();
    let r = ra + rb;
    if dist_sq > r * r {
        return None;
    }
    let dist = dist_sq.sqrt();
    let normal = if dist > f32::EPSILON { d / dist } else { Vec3::Y };
    let depth = r - dist;
    Some(ContactPoint {
        point: pa + normal * (ra - depth * 0.5),
        normal,
        depth,
    })
}

/// Sphere is shape A, cuboid is shape B.
fn sphere_cuboid(
    center: Vec3,
    radius: f32,
    box_pos: Vec3,
    box_rot: Quat,
    he: Vec3,
) -> Option<ContactPoint> {
    let local = box_rot.conjugate().rotate(center - box_pos);
    let clamped = local.max(-he).min(he);

    // Normal in box space pointing out of the box toward the sphere.
    let (outward, depth, surface) = if clamped == local {
        let (axis, pen) = min_axis_penetration(local, he);
        let sign = if local.axis(axis) >= 0.0 { 1.0 } else { -1.0 };
        let n = unit_axis(axis) * sign;
        let mut surface = local;
        match axis {
            0 => surface.x = he.x * sign,
            1 => surface.y = he.y * sign,
            _ => surface.z = he.z * sign,
        }
        (n, radius + pen, surface)
    } else {
        let diff = local - clamped;
        let dist_sq = diff.len_sq();
        if dist_sq > radius * radius {
            return None;
        }
        let dist = dist_sq.sqrt();
        (diff / dist, radius - dist, clamped)
    };

    Some(ContactPoint {
        point: box_pos + box_rot.rotate(surface),
        normal: -box_rot.rotate(outward),
        depth,
    })
}

fn cuboid_cuboid(a: &Posed, ha: Vec3, b: &Posed, hb: Vec3) -> Vec<ContactPoint> {
    let ca = corners(a.position, a.rotation, ha);
    let cb = corners(b.position, b.rotation, hb);
    let axes = [
        a.rotation.rotate(Vec3::X),
        a.rotation.rotate(Vec3::Y),
        a.rotation.rotate(Vec3::Z),
        b.rotation.rotate(Vec3::X),
        b.rotation.rotate(Vec3::Y),
        b.rotation.rotate(Vec3::Z),
    ];
    let d = b.position - a.position;

    // Face axis of least overlap becomes the contact normal.
    let mut best: Option<(Vec3, f32)> = None;
    for axis in axes {
        let (amin, amax) = project(&ca, axis);
        let (bmin, bmax) = project(&cb, axis);
        let overlap = amax.min(bmax) - amin.max(bmin);
        if overlap < 0.0 {
            return Vec::new();
        }
        if best.map_or(true, |(_, o)| overlap < o) {
            let n = if d.dot(axis) < 0.0 { -axis } else { axis };
            best = Some((n, overlap));
        }
    }
    let Some((normal, _)) = best else {
        return Vec::new();
    };

    let b_face = project(&cb, normal).0;
    let a_face = project(&ca, normal).1;
    let mut out = Vec::new();
    for v in ca {
        if inside(v, b.position, b.rotation, hb) {
            let depth = v.dot(normal) - b_face;
            if depth >= 0.0 {
                out.push(ContactPoint { point: v, normal, depth });
            }
        }
    }
    for v in cb {
        if inside(v, a.position, a.rotation, ha) {
            let depth = a_face - v.dot(normal);
            if depth >= 0.0 {
                out.push(ContactPoint { point: v, normal, depth });
            }
        }
    }
    out
}

fn project(corners: &[Vec3; 8], axis: Vec3) -> (f32, f32) {
    corners
        .iter()
        .map(|c| c.dot(axis))
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| (lo.min(p), hi.max(p)))
}

fn corners(position: Vec3, rotation: Quat, he: Vec3) -> [Vec3; 8] {
    let mut out = [Vec3::ZERO; 8];
    for (i, slot) in out.iter_mut().enumerate() {
        let sx = if i & 1 == 0 { -1.0 } else { 1.0 };
        let sy = if i & 2 == 0 { -1.0 } else { 1.0 };
        let sz = if i & 4 == 0 { -1.0 } else { 1.0 };
        let local = Vec3::new(he.x * sx, he.y * sy, he.z * sz);
        *slot = position + rotation.rotate(local);
    }
    out
}

const INSIDE_TOLERANCE: f32 = 1e-4;

fn inside(p: Vec3, box_pos: Vec3, box_rot: Quat, he: Vec3) -> bool {
    let local = box_rot.conjugate().rotate(p - box_pos);
    local.x.abs() <= he.x + INSIDE_TOLERANCE
        && local.y.abs() <= he.y + INSIDE_TOLERANCE
        && local.z.abs() <= he.z + INSIDE_TOLERANCE
}

fn min_axis_penetration(local: Vec3, he: Vec3) -> (usize, f32) {
    (0..3)
        .map(|i| (i, he.axis(i) - local.axis(i).abs()))
        .fold((0, f32::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

fn unit_axis(i: usize) -> Vec3 {
    match i {
        0 => Vec3::X,
        1 => Vec3::Y,
        _ => Vec3::Z,
    }
}
