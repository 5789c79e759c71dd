//! Rigid-body simulation.
//!
//! `PhysicsSpace` owns every body of one instance and advances them with a
//! fixed internal timestep:
//! - Velocities are integrated first (gravity, damping).
//! - Broadphase: sort-and-sweep over AABB x-intervals.
//! - Narrowphase: see `collision`.
//! - Sequential impulses with restitution and Coulomb friction.
//! - Positions are integrated, then penetration is corrected.
//!
//! Each step also diffs the set of touching body pairs against the previous
//! step to report contact lifecycle notices.
//!
//! Determinism notes:
//! - Bodies live in a `BTreeMap`, so iteration order is stable by id.
//! - Pair ids are ordered `(low, high)`.

use std::collections::{BTreeMap, BTreeSet};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    collision::{collide, Aabb, ContactPoint, Posed, Shape},
    config::PhysicsConfig,
    math::{Mat3, Quat, Vec3},
};

/// Closing speed below which restitution is ignored.
const RESTITUTION_THRESHOLD: f32 = 1.0;

bitflags! {
    /// Contact notices a space produces.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ContactListeners: u8 {
        const STARTED = 0b001;
        const ONGOING = 0b010;
        const ENDED = 0b100;
    }
}

impl ContactListeners {
    pub fn new(ended: bool, ongoing: bool, started: bool) -> Self {
        let mut flags = Self::empty();
        flags.set(Self::ENDED, ended);
        flags.set(Self::ONGOING, ongoing);
        flags.set(Self::STARTED, started);
        flags
    }
}

impl Default for ContactListeners {
    fn default() -> Self {
        Self::all()
    }
}

/// Handle to a body inside a `PhysicsSpace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(pub u64);

/// Construction parameters for a rigid body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidBodyDesc {
    pub shape: Shape,
    /// Zero makes the body static.
    pub mass: f32,
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub restitution: f32,
    pub friction: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
}

impl RigidBodyDesc {
    /// Dynamic body of mass 1.
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            mass: 1.0,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            restitution: 0.0,
            friction: 0.5,
            linear_damping: 0.0,
            angular_damping: 0.0,
        }
    }

    /// Static body that never moves.
    pub fn fixed(shape: Shape) -> Self {
        Self {
            mass: 0.0,
            ..Self::new(shape)
        }
    }

    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass.max(0.0);
        self
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation.normalize();
        self
    }

    pub fn with_linear_velocity(mut self, v: Vec3) -> Self {
        self.linear_velocity = v;
        self
    }

    pub fn with_angular_velocity(mut self, w: Vec3) -> Self {
        self.angular_velocity = w;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution.clamp(0.0, 1.0);
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction.max(0.0);
        self
    }

    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear.clamp(0.0, 1.0);
        self.angular_damping = angular.clamp(0.0, 1.0);
        self
    }
}

/// A simulated body.
#[derive(Debug, Clone)]
pub struct RigidBody {
    id: BodyId,
    shape: Shape,
    mass: f32,
    inv_mass: f32,
    inv_inertia_local: Vec3,
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub restitution: f32,
    pub friction: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
}

impl RigidBody {
    fn from_desc(id: BodyId, desc: RigidBodyDesc) -> Self {
        let (inv_mass, inv_inertia_local) = if desc.mass > 0.0 {
            let inertia = desc.shape.local_inertia(desc.mass);
            let inv = |v: f32| if v > 0.0 { 1.0 / v } else { 0.0 };
            (
                1.0 / desc.mass,
                Vec3::new(inv(inertia.x), inv(inertia.y), inv(inertia.z)),
            )
        } else {
            (0.0, Vec3::ZERO)
        };

        Self {
            id,
            shape: desc.shape,
            mass: desc.mass,
            inv_mass,
            inv_inertia_local,
            position: desc.position,
            rotation: desc.rotation,
            linear_velocity: if inv_mass > 0.0 { desc.linear_velocity } else { Vec3::ZERO },
            angular_velocity: if inv_mass > 0.0 { desc.angular_velocity } else { Vec3::ZERO },
            restitution: desc.restitution,
            friction: desc.friction,
            linear_damping: desc.linear_damping,
            angular_damping: desc.angular_damping,
        }
    }

    pub fn id(&self) -> BodyId {
        self.id
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn is_static(&self) -> bool {
        self.inv_mass == 0.0
    }

    pub fn aabb(&self) -> Aabb {
        self.shape.aabb(self.position, self.rotation)
    }

    fn posed(&self) -> Posed {
        Posed {
            shape: self.shape,
            position: self.position,
            rotation: self.rotation,
        }
    }

    fn inv_inertia_world(&self) -> Mat3 {
        let r = Mat3::from_quat(self.rotation);
        r.mul(&Mat3::diagonal(self.inv_inertia_local))
            .mul(&r.transpose())
    }

    /// Velocity of the material point at world offset `r` from the centre.
    fn velocity_at(&self, r: Vec3) -> Vec3 {
        self.linear_velocity + self.angular_velocity.cross(r)
    }

    fn apply_impulse(&mut self, impulse: Vec3, r: Vec3, inv_inertia: &Mat3) {
        self.linear_velocity += impulse * self.inv_mass;
        self.angular_velocity += inv_inertia.mul_vec(r.cross(impulse));
    }
}

/// Contact lifecycle stage for one body pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactKind {
    Started,
    Ongoing,
    Ended,
}

/// A contact lifecycle notice produced by `PhysicsSpace::update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactNotice {
    pub kind: ContactKind,
    pub body_a: BodyId,
    pub body_b: BodyId,
}

struct Manifold {
    a: BodyId,
    b: BodyId,
    points: Vec<ContactPoint>,
}

struct SolverPoint {
    ra: Vec3,
    rb: Vec3,
    normal: Vec3,
    normal_mass: f32,
    bounce: f32,
    impulse: f32,
}

/// A collection of rigid bodies simulated together.
pub struct PhysicsSpace {
    cfg: PhysicsConfig,
    gravity: Vec3,
    listeners: ContactListeners,
    bodies: BTreeMap<BodyId, RigidBody>,
    next_id: u64,
    accumulator: f32,
    touching: BTreeSet<(BodyId, BodyId)>,
    pending: Vec<ContactNotice>,
}

impl PhysicsSpace {
    /// Creates an empty space producing every kind of contact notice.
    pub fn new(cfg: PhysicsConfig) -> Self {
        Self {
            gravity: cfg.gravity,
            cfg,
            listeners: ContactListeners::all(),
            bodies: BTreeMap::new(),
            next_id: 1,
            accumulator: 0.0,
            touching: BTreeSet::new(),
            pending: Vec::new(),
        }
    }

    pub fn with_listeners(mut self, listeners: ContactListeners) -> Self {
        self.listeners = listeners;
        self
    }

    pub fn listeners(&self) -> ContactListeners {
        self.listeners
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.cfg
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    /// Adds a body and returns its handle.
    pub fn add_body(&mut self, desc: RigidBodyDesc) -> BodyId {
        let id = BodyId(self.next_id);
        self.next_id += 1;
        self.bodies.insert(id, RigidBody::from_desc(id, desc));
        trace!(body = ?id, "Body added");
        id
    }

    /// Removes a body. Pairs it was touching are reported as ended by the
    /// next update.
    pub fn remove_body(&mut self, id: BodyId) -> Option<RigidBody> {
        let body = self.bodies.remove(&id)?;
        let gone: Vec<_> = self
            .touching
            .iter()
            .filter(|(a, b)| *a == id || *b == id)
            .copied()
            .collect();
        for pair in gone {
            self.touching.remove(&pair);
            if self.listeners.contains(ContactListeners::ENDED) {
                self.pending.push(ContactNotice {
                    kind: ContactKind::Ended,
                    body_a: pair.0,
                    body_b: pair.1,
                });
            }
        }
        Some(body)
    }

    pub fn body(&self, id: BodyId) -> Option<&RigidBody> {
        self.bodies.get(&id)
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        self.bodies.get_mut(&id)
    }

    pub fn contains(&self, id: BodyId) -> bool {
        self.bodies.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn bodies(&self) -> impl Iterator<Item = &RigidBody> {
        self.bodies.values()
    }

    /// Whether the two bodies were touching after the last step.
    pub fn are_touching(&self, a: BodyId, b: BodyId) -> bool {
        self.touching.contains(&ordered(a, b))
    }

    /// Adds an impulse through the centre of mass. Returns false (and does
    /// nothing) for static or unknown bodies.
    pub fn apply_central_impulse(&mut self, id: BodyId, impulse: Vec3) -> bool {
        match self.bodies.get_mut(&id) {
            Some(body) if !body.is_static() => {
                body.linear_velocity += impulse * body.inv_mass;
                true
            }
            _ => false,
        }
    }

    pub fn set_linear_velocity(&mut self, id: BodyId, v: Vec3) -> bool {
        match self.bodies.get_mut(&id) {
            Some(body) if !body.is_static() => {
                body.linear_velocity = v;
                true
            }
            _ => false,
        }
    }

    pub fn set_angular_velocity(&mut self, id: BodyId, w: Vec3) -> bool {
        match self.bodies.get_mut(&id) {
            Some(body) if !body.is_static() => {
                body.angular_velocity = w;
                true
            }
            _ => false,
        }
    }

    /// Teleports a body.
    pub fn set_position(&mut self, id: BodyId, position: Vec3) -> bool {
        match self.bodies.get_mut(&id) {
            Some(body) => {
                body.position = position;
                true
            }
            None => false,
        }
    }

    pub fn set_rotation(&mut self, id: BodyId, rotation: Quat) -> bool {
        match self.bodies.get_mut(&id) {
            Some(body) => {
                body.rotation = rotation.normalize();
                true
            }
            None => false,
        }
    }

    /// Advances the simulation by `dt` seconds using the configured substep limit.
    pub fn update(&mut self, dt: f32) -> Vec<ContactNotice> {
        self.update_with(dt, self.cfg.max_substeps)
    }

    /// Advances the simulation by `dt` seconds.
    ///
    /// Time accumulates across calls; every whole `fixed_timestep` in the
    /// accumulator runs one step, up to `max_steps`. Time beyond the cap is
    /// dropped. `max_steps == 0` runs a single step of exactly `dt`.
    pub fn update_with(&mut self, dt: f32, max_steps: u32) -> Vec<ContactNotice> {
        let mut notices = std::mem::take(&mut self.pending);
        if !(dt.is_finite() && dt > 0.0) {
            return notices;
        }

        if max_steps == 0 {
            self.step(dt, &mut notices);
            return notices;
        }

        let fixed = self.cfg.fixed_timestep;
        self.accumulator += dt;
        let mut steps = 0u32;
        if self.accumulator >= fixed {
            steps = (self.accumulator / fixed) as u32;
            self.accumulator -= steps as f32 * fixed;
        }
        for _ in 0..steps.min(max_steps) {
            self.step(fixed, &mut notices);
        }
        notices
    }

    fn step(&mut self, h: f32, notices: &mut Vec<ContactNotice>) {
        self.integrate_velocities(h);
        let manifolds = self.find_contacts();
        self.solve_velocities(&manifolds);
        self.integrate_positions(h);
        self.correct_positions(&manifolds);
        self.diff_contacts(&manifolds, notices);
    }

    fn integrate_velocities(&mut self, h: f32) {
        let gravity = self.gravity;
        for body in self.bodies.values_mut().filter(|b| !b.is_static()) {
            body.linear_velocity += gravity * h;
            body.linear_velocity *= (1.0 - body.linear_damping).powf(h);
            body.angular_velocity *= (1.0 - body.angular_damping).powf(h);
        }
    }

    fn broadphase(&self) -> Vec<(BodyId, BodyId)> {
        let mut spans: Vec<(Aabb, &RigidBody)> =
            self.bodies.values().map(|b| (b.aabb(), b)).collect();
        spans.sort_by(|l, r| l.0.min.x.total_cmp(&r.0.min.x));

        let mut pairs = Vec::new();
        for (i, (aabb_i, body_i)) in spans.iter().enumerate() {
            for (aabb_j, body_j) in &spans[i + 1..] {
                if aabb_j.min.x > aabb_i.max.x {
                    break;
                }
                if body_i.is_static() && body_j.is_static() {
                    continue;
                }
                if aabb_i.overlaps(aabb_j) {
                    pairs.push(ordered(body_i.id, body_j.id));
                }
            }
        }
        pairs.sort();
        pairs
    }

    fn find_contacts(&self) -> Vec<Manifold> {
        self.broadphase()
            .into_iter()
            .filter_map(|(a, b)| {
                let (ba, bb) = (self.bodies.get(&a)?, self.bodies.get(&b)?);
                let points = collide(&ba.posed(), &bb.posed());
                (!points.is_empty()).then_some(Manifold { a, b, points })
            })
            .collect()
    }

    fn solve_velocities(&mut self, manifolds: &[Manifold]) {
        let mut prepared: Vec<Vec<SolverPoint>> =
            manifolds.iter().map(|m| self.prepare_manifold(m)).collect();
        for _ in 0..self.cfg.solver_iterations.max(1) {
            for (m, points) in manifolds.iter().zip(prepared.iter_mut()) {
                self.solve_manifold(m, points);
            }
        }
    }

    /// Solver data fixed for the whole step: lever arms, effective mass and
    /// the restitution target computed from the pre-solve closing speed.
    fn prepare_manifold(&self, m: &Manifold) -> Vec<SolverPoint> {
        let (Some(a), Some(b)) = (self.bodies.get(&m.a), self.bodies.get(&m.b)) else {
            return Vec::new();
        };
        let inv_ia = a.inv_inertia_world();
        let inv_ib = b.inv_inertia_world();
        let restitution = a.restitution.max(b.restitution);

        m.points
            .iter()
            .map(|c| {
                let ra = c.point - a.position;
                let rb = c.point - b.position;
                let vn = (b.velocity_at(rb) - a.velocity_at(ra)).dot(c.normal);
                let bounce = if vn < -RESTITUTION_THRESHOLD {
                    -restitution * vn
                } else {
                    0.0
                };
                SolverPoint {
                    ra,
                    rb,
                    normal: c.normal,
                    normal_mass: inv_effective_mass(a, b, &inv_ia, &inv_ib, ra, rb, c.normal),
                    bounce,
                    impulse: 0.0,
                }
            })
            .collect()
    }

    fn solve_manifold(&mut self, m: &Manifold, points: &mut [SolverPoint]) {
        let (Some(mut a), Some(mut b)) = (self.bodies.remove(&m.a), self.bodies.remove(&m.b))
        else {
            return;
        };

        let inv_ia = a.inv_inertia_world();
        let inv_ib = b.inv_inertia_world();
        let friction = (a.friction * b.friction).sqrt();

        for p in points.iter_mut() {
            let rel = b.velocity_at(p.rb) - a.velocity_at(p.ra);
            let vn = rel.dot(p.normal);

            // Accumulated, clamped normal impulse.
            let delta = (p.bounce - vn) * p.normal_mass;
            let total = (p.impulse + delta).max(0.0);
            let applied = total - p.impulse;
            p.impulse = total;
            let j = p.normal * applied;
            a.apply_impulse(-j, p.ra, &inv_ia);
            b.apply_impulse(j, p.rb, &inv_ib);

            // Friction along the current sliding direction, bounded by the
            // accumulated normal impulse.
            let rel = b.velocity_at(p.rb) - a.velocity_at(p.ra);
            let tangent_vel = rel - p.normal * rel.dot(p.normal);
            let tangent = tangent_vel.normalize_or_zero();
            if tangent != Vec3::ZERO {
                let tangent_mass =
                    inv_effective_mass(&a, &b, &inv_ia, &inv_ib, p.ra, p.rb, tangent);
                let limit = friction * p.impulse;
                let jt = (-tangent_vel.dot(tangent) * tangent_mass).clamp(-limit, limit);
                let jt = tangent * jt;
                a.apply_impulse(-jt, p.ra, &inv_ia);
                b.apply_impulse(jt, p.rb, &inv_ib);
            }
        }

        self.bodies.insert(m.a, a);
        self.bodies.insert(m.b, b);
    }

    fn integrate_positions(&mut self, h: f32) {
        for body in self.bodies.values_mut().filter(|b| !b.is_static()) {
            body.position += body.linear_velocity * h;

            let w = body.angular_velocity;
            if w != Vec3::ZERO {
                let spin = Quat::new(w.x, w.y, w.z, 0.0).mul(body.rotation).scale(0.5 * h);
                body.rotation = Quat::new(
                    body.rotation.x + spin.x,
                    body.rotation.y + spin.y,
                    body.rotation.z + spin.z,
                    body.rotation.w + spin.w,
                )
                .normalize();
            }
        }
    }

    fn correct_positions(&mut self, manifolds: &[Manifold]) {
        let slop = self.cfg.linear_slop;
        let percent = self.cfg.baumgarte;
        for m in manifolds {
            let (inv_a, inv_b) = match (self.bodies.get(&m.a), self.bodies.get(&m.b)) {
                (Some(a), Some(b)) => (a.inv_mass, b.inv_mass),
                _ => continue,
            };
            let total = inv_a + inv_b;
            if total == 0.0 {
                continue;
            }
            let share = 1.0 / m.points.len() as f32;
            let mut push = Vec3::ZERO;
            for c in &m.points {
                push += c.normal * ((c.depth - slop).max(0.0) * percent / total * share);
            }
            if let Some(a) = self.bodies.get_mut(&m.a) {
                a.position -= push * inv_a;
            }
            if let Some(b) = self.bodies.get_mut(&m.b) {
                b.position += push * inv_b;
            }
        }
    }

    fn diff_contacts(&mut self, manifolds: &[Manifold], notices: &mut Vec<ContactNotice>) {
        let current: BTreeSet<(BodyId, BodyId)> = manifolds.iter().map(|m| (m.a, m.b)).collect();
        let notice = |kind, (body_a, body_b): (BodyId, BodyId)| ContactNotice {
            kind,
            body_a,
            body_b,
        };

        if self.listeners.contains(ContactListeners::STARTED) {
            notices.extend(
                current
                    .difference(&self.touching)
                    .map(|p| notice(ContactKind::Started, *p)),
            );
        }
        if self.listeners.contains(ContactListeners::ONGOING) {
            notices.extend(current.iter().map(|p| notice(ContactKind::Ongoing, *p)));
        }
        if self.listeners.contains(ContactListeners::ENDED) {
            notices.extend(
                self.touching
                    .difference(&current)
                    .map(|p| notice(ContactKind::Ended, *p)),
            );
        }
        self.touching = current;
    }
}

fn ordered(a: BodyId, b: BodyId) -> (BodyId, BodyId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn inv_effective_mass(
    a: &RigidBody,
    b: &RigidBody,
    inv_ia: &Mat3,
    inv_ib: &Mat3,
    ra: Vec3,
    rb: Vec3,
    dir: Vec3,
) -> f32 {
    let ang_a = inv_ia.mul_vec(ra.cross(dir)).cross(ra);
    let ang_b = inv_ib.mul_vec(rb.cross(dir)).cross(rb);
    let k = a.inv_mass + b.inv_mass + dir.dot(ang_a + ang_b);
    if k > 0.0 {
        1.0 / k
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> PhysicsSpace {
        PhysicsSpace::new(PhysicsConfig::default())
    }

    fn floor(space: &mut PhysicsSpace) -> BodyId {
        space.add_body(
            RigidBodyDesc::fixed(Shape::cuboid(Vec3::new(5.0, 0.5, 5.0))).at(Vec3::new(0.0, -0.5, 0.0)),
        )
    }

    #[test]
    fn free_fall_matches_gravity() {
        let mut space = space();
        let ball = space.add_body(RigidBodyDesc::new(Shape::sphere(0.5)).at(Vec3::new(0.0, 100.0, 0.0)));

        for _ in 0..60 {
            space.update(1.0 / 60.0);
        }

        let body = space.body(ball).unwrap();
        assert!((body.linear_velocity.y + 9.81).abs() < 0.05);
        // Semi-implicit Euler lands slightly below the analytic 95.095.
        assert!(body.position.y < 95.2 && body.position.y > 94.9);
    }

    #[test]
    fn accumulator_waits_for_whole_steps() {
        let mut space = space();
        let ball = space.add_body(RigidBodyDesc::new(Shape::sphere(0.5)).at(Vec3::new(0.0, 10.0, 0.0)));

        space.update(1.0 / 120.0);
        assert_eq!(space.body(ball).unwrap().linear_velocity.y, 0.0);

        space.update(1.0 / 120.0 + 1e-4);
        assert!(space.body(ball).unwrap().linear_velocity.y < 0.0);
    }

    #[test]
    fn substep_cap_drops_excess_time() {
        let mut space = space();
        let ball = space.add_body(RigidBodyDesc::new(Shape::sphere(0.5)).at(Vec3::new(0.0, 10.0, 0.0)));

        // One second would be 60 steps; only 4 run.
        space.update(1.0);
        let vy = space.body(ball).unwrap().linear_velocity.y;
        assert!((vy + 4.0 * 9.81 / 60.0).abs() < 1e-3);
    }

    #[test]
    fn zero_max_steps_runs_variable_step() {
        let mut space = space();
        let ball = space.add_body(RigidBodyDesc::new(Shape::sphere(0.5)).at(Vec3::new(0.0, 10.0, 0.0)));
        space.update_with(0.25, 0);
        let vy = space.body(ball).unwrap().linear_velocity.y;
        assert!((vy + 9.81 * 0.25).abs() < 1e-4);
    }

    #[test]
    fn static_bodies_never_move() {
        let mut space = space();
        let ground = floor(&mut space);
        assert!(!space.apply_central_impulse(ground, Vec3::new(0.0, 50.0, 0.0)));
        assert!(!space.set_linear_velocity(ground, Vec3::Y));
        assert!(!space.set_angular_velocity(ground, Vec3::Y));
        for _ in 0..30 {
            space.update(1.0 / 60.0);
        }
        assert_eq!(space.body(ground).unwrap().position, Vec3::new(0.0, -0.5, 0.0));
    }

    #[test]
    fn impulse_changes_dynamic_velocity() {
        let mut space = space();
        let ball = space.add_body(
            RigidBodyDesc::new(Shape::sphere(0.5))
                .with_mass(2.0)
                .at(Vec3::new(0.0, 10.0, 0.0)),
        );
        assert!(space.apply_central_impulse(ball, Vec3::new(4.0, 0.0, 0.0)));
        assert_eq!(space.body(ball).unwrap().linear_velocity, Vec3::new(2.0, 0.0, 0.0));
        assert!(!space.apply_central_impulse(BodyId(9999), Vec3::X));
    }

    #[test]
    fn sphere_comes_to_rest_on_floor() {
        let mut space = space();
        floor(&mut space);
        let ball = space.add_body(RigidBodyDesc::new(Shape::sphere(0.5)).at(Vec3::new(0.0, 3.0, 0.0)));

        for _ in 0..240 {
            space.update(1.0 / 60.0);
        }

        let body = space.body(ball).unwrap();
        assert!((body.position.y - 0.5).abs() < 0.05, "y = {}", body.position.y);
        assert!(body.linear_velocity.length() < 0.1);
    }

    #[test]
    fn block_lands_flat_on_block() {
        let mut space = space();
        let ground = space.add_body(RigidBodyDesc::fixed(Shape::block()).at(Vec3::new(0.5, 0.5, 0.5)));
        let cube = space.add_body(RigidBodyDesc::new(Shape::block()).at(Vec3::new(0.5, 2.5, 0.5)));

        for _ in 0..180 {
            space.update(1.0 / 60.0);
        }

        let body = space.body(cube).unwrap();
        assert!((body.position.y - 1.5).abs() < 0.05, "y = {}", body.position.y);
        assert!(space.are_touching(cube, ground));
    }

    #[test]
    fn contact_lifecycle_started_ongoing_ended() {
        let mut space = space();
        let ground = floor(&mut space);
        let ball = space.add_body(RigidBodyDesc::new(Shape::sphere(0.5)).at(Vec3::new(0.0, 1.0, 0.0)));

        let mut seen = Vec::new();
        for _ in 0..60 {
            seen.extend(space.update(1.0 / 60.0));
        }
        let started: Vec<_> = seen.iter().filter(|n| n.kind == ContactKind::Started).collect();
        assert_eq!(started.len(), 1);
        assert_eq!((started[0].body_a, started[0].body_b), (ground, ball));
        assert!(seen.iter().filter(|n| n.kind == ContactKind::Ongoing).count() > 10);
        assert!(!seen.iter().any(|n| n.kind == ContactKind::Ended));

        space.set_position(ball, Vec3::new(0.0, 20.0, 0.0));
        let after = space.update(1.0 / 60.0);
        assert!(after
            .iter()
            .any(|n| n.kind == ContactKind::Ended && n.body_b == ball));
    }

    #[test]
    fn removing_body_reports_end_on_next_update() {
        let mut space = space();
        let ground = floor(&mut space);
        let ball = space.add_body(RigidBodyDesc::new(Shape::sphere(0.5)).at(Vec3::new(0.0, 0.45, 0.0)));
        space.update(1.0 / 60.0);
        assert!(space.are_touching(ground, ball));

        assert!(space.remove_body(ball).is_some());
        let notices = space.update(0.0);
        assert_eq!(
            notices,
            vec![ContactNotice {
                kind: ContactKind::Ended,
                body_a: ground,
                body_b: ball,
            }]
        );
    }

    #[test]
    fn disabled_listeners_stay_silent() {
        let mut space = space().with_listeners(ContactListeners::STARTED);
        floor(&mut space);
        space.add_body(RigidBodyDesc::new(Shape::sphere(0.5)).at(Vec3::new(0.0, 0.45, 0.0)));

        let mut seen = Vec::new();
        for _ in 0..10 {
            seen.extend(space.update(1.0 / 60.0));
        }
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, ContactKind::Started);
    }

    #[test]
    fn static_pairs_are_never_tested() {
        let mut space = space();
        space.add_body(RigidBodyDesc::fixed(Shape::block()));
        space.add_body(RigidBodyDesc::fixed(Shape::block()).at(Vec3::new(0.2, 0.0, 0.0)));
        assert!(space.update(1.0 / 60.0).is_empty());
    }

    #[test]
    fn bouncy_sphere_rebounds() {
        let mut space = space();
        space.add_body(
            RigidBodyDesc::fixed(Shape::cuboid(Vec3::new(5.0, 0.5, 5.0)))
                .at(Vec3::new(0.0, -0.5, 0.0))
                .with_restitution(1.0),
        );
        let ball = space.add_body(
            RigidBodyDesc::new(Shape::sphere(0.5))
                .at(Vec3::new(0.0, 0.6, 0.0))
                .with_linear_velocity(Vec3::new(0.0, -8.0, 0.0)),
        );
        for _ in 0..3 {
            space.update(1.0 / 60.0);
        }
        assert!(space.body(ball).unwrap().linear_velocity.y > 4.0);
    }
}
