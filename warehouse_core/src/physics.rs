use serde::{Deserialize, Serialize};

use crate::Vec2;

/// Index of a body, in creation order since the last [`PhysicsAdapter::reset`].
pub type BodyHandle = usize;

/// Axis-aligned static box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    pub center: Vec2,
    pub half_extents: Vec2,
}

impl Boundary {
    pub const fn new(center: Vec2, half_extents: Vec2) -> Self {
        Boundary {
            center,
            half_extents,
        }
    }

    pub fn min(&self) -> Vec2 {
        self.center - self.half_extents
    }

    pub fn max(&self) -> Vec2 {
        self.center + self.half_extents
    }
}

/// Capability set the simulation consumes from a physics engine.
pub trait PhysicsAdapter {
    /// Removes every body and boundary.
    fn reset(&mut self);

    /// Adds a dynamic circular body and returns its handle.
    fn create_body(&mut self, position: Vec2, radius: f32) -> BodyHandle;

    fn create_static_boundary(&mut self, boundary: Boundary);

    /// Sets the linear velocity applied during the next [`integrate`](Self::integrate).
    fn set_velocity(&mut self, body: BodyHandle, velocity: Vec2);

    /// Advances the world by `dt` seconds and returns every body position in
    /// handle order.
    fn integrate(&mut self, dt: f32) -> Vec<Vec2>;
}

#[derive(Debug, Clone)]
struct Body {
    position: Vec2,
    velocity: Vec2,
    radius: f32,
}

/// Explicit Euler integration with positional overlap correction.
#[derive(Debug, Clone)]
pub struct EulerPhysics {
    bodies: Vec<Body>,
    boundaries: Vec<Boundary>,
    separation_iterations: usize,
}

impl Default for EulerPhysics {
    fn default() -> Self {
        EulerPhysics::new(4)
    }
}

impl EulerPhysics {
    /// `separation_iterations` relaxation passes resolve body overlaps; 0 lets
    /// bodies pass through each other.
    pub fn new(separation_iterations: usize) -> Self {
        EulerPhysics {
            bodies: Vec::new(),
            boundaries: Vec::new(),
            separation_iterations,
        }
    }

    fn separate_bodies(&mut self) {
        let n = self.bodies.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let delta = self.bodies[j].position - self.bodies[i].position;
                let min_distance = self.bodies[i].radius + self.bodies[j].radius;
                let distance = delta.length();
                if distance >= min_distance {
                    continue;
                }
                // Coincident centres: push apart along x.
                let normal = if distance > f32::EPSILON {
                    delta * (1.0 / distance)
                } else {
                    Vec2::new(1.0, 0.0)
                };
                let correction = normal * ((min_distance - distance) / 2.0);
                self.bodies[i].position -= correction;
                self.bodies[j].position += correction;
            }
        }
    }

    fn push_out_of_boundaries(&mut self) {
        for body in &mut self.bodies {
            for boundary in &self.boundaries {
                let (min, max) = (boundary.min(), boundary.max());
                let closest = Vec2::new(
                    body.position.x.clamp(min.x, max.x),
                    body.position.y.clamp(min.y, max.y),
                );
                let delta = body.position - closest;
                let distance = delta.length();

                if distance > f32::EPSILON {
                    if distance < body.radius {
                        body.position += delta * ((body.radius - distance) / distance);
                    }
                    continue;
                }

                // Centre inside the box: leave through the nearest face.
                let exits = [
                    (body.position.x - min.x, Vec2::new(min.x - body.radius, body.position.y)),
                    (max.x - body.position.x, Vec2::new(max.x + body.radius, body.position.y)),
                    (body.position.y - min.y, Vec2::new(body.position.x, min.y - body.radius)),
                    (max.y - body.position.y, Vec2::new(body.position.x, max.y + body.radius)),
                ];
                if let Some((_, exit)) = exits
                    .into_iter()
                    .min_by(|a, b| a.0.total_cmp(&b.0))
                {
                    body.position = exit;
                }
            }
        }
    }
}

impl PhysicsAdapter for EulerPhysics {
    fn reset(&mut self) {
        self.bodies.clear();
        self.boundaries.clear();
    }

    fn create_body(&mut self, position: Vec2, radius: f32) -> BodyHandle {
        self.bodies.push(Body {
            position,
            velocity: Vec2::ZERO,
            radius,
        });
        self.bodies.len() - 1
    }

    fn create_static_boundary(&mut self, boundary: Boundary) {
        self.boundaries.push(boundary);
    }

    fn set_velocity(&mut self, body: BodyHandle, velocity: Vec2) {
        if let Some(body) = self.bodies.get_mut(body) {
            body.velocity = velocity;
        }
    }

    fn integrate(&mut self, dt: f32) -> Vec<Vec2> {
        for body in &mut self.bodies {
            body.position += body.velocity * dt;
        }
        for _ in 0..self.separation_iterations {
            self.separate_bodies();
        }
        self.push_out_of_boundaries();
        self.bodies.iter().map(|b| b.position).collect()
    }
}
