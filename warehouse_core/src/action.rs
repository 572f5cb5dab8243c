use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::Vec2;

/// A velocity command, each component in `[-1, 1]`.
///
/// Constructors and deserialization clamp out-of-range input instead of
/// rejecting it, so a bad action never aborts the tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawAction")]
pub struct Action {
    vx: f32,
    vy: f32,
}

/// Wire form of [`Action`]; decoded values go through [`Action::from_raw`].
#[derive(Deserialize)]
struct RawAction {
    #[serde(default)]
    vx: f32,
    #[serde(default)]
    vy: f32,
}

impl Action {
    pub const STOP: Action = Action { vx: 0.0, vy: 0.0 };

    /// Clamps into range; NaN becomes 0.
    pub fn new(vx: f32, vy: f32) -> Self {
        Action {
            vx: sanitize(vx),
            vy: sanitize(vy),
        }
    }

    /// Builds an action from a raw slice of any length. Missing components are 0
    /// and extra components are ignored.
    pub fn from_slice(raw: &[f32]) -> Self {
        if raw.len() != 2 {
            warn!(len = raw.len(), "action has wrong shape, expected 2 components");
        }
        let component = |i: usize| raw.get(i).copied().unwrap_or(0.0);
        Action::from_raw(component(0), component(1))
    }

    /// Like [`Action::new`], but logs when the input had to be clamped.
    fn from_raw(vx: f32, vy: f32) -> Self {
        if Action::needs_clamping(vx, vy) {
            warn!(vx, vy, "action out of bounds, clamping");
        }
        Action::new(vx, vy)
    }

    /// True when `new` would change the given components.
    pub fn needs_clamping(vx: f32, vy: f32) -> bool {
        Action::new(vx, vy) != (Action { vx, vy })
    }

    pub fn vx(&self) -> f32 {
        self.vx
    }

    pub fn vy(&self) -> f32 {
        self.vy
    }

    /// Velocity in m/s for a body whose top speed per axis is `max_speed`.
    pub fn velocity(&self, max_speed: f32) -> Vec2 {
        Vec2::new(self.vx, self.vy) * max_speed
    }
}

impl From<[f32; 2]> for Action {
    fn from([vx, vy]: [f32; 2]) -> Self {
        Action::new(vx, vy)
    }
}

impl From<RawAction> for Action {
    fn from(raw: RawAction) -> Self {
        Action::from_raw(raw.vx, raw.vy)
    }
}

fn sanitize(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(-1.0, 1.0) }
}
