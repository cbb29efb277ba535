//! Velocity ramps.
//!
//! Position convention: home is the larger coordinate, so forward travel
//! (extending) has negative velocity and reverse travel (sheathing) positive.

/// Direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Extending, toward smaller positions.
    Forward,
    /// Sheathing, toward home.
    Reverse,
}

impl Direction {
    /// Sign of velocity when travelling in this direction.
    pub fn sign(self) -> f32 {
        match self {
            Self::Forward => -1.0,
            Self::Reverse => 1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Forward => Self::Reverse,
            Self::Reverse => Self::Forward,
        }
    }

    /// True once `position` has reached or passed `end` in this direction.
    pub fn reached(self, position: f32, end: f32) -> bool {
        match self {
            Self::Forward => position <= end,
            Self::Reverse => position >= end,
        }
    }
}

/// Linear velocity ramp integrated into positions.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRamp {
    /// `steps + 1` velocities, starting at 0.
    pub velocities: Vec<f32>,
    /// `steps + 1` positions, starting at the start position.
    pub positions: Vec<f32>,
}

/// Ramp from rest: `v[i] = v[i-1] + per_step_delta`, `p[i] = p[i-1] + v[i]`.
pub fn linear_ramp(start_position: f32, per_step_delta: f32, steps: usize) -> LinearRamp {
    let mut velocities = Vec::with_capacity(steps + 1);
    let mut positions = Vec::with_capacity(steps + 1);
    let mut v = 0.0f32;
    let mut p = start_position;
    velocities.push(v);
    positions.push(p);
    for _ in 0..steps {
        v += per_step_delta;
        p += v;
        velocities.push(v);
        positions.push(p);
    }
    LinearRamp {
        velocities,
        positions,
    }
}

/// Hyperbolic-tangent ramp with `num_points + 1` samples:
/// `v[i] = start + tanh(2 i / N) * (end - start)`.
///
/// `tanh(2)` is about 0.964, so the last sample stops short of `end`.
/// `num_points == 0` yields just `[start]`.
pub fn s_curve(start_velocity: f32, end_velocity: f32, num_points: usize) -> Vec<f32> {
    if num_points == 0 {
        return vec![start_velocity];
    }
    let span = end_velocity - start_velocity;
    (0..=num_points)
        .map(|i| {
            let t = i as f32 / num_points as f32;
            start_velocity + (2.0 * t).tanh() * span
        })
        .collect()
}
