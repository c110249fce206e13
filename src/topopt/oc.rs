//! Optimality-criteria density update

use super::{DensityUpdate, DesignState};
use crate::error::{FEAResult, NumericalFailure};
use crate::math::Vec as FEVec;

/// Upper end of the initial Lagrange multiplier bracket
pub const LAMBDA_MAX: f64 = 1e9;
/// Relative bracket width at which the bisection stops
pub const BISECTION_TOLERANCE: f64 = 1e-3;
/// Bisection steps before giving up
pub const MAX_BISECTIONS: usize = 200;
/// Absolute bracket width treated as collapsed onto λ = 0
const LAMBDA_FLOOR: f64 = 1e-30;

/// Heuristic OC update with bisection on the volume multiplier
#[derive(Debug, Clone, Default)]
pub struct OptimalityCriteria;

impl OptimalityCriteria {
    pub fn new() -> Self {
        Self
    }

    /// `x·sqrt(−dc/(λ·dv))` clamped to the move window and [0, 1]
    fn candidate(state: &DesignState<'_>, lambda: f64) -> FEVec {
        FEVec::from_fn(state.x.len(), |i, _| {
            let x = state.x[i];
            let lower = (x - state.move_limit).max(0.0);
            let upper = (x + state.move_limit).min(1.0);
            let scale = (-state.dc[i]).max(0.0) / (lambda * state.dv[i]);
            (x * scale.sqrt()).clamp(lower, upper)
        })
    }
}

impl DensityUpdate for OptimalityCriteria {
    fn name(&self) -> &'static str {
        "OC"
    }

    fn step(&mut self, state: &DesignState<'_>) -> FEAResult<FEVec> {
        let target = state.volume_fraction * state.total_volume;
        let (mut lo, mut hi) = (0.0, LAMBDA_MAX);

        for _ in 0..MAX_BISECTIONS {
            let mid = 0.5 * (lo + hi);
            let x_new = Self::candidate(state, mid);
            if x_new.dot(state.dv) > target {
                lo = mid;
            } else {
                hi = mid;
            }
            if hi - lo <= BISECTION_TOLERANCE * (hi + lo) || hi - lo < LAMBDA_FLOOR {
                return Ok(x_new);
            }
        }
        Err(NumericalFailure::BisectionNotConverged(MAX_BISECTIONS).into())
    }
}
