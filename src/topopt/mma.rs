//! Method of Moving Asymptotes (Svanberg 1987) with a single volume constraint
//!
//! Each step builds a convex separable approximation of the compliance and of
//! the volume constraint around the current design, then solves the
//! subproblem through its one-dimensional dual.

use super::{DensityUpdate, DesignState};
use crate::error::{FEAResult, NumericalFailure};
use crate::math::Vec as FEVec;

const ASYMPTOTE_INIT: f64 = 0.5;
const ASYMPTOTE_INCREASE: f64 = 1.2;
const ASYMPTOTE_DECREASE: f64 = 0.7;
const ALBEFA: f64 = 0.1;
const RAA0: f64 = 1e-5;
const DUAL_TOLERANCE: f64 = 1e-10;
const MAX_DUAL_STEPS: usize = 200;

/// Design variable bounds
const X_MIN: f64 = 0.0;
const X_MAX: f64 = 1.0;

#[derive(Debug, Clone, Default)]
pub struct Mma {
    iteration: usize,
    previous: Option<FEVec>,
    before_previous: Option<FEVec>,
    low: FEVec,
    upp: FEVec,
}

/// Subproblem coefficients for one step
struct Approximation {
    alpha: FEVec,
    beta: FEVec,
    p0: FEVec,
    q0: FEVec,
    p1: FEVec,
    q1: FEVec,
    /// Constant part of the constraint approximation
    r1: f64,
}

impl Mma {
    pub fn new() -> Self {
        Self::default()
    }

    fn update_asymptotes(&mut self, x: &FEVec) {
        let range = X_MAX - X_MIN;
        match (&self.previous, &self.before_previous) {
            (Some(x1), Some(x2)) if self.iteration > 2 => {
                for i in 0..x.len() {
                    let trend = (x[i] - x1[i]) * (x1[i] - x2[i]);
                    let gamma = if trend < 0.0 {
                        ASYMPTOTE_DECREASE
                    } else if trend > 0.0 {
                        ASYMPTOTE_INCREASE
                    } else {
                        1.0
                    };
                    let low = x[i] - gamma * (x1[i] - self.low[i]);
                    let upp = x[i] + gamma * (self.upp[i] - x1[i]);
                    self.low[i] = low.clamp(x[i] - 10.0 * range, x[i] - 0.01 * range);
                    self.upp[i] = upp.clamp(x[i] + 0.01 * range, x[i] + 10.0 * range);
                }
            }
            _ => {
                self.low = x.map(|v| v - ASYMPTOTE_INIT * range);
                self.upp = x.map(|v| v + ASYMPTOTE_INIT * range);
            }
        }
    }

    fn approximate(&self, state: &DesignState<'_>) -> Approximation {
        let x = state.x;
        let n = x.len();

        // Scale the objective gradient so the regularization terms are relative
        let scale = state.dc.amax().max(f64::MIN_POSITIVE);
        let target = state.volume_fraction * state.total_volume;

        let mut approx = Approximation {
            alpha: FEVec::zeros(n),
            beta: FEVec::zeros(n),
            p0: FEVec::zeros(n),
            q0: FEVec::zeros(n),
            p1: FEVec::zeros(n),
            q1: FEVec::zeros(n),
            r1: x.dot(state.dv) / target - 1.0,
        };

        for i in 0..n {
            let (low, upp) = (self.low[i], self.upp[i]);
            approx.alpha[i] = (low + ALBEFA * (x[i] - low)).max(x[i] - state.move_limit).max(X_MIN);
            approx.beta[i] = (upp - ALBEFA * (upp - x[i])).min(x[i] + state.move_limit).min(X_MAX);

            let ux2 = (upp - x[i]).powi(2);
            let xl2 = (x[i] - low).powi(2);
            let regularization = RAA0 / (X_MAX - X_MIN);

            let df0 = state.dc[i] / scale;
            let (plus, minus) = (df0.max(0.0), (-df0).max(0.0));
            approx.p0[i] = ux2 * (1.001 * plus + 0.001 * minus + regularization);
            approx.q0[i] = xl2 * (0.001 * plus + 1.001 * minus + regularization);

            let dg = state.dv[i] / target;
            approx.p1[i] = ux2 * (1.001 * dg + regularization);
            approx.q1[i] = xl2 * (0.001 * dg + regularization);

            approx.r1 -= approx.p1[i] / (upp - x[i]) + approx.q1[i] / (x[i] - low);
        }
        approx
    }

    /// Minimizer of the Lagrangian for a fixed multiplier
    fn primal(&self, approx: &Approximation, lambda: f64) -> FEVec {
        FEVec::from_fn(approx.p0.len(), |i, _| {
            let p = (approx.p0[i] + lambda * approx.p1[i]).sqrt();
            let q = (approx.q0[i] + lambda * approx.q1[i]).sqrt();
            let x = (p * self.low[i] + q * self.upp[i]) / (p + q);
            x.clamp(approx.alpha[i], approx.beta[i])
        })
    }

    /// Approximated constraint value at `x`
    fn constraint(&self, approx: &Approximation, x: &FEVec) -> f64 {
        let mut g = approx.r1;
        for i in 0..x.len() {
            g += approx.p1[i] / (self.upp[i] - x[i]) + approx.q1[i] / (x[i] - self.low[i]);
        }
        g
    }

    fn solve_dual(&self, approx: &Approximation) -> FEAResult<FEVec> {
        let x = self.primal(approx, 0.0);
        if self.constraint(approx, &x) <= 0.0 {
            return Ok(x);
        }

        let mut hi = 1.0;
        let mut steps = 0;
        while self.constraint(approx, &self.primal(approx, hi)) > 0.0 {
            hi *= 2.0;
            steps += 1;
            if steps > MAX_DUAL_STEPS {
                return Err(NumericalFailure::BisectionNotConverged(steps).into());
            }
        }

        let mut lo = 0.0;
        for _ in 0..MAX_DUAL_STEPS {
            let mid = 0.5 * (lo + hi);
            if self.constraint(approx, &self.primal(approx, mid)) > 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
            if hi - lo <= DUAL_TOLERANCE * (1.0 + hi) {
                // The upper end is always feasible
                return Ok(self.primal(approx, hi));
            }
        }
        Err(NumericalFailure::BisectionNotConverged(MAX_DUAL_STEPS).into())
    }
}

impl DensityUpdate for Mma {
    fn name(&self) -> &'static str {
        "MMA"
    }

    fn step(&mut self, state: &DesignState<'_>) -> FEAResult<FEVec> {
        self.iteration += 1;
        self.update_asymptotes(state.x);
        let approx = self.approximate(state);
        let x_new = self.solve_dual(&approx)?;

        self.before_previous = self.previous.take();
        self.previous = Some(state.x.clone());
        Ok(x_new)
    }
}
