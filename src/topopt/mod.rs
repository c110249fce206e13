//! Density-based topology optimization (SIMP) driving an [`FEModel`]
//!
//! Every iteration runs a full linear analysis, filters the compliance
//! sensitivities and hands them to a [`DensityUpdate`] strategy.

mod filter;
mod mma;
mod oc;
mod output;

pub use filter::DensityFilter;
pub use mma::Mma;
pub use oc::{OptimalityCriteria, BISECTION_TOLERANCE, LAMBDA_MAX, MAX_BISECTIONS};
pub use output::{IterationRecord, IterationWriter, HEADER_INTERVAL};

use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisOptions, SolverKind};
use crate::elements::{Element, Interpolation};
use crate::error::{FEAError, FEAResult, NumericalFailure};
use crate::math::Vec as FEVec;
use crate::model::FEModel;

/// Settings for a topology optimization run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopOptSettings {
    /// Target volume fraction `f`
    pub volume_fraction: f64,
    /// Filter radius, in model length units
    pub r_min: f64,
    /// SIMP penalization exponent
    pub penal: f64,
    /// Largest density change per iteration
    pub x_move: f64,
    /// Stop once `max |x_new - x|` drops to this
    pub tolerance: f64,
    pub max_iterations: usize,
    pub interpolation: Interpolation,
    pub solver: SolverKind,
}

impl Default for TopOptSettings {
    fn default() -> Self {
        Self {
            volume_fraction: 0.5,
            r_min: 1.5,
            penal: 3.0,
            x_move: 0.2,
            tolerance: 0.01,
            max_iterations: 1000,
            interpolation: Interpolation::ModifiedSimp,
            solver: SolverKind::Direct,
        }
    }
}

impl TopOptSettings {
    pub fn with_volume_fraction(mut self, f: f64) -> Self {
        self.volume_fraction = f;
        self
    }

    pub fn with_filter_radius(mut self, r_min: f64) -> Self {
        self.r_min = r_min;
        self
    }

    pub fn with_penalization(mut self, penal: f64) -> Self {
        self.penal = penal;
        self
    }

    pub fn with_move_limit(mut self, x_move: f64) -> Self {
        self.x_move = x_move;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_solver(mut self, solver: SolverKind) -> Self {
        self.solver = solver;
        self
    }

    /// Load settings from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> FEAResult<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> FEAResult<()> {
        let invalid = |what: &str, value: f64| {
            Err(FEAError::InvalidInput(format!("{what} is out of range: {value}")))
        };
        if !(self.volume_fraction > 0.0 && self.volume_fraction <= 1.0) {
            return invalid("volume fraction", self.volume_fraction);
        }
        if !self.r_min.is_finite() || self.r_min < 0.0 {
            return invalid("filter radius", self.r_min);
        }
        if !self.penal.is_finite() || self.penal <= 0.0 {
            return invalid("penalization", self.penal);
        }
        if !(self.x_move > 0.0 && self.x_move <= 1.0) {
            return invalid("move limit", self.x_move);
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return invalid("tolerance", self.tolerance);
        }
        if self.max_iterations == 0 {
            return Err(FEAError::InvalidInput("max_iterations must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Density update strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Algorithm {
    #[default]
    OptimalityCriteria,
    Mma,
}

impl Algorithm {
    fn strategy(&self) -> Box<dyn DensityUpdate> {
        match self {
            Algorithm::OptimalityCriteria => Box::new(OptimalityCriteria::new()),
            Algorithm::Mma => Box::new(Mma::new()),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::OptimalityCriteria => write!(f, "OC"),
            Algorithm::Mma => write!(f, "MMA"),
        }
    }
}

impl FromStr for Algorithm {
    type Err = FEAError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "oc" | "simp" | "optimality-criteria" => Ok(Algorithm::OptimalityCriteria),
            "mma" => Ok(Algorithm::Mma),
            _ => Err(FEAError::InvalidInput(format!("unknown optimization algorithm '{s}'"))),
        }
    }
}

/// Everything a strategy sees for one update
#[derive(Debug, Clone, Copy)]
pub struct DesignState<'a> {
    pub iteration: usize,
    pub x: &'a FEVec,
    /// Filtered compliance sensitivities
    pub dc: &'a FEVec,
    /// Element volumes
    pub dv: &'a FEVec,
    pub volume_fraction: f64,
    pub total_volume: f64,
    pub move_limit: f64,
}

/// One density update scheme
pub trait DensityUpdate: fmt::Debug {
    fn name(&self) -> &'static str;

    /// New densities within `[max(0, x - move), min(1, x + move)]`
    fn step(&mut self, state: &DesignState<'_>) -> FEAResult<FEVec>;
}

/// Outcome of a converged run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub algorithm: Algorithm,
    pub iterations: usize,
    pub objective: f64,
    pub volume_fraction: f64,
    pub change: f64,
    pub densities: Vec<f64>,
}

/// Drives repeated analyses of a model while redistributing density
#[derive(Debug)]
pub struct TopologyOptimizer {
    algorithm: Algorithm,
    settings: TopOptSettings,
    strategy: Box<dyn DensityUpdate>,
    output: Option<IterationWriter<Box<dyn Write>>>,
    history: Vec<IterationRecord>,
}

impl TopologyOptimizer {
    pub fn new(algorithm: Algorithm, settings: TopOptSettings) -> FEAResult<Self> {
        settings.validate()?;
        Ok(Self {
            algorithm,
            settings,
            strategy: algorithm.strategy(),
            output: None,
            history: Vec::new(),
        })
    }

    /// Write the iteration table to `sink`
    pub fn with_output<W: Write + 'static>(mut self, sink: W) -> Self {
        let sink: Box<dyn Write> = Box::new(sink);
        self.output = Some(IterationWriter::new(sink));
        self
    }

    pub fn settings(&self) -> &TopOptSettings {
        &self.settings
    }

    /// Records of the last run, including a failed one
    pub fn history(&self) -> &[IterationRecord] {
        &self.history
    }

    /// Optimize the element densities of `model` in place
    pub fn run(&mut self, model: &mut FEModel) -> FEAResult<OptimizationReport> {
        let settings = self.settings.clone();
        let n = model.elements().len();
        if n == 0 {
            return Err(FEAError::InvalidInput("model has no elements to optimize".to_string()));
        }

        let centers: Vec<[f64; 3]> = model.elements().iter().map(Element::center).collect();
        let filter = DensityFilter::new(&centers, settings.r_min);
        let dv = FEVec::from_iterator(n, model.elements().iter().map(Element::volume));
        let total_volume = dv.sum();
        let options = AnalysisOptions::default().with_solver(settings.solver);

        let mut x = FEVec::from_element(n, settings.volume_fraction);
        model.update_densities(x.as_slice(), settings.penal, settings.interpolation)?;

        self.strategy = self.algorithm.strategy();
        self.history.clear();
        if let Some(output) = self.output.as_mut() {
            output.reset();
        }
        let start = Instant::now();
        log::info!(
            "Topology optimization ({}): {} elements, f = {}, r_min = {}, penal = {}",
            self.strategy.name(),
            n,
            settings.volume_fraction,
            settings.r_min,
            settings.penal
        );

        for iteration in 1..=settings.max_iterations {
            let results = model.analyze_with(&options)?;
            let objective = results.total_strain_energy;
            let dc = FEVec::from_iterator(
                n,
                model.elements().iter().map(|e| e.energy_sensitivity(settings.penal)),
            );
            let dc = filter.apply(&dc, &x);

            let state = DesignState {
                iteration,
                x: &x,
                dc: &dc,
                dv: &dv,
                volume_fraction: settings.volume_fraction,
                total_volume,
                move_limit: settings.x_move,
            };
            let x_new = self.strategy.step(&state)?;

            model.update_densities(x_new.as_slice(), settings.penal, settings.interpolation)?;
            let change = (&x_new - &x).amax();
            x = x_new;

            let record = IterationRecord {
                iteration,
                objective,
                volume_fraction: x.dot(&dv) / total_volume,
                change,
                elapsed: start.elapsed().as_secs_f64(),
            };
            self.history.push(record);
            if let Some(output) = self.output.as_mut() {
                output.write_record(&record)?;
            }
            log::info!(
                "loop {:4}  c = {:.6e}  vol = {:.4}  change = {:.4}",
                iteration,
                objective,
                record.volume_fraction,
                change
            );

            if change <= settings.tolerance {
                return Ok(OptimizationReport {
                    algorithm: self.algorithm,
                    iterations: iteration,
                    objective,
                    volume_fraction: record.volume_fraction,
                    change,
                    densities: x.iter().copied().collect(),
                });
            }
        }

        let change = self.history.last().map_or(f64::INFINITY, |r| r.change);
        Err(NumericalFailure::OptimizationNotConverged {
            iterations: settings.max_iterations,
            change,
        }
        .into())
    }
}
