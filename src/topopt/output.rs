//! Per-iteration log of an optimization run

use std::fmt;
use std::io::{self, Write};

use serde::{Deserialize, Serialize};

/// Rows between repeated header lines
pub const HEADER_INTERVAL: usize = 20;

/// One line of the iteration log
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based iteration number
    pub iteration: usize,
    /// Compliance (total strain energy) at the start of the iteration
    pub objective: f64,
    /// Σ x·v / Σ v after the density update
    pub volume_fraction: f64,
    /// max |x_new - x|
    pub change: f64,
    /// Wall time since the start of the run, in seconds
    pub elapsed: f64,
}

/// Writes iteration records as a fixed-width table
pub struct IterationWriter<W: Write> {
    sink: W,
    rows: usize,
}

impl<W: Write> IterationWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink, rows: 0 }
    }

    /// Write one row, preceded by the header every [`HEADER_INTERVAL`] rows
    pub fn write_record(&mut self, record: &IterationRecord) -> io::Result<()> {
        if self.rows % HEADER_INTERVAL == 0 {
            writeln!(
                self.sink,
                "{:>6} {:>16} {:>10} {:>10} {:>10}",
                "loop", "Objective", "Volume", "Change", "Time"
            )?;
        }
        writeln!(
            self.sink,
            "{:>6} {:>16.6e} {:>10.4} {:>10.4} {:>10.3}",
            record.iteration, record.objective, record.volume_fraction, record.change, record.elapsed
        )?;
        self.rows += 1;
        self.sink.flush()
    }

    /// Start a new table; the next row is preceded by a header
    pub fn reset(&mut self) {
        self.rows = 0;
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

impl<W: Write> fmt::Debug for IterationWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IterationWriter").field("rows", &self.rows).finish_non_exhaustive()
    }
}
