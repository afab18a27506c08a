// ============================================================
// Layer 6 - Metrics Logger
// ============================================================
// Records training metrics to a CSV file every `logging_steps`
// optimiser steps.
//
// Metrics recorded per logging step:
//   - step:          optimiser steps taken so far
//   - epoch:         fractional epoch (step / steps_per_epoch)
//   - loss:          mean training loss since the previous row
//   - learning_rate: rate used for the most recent step
//
// Output file: <logging_dir>/metrics.csv
//
// Example CSV output:
//   step,epoch,loss,learning_rate
//   100,0.139276,2.314500,0.000043
//   200,0.278552,1.982100,0.000036
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

/// One logged row of training progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepMetrics {
    pub step:          usize,
    pub epoch:         f64,
    /// Mean loss over the steps since the previous row.
    pub loss:          f64,
    pub learning_rate: f64,
}

impl StepMetrics {
    pub fn new(step: usize, epoch: f64, loss: f64, learning_rate: f64) -> Self {
        Self { step, epoch, loss, learning_rate }
    }
}

/// Appends step metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create the logging directory and write the CSV header if the file is new.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create logging dir '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");

        // Existing files are appended to across runs
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "step,epoch,loss,learning_rate")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &StepMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(f, "{},{:.6},{:.6},{:e}", m.step, m.epoch, m.loss, m.learning_rate)?;

        tracing::debug!("Logged step {} metrics: loss={:.4}", m.step, m.loss);
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_then_rows() {
        let dir = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path().join("logs")).unwrap();
        logger.log(&StepMetrics::new(100, 0.5, 2.25, 5e-5)).unwrap();
        logger.log(&StepMetrics::new(200, 1.0, 1.5, 2.5e-5)).unwrap();

        let csv = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "step,epoch,loss,learning_rate");
        assert_eq!(lines[1], "100,0.500000,2.250000,5e-5");
        assert_eq!(lines[2], "200,1.000000,1.500000,2.5e-5");
    }

    #[test]
    fn test_reopening_keeps_previous_rows() {
        let dir = tempfile::tempdir().unwrap();
        MetricsLogger::new(dir.path()).unwrap()
            .log(&StepMetrics::new(1, 0.1, 3.0, 1e-4)).unwrap();
        let again = MetricsLogger::new(dir.path()).unwrap();

        let csv = fs::read_to_string(again.csv_path()).unwrap();
        assert_eq!(csv.lines().count(), 2);
    }
}
