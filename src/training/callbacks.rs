//! End-of-epoch policies driven by the validation loss.

use std::{fs::File, path::Path};

use super::metrics::EpochMetrics;
use crate::config::CallbackConfig;

/// Tracks the best validation loss to decide when to write a checkpoint.
///
/// Starts from `+inf`, so a non-finite loss is never an improvement.
#[derive(Debug, Clone)]
pub struct BestCheckpoint {
    best: f64,
}

impl Default for BestCheckpoint {
    fn default() -> Self {
        Self {
            best: f64::INFINITY,
        }
    }
}

impl BestCheckpoint {
    /// True when `val_loss` is strictly lower than every earlier value.
    pub fn improved(&mut self, val_loss: f64) -> bool {
        let improved = val_loss < self.best;
        if improved {
            self.best = val_loss;
        }
        improved
    }

    /// `None` until some epoch improved.
    pub fn best(&self) -> Option<f64> {
        self.best.is_finite().then_some(self.best)
    }
}

/// Multiplies the learning rate by `factor` after `patience` epochs without
/// an improvement larger than `min_delta`, never going below `min_lr`.
#[derive(Debug, Clone)]
pub struct ReduceLrOnPlateau {
    factor: f64,
    patience: usize,
    min_lr: f64,
    min_delta: f64,
    best: f64,
    wait: usize,
}

impl ReduceLrOnPlateau {
    pub fn new(config: &CallbackConfig) -> Self {
        Self {
            factor: config.lr_factor,
            patience: config.lr_patience,
            min_lr: config.min_lr,
            min_delta: config.lr_min_delta,
            best: f64::INFINITY,
            wait: 0,
        }
    }

    /// Returns the learning rate for the next epoch.
    pub fn step(&mut self, val_loss: f64, learning_rate: f64) -> f64 {
        if val_loss < self.best - self.min_delta {
            self.best = val_loss;
            self.wait = 0;
            return learning_rate;
        }

        self.wait += 1;
        if self.wait >= self.patience && learning_rate > self.min_lr {
            self.wait = 0;
            return f64::max(learning_rate * self.factor, self.min_lr);
        }

        learning_rate
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarlyStoppingAction {
    /// `val_loss` reached a new minimum; the current weights are the best.
    Improved,
    Continue,
    Stop,
}

/// Stops training once `val_loss` has not improved by more than `min_delta`
/// for `patience` epochs.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    min_delta: f64,
    best: f64,
    best_epoch: Option<usize>,
    wait: usize,
}

impl EarlyStopping {
    pub fn new(config: &CallbackConfig) -> Self {
        Self {
            patience: config.early_stopping_patience,
            min_delta: config.early_stopping_min_delta,
            best: f64::INFINITY,
            best_epoch: None,
            wait: 0,
        }
    }

    pub fn step(&mut self, epoch: usize, val_loss: f64) -> EarlyStoppingAction {
        self.wait += 1;

        if val_loss < self.best - self.min_delta {
            self.best = val_loss;
            self.best_epoch = Some(epoch);
            self.wait = 0;
            return EarlyStoppingAction::Improved;
        }

        if self.wait >= self.patience && epoch > 0 {
            return EarlyStoppingAction::Stop;
        }

        EarlyStoppingAction::Continue
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }
}

/// One row of the training log.
#[derive(Debug, Clone)]
pub struct EpochLog {
    pub epoch: usize,
    pub learning_rate: f64,
    pub train: EpochMetrics,
    pub valid: EpochMetrics,
}

impl EpochLog {
    /// `learning_rate`, train values and `val_`-prefixed valid values,
    /// sorted by key.
    pub fn entries(&self) -> Vec<(String, f64)> {
        let mut entries = vec![("learning_rate".to_string(), self.learning_rate)];
        entries.extend(self.train.entries());
        entries.extend(
            self.valid
                .entries()
                .into_iter()
                .map(|(key, value)| (format!("val_{key}"), value)),
        );
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

/// Appends one CSV row per epoch, flushing after each so a crash keeps
/// every finished epoch.
pub struct CsvLogger {
    writer: csv::Writer<File>,
    header_written: bool,
}

impl CsvLogger {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, csv::Error> {
        Ok(Self {
            writer: csv::Writer::from_path(path)?,
            header_written: false,
        })
    }

    pub fn log(&mut self, log: &EpochLog) -> Result<(), csv::Error> {
        let entries = log.entries();

        if !self.header_written {
            let mut header = vec!["epoch".to_string()];
            header.extend(entries.iter().map(|(key, _)| key.clone()));
            self.writer.write_record(&header)?;
            self.header_written = true;
        }

        let mut row = vec![log.epoch.to_string()];
        row.extend(entries.iter().map(|(_, value)| value.to_string()));
        self.writer.write_record(&row)?;
        self.writer.flush()?;

        Ok(())
    }
}
