use burn::prelude::*;

use super::SegmentationOutput;
use crate::model::Objective;

/// Probability above which a predicted pixel counts as foreground for recall
/// and precision.
pub const THRESHOLD: f32 = 0.5;

/// Pixel-level confusion counts accumulated over an epoch.
///
/// Predictions are thresholded at [`THRESHOLD`]; any nonzero target counts
/// as foreground, so soft mask edges stay positive.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ConfusionCounts {
    pub true_positives: f64,
    pub false_positives: f64,
    pub false_negatives: f64,
}

impl ConfusionCounts {
    pub fn update<B: Backend>(&mut self, outputs: Tensor<B, 4>, targets: Tensor<B, 4>) {
        let predicted = outputs.greater_elem(THRESHOLD).float();
        let actual = targets.greater_elem(0.0).float();

        let true_positives = (predicted.clone() * actual.clone())
            .sum()
            .into_scalar()
            .elem::<f64>();
        let predicted_positives = predicted.sum().into_scalar().elem::<f64>();
        let actual_positives = actual.sum().into_scalar().elem::<f64>();

        self.true_positives += true_positives;
        self.false_positives += predicted_positives - true_positives;
        self.false_negatives += actual_positives - true_positives;
    }

    /// `tp / (tp + fn)`, zero when there is no positive pixel.
    pub fn recall(&self) -> f64 {
        ratio(
            self.true_positives,
            self.true_positives + self.false_negatives,
        )
    }

    /// `tp / (tp + fp)`, zero when nothing was predicted positive.
    pub fn precision(&self) -> f64 {
        ratio(
            self.true_positives,
            self.true_positives + self.false_positives,
        )
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Epoch means of the loss and the compiled metrics, plus recall and
/// precision over the whole epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochMetrics {
    pub loss: f64,
    pub metrics: Vec<(String, f64)>,
    pub recall: f64,
    pub precision: f64,
}

impl EpochMetrics {
    /// Values keyed the way they appear in the training log.
    pub fn entries(&self) -> Vec<(String, f64)> {
        let mut entries = vec![
            ("loss".to_string(), self.loss),
            ("recall".to_string(), self.recall),
            ("precision".to_string(), self.precision),
        ];
        entries.extend(self.metrics.iter().cloned());
        entries
    }
}

/// Running sums of per-batch values weighted by batch size.
#[derive(Debug, Clone)]
pub struct MetricAccumulator {
    samples: usize,
    loss_sum: f64,
    metric_sums: Vec<(String, f64)>,
    counts: ConfusionCounts,
}

impl MetricAccumulator {
    pub fn new<B: Backend>(objective: &Objective<B>) -> Self {
        Self {
            samples: 0,
            loss_sum: 0.0,
            metric_sums: objective
                .metrics
                .iter()
                .map(|(name, _)| (name.clone(), 0.0))
                .collect(),
            counts: ConfusionCounts::default(),
        }
    }

    pub fn update<B: Backend>(&mut self, item: &SegmentationOutput<B>, objective: &Objective<B>) {
        let batch_size = item.output.dims()[0];
        let weight = batch_size as f64;
        let output = item.output.clone().detach();

        self.loss_sum += item.loss.clone().into_scalar().elem::<f64>() * weight;

        for ((_, sum), (_, metric)) in self.metric_sums.iter_mut().zip(&objective.metrics) {
            let value = metric(output.clone(), item.targets.clone())
                .into_scalar()
                .elem::<f64>();
            *sum += value * weight;
        }

        self.counts.update(output, item.targets.clone());
        self.samples += batch_size;
    }

    /// Samples seen so far.
    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn finish(&self) -> EpochMetrics {
        let samples = self.samples.max(1) as f64;

        EpochMetrics {
            loss: self.loss_sum / samples,
            metrics: self
                .metric_sums
                .iter()
                .map(|(name, sum)| (name.clone(), sum / samples))
                .collect(),
            recall: self.counts.recall(),
            precision: self.counts.precision(),
        }
    }
}
