//! Per-image classification scores over the labels {0, 1}.
//!
//! F1, Jaccard, recall and precision are macro averages of the per-class
//! values. A class absent from both truth and prediction scores 1.0; any
//! other empty denominator scores 0.0.

use std::path::Path;

use thiserror::Error;

const LABELS: [u8; 2] = [0, 1];
const ABSENT_CLASS_SCORE: f64 = 1.0;

pub const HEADER: [&str; 6] = ["Image", "Acc", "F1", "Jaccard", "Recall", "Precision"];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScoreError {
    #[error("Ground truth has {truth} labels but prediction has {prediction}")]
    LengthMismatch { truth: usize, prediction: usize },

    #[error("Cannot score an empty mask")]
    Empty,

    #[error("Label {0} is outside {{0, 1}}")]
    InvalidLabel(u8),
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ClassificationScores {
    pub accuracy: f64,
    pub f1: f64,
    pub jaccard: f64,
    pub recall: f64,
    pub precision: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct ClassCounts {
    true_positives: usize,
    false_positives: usize,
    false_negatives: usize,
}

impl ClassCounts {
    fn is_absent(&self) -> bool {
        self.true_positives + self.false_positives + self.false_negatives == 0
    }

    fn ratio(&self, numerator: usize, denominator: usize) -> f64 {
        if denominator > 0 {
            numerator as f64 / denominator as f64
        } else if self.is_absent() {
            ABSENT_CLASS_SCORE
        } else {
            0.0
        }
    }

    fn f1(&self) -> f64 {
        self.ratio(
            2 * self.true_positives,
            2 * self.true_positives + self.false_positives + self.false_negatives,
        )
    }

    fn jaccard(&self) -> f64 {
        self.ratio(
            self.true_positives,
            self.true_positives + self.false_positives + self.false_negatives,
        )
    }

    fn recall(&self) -> f64 {
        self.ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    fn precision(&self) -> f64 {
        self.ratio(self.true_positives, self.true_positives + self.false_positives)
    }
}

impl ClassificationScores {
    pub fn compute(truth: &[u8], prediction: &[u8]) -> Result<Self, ScoreError> {
        if truth.len() != prediction.len() {
            return Err(ScoreError::LengthMismatch {
                truth: truth.len(),
                prediction: prediction.len(),
            });
        }
        if truth.is_empty() {
            return Err(ScoreError::Empty);
        }

        let mut counts = [ClassCounts::default(); LABELS.len()];
        let mut correct = 0;

        for (&t, &p) in truth.iter().zip(prediction) {
            for label in [t, p] {
                if !LABELS.contains(&label) {
                    return Err(ScoreError::InvalidLabel(label));
                }
            }

            if t == p {
                correct += 1;
                counts[t as usize].true_positives += 1;
            } else {
                counts[p as usize].false_positives += 1;
                counts[t as usize].false_negatives += 1;
            }
        }

        let macro_average = |score: fn(&ClassCounts) -> f64| {
            counts.iter().map(score).sum::<f64>() / counts.len() as f64
        };

        Ok(Self {
            accuracy: correct as f64 / truth.len() as f64,
            f1: macro_average(ClassCounts::f1),
            jaccard: macro_average(ClassCounts::jaccard),
            recall: macro_average(ClassCounts::recall),
            precision: macro_average(ClassCounts::precision),
        })
    }

    pub fn values(&self) -> [f64; 5] {
        [
            self.accuracy,
            self.f1,
            self.jaccard,
            self.recall,
            self.precision,
        ]
    }

    /// Column-wise mean, `None` for an empty slice.
    pub fn mean<'a, I>(scores: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a ClassificationScores>,
    {
        let mut sum = [0.0; 5];
        let mut count = 0usize;

        for scores in scores {
            for (total, value) in sum.iter_mut().zip(scores.values()) {
                *total += value;
            }
            count += 1;
        }

        if count == 0 {
            return None;
        }

        let [accuracy, f1, jaccard, recall, precision] = sum.map(|total| total / count as f64);
        Some(Self {
            accuracy,
            f1,
            jaccard,
            recall,
            precision,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub name: String,
    pub scores: ClassificationScores,
}

/// Writes the score table with a leading unnamed index column.
pub fn write_scores<P: AsRef<Path>>(path: P, records: &[ScoreRecord]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec![""];
    header.extend(HEADER);
    writer.write_record(&header)?;

    for (index, record) in records.iter().enumerate() {
        let mut row = vec![index.to_string(), record.name.clone()];
        row.extend(record.scores.values().iter().map(f64::to_string));
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}
