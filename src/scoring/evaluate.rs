//! Held-out evaluation of a trained bundle against labeled normal and malicious
//! sessions: confusion matrix, per-class precision/recall/F1 and error distributions.

use super::engine::AnomalyScorer;
use crate::error::{Result, SentinelError};
use crate::training::percentile;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Rows are the true label, columns the prediction; malicious is the positive class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_positives: usize,
}

impl ConfusionMatrix {
    pub fn total(&self) -> usize {
        self.true_negatives + self.false_positives + self.false_negatives + self.true_positives
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_negatives + self.true_positives, self.total())
    }
}

/// Precision, recall and F1 for one class; 0 where the denominator is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassReport {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

impl ClassReport {
    fn new(hits: usize, predicted: usize, support: usize) -> Self {
        let precision = ratio(hits, predicted);
        let recall = ratio(hits, support);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            f1,
            support,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub max: f64,
}

impl ErrorSummary {
    fn from_errors(errors: &[f64]) -> Self {
        let mut sorted = errors.to_vec();
        sorted.sort_by(f64::total_cmp);
        let count = sorted.len();
        Self {
            count,
            mean: sorted.iter().sum::<f64>() / count.max(1) as f64,
            min: sorted.first().copied().unwrap_or(0.0),
            p50: percentile(&sorted, 50.0),
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
            max: sorted.last().copied().unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub threshold: f64,
    pub confusion: ConfusionMatrix,
    pub accuracy: f64,
    pub normal: ClassReport,
    pub malicious: ClassReport,
    pub normal_errors: ErrorSummary,
    pub malicious_errors: ErrorSummary,
}

impl EvaluationReport {
    /// Same decision rule as scoring: malicious iff error > threshold.
    pub fn from_errors(threshold: f64, normal: &[f64], malicious: &[f64]) -> Self {
        let false_positives = normal.iter().filter(|e| **e > threshold).count();
        let true_positives = malicious.iter().filter(|e| **e > threshold).count();
        let confusion = ConfusionMatrix {
            true_negatives: normal.len() - false_positives,
            false_positives,
            false_negatives: malicious.len() - true_positives,
            true_positives,
        };
        Self {
            threshold,
            accuracy: confusion.accuracy(),
            normal: ClassReport::new(
                confusion.true_negatives,
                confusion.true_negatives + confusion.false_negatives,
                normal.len(),
            ),
            malicious: ClassReport::new(
                true_positives,
                true_positives + false_positives,
                malicious.len(),
            ),
            confusion,
            normal_errors: ErrorSummary::from_errors(normal),
            malicious_errors: ErrorSummary::from_errors(malicious),
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Score both labeled sets with `scorer`. Each matrix holds raw feature rows in slot order.
pub fn evaluate(
    scorer: &AnomalyScorer,
    normal: &Array2<f64>,
    malicious: &Array2<f64>,
) -> Result<EvaluationReport> {
    if normal.nrows() == 0 || malicious.nrows() == 0 {
        return Err(SentinelError::InsufficientData(format!(
            "evaluation needs both classes, got {} normal and {} malicious rows",
            normal.nrows(),
            malicious.nrows()
        )));
    }
    let errors = |m: &Array2<f64>| -> Result<Vec<f64>> {
        Ok(scorer
            .score_batch(m)?
            .into_iter()
            .map(|r| r.reconstruction_error)
            .collect())
    };
    let report = EvaluationReport::from_errors(scorer.threshold(), &errors(normal)?, &errors(malicious)?);
    tracing::info!(
        accuracy = report.accuracy,
        precision = report.malicious.precision,
        recall = report.malicious.recall,
        f1 = report.malicious.f1,
        false_positives = report.confusion.false_positives,
        false_negatives = report.confusion.false_negatives,
        "evaluation complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confusion_counts_follow_threshold() {
        let r = EvaluationReport::from_errors(1.0, &[0.2, 0.5, 1.0, 1.5], &[3.0, 0.9, 2.0, 4.0]);
        assert_eq!(
            r.confusion,
            ConfusionMatrix {
                true_negatives: 3,
                false_positives: 1,
                false_negatives: 1,
                true_positives: 3,
            }
        );
        assert_eq!(r.accuracy, 0.75);
        assert_eq!(r.malicious.precision, 0.75);
        assert_eq!(r.malicious.recall, 0.75);
        assert!((r.malicious.f1 - 0.75).abs() < 1e-12);
        assert_eq!(r.normal.support, 4);
    }

    #[test]
    fn empty_predictions_give_zero_scores() {
        let r = EvaluationReport::from_errors(10.0, &[1.0, 2.0], &[3.0]);
        assert_eq!(r.confusion.true_positives, 0);
        assert_eq!(r.malicious.precision, 0.0);
        assert_eq!(r.malicious.recall, 0.0);
        assert_eq!(r.malicious.f1, 0.0);
        assert_eq!(r.normal.recall, 1.0);
        assert!((r.normal.precision - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn error_summary_percentiles() {
        let errors: Vec<f64> = (0..=100).rev().map(f64::from).collect();
        let s = ErrorSummary::from_errors(&errors);
        assert_eq!(s.count, 101);
        assert_eq!(s.mean, 50.0);
        assert_eq!(s.min, 0.0);
        assert_eq!(s.p50, 50.0);
        assert!((s.p95 - 95.0).abs() < 1e-9);
        assert_eq!(s.max, 100.0);
    }
}
