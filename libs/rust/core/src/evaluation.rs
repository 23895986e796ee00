//! Classification metrics with support-weighted averaging.
//!
//! The confusion matrix is indexed by the sorted union of labels seen in the
//! ground truth and the predictions, so classes absent from both do not get a
//! row. Per-class scores with a zero denominator count as 0.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// `counts[i][j]` is the number of samples of true class `labels[i]`
/// predicted as `labels[j]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfusionMatrix {
    labels: Vec<usize>,
    counts: Vec<Vec<u64>>,
}

impl ConfusionMatrix {
    pub fn from_predictions(y_true: &[usize], y_pred: &[usize]) -> Self {
        let labels: Vec<usize> = y_true.iter().chain(y_pred).copied().collect::<BTreeSet<_>>().into_iter().collect();
        let n = labels.len();
        let mut counts = vec![vec![0u64; n]; n];
        // labels is sorted, so binary search maps a class to its row
        let idx = |c: usize| labels.binary_search(&c).unwrap_or_default();
        for (&t, &p) in y_true.iter().zip(y_pred) {
            counts[idx(t)][idx(p)] += 1;
        }
        Self { labels, counts }
    }

    pub fn labels(&self) -> &[usize] { &self.labels }
    pub fn counts(&self) -> &[Vec<u64>] { &self.counts }
    pub fn into_counts(self) -> Vec<Vec<u64>> { self.counts }

    fn true_positives(&self, i: usize) -> u64 { self.counts[i][i] }
    fn false_positives(&self, i: usize) -> u64 { self.counts.iter().enumerate().filter(|(r, _)| *r != i).map(|(_, row)| row[i]).sum() }
    fn false_negatives(&self, i: usize) -> u64 { self.counts[i].iter().enumerate().filter(|(c, _)| *c != i).map(|(_, v)| *v).sum() }
    fn support(&self, i: usize) -> u64 { self.counts[i].iter().sum() }
    fn total(&self) -> u64 { self.counts.iter().flatten().sum() }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 { return 0.0; }
        let correct: u64 = (0..self.labels.len()).map(|i| self.true_positives(i)).sum();
        correct as f64 / total as f64
    }

    /// Precision, recall and F1 averaged with each class weighted by its support.
    pub fn weighted_scores(&self) -> (f64, f64, f64) {
        let total = self.total();
        if total == 0 { return (0.0, 0.0, 0.0); }
        let (mut p_sum, mut r_sum, mut f_sum) = (0.0, 0.0, 0.0);
        for i in 0..self.labels.len() {
            let tp = self.true_positives(i) as f64;
            let fp = self.false_positives(i) as f64;
            let fn_ = self.false_negatives(i) as f64;
            let p = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
            let r = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 0.0 };
            let f = if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };
            let w = self.support(i) as f64;
            p_sum += p * w;
            r_sum += r * w;
            f_sum += f * w;
        }
        let total = total as f64;
        (p_sum / total, r_sum / total, f_sum / total)
    }
}

/// Scores of one model against one labelled dataset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub confusion_matrix: Vec<Vec<u64>>,
}

impl EvaluationReport {
    pub fn from_predictions(y_true: &[usize], y_pred: &[usize]) -> Self {
        let cm = ConfusionMatrix::from_predictions(y_true, y_pred);
        let accuracy = cm.accuracy();
        let (precision, recall, f1_score) = cm.weighted_scores();
        Self { accuracy, precision, recall, f1_score, confusion_matrix: cm.into_counts() }
    }
}
