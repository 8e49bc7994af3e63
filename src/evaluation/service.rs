//! Metric computation over encoded holdout rows.

use crate::training::domain::Classifier;

use super::domain::{Confusion, EvalReport};

/// Score every row with `model` and compare against `labels` at `threshold`.
///
/// Returns `None` for an empty holdout. Ratios with a zero denominator are 0.
pub fn evaluate(
    model: &dyn Classifier,
    threshold: f64,
    matrix: &[Vec<f64>],
    labels: &[bool],
) -> Option<EvalReport> {
    if matrix.is_empty() {
        return None;
    }

    let mut confusion = Confusion::default();
    for (row, &actual) in matrix.iter().zip(labels) {
        let predicted = model.score(row) >= threshold;
        match (predicted, actual) {
            (true, true) => confusion.true_positive += 1,
            (true, false) => confusion.false_positive += 1,
            (false, false) => confusion.true_negative += 1,
            (false, true) => confusion.false_negative += 1,
        }
    }

    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let precision = ratio(
        confusion.true_positive,
        confusion.true_positive + confusion.false_positive,
    );
    let recall = ratio(
        confusion.true_positive,
        confusion.true_positive + confusion.false_negative,
    );
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };

    Some(EvalReport {
        rows: confusion.total(),
        accuracy: ratio(
            confusion.true_positive + confusion.true_negative,
            confusion.total(),
        ),
        precision,
        recall,
        f1,
        confusion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scores the first feature directly.
    struct Identity;

    impl Classifier for Identity {
        fn score(&self, features: &[f64]) -> f64 {
            features[0]
        }
    }

    #[test]
    fn counts_and_ratios() {
        let matrix = vec![vec![0.9], vec![0.8], vec![0.2], vec![0.6], vec![0.1]];
        let labels = [true, false, false, true, true];
        let report = evaluate(&Identity, 0.5, &matrix, &labels).unwrap();
        assert_eq!(
            report.confusion,
            Confusion {
                true_positive: 2,
                false_positive: 1,
                true_negative: 1,
                false_negative: 1,
            }
        );
        assert_eq!(report.rows, 5);
        assert!((report.accuracy - 0.6).abs() < 1e-12);
        assert!((report.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.f1 - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn empty_holdout_has_no_report() {
        assert!(evaluate(&Identity, 0.5, &[], &[]).is_none());
    }

    #[test]
    fn no_positive_predictions_means_zero_precision() {
        let report = evaluate(&Identity, 0.99, &[vec![0.5]], &[true]).unwrap();
        assert_eq!(report.precision, 0.0);
        assert_eq!(report.f1, 0.0);
    }
}
