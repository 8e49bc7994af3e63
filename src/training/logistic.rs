//! Logistic regression on standardised inputs, fitted with seeded shuffled SGD.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::common::error::{StoreError, TrainingError};

use super::domain::{Classifier, Learner, Model, TrainConfig};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LogisticModel {
    pub fn width(&self) -> usize {
        self.weights.len()
    }

    /// Reject parameter vectors that disagree in length or cannot score.
    pub fn validate(&self) -> Result<(), StoreError> {
        let width = self.width();
        if self.means.len() != width || self.scales.len() != width {
            return Err(StoreError::Corrupt(format!(
                "logistic model has {} weights, {} means and {} scales",
                width,
                self.means.len(),
                self.scales.len()
            )));
        }
        if let Some(j) = self.scales.iter().position(|s| !s.is_finite() || *s == 0.0) {
            return Err(StoreError::Corrupt(format!("logistic scale {j} is zero or not finite")));
        }
        let finite = |v: &[f64]| v.iter().all(|x| x.is_finite());
        if !finite(&self.means) || !finite(&self.weights) || !self.bias.is_finite() {
            return Err(StoreError::Corrupt("logistic parameters are not finite".into()));
        }
        Ok(())
    }

    fn margin(&self, features: &[f64]) -> f64 {
        features
            .iter()
            .zip(&self.means)
            .zip(&self.scales)
            .zip(&self.weights)
            .map(|(((x, mean), scale), w)| w * (x - mean) / scale)
            .sum::<f64>()
            + self.bias
    }
}

impl Classifier for LogisticModel {
    fn score(&self, features: &[f64]) -> f64 {
        sigmoid(self.margin(features))
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[derive(Clone, Debug)]
pub struct LogisticLearner {
    epochs: usize,
    learning_rate: f64,
    l2: f64,
    seed: u64,
}

impl LogisticLearner {
    pub fn from_config(cfg: &TrainConfig) -> Self {
        Self {
            epochs: cfg.epochs,
            learning_rate: cfg.learning_rate,
            l2: cfg.l2,
            seed: cfg.seed,
        }
    }
}

impl Learner for LogisticLearner {
    fn fit(&self, matrix: &[Vec<f64>], labels: &[bool]) -> Result<Model, TrainingError> {
        let width = check_shape(matrix, labels)?;
        let n = matrix.len() as f64;

        let mut means = vec![0.0; width];
        for row in matrix {
            for (m, x) in means.iter_mut().zip(row) {
                *m += x / n;
            }
        }
        let mut scales = vec![0.0; width];
        for row in matrix {
            for ((s, x), m) in scales.iter_mut().zip(row).zip(&means) {
                *s += (x - m).powi(2) / n;
            }
        }
        // Constant columns keep a unit scale so they contribute nothing after centring.
        for s in &mut scales {
            *s = if *s > 0.0 { s.sqrt() } else { 1.0 };
        }

        let mut model = LogisticModel {
            means,
            scales,
            weights: vec![0.0; width],
            bias: 0.0,
        };

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut order: Vec<usize> = (0..matrix.len()).collect();
        for _ in 0..self.epochs {
            order.shuffle(&mut rng);
            for &idx in &order {
                let row = &matrix[idx];
                let target = if labels[idx] { 1.0 } else { 0.0 };
                let err = sigmoid(model.margin(row)) - target;
                for j in 0..width {
                    let x = (row[j] - model.means[j]) / model.scales[j];
                    let grad = err * x + self.l2 * model.weights[j];
                    model.weights[j] -= self.learning_rate * grad;
                }
                model.bias -= self.learning_rate * err;
            }
        }

        Ok(Model::Logistic(model))
    }
}

/// Validate matrix/label agreement and return the row width.
pub(crate) fn check_shape(matrix: &[Vec<f64>], labels: &[bool]) -> Result<usize, TrainingError> {
    if matrix.is_empty() {
        return Err(TrainingError::Fit("no training rows".into()));
    }
    if matrix.len() != labels.len() {
        return Err(TrainingError::Fit(format!(
            "{} rows but {} labels",
            matrix.len(),
            labels.len()
        )));
    }
    let width = matrix[0].len();
    if let Some(idx) = matrix.iter().position(|row| row.len() != width) {
        return Err(TrainingError::Fit(format!("row {idx} has a different width")));
    }
    if labels.iter().all(|&l| l) || labels.iter().all(|&l| !l) {
        return Err(TrainingError::Fit("training labels contain a single class".into()));
    }
    Ok(width)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<bool>) {
        let mut matrix = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            let x = i as f64;
            matrix.push(vec![x, 1.0]);
            labels.push(x >= 20.0);
        }
        (matrix, labels)
    }

    #[test]
    fn learns_a_separable_threshold() {
        let (matrix, labels) = separable();
        let cfg = TrainConfig::default();
        let model = LogisticLearner::from_config(&cfg).fit(&matrix, &labels).unwrap();
        assert!(model.score(&[2.0, 1.0]) < 0.2);
        assert!(model.score(&[38.0, 1.0]) > 0.8);
        assert_eq!(model.width(), 2);
    }

    #[test]
    fn same_seed_same_weights() {
        let (matrix, labels) = separable();
        let cfg = TrainConfig {
            epochs: 20,
            ..TrainConfig::default()
        };
        let a = LogisticLearner::from_config(&cfg).fit(&matrix, &labels).unwrap();
        let b = LogisticLearner::from_config(&cfg).fit(&matrix, &labels).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn validate_rejects_mismatched_or_zero_scales() {
        let (matrix, labels) = separable();
        let Model::Logistic(fitted) = LogisticLearner::from_config(&TrainConfig::default())
            .fit(&matrix, &labels)
            .unwrap()
        else {
            panic!("expected a logistic model");
        };
        assert!(fitted.validate().is_ok());

        let mut short = fitted.clone();
        short.means.pop();
        assert!(matches!(short.validate(), Err(StoreError::Corrupt(_))));

        let mut flat = fitted.clone();
        flat.scales[0] = 0.0;
        assert!(matches!(flat.validate(), Err(StoreError::Corrupt(_))));

        let mut nan = fitted;
        nan.bias = f64::NAN;
        assert!(matches!(nan.validate(), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn single_class_is_rejected() {
        let matrix = vec![vec![1.0], vec![2.0]];
        let err = LogisticLearner::from_config(&TrainConfig::default())
            .fit(&matrix, &[true, true])
            .unwrap_err();
        assert!(matches!(err, TrainingError::Fit(_)));
    }
}
