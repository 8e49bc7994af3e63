//! Bagged Gini decision trees with random feature subsets.
//!
//! Each tree is grown on a bootstrap sample and considers `sqrt(width)`
//! randomly ordered features per split, more only when none of those yields
//! a valid split. The ensemble score is the mean positive fraction of the
//! leaves a row lands in.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::common::error::{StoreError, TrainingError};

use super::domain::{Classifier, Learner, Model, TrainConfig};
use super::logistic::check_shape;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    /// Rows with `x[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        positive_fraction: f64,
    },
}

/// Flat tree; node 0 is the root.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    fn score(&self, features: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { positive_fraction } => return *positive_fraction,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let x = features.get(*feature).copied().unwrap_or(f64::NAN);
                    idx = if x <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForestModel {
    pub width: usize,
    pub trees: Vec<Tree>,
}

impl ForestModel {
    pub fn width(&self) -> usize {
        self.width
    }

    /// Check every tree is a well-formed DAG over its own nodes.
    ///
    /// Children must come after their parent, so walking a tree always
    /// terminates inside `nodes`.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.trees.is_empty() {
            return Err(StoreError::Corrupt("forest has no trees".into()));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            let corrupt = |msg: String| Err(StoreError::Corrupt(format!("tree {t}: {msg}")));
            if tree.nodes.is_empty() {
                return corrupt("no nodes".into());
            }
            for (idx, node) in tree.nodes.iter().enumerate() {
                match *node {
                    Node::Split {
                        feature,
                        threshold,
                        left,
                        right,
                    } => {
                        if feature >= self.width {
                            return corrupt(format!("node {idx} splits on feature {feature}"));
                        }
                        if !threshold.is_finite() {
                            return corrupt(format!("node {idx} has a non-finite threshold"));
                        }
                        for child in [left, right] {
                            if child <= idx || child >= tree.nodes.len() {
                                return corrupt(format!("node {idx} points to node {child}"));
                            }
                        }
                    }
                    Node::Leaf { positive_fraction } => {
                        if !(0.0..=1.0).contains(&positive_fraction) {
                            return corrupt(format!("leaf {idx} has fraction {positive_fraction}"));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl Classifier for ForestModel {
    fn score(&self, features: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.score(features)).sum::<f64>() / self.trees.len() as f64
    }
}

#[derive(Clone, Debug)]
pub struct ForestLearner {
    n_estimators: usize,
    max_depth: usize,
    min_samples_split: usize,
    seed: u64,
}

impl ForestLearner {
    pub fn from_config(cfg: &TrainConfig) -> Self {
        Self {
            n_estimators: cfg.n_estimators,
            max_depth: cfg.max_depth,
            min_samples_split: cfg.min_samples_split,
            seed: cfg.seed,
        }
    }
}

impl Learner for ForestLearner {
    fn fit(&self, matrix: &[Vec<f64>], labels: &[bool]) -> Result<Model, TrainingError> {
        let width = check_shape(matrix, labels)?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let n = matrix.len();
        let per_split = ((width as f64).sqrt().round() as usize).clamp(1, width.max(1));

        let trees = (0..self.n_estimators)
            .map(|_| {
                let rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let mut grower = Grower {
                    matrix,
                    labels,
                    width,
                    per_split,
                    max_depth: self.max_depth,
                    min_samples_split: self.min_samples_split,
                    rng: &mut rng,
                    nodes: Vec::new(),
                };
                grower.grow(rows, 0);
                Tree {
                    nodes: grower.nodes,
                }
            })
            .collect();

        Ok(Model::BaggedTrees(ForestModel { width, trees }))
    }
}

struct Grower<'a> {
    matrix: &'a [Vec<f64>],
    labels: &'a [bool],
    width: usize,
    per_split: usize,
    max_depth: usize,
    min_samples_split: usize,
    rng: &'a mut StdRng,
    nodes: Vec<Node>,
}

impl Grower<'_> {
    /// Grow the subtree for `rows` and return its node index.
    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let positives = rows.iter().filter(|&&r| self.labels[r]).count();
        let fraction = positives as f64 / rows.len().max(1) as f64;
        let pure = positives == 0 || positives == rows.len();

        let split = if pure || depth >= self.max_depth || rows.len() < self.min_samples_split {
            None
        } else {
            self.best_split(&rows)
        };

        let slot = self.nodes.len();
        self.nodes.push(Node::Leaf {
            positive_fraction: fraction,
        });
        let Some((feature, threshold)) = split else {
            return slot;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| self.matrix[r][feature] <= threshold);
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[slot] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        slot
    }

    fn best_split(&mut self, rows: &[usize]) -> Option<(usize, f64)> {
        let total = rows.len() as f64;
        let total_pos = rows.iter().filter(|&&r| self.labels[r]).count() as f64;
        let parent = gini(total_pos, total);

        let mut best: Option<(f64, usize, f64)> = None;
        let order = index::sample(&mut *self.rng, self.width, self.width).into_vec();

        // Keep looking past `per_split` features until some valid split exists.
        for (seen, feature) in order.into_iter().enumerate() {
            if seen >= self.per_split && best.is_some() {
                break;
            }
            let mut sorted: Vec<(f64, bool)> = rows
                .iter()
                .map(|&r| (self.matrix[r][feature], self.labels[r]))
                .collect();
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_pos = 0.0;
            for i in 0..sorted.len() - 1 {
                if sorted[i].1 {
                    left_pos += 1.0;
                }
                if sorted[i].0 == sorted[i + 1].0 {
                    continue;
                }
                let left_n = (i + 1) as f64;
                let right_n = total - left_n;
                let impurity = (left_n * gini(left_pos, left_n)
                    + right_n * gini(total_pos - left_pos, right_n))
                    / total;
                let gain = parent - impurity;
                if gain > 1e-12 && best.map_or(true, |(g, _, _)| gain > g) {
                    let threshold = (sorted[i].0 + sorted[i + 1].0) / 2.0;
                    best = Some((gain, feature, threshold));
                }
            }
        }

        best.map(|(_, feature, threshold)| (feature, threshold))
    }
}

fn gini(positives: f64, n: f64) -> f64 {
    if n == 0.0 {
        return 0.0;
    }
    let p = positives / n;
    2.0 * p * (1.0 - p)
}
