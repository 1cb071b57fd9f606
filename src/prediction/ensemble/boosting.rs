// src/prediction/ensemble/boosting.rs
//
// Multiclass gradient boosting on softmax log-loss. Each stage fits one
// regression tree per class to the residual y − p and takes a Newton step in
// its leaves. Raw scores start at the log class priors.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use super::forest::normalize;
use super::tree::{DecisionTree, NewtonTarget, TreeParams};
use super::{check_training_set, Classifier};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct GradientBoosting {
    n_estimators: usize,
    max_depth: usize,
    learning_rate: f32,
    seed: u64,
    n_classes: usize,
    n_features: usize,
    init: Vec<f32>,
    /// stages[m][k] is the tree for class k at stage m
    stages: Vec<Vec<DecisionTree>>,
}

fn softmax(raw: &[f32]) -> Vec<f32> {
    let max = raw.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp: Vec<f32> = raw.iter().map(|r| (r - max).exp()).collect();
    let sum: f32 = exp.iter().sum();
    exp.iter().map(|e| e / sum).collect()
}

impl GradientBoosting {
    pub fn new(n_estimators: usize, max_depth: usize, learning_rate: f32, seed: u64) -> Self {
        Self {
            n_estimators: n_estimators.max(1),
            max_depth,
            learning_rate,
            seed,
            n_classes: 0,
            n_features: 0,
            init: Vec::new(),
            stages: Vec::new(),
        }
    }

    fn raw_scores(&self, row: &[f32]) -> Vec<f32> {
        let mut raw = self.init.clone();
        for stage in &self.stages {
            for (k, tree) in stage.iter().enumerate() {
                raw[k] += self.learning_rate * tree.predict(row).first().copied().unwrap_or(0.0);
            }
        }
        raw
    }

    pub fn n_stages(&self) -> usize {
        self.stages.len()
    }
}

impl Classifier for GradientBoosting {
    fn fit(&mut self, x: &[Vec<f32>], y: &[usize]) -> Result<()> {
        let (n_features, k) = check_training_set(x, y)?;
        self.n_features = n_features;
        self.n_classes = k;
        let n = x.len();

        let mut counts = vec![0.0f32; k];
        for &label in y {
            counts[label] += 1.0;
        }
        self.init = counts.iter().map(|c| (c / n as f32).max(1e-8).ln()).collect();

        let params = TreeParams {
            max_depth: self.max_depth,
            ..TreeParams::default()
        };
        let scale = (k as f32 - 1.0) / k as f32;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut raw: Vec<Vec<f32>> = vec![self.init.clone(); n];

        self.stages.clear();
        for _ in 0..self.n_estimators {
            let proba: Vec<Vec<f32>> = raw.iter().map(|r| softmax(r)).collect();
            let mut stage = Vec::with_capacity(k);

            for class in 0..k {
                let gradient: Vec<f32> = (0..n)
                    .map(|i| f32::from(u8::from(y[i] == class)) - proba[i][class])
                    .collect();
                let hessian: Vec<f32> = (0..n)
                    .map(|i| proba[i][class] * (1.0 - proba[i][class]))
                    .collect();
                let target = NewtonTarget {
                    gradient: &gradient,
                    hessian: &hessian,
                    scale,
                };
                let tree = DecisionTree::fit(x, &target, (0..n).collect(), &params, &mut rng);
                for (i, row) in x.iter().enumerate() {
                    raw[i][class] +=
                        self.learning_rate * tree.predict(row).first().copied().unwrap_or(0.0);
                }
                stage.push(tree);
            }
            self.stages.push(stage);
        }

        debug!(
            "Gradient boosting fitted: {} stages x {} classes",
            self.stages.len(),
            k
        );
        Ok(())
    }

    fn predict_proba(&self, row: &[f32]) -> Vec<f32> {
        if self.init.is_empty() {
            return Vec::new();
        }
        softmax(&self.raw_scores(row))
    }

    fn feature_importances(&self) -> Vec<f32> {
        let mut imp = vec![0.0f32; self.n_features];
        for tree in self.stages.iter().flatten() {
            for (acc, v) in imp.iter_mut().zip(tree.feature_importances()) {
                *acc += v;
            }
        }
        normalize(&mut imp);
        imp
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }
}
