// src/prediction/ensemble/forest.rs
//
// Bagged Gini trees with √features per split.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::tree::{ClassTarget, DecisionTree, TreeParams};
use super::{check_training_set, Classifier};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct RandomForest {
    n_estimators: usize,
    max_depth: usize,
    seed: u64,
    n_classes: usize,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn new(n_estimators: usize, max_depth: usize, seed: u64) -> Self {
        Self {
            n_estimators: n_estimators.max(1),
            max_depth,
            seed,
            n_classes: 0,
            n_features: 0,
            trees: Vec::new(),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: &[Vec<f32>], y: &[usize]) -> Result<()> {
        let (n_features, n_classes) = check_training_set(x, y)?;
        self.n_features = n_features;
        self.n_classes = n_classes;

        let params = TreeParams {
            max_depth: self.max_depth,
            max_features: Some(((n_features as f32).sqrt() as usize).max(1)),
            ..TreeParams::default()
        };
        let target = ClassTarget {
            labels: y,
            n_classes,
        };

        let mut rng = StdRng::seed_from_u64(self.seed);
        let n = x.len();
        self.trees = (0..self.n_estimators)
            .map(|_| {
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                DecisionTree::fit(x, &target, bootstrap, &params, &mut rng)
            })
            .collect();

        debug!(
            "Random forest fitted: {} trees, {} features, {} classes",
            self.trees.len(),
            n_features,
            n_classes
        );
        Ok(())
    }

    fn predict_proba(&self, row: &[f32]) -> Vec<f32> {
        let mut proba = vec![0.0f32; self.n_classes];
        if self.trees.is_empty() {
            return proba;
        }
        for tree in &self.trees {
            for (p, v) in proba.iter_mut().zip(tree.predict(row)) {
                *p += v;
            }
        }
        let n = self.trees.len() as f32;
        proba.iter_mut().for_each(|p| *p /= n);
        proba
    }

    fn feature_importances(&self) -> Vec<f32> {
        let mut imp = vec![0.0f32; self.n_features];
        for tree in &self.trees {
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

pub(crate) fn normalize(v: &mut [f32]) {
    let total: f32 = v.iter().sum();
    if total > 0.0 {
        v.iter_mut().for_each(|x| *x /= total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> (Vec<Vec<f32>>, Vec<usize>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..90 {
            let class = i % 3;
            let jitter = (i as f32 * 0.37).sin();
            x.push(vec![class as f32 * 10.0 + jitter, jitter * 5.0, 1.0]);
            y.push(class);
        }
        (x, y)
    }

    #[test]
    fn test_forest_learns_blobs() {
        let (x, y) = blobs();
        let mut forest = RandomForest::new(10, 6, 42);
        forest.fit(&x, &y).unwrap();
        assert_eq!(forest.n_trees(), 10);

        let p = forest.predict_proba(&[20.0, 0.0, 1.0]);
        assert_eq!(p.len(), 3);
        assert!((p.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(p[2] > p[0] && p[2] > p[1], "{:?}", p);
    }

    #[test]
    fn test_forest_is_deterministic_for_seed() {
        let (x, y) = blobs();
        let mut a = RandomForest::new(5, 4, 7);
        let mut b = RandomForest::new(5, 4, 7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&[9.0, 1.0, 1.0]), b.predict_proba(&[9.0, 1.0, 1.0]));
        assert_eq!(a.feature_importances(), b.feature_importances());
    }

    #[test]
    fn test_importances_favor_informative_feature() {
        let (x, y) = blobs();
        let mut forest = RandomForest::new(20, 6, 3);
        forest.fit(&x, &y).unwrap();
        let imp = forest.feature_importances();
        assert!((imp.iter().sum::<f32>() - 1.0).abs() < 1e-4);
        assert_eq!(imp[2], 0.0, "constant column never splits");
        assert!(imp[0] > imp[1]);
    }
}
