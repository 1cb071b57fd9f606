// src/prediction/ensemble/mod.rs
//
// Two-model classification ensemble: standardized features feed a random
// forest and a gradient booster whose class probabilities are averaged.

pub mod boosting;
pub mod forest;
pub mod scaler;
pub mod tree;

pub use boosting::GradientBoosting;
pub use forest::RandomForest;
pub use scaler::StandardScaler;

use crate::error::{Result, SentinelError};
use crate::types::PredictorConfig;

pub trait Classifier: Send + Sync {
    fn fit(&mut self, x: &[Vec<f32>], y: &[usize]) -> Result<()>;

    /// Class probabilities for one row, length `n_classes()`.
    fn predict_proba(&self, row: &[f32]) -> Vec<f32>;

    /// Normalized importances aligned to the feature order.
    fn feature_importances(&self) -> Vec<f32>;

    fn n_classes(&self) -> usize;
}

/// (n_features, n_classes) of a usable training set.
pub(crate) fn check_training_set(x: &[Vec<f32>], y: &[usize]) -> Result<(usize, usize)> {
    if x.is_empty() {
        return Err(SentinelError::Training("empty training set".into()));
    }
    if x.len() != y.len() {
        return Err(SentinelError::Training(format!(
            "{} rows but {} labels",
            x.len(),
            y.len()
        )));
    }
    let n_features = x[0].len();
    if n_features == 0 || x.iter().any(|r| r.len() != n_features) {
        return Err(SentinelError::Training("ragged or empty feature rows".into()));
    }
    if x.iter().flatten().any(|v| !v.is_finite()) {
        return Err(SentinelError::Training("non-finite feature value".into()));
    }

    let n_classes = y.iter().copied().max().unwrap_or(0) + 1;
    let first = y[0];
    if y.iter().all(|&label| label == first) {
        return Err(SentinelError::Training("need at least two classes".into()));
    }
    Ok((n_features, n_classes))
}

pub struct Ensemble {
    scaler: StandardScaler,
    forest: RandomForest,
    boosting: GradientBoosting,
    importances: Vec<f32>,
}

impl Ensemble {
    pub fn new(config: &PredictorConfig) -> Self {
        Self {
            scaler: StandardScaler::default(),
            forest: RandomForest::new(config.n_estimators, config.forest_max_depth, config.random_seed),
            boosting: GradientBoosting::new(
                config.n_estimators,
                config.boosting_max_depth,
                config.learning_rate,
                config.random_seed,
            ),
            importances: Vec::new(),
        }
    }
}

impl Classifier for Ensemble {
    fn fit(&mut self, x: &[Vec<f32>], y: &[usize]) -> Result<()> {
        check_training_set(x, y)?;
        let scaled = self.scaler.fit_transform(x);
        self.forest.fit(&scaled, y)?;
        self.boosting.fit(&scaled, y)?;

        self.importances = self
            .forest
            .feature_importances()
            .iter()
            .zip(self.boosting.feature_importances())
            .map(|(a, b)| (a + b) / 2.0)
            .collect();
        Ok(())
    }

    fn predict_proba(&self, row: &[f32]) -> Vec<f32> {
        let scaled = self.scaler.transform(row);
        let rf = self.forest.predict_proba(&scaled);
        let gb = self.boosting.predict_proba(&scaled);
        rf.iter().zip(&gb).map(|(a, b)| (a + b) / 2.0).collect()
    }

    fn feature_importances(&self) -> Vec<f32> {
        self.importances.clone()
    }

    fn n_classes(&self) -> usize {
        self.forest.n_classes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_degenerate_training_sets() {
        assert!(matches!(check_training_set(&[], &[]), Err(SentinelError::Training(_))));
        let x = vec![vec![1.0], vec![2.0]];
        assert!(check_training_set(&x, &[0, 0]).is_err(), "single class");
        assert!(check_training_set(&x, &[0]).is_err(), "length mismatch");
        assert!(check_training_set(&[vec![f32::NAN], vec![1.0]], &[0, 1]).is_err());
        assert_eq!(check_training_set(&x, &[0, 2]).unwrap(), (1, 3));
    }

    #[test]
    fn test_ensemble_averages_both_models() {
        let x: Vec<Vec<f32>> = (0..90).map(|i| vec![(i % 3) as f32 * 4.0 + (i % 5) as f32 * 0.1, 7.0]).collect();
        let y: Vec<usize> = (0..90).map(|i| i % 3).collect();
        let mut ensemble = Ensemble::new(&PredictorConfig {
            n_estimators: 6,
            forest_max_depth: 4,
            boosting_max_depth: 2,
            ..PredictorConfig::default()
        });
        ensemble.fit(&x, &y).unwrap();

        let p = ensemble.predict_proba(&[8.2, 7.0]);
        assert_eq!(p.len(), 3);
        assert!((p.iter().sum::<f32>() - 1.0).abs() < 1e-4);
        assert!(p[2] > 0.5, "{:?}", p);

        let imp = ensemble.feature_importances();
        assert_eq!(imp.len(), 2);
        assert!((imp[0] - 1.0).abs() < 1e-5);
        assert_eq!(imp[1], 0.0);
    }
}
