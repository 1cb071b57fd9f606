// src/prediction/mod.rs
//
// Injury risk prediction: fixed-order features → trained ensemble →
// probability, injury type, time horizon and ranked factors.
// Training data is synthetic and generated per sport on first use.

pub mod ensemble;
pub mod features;
pub mod predictor;
pub mod registry;
pub mod synthetic;

pub use ensemble::{Classifier, Ensemble};
pub use features::{Feature, FeatureInputs, FeatureVector, NUM_FEATURES};
pub use predictor::{InjuryPredictor, PredictionResult, TimeHorizon};
pub use registry::PredictorRegistry;
