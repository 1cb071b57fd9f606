// src/lib.rs
//
// Real-time multi-modal injury risk fusion for live athlete monitoring.

pub mod analysis;
pub mod api;
pub mod config;
pub mod detectors;
pub mod error;
pub mod pipeline;
pub mod prediction;
pub mod profiles;
pub mod types;

pub use error::{Result, SentinelError};
pub use pipeline::{FrameAnalysis, MonitoringSession, PipelineMetrics};
pub use prediction::PredictorRegistry;
pub use profiles::Sport;
pub use types::{Config, Frame};
