//! Model pipelines
//!
//! Feature engineering, a per-ticker direction classifier, a lagged-return
//! forecaster, and the trainer that persists fitted pipelines as artifacts.

pub mod classifier;
pub mod features;
pub mod forecast;
pub mod metrics;
pub mod pipeline;
pub mod train;

pub use classifier::LogisticRegression;
pub use features::{build_features, FeatureTable, FEATURE_COLUMNS, WEEKDAY_COLUMN};
pub use forecast::{ReturnForecaster, RETURN_LAGS};
pub use metrics::EvalMetrics;
pub use pipeline::{DirectionPipeline, StandardScaler, WeekdayEncoder};
pub use train::{load_artifact, TrainedArtifact, Trainer, MIN_TRAIN_ROWS};
