//! Inference module
//!
//! Classifies single mushroom records with the artifacts persisted by a
//! training run.

mod service;

pub use service::{predict_once, MushroomRecord, Prediction, PredictionService};
