//! Interest rate models

pub mod model;

pub use model::{RateModel, RateModelParams, MAX_RATE};
